use rpcmux_client::ClientError;

#[test]
fn exactly_one_flag_set_per_constructor() {
    let e = ClientError::timeout("t");
    assert!(e.is_timeout());
    assert!(!e.is_connection());
    assert!(!e.is_server());
    assert!(!e.is_overflow());
    assert!(!e.is_canceled());

    let e = ClientError::overflow("full");
    assert!(e.is_overflow());
    assert!(!e.is_timeout());
    assert_eq!(e.message(), "full");
}

#[test]
fn display_renders_message() {
    let e = ClientError::server("boom");
    assert_eq!(format!("{e}"), "boom");
}
