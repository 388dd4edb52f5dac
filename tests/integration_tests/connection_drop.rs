use std::time::Duration;

use crate::integration_tests::common::{dropping_client, Req};

#[tokio::test]
async fn call_fails_with_connection_error_when_peer_closes() {
    let client = dropping_client(false);
    client.start().await.unwrap();

    let result = client.call_with_timeout(Req("w".into()), Duration::from_secs(2)).await;
    let err = result.expect_err("expected a connection error, not a successful reply");
    assert!(err.is_connection(), "got {err:?}");

    client.stop().await.unwrap();
}
