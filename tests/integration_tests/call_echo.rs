use std::time::Duration;

use crate::integration_tests::common::{echo_client, Req};

#[tokio::test]
async fn call_returns_what_the_server_echoes() {
    let client = echo_client(true);
    client.start().await.unwrap();

    let resp = client.call(Req("x".into())).await.unwrap();
    assert_eq!(resp.0, "x");

    client.stop().await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_before_drain_all_eventually_resolve() {
    let client = std::sync::Arc::new(echo_client(false));
    client.start().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..3 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.call_with_timeout(Req(format!("m{i}")), Duration::from_secs(1)).await
        }));
    }

    let mut successes = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(e.is_overflow(), "unexpected error: {e}"),
        }
    }
    assert!(successes >= 1, "at least one concurrent call must succeed");

    client.stop().await.unwrap();
}
