use std::time::Duration;

use crate::integration_tests::common::{echo_client, Req};

#[tokio::test]
async fn call_async_completes_with_echoed_response() {
    let client = echo_client(false);
    client.start().await.unwrap();

    let handle = client.call_async(Req("z".into())).await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle.completion.wait())
        .await
        .expect("completion should fire before the timeout");

    let resp = handle.take().unwrap();
    assert_eq!(resp.0, "z");

    client.stop().await.unwrap();
}
