use crate::integration_tests::common::{silent_client, Req};

#[tokio::test]
async fn send_overflows_when_queue_is_full_of_fire_and_forget_entries() {
    // `silent_client` never responds, so fire-and-forget sends simply pile up
    // in the queue (the server never drains anything via a reply either —
    // fire-and-forget carries no response to begin with).
    let client = silent_client(false);
    client.start().await.unwrap();

    // Give the writer a beat to pull the first couple of sends off the
    // queue so we are testing queue capacity, not a completely idle queue.
    for i in 0..8 {
        let _ = client.send(Req(format!("u{i}"))).await;
    }

    let mut saw_overflow = false;
    for i in 8..32 {
        if client.send(Req(format!("u{i}"))).await.is_err() {
            saw_overflow = true;
            break;
        }
    }

    assert!(saw_overflow, "expected at least one send to overflow under sustained fire-and-forget load");

    client.stop().await.unwrap();
}
