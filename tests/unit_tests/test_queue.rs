use std::sync::Arc;

use rpcmux_client::{pending::AsyncResult, pool::AsyncResultPool, queue::SubmitQueue};

#[tokio::test]
async fn submit_within_capacity_succeeds() {
    let queue: SubmitQueue<String, String> = SubmitQueue::bounded(2);
    let pool: AsyncResultPool<String, String> = AsyncResultPool::default();

    let a = Arc::new(AsyncResult::new("a".into()));
    queue.submit(a, false, false, None).await.unwrap();
    assert_eq!(queue.len(), 1);
    let _ = &pool;
}

#[tokio::test]
async fn overflow_evicts_oldest_waiter_with_overflow_error() {
    let queue: SubmitQueue<String, String> = SubmitQueue::bounded(1);

    let oldest = Arc::new(AsyncResult::new("old".into()));
    queue.submit(oldest.clone(), false, false, None).await.unwrap();

    let newest = Arc::new(AsyncResult::new("new".into()));
    queue.submit(newest.clone(), false, false, None).await.unwrap();

    assert!(oldest.completion.is_fired());
    assert!(oldest.take().unwrap_err().is_overflow());
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn fire_and_forget_overflow_with_no_victim_fails_new_submission() {
    let queue: SubmitQueue<String, String> = SubmitQueue::bounded(1);
    let pool: Arc<AsyncResultPool<String, String>> = Arc::new(AsyncResultPool::default());

    let resident = Arc::new(AsyncResult::new("resident".into()));
    queue.submit(resident, true, false, None).await.unwrap();

    let newest = Arc::new(AsyncResult::new("new".into()));
    let err = queue.submit(newest, true, true, Some(&pool)).await;
    assert!(err.is_err());
    assert!(err.unwrap_err().is_overflow());
}
