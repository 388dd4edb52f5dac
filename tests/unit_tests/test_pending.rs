use std::sync::Arc;

use rpcmux_client::{error::ClientError, pending::{AsyncResult, PendingTable}};

#[tokio::test]
async fn completion_fires_exactly_once() {
    let entry: Arc<AsyncResult<String, String>> = Arc::new(AsyncResult::new("x".into()));
    entry.complete_ok("y".into());
    entry.complete_ok("z".into()); // no-op, already fired

    assert!(entry.completion.is_fired());
    let result = entry.take();
    assert_eq!(result.unwrap(), "y");
}

#[tokio::test]
async fn waiter_observes_late_fire() {
    let entry: Arc<AsyncResult<String, String>> = Arc::new(AsyncResult::new("x".into()));
    let waiter = entry.clone();
    let handle = tokio::spawn(async move {
        waiter.completion.wait().await;
        waiter.take()
    });

    tokio::task::yield_now().await;
    entry.complete_ok("done".into());

    let result = handle.await.unwrap();
    assert_eq!(result.unwrap(), "done");
}

#[test]
fn pending_table_tracks_length() {
    let table: PendingTable<String, String> = PendingTable::new();
    assert_eq!(table.len(), 0);

    table.insert(1, Arc::new(AsyncResult::new("a".into())));
    table.insert(2, Arc::new(AsyncResult::new("b".into())));
    assert_eq!(table.len(), 2);
    assert!(table.contains(1));

    table.remove(1);
    assert_eq!(table.len(), 1);
    assert!(!table.contains(1));
}

#[test]
fn drain_fails_every_entry_and_empties_table() {
    let table: PendingTable<String, String> = PendingTable::new();
    let a = Arc::new(AsyncResult::new("a".into()));
    let b = Arc::new(AsyncResult::new("b".into()));
    table.insert(1, a.clone());
    table.insert(2, b.clone());

    let drained = table.drain_with_error(ClientError::connection("gone"));
    assert_eq!(drained, 2);
    assert!(table.is_empty());
    assert!(a.completion.is_fired());
    assert!(a.take().unwrap_err().is_connection());
    assert!(b.completion.is_fired());
}
