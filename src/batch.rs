// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Grouped submission with a single shared deadline, per SPEC_FULL.md §4.2.
//! Not grounded in a single teacher file (the teacher has no batching
//! concept); built from the same `tokio::sync::Mutex` + retry-with-sleep
//! idiom the rest of the crate already uses.

use std::sync::{Arc, atomic::Ordering};

use tokio::{sync::Mutex, time::Instant};

use crate::{
    error::ClientError,
    pending::AsyncResult,
    pool::AsyncResultPool,
    queue::SubmitQueue,
};

const OVERFLOW_RETRY_ATTEMPTS: u32 = 6;
const OVERFLOW_RETRY_SPACING: std::time::Duration = std::time::Duration::from_millis(10);

struct BatchEntry<Req, Resp> {
    entry: Arc<AsyncResult<Req, Resp>>,
}

/// Accumulates requests under a lock, then submits and awaits them together
/// against one shared deadline rather than one timeout per entry.
pub struct Batch<Req, Resp> {
    queue: SubmitQueue<Req, Resp>,
    pool: Arc<AsyncResultPool<Req, Resp>>,
    entries: Mutex<Vec<BatchEntry<Req, Resp>>>,
}

impl<Req, Resp> Batch<Req, Resp>
where
    Req: Clone + Send + Sync + 'static,
    Resp: Send + Sync + 'static,
{
    pub fn new(queue: SubmitQueue<Req, Resp>, pool: Arc<AsyncResultPool<Req, Resp>>) -> Self {
        Self { queue, pool, entries: Mutex::new(Vec::new()) }
    }

    /// Queues a request into the batch without submitting it yet. Returns
    /// the shared handle so the caller can inspect it after [`Batch::call`]
    /// returns.
    pub async fn add(&self, request: Req) -> Arc<AsyncResult<Req, Resp>> {
        let entry = self.pool.take(request).await;
        self.entries.lock().await.push(BatchEntry { entry: entry.clone() });
        entry
    }

    /// Snapshots and clears the accumulated entries, submits each (retrying
    /// on overflow), then waits on all of them bounded by one shared
    /// deadline. Entries still pending when the deadline elapses are
    /// canceled and marked with a timeout error.
    pub async fn call(&self, timeout: std::time::Duration) -> Vec<Result<Resp, ClientError>> {
        let batch: Vec<BatchEntry<Req, Resp>> = {
            let mut guard = self.entries.lock().await;
            std::mem::take(&mut *guard)
        };

        for item in &batch {
            let mut attempts = 0;
            loop {
                let result = self
                    .queue
                    .submit(item.entry.clone(), false, true, Some(&self.pool))
                    .await;
                match result {
                    Ok(()) => break,
                    Err(e) if e.is_overflow() && attempts < OVERFLOW_RETRY_ATTEMPTS => {
                        attempts += 1;
                        tokio::time::sleep(OVERFLOW_RETRY_SPACING).await;
                    }
                    Err(_) => break,
                }
            }
        }

        let deadline = Instant::now() + timeout;

        for item in &batch {
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::select! {
                _ = item.entry.completion.wait() => {}
                _ = tokio::time::sleep(remaining) => {
                    item.entry.canceled.store(true, Ordering::Release);
                    item.entry.complete_err(ClientError::timeout("batch entry timed out"));
                }
            }
        }

        let results: Vec<Result<Resp, ClientError>> =
            batch.iter().map(|item| item.entry.take()).collect();

        for item in batch {
            self.pool.release(item.entry).await;
        }

        results
    }
}
