// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The public facade: `start`/`stop` lifecycle plus `call`/`call_with_timeout`/
//! `send`/`call_async`/`new_batch`, per SPEC_FULL.md §4.1. The
//! `Mutex<Option<Running>>` start/stop state machine is grounded in the
//! teacher's `OnceCell`-guarded session-pool startup in
//! `client/pool_sessions.rs`.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    batch::Batch,
    config::{self, Config},
    error::ClientError,
    pending::AsyncResult,
    pool::AsyncResultPool,
    queue::SubmitQueue,
    supervisor,
    transport::Stream,
    wire::Codec,
};

struct Running {
    stop: CancellationToken,
    supervisors: Vec<tokio::task::JoinHandle<()>>,
}

/// A multiplexed, pipelined RPC client over `connection_count` connections
/// to a single address.
pub struct Client<Req, Resp, S, C>
where
    S: Stream,
    C: Codec<Req, Resp, S>,
{
    cfg: Arc<Config<Req, Resp, S, C>>,
    queue: SubmitQueue<Req, Resp>,
    pool: Arc<AsyncResultPool<Req, Resp>>,
    global_pending: Arc<AtomicUsize>,
    running: Mutex<Option<Running>>,
}

impl<Req, Resp, S, C> Client<Req, Resp, S, C>
where
    Req: Clone + Send + Sync + 'static,
    Resp: Send + Sync + 'static,
    S: Stream,
    C: Codec<Req, Resp, S>,
{
    pub fn new(cfg: Config<Req, Resp, S, C>) -> Result<Self, ClientError> {
        config::validate(&cfg).map_err(ClientError::connection)?;
        let queue = SubmitQueue::bounded(cfg.pending_requests);
        let pool = Arc::new(AsyncResultPool::default());
        Ok(Self {
            cfg: Arc::new(cfg),
            queue,
            pool,
            global_pending: Arc::new(AtomicUsize::new(0)),
            running: Mutex::new(None),
        })
    }

    /// Allocates the stop-signal and spawns `connection_count` supervisor
    /// tasks. Returns a connection error if already started.
    pub async fn start(&self) -> Result<(), ClientError> {
        let mut guard = self.running.lock().await;
        if guard.is_some() {
            return Err(ClientError::connection("client already started"));
        }

        let stop = CancellationToken::new();
        let mut supervisors = Vec::with_capacity(self.cfg.connection_count);
        for _ in 0..self.cfg.connection_count {
            let cfg = self.cfg.clone();
            let rx = self.queue.receiver();
            let pool = self.pool.clone();
            let global_pending = self.global_pending.clone();
            let stop = stop.clone();
            supervisors.push(tokio::spawn(async move {
                supervisor::run(cfg, rx, pool, global_pending, stop).await;
            }));
        }

        *guard = Some(Running { stop, supervisors });
        Ok(())
    }

    /// Cancels the stop-signal, joins every supervisor task, then drains
    /// whatever remains in the submission queue, failing each entry with a
    /// connection error.
    pub async fn stop(&self) -> Result<(), ClientError> {
        let mut guard = self.running.lock().await;
        let Some(running) = guard.take() else {
            return Err(ClientError::connection("client not started"));
        };

        running.stop.cancel();
        for handle in running.supervisors {
            let _ = handle.await;
        }

        self.queue.close();
        let rx = self.queue.receiver();
        while let Ok(submission) = rx.try_recv() {
            if !submission.skip_response {
                submission.entry.complete_err(ClientError::connection("client stopped"));
            } else if submission.use_pool {
                self.pool.release(submission.entry).await;
            }
        }

        Ok(())
    }

    /// Sum of every connection's pending-table size plus the queue length,
    /// read entirely off atomics — never locks.
    pub fn pending_requests_count(&self) -> usize {
        self.global_pending.load(Ordering::Acquire) + self.queue.len()
    }

    pub async fn call(&self, request: Req) -> Result<Resp, ClientError> {
        self.call_with_timeout(request, self.cfg.request_timeout).await
    }

    pub async fn call_with_timeout(
        &self,
        request: Req,
        timeout: std::time::Duration,
    ) -> Result<Resp, ClientError> {
        let entry = self.pool.take(request).await;
        self.queue.submit(entry.clone(), false, true, Some(&self.pool)).await?;

        tokio::select! {
            _ = entry.completion.wait() => {}
            _ = tokio::time::sleep(timeout) => {
                entry.canceled.store(true, Ordering::Release);
                entry.complete_err(ClientError::timeout("call timed out"));
            }
        }

        let result = entry.take();
        self.pool.release(entry).await;
        result
    }

    /// Fire-and-forget. Overflow without a substitutable victim is returned
    /// immediately as `ClientError{overflow:true}`.
    pub async fn send(&self, request: Req) -> Result<(), ClientError> {
        let entry = self.pool.take(request).await;
        self.queue.submit(entry, true, true, Some(&self.pool)).await
    }

    /// Submits without pool ownership and returns the shared handle. The
    /// caller owns cancellation and result extraction.
    pub async fn call_async(&self, request: Req) -> Result<Arc<AsyncResult<Req, Resp>>, ClientError> {
        let entry = Arc::new(AsyncResult::new(request));
        self.queue.submit(entry.clone(), false, false, None).await?;
        Ok(entry)
    }

    /// A fresh [`Batch`] sharing this client's submission queue and result
    /// pool.
    pub fn new_batch(&self) -> Batch<Req, Resp> {
        Batch::new(self.queue.clone(), self.pool.clone())
    }
}
