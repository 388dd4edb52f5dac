// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The bounded multi-producer multi-consumer submission queue and the
//! overflow-substitution policy described in SPEC_FULL.md §4.3.
//!
//! `async-channel` is used instead of `tokio::sync::mpsc` because the
//! receiving side must be cloned across `connection_count` writer loops —
//! `mpsc::Receiver` is not `Clone` — the same MPMC requirement the
//! `toy-rpc` client solves with `flume`.

use std::sync::Arc;

use async_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::{error::ClientError, pending::AsyncResult, pool::AsyncResultPool};

pub struct Submission<Req, Resp> {
    pub entry: Arc<AsyncResult<Req, Resp>>,
    pub skip_response: bool,
    pub use_pool: bool,
}

pub struct SubmitQueue<Req, Resp> {
    tx: Sender<Submission<Req, Resp>>,
    rx: Receiver<Submission<Req, Resp>>,
}

// Written by hand rather than `#[derive(Clone)]`: the derive macro would add
// a spurious `Req: Clone, Resp: Clone` bound even though the channel handles
// themselves are `Clone` regardless of the payload types.
impl<Req, Resp> Clone for SubmitQueue<Req, Resp> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), rx: self.rx.clone() }
    }
}

impl<Req, Resp> SubmitQueue<Req, Resp> {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        Self { tx, rx }
    }

    pub fn receiver(&self) -> Receiver<Submission<Req, Resp>> {
        self.rx.clone()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Implements SPEC_FULL.md §4.3. A fire-and-forget submission that
    /// finds the queue full never evicts anything — there is no waiter to
    /// benefit from the substitution — and fails immediately. A submission
    /// with a completion slot evicts the oldest queued entry (whatever it
    /// is) and retries once before giving up.
    pub async fn submit(
        &self,
        entry: Arc<AsyncResult<Req, Resp>>,
        skip_response: bool,
        use_pool: bool,
        pool: Option<&AsyncResultPool<Req, Resp>>,
    ) -> Result<(), ClientError> {
        let submission = Submission { entry: entry.clone(), skip_response, use_pool };
        match self.tx.try_send(submission) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(rejected)) if skip_response => {
                let err = ClientError::overflow("submission queue is full");
                if use_pool {
                    if let Some(pool) = pool {
                        pool.release(rejected.entry).await;
                    }
                }
                Err(err)
            }
            Err(TrySendError::Full(rejected)) => {
                self.evict_one(pool).await;
                match self.tx.try_send(rejected) {
                    Ok(()) => Ok(()),
                    Err(TrySendError::Full(rejected) | TrySendError::Closed(rejected)) => {
                        let err = ClientError::overflow("submission queue is full");
                        rejected.entry.complete_err(err.clone());
                        Err(err)
                    }
                }
            }
            Err(TrySendError::Closed(_)) => Err(ClientError::connection("submission queue closed")),
        }
    }

    /// Pops the oldest queued entry (if any) and fails it with `overflow`,
    /// making room for a newer submission per the substitution policy.
    async fn evict_one(&self, pool: Option<&AsyncResultPool<Req, Resp>>) {
        match self.rx.try_recv() {
            Ok(victim) => {
                if victim.skip_response {
                    // Fire-and-forget entries carry no waiter to notify;
                    // release the slot back to the pool instead of just
                    // dropping it, per SPEC_FULL.md §4.3.
                    if victim.use_pool {
                        if let Some(pool) = pool {
                            pool.release(victim.entry).await;
                        }
                    }
                } else {
                    let err = ClientError::overflow("evicted to make room for a newer request");
                    victim.entry.complete_err(err);
                }
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => {}
        }
    }

    pub fn close(&self) {
        self.tx.close();
    }
}
