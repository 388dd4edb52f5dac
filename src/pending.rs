// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The in-flight request table. One [`PendingTable`] lives per connection,
//! keyed by the monotonic message id assigned at write time — the same role
//! the teacher's `sending`/`reciver` [`DashMap`]s play keyed by iSCSI ITT in
//! `client/client.rs`, collapsed here into a single map of a richer entry
//! type instead of two parallel maps of channel halves.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::ClientError;

/// A one-shot completion signal an awaiting caller can subscribe to before
/// the response (or error) is known to have arrived, with no race between
/// "check if it's already done" and "start waiting for it to become done".
#[derive(Debug, Default)]
pub struct Completion {
    notify: Notify,
    fired: AtomicBool,
}

impl Completion {
    pub fn new() -> Self {
        Self { notify: Notify::new(), fired: AtomicBool::new(false) }
    }

    /// Marks this completion as fired and wakes any current/future waiters.
    /// Idempotent: firing an already-fired completion is a no-op.
    pub fn fire(&self) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        self.notify.notify_waiters();
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Waits until fired. Safe to call concurrently with [`Completion::fire`]:
    /// if it already fired before this call, returns immediately.
    pub async fn wait(&self) {
        if self.is_fired() {
            return;
        }
        let notified = self.notify.notified();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}

/// One submitted request's shared state, reachable both from the caller
/// awaiting the reply and from the reader loop delivering it.
pub struct AsyncResult<Req, Resp> {
    pub request: Req,
    pub submit_time: Instant,
    pub response: std::sync::Mutex<Option<Resp>>,
    pub error: std::sync::Mutex<Option<ClientError>>,
    pub completion: Completion,
    pub canceled: AtomicBool,
}

impl<Req, Resp> AsyncResult<Req, Resp> {
    pub fn new(request: Req) -> Self {
        Self {
            request,
            submit_time: Instant::now(),
            response: std::sync::Mutex::new(None),
            error: std::sync::Mutex::new(None),
            completion: Completion::new(),
            canceled: AtomicBool::new(false),
        }
    }

    pub fn complete_ok(&self, resp: Resp) {
        if self.completion.is_fired() {
            return;
        }
        *self.response.lock().unwrap_or_else(|e| e.into_inner()) = Some(resp);
        self.completion.fire();
    }

    pub fn complete_err(&self, err: ClientError) {
        if self.completion.is_fired() {
            return;
        }
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
        self.completion.fire();
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
        self.complete_err(ClientError::canceled("request canceled"));
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Consumes the completed result. Does not panic if called before
    /// completion: both slots are still empty at that point, so it falls
    /// through to the `connection` sentinel error below. Callers should
    /// still `completion.wait()` first — this fallback exists so a caller
    /// that gets it wrong sees a normal `ClientError`, not a poisoned lock
    /// or a hang.
    pub fn take(&self) -> Result<Resp, ClientError> {
        if let Some(resp) = self.response.lock().unwrap_or_else(|e| e.into_inner()).take() {
            return Ok(resp);
        }
        if let Some(err) = self.error.lock().unwrap_or_else(|e| e.into_inner()).take() {
            return Err(err);
        }
        Err(ClientError::connection("result polled before completion"))
    }
}

/// Per-connection map of in-flight requests, keyed by message id.
///
/// Mirrors the teacher's ITT-keyed `DashMap` pair, collapsed to one map of
/// one entry type and an explicit length counter (`DashMap::len` walks all
/// shards, which the writer-loop backpressure check in
/// [`crate::writer`] calls on every submit).
pub struct PendingTable<Req, Resp> {
    inner: DashMap<u64, Arc<AsyncResult<Req, Resp>>>,
    len: AtomicUsize,
}

impl<Req, Resp> Default for PendingTable<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> PendingTable<Req, Resp> {
    pub fn new() -> Self {
        Self { inner: DashMap::new(), len: AtomicUsize::new(0) }
    }

    pub fn insert(&self, id: u64, entry: Arc<AsyncResult<Req, Resp>>) {
        if self.inner.insert(id, entry).is_none() {
            self.len.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.inner.contains_key(&id)
    }

    pub fn remove(&self, id: u64) -> Option<Arc<AsyncResult<Req, Resp>>> {
        let removed = self.inner.remove(&id).map(|(_, v)| v);
        if removed.is_some() {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails and removes every still-pending entry with `err`. Used on
    /// connection teardown and on `Client::stop` draining per SPEC_FULL.md.
    /// Returns how many entries were drained, so callers maintaining a
    /// lock-free aggregate counter across connections can adjust it.
    pub fn drain_with_error(&self, err: ClientError) -> usize {
        let ids: Vec<u64> = self.inner.iter().map(|e| *e.key()).collect();
        let mut drained = 0usize;
        for id in ids {
            if let Some((_, entry)) = self.inner.remove(&id) {
                self.len.fetch_sub(1, Ordering::AcqRel);
                entry.complete_err(err.clone());
                drained += 1;
            }
        }
        drained
    }
}
