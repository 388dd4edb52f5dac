// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection statistics counters. The core only increments named counters
//! through this trait; wiring them up to an actual metrics backend is left
//! to the embedder, exactly as the distilled spec treats stats as an
//! external collaborator.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

pub trait ConnStats: Send + Sync {
    fn incr_dial_calls(&self) {}

    fn incr_dial_errors(&self) {}

    fn incr_rpc_calls(&self) {}

    fn record_rpc_time(&self, _elapsed: Duration) {}
}

/// Default stats sink: does nothing. Used when `Config` is not given a
/// stats implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats;

impl ConnStats for NullStats {}

/// A minimal in-process reference implementation, handy for tests and
/// simple embedders that just want plain counters without pulling in a full
/// metrics crate.
#[derive(Debug, Default)]
pub struct AtomicStats {
    pub dial_calls: AtomicU64,
    pub dial_errors: AtomicU64,
    pub rpc_calls: AtomicU64,
    pub rpc_time_micros_total: AtomicU64,
}

impl ConnStats for AtomicStats {
    fn incr_dial_calls(&self) {
        self.dial_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn incr_dial_errors(&self) {
        self.dial_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn incr_rpc_calls(&self) {
        self.rpc_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rpc_time(&self, elapsed: Duration) {
        self.rpc_time_micros_total
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }
}
