// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The structured error shape that crosses the public API boundary.
//!
//! Internal plumbing (dial retries, task teardown bookkeeping) uses
//! [`anyhow::Error`]; anything delivered to a caller through
//! [`crate::pending::AsyncResult::error`] or returned from a `Client`
//! operation is always a [`ClientError`].

use std::fmt;

use thiserror::Error;

/// A tagged error with independent boolean flags.
///
/// Exactly one flag is normally set; the flags exist (rather than a plain
/// enum) so callers can match on the dimension they care about without
/// exhaustively listing every variant this crate might add later.
#[derive(Error, Debug, Clone)]
pub struct ClientError {
    message: String,
    timeout: bool,
    connection: bool,
    server: bool,
    overflow: bool,
    canceled: bool,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl ClientError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
            connection: false,
            server: false,
            overflow: false,
            canceled: false,
        }
    }

    /// Waiter deadline elapsed before a response arrived.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self { timeout: true, ..Self::new(message) }
    }

    /// Dial, handshake, encode/decode, or stream-close failure.
    pub fn connection(message: impl Into<String>) -> Self {
        Self { connection: true, ..Self::new(message) }
    }

    /// `WireResponse.error` was non-empty.
    pub fn server(message: impl Into<String>) -> Self {
        Self { server: true, ..Self::new(message) }
    }

    /// Submission queue was full with no substitutable entry.
    pub fn overflow(message: impl Into<String>) -> Self {
        Self { overflow: true, ..Self::new(message) }
    }

    /// `cancel()` was observed before the writer encoded the request.
    pub fn canceled(message: impl Into<String>) -> Self {
        Self { canceled: true, ..Self::new(message) }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout
    }

    pub fn is_connection(&self) -> bool {
        self.connection
    }

    pub fn is_server(&self) -> bool {
        self.server
    }

    pub fn is_overflow(&self) -> bool {
        self.overflow
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }
}
