// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A multiplexed, pipelined RPC client core with a pluggable transport and
//! wire codec. See [`client::Client`] for the entry point.

pub mod batch;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod pending;
pub mod pool;
pub mod queue;
pub mod reader;
pub mod stats;
pub mod supervisor;
pub mod transport;
pub mod wire;
pub mod writer;

pub use client::Client;
pub use config::Config;
pub use error::ClientError;
