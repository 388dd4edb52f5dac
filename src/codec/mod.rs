// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bundled reference codec.
//!
//! The wire codec is nominally an external collaborator (see
//! [`crate::wire`]): the core only depends on the `Encoder`/`Decoder`
//! traits. This module ships one concrete implementation anyway, the same
//! way the teacher crate ships concrete PDU encode/decode logic behind its
//! own `ToBytes`/`FromBytes` traits rather than leaving callers to write
//! their own framing from scratch.

pub mod json;

pub use json::{JsonCodec, JsonDecoder, JsonEncoder};
