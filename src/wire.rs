// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire message shapes and the `Encoder`/`Decoder` trait boundary.
//!
//! The concrete transport and codec are external collaborators (see
//! [`crate::transport`] and [`crate::codec`] for the bundled defaults); this
//! module only fixes the shape every codec must speak.

use std::io;

use crate::transport::Stream;

/// Sent by the writer. `id == 0` means fire-and-forget: a conforming server
/// MUST NOT produce a response for it.
#[derive(Debug, Clone)]
pub struct WireRequest<Req> {
    pub id: u64,
    pub request: Req,
}

/// Decoded by the reader and correlated against the pending table by `id`.
#[derive(Debug, Clone)]
pub struct WireResponse<Resp> {
    pub id: u64,
    pub response: Option<Resp>,
    pub error: Option<String>,
}

/// Writes framed [`WireRequest`]s to a connection's write half.
///
/// `encode` must buffer rather than flush; the writer loop decides when to
/// call [`Encoder::flush`] according to `flush_delay` (see
/// [`crate::config::Config`]).
pub trait Encoder<Req>: Send {
    fn encode(
        &mut self,
        msg: &WireRequest<Req>,
    ) -> impl Future<Output = io::Result<()>> + Send;

    fn flush(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Reads framed [`WireResponse`]s from a connection's read half.
///
/// A `decode` call that hits EOF should return an `io::Error` of kind
/// `UnexpectedEof`; the reader loop treats any `Err` the same way (a fatal,
/// connection-ending error).
pub trait Decoder<Resp>: Send {
    fn decode(&mut self) -> impl Future<Output = io::Result<WireResponse<Resp>>> + Send;
}

/// Builds an [`Encoder`]/[`Decoder`] pair out of a freshly dialed stream.
///
/// Kept as a generic trait (implemented, not boxed) rather than
/// `Arc<dyn Codec<..>>` because `Encoder`/`Decoder` use native `async fn`
/// in trait, which is not `dyn`-safe; `Client` is generic over its `Codec`
/// the same way it is generic over `Req`/`Resp`/the stream type.
pub trait Codec<Req, Resp, S: Stream>: Send + Sync {
    type Enc: Encoder<Req> + Send + 'static;
    type Dec: Decoder<Resp> + Send + 'static;

    fn build(
        &self,
        stream: S,
        send_buffer_size: usize,
        recv_buffer_size: usize,
        compression: bool,
    ) -> (Self::Enc, Self::Dec);
}
