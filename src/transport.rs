// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The transport contract: `dial(address) -> stream` plus an optional
//! `on_connect` hook that may wrap the stream (TLS upgrade, auth handshake).
//!
//! The core never constructs a [`TcpStream`] itself outside of the bundled
//! convenience dialer; everything else goes through the trait objects
//! defined here, mirroring the teacher crate's own split between
//! `ClientConnection::connect` (concrete TCP) and the rest of the client
//! logic (transport-agnostic once it has an `OwnedReadHalf`/`OwnedWriteHalf`
//! pair).

use std::{io, net::SocketAddr, pin::Pin, sync::Arc};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

/// A boxed, `Send` future — this crate's hand-rolled stand-in for
/// `futures::future::BoxFuture`, kept dependency-free since it is only used
/// at a handful of trait-object boundaries.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Any bidirectional byte stream usable as a connection.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Stream for T {}

/// `dial(address) -> stream`, the sole transport-construction hook the core
/// calls into. Implemented as a trait rather than a bare closure type so it
/// can be boxed and shared across supervisor tasks via `Arc`.
pub trait Dial<S: Stream>: Send + Sync {
    fn dial(&self, address: &str) -> BoxFuture<'_, io::Result<S>>;
}

impl<S, F, Fut> Dial<S> for F
where
    S: Stream,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = io::Result<S>> + Send + 'static,
{
    fn dial(&self, address: &str) -> BoxFuture<'_, io::Result<S>> {
        Box::pin((self)(address.to_string()))
    }
}

/// Shared handle to a [`Dial`] implementation.
pub type DialHandle<S> = Arc<dyn Dial<S>>;

/// `(address, stream) -> stream'`, invoked once per successful dial before
/// the handshake byte is written. May wrap the stream (e.g. a TLS upgrade).
/// Returning an error aborts the connection attempt.
pub trait OnConnect<S: Stream>: Send + Sync {
    fn on_connect(&self, address: &str, stream: S) -> BoxFuture<'static, io::Result<S>>;
}

impl<S, F, Fut> OnConnect<S> for F
where
    S: Stream,
    F: Fn(String, S) -> Fut + Send + Sync,
    Fut: Future<Output = io::Result<S>> + Send + 'static,
{
    fn on_connect(&self, address: &str, stream: S) -> BoxFuture<'static, io::Result<S>> {
        Box::pin((self)(address.to_string(), stream))
    }
}

/// Identity `on_connect`: returns the stream unchanged. This is the default
/// wired up by [`crate::config::Config`] when no hook is configured.
pub struct Identity;

impl<S: Stream> OnConnect<S> for Identity {
    fn on_connect(&self, _address: &str, stream: S) -> BoxFuture<'static, io::Result<S>> {
        Box::pin(async move { Ok(stream) })
    }
}

/// Convenience dialer for plain TCP, parallel to the teacher's
/// `TcpStream::connect` call in `ClientConnection::connect`, including the
/// same `set_nodelay`/`set_linger` tuning.
pub fn tcp_dial() -> DialHandle<TcpStream> {
    Arc::new(|address: String| -> BoxFuture<'static, io::Result<TcpStream>> {
        Box::pin(async move {
            let addr: SocketAddr = address
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            stream.set_linger(None)?;
            Ok(stream)
        })
    })
}
