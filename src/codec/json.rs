// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A length-prefixed `serde_json` codec with optional gzip framing.
//!
//! Frame shape: a 4-byte big-endian length prefix followed by that many
//! bytes of payload (gzip-compressed JSON when compression is enabled,
//! plain JSON otherwise). This is a convenience default, not a protocol
//! mandated by the core — any `Encoder`/`Decoder` pair satisfying
//! [`crate::wire`] works.

use std::{
    io::{self, Read, Write},
    marker::PhantomData,
};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf, split};

use crate::{
    transport::Stream,
    wire::{Codec, Decoder, Encoder, WireRequest, WireResponse},
};

const LEN_PREFIX: usize = 4;

#[derive(serde::Serialize)]
struct OnWireRequest<'a, Req> {
    id: u64,
    request: &'a Req,
}

#[derive(serde::Deserialize)]
struct OnWireResponse<Resp> {
    id: u64,
    response: Option<Resp>,
    error: Option<String>,
}

fn compress(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::with_capacity(payload.len()), Compression::fast());
    enc.write_all(payload)?;
    enc.finish()
}

fn decompress(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut dec = GzDecoder::new(payload);
    let mut out = Vec::new();
    dec.read_to_end(&mut out)?;
    Ok(out)
}

/// Writer-side half of the bundled codec.
pub struct JsonEncoder<W, Req> {
    writer: W,
    buffer: Vec<u8>,
    send_buffer_size: usize,
    compression: bool,
    _req: PhantomData<fn(Req)>,
}

impl<W, Req> JsonEncoder<W, Req>
where
    W: AsyncWrite + Unpin + Send,
    Req: Serialize + Send,
{
    pub fn new(writer: W, send_buffer_size: usize, compression: bool) -> Self {
        Self {
            writer,
            buffer: Vec::with_capacity(send_buffer_size.min(64 * 1024)),
            send_buffer_size,
            compression,
            _req: PhantomData,
        }
    }

    async fn flush_buffer(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer).await?;
            self.buffer.clear();
        }
        Ok(())
    }
}

impl<W, Req> Encoder<Req> for JsonEncoder<W, Req>
where
    W: AsyncWrite + Unpin + Send,
    Req: Serialize + Send,
{
    async fn encode(&mut self, msg: &WireRequest<Req>) -> io::Result<()> {
        let on_wire = OnWireRequest { id: msg.id, request: &msg.request };
        let payload = serde_json::to_vec(&on_wire)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let framed = if self.compression { compress(&payload)? } else { payload };

        self.buffer
            .extend_from_slice(&(framed.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(&framed);

        if self.buffer.len() >= self.send_buffer_size {
            self.flush_buffer().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer().await?;
        self.writer.flush().await
    }
}

/// Reader-side half of the bundled codec.
pub struct JsonDecoder<R, Resp> {
    reader: R,
    recv_buffer_size: usize,
    compression: bool,
    _resp: PhantomData<fn() -> Resp>,
}

impl<R, Resp> JsonDecoder<R, Resp>
where
    R: AsyncRead + Unpin + Send,
    Resp: DeserializeOwned + Send,
{
    pub fn new(reader: R, recv_buffer_size: usize, compression: bool) -> Self {
        Self { reader, recv_buffer_size, compression, _resp: PhantomData }
    }
}

impl<R, Resp> Decoder<Resp> for JsonDecoder<R, Resp>
where
    R: AsyncRead + Unpin + Send,
    Resp: DeserializeOwned + Send,
{
    async fn decode(&mut self) -> io::Result<WireResponse<Resp>> {
        let mut len_buf = [0u8; LEN_PREFIX];
        self.reader.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > self.recv_buffer_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds recv_buffer_size {}", self.recv_buffer_size),
            ));
        }

        let mut framed = vec![0u8; len];
        self.reader.read_exact(&mut framed).await?;
        let payload = if self.compression { decompress(&framed)? } else { framed };

        let on_wire: OnWireResponse<Resp> = serde_json::from_slice(&payload)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(WireResponse { id: on_wire.id, response: on_wire.response, error: on_wire.error })
    }
}

/// Splits a stream with [`tokio::io::split`] and wires up a
/// [`JsonEncoder`]/[`JsonDecoder`] pair. The zero-sized handle registered on
/// [`crate::config::Config`] by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<Req, Resp, S> Codec<Req, Resp, S> for JsonCodec
where
    S: Stream,
    Req: Serialize + Send + 'static,
    Resp: DeserializeOwned + Send + 'static,
{
    type Enc = JsonEncoder<WriteHalf<S>, Req>;
    type Dec = JsonDecoder<ReadHalf<S>, Resp>;

    fn build(
        &self,
        stream: S,
        send_buffer_size: usize,
        recv_buffer_size: usize,
        compression: bool,
    ) -> (Self::Enc, Self::Dec) {
        let (r, w) = split(stream);
        (
            JsonEncoder::new(w, send_buffer_size, compression),
            JsonDecoder::new(r, recv_buffer_size, compression),
        )
    }
}
