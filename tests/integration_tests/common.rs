use std::{
    io::{Read, Write},
    sync::Arc,
};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use rpcmux_client::{
    client::Client,
    codec::JsonCodec,
    config::Config,
    transport::{BoxFuture, Dial, DialHandle, Identity},
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Req(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resp(pub String);

#[derive(Serialize, Deserialize)]
struct WireReq {
    id: u64,
    request: Req,
}

#[derive(Serialize, Deserialize)]
struct WireResp {
    id: u64,
    response: Option<Resp>,
    error: Option<String>,
}

async fn read_frame(stream: &mut DuplexStream) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

async fn write_frame(stream: &mut DuplexStream, payload: &[u8]) -> std::io::Result<()> {
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    stream.write_all(payload).await?;
    Ok(())
}

fn gzip(payload: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::with_capacity(payload.len()), Compression::fast());
    enc.write_all(payload).expect("in-memory gzip write cannot fail");
    enc.finish().expect("in-memory gzip finish cannot fail")
}

fn gunzip(payload: &[u8]) -> Vec<u8> {
    let mut dec = GzDecoder::new(payload);
    let mut out = Vec::new();
    dec.read_to_end(&mut out).expect("well-formed gzip frame");
    out
}

/// Drives the "server" side of a loopback duplex pipe: reads the one-byte
/// handshake (which also selects gzip framing, mirroring the real codec's
/// compression negotiation), then decodes each request frame and calls
/// `respond` to decide what (if anything) to send back.
async fn run_fake_server<F>(mut server: DuplexStream, mut respond: F)
where
    F: FnMut(u64, Req) -> Option<Result<Resp, String>> + Send + 'static,
{
    let mut handshake = [0u8; 1];
    if server.read_exact(&mut handshake).await.is_err() {
        return;
    }
    let compression = handshake[0] == 1;

    loop {
        let frame = match read_frame(&mut server).await {
            Ok(f) => f,
            Err(_) => return,
        };
        let payload = if compression { gunzip(&frame) } else { frame };
        let Ok(req): Result<WireReq, _> = serde_json::from_slice(&payload) else { return };

        if req.id == 0 {
            // fire-and-forget: no response expected.
            continue;
        }

        match respond(req.id, req.request) {
            Some(Ok(resp)) => {
                let wire = WireResp { id: req.id, response: Some(resp), error: None };
                let Ok(payload) = serde_json::to_vec(&wire) else { return };
                let framed = if compression { gzip(&payload) } else { payload };
                if write_frame(&mut server, &framed).await.is_err() {
                    return;
                }
            }
            Some(Err(msg)) => {
                let wire = WireResp { id: req.id, response: None, error: Some(msg) };
                let Ok(payload) = serde_json::to_vec(&wire) else { return };
                let framed = if compression { gzip(&payload) } else { payload };
                if write_frame(&mut server, &framed).await.is_err() {
                    return;
                }
            }
            None => {} // deliberately withhold a response (timeout scenarios)
        }
    }
}

/// A [`Dial`] that, each time it is invoked, creates a fresh in-memory
/// duplex pipe and spawns `respond` driving the server side of it.
pub struct LoopbackDialer<F> {
    respond: Arc<F>,
}

impl<F> LoopbackDialer<F>
where
    F: Fn(u64, Req) -> Option<Result<Resp, String>> + Send + Sync + 'static,
{
    pub fn new(respond: F) -> DialHandle<DuplexStream> {
        Arc::new(Self { respond: Arc::new(respond) })
    }
}

impl<F> Dial<DuplexStream> for LoopbackDialer<F>
where
    F: Fn(u64, Req) -> Option<Result<Resp, String>> + Send + Sync + 'static,
{
    fn dial(&self, _address: &str) -> BoxFuture<'_, std::io::Result<DuplexStream>> {
        let respond = self.respond.clone();
        Box::pin(async move {
            let (client_side, server_side) = tokio::io::duplex(64 * 1024);
            tokio::spawn(run_fake_server(server_side, move |id, req| respond(id, req)));
            Ok(client_side)
        })
    }
}

/// Echoes every request back as `Resp(request.0)`.
pub fn echo_client(compression: bool) -> Client<Req, Resp, DuplexStream, JsonCodec> {
    let dial = LoopbackDialer::new(|_id, req| Some(Ok(Resp(req.0))));
    build_client(dial, compression)
}

/// Never responds to anything — useful for timeout scenarios.
pub fn silent_client(compression: bool) -> Client<Req, Resp, DuplexStream, JsonCodec> {
    let dial = LoopbackDialer::new(|_id, _req| None);
    build_client(dial, compression)
}

/// Responds only to the first message id it ever sees; everything else is
/// left hanging, for partial-batch-timeout scenarios.
pub fn first_responder_client(compression: bool) -> Client<Req, Resp, DuplexStream, JsonCodec> {
    let first_seen = std::sync::Mutex::new(None::<u64>);
    let dial = LoopbackDialer::new(move |id, req| {
        let mut guard = first_seen.lock().unwrap();
        let target = *guard.get_or_insert(id);
        if id == target { Some(Ok(Resp(req.0))) } else { None }
    });
    build_client(dial, compression)
}

/// Accepts the handshake byte, then immediately closes the connection
/// without reading or responding to anything — for connection-loss
/// scenarios.
pub fn dropping_client(compression: bool) -> Client<Req, Resp, DuplexStream, JsonCodec> {
    let dial: DialHandle<DuplexStream> = Arc::new(DropDialer);
    build_client(dial, compression)
}

struct DropDialer;

impl Dial<DuplexStream> for DropDialer {
    fn dial(&self, _address: &str) -> BoxFuture<'_, std::io::Result<DuplexStream>> {
        Box::pin(async move {
            let (client_side, mut server_side) = tokio::io::duplex(64 * 1024);
            tokio::spawn(async move {
                let mut handshake = [0u8; 1];
                let _ = server_side.read_exact(&mut handshake).await;
                drop(server_side);
            });
            Ok(client_side)
        })
    }
}

fn build_client(
    dial: DialHandle<DuplexStream>,
    compression: bool,
) -> Client<Req, Resp, DuplexStream, JsonCodec> {
    let cfg = Config::new("loopback")
        .with_dial_and_codec(dial, Arc::new(Identity), JsonCodec)
        .with_compression(compression)
        .with_pending_requests(8);
    Client::new(cfg).expect("valid config")
}
