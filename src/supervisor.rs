// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One supervisor task per connection: dial, handshake, spawn writer/reader,
//! wait for either to end (or the stop-signal), drain the pending table,
//! reconnect. Generalized from the teacher's `ClientConnection::connect`
//! dial-then-spawn-read-loop pattern in `client/client.rs`.

use std::{
    sync::{Arc, atomic::AtomicUsize},
    time::Duration,
};

use async_channel::Receiver;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::ClientError,
    pending::PendingTable,
    pool::AsyncResultPool,
    queue::Submission,
    reader,
    stats::ConnStats,
    transport::Stream,
    wire::Codec,
    writer,
};

const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

fn jittered_backoff() -> Duration {
    use rand::Rng;
    let jitter_ms: u64 = rand::rng().random_range(0..250);
    RECONNECT_BASE_DELAY + Duration::from_millis(jitter_ms)
}

/// Runs until `stop` is cancelled. Dials, hands the stream to
/// [`handle_connection`], and on any connection-ending error backs off and
/// redials.
pub async fn run<Req, Resp, S, C>(
    cfg: Arc<Config<Req, Resp, S, C>>,
    rx: Receiver<Submission<Req, Resp>>,
    pool: Arc<AsyncResultPool<Req, Resp>>,
    global_pending: Arc<AtomicUsize>,
    stop: CancellationToken,
) where
    Req: Clone + Send + Sync + 'static,
    Resp: Send + Sync + 'static,
    S: Stream,
    C: Codec<Req, Resp, S>,
{
    loop {
        if stop.is_cancelled() {
            return;
        }

        let dial_fut = cfg.dial.dial(&cfg.address);
        let stream = tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            result = dial_fut => result,
        };

        let stream = match stream {
            Ok(s) => {
                cfg.stats.incr_dial_calls();
                s
            }
            Err(e) => {
                cfg.stats.incr_dial_errors();
                (cfg.log_error)(&format!("dial {} failed: {e}", cfg.address));
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => return,
                    _ = tokio::time::sleep(jittered_backoff()) => continue,
                }
            }
        };

        handle_connection(
            cfg.clone(),
            stream,
            rx.clone(),
            pool.clone(),
            global_pending.clone(),
            stop.clone(),
        )
        .await;

        if stop.is_cancelled() {
            return;
        }
    }
}

async fn handle_connection<Req, Resp, S, C>(
    cfg: Arc<Config<Req, Resp, S, C>>,
    stream: S,
    rx: Receiver<Submission<Req, Resp>>,
    pool: Arc<AsyncResultPool<Req, Resp>>,
    global_pending: Arc<AtomicUsize>,
    stop: CancellationToken,
) where
    Req: Clone + Send + Sync + 'static,
    Resp: Send + Sync + 'static,
    S: Stream,
    C: Codec<Req, Resp, S>,
{
    let stream = match cfg.on_connect.on_connect(&cfg.address, stream).await {
        Ok(s) => s,
        Err(e) => {
            (cfg.log_error)(&format!("on_connect failed: {e}"));
            return;
        }
    };

    let stream = match handshake(stream, cfg.compression).await {
        Ok(s) => s,
        Err(e) => {
            (cfg.log_error)(&format!("handshake write failed: {e}"));
            return;
        }
    };

    let (encoder, decoder) =
        cfg.codec
            .build(stream, cfg.send_buffer_size, cfg.recv_buffer_size, cfg.compression);

    let pending: Arc<PendingTable<Req, Resp>> = Arc::new(PendingTable::new());
    let per_conn_stop = CancellationToken::new();

    let writer_ctx = writer::WriterContext {
        rx,
        pending: pending.clone(),
        pool: pool.clone(),
        stats: cfg.stats.clone(),
        flush_delay: cfg.flush_delay,
        pending_requests_limit: cfg.pending_requests,
        stop: per_conn_stop.clone(),
        global_pending: global_pending.clone(),
    };
    let reader_ctx = reader::ReaderContext {
        pending: pending.clone(),
        stats: cfg.stats.clone(),
        global_pending: global_pending.clone(),
        stop: per_conn_stop.clone(),
    };

    let mut writer_handle = tokio::spawn(writer::run(encoder, writer_ctx));
    let mut reader_handle = tokio::spawn(reader::run(decoder, reader_ctx));

    // Whichever of these three finishes first only tells us it's time to
    // tear down — it does not mean the other sub-task has stopped touching
    // `pending`. `per_conn_stop` is cancelled right after, then both handles
    // are joined below before the table is drained, so no submission can
    // land in `pending` after the drain snapshot is taken.
    let first = tokio::select! {
        biased;
        _ = stop.cancelled() => Ended::Stopped,
        res = &mut writer_handle => Ended::Writer(res),
        res = &mut reader_handle => Ended::Reader(res),
    };

    per_conn_stop.cancel();

    let conn_err = match first {
        Ended::Stopped => {
            let (w, r) = tokio::join!(writer_handle, reader_handle);
            join_to_err(w).or_else(|| join_to_err(r))
        }
        Ended::Writer(res) => {
            let reader_res = reader_handle.await;
            join_to_err(res).or_else(|| join_to_err(reader_res))
        }
        Ended::Reader(res) => {
            let writer_res = writer_handle.await;
            join_to_err(res).or_else(|| join_to_err(writer_res))
        }
    };

    let wrapped = conn_err.unwrap_or_else(|| ClientError::connection("connection closed"));
    let drained = pending.drain_with_error(wrapped);
    global_pending.fetch_sub(drained, std::sync::atomic::Ordering::AcqRel);
}

type JoinRes = Result<Result<(), ClientError>, tokio::task::JoinError>;

/// Which sub-task (if either) ended the race in [`handle_connection`]'s
/// select — tracked so the loser can still be joined afterward instead of
/// dropped.
enum Ended {
    Stopped,
    Writer(JoinRes),
    Reader(JoinRes),
}

fn join_to_err(
    res: Result<Result<(), ClientError>, tokio::task::JoinError>,
) -> Option<ClientError> {
    match res {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(e) if e.is_panic() => Some(ClientError::connection("connection task panicked")),
        Err(_) => Some(ClientError::connection("connection task cancelled")),
    }
}

/// Writes the single handshake byte (`1` if compression is negotiated,
/// `0` otherwise) before handing the stream to the codec.
async fn handshake<S: Stream>(mut stream: S, compression: bool) -> std::io::Result<S> {
    let byte = if compression { 1u8 } else { 0u8 };
    stream.write_u8(byte).await?;
    Ok(stream)
}
