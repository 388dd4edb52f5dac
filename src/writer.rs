// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The writer loop: pulls submissions off the shared queue, assigns message
//! ids, registers them in the per-connection pending table, and encodes them
//! — generalized from the teacher's per-ITT `sending`/`reciver` registration
//! in `client/client.rs` into id assignment against one [`PendingTable`]
//! instead of two parallel maps.

use std::{
    sync::{Arc, atomic::{AtomicUsize, Ordering}},
    time::Duration,
};

use async_channel::Receiver;
use tokio_util::sync::CancellationToken;

use crate::{
    error::ClientError,
    pending::PendingTable,
    pool::AsyncResultPool,
    queue::Submission,
    stats::ConnStats,
    wire::{Encoder, WireRequest},
};

/// Caps how many responses may go unaccounted for before the writer
/// concludes the server (or the decoder) has stopped keeping up and tears
/// the connection down rather than growing the pending table without bound.
fn guardrail_limit(pending_requests: usize) -> usize {
    pending_requests.saturating_mul(10)
}

pub struct WriterContext<Req, Resp> {
    pub rx: Receiver<Submission<Req, Resp>>,
    pub pending: Arc<PendingTable<Req, Resp>>,
    pub pool: Arc<AsyncResultPool<Req, Resp>>,
    pub stats: Arc<dyn ConnStats>,
    pub flush_delay: Option<Duration>,
    pub pending_requests_limit: usize,
    pub stop: CancellationToken,
    pub global_pending: Arc<AtomicUsize>,
}

pub async fn run<Req, Resp, E>(
    mut encoder: E,
    ctx: WriterContext<Req, Resp>,
) -> Result<(), ClientError>
where
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
    E: Encoder<Req>,
{
    let WriterContext {
        rx,
        pending,
        pool,
        stats,
        flush_delay,
        pending_requests_limit,
        stop,
        global_pending,
    } = ctx;

    let mut next_id: u64 = 1;
    let mut flush_armed = false;
    let limit = guardrail_limit(pending_requests_limit);

    loop {
        let submission = match rx.try_recv() {
            Ok(s) => Some(s),
            Err(_) => {
                tokio::task::yield_now().await;
                let sleep = match flush_delay {
                    Some(d) if flush_armed => Some(tokio::time::sleep(d)),
                    _ => None,
                };
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => return Ok(()),
                    recv = rx.recv() => match recv {
                        Ok(s) => Some(s),
                        Err(_) => return Ok(()),
                    },
                    _ = async {
                        match sleep {
                            Some(s) => s.await,
                            None => std::future::pending::<()>().await,
                        }
                    }, if flush_armed && flush_delay.is_some() => {
                        if let Err(e) = encoder.flush().await {
                            return Err(ClientError::connection(format!("flush failed: {e}")));
                        }
                        flush_armed = false;
                        None
                    }
                }
            }
        };

        let Some(Submission { entry, skip_response, use_pool }) = submission else {
            continue;
        };

        if entry.is_canceled() {
            if !skip_response {
                entry.complete_err(ClientError::canceled("canceled before send"));
            } else if use_pool {
                pool.release(entry).await;
            }
            continue;
        }

        let id = if skip_response {
            0
        } else {
            let mut candidate = next_id;
            if candidate == 0 {
                candidate = 1;
            }
            // Linear probe past any id currently occupying the table; with
            // a healthy server and plenty of id space this loop runs zero
            // iterations almost always.
            while pending.contains(candidate) {
                candidate = candidate.wrapping_add(1);
                if candidate == 0 {
                    candidate = 1;
                }
            }
            next_id = candidate.wrapping_add(1);
            if next_id == 0 {
                next_id = 1;
            }
            candidate
        };

        if !skip_response {
            pending.insert(id, entry.clone());
            global_pending.fetch_add(1, Ordering::AcqRel);
            if pending.len() > limit {
                return Err(ClientError::connection(format!(
                    "server didn't return {limit} responses yet"
                )));
            }
        } else {
            stats.incr_rpc_calls();
        }

        let request = WireRequest { id, request: clone_request_for_wire(&entry) };
        let encode_result = encoder.encode(&request).await;

        if skip_response && use_pool {
            pool.release(entry).await;
        }

        if let Err(e) = encode_result {
            return Err(ClientError::connection(format!("encode failed: {e}")));
        }

        if flush_delay.is_some() {
            flush_armed = true;
        } else if let Err(e) = encoder.flush().await {
            return Err(ClientError::connection(format!("flush failed: {e}")));
        }
    }
}

fn clone_request_for_wire<Req, Resp>(entry: &crate::pending::AsyncResult<Req, Resp>) -> Req
where
    Req: Clone,
{
    entry.request.clone()
}
