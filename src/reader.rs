// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The reader loop: decodes responses and delivers them to the matching
//! pending entry — generalized from the teacher's ITT-keyed response
//! delivery in `client/client.rs`, with decoder panics caught the way the
//! distilled spec's "recover-equivalent guard" describes.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio_util::sync::CancellationToken;

use crate::{error::ClientError, pending::PendingTable, stats::ConnStats, wire::Decoder};

pub struct ReaderContext<Req, Resp> {
    pub pending: Arc<PendingTable<Req, Resp>>,
    pub stats: Arc<dyn ConnStats>,
    pub global_pending: Arc<AtomicUsize>,
    pub stop: CancellationToken,
}

/// Decodes one frame in a dedicated task so a panic inside a user-supplied
/// [`Decoder`] impl (e.g. on a malformed length prefix) surfaces as a
/// `JoinError` instead of tearing down the whole process — tokio's own
/// panic-isolation boundary standing in for `catch_unwind`, since the
/// `Decoder` trait uses native async-fn-in-trait and so cannot be wrapped in
/// `std::panic::AssertUnwindSafe` directly (its future is not `UnwindSafe`).
async fn decode_guarded<Resp, D>(mut decoder: D) -> (D, std::io::Result<crate::wire::WireResponse<Resp>>)
where
    Resp: Send + 'static,
    D: Decoder<Resp> + Send + 'static,
{
    let result = decoder.decode().await;
    (decoder, result)
}

pub async fn run<Req, Resp, D>(decoder: D, ctx: ReaderContext<Req, Resp>) -> Result<(), ClientError>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    D: Decoder<Resp> + Send + 'static,
{
    let ReaderContext { pending, stats, global_pending, stop } = ctx;
    let mut decoder = decoder;

    loop {
        let mut task = tokio::spawn(decode_guarded(decoder));
        let join = tokio::select! {
            biased;
            _ = stop.cancelled() => {
                task.abort();
                return Ok(());
            }
            res = &mut task => res,
        };

        let (returned_decoder, decode_result) = match join {
            Ok(pair) => pair,
            Err(e) if e.is_panic() => {
                return Err(ClientError::connection("decoder panicked"));
            }
            Err(_) => return Ok(()),
        };
        decoder = returned_decoder;

        let response = match decode_result {
            Ok(resp) => resp,
            Err(e) => {
                return Err(ClientError::connection(format!("decode failed: {e}")));
            }
        };

        let Some(entry) = pending.remove(response.id) else {
            return Err(ClientError::connection(format!(
                "received response for unknown id {}",
                response.id
            )));
        };
        global_pending.fetch_sub(1, Ordering::AcqRel);

        stats.incr_rpc_calls();
        stats.record_rpc_time(entry.submit_time.elapsed());

        match response.error {
            Some(msg) => entry.complete_err(ClientError::server(msg)),
            None => match response.response {
                Some(resp) => entry.complete_ok(resp),
                None => entry.complete_err(ClientError::server("empty response and no error")),
            },
        }
    }
}
