// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Structured logging init, simplified from the teacher's
//! `cfg/logger.rs`: same `tracing-subscriber` JSON-layer-over-`EnvFilter`
//! shape and the same `tracing-appender::non_blocking` writer selection,
//! with the span-field-capture layer and `fastrace` bridging dropped (see
//! DESIGN.md) since this crate has no distributed-tracing surface to bridge
//! into.

use std::fmt::Debug;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FmtContext, FormatEvent, FormatFields, format::Writer, writer::BoxMakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
};

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
}

/// Logging knobs. `level` is an `EnvFilter` directive string (e.g. `"info"`,
/// `"rpcmux_client=debug,warn"`).
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub output: LogOutput,
    pub show_target: bool,
    pub show_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), output: LogOutput::Stderr, show_target: true, show_line: false }
    }
}

struct JsonFormatter {
    show_target: bool,
    show_line: bool,
}

#[derive(serde::Serialize)]
struct LogEntry {
    timestamp: String,
    level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Default)]
struct JsonVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn Debug) {
        self.fields.insert(field.name().to_string(), json!(format!("{value:?}")));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.fields.insert(field.name().to_string(), json!(value));
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level: event.metadata().level().to_string(),
            target: self.show_target.then(|| event.metadata().target().to_string()),
            line: self.show_line.then(|| event.metadata().line()).flatten(),
            fields: visitor.fields,
        };

        writeln!(writer, "{}", serde_json::to_string(&entry).map_err(|_| std::fmt::Error)?)
    }
}

/// Installs the global subscriber. Returns the [`WorkerGuard`] the caller
/// must keep alive for the process lifetime (dropping it stops the
/// non-blocking writer's flush thread).
pub fn init(cfg: &LogConfig) -> Result<WorkerGuard> {
    let (writer, guard) = match cfg.output {
        LogOutput::Stdout => {
            let (w, g) = tracing_appender::non_blocking(std::io::stdout());
            (BoxMakeWriter::new(w), g)
        }
        LogOutput::Stderr => {
            let (w, g) = tracing_appender::non_blocking(std::io::stderr());
            (BoxMakeWriter::new(w), g)
        }
    };

    let env_filter = EnvFilter::try_new(&cfg.level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .context("failed to parse log level")?;

    let json_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .event_format(JsonFormatter { show_target: cfg.show_target, show_line: cfg.show_line })
        .fmt_fields(fmt::format::JsonFields::default());

    let subscriber = Registry::default().with(env_filter).with(json_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set global default subscriber")?;

    Ok(guard)
}
