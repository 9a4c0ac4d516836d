//! Persistent ring buffer of error and security log entries.
//!
//! [`RingBufferLayer`] plugs into a `tracing_subscriber` registry and copies
//! every `ERROR` event and every event with target [`SECURITY_TARGET`] into
//! the state store, so operators can review them after the process exits.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use crate::{Clock, Error, Result, StateStore};

/// Target used for security-relevant rejections.
pub const SECURITY_TARGET: &str = "security";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Security,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Security => "security",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp, seconds.
    pub time: i64,
    pub level: LogLevel,
    pub message: String,
    /// `0` when no user was attached to the event.
    pub user_id: u64,
    pub ip: String,
}

/// FIFO buffer of the most recent log entries, persisted in a [`StateStore`].
#[derive(Clone)]
pub struct LogRing {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl LogRing {
    pub const KEY: &'static str = "error_logs";
    pub const CAPACITY: usize = 20;

    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            capacity: Self::CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn push(&self, entry: LogEntry) -> Result<()> {
        self.store
            .append(Self::KEY, serde_json::to_value(entry)?, self.capacity)
    }

    pub fn record(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        user_id: Option<u64>,
        ip: Option<&str>,
    ) -> Result<()> {
        self.push(LogEntry {
            time: self.clock.now().timestamp(),
            level,
            message: message.into(),
            user_id: user_id.unwrap_or(0),
            ip: ip.unwrap_or("unknown").to_string(),
        })
    }

    /// Entries oldest first.
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        match self.store.get(Self::KEY)? {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| {
                    serde_json::from_value(item).map_err(|source| Error::Malformed {
                        key: Self::KEY.to_string(),
                        source,
                    })
                })
                .collect(),
            Some(_) => Ok(Vec::new()),
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(Self::KEY)
    }
}

impl fmt::Debug for LogRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRing")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Request identity carried by a span, e.g. `info_span!("request", user_id = 1, ip = "10.0.0.1")`.
#[derive(Clone, Debug, Default)]
struct RequestFields {
    user_id: Option<u64>,
    ip: Option<String>,
}

impl Visit for RequestFields {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "user_id" {
            self.user_id = Some(value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "user_id" {
            self.user_id = u64::try_from(value).ok();
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "ip" {
            self.ip = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "ip" {
            self.ip = Some(format!("{value:?}"));
        }
    }
}

#[derive(Default)]
struct EventFields {
    message: String,
    extra: Vec<String>,
    request: RequestFields,
}

impl EventFields {
    fn into_message(self) -> String {
        if self.extra.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.extra.join(" "))
        }
    }
}

impl Visit for EventFields {
    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "user_id" => self.request.record_u64(field, value),
            name => self.extra.push(format!("{name}={value}")),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match field.name() {
            "user_id" => self.request.record_i64(field, value),
            name => self.extra.push(format!("{name}={value}")),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "ip" => self.request.record_str(field, value),
            name => self.extra.push(format!("{name}={value}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "ip" => self.request.record_debug(field, value),
            name => self.extra.push(format!("{name}={value:?}")),
        }
    }
}

/// Layer that forwards error and security events into a [`LogRing`].
pub struct RingBufferLayer {
    ring: LogRing,
}

impl RingBufferLayer {
    pub fn new(ring: LogRing) -> Self {
        Self { ring }
    }
}

impl<S> Layer<S> for RingBufferLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = RequestFields::default();
        attrs.record(&mut fields);
        if fields.user_id.is_some() || fields.ip.is_some() {
            span.extensions_mut().insert(fields);
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<RequestFields>() {
            Some(fields) => values.record(fields),
            None => {
                let mut fields = RequestFields::default();
                values.record(&mut fields);
                extensions.insert(fields);
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = if metadata.target() == SECURITY_TARGET {
            LogLevel::Security
        } else if *metadata.level() == Level::ERROR {
            LogLevel::Error
        } else {
            return;
        };

        let mut fields = EventFields::default();
        event.record(&mut fields);

        // Fill identity from the innermost span that carries it.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if fields.request.user_id.is_some() && fields.request.ip.is_some() {
                    break;
                }
                if let Some(from_span) = span.extensions().get::<RequestFields>() {
                    if fields.request.user_id.is_none() {
                        fields.request.user_id = from_span.user_id;
                    }
                    if fields.request.ip.is_none() {
                        fields.request.ip.clone_from(&from_span.ip);
                    }
                }
            }
        }

        let user_id = fields.request.user_id;
        let ip = fields.request.ip.clone();
        // Emitting from inside a layer would recurse; a lost entry is dropped.
        let _ = self
            .ring
            .record(level, fields.into_message(), user_id, ip.as_deref());
    }
}

/// Install the global subscriber: formatted output filtered by `RUST_LOG`
/// (or `default_filter`), plus the unfiltered ring-buffer layer.
pub fn init(default_filter: &str, ring: LogRing) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt as tfmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(RingBufferLayer::new(ring))
        .with(
            tfmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
