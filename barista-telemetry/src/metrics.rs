//! Counters for ordering activity.
//!
//! Instruments are created against the global meter provider, which is a no-op
//! until [`crate::init_with_otlp`] installs one.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Meter};
use std::sync::OnceLock;

static METRICS: OnceLock<BaristaMetrics> = OnceLock::new();

/// Get or initialize the global metrics instance.
pub fn metrics() -> &'static BaristaMetrics {
    METRICS.get_or_init(|| BaristaMetrics::new(opentelemetry::global::meter("barista")))
}

pub struct BaristaMetrics {
    sessions: Counter<u64>,
    tool_calls: Counter<u64>,
    closes: Counter<u64>,
}

impl BaristaMetrics {
    pub fn new(meter: Meter) -> Self {
        let sessions = meter
            .u64_counter("barista_sessions_total")
            .with_description("Realtime sessions opened, by whether they resumed")
            .init();

        let tool_calls = meter
            .u64_counter("barista_tool_calls_total")
            .with_description("Tool calls answered, by tool and outcome")
            .init();

        let closes = meter
            .u64_counter("barista_session_closes_total")
            .with_description("Session closes, by close code")
            .init();

        Self { sessions, tool_calls, closes }
    }

    pub fn record_session_open(&self, resumed: bool) {
        self.sessions.add(1, &[KeyValue::new("resumed", resumed)]);
    }

    pub fn record_tool_call(&self, tool: &str, status: &str) {
        self.tool_calls.add(
            1,
            &[KeyValue::new("tool", tool.to_string()), KeyValue::new("status", status.to_string())],
        );
    }

    pub fn record_close(&self, code: u16) {
        self.closes.add(1, &[KeyValue::new("code", i64::from(code))]);
    }
}
