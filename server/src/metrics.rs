//! # Prometheus Metrics
//!
//! Operational metrics for the paywall. Scraped by Prometheus at `/metrics`
//! on the dedicated metrics port, never on the public API port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] under
//! the `quill` namespace so they do not collide with any default global
//! registry consumers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use quill_engine::content::AccessBasis;
use quill_engine::ErrorKind;

/// Holds all Prometheus metric handles for the server.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct QuillMetrics {
    registry: Registry,
    /// Sign-in nonces handed out.
    pub challenges_issued_total: IntCounter,
    /// Successful wallet sign-ins.
    pub sessions_issued_total: IntCounter,
    /// Payments verified and recorded.
    pub payments_verified_total: IntCounter,
    /// Payment verifications that failed, by error kind.
    pub payments_rejected_total: IntCounterVec,
    pub share_grants_issued_total: IntCounter,
    /// Single-item reads, by the gate rule that applied.
    pub content_reads_total: IntCounterVec,
    /// Wall time of payment verification, rail lookup included.
    pub payment_verification_seconds: Histogram,
}

impl QuillMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("quill".into()), None)?;

        let challenges_issued_total =
            IntCounter::new("challenges_issued_total", "Sign-in nonces issued")?;
        registry.register(Box::new(challenges_issued_total.clone()))?;

        let sessions_issued_total =
            IntCounter::new("sessions_issued_total", "Successful wallet sign-ins")?;
        registry.register(Box::new(sessions_issued_total.clone()))?;

        let payments_verified_total = IntCounter::new(
            "payments_verified_total",
            "Payments verified on the rail and recorded",
        )?;
        registry.register(Box::new(payments_verified_total.clone()))?;

        let payments_rejected_total = IntCounterVec::new(
            Opts::new(
                "payments_rejected_total",
                "Payment verifications that failed, by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(payments_rejected_total.clone()))?;

        let share_grants_issued_total =
            IntCounter::new("share_grants_issued_total", "Sharable links issued")?;
        registry.register(Box::new(share_grants_issued_total.clone()))?;

        let content_reads_total = IntCounterVec::new(
            Opts::new(
                "content_reads_total",
                "Content item reads, by the access rule that applied",
            ),
            &["access"],
        )?;
        registry.register(Box::new(content_reads_total.clone()))?;

        let payment_verification_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "payment_verification_seconds",
                "Payment verification latency in seconds, rail lookup included",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(payment_verification_seconds.clone()))?;

        Ok(Self {
            registry,
            challenges_issued_total,
            sessions_issued_total,
            payments_verified_total,
            payments_rejected_total,
            share_grants_issued_total,
            content_reads_total,
            payment_verification_seconds,
        })
    }

    pub fn record_rejection(&self, kind: ErrorKind) {
        self.payments_rejected_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn record_read(&self, access: AccessBasis) {
        self.content_reads_total
            .with_label_values(&[access.as_str()])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<QuillMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_namespaced() {
        let metrics = QuillMetrics::new().unwrap();
        metrics.payments_verified_total.inc();
        metrics.record_rejection(ErrorKind::Validation);
        metrics.record_read(AccessBasis::Preview);

        let text = metrics.encode().unwrap();
        assert!(text.contains("quill_payments_verified_total 1"));
        assert!(text.contains("quill_payments_rejected_total{kind=\"ValidationError\"} 1"));
        assert!(text.contains("quill_content_reads_total{access=\"preview\"} 1"));
    }

    #[test]
    fn registries_are_independent() {
        let a = QuillMetrics::new().unwrap();
        let b = QuillMetrics::new().unwrap();
        a.sessions_issued_total.inc();
        assert_eq!(b.sessions_issued_total.get(), 0);
    }
}
