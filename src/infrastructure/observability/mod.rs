//! Push-based observability: outbound data only, no HTTP server. Metrics
//! are logged as structured JSON / Prometheus text on an interval (spec §2
//! ambient stack, teacher's `infrastructure/observability/` pattern).

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
