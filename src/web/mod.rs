//! Web layer
//!
//! HTTP handlers for:
//! - HTML pages (home)
//! - Metrics (Prometheus)

mod metrics;
mod pages;

pub use metrics::metrics_router;
pub use pages::{load_templates, pages_router};
