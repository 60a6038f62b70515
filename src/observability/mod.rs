//! # Observability
//!
//! Logging setup. Recovered secret failures are reported separately through
//! [`crate::secrets::DiagnosticSink`], whose default implementation logs here.

pub mod logging;

pub use logging::{env_filter, init_logging, log_settings_info};
