//! Billboard audience analytics: turns detection and store-visit events into
//! the summary, daily history and ranking of one reporting period.
//!
//! Everything below `report::generate_report` is pure computation over
//! immutable event slices; only the event store performs I/O.

pub mod daily;
pub mod metrics;
pub mod period;
pub mod ranking;
pub mod report;
pub mod types;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    #[error("Inconsistent aggregation: expected {expected} daily rows, built {actual}.")]
    InconsistentAggregation { expected: i64, actual: usize },
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<AnalyticsError> for AppError {
    fn from(error: AnalyticsError) -> Self {
        match error {
            AnalyticsError::InvalidRange(message) => {
                AppError::BadRequest(format!("Invalid range: {message}"))
            }
            AnalyticsError::InconsistentAggregation { .. } => {
                AppError::Internal("Analytics aggregation failed.".to_string())
            }
            AnalyticsError::Store(inner) => inner,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub customer_visit_threshold: u32,
    /// Visits scored below this are treated as unreliable matches and dropped.
    pub min_visit_confidence: f64,
    pub ranking_limit: Option<usize>,
}

impl ReportOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            customer_visit_threshold: config.customer_visit_threshold.max(1),
            min_visit_confidence: config.min_visit_confidence,
            ranking_limit: None,
        }
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            customer_visit_threshold: 2,
            min_visit_confidence: 0.0,
            ranking_limit: None,
        }
    }
}
