use crate::types::MetricKind;

/// Errors raised while validating, decoding or authenticating a metric.
///
/// # Examples
///
/// ```
/// use yamon_common::error::MetricError;
///
/// let err = MetricError::InvalidCounter { name: "requests".into(), delta: -1 };
/// assert!(err.is_validation());
/// assert!(err.to_string().contains("requests"));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricError {
    #[error("counter {name} has negative delta {delta}")]
    InvalidCounter { name: String, delta: i64 },

    #[error("gauge {name} has non-finite value {value}")]
    InvalidGauge { name: String, value: f64 },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unknown metric type: {0}")]
    UnknownKind(String),

    #[error("metric {id} of type {kind} does not carry exactly one matching value")]
    KindMismatch { id: String, kind: MetricKind },

    #[error("invalid metric hash for {id}")]
    Integrity { id: String },
}

impl MetricError {
    /// True for errors the caller caused by sending a malformed or out-of-range metric.
    pub fn is_validation(&self) -> bool {
        !matches!(self, MetricError::Integrity { .. })
    }
}
