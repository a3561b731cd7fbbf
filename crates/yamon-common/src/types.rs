use crate::error::MetricError;
use serde::{Deserialize, Serialize};

/// Name of the counter the agent bumps once per collection cycle.
pub const POLL_COUNTER: &str = "PollCount";

/// Name of the synthetic gauge refreshed with a random value on every poll.
pub const RANDOM_GAUGE: &str = "RandomValue";

/// The two metric families understood by agent and server.
///
/// # Examples
///
/// ```
/// use yamon_common::types::MetricKind;
///
/// let kind: MetricKind = "gauge".parse().unwrap();
/// assert_eq!(kind, MetricKind::Gauge);
/// assert_eq!(MetricKind::Counter.to_string(), "counter");
/// assert!("histogram".parse::<MetricKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            _ => Err(MetricError::UnknownKind(s.to_string())),
        }
    }
}

/// Last-write-wins sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    pub name: String,
    pub value: f64,
}

impl Gauge {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Rejects NaN and infinities; any finite value, negative included, is accepted.
    pub fn validate(&self) -> Result<(), MetricError> {
        if self.value.is_finite() {
            Ok(())
        } else {
            Err(MetricError::InvalidGauge {
                name: self.name.clone(),
                value: self.value,
            })
        }
    }
}

/// Additively merged integer sample. `value` is the delta to merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub name: String,
    pub value: i64,
}

impl Counter {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Rejects negative deltas so a stored total can never shrink through a merge.
    pub fn validate(&self) -> Result<(), MetricError> {
        if self.value >= 0 {
            Ok(())
        } else {
            Err(MetricError::InvalidCounter {
                name: self.name.clone(),
                delta: self.value,
            })
        }
    }
}

/// A typed sample extracted from an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Counter(Counter),
    Gauge(Gauge),
}

impl Metric {
    pub fn name(&self) -> &str {
        match self {
            Metric::Counter(c) => &c.name,
            Metric::Gauge(g) => &g.name,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
        }
    }

    pub fn validate(&self) -> Result<(), MetricError> {
        match self {
            Metric::Counter(c) => c.validate(),
            Metric::Gauge(g) => g.validate(),
        }
    }
}

/// Wire and snapshot representation of one metric.
///
/// `id` and `type` are mandatory: a document missing either one, or carrying an
/// empty string for either, fails to decode. Exactly one of `delta`/`value` is
/// expected for updates; lookups send neither, which is why that rule is checked
/// by [`MetricEnvelope::to_metric`] rather than at decode time.
///
/// # Examples
///
/// ```
/// use yamon_common::types::{MetricEnvelope, MetricKind};
///
/// let env: MetricEnvelope =
///     serde_json::from_str(r#"{"id":"Alloc","type":"gauge","value":12.5}"#).unwrap();
/// assert_eq!(env.kind, MetricKind::Gauge);
/// assert_eq!(env.value, Some(12.5));
///
/// assert!(serde_json::from_str::<MetricEnvelope>(r#"{"type":"gauge"}"#).is_err());
/// assert!(serde_json::from_str::<MetricEnvelope>(r#"{"id":"x"}"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct MetricEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[derive(Deserialize)]
struct RawEnvelope {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    delta: Option<i64>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    hash: Option<String>,
}

impl TryFrom<RawEnvelope> for MetricEnvelope {
    type Error = MetricError;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .ok_or(MetricError::MissingField("id"))?;
        let kind = raw
            .kind
            .filter(|kind| !kind.is_empty())
            .ok_or(MetricError::MissingField("type"))?
            .parse()?;
        Ok(Self {
            id,
            kind,
            delta: raw.delta,
            value: raw.value,
            hash: raw.hash,
        })
    }
}

impl MetricEnvelope {
    /// A lookup request: id and type only.
    pub fn query(id: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            id: id.into(),
            kind,
            delta: None,
            value: None,
            hash: None,
        }
    }

    /// Converts the envelope into a typed sample.
    ///
    /// Fails when the value slot matching `type` is empty or when the other
    /// slot is also filled. Sample-level validation (negative delta, non-finite
    /// value) is left to the caller so lookups and stores can share this path.
    pub fn to_metric(&self) -> Result<Metric, MetricError> {
        match (self.kind, self.delta, self.value) {
            (MetricKind::Counter, Some(delta), None) => {
                Ok(Metric::Counter(Counter::new(self.id.clone(), delta)))
            }
            (MetricKind::Gauge, None, Some(value)) => {
                Ok(Metric::Gauge(Gauge::new(self.id.clone(), value)))
            }
            _ => Err(MetricError::KindMismatch {
                id: self.id.clone(),
                kind: self.kind,
            }),
        }
    }
}

impl From<&Gauge> for MetricEnvelope {
    fn from(g: &Gauge) -> Self {
        Self {
            id: g.name.clone(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(g.value),
            hash: None,
        }
    }
}

impl From<&Counter> for MetricEnvelope {
    fn from(c: &Counter) -> Self {
        Self {
            id: c.name.clone(),
            kind: MetricKind::Counter,
            delta: Some(c.value),
            value: None,
            hash: None,
        }
    }
}

impl From<&Metric> for MetricEnvelope {
    fn from(m: &Metric) -> Self {
        match m {
            Metric::Counter(c) => c.into(),
            Metric::Gauge(g) => g.into(),
        }
    }
}
