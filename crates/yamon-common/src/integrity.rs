//! Keyed integrity hash over a canonical rendering of a metric.
//!
//! Agent and server share a key; the agent stamps every envelope with
//! `hex(HMAC-SHA256(key, "{id}:{type}:{value}"))` and the server recomputes
//! it. Verification is skipped when either side has nothing to check.

use crate::error::MetricError;
use crate::types::{Metric, MetricEnvelope};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Shared signing key. Never printed.
#[derive(Clone)]
pub struct HashKey(Vec<u8>);

impl HashKey {
    /// Returns `None` for an empty key, which disables signing and verification.
    pub fn new(key: &str) -> Option<Self> {
        if key.is_empty() {
            None
        } else {
            Some(Self(key.as_bytes().to_vec()))
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size")
    }
}

impl std::fmt::Debug for HashKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HashKey(***)")
    }
}

/// Canonical string hashed for an envelope.
///
/// Counters render their delta as a plain integer and gauges use the shortest
/// decimal form that round-trips the `f64`, so both sides format identically.
///
/// # Examples
///
/// ```
/// use yamon_common::integrity::canonical;
/// use yamon_common::types::{Counter, Gauge, MetricEnvelope};
///
/// let g = MetricEnvelope::from(&Gauge::new("g1", 1.02));
/// assert_eq!(canonical(&g).unwrap(), "g1:gauge:1.02");
///
/// let c = MetricEnvelope::from(&Counter::new("PollCount", 7));
/// assert_eq!(canonical(&c).unwrap(), "PollCount:counter:7");
/// ```
pub fn canonical(envelope: &MetricEnvelope) -> Result<String, MetricError> {
    let s = match envelope.to_metric()? {
        Metric::Counter(c) => format!("{}:counter:{}", c.name, c.value),
        Metric::Gauge(g) => format!("{}:gauge:{}", g.name, g.value),
    };
    Ok(s)
}

/// Computes the hex-encoded HMAC of the envelope's canonical form.
pub fn compute_hash(key: &HashKey, envelope: &MetricEnvelope) -> Result<String, MetricError> {
    let mut mac = key.mac();
    mac.update(canonical(envelope)?.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl MetricEnvelope {
    /// Stamps the envelope with its hash under `key`.
    pub fn sign(&mut self, key: &HashKey) -> Result<(), MetricError> {
        self.hash = Some(compute_hash(key, self)?);
        Ok(())
    }

    /// Checks the carried hash against `key`.
    ///
    /// Passes without checking when no key is configured or when the envelope
    /// carries no (or an empty) hash. Comparison is constant time.
    pub fn verify(&self, key: Option<&HashKey>) -> Result<(), MetricError> {
        let (Some(key), Some(hash)) = (key, self.hash.as_deref()) else {
            return Ok(());
        };
        if hash.is_empty() {
            return Ok(());
        }

        let integrity = || MetricError::Integrity {
            id: self.id.clone(),
        };
        let expected = hex::decode(hash).map_err(|_| integrity())?;
        let mut mac = key.mac();
        mac.update(canonical(self)?.as_bytes());
        mac.verify_slice(&expected).map_err(|_| integrity())
    }
}
