//! Change detection for alert notifications.
//!
//! Fingerprints the meaningful content of an alert and compares it against
//! the fingerprint persisted on the last run, so that each distinct version
//! of an alert is announced once.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Alert;

/// Domain tag mixed into every fingerprint. Bump on encoding changes.
const ENCODING_TAG: &[u8] = b"metrolert/alert/v1";

/// How an alert relates to what was seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Changed,
    Unchanged,
}

impl AlertStatus {
    /// Whether the alert should be published.
    pub fn is_publishable(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Hex-encoded SHA-256 digest of an alert's canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of classifying one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: AlertStatus,
    pub fingerprint: Fingerprint,
}

/// Stateless detector; persistence is the caller's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    /// Create a new change detector.
    pub fn new() -> Self {
        Self
    }

    /// Compute the fingerprint of an alert.
    pub fn fingerprint(&self, alert: &Alert) -> Fingerprint {
        let digest = Sha256::digest(canonical_bytes(alert));
        Fingerprint(hex::encode(digest))
    }

    /// Classify an alert against the previously stored fingerprint.
    pub fn classify(&self, alert: &Alert, prior: Option<&str>) -> Classification {
        let fingerprint = self.fingerprint(alert);
        let status = match prior {
            None => AlertStatus::New,
            Some(prior) if prior == fingerprint.as_str() => AlertStatus::Unchanged,
            Some(_) => AlertStatus::Changed,
        };
        Classification {
            status,
            fingerprint,
        }
    }
}

/// Canonical encoding: tag, header, description, url, then the entity count
/// and each entity's trip id. Every optional field is a presence byte
/// followed by a big-endian length and the UTF-8 bytes.
fn canonical_bytes(alert: &Alert) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(ENCODING_TAG);
    put_optional(&mut buf, alert.header_text.as_deref());
    put_optional(&mut buf, alert.description_text.as_deref());
    put_optional(&mut buf, alert.url.as_deref());

    buf.extend_from_slice(&(alert.informed_entities.len() as u64).to_be_bytes());
    for entity in &alert.informed_entities {
        put_optional(&mut buf, entity.trip_id.as_deref());
    }
    buf
}

fn put_optional(buf: &mut Vec<u8>, value: Option<&str>) {
    match value {
        None => buf.push(0),
        Some(s) => {
            buf.push(1);
            buf.extend_from_slice(&(s.len() as u64).to_be_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
    }
}
