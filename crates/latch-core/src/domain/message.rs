//! Work items fanned out through the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::CorrelationId;

/// Wire names of the typed fields; an extra field may not reuse them.
const RESERVED_KEYS: [&str; 3] = ["domain", "correlationId", "detectedAt"];

/// A suspect domain handed to downstream analysis.
///
/// Serialized as one flat JSON object. Fields this version does not know
/// about are kept in `extra`, so a consumer built against an older version
/// still decodes newer payloads and re-serializes them intact.
///
/// Immutable once published; the queue may deliver it more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspectDomainMessage {
    pub domain: String,
    pub correlation_id: CorrelationId,
    pub detected_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SuspectDomainMessage {
    pub fn new(domain: impl Into<String>, correlation_id: CorrelationId, detected_at: DateTime<Utc>) -> Self {
        Self {
            domain: domain.into(),
            correlation_id,
            detected_at,
            extra: serde_json::Map::new(),
        }
    }

    /// Attach an extra field. Keys naming a typed field are ignored.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.extra.insert(key, value.into());
        }
        self
    }

    /// Fails if `extra` was filled directly with a typed field's key, since
    /// the payload would carry that key twice.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        if let Some(key) = self.extra.keys().find(|key| RESERVED_KEYS.contains(&key.as_str())) {
            return Err(serde::ser::Error::custom(format!("extra field {key:?} shadows a message field")));
        }
        serde_json::to_string(self)
    }

    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
