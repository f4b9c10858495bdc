//! Queue depth snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Best-effort queue depth at `as_of`.
///
/// Eventually consistent: good for dashboards and health output, not for
/// flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub approximate_message_count: u64,
    pub as_of: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_for_status_output() {
        let stats = QueueStats {
            approximate_message_count: 42,
            as_of: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        };
        let v = serde_json::to_value(stats).unwrap();
        assert_eq!(v["approximateMessageCount"], 42);
        assert_eq!(v["asOf"], "2024-05-01T00:00:00Z");
    }
}
