use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of client interaction an [`AccessEvent`] records. Produced by
/// the out-of-scope access-log ingester; consumed here so BIG_BRO and
/// SCRIBE can aggregate download counters and per-page view stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Download,
    Search,
    ProjectView,
    JsonView,
    PageView,
}

/// One append-only client interaction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub kind: AccessKind,
    pub timestamp: DateTime<Utc>,
    pub client_addr: String,
    pub user_agent: String,
    #[serde(default)]
    pub client_software: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_event_round_trips_through_json() {
        let ev = AccessEvent {
            kind: AccessKind::Download,
            timestamp: Utc::now(),
            client_addr: "203.0.113.4".into(),
            user_agent: "pip/24.0".into(),
            client_software: Some("pip/24.0".into()),
            filename: Some("numpy-1.26.0-cp311-cp311-linux_armv7l.whl".into()),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: AccessEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }
}
