use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One entry from the upstream change log, keyed by a strictly increasing
/// `serial`. GAZER never reorders these; it applies them in the order the
/// upstream stream delivers them.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamEvent {
    pub serial: i64,
    pub package: String,
    #[serde(flatten)]
    pub action: UpstreamAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpstreamAction {
    #[serde(rename = "create")]
    CreatePackage,
    #[serde(rename = "new_release")]
    NewRelease { version: String, released_at: DateTime<Utc> },
    Yank { version: String },
    Unyank { version: String },
    #[serde(rename = "remove_release")]
    RemoveRelease { version: String },
    #[serde(rename = "remove")]
    RemovePackage,
    Rename { old_name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_release_event_deserializes_from_json() {
        let json = r#"{
            "serial": 42,
            "package": "numpy",
            "action": "new_release",
            "version": "1.26.0",
            "released_at": "2024-01-01T00:00:00Z"
        }"#;
        let event: UpstreamEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.serial, 42);
        assert!(matches!(event.action, UpstreamAction::NewRelease { .. }));
    }
}
