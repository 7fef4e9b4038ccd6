//! Timestamp and duration codecs shared by every hangar component.
//!
//! Two representations are needed:
//!
//! - **Wire-stable**: timestamps as UTC-epoch-nanoseconds, durations as a
//!   `{secs, nanos}` pair. Used by [`hangar-transport`](../hangar_transport)
//!   message schemas so builders in any language can decode them without
//!   ambiguity.
//! - **Human-readable**: `humantime`-formatted strings (`"2s"`, `"5m"`) for
//!   `hangar.toml` configuration fields.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A duration serialized as `{"secs": u64, "nanos": u32}` for the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDuration {
    pub secs: u64,
    pub nanos: u32,
}

impl From<Duration> for WireDuration {
    fn from(d: Duration) -> Self {
        WireDuration {
            secs: d.as_secs(),
            nanos: d.subsec_nanos(),
        }
    }
}

impl From<WireDuration> for Duration {
    fn from(w: WireDuration) -> Self {
        Duration::new(w.secs, w.nanos)
    }
}

/// A UTC timestamp serialized as epoch-nanoseconds for the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireTimestamp(pub i64);

impl WireTimestamp {
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        WireTimestamp(since_epoch.as_nanos() as i64)
    }

    pub fn from_epoch_nanos(nanos: i64) -> Self {
        WireTimestamp(nanos)
    }

    pub fn epoch_nanos(&self) -> i64 {
        self.0
    }
}

/// Deserialize a human-readable duration string (`"2s"`, `"5m"`, `"1h30m"`)
/// from a config field.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Serialize a [`Duration`] back into its human-readable form.
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

/// Deserialize an `Option<Duration>` the same way, treating an absent or
/// empty string as `None`.
pub fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => humantime::parse_duration(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_duration_round_trips_through_duration() {
        let d = Duration::new(5, 123_456_789);
        let w: WireDuration = d.into();
        let back: Duration = w.into();
        assert_eq!(d, back);
    }

    #[test]
    fn wire_duration_json_round_trip() {
        let w = WireDuration { secs: 2, nanos: 500 };
        let json = serde_json::to_string(&w).unwrap();
        let back: WireDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(w, back);
    }

    #[test]
    fn wire_timestamp_now_is_monotonic_increasing() {
        let a = WireTimestamp::now();
        std::thread::sleep(Duration::from_millis(1));
        let b = WireTimestamp::now();
        assert!(b.epoch_nanos() > a.epoch_nanos());
    }

    #[derive(Debug, Deserialize, Serialize)]
    struct Cfg {
        #[serde(
            deserialize_with = "deserialize_duration",
            serialize_with = "serialize_duration"
        )]
        interval: Duration,
    }

    #[test]
    fn human_readable_duration_round_trips_via_toml() {
        let cfg = Cfg {
            interval: Duration::from_secs(90),
        };
        let s = toml::to_string(&cfg).unwrap();
        let back: Cfg = toml::from_str(&s).unwrap();
        assert_eq!(cfg.interval, back.interval);
    }

    #[test]
    fn rejects_malformed_duration_strings() {
        let toml_src = r#"interval = "not-a-duration""#;
        let err = toml::from_str::<Cfg>(toml_src).unwrap_err();
        assert!(err.to_string().len() > 0);
    }
}
