use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An ABI identifier such as `"cp311_armv7l"`. The reserved tag `"none"`
/// (see [`crate::NONE_ABI`]) must never appear as a `BuildAbi`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildAbi {
    pub tag: String,
    #[serde(default)]
    pub skip_reason: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl BuildAbi {
    pub fn is_active(&self) -> bool {
        self.skip_reason.is_empty()
    }

    /// Lexicographic ordering key used by the queue planner (see
    /// `hangar-arch`). Exposed as a seam so a future declared numeric order
    /// can replace this without changing queue-planning code shape.
    pub fn sort_key(&self) -> &str {
        &self.tag
    }
}

/// One build attempt against (package, version, abi).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: i64,
    pub package: String,
    pub version: String,
    pub abi: String,
    pub builder_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub success: bool,
}

/// An artifact produced by a successful [`Build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFile {
    pub filename: String,
    pub build_id: i64,
    pub size: u64,
    pub sha256: String,
    pub tags: FileTags,
    #[serde(default)]
    pub requires_python: Option<String>,
}

/// Tags extracted from an artifact's filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTags {
    pub package: String,
    pub version: String,
    pub interpreter: String,
    pub abi: String,
    pub platform: String,
}

/// A package-management tool a [`BuildFile`] depends on at install time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyTool {
    Apt,
    Pip,
    #[serde(rename = "")]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub filename: String,
    pub tool: DependencyTool,
    pub name: String,
}

/// A system package already present on a builder's ABI image, subtracted
/// from a file's requirements before they are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreinstalledDep {
    pub abi: String,
    pub system_package: String,
}

mod duration_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_abi_sort_key_is_the_tag() {
        let abi = BuildAbi {
            tag: "cp311_armv7l".into(),
            skip_reason: String::new(),
            description: None,
        };
        assert_eq!(abi.sort_key(), "cp311_armv7l");
    }

    #[test]
    fn build_round_trips_through_json() {
        let b = Build {
            id: 1,
            package: "numpy".into(),
            version: "1.26.0".into(),
            abi: "cp311_armv7l".into(),
            builder_id: "pi-07".into(),
            started_at: Utc::now(),
            duration: Duration::from_secs(842),
            success: true,
        };
        let json = serde_json::to_string(&b).unwrap();
        let back: Build = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }
}
