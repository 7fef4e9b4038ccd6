use serde::{Deserialize, Serialize};

use crate::build::{Dependency, FileTags};

/// The capability tuple a builder announces in its `HELLO`. Identifies which
/// ABI it builds for and gives DRIVER enough to log and display it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderCaps {
    pub interpreter: String,
    pub abi: String,
    pub platform: String,
    pub label: String,
    pub os_name: String,
    pub os_version: String,
    pub board_revision: String,
}

/// Resource snapshot a builder reports on every `IDLE`/`BUSY`, used by
/// BIG_BRO for fleet-health display and by DRIVER to log a slow builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuilderStats {
    pub disk_free_bytes: u64,
    pub mem_free_bytes: u64,
    pub load_average: f32,
    pub temperature_celsius: Option<f32>,
}

/// One artifact a builder reports in `BUILT`, before JUGGLER has fetched or
/// verified its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub size: u64,
    pub sha256: String,
    pub tags: FileTags,
    #[serde(default)]
    pub requires_python: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_stats_round_trips_through_json() {
        let stats = BuilderStats {
            disk_free_bytes: 1_000_000_000,
            mem_free_bytes: 500_000_000,
            load_average: 0.42,
            temperature_celsius: Some(54.1),
        };
        let json = serde_json::to_string(&stats).unwrap();
        let back: BuilderStats = serde_json::from_str(&json).unwrap();
        assert_eq!(stats, back);
    }

    #[test]
    fn file_info_defaults_dependencies_to_empty() {
        let json = r#"{
            "filename": "numpy-1.26.0-cp311-cp311-linux_armv7l.whl",
            "size": 1024,
            "sha256": "abc123",
            "tags": {
                "package": "numpy",
                "version": "1.26.0",
                "interpreter": "cp311",
                "abi": "cp311",
                "platform": "linux_armv7l"
            }
        }"#;
        let info: FileInfo = serde_json::from_str(json).unwrap();
        assert!(info.dependencies.is_empty());
        assert!(info.requires_python.is_none());
    }
}
