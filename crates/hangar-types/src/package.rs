use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A canonical, case-folded package name and its current skip state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    /// Empty means "active"; non-empty permanently disables new builds.
    #[serde(default)]
    pub skip_reason: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Package {
    pub fn is_active(&self) -> bool {
        self.skip_reason.is_empty()
    }
}

/// A previously-seen name a package was published under. The canonical name
/// is chosen by whichever alias was most recently seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAlias {
    pub canonical_name: String,
    pub alias: String,
    pub last_seen_at: DateTime<Utc>,
}

/// One (package, version) release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub package: String,
    pub version: String,
    pub released_at: DateTime<Utc>,
    #[serde(default)]
    pub skip_reason: String,
    #[serde(default)]
    pub yanked: bool,
}

impl Version {
    pub fn is_active(&self) -> bool {
        self.skip_reason.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_with_empty_skip_reason_is_active() {
        let p = Package {
            name: "requests".into(),
            skip_reason: String::new(),
            description: None,
        };
        assert!(p.is_active());
    }

    #[test]
    fn package_with_skip_reason_is_inactive() {
        let p = Package {
            name: "requests".into(),
            skip_reason: "license issue".into(),
            description: None,
        };
        assert!(!p.is_active());
    }

    #[test]
    fn version_active_independent_of_yanked() {
        let v = Version {
            package: "requests".into(),
            version: "2.0.0".into(),
            released_at: Utc::now(),
            skip_reason: String::new(),
            yanked: true,
        };
        assert!(v.is_active());
        assert!(v.yanked);
    }
}
