//! Database schema version parsing and compatibility checks.
//!
//! The out-of-scope database-init tool stamps `Configuration.schema_version`
//! with a `"<major>.<minor>"` string every time it applies a migration. This
//! crate is the master's half of that contract: parse the stored string and
//! fail fast at startup if it does not match what this build was compiled
//! against.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The schema version this build of hangar was written against.
pub const CURRENT_SCHEMA_VERSION: SchemaVersion = SchemaVersion { major: 1, minor: 0 };

/// The oldest schema version this build can still speak to (for rolling
/// upgrades where the migration tool has not yet run).
pub const MINIMUM_SUPPORTED_SCHEMA_VERSION: SchemaVersion = SchemaVersion { major: 1, minor: 0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for SchemaVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major_s, minor_s) = s
            .split_once('.')
            .ok_or_else(|| SchemaError::Malformed(s.to_string()))?;
        let major = major_s
            .parse()
            .map_err(|_| SchemaError::Malformed(s.to_string()))?;
        let minor = minor_s
            .parse()
            .map_err(|_| SchemaError::Malformed(s.to_string()))?;
        Ok(SchemaVersion { major, minor })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("malformed schema version string: {0:?}")]
    Malformed(String),
    #[error("database schema {found} is incompatible with this build (requires >= {minimum}, matches major version {expected_major})")]
    Incompatible {
        found: SchemaVersion,
        minimum: SchemaVersion,
        expected_major: u32,
    },
}

/// Check a schema version string read from `Configuration.schema_version`
/// against what this build requires. A mismatched major version is always
/// fatal; a minor version below the minimum is also fatal (the master may
/// rely on a stored procedure introduced in that minor release); a newer
/// minor version is accepted (forward compatible additive migrations).
pub fn check_compatible(found: &str) -> Result<SchemaVersion, SchemaError> {
    let found: SchemaVersion = found.parse()?;
    if found.major != CURRENT_SCHEMA_VERSION.major || found < MINIMUM_SUPPORTED_SCHEMA_VERSION {
        return Err(SchemaError::Incompatible {
            found,
            minimum: MINIMUM_SUPPORTED_SCHEMA_VERSION,
            expected_major: CURRENT_SCHEMA_VERSION.major,
        });
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_minor_pair() {
        let v: SchemaVersion = "1.3".parse().unwrap();
        assert_eq!(v, SchemaVersion { major: 1, minor: 3 });
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("1".parse::<SchemaVersion>().is_err());
        assert!("a.b".parse::<SchemaVersion>().is_err());
        assert!("".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn accepts_current_version() {
        let v = check_compatible("1.0").unwrap();
        assert_eq!(v, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn accepts_newer_minor_version() {
        assert!(check_compatible("1.5").is_ok());
    }

    #[test]
    fn rejects_older_minor_version() {
        let err = check_compatible("0.9");
        assert!(matches!(err, Err(SchemaError::Incompatible { .. })));
    }

    #[test]
    fn rejects_mismatched_major_version() {
        let err = check_compatible("2.0");
        assert!(matches!(err, Err(SchemaError::Incompatible { .. })));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let v = SchemaVersion { major: 3, minor: 7 };
        let s = v.to_string();
        let parsed: SchemaVersion = s.parse().unwrap();
        assert_eq!(v, parsed);
    }
}
