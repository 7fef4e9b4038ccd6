use serde::{Deserialize, Serialize};

/// The single-row configuration table: schema version and PyPI change-log
/// cursor. ORACLE treats this as a singleton keyed by nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub schema_version: String,
    pub pypi_serial: i64,
}

impl Configuration {
    pub fn initial(schema_version: impl Into<String>) -> Self {
        Configuration {
            schema_version: schema_version.into(),
            pypi_serial: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_configuration_starts_at_serial_zero() {
        let cfg = Configuration::initial("1.0");
        assert_eq!(cfg.pypi_serial, 0);
        assert_eq!(cfg.schema_version, "1.0");
    }
}
