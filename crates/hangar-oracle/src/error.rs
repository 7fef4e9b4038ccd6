use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("integrity violation: {0}")]
    Integrity(String),
}

impl From<OracleError> for hangar_types::ErrorKind {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Unavailable(msg) => hangar_types::ErrorKind::DbUnavailable(msg),
            OracleError::Postgres(e) => hangar_types::ErrorKind::DbUnavailable(e.to_string()),
            OracleError::Pool(e) => hangar_types::ErrorKind::DbUnavailable(e.to_string()),
            OracleError::NotFound(msg) => hangar_types::ErrorKind::NotFound(msg),
            OracleError::Integrity(msg) => hangar_types::ErrorKind::DbIntegrity(msg),
        }
    }
}
