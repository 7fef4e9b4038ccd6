use thiserror::Error;

#[derive(Debug, Error)]
pub enum GazerError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle error: {0}")]
    Oracle(#[from] hangar_oracle::OracleError),

    #[error("oracle rejected serial {serial} as non-increasing")]
    NonIncreasingSerial { serial: i64 },
}
