use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchError {
    #[error("oracle request failed: {0}")]
    Oracle(#[from] hangar_oracle::OracleError),

    #[error("failed to publish queue snapshot to driver: {0}")]
    Transport(#[from] hangar_transport::TransportError),
}
