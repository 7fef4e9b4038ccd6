use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("oracle request failed: {0}")]
    Oracle(#[from] hangar_oracle::OracleError),

    #[error("transport error: {0}")]
    Transport(#[from] hangar_transport::TransportError),

    #[error("unexpected message {tag} in state {state}")]
    UnexpectedMessage { tag: String, state: &'static str },

    #[error("unknown slave id {0}")]
    UnknownSlave(u64),
}
