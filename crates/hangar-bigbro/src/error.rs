use thiserror::Error;

#[derive(Debug, Error)]
pub enum BigBroError {
    #[error("oracle request failed: {0}")]
    Oracle(#[from] hangar_oracle::OracleError),

    #[error("driver request failed: {0}")]
    Driver(#[from] hangar_driver::DriverError),

    #[error("failed to publish status: {0}")]
    Transport(#[from] hangar_transport::TransportError),

    #[error("driver returned an unexpected reply to STATS")]
    UnexpectedReply,
}
