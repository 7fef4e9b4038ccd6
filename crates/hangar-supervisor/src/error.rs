use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("transport error: {0}")]
    Transport(#[from] hangar_transport::TransportError),

    #[error("driver request failed: {0}")]
    Driver(#[from] hangar_driver::DriverError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("refusing connection from non-loopback peer {0}")]
    NonLoopbackPeer(std::net::SocketAddr),

    #[error("{0}")]
    BadRequest(String),
}
