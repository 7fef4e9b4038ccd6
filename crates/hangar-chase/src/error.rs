use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChaseError {
    #[error("oracle error: {0}")]
    Oracle(#[from] hangar_oracle::OracleError),

    #[error("transport error: {0}")]
    Transport(#[from] hangar_transport::TransportError),

    #[error("i/o error reading import file {filename}: {source}")]
    Io { filename: String, source: std::io::Error },

    #[error("io error: {0}")]
    ListenerIo(#[from] std::io::Error),

    #[error("refusing admin connection from non-loopback peer {0}")]
    NonLoopbackPeer(std::net::SocketAddr),

    #[error("{0}")]
    BadRequest(String),
}
