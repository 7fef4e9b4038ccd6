use thiserror::Error;

#[derive(Debug, Error)]
pub enum JugglerError {
    #[error("i/o error writing transfer {filename}: {source}")]
    Io { filename: String, source: std::io::Error },

    #[error("transport error: {0}")]
    Transport(#[from] hangar_transport::TransportError),

    #[error("no transfer in progress for slave {0}")]
    NoTransfer(u64),

    #[error("unexpected write past declared length for {filename} (offset {offset} + {len} > {total})")]
    OutOfBounds { filename: String, offset: u64, len: u64, total: u64 },
}
