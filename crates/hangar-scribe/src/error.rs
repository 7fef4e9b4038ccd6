use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScribeError {
    #[error("oracle error: {0}")]
    Oracle(#[from] hangar_oracle::OracleError),

    #[error("transport error: {0}")]
    Transport(#[from] hangar_transport::TransportError),

    #[error("i/o error writing {path}: {source}")]
    Io { path: std::path::PathBuf, source: std::io::Error },

    #[error("unexpected oracle reply for this query")]
    UnexpectedReply,
}
