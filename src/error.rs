use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing fields, non-numeric tokens or truncated records in a data file.
    #[error("malformed data: {0}")]
    MalformedData(String),

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("unrecognized function: {0}")]
    UnknownActivation(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A weight file whose content does not match the network it describes.
    #[error("weight file: {0}")]
    WeightFile(String),
}
