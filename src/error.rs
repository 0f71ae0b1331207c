// error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HicdexError {
    #[error("{0}: not found")]
    NotFound(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("malformed query \"{query}\": {reason}")]
    MalformedQuery { query: String, reason: String },

    #[error("invalid pixel: {0}")]
    InvalidPixel(String),

    #[error("shape mismatch: expected {expected} values, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("\"{0}\" already exists (pass overwrite to replace it)")]
    AlreadyExists(String),

    #[error("format error: {0}")]
    FormatError(String),

    #[error("index is corrupted: {0}")]
    IndexCorrupt(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("unable to infer type for \"{0}\" weights")]
    UnknownWeightType(String),

    #[error("precision loss converting count: {0}")]
    PrecisionLoss(String),

    #[error("bin tables of the streams being merged differ")]
    BinTableMismatch,

    #[error("HDF5 error: {0}")]
    Hdf5Error(#[from] hdf5::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("{0}")]
    StringError(String),
}

pub type Result<T> = std::result::Result<T, HicdexError>;

// Convenience for one-off error strings
impl From<&str> for HicdexError {
    fn from(error: &str) -> Self {
        HicdexError::StringError(error.to_string())
    }
}

impl From<String> for HicdexError {
    fn from(error: String) -> Self {
        HicdexError::StringError(error)
    }
}

impl From<Box<bincode::ErrorKind>> for HicdexError {
    fn from(error: Box<bincode::ErrorKind>) -> Self {
        HicdexError::SerializationError(error.to_string())
    }
}
