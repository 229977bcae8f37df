use thiserror::Error;

/// Errors issued by the TFTP endpoint (component C2). C3 never catches
/// these — it surfaces them to C4 unchanged.
#[derive(Error, Debug)]
pub enum TftpError {
    #[error("TFTP error {code}: {message}")]
    Remote { code: u16, message: String },

    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("protocol violation: expected {expected}, got {got}")]
    ProtocolViolation { expected: String, got: String },

    #[error("RRQ filename mismatch: expected {expected}, got {got}")]
    FilenameMismatch { expected: String, got: String },

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("retry budget exhausted after {attempts} attempts")]
    TransferFailure { attempts: u32 },

    #[error("frame codec error: {0}")]
    Core(#[from] fls_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TftpError>;
