use thiserror::Error;

/// Errors surfaced by the ARINC session (C3), the worker (C4) and the
/// Wi-Fi pre-flight gate (C5). C3 never downcasts a [`fls_tftp::TftpError`]
/// — it wraps it and lets `?` propagate.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] fls_tftp::TftpError),

    #[error("frame codec error: {0}")]
    Core(#[from] fls_core::CoreError),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hash computation failed: {0}")]
    Hash(String),

    #[error("failed to open transport: {0}")]
    TransportInitFailure(String),

    #[error("Wi-Fi SSID mismatch: expected {expected}, got {got}")]
    WifiMismatch { expected: String, got: String },

    #[error("Wi-Fi adapter is not associated with any network")]
    WifiDisconnected,

    #[error("Wi-Fi check failed: {0}")]
    WifiCheckFailure(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
