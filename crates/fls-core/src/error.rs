use thiserror::Error;

/// Errors raised by the frame codec and digest helper (component C1).
///
/// These are pure values — the codec never panics on malformed input,
/// it reports back through this enum and lets the caller decide.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("payload shorter than the minimum LUI/LUS header (9 bytes)")]
    InsufficientData,

    #[error("protocol_version is not 2 ASCII bytes")]
    InvalidProtocolVersion,

    #[error("description field truncated: desc_length exceeds payload size")]
    TruncatedDescription,

    #[error("progress field is not 3 ASCII digits")]
    InvalidProgress,

    #[error("progress value out of range 0..=100")]
    ProgressOutOfRange,

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("SHA-256 digest computation failed: {0}")]
    Hash(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
