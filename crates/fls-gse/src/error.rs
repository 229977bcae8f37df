use thiserror::Error;

#[derive(Error, Debug)]
pub enum GseError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("session error: {0}")]
    Session(#[from] fls_session::SessionError),

    #[error("upload session reported failure; see the log above")]
    UploadFailed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GseError>;
