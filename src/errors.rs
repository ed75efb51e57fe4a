use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Exit status reported at the CLI boundary. Invalid configuration is
    /// the only condition with a dedicated code.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
