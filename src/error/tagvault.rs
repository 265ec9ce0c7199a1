use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TagVaultError {
    /// A record operation was attempted before `connect` succeeded (or after `close`).
    #[error("Connection not ready; connect the backend first")]
    ConnectionNotReady,

    #[error("Failed to connect to {engine}: {message}")]
    Connect {
        engine: &'static str,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] Box<figment::Error>),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<figment::Error> for TagVaultError {
    fn from(err: figment::Error) -> Self {
        TagVaultError::ConfigError(Box::new(err))
    }
}
