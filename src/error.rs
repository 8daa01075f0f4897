//! Error types for the crawler.

use thiserror::Error;

use crate::model::ValidationError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("batch rejected at index {index}: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means the broker connection itself is gone.
    ///
    /// Such errors are fatal to the whole pipeline and cancel the process
    /// scope; everything else is handled per delivery.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Error::Database(sqlx::Error::PoolClosed)
                | Error::Database(sqlx::Error::PoolTimedOut)
                | Error::Database(sqlx::Error::Io(_))
                | Error::Database(sqlx::Error::Tls(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
