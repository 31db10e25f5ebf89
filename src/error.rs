use std::time::Duration;

use thiserror::Error;

/// Failures reported by the link and click stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Lookup miss. The allocator reads this as "the code is free".
    #[error("record not found")]
    NotFound,

    /// The unique index on `links.short_code` rejected the insert.
    #[error("short code already exists")]
    Duplicate,

    #[error("database error: {0}")]
    Backend(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Duplicate
            }
            other => StoreError::Backend(other),
        }
    }
}

/// Reasons [`crate::shortcode::LinkAllocator::create_link`] can fail.
#[derive(Debug, Error)]
pub enum AllocError {
    /// The OS entropy source failed. Not worth retrying.
    #[error("entropy source failed: {0}")]
    Entropy(#[from] rand::Error),

    #[error("no free short code found after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A destination probe that produced no HTTP status at all.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no response within {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}
