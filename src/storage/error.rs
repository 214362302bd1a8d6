use thiserror::Error;

use crate::domain::track::TrackId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no stored match for track {0}")]
    TrackNotFound(TrackId),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
