//! Loading Seams
//!
//! Level files and art assets come from outside the core. Both fetches are
//! asynchronous; futures are `!Send` because everything runs on one
//! cooperative thread.

use futures_util::future::LocalBoxFuture;
use thiserror::Error;

use crate::level::data::LevelData;

/// Level loading errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelLoadError {
    /// No level under that file name.
    #[error("level not found: {0}")]
    NotFound(String),

    /// Level data present but unusable.
    #[error("malformed level {file}: {reason}")]
    Malformed {
        /// File name.
        file: String,
        /// What is wrong.
        reason: String,
    },

    /// Source could not be reached.
    #[error("level source unavailable: {0}")]
    Unavailable(String),
}

/// Asset fetch errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// Fetch failed.
    #[error("failed to fetch {path}: {reason}")]
    Fetch {
        /// Asset path.
        path: String,
        /// Why.
        reason: String,
    },

    /// Fetch did not finish in time.
    #[error("timed out fetching {0}")]
    Timeout(String),
}

/// Level file loader.
pub trait LevelSource {
    /// Load and decode a level file.
    fn load<'a>(&'a self, file: &'a str) -> LocalBoxFuture<'a, Result<LevelData, LevelLoadError>>;
}

/// Art asset fetcher.
pub trait AssetFetcher {
    /// Fetch one asset so it is ready for drawing.
    fn fetch<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, Result<(), AssetError>>;
}
