//! Level Module
//!
//! Level data, the placement scan, asset preload and the async transition
//! pipeline that ties them together.

pub mod data;
pub mod pipeline;
pub mod preload;
pub mod source;
pub mod spawn;

pub use data::{EpisodeTable, LevelData};
pub use pipeline::{load_level, LevelOverrides, LoadOutcome, PipelineError};
pub use source::{AssetError, AssetFetcher, LevelLoadError, LevelSource};
