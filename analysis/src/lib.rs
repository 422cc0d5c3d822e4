//! Keeps a background engine searching whatever position the game is in,
//! and publishes only results that belong to that position.

pub mod coordinator;
pub mod result;

pub use coordinator::{AnalysisCoordinator, AnalysisError, AnalysisOptions, EngineLink};
pub use result::AnalysisResult;
