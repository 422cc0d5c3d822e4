//! Common utilities for pgnwatch
//!
//! This crate provides shared square/piece conversions and long algebraic
//! move helpers used by the chess state machine, the engine bridge and the
//! analysis coordinator.

pub mod converters;
pub mod uci;

// Re-export commonly used items
pub use converters::*;
pub use uci::*;
