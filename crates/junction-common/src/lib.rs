//! # Junction Common
//!
//! Shared types, errors, and key layout used across junction components.
//!
//! ## Modules
//! - `types` - Core data structures (Direction, Flow, Light, etc.)
//! - `error` - Common error types
//! - `constants` - Shared constants and naming conventions
//! - `paths` - World-state key builder for a junction's branches

pub mod constants;
pub mod error;
pub mod paths;
pub mod types;

pub use error::JunctionError;
pub use paths::{BranchPaths, JunctionPaths};
pub use types::*;
