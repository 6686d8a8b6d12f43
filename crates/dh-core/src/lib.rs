//! dh-core: stable foundation for the degeneracy hunter.
//!
//! Contains:
//! - numeric (Real and tolerance validation)
//! - ids (stable compact IDs for constraints and variables)

pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use ids::*;
pub use numeric::*;
