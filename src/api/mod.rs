//! Sources of raw station feed data.
//!
//! Includes:
//! - `acinn`: HTTP client for the ACINN station feed.
//! - `mock`: seeded synthetic feed for offline runs and tests.

mod acinn;
mod mock;


pub use acinn::*;
pub use mock::*;
