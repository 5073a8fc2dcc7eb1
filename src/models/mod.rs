//! Defines the data structures and models used throughout the application.
//!
//! This includes the station feed's fields and columns, the time-indexed
//! observation table, the station registry entries, and the summary
//! structures produced for display or downstream rendering.

mod observation;
mod station;
mod summary;

pub use observation::*;
pub use station::*;
pub use summary::*;
