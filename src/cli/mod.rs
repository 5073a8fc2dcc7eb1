//! Handles Command Line Interface (CLI) related functionalities.
//!
//! Includes the command definitions, the concurrent per-station run,
//! interactive prompts for the menu loop and table rendering.

mod commands;
mod prompts;
mod render;

pub use commands::*;
pub use prompts::*;
