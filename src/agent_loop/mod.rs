//! The conversation runner: turn-taking, tool dispatch and run events.

pub mod events;
pub mod runner;
pub mod types;

pub use events::*;
pub use runner::*;
pub use types::*;
