//! Core types shared by providers, tools, storage and the runner.

pub mod generation;
pub mod message;
pub mod stream;
pub mod usage;

pub use generation::*;
pub use message::*;
pub use stream::*;
pub use usage::*;
