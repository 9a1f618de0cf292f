//! Parley: an interactive agent runtime.
//!
//! A [`ConversationRunner`](agent_loop::ConversationRunner) streams model
//! replies, dispatches tool calls by name and appends each finished turn to a
//! [`Messenger`](messenger::Messenger), which mirrors the history into a
//! pluggable [`StorageBackend`](storage::StorageBackend). Semantic memory is a
//! separate SQLite-backed vector store reached through two tools.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use parley::prelude::*;
//!
//! # async fn example() -> parley::error::Result<()> {
//! let config = ParleyConfig::load()?;
//! let model: LanguageModel = "claude".parse()?;
//! let provider = parley::provider::create_provider(&model, &config)?;
//!
//! let mut messenger = Messenger::new(TransientBackend::new());
//! messenger.load(None).await?;
//! messenger.add(vec![Message::user("Hello!")]).await?;
//!
//! let mut runner = ConversationRunner::new(provider, ToolSet::new(), RunnerOptions::default());
//! runner.run_turn(&mut messenger).await?;
//! println!("{}", messenger.last().map(|m| m.text()).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod interaction;
pub mod memory;
pub mod messenger;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod storage;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
