//! Command-line front end for Parley.

pub mod chat;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

/// Chat with a language model that can use tools and remember things.
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "parley", version, about = "Interactive agent runtime")]
pub struct ChatArgs {
    /// Model name or alias (claude, gemini, deepseek, provider:model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Keep the conversation in this JSON file
    #[arg(short, long, value_name = "FILE")]
    pub persist: Option<PathBuf>,

    /// Keep conversations in this SQLite database
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Enable semantic memory tools (store_memory, search_memory)
    #[arg(long)]
    pub memory: bool,

    /// Resume the conversation with this id
    #[arg(short, long, value_name = "ID")]
    pub chat: Option<String>,

    /// Model requests allowed per turn
    #[arg(short = 's', long)]
    pub max_steps: Option<usize>,

    /// Output token limit per model request
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Answer once and exit
    #[arg(short, long)]
    pub oneshot: bool,

    /// Print every runner event
    #[arg(short, long)]
    pub debug: bool,

    /// Load external tools from a TOML manifest (repeatable)
    #[arg(short, long = "tools", value_name = "MANIFEST")]
    pub tools: Vec<PathBuf>,

    /// Do not register the builtin tools
    #[arg(long)]
    pub no_builtin: bool,

    /// Replace the default system prompt
    #[arg(long)]
    pub system: Option<String>,

    /// First user message
    #[arg(trailing_var_arg = true)]
    pub prompt: Vec<String>,
}

impl ChatArgs {
    /// Positional words joined into the opening message, if any.
    pub fn first_message(&self) -> Option<String> {
        let joined = self.prompt.join(" ");
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
