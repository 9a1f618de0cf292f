//! User interaction: line prompts and yes/no confirmations.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::error::Result;

/// A source of user input shared by the runner and interactive tools.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Show `message` and read one line. `None` means end of input.
    async fn prompt(&self, message: &str) -> Result<Option<String>>;

    /// Ask a yes/no question. Anything but an explicit yes is a no.
    async fn confirm(&self, message: &str) -> Result<bool>;
}

/// Interaction over the process's stdin and stdout.
///
/// One line reader is shared by every caller so buffered input is never lost
/// between the runner's prompt and a tool's confirmation.
#[derive(Clone)]
pub struct TerminalInteraction {
    lines: Arc<Mutex<Lines<BufReader<Stdin>>>>,
}

impl Default for TerminalInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalInteraction {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines())),
        }
    }

    async fn read_line(&self, message: &str) -> Result<Option<String>> {
        let mut lines = self.lines.lock().await;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(message.as_bytes()).await?;
        stdout.flush().await?;
        Ok(lines.next_line().await?)
    }
}

#[async_trait]
impl Interaction for TerminalInteraction {
    async fn prompt(&self, message: &str) -> Result<Option<String>> {
        self.read_line(message).await
    }

    async fn confirm(&self, message: &str) -> Result<bool> {
        let answer = self.read_line(&format!("{message} [y/N] ")).await?;
        Ok(answer.as_deref().is_some_and(is_yes))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Interaction that replays canned answers, for tests and non-interactive runs.
///
/// Prompts consume `inputs` in order and return `None` once exhausted.
/// Confirmations consume `confirmations` and default to `false`.
#[derive(Debug, Default)]
pub struct ScriptedInteraction {
    inputs: StdMutex<VecDeque<String>>,
    confirmations: StdMutex<VecDeque<bool>>,
    transcript: StdMutex<Vec<String>>,
}

impl ScriptedInteraction {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: StdMutex::new(inputs.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn with_confirmations(self, answers: impl IntoIterator<Item = bool>) -> Self {
        if let Ok(mut queue) = self.confirmations.lock() {
            queue.extend(answers);
        }
        self
    }

    /// Every message shown so far, prompts and confirmations alike.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    fn record(&self, message: &str) {
        if let Ok(mut t) = self.transcript.lock() {
            t.push(message.to_string());
        }
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn prompt(&self, message: &str) -> Result<Option<String>> {
        self.record(message);
        Ok(self.inputs.lock().ok().and_then(|mut q| q.pop_front()))
    }

    async fn confirm(&self, message: &str) -> Result<bool> {
        self.record(message);
        Ok(self
            .confirmations
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_inputs_run_out_to_none() {
        let io = ScriptedInteraction::new(["first"]);
        assert_eq!(io.prompt("> ").await.unwrap().as_deref(), Some("first"));
        assert_eq!(io.prompt("> ").await.unwrap(), None);
        assert_eq!(io.transcript(), vec!["> ", "> "]);
    }

    #[tokio::test]
    async fn confirmations_default_to_no() {
        let io = ScriptedInteraction::default().with_confirmations([true]);
        assert!(io.confirm("Run: ls").await.unwrap());
        assert!(!io.confirm("Run: rm").await.unwrap());
    }

    #[test]
    fn yes_answers_are_case_insensitive() {
        assert!(is_yes(" Y "));
        assert!(is_yes("yes"));
        assert!(!is_yes(""));
        assert!(!is_yes("nope"));
    }
}
