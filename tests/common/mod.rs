//! Shared test helpers: a scripted model provider and counting backends.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use parley::error::Result;
use parley::provider::{ModelProvider, ProviderRequest};
use parley::storage::{Conversation, ConversationId, StorageBackend};
use parley::types::*;

/// A provider that replays one queued list of parts per request.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Vec<StreamPart>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Vec<StreamPart>>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-1"
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamPart>>> {
        self.requests.lock().unwrap().push(request.clone());
        let parts = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| reply("(no script)"));
        Ok(stream::iter(parts.into_iter().map(Ok)).boxed())
    }
}

pub fn reply(text: &str) -> Vec<StreamPart> {
    vec![
        StreamPart::TextDelta { text: text.into() },
        finish(FinishReason::Stop),
    ]
}

pub fn tool_step(id: &str, name: &str, args: serde_json::Value) -> Vec<StreamPart> {
    vec![
        StreamPart::ToolCall(AgentToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args,
        }),
        finish(FinishReason::ToolCalls),
    ]
}

/// A provider whose stream yields `parts` and then never ends.
pub struct StalledProvider {
    parts: Vec<StreamPart>,
}

impl StalledProvider {
    pub fn new(parts: Vec<StreamPart>) -> Arc<Self> {
        Arc::new(Self { parts })
    }
}

#[async_trait]
impl ModelProvider for StalledProvider {
    fn provider_name(&self) -> &str {
        "stalled"
    }

    fn model_id(&self) -> &str {
        "stalled-1"
    }

    async fn stream_text(
        &self,
        _request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamPart>>> {
        let parts = stream::iter(self.parts.clone().into_iter().map(Ok));
        Ok(parts.chain(stream::pending()).boxed())
    }
}

pub fn finish(reason: FinishReason) -> StreamPart {
    StreamPart::Finish {
        reason,
        usage: Usage::new(10, 5),
    }
}

/// Backend that records every `add` call.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    pub adds: Arc<Mutex<Vec<Vec<Message>>>>,
    pub flushes: Arc<Mutex<Vec<Vec<Message>>>>,
    pub history: Vec<Message>,
    conversation: Option<Conversation>,
}

impl RecordingBackend {
    pub fn with_history(history: Vec<Message>) -> Self {
        Self {
            history,
            ..Default::default()
        }
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    async fn load(&mut self, id: Option<&ConversationId>) -> Result<Vec<Message>> {
        let id = id.cloned().unwrap_or_else(ConversationId::generate);
        self.conversation = Some(Conversation::new(id));
        Ok(self.history.clone())
    }

    async fn add(&mut self, messages: &[Message]) -> Result<()> {
        self.adds.lock().unwrap().push(messages.to_vec());
        Ok(())
    }

    fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    async fn flush(&mut self, messages: &[Message]) -> Result<()> {
        self.flushes.lock().unwrap().push(messages.to_vec());
        Ok(())
    }
}
