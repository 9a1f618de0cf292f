//! Message types for model communication.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A message in a conversation.
///
/// On the wire `content` is a bare string when the message is a single text
/// part, and an array of tagged parts otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(with = "content_serde")]
    pub content: Vec<ContentPart>,
}

impl Message {
    fn text_message(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::text_message(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text_message(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text_message(Role::Assistant, text)
    }

    /// Create a tool message carrying one or more results.
    pub fn tool_results(results: Vec<AgentToolResult>) -> Self {
        Self {
            role: Role::Tool,
            content: results.into_iter().map(ContentPart::ToolResult).collect(),
        }
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract tool calls from this message.
    pub fn tool_calls(&self) -> Vec<&AgentToolCall> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    /// Extract tool results from this message.
    pub fn tool_results_iter(&self) -> impl Iterator<Item = &AgentToolResult> {
        self.content.iter().filter_map(|part| match part {
            ContentPart::ToolResult(tr) => Some(tr),
            _ => None,
        })
    }

    /// Serialize only the content, in wire form (used by row-oriented storage).
    pub fn content_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&ContentWire(self.content.clone()))
    }

    /// Rebuild a message from a role and its serialized content.
    pub fn from_content_json(role: Role, content: &str) -> serde_json::Result<Self> {
        let ContentWire(content) = serde_json::from_str(content)?;
        Ok(Self { role, content })
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single part of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall(AgentToolCall),
    ToolResult(AgentToolResult),
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentToolCall {
    #[serde(rename = "toolCallId")]
    pub id: String,
    #[serde(rename = "toolName")]
    pub name: String,
    #[serde(rename = "args")]
    pub arguments: serde_json::Value,
}

/// A tool execution result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: serde_json::Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Serialize, Deserialize)]
struct ContentWire(#[serde(with = "content_serde")] Vec<ContentPart>);

mod content_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::ContentPart;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Text(String),
        Parts(Vec<ContentPart>),
    }

    pub fn serialize<S: Serializer>(parts: &[ContentPart], serializer: S) -> Result<S::Ok, S::Error> {
        match parts {
            [ContentPart::Text { text }] => serializer.serialize_str(text),
            _ => parts.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<ContentPart>, D::Error> {
        Ok(match Wire::deserialize(deserializer)? {
            Wire::Text(text) => vec![ContentPart::Text { text }],
            Wire::Parts(parts) => parts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_text_part_serializes_as_plain_string() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn tool_call_parts_use_tagged_wire_shape() {
        let msg = Message {
            role: Role::Assistant,
            content: vec![
                ContentPart::Text {
                    text: "checking".into(),
                },
                ContentPart::ToolCall(AgentToolCall {
                    id: "call_1".into(),
                    name: "read_file".into(),
                    arguments: serde_json::json!({"filepath": "/tmp/a"}),
                }),
            ],
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "checking"},
                    {"type": "tool-call", "toolCallId": "call_1", "toolName": "read_file", "args": {"filepath": "/tmp/a"}},
                ]
            })
        );
        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn tool_result_round_trips_and_omits_false_error_flag() {
        let msg = Message::tool_results(vec![AgentToolResult {
            tool_call_id: "call_1".into(),
            tool_name: "ask".into(),
            result: serde_json::json!("yes"),
            is_error: false,
        }]);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("isError"));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool_results_iter().count(), 1);
    }

    #[test]
    fn content_json_round_trip_keeps_role_separate() {
        let msg = Message::assistant("done");
        let content = msg.content_json().unwrap();
        assert_eq!(content, "\"done\"");
        let back = Message::from_content_json(Role::Assistant, &content).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn role_parses_from_column_text() {
        assert_eq!("tool".parse::<Role>().unwrap(), Role::Tool);
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn text_concatenates_text_parts_only() {
        let msg = Message {
            role: Role::Assistant,
            content: vec![
                ContentPart::Text { text: "a".into() },
                ContentPart::ToolCall(AgentToolCall {
                    id: "1".into(),
                    name: "x".into(),
                    arguments: serde_json::Value::Null,
                }),
                ContentPart::Text { text: "b".into() },
            ],
        };
        assert_eq!(msg.text(), "ab");
        assert_eq!(msg.tool_calls().len(), 1);
    }
}
