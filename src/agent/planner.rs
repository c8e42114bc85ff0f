//! Planner - asks the model for the next step.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::conversation::{Conversation, Message, ToolCall};
use super::prompt::build_system_prompt;
use crate::llm::{self, ChatMessage, LlmClient, ToolSchema};
use crate::tools::ToolRegistry;

/// The planner's reply: text plus any tool calls it wants run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Decides the next action given the conversation so far.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, conversation: &Conversation) -> anyhow::Result<AssistantTurn>;
}

/// Planner backed by a chat completion model.
pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
    model: String,
    system_prompt: String,
    tool_schemas: Vec<ToolSchema>,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, tools: &ToolRegistry) -> Self {
        Self {
            llm,
            model: model.into(),
            system_prompt: build_system_prompt(tools),
            tool_schemas: tools.get_tool_schemas(),
        }
    }

    /// Translate the conversation into chat messages, system prompt first.
    fn to_chat_messages(&self, conversation: &Conversation) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.clone()));

        for message in conversation.messages() {
            messages.push(match message {
                Message::User { text } => ChatMessage::user(text.clone()),
                Message::Assistant { text, tool_calls } => {
                    let content = if text.is_empty() && !tool_calls.is_empty() {
                        None
                    } else {
                        Some(text.clone())
                    };
                    ChatMessage::assistant(content, tool_calls.iter().map(to_wire_call).collect())
                }
                Message::ToolResult { call_id, text, .. } => {
                    ChatMessage::tool(call_id.clone(), text.clone())
                }
            });
        }

        messages
    }
}

fn to_wire_call(call: &ToolCall) -> llm::ToolCall {
    let arguments = match &call.arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    llm::ToolCall {
        id: call.id.clone(),
        kind: "function".to_string(),
        function: llm::FunctionCall {
            name: call.name.clone(),
            arguments,
        },
    }
}

fn from_wire_call(index: usize, call: llm::ToolCall) -> ToolCall {
    let raw = call.function.arguments;
    let arguments = if raw.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&raw).unwrap_or(Value::String(raw))
    };
    let id = if call.id.is_empty() {
        format!("call_{}", index)
    } else {
        call.id
    };
    ToolCall {
        id,
        name: call.function.name,
        arguments,
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, conversation: &Conversation) -> anyhow::Result<AssistantTurn> {
        let messages = self.to_chat_messages(conversation);
        let response = self
            .llm
            .chat_completion(&self.model, &messages, Some(self.tool_schemas.as_slice()))
            .await?;

        match response.finish_reason.as_deref() {
            Some("length") => tracing::warn!("Model reply was cut off at the token limit"),
            reason => tracing::debug!("Model finished: {}", reason.unwrap_or("unknown")),
        }

        let tool_calls = response
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, call)| from_wire_call(i, call))
            .collect();

        Ok(AssistantTurn {
            text: response.content.unwrap_or_default(),
            tool_calls,
        })
    }
}
