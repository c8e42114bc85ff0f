//! Conversation state threaded through the agent loop.
//!
//! A [`Conversation`] is append-only: every step takes it by value and hands
//! back a longer one. Messages are never edited after they are appended.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A tool invocation requested by the planner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    /// Provider-assigned id used to pair the call with its result.
    pub id: String,
    pub name: String,
    /// Parsed arguments. A JSON object when the model produced valid JSON,
    /// otherwise the raw argument text as a string.
    pub arguments: Value,
}

/// One entry of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        text: String,
    },
    Assistant {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        text: String,
    },
}

/// Where the loop goes after looking at the latest message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Continue,
    Done,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("tool result for '{tool_name}' ({call_id}) has no matching pending tool call")]
    UnmatchedToolResult { call_id: String, tool_name: String },
}

/// Ordered message history for a single request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation from the user's request.
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::User {
                text: user_text.into(),
            }],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append an assistant turn.
    ///
    /// Call ids must be unique within a turn for results to pair up, so a
    /// repeated id is replaced with a fresh `call_<index>` id.
    pub fn with_assistant(mut self, text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        self.messages.push(Message::Assistant {
            text: text.into(),
            tool_calls: dedupe_call_ids(tool_calls),
        });
        self
    }

    /// Append the result of `call`. Fails unless `call` is still pending on
    /// the latest assistant message.
    pub fn with_tool_result(
        mut self,
        call: &ToolCall,
        text: impl Into<String>,
    ) -> Result<Self, ConversationError> {
        let pending = self
            .pending_tool_calls()
            .iter()
            .any(|p| p.id == call.id && p.name == call.name);
        if !pending {
            return Err(ConversationError::UnmatchedToolResult {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
            });
        }

        self.messages.push(Message::ToolResult {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            text: text.into(),
        });
        Ok(self)
    }

    /// Tool calls of the latest assistant message that have no result yet,
    /// in the order the planner produced them.
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        let Some(idx) = self
            .messages
            .iter()
            .rposition(|m| matches!(m, Message::Assistant { .. }))
        else {
            return Vec::new();
        };

        let calls = match &self.messages[idx] {
            Message::Assistant { tool_calls, .. } => tool_calls,
            Message::User { .. } | Message::ToolResult { .. } => return Vec::new(),
        };

        let answered: Vec<&str> = self.messages[idx + 1..]
            .iter()
            .filter_map(|m| match m {
                Message::ToolResult { call_id, .. } => Some(call_id.as_str()),
                Message::User { .. } | Message::Assistant { .. } => None,
            })
            .collect();

        calls
            .iter()
            .filter(|c| !answered.contains(&c.id.as_str()))
            .cloned()
            .collect()
    }

    /// Routing marker derived from the latest message.
    pub fn route(&self) -> Route {
        match self.messages.last() {
            Some(Message::Assistant { tool_calls, .. }) if tool_calls.is_empty() => Route::Done,
            Some(Message::Assistant { .. })
            | Some(Message::User { .. })
            | Some(Message::ToolResult { .. })
            | None => Route::Continue,
        }
    }

    /// Text of the most recent assistant message.
    pub fn final_answer(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::Assistant { text, .. } => Some(text.as_str()),
            Message::User { .. } | Message::ToolResult { .. } => None,
        })
    }
}

fn dedupe_call_ids(mut calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    for (index, call) in calls.iter_mut().enumerate() {
        if seen.contains(&call.id) {
            let mut id = format!("call_{}", index);
            while seen.contains(&id) {
                id.push_str(&format!("_{}", index));
            }
            tracing::debug!("Renamed duplicate tool call id {} to {}", call.id, id);
            call.id = id;
        }
        seen.insert(call.id.clone());
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: json!({}),
        }
    }

    #[test]
    fn new_conversation_routes_to_planner() {
        let conversation = Conversation::new("hi");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.route(), Route::Continue);
        assert_eq!(conversation.final_answer(), None);
    }

    #[test]
    fn plain_answer_is_done() {
        let conversation = Conversation::new("hi").with_assistant("hello", Vec::new());
        assert_eq!(conversation.route(), Route::Done);
        assert_eq!(conversation.final_answer(), Some("hello"));
    }

    #[test]
    fn pending_calls_shrink_as_results_arrive() {
        let a = call("1", "roll_dice");
        let b = call("2", "web_search");
        let conversation =
            Conversation::new("hi").with_assistant("", vec![a.clone(), b.clone()]);
        assert_eq!(conversation.route(), Route::Continue);
        assert_eq!(conversation.pending_tool_calls(), vec![a.clone(), b.clone()]);

        let conversation = conversation.with_tool_result(&a, "4").unwrap();
        assert_eq!(conversation.pending_tool_calls(), vec![b.clone()]);
        assert_eq!(conversation.route(), Route::Continue);

        let conversation = conversation.with_tool_result(&b, "found").unwrap();
        assert!(conversation.pending_tool_calls().is_empty());
    }

    #[test]
    fn repeated_call_ids_are_made_unique() {
        let conversation = Conversation::new("hi").with_assistant(
            "",
            vec![
                call("call_x", "roll_dice"),
                call("call_x", "roll_dice"),
                call("call_2", "web_search"),
            ],
        );
        let pending = conversation.pending_tool_calls();
        let ids: Vec<&str> = pending.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["call_x", "call_1", "call_2"]);

        let conversation = pending
            .iter()
            .try_fold(conversation.clone(), |c, p| c.with_tool_result(p, "ok"))
            .expect("every call pairs with its result");
        assert!(conversation.pending_tool_calls().is_empty());
    }

    #[test]
    fn result_without_matching_call_is_rejected() {
        let conversation = Conversation::new("hi").with_assistant("", vec![call("1", "roll_dice")]);
        let err = conversation
            .clone()
            .with_tool_result(&call("1", "web_search"), "x")
            .unwrap_err();
        assert!(matches!(err, ConversationError::UnmatchedToolResult { .. }));

        let answered = conversation.with_tool_result(&call("1", "roll_dice"), "4").unwrap();
        assert!(answered
            .with_tool_result(&call("1", "roll_dice"), "again")
            .is_err());
    }

    #[test]
    fn result_before_any_assistant_is_rejected() {
        assert!(Conversation::new("hi")
            .with_tool_result(&call("1", "roll_dice"), "4")
            .is_err());
    }

    #[test]
    fn serializes_as_tagged_messages() {
        let conversation = Conversation::new("hi").with_assistant("hello", Vec::new());
        let value = serde_json::to_value(&conversation).unwrap();
        assert_eq!(value["messages"][0], json!({"role": "user", "text": "hi"}));
        assert_eq!(value["messages"][1]["role"], "assistant");
    }
}
