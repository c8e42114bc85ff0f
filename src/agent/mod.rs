//! Agent module - the core conversational loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Seed the conversation with the user's request
//! 2. Ask the planner (an LLM) for the next step
//! 3. If the planner requests tool calls, execute them in order and append results
//! 4. Repeat until the planner answers without tool calls or max iterations is reached

mod agent_loop;
mod conversation;
mod planner;
mod prompt;

pub use agent_loop::{Agent, AgentError, AgentOutcome, StopReason};
pub use conversation::{Conversation, ConversationError, Message, Route, ToolCall};
pub use planner::{AssistantTurn, LlmPlanner, Planner};
pub use prompt::build_system_prompt;
