//! Core agent loop implementation.

use std::sync::Arc;

use thiserror::Error;

use super::conversation::{Conversation, ConversationError, Route};
use super::planner::{LlmPlanner, Planner};
use crate::config::Config;
use crate::llm::OpenAiClient;
use crate::tools::{ToolExecutor, ToolRegistry};

/// Answer used when the model finishes with an empty message.
const EMPTY_ANSWER: &str = "No response generated";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("planner failed: {0:#}")]
    Planner(anyhow::Error),

    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// Loop controller states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    /// Planner's turn.
    Agent,
    /// Run the pending tool calls.
    Tools,
    /// The planner answered without requesting tools.
    Done,
    /// The iteration cap was hit before a final answer.
    GaveUp,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Answered,
    IterationLimit,
}

/// Result of one request.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    pub stop_reason: StopReason,
    /// Full history, including the user request and every tool result.
    pub conversation: Conversation,
    pub planner_turns: usize,
    pub tool_calls: usize,
}

/// The agent: a planner, a tool executor and an iteration cap.
///
/// Holds no per-request state, so one instance can serve concurrent requests.
pub struct Agent {
    planner: Arc<dyn Planner>,
    executor: Arc<dyn ToolExecutor>,
    max_iterations: usize,
}

impl Agent {
    /// Create an agent talking to the configured model with the default tools.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let llm = Arc::new(OpenAiClient::new(
            config.api_key.clone(),
            config.llm_base_url.clone(),
            config.temperature,
            config.llm_timeout,
        )?);
        let tools = ToolRegistry::new(config)?;
        let planner = LlmPlanner::new(llm, config.default_model.clone(), &tools);

        Ok(Self::with_parts(
            Arc::new(planner),
            Arc::new(tools),
            config.max_iterations,
        ))
    }

    /// Assemble an agent from explicit parts.
    pub fn with_parts(
        planner: Arc<dyn Planner>,
        executor: Arc<dyn ToolExecutor>,
        max_iterations: usize,
    ) -> Self {
        Self {
            planner,
            executor,
            max_iterations,
        }
    }

    /// Run one request to completion.
    ///
    /// Tool failures never abort the loop; only a planner failure does.
    pub async fn run(&self, input: &str) -> Result<AgentOutcome, AgentError> {
        let mut conversation = Conversation::new(input);
        let mut state = LoopState::Agent;
        let mut planner_turns = 0;
        let mut tool_calls = 0;

        loop {
            state = match state {
                LoopState::Agent if planner_turns >= self.max_iterations => LoopState::GaveUp,
                LoopState::Agent => {
                    planner_turns += 1;
                    tracing::debug!("Agent iteration {}", planner_turns);

                    let turn = self
                        .planner
                        .plan(&conversation)
                        .await
                        .map_err(AgentError::Planner)?;
                    conversation = conversation.with_assistant(turn.text, turn.tool_calls);

                    match conversation.route() {
                        Route::Continue => LoopState::Tools,
                        Route::Done => LoopState::Done,
                    }
                }
                LoopState::Tools => {
                    for call in conversation.pending_tool_calls() {
                        let result = self.executor.execute(&call).await;
                        tool_calls += 1;
                        tracing::debug!(
                            "Tool {} returned {} bytes",
                            call.name,
                            result.len()
                        );
                        conversation = conversation.with_tool_result(&call, result)?;
                    }
                    LoopState::Agent
                }
                LoopState::Done => {
                    let answer = match conversation.final_answer() {
                        Some(text) if !text.trim().is_empty() => text.to_string(),
                        _ => EMPTY_ANSWER.to_string(),
                    };
                    tracing::info!(
                        "Answered after {} planner turns and {} tool calls",
                        planner_turns,
                        tool_calls
                    );
                    return Ok(AgentOutcome {
                        answer,
                        stop_reason: StopReason::Answered,
                        conversation,
                        planner_turns,
                        tool_calls,
                    });
                }
                LoopState::GaveUp => {
                    tracing::warn!(
                        "Max iterations ({}) reached without a final answer",
                        self.max_iterations
                    );
                    return Ok(AgentOutcome {
                        answer: format!(
                            "I stopped after {} planning steps without reaching a final answer.",
                            self.max_iterations
                        ),
                        stop_reason: StopReason::IterationLimit,
                        conversation,
                        planner_turns,
                        tool_calls,
                    });
                }
            };
        }
    }
}
