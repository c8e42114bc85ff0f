//! # Tool Agent
//!
//! A small conversational agent that answers requests by calling tools.
//!
//! This library provides:
//! - A planner/tool loop that folds tool results back into the conversation
//! - Three in-process tools: web search (Tavily), dice rolling and stock quotes (Yahoo Finance)
//! - An OpenAI-compatible chat completions client
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a request from the REPL
//! 2. Build context with system prompt and available tools
//! 3. Call the LLM, execute any tool calls it asks for, one at a time
//! 4. Feed results back to the LLM, repeat until it answers or the iteration cap is hit
//!
//! ## Example
//!
//! ```rust,ignore
//! use tool_agent::{agent::Agent, config::Config};
//!
//! let config = Config::from_env()?;
//! let agent = Agent::new(&config)?;
//! let outcome = agent.run("Roll 3d6").await?;
//! println!("{}", outcome.answer);
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
