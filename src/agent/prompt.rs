//! System prompt template for the planner.

use crate::tools::ToolRegistry;

/// Build the system prompt with tool definitions.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a helpful assistant that can use tools to answer the user's request.

## Available Tools
{tool_descriptions}

## Rules
1. Use a tool whenever the request needs fresh information, randomness or market data. Do not invent search results, dice rolls or prices.
2. For dice, pass the notation exactly as the user wrote it (for example "3d6" or "1d20+5").
3. For stocks, pass the ticker symbol (for example "AAPL"), not the company name.
4. If a tool returns a message starting with "Error", explain the problem to the user or try a corrected request.
5. When you have what you need, answer directly and concisely."#,
        tool_descriptions = tool_descriptions
    )
}
