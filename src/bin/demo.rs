//! Scripted walkthrough of the agent's tools.
//!
//! Runs a fixed set of requests (dice, stock data, web search, and a request
//! needing two tools in sequence) and prints each answer with its timing.

use std::time::Instant;

use anyhow::Context;
use tool_agent::{
    agent::{Agent, StopReason},
    config::Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Scenario {
    title: &'static str,
    description: &'static str,
    input: &'static str,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        title: "Dice Rolling",
        description: "Demonstrates the dice rolling tool",
        input: "Roll 3d6 for my character's strength check",
    },
    Scenario {
        title: "Stock Data",
        description: "Shows real-time stock information retrieval",
        input: "What's the current stock price and market data for TSLA?",
    },
    Scenario {
        title: "Web Search",
        description: "Demonstrates web search",
        input: "Search for the latest news about artificial intelligence and machine learning",
    },
    Scenario {
        title: "Multi-Tool Usage",
        description: "Uses several tools in sequence",
        input: "Search for information about Apple Inc and then get their current stock price",
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tool_agent=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    let agent = Agent::new(&config)?;

    let rule = "=".repeat(60);
    println!("Tool Agent Demo");
    println!("{}", rule);

    let mut failures = 0;
    for (i, scenario) in SCENARIOS.iter().enumerate() {
        println!("\n{}. {}", i + 1, scenario.title);
        println!("   {}", scenario.description);
        println!("   Input: {}", scenario.input);
        println!("{}", "-".repeat(60));

        let started = Instant::now();
        match agent.run(scenario.input).await {
            Ok(outcome) => {
                println!("Response time: {:.2} seconds", started.elapsed().as_secs_f64());
                println!(
                    "Tools used: {} | planner turns: {}",
                    outcome.tool_calls, outcome.planner_turns
                );
                if outcome.stop_reason == StopReason::IterationLimit {
                    failures += 1;
                }
                println!("Agent Response:\n{}", outcome.answer);
            }
            Err(e) => {
                failures += 1;
                println!("Error: {}", e);
            }
        }
        println!("\n{}", rule);
    }

    println!(
        "\nDemo completed: {} of {} scenarios answered.",
        SCENARIOS.len() - failures,
        SCENARIOS.len()
    );
    Ok(())
}
