//! Tool Agent - interactive REPL entry point.
//!
//! Reads one request per line and prints the agent's answer. Exits on
//! `quit`, `exit`, `q` or end of input. Any command-line arguments are
//! joined into a single request that is answered once, without the REPL.

use std::io::Write;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tool_agent::{agent::Agent, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_COMMANDS: [&str; 3] = ["quit", "exit", "q"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env");

    // Initialize logging (stderr, so answers on stdout stay clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tool_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;
    info!("Loaded configuration: model={}", config.default_model);

    let agent = Agent::new(&config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let outcome = agent.run(&args.join(" ")).await?;
        println!("{}", outcome.answer);
        return Ok(());
    }

    println!("Tool Agent");
    println!("Available tools: web search, dice rolling, stock data");
    println!("Type 'quit' to exit");
    println!("{}", "-".repeat(50));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&input.to_lowercase().as_str()) {
            println!("Goodbye!");
            break;
        }

        match agent.run(input).await {
            Ok(outcome) => println!("\nAgent: {}", outcome.answer),
            Err(e) => println!("\nError: {}", e),
        }
    }

    Ok(())
}
