//! data-agent - command-line entry point.
//!
//! Runs queries through the agent and prints each step as it happens.

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use data_agent::agent::{Agent, AgentUpdate, QueryOutcome};
use data_agent::config::Config;
use data_agent::llm::OpenAiClient;
use data_agent::settings::SettingsStore;
use data_agent::tools::ToolRegistry;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "data-agent", version, about = "Fetch, filter and export data with an LLM agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a single query and exit.
    Run {
        /// What the agent should do, e.g. "fetch users and export those with id > 5".
        query: Vec<String>,
    },
    /// Interactive session on one agent. `:reset`, `:log` and `:quit` are commands.
    Chat,
    /// Save the OpenAI API key to the settings file.
    SetKey { key: String },
    /// Save the preferred chat model to the settings file.
    SetModel { model: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout only carries the conversation.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "data_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    let settings = SettingsStore::new(&config.data_dir).await;

    let query = match cli.command {
        Command::SetKey { key } => {
            settings.set_api_key(Some(key)).await?;
            println!("API key saved.");
            return Ok(());
        }
        Command::SetModel { model } => {
            settings.set_model(Some(model)).await?;
            println!("Model saved.");
            return Ok(());
        }
        Command::Run { query } => {
            let query = query.join(" ").trim().to_string();
            if query.is_empty() {
                anyhow::bail!("Please enter a query");
            }
            Some(query)
        }
        Command::Chat => None,
    };

    // Environment values win over saved settings.
    let saved = settings.get().await;
    if config.api_key.is_none() {
        config.api_key = saved.openai_api_key;
    }
    if std::env::var("OPENAI_MODEL").is_err() {
        if let Some(model) = saved.model {
            config.model = model;
        }
    }
    config.require_api_key()?;
    info!("Loaded configuration: model={}", config.model);

    let llm = Arc::new(OpenAiClient::new(
        config.api_key.clone(),
        config.model.clone(),
        config.api_base_url.clone(),
    ));
    let tools = Arc::new(ToolRegistry::builtin(&config));
    let mut agent = Agent::new(llm, tools).with_max_iterations(config.max_iterations);

    match query {
        Some(query) => {
            let outcome = agent.process_query(&query, print_update).await;
            print_outcome(&outcome);
        }
        None => chat(&mut agent).await?,
    }

    Ok(())
}

async fn chat(agent: &mut Agent) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            ":quit" | ":q" => break,
            ":reset" => {
                agent.reset();
                println!("Conversation cleared.");
            }
            ":log" => println!("{}", agent.conversation_log()),
            query => {
                let outcome = agent.process_query(query, print_update).await;
                print_outcome(&outcome);
            }
        }
    }

    Ok(())
}

fn print_update(update: AgentUpdate) {
    match update {
        AgentUpdate::Assistant { content, tool_call } => {
            if !content.is_empty() {
                println!("[assistant] {}", content);
            }
            if let Some(call) = tool_call {
                println!("[assistant] wants to call {}", call.name);
            }
        }
        AgentUpdate::ToolCall { tool_name, params } => {
            let params = serde_json::to_string_pretty(&params).unwrap_or_default();
            println!("[tool] Executing: {}\nParams: {}", tool_name, params);
        }
        AgentUpdate::ToolResult { tool_name, result } => {
            let result = serde_json::to_string_pretty(&result).unwrap_or_default();
            println!("[tool] {} result: {}", tool_name, result);
        }
        AgentUpdate::Error { error } => println!("[error] {}", error),
    }
}

fn print_outcome(outcome: &QueryOutcome) {
    println!();
    println!("{}", outcome.response);
    println!("({} iteration(s), {:?})", outcome.iterations, outcome.status);
}
