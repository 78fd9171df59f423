//! Agentwarden command-line host
//!
//! Reads one command per line from stdin and prints each result as JSON on
//! stdout. Logs go to stderr.

use agentwarden_core::{ManagerConfig, SessionManager};
use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod repl;

use repl::{parse_line, Command, HELP};

/// Drive a command-line AI agent session from the terminal
#[derive(Parser, Debug)]
#[command(name = "agentwarden", version)]
struct Args {
    /// Config file (JSON); defaults apply when absent
    #[arg(long, env = "AGENTWARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Agent CLI executable (overrides config and AGENTWARDEN_CLI)
    #[arg(long)]
    cli: Option<String>,

    /// Directory that holds per-session working directories
    #[arg(long)]
    sessions_root: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn manager_config(&self) -> anyhow::Result<ManagerConfig> {
        let mut config = match &self.config {
            Some(path) => ManagerConfig::load(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => ManagerConfig::default(),
        }
        .apply_env();

        if let Some(cli) = &self.cli {
            config.cli_command = cli.clone();
        }
        if let Some(root) = &self.sessions_root {
            config.sessions_root = root.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Agentwarden v{}", env!("CARGO_PKG_VERSION"));

    let config = args.manager_config()?;
    info!("Using agent CLI '{}', sessions under {:?}", config.cli_command, config.sessions_root);
    let manager = SessionManager::from_config(config)
        .await
        .context("Failed to set up session manager")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(message) => {
                print_value(&json!({ "error": message }));
                continue;
            }
        };

        match command {
            Command::Empty => {}
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
            command => match execute(&manager, command).await {
                Ok(value) => print_value(&value),
                Err(e) => {
                    warn!("Command failed: {}", e);
                    print_value(&json!({ "error": e }));
                }
            },
        }
    }

    if manager.get_agent_state().is_some() {
        let stopped = manager.stop_agent(false).await;
        info!("Stopped live session on exit: {:?}", stopped.status);
    }
    Ok(())
}

async fn execute(manager: &SessionManager, command: Command) -> agentwarden_core::Result<Value> {
    let value = match command {
        Command::Init(prompt) => serde_json::to_value(manager.init_agent(&prompt).await?)?,
        Command::Find(task) => serde_json::to_value(manager.find_servers(&task).await?)?,
        Command::Install { names, overrides } => {
            serde_json::to_value(manager.install_servers(&names, Some(&overrides)).await?)?
        }
        Command::Transcript(format) => {
            serde_json::to_value(manager.inspect_transcript(format).await?)?
        }
        Command::State => serde_json::to_value(manager.get_agent_state())?,
        Command::Stop { force } => serde_json::to_value(manager.stop_agent(force).await)?,
        Command::Chat(prompt) => serde_json::to_value(manager.chat(&prompt, None).await?)?,
        Command::Empty | Command::Help | Command::Quit => Value::Null,
    };
    Ok(value)
}

fn print_value(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => warn!("Failed to render result: {}", e),
    }
}
