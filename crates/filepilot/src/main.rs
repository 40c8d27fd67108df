//! filepilot - chat with a model that can read, list and edit local files

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use filepilot_agent::{AgentLoop, ContextBuilder, RetryPolicy, ToolRegistry};
use filepilot_config::Config;
use filepilot_provider::OpenAiProvider;

mod terminal;

use terminal::{StdinLines, TerminalConsole};

/// filepilot - an LLM file assistant for your terminal
#[derive(Parser, Debug)]
#[command(name = "filepilot")]
#[command(about = "◆ Chat with a model that can read, list and edit your files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// JSON config file, overridden by environment and flags
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// API base URL
    #[arg(long, value_name = "URL")]
    api_base: Option<String>,

    /// Directory relative tool paths resolve against
    #[arg(long, value_name = "DIR")]
    workdir: Option<PathBuf>,

    /// Give up on a turn after this many failed retries
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Pause between retries
    #[arg(long, value_name = "MS")]
    retry_backoff_ms: Option<u64>,

    /// Per-request timeout
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Flags take precedence over everything else
    fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(base) = &self.api_base {
            config.api_base = base.clone();
        }
        if let Some(n) = self.max_retries {
            config.max_retries = Some(n);
        }
        if let Some(ms) = self.retry_backoff_ms {
            config.retry_backoff_ms = ms;
        }
        if let Some(secs) = self.timeout {
            config.request_timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            error!("Config failed: {:#}", e);
            eprintln!("{} {:#}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = chat(&cli, config).await {
        error!("Session failed: {:#}", e);
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so they never interleave with the chat on stdout
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// defaults < config file < environment < flags
async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?
            .with_env(|key| std::env::var(key).ok())?,
        None => Config::from_env()?,
    };

    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn workdir(cli: &Cli) -> Result<PathBuf> {
    let dir = match &cli.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to determine current directory")?,
    };
    if !dir.is_dir() {
        bail!("working directory {} does not exist", dir.display());
    }
    Ok(dir)
}

fn retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy {
        max_retries: config.max_retries,
        backoff: config.retry_backoff(),
    }
}

async fn chat(cli: &Cli, config: Config) -> Result<()> {
    let root = workdir(cli)?;

    let provider = OpenAiProvider::new(
        config.api_key.as_str(),
        config.endpoint(),
        config.model.as_str(),
        config.request_timeout(),
    )?
    .with_sampling(config.max_tokens, config.temperature);

    let registry = ToolRegistry::with_default_tools(root.as_path());
    let system_prompt = ContextBuilder::new(&root).build_system_prompt(&registry);

    let cancel = CancellationToken::new();
    let mut agent = AgentLoop::new(provider, registry, system_prompt)
        .with_retry_policy(retry_policy(&config))
        .with_cancellation(cancel.clone());

    let mut console = TerminalConsole::new();
    banner(&config.model, &root);
    info!("◆ ENDPOINT: {}", config.endpoint());

    let mut input = StdinLines::spawn().context("failed to start input reader")?;

    tokio::select! {
        result = agent.run(&mut input, &mut console) => result?,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            println!();
            info!("◆ INTERRUPTED");
        }
    }

    println!("{}", "◆ Session ended".dimmed());
    Ok(())
}

fn banner(model: &str, root: &Path) {
    println!("{}", "◆ filepilot".cyan().bold());
    println!("  model:   {}", model);
    println!("  workdir: {}", root.display());
    println!(
        "  {}",
        "Chat with the model (ctrl-d or ctrl-c to quit)".dimmed()
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
