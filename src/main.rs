use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cardsmith_config::Config;
use cardsmith_engine::StepRegistry;
use cardsmith_orchestrator::{Services, WarmupRequest};
use cardsmith_workflow::TemplateCatalog;

/// Cardsmith - cached workflow execution for card generation and analytics
#[derive(Parser)]
#[command(name = "cardsmith")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.cardsmith)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Path to the configuration file (default: <data-dir>/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// List the available workflow templates
  Templates,

  /// Run a workflow through the result cache
  Run {
    /// Workflow id, e.g. trend-analysis
    workflow: String,

    /// Input as JSON (read from stdin when omitted)
    #[arg(long)]
    input: Option<String>,
  },

  /// Execute and cache a batch of `{ workflowId, input }` requests
  Warmup {
    /// Path to a JSON array of warmup requests
    file: PathBuf,
  },

  /// Print the effective configuration
  Config,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cardsmith=info")),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".cardsmith"),
  };
  let config = load_config(cli.config.as_deref(), &data_dir)?;

  match cli.command {
    Some(Commands::Templates) => {
      let catalog = TemplateCatalog::builtin();
      print_json(&catalog.summaries())?;
    }
    Some(Commands::Run { workflow, input }) => {
      let input = match input {
        Some(raw) => serde_json::from_str(&raw).context("failed to parse --input JSON")?,
        None => read_payload_from_stdin()?,
      };
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(config, workflow, input))?;
    }
    Some(Commands::Warmup { file }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(warmup(config, file))?;
    }
    Some(Commands::Config) => {
      print_json(&config)?;
    }
    None => {
      println!("cardsmith - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_config(explicit: Option<&Path>, data_dir: &Path) -> Result<Config> {
  match explicit {
    Some(path) => Config::load(path)
      .with_context(|| format!("failed to load config: {}", path.display())),
    None => {
      let path = data_dir.join("config.json");
      Config::load_or_default(&path)
        .with_context(|| format!("failed to load config: {}", path.display()))
    }
  }
}

/// Services with a recording handler behind every built-in step.
fn start_services(config: Config) -> Result<Services> {
  let catalog = TemplateCatalog::builtin();
  let steps = StepRegistry::recording(catalog.step_names());
  Services::start(config, catalog, steps).context("failed to start services")
}

async fn run_workflow(config: Config, workflow: String, input: serde_json::Value) -> Result<()> {
  let services = start_services(config)?;
  let outcome = services.executor().execute(&workflow, &input).await;
  services.shutdown().await;

  match outcome {
    Ok(execution) => {
      info!(workflow_id = %workflow, source = ?execution.source, "workflow finished");
      print_json(&execution)
    }
    Err(e) => {
      print_json(&e.to_response())?;
      Err(anyhow!(e)).with_context(|| format!("workflow '{}' failed", workflow))
    }
  }
}

async fn warmup(config: Config, file: PathBuf) -> Result<()> {
  let content = tokio::fs::read_to_string(&file)
    .await
    .with_context(|| format!("failed to read warmup file: {}", file.display()))?;
  let requests: Vec<WarmupRequest> = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse warmup file: {}", file.display()))?;

  let services = start_services(config)?;
  let report = services.cache_admin().warmup(requests).await;
  let overview = services.cache_admin().overview();
  services.shutdown().await;

  print_json(&serde_json::json!({ "warmup": report, "cache": overview }))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(serde_json::json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read input from stdin")?;

  if input.trim().is_empty() {
    Ok(serde_json::json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse input JSON from stdin")
  }
}
