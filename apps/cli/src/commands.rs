//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use controlqa_core::{Pipeline, PipeProgress};
use controlqa_shared::{
    AppConfig, ChatMessage, init_config, load_config, load_config_from, split_questions,
    validate_api_keys,
};
use controlqa_storage::{Storage, read_import_file};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ControlQA — answer security-control questions from indexed evidence.
#[derive(Parser)]
#[command(
    name = "controlqa",
    version,
    about = "Answer security-control questions with semantic search and chat completion.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.controlqa/controlqa.toml.
    #[arg(long, global = true, env = "CONTROLQA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Answer one chat message.
    Ask {
        /// The message, e.g. "Family: AC ControlID: 2".
        message: String,

        /// Model id reported by the chat host (logged only).
        #[arg(short, long, default_value = "controlqa-pipeline")]
        model: String,
    },

    /// Manage the local control catalogue.
    Controls {
        #[command(subcommand)]
        action: ControlsAction,
    },

    /// Inspect recorded responses.
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Control catalogue subcommands.
#[derive(Subcommand)]
pub(crate) enum ControlsAction {
    /// Import control documents from a JSON array file.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },
    /// List stored controls.
    List,
    /// Show one control and its generated questions.
    Show {
        #[arg(long)]
        family: String,

        #[arg(long)]
        control_id: String,
    },
}

/// Audit subcommands.
#[derive(Subcommand)]
pub(crate) enum AuditAction {
    /// List the most recent audit records.
    List {
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "controlqa=info",
        1 => "controlqa=debug",
        _ => "controlqa=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Ask { message, model } => cmd_ask(config_path, &message, &model).await,
        Command::Controls { action } => match action {
            ControlsAction::Import { file } => cmd_controls_import(config_path, &file).await,
            ControlsAction::List => cmd_controls_list(config_path).await,
            ControlsAction::Show { family, control_id } => {
                cmd_controls_show(config_path, &family, &control_id).await
            }
        },
        Command::Audit { action } => match action {
            AuditAction::List { limit } => cmd_audit_list(config_path, limit).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn open_store(config: &AppConfig) -> Result<Storage> {
    let path = config.store.resolved_path()?;
    Ok(Storage::open(&path).await?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ask(config_path: Option<&Path>, message: &str, model: &str) -> Result<()> {
    let config = resolve_config(config_path)?;
    let pipeline = Pipeline::on_startup(&config).await?;

    info!(model, "answering message");

    let history = [ChatMessage {
        role: "user".to_string(),
        content: message.to_string(),
    }];
    let body = serde_json::json!({
        "model": model,
        "messages": &history,
        "stream": false,
    });

    let reporter = CliProgress::new();
    let answer = pipeline
        .pipe_with_progress(message, model, &history, &body, &reporter)
        .await;

    println!("{answer}");
    pipeline.on_shutdown().await;
    Ok(())
}

async fn cmd_controls_import(config_path: Option<&Path>, file: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    let docs = read_import_file(file)?;
    let store = open_store(&config).await?;

    let count = store.import_controls(&docs).await?;
    println!("Imported {count} controls from {}", file.display());
    Ok(())
}

async fn cmd_controls_list(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let store = open_store(&config).await?;
    let controls = store.list_controls().await?;

    if controls.is_empty() {
        println!("No controls stored. Import some with `controlqa controls import <file>`.");
        return Ok(());
    }

    for doc in &controls {
        let questions = split_questions(&doc.generated_questions).len();
        println!(
            "  {:<10} {}  ({questions} questions)",
            format!("{}-{}", doc.family, doc.control_id),
            doc.name
        );
    }
    Ok(())
}

async fn cmd_controls_show(
    config_path: Option<&Path>,
    family: &str,
    control_id: &str,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let store = open_store(&config).await?;

    let doc = store
        .get_control(family, control_id)
        .await?
        .ok_or_else(|| eyre!("no control found for Family '{family}' and ControlID '{control_id}'"))?;

    println!("{}-{}: {}", doc.family, doc.control_id, doc.name);
    for (i, question) in split_questions(&doc.generated_questions).iter().enumerate() {
        println!("  {}. {question}", i + 1);
    }
    Ok(())
}

async fn cmd_audit_list(config_path: Option<&Path>, limit: u32) -> Result<()> {
    let config = resolve_config(config_path)?;
    let store = open_store(&config).await?;
    let records = store.list_audit(limit).await?;

    if records.is_empty() {
        println!("No audit records.");
        return Ok(());
    }

    for record in &records {
        println!("── {} ({})", record.id, record.created_at.to_rfc3339());
        println!("{}", record.content);
        println!();
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    match validate_api_keys(&config) {
        Ok(()) => println!("# API keys: found in environment"),
        Err(e) => println!("# {e}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl PipeProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn question(&self, current: usize, total: usize, question: &str) {
        self.spinner
            .set_message(format!("Answering [{current}/{total}] {question}"));
    }

    fn done(&self) {
        self.spinner.finish_and_clear();
    }
}
