//! locsync command-line tool.
//!
//! Runs a Source → Target sync (optionally preceded by a TMX backup), runs a
//! standalone backup, and generates / validates configuration files.

mod signals;
mod style;
mod terminal;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use locsync_core::models::{RunOutcome, SyncReport};
use locsync_core::{AppConfig, CancellationToken, LogLevel, RunContext, SyncOrchestrator};

use terminal::Terminal;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Sync email templates and content blocks from Source into Target.
#[derive(Parser, Debug)]
#[command(
    name = "locsync",
    version,
    about = "Sync translatable content from a CMS into a localization platform"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./locsync.toml")]
    config: PathBuf,

    /// Log request URLs and payloads (overrides `logging.level`).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full sync, preceded by a TMX backup when enabled.
    Sync,

    /// Take a TMX backup of the Target project and exit.
    Backup {
        /// Write the backup here instead of `backup.dir`.
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Generate a sample configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./locsync.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output).map(|_| ExitCode::SUCCESS),
        Commands::Validate => cmd_validate(&cli.config).map(|_| ExitCode::SUCCESS),
        Commands::Sync => {
            let mut config = AppConfig::load_and_resolve(&cli.config)
                .context("failed to load configuration file")?;
            if cli.debug {
                config.logging.level = LogLevel::Debug;
            }
            cmd_sync(config).await
        }
        Commands::Backup { dir } => {
            let mut config = load_config(&cli.config, cli.debug)?;
            if let Some(dir) = dir {
                config.backup.dir = Some(dir);
            }
            cmd_backup(config).await
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load without validating, so command-line overrides can fill gaps first.
fn load_config(path: &Path, debug: bool) -> Result<AppConfig> {
    let mut config =
        AppConfig::load_from_file(path).context("failed to load configuration file")?;
    config.resolve_env_vars();
    if debug {
        config.logging.level = LogLevel::Debug;
    }
    Ok(config)
}

fn orchestrator(config: AppConfig, term: &Terminal) -> Result<SyncOrchestrator> {
    let ctx = RunContext::new(Arc::new(term.clone())).with_progress(Arc::new(term.clone()));
    SyncOrchestrator::new(config, ctx).context("invalid configuration")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_sync(config: AppConfig) -> Result<ExitCode> {
    let term = Terminal::new();
    let orch = orchestrator(config, &term)?;
    let cancel = CancellationToken::new();
    signals::cancel_on_shutdown(cancel.clone());

    let result = orch.run(&cancel).await;
    term.finish();

    // The run log already carries the failure details.
    let outcome = result.context("sync failed")?;
    Ok(finish_run(&outcome))
}

/// Print the summary. A user stop is a clean exit, not a failure.
fn finish_run(outcome: &RunOutcome) -> ExitCode {
    print_summary(outcome.report());
    if outcome.is_cancelled() {
        println!("{}", style::warn("Stopped before all items were processed."));
    }
    ExitCode::SUCCESS
}

async fn cmd_backup(config: AppConfig) -> Result<ExitCode> {
    let dir = config
        .backup
        .dir
        .clone()
        .context("no backup directory configured; set backup.dir or pass --dir")?;
    // Backup runs regardless of `backup.enabled` when asked for explicitly.
    let mut config = config;
    config.backup.enabled = true;

    let term = Terminal::new();
    let orch = orchestrator(config, &term)?;
    let cancel = CancellationToken::new();
    signals::cancel_on_shutdown(cancel.clone());

    let result = orch.backup_only(&dir, &cancel).await;
    term.finish();

    match result {
        Ok(Some(path)) => {
            println!();
            println!("Backup written to {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => Ok(ExitCode::SUCCESS),
        Err(e) => Err(anyhow::Error::new(e).context("backup failed")),
    }
}

fn print_summary(report: &SyncReport) {
    println!();
    println!("{}", style::header("Run summary"));
    println!("  Run id            : {}", report.run_id);
    println!("  Email templates   : {}", report.email_templates);
    println!("  Content blocks    : {}", report.content_blocks);
    if report.skipped_entries > 0 {
        println!("  Skipped entries   : {}", report.skipped_entries);
    }
    println!(
        "  Resources         : {} created, {} renamed, {} unchanged",
        report.resources_created, report.resources_renamed, report.resources_unchanged
    );
    println!(
        "  Uploads           : {} started, {} skipped",
        report.uploads_started, report.uploads_skipped
    );
    match &report.backup_file {
        Some(path) => println!("  Backup            : {}", path.display()),
        None => println!("  Backup            : {}", style::dim("none")),
    }
    if let (Some(start), Some(end)) = (report.started_at, report.completed_at) {
        println!(
            "  Duration          : {}s",
            (end - start).num_seconds().max(0)
        );
    }
}

const SAMPLE_CONFIG: &str = r#"# locsync configuration
# Credentials are read from the environment variables named below.

[source]
endpoint = "https://rest.iad-01.braze.com"
api_key_env = "BRAZE_API_KEY"

[target]
api_url = "https://rest.api.transifex.com"
organization = "my-org"
project = "my-project"
api_token_env = "TRANSIFEX_API_TOKEN"

[backup]
# Take a full TMX backup of the project before every sync.
enabled = true
# Defaults to your Downloads directory.
# dir = "/var/backups/locsync"

[logging]
# "Normal" or "Debug"
level = "Normal"
"#;

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, SAMPLE_CONFIG).context("failed to write config file")?;

    println!("Sample configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the organization and project slugs");
    println!("  2. Export BRAZE_API_KEY and TRANSIFEX_API_TOKEN");
    println!(
        "  3. Validate with: locsync validate --config {}",
        output.display()
    );
    println!("  4. Run a sync:    locsync sync --config {}", output.display());

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("{}", style::ok("TOML structure is valid"));

    config.resolve_env_vars();
    println!("{}", style::ok("Environment variable references processed"));

    if let Err(e) = config.validate() {
        println!("{}", style::fail(&format!("Validation error: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("{}", style::ok("All required fields are valid"));

    println!();
    println!("Configuration summary:");
    println!("  Source endpoint: {}", config.source.endpoint);
    println!("  Source API key : {}", set_or_not(config.source.api_key.is_some()));
    println!("  Target API     : {}", config.target.api_url);
    println!("  Target project : {}", config.project_id());
    println!(
        "  Target token   : {}",
        set_or_not(config.target.api_token.is_some())
    );
    match (config.backup.enabled, &config.backup.dir) {
        (true, Some(dir)) => println!("  TMX backup     : {}", dir.display()),
        _ => println!("  TMX backup     : disabled"),
    }
    println!("  Log level      : {}", config.logging.level);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn set_or_not(set: bool) -> &'static str {
    if set {
        "set"
    } else {
        "NOT SET"
    }
}
