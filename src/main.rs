//! Binary entry point for atomnote.
//!
//! This binary provides the CLI interface for the atomic-note pipelines.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print output in the main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow unnecessary_wraps for consistent command function signatures
#![allow(clippy::unnecessary_wraps)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use atomnote::config::{AtomnoteConfig, Provider};
use atomnote::generate::GenerationPipeline;
use atomnote::hierarchy::HierarchyIndex;
use atomnote::llm::{
    AnthropicClient, CompletionService, LlmHttpConfig, OpenAiClient, RetryConfig, RetryingClient,
};
use atomnote::plan::PlanPipeline;
use atomnote::vault::{DirStore, VaultIndex};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Atomnote - turns raw notes into a graph of atomic notes.
#[derive(Parser)]
#[command(name = "atomnote")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Path to the vault root (overrides configuration).
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create a plan of atomic notes from a source note.
    Plan {
        /// Vault-relative path of the source note.
        file: String,
    },

    /// Generate every note planned in a plan document.
    Generate {
        /// Vault-relative path of the plan document.
        file: String,
    },

    /// Retry the notes that failed in the most recent generation batch.
    Resume,

    /// Rebuild the hierarchy index from frontmatter tags.
    Index,

    /// Review written answers to a plan's open questions.
    Review {
        /// Vault-relative path of the plan document.
        file: String,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    // Load .env for API keys; a missing file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli.config.as_deref(), cli.vault.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: AtomnoteConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(DirStore::new(&config.vault_path));

    match cli.command {
        Commands::Plan { file } => cmd_plan(store, config, file),
        Commands::Generate { file } => cmd_generate(store, config, file),
        Commands::Resume => cmd_resume(store, config),
        Commands::Index => cmd_index(store, config),
        Commands::Review { file } => cmd_review(store, config, file),
    }
}

fn cmd_plan(
    store: Arc<DirStore>,
    config: AtomnoteConfig,
    file: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let llm = build_llm(&config)?;
    let pipeline = PlanPipeline::new(store, llm, config);
    let plan_path = pipeline.create_plan(&file, &|phase| println!("{phase}..."))?;
    println!("Plan written to {plan_path}");
    Ok(())
}

fn cmd_generate(
    store: Arc<DirStore>,
    config: AtomnoteConfig,
    file: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let llm = build_llm(&config)?;
    let pipeline = GenerationPipeline::new(store, llm, config);
    let summary = pipeline.generate_from_plan(&file, &|phase| println!("{phase}"))?;
    report_summary(&summary);
    Ok(())
}

fn cmd_resume(
    store: Arc<DirStore>,
    config: AtomnoteConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let llm = build_llm(&config)?;
    let pipeline = GenerationPipeline::new(store, llm, config);
    let summary = pipeline.resume(&|phase| println!("{phase}"))?;
    if summary.total == 0 {
        println!("Nothing to resume.");
    } else {
        report_summary(&summary);
    }
    Ok(())
}

fn cmd_index(
    store: Arc<DirStore>,
    config: AtomnoteConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let index = VaultIndex::new(Arc::clone(&store) as Arc<dyn atomnote::FileStore>);
    let hierarchy = HierarchyIndex::new(store, config.hierarchy_index_path.clone());
    let count = hierarchy.rebuild(&index)?;
    println!(
        "Hierarchy index rebuilt with {count} structural notes ({}).",
        config.hierarchy_index_path
    );
    Ok(())
}

fn cmd_review(
    store: Arc<DirStore>,
    config: AtomnoteConfig,
    file: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let llm = build_llm(&config)?;
    let pipeline = PlanPipeline::new(store, llm, config);
    pipeline.review_answers(&file)?;
    println!("Answer review written to {file}");
    Ok(())
}

fn report_summary(summary: &atomnote::GenerationSummary) {
    println!("{}", summary.report());
    for (title, reason) in &summary.failed {
        println!("  failed: {title} ({reason})");
    }
    if !summary.failed.is_empty() {
        println!("Run `atomnote resume` to retry the failed notes.");
    }
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` wins; `--verbose` lowers the default level to debug.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "atomnote=debug" } else { "atomnote=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads configuration, applying CLI overrides.
fn load_config(
    config_path: Option<&str>,
    vault: Option<PathBuf>,
) -> Result<AtomnoteConfig, Box<dyn std::error::Error>> {
    let mut config = if let Some(path) = config_path {
        AtomnoteConfig::load_from_file(std::path::Path::new(path))?
    } else {
        AtomnoteConfig::load_default()
    };
    if let Some(vault) = vault {
        config = config.with_vault_path(vault);
    }
    Ok(config)
}

/// Builds the configured completion backend behind the retry wrapper.
fn build_llm(
    config: &AtomnoteConfig,
) -> Result<Arc<dyn CompletionService>, Box<dyn std::error::Error>> {
    let http = LlmHttpConfig::from_env();
    let llm = &config.llm;
    let retry = RetryConfig::from_config(llm);

    Ok(match llm.provider {
        Provider::Anthropic => {
            let mut client = AnthropicClient::new().with_http_config(http);
            if let Some(key) = &llm.api_key {
                client = client.with_api_key(key);
            }
            if let Some(model) = &llm.model {
                client = client.with_model(model);
            }
            if let Some(base_url) = &llm.base_url {
                client = client.with_endpoint(base_url);
            }
            Arc::new(RetryingClient::new(client, retry))
        },
        Provider::OpenAi => {
            let mut client = OpenAiClient::new().with_http_config(http);
            if let Some(key) = &llm.api_key {
                client = client.with_api_key(key);
            }
            if let Some(model) = &llm.model {
                client = client.with_model(model);
            }
            if let Some(base_url) = &llm.base_url {
                client = client.with_endpoint(base_url);
            }
            Arc::new(RetryingClient::new(client, retry))
        },
    })
}
