//! cycle-autotag - tag new Cycle feedback from the reporter's email
//!
//! Main entry point for the `autotag` CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use cycle_autotag::config::{validate_config, validate_config_result, AutotagConfig};
use cycle_autotag::integrations::{CycleClient, HttpTransport, TokioSleeper};
use cycle_autotag::processor::{EventProcessor, InboundEvent, DOC_CREATE_EVENT};
use cycle_autotag::server::WebhookServer;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::sync::watch;

/// autotag - set a select attribute on new Cycle feedback from the reporter's email
#[derive(Parser, Debug)]
#[command(name = "autotag")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/cycle-autotag/config.yaml)
    #[arg(short, long, env = "AUTOTAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a sample configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration file
    CheckConfig,

    /// Look up a workspace id by slug
    ResolveWorkspace {
        /// Workspace slug
        #[arg(long)]
        slug: String,
    },

    /// Process a single event
    Process {
        /// JSON payload file ("-" for stdin)
        #[arg(long, conflicts_with = "doc_id")]
        payload: Option<PathBuf>,

        /// Doc id (builds a doc.create event)
        #[arg(long, required_unless_present = "payload")]
        doc_id: Option<String>,

        /// Workspace id (default: the configured workspace)
        #[arg(long)]
        product_id: Option<String>,

        /// Doctype id
        #[arg(long)]
        doctype_id: Option<String>,

        /// Event type
        #[arg(long, default_value = DOC_CREATE_EVENT)]
        event_type: String,
    },

    /// Run the webhook receiver
    Serve {
        /// Address to bind (default: server.bind from config)
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = cycle_autotag::logging::init_with(&cli.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_file = cli
        .config
        .clone()
        .unwrap_or_else(AutotagConfig::default_path);

    match cli.command {
        Commands::Init { force } => handle_init_command(&config_file, force),

        Commands::CheckConfig => handle_check_config(&load_config(&config_file)?),

        Commands::ResolveWorkspace { slug } => {
            let (config, shutdown) = start(&config_file)?;
            let client = build_client(&config, shutdown)?;

            match client.resolve_workspace_id(&slug).await? {
                Some(id) => println!("{}", id),
                None => anyhow::bail!("No workspace found for slug: {}", slug),
            }
            Ok(())
        }

        Commands::Process {
            payload,
            doc_id,
            product_id,
            doctype_id,
            event_type,
        } => {
            let (config, shutdown) = start(&config_file)?;
            let client = build_client(&config, shutdown)?;
            let processor = EventProcessor::from_config(config, client).await?;

            let event = match payload {
                Some(path) => read_payload(&path)?,
                None => InboundEvent {
                    event_type,
                    id: doc_id.context("--doc-id is required without --payload")?,
                    product_id: product_id.unwrap_or_else(|| processor.workspace_id().to_string()),
                    doctype_id,
                },
            };

            let report = processor.handle(&event).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Commands::Serve { bind } => {
            let (config, shutdown) = start(&config_file)?;
            let addr = bind.unwrap_or_else(|| config.server.bind.clone());
            let max_body_size = config.server.max_body_size;
            let client = build_client(&config, shutdown.clone())?;
            let processor = EventProcessor::from_config(config, client).await?;

            WebhookServer::new(processor)
                .with_max_body_size(max_body_size)
                .with_shutdown(shutdown)
                .run(&addr)
                .await?;
            Ok(())
        }
    }
}

fn load_config(config_file: &Path) -> anyhow::Result<AutotagConfig> {
    AutotagConfig::load(config_file).map_err(|e| match e {
        cycle_autotag::AutotagError::Config(msg) if msg.contains("Config file not found") => {
            anyhow::anyhow!(
                "No configuration found at {}. Run 'autotag init' first to create one.",
                config_file.display()
            )
        }
        other => anyhow::Error::new(other),
    })
}

/// Load and validate the config, and wire Ctrl-C to a shutdown signal
fn start(config_file: &Path) -> anyhow::Result<(Arc<AutotagConfig>, watch::Receiver<bool>)> {
    let config = load_config(config_file)?;
    validate_config_result(&config)?;

    tracing::info!(
        endpoint = %config.endpoint,
        rules = config.rules.len(),
        "Configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            let _ = shutdown_tx.send(true);
        }
    });

    Ok((Arc::new(config), shutdown_rx))
}

fn build_client(
    config: &AutotagConfig,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<CycleClient<HttpTransport>> {
    let transport = HttpTransport::from_config(config)?;
    if !transport.is_authenticated() {
        tracing::warn!(
            env_var = %config.token_env,
            "No API token set; requests are unauthenticated"
        );
    }

    Ok(CycleClient::new(transport)
        .with_retry_config(config.retry_config())
        .with_sleeper(Arc::new(TokioSleeper::with_shutdown(shutdown))))
}

fn handle_init_command(config_file: &Path, force: bool) -> anyhow::Result<()> {
    // Check if already initialized
    if config_file.exists() && !force {
        println!("Configuration already exists at {}", config_file.display());
        println!();
        println!("Re-run with --force to overwrite it.");
        return Ok(());
    }

    AutotagConfig::sample()
        .save(config_file)
        .with_context(|| format!("Failed to write {}", config_file.display()))?;

    println!("✓ Created configuration at {}", config_file.display());
    println!();
    println!("Next steps:");
    println!("  1. Fill in workspace_id, attribute_definition_id and the rule option ids");
    println!("  2. Export your API token:");
    println!("     export CYCLE_API_TOKEN=...");
    println!("  3. Check the file:");
    println!("     autotag check-config");

    Ok(())
}

fn handle_check_config(config: &AutotagConfig) -> anyhow::Result<()> {
    match validate_config(config) {
        Ok(()) => {
            println!("✓ Configuration is valid ({} rules)", config.rules.len());
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("  - {}", error);
            }
            anyhow::bail!("{} configuration error(s)", errors.len())
        }
    }
}

fn read_payload(path: &Path) -> anyhow::Result<InboundEvent> {
    let content = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read payload from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload {}", path.display()))?
    };

    serde_json::from_str(&content).context("Invalid event payload")
}
