//! Leafcert - reconcile CA-issued leaf certificates against a desired configuration
//!
//! Each managed certificate is addressed by an identifier of the caller's
//! choosing. `apply` issues, renews or replaces it as the configuration
//! requires, `refresh` renews it once it enters its renewal window, and
//! `destroy` revokes it and forgets it.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use serde_json::json;
use tracing::{info, warn};

use leafcert_reconciler::models::{DesiredConfig, Diagnostic, LeafCertificateConfig};
use leafcert_reconciler::utils::parse_duration;
use leafcert_reconciler::{
    config, db, services, telemetry, AppConfig, CertError, CertificateManager, OperationContext,
    Reconciler,
};

enum Command {
    Apply { config: PathBuf, id: String },
    Refresh { id: String },
    Destroy { id: String },
    Show { id: String },
    List,
    Expiring { within: String },
}

fn parse_command(args: &[String]) -> Result<Command> {
    let positional: Vec<&str> = args
        .iter()
        .skip(1)
        .map(String::as_str)
        .filter(|a| !a.starts_with('-'))
        .collect();

    match positional.as_slice() {
        ["apply", config, id] => Ok(Command::Apply {
            config: PathBuf::from(config),
            id: id.to_string(),
        }),
        ["refresh", id] => Ok(Command::Refresh { id: id.to_string() }),
        ["destroy", id] => Ok(Command::Destroy { id: id.to_string() }),
        ["show", id] => Ok(Command::Show { id: id.to_string() }),
        ["list"] => Ok(Command::List),
        ["expiring", within] => Ok(Command::Expiring {
            within: within.to_string(),
        }),
        _ => anyhow::bail!("Invalid arguments. Run with --help for usage."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    // Check for --help flag
    if args.len() < 2 || args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    // Check for --version flag
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("leafcert {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let command = parse_command(&args)?;

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must be kept alive so file output is flushed
    let _log_guard = telemetry::init_logging(&config.logging);

    ensure_data_directory(&config)?;
    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;
    let store = Arc::new(db::SqliteStateStore::new(pool));

    info!("Initializing signing service client: {}", config.signing_service.url);
    let client = services::HttpSigningClient::new(&config.signing_service)
        .context("Failed to initialize signing service client")?;
    let reconciler =
        Reconciler::new(Arc::new(client)).with_source_tag(config.reconcile.source_tag.clone());
    let manager = CertificateManager::new(reconciler, store.clone());

    let ctx = operation_context(&config.reconcile);

    match run(&manager, &store, &ctx, command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            e.log();
            print_diagnostics(&[Diagnostic::error(e.kind(), e.to_string())])?;
            std::process::exit(1);
        }
    }
}

/// Operation context cancelled on Ctrl-C
fn operation_context(config: &config::ReconcileConfig) -> OperationContext {
    let mut ctx = OperationContext::new();
    if let Some(limit) = config.operation_timeout() {
        ctx = ctx.with_timeout(limit);
    }

    let token = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
    ctx
}

async fn run(
    manager: &CertificateManager,
    store: &db::SqliteStateStore,
    ctx: &OperationContext,
    command: Command,
) -> Result<(), CertError> {
    match command {
        Command::Apply { config, id } => {
            let desired = read_desired_config(&config)?;
            let outcome = manager.apply(ctx, &id, desired).await?;
            print_json(&json!({
                "id": id,
                "action": outcome.action,
                "state": outcome.state,
            }))?;
            print_diagnostics(&outcome.diagnostics)
        }
        Command::Refresh { id } => {
            let outcome = manager.refresh(ctx, &id).await?;
            print_json(&json!({
                "id": id,
                "action": outcome.action,
                "state": outcome.state,
            }))?;
            print_diagnostics(&outcome.diagnostics)
        }
        Command::Destroy { id } => {
            let diagnostics = manager.destroy(ctx, &id).await?;
            print_json(&json!({ "id": id, "action": "destroyed" }))?;
            print_diagnostics(&diagnostics)
        }
        Command::Show { id } => {
            let state = manager
                .get(&id)
                .await?
                .ok_or_else(|| CertError::NotFound(format!("No managed certificate named {:?}", id)))?;
            print_json(&json!({ "id": id, "state": state }))
        }
        Command::List => print_json(&json!(manager.list().await?)),
        Command::Expiring { within } => list_expiring(store, &within).await,
    }
}

/// Identities whose certificate expires within `within` from now
async fn list_expiring(store: &db::SqliteStateStore, within: &str) -> Result<(), CertError> {
    let window = TimeDelta::from_std(parse_duration(within)?)
        .map_err(|e| CertError::Validation(format!("Invalid window {:?}: {}", within, e)))?;
    let cutoff = Utc::now()
        .checked_add_signed(window)
        .ok_or_else(|| CertError::Validation(format!("Invalid window {:?}", within)))?;

    let ids = store.expiring_before(cutoff).await?;
    print_json(&json!(ids))
}

fn read_desired_config(path: &Path) -> Result<DesiredConfig, CertError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CertError::Config(format!("Failed to read {:?}: {}", path, e)))?;
    let wire: LeafCertificateConfig = serde_norway::from_str(&contents)
        .map_err(|e| CertError::Validation(format!("Failed to parse {:?}: {}", path, e)))?;
    DesiredConfig::try_from(wire)
}

fn print_json(value: &serde_json::Value) -> Result<(), CertError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CertError::Storage(format!("Failed to render output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic]) -> Result<(), CertError> {
    for diagnostic in diagnostics {
        let text = serde_json::to_string(diagnostic)
            .map_err(|e| CertError::Storage(format!("Failed to render output: {}", e)))?;
        eprintln!("{}", text);
    }
    Ok(())
}

/// Ensure the data directory exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    // Extract directory from database URL
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

/// Print help message
fn print_help() {
    println!(
        r#"leafcert {}

USAGE:
    leafcert <COMMAND> [ARGS]

COMMANDS:
    apply <config.yaml> <id>    Issue, renew or replace certificate <id> so it
                                matches the leaf certificate configuration
    refresh <id>                Recompute renewal readiness, renewing when due
    destroy <id>                Revoke certificate <id> and forget it
    show <id>                   Print the recorded state of <id>
    list                        List managed certificates
    expiring <duration>         List certificates expiring within <duration>,
                                e.g. "336h"

OPTIONS:
    -h, --help                  Print this help message
    -V, --version               Print version information

ENVIRONMENT:
    LEAFCERT_CONFIG             Path to configuration file
    LEAFCERT_SIGNING_URL        Signing service base URL
    LEAFCERT_SIGNING_TOKEN      Bearer token for the signing service
    LEAFCERT_OPERATION_TIMEOUT  Upper bound on one operation, in seconds
    DATABASE_URL                State database (default: sqlite://./data/leafcert.db)

CONFIGURATION:
    The configuration file is looked up in the following order:
    1. Path specified by LEAFCERT_CONFIG environment variable
    2. ./leafcert.yaml
    3. ./config/leafcert.yaml
    4. /etc/leafcert/leafcert.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
