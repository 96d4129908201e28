//! `ldapcheck`: look up a directory user by login name or email address.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dirlookup_core::{ConfigLoader, DirectoryConfig, Identifier, IdentifierKind, UserRecord};
use dirlookup_ldap::Searcher;
use tracing::{debug, error};

#[derive(Debug, Parser)]
#[command(name = "ldapcheck", version, about = "Look up a directory user by login or email")]
struct Cli {
    /// Login name or email address to look up
    identifier: String,

    /// Identifier kind (`login` or `email`); inferred from the value when omitted
    #[arg(long, value_name = "KIND")]
    by: Option<String>,

    /// Configuration file tried before the default locations
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Ignore configuration files and read LDAP_* environment variables only
    #[arg(long)]
    env_only: bool,

    /// Connect without requiring a bind password
    #[arg(long)]
    anonymous: bool,

    /// Print the full record as JSON
    #[arg(long)]
    json: bool,

    /// Overall deadline for connecting and searching, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err);
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let identifier = parse_identifier(&cli.identifier, cli.by.as_deref())?;
    let config = load_config(cli);

    let user = match cli.timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), lookup(cli, config, &identifier))
            .await
            .with_context(|| format!("lookup timed out after {secs}s"))??,
        None => lookup(cli, config, &identifier).await?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        print_user(&user);
    }
    Ok(())
}

/// Infrastructure failures are logged as errors; expected outcomes such as a missing user only
/// at debug level.
fn report_failure(err: &anyhow::Error) {
    match err.downcast_ref::<dirlookup_core::Error>() {
        Some(lookup_err) if is_infrastructure_failure(err) => {
            error!(code = lookup_err.error_code(), "lookup failed");
        }
        Some(lookup_err) => debug!(code = lookup_err.error_code(), "lookup failed"),
        None => debug!("lookup failed: {err:#}"),
    }
}

fn is_infrastructure_failure(err: &anyhow::Error) -> bool {
    err.downcast_ref::<dirlookup_core::Error>()
        .is_some_and(dirlookup_core::Error::should_log)
}

fn parse_identifier(value: &str, kind: Option<&str>) -> Result<Identifier> {
    let identifier = match kind {
        Some(kind) => Identifier::new(kind.parse::<IdentifierKind>()?, value),
        None => Identifier::infer(value),
    };
    identifier.validate()?;
    Ok(identifier)
}

fn load_config(cli: &Cli) -> DirectoryConfig {
    let mut loader = ConfigLoader::from_env();
    if cli.env_only {
        return loader.load_env_only();
    }
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    debug!(environment = %loader.environment(), "loading configuration");
    loader.load()
}

async fn lookup(cli: &Cli, config: DirectoryConfig, identifier: &Identifier) -> Result<UserRecord> {
    let server = config.primary_server().unwrap_or_default().to_string();
    let mut searcher = if cli.anonymous {
        Searcher::connect(config).await
    } else {
        Searcher::connect_with_defaults(config).await
    }
    .context("failed to create searcher")?;

    debug!(%server, %identifier, "searching");
    let result = searcher.get_user(identifier).await;
    if let Err(err) = searcher.close().await {
        debug!("error closing connection: {err}");
    }
    result.with_context(|| format!("lookup of {} `{}` failed", identifier.kind, identifier.value))
}

fn print_user(user: &UserRecord) {
    println!("Found user: {} ({})", user.uid, user.email);
    println!("Name: {}", user.display_name);
    if !user.title.is_empty() {
        println!("Title: {}", user.title);
    }
    if let Some(manager) = user.manager_uid() {
        println!("Manager: {manager}");
    }
    if !user.location.is_empty() {
        println!("Location: {}", user.location);
    }
    if !user.cost_center.is_empty() {
        if user.cost_center_desc.is_empty() {
            println!("Cost Center: {}", user.cost_center);
        } else {
            println!("Cost Center: {} ({})", user.cost_center, user.cost_center_desc);
        }
    }
    if let Some(hired) = user.hired_at() {
        println!("Hired: {}", hired.format("%Y-%m-%d"));
    }
    if user.is_terminated() {
        match user.terminated_at() {
            Some(terminated) => println!("Terminated: {}", terminated.format("%Y-%m-%d")),
            None => println!("Terminated: {}", user.term_date),
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ldapcheck={level},dirlookup={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
