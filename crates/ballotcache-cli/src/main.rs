//! ballotcache - admin command line for the election data cache.
//!
//! Runs dataset syncs, inspects cache and staleness state, issues cached
//! FEC queries and manages admin accounts and the API key.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ballotcache_core::config::Config;

#[derive(Parser, Debug)]
#[command(name = "ballotcache")]
#[command(about = "Caching FEC client and election dataset manager")]
#[command(version)]
struct Args {
    /// Path to config file (default: $XDG_CONFIG_HOME/ballotcache/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace the stored election dataset and invalidate cached responses
    Sync,
    /// Show dataset staleness and cache usage
    Status,
    /// Run a cached FEC API query and print the JSON response
    Query {
        /// Endpoint path, e.g. /candidate/P80000722/totals
        endpoint: String,
        /// Query parameters as key=value
        params: Vec<String>,
        /// Drop the cached entry and fetch again
        #[arg(long)]
        refetch: bool,
    },
    /// List stored elections or compare two years
    Elections {
        #[arg(long, requires = "comparison")]
        primary: Option<u16>,
        #[arg(long, requires = "primary")]
        comparison: Option<u16>,
    },
    /// Campaign finance figures for a candidate
    Finance {
        candidate_id: String,
        year: u16,
        /// Also summarize this committee's largest disbursements
        #[arg(long)]
        committee: Option<String>,
    },
    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Manage admin accounts and the admin session
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
    /// Manage the FEC API key in the OS keychain
    ApiKey {
        #[command(subcommand)]
        command: ApiKeyCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Remove every cached API response
    Clear,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    Register {
        email: String,
        #[arg(long, default_value = ballotcache_core::auth::DEFAULT_ROLE)]
        role: String,
    },
    Login {
        email: String,
    },
    Logout,
    Whoami,
    /// Change the password of the logged in admin
    Passwd,
}

#[derive(Subcommand, Debug)]
enum ApiKeyCommand {
    /// Store a key; prompts when none is given
    Set { key: Option<String> },
    /// Show the active key, masked
    Show,
    Clear,
}

/// Log to stderr and to a daily file under the cache directory.
/// Keep the returned guard alive so buffered file output is flushed.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match Config::cache_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), "ballotcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let _guard = init_tracing();
    info!(command = ?args.command, "ballotcache starting");

    let mut ctx = commands::Context::open(args.config)?;

    match args.command {
        Command::Sync => commands::sync(&mut ctx).await,
        Command::Status => commands::status(&ctx),
        Command::Query {
            endpoint,
            params,
            refetch,
        } => commands::query(&ctx, &endpoint, &params, refetch).await,
        Command::Elections { primary, comparison } => commands::elections(&ctx, primary.zip(comparison)),
        Command::Finance {
            candidate_id,
            year,
            committee,
        } => commands::finance(&ctx, &candidate_id, year, committee.as_deref()).await,
        Command::Cache {
            command: CacheCommand::Clear,
        } => commands::cache_clear(&mut ctx),
        Command::Admin { command } => match command {
            AdminCommand::Register { email, role } => commands::admin_register(&mut ctx, &email, &role),
            AdminCommand::Login { email } => commands::admin_login(&mut ctx, &email),
            AdminCommand::Logout => commands::admin_logout(&mut ctx),
            AdminCommand::Whoami => commands::admin_whoami(&mut ctx),
            AdminCommand::Passwd => commands::admin_passwd(&mut ctx),
        },
        Command::ApiKey { command } => match command {
            ApiKeyCommand::Set { key } => commands::api_key_set(&mut ctx, key),
            ApiKeyCommand::Show => commands::api_key_show(),
            ApiKeyCommand::Clear => commands::api_key_clear(&mut ctx),
        },
    }
}
