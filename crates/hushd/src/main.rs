use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "hushd",
    about = "Hushd — one-time secret sharing server daemon",
    version
)]
struct Cli {
    /// Log level: error, warn, info, debug, verbose (default: $HUSH_LOG_LEVEL or warn)
    #[arg(long, global = true, env = "HUSH_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Hush HTTP server
    Serve {
        /// Port to listen on (default: $HUSH_PORT or 39999)
        #[arg(long, env = "HUSH_PORT", default_value = "39999")]
        port: u16,
        /// Host to bind (default: $HUSH_HOST or 0.0.0.0)
        #[arg(long, env = "HUSH_HOST", default_value = "0.0.0.0")]
        host: String,
    },
    /// Delete expired secrets from the database (offline). Run it from cron
    /// when the in-process sweep is disabled.
    Prune,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let raw = cli.log_level.clone().unwrap_or_else(|| "warn".into());
    let effective_log_level = if raw.eq_ignore_ascii_case("verbose") {
        "debug".to_owned()
    } else {
        raw
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&effective_log_level))
        .init();

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(host, port).await,
        Commands::Prune => cmd_prune(),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(host: String, port: u16) -> Result<()> {
    let cfg = hush_server::ServerConfig {
        host,
        port,
        ..hush_server::ServerConfig::from_env()?
    };

    hush_server::run(cfg).await
}

fn cmd_prune() -> Result<()> {
    let data_dir_env: Option<std::path::PathBuf> =
        std::env::var("HUSH_DATA_DIR").ok().map(Into::into);
    let data_dir = hush_server::resolve_data_dir(data_dir_env.as_ref())?;

    let db_path = data_dir.join("hush.db");
    let store = hush_server::store::Store::open(&db_path)
        .context("open store — is another hushd holding the database?")?;

    let pruned = store.prune(hush_server::store::unix_now())?;
    let remaining = store.count()?;

    println!("pruned {pruned} expired secret(s); {remaining} remaining");
    Ok(())
}
