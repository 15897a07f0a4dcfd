//! Tillpoint CLI - Scripted checkouts and local cache tools.
//!
//! # Usage
//!
//! ```bash
//! # Replay a checkout script against the configured gateway
//! checkout-cli run --script scripts/guest-checkout.yaml
//!
//! # Inspect or clear the local checkout cache
//! checkout-cli cache show
//! checkout-cli cache clear --key PAYMENT_TOTALS
//!
//! # Normalize an address the way checkout submits it
//! checkout-cli normalize --address address.yaml --countries countries.yaml
//! ```
//!
//! # Commands
//!
//! - `run` - Mount a checkout and replay a YAML list of actions
//! - `cache` - Show or clear the file-backed checkout cache
//! - `normalize` - Print a gateway-ready address as JSON

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tillpoint_checkout::config::TelemetryConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "checkout-cli")]
#[command(author, version, about = "Tillpoint checkout tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a checkout script against the commerce gateway
    Run {
        /// YAML script with the mount context and the actions
        #[arg(short, long)]
        script: PathBuf,
    },
    /// Inspect the local checkout cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Normalize an address for submission
    Normalize {
        /// YAML file holding one address
        #[arg(short, long)]
        address: PathBuf,

        /// YAML file holding the countries and their regions
        #[arg(short, long)]
        countries: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print live cache entries as JSON
    Show,
    /// Remove one key, or everything
    Clear {
        /// Key to remove (e.g. `PAYMENT_TOTALS`)
        #[arg(short, long)]
        key: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &TelemetryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&TelemetryConfig::from_env());

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tillpoint_checkout=info,checkout_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { script } => commands::run::replay(&script).await?,
        Commands::Cache { action } => match action {
            CacheAction::Show => commands::cache::show().await?,
            CacheAction::Clear { key } => commands::cache::clear(key.as_deref()).await?,
        },
        Commands::Normalize { address, countries } => {
            commands::normalize::print(&address, countries.as_deref()).await?;
        }
    }
    Ok(())
}
