//! Herald: scheduled-content publishing engine.
//!
//! Main binary with subcommands:
//! - `daemon`: periodic scheduler loop plus the operational HTTP API
//! - `process`: one processing tick, for cron invocation
//! - `health`: connectivity probe of all backing integrations

use clap::{Args, Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod daemon;

/// Connection settings for the hosted platforms.
#[derive(Args, Clone)]
pub struct PlatformArgs {
    /// Headless CMS base URL
    #[arg(long, env = "HERALD_CMS_URL")]
    pub cms_url: String,

    /// Headless CMS API token
    #[arg(long, env = "HERALD_CMS_TOKEN")]
    pub cms_token: String,

    /// Relational store REST base URL
    #[arg(long, env = "HERALD_STORE_URL")]
    pub store_url: String,

    /// Relational store API key
    #[arg(long, env = "HERALD_STORE_KEY")]
    pub store_key: String,

    /// Social-posting service base URL
    #[arg(long, env = "HERALD_SOCIAL_URL")]
    pub social_url: String,

    /// Social-posting service API key
    #[arg(long, env = "HERALD_SOCIAL_KEY")]
    pub social_key: String,

    /// Email-delivery service base URL
    #[arg(long, env = "HERALD_EMAIL_URL")]
    pub email_url: String,

    /// Email-delivery service API key
    #[arg(long, env = "HERALD_EMAIL_KEY")]
    pub email_key: String,

    /// Public site base URL, used for published post links
    #[arg(long, env = "HERALD_SITE_URL", default_value = "https://www.driftline.io")]
    pub site_url: String,
}

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Scheduled-content publishing engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler loop and the operational HTTP API
    Daemon {
        #[command(flatten)]
        platform: PlatformArgs,

        /// Operational API port
        #[arg(long, default_value = "8090", env = "HERALD_PORT")]
        port: u16,

        /// Seconds between processing ticks
        #[arg(long, default_value = "300", env = "HERALD_INTERVAL_SECS")]
        interval: u64,

        /// Maximum publishes in flight at once
        #[arg(long, default_value = "3", env = "HERALD_MAX_CONCURRENT")]
        max_concurrent: usize,
    },

    /// Run one processing tick and exit (cron driver)
    ///
    /// Exit codes: 0 all published, 1 at least one terminal failure,
    /// 2 health check failed before processing.
    Process {
        #[command(flatten)]
        platform: PlatformArgs,

        /// Skip the connectivity probe before processing
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Probe all backing integrations and exit (0 healthy, 2 unhealthy)
    Health {
        #[command(flatten)]
        platform: PlatformArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with a reloadable filter so the log level can be
    // changed at runtime through the config endpoint.
    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "herald=info".to_string()),
    );
    let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let reload: herald_web::LogLevelReload = std::sync::Arc::new(move |directive: &str| {
        let parsed = directive
            .parse::<EnvFilter>()
            .map_err(|e| format!("invalid filter '{}': {}", directive, e))?;
        reload_handle
            .reload(parsed)
            .map_err(|e| format!("reload failed: {}", e))
    });

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            platform,
            port,
            interval,
            max_concurrent,
        } => daemon::run(&platform, port, interval, max_concurrent, reload).await,

        Commands::Process {
            platform,
            skip_health_check,
        } => {
            let code = daemon::process_once(&platform, skip_health_check).await?;
            std::process::exit(code);
        }

        Commands::Health { platform } => {
            let code = daemon::health(&platform).await;
            std::process::exit(code);
        }
    }
}
