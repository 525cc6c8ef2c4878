use anyhow::{Context, Result};
use clap::Parser;
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::Arc;

use feedbox::api::{create_router, AppState};
use feedbox::auth::issue_token;
use feedbox::config::Config;
use feedbox::feed::{HttpFeedSource, Refresher};
use feedbox::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "feedbox", about = "RSS/Atom aggregator backend")]
struct Args {
    /// Configuration file
    #[arg(long, value_name = "FILE", default_value = "feedbox.toml")]
    config: PathBuf,

    /// Address to listen on (overrides config)
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// SQLite database path (overrides config)
    #[arg(long, value_name = "PATH")]
    db: Option<String>,

    /// Serve every route without authentication
    #[arg(long)]
    no_auth: bool,

    /// Issue a new API token, print it and exit
    #[arg(long)]
    create_token: bool,

    /// Lifetime of the issued token in seconds (default: never expires)
    #[arg(long, value_name = "SECS", requires = "create_token")]
    valid_for: Option<i64>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(db) = &self.db {
            config.database = db.clone();
        }
        if self.no_auth {
            config.disable_auth = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    args.apply(&mut config);

    let db = Database::open(&config.database)
        .await
        .with_context(|| format!("Failed to open database {}", config.database))?;

    if args.create_token {
        let valid_for = args.valid_for.map(chrono::Duration::seconds);
        let issued = issue_token(&db, valid_for)
            .await
            .context("Failed to create token")?;
        println!("{}", issued.token.expose_secret());
        if let Some(until) = issued.record.valid_until {
            eprintln!("Valid until {}", until.to_rfc3339());
        }
        return Ok(());
    }

    if config.disable_auth {
        tracing::warn!("Authentication is disabled, every request is accepted");
    }

    let source = HttpFeedSource::from_config(&config).context("Failed to build HTTP client")?;
    let refresher = Arc::new(
        Refresher::new(db.clone(), source)
            .with_fetch_timeout(config.fetch_timeout())
            .with_policy(config.on_feed_error),
    );

    match config.refresh_interval() {
        Some(period) => {
            let scheduled = Arc::clone(&refresher);
            tokio::spawn(async move { scheduled.run(period).await });
        }
        None => tracing::info!("Background refresh disabled"),
    }

    let app = create_router(AppState {
        db,
        refresher,
        auth_disabled: config.disable_auth,
        allow_private_feeds: config.allow_private_feeds,
    });

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    tracing::info!(addr = %config.listen, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("Server error")?;

    tracing::info!("Shut down");
    Ok(())
}
