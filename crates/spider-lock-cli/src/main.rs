//! Entry point for the `spider-lock` binary.
//!
//! Loads configuration, connects to Redis, runs one subcommand and exits
//! with the code it returns.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error};

use spider_lock::LockStore;
use spider_lock_cli::{Cli, Settings, commands, logging};
use spider_lock_redis::{ConnectionRegistry, redact_url};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;

    let logging_guard = logging::init_logging(&settings.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let redis_url = redact_url(&settings.redis.url);
    debug!(redis = %redis_url, "Connecting to lock store");

    let registry = ConnectionRegistry::from_settings(&settings.redis);
    let store: Arc<dyn LockStore> = match registry.store(&settings.redis.url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(redis = %redis_url, error = %e, "Lock store unavailable");
            return Err(e).with_context(|| format!("cannot connect to {}", redis_url));
        }
    };

    let code = commands::execute(&cli.command, &settings, store).await?;

    drop(logging_guard);
    std::process::exit(code);
}
