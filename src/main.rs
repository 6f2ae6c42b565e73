use std::sync::Arc;

use randmeet::bot::Bot;
use randmeet::config::BotConfig;
use randmeet::store::{LibSqlStore, ProfileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("RandMeet v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.database_path);

    let store: Arc<dyn ProfileStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.database_path)).await?,
    );

    let mut bot = Bot::new(config, store);
    bot.run().await;
    Ok(())
}
