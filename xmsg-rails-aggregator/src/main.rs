//! xmsg-rails-aggregator
//!
//! HTTP rail for one quorum aggregator. Configuration comes from the
//! environment (or a `.env` file); see `config.rs` for the variables.

use tracing::info;

use xmsg_rails_aggregator::config::RailConfig;
use xmsg_rails_aggregator::main_entry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xmsg_rails_aggregator=info,xmsg_aggregator=info".into()),
        )
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = RailConfig::from_env()?;

    info!("Starting xmsg-rails-aggregator");
    info!("Chain: {}", config.chain);
    info!(
        "Gateways: {:?}",
        config.gateways.iter().map(|g| g.id.as_str()).collect::<Vec<_>>()
    );

    main_entry::run_server(config).await
}
