//! # murmur-node
//!
//! Opens the local vault and reports what the polling scheduler would do
//! next:
//! - how many profiles and chats are stored
//! - the oldest poll stamp any chat is waiting on
//! - the anonymity buckets that stamp's chats are spread over (JSON on
//!   stdout)

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use murmur_poll::PollPlanner;
use murmur_shared::service::RandomIdSource;
use murmur_store::{
    ChatRepository, Grammars, IdentifierGenerator, ProfileRepository, StoreConfig, Vault,
};

fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,murmur_store=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting murmur node v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = StoreConfig::from_env();
    info!(?config, "Loaded configuration");

    let secret = Zeroizing::new(
        std::env::var("MURMUR_SECRET").context("MURMUR_SECRET must be set to unlock the vault")?,
    );

    // -----------------------------------------------------------------------
    // 3. Open the vault and repositories
    // -----------------------------------------------------------------------
    let vault = Arc::new(Vault::open(&config.data_dir)?);
    vault.init(secret.as_bytes())?;

    let grammars = Grammars::compile(&config)?;
    let ids = IdentifierGenerator::new(Arc::new(RandomIdSource));
    let profiles = ProfileRepository::new(vault.clone(), ids.clone(), grammars.clone());
    let chats = ChatRepository::new(vault, ids, grammars);

    info!(
        profiles = profiles.all()?.len(),
        chats = chats.all()?.len(),
        "Vault contents"
    );

    // -----------------------------------------------------------------------
    // 4. Plan the next poll
    // -----------------------------------------------------------------------
    let planner = PollPlanner::new(config.poll_buckets);
    match planner.plan_oldest(&chats)? {
        Some((stamp, subscriptions)) => {
            info!(stamp = %stamp, buckets = subscriptions.len(), "Next poll");
            println!("{}", serde_json::to_string_pretty(&subscriptions)?);
        }
        None => info!("No chats to poll"),
    }

    Ok(())
}
