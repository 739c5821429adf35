//! Application wiring
//!
//! - `config`: Configuration types
//! - `loader`: Layered configuration loading
//! - `providers`: Provider construction from config and environment

pub mod config;
pub mod loader;
pub mod providers;

use anyhow::{Context, Result};
use mentora_core::{ConversationStore, HealthRegistry, SqliteStore, TurnOrchestrator};
use std::sync::Arc;
use tracing::info;

pub use self::config::AppConfig;
pub use self::loader::load_config;

/// Everything a CLI command needs
pub struct App {
    pub config: AppConfig,
    pub store: Arc<dyn ConversationStore>,
    pub orchestrator: TurnOrchestrator,
}

impl App {
    /// Open the store and register providers
    pub async fn init(config: AppConfig) -> Result<Self> {
        let sqlite = match config.database.path() {
            Some(path) => SqliteStore::new(&path).await,
            None => SqliteStore::new_default().await,
        }
        .context("Failed to open conversation database")?;
        let store: Arc<dyn ConversationStore> = Arc::new(sqlite);

        let health = Arc::new(HealthRegistry::new(config.breaker_config()));
        let mut orchestrator =
            TurnOrchestrator::new(Arc::clone(&store), health, config.orchestrator_config());
        for provider in providers::resolve_providers(&config) {
            orchestrator.register(provider);
        }

        info!(
            providers = ?orchestrator.provider_names(),
            "Mentora initialized"
        );
        Ok(Self {
            config,
            store,
            orchestrator,
        })
    }
}
