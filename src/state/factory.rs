use crate::config::{StateBackend, StateConfig};
use crate::error::{AppError, Result};
use crate::state::{GuardianStore, InMemoryStore, RedisStore};
use std::sync::Arc;

/// Create a guardian store based on configuration
pub async fn create_store(config: &StateConfig) -> Result<Arc<dyn GuardianStore>> {
    match config.backend {
        StateBackend::Memory => Ok(create_in_memory_store()),

        StateBackend::Redis => {
            let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                AppError::Configuration(
                    "Redis backend requires 'redis_url' configuration".to_string(),
                )
            })?;

            tracing::info!(url = %redis_url, "Initializing Redis storage backend");

            let store = RedisStore::new_with_prefix(redis_url, &config.key_prefix).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> Arc<dyn GuardianStore> {
    tracing::info!("Initializing in-memory storage backend");
    Arc::new(InMemoryStore::new())
}
