//! Runtime settings
//!
//! Admin-editable key-value state: the maintenance flag and SMTP
//! delivery parameters. The maintenance flag is checked on every
//! request, so it sits behind the cache.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::SettingsRepository;
use crate::models::setting::keys;
use crate::models::Setting;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

const MAINTENANCE_CACHE_KEY: &str = "settings:maintenance";
const MAINTENANCE_CACHE_TTL: Duration = Duration::from_secs(10);

pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    cache: Arc<Cache>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// Whether the instance is in maintenance mode. Cached briefly since
    /// every request checks this.
    pub async fn maintenance_mode(&self) -> Result<bool> {
        if let Ok(Some(cached)) = self.cache.get::<bool>(MAINTENANCE_CACHE_KEY).await {
            return Ok(cached);
        }

        let enabled = self
            .repo
            .get(keys::MAINTENANCE_MODE)
            .await
            .context("Failed to read maintenance flag")?
            .map(|v| v == "true")
            .unwrap_or(false);

        let _ = self
            .cache
            .set(MAINTENANCE_CACHE_KEY, &enabled, MAINTENANCE_CACHE_TTL)
            .await;

        Ok(enabled)
    }

    pub async fn set_maintenance_mode(&self, enabled: bool) -> Result<()> {
        self.repo
            .set(keys::MAINTENANCE_MODE, if enabled { "true" } else { "false" })
            .await
            .context("Failed to set maintenance flag")?;
        self.cache.delete(MAINTENANCE_CACHE_KEY).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.repo.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.repo.set(key, value).await
    }

    pub async fn get_all(&self) -> Result<Vec<Setting>> {
        self.repo.get_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxSettingsRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SettingsService {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");

        SettingsService::new(
            Arc::new(SqlxSettingsRepository::new(pool)),
            Arc::new(Cache::Memory(MemoryCache::new())),
        )
    }

    #[tokio::test]
    async fn test_maintenance_defaults_off() {
        let service = setup().await;
        assert!(!service.maintenance_mode().await.expect("read"));
    }

    #[tokio::test]
    async fn test_maintenance_toggle_invalidates_cache() {
        let service = setup().await;

        assert!(!service.maintenance_mode().await.expect("read"));
        service.set_maintenance_mode(true).await.expect("set");
        assert!(service.maintenance_mode().await.expect("read"));
        service.set_maintenance_mode(false).await.expect("unset");
        assert!(!service.maintenance_mode().await.expect("read"));
    }

    #[tokio::test]
    async fn test_smtp_settings_roundtrip() {
        let service = setup().await;
        service
            .set(keys::SMTP_HOST, "smtp.example.com")
            .await
            .expect("set");
        assert_eq!(
            service.get(keys::SMTP_HOST).await.expect("get"),
            Some("smtp.example.com".to_string())
        );
    }
}
