// src/pipeline/validate.rs

use std::path::Path;

use crate::config::load_all;
use crate::error::Result;

/// Validate configuration, seed data and discovered sources using load_all.
pub async fn run_validate(base_path: &Path) -> Result<()> {
    log::info!("Validating configuration in {}", base_path.display());

    match load_all(base_path).await {
        Ok((config, registry)) => {
            log::info!("Configuration OK");
            log::info!("  user_agent: {}", config.crawler.user_agent);
            log::info!("  timeout: {}s", config.crawler.timeout_secs);
            log::info!("  max_concurrent: {}", config.crawler.max_concurrent);
            log::info!("  model: {}", config.classifier.model);

            log::info!("Competitor registry OK");
            log::info!("  competitors: {}", registry.competitors().len());
            log::info!("  discovered sources: {}", registry.discovered().len());
            if registry.sources(u8::MAX).is_empty() {
                log::warn!("  no sources registered; crawl will fail until discovery runs");
            }
            for competitor in registry.competitors() {
                log::debug!(
                    "  {} (priority {}): {} sources",
                    competitor.name,
                    competitor.priority,
                    registry.source_count(&competitor.name)
                );
            }
            for key in [&config.classifier.api_key_env, &config.search.api_key_env] {
                let present = std::env::var(key).is_ok_and(|v| !v.trim().is_empty());
                log::info!("  {}: {}", key, if present { "set" } else { "not set" });
            }
            Ok(())
        }
        Err(e) => {
            log::error!("Validation failed: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_validate_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(run_validate(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_rejects_bad_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[crawler]\nmax_concurrent = 0\n").unwrap();
        assert!(run_validate(dir.path()).await.is_err());
    }
}
