// src/config.rs

//! Configuration loading utilities.
//!
//! Everything a run needs is read once from the storage directory:
//! `config.toml` (settings), `seed.toml` (competitors) and `sources.json`
//! (discovered sources). Missing files fall back to built-in defaults.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{Config, Registry, Seed, Source};

pub const CONFIG_FILE: &str = "config.toml";
pub const SEED_FILE: &str = "seed.toml";
pub const SOURCES_FILE: &str = "sources.json";

/// Path of the discovered-sources file under a storage directory.
pub fn sources_path(base_path: &Path) -> PathBuf {
    base_path.join(SOURCES_FILE)
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file is missing or unreadable.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load_or_default(path)
    } else {
        log::debug!("No config at {:?}; using defaults", path);
        Config::default()
    };
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration: {e}")))?;
    Ok(config)
}

/// Load seed data from a TOML file.
///
/// A missing file yields the built-in competitor list; a malformed one is an
/// error so that a typo never silently swaps the monitored set.
pub fn load_seed(path: &Path) -> Result<Seed> {
    if !path.exists() {
        log::debug!("No seed at {:?}; using built-in competitors", path);
        return Ok(Seed::default());
    }
    let seed = Seed::load(path)?;
    seed.validate()
        .map_err(|e| AppError::config(format!("Invalid seed data: {e}")))?;
    Ok(seed)
}

/// Load previously discovered sources, if any.
pub async fn load_sources(path: &Path) -> Result<Vec<Source>> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(Vec::new());
    }
    Source::load_all(path).await
}

/// Load and validate configuration, seed data and discovered sources.
pub async fn load_all(base_path: &Path) -> Result<(Config, Registry)> {
    let config = load_config(&base_path.join(CONFIG_FILE))?;
    let seed = load_seed(&base_path.join(SEED_FILE))?;
    let discovered = load_sources(&sources_path(base_path)).await?;

    let registry = Registry::new(seed.competitors, discovered);
    registry
        .validate()
        .map_err(|e| AppError::config(format!("Invalid competitor registry: {e}")))?;

    Ok((config, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_all_defaults_from_empty_dir() {
        let dir = TempDir::new().unwrap();
        let (config, registry) = load_all(dir.path()).await.unwrap();

        assert_eq!(config.crawler.max_concurrent, 4);
        assert!(!registry.competitors().is_empty());
        assert!(registry.discovered().is_empty());
    }

    #[tokio::test]
    async fn test_load_all_reads_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[crawler]\nmax_concurrent = 2\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(SEED_FILE),
            r#"
[[competitors]]
name = "Rillet"
website = "https://www.rillet.com"
category = "modern"
priority = 1
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join(SOURCES_FILE),
            r#"[{"competitor": "Rillet", "url": "https://www.rillet.com/changelog", "label": "Changelog", "kind": "release_notes"}]"#,
        )
        .unwrap();

        let (config, registry) = load_all(dir.path()).await.unwrap();
        assert_eq!(config.crawler.max_concurrent, 2);
        assert_eq!(registry.competitors().len(), 1);
        assert_eq!(registry.sources(1).len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_seed_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SEED_FILE), "competitors = 3").unwrap();
        assert!(load_all(dir.path()).await.is_err());
    }
}
