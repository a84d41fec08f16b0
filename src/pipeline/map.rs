// src/pipeline/map.rs

use std::collections::HashSet;

use futures::{StreamExt, future, stream};

use crate::error::Result;
use crate::models::Source;
use crate::pipeline::crawl::CrawlContext;
use crate::services::SourceDiscovery;

/// Discover sources from competitor homepages.
///
/// Returns the complete discovered-source list to persist. Competitors outside
/// `max_priority`, or that already have discovered sources when `force` is
/// off, keep what the registry holds. A competitor whose homepage fails keeps
/// its previous sources too.
pub async fn run_discovery(
    ctx: &CrawlContext,
    max_priority: u8,
    force: bool,
) -> Result<Vec<Source>> {
    let discovery = SourceDiscovery::new(ctx.fetcher.clone(), &ctx.config.discovery)?;
    let discovery = &discovery;
    let registry = &ctx.registry;

    let already: HashSet<&str> = registry
        .discovered()
        .iter()
        .map(|s| s.competitor.as_str())
        .collect();
    let targets: Vec<_> = registry
        .active_competitors(max_priority)
        .into_iter()
        .filter(|c| force || !already.contains(c.name.as_str()))
        .collect();

    log::info!(
        "Discovering sources for {} competitors ({} skipped)",
        targets.len(),
        registry.active_competitors(max_priority).len() - targets.len()
    );

    let found: Vec<(String, Option<Vec<Source>>)> = stream::iter(targets)
        .take_while(|_| future::ready(!ctx.control.is_cancelled()))
        .map(|competitor| async move {
            match discovery.discover(competitor).await {
                Ok(sources) => (competitor.name.clone(), Some(sources)),
                Err(e) => {
                    log::warn!("[{}] discovery failed: {}", competitor.name, e);
                    (competitor.name.clone(), None)
                }
            }
        })
        .buffered(ctx.config.crawler.max_concurrent.max(1))
        .collect()
        .await;

    let refreshed: HashSet<&str> = found
        .iter()
        .filter(|(_, sources)| sources.is_some())
        .map(|(name, _)| name.as_str())
        .collect();

    // Keep previous sources of competitors that were not refreshed, in order.
    let mut sources: Vec<Source> = registry
        .discovered()
        .iter()
        .filter(|s| !refreshed.contains(s.competitor.as_str()))
        .cloned()
        .collect();
    let total_new: usize = found
        .iter()
        .filter_map(|(_, sources)| sources.as_ref().map(Vec::len))
        .sum();
    sources.extend(found.into_iter().filter_map(|(_, sources)| sources).flatten());

    log::info!(
        "Discovery complete: {} new sources, {} total",
        total_new,
        sources.len()
    );
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::error::FetchError;
    use crate::models::{Competitor, Config, Registry, SourceKind};
    use crate::services::Fetcher;
    use crate::storage::MemoryStorage;

    struct Pages(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl Fetcher for Pages {
        async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
            self.0
                .get(url)
                .map(|html| html.to_string())
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    fn competitor(name: &str, website: &str) -> Competitor {
        Competitor {
            name: name.into(),
            website: website.into(),
            category: "modern".into(),
            description: String::new(),
            priority: 1,
            enabled: true,
            search_terms: vec![],
            sources: vec![],
        }
    }

    fn old_source(competitor: &str, url: &str) -> Source {
        Source {
            competitor: competitor.into(),
            url: url.into(),
            label: "Old".into(),
            kind: SourceKind::FeatureDocs,
        }
    }

    fn context(discovered: Vec<Source>) -> CrawlContext {
        let pages = Pages(HashMap::from([(
            "https://alpha.com",
            r#"<a href="/release-notes">Release notes</a>"#,
        )]));
        let registry = Registry::new(
            vec![
                competitor("Alpha", "https://alpha.com"),
                competitor("Beta", "https://beta.com"),
            ],
            discovered,
        );
        CrawlContext::new(
            Config::default(),
            registry,
            Arc::new(pages),
            Arc::new(MemoryStorage::new()),
        )
    }

    #[tokio::test]
    async fn test_discovery_skips_failed_homepages() {
        let ctx = context(vec![]);
        let sources = run_discovery(&ctx, 1, false).await.unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].competitor, "Alpha");
        assert_eq!(sources[0].url, "https://alpha.com/release-notes");
    }

    #[tokio::test]
    async fn test_discovery_keeps_existing_without_force() {
        let ctx = context(vec![old_source("Alpha", "https://alpha.com/old")]);

        let kept = run_discovery(&ctx, 1, false).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://alpha.com/old");

        let refreshed = run_discovery(&ctx, 1, true).await.unwrap();
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].url, "https://alpha.com/release-notes");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_sources() {
        let ctx = context(vec![old_source("Beta", "https://beta.com/old")]);
        let sources = run_discovery(&ctx, 1, true).await.unwrap();

        let urls: Vec<_> = sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://beta.com/old", "https://alpha.com/release-notes"]);
    }
}
