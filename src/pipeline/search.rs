//! Search ingestion pipeline.
//!
//! Queries the search provider with every competitor search term and turns
//! unseen, relevant hits into events. A hit is marked processed once handled
//! so later runs skip it.

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{CrawlStats, Freshness, event_id};
use crate::pipeline::crawl::{CrawlBudget, CrawlContext};
use crate::services::{ClassifyOutcome, ClassifyRequest, EventClassifier, IngestPath, SearchHit};

/// Prefix of processed-hit marker keys.
pub const MARKER_PREFIX: &str = "intel:";

/// Marker key for a hit URL: prefix plus the first 16 hex chars of its SHA-256.
pub fn dedup_key(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    format!("{}{}", MARKER_PREFIX, &digest[..16])
}

/// Run the search path for the active competitors.
///
/// Requires a configured search provider. `max_urls` does not apply here;
/// the number of queries is bounded by the competitors' search terms.
pub async fn run_search_crawl(
    ctx: &CrawlContext,
    budget: &CrawlBudget,
    freshness: Freshness,
) -> Result<CrawlStats> {
    let provider = ctx.search.clone().ok_or_else(|| {
        AppError::config(format!(
            "no search provider configured (set {})",
            ctx.config.search.api_key_env
        ))
    })?;

    let mut stats = CrawlStats::start();
    let classifier = ctx.classifier.for_run();
    let count = ctx.config.search.results_per_query;

    let competitors: Vec<_> = ctx
        .registry
        .active_competitors(budget.max_priority)
        .into_iter()
        .take(budget.max_competitors.unwrap_or(usize::MAX))
        .collect();
    log::info!(
        "Starting search crawl for {} competitors (freshness={})",
        competitors.len(),
        freshness
    );

    'competitors: for competitor in competitors {
        stats.competitors.insert(competitor.name.clone());

        for term in &competitor.search_terms {
            if ctx.control.is_cancelled() {
                stats.cancelled = true;
                break 'competitors;
            }

            let hits = match provider.search(term, count, freshness).await {
                Ok(hits) => {
                    stats.sources_crawled += 1;
                    hits
                }
                Err(e) => {
                    stats.sources_failed += 1;
                    log::warn!("[{}] search '{}' failed: {}", competitor.name, term, e);
                    continue;
                }
            };
            log::debug!("[{}] '{}': {} hits", competitor.name, term, hits.len());

            for hit in hits {
                ingest_hit(
                    ctx,
                    &classifier,
                    &competitor.name,
                    &competitor.category,
                    &hit,
                    &mut stats,
                )
                .await;
            }
        }
    }

    stats.finish();
    stats.log_summary("Search crawl");
    Ok(stats)
}

async fn ingest_hit(
    ctx: &CrawlContext,
    classifier: &EventClassifier,
    competitor: &str,
    category: &str,
    hit: &SearchHit,
    stats: &mut CrawlStats,
) {
    if hit.url.is_empty() {
        return;
    }

    let key = dedup_key(&hit.url);
    match ctx.storage.exists(&key).await {
        Ok(true) => {
            log::debug!("[{}] already processed: {}", competitor, hit.url);
            return;
        }
        Ok(false) => {}
        Err(e) => {
            stats.persistence_failures += 1;
            log::warn!("[{}] marker lookup failed for {}: {}", competitor, hit.url, e);
            return;
        }
    }
    stats.chunks_changed += 1;

    let content_hash = hex::encode(Sha256::digest(hit.content.as_bytes()));
    let request = ClassifyRequest {
        path: IngestPath::Search,
        id: event_id(&[&key]),
        competitor,
        context: category,
        url: &hit.url,
        title: &hit.title,
        body: &hit.content,
        content_hash: &content_hash,
    };

    match classifier.classify(&request).await {
        ClassifyOutcome::Classified(event) => match ctx.storage.insert_event(&event).await {
            Ok(inserted) => {
                if inserted {
                    stats.events_created += 1;
                    log::info!("[{}] {} event: {}", competitor, event.change_type, event.claim);
                }
            }
            Err(e) => {
                stats.persistence_failures += 1;
                log::warn!("[{}] event insert failed for {}: {}", competitor, hit.url, e);
                return;
            }
        },
        ClassifyOutcome::Skipped(reason) => {
            stats.chunks_rejected += 1;
            log::debug!("[{}] hit rejected ({:?}): {}", competitor, reason, hit.url);
        }
    }

    let marker = json!({
        "processed_at": Utc::now().to_rfc3339(),
        "url": hit.url,
    });
    if let Err(e) = ctx.storage.mark(&key, &marker).await {
        stats.persistence_failures += 1;
        log::warn!("[{}] marker write failed for {}: {}", competitor, hit.url, e);
    }
}
