// src/pipeline/crawl.rs

//! Documentation crawl pipeline.
//!
//! Each source moves through fetching, segmenting, change detection and
//! classification on a bounded pool of workers. Results are persisted by the
//! single consumer of that pool, one chunk at a time, so the checkpoint only
//! ever advances past chunks whose event (if any) is stored.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, future, stream};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{
    CHECKPOINT_KEY, Checkpoint, Config, CrawlStats, Registry, Source, UrlState, event_id,
};
use crate::pipeline::diff::{ChangeDetector, ChangedChunk};
use crate::services::{
    ClassifyOutcome, ClassifyRequest, EventClassifier, Fetcher, GeminiBackend,
    GenerativeBackend, HttpFetcher, IngestPath, RelevanceFilter, SearchProvider, Segmenter,
    YouComSearch,
};
use crate::storage::Storage;
use crate::utils::http::create_async_client;

/// Limits applied to one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlBudget {
    /// Only competitors with `priority <= max_priority` are crawled
    pub max_priority: u8,
    /// Stop after this many sources (documentation path only)
    pub max_urls: Option<usize>,
    /// Only the first N active competitors, in registry order
    pub max_competitors: Option<usize>,
}

impl Default for CrawlBudget {
    fn default() -> Self {
        Self {
            max_priority: 1,
            max_urls: None,
            max_competitors: None,
        }
    }
}

/// Cooperative cancellation handle shared by a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CrawlControl {
    token: CancellationToken,
}

impl CrawlControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the run to stop before starting further sources.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Everything a run needs, loaded once and shared.
#[derive(Clone)]
pub struct CrawlContext {
    pub config: Arc<Config>,
    pub registry: Arc<Registry>,
    pub fetcher: Arc<dyn Fetcher>,
    pub classifier: EventClassifier,
    pub storage: Arc<dyn Storage>,
    pub search: Option<Arc<dyn SearchProvider>>,
    pub control: CrawlControl,
}

impl CrawlContext {
    /// Context with keyword-only classification and no search provider.
    pub fn new(
        config: Config,
        registry: Registry,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let classifier = build_classifier(&config, None);
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            fetcher,
            classifier,
            storage,
            search: None,
            control: CrawlControl::new(),
        }
    }

    /// Context wired to HTTP, Gemini and You.com from the environment.
    ///
    /// Missing API keys leave the corresponding collaborator unset.
    pub fn from_env(config: Config, registry: Registry, storage: Arc<dyn Storage>) -> Result<Self> {
        let client = create_async_client(&config.crawler)?;
        let fetcher = Arc::new(HttpFetcher::with_client(client.clone()));

        let backend = GeminiBackend::from_env(client.clone(), &config.classifier);
        let search = YouComSearch::from_env(client, &config.search);

        let mut ctx = Self::new(config, registry, fetcher, storage);
        if let Some(backend) = backend {
            ctx = ctx.with_backend(Arc::new(backend));
        }
        if let Some(search) = search {
            ctx = ctx.with_search(Arc::new(search));
        }
        Ok(ctx)
    }

    pub fn with_backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.classifier = build_classifier(&self.config, Some(backend));
        self
    }

    pub fn with_search(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(provider);
        self
    }

    pub fn with_control(mut self, control: CrawlControl) -> Self {
        self.control = control;
        self
    }
}

fn build_classifier(config: &Config, backend: Option<Arc<dyn GenerativeBackend>>) -> EventClassifier {
    EventClassifier::new(
        &config.classifier,
        RelevanceFilter::new(&config.relevance),
        backend,
    )
    .with_min_content_chars(config.search.min_content_chars)
}

/// Processing stage of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Segmenting,
    DetectingChanges,
    Classifying,
    Persisting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Segmenting => "segmenting",
            Stage::DetectingChanges => "detecting changes",
            Stage::Classifying => "classifying",
            Stage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// A source that could not be processed.
#[derive(Debug)]
struct SourceFailure {
    stage: Stage,
    error: AppError,
}

/// Worker output for one changed chunk.
struct ChunkDecision {
    changed: ChangedChunk,
    outcome: ClassifyOutcome,
}

/// Worker output for one source, not yet persisted.
struct ProcessedSource {
    unchanged: usize,
    decisions: Vec<ChunkDecision>,
    /// Checkpoint state assuming every decision persists
    updated: UrlState,
}

/// Sources of a run, in registry order, after the budget is applied.
pub fn plan_sources(registry: &Registry, budget: &CrawlBudget) -> Vec<Source> {
    let allowed: Option<Vec<&str>> = budget.max_competitors.map(|n| {
        registry
            .active_competitors(budget.max_priority)
            .into_iter()
            .take(n)
            .map(|c| c.name.as_str())
            .collect()
    });

    registry
        .sources(budget.max_priority)
        .into_iter()
        .filter(|s| {
            allowed
                .as_ref()
                .is_none_or(|names| names.contains(&s.competitor.as_str()))
        })
        .take(budget.max_urls.unwrap_or(usize::MAX))
        .collect()
}

/// Crawl documentation sources and emit events for new or changed chunks.
///
/// Individual source failures are counted and skipped. The only error
/// returned is a checkpoint store that cannot be read at run start.
pub async fn run_crawl(ctx: &CrawlContext, budget: &CrawlBudget) -> Result<CrawlStats> {
    let mut stats = CrawlStats::start();
    log::info!(
        "Starting crawl (max_priority={}, max_urls={:?}, max_competitors={:?})",
        budget.max_priority,
        budget.max_urls,
        budget.max_competitors
    );

    if ctx.registry.sources(budget.max_priority).is_empty() {
        return Err(AppError::config(format!(
            "No sources registered for competitors up to priority {}; \
             run discovery or declare sources in the seed",
            budget.max_priority
        )));
    }

    let stored = ctx.storage.get(CHECKPOINT_KEY).await.map_err(|e| {
        log::error!("Checkpoint store unreachable: {}", e);
        e
    })?;
    let mut checkpoint = Checkpoint::from_value(stored);
    log::debug!(
        "Loaded checkpoint: {} URLs, {} chunks",
        checkpoint.url_count(),
        checkpoint.chunk_count()
    );

    let sources = plan_sources(&ctx.registry, budget);
    if sources.is_empty() {
        log::warn!("Budget leaves no sources to crawl");
    } else {
        log::info!("Crawling {} sources", sources.len());
    }

    let classifier = &ctx.classifier.for_run();
    let segmenter = &Segmenter::new(&ctx.config.segmenter);
    let detector = &ChangeDetector::new(ctx.config.segmenter.max_key_chars);
    let concurrency = ctx.config.crawler.max_concurrent.max(1);
    let delay = Duration::from_millis(ctx.config.crawler.request_delay_ms);

    let jobs: Vec<(Source, Option<UrlState>)> = sources
        .into_iter()
        .map(|source| {
            let previous = checkpoint.url_state(&source.url).cloned();
            (source, previous)
        })
        .collect();
    let planned = jobs.len();

    let mut results = stream::iter(jobs)
        .take_while(|_| future::ready(!ctx.control.is_cancelled()))
        .map(|(source, previous)| async move {
            let result = process_source(
                ctx,
                classifier,
                segmenter,
                detector,
                &source,
                previous.as_ref(),
            )
            .await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            (source, result)
        })
        .buffer_unordered(concurrency);

    let mut attempted = 0;
    while let Some((source, result)) = results.next().await {
        attempted += 1;
        stats.competitors.insert(source.competitor.clone());

        match result {
            Ok(processed) => {
                stats.sources_crawled += 1;
                persist_source(ctx, &source, processed, &mut checkpoint, &mut stats).await;
            }
            Err(failure) => {
                stats.sources_failed += 1;
                log::warn!(
                    "[{}] {} failed while {}: {}",
                    source.competitor,
                    source.url,
                    failure.stage,
                    failure.error
                );
            }
        }
    }

    if attempted < planned {
        log::info!("Crawl cancelled after {} of {} sources", attempted, planned);
        stats.cancelled = true;
    }

    stats.finish();
    stats.log_summary("Crawl");
    Ok(stats)
}

async fn process_source(
    ctx: &CrawlContext,
    classifier: &EventClassifier,
    segmenter: &Segmenter,
    detector: &ChangeDetector,
    source: &Source,
    previous: Option<&UrlState>,
) -> std::result::Result<ProcessedSource, SourceFailure> {
    log::debug!("[{}] {}", source.url, Stage::Fetching);
    let html = ctx.fetcher.fetch(&source.url).await.map_err(|e| SourceFailure {
        stage: Stage::Fetching,
        error: e.into(),
    })?;

    log::debug!("[{}] {}", source.url, Stage::Segmenting);
    let chunks = segmenter.segment(&html, &source.url);
    if chunks.is_empty() {
        return Err(SourceFailure {
            stage: Stage::Segmenting,
            error: AppError::SegmentationEmpty {
                url: source.url.clone(),
            },
        });
    }

    log::debug!("[{}] {} ({} chunks)", source.url, Stage::DetectingChanges, chunks.len());
    let detection = detector.detect(chunks, previous);
    if !detection.has_changes() {
        log::debug!("[{}] unchanged", source.url);
    }

    let mut decisions = Vec::with_capacity(detection.change_count());
    for changed in detection.changed {
        log::debug!("[{}] {} '{}'", source.url, Stage::Classifying, changed.key);
        let id = event_id(&[&source.url, &changed.key, &changed.hash]);
        let request = ClassifyRequest {
            path: IngestPath::Docs,
            id,
            competitor: &source.competitor,
            context: source.kind.as_str(),
            url: &source.url,
            title: &changed.chunk.heading,
            body: &changed.chunk.body,
            content_hash: &changed.hash,
        };
        let outcome = classifier.classify(&request).await;
        decisions.push(ChunkDecision { changed, outcome });
    }

    Ok(ProcessedSource {
        unchanged: detection.unchanged,
        decisions,
        updated: detection.updated,
    })
}

/// Store events and advance the checkpoint for one processed source.
///
/// A chunk whose event could not be stored keeps its previous hash, so the
/// next run sees it as changed again.
async fn persist_source(
    ctx: &CrawlContext,
    source: &Source,
    processed: ProcessedSource,
    checkpoint: &mut Checkpoint,
    stats: &mut CrawlStats,
) {
    let ProcessedSource {
        unchanged,
        decisions,
        mut updated,
    } = processed;

    log::info!(
        "[{}] {}: {} changed, {} unchanged",
        source.competitor,
        source.url,
        decisions.len(),
        unchanged
    );
    if decisions.is_empty() {
        return;
    }

    for ChunkDecision { changed, outcome } in decisions {
        stats.chunks_changed += 1;

        let advance = match outcome {
            ClassifyOutcome::Classified(event) => match ctx.storage.insert_event(&event).await {
                Ok(true) => {
                    stats.events_created += 1;
                    log::info!(
                        "[{}] {} event: {}",
                        event.competitor,
                        event.change_type,
                        event.claim
                    );
                    true
                }
                Ok(false) => {
                    log::debug!("[{}] event {} already recorded", source.url, event.id);
                    true
                }
                Err(e) => {
                    stats.persistence_failures += 1;
                    log::warn!(
                        "[{}] {} event for '{}': {}",
                        source.url,
                        Stage::Persisting,
                        changed.key,
                        e
                    );
                    false
                }
            },
            ClassifyOutcome::Skipped(reason) => {
                stats.chunks_rejected += 1;
                log::debug!("[{}] '{}' rejected: {:?}", source.url, changed.key, reason);
                true
            }
        };

        if !advance {
            if let Some(hash) = changed.previous_hash {
                updated.insert(changed.key, hash);
            } else {
                updated.remove(&changed.key);
            }
        }
    }

    checkpoint.replace_url(&source.url, updated);
    let written = match checkpoint.to_value() {
        Ok(value) => ctx.storage.put(CHECKPOINT_KEY, &value).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        stats.persistence_failures += 1;
        log::warn!("[{}] {} checkpoint: {}", source.url, Stage::Persisting, e);
    }
}
