//! End-to-end crawl runs against in-memory collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use intel_crawler::error::{AppError, FetchError, Result};
use intel_crawler::models::{
    CHECKPOINT_KEY, ChangeType, Checkpoint, Competitor, Config, Event, Freshness, Registry,
    Seed, SourceKind, SourceSpec, Theme,
};
use intel_crawler::pipeline::{
    CrawlBudget, CrawlContext, dedup_key, list_recent_events, run_crawl, run_search_crawl,
};
use intel_crawler::services::{
    Fetcher, Generation, GenerationParams, GenerativeBackend, HitKind, SearchHit, SearchProvider,
};
use intel_crawler::storage::{
    CheckpointStore, EventStore, LocalStorage, MarkerStore, MemoryStorage, Storage,
};

const NOTES_URL: &str = "https://ex.com/notes";

const LAUNCH_BODY: &str = "We launched a new general ledger automation module for multi-entity \
    close. Finance teams can now schedule recurring journal entries, match intercompany balances \
    automatically, and review every posting in a single audit trail before the period is locked.";

fn launch_page(body: &str) -> String {
    format!(
        "<html><body><nav>Home Pricing Docs</nav><main><h2>Launch</h2><p>{}</p></main></body></html>",
        body
    )
}

/// Serves pages from a map and counts requests.
#[derive(Default)]
struct StaticFetcher {
    pages: Mutex<HashMap<String, String>>,
    requests: AtomicUsize,
}

impl StaticFetcher {
    fn with_page(url: &str, html: &str) -> Arc<Self> {
        let fetcher = Self::default();
        fetcher.set_page(url, html);
        Arc::new(fetcher)
    }

    fn set_page(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Memory storage whose event inserts can be switched to fail.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    fail_events: AtomicBool,
}

#[async_trait]
impl CheckpointStore for FlakyStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        self.inner.put(key, value).await
    }
}

#[async_trait]
impl MarkerStore for FlakyStorage {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn mark(&self, key: &str, value: &Value) -> Result<()> {
        self.inner.mark(key, value).await
    }
}

#[async_trait]
impl EventStore for FlakyStorage {
    async fn insert_event(&self, event: &Event) -> Result<bool> {
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(AppError::persistence("event table unavailable"));
        }
        self.inner.insert_event(event).await
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.inner.recent_events(limit).await
    }

    async fn event_count(&self) -> Result<usize> {
        self.inner.event_count().await
    }
}

/// Checkpoint store that cannot be reached.
struct DownStorage(MemoryStorage);

#[async_trait]
impl CheckpointStore for DownStorage {
    async fn get(&self, _key: &str) -> Result<Option<Value>> {
        Err(AppError::persistence("connection refused"))
    }

    async fn put(&self, _key: &str, _value: &Value) -> Result<()> {
        Err(AppError::persistence("connection refused"))
    }
}

#[async_trait]
impl MarkerStore for DownStorage {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.0.exists(key).await
    }

    async fn mark(&self, key: &str, value: &Value) -> Result<()> {
        self.0.mark(key, value).await
    }
}

#[async_trait]
impl EventStore for DownStorage {
    async fn insert_event(&self, event: &Event) -> Result<bool> {
        self.0.insert_event(event).await
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.0.recent_events(limit).await
    }

    async fn event_count(&self) -> Result<usize> {
        self.0.event_count().await
    }
}

/// Backend returning the same answer every time.
struct FixedAnswer(&'static str);

#[async_trait]
impl GenerativeBackend for FixedAnswer {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<Generation> {
        Ok(Generation::Text(self.0.to_string()))
    }
}

struct StaticSearch(Vec<SearchHit>);

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(
        &self,
        _query: &str,
        _count: usize,
        _freshness: Freshness,
    ) -> Result<Vec<SearchHit>> {
        Ok(self.0.clone())
    }
}

fn competitor(name: &str, urls: &[&str]) -> Competitor {
    Competitor {
        name: name.to_string(),
        website: format!("https://{}.example.com", name.to_lowercase()),
        category: "modern".to_string(),
        description: String::new(),
        priority: 1,
        enabled: true,
        search_terms: vec![format!("{} ERP updates", name)],
        sources: urls
            .iter()
            .map(|url| SourceSpec {
                url: url.to_string(),
                label: "Release notes".to_string(),
                kind: SourceKind::ReleaseNotes,
            })
            .collect(),
    }
}

fn notes_registry() -> Registry {
    Registry::new(vec![competitor("Ex", &[NOTES_URL])], vec![])
}

fn context(fetcher: Arc<StaticFetcher>, storage: Arc<dyn Storage>) -> CrawlContext {
    CrawlContext::new(Config::default(), notes_registry(), fetcher, storage)
}

async fn stored_checkpoint(store: &dyn CheckpointStore) -> Checkpoint {
    Checkpoint::from_value(store.get(CHECKPOINT_KEY).await.unwrap())
}

#[tokio::test]
async fn test_change_feed_scenario() {
    let fetcher = StaticFetcher::with_page(NOTES_URL, &launch_page(LAUNCH_BODY));
    let storage = Arc::new(MemoryStorage::new());
    let ctx = context(fetcher.clone(), storage.clone());
    let budget = CrawlBudget::default();

    let first = run_crawl(&ctx, &budget).await.unwrap();
    assert_eq!(first.events_created, 1);
    assert_eq!(first.sources_crawled, 1);
    assert_eq!(first.chunks_changed, 1);

    let events = storage.events();
    assert_eq!(events[0].change_type, ChangeType::NewFeature);
    assert_eq!(events[0].theme, Some(Theme::Unspecified));
    assert_eq!(events[0].evidence_url, NOTES_URL);
    assert!(events[0].claim.ends_with('.'));
    assert!(events[0].summary.iter().all(|b| !b.is_empty()));

    let second = run_crawl(&ctx, &budget).await.unwrap();
    assert_eq!(second.events_created, 0);
    assert_eq!(second.chunks_changed, 0);
    assert_eq!(second.sources_crawled, 1);

    let before = stored_checkpoint(storage.as_ref()).await;
    fetcher.set_page(
        NOTES_URL,
        &launch_page(&LAUNCH_BODY.replace("single audit trail", "unified audit trail")),
    );
    let third = run_crawl(&ctx, &budget).await.unwrap();
    assert_eq!(third.events_created, 1);
    assert_eq!(storage.events().len(), 2);

    let after = stored_checkpoint(storage.as_ref()).await;
    assert_ne!(
        before.url_state(NOTES_URL).unwrap()["Launch"],
        after.url_state(NOTES_URL).unwrap()["Launch"]
    );

    let recent = list_recent_events(storage.as_ref(), 1).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert!(recent[0].evidence_snippet.contains("unified audit trail"));
}

#[tokio::test]
async fn test_max_urls_budget() {
    let urls: Vec<String> = (0..10).map(|i| format!("https://ex.com/page/{i}")).collect();
    let fetcher = Arc::new(StaticFetcher::default());
    for url in &urls {
        fetcher.set_page(url, &launch_page(LAUNCH_BODY));
    }
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let registry = Registry::new(
        vec![
            competitor("Ex", &url_refs[..5]),
            competitor("Other", &url_refs[5..]),
        ],
        vec![],
    );
    let ctx = CrawlContext::new(
        Config::default(),
        registry,
        fetcher.clone(),
        Arc::new(MemoryStorage::new()),
    );

    let budget = CrawlBudget {
        max_urls: Some(3),
        ..CrawlBudget::default()
    };
    let stats = run_crawl(&ctx, &budget).await.unwrap();

    assert_eq!(stats.sources_crawled + stats.sources_failed, 3);
    assert_eq!(fetcher.requests(), 3);
    assert_eq!(stats.competitors.len(), 1);
}

#[tokio::test]
async fn test_fetch_and_segmentation_failures_are_counted() {
    let fetcher = StaticFetcher::with_page(NOTES_URL, "<main><p>Too short to matter.</p></main>");
    let registry = Registry::new(
        vec![competitor("Ex", &[NOTES_URL, "https://ex.com/missing"])],
        vec![],
    );
    let storage = Arc::new(MemoryStorage::new());
    let ctx = CrawlContext::new(Config::default(), registry, fetcher, storage.clone());

    let stats = run_crawl(&ctx, &CrawlBudget::default()).await.unwrap();
    assert_eq!(stats.sources_failed, 2);
    assert_eq!(stats.sources_crawled, 0);
    assert_eq!(stats.events_created, 0);
    assert_eq!(stored_checkpoint(storage.as_ref()).await.url_count(), 0);
}

#[tokio::test]
async fn test_persistence_failure_does_not_advance_checkpoint() {
    let fetcher = StaticFetcher::with_page(NOTES_URL, &launch_page(LAUNCH_BODY));
    let storage = Arc::new(FlakyStorage::default());
    storage.fail_events.store(true, Ordering::SeqCst);
    let ctx = context(fetcher, storage.clone());

    let failed = run_crawl(&ctx, &CrawlBudget::default()).await.unwrap();
    assert_eq!(failed.events_created, 0);
    assert_eq!(failed.persistence_failures, 1);
    let checkpoint = stored_checkpoint(storage.as_ref()).await;
    assert!(
        checkpoint
            .url_state(NOTES_URL)
            .is_none_or(|state| !state.contains_key("Launch"))
    );

    storage.fail_events.store(false, Ordering::SeqCst);
    let retried = run_crawl(&ctx, &CrawlBudget::default()).await.unwrap();
    assert_eq!(retried.events_created, 1);
    assert_eq!(retried.persistence_failures, 0);
}

#[tokio::test]
async fn test_unreachable_checkpoint_store_fails_run() {
    let fetcher = StaticFetcher::with_page(NOTES_URL, &launch_page(LAUNCH_BODY));
    let ctx = context(fetcher.clone(), Arc::new(DownStorage(MemoryStorage::new())));

    let result = run_crawl(&ctx, &CrawlBudget::default()).await;
    assert!(matches!(result, Err(AppError::Persistence(_))));
    assert_eq!(fetcher.requests(), 0);
}

#[tokio::test]
async fn test_registry_without_sources_fails_run() {
    let fetcher = Arc::new(StaticFetcher::default());
    let registry = Registry::new(Seed::default().competitors, vec![]);
    let ctx = CrawlContext::new(
        Config::default(),
        registry,
        fetcher.clone(),
        Arc::new(MemoryStorage::new()),
    );

    let result = run_crawl(&ctx, &CrawlBudget::default()).await;
    assert!(matches!(result, Err(AppError::Config(_))));
    assert_eq!(fetcher.requests(), 0);
}

#[tokio::test]
async fn test_cancelled_run_starts_no_sources() {
    let fetcher = StaticFetcher::with_page(NOTES_URL, &launch_page(LAUNCH_BODY));
    let ctx = context(fetcher.clone(), Arc::new(MemoryStorage::new()));
    ctx.control.cancel();

    let stats = run_crawl(&ctx, &CrawlBudget::default()).await.unwrap();
    assert!(stats.cancelled);
    assert_eq!(stats.sources_crawled, 0);
    assert_eq!(fetcher.requests(), 0);
}

#[tokio::test]
async fn test_generative_classification() {
    let fetcher = StaticFetcher::with_page(NOTES_URL, &launch_page(LAUNCH_BODY));
    let storage = Arc::new(MemoryStorage::new());
    let ctx = context(fetcher, storage.clone()).with_backend(Arc::new(FixedAnswer(
        r#"```json
{"theme": "general_ledger", "change_type": "enhancement",
 "claim": "Ex added recurring journal entries to its general ledger",
 "summary": ["Entries repeat on a schedule.", "Less manual posting.", "Matches Rillet."]}
```"#,
    )));

    let stats = run_crawl(&ctx, &CrawlBudget::default()).await.unwrap();
    assert_eq!(stats.events_created, 1);

    let event = &storage.events()[0];
    assert_eq!(event.theme, Some(Theme::GeneralLedger));
    assert_eq!(event.change_type, ChangeType::Enhancement);
    assert_eq!(
        event.claim,
        "Ex added recurring journal entries to its general ledger."
    );
}

#[tokio::test]
async fn test_off_topic_answer_advances_checkpoint() {
    let fetcher = StaticFetcher::with_page(NOTES_URL, &launch_page(LAUNCH_BODY));
    let storage = Arc::new(MemoryStorage::new());
    let ctx = context(fetcher, storage.clone()).with_backend(Arc::new(FixedAnswer("null")));

    let first = run_crawl(&ctx, &CrawlBudget::default()).await.unwrap();
    assert_eq!(first.events_created, 0);
    assert_eq!(first.chunks_rejected, 1);

    let second = run_crawl(&ctx, &CrawlBudget::default()).await.unwrap();
    assert_eq!(second.chunks_changed, 0);
    assert!(storage.events().is_empty());
}

#[tokio::test]
async fn test_local_storage_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let fetcher = StaticFetcher::with_page(NOTES_URL, &launch_page(LAUNCH_BODY));

    let storage = Arc::new(LocalStorage::open(dir.path()).await.unwrap());
    let first = run_crawl(&context(fetcher.clone(), storage), &CrawlBudget::default())
        .await
        .unwrap();
    assert_eq!(first.events_created, 1);

    let reopened = Arc::new(LocalStorage::open(dir.path()).await.unwrap());
    let second = run_crawl(&context(fetcher, reopened.clone()), &CrawlBudget::default())
        .await
        .unwrap();
    assert_eq!(second.events_created, 0);
    assert_eq!(reopened.event_count().await.unwrap(), 1);
}

fn hit(url: &str, title: &str, content: &str) -> SearchHit {
    SearchHit {
        kind: HitKind::News,
        title: title.to_string(),
        url: url.to_string(),
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_search_path_marks_and_skips_seen_hits() {
    let hits = vec![
        hit(
            "https://news.example.com/ex-ledger",
            "Ex launches AI reconciliation",
            "Ex introduced an AI reconciliation feature for its ERP platform that matches bank \
             lines to ledger entries.",
        ),
        hit(
            "https://news.example.com/ex-shares",
            "Ex shares rise",
            "Ex shares rise after the ERP software vendor posted a quarterly earnings report.",
        ),
        hit("", "No link", "An ERP platform update without any URL attached to it."),
    ];
    let storage = Arc::new(MemoryStorage::new());
    let ctx = CrawlContext::new(
        Config::default(),
        notes_registry(),
        Arc::new(StaticFetcher::default()),
        storage.clone(),
    )
    .with_search(Arc::new(StaticSearch(hits)));

    let first = run_search_crawl(&ctx, &CrawlBudget::default(), Freshness::Week)
        .await
        .unwrap();
    assert_eq!(first.sources_crawled, 1);
    assert_eq!(first.events_created, 1);
    assert_eq!(first.chunks_rejected, 1);

    let event = &storage.events()[0];
    assert_eq!(event.theme, None);
    assert_eq!(event.change_type, ChangeType::NewFeature);
    assert!(
        storage
            .exists(&dedup_key("https://news.example.com/ex-shares"))
            .await
            .unwrap()
    );

    let second = run_search_crawl(&ctx, &CrawlBudget::default(), Freshness::Week)
        .await
        .unwrap();
    assert_eq!(second.chunks_changed, 0);
    assert_eq!(second.events_created, 0);
}

#[tokio::test]
async fn test_search_requires_provider() {
    let ctx = context(
        Arc::new(StaticFetcher::default()),
        Arc::new(MemoryStorage::new()),
    );
    let result = run_search_crawl(&ctx, &CrawlBudget::default(), Freshness::Day).await;
    assert!(matches!(result, Err(AppError::Config(_))));
}
