//! Crawl pass coordination
//!
//! A pass runs in two strict phases: every pending catalogue page is
//! processed to completion before any detail page starts, because catalogue
//! pages are what discover detail work. Failed items stay Pending, so a
//! crashed or partially failed pass resumes from the queue on the next run.
//! Only a pass that ends with nothing pending clears the queue.

use crate::browser::{ChromiumRenderer, PageRenderer};
use crate::config::Config;
use crate::engine::snapshot::save_snapshot;
use crate::extract::{extract, total_pages, ExtractResult};
use crate::fetch::{build_http_client, BackoffPolicy, FetchStrategy, Fetcher};
use crate::queue::{PageKind, WorkItem};
use crate::storage::{SqliteStore, Store};
use crate::tracker::ChangeTracker;
use crate::{BookwatchError, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// The crawl engine
///
/// Cheap to clone; all state is shared behind `Arc`s so a clone can be moved
/// into each worker task.
#[derive(Clone)]
pub struct Engine {
    config: Arc<Config>,
    store: Arc<Mutex<SqliteStore>>,
    fetcher: Arc<Fetcher>,
    tracker: ChangeTracker,
    semaphore: Arc<Semaphore>,
}

impl Engine {
    /// Opens storage, launches the browser if enabled, and assembles the engine
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `fresh` - Discard any persisted queue before starting
    pub async fn launch(config: Config, fresh: bool) -> Result<Self> {
        let store = SqliteStore::new(
            Path::new(&config.output.database_path),
            config.storage.unique_content_hash,
        )?;

        let renderer: Option<Arc<dyn PageRenderer>> = if config.browser.enabled {
            let pool_size = config
                .browser
                .pool_size
                .unwrap_or(config.crawler.concurrency);
            let renderer = ChromiumRenderer::launch(&config.browser, pool_size)
                .await
                .map_err(BookwatchError::Browser)?;
            Some(Arc::new(renderer))
        } else {
            None
        };

        let engine = Self::with_parts(config, store, renderer)?;

        if fresh {
            info!("Starting fresh, discarding persisted queue");
            engine.store.lock().unwrap().clear_queue()?;
        }

        Ok(engine)
    }

    /// Assembles an engine from already-built parts
    ///
    /// This is the seam used by tests to supply an in-memory store and a
    /// stub renderer.
    pub fn with_parts(
        config: Config,
        store: SqliteStore,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self> {
        let client = build_http_client(&config)?;
        let strategy = FetchStrategy::new(&config, client, renderer)?;
        let policy = BackoffPolicy::new(
            Duration::from_millis(config.crawler.backoff_base_ms),
            config.crawler.max_attempts,
        );

        let store = Arc::new(Mutex::new(store));
        let concurrency = config.crawler.concurrency as usize;

        Ok(Self {
            config: Arc::new(config),
            store: Arc::clone(&store),
            fetcher: Arc::new(Fetcher::new(Arc::new(strategy), policy)),
            tracker: ChangeTracker::new(store),
            semaphore: Arc::new(Semaphore::new(concurrency)),
        })
    }

    /// Shared storage handle, for inspection and reporting
    pub fn store(&self) -> Arc<Mutex<SqliteStore>> {
        Arc::clone(&self.store)
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Runs one crawl pass to completion
    ///
    /// An empty queue is seeded from catalogue page 1 first. The pass then
    /// drains catalogue pages, drains detail pages, and clears the queue if
    /// nothing was left behind.
    pub async fn run_pass(&self) -> Result<()> {
        if self.store.lock().unwrap().queue_size()? == 0 {
            self.seed().await?;
        }

        self.run_phase(PageKind::ListPage).await?;
        self.run_phase(PageKind::DetailPage).await?;

        let mut store = self.store.lock().unwrap();
        if store.is_queue_empty(PageKind::ListPage)? && store.is_queue_empty(PageKind::DetailPage)?
        {
            store.clear_queue()?;
            info!("Pass complete, queue cleared");
        } else {
            let counts = store.queue_counts()?;
            warn!(
                pending = counts.pending,
                "Pass finished with items still pending, queue kept for resume"
            );
        }

        Ok(())
    }

    /// Seeds the queue with every catalogue page
    ///
    /// Page 1 is fetched to read the pager; a seed fetch failure aborts the
    /// pass without touching the queue so the next run starts clean.
    async fn seed(&self) -> Result<()> {
        let first_page = self.config.site.catalogue_url(1);
        info!(url = %first_page, "Seeding queue from catalogue");

        let body = match self.fetcher.fetch(&first_page).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %first_page, error = %e, "Seed fetch failed, nothing queued");
                return Ok(());
            }
        };

        let pages = total_pages(&body);
        let urls: Vec<String> = (1..=pages)
            .map(|page| self.config.site.catalogue_url(page))
            .collect();

        let inserted = self
            .store
            .lock()
            .unwrap()
            .enqueue(&urls, PageKind::ListPage)?;
        info!(pages = pages, queued = inserted, "Catalogue pages queued");

        Ok(())
    }

    /// Drains all pending items of one kind, with bounded concurrency
    ///
    /// Returns once every claimed item has finished, so the caller gets a
    /// hard barrier between phases.
    async fn run_phase(&self, kind: PageKind) -> Result<()> {
        let items = self.store.lock().unwrap().claim_pending(kind)?;
        if items.is_empty() {
            return Ok(());
        }

        info!(kind = %kind, items = items.len(), "Phase started");
        let mut workers = JoinSet::new();

        for item in items {
            // Acquired before spawning so at most `concurrency` tasks exist
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .expect("engine semaphore closed");
            let engine = self.clone();

            workers.spawn(async move {
                let _permit = permit;
                let url = item.url.clone();
                (url, engine.process_item(item).await)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((url, Err(e))) => {
                    warn!(url = %url, error = %e, "Item failed, left pending");
                }
                Err(e) => {
                    warn!(error = %e, "Worker panicked");
                }
            }
        }

        info!(kind = %kind, "Phase complete");
        Ok(())
    }

    /// Fetches, extracts, and persists one work item
    ///
    /// The item is marked Done only after its results are persisted; any
    /// failure leaves it Pending for a later run.
    async fn process_item(&self, item: WorkItem) -> Result<()> {
        let body = self.fetcher.fetch(&item.url).await?;

        match extract(&body, &item.url, item.kind) {
            ExtractResult::ChildUrls(urls) => {
                let inserted = self
                    .store
                    .lock()
                    .unwrap()
                    .enqueue(&urls, PageKind::DetailPage)?;
                debug!(url = %item.url, found = urls.len(), queued = inserted, "Catalogue page done");
            }
            ExtractResult::Candidate(candidate) => {
                if let Some(dir) = &self.config.output.snapshot_dir {
                    if let Err(e) = save_snapshot(Path::new(dir), &candidate.content_hash, &body) {
                        warn!(url = %item.url, error = %e, "Snapshot write failed");
                    }
                }
                let outcome = self.tracker.upsert(&candidate)?;
                debug!(url = %item.url, outcome = ?outcome, "Detail page done");
            }
            ExtractResult::ParseError(reason) => {
                return Err(BookwatchError::Parse(reason));
            }
        }

        self.store.lock().unwrap().mark_done(item.id)?;
        Ok(())
    }
}
