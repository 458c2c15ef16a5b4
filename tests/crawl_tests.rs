//! End-to-end crawl tests against a mock HTTP server

use async_trait::async_trait;
use bookwatch::browser::PageRenderer;
use bookwatch::config::Config;
use bookwatch::fetch::{build_http_client, FetchError, FetchStrategy, ProxyDescriptor};
use bookwatch::queue::PageKind;
use bookwatch::storage::{SqliteStore, Store};
use bookwatch::Engine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===== Fixtures =====

fn test_config(base: &str) -> Config {
    let toml = format!(
        r#"
        [crawler]
        concurrency = 4
        max-attempts = 2
        backoff-base-ms = 10
        request-timeout-secs = 5

        [site]
        base-url = "{base}/"
        catalogue-url-template = "{base}/catalogue/page-{{page}}.html"

        [user-agent]
        name = "bookwatch-test"
        version = "0.0"

        [output]
        database-path = ":memory:"
        "#
    );
    toml::from_str(&toml).unwrap()
}

fn test_engine(config: Config, renderer: Option<Arc<dyn PageRenderer>>) -> Engine {
    let store = SqliteStore::new_in_memory(false).unwrap();
    Engine::with_parts(config, store, renderer).unwrap()
}

/// A catalogue page linking to the given absolute book URLs
fn catalogue_html(book_urls: &[String], page: u32, total_pages: u32) -> String {
    let mut products = String::new();
    for url in book_urls {
        products.push_str(&format!(
            r#"<li><article class="product_pod"><h3><a href="{url}">book</a></h3></article></li>"#
        ));
    }

    let pager = if total_pages > 1 {
        format!(r#"<ul class="pager"><li class="current">Page {page} of {total_pages}</li></ul>"#)
    } else {
        String::new()
    };

    format!(
        r#"<html><head><title>Books</title></head><body>
        <ol class="row">{products}</ol>{pager}
        </body></html>"#
    )
}

fn book_html(title: &str, price: &str) -> String {
    format!(
        r#"<html><head><title>{title}</title></head><body>
        <ul class="breadcrumb">
            <li><a href="/index.html">Home</a></li>
            <li><a href="/category/books_1/index.html">Books</a></li>
            <li><a href="/category/poetry_23/index.html">Poetry</a></li>
        </ul>
        <div class="item active"><img src="/media/{title}.jpg"/></div>
        <div class="product_main">
            <h1>{title}</h1>
            <p class="instock availability">In stock (5 available)</p>
            <p class="star-rating Four"></p>
        </div>
        <table class="table table-striped">
            <tr><th>Price (excl. tax)</th><td>{price}</td></tr>
            <tr><th>Price (incl. tax)</th><td>{price}</td></tr>
            <tr><th>Number of reviews</th><td>3</td></tr>
        </table>
        </body></html>"#
    )
}

fn block_html() -> String {
    "<html><head><title>Pardon our interruption...</title></head><body></body></html>".to_string()
}

async fn mount_page(server: &MockServer, url_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Stub renderer serving canned HTML, with call recording and an
/// in-flight counter for concurrency assertions
struct StubRenderer {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl StubRenderer {
    fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageRenderer for StubRenderer {
    async fn render(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Render(format!("no stub page for {}", url)))
    }
}

// ===== Full pass behavior =====

#[tokio::test]
async fn test_full_pass_persists_all_books() {
    let server = MockServer::start().await;
    let base = server.uri();

    let book_urls: Vec<String> = (1..=3)
        .map(|i| format!("{base}/catalogue/book-{i}.html"))
        .collect();
    mount_page(
        &server,
        "/catalogue/page-1.html",
        catalogue_html(&book_urls, 1, 1),
    )
    .await;
    for i in 1..=3 {
        mount_page(
            &server,
            &format!("/catalogue/book-{i}.html"),
            book_html(&format!("Book {i}"), "£10.00"),
        )
        .await;
    }

    let engine = test_engine(test_config(&base), None);
    engine.run_pass().await.unwrap();

    let store = engine.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_records().unwrap(), 3);
    assert_eq!(store.count_changes().unwrap(), 0);

    // A completed pass leaves nothing behind in the queue
    assert_eq!(store.queue_size().unwrap(), 0);

    let records = store.list_records(10, 0).unwrap();
    let mut titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Book 1", "Book 2", "Book 3"]);
}

#[tokio::test]
async fn test_multi_page_catalogue_is_fully_seeded() {
    let server = MockServer::start().await;
    let base = server.uri();

    let page1_books = vec![format!("{base}/catalogue/book-1.html")];
    let page2_books = vec![format!("{base}/catalogue/book-2.html")];
    mount_page(
        &server,
        "/catalogue/page-1.html",
        catalogue_html(&page1_books, 1, 2),
    )
    .await;
    mount_page(
        &server,
        "/catalogue/page-2.html",
        catalogue_html(&page2_books, 2, 2),
    )
    .await;
    mount_page(
        &server,
        "/catalogue/book-1.html",
        book_html("Book 1", "£10.00"),
    )
    .await;
    mount_page(
        &server,
        "/catalogue/book-2.html",
        book_html("Book 2", "£12.00"),
    )
    .await;

    let engine = test_engine(test_config(&base), None);
    engine.run_pass().await.unwrap();

    let store = engine.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_records().unwrap(), 2);
    assert_eq!(store.queue_size().unwrap(), 0);
}

#[tokio::test]
async fn test_failed_item_leaves_queue_for_resume() {
    let server = MockServer::start().await;
    let base = server.uri();

    let engine = test_engine(test_config(&base), None);
    {
        let store = engine.store();
        let mut store = store.lock().unwrap();
        store
            .enqueue(
                &[
                    format!("{base}/catalogue/book-ok.html"),
                    format!("{base}/catalogue/book-gone.html"),
                ],
                PageKind::DetailPage,
            )
            .unwrap();
    }

    mount_page(
        &server,
        "/catalogue/book-ok.html",
        book_html("Survivor", "£5.00"),
    )
    .await;
    // book-gone is not mounted; wiremock answers 404

    engine.run_pass().await.unwrap();

    let store = engine.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_records().unwrap(), 1);

    // The failure kept the queue alive
    let counts = store.queue_counts().unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.done, 1);

    let pending = store.claim_pending(PageKind::DetailPage).unwrap();
    assert_eq!(pending[0].url, format!("{base}/catalogue/book-gone.html"));
}

#[tokio::test]
async fn test_resume_skips_done_items() {
    let server = MockServer::start().await;
    let base = server.uri();

    // A done item must never be fetched again
    Mock::given(method("GET"))
        .and(path("/catalogue/book-done.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(book_html("Done", "£1.00")))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/catalogue/book-pending.html",
        book_html("Pending Book", "£2.00"),
    )
    .await;

    let engine = test_engine(test_config(&base), None);
    {
        let store = engine.store();
        let mut store = store.lock().unwrap();
        store
            .enqueue(&[format!("{base}/catalogue/book-done.html")], PageKind::DetailPage)
            .unwrap();
        let done = store.claim_pending(PageKind::DetailPage).unwrap();
        store.mark_done(done[0].id).unwrap();
        store
            .enqueue(
                &[format!("{base}/catalogue/book-pending.html")],
                PageKind::DetailPage,
            )
            .unwrap();
    }

    engine.run_pass().await.unwrap();

    let store = engine.store();
    let store = store.lock().unwrap();
    let records = store.list_records(10, 0).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Pending Book");
    assert_eq!(store.queue_size().unwrap(), 0);
}

// ===== Change tracking across passes =====

#[tokio::test]
async fn test_second_pass_detects_changes() {
    let server = MockServer::start().await;
    let base = server.uri();
    let book_urls = vec![format!("{base}/catalogue/book-1.html")];

    mount_page(
        &server,
        "/catalogue/page-1.html",
        catalogue_html(&book_urls, 1, 1),
    )
    .await;
    mount_page(
        &server,
        "/catalogue/book-1.html",
        book_html("Stable Title", "£10.00"),
    )
    .await;

    let engine = test_engine(test_config(&base), None);
    engine.run_pass().await.unwrap();

    // Identical content on the second pass: no change logged
    engine.run_pass().await.unwrap();
    {
        let store = engine.store();
        let store = store.lock().unwrap();
        assert_eq!(store.count_records().unwrap(), 1);
        assert_eq!(store.count_changes().unwrap(), 0);
    }

    // The price changes for the third pass
    server.reset().await;
    mount_page(
        &server,
        "/catalogue/page-1.html",
        catalogue_html(&book_urls, 1, 1),
    )
    .await;
    mount_page(
        &server,
        "/catalogue/book-1.html",
        book_html("Stable Title", "£15.00"),
    )
    .await;

    engine.run_pass().await.unwrap();

    let store = engine.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_records().unwrap(), 1);

    let records = store.list_records(10, 0).unwrap();
    assert_eq!(records[0].price_incl_tax, 15.0);

    // The log entry carries the incoming snapshot
    let changes = store.list_changes(10).unwrap();
    assert_eq!(changes.len(), 1);
    assert!(changes[0].snapshot.contains("15"));
    assert!(changes[0].snapshot.contains("Stable Title"));
}

// ===== Extraction failures =====

#[tokio::test]
async fn test_unparseable_page_stays_pending() {
    let server = MockServer::start().await;
    let base = server.uri();

    // The page loads fine but has no product heading, so extraction
    // fails. Refetching cannot help, and no retry happens within the pass.
    let broken = r#"<html><head><title>Broken</title></head><body>
        <div class="product_main"></div>
        </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/catalogue/book-broken.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(broken.to_string()))
        .expect(1)
        .mount(&server)
        .await;

    let engine = test_engine(test_config(&base), None);
    {
        let store = engine.store();
        store
            .lock()
            .unwrap()
            .enqueue(
                &[format!("{base}/catalogue/book-broken.html")],
                PageKind::DetailPage,
            )
            .unwrap();
    }

    engine.run_pass().await.unwrap();

    let store = engine.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_records().unwrap(), 0);

    // The item is left for a future run, exactly like a failed fetch
    let counts = store.queue_counts().unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.done, 0);
    let pending = store.claim_pending(PageKind::DetailPage).unwrap();
    assert_eq!(pending[0].url, format!("{base}/catalogue/book-broken.html"));
}

// ===== Retry and backoff =====

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let server = MockServer::start().await;
    let base = server.uri();
    let book_urls = vec![format!("{base}/catalogue/book-1.html")];

    // The first two hits fail, the third succeeds
    Mock::given(method("GET"))
        .and(path("/catalogue/book-1.html"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/catalogue/book-1.html",
        book_html("Flaky Book", "£7.00"),
    )
    .await;
    mount_page(
        &server,
        "/catalogue/page-1.html",
        catalogue_html(&book_urls, 1, 1),
    )
    .await;

    let mut config = test_config(&base);
    config.crawler.max_attempts = 3;
    let engine = test_engine(config, None);
    engine.run_pass().await.unwrap();

    let store = engine.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_records().unwrap(), 1);
    assert_eq!(store.queue_size().unwrap(), 0);
}

#[tokio::test]
async fn test_client_errors_share_the_retry_budget() {
    let server = MockServer::start().await;
    let base = server.uri();

    // A 404 draws from the same attempt budget as a transport error; the
    // page recovering on the second attempt means the item completes
    Mock::given(method("GET"))
        .and(path("/catalogue/book-late.html"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/catalogue/book-late.html",
        book_html("Late Arrival", "£4.00"),
    )
    .await;

    let mut config = test_config(&base);
    config.crawler.max_attempts = 3;
    let engine = test_engine(config, None);
    {
        let store = engine.store();
        store
            .lock()
            .unwrap()
            .enqueue(
                &[format!("{base}/catalogue/book-late.html")],
                PageKind::DetailPage,
            )
            .unwrap();
    }

    engine.run_pass().await.unwrap();

    let store = engine.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_records().unwrap(), 1);
    assert_eq!(store.list_records(10, 0).unwrap()[0].title, "Late Arrival");
    assert_eq!(store.queue_size().unwrap(), 0);
}

// ===== Anti-blocking escalation =====

#[tokio::test]
async fn test_block_escalates_through_proxies_to_browser() {
    let target = MockServer::start().await;
    let proxy = MockServer::start().await;
    let url = format!("{}/catalogue/book-1.html", target.uri());

    // Both proxies serve the block page; each is burned after one use
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string(block_html()))
        .expect(2)
        .mount(&proxy)
        .await;

    let mut config = test_config(&target.uri());
    config.site.block_page_title = "Pardon our interruption...".to_string();
    config.proxy = vec![
        ProxyDescriptor { url: proxy.uri() },
        ProxyDescriptor { url: proxy.uri() },
    ];

    let mut pages = HashMap::new();
    pages.insert(url.clone(), book_html("Rendered Book", "£9.00"));
    let renderer = Arc::new(StubRenderer::new(pages));

    let client = build_http_client(&config).unwrap();
    let strategy = FetchStrategy::new(&config, client, Some(renderer.clone())).unwrap();

    let body = strategy.fetch_once(&url).await.unwrap();
    assert!(body.contains("Rendered Book"));
    assert_eq!(renderer.calls(), vec![url]);
}

#[tokio::test]
async fn test_rendered_output_is_returned_as_is() {
    let target = MockServer::start().await;
    let url = format!("{}/catalogue/book-1.html", target.uri());

    // Once the browser is the active rung, its output is final. Even a
    // rendered page carrying the block title comes back as the body.
    let mut config = test_config(&target.uri());
    config.site.block_page_title = "Pardon our interruption...".to_string();

    let mut pages = HashMap::new();
    pages.insert(url.clone(), block_html());
    let renderer = Arc::new(StubRenderer::new(pages));

    let client = build_http_client(&config).unwrap();
    let strategy = FetchStrategy::new(&config, client, Some(renderer.clone())).unwrap();

    let body = strategy.fetch_once(&url).await.unwrap();
    assert!(body.contains("Pardon our interruption..."));
    assert_eq!(renderer.calls(), vec![url]);
}

#[tokio::test]
async fn test_proxied_fetches_run_in_parallel() {
    let target = MockServer::start().await;
    let proxy = MockServer::start().await;

    // Each proxied response takes 200ms; four of them in sequence would
    // take at least 800ms
    Mock::given(any())
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(book_html("Proxied Book", "£6.00"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(4)
        .mount(&proxy)
        .await;

    let mut config = test_config(&target.uri());
    config.site.block_page_title = "Pardon our interruption...".to_string();
    config.proxy = vec![ProxyDescriptor { url: proxy.uri() }];

    let client = build_http_client(&config).unwrap();
    let strategy = Arc::new(FetchStrategy::new(&config, client, None).unwrap());

    let urls: Vec<String> = (1..=4)
        .map(|i| format!("{}/catalogue/book-{i}.html", target.uri()))
        .collect();

    let started = std::time::Instant::now();
    let (a, b, c, d) = tokio::join!(
        strategy.fetch_once(&urls[0]),
        strategy.fetch_once(&urls[1]),
        strategy.fetch_once(&urls[2]),
        strategy.fetch_once(&urls[3]),
    );
    let elapsed = started.elapsed();

    for body in [a, b, c, d] {
        assert!(body.unwrap().contains("Proxied Book"));
    }
    assert!(
        elapsed < Duration::from_millis(600),
        "proxied fetches were serialized: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_block_with_no_fallback_is_an_error() {
    let target = MockServer::start().await;
    let url = format!("{}/catalogue/book-1.html", target.uri());
    mount_page(&target, "/catalogue/book-1.html", block_html()).await;

    let mut config = test_config(&target.uri());
    config.site.block_page_title = "Pardon our interruption...".to_string();

    let client = build_http_client(&config).unwrap();
    let strategy = FetchStrategy::new(&config, client, None).unwrap();

    let result = strategy.fetch_once(&url).await;
    assert!(matches!(result, Err(FetchError::BlockDetected)));
}

// ===== Phasing and concurrency =====

// With a renderer configured and no proxies, every fetch goes through the
// browser path, so the stub renderer observes the order and overlap of all
// page loads. The mock server only lends these tests a plausible base URL.

#[tokio::test]
async fn test_list_pages_drain_before_detail_pages() {
    let server = MockServer::start().await;
    let base = server.uri();

    let list_url = format!("{base}/catalogue/page-1.html");
    let book_urls: Vec<String> = (1..=3)
        .map(|i| format!("{base}/catalogue/book-{i}.html"))
        .collect();

    let mut pages = HashMap::new();
    pages.insert(list_url.clone(), catalogue_html(&book_urls, 1, 1));
    for (i, url) in book_urls.iter().enumerate() {
        pages.insert(url.clone(), book_html(&format!("Book {i}"), "£3.00"));
    }
    let renderer = Arc::new(StubRenderer::new(pages).with_delay(Duration::from_millis(10)));

    let engine = test_engine(test_config(&base), Some(renderer.clone()));
    engine.run_pass().await.unwrap();

    let calls = renderer.calls();
    let last_list = calls.iter().rposition(|u| *u == list_url).unwrap();
    let first_detail = calls
        .iter()
        .position(|u| book_urls.contains(u))
        .unwrap();
    assert!(
        last_list < first_detail,
        "detail page rendered before the catalogue drained: {:?}",
        calls
    );
}

#[tokio::test]
async fn test_concurrency_stays_bounded() {
    let server = MockServer::start().await;
    let base = server.uri();

    let list_url = format!("{base}/catalogue/page-1.html");
    let book_urls: Vec<String> = (1..=8)
        .map(|i| format!("{base}/catalogue/book-{i}.html"))
        .collect();

    let mut pages = HashMap::new();
    pages.insert(list_url, catalogue_html(&book_urls, 1, 1));
    for (i, url) in book_urls.iter().enumerate() {
        pages.insert(url.clone(), book_html(&format!("Book {i}"), "£3.00"));
    }
    let renderer = Arc::new(StubRenderer::new(pages).with_delay(Duration::from_millis(30)));

    let mut config = test_config(&base);
    config.crawler.concurrency = 3;
    let engine = test_engine(config, Some(renderer.clone()));
    engine.run_pass().await.unwrap();

    assert_eq!(
        engine.store().lock().unwrap().count_records().unwrap(),
        8
    );
    let max = renderer.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "observed {} concurrent renders", max);
}
