//! Integration tests for the refresh pipeline
//!
//! These tests use wiremock to create mock HTTP servers and run complete
//! refresh cycles against an in-memory store.

use reshelf::refresh::{build_http_client, content_hash, fetch_page, parse_http_date};
use reshelf::state::RetryPolicy;
use reshelf::storage::{Bookmark, BookmarkStore, Entry, FetchCandidate, Storage};
use reshelf::strategy::{reddit, youtube, SiteStrategy};
use reshelf::{run_refresh, FetchError, RefreshOptions, RefreshReport, StrategyRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use wiremock::matchers::{header, header_exists, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIRST_MODIFIED: &str = "Mon, 01 Jan 2024 10:00:00 GMT";
const SECOND_MODIFIED: &str = "Tue, 02 Jan 2024 10:00:00 GMT";

fn html(text: &str) -> String {
    format!("<html><body><p>{}</p></body></html>", text)
}

fn ok_page(text: &str, last_modified: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(html(text))
        .insert_header("content-type", "text/html; charset=utf-8")
        .insert_header("last-modified", last_modified)
}

/// Options with short delays so failing tests finish quickly
fn test_options(threads: usize) -> RefreshOptions {
    RefreshOptions {
        threads,
        retry: RetryPolicy::new(2, Duration::from_millis(20)),
        timeout: Duration::from_secs(5),
        ..RefreshOptions::default()
    }
}

fn store_with(hrefs: &[String]) -> (BookmarkStore, Vec<i64>) {
    let mut store = BookmarkStore::open_in_memory().unwrap();
    let ids = hrefs
        .iter()
        .enumerate()
        .map(|(i, href)| {
            store
                .insert(&Entry {
                    title: format!("Bookmark {}", i),
                    href: href.clone(),
                    date: 1_700_000_000,
                    icon: None,
                })
                .unwrap()
                .unwrap()
        })
        .collect();
    (store, ids)
}

async fn refresh(
    store: &mut BookmarkStore,
    registry: StrategyRegistry,
    options: RefreshOptions,
) -> RefreshReport {
    run_refresh(store, Arc::new(registry), options)
        .await
        .expect("refresh run failed")
}

fn bookmark(store: &BookmarkStore, id: i64) -> Bookmark {
    store.get_bookmark(id).unwrap().unwrap()
}

fn strategy_for(server: &MockServer, name: &str, path_pattern: &str) -> SiteStrategy {
    let pattern = format!("^{}{}", regex::escape(&server.uri()), path_pattern);
    SiteStrategy::new(name, &pattern).unwrap()
}

#[tokio::test]
async fn test_first_fetch_stores_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ok_page("Hello   world", FIRST_MODIFIED))
        .expect(1)
        .mount(&server)
        .await;

    let (mut store, ids) = store_with(&[format!("{}/article", server.uri())]);
    let report = refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;

    assert_eq!(report.candidates, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.failed(), 0);

    let stored = bookmark(&store, ids[0]);
    assert_eq!(stored.content.as_deref(), Some("Hello world"));
    assert_eq!(stored.hash, content_hash(html("Hello   world").as_bytes()));
    assert_eq!(stored.modified, parse_http_date(FIRST_MODIFIED));
    assert_eq!(stored.version, 0);
}

#[tokio::test]
async fn test_not_modified_response_skips_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .and(header("if-modified-since", FIRST_MODIFIED))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ok_page("original text", FIRST_MODIFIED))
        .expect(1)
        .mount(&server)
        .await;

    let (mut store, ids) = store_with(&[format!("{}/article", server.uri())]);
    refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;
    let before = bookmark(&store, ids[0]);

    let report = refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.updated, 0);

    let after = bookmark(&store, ids[0]);
    assert_eq!(after.content, before.content);
    assert_eq!(after.hash, before.hash);
    assert_eq!(after.modified, before.modified);
}

#[tokio::test]
async fn test_new_last_modified_with_same_body_keeps_stored_timestamp() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ok_page("stable text", FIRST_MODIFIED))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ok_page("stable text", SECOND_MODIFIED))
        .mount(&server)
        .await;

    let (mut store, ids) = store_with(&[format!("{}/article", server.uri())]);
    refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;

    let report = refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.updated, 0);

    let stored = bookmark(&store, ids[0]);
    assert_eq!(stored.content.as_deref(), Some("stable text"));
    assert_eq!(stored.modified, parse_http_date(FIRST_MODIFIED));
}

#[tokio::test]
async fn test_new_last_modified_with_new_body_updates_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ok_page("the draft version", FIRST_MODIFIED))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ok_page("the published version", SECOND_MODIFIED))
        .mount(&server)
        .await;

    let (mut store, ids) = store_with(&[format!("{}/article", server.uri())]);
    refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;
    assert_eq!(store.search("draft", "[", "]").unwrap().len(), 1);

    let report = refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;
    assert_eq!(report.updated, 1);

    let stored = bookmark(&store, ids[0]);
    assert_eq!(stored.content.as_deref(), Some("the published version"));
    assert_eq!(
        stored.hash,
        content_hash(html("the published version").as_bytes())
    );
    assert_eq!(stored.modified, parse_http_date(SECOND_MODIFIED));

    // The index only knows the current content
    assert!(store.search("draft", "[", "]").unwrap().is_empty());
    assert_eq!(store.search("published", "[", "]").unwrap()[0].id, ids[0]);
}

#[tokio::test]
async fn test_outdated_run_forces_rewrite() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/special/page"))
        .respond_with(ok_page("same old text", FIRST_MODIFIED))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ok_page("plain text", FIRST_MODIFIED))
        .expect(1)
        .mount(&server)
        .await;

    let (mut store, ids) = store_with(&[
        format!("{}/special/page", server.uri()),
        format!("{}/plain", server.uri()),
    ]);
    refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;
    assert_eq!(bookmark(&store, ids[0]).version, 0);

    let registry =
        StrategyRegistry::new(vec![strategy_for(&server, "special", "/special/").with_version(3)]);
    let options = RefreshOptions {
        outdated_only: true,
        ..test_options(2)
    };
    let report = refresh(&mut store, registry, options).await;

    assert_eq!(report.candidates, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.updated, 1);

    let stored = bookmark(&store, ids[0]);
    assert_eq!(stored.version, 3);
    assert_eq!(stored.content.as_deref(), Some("same old text"));
}

#[tokio::test]
async fn test_overwrite_rewrites_identical_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .and(header_exists("if-modified-since"))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ok_page("unchanging", FIRST_MODIFIED))
        .expect(2)
        .mount(&server)
        .await;

    let (mut store, _ids) = store_with(&[format!("{}/article", server.uri())]);
    let options = RefreshOptions {
        overwrite: true,
        ..test_options(2)
    };

    let first = refresh(&mut store, StrategyRegistry::empty(), options.clone()).await;
    let second = refresh(&mut store, StrategyRegistry::empty(), options).await;

    assert_eq!(first.updated, 1);
    assert_eq!(second.updated, 1);
    assert_eq!(second.unchanged, 0);
}

#[tokio::test]
async fn test_uncached_only_skips_fetched_bookmarks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ok_page("old text", FIRST_MODIFIED))
        .expect(1)
        .mount(&server)
        .await;

    let (mut store, _) = store_with(&[format!("{}/old", server.uri())]);
    refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ok_page("new text", FIRST_MODIFIED))
        .expect(1)
        .mount(&server)
        .await;
    store
        .insert(&Entry {
            title: "New".to_string(),
            href: format!("{}/new", server.uri()),
            ..Entry::default()
        })
        .unwrap();

    let options = RefreshOptions {
        uncached_only: true,
        ..test_options(2)
    };
    let report = refresh(&mut store, StrategyRegistry::empty(), options).await;
    assert_eq!(report.candidates, 1);
    assert_eq!(report.updated, 1);
}

#[tokio::test]
async fn test_retry_recovers_from_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ok_page("eventually served", FIRST_MODIFIED))
        .mount(&server)
        .await;

    let (mut store, ids) = store_with(&[format!("{}/flaky", server.uri())]);
    let report = refresh(&mut store, StrategyRegistry::empty(), test_options(2)).await;

    assert_eq!(report.updated, 1);
    assert_eq!(report.exhausted, 0);
    assert_eq!(
        bookmark(&store, ids[0]).content.as_deref(),
        Some("eventually served")
    );
}

#[tokio::test]
async fn test_exhausted_retries_are_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/up"))
        .respond_with(ok_page("still reachable", FIRST_MODIFIED))
        .mount(&server)
        .await;

    let (mut store, ids) = store_with(&[
        format!("{}/down", server.uri()),
        format!("{}/up", server.uri()),
    ]);
    let options = RefreshOptions {
        retry: RetryPolicy::new(3, Duration::from_millis(10)),
        ..test_options(2)
    };
    let report = refresh(&mut store, StrategyRegistry::empty(), options).await;

    assert_eq!(report.exhausted, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(bookmark(&store, ids[0]).content, None);
    assert_eq!(
        bookmark(&store, ids[1]).content.as_deref(),
        Some("still reachable")
    );
}

#[tokio::test]
async fn test_latin1_page_is_stored_and_searchable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menu"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    b"<html><body><p>Caf\xe9 menu prices</p></body></html>".to_vec(),
                    "text/html; charset=iso-8859-1",
                )
                .insert_header("last-modified", FIRST_MODIFIED),
        )
        .mount(&server)
        .await;

    let (mut store, ids) = store_with(&[format!("{}/menu", server.uri())]);
    let report = refresh(&mut store, StrategyRegistry::empty(), test_options(1)).await;

    assert_eq!(report.updated, 1);
    assert_eq!(report.extract_failed, 0);

    let stored = bookmark(&store, ids[0]);
    assert_eq!(stored.content.as_deref(), Some("Café menu prices"));
    assert_ne!(stored.hash, 0);

    let results = store.search("menu prices", "[", "]").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, ids[0]);
}

#[tokio::test]
async fn test_connection_reset_is_recognized() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    // Reads the request, then closes with an RST instead of a FIN
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buffer = [0u8; 4096];
        let _ = stream.read(&mut buffer).await;
        stream.set_linger(Some(Duration::ZERO)).unwrap();
        drop(stream);
    });

    let client = build_http_client(&test_options(1)).unwrap();
    let candidate = FetchCandidate {
        id: 1,
        href: format!("http://{}/blocked", address),
        title: "Blocked".to_string(),
        hash: 0,
        last_modified: None,
        version: 0,
        outdated: false,
    };

    let error = fetch_page(&client, &StrategyRegistry::empty(), &candidate)
        .await
        .unwrap_err();
    assert!(matches!(error, FetchError::Network { .. }), "{:?}", error);
    assert!(error.is_connection_reset(), "{:?}", error);

    server.await.unwrap();
}

#[tokio::test]
async fn test_refused_connection_is_not_a_reset() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = build_http_client(&test_options(1)).unwrap();
    let candidate = FetchCandidate {
        id: 1,
        href: format!("http://{}/closed", address),
        title: "Closed".to_string(),
        hash: 0,
        last_modified: None,
        version: 0,
        outdated: false,
    };

    let error = fetch_page(&client, &StrategyRegistry::empty(), &candidate)
        .await
        .unwrap_err();
    assert!(matches!(error, FetchError::Network { .. }), "{:?}", error);
    assert!(!error.is_connection_reset(), "{:?}", error);
}

#[tokio::test]
async fn test_server_error_is_not_a_reset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = build_http_client(&test_options(1)).unwrap();
    let candidate = FetchCandidate {
        id: 1,
        href: format!("{}/busy", server.uri()),
        title: "Busy".to_string(),
        hash: 0,
        last_modified: None,
        version: 0,
        outdated: false,
    };

    let error = fetch_page(&client, &StrategyRegistry::empty(), &candidate)
        .await
        .unwrap_err();
    assert!(matches!(error, FetchError::Status { status: 503, .. }), "{:?}", error);
    assert!(!error.is_connection_reset());
}

fn slow_failing_server_hrefs(server: &MockServer, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{}/slow/{}", server.uri(), i))
        .collect()
}

async fn mount_slow_failures(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/slow/\d+$"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(100)))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_bound_with_early_release() {
    let server = MockServer::start().await;
    mount_slow_failures(&server).await;

    let (mut store, _) = store_with(&slow_failing_server_hrefs(&server, 12));
    let options = RefreshOptions {
        early_release_slots: 1,
        retry: RetryPolicy::new(2, Duration::from_millis(10)),
        ..test_options(3)
    };
    let report = refresh(&mut store, StrategyRegistry::empty(), options).await;

    // A retrying worker moves to the background slot and a fresh one starts
    assert_eq!(report.exhausted, 12);
    assert_eq!(report.peak_in_flight, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_bound_without_early_release() {
    let server = MockServer::start().await;
    mount_slow_failures(&server).await;

    let (mut store, _) = store_with(&slow_failing_server_hrefs(&server, 9));
    let options = RefreshOptions {
        early_release_slots: 0,
        retry: RetryPolicy::new(2, Duration::from_millis(10)),
        ..test_options(3)
    };
    let report = refresh(&mut store, StrategyRegistry::empty(), options).await;

    assert_eq!(report.exhausted, 9);
    assert!(report.peak_in_flight <= 3, "peak {}", report.peak_in_flight);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_uncached_only_disables_early_release() {
    let server = MockServer::start().await;
    mount_slow_failures(&server).await;

    let (mut store, _) = store_with(&slow_failing_server_hrefs(&server, 9));
    let options = RefreshOptions {
        early_release_slots: 2,
        uncached_only: true,
        retry: RetryPolicy::new(2, Duration::from_millis(10)),
        ..test_options(3)
    };
    let report = refresh(&mut store, StrategyRegistry::empty(), options).await;

    assert_eq!(report.exhausted, 9);
    assert!(report.peak_in_flight <= 3, "peak {}", report.peak_in_flight);
}

#[tokio::test]
async fn test_reddit_thread_uses_json_endpoint_and_cookie() {
    let server = MockServer::start().await;
    let listing = r#"[
        {"kind": "Listing", "data": {"children": [
            {"kind": "t3", "data": {"title": "Thread", "selftext": "Post body"}}
        ]}},
        {"kind": "Listing", "data": {"children": [
            {"kind": "t1", "data": {"body": "First comment", "replies": ""}},
            {"kind": "t1", "data": {"body": "[deleted]", "replies": ""}},
            {"kind": "t1", "data": {"body": "Second   comment", "replies": ""}}
        ]}}
    ]"#;
    Mock::given(method("GET"))
        .and(path("/r/rust/comments/abc123/thread/.json"))
        .and(header("cookie", reddit::SESSION_COOKIE))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing)
                .insert_header("content-type", "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let registry = StrategyRegistry::new(vec![strategy_for(&server, "reddit", "/r/.*/comments/")
        .with_version(reddit::VERSION)
        .with_rewrite(reddit::rewrite)
        .with_header("Cookie", reddit::SESSION_COOKIE)
        .with_extractor(reddit::extract)]);

    let (mut store, ids) =
        store_with(&[format!("{}/r/rust/comments/abc123/thread/", server.uri())]);
    let report = refresh(&mut store, registry, test_options(1)).await;
    assert_eq!(report.updated, 1);

    let stored = bookmark(&store, ids[0]);
    assert_eq!(
        stored.content.as_deref(),
        Some("Post body First comment Second comment")
    );
    assert_eq!(stored.version, reddit::VERSION);
}

#[tokio::test]
async fn test_youtube_description_replaces_generic_text() {
    let server = MockServer::start().await;
    let page = r#"<html><body><p>Generic page chrome</p>
        <script>var ytInitialPlayerResponse = {"videoDetails":{"videoId":"abc","shortDescription":"Talk about\nconcurrency   in Rust & more","isCrawlable":true}};</script>
        </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let registry = StrategyRegistry::new(vec![strategy_for(&server, "youtube", "/watch")
        .with_version(youtube::VERSION)
        .with_extractor(youtube::extract)]);

    let (mut store, ids) = store_with(&[format!("{}/watch?v=abc", server.uri())]);
    let report = refresh(&mut store, registry, test_options(1)).await;
    assert_eq!(report.updated, 1);

    let stored = bookmark(&store, ids[0]);
    assert_eq!(
        stored.content.as_deref(),
        Some("Talk about concurrency in Rust & more")
    );
    assert_eq!(stored.version, youtube::VERSION);
}

#[tokio::test]
async fn test_empty_store_is_a_no_op() {
    let mut store = BookmarkStore::open_in_memory().unwrap();
    let report = refresh(&mut store, StrategyRegistry::empty(), test_options(4)).await;

    assert_eq!(report.candidates, 0);
    assert_eq!(report.processed(), 0);
    assert_eq!(report.peak_in_flight, 0);
}
