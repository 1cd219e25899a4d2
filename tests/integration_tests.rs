//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: settings → fetcher → page client → mock
//! GitHub API → deduplicated identities, plus the HTTP server routes.

use serde_json::{json, Value};
use stargazer::accumulator::{collect, collect_partial};
use stargazer::cli::{router, ServerConfig};
use stargazer::neighbours::{find_star_neighbours, NeighbourOptions};
use stargazer::{ApiFlavor, Credential, FailureKind, Fetcher, Identity, Settings};
use stargazer::cache::MemoryPageCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn settings(server: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.api.rest_base_url = server.uri();
    settings.api.graphql_url = format!("{}/graphql", server.uri());
    settings.fetch.request_interval_ms = 0;
    settings.backoff.initial_ms = 10;
    settings.backoff.max_ms = 50;
    settings.cache.enabled = false;
    settings
}

fn logins(values: &[&str]) -> Value {
    Value::Array(values.iter().map(|v| json!({ "login": v })).collect())
}

fn repos(values: &[&str]) -> Value {
    Value::Array(values.iter().map(|v| json!({ "full_name": v })).collect())
}

fn strings(items: &[Identity]) -> Vec<&str> {
    items.iter().map(Identity::as_str).collect()
}

// ============================================================================
// REST Pagination
// ============================================================================

#[tokio::test]
async fn test_rest_follows_link_header_and_dedups() {
    let server = MockServer::start().await;
    let next = format!("{}/repositories/42/stargazers?per_page=2&page=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/stargazers"))
        .and(query_param("per_page", "2"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", format!("<{next}>; rel=\"next\"").as_str())
                .insert_header("x-ratelimit-remaining", "4999")
                .set_body_json(logins(&["alice", "bob"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repositories/42/stargazers"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "4998")
                .set_body_json(logins(&["bob", "carol"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.fetch.page_size = 2;
    let fetcher = Fetcher::from_settings(&settings).unwrap();
    let credential = Credential::new("secret");

    let stream = fetcher
        .stargazers("octo", "hello", &credential, CancellationToken::new())
        .unwrap();
    let items = collect(stream).await.unwrap();

    assert_eq!(strings(&items), vec!["alice", "bob", "carol"]);
    assert_eq!(fetcher.rate_limit_status(&credential).remaining, Some(4998));
}

#[tokio::test]
async fn test_rest_waits_out_exhausted_quota() {
    let server = MockServer::start().await;
    let past_reset = chrono::Utc::now().timestamp() - 10;

    Mock::given(method("GET"))
        .and(path("/users/octocat/starred"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", past_reset.to_string().as_str())
                .set_body_json(json!({"message": "API rate limit exceeded"})),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/octocat/starred"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "4999")
                .set_body_json(repos(&["rust-lang/rust"])),
        )
        .mount(&server)
        .await;

    let fetcher = Fetcher::from_settings(&settings(&server)).unwrap();
    let started = tokio::time::Instant::now();

    let stream = fetcher
        .starred("octocat", &Credential::new("t"), CancellationToken::new())
        .unwrap();
    let items = collect(stream).await.unwrap();

    assert_eq!(strings(&items), vec!["rust-lang/rust"]);
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rest_unauthorized_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/stargazers"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::from_settings(&settings(&server)).unwrap();
    let stream = fetcher
        .stargazers("octo", "hello", &Credential::new("wrong"), CancellationToken::new())
        .unwrap();
    let failure = collect(stream).await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::Fatal);
    assert_eq!(failure.status, Some(401));
    assert_eq!(failure.partial_count, 0);
    assert!(failure.last_token.is_first());
}

#[tokio::test]
async fn test_rest_retries_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat/starred"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/octocat/starred"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repos(&["a/b", "c/d"])))
        .mount(&server)
        .await;

    let fetcher = Fetcher::from_settings(&settings(&server)).unwrap();
    let stream = fetcher
        .starred("octocat", &Credential::anonymous(), CancellationToken::new())
        .unwrap();
    let items = collect(stream).await.unwrap();

    assert_eq!(strings(&items), vec!["a/b", "c/d"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_rest_partial_result_on_exhausted_retries() {
    let server = MockServer::start().await;
    let next = format!("{}/users/octocat/starred?page=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/users/octocat/starred"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/octocat/starred"))
        .and(query_param("per_page", "100"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", format!("<{next}>; rel=\"next\"").as_str())
                .set_body_json(repos(&["a/b"])),
        )
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.fetch.max_attempts = 2;
    let fetcher = Fetcher::from_settings(&settings).unwrap();
    let stream = fetcher
        .starred("octocat", &Credential::anonymous(), CancellationToken::new())
        .unwrap();
    let (items, failure) = collect_partial(stream).await;

    assert_eq!(strings(&items), vec!["a/b"]);
    let failure = failure.unwrap();
    assert_eq!(failure.kind, FailureKind::RetriesExhausted);
    assert_eq!(failure.partial_count, 1);
    assert_eq!(failure.last_token.as_str(), Some(next.as_str()));
}

// ============================================================================
// Conditional Requests
// ============================================================================

#[tokio::test]
async fn test_expired_page_revalidated_with_etag() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/stargazers"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"v1\"")
                .insert_header("x-ratelimit-remaining", "4999")
                .set_body_json(logins(&["alice", "bob"])),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/stargazers"))
        .and(header("If-None-Match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304).insert_header("x-ratelimit-remaining", "4998"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = Fetcher::from_settings(&settings(&server))
        .unwrap()
        .with_cache(Arc::new(MemoryPageCache::with_ttl(Duration::from_millis(50))));
    let credential = Credential::new("secret");

    let first = collect(
        fetcher
            .stargazers("octo", "hello", &credential, CancellationToken::new())
            .unwrap(),
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = collect(
        fetcher
            .stargazers("octo", "hello", &credential, CancellationToken::new())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(strings(&first), vec!["alice", "bob"]);
    assert_eq!(strings(&second), vec!["alice", "bob"]);
    assert_eq!(fetcher.rate_limit_status(&credential).remaining, Some(4998));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].headers.contains_key("if-none-match"));
    assert!(!requests[1].headers.contains_key("if-modified-since"));
}

#[tokio::test]
async fn test_fresh_cache_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/octocat/starred"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("last-modified", "Wed, 21 Oct 2015 07:28:00 GMT")
                .set_body_json(repos(&["rust-lang/rust"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.cache.enabled = true;
    settings.cache.ttl_seconds = 300;
    let fetcher = Fetcher::from_settings(&settings).unwrap();
    let credential = Credential::anonymous();

    for _ in 0..2 {
        let items = collect(
            fetcher
                .starred("octocat", &credential, CancellationToken::new())
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(strings(&items), vec!["rust-lang/rust"]);
    }
}

// ============================================================================
// GraphQL Pagination
// ============================================================================

/// Answers by the `after` cursor of the request
struct CursorResponder;

impl Respond for CursorResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let (logins, has_next, cursor) = match body["variables"]["after"].as_str() {
            None => (vec!["alice", "bob"], true, json!("Y3Vyc29yOjI=")),
            Some("Y3Vyc29yOjI=") => (vec!["carol"], false, Value::Null),
            Some(other) => panic!("unexpected cursor {other}"),
        };
        let nodes: Vec<Value> = logins.iter().map(|l| json!({ "login": l })).collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "repository": {
                    "stargazers": {
                        "pageInfo": { "hasNextPage": has_next, "endCursor": cursor },
                        "nodes": nodes,
                    }
                }
            }
        }))
    }
}

#[tokio::test]
async fn test_graphql_follows_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(CursorResponder)
        .expect(2)
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.api.flavor = ApiFlavor::Graphql;
    let fetcher = Fetcher::from_settings(&settings).unwrap();

    let stream = fetcher
        .stargazers("octo", "hello", &Credential::new("t"), CancellationToken::new())
        .unwrap();
    let items = collect(stream).await.unwrap();

    assert_eq!(strings(&items), vec!["alice", "bob", "carol"]);
}

// ============================================================================
// Star Neighbours
// ============================================================================

async fn mount_neighbour_fixture(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/octo/a/stargazers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(logins(&["u1", "u2", "u3", "u4"])))
        .mount(server)
        .await;

    let starred = [
        ("u1", vec!["octo/a", "octo/b", "octo/d"]),
        ("u2", vec!["octo/a", "octo/b", "octo/c"]),
        ("u3", vec!["octo/a", "octo/c", "octo/e"]),
        ("u4", vec!["octo/a", "octo/e"]),
    ];
    for (user, names) in starred {
        Mock::given(method("GET"))
            .and(path(format!("/users/{user}/starred")))
            .respond_with(ResponseTemplate::new(200).set_body_json(repos(&names)))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_star_neighbours_end_to_end() {
    let server = MockServer::start().await;
    mount_neighbour_fixture(&server).await;

    let fetcher = Fetcher::from_settings(&settings(&server)).unwrap();
    let neighbours = find_star_neighbours(
        &fetcher,
        "octo",
        "a",
        &Credential::new("t"),
        NeighbourOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        serde_json::to_value(&neighbours).unwrap(),
        json!([
            {"repo": "octo/b", "stargazers": ["u1", "u2"]},
            {"repo": "octo/c", "stargazers": ["u2", "u3"]},
            {"repo": "octo/e", "stargazers": ["u3", "u4"]},
        ])
    );
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn spawn_server(settings: &Settings) -> String {
    let fetcher = Fetcher::from_settings(settings).unwrap();
    let app = router(
        fetcher,
        ServerConfig::from_settings(settings),
        CancellationToken::new(),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_server_routes() {
    let upstream = MockServer::start().await;
    mount_neighbour_fixture(&upstream).await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/missing/stargazers"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&upstream)
        .await;

    let mut settings = settings(&upstream);
    settings.github_account = "octocat".into();
    let base = spawn_server(&settings).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let info: Value = client
        .get(format!("{base}/info"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["data"]["app_name"], "Stargazer");
    assert_eq!(info["data"]["environment"], "dev");
    assert_eq!(info["data"]["github_account"], "octocat");

    let response = client
        .get(format!("{base}/repos/octo/a/stargazers"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["repo"], "octo/a");
    assert_eq!(body["data"]["stargazers"], json!(["u1", "u2", "u3", "u4"]));

    let response = client
        .get(format!("{base}/users/u4/starred"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["starred"], json!(["octo/a", "octo/e"]));

    let response = client
        .get(format!("{base}/repos/octo/a/starneighbours?min_shared=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let response = client
        .get(format!("{base}/repos/octo/missing/stargazers"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let response = client
        .get(format!("{base}/rate_limit"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["is_rate_limited"], false);
}
