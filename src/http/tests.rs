//! Tests for the HTTP client module

use super::*;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::builder().base_url(server.uri()).build();
    HttpClient::with_config(config).unwrap()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.connect_timeout, Duration::from_secs(10));
    assert!(config.base_url.is_none());
    assert!(config.user_agent.starts_with("stargazer/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.github.com")
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(5))
        .header("X-Custom", "value")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.base_url, Some("https://api.github.com".to_string()));
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(
        config.default_headers.get("X-Custom"),
        Some(&"value".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("per_page", "100")
        .header("X-Request-Id", "abc123")
        .json(serde_json::json!({"key": "value"}))
        .bearer("token")
        .timeout(Duration::from_secs(10));

    assert_eq!(config.query.get("per_page"), Some(&"100".to_string()));
    assert_eq!(
        config.headers.get("X-Request-Id"),
        Some(&"abc123".to_string())
    );
    assert!(config.body.is_some());
    assert_eq!(config.bearer.as_deref(), Some("token"));
    assert_eq!(config.timeout, Some(Duration::from_secs(10)));
}

#[test]
fn test_build_url() {
    let config = HttpClientConfig::builder()
        .base_url("https://api.github.com/")
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(
        client.build_url("/repos/a/b/stargazers"),
        "https://api.github.com/repos/a/b/stargazers"
    );
    assert_eq!(
        client.build_url("https://elsewhere.example/next?page=2"),
        "https://elsewhere.example/next?page=2"
    );
}

#[tokio::test]
async fn test_get_with_query_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/stargazers"))
        .and(query_param("per_page", "30"))
        .and(header("X-GitHub-Api-Version", "2022-11-28"))
        .and(header("Authorization", "Bearer ghp_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .get(
            "/repos/octo/hello/stargazers",
            RequestConfig::new()
                .query("per_page", "30")
                .header("X-GitHub-Api-Version", "2022-11-28")
                .bearer("ghp_test"),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_post_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_json(serde_json::json!({"query": "{ viewer { login } }"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"viewer": {"login": "octocat"}}
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .post(
            "/graphql",
            RequestConfig::new().json(serde_json::json!({"query": "{ viewer { login } }"})),
        )
        .await
        .unwrap();

    let data: serde_json::Value = response.json().await.unwrap();
    assert_eq!(data["data"]["viewer"]["login"], "octocat");
}

#[tokio::test]
async fn test_default_headers_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("Accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .header("Accept", "application/vnd.github+json")
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let response = client.get("/secure", RequestConfig::new()).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_error_status_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client.get("/flaky", RequestConfig::new()).await.unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn test_timeout_surfaces_as_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .get("/slow", RequestConfig::new().timeout(Duration::from_millis(50)))
        .await
        .unwrap_err();

    match err {
        crate::error::Error::Http(e) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}
