//! GraphQL page client
//!
//! Walks `repository.stargazers` and `user.starredRepositories` connections.
//! The page token is the connection's `endCursor`.

use super::classify::{
    classify_status, excerpt, transport_outcome, unparseable_success, Classification,
};
use super::rest::GITHUB_API_VERSION;
use super::types::{Outcome, PageClient};
use crate::http::{HttpClient, RequestConfig};
use crate::rate::RateHeaders;
use crate::types::{CollectionKind, Credential, FetchKey, Identity, Page, PageToken};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const STARGAZERS_QUERY: &str = "query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    stargazers(first: $first, after: $after) {
      pageInfo { hasNextPage endCursor }
      nodes { login }
    }
  }
}";

const STARRED_QUERY: &str = "query($login: String!, $first: Int!, $after: String) {
  user(login: $login) {
    starredRepositories(first: $first, after: $after) {
      pageInfo { hasNextPage endCursor }
      nodes { nameWithOwner }
    }
  }
}";

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// Page client for the GraphQL API
#[derive(Debug, Clone)]
pub struct GraphQlPageClient {
    http: HttpClient,
    endpoint: String,
}

impl GraphQlPageClient {
    /// Create a client posting to `endpoint`
    pub fn new(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Query document and variables for one page
    pub fn request_body(key: &FetchKey, token: &PageToken, page_size: u8) -> Value {
        match key.kind {
            CollectionKind::Stargazers => json!({
                "query": STARGAZERS_QUERY,
                "variables": {
                    "owner": key.owner_key,
                    "name": key.resource_key,
                    "first": page_size,
                    "after": token.as_str(),
                },
            }),
            CollectionKind::Starred => json!({
                "query": STARRED_QUERY,
                "variables": {
                    "login": key.owner_key,
                    "first": page_size,
                    "after": token.as_str(),
                },
            }),
        }
    }
}

#[async_trait]
impl PageClient for GraphQlPageClient {
    async fn fetch_page(
        &self,
        key: &FetchKey,
        token: &PageToken,
        page_size: u8,
        credential: &Credential,
    ) -> Outcome {
        let mut request = RequestConfig::new()
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .json(Self::request_body(key, token, page_size));
        if !credential.is_anonymous() {
            request = request.bearer(credential.expose());
        }

        let response = match self.http.post(&self.endpoint, request).await {
            Ok(response) => response,
            Err(e) => return transport_outcome(&e),
        };

        let status = response.status().as_u16();
        let headers = RateHeaders::from_headers(response.headers());
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Outcome::retryable(format!("failed to read body: {e}")),
        };

        match classify_status(status, &headers, &body) {
            Classification::Accept => parse_response(key, status, headers, &body),
            class => class.into_outcome(status, headers, &body),
        }
    }

    fn name(&self) -> &'static str {
        "graphql"
    }
}

/// Turn a 2xx GraphQL body into an outcome
fn parse_response(key: &FetchKey, status: u16, headers: RateHeaders, body: &str) -> Outcome {
    let parsed: GraphQlResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => return unparseable_success(status, headers, &e.to_string()),
    };

    if !parsed.errors.is_empty() {
        return error_outcome(&parsed.errors, status, headers);
    }

    let (root, field, node_field) = match key.kind {
        CollectionKind::Stargazers => ("repository", "stargazers", "login"),
        CollectionKind::Starred => ("user", "starredRepositories", "nameWithOwner"),
    };

    let connection = parsed
        .data
        .as_ref()
        .and_then(|data| data.get(root))
        .filter(|value| !value.is_null())
        .and_then(|value| value.get(field));
    let Some(connection) = connection else {
        return Outcome::fatal(Some(404), format!("{root} {key} not found"));
    };

    let connection: Connection = match serde_json::from_value(connection.clone()) {
        Ok(connection) => connection,
        Err(e) => return unparseable_success(status, headers, &e.to_string()),
    };

    let mut items = Vec::with_capacity(connection.nodes.len());
    for node in connection.nodes.into_iter().flatten() {
        match node.get(node_field).and_then(Value::as_str) {
            Some(value) => items.push(Identity::new(value)),
            None => {
                return Outcome::fatal(Some(status), format!("node without {node_field}"));
            }
        }
    }

    let next = if connection.page_info.has_next_page {
        match connection.page_info.end_cursor {
            Some(cursor) if !cursor.is_empty() => Some(cursor),
            _ => {
                return Outcome::fatal(Some(status), "hasNextPage without endCursor");
            }
        }
    } else {
        None
    };

    Outcome::success(Page::new(items, next), headers)
}

fn error_outcome(errors: &[GraphQlError], status: u16, headers: RateHeaders) -> Outcome {
    let has_kind = |kind: &str| errors.iter().any(|e| e.kind.as_deref() == Some(kind));
    let messages = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    if has_kind("RATE_LIMITED") {
        if headers.is_exhausted() {
            return Outcome::PrimaryLimited { headers };
        }
        return Outcome::SecondaryLimited {
            retry_after: headers.retry_after.map(Duration::from_secs),
        };
    }

    let status = if has_kind("NOT_FOUND") { 404 } else { status };
    Outcome::fatal(Some(status), format!("GraphQL error: {}", excerpt(&messages)))
}
