//! REST page client
//!
//! Lists stargazers and starred repositories through the REST API. The first
//! page is addressed by path and `per_page`; every later page is the
//! `rel="next"` URL from the `Link` header, requested verbatim.

use super::classify::{classify_status, transport_outcome, unparseable_success, Classification};
use super::types::{Outcome, PageClient, Validators};
use crate::http::{HttpClient, RequestConfig};
use crate::rate::RateHeaders;
use crate::types::{CollectionKind, Credential, FetchKey, Identity, Page, PageToken};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, ETAG, LAST_MODIFIED, LINK};
use serde::Deserialize;
use tracing::debug;
use url::form_urlencoded::byte_serialize;

/// Media type requested from the REST API
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";
/// Pinned REST API version
pub const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct StargazerEntry {
    login: String,
}

#[derive(Debug, Deserialize)]
struct StarredEntry {
    full_name: String,
}

/// Page client for the REST listing endpoints
#[derive(Debug, Clone)]
pub struct RestPageClient {
    http: HttpClient,
}

impl RestPageClient {
    /// Create a client; `http` must carry the REST base URL
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Path of the first page for a key
    pub fn first_page_path(key: &FetchKey) -> String {
        match key.kind {
            CollectionKind::Stargazers => format!(
                "/repos/{}/{}/stargazers",
                encode(&key.owner_key),
                encode(&key.resource_key)
            ),
            CollectionKind::Starred => format!("/users/{}/starred", encode(&key.owner_key)),
        }
    }

    fn request(credential: &Credential) -> RequestConfig {
        let request = RequestConfig::new()
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION);
        if credential.is_anonymous() {
            request
        } else {
            request.bearer(credential.expose())
        }
    }

    async fn fetch(
        &self,
        key: &FetchKey,
        token: &PageToken,
        page_size: u8,
        credential: &Credential,
        validators: Option<&Validators>,
    ) -> Outcome {
        let mut request = Self::request(credential);
        if let Some(validators) = validators {
            if let Some(etag) = &validators.etag {
                request = request.header("If-None-Match", etag.as_str());
            }
            if let Some(modified) = &validators.last_modified {
                request = request.header("If-Modified-Since", modified.as_str());
            }
        }
        let url = match token.as_str() {
            Some(next) => next.to_string(),
            None => {
                request = request.query("per_page", page_size.to_string());
                Self::first_page_path(key)
            }
        };

        let response = match self.http.get(&url, request).await {
            Ok(response) => response,
            Err(e) => return transport_outcome(&e),
        };

        let status = response.status().as_u16();
        let headers = RateHeaders::from_headers(response.headers());
        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_link_header(v, "next"));
        let received = Validators::new(
            header_value(response.headers(), ETAG),
            header_value(response.headers(), LAST_MODIFIED),
        );

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Outcome::retryable(format!("failed to read body: {e}")),
        };

        match classify_status(status, &headers, &body) {
            Classification::Accept => match parse_items(key.kind, &body) {
                Ok(items) => {
                    debug!(key = %key, items = items.len(), has_more = next.is_some(), "page parsed");
                    Outcome::Success {
                        page: Page::new(items, next),
                        headers,
                        validators: received,
                    }
                }
                Err(e) => unparseable_success(status, headers, &e.to_string()),
            },
            Classification::NotModified if validators.is_none() => Outcome::fatal(
                Some(status),
                "304 Not Modified to an unconditional request",
            ),
            class => class.into_outcome(status, headers, &body),
        }
    }
}

#[async_trait]
impl PageClient for RestPageClient {
    async fn fetch_page(
        &self,
        key: &FetchKey,
        token: &PageToken,
        page_size: u8,
        credential: &Credential,
    ) -> Outcome {
        self.fetch(key, token, page_size, credential, None).await
    }

    async fn fetch_page_if_modified(
        &self,
        key: &FetchKey,
        token: &PageToken,
        page_size: u8,
        credential: &Credential,
        validators: &Validators,
    ) -> Outcome {
        self.fetch(key, token, page_size, credential, Some(validators))
            .await
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn parse_items(kind: CollectionKind, body: &str) -> serde_json::Result<Vec<Identity>> {
    Ok(match kind {
        CollectionKind::Stargazers => serde_json::from_str::<Vec<StargazerEntry>>(body)?
            .into_iter()
            .map(|entry| Identity::new(entry.login))
            .collect(),
        CollectionKind::Starred => serde_json::from_str::<Vec<StarredEntry>>(body)?
            .into_iter()
            .map(|entry| Identity::new(entry.full_name))
            .collect(),
    })
}

fn encode(segment: &str) -> String {
    byte_serialize(segment.as_bytes()).collect()
}

/// Extract the URL for `target_rel` from a `Link` header.
///
/// Format: `<url>; rel="next", <url>; rel="last"`. A rel list such as
/// `rel="next last"` matches either name.
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    for part in header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(value) = segment.strip_prefix("rel=") {
                rel = Some(value.trim_matches('"').trim_matches('\''));
            }
        }

        if let (Some(url), Some(rel)) = (url, rel) {
            if !url.is_empty() && rel.split_whitespace().any(|r| r == target_rel) {
                return Some(url.to_string());
            }
        }
    }

    None
}
