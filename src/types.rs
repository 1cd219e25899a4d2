//! Common types used throughout stargazer
//!
//! This module contains the data model shared by the fetch pipeline:
//! what is being listed, page tokens, pages, identities and credentials.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Fetch Key
// ============================================================================

/// Which collection is being listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Users who starred a repository
    Stargazers,
    /// Repositories starred by a user
    Starred,
}

/// Identifies the logical collection being listed.
///
/// Immutable for the lifetime of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchKey {
    /// Collection kind
    pub kind: CollectionKind,
    /// Repository owner, or the user login for [`CollectionKind::Starred`]
    pub owner_key: String,
    /// Repository name; empty for [`CollectionKind::Starred`]
    pub resource_key: String,
}

impl FetchKey {
    /// Key for the stargazers of `owner/repo`
    pub fn stargazers(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            kind: CollectionKind::Stargazers,
            owner_key: owner.into(),
            resource_key: repo.into(),
        }
    }

    /// Key for the repositories starred by `user`
    pub fn starred(user: impl Into<String>) -> Self {
        Self {
            kind: CollectionKind::Starred,
            owner_key: user.into(),
            resource_key: String::new(),
        }
    }

    /// Parse an `owner/repo` slug into a stargazers key
    pub fn parse_repo(slug: &str) -> Option<Self> {
        let (owner, repo) = slug.trim().split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self::stargazers(owner, repo))
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CollectionKind::Stargazers => write!(f, "{}/{}", self.owner_key, self.resource_key),
            CollectionKind::Starred => write!(f, "{}", self.owner_key),
        }
    }
}

// ============================================================================
// Page Token
// ============================================================================

/// Opaque cursor returned by the previous page.
///
/// `None` means "first page". The REST client stores the `rel="next"` URL,
/// the GraphQL client stores `endCursor`. Nothing else inspects the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(Option<String>);

impl PageToken {
    /// Token for the first page
    pub fn first() -> Self {
        Self(None)
    }

    /// Whether this is the first-page token
    pub fn is_first(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the raw token value
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<String> for PageToken {
    fn from(value: String) -> Self {
        Self(Some(value))
    }
}

impl From<&str> for PageToken {
    fn from(value: &str) -> Self {
        Self(Some(value.to_string()))
    }
}

impl From<Option<String>> for PageToken {
    fn from(value: Option<String>) -> Self {
        Self(value)
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(token) => f.write_str(token),
            None => f.write_str("<first>"),
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

/// One stargazer login or one starred repository (`owner/name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identity value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Page
// ============================================================================

/// One page of items plus the cursor to the next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Items in server order
    pub items: Vec<Identity>,
    /// Cursor to the following page, first-page token when there is none
    pub next_token: PageToken,
}

impl Page {
    /// Create a page; `next_token: None` marks the last page
    pub fn new(items: Vec<Identity>, next_token: Option<String>) -> Self {
        Self {
            items,
            next_token: PageToken::from(next_token),
        }
    }

    /// Create the last page of a collection
    pub fn last(items: Vec<Identity>) -> Self {
        Self::new(items, None)
    }

    /// Whether another page follows
    pub fn has_more(&self) -> bool {
        !self.next_token.is_first()
    }

    /// Number of items on this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the page carries no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Credential
// ============================================================================

/// Bearer credential handed in by the caller.
///
/// Opaque; `Debug` never prints the secret.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap a bearer token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Credential for unauthenticated requests
    pub fn anonymous() -> Self {
        Self(String::new())
    }

    /// Whether no token was supplied
    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw token, for building the `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("Credential(anonymous)")
        } else {
            f.write_str("Credential(***)")
        }
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// API Flavor
// ============================================================================

/// Which upstream listing API to page through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    /// REST endpoints paginated by `Link` headers
    #[default]
    Rest,
    /// GraphQL connections paginated by `pageInfo.endCursor`
    Graphql,
}
