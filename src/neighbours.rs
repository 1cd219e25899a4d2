//! Star neighbours
//!
//! Repositories co-starred by the stargazers of a target repository. The
//! stargazer listing and every per-user starred listing run one after the
//! other through the same [`Fetcher`], so they share the credential's
//! budget, pacer and gate.

use crate::accumulator::collect;
use crate::error::{FailureKind, Result};
use crate::fetcher::Fetcher;
use crate::types::{Credential, Identity};
use serde::Serialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of shared stargazers a repository needs
pub const DEFAULT_MIN_SHARED: usize = 2;

/// A repository co-starred with the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Neighbour {
    /// `owner/name` of the repository
    pub repo: String,
    /// Stargazers of the target who also starred `repo`, in discovery order
    pub stargazers: Vec<String>,
}

/// Limits for a neighbour search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighbourOptions {
    /// Only inspect the first N stargazers; `None` inspects all
    pub max_stargazers: Option<usize>,
    /// Minimum shared stargazers for a repository to be reported
    pub min_shared: usize,
}

impl Default for NeighbourOptions {
    fn default() -> Self {
        Self {
            max_stargazers: None,
            min_shared: DEFAULT_MIN_SHARED,
        }
    }
}

/// Group starred repositories by the stargazers who starred them.
///
/// `entries` pairs each stargazer with the repositories they starred. The
/// target itself is dropped (case-insensitively). Repositories keep their
/// first-seen order.
pub fn aggregate_neighbours<I>(target: &str, entries: I, min_shared: usize) -> Vec<Neighbour>
where
    I: IntoIterator<Item = (Identity, Vec<Identity>)>,
{
    let mut order: Vec<String> = Vec::new();
    let mut by_repo: HashMap<String, Vec<String>> = HashMap::new();

    for (stargazer, repos) in entries {
        for repo in repos {
            if repo.as_str().eq_ignore_ascii_case(target) {
                continue;
            }
            let users = by_repo.entry(repo.as_str().to_string()).or_insert_with(|| {
                order.push(repo.as_str().to_string());
                Vec::new()
            });
            if !users.iter().any(|u| u == stargazer.as_str()) {
                users.push(stargazer.as_str().to_string());
            }
        }
    }

    order
        .into_iter()
        .filter_map(|repo| {
            let stargazers = by_repo.remove(&repo)?;
            (stargazers.len() >= min_shared).then_some(Neighbour { repo, stargazers })
        })
        .collect()
}

/// Find the star neighbours of `owner/repo`.
///
/// A fatal failure for one stargazer's listing (a deleted account, say) is
/// logged and skipped. Exhausted retries or cancellation abort the search.
pub async fn find_star_neighbours(
    fetcher: &Fetcher,
    owner: &str,
    repo: &str,
    credential: &Credential,
    options: NeighbourOptions,
    cancel: CancellationToken,
) -> Result<Vec<Neighbour>> {
    let target = format!("{owner}/{repo}");
    let mut stargazers =
        collect(fetcher.stargazers(owner, repo, credential, cancel.clone())?).await?;
    if let Some(max) = options.max_stargazers {
        stargazers.truncate(max);
    }

    info!(
        target = %target,
        stargazers = stargazers.len(),
        "collecting starred repositories"
    );

    let mut entries = Vec::with_capacity(stargazers.len());
    let mut skipped = 0usize;
    for user in stargazers {
        let stream = fetcher.starred(user.as_str(), credential, cancel.clone())?;
        match collect(stream).await {
            Ok(repos) => {
                debug!(user = %user, repos = repos.len(), "starred repositories fetched");
                entries.push((user, repos));
            }
            Err(failure) if failure.kind == FailureKind::Fatal => {
                warn!(user = %user, error = %failure, "skipping stargazer");
                skipped += 1;
            }
            Err(failure) => return Err(failure.into()),
        }
    }

    let neighbours = aggregate_neighbours(&target, entries, options.min_shared);
    info!(
        target = %target,
        neighbours = neighbours.len(),
        skipped,
        "star neighbours found"
    );
    Ok(neighbours)
}
