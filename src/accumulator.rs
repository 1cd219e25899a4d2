//! Result accumulation
//!
//! Pages may overlap when the upstream listing shifts between requests (a new
//! star lands while we walk the pages). [`Dedup`] forwards each identity the
//! first time it is seen and keeps first-seen order; failures pass through.

use crate::error::FetchFailure;
use crate::types::Identity;
use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;
use std::collections::HashSet;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

pin_project! {
    /// Stream adapter that drops identities already yielded
    #[must_use = "streams do nothing unless polled"]
    pub struct Dedup<S> {
        #[pin]
        inner: S,
        seen: HashSet<Identity>,
        duplicates: usize,
    }
}

impl<S> Dedup<S> {
    /// Wrap a fetch stream
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            seen: HashSet::new(),
            duplicates: 0,
        }
    }

    /// Distinct identities yielded so far
    pub fn distinct(&self) -> usize {
        self.seen.len()
    }

    /// Identities dropped as repeats
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

impl<S> Stream for Dedup<S>
where
    S: Stream<Item = Result<Identity, FetchFailure>>,
{
    type Item = Result<Identity, FetchFailure>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(identity)) => {
                    if this.seen.insert(identity.clone()) {
                        return Poll::Ready(Some(Ok(identity)));
                    }
                    *this.duplicates += 1;
                }
                other => return Poll::Ready(other),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

/// Deduplicate a fetch stream
pub fn dedup<S>(stream: S) -> Dedup<S>
where
    S: Stream<Item = Result<Identity, FetchFailure>>,
{
    Dedup::new(stream)
}

/// Collect every identity, or the terminal failure
pub async fn collect<S>(stream: S) -> Result<Vec<Identity>, FetchFailure>
where
    S: Stream<Item = Result<Identity, FetchFailure>>,
{
    match collect_partial(stream).await {
        (items, None) => Ok(items),
        (_, Some(failure)) => Err(failure),
    }
}

/// Collect identities up to the end or the terminal failure, keeping both
pub async fn collect_partial<S>(stream: S) -> (Vec<Identity>, Option<FetchFailure>)
where
    S: Stream<Item = Result<Identity, FetchFailure>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(identity) => items.push(identity),
            Err(failure) => return (items, Some(failure)),
        }
    }
    (items, None)
}
