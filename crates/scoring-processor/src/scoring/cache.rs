use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::upstream::{ChallengeId, ReviewTypeNames, ScorecardId, SubmissionApi, UpstreamError};

fn build_cache<K, V>(ttl: Option<Duration>) -> Cache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let mut builder = Cache::builder();
    if let Some(ttl) = ttl {
        builder = builder.time_to_live(ttl);
    }
    builder.build()
}

/// Why a review type fill produced nothing to cache.
#[derive(Debug)]
enum ReviewTypeFill {
    Empty,
    Upstream(UpstreamError),
}

/// Process-wide review type names, fetched on first use.
///
/// Concurrent callers share a single upstream listing.
pub struct ReviewTypeCache {
    entry: Cache<(), Arc<ReviewTypeNames>>,
}

impl ReviewTypeCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entry: build_cache(ttl),
        }
    }

    pub async fn get_or_fetch<S>(&self, api: &S) -> Result<Arc<ReviewTypeNames>, UpstreamError>
    where
        S: SubmissionApi + ?Sized,
    {
        let fill = async {
            let listing = match api.list_review_types().await {
                Ok(listing) => listing,
                Err(err) => return Err(ReviewTypeFill::Upstream(err)),
            };
            let names: ReviewTypeNames = listing.into_iter().collect();
            debug!(count = names.len(), "fetched review types");
            // an empty listing is retried on the next call rather than pinned
            if names.is_empty() {
                return Err(ReviewTypeFill::Empty);
            }
            Ok::<_, ReviewTypeFill>(Arc::new(names))
        };

        match self.entry.try_get_with((), fill).await {
            Ok(names) => Ok(names),
            Err(shared) => match Arc::try_unwrap(shared) {
                Ok(ReviewTypeFill::Empty) => Ok(Arc::new(ReviewTypeNames::default())),
                Ok(ReviewTypeFill::Upstream(err)) => Err(err),
                Err(shared) => match shared.as_ref() {
                    ReviewTypeFill::Empty => Ok(Arc::new(ReviewTypeNames::default())),
                    ReviewTypeFill::Upstream(err) => {
                        Err(UpstreamError::Unavailable(err.to_string()))
                    }
                },
            },
        }
    }

    pub fn invalidate(&self) {
        self.entry.invalidate_all();
    }
}

/// Scorecard ids resolved from the challenge API, keyed by challenge.
pub struct ScorecardCache {
    entries: Cache<ChallengeId, ScorecardId>,
}

impl ScorecardCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: build_cache(ttl),
        }
    }

    pub async fn get(&self, challenge_id: &ChallengeId) -> Option<ScorecardId> {
        self.entries.get(challenge_id).await
    }

    pub async fn insert(&self, challenge_id: ChallengeId, scorecard_id: ScorecardId) {
        self.entries.insert(challenge_id, scorecard_id).await;
    }

    pub fn invalidate(&self) {
        self.entries.invalidate_all();
    }
}
