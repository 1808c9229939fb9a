use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::cache::ScorecardCache;
use super::ScoringError;
use crate::upstream::{ChallengeApi, ChallengeId, Review, ScorecardId, SubmissionApi};

/// Where a resolved scorecard id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorecardSource {
    Cache,
    ChallengeApi,
    ReviewFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorecardResolution {
    pub scorecard_id: ScorecardId,
    pub source: ScorecardSource,
}

/// Resolves the scorecard a submission is measured against.
pub struct ScorecardResolver<C> {
    challenges: Arc<C>,
    cache: ScorecardCache,
}

impl<C> ScorecardResolver<C>
where
    C: ChallengeApi + 'static,
{
    pub fn new(challenges: Arc<C>, ttl: Option<Duration>) -> Self {
        Self {
            challenges,
            cache: ScorecardCache::new(ttl),
        }
    }

    /// Prefers the challenge's scorecard and falls back to the first valid review's.
    /// Upstream failures along the way are logged and never surface.
    pub async fn resolve<S>(
        &self,
        submissions: &S,
        submission_id: &str,
        valid_reviews: &[&Review],
    ) -> Result<ScorecardResolution, ScoringError>
    where
        S: SubmissionApi + ?Sized,
    {
        if let Some(challenge_id) = self.challenge_of(submissions, submission_id).await {
            if let Some(scorecard_id) = self.lookup(&challenge_id).await {
                return Ok(scorecard_id);
            }
        }

        let review = valid_reviews
            .first()
            .ok_or_else(|| ScoringError::NoScorecard {
                submission_id: submission_id.to_string(),
            })?;

        warn!(
            %submission_id,
            scorecard_id = %review.score_card_id,
            "populating scorecard from valid reviews; challenge scorecard unavailable"
        );
        Ok(ScorecardResolution {
            scorecard_id: review.score_card_id.clone(),
            source: ScorecardSource::ReviewFallback,
        })
    }

    async fn challenge_of<S>(&self, submissions: &S, submission_id: &str) -> Option<ChallengeId>
    where
        S: SubmissionApi + ?Sized,
    {
        match submissions.get_submission(submission_id).await {
            Ok(submission) => submission.challenge_id,
            Err(err) => {
                warn!(%submission_id, error = %err, "unable to fetch submission for scorecard lookup");
                None
            }
        }
    }

    async fn lookup(&self, challenge_id: &ChallengeId) -> Option<ScorecardResolution> {
        if let Some(scorecard_id) = self.cache.get(challenge_id).await {
            return Some(ScorecardResolution {
                scorecard_id,
                source: ScorecardSource::Cache,
            });
        }

        match self.challenges.scorecard_id(challenge_id).await {
            Ok(scorecard_id) => {
                debug!(%challenge_id, %scorecard_id, "populating scorecard from challenge API");
                self.cache
                    .insert(challenge_id.clone(), scorecard_id.clone())
                    .await;
                Some(ScorecardResolution {
                    scorecard_id,
                    source: ScorecardSource::ChallengeApi,
                })
            }
            Err(err) => {
                warn!(%challenge_id, error = %err, "challenge scorecard lookup failed");
                None
            }
        }
    }
}
