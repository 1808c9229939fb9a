use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::aggregation::{Aggregation, AggregationPolicy, ScoreAggregator};
use super::cache::ReviewTypeCache;
use super::scorecard::{ScorecardResolver, ScorecardSource};
use super::summation::{upsert_summation, UpsertAction};
use super::ScoringError;
use crate::config::CacheConfig;
use crate::events::{PhaseNotice, ReviewNotice};
use crate::upstream::{
    ChallengeApi, ChallengeId, Review, ReviewSummation, ReviewTypeNames, SubmissionApi,
};

/// Result of a scoring flow that completed without error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScoringOutcome {
    Summarized(SummationReport),
    NoReviews { submission_id: String },
    NoValidReviews { submission_id: String },
    NoSubmissions { challenge_id: ChallengeId },
    Batch(BatchReport),
}

impl ScoringOutcome {
    pub fn summary(&self) -> &'static str {
        match self {
            ScoringOutcome::Summarized(_) => "review summation persisted",
            ScoringOutcome::NoReviews { .. } => "no reviews exist for aggregating",
            ScoringOutcome::NoValidReviews { .. } => "no valid reviews exist for aggregating",
            ScoringOutcome::NoSubmissions { .. } => {
                "no submissions present to aggregate review scores"
            }
            ScoringOutcome::Batch(_) => "appeals response aggregation completed",
        }
    }
}

/// What was written for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummationReport {
    pub summation: ReviewSummation,
    pub action: UpsertAction,
    pub scorecard_source: ScorecardSource,
    pub total_reviews: usize,
    pub valid_reviews: usize,
}

/// Per-submission results of an appeals response closure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub challenge_id: ChallengeId,
    pub summarized: Vec<SummationReport>,
    pub skipped: Vec<SkippedSubmission>,
    pub failed: Vec<FailedSubmission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoReviews,
    NoValidReviews,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSubmission {
    pub submission_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSubmission {
    pub submission_id: String,
    pub error: String,
}

/// Service composing the review type cache, aggregator, scorecard resolver and upsert.
pub struct ScoringService<S, C> {
    submissions: Arc<S>,
    scorecards: ScorecardResolver<C>,
    review_types: ReviewTypeCache,
    aggregator: ScoreAggregator,
}

impl<S, C> ScoringService<S, C>
where
    S: SubmissionApi + 'static,
    C: ChallengeApi + 'static,
{
    pub fn new(submissions: Arc<S>, challenges: Arc<C>, cache: CacheConfig) -> Self {
        Self::with_policy(submissions, challenges, cache, AggregationPolicy::default())
    }

    pub fn with_policy(
        submissions: Arc<S>,
        challenges: Arc<C>,
        cache: CacheConfig,
        policy: AggregationPolicy,
    ) -> Self {
        Self {
            submissions,
            scorecards: ScorecardResolver::new(challenges, cache.scorecard_ttl),
            review_types: ReviewTypeCache::new(cache.review_type_ttl),
            aggregator: ScoreAggregator::new(policy),
        }
    }

    /// Re-aggregates the submission a created or updated review belongs to.
    pub async fn process_review(
        &self,
        notice: &ReviewNotice,
    ) -> Result<ScoringOutcome, ScoringError> {
        let submission_id = match &notice.submission_id {
            Some(submission_id) => submission_id.clone(),
            None => {
                self.submissions
                    .get_review(&notice.review_id)
                    .await?
                    .submission_id
            }
        };

        let reviews = self.submissions.list_reviews(&submission_id).await?;
        if reviews.is_empty() {
            info!(%submission_id, "No reviews exist for aggregating");
            return Ok(ScoringOutcome::NoReviews { submission_id });
        }

        let names = self
            .review_types
            .get_or_fetch(self.submissions.as_ref())
            .await?;

        match self
            .summarize(&submission_id, &reviews, &names, None)
            .await?
        {
            Some(report) => Ok(ScoringOutcome::Summarized(report)),
            None => {
                info!(%submission_id, "No valid reviews exist for aggregating");
                Ok(ScoringOutcome::NoValidReviews { submission_id })
            }
        }
    }

    /// Final aggregation of every submission once a challenge's appeals response closes.
    /// A failing submission is recorded and the rest of the batch continues.
    pub async fn process_phase_end(
        &self,
        notice: &PhaseNotice,
    ) -> Result<ScoringOutcome, ScoringError> {
        let challenge_id = notice.challenge_id.clone();
        let submissions = self.submissions.list_submissions(&challenge_id).await?;
        if submissions.is_empty() {
            info!(%challenge_id, "No submissions present to aggregate review scores");
            return Ok(ScoringOutcome::NoSubmissions { challenge_id });
        }

        let names = self
            .review_types
            .get_or_fetch(self.submissions.as_ref())
            .await?;

        let mut report = BatchReport {
            challenge_id,
            summarized: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };

        for submission in submissions {
            let submission_id = submission.id;
            let reviews = match submission.review {
                Some(reviews) if !reviews.is_empty() => reviews,
                _ => {
                    info!("No reviews exist for {submission_id}");
                    report.skipped.push(SkippedSubmission {
                        submission_id,
                        reason: SkipReason::NoReviews,
                    });
                    continue;
                }
            };

            match self
                .summarize(&submission_id, &reviews, &names, Some(true))
                .await
            {
                Ok(Some(summarized)) => report.summarized.push(summarized),
                Ok(None) => {
                    info!("No valid reviews exist for {submission_id}");
                    report.skipped.push(SkippedSubmission {
                        submission_id,
                        reason: SkipReason::NoValidReviews,
                    });
                }
                Err(err) => {
                    error!(%submission_id, error = %err, "failed to persist review summation");
                    report.failed.push(FailedSubmission {
                        submission_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(ScoringOutcome::Batch(report))
    }

    async fn summarize(
        &self,
        submission_id: &str,
        reviews: &[Review],
        names: &ReviewTypeNames,
        is_final: Option<bool>,
    ) -> Result<Option<SummationReport>, ScoringError> {
        let (aggregate, valid_reviews) = match self.aggregator.aggregate(reviews, names) {
            Aggregation::Scored {
                aggregate,
                valid_reviews,
            } => (aggregate, valid_reviews),
            Aggregation::NoValidReviews => return Ok(None),
        };

        let scorecard = self
            .scorecards
            .resolve(self.submissions.as_ref(), submission_id, &valid_reviews)
            .await?;

        let summation = ReviewSummation {
            score_card_id: scorecard.scorecard_id,
            submission_id: submission_id.to_string(),
            aggregate_score: aggregate.aggregate_score,
            is_passing: aggregate.is_passing,
            is_final,
        };

        let action = upsert_summation(self.submissions.as_ref(), &summation).await?;

        Ok(Some(SummationReport {
            summation,
            action,
            scorecard_source: scorecard.source,
            total_reviews: aggregate.total_reviews,
            valid_reviews: aggregate.valid_reviews,
        }))
    }
}
