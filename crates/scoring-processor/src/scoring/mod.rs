//! Review score aggregation and review summation persistence.

pub mod aggregation;
pub mod cache;
pub mod scorecard;
pub mod service;
pub mod summation;

#[cfg(test)]
pub(crate) mod tests;

pub use aggregation::{AggregationPolicy, ScoreAggregate, ScoreAggregator};
pub use cache::{ReviewTypeCache, ScorecardCache};
pub use scorecard::{ScorecardResolution, ScorecardResolver, ScorecardSource};
pub use service::{
    BatchReport, FailedSubmission, ScoringOutcome, ScoringService, SkipReason, SkippedSubmission,
    SummationReport,
};
pub use summation::{upsert_summation, UpsertAction};

use crate::upstream::UpstreamError;

/// Error raised by the scoring flows.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("no scorecard could be resolved for submission {submission_id}")]
    NoScorecard { submission_id: String },
}
