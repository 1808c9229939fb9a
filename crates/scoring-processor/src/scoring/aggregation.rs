use serde::{Deserialize, Serialize};

use crate::upstream::{Review, ReviewTypeNames};

/// Rubric applied when turning a submission's reviews into a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    /// Review type names that never contribute to the aggregate.
    pub ignored_review_types: Vec<String>,
    /// Scores at or above this value pass. Fixed for every scorecard for now.
    pub passing_score: f64,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            ignored_review_types: vec!["Screening".to_string(), "AV Scan".to_string()],
            passing_score: 80.0,
        }
    }
}

impl AggregationPolicy {
    pub fn is_ignored(&self, review: &Review, names: &ReviewTypeNames) -> bool {
        names
            .name(&review.type_id)
            .is_some_and(|name| self.ignored_review_types.iter().any(|ignored| ignored == name))
    }
}

/// Weighted score and verdict for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreAggregate {
    pub aggregate_score: f64,
    pub is_passing: bool,
    pub total_reviews: usize,
    pub valid_reviews: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation<'a> {
    Scored {
        aggregate: ScoreAggregate,
        valid_reviews: Vec<&'a Review>,
    },
    NoValidReviews,
}

/// Stateless evaluator for a submission's review set.
pub struct ScoreAggregator {
    policy: AggregationPolicy,
}

impl ScoreAggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self { policy }
    }

    /// Ignored reviews stay in the denominator but add nothing to the numerator; the
    /// valid reviews are up-weighted by `total / valid` to compensate.
    pub fn aggregate<'a>(&self, reviews: &'a [Review], names: &ReviewTypeNames) -> Aggregation<'a> {
        let valid_reviews: Vec<&Review> = reviews
            .iter()
            .filter(|review| !self.policy.is_ignored(review, names))
            .collect();

        if valid_reviews.is_empty() {
            return Aggregation::NoValidReviews;
        }

        let total = reviews.len() as f64;
        let weight = total / valid_reviews.len() as f64;

        let accumulated: f64 = reviews
            .iter()
            .map(|review| {
                if self.policy.is_ignored(review, names) {
                    0.0
                } else {
                    weight * review.score
                }
            })
            .sum();

        let aggregate_score = round_up_one_decimal(accumulated / total);

        Aggregation::Scored {
            aggregate: ScoreAggregate {
                aggregate_score,
                is_passing: aggregate_score >= self.policy.passing_score,
                total_reviews: reviews.len(),
                valid_reviews: valid_reviews.len(),
            },
            valid_reviews,
        }
    }
}

pub(crate) fn round_up_one_decimal(value: f64) -> f64 {
    (value * 10.0).ceil() / 10.0
}
