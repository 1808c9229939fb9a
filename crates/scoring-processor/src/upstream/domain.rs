use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier that upstream systems hand out either as a legacy number or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyId {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyId::Numeric(value) => write!(f, "{value}"),
            LegacyId::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(pub LegacyId);

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for ChallengeId {
    fn from(value: u64) -> Self {
        Self(LegacyId::Numeric(value))
    }
}

impl From<&str> for ChallengeId {
    fn from(value: &str) -> Self {
        Self(LegacyId::Text(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScorecardId(pub LegacyId);

impl fmt::Display for ScorecardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for ScorecardId {
    fn from(value: u64) -> Self {
        Self(LegacyId::Numeric(value))
    }
}

impl From<&str> for ScorecardId {
    fn from(value: &str) -> Self {
        Self(LegacyId::Text(value.to_string()))
    }
}

/// A single reviewer's score for a submission, as served by the submission API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub type_id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    pub submission_id: String,
    pub score_card_id: ScorecardId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Submission as listed by the submission API. Reviews are only embedded on challenge listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_id: Option<ChallengeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<Vec<Review>>,
}

/// Verdict body written to the review summation endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummation {
    pub score_card_id: ScorecardId,
    pub submission_id: String,
    pub aggregate_score: f64,
    pub is_passing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

/// Summation record already persisted upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSummation {
    pub id: String,
    #[serde(default)]
    pub submission_id: Option<String>,
    #[serde(default)]
    pub aggregate_score: Option<f64>,
    #[serde(default)]
    pub is_final: Option<bool>,
}

/// Lookup from review type id to its display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewTypeNames(HashMap<String, String>);

impl ReviewTypeNames {
    pub fn name(&self, type_id: &str) -> Option<&str> {
        self.0.get(type_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ReviewType> for ReviewTypeNames {
    fn from_iter<I: IntoIterator<Item = ReviewType>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|review_type| (review_type.id, review_type.name))
                .collect(),
        )
    }
}
