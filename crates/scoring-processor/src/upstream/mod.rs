//! Capability seams for the submission and challenge APIs.
//!
//! The scoring flows only talk to these traits. `http` carries the reqwest-backed
//! implementations used in production; tests substitute in-memory doubles.

pub mod auth;
pub mod domain;
pub mod http;

use async_trait::async_trait;

pub use auth::TokenProvider;
pub use domain::{
    ChallengeId, LegacyId, Review, ReviewSummation, ReviewType, ReviewTypeNames, ScorecardId,
    StoredSummation, Submission,
};
pub use http::{HttpChallengeApi, HttpSubmissionApi};

/// Operations the processor needs from the submission API.
#[async_trait]
pub trait SubmissionApi: Send + Sync {
    async fn get_review(&self, review_id: &str) -> Result<Review, UpstreamError>;
    async fn list_reviews(&self, submission_id: &str) -> Result<Vec<Review>, UpstreamError>;
    async fn get_submission(&self, submission_id: &str) -> Result<Submission, UpstreamError>;
    async fn list_review_summations(
        &self,
        submission_id: &str,
    ) -> Result<Vec<StoredSummation>, UpstreamError>;
    async fn create_review_summation(&self, body: &ReviewSummation) -> Result<(), UpstreamError>;
    async fn update_review_summation(
        &self,
        summation_id: &str,
        body: &ReviewSummation,
    ) -> Result<(), UpstreamError>;
    async fn list_review_types(&self) -> Result<Vec<ReviewType>, UpstreamError>;
    async fn list_submissions(
        &self,
        challenge_id: &ChallengeId,
    ) -> Result<Vec<Submission>, UpstreamError>;
}

/// Scorecard lookup against the challenge API.
#[async_trait]
pub trait ChallengeApi: Send + Sync {
    async fn scorecard_id(&self, challenge_id: &ChallengeId) -> Result<ScorecardId, UpstreamError>;
}

/// Failures talking to either upstream API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("unable to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("machine token unavailable: {0}")]
    Auth(String),
    #[error("{url} response is missing {field}")]
    MissingField { url: String, field: &'static str },
    #[error("invalid base url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}
