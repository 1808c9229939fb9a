use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::auth::TokenProvider;
use super::domain::{
    ChallengeId, Review, ReviewSummation, ReviewType, ScorecardId, StoredSummation, Submission,
};
use super::{ChallengeApi, SubmissionApi, UpstreamError};

/// Base URL with path segments appended; each segment is percent-encoded on its own.
#[derive(Debug, Clone)]
struct Endpoint {
    base: Url,
}

impl Endpoint {
    fn parse(base_url: &str) -> Result<Self, UpstreamError> {
        let base = Url::parse(base_url).map_err(|err| UpstreamError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl {
                url: base_url.to_string(),
                reason: "url cannot carry path segments".to_string(),
            });
        }
        Ok(Self { base })
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Submission API client; every call carries the machine token.
pub struct HttpSubmissionApi {
    client: Client,
    endpoint: Endpoint,
    tokens: Arc<TokenProvider>,
}

impl HttpSubmissionApi {
    pub fn new(
        client: Client,
        base_url: &str,
        tokens: Arc<TokenProvider>,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            client,
            endpoint: Endpoint::parse(base_url)?,
            tokens,
        })
    }

    async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, UpstreamError> {
        let token = self.tokens.token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let url = self.endpoint.join(segments);
        let label = url.to_string();
        let request = self.authorized(Method::GET, url).await?.query(query);
        let response = send(request, &label).await?;
        response
            .json()
            .await
            .map_err(|source| UpstreamError::Decode { url: label, source })
    }

    async fn write_json<B: Serialize + Sync>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<(), UpstreamError> {
        let url = self.endpoint.join(segments);
        let label = url.to_string();
        let request = self.authorized(method, url).await?.json(body);
        send(request, &label).await.map(|_| ())
    }
}

async fn send(request: RequestBuilder, url: &str) -> Result<reqwest::Response, UpstreamError> {
    let response = request.send().await.map_err(|source| UpstreamError::Http {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

#[async_trait]
impl SubmissionApi for HttpSubmissionApi {
    async fn get_review(&self, review_id: &str) -> Result<Review, UpstreamError> {
        self.get_json(&["reviews", review_id], &[]).await
    }

    async fn list_reviews(&self, submission_id: &str) -> Result<Vec<Review>, UpstreamError> {
        self.get_json(&["reviews"], &[("submissionId", submission_id)])
            .await
    }

    async fn get_submission(&self, submission_id: &str) -> Result<Submission, UpstreamError> {
        self.get_json(&["submissions", submission_id], &[]).await
    }

    async fn list_review_summations(
        &self,
        submission_id: &str,
    ) -> Result<Vec<StoredSummation>, UpstreamError> {
        self.get_json(&["reviewSummations"], &[("submissionId", submission_id)])
            .await
    }

    async fn create_review_summation(&self, body: &ReviewSummation) -> Result<(), UpstreamError> {
        self.write_json(Method::POST, &["reviewSummations"], body)
            .await
    }

    async fn update_review_summation(
        &self,
        summation_id: &str,
        body: &ReviewSummation,
    ) -> Result<(), UpstreamError> {
        self.write_json(Method::PUT, &["reviewSummations", summation_id], body)
            .await
    }

    async fn list_review_types(&self) -> Result<Vec<ReviewType>, UpstreamError> {
        self.get_json(&["reviewTypes"], &[]).await
    }

    async fn list_submissions(
        &self,
        challenge_id: &ChallengeId,
    ) -> Result<Vec<Submission>, UpstreamError> {
        let challenge = challenge_id.to_string();
        self.get_json(&["submissions"], &[("challengeId", challenge.as_str())])
            .await
    }
}

#[derive(Debug, Deserialize)]
struct ChallengeEnvelope {
    result: ChallengeResult,
}

#[derive(Debug, Deserialize)]
struct ChallengeResult {
    #[serde(default)]
    content: Option<ChallengeContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeContent {
    #[serde(default)]
    review_scorecard_id: Option<ScorecardId>,
}

/// Unauthenticated v3 challenge lookup.
pub struct HttpChallengeApi {
    client: Client,
    endpoint: Endpoint,
}

impl HttpChallengeApi {
    pub fn new(client: Client, base_url: &str) -> Result<Self, UpstreamError> {
        Ok(Self {
            client,
            endpoint: Endpoint::parse(base_url)?,
        })
    }
}

#[async_trait]
impl ChallengeApi for HttpChallengeApi {
    async fn scorecard_id(&self, challenge_id: &ChallengeId) -> Result<ScorecardId, UpstreamError> {
        let challenge = challenge_id.to_string();
        let url = self.endpoint.join(&[challenge.as_str()]);
        let label = url.to_string();
        let response = send(self.client.get(url), &label).await?;
        let envelope: ChallengeEnvelope =
            response
                .json()
                .await
                .map_err(|source| UpstreamError::Decode {
                    url: label.clone(),
                    source,
                })?;
        scorecard_from(envelope, label)
    }
}

fn scorecard_from(envelope: ChallengeEnvelope, url: String) -> Result<ScorecardId, UpstreamError> {
    envelope
        .result
        .content
        .and_then(|content| content.review_scorecard_id)
        .ok_or(UpstreamError::MissingField {
            url,
            field: "result.content.reviewScorecardId",
        })
}
