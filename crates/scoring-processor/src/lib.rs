//! Submission scoring processor.
//!
//! Listens for review and autopilot events, aggregates each submission's review scores and
//! persists a pass/fail review summation through the submission API.

pub mod config;
pub mod error;
pub mod events;
pub mod processor;
pub mod scoring;
pub mod telemetry;
pub mod upstream;

use std::sync::Arc;

use config::AppConfig;
use events::EventRouter;
use processor::{MessageTransport, ScoringProcessor};
use scoring::ScoringService;
use upstream::{HttpChallengeApi, HttpSubmissionApi, TokenProvider, UpstreamError};

/// Production processor wired to the HTTP upstream clients.
pub type HttpScoringProcessor<T> = ScoringProcessor<T, HttpSubmissionApi, HttpChallengeApi>;

/// Builds the router over reqwest-backed clients from configuration.
pub fn http_router(
    config: &AppConfig,
) -> Result<EventRouter<HttpSubmissionApi, HttpChallengeApi>, UpstreamError> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(|source| UpstreamError::Http {
            url: config.upstream.submission_api_url.clone(),
            source,
        })?;

    let tokens = Arc::new(TokenProvider::new(client.clone(), config.auth.clone()));
    let submissions = Arc::new(HttpSubmissionApi::new(
        client.clone(),
        &config.upstream.submission_api_url,
        tokens,
    )?);
    let challenges = Arc::new(HttpChallengeApi::new(
        client,
        &config.upstream.challenge_api_url,
    )?);

    let scoring = Arc::new(ScoringService::new(submissions, challenges, config.cache));
    Ok(EventRouter::new(config.topics.clone(), scoring))
}

/// Convenience constructor pairing [`http_router`] with a transport.
pub fn http_processor<T>(
    config: &AppConfig,
    transport: Arc<T>,
) -> Result<HttpScoringProcessor<T>, UpstreamError>
where
    T: MessageTransport + 'static,
{
    Ok(ScoringProcessor::new(transport, http_router(config)?))
}
