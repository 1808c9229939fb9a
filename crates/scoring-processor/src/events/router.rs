use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::envelope::{closes_appeals_response, EventPayload, PayloadKind, REVIEW_RESOURCE};
use super::validation::{validate, ValidationError};
use crate::config::TopicConfig;
use crate::scoring::{ScoringError, ScoringOutcome, ScoringService};
use crate::upstream::{ChallengeApi, SubmissionApi};

/// What happened to a message the router accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dispatch", rename_all = "snake_case")]
pub enum Dispatch {
    Ignored { reason: IgnoreReason },
    Processed { outcome: ScoringOutcome },
}

/// Why an event was dropped before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IgnoreReason {
    NonReviewResource {
        resource: Option<String>,
    },
    UnhandledPhase {
        phase_type_name: Option<String>,
        state: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid message JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("the message topic {declared:?} doesn't match the delivered topic {delivered}")]
    TopicMismatch {
        declared: Option<String>,
        delivered: String,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// Sends each inbound message to the single-review or the appeals closure flow.
pub struct EventRouter<S, C> {
    topics: TopicConfig,
    scoring: Arc<ScoringService<S, C>>,
}

impl<S, C> EventRouter<S, C>
where
    S: SubmissionApi + 'static,
    C: ChallengeApi + 'static,
{
    pub fn new(topics: TopicConfig, scoring: Arc<ScoringService<S, C>>) -> Self {
        Self { topics, scoring }
    }

    pub fn topics(&self) -> &TopicConfig {
        &self.topics
    }

    pub fn payload_kind(&self, delivered_topic: &str) -> PayloadKind {
        if self.topics.is_phase_topic(delivered_topic) {
            PayloadKind::PhaseChange
        } else {
            PayloadKind::Review
        }
    }

    /// Cheap checks run before validation, so only events this processor acts on can
    /// raise validation errors.
    pub fn triage(
        &self,
        delivered_topic: &str,
        raw: &Value,
    ) -> Result<Option<IgnoreReason>, DispatchError> {
        let declared = raw.get("topic").and_then(Value::as_str);
        if declared != Some(delivered_topic) {
            return Err(DispatchError::TopicMismatch {
                declared: declared.map(str::to_string),
                delivered: delivered_topic.to_string(),
            });
        }

        let payload_field = |field: &str| {
            raw.get("payload")
                .and_then(|payload| payload.get(field))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let reason = match self.payload_kind(delivered_topic) {
            PayloadKind::Review => {
                let resource = payload_field("resource");
                (resource.as_deref() != Some(REVIEW_RESOURCE))
                    .then_some(IgnoreReason::NonReviewResource { resource })
            }
            PayloadKind::PhaseChange => {
                let phase_type_name = payload_field("phaseTypeName");
                let state = payload_field("state");
                let closes_appeals = match (phase_type_name.as_deref(), state.as_deref()) {
                    (Some(phase_type_name), Some(state)) => {
                        closes_appeals_response(phase_type_name, state)
                    }
                    _ => false,
                };
                (!closes_appeals).then_some(IgnoreReason::UnhandledPhase {
                    phase_type_name,
                    state,
                })
            }
        };

        Ok(reason)
    }

    pub async fn dispatch(
        &self,
        delivered_topic: &str,
        body: &str,
    ) -> Result<Dispatch, DispatchError> {
        let raw: Value = serde_json::from_str(body)?;

        if let Some(reason) = self.triage(delivered_topic, &raw)? {
            debug!(topic = %delivered_topic, ?reason, "ignoring event");
            return Ok(Dispatch::Ignored { reason });
        }

        let envelope = validate(&raw, self.payload_kind(delivered_topic))?;

        let outcome = match envelope.payload {
            EventPayload::Review(notice) => self.scoring.process_review(&notice).await?,
            EventPayload::PhaseChange(notice) => {
                self.scoring.process_phase_end(&notice).await?
            }
        };

        Ok(Dispatch::Processed { outcome })
    }
}
