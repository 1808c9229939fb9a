use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::upstream::ChallengeId;

pub const REVIEW_RESOURCE: &str = "review";
pub const APPEALS_RESPONSE_PHASE: &str = "Appeals Response";
pub const PHASE_END_STATE: &str = "END";

/// Which payload contract a topic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Review,
    PhaseChange,
}

/// Validated bus message.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub topic: String,
    pub originator: String,
    pub timestamp: DateTime<Utc>,
    pub mime_type: String,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Review(ReviewNotice),
    PhaseChange(PhaseNotice),
}

/// Review creation or update notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewNotice {
    pub review_id: String,
    pub submission_id: Option<String>,
}

/// Autopilot phase transition for a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseNotice {
    pub challenge_id: ChallengeId,
    pub phase_type_name: String,
    pub state: String,
}

/// True for the transition that triggers final aggregation of a challenge.
pub fn closes_appeals_response(phase_type_name: &str, state: &str) -> bool {
    phase_type_name == APPEALS_RESPONSE_PHASE && state == PHASE_END_STATE
}
