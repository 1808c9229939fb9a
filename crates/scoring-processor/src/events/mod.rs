//! Inbound event contracts, validation and routing.

pub mod envelope;
pub mod router;
pub mod validation;

pub use envelope::{
    closes_appeals_response, EventEnvelope, EventPayload, PayloadKind, PhaseNotice, ReviewNotice,
};
pub use router::{Dispatch, DispatchError, EventRouter, IgnoreReason};
pub use validation::{validate, ValidationDetail, ValidationError};
