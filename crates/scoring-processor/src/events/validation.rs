//! Shape checks for inbound envelopes.
//!
//! The two event contracts live as JSON Schemas under `schemas/`. Every violation is collected
//! instead of stopping at the first one, so a single log line tells the operator everything
//! that is wrong with a message. Messages keep the wording the producers already log against.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::envelope::{
    EventEnvelope, EventPayload, PayloadKind, PhaseNotice, ReviewNotice, REVIEW_RESOURCE,
};
use crate::upstream::{ChallengeId, LegacyId};

static REVIEW_EVENT_SCHEMA: Lazy<Result<Validator, String>> =
    Lazy::new(|| compile(include_str!("../../schemas/review_event.json")));
static PHASE_EVENT_SCHEMA: Lazy<Result<Validator, String>> =
    Lazy::new(|| compile(include_str!("../../schemas/phase_event.json")));

const TIMESTAMP_MESSAGE: &str =
    "\"timestamp\" must be a number of milliseconds or valid date string";
const PROJECT_ID_MESSAGE: &str = "\"projectId\" must be a positive integer or a valid GUID";

/// Report order for violations; one violation per field.
const FIELD_ORDER: [&str; 12] = [
    "value",
    "topic",
    "originator",
    "timestamp",
    "mime-type",
    "payload",
    "payload.resource",
    "payload.id",
    "payload.submissionId",
    "payload.projectId",
    "payload.phaseTypeName",
    "payload.state",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDetail {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub details: Vec<ValidationDetail>,
}

impl ValidationError {
    pub fn messages(&self) -> Vec<&str> {
        self.details
            .iter()
            .map(|detail| detail.message.as_str())
            .collect()
    }

    fn single(path: &str, message: String) -> Self {
        Self {
            details: vec![ValidationDetail {
                path: path.to_string(),
                message,
            }],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidationError: ")?;
        for (index, detail) in self.details.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} ({})", detail.message, detail.path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn compile(raw: &str) -> Result<Validator, String> {
    let schema: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    jsonschema::options()
        .should_validate_formats(true)
        .build(&schema)
        .map_err(|err| err.to_string())
}

/// A violation plus its ordering keys. Lower `severity` wins when a field fails twice.
struct Finding {
    rank: usize,
    severity: u8,
    detail: ValidationDetail,
}

impl Finding {
    fn new(path: String, severity: u8, message: String) -> Self {
        let rank = FIELD_ORDER
            .iter()
            .position(|field| *field == path)
            .unwrap_or(FIELD_ORDER.len());
        Self {
            rank,
            severity,
            detail: ValidationDetail { path, message },
        }
    }
}

fn leaf(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// `/payload/id` becomes `payload.id`; the document root is `value`.
fn dotted(pointer: &str) -> String {
    let path = pointer.trim_start_matches('/').replace('/', ".");
    if path.is_empty() {
        "value".to_string()
    } else {
        path
    }
}

fn schema_finding(error: &jsonschema::ValidationError<'_>) -> Finding {
    let pointer = error.instance_path.to_string();
    let (path, missing) = match &error.kind {
        ValidationErrorKind::Required { property } => {
            let name = property.as_str().unwrap_or_default();
            (dotted(&format!("{pointer}/{name}")), true)
        }
        _ => (dotted(&pointer), false),
    };
    let label = leaf(&path).to_string();

    if missing || error.instance.is_null() {
        let message = format!("\"{label}\" is required");
        return Finding::new(path, 0, message);
    }

    let (severity, message) = match (path.as_str(), &error.kind) {
        ("timestamp", _) => (1, TIMESTAMP_MESSAGE.to_string()),
        ("payload.projectId", _) => (1, PROJECT_ID_MESSAGE.to_string()),
        ("value" | "payload", ValidationErrorKind::Type { .. }) => {
            (1, format!("\"{label}\" must be an object"))
        }
        (_, ValidationErrorKind::Type { .. }) => (1, format!("\"{label}\" must be a string")),
        (_, ValidationErrorKind::MinLength { .. }) => {
            (2, format!("\"{label}\" is not allowed to be empty"))
        }
        (_, ValidationErrorKind::Enum { .. }) => {
            (3, format!("\"{label}\" must be one of [{REVIEW_RESOURCE}]"))
        }
        _ => (3, format!("\"{label}\" is invalid")),
    };
    Finding::new(path, severity, message)
}

fn into_error(mut findings: Vec<Finding>) -> ValidationError {
    findings.sort_by_key(|finding| (finding.rank, finding.severity));
    findings.dedup_by(|later, earlier| later.detail.path == earlier.detail.path);
    ValidationError {
        details: findings.into_iter().map(|finding| finding.detail).collect(),
    }
}

/// Validates the raw message against the contract for `kind`.
pub fn validate(raw: &Value, kind: PayloadKind) -> Result<EventEnvelope, ValidationError> {
    let schema = match kind {
        PayloadKind::Review => &*REVIEW_EVENT_SCHEMA,
        PayloadKind::PhaseChange => &*PHASE_EVENT_SCHEMA,
    };
    let schema = schema.as_ref().map_err(|reason| {
        ValidationError::single("value", format!("event schema is unusable: {reason}"))
    })?;

    let mut findings: Vec<Finding> = schema
        .iter_errors(raw)
        .map(|error| schema_finding(&error))
        .collect();

    // joi-style dates are looser than any JSON Schema format
    let timestamp = match raw.get("timestamp") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let parsed = parse_timestamp(value);
            if parsed.is_none() {
                findings.push(Finding::new(
                    "timestamp".to_string(),
                    1,
                    TIMESTAMP_MESSAGE.to_string(),
                ));
            }
            parsed
        }
    };

    if !findings.is_empty() {
        return Err(into_error(findings));
    }

    envelope(raw, kind, timestamp).ok_or_else(|| {
        ValidationError::single(
            "value",
            "\"value\" does not match the event contract".to_string(),
        )
    })
}

fn envelope(
    raw: &Value,
    kind: PayloadKind,
    timestamp: Option<DateTime<Utc>>,
) -> Option<EventEnvelope> {
    let payload = raw.get("payload")?;

    let payload = match kind {
        PayloadKind::Review => EventPayload::Review(ReviewNotice {
            review_id: text(payload, "id")?,
            submission_id: submission_id(payload.get("submissionId")),
        }),
        PayloadKind::PhaseChange => EventPayload::PhaseChange(PhaseNotice {
            challenge_id: project_id(payload.get("projectId")?)?,
            phase_type_name: text(payload, "phaseTypeName")?,
            state: text(payload, "state")?,
        }),
    };

    Some(EventEnvelope {
        topic: text(raw, "topic")?,
        originator: text(raw, "originator")?,
        timestamp: timestamp?,
        mime_type: text(raw, "mime-type")?,
        payload,
    })
}

fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_date_string(raw),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_date_string(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

/// Numeric submission ids are carried as text; an empty string means absent.
fn submission_id(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

fn project_id(value: &Value) -> Option<ChallengeId> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .filter(|id| *id >= 1)
            .map(|id| ChallengeId(LegacyId::Numeric(id))),
        Value::String(raw) => Uuid::parse_str(raw)
            .ok()
            .map(|_| ChallengeId(LegacyId::Text(raw.clone()))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::envelope::closes_appeals_response;
    use serde_json::json;

    fn review_message() -> Value {
        json!({
            "topic": "submission.notification.create",
            "originator": "submission-api",
            "timestamp": "2018-02-03T00:00:00",
            "mime-type": "application/json",
            "payload": {
                "resource": "review",
                "id": "d34d4180-65aa-42ec-a945-5fd21dec0501",
                "submissionId": "d34d4180-65aa-42ec-a945-5fd21dec0501"
            }
        })
    }

    fn phase_message() -> Value {
        json!({
            "topic": "notifications.autopilot.events",
            "originator": "submission-api",
            "timestamp": "2018-02-03T00:00:00",
            "mime-type": "application/json",
            "payload": {
                "projectId": 30001850,
                "phaseId": 942767,
                "phaseTypeName": "Appeals Response",
                "state": "END"
            }
        })
    }

    fn remove(message: &mut Value, path: &str) {
        match path.split_once('.') {
            Some((parent, child)) => {
                message[parent]
                    .as_object_mut()
                    .expect("object")
                    .remove(child);
            }
            None => {
                message.as_object_mut().expect("object").remove(path);
            }
        }
    }

    fn expect_message(result: Result<EventEnvelope, ValidationError>, expected: &str) {
        let err = result.expect_err("validation must fail");
        assert!(
            err.messages().contains(&expected),
            "expected {expected:?} in {:?}",
            err.messages()
        );
    }

    #[test]
    fn accepts_review_message() {
        let envelope = validate(&review_message(), PayloadKind::Review).expect("valid");
        assert_eq!(envelope.mime_type, "application/json");
        assert_eq!(envelope.timestamp.to_rfc3339(), "2018-02-03T00:00:00+00:00");
        match envelope.payload {
            EventPayload::Review(notice) => {
                assert_eq!(notice.review_id, "d34d4180-65aa-42ec-a945-5fd21dec0501");
                assert!(notice.submission_id.is_some());
            }
            other => panic!("expected review payload, got {other:?}"),
        }
    }

    #[test]
    fn accepts_phase_message_with_numeric_project() {
        let envelope = validate(&phase_message(), PayloadKind::PhaseChange).expect("valid");
        match envelope.payload {
            EventPayload::PhaseChange(notice) => {
                assert_eq!(notice.challenge_id, ChallengeId::from(30001850));
                assert!(closes_appeals_response(&notice.phase_type_name, &notice.state));
            }
            other => panic!("expected phase payload, got {other:?}"),
        }
    }

    #[test]
    fn accepts_uuid_project_and_millisecond_timestamp() {
        let mut message = phase_message();
        message["payload"]["projectId"] = json!("6f4b5a22-0d6f-4a8e-9b7b-2c1e1a0d7c11");
        message["timestamp"] = json!(1517616000000_i64);
        let envelope = validate(&message, PayloadKind::PhaseChange).expect("valid");
        assert_eq!(envelope.timestamp.to_rfc3339(), "2018-02-03T00:00:00+00:00");
    }

    #[test]
    fn reports_each_missing_required_field() {
        let review_fields = [
            "topic",
            "originator",
            "timestamp",
            "mime-type",
            "payload.resource",
            "payload.id",
        ];
        for field in review_fields {
            let mut message = review_message();
            remove(&mut message, field);
            expect_message(
                validate(&message, PayloadKind::Review),
                &format!("\"{}\" is required", leaf(field)),
            );
        }

        let phase_fields = [
            "topic",
            "originator",
            "timestamp",
            "mime-type",
            "payload.projectId",
            "payload.phaseTypeName",
            "payload.state",
        ];
        for field in phase_fields {
            let mut message = phase_message();
            remove(&mut message, field);
            expect_message(
                validate(&message, PayloadKind::PhaseChange),
                &format!("\"{}\" is required", leaf(field)),
            );
        }
    }

    #[test]
    fn rejects_invalid_timestamp() {
        let mut message = review_message();
        message["timestamp"] = json!("invalid");
        expect_message(
            validate(&message, PayloadKind::Review),
            "\"timestamp\" must be a number of milliseconds or valid date string",
        );
    }

    #[test]
    fn rejects_non_string_fields() {
        for field in ["topic", "originator", "mime-type"] {
            let mut message = review_message();
            message[field] = json!(123);
            expect_message(
                validate(&message, PayloadKind::Review),
                &format!("\"{field}\" must be a string"),
            );
        }
    }

    #[test]
    fn enumerates_every_violation() {
        let mut message = review_message();
        message["originator"] = json!(42);
        message["timestamp"] = json!("yesterday");
        remove(&mut message, "payload.id");
        let err = validate(&message, PayloadKind::Review).expect_err("invalid");
        assert_eq!(
            err.messages(),
            vec![
                "\"originator\" must be a string",
                "\"timestamp\" must be a number of milliseconds or valid date string",
                "\"id\" is required",
            ]
        );
        assert_eq!(err.details[2].path, "payload.id");
    }

    #[test]
    fn rejects_wrong_resource_and_bad_project_id() {
        let mut message = review_message();
        message["payload"]["resource"] = json!("submission");
        expect_message(
            validate(&message, PayloadKind::Review),
            "\"resource\" must be one of [review]",
        );

        for bad in [json!(0), json!(-5), json!("not-a-guid"), json!(1.5)] {
            let mut message = phase_message();
            message["payload"]["projectId"] = bad;
            expect_message(
                validate(&message, PayloadKind::PhaseChange),
                "\"projectId\" must be a positive integer or a valid GUID",
            );
        }
    }

    #[test]
    fn non_object_message_is_rejected() {
        expect_message(
            validate(&json!([1, 2]), PayloadKind::Review),
            "\"value\" must be an object",
        );
    }

    #[test]
    fn rejects_empty_strings() {
        for field in ["topic", "originator", "mime-type"] {
            let mut message = review_message();
            message[field] = json!("");
            expect_message(
                validate(&message, PayloadKind::Review),
                &format!("\"{field}\" is not allowed to be empty"),
            );
        }

        for field in ["phaseTypeName", "state"] {
            let mut message = phase_message();
            message["payload"][field] = json!("");
            expect_message(
                validate(&message, PayloadKind::PhaseChange),
                &format!("\"{field}\" is not allowed to be empty"),
            );
        }
    }

    #[test]
    fn empty_review_id_without_submission_is_rejected() {
        let mut message = review_message();
        message["payload"]["id"] = json!("");
        message["payload"]["submissionId"] = json!("");
        let err = validate(&message, PayloadKind::Review).expect_err("invalid");
        assert_eq!(err.messages(), vec!["\"id\" is not allowed to be empty"]);
        assert_eq!(err.details[0].path, "payload.id");
    }

    #[test]
    fn empty_resource_reports_one_violation() {
        let mut message = review_message();
        message["payload"]["resource"] = json!("");
        let err = validate(&message, PayloadKind::Review).expect_err("invalid");
        assert_eq!(
            err.messages(),
            vec!["\"resource\" is not allowed to be empty"]
        );
    }

    #[test]
    fn null_fields_read_as_missing() {
        let mut message = review_message();
        message["topic"] = Value::Null;
        message["payload"] = Value::Null;
        let err = validate(&message, PayloadKind::Review).expect_err("invalid");
        assert_eq!(
            err.messages(),
            vec!["\"topic\" is required", "\"payload\" is required"]
        );
    }

    #[test]
    fn numeric_submission_id_is_carried_as_text() {
        let mut message = review_message();
        message["payload"]["submissionId"] = json!(12345);
        let envelope = validate(&message, PayloadKind::Review).expect("valid");
        match envelope.payload {
            EventPayload::Review(notice) => {
                assert_eq!(notice.submission_id.as_deref(), Some("12345"))
            }
            other => panic!("expected review payload, got {other:?}"),
        }

        message["payload"]["submissionId"] = json!(true);
        expect_message(
            validate(&message, PayloadKind::Review),
            "\"submissionId\" must be a string",
        );
    }

    #[test]
    fn payload_must_be_an_object() {
        let mut message = phase_message();
        message["payload"] = json!("END");
        expect_message(
            validate(&message, PayloadKind::PhaseChange),
            "\"payload\" must be an object",
        );
    }
}
