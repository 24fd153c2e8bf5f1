use serde_json::Value;
use thiserror::Error;

use crate::{MessageBody, MessageKind};

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message must be a JSON object")]
    NotAnObject,
    #[error("message has no `kind` field")]
    MissingKind,
    #[error("unrecognized message kind: {0}")]
    UnknownKind(String),
    #[error("unexpected message kind {found}; expected one of [{expected}]")]
    UnexpectedKind { found: MessageKind, expected: String },
    #[error("{kind} message is missing required field `{field}`")]
    MissingField { kind: MessageKind, field: &'static str },
    #[error("message payload is {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },
    #[error("malformed {kind} message: {detail}")]
    Malformed { kind: MessageKind, detail: String },
}

/// Message shape contract shared by the engine and every role.
///
/// Constructed once and passed to the engine; never mutated after load.
#[derive(Clone, Debug)]
pub struct Schema {
    max_payload_bytes: usize,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

impl Schema {
    pub fn new(max_payload_bytes: usize) -> Self {
        Self { max_payload_bytes }
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Non-empty string fields each kind must carry.
    pub fn required_fields(kind: MessageKind) -> &'static [&'static str] {
        match kind {
            MessageKind::Draft => &["title", "body"],
            MessageKind::ReviewComment => &["comment"],
            MessageKind::RevisionRequest => &["notes"],
            MessageKind::Approval => &[],
            MessageKind::Rejection => &["reason"],
            MessageKind::PublishConfirmation => &["location"],
        }
    }

    /// Checks a raw role reply against the contract and returns the typed body.
    pub fn validate(&self, raw: &Value, expected: &[MessageKind]) -> Result<MessageBody, ValidationError> {
        let size = raw.to_string().len();
        if size > self.max_payload_bytes {
            return Err(ValidationError::TooLarge { size, limit: self.max_payload_bytes });
        }

        let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;
        let kind_str = obj
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingKind)?;
        let kind = MessageKind::parse(kind_str).ok_or_else(|| ValidationError::UnknownKind(kind_str.to_string()))?;

        if !expected.contains(&kind) {
            let expected = expected.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ");
            return Err(ValidationError::UnexpectedKind { found: kind, expected });
        }

        for &field in Self::required_fields(kind) {
            let present = obj
                .get(field)
                .and_then(Value::as_str)
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);
            if !present {
                return Err(ValidationError::MissingField { kind, field });
            }
        }

        serde_json::from_value::<MessageBody>(raw.clone())
            .map_err(|e| ValidationError::Malformed { kind, detail: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const REVIEW: &[MessageKind] = &[
        MessageKind::ReviewComment,
        MessageKind::RevisionRequest,
        MessageKind::Approval,
        MessageKind::Rejection,
    ];

    #[test]
    fn accepts_well_formed_draft() {
        let body = Schema::default()
            .validate(&json!({"kind": "draft", "title": "T", "body": "B"}), &[MessageKind::Draft])
            .unwrap();
        assert_eq!(body, MessageBody::draft("T", "B"));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = Schema::default()
            .validate(&json!({"kind": "memo", "text": "hi"}), REVIEW)
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownKind("memo".into()));
    }

    #[test]
    fn rejects_kind_outside_expected_set() {
        let err = Schema::default()
            .validate(&json!({"kind": "approval"}), &[MessageKind::Draft])
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnexpectedKind { found: MessageKind::Approval, .. }));
    }

    #[test]
    fn rejects_missing_or_blank_required_field() {
        let schema = Schema::default();
        let err = schema
            .validate(&json!({"kind": "draft", "title": "T"}), &[MessageKind::Draft])
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField { kind: MessageKind::Draft, field: "body" });

        let err = schema
            .validate(&json!({"kind": "rejection", "reason": "  "}), REVIEW)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField { kind: MessageKind::Rejection, field: "reason" });
    }

    #[test]
    fn rejects_non_objects_and_missing_kind() {
        let schema = Schema::default();
        assert_eq!(schema.validate(&json!("draft"), REVIEW).unwrap_err(), ValidationError::NotAnObject);
        assert_eq!(schema.validate(&json!({"notes": "x"}), REVIEW).unwrap_err(), ValidationError::MissingKind);
    }

    #[test]
    fn rejects_oversized_payload() {
        let schema = Schema::new(32);
        let raw = json!({"kind": "draft", "title": "T", "body": "b".repeat(64)});
        assert!(matches!(
            schema.validate(&raw, &[MessageKind::Draft]).unwrap_err(),
            ValidationError::TooLarge { limit: 32, .. }
        ));
    }

    #[test]
    fn validation_does_not_mutate_input() {
        let raw = json!({"kind": "approval", "note": "ship it"});
        let before = raw.clone();
        let _ = Schema::default().validate(&raw, REVIEW).unwrap();
        assert_eq!(raw, before);
    }
}
