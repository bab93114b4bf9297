//! Uniform result/error envelope returned for every invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, InvocationError};
use crate::validate::FieldIssue;

/// Outcome of an invocation, serialised as
/// `{"status":"success","result":...}` or `{"status":"error","message":...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionEnvelope {
    /// The implementation completed normally.
    Success {
        /// Value returned by the implementation.
        result: Value,
    },
    /// The invocation failed before, during or after execution.
    Error {
        /// Human-readable failure description.
        message: String,
        /// Machine-readable category.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<ErrorKind>,
        /// Per-field causes for validation failures.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<FieldIssue>,
    },
}

impl ExecutionEnvelope {
    /// Wraps a successful result.
    #[must_use]
    pub fn success(result: impl Into<Value>) -> Self {
        Self::Success {
            result: result.into(),
        }
    }

    /// Creates an uncategorised error envelope.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            kind: None,
            fields: Vec::new(),
        }
    }

    /// Returns `true` for success envelopes.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the result of a success envelope.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Success { result } => Some(result),
            Self::Error { .. } => None,
        }
    }

    /// Returns the message of an error envelope.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            Self::Success { .. } => None,
        }
    }

    /// Returns the error category, if any.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { kind, .. } => *kind,
            Self::Success { .. } => None,
        }
    }

    /// Returns the per-field causes of a validation failure.
    #[must_use]
    pub fn fields(&self) -> &[FieldIssue] {
        match self {
            Self::Error { fields, .. } => fields,
            Self::Success { .. } => &[],
        }
    }

    /// Renders the envelope as JSON.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            serde_json::json!({ "status": "error", "message": err.to_string() })
        })
    }
}

impl From<InvocationError> for ExecutionEnvelope {
    fn from(error: InvocationError) -> Self {
        let kind = Some(error.kind());
        let message = error.to_string();
        let fields = match error {
            InvocationError::Validation { source, .. } => source.into_issues(),
            _ => Vec::new(),
        };
        Self::Error {
            message,
            kind,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{FieldSchema, FieldType, ParameterSchema};

    #[test]
    fn success_serialises_with_status_tag() {
        let envelope = ExecutionEnvelope::success(json!({ "ok": true }));
        assert_eq!(
            envelope.to_value(),
            json!({ "status": "success", "result": { "ok": true } })
        );
    }

    #[test]
    fn plain_error_has_only_message() {
        let envelope = ExecutionEnvelope::error("boom");
        assert_eq!(envelope.to_value(), json!({ "status": "error", "message": "boom" }));
    }

    #[test]
    fn validation_error_carries_fields() {
        let schema = ParameterSchema::new().field(FieldSchema::required("count", FieldType::Integer));
        let source = schema
            .validate(json!({ "count": "abc" }).as_object().unwrap())
            .unwrap_err();
        let envelope = ExecutionEnvelope::from(InvocationError::Validation {
            name: "counter".into(),
            source,
        });

        assert_eq!(envelope.kind(), Some(ErrorKind::ValidationFailure));
        assert!(envelope.message().unwrap().contains("count"));
        let value = envelope.to_value();
        assert_eq!(value["kind"], "validation_failure");
        assert_eq!(value["fields"][0]["field"], "count");
        assert_eq!(value["fields"][0]["issue"], "type_mismatch");
    }

    #[test]
    fn deserialises_from_wire_shape() {
        let envelope: ExecutionEnvelope =
            serde_json::from_value(json!({ "status": "error", "message": "nope" })).unwrap();
        assert_eq!(envelope, ExecutionEnvelope::error("nope"));
    }
}
