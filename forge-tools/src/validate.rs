//! Validation of untrusted capability arguments against a [`ParameterSchema`].

use std::fmt::{self, Display, Formatter};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::schema::{FieldSchema, FieldType, ParameterSchema};

/// Parameters that passed validation, keyed by declared field name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidatedParams(Map<String, Value>);

impl ValidatedParams {
    /// Returns an empty parameter set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the raw value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns a string field.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns an integer field.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Returns a numeric field.
    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Returns a boolean field.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Returns `true` when the field is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of fields carried.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no fields are carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the parameters, returning the underlying map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Decodes the parameters into a typed record.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] produced when the record does not
    /// match the validated fields.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}

/// Reason a single field was rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IssueKind {
    /// A required field was not supplied.
    Missing,
    /// The value could not be interpreted as the declared type.
    TypeMismatch {
        /// Declared type label.
        expected: String,
        /// Observed JSON type label.
        found: String,
    },
    /// Numeric value below the declared minimum.
    BelowMinimum {
        /// Inclusive lower bound.
        minimum: f64,
    },
    /// Numeric value above the declared maximum.
    AboveMaximum {
        /// Inclusive upper bound.
        maximum: f64,
    },
    /// String or array shorter than allowed.
    TooShort {
        /// Minimum accepted length.
        min_length: usize,
    },
    /// String or array longer than allowed.
    TooLong {
        /// Maximum accepted length.
        max_length: usize,
    },
    /// Value outside the declared set of allowed values.
    NotAllowed {
        /// Accepted values.
        allowed: Vec<Value>,
    },
    /// Field not declared by a strict schema.
    Unexpected,
    /// The arguments were not a key/value mapping.
    NotAnObject {
        /// Observed JSON type label.
        found: String,
    },
}

/// A rejected field together with the reason.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Field path, e.g. `count` or `tags[2]`.
    pub field: String,
    /// Why the field was rejected.
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl FieldIssue {
    fn new(field: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

impl Display for FieldIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.field)?;
        match &self.kind {
            IssueKind::Missing => f.write_str("field required"),
            IssueKind::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            IssueKind::BelowMinimum { minimum } => write!(f, "must be >= {minimum}"),
            IssueKind::AboveMaximum { maximum } => write!(f, "must be <= {maximum}"),
            IssueKind::TooShort { min_length } => write!(f, "length must be >= {min_length}"),
            IssueKind::TooLong { max_length } => write!(f, "length must be <= {max_length}"),
            IssueKind::NotAllowed { allowed } => {
                let allowed: Vec<String> = allowed.iter().map(Value::to_string).collect();
                write!(f, "must be one of [{}]", allowed.join(", "))
            }
            IssueKind::Unexpected => f.write_str("unexpected field"),
            IssueKind::NotAnObject { found } => {
                write!(f, "arguments must be an object, found {found}")
            }
        }
    }
}

/// Every field that failed validation, in schema declaration order.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("invalid parameters: {}", summarize(.issues))]
pub struct ValidationError {
    issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Returns the individual field issues.
    #[must_use]
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// Returns `true` when `field` is among the rejected fields.
    #[must_use]
    pub fn mentions(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }

    /// Consumes the error, returning the field issues.
    #[must_use]
    pub fn into_issues(self) -> Vec<FieldIssue> {
        self.issues
    }
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates raw call arguments against an optional schema.
///
/// `null` is treated as an empty mapping. Without a schema any mapping is
/// accepted and no fields are passed on.
///
/// # Errors
///
/// Returns [`ValidationError`] when the arguments are not a mapping or when
/// any declared field fails validation.
pub fn validate_arguments(
    schema: Option<&ParameterSchema>,
    arguments: &Value,
) -> Result<ValidatedParams, ValidationError> {
    let empty = Map::new();
    let input = match arguments {
        Value::Null => &empty,
        Value::Object(map) => map,
        other => {
            return Err(ValidationError {
                issues: vec![FieldIssue::new(
                    "arguments",
                    IssueKind::NotAnObject {
                        found: json_type(other).into(),
                    },
                )],
            });
        }
    };

    match schema {
        Some(schema) => schema.validate(input),
        None => Ok(ValidatedParams::empty()),
    }
}

impl ParameterSchema {
    /// Validates an argument mapping, producing typed parameters.
    ///
    /// Values are coerced the lenient way function-calling models need:
    /// numeric strings are accepted for integer and number fields, and the
    /// usual textual spellings are accepted for booleans. Undeclared fields
    /// are dropped, or rejected when the schema is strict. An explicit `null`
    /// on an optional field counts as omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing every failing field.
    pub fn validate(&self, input: &Map<String, Value>) -> Result<ValidatedParams, ValidationError> {
        let mut issues = Vec::new();
        let mut output = Map::new();

        for field in self.fields() {
            match input.get(field.name()) {
                None | Some(Value::Null) if !field.is_required() => {
                    if let Some(default) = field.default_value() {
                        output.insert(field.name().to_owned(), default.clone());
                    }
                }
                None => issues.push(FieldIssue::new(field.name(), IssueKind::Missing)),
                Some(value) => match check_field(field, field.name(), value) {
                    Ok(value) => {
                        output.insert(field.name().to_owned(), value);
                    }
                    Err(mut field_issues) => issues.append(&mut field_issues),
                },
            }
        }

        if self.is_strict() {
            for key in input.keys() {
                if self.get(key).is_none() {
                    issues.push(FieldIssue::new(key.clone(), IssueKind::Unexpected));
                }
            }
        }

        if issues.is_empty() {
            Ok(ValidatedParams(output))
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn check_field(field: &FieldSchema, path: &str, value: &Value) -> Result<Value, Vec<FieldIssue>> {
    let value = coerce(field.field_type(), path, value)?;
    let c = field.constraints();
    let mut issues = Vec::new();

    if let Some(n) = value.as_f64() {
        if let Some(minimum) = c.minimum.filter(|min| n < *min) {
            issues.push(FieldIssue::new(path, IssueKind::BelowMinimum { minimum }));
        }
        if let Some(maximum) = c.maximum.filter(|max| n > *max) {
            issues.push(FieldIssue::new(path, IssueKind::AboveMaximum { maximum }));
        }
    }

    let length = match &value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    };
    if let Some(len) = length {
        if let Some(min_length) = c.min_length.filter(|min| len < *min) {
            issues.push(FieldIssue::new(path, IssueKind::TooShort { min_length }));
        }
        if let Some(max_length) = c.max_length.filter(|max| len > *max) {
            issues.push(FieldIssue::new(path, IssueKind::TooLong { max_length }));
        }
    }

    if !c.allowed.is_empty() && !c.allowed.iter().any(|allowed| values_equal(allowed, &value)) {
        issues.push(FieldIssue::new(
            path,
            IssueKind::NotAllowed {
                allowed: c.allowed.clone(),
            },
        ));
    }

    if issues.is_empty() { Ok(value) } else { Err(issues) }
}

fn coerce(field_type: &FieldType, path: &str, value: &Value) -> Result<Value, Vec<FieldIssue>> {
    let mismatch = || {
        vec![FieldIssue::new(
            path,
            IssueKind::TypeMismatch {
                expected: field_type.label().into(),
                found: json_type(value).into(),
            },
        )]
    };

    match field_type {
        FieldType::Any => Ok(value.clone()),
        FieldType::String => value.as_str().map(Value::from).ok_or_else(mismatch),
        FieldType::Integer => as_integer(value).map(Value::from).ok_or_else(mismatch),
        FieldType::Number => as_number(value).map(Value::Number).ok_or_else(mismatch),
        FieldType::Boolean => as_boolean(value).map(Value::Bool).ok_or_else(mismatch),
        FieldType::Object => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        FieldType::Array(item_type) => {
            let Value::Array(items) = value else {
                return Err(mismatch());
            };
            let Some(item_type) = item_type else {
                return Ok(value.clone());
            };

            let mut issues = Vec::new();
            let mut coerced = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                match coerce(item_type, &format!("{path}[{index}]"), item) {
                    Ok(item) => coerced.push(item),
                    Err(mut item_issues) => issues.append(&mut item_issues),
                }
            }
            if issues.is_empty() {
                Ok(Value::Array(coerced))
            } else {
                Err(issues)
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64),
        _ => None,
    }
}

fn as_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
