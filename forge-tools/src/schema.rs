//! Structural parameter schemas declared by capabilities.

use serde_json::{Map, Value, json};

/// Type of a declared parameter field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// Floating point number.
    Number,
    /// Boolean flag.
    Boolean,
    /// Homogeneous list, optionally constrained to an item type.
    Array(Option<Box<FieldType>>),
    /// Arbitrary JSON object.
    Object,
    /// Any JSON value.
    Any,
}

impl FieldType {
    /// Creates an array type whose items must match `item`.
    #[must_use]
    pub fn array_of(item: FieldType) -> Self {
        Self::Array(Some(Box::new(item)))
    }

    /// Returns the JSON-Schema type label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array(_) => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    fn json_schema(&self) -> Map<String, Value> {
        let mut schema = Map::new();
        match self {
            Self::Any => {}
            Self::Array(item) => {
                schema.insert("type".into(), Value::from("array"));
                if let Some(item) = item {
                    schema.insert("items".into(), Value::Object(item.json_schema()));
                }
            }
            other => {
                schema.insert("type".into(), Value::from(other.label()));
            }
        }
        schema
    }
}

/// Optional value constraints attached to a field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constraints {
    /// Inclusive lower bound for numeric fields.
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numeric fields.
    pub maximum: Option<f64>,
    /// Minimum length for strings (characters) and arrays (items).
    pub min_length: Option<usize>,
    /// Maximum length for strings (characters) and arrays (items).
    pub max_length: Option<usize>,
    /// Closed set of accepted values. Empty means unrestricted.
    pub allowed: Vec<Value>,
}

/// Declaration of a single named parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSchema {
    name: String,
    field_type: FieldType,
    required: bool,
    default: Option<Value>,
    description: Option<String>,
    constraints: Constraints,
}

impl FieldSchema {
    /// Declares a required field.
    #[must_use]
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name, field_type, true)
    }

    /// Declares an optional field.
    #[must_use]
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name, field_type, false)
    }

    fn new(name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
            default: None,
            description: None,
            constraints: Constraints::default(),
        }
    }

    /// Sets the value used when an optional field is omitted.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the description exported to the AI model.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets an inclusive lower bound.
    #[must_use]
    pub fn minimum(mut self, minimum: f64) -> Self {
        self.constraints.minimum = Some(minimum);
        self
    }

    /// Sets an inclusive upper bound.
    #[must_use]
    pub fn maximum(mut self, maximum: f64) -> Self {
        self.constraints.maximum = Some(maximum);
        self
    }

    /// Sets the minimum string or array length.
    #[must_use]
    pub fn min_length(mut self, min_length: usize) -> Self {
        self.constraints.min_length = Some(min_length);
        self
    }

    /// Sets the maximum string or array length.
    #[must_use]
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.constraints.max_length = Some(max_length);
        self
    }

    /// Restricts the field to a closed set of values.
    #[must_use]
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constraints.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Returns `true` when the field must be supplied.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default for omitted optional fields.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the attached constraints.
    #[must_use]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    fn json_schema(&self) -> Value {
        let mut schema = self.field_type.json_schema();
        if let Some(description) = &self.description {
            schema.insert("description".into(), Value::from(description.clone()));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }

        let c = &self.constraints;
        if let Some(minimum) = c.minimum {
            schema.insert("minimum".into(), json!(minimum));
        }
        if let Some(maximum) = c.maximum {
            schema.insert("maximum".into(), json!(maximum));
        }
        let (min_key, max_key) = match self.field_type {
            FieldType::Array(_) => ("minItems", "maxItems"),
            _ => ("minLength", "maxLength"),
        };
        if let Some(min) = c.min_length {
            schema.insert(min_key.into(), json!(min));
        }
        if let Some(max) = c.max_length {
            schema.insert(max_key.into(), json!(max));
        }
        if !c.allowed.is_empty() {
            schema.insert("enum".into(), Value::Array(c.allowed.clone()));
        }

        Value::Object(schema)
    }
}

/// Ordered set of fields accepted by a capability.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSchema {
    fields: Vec<FieldSchema>,
    strict: bool,
}

impl ParameterSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. A field with the same name replaces the earlier one.
    #[must_use]
    pub fn field(mut self, field: FieldSchema) -> Self {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
        self
    }

    /// Rejects inputs carrying fields the schema does not declare.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Returns `true` when undeclared fields are rejected.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Returns the declared fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` when no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the schema as a JSON-Schema object.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.json_schema()))
            .collect();
        let required: Vec<Value> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| Value::from(f.name.clone()))
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), Value::from("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }
        if self.strict {
            schema.insert("additionalProperties".into(), Value::Bool(false));
        }
        Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_schema_lists_required_fields() {
        let schema = ParameterSchema::new()
            .field(FieldSchema::required("count", FieldType::Integer).minimum(1.0))
            .field(
                FieldSchema::optional("mode", FieldType::String)
                    .one_of(["fast", "slow"])
                    .with_default("fast"),
            )
            .field(FieldSchema::optional("tags", FieldType::array_of(FieldType::String)).max_length(3));

        let json = schema.to_json_schema();
        assert_eq!(json["type"], "object");
        assert_eq!(json["required"], json!(["count"]));
        assert_eq!(json["properties"]["count"]["type"], "integer");
        assert_eq!(json["properties"]["count"]["minimum"], json!(1.0));
        assert_eq!(json["properties"]["mode"]["enum"], json!(["fast", "slow"]));
        assert_eq!(json["properties"]["mode"]["default"], "fast");
        assert_eq!(json["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(json["properties"]["tags"]["maxItems"], json!(3));
        assert!(json.get("additionalProperties").is_none());
    }

    #[test]
    fn redeclaring_a_field_replaces_it() {
        let schema = ParameterSchema::new()
            .field(FieldSchema::required("x", FieldType::String))
            .field(FieldSchema::optional("x", FieldType::Integer))
            .strict();

        assert_eq!(schema.fields().len(), 1);
        assert_eq!(schema.get("x").unwrap().field_type(), &FieldType::Integer);
        assert_eq!(schema.to_json_schema()["additionalProperties"], json!(false));
    }
}
