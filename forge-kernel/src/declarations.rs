//! Function declarations handed to the AI model each turn.

use forge_tools::{CapabilityDescriptor, CapabilityRegistry, ExecutionEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One callable function as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Capability name, used verbatim as the function name.
    pub name: String,
    /// Natural-language description.
    pub description: String,
    /// JSON-Schema object describing the arguments.
    pub parameters: Value,
}

impl FunctionDeclaration {
    /// Builds the declaration for a descriptor.
    #[must_use]
    pub fn from_descriptor(descriptor: &CapabilityDescriptor) -> Self {
        let parameters = descriptor.parameters().map_or_else(
            || json!({ "type": "object", "properties": {} }),
            forge_tools::ParameterSchema::to_json_schema,
        );
        Self {
            name: descriptor.name().to_string(),
            description: descriptor.description().to_owned(),
            parameters,
        }
    }
}

/// Lists every AI-invocable capability, sorted by name.
///
/// Recomputed from the registry on every call so a rebuilt registry is
/// reflected on the next conversation turn.
#[must_use]
pub fn declarations(registry: &CapabilityRegistry) -> Vec<FunctionDeclaration> {
    registry
        .ai_enabled()
        .map(|handle| FunctionDeclaration::from_descriptor(handle.descriptor()))
        .collect()
}

/// Renders declarations in the Gemini `tools` shape.
#[must_use]
pub fn gemini_tools(declarations: &[FunctionDeclaration]) -> Value {
    json!([{ "function_declarations": declarations }])
}

/// Renders declarations in the OpenAI `tools` shape.
#[must_use]
pub fn openai_tools(declarations: &[FunctionDeclaration]) -> Value {
    Value::Array(
        declarations
            .iter()
            .map(|declaration| {
                json!({
                    "type": "function",
                    "function": declaration,
                })
            })
            .collect(),
    )
}

/// Renders an envelope as the model's function-result payload.
///
/// Only the status and the result or message reach the model; per-field
/// details stay on the UI side.
#[must_use]
pub fn function_response(name: &str, envelope: &ExecutionEnvelope) -> Value {
    let response = match envelope {
        ExecutionEnvelope::Success { result } => json!({ "status": "success", "result": result }),
        ExecutionEnvelope::Error { message, .. } => {
            json!({ "status": "error", "message": message })
        }
    };
    json!({ "name": name, "response": response })
}

#[cfg(test)]
mod tests {
    use forge_primitives::AccessLevel;
    use forge_tools::{
        FieldSchema, FieldType, InvocationContext, ParameterSchema, RegistryBuilder, StreamSink,
        ToolResult, ValidatedParams, capability_fn,
    };

    use super::*;

    fn register(builder: &mut RegistryBuilder, name: &str, access: AccessLevel) {
        let descriptor = CapabilityDescriptor::builder(name)
            .description(format!("{name} capability"))
            .access_level(access)
            .parameters(ParameterSchema::new().field(FieldSchema::required("q", FieldType::String)))
            .build()
            .unwrap();
        builder.register(capability_fn(
            descriptor,
            |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
                ToolResult::Ok(Value::Null)
            },
        ));
    }

    #[test]
    fn only_ai_enabled_capabilities_are_declared() {
        let mut builder = RegistryBuilder::new();
        register(&mut builder, "search", AccessLevel::AiOnly);
        register(&mut builder, "panel", AccessLevel::UiOnly);
        register(&mut builder, "both", AccessLevel::Both);
        register(&mut builder, "off", AccessLevel::Disabled);
        let registry = builder.build();

        let declared = declarations(&registry);
        let names: Vec<_> = declared.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["both", "search"]);
        assert_eq!(declared[1].parameters["required"], json!(["q"]));
        assert_eq!(declared[1].description, "search capability");
    }

    #[test]
    fn provider_shapes() {
        let declaration = FunctionDeclaration {
            name: "status".into(),
            description: "System status".into(),
            parameters: json!({ "type": "object", "properties": {} }),
        };

        let gemini = gemini_tools(std::slice::from_ref(&declaration));
        assert_eq!(gemini[0]["function_declarations"][0]["name"], "status");

        let openai = openai_tools(&[declaration]);
        assert_eq!(openai[0]["type"], "function");
        assert_eq!(openai[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn function_response_hides_field_details() {
        let ok = function_response("status", &ExecutionEnvelope::success(json!({ "ok": true })));
        assert_eq!(
            ok,
            json!({ "name": "status", "response": { "status": "success", "result": { "ok": true } } })
        );

        let err = function_response("status", &ExecutionEnvelope::error("boom"));
        assert_eq!(err["response"], json!({ "status": "error", "message": "boom" }));
    }
}
