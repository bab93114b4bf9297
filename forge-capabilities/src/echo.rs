use std::sync::Arc;

use forge_primitives::AccessLevel;
use forge_tools::{
    CapabilityDescriptor, CapabilitySource, FieldSchema, FieldType, FnCapability,
    InvocationContext, ParameterSchema, SharedCapability, StreamSink, ToolResult,
    ValidatedParams, capability_fn,
};
use serde::Deserialize;
use serde_json::{Value, json};

/// Name of the echo capability.
pub const ECHO: &str = "echo";

#[derive(Debug, Deserialize)]
struct EchoArgs {
    text: String,
    repeat: u8,
    uppercase: bool,
}

type EchoFn = fn(ValidatedParams, InvocationContext, StreamSink) -> EchoFuture;
type EchoFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ToolResult<Value>> + Send>>;

/// Builds the `echo` capability: repeats `text` back to the model.
///
/// # Errors
///
/// Returns [`forge_tools::ToolError`] if the descriptor is rejected.
pub fn echo() -> ToolResult<FnCapability<EchoFn>> {
    let descriptor = CapabilityDescriptor::builder(ECHO)
        .description("Repeats the given text back, optionally upper-cased.")
        .access_level(AccessLevel::AiOnly)
        .parameters(
            ParameterSchema::new()
                .field(
                    FieldSchema::required("text", FieldType::String)
                        .describe("Text to repeat")
                        .min_length(1)
                        .max_length(2000),
                )
                .field(
                    FieldSchema::optional("repeat", FieldType::Integer)
                        .describe("How many times to repeat the text")
                        .minimum(1.0)
                        .maximum(5.0)
                        .with_default(1),
                )
                .field(
                    FieldSchema::optional("uppercase", FieldType::Boolean)
                        .with_default(false),
                ),
        )
        .build()?;

    Ok(capability_fn(descriptor, run as EchoFn))
}

fn run(params: ValidatedParams, _ctx: InvocationContext, _sink: StreamSink) -> EchoFuture {
    Box::pin(async move {
        let args: EchoArgs = params.deserialize()?;
        let text = if args.uppercase {
            args.text.to_uppercase()
        } else {
            args.text
        };
        let echoed = vec![text.as_str(); usize::from(args.repeat)].join(" ");
        Ok(json!({ "echo": echoed }))
    })
}

pub(crate) fn construct() -> ToolResult<SharedCapability> {
    Ok(Arc::new(echo()?))
}

inventory::submit! {
    CapabilitySource::new(ECHO, construct)
}
