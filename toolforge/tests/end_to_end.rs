use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mxp::{Message, MessageType};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use toolforge::config::ForgeConfig;
use toolforge::kernel::{
    CollectingObserver, ExecutionEngine, InvocationRequest, UiChannel, function_response,
};
use toolforge::policy::{PolicyDecision, PolicyRule, RuleBasedEngine, RuleMatcher};
use toolforge::primitives::{AccessLevel, Origin};
use toolforge::telemetry::ReadinessStatus;
use toolforge::tools::{
    CapabilityDescriptor, CapabilityRegistry, CapabilitySource, ErrorKind, ExecutionEnvelope,
    FieldSchema, FieldType, InvocationContext, InvocationEvent, ParameterSchema,
    RegistrationOutcome, RegistryBuilder, SharedCapability, StreamSink, ToolError, ToolResult,
    ValidatedParams, capability_fn,
};
use toolforge::{Runtime, capabilities};

fn descriptor(name: &str, access: AccessLevel) -> CapabilityDescriptor {
    CapabilityDescriptor::builder(name)
        .description(format!("{name} for tests"))
        .access_level(access)
        .build()
        .unwrap()
}

fn engine(builder: RegistryBuilder) -> ExecutionEngine {
    ExecutionEngine::new(builder.build().into_shared())
}

async fn invoke(
    engine: &ExecutionEngine,
    name: &str,
    args: Value,
    ctx: InvocationContext,
) -> ExecutionEnvelope {
    engine
        .invoke(InvocationRequest::new(name, args), ctx, &StreamSink::discard())
        .await
}

#[tokio::test]
async fn no_parameter_tool_returns_its_result() {
    let mut builder = RegistryBuilder::new();
    builder.register(capability_fn(
        descriptor("ping", AccessLevel::Both),
        |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
            ToolResult::Ok(json!({ "ok": true }))
        },
    ));
    let engine = engine(builder);

    let envelope = invoke(&engine, "ping", json!({}), InvocationContext::ai()).await;
    assert_eq!(envelope, ExecutionEnvelope::success(json!({ "ok": true })));
    assert_eq!(
        envelope.to_value(),
        json!({ "status": "success", "result": { "ok": true } })
    );
}

#[tokio::test]
async fn invalid_integer_names_the_field_and_skips_execution() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut builder = RegistryBuilder::new();
    builder.register(capability_fn(
        CapabilityDescriptor::builder("repeat")
            .description("repeats")
            .parameters(ParameterSchema::new().field(FieldSchema::required("count", FieldType::Integer)))
            .build()
            .unwrap(),
        move |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { ToolResult::Ok(Value::Null) }
        },
    ));
    let engine = engine(builder);

    let envelope = invoke(&engine, "repeat", json!({ "count": "abc" }), InvocationContext::ai()).await;
    assert!(!envelope.is_success());
    assert_eq!(envelope.kind(), Some(ErrorKind::ValidationFailure));
    assert!(envelope.message().unwrap().contains("count"));
    assert_eq!(envelope.fields()[0].field, "count");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let ok = invoke(&engine, "repeat", json!({ "count": "3" }), InvocationContext::ai()).await;
    assert!(ok.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn implementation_receives_only_declared_fields() {
    let mut builder = RegistryBuilder::new();
    builder.register(capability_fn(
        CapabilityDescriptor::builder("search")
            .description("searches")
            .parameters(
                ParameterSchema::new()
                    .field(FieldSchema::required("query", FieldType::String))
                    .field(FieldSchema::optional("limit", FieldType::Integer).with_default(10)),
            )
            .build()
            .unwrap(),
        |params: ValidatedParams, _c: InvocationContext, _s: StreamSink| async move {
            ToolResult::Ok(Value::Object(params.into_inner()))
        },
    ));
    let engine = engine(builder);

    let envelope = invoke(
        &engine,
        "search",
        json!({ "query": "rust", "verbose": true }),
        InvocationContext::ai(),
    )
    .await;
    assert_eq!(envelope.result(), Some(&json!({ "query": "rust", "limit": 10 })));
}

#[tokio::test]
async fn ui_only_tool_is_refused_to_the_model_and_not_declared() {
    let mut builder = RegistryBuilder::new();
    builder.register(capability_fn(
        descriptor("open_panel", AccessLevel::UiOnly),
        |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
            ToolResult::Ok(json!("opened"))
        },
    ));
    let engine = engine(builder);

    let envelope = invoke(&engine, "open_panel", json!({}), InvocationContext::ai()).await;
    assert_eq!(envelope.kind(), Some(ErrorKind::AccessDenied));
    assert!(toolforge::kernel::declarations(engine.registry()).is_empty());

    let from_ui = invoke(&engine, "open_panel", json!({}), InvocationContext::ui()).await;
    assert_eq!(from_ui.result(), Some(&json!("opened")));
}

#[tokio::test]
async fn failure_after_partial_output_keeps_the_engine_alive() {
    let mut builder = RegistryBuilder::new();
    builder.register(capability_fn(
        descriptor("flaky", AccessLevel::Both),
        |_p: ValidatedParams, _c: InvocationContext, sink: StreamSink| async move {
            sink.emit("partial").await?;
            Err::<Value, _>(ToolError::execution("disk full"))
        },
    ));
    builder.register(capability_fn(
        descriptor("crashy", AccessLevel::Both),
        |_p: ValidatedParams, _c: InvocationContext, sink: StreamSink| async move {
            sink.emit("partial").await?;
            if sink.emitted() > 0 {
                panic!("unexpected state");
            }
            ToolResult::Ok(Value::Null)
        },
    ));
    builder.register(capability_fn(
        descriptor("steady", AccessLevel::Both),
        |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
            ToolResult::Ok(json!("fine"))
        },
    ));
    let engine = engine(builder);

    let (chunks, finished) = engine
        .invoke_streaming(InvocationRequest::without_arguments("flaky"), InvocationContext::ui())
        .collect_all()
        .await;
    assert_eq!(chunks, ["partial"]);
    let finished = finished.unwrap();
    assert_eq!(finished.message(), Some("disk full"));
    assert_eq!(finished.kind(), Some(ErrorKind::ExecutionFailure));

    let (chunks, finished) = engine
        .invoke_streaming(InvocationRequest::without_arguments("crashy"), InvocationContext::ai())
        .collect_all()
        .await;
    assert_eq!(chunks, ["partial"]);
    assert!(finished.unwrap().message().unwrap().contains("unexpected state"));

    let after = invoke(&engine, "steady", Value::Null, InvocationContext::ai()).await;
    assert!(after.is_success());
}

#[tokio::test]
async fn chunks_arrive_in_order_before_the_envelope() {
    let mut builder = RegistryBuilder::new();
    builder.register(capability_fn(
        descriptor("steps", AccessLevel::Both),
        |_p: ValidatedParams, _c: InvocationContext, sink: StreamSink| async move {
            for step in ["c1", "c2", "c3"] {
                sink.emit(step).await?;
            }
            ToolResult::Ok(json!("R"))
        },
    ));
    let engine = engine(builder);

    let mut stream =
        engine.invoke_streaming(InvocationRequest::without_arguments("steps"), InvocationContext::ui());
    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        events.push(event);
    }

    assert_eq!(
        events,
        [
            InvocationEvent::Chunk("c1".into()),
            InvocationEvent::Chunk("c2".into()),
            InvocationEvent::Chunk("c3".into()),
            InvocationEvent::Finished(ExecutionEnvelope::success(json!("R"))),
        ]
    );
}

#[tokio::test]
async fn unknown_and_disabled_names_are_errors() {
    let mut builder = RegistryBuilder::new();
    let registration = builder.register(capability_fn(
        descriptor("retired", AccessLevel::Disabled),
        |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
            ToolResult::Ok(Value::Null)
        },
    ));
    assert_eq!(registration.outcome, RegistrationOutcome::SkippedDisabled);
    let engine = engine(builder);
    assert!(!engine.registry().contains("retired"));

    for name in ["retired", "never-heard-of-it"] {
        for ctx in [InvocationContext::ai(), InvocationContext::ui()] {
            let envelope = invoke(&engine, name, json!({}), ctx).await;
            assert_eq!(envelope.kind(), Some(ErrorKind::UnknownCapability));
            assert_eq!(envelope.to_value()["status"], "error");
        }
    }
}

#[test]
fn re_registration_keeps_the_second_entry() {
    let mut builder = CapabilityRegistry::builder();
    builder.register(capability_fn(
        descriptor("tool", AccessLevel::AiOnly),
        |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
            ToolResult::Ok(json!(1))
        },
    ));
    let second = builder.register(capability_fn(
        descriptor("tool", AccessLevel::UiOnly),
        |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
            ToolResult::Ok(json!(2))
        },
    ));
    assert_eq!(second.outcome, RegistrationOutcome::Replaced);

    let registry = builder.build();
    assert_eq!(registry.len(), 1);
    let handle = registry.get("tool").unwrap();
    assert!(handle.permits(Origin::Ui));
    assert!(!handle.permits(Origin::Ai));
}

#[tokio::test(start_paused = true)]
async fn bootstrap_discovers_builtin_capabilities() {
    let runtime = Runtime::bootstrap(ForgeConfig::default());
    assert_eq!(runtime.readiness().status, ReadinessStatus::Ready);
    for name in capabilities::builtin_names() {
        assert!(runtime.engine().registry().contains(name), "{name} missing");
    }

    let declared: Vec<_> = runtime.declarations().into_iter().map(|d| d.name).collect();
    assert!(declared.contains(&"echo".to_owned()));
    assert!(declared.contains(&"system_status_check".to_owned()));

    let components = runtime.ui_components();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].name, "system_status_check");
    assert_eq!(components[0].placement.as_deref(), Some("toolbar"));

    let (chunks, finished) = runtime
        .engine()
        .invoke_streaming(
            InvocationRequest::without_arguments("system_status_check"),
            InvocationContext::ai(),
        )
        .collect_all()
        .await;
    assert_eq!(chunks.len(), 4);
    let finished = finished.unwrap();
    assert_eq!(finished.result().unwrap()["status"], "OK");

    let response = function_response("system_status_check", &finished);
    assert_eq!(response["response"]["status"], "success");
}

#[tokio::test]
async fn deny_list_removes_a_builtin() {
    let mut config = ForgeConfig::default();
    config.discovery.deny.push("echo".to_owned());
    let runtime = Runtime::bootstrap(config);

    assert!(!runtime.engine().registry().contains("echo"));
    assert!(runtime.engine().registry().contains("system_status_check"));
    assert!(runtime.report().skipped.iter().any(|s| s.source_id == "echo"));

    let envelope = invoke(runtime.engine(), "echo", json!({ "text": "hi" }), InvocationContext::ai()).await;
    assert_eq!(envelope.kind(), Some(ErrorKind::UnknownCapability));
}

fn broken_source() -> ToolResult<SharedCapability> {
    Err(ToolError::invalid_descriptor("no description"))
}

fn audited_source() -> ToolResult<SharedCapability> {
    Ok(Arc::new(capability_fn(
        descriptor("audited", AccessLevel::Both),
        |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
            ToolResult::Ok(json!("ran"))
        },
    )))
}

#[tokio::test]
async fn explicit_sources_policy_and_observer() {
    let observer = CollectingObserver::new();
    let policy = RuleBasedEngine::new(PolicyDecision::allow()).with_rule(
        PolicyRule::new(
            "ai-needs-approval",
            RuleMatcher::for_capability("audited").with_origin(Origin::Ai),
            PolicyDecision::escalate("sensitive", vec!["operator".into()]),
        )
        .unwrap(),
    );
    let runtime = Runtime::builder(ForgeConfig::default())
        .without_plugins()
        .source(CapabilitySource::new("audited", audited_source))
        .source(CapabilitySource::new("broken", broken_source))
        .policy(Arc::new(policy))
        .observer(observer.clone())
        .build();

    assert_eq!(runtime.readiness().status, ReadinessStatus::Degraded);
    assert_eq!(runtime.engine().registry().names(), ["audited"]);

    let refused = invoke(runtime.engine(), "audited", json!({}), InvocationContext::ai()).await;
    assert_eq!(refused.kind(), Some(ErrorKind::AccessDenied));
    assert!(refused.message().unwrap().contains("operator"));

    let allowed = invoke(runtime.engine(), "audited", json!({}), InvocationContext::ui()).await;
    assert!(allowed.is_success());

    let records = observer.drain();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].origin, Origin::Ui);
    assert_eq!(observer.drain_decisions().len(), 2);
}

#[tokio::test]
async fn timeout_from_config_bounds_invocations() {
    fn slow_source() -> ToolResult<SharedCapability> {
        Ok(Arc::new(capability_fn(
            descriptor("slow", AccessLevel::AiOnly),
            |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                ToolResult::Ok(Value::Null)
            },
        )))
    }

    let mut config = ForgeConfig::default();
    config.invocation.timeout_ms = Some(20);
    let runtime = Runtime::builder(config)
        .without_plugins()
        .source(CapabilitySource::new("slow", slow_source))
        .build();

    let envelope = invoke(runtime.engine(), "slow", json!({}), InvocationContext::ai()).await;
    assert_eq!(envelope.kind(), Some(ErrorKind::TimedOut));
}

#[tokio::test]
async fn dropping_the_stream_cancels_the_running_capability() {
    let mut builder = RegistryBuilder::new();
    builder.register(capability_fn(
        descriptor("watcher", AccessLevel::UiOnly),
        |_p: ValidatedParams, _c: InvocationContext, sink: StreamSink| async move {
            sink.emit("first").await?;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ToolResult::Ok(Value::Null)
        },
    ));
    let observer = CollectingObserver::new();
    let engine = engine(builder).with_observer(observer.clone());

    let ctx = InvocationContext::ui();
    let token = ctx.cancellation().clone();
    let mut stream = engine.invoke_streaming(InvocationRequest::new("watcher", json!({})), ctx);
    assert_eq!(
        stream.next_event().await,
        Some(InvocationEvent::Chunk("first".into()))
    );
    drop(stream);

    let mut records = Vec::new();
    for _ in 0..100 {
        records = observer.drain();
        if !records.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].envelope.kind(), Some(ErrorKind::Cancelled));
    assert_eq!(records[0].chunks, 1);
    assert!(token.is_cancelled());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(engine.scheduler().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn ui_channel_streams_builtin_progress() {
    let runtime = Runtime::bootstrap(ForgeConfig::default());
    let (tx, mut rx) = mpsc::channel(16);
    let channel = UiChannel::new(runtime.engine().clone(), Arc::new(tx));

    let call = json!({ "name": "system_status_check", "arguments": {} });
    let message = Message::new(MessageType::Call, call.to_string().as_bytes());
    channel.handle(&message).await.unwrap();

    let mut types = Vec::new();
    let mut last = None;
    while let Ok(message) = rx.try_recv() {
        types.push(message.message_type());
        last = Some(message);
    }
    assert_eq!(types.len(), 5);
    assert!(types[..4].iter().all(|t| *t == Some(MessageType::StreamChunk)));
    assert_eq!(types[4], Some(MessageType::Response));

    let envelope: Value = serde_json::from_slice(last.unwrap().payload()).unwrap();
    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["result"]["status"], "OK");
}
