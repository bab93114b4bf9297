//! Capability invocation pipeline.
//!
//! Every invocation resolves to an [`ExecutionEnvelope`]: lookup, access
//! check, operator policy, validation, execution and cancellation failures
//! are all folded into error envelopes rather than surfaced as faults.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use forge_policy::{PolicyEngine, PolicyRequest};
use forge_tools::{
    CapabilityHandle, CapabilityRegistry, ExecutionEnvelope, InvocationContext, InvocationError,
    InvocationStream, StreamSink, ToolError, validate_arguments,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use crate::observer::{InvocationObserver, InvocationRecord};
use crate::scheduler::TaskScheduler;

/// Default buffer size of streaming invocations.
pub const DEFAULT_STREAM_CAPACITY: usize = 32;

/// Name and raw arguments of a requested invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Capability name.
    pub name: String,
    /// Untrusted arguments, normally a JSON object.
    #[serde(default)]
    pub arguments: Value,
}

impl InvocationRequest {
    /// Creates a request for `name` with the supplied arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Creates a request without arguments.
    #[must_use]
    pub fn without_arguments(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }
}

/// Resolves, validates and runs capabilities from a registry snapshot.
#[derive(Clone)]
pub struct ExecutionEngine {
    registry: Arc<CapabilityRegistry>,
    scheduler: TaskScheduler,
    policy: Option<Arc<dyn PolicyEngine>>,
    observer: Option<Arc<dyn InvocationObserver>>,
    default_timeout: Option<Duration>,
    stream_capacity: usize,
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler.config())
            .field("policy_configured", &self.policy.is_some())
            .field("observer_configured", &self.observer.is_some())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    /// Creates an engine over the supplied registry snapshot.
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            scheduler: TaskScheduler::default(),
            policy: None,
            observer: None,
            default_timeout: None,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }

    /// Uses the supplied scheduler for running capabilities.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: TaskScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Configures the operator policy consulted after the access check.
    pub fn set_policy(&mut self, policy: Arc<dyn PolicyEngine>) {
        self.policy = Some(policy);
    }

    /// Configures the operator policy, returning the updated engine.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn PolicyEngine>) -> Self {
        self.set_policy(policy);
        self
    }

    /// Installs an invocation observer.
    pub fn set_observer(&mut self, observer: Arc<dyn InvocationObserver>) {
        self.observer = Some(observer);
    }

    /// Installs an invocation observer, returning the updated engine.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn InvocationObserver>) -> Self {
        self.set_observer(observer);
        self
    }

    /// Applies `timeout` to invocations whose context carries no deadline.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Sets the buffer size used by [`ExecutionEngine::invoke_streaming`].
    #[must_use]
    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity.max(1);
        self
    }

    /// Returns the active registry snapshot.
    #[must_use]
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Swaps in a rebuilt registry, returning the previous snapshot.
    ///
    /// Invocations already running keep the snapshot they started with.
    pub fn replace_registry(&mut self, registry: Arc<CapabilityRegistry>) -> Arc<CapabilityRegistry> {
        debug!(registered = registry.len(), "replacing capability registry");
        std::mem::replace(&mut self.registry, registry)
    }

    /// Returns the scheduler running capability tasks.
    #[must_use]
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Runs one invocation to completion, forwarding chunks to `sink`.
    ///
    /// Never fails: every failure is returned as an error envelope.
    pub async fn invoke(
        &self,
        request: InvocationRequest,
        ctx: InvocationContext,
        sink: &StreamSink,
    ) -> ExecutionEnvelope {
        let started = std::time::Instant::now();
        let chunks_before = sink.emitted();

        let envelope = match self.run(&request, &ctx, sink).await {
            Ok(result) => ExecutionEnvelope::success(result),
            Err(error) => {
                debug!(
                    invocation = %ctx.id(),
                    capability = %request.name,
                    kind = ?error.kind(),
                    error = %error,
                    "invocation rejected or failed"
                );
                ExecutionEnvelope::from(error)
            }
        };

        if let Some(observer) = &self.observer {
            observer.record(&InvocationRecord {
                id: ctx.id(),
                capability: request.name,
                origin: ctx.origin(),
                caller: ctx.caller(),
                chunks: sink.emitted().saturating_sub(chunks_before),
                elapsed: started.elapsed(),
                envelope: envelope.clone(),
            });
        }

        envelope
    }

    /// Spawns an invocation and returns its event stream.
    ///
    /// The stream yields every chunk in production order followed by exactly
    /// one terminal [`forge_tools::InvocationEvent::Finished`]. Dropping the
    /// stream cancels the invocation.
    pub fn invoke_streaming(
        &self,
        request: InvocationRequest,
        ctx: InvocationContext,
    ) -> InvocationStream {
        let (sink, stream) = StreamSink::channel(self.stream_capacity);
        let engine = self.clone();
        tokio::spawn(async move {
            let envelope = engine.invoke(request, ctx, &sink).await;
            if !sink.finish(envelope).await {
                debug!("stream consumer gone before the final envelope");
            }
        });
        stream
    }

    async fn run(
        &self,
        request: &InvocationRequest,
        ctx: &InvocationContext,
        sink: &StreamSink,
    ) -> Result<Value, InvocationError> {
        let name = request.name.as_str();
        let handle = self
            .registry
            .get(name)
            .ok_or_else(|| InvocationError::UnknownCapability {
                name: name.to_owned(),
            })?;

        let descriptor = handle.descriptor();
        if !handle.permits(ctx.origin()) {
            return Err(InvocationError::AccessDenied {
                name: name.to_owned(),
                origin: ctx.origin(),
                access_level: descriptor.access_level(),
            });
        }

        self.enforce_policy(handle, request, ctx).await?;

        let params = validate_arguments(descriptor.parameters(), &request.arguments).map_err(
            |source| InvocationError::Validation {
                name: name.to_owned(),
                source,
            },
        )?;

        let capability = Arc::clone(handle.capability());
        let task_ctx = ctx.clone();
        let task_sink = sink.clone();
        let task = self
            .scheduler
            .spawn(async move { capability.execute(params, &task_ctx, &task_sink).await })
            .map_err(|err| InvocationError::Execution {
                name: name.to_owned(),
                reason: err.to_string(),
            })?;
        // Both fire if this future is dropped before the task finishes.
        let mut task = AbortOnDropHandle::new(task);
        let cancel_on_drop = ctx.cancellation().clone().drop_guard();

        let deadline = ctx
            .deadline()
            .or_else(|| self.default_timeout.map(|timeout| Instant::now() + timeout));
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            joined = &mut task => {
                cancel_on_drop.disarm();
                match joined {
                    Ok(Ok(Ok(value))) => Ok(value),
                    Ok(Ok(Err(ToolError::Cancelled))) => Err(InvocationError::Cancelled {
                        name: name.to_owned(),
                    }),
                    Ok(Ok(Err(err))) => Err(InvocationError::Execution {
                        name: name.to_owned(),
                        reason: err.to_string(),
                    }),
                    Ok(Err(err)) => Err(InvocationError::Execution {
                        name: name.to_owned(),
                        reason: err.to_string(),
                    }),
                    Err(err) if err.is_panic() => {
                        let reason = panic_reason(err.into_panic().as_ref());
                        warn!(capability = name, %reason, "capability panicked");
                        Err(InvocationError::Execution {
                            name: name.to_owned(),
                            reason,
                        })
                    }
                    Err(_) => Err(InvocationError::Cancelled {
                        name: name.to_owned(),
                    }),
                }
            },
            () = ctx.cancellation().cancelled() => {
                Err(InvocationError::Cancelled { name: name.to_owned() })
            }
            () = sink.disconnected() => {
                debug!(capability = name, "stream consumer gone; cancelling");
                Err(InvocationError::Cancelled { name: name.to_owned() })
            }
            () = expired => {
                Err(InvocationError::TimedOut { name: name.to_owned() })
            }
        }
    }

    async fn enforce_policy(
        &self,
        handle: &CapabilityHandle,
        request: &InvocationRequest,
        ctx: &InvocationContext,
    ) -> Result<(), InvocationError> {
        let Some(policy) = self.policy.as_ref() else {
            return Ok(());
        };

        let descriptor = handle.descriptor();
        let policy_request = PolicyRequest::invocation(ctx.caller(), &request.name, ctx.origin())
            .with_metadata("arguments", request.arguments.clone())
            .with_metadata("invocation", Value::from(ctx.id().to_string()))
            .with_tag(format!("access:{}", descriptor.access_level()));

        let decision = match policy.evaluate(&policy_request).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!(capability = %request.name, error = %err, "policy engine failed; refusing");
                return Err(InvocationError::PolicyDenied {
                    name: request.name.clone(),
                    reason: format!("policy engine error: {err}"),
                });
            }
        };

        if let Some(observer) = &self.observer {
            observer.on_policy_decision(&policy_request, &decision);
        }

        match decision.refusal() {
            None => Ok(()),
            Some(reason) => Err(InvocationError::PolicyDenied {
                name: request.name.clone(),
                reason,
            }),
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("capability panicked: {detail}"),
        None => "capability panicked".to_owned(),
    }
}
