//! Hooks notified about policy decisions and finished invocations.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use forge_policy::{DecisionKind, PolicyDecision, PolicyRequest};
use forge_primitives::{CallerId, InvocationId, Origin};
use forge_tools::ExecutionEnvelope;
use tracing::{debug, info, warn};

/// Summary of one finished invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    /// Invocation identifier.
    pub id: InvocationId,
    /// Requested capability name.
    pub capability: String,
    /// Where the call came from.
    pub origin: Origin,
    /// Caller identity, when known.
    pub caller: Option<CallerId>,
    /// Number of chunks streamed before completion.
    pub chunks: usize,
    /// Wall-clock time spent in the engine.
    pub elapsed: Duration,
    /// Envelope returned to the caller.
    pub envelope: ExecutionEnvelope,
}

/// Observer trait used to capture invocation outcomes (for logging, metrics, etc.).
pub trait InvocationObserver: Send + Sync {
    /// Records a finished invocation.
    fn record(&self, record: &InvocationRecord);

    /// Called whenever the operator policy produces a decision.
    fn on_policy_decision(&self, request: &PolicyRequest, decision: &PolicyDecision) {
        let _ = (request, decision);
    }
}

/// Observer that logs to tracing.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl InvocationObserver for TracingObserver {
    fn record(&self, record: &InvocationRecord) {
        let elapsed_ms = u64::try_from(record.elapsed.as_millis()).unwrap_or(u64::MAX);
        match &record.envelope {
            ExecutionEnvelope::Success { .. } => info!(
                invocation = %record.id,
                capability = %record.capability,
                origin = %record.origin,
                chunks = record.chunks,
                elapsed_ms,
                "invocation succeeded"
            ),
            ExecutionEnvelope::Error { message, kind, .. } => warn!(
                invocation = %record.id,
                capability = %record.capability,
                origin = %record.origin,
                kind = ?kind,
                chunks = record.chunks,
                elapsed_ms,
                message = %message,
                "invocation failed"
            ),
        }
    }

    fn on_policy_decision(&self, request: &PolicyRequest, decision: &PolicyDecision) {
        let subject = request.action().label();
        let reason = decision.reason().unwrap_or_default();
        match decision.kind() {
            DecisionKind::Allow => debug!(subject = %subject, "policy allow"),
            DecisionKind::Deny => warn!(subject = %subject, reason, "policy deny"),
            DecisionKind::Escalate => warn!(
                subject = %subject,
                reason,
                approvers = ?decision.required_approvals(),
                "policy escalate"
            ),
        }
    }
}

/// Observer that keeps every record in memory, mostly for tests.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    records: Mutex<Vec<InvocationRecord>>,
    decisions: Mutex<Vec<PolicyDecision>>,
}

impl CollectingObserver {
    /// Creates a new collecting observer.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Takes the records collected so far.
    #[must_use]
    pub fn drain(&self) -> Vec<InvocationRecord> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.drain(..).collect()
    }

    /// Takes the policy decisions collected so far.
    #[must_use]
    pub fn drain_decisions(&self) -> Vec<PolicyDecision> {
        let mut decisions = self.decisions.lock().unwrap_or_else(PoisonError::into_inner);
        decisions.drain(..).collect()
    }
}

impl InvocationObserver for CollectingObserver {
    fn record(&self, record: &InvocationRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }

    fn on_policy_decision(&self, _request: &PolicyRequest, decision: &PolicyDecision) {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decision.clone());
    }
}

/// Forwards to several observers in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn InvocationObserver>>,
}

impl CompositeObserver {
    /// Creates a composite observer from the supplied list.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn InvocationObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer.
    pub fn push(&mut self, observer: Arc<dyn InvocationObserver>) {
        self.observers.push(observer);
    }
}

impl InvocationObserver for CompositeObserver {
    fn record(&self, record: &InvocationRecord) {
        for observer in &self.observers {
            observer.record(record);
        }
    }

    fn on_policy_decision(&self, request: &PolicyRequest, decision: &PolicyDecision) {
        for observer in &self.observers {
            observer.on_policy_decision(request, decision);
        }
    }
}
