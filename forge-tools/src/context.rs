//! Per-invocation context handed to capability implementations.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use forge_primitives::{CallerId, InvocationId, Origin};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Shared handle to host resources (database clients, caches, ...).
pub type Resources = Arc<dyn Any + Send + Sync>;

/// Everything a capability needs to know about the call it is serving.
///
/// The context is owned by the engine for the lifetime of a single
/// invocation and is never persisted.
#[derive(Clone)]
pub struct InvocationContext {
    id: InvocationId,
    caller: Option<CallerId>,
    origin: Origin,
    resources: Option<Resources>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl InvocationContext {
    /// Creates a context for a call arriving from `origin`.
    #[must_use]
    pub fn new(origin: Origin) -> Self {
        Self {
            id: InvocationId::random(),
            caller: None,
            origin,
            resources: None,
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Creates a context for a call requested by the AI model.
    #[must_use]
    pub fn ai() -> Self {
        Self::new(Origin::Ai)
    }

    /// Creates a context for a call triggered from the UI.
    #[must_use]
    pub fn ui() -> Self {
        Self::new(Origin::Ui)
    }

    /// Overrides the invocation identifier.
    #[must_use]
    pub fn with_id(mut self, id: InvocationId) -> Self {
        self.id = id;
        self
    }

    /// Attaches the caller identity.
    #[must_use]
    pub fn with_caller(mut self, caller: CallerId) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Lends host resources to the capability for this invocation.
    #[must_use]
    pub fn with_resources<T>(mut self, resources: Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        self.resources = Some(resources);
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the invocation identifier.
    #[must_use]
    pub fn id(&self) -> InvocationId {
        self.id
    }

    /// Returns the caller identity, when known.
    #[must_use]
    pub fn caller(&self) -> Option<CallerId> {
        self.caller
    }

    /// Returns where the call came from.
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Returns the lent resources downcast to `T`.
    #[must_use]
    pub fn resource<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        self.resources.as_ref()?.downcast_ref::<T>()
    }

    /// Returns the cancellation token observed by the engine.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("id", &self.id)
            .field("caller", &self.caller)
            .field("origin", &self.origin)
            .field("has_resources", &self.resources.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Store {
        tenant: &'static str,
    }

    #[test]
    fn resources_downcast_to_their_type() {
        let ctx = InvocationContext::ui().with_resources(Arc::new(Store { tenant: "acme" }));
        assert_eq!(ctx.resource::<Store>().map(|s| s.tenant), Some("acme"));
        assert!(ctx.resource::<String>().is_none());
        assert_eq!(ctx.origin(), Origin::Ui);
    }

    #[test]
    fn shared_token_cancels_context() {
        let token = CancellationToken::new();
        let ctx = InvocationContext::ai().with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
