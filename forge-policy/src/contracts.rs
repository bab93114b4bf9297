//! Policy request and action contracts for governance evaluation.

use std::collections::BTreeSet;

use forge_primitives::{CallerId, Origin};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Describes the action being evaluated by the policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyAction {
    /// Request to invoke a registered capability.
    InvokeCapability {
        /// Name of the capability to be invoked.
        name: String,
        /// Where the invocation came from.
        origin: Origin,
    },
    /// Request to mount a capability's dedicated routes.
    MountRoutes {
        /// Name of the capability owning the routes.
        name: String,
        /// Mount prefix.
        prefix: String,
    },
}

impl PolicyAction {
    /// Returns a concise, human-readable label for the action.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::InvokeCapability { name, origin } => format!("capability `{name}` from {origin}"),
            Self::MountRoutes { name, prefix } => format!("routes of `{name}` at `{prefix}`"),
        }
    }

    /// Returns the capability the action concerns.
    #[must_use]
    pub fn capability(&self) -> &str {
        match self {
            Self::InvokeCapability { name, .. } | Self::MountRoutes { name, .. } => name,
        }
    }
}

/// Context supplied to a policy evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyContext {
    metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,
}

impl PolicyContext {
    /// Inserts metadata into the request context.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Adds metadata to the context and returns the updated instance.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert_metadata(key, value);
        self
    }

    /// Adds a tag to the context, ignoring empty or whitespace-only strings.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !tag.trim().is_empty() {
            self.tags.insert(tag);
        }
    }

    /// Extends the context with multiple tags.
    pub fn extend_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self.add_tag(tag);
        }
    }

    /// Returns the metadata associated with the context.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns the tags associated with the context.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }
}

/// Full request sent to the policy engine for evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    caller: Option<CallerId>,
    action: PolicyAction,
    #[serde(default)]
    context: PolicyContext,
}

impl PolicyRequest {
    /// Creates a policy request for the specified caller and action.
    #[must_use]
    pub fn new(caller: Option<CallerId>, action: PolicyAction) -> Self {
        Self {
            caller,
            action,
            context: PolicyContext::default(),
        }
    }

    /// Creates a request describing a capability invocation.
    #[must_use]
    pub fn invocation(caller: Option<CallerId>, name: impl Into<String>, origin: Origin) -> Self {
        Self::new(
            caller,
            PolicyAction::InvokeCapability {
                name: name.into(),
                origin,
            },
        )
    }

    /// Returns the caller identity, when known.
    #[must_use]
    pub fn caller(&self) -> Option<CallerId> {
        self.caller
    }

    /// Returns the targeted policy action.
    #[must_use]
    pub fn action(&self) -> &PolicyAction {
        &self.action
    }

    /// Returns the context attached to the request.
    #[must_use]
    pub fn context(&self) -> &PolicyContext {
        &self.context
    }

    /// Returns a mutable reference to the context.
    pub fn context_mut(&mut self) -> &mut PolicyContext {
        &mut self.context
    }

    /// Adds metadata to the request context.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert_metadata(key, value);
        self
    }

    /// Adds a tag to the request context.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.context.add_tag(tag);
        self
    }

    /// Adds multiple tags to the context.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context.extend_tags(tags);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_context_manages_tags() {
        let mut ctx = PolicyContext::default();
        ctx.add_tag("alpha");
        ctx.add_tag("alpha");
        ctx.extend_tags(["beta", " ", "gamma"]);

        assert_eq!(ctx.tags().len(), 3);
        assert!(ctx.tags().contains("alpha"));
        assert!(ctx.tags().contains("beta"));
        assert!(ctx.tags().contains("gamma"));
    }

    #[test]
    fn invocation_request_carries_metadata() {
        let caller = CallerId::random();
        let request = PolicyRequest::invocation(Some(caller), "echo", Origin::Ui)
            .with_metadata("tenant", Value::from("acme"))
            .with_tag("tier:free");

        assert_eq!(request.caller(), Some(caller));
        assert_eq!(request.action().capability(), "echo");
        assert_eq!(request.action().label(), "capability `echo` from ui");
        assert_eq!(request.context().metadata().len(), 1);
        assert!(request.context().tags().contains("tier:free"));
    }

    #[test]
    fn action_serialises_with_kind_tag() {
        let action = PolicyAction::InvokeCapability {
            name: "echo".into(),
            origin: Origin::Ai,
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["kind"], "invoke_capability");
        assert_eq!(value["origin"], "ai");
    }
}
