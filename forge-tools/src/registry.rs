//! Name-keyed capability registry.
//!
//! A [`RegistryBuilder`] is the only writer. Once built, a
//! [`CapabilityRegistry`] is an immutable snapshot that can be shared across
//! tasks without synchronisation; rebuilding means building a new snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use forge_primitives::{CapabilityName, Origin};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::{Capability, SharedCapability};
use crate::descriptor::{CapabilityDescriptor, RegistrationWarning};

/// What happened to a single registration attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    /// New entry inserted.
    Registered,
    /// An entry with the same name was overwritten.
    Replaced,
    /// The descriptor is disabled and was not inserted.
    SkippedDisabled,
}

/// Result of [`RegistryBuilder::register`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Capability name.
    pub name: CapabilityName,
    /// Whether the entry was inserted.
    pub outcome: RegistrationOutcome,
    /// Non-fatal problems found while registering.
    pub warnings: Vec<RegistrationWarning>,
}

impl Registration {
    /// Returns `true` when the capability is now active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self.outcome, RegistrationOutcome::SkippedDisabled)
    }
}

/// Handle to a registered capability.
#[derive(Clone)]
pub struct CapabilityHandle {
    capability: SharedCapability,
}

impl CapabilityHandle {
    /// Returns the descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &CapabilityDescriptor {
        self.capability.descriptor()
    }

    /// Returns the capability name.
    #[must_use]
    pub fn name(&self) -> &CapabilityName {
        self.descriptor().name()
    }

    /// Returns the shared implementation.
    #[must_use]
    pub fn capability(&self) -> &SharedCapability {
        &self.capability
    }

    /// Returns `true` when `origin` may invoke this capability.
    #[must_use]
    pub fn permits(&self, origin: Origin) -> bool {
        self.descriptor().access_level().permits(origin)
    }
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("name", &self.name().as_str())
            .field("access_level", &self.descriptor().access_level())
            .finish()
    }
}

/// Collects capabilities before freezing them into a [`CapabilityRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<CapabilityName, CapabilityHandle>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability. Disabled capabilities are skipped and a later
    /// registration with the same name replaces the earlier one.
    pub fn register<C>(&mut self, capability: C) -> Registration
    where
        C: Capability + 'static,
    {
        self.register_shared(Arc::new(capability))
    }

    /// Registers an already shared capability.
    pub fn register_shared(&mut self, capability: SharedCapability) -> Registration {
        let descriptor = capability.descriptor();
        let name = descriptor.name().clone();

        if descriptor.access_level().is_disabled() {
            debug!(capability = %name, "capability disabled; not registering");
            return Registration {
                name,
                outcome: RegistrationOutcome::SkippedDisabled,
                warnings: Vec::new(),
            };
        }

        let warnings = descriptor.registration_warnings();
        for warning in &warnings {
            warn!(capability = %name, "{warning}");
        }

        let outcome = match self
            .entries
            .insert(name.clone(), CapabilityHandle { capability })
        {
            Some(_) => {
                warn!(capability = %name, "replacing previously registered capability");
                RegistrationOutcome::Replaced
            }
            None => {
                debug!(capability = %name, "capability registered");
                RegistrationOutcome::Registered
            }
        };

        Registration {
            name,
            outcome,
            warnings,
        }
    }

    /// Returns the number of active entries so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freezes the builder into an immutable registry.
    #[must_use]
    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            entries: self.entries,
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("registered", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Immutable snapshot of the active capabilities, ordered by name.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: BTreeMap<CapabilityName, CapabilityHandle>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts a new builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks up a capability by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CapabilityHandle> {
        self.entries.get(name)
    }

    /// Returns `true` when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityHandle> {
        self.entries.values()
    }

    /// Iterates over the entries the AI model may invoke.
    pub fn ai_enabled(&self) -> impl Iterator<Item = &CapabilityHandle> {
        self.iter().filter(|h| h.descriptor().is_ai_enabled())
    }

    /// Iterates over the entries the UI may invoke.
    pub fn ui_enabled(&self) -> impl Iterator<Item = &CapabilityHandle> {
        self.iter().filter(|h| h.descriptor().is_ui_enabled())
    }

    /// Returns the registered names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(CapabilityName::as_str).collect()
    }

    /// Wraps the registry for sharing.
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("registered", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use forge_primitives::AccessLevel;
    use serde_json::{Value, json};

    use super::*;
    use crate::capability::capability_fn;
    use crate::context::InvocationContext;
    use crate::error::ToolResult;
    use crate::sink::StreamSink;
    use crate::validate::ValidatedParams;

    fn fixed(name: &str, access: AccessLevel, value: Value) -> impl Capability + 'static {
        let descriptor = CapabilityDescriptor::builder(name)
            .description("fixed value")
            .access_level(access)
            .build()
            .unwrap();
        capability_fn(
            descriptor,
            move |_params: ValidatedParams, _ctx: InvocationContext, _sink: StreamSink| {
                let value = value.clone();
                async move { ToolResult::Ok(value) }
            },
        )
    }

    #[test]
    fn disabled_capabilities_never_register() {
        let mut builder = RegistryBuilder::new();
        let registration = builder.register(fixed("off", AccessLevel::Disabled, json!(1)));
        assert_eq!(registration.outcome, RegistrationOutcome::SkippedDisabled);
        assert!(!registration.is_active());

        let registry = builder.build();
        assert!(registry.is_empty());
        assert!(registry.get("off").is_none());
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut builder = RegistryBuilder::new();
        let first = builder.register(fixed("dup", AccessLevel::AiOnly, json!("first")));
        let second = builder.register(fixed("dup", AccessLevel::Both, json!("second")));
        assert_eq!(first.outcome, RegistrationOutcome::Registered);
        assert_eq!(second.outcome, RegistrationOutcome::Replaced);

        let registry = builder.build();
        assert_eq!(registry.len(), 1);
        let handle = registry.get("dup").unwrap();
        assert_eq!(handle.descriptor().access_level(), AccessLevel::Both);

        let result = handle
            .capability()
            .execute(
                ValidatedParams::empty(),
                &InvocationContext::ai(),
                &StreamSink::discard(),
            )
            .await
            .unwrap();
        assert_eq!(result, json!("second"));
    }

    #[test]
    fn filters_by_origin_in_name_order() {
        let mut builder = RegistryBuilder::new();
        builder.register(fixed("zeta", AccessLevel::Both, Value::Null));
        builder.register(fixed("alpha", AccessLevel::UiOnly, Value::Null));
        builder.register(fixed("mid", AccessLevel::AiOnly, Value::Null));
        let registry = builder.build();

        assert_eq!(registry.names(), ["alpha", "mid", "zeta"]);
        let ai: Vec<_> = registry.ai_enabled().map(|h| h.name().as_str()).collect();
        let ui: Vec<_> = registry.ui_enabled().map(|h| h.name().as_str()).collect();
        assert_eq!(ai, ["mid", "zeta"]);
        assert_eq!(ui, ["alpha", "zeta"]);
        assert!(!registry.get("alpha").unwrap().permits(Origin::Ai));
    }

    #[test]
    fn missing_route_prefix_is_reported() {
        let descriptor = CapabilityDescriptor::builder("pages")
            .description("pages")
            .access_level(AccessLevel::UiOnly)
            .dedicated_routes_unmounted()
            .build()
            .unwrap();
        let mut builder = RegistryBuilder::new();
        let registration = builder.register(capability_fn(
            descriptor,
            |_p: ValidatedParams, _c: InvocationContext, _s: StreamSink| async {
                ToolResult::Ok(Value::Null)
            },
        ));

        assert_eq!(registration.outcome, RegistrationOutcome::Registered);
        assert_eq!(registration.warnings.len(), 1);
        assert!(builder.build().contains("pages"));
    }
}
