//! Immutable metadata describing one capability.

use std::fmt::{self, Display, Formatter};

use forge_primitives::{AccessLevel, CapabilityName};
use serde::{Deserialize, Serialize};

use crate::error::{ToolError, ToolResult};
use crate::schema::ParameterSchema;

/// How a UI-enabled capability is rendered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderKind {
    /// Labelled button.
    #[default]
    Button,
    /// Icon-only button.
    IconButton,
    /// Plain link.
    Link,
}

/// Rendering metadata, opaque to the engine and consumed by the UI exporter.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct UiHint {
    /// Button or link label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Icon reference or inline SVG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Render style.
    #[serde(default)]
    pub render: RenderKind,
    /// Named placement slot, e.g. `toolbar`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
}

impl UiHint {
    /// Creates a button hint with the supplied label.
    #[must_use]
    pub fn button(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Sets the icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Sets the render style.
    #[must_use]
    pub fn with_render(mut self, render: RenderKind) -> Self {
        self.render = render;
        self
    }

    /// Sets the placement slot.
    #[must_use]
    pub fn with_placement(mut self, placement: impl Into<String>) -> Self {
        self.placement = Some(placement.into());
        self
    }
}

/// Non-fatal problem found while registering a descriptor.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum RegistrationWarning {
    /// Dedicated routes were claimed without a usable route prefix.
    MissingRoutePrefix {
        /// Capability name.
        name: String,
    },
}

impl Display for RegistrationWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoutePrefix { name } => write!(
                f,
                "capability `{name}` claims dedicated routes but declares no route prefix"
            ),
        }
    }
}

/// Metadata describing one capability.
#[derive(Clone, Debug, PartialEq)]
pub struct CapabilityDescriptor {
    name: CapabilityName,
    description: String,
    parameters: Option<ParameterSchema>,
    access_level: AccessLevel,
    dedicated_routes: bool,
    route_prefix: Option<String>,
    ui_hint: Option<UiHint>,
}

impl CapabilityDescriptor {
    /// Starts building a descriptor for the supplied name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CapabilityDescriptorBuilder {
        CapabilityDescriptorBuilder {
            name: name.into(),
            description: None,
            parameters: None,
            access_level: AccessLevel::default(),
            dedicated_routes: false,
            route_prefix: None,
            ui_hint: None,
        }
    }

    /// Returns the unique capability name.
    #[must_use]
    pub fn name(&self) -> &CapabilityName {
        &self.name
    }

    /// Returns the description shown to the AI model.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parameter schema, if the capability takes arguments.
    #[must_use]
    pub fn parameters(&self) -> Option<&ParameterSchema> {
        self.parameters.as_ref()
    }

    /// Returns the declared access level.
    #[must_use]
    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    /// Returns `true` when the AI model may invoke the capability.
    #[must_use]
    pub fn is_ai_enabled(&self) -> bool {
        self.access_level.is_ai_enabled()
    }

    /// Returns `true` when the UI may invoke the capability.
    #[must_use]
    pub fn is_ui_enabled(&self) -> bool {
        self.access_level.is_ui_enabled()
    }

    /// Returns `true` when the capability claims dedicated sub-routes.
    #[must_use]
    pub fn has_dedicated_routes(&self) -> bool {
        self.dedicated_routes
    }

    /// Returns the normalised route prefix (always starting with `/`).
    #[must_use]
    pub fn route_prefix(&self) -> Option<&str> {
        self.route_prefix.as_deref()
    }

    /// Returns the UI rendering hint.
    #[must_use]
    pub fn ui_hint(&self) -> Option<&UiHint> {
        self.ui_hint.as_ref()
    }

    /// Lists the non-fatal problems a registry should report for this descriptor.
    #[must_use]
    pub fn registration_warnings(&self) -> Vec<RegistrationWarning> {
        let mut warnings = Vec::new();
        if self.dedicated_routes && self.route_prefix.is_none() {
            warnings.push(RegistrationWarning::MissingRoutePrefix {
                name: self.name.to_string(),
            });
        }
        warnings
    }
}

/// Builder for [`CapabilityDescriptor`].
#[derive(Debug)]
pub struct CapabilityDescriptorBuilder {
    name: String,
    description: Option<String>,
    parameters: Option<ParameterSchema>,
    access_level: AccessLevel,
    dedicated_routes: bool,
    route_prefix: Option<String>,
    ui_hint: Option<UiHint>,
}

impl CapabilityDescriptorBuilder {
    /// Sets the description shown to the AI model.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares the parameter schema.
    #[must_use]
    pub fn parameters(mut self, schema: ParameterSchema) -> Self {
        self.parameters = Some(schema);
        self
    }

    /// Sets the access level. Defaults to [`AccessLevel::AiOnly`].
    #[must_use]
    pub fn access_level(mut self, access_level: AccessLevel) -> Self {
        self.access_level = access_level;
        self
    }

    /// Claims dedicated sub-routes mounted under `prefix`.
    #[must_use]
    pub fn dedicated_routes(mut self, prefix: impl Into<String>) -> Self {
        self.dedicated_routes = true;
        self.route_prefix = Some(prefix.into());
        self
    }

    /// Claims dedicated sub-routes without declaring where they mount.
    ///
    /// The descriptor still registers, but a warning is reported and no
    /// routes are mounted.
    #[must_use]
    pub fn dedicated_routes_unmounted(mut self) -> Self {
        self.dedicated_routes = true;
        self.route_prefix = None;
        self
    }

    /// Attaches a UI rendering hint.
    #[must_use]
    pub fn ui_hint(mut self, hint: UiHint) -> Self {
        self.ui_hint = Some(hint);
        self
    }

    /// Finalises the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDescriptor`] when the name is invalid or the
    /// description is missing.
    pub fn build(self) -> ToolResult<CapabilityDescriptor> {
        let name = CapabilityName::new(self.name)
            .map_err(|err| ToolError::invalid_descriptor(err.to_string()))?;

        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                ToolError::invalid_descriptor(format!("capability `{name}` needs a description"))
            })?;

        Ok(CapabilityDescriptor {
            name,
            description,
            parameters: self.parameters,
            access_level: self.access_level,
            dedicated_routes: self.dedicated_routes,
            route_prefix: self.route_prefix.as_deref().and_then(normalize_prefix),
            ui_hint: self.ui_hint,
        })
    }
}

fn normalize_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_owned())
    } else {
        Some(format!("/{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_descriptor_with_defaults() {
        let descriptor = CapabilityDescriptor::builder("echo")
            .description("Echo the payload")
            .build()
            .expect("valid");

        assert_eq!(descriptor.name().as_str(), "echo");
        assert_eq!(descriptor.access_level(), AccessLevel::AiOnly);
        assert!(descriptor.parameters().is_none());
        assert!(descriptor.registration_warnings().is_empty());
    }

    #[test]
    fn rejects_bad_name_and_missing_description() {
        let err = CapabilityDescriptor::builder("Bad Name")
            .description("x")
            .build()
            .expect_err("invalid name");
        assert!(matches!(err, ToolError::InvalidDescriptor { .. }));

        let err = CapabilityDescriptor::builder("echo")
            .description("   ")
            .build()
            .expect_err("missing description");
        assert!(matches!(err, ToolError::InvalidDescriptor { .. }));
    }

    #[test]
    fn normalises_route_prefix() {
        let descriptor = CapabilityDescriptor::builder("reports")
            .description("Report pages")
            .access_level(AccessLevel::UiOnly)
            .dedicated_routes("tools/reports/")
            .build()
            .unwrap();
        assert_eq!(descriptor.route_prefix(), Some("/tools/reports"));
    }

    #[test]
    fn blank_route_prefix_is_a_warning() {
        for descriptor in [
            CapabilityDescriptor::builder("pages")
                .description("Pages")
                .dedicated_routes(" / ")
                .build()
                .unwrap(),
            CapabilityDescriptor::builder("pages")
                .description("Pages")
                .dedicated_routes_unmounted()
                .build()
                .unwrap(),
        ] {
            assert!(descriptor.has_dedicated_routes());
            assert!(descriptor.route_prefix().is_none());
            assert_eq!(
                descriptor.registration_warnings(),
                [RegistrationWarning::MissingRoutePrefix {
                    name: "pages".into()
                }]
            );
        }
    }
}
