//! Capability implementations and their optional UI hooks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::InvocationContext;
use crate::descriptor::CapabilityDescriptor;
use crate::error::ToolResult;
use crate::sink::StreamSink;
use crate::validate::ValidatedParams;

/// Front-end fragment a UI-enabled capability contributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendComponent {
    /// Named slot the fragment is placed in, e.g. `toolbar`.
    pub placement: String,
    /// Markup rendered by the host page.
    pub html: String,
    /// Optional script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,
    /// Optional stylesheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

impl FrontendComponent {
    /// Creates a component for `placement` with the supplied markup.
    #[must_use]
    pub fn new(placement: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            placement: placement.into(),
            html: html.into(),
            js: None,
            css: None,
        }
    }

    /// Attaches a script.
    #[must_use]
    pub fn with_js(mut self, js: impl Into<String>) -> Self {
        self.js = Some(js.into());
        self
    }

    /// Attaches a stylesheet.
    #[must_use]
    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }
}

/// A server-side capability bound one-to-one with its descriptor.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Returns the immutable descriptor.
    fn descriptor(&self) -> &CapabilityDescriptor;

    /// Runs the capability with validated parameters.
    ///
    /// Intermediate output goes to `sink`; the returned value becomes the
    /// `result` of the success envelope.
    async fn execute(
        &self,
        params: ValidatedParams,
        ctx: &InvocationContext,
        sink: &StreamSink,
    ) -> ToolResult<Value>;

    /// Front-end fragment shown by the UI, if any.
    fn frontend_component(&self) -> Option<FrontendComponent> {
        None
    }

    /// Dedicated HTTP sub-routes, mounted under the descriptor's route prefix.
    fn routes(&self) -> Option<axum::Router> {
        None
    }
}

/// Shared, dynamically dispatched capability.
pub type SharedCapability = Arc<dyn Capability>;

/// Capability backed by an async closure.
pub struct FnCapability<F> {
    descriptor: CapabilityDescriptor,
    handler: F,
    component: Option<FrontendComponent>,
}

impl<F> FnCapability<F> {
    /// Attaches a front-end fragment.
    #[must_use]
    pub fn with_component(mut self, component: FrontendComponent) -> Self {
        self.component = Some(component);
        self
    }
}

impl<F> fmt::Debug for FnCapability<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCapability")
            .field("name", &self.descriptor.name().as_str())
            .finish_non_exhaustive()
    }
}

/// Wraps an async closure as a [`Capability`].
///
/// The closure receives owned copies of the context and sink so it can move
/// them into spawned work.
#[must_use]
pub fn capability_fn<F, Fut>(descriptor: CapabilityDescriptor, handler: F) -> FnCapability<F>
where
    F: Fn(ValidatedParams, InvocationContext, StreamSink) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    FnCapability {
        descriptor,
        handler,
        component: None,
    }
}

#[async_trait]
impl<F, Fut> Capability for FnCapability<F>
where
    F: Fn(ValidatedParams, InvocationContext, StreamSink) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(
        &self,
        params: ValidatedParams,
        ctx: &InvocationContext,
        sink: &StreamSink,
    ) -> ToolResult<Value> {
        (self.handler)(params, ctx.clone(), sink.clone()).await
    }

    fn frontend_component(&self) -> Option<FrontendComponent> {
        self.component.clone()
    }
}
