use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forge_primitives::AccessLevel;
use forge_tools::{
    Capability, CapabilityDescriptor, CapabilitySource, FrontendComponent, InvocationContext,
    SharedCapability, StreamSink, ToolError, ToolResult, UiHint, ValidatedParams,
};
use serde_json::{Value, json};
use tracing::debug;

/// Name of the system status capability.
pub const SYSTEM_STATUS_CHECK: &str = "system_status_check";

const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(250);

const TOOLBAR_BUTTON: &str = r#"<button data-capability="system_status_check" class="toolbar-button">
    <span class="icon icon-cpu"></span>
    <span>System status</span>
</button>"#;

/// Reports the host operating system and runtime, streaming each probe.
///
/// Available to both the model and the UI, where it renders as a toolbar
/// button.
#[derive(Debug, Clone)]
pub struct SystemStatus {
    descriptor: CapabilityDescriptor,
    step_delay: Duration,
}

impl SystemStatus {
    /// Creates the capability with the default pacing between probes.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDescriptor`] if the descriptor is rejected.
    pub fn new() -> ToolResult<Self> {
        let descriptor = CapabilityDescriptor::builder(SYSTEM_STATUS_CHECK)
            .description(
                "Gets the current status of the server system, like the operating system and runtime version.",
            )
            .access_level(AccessLevel::Both)
            .ui_hint(
                UiHint::button("System status")
                    .with_icon("cpu")
                    .with_placement("toolbar"),
            )
            .build()?;
        Ok(Self {
            descriptor,
            step_delay: DEFAULT_STEP_DELAY,
        })
    }

    /// Overrides the pause between probes.
    #[must_use]
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    async fn pause(&self, ctx: &InvocationContext) -> ToolResult<()> {
        tokio::select! {
            () = ctx.cancellation().cancelled() => Err(ToolError::Cancelled),
            () = tokio::time::sleep(self.step_delay) => Ok(()),
        }
    }
}

#[async_trait]
impl Capability for SystemStatus {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(
        &self,
        _params: ValidatedParams,
        ctx: &InvocationContext,
        sink: &StreamSink,
    ) -> ToolResult<Value> {
        sink.emit("Checking operating system...").await?;
        self.pause(ctx).await?;
        let os_info = format!(
            "Operating System: {} ({}, {})",
            std::env::consts::OS,
            std::env::consts::FAMILY,
            std::env::consts::ARCH
        );
        sink.emit(format!("OK: {os_info}")).await?;

        self.pause(ctx).await?;

        sink.emit("Checking runtime version...").await?;
        self.pause(ctx).await?;
        let runtime_version = format!(
            "Runtime: {} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        sink.emit(format!("OK: {runtime_version}")).await?;

        debug!(invocation = %ctx.id(), "system status collected");
        Ok(json!({
            "os_info": os_info,
            "runtime_version": runtime_version,
            "status": "OK",
        }))
    }

    fn frontend_component(&self) -> Option<FrontendComponent> {
        Some(FrontendComponent::new("toolbar", TOOLBAR_BUTTON))
    }
}

pub(crate) fn construct() -> ToolResult<SharedCapability> {
    Ok(Arc::new(SystemStatus::new()?))
}

inventory::submit! {
    CapabilitySource::new(SYSTEM_STATUS_CHECK, construct)
}
