//! Capability descriptors, input validation and the capability registry.
//!
//! Capabilities describe themselves with a [`CapabilityDescriptor`], accept
//! arguments checked against a [`ParameterSchema`], and report progress
//! through a [`StreamSink`]. The [`DiscoveryLoader`] builds an immutable
//! [`CapabilityRegistry`] from explicit and link-time registered sources.

#![warn(missing_docs, clippy::pedantic)]

pub mod capability;
pub mod context;
pub mod descriptor;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod schema;
pub mod sink;
pub mod validate;

pub use capability::{Capability, FnCapability, FrontendComponent, SharedCapability, capability_fn};
pub use context::{InvocationContext, Resources};
pub use descriptor::{
    CapabilityDescriptor, CapabilityDescriptorBuilder, RegistrationWarning, RenderKind, UiHint,
};
pub use discovery::{
    CapabilitySource, DiscoveryError, DiscoveryFailure, DiscoveryLoader, DiscoveryReport,
    SkipReason, SkippedSource, SourceFilter,
};
pub use envelope::ExecutionEnvelope;
pub use error::{ErrorKind, InvocationError, ToolError, ToolResult};
pub use registry::{
    CapabilityHandle, CapabilityRegistry, Registration, RegistrationOutcome, RegistryBuilder,
};
pub use schema::{Constraints, FieldSchema, FieldType, ParameterSchema};
pub use sink::{InvocationEvent, InvocationStream, StreamSink};
pub use validate::{FieldIssue, IssueKind, ValidatedParams, ValidationError, validate_arguments};

pub use inventory;
