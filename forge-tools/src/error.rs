//! Errors produced by capability registration and invocation.

use forge_primitives::{AccessLevel, Origin};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validate::ValidationError;

/// Result alias for capability implementations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors raised while defining or executing a capability.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Descriptor metadata failed validation.
    #[error("invalid capability descriptor: {reason}")]
    InvalidDescriptor {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Validated parameters could not be decoded into the capability's record.
    #[error("failed to decode parameters: {source}")]
    Decode {
        /// Source decoding error.
        #[from]
        source: serde_json::Error,
    },

    /// Capability execution failed.
    #[error("{reason}")]
    Execution {
        /// Human-readable error returned by the implementation.
        reason: String,
    },

    /// The invocation was cancelled or its consumer went away.
    #[error("invocation cancelled")]
    Cancelled,
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Creates a descriptor error from the supplied reason.
    #[must_use]
    pub fn invalid_descriptor(reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            reason: reason.into(),
        }
    }
}

/// Machine-readable category carried by error envelopes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No capability is registered under the requested name.
    UnknownCapability,
    /// The invocation origin is not permitted by the access level or policy.
    AccessDenied,
    /// Arguments failed schema validation.
    ValidationFailure,
    /// The implementation failed while running.
    ExecutionFailure,
    /// The caller cancelled the invocation or disconnected.
    Cancelled,
    /// The caller-supplied deadline elapsed.
    TimedOut,
}

/// Invocation-time failures. Each one is converted into an error envelope at
/// the engine boundary and never reaches the caller as a fault.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// No capability is registered under the requested name.
    #[error("unknown capability `{name}`")]
    UnknownCapability {
        /// Requested name.
        name: String,
    },

    /// The origin is not permitted to invoke the capability.
    #[error("capability `{name}` cannot be invoked by {origin} callers (access level {access_level})")]
    AccessDenied {
        /// Capability name.
        name: String,
        /// Origin of the rejected call.
        origin: Origin,
        /// Declared access level.
        access_level: AccessLevel,
    },

    /// An operator policy rejected the invocation.
    #[error("policy denied capability `{name}`: {reason}")]
    PolicyDenied {
        /// Capability name.
        name: String,
        /// Reason reported by the policy engine.
        reason: String,
    },

    /// Arguments failed schema validation.
    #[error("{source}")]
    Validation {
        /// Capability name.
        name: String,
        /// Enumerated field failures.
        #[source]
        source: ValidationError,
    },

    /// The implementation failed while running.
    #[error("{reason}")]
    Execution {
        /// Capability name.
        name: String,
        /// Description of the failure.
        reason: String,
    },

    /// The caller cancelled the invocation or disconnected.
    #[error("invocation of `{name}` was cancelled")]
    Cancelled {
        /// Capability name.
        name: String,
    },

    /// The caller-supplied deadline elapsed.
    #[error("invocation of `{name}` timed out")]
    TimedOut {
        /// Capability name.
        name: String,
    },
}

impl InvocationError {
    /// Returns the envelope category for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownCapability { .. } => ErrorKind::UnknownCapability,
            Self::AccessDenied { .. } | Self::PolicyDenied { .. } => ErrorKind::AccessDenied,
            Self::Validation { .. } => ErrorKind::ValidationFailure,
            Self::Execution { .. } => ErrorKind::ExecutionFailure,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
        }
    }

    /// Returns the capability name the failure relates to.
    #[must_use]
    pub fn capability(&self) -> &str {
        match self {
            Self::UnknownCapability { name }
            | Self::AccessDenied { name, .. }
            | Self::PolicyDenied { name, .. }
            | Self::Validation { name, .. }
            | Self::Execution { name, .. }
            | Self::Cancelled { name }
            | Self::TimedOut { name } => name,
        }
    }
}
