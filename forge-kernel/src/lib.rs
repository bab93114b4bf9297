//! Execution side of the toolforge runtime.
//!
//! The [`ExecutionEngine`] resolves capabilities from a registry snapshot,
//! enforces access levels and operator policy, validates arguments and runs
//! the implementation on a bounded [`TaskScheduler`]. Around it sit the
//! exporters for the AI model ([`declarations`]) and the UI ([`surface`]),
//! plus an MXP channel that carries UI invocations ([`ui_channel`]).

#![warn(missing_docs, clippy::pedantic)]

pub mod declarations;
mod engine;
mod observer;
mod scheduler;
pub mod surface;
pub mod ui_channel;

pub use declarations::{
    FunctionDeclaration, declarations, function_response, gemini_tools, openai_tools,
};
pub use engine::{DEFAULT_STREAM_CAPACITY, ExecutionEngine, InvocationRequest};
pub use observer::{
    CollectingObserver, CompositeObserver, InvocationObserver, InvocationRecord, TracingObserver,
};
pub use scheduler::{
    DEFAULT_MAX_CONCURRENCY, SchedulerConfig, SchedulerError, SchedulerResult, TaskScheduler,
};
pub use surface::{MountedRoutes, RefusedRoutes, RouteMount, UiComponent, mount_routes, ui_components};
pub use ui_channel::{HandlerError, HandlerResult, MessageOutbound, UiChannel};
