//! Startup wiring: configuration, discovery and the execution engine.

use std::sync::Arc;

use forge_config::ForgeConfig;
use forge_kernel::{
    ExecutionEngine, FunctionDeclaration, InvocationObserver, RouteMount, SchedulerConfig,
    TaskScheduler, TracingObserver, UiComponent,
};
use forge_policy::PolicyEngine;
use forge_telemetry::Readiness;
use forge_tools::{CapabilitySource, DiscoveryLoader, DiscoveryReport, SourceFilter};
use tracing::info;

/// Assembles a [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: ForgeConfig,
    sources: Vec<CapabilitySource>,
    plugins: bool,
    policy: Option<Arc<dyn PolicyEngine>>,
    observer: Option<Arc<dyn InvocationObserver>>,
}

impl RuntimeBuilder {
    /// Starts from `config`, loading the plugin table.
    #[must_use]
    pub fn new(config: ForgeConfig) -> Self {
        Self {
            config,
            plugins: true,
            ..Self::default()
        }
    }

    /// Adds an explicit capability source.
    #[must_use]
    pub fn source(mut self, source: CapabilitySource) -> Self {
        self.sources.push(source);
        self
    }

    /// Loads only explicit sources.
    #[must_use]
    pub fn without_plugins(mut self) -> Self {
        self.plugins = false;
        self
    }

    /// Installs an operator policy.
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn PolicyEngine>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Replaces the default tracing observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn InvocationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs discovery and builds the engine.
    #[must_use]
    pub fn build(self) -> Runtime {
        #[cfg(feature = "capabilities")]
        let _ = forge_capabilities::builtin_sources();

        let loader = if self.plugins {
            DiscoveryLoader::with_plugins()
        } else {
            DiscoveryLoader::new()
        };
        let loader = loader.sources(self.sources).filter(SourceFilter::new(
            self.config.discovery.allow.iter().cloned(),
            self.config.discovery.deny.iter().cloned(),
        ));
        let (registry, report) = loader.load();

        let scheduler = TaskScheduler::new(SchedulerConfig::new(
            self.config.scheduler.max_concurrency,
        ));
        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(TracingObserver) as Arc<dyn InvocationObserver>);
        let mut engine = ExecutionEngine::new(registry.into_shared())
            .with_scheduler(scheduler)
            .with_observer(observer);
        if let Some(timeout) = self.config.invocation.timeout() {
            engine = engine.with_default_timeout(timeout);
        }
        if let Some(policy) = &self.policy {
            engine.set_policy(Arc::clone(policy));
        }

        info!(
            registered = report.registered,
            failures = report.failures.len(),
            "runtime ready"
        );
        Runtime {
            config: self.config,
            loader,
            engine,
            policy: self.policy,
            report,
        }
    }
}

/// A discovered registry and the engine serving it.
pub struct Runtime {
    config: ForgeConfig,
    loader: DiscoveryLoader,
    engine: ExecutionEngine,
    policy: Option<Arc<dyn PolicyEngine>>,
    report: DiscoveryReport,
}

impl Runtime {
    /// Builds a runtime over the plugin table with default wiring.
    #[must_use]
    pub fn bootstrap(config: ForgeConfig) -> Self {
        RuntimeBuilder::new(config).build()
    }

    /// Returns a builder for custom wiring.
    #[must_use]
    pub fn builder(config: ForgeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    /// Returns the configuration the runtime was built from.
    #[must_use]
    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Returns the execution engine.
    #[must_use]
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Returns the report of the latest discovery pass.
    #[must_use]
    pub fn report(&self) -> &DiscoveryReport {
        &self.report
    }

    /// Summarises the latest discovery pass.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        Readiness::from_report(&self.report)
    }

    /// Lists the declarations for the next model turn.
    #[must_use]
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        forge_kernel::declarations(self.engine.registry())
    }

    /// Lists the UI components.
    #[must_use]
    pub fn ui_components(&self) -> Vec<UiComponent> {
        forge_kernel::ui_components(self.engine.registry())
    }

    /// Mounts the dedicated route groups of UI-enabled capabilities.
    pub async fn mount_routes(&self) -> RouteMount {
        forge_kernel::mount_routes(self.engine.registry(), self.policy.as_deref()).await
    }

    /// Runs discovery again and swaps in the new registry.
    ///
    /// Invocations already running finish on the previous snapshot.
    pub fn rediscover(&mut self) -> &DiscoveryReport {
        let (registry, report) = self.loader.load();
        self.engine.replace_registry(registry.into_shared());
        self.report = report;
        &self.report
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("engine", &self.engine)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}
