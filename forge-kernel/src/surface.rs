//! UI components and dedicated route groups of UI-enabled capabilities.

use std::collections::HashSet;

use axum::Router;
use forge_policy::{PolicyAction, PolicyEngine, PolicyRequest};
use forge_primitives::AccessLevel;
use forge_tools::{CapabilityRegistry, FrontendComponent, RenderKind};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Everything the UI needs to render one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiComponent {
    /// Capability name, used when the UI invokes it.
    pub name: String,
    /// Description shown as a tooltip.
    pub description: String,
    /// Declared access level.
    pub access_level: AccessLevel,
    /// Button or link label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Icon reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Render style.
    pub render: RenderKind,
    /// Placement slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    /// Front-end fragment supplied by the implementation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<FrontendComponent>,
    /// Mount prefix of the capability's dedicated routes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_prefix: Option<String>,
}

/// Lists a UI component for every UI-enabled capability that supplies a
/// frontend fragment or carries a UI hint.
#[must_use]
pub fn ui_components(registry: &CapabilityRegistry) -> Vec<UiComponent> {
    registry
        .ui_enabled()
        .filter_map(|handle| {
            let descriptor = handle.descriptor();
            let component = handle.capability().frontend_component();
            let hint = descriptor.ui_hint();
            if component.is_none() && hint.is_none() {
                return None;
            }

            let hint = hint.cloned().unwrap_or_default();
            Some(UiComponent {
                name: descriptor.name().to_string(),
                description: descriptor.description().to_owned(),
                access_level: descriptor.access_level(),
                label: hint.label,
                icon: hint.icon,
                render: hint.render,
                placement: hint
                    .placement
                    .or_else(|| component.as_ref().map(|c| c.placement.clone())),
                component,
                route_prefix: descriptor.route_prefix().map(str::to_owned),
            })
        })
        .collect()
}

/// A route group that was nested into the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedRoutes {
    /// Capability owning the routes.
    pub name: String,
    /// Prefix the routes were nested under.
    pub prefix: String,
}

/// A route group that was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefusedRoutes {
    /// Capability owning the routes.
    pub name: String,
    /// Why the group was not mounted.
    pub reason: String,
}

/// Router holding every dedicated route group, plus a record of what was mounted.
#[derive(Debug)]
pub struct RouteMount {
    /// Router with every mounted group nested under its prefix.
    pub router: Router,
    /// Groups that were mounted.
    pub mounted: Vec<MountedRoutes>,
    /// Groups that were left out.
    pub refused: Vec<RefusedRoutes>,
}

/// Nests the dedicated routes of every UI-enabled capability under its
/// prefix. Intended to run once, after discovery.
///
/// A capability that claims routes but has no prefix, returns no router,
/// reuses a prefix already mounted, or is refused by `policy` is left out.
pub async fn mount_routes(
    registry: &CapabilityRegistry,
    policy: Option<&dyn PolicyEngine>,
) -> RouteMount {
    let mut router = Router::new();
    let mut mounted = Vec::new();
    let mut refused = Vec::new();
    let mut prefixes = HashSet::new();

    for handle in registry.ui_enabled() {
        let descriptor = handle.descriptor();
        if !descriptor.has_dedicated_routes() {
            continue;
        }
        let name = descriptor.name().to_string();

        let Some(prefix) = descriptor.route_prefix() else {
            warn!(capability = %name, "dedicated routes claimed without a prefix; not mounting");
            refused.push(RefusedRoutes {
                name,
                reason: "no route prefix".into(),
            });
            continue;
        };

        if prefixes.contains(prefix) {
            warn!(capability = %name, prefix, "route prefix already mounted");
            refused.push(RefusedRoutes {
                name,
                reason: format!("prefix `{prefix}` already mounted"),
            });
            continue;
        }

        if let Some(policy) = policy {
            let request = PolicyRequest::new(
                None,
                PolicyAction::MountRoutes {
                    name: name.clone(),
                    prefix: prefix.to_owned(),
                },
            );
            let refusal = match policy.evaluate(&request).await {
                Ok(decision) => decision.refusal(),
                Err(err) => Some(format!("policy engine error: {err}")),
            };
            if let Some(reason) = refusal {
                info!(capability = %name, prefix, %reason, "route mount refused by policy");
                refused.push(RefusedRoutes { name, reason });
                continue;
            }
        }

        let Some(routes) = handle.capability().routes() else {
            debug!(capability = %name, "capability supplies no routes");
            refused.push(RefusedRoutes {
                name,
                reason: "implementation supplies no routes".into(),
            });
            continue;
        };

        info!(capability = %name, prefix, "mounting dedicated routes");
        prefixes.insert(prefix.to_owned());
        router = router.nest(prefix, routes);
        mounted.push(MountedRoutes {
            name,
            prefix: prefix.to_owned(),
        });
    }

    RouteMount {
        router,
        mounted,
        refused,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use forge_policy::{PolicyDecision, PolicyRule, RuleBasedEngine, RuleMatcher};
    use forge_tools::{
        Capability, CapabilityDescriptor, InvocationContext, RegistryBuilder, StreamSink,
        ToolResult, UiHint, ValidatedParams,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    struct Reports {
        descriptor: CapabilityDescriptor,
        serves: bool,
    }

    #[async_trait]
    impl Capability for Reports {
        fn descriptor(&self) -> &CapabilityDescriptor {
            &self.descriptor
        }

        async fn execute(
            &self,
            _params: ValidatedParams,
            _ctx: &InvocationContext,
            _sink: &StreamSink,
        ) -> ToolResult<Value> {
            Ok(Value::Null)
        }

        fn frontend_component(&self) -> Option<FrontendComponent> {
            Some(FrontendComponent::new("sidebar", "<a href=\"/reports\">Reports</a>"))
        }

        fn routes(&self) -> Option<Router> {
            self.serves
                .then(|| Router::new().route("/", get(|| async { "report index" })))
        }
    }

    fn reports(name: &str, access: AccessLevel, prefix: Option<&str>) -> Reports {
        let builder = CapabilityDescriptor::builder(name)
            .description("Reports")
            .access_level(access)
            .ui_hint(UiHint::button("Reports").with_icon("chart"));
        let builder = match prefix {
            Some(prefix) => builder.dedicated_routes(prefix),
            None => builder.dedicated_routes_unmounted(),
        };
        Reports {
            descriptor: builder.build().unwrap(),
            serves: true,
        }
    }

    fn registry() -> CapabilityRegistry {
        let mut builder = RegistryBuilder::new();
        builder.register(reports("reports", AccessLevel::UiOnly, Some("reports")));
        builder.register(reports("dup-reports", AccessLevel::Both, Some("/reports")));
        builder.register(reports("no-prefix", AccessLevel::UiOnly, None));
        builder.register(reports("ai-side", AccessLevel::AiOnly, Some("/ai")));
        builder.build()
    }

    #[test]
    fn components_cover_ui_enabled_capabilities() {
        let components = ui_components(&registry());
        let names: Vec<_> = components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["dup-reports", "no-prefix", "reports"]);

        let reports = components.iter().find(|c| c.name == "reports").unwrap();
        assert_eq!(reports.label.as_deref(), Some("Reports"));
        assert_eq!(reports.placement.as_deref(), Some("sidebar"));
        assert_eq!(reports.route_prefix.as_deref(), Some("/reports"));
    }

    #[tokio::test]
    async fn mounts_each_prefix_once() {
        let mount = mount_routes(&registry(), None).await;
        assert_eq!(
            mount.mounted,
            [MountedRoutes {
                name: "dup-reports".into(),
                prefix: "/reports".into()
            }]
        );
        let refused: Vec<_> = mount.refused.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(refused, ["no-prefix", "reports"]);

        let response = mount
            .router
            .oneshot(Request::builder().uri("/reports").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"report index");
    }

    #[tokio::test]
    async fn unmounted_capabilities_do_not_claim_their_prefix() {
        let mut builder = RegistryBuilder::new();
        builder.register(Reports {
            serves: false,
            ..reports("a-empty", AccessLevel::UiOnly, Some("/reports"))
        });
        builder.register(reports("b-blocked", AccessLevel::UiOnly, Some("/reports")));
        builder.register(reports("c-real", AccessLevel::UiOnly, Some("/reports")));
        let policy = RuleBasedEngine::new(PolicyDecision::allow()).with_rule(
            PolicyRule::new(
                "block-b",
                RuleMatcher::for_routes(Some("b-blocked".into())),
                PolicyDecision::deny("blocked"),
            )
            .unwrap(),
        );

        let mount = mount_routes(&builder.build(), Some(&policy)).await;
        assert_eq!(
            mount.mounted,
            [MountedRoutes {
                name: "c-real".into(),
                prefix: "/reports".into()
            }]
        );
        let refused: Vec<_> = mount
            .refused
            .iter()
            .map(|r| (r.name.as_str(), r.reason.as_str()))
            .collect();
        assert_eq!(
            refused,
            [
                ("a-empty", "implementation supplies no routes"),
                ("b-blocked", "blocked"),
            ]
        );
    }

    #[tokio::test]
    async fn policy_can_refuse_mounting() {
        let policy = RuleBasedEngine::new(PolicyDecision::allow()).with_rule(
            PolicyRule::new(
                "no-routes",
                RuleMatcher::for_routes(None),
                PolicyDecision::deny("routes disabled"),
            )
            .unwrap(),
        );
        let mount = mount_routes(&registry(), Some(&policy)).await;
        assert!(mount.mounted.is_empty());
        assert!(
            mount
                .refused
                .iter()
                .any(|r| r.name == "dup-reports" && r.reason == "routes disabled")
        );
    }
}
