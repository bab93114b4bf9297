//! Policy engine traits and rule-based implementation.

use std::collections::BTreeSet;

use async_trait::async_trait;
use forge_primitives::Origin;
use thiserror::Error;
use tracing::debug;

use crate::contracts::{PolicyAction, PolicyRequest};
use crate::decision::PolicyDecision;

/// Errors surfaced by policy engines.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Rule configuration error.
    #[error("invalid policy rule: {0}")]
    InvalidRule(&'static str),
    /// A custom engine failed to reach a decision.
    #[error("policy backend failure: {reason}")]
    Backend {
        /// Human-readable explanation for logging and operators.
        reason: String,
    },
}

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Trait implemented by policy engines.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Evaluates the supplied policy request.
    async fn evaluate(&self, request: &PolicyRequest) -> PolicyResult<PolicyDecision>;
}

/// Matches a policy request based on action type and optional tags.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    action: ActionMatcher,
    required_tags: BTreeSet<String>,
}

impl RuleMatcher {
    /// Creates a matcher that accepts all actions.
    #[must_use]
    pub fn any() -> Self {
        Self::from_action(ActionMatcher::Any)
    }

    /// Creates a matcher targeting invocations of a specific capability.
    #[must_use]
    pub fn for_capability(name: impl Into<String>) -> Self {
        Self::from_action(ActionMatcher::Invoke {
            name: Some(name.into()),
            origin: None,
        })
    }

    /// Creates a matcher targeting any capability invocation.
    #[must_use]
    pub fn for_any_capability() -> Self {
        Self::from_action(ActionMatcher::Invoke {
            name: None,
            origin: None,
        })
    }

    /// Creates a matcher targeting every invocation from `origin`.
    #[must_use]
    pub fn for_origin(origin: Origin) -> Self {
        Self::from_action(ActionMatcher::Invoke {
            name: None,
            origin: Some(origin),
        })
    }

    /// Creates a matcher targeting route mounting, optionally for one capability.
    #[must_use]
    pub fn for_routes(name: Option<String>) -> Self {
        Self::from_action(ActionMatcher::Routes { name })
    }

    fn from_action(action: ActionMatcher) -> Self {
        Self {
            action,
            required_tags: BTreeSet::new(),
        }
    }

    /// Narrows an invocation matcher to a single origin.
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        if let ActionMatcher::Invoke { origin: slot, .. } = &mut self.action {
            *slot = Some(origin);
        }
        self
    }

    /// Requires that the request carries the supplied tags.
    #[must_use]
    pub fn with_required_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !tag.trim().is_empty() {
                self.required_tags.insert(tag);
            }
        }
        self
    }

    fn matches(&self, request: &PolicyRequest) -> bool {
        self.action.matches(request.action())
            && self
                .required_tags
                .iter()
                .all(|tag| request.context().tags().contains(tag))
    }
}

/// Matches requests based on the action shape.
#[derive(Debug, Clone)]
pub enum ActionMatcher {
    /// Match all actions.
    Any,
    /// Match capability invocations, optionally narrowing on name and origin.
    Invoke {
        /// Optional capability name to match.
        name: Option<String>,
        /// Optional origin to match.
        origin: Option<Origin>,
    },
    /// Match route mounting, optionally narrowing on capability name.
    Routes {
        /// Optional capability name to match.
        name: Option<String>,
    },
}

impl ActionMatcher {
    fn matches(&self, action: &PolicyAction) -> bool {
        match (self, action) {
            (Self::Any, _) => true,
            (
                Self::Invoke { name, origin },
                PolicyAction::InvokeCapability {
                    name: action_name,
                    origin: action_origin,
                },
            ) => {
                name.as_ref().is_none_or(|expected| expected == action_name)
                    && origin.is_none_or(|expected| expected == *action_origin)
            }
            (Self::Routes { name }, PolicyAction::MountRoutes { name: action_name, .. }) => {
                name.as_ref().is_none_or(|expected| expected == action_name)
            }
            _ => false,
        }
    }
}

/// Rule consisting of a matcher and a resulting decision.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    name: String,
    matcher: RuleMatcher,
    decision: PolicyDecision,
}

impl PolicyRule {
    /// Creates a new rule with the supplied matcher and decision.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRule`] when the rule name is empty.
    pub fn new(
        name: impl Into<String>,
        matcher: RuleMatcher,
        decision: PolicyDecision,
    ) -> PolicyResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PolicyError::InvalidRule("rule name cannot be empty"));
        }

        Ok(Self {
            name,
            matcher,
            decision,
        })
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the decision attached to the rule.
    #[must_use]
    pub fn decision(&self) -> &PolicyDecision {
        &self.decision
    }

    fn matches(&self, request: &PolicyRequest) -> bool {
        self.matcher.matches(request)
    }
}

/// Rule-based, in-memory policy engine. The first matching rule wins.
#[derive(Debug, Clone)]
pub struct RuleBasedEngine {
    rules: Vec<PolicyRule>,
    default_decision: PolicyDecision,
}

impl RuleBasedEngine {
    /// Constructs a new rule-based engine with the provided default decision.
    #[must_use]
    pub fn new(default_decision: PolicyDecision) -> Self {
        Self {
            rules: Vec::new(),
            default_decision,
        }
    }

    /// Appends a rule, evaluated after the ones already present.
    #[must_use]
    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns the configured rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }
}

#[async_trait]
impl PolicyEngine for RuleBasedEngine {
    async fn evaluate(&self, request: &PolicyRequest) -> PolicyResult<PolicyDecision> {
        for rule in &self.rules {
            if rule.matches(request) {
                debug!(rule = rule.name(), action = %request.action().label(), "policy rule matched");
                return Ok(rule.decision().clone());
            }
        }

        Ok(self.default_decision.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::PolicyRequest;

    fn invoke(name: &str, origin: Origin) -> PolicyRequest {
        PolicyRequest::invocation(None, name, origin)
    }

    #[tokio::test]
    async fn rule_matching_prefers_first_match() {
        let engine = RuleBasedEngine::new(PolicyDecision::allow())
            .with_rule(
                PolicyRule::new(
                    "deny-echo",
                    RuleMatcher::for_capability("echo"),
                    PolicyDecision::deny("capability disabled by operator"),
                )
                .unwrap(),
            )
            .with_rule(
                PolicyRule::new(
                    "escalate-all",
                    RuleMatcher::for_any_capability(),
                    PolicyDecision::escalate("needs approval", vec!["secops".into()]),
                )
                .unwrap(),
            );

        let decision = engine.evaluate(&invoke("echo", Origin::Ai)).await.unwrap();
        assert!(decision.is_deny());
        assert_eq!(decision.reason(), Some("capability disabled by operator"));

        let decision = engine.evaluate(&invoke("other", Origin::Ai)).await.unwrap();
        assert!(decision.is_escalate());
    }

    #[tokio::test]
    async fn origin_narrowing() {
        let engine = RuleBasedEngine::new(PolicyDecision::allow()).with_rule(
            PolicyRule::new(
                "no-ui-exports",
                RuleMatcher::for_capability("export").with_origin(Origin::Ui),
                PolicyDecision::deny("exports are AI-only here"),
            )
            .unwrap(),
        );

        assert!(engine.evaluate(&invoke("export", Origin::Ui)).await.unwrap().is_deny());
        assert!(engine.evaluate(&invoke("export", Origin::Ai)).await.unwrap().is_allow());
        assert!(engine.evaluate(&invoke("other", Origin::Ui)).await.unwrap().is_allow());
    }

    #[tokio::test]
    async fn default_decision_applies_when_no_rules_match() {
        let engine = RuleBasedEngine::new(PolicyDecision::deny("no rules"));
        let decision = engine.evaluate(&invoke("unknown", Origin::Ai)).await.unwrap();

        assert!(decision.is_deny());
    }

    #[tokio::test]
    async fn route_rules_ignore_invocations() {
        let engine = RuleBasedEngine::new(PolicyDecision::allow()).with_rule(
            PolicyRule::new(
                "no-routes",
                RuleMatcher::for_routes(None),
                PolicyDecision::deny("routes disabled"),
            )
            .unwrap(),
        );

        let mount = PolicyRequest::new(
            None,
            PolicyAction::MountRoutes {
                name: "reports".into(),
                prefix: "/reports".into(),
            },
        );
        assert!(engine.evaluate(&mount).await.unwrap().is_deny());
        assert!(engine.evaluate(&invoke("reports", Origin::Ui)).await.unwrap().is_allow());
    }

    #[tokio::test]
    async fn tag_matching_requires_subset() {
        let engine = RuleBasedEngine::new(PolicyDecision::allow()).with_rule(
            PolicyRule::new(
                "paid-only",
                RuleMatcher::for_any_capability().with_required_tags(["tier:free".to_owned()]),
                PolicyDecision::deny("upgrade required"),
            )
            .unwrap(),
        );

        let request = invoke("writer", Origin::Ui).with_tags(["tier:free", "tenant:a"]);
        assert!(engine.evaluate(&request).await.unwrap().is_deny());

        let request = invoke("writer", Origin::Ui).with_tag("tier:pro");
        assert!(engine.evaluate(&request).await.unwrap().is_allow());
    }
}
