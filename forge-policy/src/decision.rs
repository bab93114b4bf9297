//! Decisions returned by policy engines.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Outcome category of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// The invocation may proceed.
    Allow,
    /// The invocation is rejected.
    Deny,
    /// The invocation needs approval the runtime cannot obtain inline.
    Escalate,
}

impl Display for DecisionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Escalate => "escalate",
        })
    }
}

/// Structured decision emitted by a policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    required_approvals: Vec<String>,
}

impl PolicyDecision {
    /// Returns an allow decision.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            kind: DecisionKind::Allow,
            reason: None,
            required_approvals: Vec::new(),
        }
    }

    /// Returns a deny decision with an explanatory reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::Deny,
            reason: Some(reason.into()),
            required_approvals: Vec::new(),
        }
    }

    /// Returns an escalate decision naming the approvers.
    #[must_use]
    pub fn escalate(reason: impl Into<String>, approvers: Vec<String>) -> Self {
        Self {
            kind: DecisionKind::Escalate,
            reason: Some(reason.into()),
            required_approvals: approvers,
        }
    }

    /// Returns the decision kind.
    #[must_use]
    pub fn kind(&self) -> DecisionKind {
        self.kind
    }

    /// Returns true when the invocation may proceed.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.kind == DecisionKind::Allow
    }

    /// Returns true when the invocation is rejected.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.kind == DecisionKind::Deny
    }

    /// Returns true when approvals are required.
    #[must_use]
    pub fn is_escalate(&self) -> bool {
        self.kind == DecisionKind::Escalate
    }

    /// Returns the optional reason.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns approver identifiers for escalations.
    #[must_use]
    pub fn required_approvals(&self) -> &[String] {
        &self.required_approvals
    }

    /// Describes why the invocation cannot proceed, or `None` for allow.
    ///
    /// Escalations are treated as refusals since no approval flow exists at
    /// invocation time.
    #[must_use]
    pub fn refusal(&self) -> Option<String> {
        let reason = self.reason.as_deref().unwrap_or("no reason given");
        match self.kind {
            DecisionKind::Allow => None,
            DecisionKind::Deny => Some(reason.to_owned()),
            DecisionKind::Escalate if self.required_approvals.is_empty() => {
                Some(format!("approval required: {reason}"))
            }
            DecisionKind::Escalate => Some(format!(
                "approval required from {}: {reason}",
                self.required_approvals.join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_describes_blocking_decisions() {
        assert_eq!(PolicyDecision::allow().refusal(), None);
        assert_eq!(
            PolicyDecision::deny("maintenance window").refusal().as_deref(),
            Some("maintenance window")
        );

        let escalate = PolicyDecision::escalate("sensitive", vec!["secops".into()]);
        assert!(escalate.is_escalate());
        assert_eq!(escalate.required_approvals(), ["secops"]);
        assert_eq!(
            escalate.refusal().as_deref(),
            Some("approval required from secops: sensitive")
        );
    }

    #[test]
    fn serialises_kind_in_snake_case() {
        let value = serde_json::to_value(PolicyDecision::deny("nope")).unwrap();
        assert_eq!(value["kind"], "deny");
        assert_eq!(value["reason"], "nope");
        assert!(value.get("required_approvals").is_none());
    }
}
