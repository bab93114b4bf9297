//! Access levels controlling who may invoke a capability.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Policy flag declaring which origins may invoke a capability.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    /// Only the AI model may invoke the capability.
    #[default]
    AiOnly,
    /// Only the UI may invoke the capability.
    UiOnly,
    /// Both the AI model and the UI may invoke the capability.
    Both,
    /// The capability never enters the active registry.
    Disabled,
}

impl AccessLevel {
    /// Returns `true` when the AI model may invoke the capability.
    #[must_use]
    pub const fn is_ai_enabled(self) -> bool {
        matches!(self, Self::AiOnly | Self::Both)
    }

    /// Returns `true` when the UI may invoke the capability.
    #[must_use]
    pub const fn is_ui_enabled(self) -> bool {
        matches!(self, Self::UiOnly | Self::Both)
    }

    /// Returns `true` for [`AccessLevel::Disabled`].
    #[must_use]
    pub const fn is_disabled(self) -> bool {
        matches!(self, Self::Disabled)
    }

    /// Returns `true` when an invocation from `origin` is permitted.
    #[must_use]
    pub const fn permits(self, origin: Origin) -> bool {
        match origin {
            Origin::Ai => self.is_ai_enabled(),
            Origin::Ui => self.is_ui_enabled(),
        }
    }

    /// Returns the canonical upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AiOnly => "AI_ONLY",
            Self::UiOnly => "UI_ONLY",
            Self::Both => "BOTH",
            Self::Disabled => "DISABLED",
        }
    }
}

impl Display for AccessLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AI_ONLY" => Ok(Self::AiOnly),
            "UI_ONLY" => Ok(Self::UiOnly),
            "BOTH" => Ok(Self::Both),
            "DISABLED" => Ok(Self::Disabled),
            _ => Err(Error::UnknownAccessLevel(s.to_owned())),
        }
    }
}

/// Where an invocation request came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A function call emitted by the AI model.
    Ai,
    /// A direct action triggered from the user interface.
    Ui,
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ai => "ai",
            Self::Ui => "ui",
        })
    }
}
