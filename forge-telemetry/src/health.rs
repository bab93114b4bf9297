//! Readiness derived from a discovery pass.

use forge_tools::DiscoveryReport;
use serde::Serialize;

/// Coarse readiness state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// Every source loaded and at least one capability is registered.
    Ready,
    /// Some sources failed but capabilities are available.
    Degraded,
    /// Nothing is registered.
    Unavailable,
}

/// One source that failed to construct.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SourceProblem {
    /// Source identifier.
    pub source_id: String,
    /// Human-readable cause.
    pub detail: String,
}

/// Serializable readiness summary.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Readiness {
    /// Overall status.
    pub status: ReadinessStatus,
    /// Number of registered capabilities.
    pub registered: usize,
    /// Sources that failed.
    pub failures: Vec<SourceProblem>,
    /// Sources that were skipped, with the reason.
    pub skipped: Vec<SourceProblem>,
    /// Registration warnings.
    pub warnings: Vec<String>,
}

impl Readiness {
    /// Summarises a discovery report.
    #[must_use]
    pub fn from_report(report: &DiscoveryReport) -> Self {
        let status = if report.registered == 0 {
            ReadinessStatus::Unavailable
        } else if report.is_clean() {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::Degraded
        };

        Self {
            status,
            registered: report.registered,
            failures: report
                .failures
                .iter()
                .map(|failure| SourceProblem {
                    source_id: failure.source_id.clone(),
                    detail: failure.error.to_string(),
                })
                .collect(),
            skipped: report
                .skipped
                .iter()
                .map(|skipped| SourceProblem {
                    source_id: skipped.source_id.clone(),
                    detail: skipped.reason.to_string(),
                })
                .collect(),
            warnings: report.warnings.iter().map(ToString::to_string).collect(),
        }
    }

    /// Returns `true` unless nothing is registered.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.status != ReadinessStatus::Unavailable
    }
}

impl From<&DiscoveryReport> for Readiness {
    fn from(report: &DiscoveryReport) -> Self {
        Self::from_report(report)
    }
}
