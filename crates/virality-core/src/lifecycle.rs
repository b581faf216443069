//! Forward-only analysis lifecycle.
//!
//! `pending -> processing -> completed | failed`. Terminal states never change,
//! no state is skipped, and `overall_virality_score` travels only with the
//! transition into `completed`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::AnalysisStatus;

pub const MIN_VIRALITY_SCORE: f64 = 0.0;
pub const MAX_VIRALITY_SCORE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    #[error("update must set status or overall_virality_score")]
    EmptyPatch,
    #[error("analysis is {0} and can no longer be updated")]
    Terminal(AnalysisStatus),
    #[error("cannot transition analysis from {from} to {to}")]
    InvalidTransition {
        from: AnalysisStatus,
        to: AnalysisStatus,
    },
    #[error("overall_virality_score can only be set when completing an analysis")]
    ScoreNotAllowed,
    #[error("completing an analysis requires overall_virality_score")]
    ScoreRequired,
    #[error("overall_virality_score must be between 0 and 100, got {0}")]
    ScoreOutOfRange(f64),
}

impl AnalysisStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    /// Whether `self -> next` is one of the three legal edges.
    #[must_use]
    pub fn can_transition_to(self, next: AnalysisStatus) -> bool {
        matches!(
            (self, next),
            (AnalysisStatus::Pending, AnalysisStatus::Processing)
                | (AnalysisStatus::Processing, AnalysisStatus::Completed)
                | (AnalysisStatus::Processing, AnalysisStatus::Failed)
        )
    }
}

/// Sparse update of an analysis' status and score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AnalysisStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_virality_score: Option<f64>,
}

impl AnalysisPatch {
    #[must_use]
    pub fn status(status: AnalysisStatus) -> Self {
        Self {
            status: Some(status),
            overall_virality_score: None,
        }
    }

    #[must_use]
    pub fn completed(score: f64) -> Self {
        Self {
            status: Some(AnalysisStatus::Completed),
            overall_virality_score: Some(score),
        }
    }

    /// Check this patch against the analysis' current status and return the
    /// status the analysis ends up in.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] describing the first violated rule.
    pub fn validate_against(
        &self,
        current: AnalysisStatus,
    ) -> Result<AnalysisStatus, LifecycleError> {
        if self.status.is_none() && self.overall_virality_score.is_none() {
            return Err(LifecycleError::EmptyPatch);
        }
        if current.is_terminal() {
            return Err(LifecycleError::Terminal(current));
        }
        if let Some(score) = self.overall_virality_score {
            if !(MIN_VIRALITY_SCORE..=MAX_VIRALITY_SCORE).contains(&score) {
                return Err(LifecycleError::ScoreOutOfRange(score));
            }
        }

        let Some(next) = self.status else {
            return Err(LifecycleError::ScoreNotAllowed);
        };
        if !current.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        match (next, self.overall_virality_score) {
            (AnalysisStatus::Completed, None) => Err(LifecycleError::ScoreRequired),
            (AnalysisStatus::Completed, Some(_)) | (_, None) => Ok(next),
            (_, Some(_)) => Err(LifecycleError::ScoreNotAllowed),
        }
    }
}
