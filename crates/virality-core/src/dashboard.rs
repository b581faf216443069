use serde::Serialize;

use crate::analysis::{AnalysisStatus, AnalysisWithInsights, Credits};

/// Number of analyses shown in the dashboard's "recent" list.
pub const RECENT_ANALYSES_LIMIT: usize = 6;

/// Aggregate figures shown at the top of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_analyses: usize,
    pub completed_analyses: usize,
    /// Rounded mean of the scores present; 0 when nothing is scored yet.
    pub average_score: i64,
    pub credits_remaining: i32,
}

impl DashboardStats {
    /// Compute stats from a most-recent-first analysis list. Missing credits
    /// (no profile yet) display as zero.
    #[must_use]
    pub fn compute(analyses: &[AnalysisWithInsights], credits: Option<&Credits>) -> Self {
        let completed_analyses = analyses
            .iter()
            .filter(|a| a.analysis.status == AnalysisStatus::Completed)
            .count();

        let scores: Vec<f64> = analyses
            .iter()
            .filter_map(|a| a.analysis.overall_virality_score)
            .collect();
        let average_score = if scores.is_empty() {
            0
        } else {
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            let mean = (scores.iter().sum::<f64>() / scores.len() as f64).round() as i64;
            mean
        };

        Self {
            total_analyses: analyses.len(),
            completed_analyses,
            average_score,
            credits_remaining: credits.map_or(0, |c| c.credits_remaining),
        }
    }
}

/// The slice of analyses shown as "recent" on the dashboard.
#[must_use]
pub fn recent(analyses: &[AnalysisWithInsights]) -> &[AnalysisWithInsights] {
    &analyses[..analyses.len().min(RECENT_ANALYSES_LIMIT)]
}
