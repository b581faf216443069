pub mod analysis;
pub mod app_config;
pub mod config;
pub mod dashboard;
pub mod lifecycle;
pub mod submission;

pub use analysis::{
    Analysis, AnalysisStatus, AnalysisWithInsights, ContentType, Credits, PlatformInsight,
    TargetAudience,
};
pub use app_config::{AppConfig, Environment, StoreSettings};
pub use config::{load_app_config, load_app_config_from_env};
pub use dashboard::{DashboardStats, RECENT_ANALYSES_LIMIT};
pub use lifecycle::{AnalysisPatch, LifecycleError, MAX_VIRALITY_SCORE, MIN_VIRALITY_SCORE};
pub use submission::{CreateAnalysisRequest, NewAnalysis, ValidationError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid content type: {0}")]
    InvalidContentType(String),
    #[error("invalid analysis status: {0}")]
    InvalidStatus(String),
}
