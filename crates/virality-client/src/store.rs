use async_trait::async_trait;
use uuid::Uuid;
use virality_core::{
    Analysis, AnalysisPatch, AnalysisWithInsights, CreateAnalysisRequest, Credits,
};

use crate::error::ClientError;

/// Remote source of truth for one signed-in user's analyses and credits.
///
/// Implementations are scoped to a single user by their credentials; none of
/// the methods take a user id.
#[async_trait]
pub trait AnalysisStore: Send + Sync + 'static {
    async fn list_analyses(&self) -> Result<Vec<AnalysisWithInsights>, ClientError>;

    async fn get_analysis(&self, id: Uuid) -> Result<AnalysisWithInsights, ClientError>;

    async fn create_analysis(
        &self,
        request: &CreateAnalysisRequest,
    ) -> Result<Analysis, ClientError>;

    async fn update_analysis(
        &self,
        id: Uuid,
        patch: &AnalysisPatch,
    ) -> Result<Analysis, ClientError>;

    async fn get_credits(&self) -> Result<Credits, ClientError>;
}
