//! Analysis lifecycle operations over a cached [`AnalysisStore`].

use std::sync::Arc;

use uuid::Uuid;
use virality_core::{
    Analysis, AnalysisPatch, AnalysisWithInsights, CreateAnalysisRequest, Credits,
};

use crate::cache::QueryCache;
use crate::error::ClientError;
use crate::store::AnalysisStore;

/// Cache keys for the three kinds of cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Analyses,
    Analysis(Uuid),
    Credits,
}

#[derive(Debug, Clone)]
enum Cached {
    Analyses(Vec<AnalysisWithInsights>),
    Analysis(AnalysisWithInsights),
    Credits(Credits),
}

/// Reads are de-duplicated per [`QueryKey`]; writes go straight to the store
/// and, on success, invalidate the keys they could have changed.
pub struct AnalysisClient<S> {
    store: Arc<S>,
    cache: QueryCache<QueryKey, Cached, ClientError>,
}

impl<S> Clone for AnalysisClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
        }
    }
}

impl<S: AnalysisStore> AnalysisClient<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            cache: QueryCache::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// All of the user's analyses, newest first.
    ///
    /// # Errors
    ///
    /// Returns the store's error; a previously cached list is kept.
    pub async fn analyses(&self) -> Result<Vec<AnalysisWithInsights>, ClientError> {
        let store = Arc::clone(&self.store);
        let cached = self
            .cache
            .get_or_fetch(QueryKey::Analyses, move || async move {
                store.list_analyses().await.map(Cached::Analyses)
            })
            .await?;
        match cached {
            Cached::Analyses(list) => Ok(list),
            other => Err(mismatch(QueryKey::Analyses, &other)),
        }
    }

    /// One analysis with its platform insights.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the analysis does not exist or is
    /// not visible to the user, or the store's error otherwise.
    pub async fn analysis(&self, id: Uuid) -> Result<AnalysisWithInsights, ClientError> {
        let store = Arc::clone(&self.store);
        let key = QueryKey::Analysis(id);
        let cached = self
            .cache
            .get_or_fetch(key, move || async move {
                store.get_analysis(id).await.map(Cached::Analysis)
            })
            .await?;
        match cached {
            Cached::Analysis(analysis) => Ok(analysis),
            other => Err(mismatch(key, &other)),
        }
    }

    /// The user's remaining credits and subscription tier.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn credits(&self) -> Result<Credits, ClientError> {
        let store = Arc::clone(&self.store);
        let cached = self
            .cache
            .get_or_fetch(QueryKey::Credits, move || async move {
                store.get_credits().await.map(Cached::Credits)
            })
            .await?;
        match cached {
            Cached::Credits(credits) => Ok(credits),
            other => Err(mismatch(QueryKey::Credits, &other)),
        }
    }

    /// The last successfully fetched list, stale or not. Still available
    /// after a failed refetch.
    pub async fn cached_analyses(&self) -> Option<Vec<AnalysisWithInsights>> {
        match self.cache.peek(&QueryKey::Analyses).await? {
            Cached::Analyses(list) => Some(list),
            _ => None,
        }
    }

    /// The last successfully fetched copy of one analysis, stale or not.
    pub async fn cached_analysis(&self, id: Uuid) -> Option<AnalysisWithInsights> {
        match self.cache.peek(&QueryKey::Analysis(id)).await? {
            Cached::Analysis(analysis) => Some(analysis),
            _ => None,
        }
    }

    /// The last successfully fetched credits, stale or not.
    pub async fn cached_credits(&self) -> Option<Credits> {
        match self.cache.peek(&QueryKey::Credits).await? {
            Cached::Credits(credits) => Some(credits),
            _ => None,
        }
    }

    /// Submit new content for analysis.
    ///
    /// The request is validated locally first; invalid input never reaches the
    /// store. On success the analyses list is invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for invalid input, or the store's
    /// error (with its message unmodified) if the submission is rejected.
    pub async fn create_analysis(
        &self,
        request: &CreateAnalysisRequest,
    ) -> Result<Analysis, ClientError> {
        request.validate()?;
        let created = self.store.create_analysis(request).await?;
        self.cache.invalidate(&QueryKey::Analyses).await;
        tracing::debug!(analysis_id = %created.id, "analysis created");
        Ok(created)
    }

    /// Apply a status and/or score change to an analysis.
    ///
    /// The analysis is re-read from the store (bypassing the cache) and the
    /// patch is checked against its current status before the update is sent.
    /// On success the analyses list and this analysis are invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Lifecycle`] if the patch is not a legal step,
    /// [`ClientError::NotFound`] if the analysis is missing, or the store's
    /// error if the update is rejected.
    pub async fn update_analysis(
        &self,
        id: Uuid,
        patch: &AnalysisPatch,
    ) -> Result<Analysis, ClientError> {
        if patch.status.is_none() && patch.overall_virality_score.is_none() {
            return Err(virality_core::LifecycleError::EmptyPatch.into());
        }

        let current = self.store.get_analysis(id).await?;
        patch.validate_against(current.analysis.status)?;

        let updated = self.store.update_analysis(id, patch).await?;
        self.cache.invalidate(&QueryKey::Analyses).await;
        self.cache.invalidate(&QueryKey::Analysis(id)).await;
        tracing::debug!(analysis_id = %id, status = %updated.status, "analysis updated");
        Ok(updated)
    }

    /// Drop the cached value for `key` so the next read refetches.
    pub async fn invalidate(&self, key: QueryKey) {
        self.cache.invalidate(&key).await;
    }
}

fn mismatch(key: QueryKey, cached: &Cached) -> ClientError {
    ClientError::Deserialize {
        context: format!("{key:?}"),
        message: format!("cache held unexpected entry {cached:?}"),
    }
}
