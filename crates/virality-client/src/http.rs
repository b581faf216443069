//! [`AnalysisStore`] backed by the server's JSON API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;
use virality_core::{
    Analysis, AnalysisPatch, AnalysisWithInsights, CreateAnalysisRequest, Credits,
};

use crate::error::ClientError;
use crate::store::AnalysisStore;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Message(String),
    Detailed { message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorField,
}

/// HTTP client for the analysis API, authenticated with a bearer access token.
#[derive(Debug, Clone)]
pub struct HttpAnalysisStore {
    client: Client,
    base_url: Url,
    access_token: String,
}

impl HttpAnalysisStore {
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the `reqwest::Client` cannot be built
    /// or [`ClientError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, access_token: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("virality-analyzer/0.1")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            access_token: access_token.to_owned(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, ClientError> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let response = error_for_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
            context: context.to_owned(),
            message: e.to_string(),
        })
    }

    async fn send_enveloped<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, ClientError> {
        let envelope: Envelope<T> = self.send(request, context).await?;
        Ok(envelope.data)
    }
}

/// Turn a non-success response into [`ClientError`], keeping the endpoint's
/// error message as-is.
async fn error_for_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            error: ErrorField::Message(message) | ErrorField::Detailed { message },
        }) => message,
        Err(_) if !body.trim().is_empty() => body,
        Err(_) => format!("request failed with status {}", status.as_u16()),
    };

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(message));
    }
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl AnalysisStore for HttpAnalysisStore {
    async fn list_analyses(&self) -> Result<Vec<AnalysisWithInsights>, ClientError> {
        let url = self.endpoint("api/analyses")?;
        self.send_enveloped(self.client.get(url), "list analyses")
            .await
    }

    async fn get_analysis(&self, id: Uuid) -> Result<AnalysisWithInsights, ClientError> {
        let url = self.endpoint(&format!("api/analyses/{id}"))?;
        self.send_enveloped(self.client.get(url), "get analysis")
            .await
    }

    async fn create_analysis(
        &self,
        request: &CreateAnalysisRequest,
    ) -> Result<Analysis, ClientError> {
        let url = self.endpoint("api/analysis")?;
        self.send(self.client.post(url).json(request), "create analysis")
            .await
    }

    async fn update_analysis(
        &self,
        id: Uuid,
        patch: &AnalysisPatch,
    ) -> Result<Analysis, ClientError> {
        let url = self.endpoint(&format!("api/analyses/{id}"))?;
        self.send_enveloped(self.client.patch(url).json(patch), "update analysis")
            .await
    }

    async fn get_credits(&self) -> Result<Credits, ClientError> {
        let url = self.endpoint("api/credits")?;
        self.send_enveloped(self.client.get(url), "get credits")
            .await
    }
}
