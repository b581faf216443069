//! HTTP client for the hosted auth service (GoTrue-compatible REST API).
//!
//! Only the two calls the session gate needs are implemented: validating an
//! access token (`GET /auth/v1/user`) and rotating a refresh token
//! (`POST /auth/v1/token?grant_type=refresh_token`). Rejections are returned
//! as `Ok(None)`; only transport failures and unexpected statuses are errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use virality_core::StoreSettings;

use crate::cookies::SessionTokens;
use crate::error::AuthError;
use crate::types::{AuthUser, ResolvedSession, Session, TokenGrant, UserPayload};

/// Resolves the session carried by a request's tokens.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Returns `Ok(None)` when the tokens do not identify a valid session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the auth service cannot be consulted.
    async fn resolve(&self, tokens: &SessionTokens) -> Result<Option<ResolvedSession>, AuthError>;
}

/// Client for the auth service.
///
/// Use [`AuthClient::new`] with the configured store settings or
/// [`AuthClient::with_base_url`] to point at a mock server in tests.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    base_url: Url,
    anon_key: String,
}

impl AuthClient {
    /// # Errors
    ///
    /// Returns [`AuthError::Http`] if the `reqwest::Client` cannot be built or
    /// [`AuthError::InvalidBaseUrl`] if the store URL does not parse.
    pub fn new(settings: &StoreSettings, timeout_secs: u64) -> Result<Self, AuthError> {
        Self::with_base_url(&settings.url, &settings.anon_key, timeout_secs)
    }

    /// # Errors
    ///
    /// Returns [`AuthError::Http`] if the `reqwest::Client` cannot be built or
    /// [`AuthError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        base_url: &str,
        anon_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent("virality-analyzer/0.1")
            .build()?;

        // Exactly one trailing slash so that `join` appends rather than
        // replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| AuthError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            anon_key: anon_key.to_owned(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// URL that starts the OAuth sign-in flow for `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidBaseUrl`] if the authorize URL cannot be built.
    pub fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to);
        Ok(url)
    }

    /// Validates an access token and returns its user.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Http`] on network failure.
    /// - [`AuthError::Status`] for statuses other than 2xx, 401, and 403.
    /// - [`AuthError::Deserialize`] if the user payload does not parse.
    pub async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, AuthError> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .client
            .get(url.clone())
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Ok(None),
            s if !s.is_success() => {
                return Err(AuthError::Status {
                    status: s.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                })
            }
            _ => {}
        }

        let body = response.text().await?;
        let payload: UserPayload =
            serde_json::from_str(&body).map_err(|e| AuthError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;
        Ok(Some(payload.into()))
    }

    /// Exchanges a refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Http`] on network failure.
    /// - [`AuthError::Status`] for statuses other than 2xx, 400, and 401.
    /// - [`AuthError::Deserialize`] if the grant does not parse.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, AuthError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let response = self
            .client
            .post(url.clone())
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => return Ok(None),
            s if !s.is_success() => {
                return Err(AuthError::Status {
                    status: s.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                })
            }
            _ => {}
        }

        let body = response.text().await?;
        let grant: TokenGrant =
            serde_json::from_str(&body).map_err(|e| AuthError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        Ok(Some(Session {
            user: grant.user.into(),
            access_token: grant.access_token,
            refresh_token: Some(grant.refresh_token),
            expires_in: grant.expires_in,
        }))
    }
}

#[async_trait]
impl SessionResolver for AuthClient {
    async fn resolve(&self, tokens: &SessionTokens) -> Result<Option<ResolvedSession>, AuthError> {
        if let Some(access_token) = tokens.access_token.as_deref() {
            if let Some(user) = self.get_user(access_token).await? {
                return Ok(Some(ResolvedSession {
                    session: Session {
                        user,
                        access_token: access_token.to_owned(),
                        refresh_token: tokens.refresh_token.clone(),
                        expires_in: None,
                    },
                    rotated: false,
                }));
            }
            tracing::debug!("access token rejected; attempting refresh");
        }

        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            return Ok(None);
        };

        Ok(self
            .refresh(refresh_token)
            .await?
            .map(|session| ResolvedSession {
                session,
                rotated: true,
            }))
    }
}
