use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use uuid::Uuid;
use virality_auth::{evaluate, parse_session_tokens, GateDecision, Session, SessionResolver, LOGIN_PATH};

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The session resolved by [`session_gate`], stored as a request extension.
/// `None` on unprotected paths when the visitor is signed out.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Option<Session>);

impl CurrentSession {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|s| s.user.id)
    }
}

/// Session gate settings used by middleware.
#[derive(Clone)]
pub struct GateState {
    resolver: Option<Arc<dyn SessionResolver>>,
    pub secure_cookies: bool,
}

impl GateState {
    /// `resolver` is `None` when the auth service is not configured; protected
    /// paths then always redirect to login.
    pub fn new(resolver: Option<Arc<dyn SessionResolver>>, secure_cookies: bool) -> Self {
        if resolver.is_none() {
            tracing::warn!(
                "auth service not configured; protected pages will redirect to {LOGIN_PATH}"
            );
        }
        Self {
            resolver,
            secure_cookies,
        }
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware resolving the session from cookies and enforcing path
/// protection.
///
/// Non-browser callers may send the access token as `Authorization: Bearer`
/// instead; the cookie wins when both are present.
///
/// Protected paths without a session get `303 See Other` to the login page.
/// Everything else continues with [`CurrentSession`] attached; cookies rotated
/// during resolution are appended to the response as-is.
pub async fn session_gate(State(gate): State<GateState>, mut req: Request, next: Next) -> Response {
    let mut tokens = parse_session_tokens(
        req.headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok()),
    );
    if tokens.access_token.is_none() {
        tokens.access_token =
            extract_bearer_token(req.headers().get(AUTHORIZATION)).map(str::to_owned);
    }
    let path = req.uri().path().to_owned();

    let decision = evaluate(
        gate.resolver.as_deref(),
        &path,
        &tokens,
        gate.secure_cookies,
    )
    .await;

    match decision {
        GateDecision::RedirectToLogin => {
            tracing::debug!(path, "no session for protected path; redirecting to login");
            Redirect::to(LOGIN_PATH).into_response()
        }
        GateDecision::PassThrough {
            session,
            set_cookies,
        } => {
            req.extensions_mut().insert(CurrentSession(session));
            let mut res = next.run(req).await;
            append_set_cookies(&mut res, &set_cookies);
            res
        }
    }
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn append_set_cookies(res: &mut Response, cookies: &[String]) {
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                res.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "dropping unrepresentable Set-Cookie value"),
        }
    }
}
