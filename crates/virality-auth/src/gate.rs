//! Path-based session gate.
//!
//! Protected paths fail closed: without a resolvable session (missing
//! cookies, rejected tokens, auth service unconfigured or unreachable) they
//! redirect to [`LOGIN_PATH`]. Every other path passes through regardless of
//! session state.

use crate::client::SessionResolver;
use crate::cookies::{session_cookies, SessionTokens};
use crate::types::Session;

pub const LOGIN_PATH: &str = "/login";
pub const PROTECTED_PREFIXES: [&str; 2] = ["/dashboard", "/wizard"];

#[must_use]
pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Outcome of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Continue to the handler. `set_cookies` carries rotated session cookies
    /// that must be appended to the response unchanged.
    PassThrough {
        session: Option<Session>,
        set_cookies: Vec<String>,
    },
    RedirectToLogin,
}

impl GateDecision {
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            GateDecision::PassThrough { session, .. } => session.as_ref(),
            GateDecision::RedirectToLogin => None,
        }
    }
}

/// Decide whether a request to `path` carrying `tokens` may proceed.
///
/// `resolver` is `None` when the auth service is not configured.
pub async fn evaluate(
    resolver: Option<&dyn SessionResolver>,
    path: &str,
    tokens: &SessionTokens,
    secure_cookies: bool,
) -> GateDecision {
    let resolved = match resolver {
        Some(resolver) if !tokens.is_empty() => match resolver.resolve(tokens).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(error = %e, path, "session lookup failed; treating as signed out");
                None
            }
        },
        _ => None,
    };

    if resolved.is_none() && is_protected(path) {
        return GateDecision::RedirectToLogin;
    }

    match resolved {
        Some(resolved) => {
            let set_cookies = if resolved.rotated {
                session_cookies(&resolved.session, secure_cookies)
            } else {
                Vec::new()
            };
            GateDecision::PassThrough {
                session: Some(resolved.session),
                set_cookies,
            }
        }
        None => GateDecision::PassThrough {
            session: None,
            set_cookies: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::error::AuthError;
    use crate::types::{AuthUser, ResolvedSession};

    enum Fake {
        Valid { rotated: bool },
        Invalid,
        Unreachable,
    }

    #[async_trait]
    impl SessionResolver for Fake {
        async fn resolve(
            &self,
            _tokens: &SessionTokens,
        ) -> Result<Option<ResolvedSession>, AuthError> {
            match self {
                Fake::Valid { rotated } => Ok(Some(ResolvedSession {
                    session: Session {
                        user: AuthUser {
                            id: Uuid::nil(),
                            email: Some("a@example.com".to_string()),
                            full_name: None,
                        },
                        access_token: "fresh".to_string(),
                        refresh_token: Some("fresh-refresh".to_string()),
                        expires_in: Some(3600),
                    },
                    rotated: *rotated,
                })),
                Fake::Invalid => Ok(None),
                Fake::Unreachable => Err(AuthError::Status {
                    status: 503,
                    body: "down".to_string(),
                }),
            }
        }
    }

    fn with_cookie() -> SessionTokens {
        SessionTokens {
            access_token: Some("token".to_string()),
            refresh_token: None,
        }
    }

    #[test]
    fn protected_prefixes() {
        assert!(is_protected("/dashboard"));
        assert!(is_protected("/dashboard/settings"));
        assert!(is_protected("/wizard"));
        assert!(!is_protected("/"));
        assert!(!is_protected("/login"));
        assert!(!is_protected("/api/analysis"));
    }

    #[tokio::test]
    async fn protected_path_without_session_redirects() {
        let resolver = Fake::Valid { rotated: false };
        let decision = evaluate(
            Some(&resolver),
            "/dashboard/settings",
            &SessionTokens::default(),
            false,
        )
        .await;
        assert_eq!(decision, GateDecision::RedirectToLogin);
    }

    #[tokio::test]
    async fn protected_path_fails_closed_in_every_failure_mode() {
        for resolver in [Fake::Invalid, Fake::Unreachable] {
            let decision = evaluate(Some(&resolver), "/wizard", &with_cookie(), false).await;
            assert_eq!(decision, GateDecision::RedirectToLogin);
        }
        let decision = evaluate(None, "/dashboard", &with_cookie(), false).await;
        assert_eq!(decision, GateDecision::RedirectToLogin);
    }

    #[tokio::test]
    async fn unprotected_path_fails_open() {
        for resolver in [Fake::Invalid, Fake::Unreachable] {
            let decision = evaluate(Some(&resolver), "/", &with_cookie(), false).await;
            assert!(matches!(
                decision,
                GateDecision::PassThrough { session: None, .. }
            ));
        }
        let decision = evaluate(None, "/", &SessionTokens::default(), false).await;
        assert!(matches!(
            decision,
            GateDecision::PassThrough { session: None, .. }
        ));
    }

    #[tokio::test]
    async fn valid_session_passes_without_cookie_rewrite() {
        let resolver = Fake::Valid { rotated: false };
        let decision = evaluate(Some(&resolver), "/dashboard", &with_cookie(), false).await;
        match decision {
            GateDecision::PassThrough {
                session,
                set_cookies,
            } => {
                assert!(session.is_some());
                assert!(set_cookies.is_empty());
            }
            GateDecision::RedirectToLogin => panic!("expected pass-through"),
        }
    }

    #[tokio::test]
    async fn rotated_session_forwards_new_cookies() {
        let resolver = Fake::Valid { rotated: true };
        let decision = evaluate(Some(&resolver), "/", &with_cookie(), true).await;
        let GateDecision::PassThrough { set_cookies, .. } = decision else {
            panic!("expected pass-through");
        };
        assert_eq!(set_cookies.len(), 2);
        assert!(set_cookies[0].starts_with("sb-access-token=fresh;"));
        assert!(set_cookies[1].starts_with("sb-refresh-token=fresh-refresh;"));
    }
}
