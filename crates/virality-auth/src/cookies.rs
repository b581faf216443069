//! Session cookie parsing and `Set-Cookie` rendering.

use crate::types::Session;

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";

const REFRESH_TOKEN_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

/// Session tokens read from a request's cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Extract the session tokens from one or more `Cookie` header values.
///
/// Unrelated cookies and empty values are ignored; the first occurrence of a
/// name wins.
pub fn parse_session_tokens<'a, I>(headers: I) -> SessionTokens
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tokens = SessionTokens::default();
    for pair in headers.into_iter().flat_map(|h| h.split(';')) {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            continue;
        }
        let slot = match name.trim() {
            ACCESS_TOKEN_COOKIE => &mut tokens.access_token,
            REFRESH_TOKEN_COOKIE => &mut tokens.refresh_token,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.to_owned());
        }
    }
    tokens
}

fn cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let mut out = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        out.push_str("; Secure");
    }
    out
}

/// `Set-Cookie` values that persist a (rotated) session on the client.
#[must_use]
pub fn session_cookies(session: &Session, secure: bool) -> Vec<String> {
    let mut out = vec![cookie(
        ACCESS_TOKEN_COOKIE,
        &session.access_token,
        session.expires_in.unwrap_or(3600),
        secure,
    )];
    if let Some(refresh) = session.refresh_token.as_deref() {
        out.push(cookie(
            REFRESH_TOKEN_COOKIE,
            refresh,
            REFRESH_TOKEN_MAX_AGE_SECS,
            secure,
        ));
    }
    out
}

/// `Set-Cookie` values that remove the session from the client.
#[must_use]
pub fn clear_session_cookies(secure: bool) -> Vec<String> {
    vec![
        cookie(ACCESS_TOKEN_COOKIE, "", 0, secure),
        cookie(REFRESH_TOKEN_COOKIE, "", 0, secure),
    ]
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::types::AuthUser;

    #[test]
    fn parses_both_tokens_among_other_cookies() {
        let tokens =
            parse_session_tokens(["theme=dark; sb-access-token=abc; sb-refresh-token=\"def\""]);
        assert_eq!(tokens.access_token.as_deref(), Some("abc"));
        assert_eq!(tokens.refresh_token.as_deref(), Some("def"));
    }

    #[test]
    fn parses_across_multiple_headers() {
        let tokens = parse_session_tokens(["sb-access-token=abc", "sb-refresh-token=def"]);
        assert!(tokens.access_token.is_some() && tokens.refresh_token.is_some());
    }

    #[test]
    fn empty_values_are_ignored() {
        let tokens = parse_session_tokens(["sb-access-token=; other"]);
        assert!(tokens.is_empty());
    }

    #[test]
    fn rendered_cookies_are_http_only() {
        let session = Session {
            user: AuthUser {
                id: Uuid::nil(),
                email: None,
                full_name: None,
            },
            access_token: "new-access".to_string(),
            refresh_token: Some("new-refresh".to_string()),
            expires_in: Some(600),
        };
        let cookies = session_cookies(&session, true);
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("sb-access-token=new-access;"));
        assert!(cookies[0].contains("HttpOnly"));
        assert!(cookies[0].contains("Max-Age=600"));
        assert!(cookies[0].ends_with("; Secure"));
        assert!(cookies[1].starts_with("sb-refresh-token=new-refresh;"));
    }

    #[test]
    fn clearing_expires_both_cookies() {
        let cookies = clear_session_cookies(false);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
        assert!(cookies.iter().all(|c| !c.contains("Secure")));
    }
}
