//! Session resolution against the hosted auth service and the path-based
//! session gate built on top of it.

pub mod client;
pub mod cookies;
pub mod error;
pub mod gate;
pub mod types;

pub use client::{AuthClient, SessionResolver};
pub use cookies::{
    clear_session_cookies, parse_session_tokens, session_cookies, SessionTokens,
    ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE,
};
pub use error::AuthError;
pub use gate::{evaluate, is_protected, GateDecision, LOGIN_PATH, PROTECTED_PREFIXES};
pub use types::{AuthUser, ResolvedSession, Session};
