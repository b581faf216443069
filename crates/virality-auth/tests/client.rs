//! Integration tests for `AuthClient` using wiremock HTTP mocks.

use virality_auth::{evaluate, AuthClient, GateDecision, SessionResolver, SessionTokens};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_ID: &str = "2f7f0c4e-4a5b-4d43-9a1e-3c1b9b0e8d11";

fn test_client(base_url: &str) -> AuthClient {
    AuthClient::with_base_url(base_url, "anon-key", 5).expect("client construction should not fail")
}

fn user_body() -> serde_json::Value {
    serde_json::json!({
        "id": USER_ID,
        "email": "creator@example.com",
        "user_metadata": { "full_name": "Casey Creator" }
    })
}

fn tokens(access: Option<&str>, refresh: Option<&str>) -> SessionTokens {
    SessionTokens {
        access_token: access.map(str::to_owned),
        refresh_token: refresh.map(str::to_owned),
    }
}

#[tokio::test]
async fn get_user_returns_user_for_valid_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer good-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .mount(&server)
        .await;

    let user = test_client(&server.uri())
        .get_user("good-token")
        .await
        .expect("request should succeed")
        .expect("token is valid");

    assert_eq!(user.id.to_string(), USER_ID);
    assert_eq!(user.display_name(), "Casey Creator");
}

#[tokio::test]
async fn get_user_treats_401_as_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let user = test_client(&server.uri())
        .get_user("expired")
        .await
        .expect("401 is not an error");
    assert!(user.is_none());
}

#[tokio::test]
async fn get_user_surfaces_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .get_user("token")
        .await
        .unwrap_err();
    assert!(
        matches!(err, virality_auth::AuthError::Status { status: 500, .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn resolve_refreshes_expired_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(serde_json::json!({ "refresh_token": "old-refresh" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 3600,
            "user": user_body()
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resolved = test_client(&server.uri())
        .resolve(&tokens(Some("stale"), Some("old-refresh")))
        .await
        .expect("resolve")
        .expect("refresh succeeds");

    assert!(resolved.rotated);
    assert_eq!(resolved.session.access_token, "new-access");
    assert_eq!(
        resolved.session.refresh_token.as_deref(),
        Some("new-refresh")
    );
}

#[tokio::test]
async fn resolve_without_tokens_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .expect(0)
        .mount(&server)
        .await;

    let resolved = test_client(&server.uri())
        .resolve(&SessionTokens::default())
        .await
        .expect("resolve");
    assert!(resolved.is_none());
}

#[tokio::test]
async fn gate_forwards_rotated_cookies_from_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "rotated-access",
            "refresh_token": "rotated-refresh",
            "user": user_body()
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let decision = evaluate(
        Some(&client),
        "/dashboard",
        &tokens(None, Some("old-refresh")),
        false,
    )
    .await;

    let GateDecision::PassThrough {
        session,
        set_cookies,
    } = decision
    else {
        panic!("expected pass-through");
    };
    assert_eq!(session.expect("session").access_token, "rotated-access");
    assert!(set_cookies
        .iter()
        .any(|c| c.starts_with("sb-access-token=rotated-access;")));
    assert!(set_cookies
        .iter()
        .any(|c| c.starts_with("sb-refresh-token=rotated-refresh;")));
}

#[tokio::test]
async fn gate_fails_closed_when_auth_service_is_unreachable() {
    // Nothing listens on port 9 of localhost in the test environment.
    let client = test_client("http://127.0.0.1:9");
    let decision = evaluate(
        Some(&client),
        "/dashboard",
        &tokens(Some("token"), None),
        false,
    )
    .await;
    assert_eq!(decision, GateDecision::RedirectToLogin);

    let decision = evaluate(Some(&client), "/", &tokens(Some("token"), None), false).await;
    assert!(matches!(
        decision,
        GateDecision::PassThrough { session: None, .. }
    ));
}
