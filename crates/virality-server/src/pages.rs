//! Server-rendered HTML pages.
//!
//! Pages never fail because the auth service is unconfigured: the landing and
//! login pages render setup hints instead, and protected pages are already
//! unreachable without a session.

use std::fmt::Write as _;

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;
use virality_core::{
    dashboard::recent, AnalysisWithInsights, ContentType, CreateAnalysisRequest, Credits,
    DashboardStats, TargetAudience,
};
use virality_db::DbError;

use crate::api::AppState;
use crate::middleware::{append_set_cookies, CurrentSession};

const FEATURES: [(&str, &str); 6] = [
    (
        "AI-Powered Analysis",
        "Score your content's viral potential before you post it.",
    ),
    (
        "Multi-Platform Insights",
        "Per-platform recommendations for Twitter, Instagram, TikTok, YouTube, and LinkedIn.",
    ),
    (
        "Audience Targeting",
        "Tune content for the age range, interests, and demographics you care about.",
    ),
    (
        "Performance Prediction",
        "Estimate likes, shares, and comments ahead of time.",
    ),
    (
        "Trend Alignment",
        "See how your content lines up with what is trending now.",
    ),
    (
        "Optimization Tips",
        "Actionable suggestions to lift engagement.",
    ),
];

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{} | Virality Analyzer</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape(title)
    ))
}

pub(crate) async fn landing(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Html<String> {
    let mut body = String::from(
        "<main>\n<h1>Virality Analyzer</h1>\n\
         <p>Predict and optimize your content for social media success.</p>\n",
    );

    if state.auth.is_none() {
        body.push_str(
            "<section id=\"setup\">\n<h2>Setup required</h2>\n\
             <p>The app is running, but sign-in is not configured yet.</p>\n<ol>\n\
             <li>Start the local store and save its status output.</li>\n\
             <li>Run <code>virality-cli setup env --status-file status.txt</code> to write \
             <code>.env</code>.</li>\n\
             <li>Restart the server.</li>\n</ol>\n</section>\n",
        );
    } else if session.0.is_some() {
        body.push_str("<p><a href=\"/dashboard\">Go to your dashboard</a></p>\n");
    } else {
        body.push_str("<p><a href=\"/login\">Get started</a></p>\n");
    }

    body.push_str("<ul class=\"features\">\n");
    for (title, description) in FEATURES {
        let _ = writeln!(body, "<li><strong>{title}</strong>: {description}</li>");
    }
    body.push_str("</ul>\n</main>");

    layout("Home", &body)
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Response {
    if session.0.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let redirect_to = format!("{}/dashboard", state.public_url);
    let action = match state
        .auth
        .as_ref()
        .map(|auth| auth.authorize_url("google", &redirect_to))
    {
        Some(Ok(url)) => format!(
            "<p><a class=\"button\" href=\"{}\">Continue with Google</a></p>",
            escape(url.as_str())
        ),
        Some(Err(e)) => {
            tracing::error!(error = %e, "could not build sign-in URL");
            "<p class=\"error\">Sign-in is temporarily unavailable.</p>".to_string()
        }
        None => "<p class=\"error\">Sign-in is not configured. See the setup steps on the \
                 <a href=\"/\">home page</a>.</p>"
            .to_string(),
    };

    layout(
        "Sign in",
        &format!(
            "<main>\n<h1>Welcome back</h1>\n\
             <p>Sign in to analyze your content across multiple social media platforms.</p>\n\
             {action}\n</main>"
        ),
    )
    .into_response()
}

fn internal_error_page(error: &DbError) -> Response {
    tracing::error!(error = %error, "page query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        layout(
            "Error",
            "<main><h1>Something went wrong</h1><p>Please try again.</p></main>",
        ),
    )
        .into_response()
}

fn render_recent(analyses: &[AnalysisWithInsights]) -> String {
    if analyses.is_empty() {
        return "<p>No analyses yet. <a href=\"/wizard\">Analyze your first post</a>.</p>"
            .to_string();
    }

    let mut out = String::from("<ul class=\"recent\">\n");
    for item in analyses {
        let a = &item.analysis;
        let score = a
            .overall_virality_score
            .map_or_else(|| "-".to_string(), |s| format!("{s:.0}"));
        let _ = writeln!(
            out,
            "<li><strong>{}</strong> <span class=\"status\">{}</span> \
             <span class=\"score\">{score}</span> <span class=\"platforms\">{}</span> \
             <time>{}</time></li>",
            escape(&a.title),
            a.status,
            escape(&a.platforms.join(", ")),
            a.created_at.format("%Y-%m-%d"),
        );
    }
    out.push_str("</ul>");
    out
}

pub(crate) async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Response {
    let Some(current) = session.0 else {
        return Redirect::to(virality_auth::LOGIN_PATH).into_response();
    };
    let user_id = current.user.id;

    let analyses = match virality_db::list_analyses(&state.pool, user_id).await {
        Ok(analyses) => analyses,
        Err(e) => return internal_error_page(&e),
    };
    let credits = match virality_db::ensure_profile(&state.pool, user_id).await {
        Ok(profile) => Credits {
            credits_remaining: profile.credits_remaining,
            subscription_tier: profile.subscription_tier,
        },
        Err(e) => return internal_error_page(&e),
    };
    let stats = DashboardStats::compute(&analyses, Some(&credits));

    let body = format!(
        "<main>\n<header><h1>Welcome back, {name}!</h1>\n\
         <form method=\"post\" action=\"/auth/signout\"><button type=\"submit\">Sign out</button></form>\n\
         </header>\n\
         <section class=\"stats\">\n\
         <div><span>Total analyses</span> <strong id=\"total\">{total}</strong></div>\n\
         <div><span>Completed</span> <strong id=\"completed\">{completed}</strong></div>\n\
         <div><span>Average score</span> <strong id=\"average\">{average}</strong></div>\n\
         <div><span>Credits remaining</span> <strong id=\"credits\">{credits}</strong></div>\n\
         </section>\n\
         <p><a href=\"/wizard\">New analysis</a></p>\n\
         <section>\n<h2>Recent analyses</h2>\n{recent}\n</section>\n</main>",
        name = escape(current.user.display_name()),
        total = stats.total_analyses,
        completed = stats.completed_analyses,
        average = stats.average_score,
        credits = stats.credits_remaining,
        recent = render_recent(recent(&analyses)),
    );

    layout("Dashboard", &body).into_response()
}

/// Form body of `POST /wizard`. List fields are comma-separated.
#[derive(Debug, Deserialize)]
pub(crate) struct WizardForm {
    content: String,
    content_type: String,
    platforms: String,
    age_range: String,
    #[serde(default)]
    interests: String,
    #[serde(default)]
    demographics: String,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

impl WizardForm {
    fn into_request(self) -> Result<CreateAnalysisRequest, String> {
        let content_type: ContentType = self.content_type.parse().map_err(|e| format!("{e}"))?;
        Ok(CreateAnalysisRequest {
            content: self.content,
            content_type,
            platforms: split_list(&self.platforms),
            target_audience: TargetAudience {
                age_range: self.age_range,
                interests: split_list(&self.interests),
                demographics: split_list(&self.demographics),
            },
        })
    }
}

fn wizard_page(status: StatusCode, error: Option<&str>) -> Response {
    let error = error.map_or_else(String::new, |e| {
        format!("<p class=\"error\" role=\"alert\">{}</p>\n", escape(e))
    });
    let body = format!(
        "<main>\n<h1>Analyze content</h1>\n{error}\
         <form method=\"post\" action=\"/wizard\">\n\
         <label>Content <textarea name=\"content\" rows=\"8\" required></textarea></label>\n\
         <label>Content type <select name=\"content_type\">\
         <option value=\"text\">Text</option><option value=\"image\">Image</option>\
         <option value=\"video\">Video</option><option value=\"mixed\">Mixed</option>\
         </select></label>\n\
         <label>Platforms <input name=\"platforms\" placeholder=\"tiktok, instagram\" required></label>\n\
         <label>Age range <input name=\"age_range\" placeholder=\"18-24\" required></label>\n\
         <label>Interests <input name=\"interests\" placeholder=\"fitness, travel\"></label>\n\
         <label>Demographics <input name=\"demographics\"></label>\n\
         <button type=\"submit\">Analyze (1 credit)</button>\n</form>\n</main>"
    );
    (status, layout("New analysis", &body)).into_response()
}

pub(crate) async fn wizard() -> Response {
    wizard_page(StatusCode::OK, None)
}

/// Submits the wizard through the same validation and store path as
/// `POST /api/analysis`, then returns to the dashboard.
pub(crate) async fn submit_wizard(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    form: Result<Form<WizardForm>, FormRejection>,
) -> Response {
    let Some(user_id) = session.user_id() else {
        return Redirect::to(virality_auth::LOGIN_PATH).into_response();
    };
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            return wizard_page(StatusCode::BAD_REQUEST, Some(&rejection.body_text()));
        }
    };

    let new = match form
        .into_request()
        .and_then(|request| request.validate().map_err(|e| e.to_string()))
    {
        Ok(new) => new,
        Err(message) => return wizard_page(StatusCode::BAD_REQUEST, Some(&message)),
    };

    if let Err(e) = virality_db::ensure_profile(&state.pool, user_id).await {
        return internal_error_page(&e);
    }
    match virality_db::create_analysis(&state.pool, user_id, &new).await {
        Ok(analysis) => {
            tracing::info!(analysis_id = %analysis.id, %user_id, "analysis submitted from wizard");
            Redirect::to("/dashboard").into_response()
        }
        Err(DbError::InsufficientCredits) => {
            wizard_page(StatusCode::PAYMENT_REQUIRED, Some("Insufficient credits"))
        }
        Err(e) => internal_error_page(&e),
    }
}

/// Clears the session cookies and returns to the landing page.
pub(crate) async fn sign_out(State(state): State<AppState>) -> Response {
    let mut response = Redirect::to("/").into_response();
    append_set_cookies(
        &mut response,
        &virality_auth::clear_session_cookies(state.secure_cookies),
    );
    response
}

pub(crate) async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        layout(
            "Not found",
            "<main><h1>Page not found</h1><p><a href=\"/\">Home</a></p></main>",
        ),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::escape;
    use crate::api::test_support::{app, body_text, get, lazy_pool};

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(
            escape("<script>\"x\" & 'y'</script>"),
            "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[tokio::test]
    async fn protected_subpath_without_cookie_redirects_to_login() {
        let response = app(lazy_pool(), Some(Uuid::new_v4()))
            .oneshot(get("/dashboard/settings", false))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn protected_paths_fail_closed_without_auth_service() {
        for path in ["/dashboard", "/wizard"] {
            let response = app(lazy_pool(), None)
                .oneshot(get(path, true))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        }
    }

    #[tokio::test]
    async fn landing_renders_setup_hint_without_auth_service() {
        let response = app(lazy_pool(), None)
            .oneshot(get("/", false))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Setup required"));
        assert!(html.contains("AI-Powered Analysis"));
    }

    #[tokio::test]
    async fn login_redirects_signed_in_user_to_dashboard() {
        let response = app(lazy_pool(), Some(Uuid::new_v4()))
            .oneshot(get("/login", true))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/dashboard");
    }

    #[tokio::test]
    async fn wizard_renders_for_signed_in_user() {
        let response = app(lazy_pool(), Some(Uuid::new_v4()))
            .oneshot(get("/wizard", true))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("name=\"platforms\""));
    }

    #[tokio::test]
    async fn sign_out_clears_both_cookies() {
        let response = app(lazy_pool(), None)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/signout")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    }

    #[tokio::test]
    async fn unknown_page_is_not_found() {
        let response = app(lazy_pool(), None)
            .oneshot(get("/nope", false))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn seed(pool: &sqlx::PgPool) -> Uuid {
        let user_id = Uuid::new_v4();
        virality_db::upsert_profile(pool, user_id, 3, "free")
            .await
            .expect("seed profile");
        user_id
    }

    fn wizard_post(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/wizard")
            .header("cookie", "sb-access-token=valid")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn wizard_submission_lands_on_dashboard_stats(pool: sqlx::PgPool) {
        let user_id = seed(&pool).await;
        let router = app(pool, Some(user_id));

        let response = router
            .clone()
            .oneshot(wizard_post(
                "content=My+%3Cbest%3E+hook&content_type=video&platforms=tiktok%2C+youtube&age_range=25-34",
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/dashboard");

        let html = body_text(
            router
                .oneshot(get("/dashboard", true))
                .await
                .expect("response"),
        )
        .await;
        assert!(html.contains("Welcome back, Casey Creator!"));
        assert!(html.contains("<strong id=\"total\">1</strong>"));
        assert!(html.contains("<strong id=\"credits\">2</strong>"));
        assert!(html.contains("My &lt;best&gt; hook"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn wizard_rejects_invalid_submission(pool: sqlx::PgPool) {
        let user_id = seed(&pool).await;
        let response = app(pool, Some(user_id))
            .oneshot(wizard_post(
                "content=hello&content_type=text&platforms=&age_range=18-24",
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response)
            .await
            .contains("at least one platform must be selected"));
    }

    #[tokio::test]
    async fn wizard_with_missing_field_rerenders_form() {
        let response = app(lazy_pool(), Some(Uuid::new_v4()))
            .oneshot(wizard_post("content=hello&content_type=text&platforms=tiktok"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = body_text(response).await;
        assert!(html.contains("role=\"alert\""));
        assert!(html.contains("missing field `age_range`"));
        assert!(html.contains("<form method=\"post\" action=\"/wizard\">"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn dashboard_provisions_profile_for_new_user(pool: sqlx::PgPool) {
        let html = body_text(
            app(pool, Some(Uuid::new_v4()))
                .oneshot(get("/dashboard", true))
                .await
                .expect("response"),
        )
        .await;
        assert!(html.contains("<strong id=\"total\">0</strong>"));
        assert!(html.contains("<strong id=\"credits\">10</strong>"));
    }
}
