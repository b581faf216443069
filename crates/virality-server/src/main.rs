mod api;
mod middleware;
mod pages;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use virality_auth::{AuthClient, SessionResolver};

use crate::{
    api::{build_app, AppState},
    middleware::GateState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = virality_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    let pool_config = virality_db::PoolConfig::from_app_config(&config);
    let pool = virality_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = virality_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let auth = config.store_settings().and_then(|settings| {
        match AuthClient::new(&settings, config.auth_timeout_secs) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::error!(error = %e, "invalid auth service settings; sign-in disabled");
                None
            }
        }
    });

    let secure_cookies = config.public_url.starts_with("https://");
    let resolver = auth
        .as_ref()
        .map(|client| Arc::clone(client) as Arc<dyn SessionResolver>);
    let gate = GateState::new(resolver, secure_cookies);

    let state = AppState {
        pool,
        auth,
        public_url: config.public_url.clone(),
        secure_cookies,
    };
    let app = build_app(state, gate);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "virality-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
