use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Endpoint and public key of the hosted store's auth service.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub url: String,
    pub anon_key: String,
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("url", &self.url)
            .field("anon_key", &"[redacted]")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub public_url: String,
    pub store_url: Option<String>,
    pub store_anon_key: Option<String>,
    pub auth_timeout_secs: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    /// Store settings, present only when both URL and key are configured.
    ///
    /// Callers treat `None` as "auth unavailable" and fail closed on
    /// protected paths.
    #[must_use]
    pub fn store_settings(&self) -> Option<StoreSettings> {
        match (self.store_url.as_deref(), self.store_anon_key.as_deref()) {
            (Some(url), Some(key)) => Some(StoreSettings {
                url: url.to_owned(),
                anon_key: key.to_owned(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("public_url", &self.public_url)
            .field("database_url", &"[redacted]")
            .field("store_url", &self.store_url)
            .field(
                "store_anon_key",
                &self.store_anon_key.as_ref().map(|_| "[redacted]"),
            )
            .field("auth_timeout_secs", &self.auth_timeout_secs)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
