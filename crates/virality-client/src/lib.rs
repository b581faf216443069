//! Cache-aware client for analyses, credits, and the analysis lifecycle.
//!
//! Reads go through a keyed [`QueryCache`] that shares one in-flight fetch per
//! key. Writes are sent once and, on success only, invalidate the keys whose
//! data they could have changed. Nothing is patched optimistically.

pub mod cache;
pub mod error;
pub mod hooks;
pub mod http;
pub mod store;

pub use cache::QueryCache;
pub use error::ClientError;
pub use hooks::{AnalysisClient, QueryKey};
pub use http::HttpAnalysisStore;
pub use store::AnalysisStore;
