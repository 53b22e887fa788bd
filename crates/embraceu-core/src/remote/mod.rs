//! Remote data store the queue delivers writes to.

mod supabase;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::models::{Destination, JsonObject};

pub use supabase::{normalize_rest_url, SupabaseRestStore};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store is not configured")]
    NotConfigured,
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message}")]
    Api { status: u16, message: String },
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Insert-only view of the hosted database.
///
/// The queue treats every error as "retry later" and never inspects the
/// variant.
pub trait RemoteStore: Send + Sync + 'static {
    fn insert(
        &self,
        destination: Destination,
        record: &JsonObject,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}

impl<T: RemoteStore> RemoteStore for Arc<T> {
    async fn insert(&self, destination: Destination, record: &JsonObject) -> RemoteResult<()> {
        (**self).insert(destination, record).await
    }
}
