//! Shared types for the API layer.

use std::sync::Arc;

use crate::api::error::ApiError;
use crate::core_state::{CoreError, CoreState};

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run a service call on the blocking pool.
    ///
    /// Service calls open SQLite connections and may wait on generation or
    /// embedding for many seconds; none of that belongs on a runtime worker.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&CoreState) -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || f(&core))
            .await
            .map_err(|e| ApiError::Internal(format!("Blocking task failed: {e}")))?
            .map_err(ApiError::from)
    }
}
