use crate::coach::CoachClient;
use crate::errors::AppError;
use crate::models::AppData;
use crate::storage::Storage;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub data: Arc<Mutex<AppData>>,
    /// `None` when no coaching API key is configured.
    pub coach: Option<Arc<dyn CoachClient>>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        data: AppData,
        coach: Option<Arc<dyn CoachClient>>,
    ) -> Self {
        Self {
            storage,
            data: Arc::new(Mutex::new(data)),
            coach,
        }
    }

    pub fn coach(&self) -> Result<&dyn CoachClient, AppError> {
        self.coach
            .as_deref()
            .ok_or_else(|| crate::coach::CoachError::MissingApiKey.into())
    }

    /// Applies `change` to a copy of the document under the state lock.
    /// The copy replaces the shared document only after it has been saved.
    pub async fn commit<T, E>(
        &self,
        change: impl FnOnce(&mut AppData) -> Result<T, E>,
    ) -> Result<T, AppError>
    where
        AppError: From<E>,
    {
        let mut data = self.data.lock().await;
        let mut working = data.clone();
        let value = change(&mut working)?;
        self.storage.save(&working).await.inspect_err(|err| {
            warn!("failed to persist data: {}", err.message);
        })?;
        *data = working;
        Ok(value)
    }
}
