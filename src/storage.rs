use crate::errors::AppError;
use crate::models::AppData;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::error;

/// Whole-document persistence for [`AppData`].
#[async_trait]
pub trait Storage: Send + Sync {
    async fn load(&self) -> AppData;
    async fn save(&self, data: &AppData) -> Result<(), AppError>;
}

pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn load(&self) -> AppData {
        load_data(&self.path).await
    }

    async fn save(&self, data: &AppData) -> Result<(), AppError> {
        persist_data(&self.path, data).await
    }
}

/// Keeps the last saved document in memory.
#[derive(Default)]
pub struct MemoryStorage {
    saved: Mutex<Option<AppData>>,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load(&self) -> AppData {
        self.saved.lock().await.clone().unwrap_or_default()
    }

    async fn save(&self, data: &AppData) -> Result<(), AppError> {
        *self.saved.lock().await = Some(data.clone());
        Ok(())
    }
}

pub async fn load_data(path: &Path) -> AppData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file: {err}");
                AppData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            AppData::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &AppData) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(data).map_err(AppError::internal)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, payload).await?;
    fs::rename(&staging, path).await?;
    Ok(())
}
