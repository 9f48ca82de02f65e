use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use super::PipelineConfig;
use crate::error::{AppError, Result};

/// Configuration store backed by a JSON file
///
/// Uses `ArcSwap` for lock-free reads; the playback ticker and live loop read
/// the configuration on hot paths.
#[derive(Clone)]
pub struct ConfigStore {
    path: PathBuf,
    cache: Arc<ArcSwap<PipelineConfig>>,
    change_tx: broadcast::Sender<ConfigChange>,
}

/// Configuration change event
#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub key: String,
}

impl ConfigStore {
    /// Open a configuration file, creating it with defaults if it is missing
    pub async fn open(path: &Path) -> Result<Self> {
        let config = match tokio::fs::read_to_string(path).await {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = PipelineConfig::default();
                Self::write_file(path, &config).await?;
                info!("Created default configuration at {}", path.display());
                config
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::with_config(path.to_path_buf(), config))
    }

    /// In-memory store that persists to `path` on the next `set`/`update`
    pub fn with_config(path: PathBuf, config: PipelineConfig) -> Self {
        let (change_tx, _) = broadcast::channel(16);
        Self {
            path,
            cache: Arc::new(ArcSwap::from_pointee(config)),
            change_tx,
        }
    }

    async fn write_file(path: &Path, config: &PipelineConfig) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(config)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Get current configuration (lock-free)
    pub fn get(&self) -> Arc<PipelineConfig> {
        self.cache.load_full()
    }

    /// Replace the whole configuration
    pub async fn set(&self, config: PipelineConfig) -> Result<()> {
        Self::write_file(&self.path, &config).await?;
        self.cache.store(Arc::new(config));
        let _ = self.change_tx.send(ConfigChange {
            key: "pipeline_config".to_string(),
        });
        Ok(())
    }

    /// Read-modify-write; the last concurrent writer wins
    pub async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut PipelineConfig),
    {
        let mut config = (**self.cache.load()).clone();
        f(&mut config);
        self.set(config).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.change_tx.subscribe()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
