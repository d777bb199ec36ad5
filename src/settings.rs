//! Persisted user settings.
//!
//! Stored at `{data_dir}/settings.json`. Holds the values a user sets once
//! and expects to be remembered, such as the OpenAI API key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Saved OpenAI API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    /// Preferred chat model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// In-memory copy of the settings with disk persistence.
#[derive(Debug)]
pub struct SettingsStore {
    settings: RwLock<Settings>,
    storage_path: PathBuf,
}

impl SettingsStore {
    /// Open the store, loading from disk if a settings file exists. A file
    /// that cannot be read is logged and replaced by defaults.
    pub async fn new(data_dir: &Path) -> Self {
        let storage_path = data_dir.join("settings.json");

        let settings = match tokio::fs::read_to_string(&storage_path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(s) => {
                    tracing::debug!("Loaded settings from {}", storage_path.display());
                    s
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse settings from {}: {}, using defaults",
                        storage_path.display(),
                        e
                    );
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                tracing::warn!(
                    "Failed to read settings from {}: {}, using defaults",
                    storage_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings: RwLock::new(settings),
            storage_path,
        }
    }

    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn api_key(&self) -> Option<String> {
        self.settings.read().await.openai_api_key.clone()
    }

    pub async fn set_api_key(&self, key: Option<String>) -> Result<(), SettingsError> {
        let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        self.update(|s| s.openai_api_key = key).await
    }

    pub async fn set_model(&self, model: Option<String>) -> Result<(), SettingsError> {
        self.update(|s| s.model = model).await
    }

    async fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<(), SettingsError> {
        let mut settings = self.settings.write().await;
        apply(&mut *settings);
        self.save(&*settings).await
    }

    async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.storage_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SettingsError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let contents = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.storage_path, contents)
            .await
            .map_err(|source| SettingsError::Io {
                path: self.storage_path.clone(),
                source,
            })?;

        tracing::info!("Saved settings to {}", self.storage_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path()).await;
        assert_eq!(store.get().await, Settings::default());
    }

    #[tokio::test]
    async fn api_key_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");

        let store = SettingsStore::new(&data_dir).await;
        store.set_api_key(Some(" sk-test ".into())).await.unwrap();
        store.set_model(Some("gpt-4o".into())).await.unwrap();

        let reopened = SettingsStore::new(&data_dir).await;
        assert_eq!(reopened.api_key().await.as_deref(), Some("sk-test"));
        assert_eq!(reopened.get().await.model.as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn blank_key_clears_the_setting() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path()).await;
        store.set_api_key(Some("sk-test".into())).await.unwrap();
        store.set_api_key(Some("   ".into())).await.unwrap();
        assert_eq!(store.api_key().await, None);
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
        let store = SettingsStore::new(dir.path()).await;
        assert_eq!(store.get().await, Settings::default());
    }
}
