use crate::auth::TokenPayload;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Flat key/value files of one gateway, one value per file.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
    serial_number: String,
}

impl FileStore {
    pub fn new(directory: impl Into<PathBuf>, serial_number: impl Into<String>) -> Self {
        FileStore {
            directory: directory.into(),
            serial_number: serial_number.into(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{}_{}", self.serial_number, name))
    }

    pub async fn read_device_id(&self) -> Result<Option<String>, PersistenceError> {
        let Some(content) = read(&self.path("device_id.txt")).await? else {
            return Ok(None);
        };

        let device_id = content.trim().to_string();
        if device_id.len() != 9 {
            return Err(PersistenceError::Invalid(format!("device id '{}' is not 9 characters", device_id)));
        }
        Ok(Some(device_id))
    }

    pub async fn write_device_id(&self, device_id: &str) -> Result<(), PersistenceError> {
        write(&self.path("device_id.txt"), device_id).await
    }

    pub async fn read_token(&self) -> Result<Option<TokenPayload>, PersistenceError> {
        let Some(content) = read(&self.path("token.json")).await? else {
            return Ok(None);
        };

        Ok(Some(serde_json::from_str(&content)?))
    }

    pub async fn write_token(&self, payload: &TokenPayload) -> Result<(), PersistenceError> {
        write(&self.path("token.json"), &serde_json::to_string_pretty(payload)?).await
    }

    pub async fn read_energy_baseline(&self) -> Result<Option<f64>, PersistenceError> {
        let Some(content) = read(&self.path("energy_lifetime.txt")).await? else {
            return Ok(None);
        };

        let value = content
            .trim()
            .parse::<f64>()
            .map_err(|e| PersistenceError::Invalid(format!("energy baseline '{}': {}", content.trim(), e)))?;
        Ok(Some(value).filter(|value| value.is_finite()))
    }

    pub async fn write_energy_baseline(&self, energy_kwh: f64) -> Result<(), PersistenceError> {
        write(&self.path("energy_lifetime.txt"), &energy_kwh.to_string()).await
    }
}

async fn read(path: &Path) -> Result<Option<String>, PersistenceError> {
    match fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(None),
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No persisted value yet");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

async fn write(path: &Path, content: &str) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    Ok(())
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store(directory: &Path) -> FileStore {
        FileStore::new(directory, "122012345678")
    }

    #[tokio::test]
    async fn missing_files_read_as_none() -> Result<(), PersistenceError> {
        let directory = tempfile::tempdir()?;
        let store = store(directory.path());

        assert_eq!(store.read_device_id().await?, None);
        assert_eq!(store.read_token().await?, None);
        assert_eq!(store.read_energy_baseline().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn token_is_persisted_as_json() -> Result<(), PersistenceError> {
        let directory = tempfile::tempdir()?;
        let store = store(directory.path());
        let payload = TokenPayload {
            token: "eyJ.token".to_string(),
            generation_time: 1_700_000_000,
            expires_at: 1_700_043_200,
        };

        store.write_token(&payload).await?;

        assert_eq!(store.read_token().await?, Some(payload));
        Ok(())
    }

    #[tokio::test]
    async fn device_id_must_be_nine_characters() -> Result<(), PersistenceError> {
        let directory = tempfile::tempdir()?;
        let store = store(directory.path());

        store.write_device_id("603980032").await?;
        assert_eq!(store.read_device_id().await?, Some("603980032".to_string()));

        store.write_device_id("6039").await?;
        assert!(matches!(store.read_device_id().await, Err(PersistenceError::Invalid(_))));
        Ok(())
    }

    #[tokio::test]
    async fn energy_baseline_round_trips_through_a_subdirectory() -> Result<(), PersistenceError> {
        let directory = tempfile::tempdir()?;
        let store = store(&directory.path().join("nested"));

        store.write_energy_baseline(1234.5).await?;

        assert_eq!(store.read_energy_baseline().await?, Some(1234.5));
        Ok(())
    }
}
