//! Desired state read from a TOML file

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tendcloud_core::{CoreError, DesiredSource, DesiredState};
use tracing::debug;

/// Desired state file, parsed anew on every load
pub struct TomlFileSource {
    path: PathBuf,
}

impl TomlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DesiredSource for TomlFileSource {
    async fn load(&self) -> Result<DesiredState, CoreError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CoreError::Load(format!("{}: {e}", self.path.display())))?;
        let state: DesiredState = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("{}: {e}", self.path.display())))?;
        debug!(
            path = %self.path.display(),
            queue = state.queue.is_some(),
            relational = state.relational.is_some(),
            cache = state.cache.is_some(),
            "desired state loaded"
        );
        Ok(state)
    }

    async fn modified(&self) -> Result<SystemTime, CoreError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| CoreError::Load(format!("{}: {e}", self.path.display())))?;
        metadata
            .modified()
            .map_err(|e| CoreError::Load(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_and_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(
            &path,
            "[provider]\nregion = \"cn-hangzhou\"\n\n[cache.spec]\nshard_class = [\"small\"]\n",
        )
        .unwrap();
        let source = TomlFileSource::new(&path);

        let state = source.load().await.unwrap();
        assert_eq!(state.provider.region, "cn-hangzhou");
        assert!(state.cache.is_some());
        assert!(state.queue.is_none());
        assert!(source.modified().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_is_load_error() {
        let source = TomlFileSource::new("/nonexistent/tendcloud/state.toml");
        assert!(matches!(source.load().await, Err(CoreError::Load(_))));
        assert!(matches!(source.modified().await, Err(CoreError::Load(_))));
    }

    #[tokio::test]
    async fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "[[cache.instances]]\nname = 3\n").unwrap();

        let result = TomlFileSource::new(&path).load().await;
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
