//! Artifact storage: where the compiled address book lives.
//!
//! The file-backed store writes to one fixed file name under a directory.
//! Each write replaces the previous content; there is no versioning by name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::config::ARTIFACT_FILE_NAME;
use crate::error::ArtifactError;

/// Durable storage for the compiled artifact.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Replace the artifact content. Returns the location users fetch it from.
    async fn write_artifact(&self, content: &[u8]) -> Result<String, ArtifactError>;
}

/// Stores the artifact as a file and publishes it under a base URL.
pub struct FileArtifactStore {
    dir: PathBuf,
    public_url: String,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Directory holding the artifact.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the artifact file.
    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join(ARTIFACT_FILE_NAME)
    }

    /// Public location of the artifact.
    pub fn location(&self) -> String {
        format!("{}/{}", self.public_url, ARTIFACT_FILE_NAME)
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn write_artifact(&self, content: &[u8]) -> Result<String, ArtifactError> {
        let path = self.artifact_path();
        let tmp_path = self.dir.join(format!(".{ARTIFACT_FILE_NAME}.tmp"));
        let write_err = |source| ArtifactError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(write_err)?;
        // Write beside the target, then rename: readers see the old file or
        // the new one, never a partial write.
        fs::write(&tmp_path, content).await.map_err(write_err)?;
        fs::rename(&tmp_path, &path).await.map_err(write_err)?;

        tracing::debug!(path = %path.display(), bytes = content.len(), "Artifact written");
        Ok(self.location())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn test_store() -> (FileArtifactStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = FileArtifactStore::new(tmp.path().join("vcf"), "https://example.com/vcf/");
        (store, tmp)
    }

    #[tokio::test]
    async fn write_creates_dir_and_returns_location() {
        let (store, _tmp) = test_store();
        let location = store.write_artifact(b"BEGIN:VCARD\n").await.unwrap();

        assert_eq!(location, "https://example.com/vcf/master_contacts.vcf");
        let content = fs::read_to_string(store.artifact_path()).await.unwrap();
        assert_eq!(content, "BEGIN:VCARD\n");
    }

    #[tokio::test]
    async fn write_overwrites_previous_content() {
        let (store, _tmp) = test_store();
        store.write_artifact(b"first, longer content").await.unwrap();
        store.write_artifact(b"second").await.unwrap();

        let content = fs::read_to_string(store.artifact_path()).await.unwrap();
        assert_eq!(content, "second");
    }

    #[tokio::test]
    async fn no_temp_file_left_behind() {
        let (store, _tmp) = test_store();
        store.write_artifact(b"x").await.unwrap();

        let mut entries = fs::read_dir(store.dir()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec![ARTIFACT_FILE_NAME.to_string()]);
    }

    #[tokio::test]
    async fn unwritable_dir_is_an_error() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the directory should be.
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"").await.unwrap();
        let store = FileArtifactStore::new(blocker.join("vcf"), "https://example.com");

        let err = store.write_artifact(b"x").await.unwrap_err();
        assert!(matches!(err, ArtifactError::Write { .. }));
    }
}
