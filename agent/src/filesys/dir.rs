//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::AgentError;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), AgentError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Whether a file can be created in the directory
    pub async fn is_writable(&self) -> bool {
        let marker = self
            .path
            .join(format!(".write-check-{}", uuid::Uuid::new_v4()));
        match fs::write(&marker, b"wcd").await {
            Ok(()) => {
                let _ = fs::remove_file(&marker).await;
                true
            }
            Err(_) => false,
        }
    }

    /// Create the directory if needed and reset it to owner rwx, others rx
    /// (0o755) on Unix.
    pub async fn ensure_permissions(&self) -> Result<(), AgentError> {
        self.create().await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = fs::metadata(&self.path).await?;
            let mut perms = meta.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&self.path, perms).await?;
        }
        Ok(())
    }
}
