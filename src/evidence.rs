use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// File storage holding payout evidence and failure photos.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Removes the stored file. A file that is already gone is not an error.
    async fn remove(&self, reference: &str) -> io::Result<()>;
}

pub struct LocalEvidenceStore {
    root: PathBuf,
}

impl LocalEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> io::Result<PathBuf> {
        let relative = Path::new(reference);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));

        if reference.is_empty() || escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid evidence reference: {reference}"),
            ));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl EvidenceStore for LocalEvidenceStore {
    async fn remove(&self, reference: &str) -> io::Result<()> {
        let path = self.resolve(reference)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}
