//! Local artifact store: the destination directory of a run.

use std::path::{Path, PathBuf};

use crate::downloader::CHECKSUM_SUFFIX;
use crate::error::Result;
use crate::utils::{ends_with_ignore_case, is_hidden_name};

/// Marker every extraction input carries in its file name (`*.xml*`)
const DOCUMENT_MARKER: &str = ".xml";

/// The directory holding downloaded artifacts
///
/// An artifact's only tracked state is whether a file with its name exists.
/// Hidden (`.`-prefixed) entries are in-flight downloads and never count.
#[derive(Clone, Debug)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory (and parents) if absent
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Remove every regular file directly inside the directory.
    ///
    /// Subdirectories are left alone. Returns the number of files removed.
    pub async fn clean(&self) -> Result<usize> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        tracing::info!(dir = %self.dir.display(), removed, "Cleaned destination directory");
        Ok(removed)
    }

    /// Whether something already exists at `path`
    pub async fn contains(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    /// Documents available for extraction, sorted by file name.
    ///
    /// Matches regular files whose name contains `.xml` (any case), which
    /// covers both `*.xml` and `*.xml.gz`. Checksum sidecars are excluded.
    pub fn documents(&self) -> Result<Vec<PathBuf>> {
        let mut documents = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden_name(&name)
                || ends_with_ignore_case(&name, CHECKSUM_SUFFIX)
                || !name.to_ascii_lowercase().contains(DOCUMENT_MARKER)
            {
                continue;
            }
            documents.push(entry.path());
        }
        documents.sort();
        Ok(documents)
    }
}
