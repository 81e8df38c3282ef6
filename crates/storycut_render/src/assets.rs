use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{RenderError, Result};

/// Job-scoped store of materialized source files. Every render job copies
/// the sources it needs into its own working directory so ffmpeg reads
/// stable local paths; a source referenced by several clips is copied once.
#[derive(Debug)]
pub struct AssetStore {
    dir: PathBuf,
    fetched: HashMap<String, PathBuf>,
}

impl AssetStore {
    pub fn create(work_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = work_dir.as_ref().join("assets");
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            fetched: HashMap::new(),
        })
    }

    /// Materialize one source reference, reusing an earlier copy when the
    /// same reference appears again within the job.
    pub fn materialize(&mut self, source: &str) -> Result<PathBuf> {
        if let Some(local) = self.fetched.get(source) {
            return Ok(local.clone());
        }

        let origin = Path::new(source);
        if !origin.exists() {
            return Err(RenderError::FileNotFound(origin.to_path_buf()));
        }

        let ext = origin
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let local = self.dir.join(format!("{}.{ext}", Uuid::new_v4()));
        std::fs::copy(origin, &local)?;

        self.fetched.insert(source.to_string(), local.clone());
        Ok(local)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.fetched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetched.is_empty()
    }

    /// Remove every materialized copy. Called on success, failure, and
    /// cancellation alike.
    pub fn cleanup(&mut self) {
        self.fetched.clear();
        if let Err(err) = std::fs::remove_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), error = %err, "asset cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn materialize_copies_into_job_dir() {
        let sources = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let origin = write_source(&sources, "clip.mp4", "fake video bytes");

        let mut store = AssetStore::create(work.path()).unwrap();
        let local = store.materialize(origin.to_str().unwrap()).unwrap();

        assert!(local.starts_with(store.dir()));
        assert_eq!(local.extension().unwrap(), "mp4");
        assert_eq!(std::fs::read_to_string(&local).unwrap(), "fake video bytes");
    }

    #[test]
    fn repeated_source_is_copied_once() {
        let sources = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let origin = write_source(&sources, "theme.mp3", "audio");

        let mut store = AssetStore::create(work.path()).unwrap();
        let first = store.materialize(origin.to_str().unwrap()).unwrap();
        let second = store.materialize(origin.to_str().unwrap()).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_source_is_an_error() {
        let work = TempDir::new().unwrap();
        let mut store = AssetStore::create(work.path()).unwrap();
        let result = store.materialize("/tmp/storycut_asset_store_missing.mp4");
        assert!(matches!(result, Err(RenderError::FileNotFound(_))));
    }

    #[test]
    fn cleanup_removes_all_copies() {
        let sources = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let origin = write_source(&sources, "clip.mp4", "bytes");

        let mut store = AssetStore::create(work.path()).unwrap();
        let local = store.materialize(origin.to_str().unwrap()).unwrap();
        assert!(local.exists());

        store.cleanup();
        assert!(!local.exists());
        assert!(store.is_empty());
    }
}
