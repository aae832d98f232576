//! Content-addressed storage of diagram artifacts.
//!
//! Every diagram is keyed by its [`DiagramId`]. For each identifier the store
//! directory holds:
//!
//! | File | Written |
//! |------|---------|
//! | `<id>.mmd` | once, the first time the diagram is seen (kept for diagnosis) |
//! | `<id>.png` | by the renderer, only when rendering succeeds |
//!
//! Whether a diagram has been rendered is answered by the filesystem alone,
//! so any number of documents (and later runs) baked into the same directory
//! share images. The in-memory state is limited to per-identifier locks and the
//! failures recorded during this run.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::errors::BakeError;
use crate::hash::DiagramId;
use crate::render::RenderStatus;

/// Result of resolving a diagram source against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The diagram's identifier.
    pub id: DiagramId,
    /// Path of the `<id>.mmd` source artifact (always present after resolve).
    pub source_path: PathBuf,
    /// Path where the `<id>.png` image lives or will be rendered to.
    pub image_path: PathBuf,
    /// Whether the image already exists.
    pub image_exists: bool,
    /// Whether this call wrote the source artifact.
    pub source_written: bool,
}

/// Handle to a directory of diagram artifacts.
///
/// ## Examples
///
/// ```rust
/// use mmbake_lib::DiagramStore;
///
/// # fn main() -> Result<(), mmbake_lib::BakeError> {
/// let dir = tempfile::tempdir().unwrap();
/// let store = DiagramStore::open(dir.path())?;
///
/// let first = store.resolve("graph TD; A-->B;")?;
/// assert!(first.source_written);
/// assert!(!first.image_exists);
///
/// let again = store.resolve("  graph TD; A-->B;\n")?;
/// assert_eq!(again.id, first.id);
/// assert!(!again.source_written);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DiagramStore {
    dir: PathBuf,
    locks: Mutex<HashMap<DiagramId, Arc<AsyncMutex<()>>>>,
    failed: Mutex<HashMap<DiagramId, RenderStatus>>,
}

impl DiagramStore {
    /// Opens (creating when missing) a store directory.
    ///
    /// ## Errors
    ///
    /// Returns [`BakeError::CreateDir`] when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, BakeError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| BakeError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        tracing::debug!(dir = ?dir, "opened diagram store");

        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashMap::new()),
        })
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the source artifact for `id`.
    pub fn source_path(&self, id: &DiagramId) -> PathBuf {
        self.dir.join(id.source_file_name())
    }

    /// Path of the image artifact for `id`.
    pub fn image_path(&self, id: &DiagramId) -> PathBuf {
        self.dir.join(id.image_file_name())
    }

    /// Whether a rendered image for `id` exists on disk.
    pub fn has_image(&self, id: &DiagramId) -> bool {
        self.image_path(id).is_file()
    }

    /// Resolves a diagram source to its identifier and artifact paths,
    /// writing the source artifact if it does not exist yet.
    ///
    /// An existing source artifact is never rewritten.
    ///
    /// ## Errors
    ///
    /// Returns [`BakeError::WriteSource`] when the source artifact cannot be
    /// written.
    #[tracing::instrument(level = "debug", skip(self, source), fields(len = source.len()))]
    pub fn resolve(&self, source: &str) -> Result<Resolution, BakeError> {
        let source = source.trim();
        let id = DiagramId::of(source);
        let source_path = self.source_path(&id);
        let image_path = self.image_path(&id);

        let source_written = self.write_source(&source_path, source)?;
        let image_exists = image_path.is_file();

        tracing::debug!(%id, source_written, image_exists, "resolved diagram");

        Ok(Resolution {
            id,
            source_path,
            image_path,
            image_exists,
            source_written,
        })
    }

    /// Acquires the lock serializing resolve-and-render work for `id`.
    ///
    /// Documents baked concurrently against one store hold this lock while
    /// handling a diagram, so the same diagram is never rendered twice.
    pub async fn lock(&self, id: &DiagramId) -> Result<OwnedMutexGuard<()>, BakeError> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| BakeError::LockPoisoned)?;
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        Ok(lock.lock_owned().await)
    }

    /// Records that rendering `id` failed during this run.
    ///
    /// Later blocks with the same identifier reuse `status` instead of
    /// invoking the renderer again. A new store starts with no failures.
    pub fn mark_failed(&self, id: &DiagramId, status: RenderStatus) -> Result<(), BakeError> {
        self.failed
            .lock()
            .map_err(|_| BakeError::LockPoisoned)?
            .insert(id.clone(), status);
        Ok(())
    }

    /// The failure recorded for `id` during this run, if any.
    pub fn failure(&self, id: &DiagramId) -> Result<Option<RenderStatus>, BakeError> {
        Ok(self
            .failed
            .lock()
            .map_err(|_| BakeError::LockPoisoned)?
            .get(id)
            .cloned())
    }

    /// Writes `source` to `path` unless the file already exists.
    ///
    /// The content goes to a temp file in the store directory which is then
    /// persisted without clobbering, so a reader never sees a partial file.
    fn write_source(&self, path: &Path, source: &str) -> Result<bool, BakeError> {
        if path.exists() {
            return Ok(false);
        }

        let write_error = |source: std::io::Error| BakeError::WriteSource {
            path: path.to_path_buf(),
            source,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(".mmbake-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(write_error)?;
        temp.write_all(source.as_bytes()).map_err(write_error)?;
        temp.flush().map_err(write_error)?;

        match temp.persist_noclobber(path) {
            Ok(_) => {
                tracing::trace!(path = ?path, "wrote diagram source");
                Ok(true)
            }
            Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(write_error(err.error)),
        }
    }
}
