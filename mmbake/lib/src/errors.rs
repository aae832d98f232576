use std::path::PathBuf;

/// Errors that abort a bake.
///
/// These are environment problems (permissions, a full disk, an unreadable
/// input). A diagram that simply fails to render is never reported here; see
/// [`RenderStatus`](crate::render::RenderStatus) for that channel.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    /// The store directory could not be created.
    #[error("Failed to create store directory {path:?}")]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A diagram source file could not be written into the store.
    #[error("Failed to write diagram source {path:?}")]
    WriteSource {
        /// Path of the `.mmd` file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A Markdown document could not be read.
    #[error("Failed to read document {path:?}")]
    ReadDocument {
        /// Path of the document.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A rewritten Markdown document could not be written.
    #[error("Failed to write document {path:?}")]
    WriteDocument {
        /// Path of the document.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A thread panicked while holding the store's bookkeeping lock.
    #[error("Diagram store lock was poisoned")]
    LockPoisoned,
}
