//! The boundary to the external diagram renderer.
//!
//! A [`DiagramRenderer`] backend turns a `.mmd` source file into an image
//! file. The [`RenderGateway`] wraps a backend and owns the guarantees the
//! rest of the pipeline relies on:
//!
//! - every call finishes within the configured budget (the backend future is
//!   dropped when the budget runs out)
//! - every outcome is a [`RenderStatus`]; nothing is raised past the gateway
//! - [`RenderStatus::Rendered`] is only reported when the destination file
//!   exists, and the destination is never left holding a partial image
//!
//! ## Modules
//!
//! - [`mmdc`] - The mermaid-cli backend

pub mod mmdc;

use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Serializer};

pub use mmdc::MmdcRenderer;

/// Outcome of one render attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RenderStatus {
    /// The image was written to the destination.
    Rendered,
    /// The renderer program could not be found; nothing was spawned.
    Unavailable {
        /// The program that was looked up.
        program: String,
    },
    /// The renderer ran but did not produce an image.
    Failed {
        /// What went wrong (spawn error, exit status and stderr, ...).
        reason: String,
    },
    /// The renderer exceeded its budget and was abandoned.
    TimedOut {
        /// The budget that was exceeded.
        #[serde(rename = "after_secs", serialize_with = "serialize_secs")]
        after: Duration,
    },
}

impl RenderStatus {
    /// Whether the image was produced.
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderStatus::Rendered)
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderStatus::Rendered => f.write_str("rendered"),
            RenderStatus::Unavailable { program } => write!(f, "{program} not found on PATH"),
            RenderStatus::Failed { reason } => write!(f, "render failed: {reason}"),
            RenderStatus::TimedOut { after } => {
                write!(f, "render timed out after {}s", after.as_secs_f64())
            }
        }
    }
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// A backend able to render a diagram source file into an image file.
///
/// Implementations report every failure through [`RenderStatus`]; the
/// [`RenderGateway`] adds the time budget and output verification.
///
/// ## Examples
///
/// ```rust
/// use std::path::Path;
/// use mmbake_lib::render::{DiagramRenderer, RenderStatus};
///
/// struct CopyRenderer;
///
/// impl DiagramRenderer for CopyRenderer {
///     async fn render(&self, source: &Path, dest: &Path) -> RenderStatus {
///         match std::fs::copy(source, dest) {
///             Ok(_) => RenderStatus::Rendered,
///             Err(e) => RenderStatus::Failed { reason: e.to_string() },
///         }
///     }
/// }
/// ```
pub trait DiagramRenderer: Send + Sync {
    /// Renders `source` into `dest`.
    fn render(&self, source: &Path, dest: &Path) -> impl Future<Output = RenderStatus> + Send;
}

/// Time-bounded, failure-absorbing wrapper around a [`DiagramRenderer`].
#[derive(Debug, Clone)]
pub struct RenderGateway<R> {
    backend: R,
    timeout: Duration,
}

impl<R: DiagramRenderer> RenderGateway<R> {
    /// Wraps `backend` with a per-render budget.
    pub fn new(backend: R, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &R {
        &self.backend
    }

    /// The per-render budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Renders `source` into `dest` within the budget.
    ///
    /// The backend renders into a staging directory next to `dest`; the
    /// image is moved into place only on success, so `dest` never holds a
    /// partial image, not even when this process dies mid-render.
    ///
    /// Returns [`RenderStatus::Rendered`] only if `dest` exists afterwards.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn render(&self, source: &Path, dest: &Path) -> RenderStatus {
        let status = match Staging::next_to(dest) {
            Ok(staging) => self.render_staged(source, &staging, dest).await,
            Err(e) => RenderStatus::Failed {
                reason: format!("failed to prepare render output: {e}"),
            },
        };

        if status.is_rendered() {
            tracing::info!(dest = ?dest, "rendered diagram");
        } else {
            tracing::warn!(source = ?source, %status, "diagram was not rendered");
        }

        status
    }

    async fn render_staged(&self, source: &Path, staging: &Staging, dest: &Path) -> RenderStatus {
        let staged = staging.path();
        let status = match tokio::time::timeout(self.timeout, self.backend.render(source, &staged)).await
        {
            Ok(status) => status,
            Err(_) => RenderStatus::TimedOut {
                after: self.timeout,
            },
        };

        match status {
            RenderStatus::Rendered if !staged.is_file() => RenderStatus::Failed {
                reason: "renderer reported success but wrote no image".to_string(),
            },
            RenderStatus::Rendered => match std::fs::rename(&staged, dest) {
                Ok(()) => RenderStatus::Rendered,
                Err(e) => RenderStatus::Failed {
                    reason: format!("failed to move rendered image into place: {e}"),
                },
            },
            other => other,
        }
    }
}

/// A private directory beside the destination that the backend renders into.
///
/// Removed (with anything left in it) when dropped.
struct Staging {
    dir: tempfile::TempDir,
    file_name: OsString,
}

impl Staging {
    fn next_to(dest: &Path) -> std::io::Result<Self> {
        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = dest
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| std::io::Error::other("destination has no file name"))?;
        let dir = tempfile::Builder::new()
            .prefix(".mmbake-render-")
            .tempdir_in(parent)?;
        Ok(Self { dir, file_name })
    }

    /// Staged image path; keeps the destination's file name so mmdc picks the
    /// same output format.
    fn path(&self) -> PathBuf {
        self.dir.path().join(&self.file_name)
    }
}
