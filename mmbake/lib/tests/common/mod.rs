//! Shared helpers for the mmbake integration tests.
//!
//! Provides fixture loading and in-process renderers that stand in for
//! `mmdc`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mmbake_lib::{DiagramRenderer, RenderStatus};

/// Loads a markdown fixture from `tests/fixtures/`.
///
/// ## Panics
///
/// Panics if the fixture cannot be read.
pub fn load_fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture at {}: {e}", path.display()))
}

/// Names of every `.png` file in `dir`.
pub fn images_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Writes a small fake PNG to the destination and counts its calls.
///
/// An optional delay makes overlapping renders likely when documents are
/// baked concurrently.
#[derive(Debug, Default)]
pub struct StubRenderer {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StubRenderer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DiagramRenderer for StubRenderer {
    async fn render(&self, _source: &Path, dest: &Path) -> RenderStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match std::fs::write(dest, b"\x89PNG\r\n\x1a\n") {
            Ok(()) => RenderStatus::Rendered,
            Err(e) => RenderStatus::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// Never produces an image.
#[derive(Debug, Default)]
pub struct FailingRenderer {
    calls: AtomicUsize,
}

impl FailingRenderer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DiagramRenderer for FailingRenderer {
    async fn render(&self, _source: &Path, _dest: &Path) -> RenderStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        RenderStatus::Failed {
            reason: "Parse error on line 1".to_string(),
        }
    }
}
