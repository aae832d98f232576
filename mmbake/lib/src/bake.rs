//! The bake pipeline: scan, classify, resolve, render, rewrite.
//!
//! [`Baker`] runs one document at a time through the pipeline. Several bakes
//! may share one [`DiagramStore`] concurrently; the store's per-identifier
//! lock guarantees each unique diagram is rendered at most once.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use mmbake_lib::{BakeConfig, Baker, DiagramStore};
//!
//! # async fn example() -> Result<(), mmbake_lib::BakeError> {
//! let store = DiagramStore::open("book/images")?;
//! let baker = Baker::mmdc(BakeConfig::default());
//!
//! let baked = baker.bake("```mermaid\ngraph TD; A-->B;\n```\n", &store).await?;
//! println!("{} rendered, {} failed", baked.rendered(), baked.failed());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::classify::{DiagramKind, diagram_kind};
use crate::config::BakeConfig;
use crate::errors::BakeError;
use crate::hash::DiagramId;
use crate::render::{DiagramRenderer, MmdcRenderer, RenderGateway, RenderStatus};
use crate::rewrite::{image_reference, rewrite};
use crate::scanner::{FencedBlock, Segment, scan};
use crate::store::DiagramStore;

/// What happened to one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RenderOutcome {
    /// Not a diagram (or never closed); left untouched.
    NotAttempted,
    /// A diagram that has no image; left untouched.
    Failed {
        /// Why the render did not produce an image.
        render: RenderStatus,
    },
    /// A diagram whose image exists; replaced by an image reference.
    Succeeded {
        /// `true` when the image already existed and the renderer was not run.
        reused: bool,
    },
}

impl RenderOutcome {
    /// Whether the block was replaced by an image reference.
    pub fn is_succeeded(&self) -> bool {
        matches!(self, RenderOutcome::Succeeded { .. })
    }

    /// Whether the block was a diagram that could not be rendered.
    pub fn is_failed(&self) -> bool {
        matches!(self, RenderOutcome::Failed { .. })
    }
}

/// Per-block entry of a [`BakedDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockReport {
    /// 1-based line of the opening fence in the input document.
    pub line: usize,
    /// Identifier of the diagram; `None` for blocks that are not diagrams.
    pub id: Option<DiagramId>,
    /// The recognised grammar; `None` for blocks that are not diagrams.
    pub kind: Option<DiagramKind>,
    /// What happened to the block.
    #[serde(flatten)]
    pub outcome: RenderOutcome,
}

/// A document after baking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakedDocument {
    /// The rewritten text.
    pub text: String,
    /// One entry per fenced Mermaid block, in document order.
    pub blocks: Vec<BlockReport>,
    /// Every artifact written or referenced by this document.
    pub artifacts: BTreeSet<PathBuf>,
}

impl BakedDocument {
    /// Number of blocks replaced by an image reference.
    pub fn rendered(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| block.outcome.is_succeeded())
            .count()
    }

    /// Number of diagrams left as source because rendering failed.
    pub fn failed(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| block.outcome.is_failed())
            .count()
    }

    /// Whether the text differs from the input.
    pub fn changed(&self) -> bool {
        self.rendered() > 0
    }
}

/// Bakes Mermaid diagrams in Markdown documents.
#[derive(Debug)]
pub struct Baker<R> {
    gateway: RenderGateway<R>,
    config: BakeConfig,
}

impl Baker<MmdcRenderer> {
    /// A baker using `mmdc`, configured from `config`.
    pub fn mmdc(config: BakeConfig) -> Self {
        Self::new(MmdcRenderer::from_config(&config), config)
    }
}

impl<R: DiagramRenderer> Baker<R> {
    /// A baker rendering through `renderer`, bounded by `config.timeout_secs`.
    pub fn new(renderer: R, config: BakeConfig) -> Self {
        Self {
            gateway: RenderGateway::new(renderer, config.timeout()),
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    /// The render gateway.
    pub fn gateway(&self) -> &RenderGateway<R> {
        &self.gateway
    }

    /// Bakes one document against `store`.
    ///
    /// Blocks are handled in document order. Render failures never abort the
    /// bake; the affected blocks stay as fenced source.
    ///
    /// ## Errors
    ///
    /// Returns a [`BakeError`] when the store cannot write a diagram source.
    #[tracing::instrument(skip(self, text, store), fields(len = text.len(), dir = ?store.dir()))]
    pub async fn bake(&self, text: &str, store: &DiagramStore) -> Result<BakedDocument, BakeError> {
        let segments = scan(text);
        let mut blocks = Vec::new();
        let mut replacements = Vec::new();
        let mut artifacts = BTreeSet::new();

        for segment in &segments {
            let Segment::Block(block) = segment else {
                continue;
            };

            let report = self.bake_block(block, store, &mut artifacts).await?;
            replacements.push(match (&report.outcome, &report.id) {
                (RenderOutcome::Succeeded { .. }, Some(id)) => Some(image_reference(
                    &self.config.alt_text,
                    &self.config.link_prefix,
                    id,
                )),
                _ => None,
            });
            blocks.push(report);
        }

        let baked = BakedDocument {
            text: rewrite(&segments, &replacements),
            blocks,
            artifacts,
        };
        tracing::debug!(
            blocks = baked.blocks.len(),
            rendered = baked.rendered(),
            failed = baked.failed(),
            "baked document"
        );
        Ok(baked)
    }

    /// Reads `path` and bakes it against `store`.
    ///
    /// ## Errors
    ///
    /// Returns [`BakeError::ReadDocument`] when the file cannot be read, and
    /// otherwise the errors of [`Baker::bake`].
    pub async fn bake_file(
        &self,
        path: &Path,
        store: &DiagramStore,
    ) -> Result<BakedDocument, BakeError> {
        let text = std::fs::read_to_string(path).map_err(|source| BakeError::ReadDocument {
            path: path.to_path_buf(),
            source,
        })?;
        self.bake(&text, store).await
    }

    async fn bake_block(
        &self,
        block: &FencedBlock<'_>,
        store: &DiagramStore,
        artifacts: &mut BTreeSet<PathBuf>,
    ) -> Result<BlockReport, BakeError> {
        let not_attempted = BlockReport {
            line: block.line,
            id: None,
            kind: None,
            outcome: RenderOutcome::NotAttempted,
        };

        if !block.is_terminated() {
            tracing::warn!(line = block.line, "leaving unterminated mermaid block as is");
            return Ok(not_attempted);
        }

        let source = block.source();
        let Some(kind) = diagram_kind(&source) else {
            tracing::debug!(line = block.line, "mermaid block is not a diagram");
            return Ok(not_attempted);
        };

        let id = DiagramId::of(&source);
        let _guard = store.lock(&id).await?;
        let resolution = store.resolve(&source)?;
        artifacts.insert(resolution.source_path.clone());

        let outcome = if resolution.image_exists {
            tracing::info!(%id, line = block.line, %kind, "reusing rendered diagram");
            RenderOutcome::Succeeded { reused: true }
        } else if let Some(render) = store.failure(&id)? {
            tracing::debug!(%id, line = block.line, "diagram already failed during this run");
            RenderOutcome::Failed { render }
        } else {
            tracing::debug!(%id, line = block.line, %kind, "rendering diagram");
            match self
                .gateway
                .render(&resolution.source_path, &resolution.image_path)
                .await
            {
                RenderStatus::Rendered => RenderOutcome::Succeeded { reused: false },
                render => {
                    store.mark_failed(&id, render.clone())?;
                    RenderOutcome::Failed { render }
                }
            }
        };

        if outcome.is_succeeded() {
            artifacts.insert(resolution.image_path);
        }

        Ok(BlockReport {
            line: block.line,
            id: Some(id),
            kind: Some(kind),
            outcome,
        })
    }
}

/// Writes a baked document to `path`, replacing any existing file.
///
/// The text is written to a temp file next to `path` and then renamed over
/// it, so `path` never holds a partial document.
///
/// ## Errors
///
/// Returns [`BakeError::WriteDocument`] when the file cannot be written.
pub fn write_document(path: &Path, text: &str) -> Result<(), BakeError> {
    let write_error = |source: std::io::Error| BakeError::WriteDocument {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".mmbake-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_error)?;
    temp.write_all(text.as_bytes()).map_err(write_error)?;
    temp.flush().map_err(write_error)?;
    temp.persist(path).map_err(|err| write_error(err.error))?;

    tracing::debug!(path = ?path, "wrote document");
    Ok(())
}
