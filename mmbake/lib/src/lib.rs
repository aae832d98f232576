//! mmbake
//!
//! Bakes Mermaid diagrams embedded in Markdown into PNG images and rewrites
//! the document to reference them.
//!
//! ## Features
//!
//! - **Nested-fence aware**: a ```` ```yaml ```` sample quoted inside a
//!   Mermaid block does not end the block
//! - **Sample detection**: blocks that are not real diagrams pass through
//! - **Content addressed**: identical diagrams share one `<id>.png`, across
//!   documents and across runs
//! - **Failure tolerant**: a missing, failing or hanging renderer leaves the
//!   block as fenced source and never corrupts the document
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use mmbake_lib::{BakeConfig, Baker, DiagramStore, write_document};
//!
//! # async fn example() -> Result<(), mmbake_lib::BakeError> {
//! let store = DiagramStore::open("out")?;
//! let baker = Baker::mmdc(BakeConfig::default().with_timeout_secs(30));
//!
//! let baked = baker.bake_file(Path::new("chapter.md"), &store).await?;
//! write_document(Path::new("out/chapter.md"), &baked.text)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - [`scanner`] - Line-by-line fence state machine
//! - [`classify`] - Real diagram or sample text
//! - [`hash`] - Diagram identifiers
//! - [`store`] - The content-addressed artifact directory
//! - [`render`] - The renderer boundary and the `mmdc` backend
//! - [`rewrite`] - Output document assembly
//! - [`bake`] - The pipeline tying them together

pub mod bake;
pub mod classify;
pub mod config;
pub mod errors;
pub mod hash;
pub mod render;
pub mod rewrite;
pub mod scanner;
pub mod store;

pub use bake::{BakedDocument, Baker, BlockReport, RenderOutcome, write_document};
pub use classify::{DiagramKind, is_diagram};
pub use config::{BakeConfig, ConfigError, MermaidTheme};
pub use errors::BakeError;
pub use hash::DiagramId;
pub use render::{DiagramRenderer, MmdcRenderer, RenderGateway, RenderStatus};
pub use store::{DiagramStore, Resolution};
