//! # mmbake CLI
//!
//! Bakes Mermaid diagrams in Markdown files into PNG images.
//!
//! ## Usage
//!
//! ```bash
//! # Bake two chapters into ./book; images and rewritten chapters land there
//! mmbake -o book chapter-1.md chapter-2.md
//!
//! # Bake four documents at a time, sharing one image store
//! mmbake -o book -j 4 chapters/*.md
//!
//! # Filter stdin to stdout (images go to the current directory)
//! cat README.md | mmbake - > README.baked.md
//!
//! # Per-block JSON report; exit 2 if any diagram failed to render
//! mmbake -o book --json --strict chapters/*.md
//! ```
//!
//! ## Configuration
//!
//! `--config mmbake.toml` loads a [`BakeConfig`]; flags given on the command
//! line override the file.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use futures::stream::{self, StreamExt, TryStreamExt};
use mmbake_lib::{
    BakeConfig, BakedDocument, Baker, BlockReport, ConfigError, DiagramRenderer, DiagramStore,
    MermaidTheme, write_document,
};
use serde::Serialize;

/// Exit code used by `--strict` when a diagram failed to render.
pub const STRICT_FAILURE_EXIT_CODE: i32 = 2;

/// The input name that reads the document from stdin.
pub const STDIN_INPUT: &str = "-";

/// Command-line interface for mmbake.
#[derive(Debug, Parser)]
#[command(
    name = "mmbake",
    about = "Bake Mermaid diagrams in Markdown into PNG images",
    version
)]
pub struct Cli {
    /// Markdown files to bake ("-" reads stdin and writes the result to stdout)
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Directory for diagram artifacts and rewritten documents. An input
    /// already in this directory is overwritten in place, which with the
    /// default "." means any input given from the current directory
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Number of documents baked concurrently
    #[arg(short = 'j', long, value_name = "N", default_value_t = 1)]
    pub jobs: usize,

    /// Print a JSON report of every block instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Exit with status 2 when any diagram failed to render
    #[arg(long)]
    pub strict: bool,

    /// TOML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Renderer program name or path (default: mmdc)
    #[arg(long, value_name = "PROGRAM")]
    pub renderer: Option<String>,

    /// Per-diagram render timeout in seconds (default: 60)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Alt text of the image reference (default: Diagram)
    #[arg(long, value_name = "TEXT")]
    pub alt_text: Option<String>,

    /// Prefix prepended to image links (e.g. "images/")
    #[arg(long, value_name = "PREFIX")]
    pub link_prefix: Option<String>,

    /// Mermaid theme: default, dark, forest or neutral
    #[arg(long, value_parser = parse_theme)]
    pub theme: Option<MermaidTheme>,

    /// Output scale factor
    #[arg(long)]
    pub scale: Option<u32>,

    /// Background color (e.g. "transparent", "white", "#F0F0F0")
    #[arg(long, value_name = "COLOR")]
    pub background: Option<String>,

    /// Increase verbosity (-v INFO, -vv DEBUG, -vvv TRACE, -vvvv TRACE with file/line)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_theme(s: &str) -> Result<MermaidTheme, String> {
    s.parse()
}

impl Cli {
    /// The config file (if any) with command-line overrides applied.
    pub fn bake_config(&self) -> Result<BakeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => BakeConfig::from_toml_file(path)?,
            None => BakeConfig::default(),
        };

        if let Some(renderer) = &self.renderer {
            config = config.with_renderer(renderer.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout_secs(secs);
        }
        if let Some(alt_text) = &self.alt_text {
            config = config.with_alt_text(alt_text.clone());
        }
        if let Some(prefix) = &self.link_prefix {
            config = config.with_link_prefix(prefix.clone());
        }
        if let Some(theme) = self.theme {
            config = config.with_theme(theme);
        }
        if let Some(scale) = self.scale {
            config = config.with_scale(scale);
        }
        if let Some(background) = &self.background {
            config = config.with_background(background.clone());
        }

        Ok(config)
    }
}

/// Where one input comes from and where its result goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Read stdin, write the rewritten text to stdout.
    Stdin,
    /// Read `input`, write the rewritten text to `output`.
    File {
        /// The document to bake.
        input: PathBuf,
        /// `<out-dir>/<file name of input>`.
        output: PathBuf,
    },
}

/// Maps every input to its job.
///
/// ## Errors
///
/// Fails when stdin is given more than once, when an input has no file name,
/// or when two inputs would be written to the same output file.
pub fn plan_jobs(inputs: &[PathBuf], out_dir: &Path) -> Result<Vec<Job>> {
    let mut jobs = Vec::with_capacity(inputs.len());
    let mut outputs: HashMap<PathBuf, &Path> = HashMap::new();
    let mut stdin_seen = false;

    for input in inputs {
        if input.as_os_str() == STDIN_INPUT {
            if stdin_seen {
                return Err(eyre!("stdin (\"-\") can only be given once"));
            }
            stdin_seen = true;
            jobs.push(Job::Stdin);
            continue;
        }

        let name = input
            .file_name()
            .ok_or_else(|| eyre!("Input {:?} is not a file path", input))?;
        let output = out_dir.join(name);
        if let Some(previous) = outputs.insert(output.clone(), input) {
            return Err(eyre!(
                "Inputs {:?} and {:?} would both be written to {:?}",
                previous,
                input,
                output
            ));
        }
        jobs.push(Job::File {
            input: input.clone(),
            output,
        });
    }

    Ok(jobs)
}

/// Outcome of baking one input.
#[derive(Debug, Serialize)]
pub struct DocumentReport {
    /// The input as given (`-` for stdin).
    pub input: String,
    /// Where the rewritten document was written; `None` for stdout.
    pub output: Option<PathBuf>,
    /// Blocks replaced by an image reference.
    pub rendered: usize,
    /// Diagrams left as source because rendering failed.
    pub failed: usize,
    /// Every Mermaid block, in document order.
    pub blocks: Vec<BlockReport>,
    /// The rewritten text, printed to stdout for stdin input.
    #[serde(skip)]
    pub text: Option<String>,
}

impl DocumentReport {
    fn new(input: String, output: Option<PathBuf>, baked: BakedDocument) -> Self {
        let rendered = baked.rendered();
        let failed = baked.failed();
        let text = output.is_none().then_some(baked.text);
        Self {
            input,
            output,
            rendered,
            failed,
            blocks: baked.blocks,
            text,
        }
    }
}

/// Bakes every job against `store`, up to `concurrency` documents at a time.
///
/// `stdin` is read to the end before any document is baked, and only when a
/// [`Job::Stdin`] is present. File results are written as they complete;
/// reports come back in input order.
pub async fn bake_all<R: DiagramRenderer>(
    baker: &Baker<R>,
    store: &DiagramStore,
    jobs: Vec<Job>,
    concurrency: usize,
    mut stdin: impl Read,
) -> Result<Vec<DocumentReport>> {
    let stdin_text = if jobs.contains(&Job::Stdin) {
        let mut text = String::new();
        stdin
            .read_to_string(&mut text)
            .wrap_err("Failed to read stdin")?;
        text
    } else {
        String::new()
    };

    stream::iter(jobs)
        .map(|job| bake_job(baker, store, job, &stdin_text))
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

async fn bake_job<R: DiagramRenderer>(
    baker: &Baker<R>,
    store: &DiagramStore,
    job: Job,
    stdin_text: &str,
) -> Result<DocumentReport> {
    match job {
        Job::Stdin => {
            let baked = baker.bake(stdin_text, store).await?;
            Ok(DocumentReport::new(STDIN_INPUT.to_string(), None, baked))
        }
        Job::File { input, output } => {
            let baked = baker.bake_file(&input, store).await?;
            write_document(&output, &baked.text)?;
            tracing::info!(input = ?input, output = ?output, "wrote baked document");
            Ok(DocumentReport::new(
                input.display().to_string(),
                Some(output),
                baked,
            ))
        }
    }
}
