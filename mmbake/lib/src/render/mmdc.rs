//! The mermaid-cli (`mmdc`) backend.
//!
//! `mmdc` is located on `PATH` (or used as given when configured with a path)
//! before anything is spawned. When it cannot be found the render reports
//! [`RenderStatus::Unavailable`] immediately.
//!
//! ## Installation
//!
//! ```bash
//! npm install -g @mermaid-js/mermaid-cli
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::{DiagramRenderer, RenderStatus};
use crate::config::{BakeConfig, DEFAULT_RENDERER};

/// Longest stderr excerpt carried in a failure reason.
const MAX_STDERR_CHARS: usize = 400;

/// Renders diagrams by running `mmdc -i <source> -o <dest>`.
///
/// The child process is spawned with `kill_on_drop`, so when the
/// [`RenderGateway`](super::RenderGateway) abandons a render on timeout the
/// process is killed rather than left running.
///
/// ## Examples
///
/// ```rust
/// use mmbake_lib::{BakeConfig, MmdcRenderer};
/// use mmbake_lib::config::MermaidTheme;
///
/// let config = BakeConfig::default().with_theme(MermaidTheme::Forest).with_scale(2);
/// let renderer = MmdcRenderer::from_config(&config);
/// assert_eq!(renderer.program(), "mmdc");
/// ```
#[derive(Debug, Clone)]
pub struct MmdcRenderer {
    program: String,
    options: Vec<String>,
}

impl Default for MmdcRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MmdcRenderer {
    /// Uses `mmdc` from `PATH` with mmdc's own defaults.
    pub fn new() -> Self {
        Self::with_program(DEFAULT_RENDERER)
    }

    /// Uses a specific program name or path.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            options: Vec::new(),
        }
    }

    /// Builds the renderer and its mmdc options from a [`BakeConfig`].
    pub fn from_config(config: &BakeConfig) -> Self {
        let mut options = Vec::new();

        if let Some(theme) = config.theme {
            options.extend(["--theme".to_string(), theme.as_str().to_string()]);
        }
        if let Some(scale) = config.scale {
            options.extend(["--scale".to_string(), scale.max(1).to_string()]);
        }
        if let Some(background) = &config.background {
            options.extend(["--backgroundColor".to_string(), background.clone()]);
        }
        options.extend(config.extra_args.iter().cloned());

        Self {
            program: config.renderer.clone(),
            options,
        }
    }

    /// The configured program.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Finds the program, or `None` when it is not installed.
    ///
    /// A bare name is looked up on `PATH`. A path to an existing file is
    /// returned as is, even when it is not executable, so that spawning it
    /// reports the permission error.
    pub fn locate(&self) -> Option<PathBuf> {
        let path = Path::new(&self.program);
        if path.components().count() > 1 && path.is_file() {
            return Some(path.to_path_buf());
        }
        which::which(&self.program).ok()
    }

    /// Full argument list for one invocation.
    fn args(&self, source: &Path, dest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            source.as_os_str().to_owned(),
            "-o".into(),
            dest.as_os_str().to_owned(),
        ];
        args.extend(self.options.iter().map(OsString::from));
        args
    }
}

impl DiagramRenderer for MmdcRenderer {
    async fn render(&self, source: &Path, dest: &Path) -> RenderStatus {
        let Some(program) = self.locate() else {
            tracing::debug!(program = %self.program, "renderer not found");
            return RenderStatus::Unavailable {
                program: self.program.clone(),
            };
        };

        tracing::debug!(program = ?program, source = ?source, dest = ?dest, "executing mmdc");

        let output = tokio::process::Command::new(&program)
            .args(self.args(source, dest))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return RenderStatus::Failed {
                    reason: format!("failed to run {}: {e}", program.display()),
                };
            }
        };

        if !output.status.success() {
            let stderr = excerpt(&String::from_utf8_lossy(&output.stderr));
            let reason = if stderr.is_empty() {
                format!("mmdc exited with {}", output.status)
            } else {
                format!("mmdc exited with {}: {stderr}", output.status)
            };
            return RenderStatus::Failed { reason };
        }

        if !dest.is_file() {
            return RenderStatus::Failed {
                reason: "mmdc exited successfully but wrote no image".to_string(),
            };
        }

        RenderStatus::Rendered
    }
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    match trimmed.char_indices().nth(MAX_STDERR_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
