//! XXH64 identifiers for Mermaid diagram sources.

use std::fmt;

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Content address of a diagram.
///
/// Computed from the source with outer whitespace trimmed; interior
/// whitespace and blank lines are significant. The same trimmed source always
/// yields the same identifier, across documents and across runs.
///
/// ## Examples
///
/// ```rust
/// use mmbake_lib::DiagramId;
///
/// let id = DiagramId::of("\n  graph TD; A-->B;  \n");
/// assert_eq!(id, DiagramId::of("graph TD; A-->B;"));
/// assert_eq!(id.as_str().len(), 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DiagramId(String);

impl DiagramId {
    /// Computes the identifier of a diagram source.
    pub fn of(source: &str) -> Self {
        Self(format!("{:016x}", xxh64(source.trim().as_bytes(), 0)))
    }

    /// The identifier as 16 lowercase hex digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the diagram's source artifact.
    pub fn source_file_name(&self) -> String {
        format!("{}.mmd", self.0)
    }

    /// File name of the diagram's rendered image.
    pub fn image_file_name(&self) -> String {
        format!("{}.png", self.0)
    }
}

impl fmt::Display for DiagramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
