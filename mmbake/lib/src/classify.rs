//! Telling real diagrams apart from sample text.
//!
//! Documentation often fences illustrative text as `mermaid` (a YAML snippet
//! showing how a diagram is configured, for instance). Only blocks whose first
//! non-blank line starts with a known diagram keyword are treated as diagrams.
//! The keyword list is intentionally short: an unlisted but valid diagram is
//! left as fenced source rather than risking a render of sample text.

use std::fmt;

use serde::Serialize;

/// Keyword prefixes that mark a block as a real diagram, with the grammar
/// each one names.
///
/// `graph` carries its trailing space so `graphic` or `graph_sample` does not
/// match.
pub const DIAGRAM_PREFIXES: &[(&str, DiagramKind)] = &[
    ("graph ", DiagramKind::Flowchart),
    ("flowchart", DiagramKind::Flowchart),
    ("sequenceDiagram", DiagramKind::Sequence),
    ("classDiagram", DiagramKind::Class),
    ("stateDiagram", DiagramKind::State),
    ("erDiagram", DiagramKind::EntityRelationship),
    ("journey", DiagramKind::Journey),
    ("gantt", DiagramKind::Gantt),
];

/// The grammar a recognised diagram is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramKind {
    /// `graph` or `flowchart`
    Flowchart,
    /// `sequenceDiagram`
    Sequence,
    /// `classDiagram`
    Class,
    /// `stateDiagram` / `stateDiagram-v2`
    State,
    /// `erDiagram`
    EntityRelationship,
    /// `journey`
    Journey,
    /// `gantt`
    Gantt,
}

impl DiagramKind {
    /// Human-readable name, used in logs and reports.
    pub fn label(self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "Flowchart diagram",
            DiagramKind::Sequence => "Sequence diagram",
            DiagramKind::Class => "Class diagram",
            DiagramKind::State => "State diagram",
            DiagramKind::EntityRelationship => "Entity-Relationship diagram",
            DiagramKind::Journey => "User journey diagram",
            DiagramKind::Gantt => "Gantt chart",
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns `true` when the block source is a real diagram.
///
/// ## Examples
///
/// ```rust
/// use mmbake_lib::classify::is_diagram;
///
/// assert!(is_diagram("graph TD; A-->B;"));
/// assert!(is_diagram("\n\n   sequenceDiagram\n  A->>B: hi"));
/// assert!(!is_diagram("```yaml\n- name: demo\n```"));
/// assert!(!is_diagram("%% a comment first\ngraph TD; A-->B;"));
/// ```
pub fn is_diagram(source: &str) -> bool {
    diagram_kind(source).is_some()
}

/// Names the grammar of the block, or `None` for sample text.
pub fn diagram_kind(source: &str) -> Option<DiagramKind> {
    let first = source
        .lines()
        .find(|line| !line.trim().is_empty())?
        .trim_start();

    DIAGRAM_PREFIXES
        .iter()
        .find(|(prefix, _)| first.starts_with(prefix))
        .map(|&(_, kind)| kind)
}
