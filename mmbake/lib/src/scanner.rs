//! Fence scanning for ```` ```mermaid ```` blocks.
//!
//! The scanner is a two-state machine ([`FenceState`]) driven one line at a
//! time. Inside a Mermaid fence it counts nested fences (a ```` ```yaml ````
//! sample quoted inside the diagram block, say) so that only the bare
//! ```` ``` ```` matching the outer fence closes the block.
//!
//! Lines are kept with their terminators, so concatenating every segment's raw
//! text reproduces the input byte-for-byte.
//!
//! ## Examples
//!
//! ```rust
//! use mmbake_lib::scanner::{scan, Segment};
//!
//! let segments = scan("Intro\n```mermaid\ngraph TD; A-->B;\n```\nOutro\n");
//! assert_eq!(segments.len(), 3);
//! match &segments[1] {
//!     Segment::Block(block) => assert_eq!(block.source(), "graph TD; A-->B;"),
//!     Segment::Text(_) => unreachable!(),
//! }
//! ```

/// Marker that opens a Mermaid block (after trimming the line).
pub const MERMAID_FENCE: &str = "```mermaid";

/// The bare fence marker.
pub const FENCE: &str = "```";

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FenceState {
    /// Not inside a Mermaid block.
    #[default]
    Outside,
    /// Inside a Mermaid block, with `depth` nested fences currently open.
    InFence {
        /// Fences opened inside the block that have not been closed yet.
        depth: usize,
    },
}

/// What a single line means to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Ordinary document text outside any Mermaid block.
    Text,
    /// Opens a Mermaid block.
    Open,
    /// Literal content of the current block.
    Content,
    /// Opens a fence nested inside the block; kept as content.
    NestedOpen,
    /// Closes a nested fence; kept as content.
    NestedClose,
    /// Closes the Mermaid block.
    Close,
}

impl FenceState {
    /// Transition on one line, returning the next state and the line's role.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use mmbake_lib::scanner::{FenceState, LineAction};
    ///
    /// let (state, action) = FenceState::Outside.step("```mermaid\n");
    /// assert_eq!(action, LineAction::Open);
    /// let (state, action) = state.step("```yaml\n");
    /// assert_eq!((state, action), (FenceState::InFence { depth: 1 }, LineAction::NestedOpen));
    /// let (state, action) = state.step("```\n");
    /// assert_eq!((state, action), (FenceState::InFence { depth: 0 }, LineAction::NestedClose));
    /// let (state, action) = state.step("```");
    /// assert_eq!((state, action), (FenceState::Outside, LineAction::Close));
    /// ```
    pub fn step(self, line: &str) -> (FenceState, LineAction) {
        let trimmed = line.trim();
        match self {
            FenceState::Outside if trimmed.starts_with(MERMAID_FENCE) => {
                (FenceState::InFence { depth: 0 }, LineAction::Open)
            }
            FenceState::Outside => (FenceState::Outside, LineAction::Text),
            FenceState::InFence { depth } if trimmed == FENCE => match depth {
                0 => (FenceState::Outside, LineAction::Close),
                _ => (FenceState::InFence { depth: depth - 1 }, LineAction::NestedClose),
            },
            FenceState::InFence { depth } if trimmed.starts_with(FENCE) => {
                (FenceState::InFence { depth: depth + 1 }, LineAction::NestedOpen)
            }
            FenceState::InFence { depth } => (FenceState::InFence { depth }, LineAction::Content),
        }
    }
}

/// A top-level Mermaid block found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// 1-based line number of the opening fence.
    pub line: usize,
    /// The opening fence line, terminator included.
    pub open: &'a str,
    /// Raw content lines between the fences, terminators included.
    pub content: Vec<&'a str>,
    /// The closing fence line; `None` when the document ended inside the block.
    pub close: Option<&'a str>,
}

impl<'a> FencedBlock<'a> {
    fn opened(line: usize, open: &'a str) -> Self {
        Self {
            line,
            open,
            content: Vec::new(),
            close: None,
        }
    }

    /// Whether the block reached its closing fence.
    pub fn is_terminated(&self) -> bool {
        self.close.is_some()
    }

    /// The diagram source: content lines joined with `\n`, outer whitespace
    /// trimmed, interior whitespace untouched.
    pub fn source(&self) -> String {
        self.content
            .iter()
            .map(|line| strip_terminator(line))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Length in bytes of the block as it appeared in the document.
    pub fn raw_len(&self) -> usize {
        self.open.len()
            + self.content.iter().map(|line| line.len()).sum::<usize>()
            + self.close.map_or(0, str::len)
    }

    /// Appends the block exactly as it appeared in the document.
    pub fn write_raw(&self, out: &mut String) {
        out.push_str(self.open);
        for line in &self.content {
            out.push_str(line);
        }
        if let Some(close) = self.close {
            out.push_str(close);
        }
    }

    /// The block exactly as it appeared in the document.
    pub fn raw(&self) -> String {
        let mut out = String::new();
        self.write_raw(&mut out);
        out
    }

    /// Line terminator of the block's last line (`""`, `"\n"` or `"\r\n"`).
    pub fn line_ending(&self) -> &'a str {
        let last = self
            .close
            .or_else(|| self.content.last().copied())
            .unwrap_or(self.open);
        &last[strip_terminator(last).len()..]
    }
}

/// A piece of a scanned document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Verbatim text outside any Mermaid block.
    Text(&'a str),
    /// A Mermaid block.
    Block(FencedBlock<'a>),
}

/// Splits a document into verbatim text runs and top-level Mermaid blocks.
///
/// An unterminated block at the end of the document is still returned as a
/// [`Segment::Block`] (with `close: None`) so that callers reproduce it
/// unchanged.
pub fn scan(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut state = FenceState::default();
    let mut block: Option<FencedBlock<'_>> = None;
    let mut text_start = 0;
    let mut offset = 0;

    for (index, line) in text.split_inclusive('\n').enumerate() {
        let (next, action) = state.step(line);
        tracing::trace!(line = index + 1, ?state, ?action, "scanned line");

        match action {
            LineAction::Text => {}
            LineAction::Open => {
                if offset > text_start {
                    segments.push(Segment::Text(&text[text_start..offset]));
                }
                block = Some(FencedBlock::opened(index + 1, line));
            }
            LineAction::Content | LineAction::NestedOpen | LineAction::NestedClose => {
                if let Some(block) = block.as_mut() {
                    block.content.push(line);
                }
            }
            LineAction::Close => {
                if let Some(mut finished) = block.take() {
                    finished.close = Some(line);
                    segments.push(Segment::Block(finished));
                }
                text_start = offset + line.len();
            }
        }

        offset += line.len();
        state = next;
    }

    match block {
        Some(unterminated) => {
            tracing::debug!(line = unterminated.line, "mermaid block is never closed");
            segments.push(Segment::Block(unterminated));
        }
        None if text_start < text.len() => segments.push(Segment::Text(&text[text_start..])),
        None => {}
    }

    segments
}

fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks<'a>(segments: &'a [Segment<'a>]) -> Vec<&'a FencedBlock<'a>> {
        segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Block(block) => Some(block),
                Segment::Text(_) => None,
            })
            .collect()
    }

    fn reassemble(segments: &[Segment<'_>]) -> String {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Block(block) => block.write_raw(&mut out),
            }
        }
        out
    }

    #[test]
    fn test_step_outside_ignores_plain_fences() {
        assert_eq!(
            FenceState::Outside.step("```rust\n"),
            (FenceState::Outside, LineAction::Text)
        );
        assert_eq!(
            FenceState::Outside.step("```\n"),
            (FenceState::Outside, LineAction::Text)
        );
    }

    #[test]
    fn test_step_opens_on_indented_fence_with_info() {
        assert_eq!(
            FenceState::Outside.step("   ```mermaid title=\"x\"\n"),
            (FenceState::InFence { depth: 0 }, LineAction::Open)
        );
    }

    #[test]
    fn test_step_nested_mermaid_fence_counts_as_nesting() {
        assert_eq!(
            FenceState::InFence { depth: 0 }.step("```mermaid"),
            (FenceState::InFence { depth: 1 }, LineAction::NestedOpen)
        );
    }

    #[test]
    fn test_step_plain_line_inside_keeps_depth() {
        assert_eq!(
            FenceState::InFence { depth: 2 }.step("  A --> B\n"),
            (FenceState::InFence { depth: 2 }, LineAction::Content)
        );
    }

    #[test]
    fn test_step_bare_fence_with_whitespace_closes() {
        assert_eq!(
            FenceState::InFence { depth: 0 }.step("  ```  \r\n"),
            (FenceState::Outside, LineAction::Close)
        );
    }

    #[test]
    fn test_scan_plain_document_is_one_text_segment() {
        let text = "# Title\n\n```rust\nfn main() {}\n```\n";
        assert_eq!(scan(text), vec![Segment::Text(text)]);
    }

    #[test]
    fn test_scan_empty_document() {
        assert!(scan("").is_empty());
    }

    #[test]
    fn test_scan_single_block() {
        let segments = scan("```mermaid\ngraph TD; A-->B;\n```");
        assert_eq!(segments.len(), 1);
        let block = blocks(&segments)[0];
        assert_eq!(block.line, 1);
        assert_eq!(block.open, "```mermaid\n");
        assert_eq!(block.content, vec!["graph TD; A-->B;\n"]);
        assert_eq!(block.close, Some("```"));
        assert_eq!(block.source(), "graph TD; A-->B;");
        assert_eq!(block.line_ending(), "");
    }

    #[test]
    fn test_scan_nested_fence_does_not_close_block() {
        let text = "```mermaid\ngraph TD\n```yaml\nkey: value\n```\nA-->B\n```\nafter\n";
        let segments = scan(text);
        let found = blocks(&segments);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source(), "graph TD\n```yaml\nkey: value\n```\nA-->B");
        assert_eq!(segments.last(), Some(&Segment::Text("after\n")));
    }

    #[test]
    fn test_scan_doubly_nested_fences() {
        let text = "```mermaid\n```md\n```yaml\na: 1\n```\n```\n```\n";
        let segments = scan(text);
        let found = blocks(&segments);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content.len(), 5);
        assert!(found[0].is_terminated());
    }

    #[test]
    fn test_scan_unterminated_block_is_kept_whole() {
        let text = "intro\n```mermaid\ngraph TD\n```yaml\nx: 1\n```\n";
        let segments = scan(text);
        assert_eq!(segments.len(), 2);
        let found = blocks(&segments);
        assert!(!found[0].is_terminated());
        assert_eq!(reassemble(&segments), text);
    }

    #[test]
    fn test_scan_open_fence_as_last_line() {
        let segments = scan("text\n```mermaid");
        let found = blocks(&segments);
        assert_eq!(found.len(), 1);
        assert!(found[0].content.is_empty());
        assert_eq!(found[0].source(), "");
        assert_eq!(reassemble(&segments), "text\n```mermaid");
    }

    #[test]
    fn test_scan_multiple_blocks_in_order() {
        let text = "a\n```mermaid\ngraph TD; A-->B;\n```\nb\n```mermaid\ngantt\n```\nc";
        let segments = scan(text);
        let found = blocks(&segments);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].line, 2);
        assert_eq!(found[1].line, 6);
        assert_eq!(found[1].source(), "gantt");
        assert_eq!(reassemble(&segments), text);
    }

    #[test]
    fn test_raw_len_counts_every_line() {
        let text = "```mermaid\r\nsample one\nsample two\n```\nx\n```mermaid\nopen";
        let segments = scan(text);
        let found = blocks(&segments);

        assert_eq!(found[0].raw_len(), "```mermaid\r\nsample one\nsample two\n```\n".len());
        assert_eq!(found[1].raw_len(), "```mermaid\nopen".len());
        for block in found {
            assert_eq!(block.raw_len(), block.raw().len());
        }
    }

    #[test]
    fn test_scan_preserves_crlf() {
        let text = "x\r\n```mermaid\r\nflowchart LR\r\n  A-->B\r\n```\r\ny\r\n";
        let segments = scan(text);
        let found = blocks(&segments);
        assert_eq!(found[0].source(), "flowchart LR\n  A-->B");
        assert_eq!(found[0].line_ending(), "\r\n");
        assert_eq!(reassemble(&segments), text);
    }

    #[test]
    fn test_scan_adjacent_blocks_have_no_empty_text_between() {
        let text = "```mermaid\ngantt\n```\n```mermaid\njourney\n```\n";
        let segments = scan(text);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| matches!(s, Segment::Block(_))));
    }
}
