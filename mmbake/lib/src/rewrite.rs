//! Producing the output document.
//!
//! A block is either replaced whole by a single image reference line or
//! written back byte-for-byte. Text between blocks is always copied verbatim.

use crate::hash::DiagramId;
use crate::scanner::Segment;

/// The Markdown image reference for a rendered diagram, without a line
/// terminator.
///
/// ## Examples
///
/// ```rust
/// use mmbake_lib::DiagramId;
/// use mmbake_lib::rewrite::image_reference;
///
/// let id = DiagramId::of("gantt");
/// assert_eq!(
///     image_reference("Diagram", "images/", &id),
///     format!("![Diagram](images/{id}.png)")
/// );
/// ```
pub fn image_reference(alt_text: &str, link_prefix: &str, id: &DiagramId) -> String {
    format!("![{alt_text}]({link_prefix}{})", id.image_file_name())
}

/// Reassembles `segments`, swapping in `replacements` for blocks.
///
/// `replacements[n]` belongs to the n-th block in document order; `Some` is
/// the reference line that replaces the block, `None` (or a missing entry)
/// keeps the block. The replacement receives the closing fence's line
/// terminator. Unterminated blocks are never replaced.
pub fn rewrite(segments: &[Segment<'_>], replacements: &[Option<String>]) -> String {
    let capacity = segments
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) => text.len(),
            Segment::Block(block) => block.raw_len(),
        })
        .sum();
    let mut out = String::with_capacity(capacity);
    let mut blocks = 0;

    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Block(block) => {
                let replacement = replacements.get(blocks).and_then(Option::as_deref);
                blocks += 1;

                match replacement {
                    Some(line) if block.is_terminated() => {
                        out.push_str(line);
                        out.push_str(block.line_ending());
                    }
                    _ => block.write_raw(&mut out),
                }
            }
        }
    }

    out
}
