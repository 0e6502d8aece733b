use std::fmt;

use nom::bytes::complete::tag;
use nom::character::complete::{char, u32 as decimal};
use nom::combinator::opt;
use nom::sequence::preceded;
use nom::{IResult, Parser};
use tracing::debug;

use super::line::{Line, LineKind};

/// One `@@ ... @@` region of a unified diff.
///
/// Lines are stored contiguously in source order and are never reordered
/// or mutated after parsing. Hunks are addressed by their position within
/// a [`super::PatchFile`]; that index is invalidated by any re-parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// The literal header line, including any trailing section heading
    pub header: String,
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<Line>,
    /// Indices of lines followed by a `\ No newline at end of file` marker
    pub no_newline_after: Vec<usize>,
}

/// Parse one side of a hunk range: `12,5` or bare `12` (count defaults to 1)
fn range(input: &str) -> IResult<&str, (u32, u32)> {
    let (input, start) = decimal(input)?;
    let (input, count) = opt(preceded(char(','), decimal)).parse(input)?;
    Ok((input, (start, count.unwrap_or(1))))
}

/// Parse `@@ -a,b +c,d @@` into ((a, b), (c, d))
fn header_ranges(input: &str) -> IResult<&str, ((u32, u32), (u32, u32))> {
    let (input, _) = tag("@@ -").parse(input)?;
    let (input, old) = range(input)?;
    let (input, _) = tag(" +").parse(input)?;
    let (input, new) = range(input)?;
    let (input, _) = tag(" @@").parse(input)?;
    Ok((input, (old, new)))
}

impl Hunk {
    /// Parse a hunk from diff text (header line plus body lines).
    ///
    /// Returns `None` when the header does not match `@@ -a,b +c,d @@`.
    /// Body lines are classified by their leading marker; anything that is
    /// not `+`, `-`, or a no-newline marker counts as context. Line numbers
    /// are assigned by the dual walk from the header starts.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut lines_iter = text.lines();
        let header = lines_iter.next()?;

        let Ok((_, ((old_start, old_lines), (new_start, new_lines)))) = header_ranges(header)
        else {
            debug!(header, "skipping hunk with unparseable header");
            return None;
        };

        let mut lines = Vec::new();
        let mut no_newline_after = Vec::new();
        let mut old_line = old_start;
        let mut new_line = new_start;
        let mut remaining_old = old_lines;
        let mut remaining_new = new_lines;

        for raw in lines_iter {
            if raw.starts_with('\\') {
                // "\ No newline at end of file" - applies to the preceding line
                if !lines.is_empty() {
                    no_newline_after.push(lines.len() - 1);
                }
                continue;
            }
            // The header counts bound the body; anything past them belongs
            // to the next file's preamble.
            if remaining_old == 0 && remaining_new == 0 {
                break;
            }
            if let Some(content) = raw.strip_prefix('+') {
                lines.push(Line::addition(content, new_line));
                new_line += 1;
                remaining_new = remaining_new.saturating_sub(1);
            } else if let Some(content) = raw.strip_prefix('-') {
                lines.push(Line::deletion(content, old_line));
                old_line += 1;
                remaining_old = remaining_old.saturating_sub(1);
            } else {
                let content = raw.strip_prefix(' ').unwrap_or(raw);
                lines.push(Line::context(content, old_line, new_line));
                old_line += 1;
                new_line += 1;
                remaining_old = remaining_old.saturating_sub(1);
                remaining_new = remaining_new.saturating_sub(1);
            }
        }

        Some(Hunk {
            header: header.to_string(),
            old_start,
            old_lines,
            new_start,
            new_lines,
            lines,
            no_newline_after,
        })
    }
}

/// Re-serializes the hunk back into unified-diff text: a normalized header
/// followed by each line re-prefixed per its kind, in original order. This
/// is the `hunk_patch_text` handed to staging collaborators.
impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_lines, self.new_start, self.new_lines
        )?;

        for (i, line) in self.lines.iter().enumerate() {
            let marker = match line.kind {
                LineKind::Addition => '+',
                LineKind::Deletion => '-',
                LineKind::Context => ' ',
                // Header lines are synthesized by the projector and never
                // stored in a hunk's line list.
                LineKind::Header => continue,
            };
            writeln!(f, "{}{}", marker, line.content)?;
            if self.no_newline_after.contains(&i) {
                writeln!(f, "\\ No newline at end of file")?;
            }
        }

        Ok(())
    }
}
