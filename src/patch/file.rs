use tracing::debug;

use super::hunk::Hunk;

/// A complete parsed diff for a single file.
///
/// Immutable after parsing; staging state is keyed by hunk index and held
/// separately (see [`crate::stage::StagingState`]), never embedded here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFile {
    /// Text after the `--- ` marker (placeholder `"a"` when absent)
    pub old_file: String,
    /// Text after the `+++ ` marker (placeholder `"b"` when absent)
    pub new_file: String,
    /// All hunks for this file, in source order
    pub hunks: Vec<Hunk>,
}

/// Strip trailing tab metadata (timestamps in some diff flavors)
fn file_name(raw: &str) -> Option<String> {
    let name = raw.split('\t').next().unwrap_or(raw).trim_end();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

impl PatchFile {
    /// Parse one file section: a `---`/`+++` marker pair followed by zero
    /// or more hunks.
    ///
    /// Returns `None` when the marker pair is absent. A section whose pair
    /// parsed but which contains no `@@` marker yields a `PatchFile` with
    /// zero hunks, so "nothing to show" renders the same as a parse
    /// failure. Individual hunks with unparseable headers are skipped.
    #[must_use]
    pub fn parse(section: &str) -> Option<Self> {
        let mut old_file = None;
        let mut new_file = None;

        for line in section.lines() {
            if let Some(rest) = line.strip_prefix("--- ") {
                old_file = file_name(rest);
            } else if let Some(rest) = line.strip_prefix("+++ ") {
                new_file = Some(file_name(rest));
                break;
            } else if line.starts_with("@@ ") {
                break;
            }
        }

        // The marker pair is the section boundary; without the `+++` line
        // this is not a file section at all.
        let new_file = new_file?;

        // Locate hunk starts the same way sections are located: by marker
        // lines, letting Hunk::parse validate each candidate.
        let mut starts = Vec::new();
        let mut search_from = 0;
        while let Some(pos) = section[search_from..].find("\n@@ ") {
            let abs = search_from + pos + 1;
            starts.push(abs);
            search_from = abs + 1;
        }

        let hunks: Vec<Hunk> = starts
            .iter()
            .enumerate()
            .filter_map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(section.len());
                Hunk::parse(&section[start..end])
            })
            .collect();

        if hunks.len() < starts.len() {
            debug!(
                dropped = starts.len() - hunks.len(),
                "dropped hunks with unparseable headers"
            );
        }

        Some(PatchFile {
            old_file: old_file.unwrap_or_else(|| "a".to_string()),
            new_file: new_file.unwrap_or_else(|| "b".to_string()),
            hunks,
        })
    }

    /// Repository path for the staging collaborator: the new-side name
    /// unless the file was deleted, in which case the old-side name.
    #[must_use]
    pub fn path(&self) -> &str {
        if self.new_file == "/dev/null" {
            &self.old_file
        } else {
            &self.new_file
        }
    }
}
