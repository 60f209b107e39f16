//! Diff manifest: aggregate view of a parsed, tagged diff.
//!
//! The manifest is what reviewers are briefed with. Each reviewer gets a
//! rendering that puts the files relevant to its domain first, with per-hunk
//! summaries, and lists everything else on one line per file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::parser::{FileChange, parse};
use super::tagger::tag;
use crate::types::Domain;

/// Summary statistics and tagged file changes for one diff.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffManifest {
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
    /// `lines_added + lines_removed`
    pub lines_modified: usize,
    pub file_changes: Vec<FileChange>,
    /// Domain → paths of files tagged with that domain, in diff order.
    pub domain_hints: BTreeMap<Domain, Vec<String>>,
}

/// Parse `diff_text`, tag every file, and aggregate the result.
pub fn build_manifest(diff_text: &str) -> DiffManifest {
    crate::measure_time!("build_manifest", {
        let files = parse(diff_text)
            .into_iter()
            .map(|mut file| {
                file.domain_tags = tag(&file.path, &file.hunks);
                file
            })
            .collect();
        DiffManifest::from_files(files)
    })
}

impl DiffManifest {
    /// Aggregate already-tagged file changes.
    pub fn from_files(file_changes: Vec<FileChange>) -> Self {
        let lines_added: usize = file_changes.iter().map(|f| f.total_added).sum();
        let lines_removed: usize = file_changes.iter().map(|f| f.total_removed).sum();

        let mut domain_hints: BTreeMap<Domain, Vec<String>> = BTreeMap::new();
        for file in &file_changes {
            for domain in &file.domain_tags {
                domain_hints
                    .entry(*domain)
                    .or_default()
                    .push(file.path.clone());
            }
        }

        Self {
            files_changed: file_changes.len(),
            lines_added,
            lines_removed,
            lines_modified: lines_added + lines_removed,
            file_changes,
            domain_hints,
        }
    }

    /// Paths tagged with `domain` (empty when none).
    pub fn paths_for(&self, domain: Domain) -> &[String] {
        self.domain_hints
            .get(&domain)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Compact briefing for a reviewer focused on `domain`.
    ///
    /// Files in `domain_hints[domain]` come first with their hunk summaries;
    /// the remaining files follow on one line each.
    pub fn render(&self, domain: Domain) -> String {
        let relevant = self.paths_for(domain);
        let mut out = self.header();
        let _ = writeln!(
            out,
            "Focus: {domain} ({} of {} files)",
            relevant.len(),
            self.files_changed
        );

        if relevant.is_empty() {
            let _ = writeln!(out, "\nNo files flagged for {domain}.");
        } else {
            out.push('\n');
            for file in self.files_in(relevant, true) {
                render_file(&mut out, file, true);
            }
        }

        let others: Vec<&FileChange> = self.files_in(relevant, false).collect();
        if !others.is_empty() {
            out.push_str("\nOther files:\n");
            for file in others {
                render_file(&mut out, file, false);
            }
        }
        out
    }

    /// Domain-neutral briefing with every file's hunk summaries.
    pub fn render_all(&self) -> String {
        let mut out = self.header();
        if !self.file_changes.is_empty() {
            out.push('\n');
        }
        for file in &self.file_changes {
            render_file(&mut out, file, true);
        }
        out
    }

    /// Rough token cost of the embedded context: characters of paths,
    /// signatures and summaries divided by four.
    pub fn estimate_tokens(&self) -> usize {
        let chars: usize = self
            .file_changes
            .iter()
            .map(|file| {
                file.path.chars().count()
                    + file
                        .hunks
                        .iter()
                        .map(|h| h.context_before.chars().count() + h.change_summary.chars().count())
                        .sum::<usize>()
            })
            .sum();
        chars / 4
    }

    fn header(&self) -> String {
        let plural = if self.files_changed == 1 { "" } else { "s" };
        format!(
            "Diff manifest: {} file{plural} changed (+{} -{})\n",
            self.files_changed, self.lines_added, self.lines_removed
        )
    }

    fn files_in<'a>(
        &'a self,
        paths: &'a [String],
        member: bool,
    ) -> impl Iterator<Item = &'a FileChange> + 'a {
        self.file_changes
            .iter()
            .filter(move |file| paths.contains(&file.path) == member)
    }
}

fn render_file(out: &mut String, file: &FileChange, with_hunks: bool) {
    let _ = write!(
        out,
        "* {} [{}] +{} -{}",
        file.path, file.change_type, file.total_added, file.total_removed
    );
    if let Some(old_path) = &file.old_path {
        let _ = write!(out, " (from {old_path})");
    }
    if !file.domain_tags.is_empty() {
        let tags: Vec<&str> = file.domain_tags.iter().map(Domain::as_str).collect();
        let _ = write!(out, " {{{}}}", tags.join(", "));
    }
    out.push('\n');

    if !with_hunks {
        return;
    }
    for hunk in &file.hunks {
        let _ = write!(
            out,
            "  - L{}-{} {}",
            hunk.line_start, hunk.line_end, hunk.change_type
        );
        if !hunk.context_before.is_empty() {
            let _ = write!(out, " in `{}`", hunk.context_before);
        }
        let _ = writeln!(out, ": {}", hunk.change_summary);
    }
}
