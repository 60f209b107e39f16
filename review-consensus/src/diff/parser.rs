//! Unified diff parser.
//!
//! Scans `git diff --unified=N` output line by line. A `diff --git` header
//! opens a [`FileChange`], a `@@` header opens a [`ChangeHunk`], and body
//! lines accumulate into the open hunk until the next header or the end of
//! input flushes it. Plain unified diffs (only `---`/`+++` markers) are
//! accepted as well.
//!
//! A `---`/`+++` line is a file marker only when no hunk is open or the open
//! hunk has consumed the line counts its header declared. Inside a hunk body
//! it is a removed or added line whose content starts with `--` or `++`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::context::extract_signature;
use super::{strip_diff_prefix, truncate_chars};

/// Maximum number of raw lines captured per hunk.
pub const MAX_RAW_LINES: usize = 50;

/// Maximum characters of a line shown in a change summary snippet.
const SNIPPET_CHARS: usize = 60;

/// Shorter snippet for each side of a `removed → added` summary.
const MODIFICATION_SNIPPET_CHARS: usize = 40;

/// How a single hunk changes the file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HunkChangeType {
    Addition,
    Deletion,
    Modification,
}

impl HunkChangeType {
    fn classify(added: usize, removed: usize) -> Self {
        if removed == 0 {
            Self::Addition
        } else if added == 0 {
            Self::Deletion
        } else {
            Self::Modification
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Deletion => "deletion",
            Self::Modification => "modification",
        }
    }
}

impl fmt::Display for HunkChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a file is changed as a whole.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeType {
    Added,
    Deleted,
    Modified,
    Renamed,
}

impl FileChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Modified => "modified",
            Self::Renamed => "renamed",
        }
    }
}

impl fmt::Display for FileChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous block of changes bounded by a `@@` header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeHunk {
    /// First line of the hunk on the new side (1-based).
    pub line_start: usize,
    /// Last line covered, inclusive:
    /// `line_start + max(added_lines, removed_lines, 1) - 1`.
    pub line_end: usize,
    pub added_lines: usize,
    pub removed_lines: usize,
    /// Enclosing function/class signature, best effort. Empty when unknown.
    pub context_before: String,
    pub change_summary: String,
    pub change_type: HunkChangeType,
    /// Diff body lines with their prefix, at most [`MAX_RAW_LINES`].
    pub raw_lines: Vec<String>,
}

/// All changes to one file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    /// Source path when the file was renamed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub change_type: FileChangeType,
    pub hunks: Vec<ChangeHunk>,
    /// Sorted, deduplicated. Filled in by the manifest builder; empty
    /// straight out of [`parse`].
    #[serde(default)]
    pub domain_tags: Vec<crate::types::Domain>,
    pub total_added: usize,
    pub total_removed: usize,
}

impl FileChange {
    fn new(path: String, change_type: FileChangeType) -> Self {
        Self {
            path,
            old_path: None,
            change_type,
            hunks: Vec::new(),
            domain_tags: Vec::new(),
            total_added: 0,
            total_removed: 0,
        }
    }
}

/// Parse unified diff text into per-file changes.
///
/// Never fails: unknown or malformed lines are ignored. Empty input yields an
/// empty list.
pub fn parse(diff_text: &str) -> Vec<FileChange> {
    let mut parser = DiffParser::default();
    for line in diff_text.lines() {
        parser.feed(line);
    }
    let files = parser.finish();
    tracing::debug!(
        files = files.len(),
        hunks = files.iter().map(|f| f.hunks.len()).sum::<usize>(),
        "parsed diff"
    );
    files
}

/// Parsed `@@ -a[,b] +c[,d] @@ hint` header.
#[derive(Debug, PartialEq)]
struct HunkHeader {
    old_len: usize,
    new_start: usize,
    new_len: usize,
    hint: String,
}

fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let rest = line.strip_prefix("@@ -")?;
    let (ranges, hint) = rest.split_once(" @@")?;
    let (old_range, new_range) = ranges.split_once(" +")?;
    let (_, old_len) = parse_range(old_range)?;
    let (new_start, new_len) = parse_range(new_range)?;
    Some(HunkHeader {
        old_len,
        new_start,
        new_len,
        hint: hint.trim().to_string(),
    })
}

/// Parse `start[,len]` into `(start, len)`. An omitted length means 1.
fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// Extract the new-side path from the remainder of a `diff --git` line.
fn git_header_path(rest: &str) -> String {
    let rest = rest.trim();
    if let Some((_, new_path)) = rest.rsplit_once(" b/") {
        return new_path.trim_matches('"').to_string();
    }
    let last = rest.split_whitespace().last().unwrap_or(rest);
    let last = last.trim_matches('"');
    last.strip_prefix("b/").unwrap_or(last).to_string()
}

/// Path carried by a `---`/`+++` marker, without timestamp or a/ b/ prefix.
fn marker_path(rest: &str) -> String {
    let path = rest.split('\t').next().unwrap_or(rest).trim().trim_matches('"');
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

const DEV_NULL: &str = "/dev/null";

#[derive(Debug)]
struct HunkBuilder {
    line_start: usize,
    hint: String,
    added: usize,
    removed: usize,
    /// Old-side and new-side lines still owed by the header's counts.
    old_remaining: usize,
    new_remaining: usize,
    raw_lines: Vec<String>,
    first_added: Option<String>,
    first_removed: Option<String>,
}

impl HunkBuilder {
    fn new(header: HunkHeader) -> Self {
        Self {
            // A new-side start of 0 only appears when the new side is empty.
            line_start: header.new_start.max(1),
            hint: header.hint,
            added: 0,
            removed: 0,
            old_remaining: header.old_len,
            new_remaining: header.new_len,
            raw_lines: Vec::new(),
            first_added: None,
            first_removed: None,
        }
    }

    fn push_raw(&mut self, line: &str) {
        if self.raw_lines.len() < MAX_RAW_LINES {
            self.raw_lines.push(line.to_string());
        }
    }

    /// Whether the header's line counts are not yet used up.
    fn expects_body(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }

    fn context(&mut self, line: &str) {
        self.old_remaining = self.old_remaining.saturating_sub(1);
        self.new_remaining = self.new_remaining.saturating_sub(1);
        self.push_raw(line);
    }

    fn add(&mut self, line: &str) {
        self.added += 1;
        self.new_remaining = self.new_remaining.saturating_sub(1);
        let text = strip_diff_prefix(line).trim();
        if self.first_added.is_none() && !text.is_empty() {
            self.first_added = Some(text.to_string());
        }
        self.push_raw(line);
    }

    fn remove(&mut self, line: &str) {
        self.removed += 1;
        self.old_remaining = self.old_remaining.saturating_sub(1);
        let text = strip_diff_prefix(line).trim();
        if self.first_removed.is_none() && !text.is_empty() {
            self.first_removed = Some(text.to_string());
        }
        self.push_raw(line);
    }

    fn finish(self) -> ChangeHunk {
        let change_type = HunkChangeType::classify(self.added, self.removed);
        let span = self.added.max(self.removed).max(1);
        let line_end = self.line_start.saturating_add(span - 1);

        let change_summary = self.summarize(change_type);
        let context_before = if self.hint.is_empty() {
            extract_signature(&self.raw_lines).unwrap_or_default()
        } else {
            self.hint
        };

        ChangeHunk {
            line_start: self.line_start,
            line_end,
            added_lines: self.added,
            removed_lines: self.removed,
            context_before,
            change_summary,
            change_type,
            raw_lines: self.raw_lines,
        }
    }

    fn summarize(&self, change_type: HunkChangeType) -> String {
        match change_type {
            HunkChangeType::Addition if self.added == 0 => "No line changes".to_string(),
            HunkChangeType::Addition => {
                side_summary("Added", self.added, self.first_added.as_deref())
            }
            HunkChangeType::Deletion => {
                side_summary("Removed", self.removed, self.first_removed.as_deref())
            }
            HunkChangeType::Modification => {
                let removed = self.first_removed.as_deref().unwrap_or("(blank)");
                let added = self.first_added.as_deref().unwrap_or("(blank)");
                format!(
                    "{} → {}",
                    truncate_chars(removed, MODIFICATION_SNIPPET_CHARS),
                    truncate_chars(added, MODIFICATION_SNIPPET_CHARS)
                )
            }
        }
    }
}

fn side_summary(verb: &str, count: usize, snippet: Option<&str>) -> String {
    let plural = if count == 1 { "" } else { "s" };
    match snippet {
        Some(text) => format!(
            "{verb} {count} line{plural}: {}",
            truncate_chars(text, SNIPPET_CHARS)
        ),
        None => format!("{verb} {count} blank line{plural}"),
    }
}

#[derive(Debug, Default)]
struct DiffParser {
    files: Vec<FileChange>,
    current: Option<FileChange>,
    /// Whether `current` was opened by a `diff --git` header.
    current_from_git: bool,
    hunk: Option<HunkBuilder>,
    /// Path from the last `---` marker, used to open plain-diff files.
    pending_old_path: Option<String>,
}

impl DiffParser {
    fn feed(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            self.finish_file();
            self.current = Some(FileChange::new(
                git_header_path(rest),
                FileChangeType::Modified,
            ));
            self.current_from_git = true;
            return;
        }

        if let Some(header) = parse_hunk_header(line) {
            if self.current.is_some() {
                self.finish_hunk();
                self.hunk = Some(HunkBuilder::new(header));
            }
            return;
        }

        let in_body = self.hunk.as_ref().is_some_and(HunkBuilder::expects_body);
        if !in_body {
            if let Some(rest) = line.strip_prefix("+++") {
                if !self.current_from_git {
                    self.open_plain_file(rest);
                }
                return;
            }
            if let Some(rest) = line.strip_prefix("---") {
                if !self.current_from_git {
                    self.finish_file();
                    self.pending_old_path = Some(marker_path(rest));
                }
                return;
            }
        }

        if let Some(hunk) = self.hunk.as_mut() {
            match line.as_bytes().first() {
                Some(b'+') => return hunk.add(line),
                Some(b'-') => return hunk.remove(line),
                Some(b' ') => return hunk.context(line),
                // Some tools strip the space off blank context lines.
                None => return hunk.context(" "),
                Some(b'\\') => return,
                Some(_) => self.finish_hunk(),
            }
        }

        self.apply_metadata(line);
    }

    fn apply_metadata(&mut self, line: &str) {
        let Some(file) = self.current.as_mut() else {
            return;
        };
        if line.starts_with("new file mode") {
            file.change_type = FileChangeType::Added;
        } else if line.starts_with("deleted file mode") {
            file.change_type = FileChangeType::Deleted;
        } else if let Some(from) = line.strip_prefix("rename from ") {
            file.change_type = FileChangeType::Renamed;
            file.old_path = Some(from.trim().to_string());
        }
    }

    fn open_plain_file(&mut self, rest: &str) {
        if self.current.is_some() {
            return;
        }
        let new_path = marker_path(rest);
        let old_path = self.pending_old_path.take();

        let (path, change_type) = if new_path == DEV_NULL {
            (
                old_path.unwrap_or_else(|| new_path.clone()),
                FileChangeType::Deleted,
            )
        } else if old_path.as_deref() == Some(DEV_NULL) {
            (new_path, FileChangeType::Added)
        } else {
            (new_path, FileChangeType::Modified)
        };

        self.current = Some(FileChange::new(path, change_type));
        self.current_from_git = false;
    }

    fn finish_hunk(&mut self) {
        if let Some(builder) = self.hunk.take() {
            if let Some(file) = self.current.as_mut() {
                file.hunks.push(builder.finish());
            }
        }
    }

    fn finish_file(&mut self) {
        self.finish_hunk();
        if let Some(mut file) = self.current.take() {
            file.total_added = file.hunks.iter().map(|h| h.added_lines).sum();
            file.total_removed = file.hunks.iter().map(|h| h.removed_lines).sum();
            self.files.push(file);
        }
        self.current_from_git = false;
    }

    fn finish(mut self) -> Vec<FileChange> {
        self.finish_file();
        self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MODIFY_DIFF: &str = "\
diff --git a/src/auth/login.py b/src/auth/login.py
index 3b18e51..a9c2f4d 100644
--- a/src/auth/login.py
+++ b/src/auth/login.py
@@ -10,4 +10,5 @@ def login(user, password):
     record = lookup(user)
-    if not record:
-        return None
+    if record is None:
+        raise AuthError(\"unknown user\")
+    audit(user)
     return check(record, password)
";

    #[test]
    fn empty_input_yields_no_files() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n").is_empty());
    }

    #[test]
    fn parses_single_modification_hunk() {
        let files = parse(MODIFY_DIFF);
        assert_eq!(files.len(), 1);

        let file = &files[0];
        assert_eq!(file.path, "src/auth/login.py");
        assert_eq!(file.change_type, FileChangeType::Modified);
        assert_eq!(file.total_added, 3);
        assert_eq!(file.total_removed, 2);

        let hunk = &file.hunks[0];
        assert_eq!(hunk.line_start, 10);
        assert_eq!(hunk.line_end, 12);
        assert_eq!(hunk.change_type, HunkChangeType::Modification);
        assert_eq!(hunk.context_before, "def login(user, password):");
        assert_eq!(hunk.change_summary, "if not record: → if record is None:");
        assert_eq!(hunk.raw_lines.len(), 7);
    }

    #[test]
    fn line_end_uses_larger_side() {
        let mut diff = String::from("diff --git a/x.py b/x.py\n@@ -30,5 +30,2 @@\n");
        for i in 0..5 {
            diff.push_str(&format!("-old {i}\n"));
        }
        diff.push_str("+new 0\n+new 1\n");

        let hunk = &parse(&diff)[0].hunks[0];
        assert_eq!(hunk.removed_lines, 5);
        assert_eq!(hunk.added_lines, 2);
        assert_eq!(hunk.line_end, 34);
    }

    #[test]
    fn pure_deletion_hunk() {
        let diff = "diff --git a/a.rs b/a.rs\n@@ -5,3 +4,0 @@\n-one\n-two\n-three\n";
        let hunk = &parse(diff)[0].hunks[0];
        assert_eq!(hunk.change_type, HunkChangeType::Deletion);
        assert_eq!(hunk.line_start, 4);
        assert_eq!(hunk.line_end, 6);
        assert_eq!(hunk.change_summary, "Removed 3 lines: one");
    }

    #[test]
    fn pure_addition_hunk_without_hint_sniffs_signature() {
        let diff = "\
diff --git a/pkg/server.go b/pkg/server.go
@@ -0,0 +1,3 @@
+func (s *Server) Start(ctx context.Context) error {
+    return s.listen(ctx)
+}
";
        let hunk = &parse(diff)[0].hunks[0];
        assert_eq!(hunk.change_type, HunkChangeType::Addition);
        assert_eq!(hunk.line_start, 1);
        assert_eq!(hunk.line_end, 3);
        assert_eq!(
            hunk.context_before,
            "func (s *Server) Start(ctx context.Context) error"
        );
        assert!(hunk.change_summary.starts_with("Added 3 lines: func (s *Server)"));
    }

    #[test]
    fn file_mode_headers_set_change_type() {
        let diff = "\
diff --git a/new.txt b/new.txt
new file mode 100644
--- /dev/null
+++ b/new.txt
@@ -0,0 +1 @@
+hello
diff --git a/gone.txt b/gone.txt
deleted file mode 100644
--- a/gone.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
diff --git a/old_name.rs b/new_name.rs
similarity index 90%
rename from old_name.rs
rename to new_name.rs
";
        let files = parse(diff);
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].change_type, FileChangeType::Added);
        assert_eq!(files[1].change_type, FileChangeType::Deleted);
        assert_eq!(files[1].hunks[0].line_start, 1);
        assert_eq!(files[2].change_type, FileChangeType::Renamed);
        assert_eq!(files[2].path, "new_name.rs");
        assert_eq!(files[2].old_path.as_deref(), Some("old_name.rs"));
        assert!(files[2].hunks.is_empty());
    }

    #[test]
    fn multiple_hunks_per_file_flush_in_order() {
        let diff = "\
diff --git a/lib.rs b/lib.rs
@@ -1,2 +1,3 @@ fn first() {
 a
+b
 c
@@ -40,2 +41,2 @@ impl Thing {
-    old();
+    new();
";
        let file = &parse(diff)[0];
        assert_eq!(file.hunks.len(), 2);
        assert_eq!(file.hunks[0].context_before, "fn first() {");
        assert_eq!(file.hunks[1].line_start, 41);
        assert_eq!(file.hunks[1].context_before, "impl Thing {");
        assert_eq!(file.total_added, 2);
        assert_eq!(file.total_removed, 1);
    }

    #[test]
    fn marker_lines_are_not_counted() {
        let diff = "\
diff --git a/a.txt b/a.txt
--- a/a.txt
+++ b/a.txt
@@ -1 +1 @@
-x
+y
";
        let file = &parse(diff)[0];
        assert_eq!(file.total_added, 1);
        assert_eq!(file.total_removed, 1);
    }

    #[test]
    fn plain_unified_diff_without_git_header() {
        let diff = "\
--- a/README.md\t2024-01-01 00:00:00
+++ b/README.md\t2024-01-02 00:00:00
@@ -1,1 +1,2 @@
 # Title
+More text
--- /dev/null
+++ b/NOTES.md
@@ -0,0 +1 @@
+notes
";
        let files = parse(diff);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "README.md");
        assert_eq!(files[0].change_type, FileChangeType::Modified);
        assert_eq!(files[0].total_added, 1);
        assert_eq!(files[1].path, "NOTES.md");
        assert_eq!(files[1].change_type, FileChangeType::Added);
    }

    #[test]
    fn raw_lines_are_capped() {
        let mut diff = String::from("diff --git a/big.txt b/big.txt\n@@ -0,0 +1,80 @@\n");
        for i in 0..80 {
            diff.push_str(&format!("+line {i}\n"));
        }
        let hunk = &parse(&diff)[0].hunks[0];
        assert_eq!(hunk.added_lines, 80);
        assert_eq!(hunk.raw_lines.len(), MAX_RAW_LINES);
        assert_eq!(hunk.line_end, 80);
    }

    #[test]
    fn malformed_lines_are_ignored() {
        let diff = "\
garbage before any header
@@ -1 +1 @@
+orphan hunk line
diff --git a/ok.txt b/ok.txt
@@ -x,1 +1,1 @@
+not a hunk
@@ -1 +1 @@
+real
";
        let files = parse(diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].hunks.len(), 1);
        assert_eq!(files[0].total_added, 1);
    }

    #[test]
    fn hunk_header_parsing() {
        assert_eq!(
            parse_hunk_header("@@ -30,5 +30,2 @@ fn main() {"),
            Some(HunkHeader {
                old_len: 5,
                new_start: 30,
                new_len: 2,
                hint: "fn main() {".to_string(),
            })
        );
        assert_eq!(
            parse_hunk_header("@@ -1 +1 @@"),
            Some(HunkHeader {
                old_len: 1,
                new_start: 1,
                new_len: 1,
                hint: String::new(),
            })
        );
        assert_eq!(parse_hunk_header("@@ garbage @@"), None);
    }

    #[test]
    fn huge_start_line_saturates() {
        let diff = format!("diff --git a/a b/a\n@@ -1 +{} @@\n+x\n+y\n", usize::MAX);
        let hunk = &parse(&diff)[0].hunks[0];
        assert_eq!(hunk.line_start, usize::MAX);
        assert_eq!(hunk.line_end, usize::MAX);
        assert_eq!(hunk.added_lines, 2);
    }

    #[test]
    fn double_dash_content_inside_git_hunk_is_counted() {
        let diff = "\
diff --git a/q.sql b/q.sql
--- a/q.sql
+++ b/q.sql
@@ -1,2 +1,1 @@
--- old comment
-select 0;
+select 1;
";
        let file = &parse(diff)[0];
        let hunk = &file.hunks[0];
        assert_eq!(hunk.removed_lines, 2);
        assert_eq!(hunk.added_lines, 1);
        assert_eq!(hunk.line_end, 2);
        assert_eq!(hunk.change_summary, "-- old comment → select 1;");
    }

    #[test]
    fn double_dash_content_inside_plain_hunk_keeps_the_file_open() {
        let diff = "\
--- a/q.sql
+++ b/q.sql
@@ -1,3 +1,4 @@
 -- comment
--- old comment
+++counter;
+select 1;
+select 2;
 end
--- a/r.sql
+++ b/r.sql
@@ -1 +1 @@
-a
+b
";
        let files = parse(diff);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "q.sql");
        assert_eq!(files[0].total_added, 3);
        assert_eq!(files[0].total_removed, 1);
        assert_eq!(files[1].path, "r.sql");
        assert_eq!(files[1].total_added, 1);
        assert_eq!(files[1].total_removed, 1);
    }
}
