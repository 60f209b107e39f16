//! Lexical domain tagging for changed files.
//!
//! Two independent signal sources are unioned: keywords in the file path and
//! keywords in the hunk content (signatures, summaries and raw lines). Three
//! statement-level signals (imports, SQL, guards) are checked per line. There
//! is no semantic analysis; the tags only steer which reviewer sees a file
//! first.

use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::parser::ChangeHunk;
use super::strip_diff_prefix;
use crate::types::Domain;

struct KeywordSignal {
    keyword: &'static str,
    domain: Domain,
}

const fn signal(keyword: &'static str, domain: Domain) -> KeywordSignal {
    KeywordSignal { keyword, domain }
}

/// Substrings of the lowercased file path.
const PATH_SIGNALS: &[KeywordSignal] = &[
    signal("auth", Domain::Security),
    signal("security", Domain::Security),
    signal("crypto", Domain::Security),
    signal("password", Domain::Security),
    signal("token", Domain::Security),
    signal("database", Domain::Performance),
    signal("db", Domain::Performance),
    signal("query", Domain::Performance),
    signal("model", Domain::Performance),
    signal("cache", Domain::Performance),
    signal("test", Domain::Correctness),
    signal("spec", Domain::Correctness),
    signal("config", Domain::Reliability),
    signal("settings", Domain::Reliability),
    signal("env", Domain::Reliability),
];

/// Substrings of the lowercased hunk content.
const CONTENT_SIGNALS: &[KeywordSignal] = &[
    // Security: auth and crypto vocabulary
    signal("auth", Domain::Security),
    signal("password", Domain::Security),
    signal("passwd", Domain::Security),
    signal("secret", Domain::Security),
    signal("token", Domain::Security),
    signal("credential", Domain::Security),
    signal("crypt", Domain::Security),
    signal("hash", Domain::Security),
    signal("cipher", Domain::Security),
    signal("permission", Domain::Security),
    signal("sanitiz", Domain::Security),
    signal("csrf", Domain::Security),
    signal("jwt", Domain::Security),
    // Performance: queries, loops, async, caching
    signal("query", Domain::Performance),
    signal("loop", Domain::Performance),
    signal("async", Domain::Performance),
    signal("await", Domain::Performance),
    signal("cache", Domain::Performance),
    signal("batch", Domain::Performance),
    signal("paginat", Domain::Performance),
    // Correctness: nulls, exceptions, validation
    signal("null", Domain::Correctness),
    signal("none", Domain::Correctness),
    signal("nil", Domain::Correctness),
    signal("undefined", Domain::Correctness),
    signal("exception", Domain::Correctness),
    signal("except", Domain::Correctness),
    signal("catch", Domain::Correctness),
    signal("valid", Domain::Correctness),
    // Reliability: retries, timeouts, resources, transactions
    signal("retry", Domain::Reliability),
    signal("retries", Domain::Reliability),
    signal("timeout", Domain::Reliability),
    signal("resource", Domain::Reliability),
    signal("transaction", Domain::Reliability),
    signal("rollback", Domain::Reliability),
    signal("fallback", Domain::Reliability),
    // Maintainability: structure and refactoring
    signal("class", Domain::Maintainability),
    signal("function", Domain::Maintainability),
    signal("import", Domain::Maintainability),
    signal("refactor", Domain::Maintainability),
    signal("deprecat", Domain::Maintainability),
    signal("interface", Domain::Maintainability),
];

/// Guard/validation markers, matched against each lowercased line.
const GUARD_MARKERS: &[&str] = &["if not ", "raise ", "assert"];

static SQL_STATEMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(?:select\b.*\bfrom|insert\s+into|update\s+\w+\s+set|delete\s+from)\b").ok()
});

/// Tag a file with the review domains it is relevant to.
///
/// The result is sorted ascending and contains no duplicates. A file without
/// hunks yields an empty list.
pub fn tag(path: &str, hunks: &[ChangeHunk]) -> Vec<Domain> {
    if hunks.is_empty() {
        return Vec::new();
    }

    let mut domains = BTreeSet::new();

    let path_lower = path.to_lowercase();
    domains.extend(
        PATH_SIGNALS
            .iter()
            .filter(|s| path_lower.contains(s.keyword))
            .map(|s| s.domain),
    );

    let content = hunk_content(hunks);
    domains.extend(
        CONTENT_SIGNALS
            .iter()
            .filter(|s| content.contains(s.keyword))
            .map(|s| s.domain),
    );

    for line in hunks.iter().flat_map(|h| h.raw_lines.iter()) {
        let statement = strip_diff_prefix(line).trim().to_lowercase();
        if statement.is_empty() {
            continue;
        }
        if is_import_statement(&statement) {
            domains.insert(Domain::Reliability);
        }
        if is_sql_statement(&statement) {
            domains.insert(Domain::Performance);
        }
        if GUARD_MARKERS.iter().any(|marker| statement.contains(marker)) {
            domains.insert(Domain::Correctness);
        }
    }

    domains.into_iter().collect()
}

/// Lowercased concatenation of every hunk's context, summary and raw lines.
fn hunk_content(hunks: &[ChangeHunk]) -> String {
    let mut content = String::new();
    for hunk in hunks {
        content.push_str(&hunk.context_before);
        content.push('\n');
        content.push_str(&hunk.change_summary);
        content.push('\n');
        for line in &hunk.raw_lines {
            content.push_str(line);
            content.push('\n');
        }
    }
    content.to_lowercase()
}

fn is_import_statement(statement: &str) -> bool {
    statement.starts_with("import ")
        || (statement.starts_with("from ") && statement.contains(" import "))
        || (statement.starts_with("use ") && statement.ends_with(';'))
        || statement.starts_with("#include")
        || statement.contains("require(")
}

fn is_sql_statement(statement: &str) -> bool {
    SQL_STATEMENT
        .as_ref()
        .is_some_and(|re| re.is_match(statement))
}
