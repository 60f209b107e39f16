//! Best-effort enclosing-signature sniffing for hunks.
//!
//! When a hunk header carries no hint, the first few buffered lines are
//! checked against an ordered table of per-language signature patterns. The
//! first line that matches any pattern wins. Extending the heuristic to a new
//! language means adding a row, not touching the parser.

use regex_lite::Regex;
use std::sync::LazyLock;

use super::{strip_diff_prefix, truncate_chars};

/// Number of buffered lines inspected.
pub const CONTEXT_SCAN_LINES: usize = 10;

/// Maximum characters kept from a matched signature.
const SIGNATURE_CHARS: usize = 80;

struct SignaturePattern {
    /// Language the row targets (diagnostics only).
    language: &'static str,
    pattern: &'static str,
}

const SIGNATURE_PATTERNS: &[SignaturePattern] = &[
    SignaturePattern {
        language: "python",
        pattern: r"^(?:async\s+)?def\s+\w+",
    },
    SignaturePattern {
        language: "class",
        pattern: r"^(?:export\s+)?(?:default\s+)?(?:(?:public|private|protected|abstract|final|static)\s+)*class\s+\w+",
    },
    SignaturePattern {
        language: "javascript",
        pattern: r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*\w+",
    },
    SignaturePattern {
        language: "javascript",
        pattern: r"^(?:export\s+)?const\s+\w+\s*=\s*(?:async\s+)?(?:function\b|\(|\w+\s*=>)",
    },
    SignaturePattern {
        language: "go",
        pattern: r"^func\s+(?:\([^)]*\)\s*)?\w+",
    },
    SignaturePattern {
        language: "rust",
        pattern: r"^(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+\w+",
    },
    SignaturePattern {
        language: "rust",
        pattern: r"^(?:unsafe\s+)?impl\b",
    },
    SignaturePattern {
        language: "rust",
        pattern: r"^(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|mod)\s+\w+",
    },
];

static COMPILED_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    SIGNATURE_PATTERNS
        .iter()
        .filter_map(|row| match Regex::new(row.pattern) {
            Ok(regex) => Some((row.language, regex)),
            Err(err) => {
                tracing::warn!(language = row.language, "invalid signature pattern: {err}");
                None
            }
        })
        .collect()
});

/// Find the first function/class-like signature in the leading buffered
/// lines of a hunk.
///
/// Lines may carry their unified-diff prefix. The returned signature is
/// trimmed and has a trailing `{` or `:` removed.
pub fn extract_signature(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .take(CONTEXT_SCAN_LINES)
        .map(|line| strip_diff_prefix(line).trim())
        .find(|line| COMPILED_PATTERNS.iter().any(|(_, re)| re.is_match(line)))
        .map(clean_signature)
}

fn clean_signature(line: &str) -> String {
    let cleaned = line.trim_end_matches('{').trim_end_matches(':').trim_end();
    truncate_chars(cleaned, SIGNATURE_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(COMPILED_PATTERNS.len(), SIGNATURE_PATTERNS.len());
    }

    #[test]
    fn detects_common_languages() {
        let cases = [
            ("+def handler(event):", "def handler(event)"),
            ("+async def fetch(url):", "async def fetch(url)"),
            (" class UserService(Base):", "class UserService(Base)"),
            ("+export class Api {", "export class Api"),
            ("+function render(props) {", "function render(props)"),
            (
                "+export const load = async (ctx) => {",
                "export const load = async (ctx) =>",
            ),
            ("+func main() {", "func main()"),
            (
                "+    pub(crate) async fn run(&self) -> Result<()> {",
                "pub(crate) async fn run(&self) -> Result<()>",
            ),
            ("+impl Display for Tier {", "impl Display for Tier"),
            ("+pub struct Ledger {", "pub struct Ledger"),
        ];
        for (line, expected) in cases {
            assert_eq!(
                extract_signature(&lines(&[line])).as_deref(),
                Some(expected),
                "line: {line}"
            );
        }
    }

    #[test]
    fn plain_constants_and_statements_are_not_signatures() {
        let raw = lines(&["+const MAX = 10;", "+x = compute()", "+return value"]);
        assert_eq!(extract_signature(&raw), None);
    }

    #[test]
    fn first_matching_line_wins() {
        let raw = lines(&["+x = 1", " def outer():", "+    def inner():"]);
        assert_eq!(extract_signature(&raw).as_deref(), Some("def outer()"));
    }

    #[test]
    fn scan_is_limited_to_leading_lines() {
        let mut raw: Vec<String> = (0..CONTEXT_SCAN_LINES).map(|i| format!("+x{i} = 1")).collect();
        raw.push("+def late():".to_string());
        assert_eq!(extract_signature(&raw), None);
    }
}
