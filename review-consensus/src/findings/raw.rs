//! Raw reviewer findings and the input boundary that validates them.
//!
//! Reviewers produce loosely-shaped JSON. It is parsed here into a lenient
//! [`RawFindingInput`] and validated exactly once into a [`RawFinding`];
//! everything downstream works with the validated struct.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Lower bound for severity and confidence.
pub const MIN_SCORE: f64 = 0.0;
/// Upper bound for severity and confidence.
pub const MAX_SCORE: f64 = 10.0;
/// Severity/confidence assumed when a reviewer omits the field.
pub const DEFAULT_SCORE: f64 = 5.0;

/// Errors raised while validating a single finding.
#[derive(Debug, thiserror::Error)]
pub enum FindingError {
    /// A required field is absent or blank.
    #[error("finding from '{reviewer_id}' is missing required field '{field}'")]
    MissingField {
        reviewer_id: String,
        field: &'static str,
    },

    /// A score field is present but not a finite number.
    #[error("finding from '{reviewer_id}' has invalid {field}: {value}")]
    InvalidScore {
        reviewer_id: String,
        field: &'static str,
        value: String,
    },
}

/// One reviewer's report of one issue, validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawFinding {
    pub file: String,
    pub line_start: usize,
    pub line_end: usize,
    /// Clamped to [0, 10].
    pub severity: f64,
    /// Clamped to [0, 10].
    pub confidence: f64,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub remediation: Vec<String>,
    pub reviewer_id: String,
}

impl RawFinding {
    /// Create a finding covering a single line with default scores.
    pub fn new(
        reviewer_id: impl Into<String>,
        file: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line_start: 1,
            line_end: 1,
            severity: DEFAULT_SCORE,
            confidence: DEFAULT_SCORE,
            category: category.into(),
            description: String::new(),
            remediation: Vec::new(),
            reviewer_id: reviewer_id.into(),
        }
    }

    /// Set the line range; a reversed range is normalized.
    pub fn with_lines(mut self, line_start: usize, line_end: usize) -> Self {
        self.line_start = line_start.min(line_end);
        self.line_end = line_start.max(line_end);
        self
    }

    /// Set severity and confidence, clamped to [0, 10].
    pub fn with_scores(mut self, severity: f64, confidence: f64) -> Self {
        self.severity = clamp_score(severity);
        self.confidence = clamp_score(confidence);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_remediation<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remediation = steps.into_iter().map(Into::into).collect();
        self
    }

    /// Check the invariants a finding must satisfy before deduplication.
    pub fn validate(&self) -> Result<(), FindingError> {
        if self.file.trim().is_empty() {
            return Err(self.missing("file"));
        }
        if self.category.trim().is_empty() {
            return Err(self.missing("category"));
        }
        for (field, value) in [("severity", self.severity), ("confidence", self.confidence)] {
            if !value.is_finite() {
                return Err(FindingError::InvalidScore {
                    reviewer_id: self.reviewer_id.clone(),
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn missing(&self, field: &'static str) -> FindingError {
        FindingError::MissingField {
            reviewer_id: self.reviewer_id.clone(),
            field,
        }
    }
}

/// Clamp into [`MIN_SCORE`, `MAX_SCORE`]. NaN passes through for `validate`.
pub(crate) fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        value
    } else {
        value.clamp(MIN_SCORE, MAX_SCORE)
    }
}

/// A JSON number, or a string that may hold one (`"8"`, `"7.5"`).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_line(&self) -> Option<usize> {
        self.as_f64()
            .filter(|n| n.is_finite() && *n >= 1.0)
            .map(|n| n as usize)
    }

    fn describe(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => format!("{s:?}"),
        }
    }
}

/// Remediation given as one string or a list of steps.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Remediation {
    One(String),
    Many(Vec<String>),
}

impl Remediation {
    fn into_steps(self) -> Vec<String> {
        let steps = match self {
            Self::One(step) => vec![step],
            Self::Many(steps) => steps,
        };
        steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Finding as emitted by a reviewer, before validation.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RawFindingInput {
    #[serde(default, alias = "path", alias = "file_path")]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<NumberOrText>,
    #[serde(default)]
    pub line_start: Option<NumberOrText>,
    #[serde(default)]
    pub line_end: Option<NumberOrText>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Option<NumberOrText>,
    #[serde(default)]
    pub confidence: Option<NumberOrText>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub remediation: Option<Remediation>,
}

impl RawFindingInput {
    /// Validate into a [`RawFinding`] attributed to `reviewer_id`.
    ///
    /// `file` and `category` are required. Missing scores default to
    /// [`DEFAULT_SCORE`]; non-numeric scores are rejected. Missing or
    /// unparseable line numbers default to line 1.
    pub fn into_finding(self, reviewer_id: &str) -> Result<RawFinding, FindingError> {
        let missing = |field| FindingError::MissingField {
            reviewer_id: reviewer_id.to_string(),
            field,
        };

        let file = non_blank(self.file).ok_or_else(|| missing("file"))?;
        let category = non_blank(self.category).ok_or_else(|| missing("category"))?;
        let severity = score_field(reviewer_id, "severity", self.severity.as_ref())?;
        let confidence = score_field(reviewer_id, "confidence", self.confidence.as_ref())?;

        let line_start = self
            .line_start
            .as_ref()
            .or(self.line.as_ref())
            .and_then(NumberOrText::as_line)
            .unwrap_or(1);
        let line_end = self
            .line_end
            .as_ref()
            .and_then(NumberOrText::as_line)
            .unwrap_or(line_start);

        let finding = RawFinding::new(reviewer_id.trim(), file, category)
            .with_lines(line_start, line_end)
            .with_scores(severity, confidence)
            .with_description(self.description.unwrap_or_default().trim())
            .with_remediation(self.remediation.map(Remediation::into_steps).unwrap_or_default());
        Ok(finding)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn score_field(
    reviewer_id: &str,
    field: &'static str,
    value: Option<&NumberOrText>,
) -> Result<f64, FindingError> {
    let Some(raw) = value else {
        return Ok(DEFAULT_SCORE);
    };
    raw.as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| FindingError::InvalidScore {
            reviewer_id: reviewer_id.to_string(),
            field,
            value: raw.describe(),
        })
}

/// Parse one reviewer's output into validated findings.
///
/// Accepts a JSON array of findings, an object with a `findings` array, or a
/// single finding object, optionally wrapped in a ```json fence or buried in
/// surrounding prose. Output that contains no usable JSON yields an empty
/// list; individual malformed findings are dropped. Both cases are logged,
/// neither is an error.
pub fn parse_reviewer_output(text: &str, reviewer_id: &str) -> Vec<RawFinding> {
    let Some(value) = extract_json(text) else {
        warn!(reviewer_id, bytes = text.len(), "no JSON findings in reviewer output");
        return Vec::new();
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("findings") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                warn!(reviewer_id, "reviewer output has a non-array `findings` field");
                return Vec::new();
            }
            None if map.contains_key("file") || map.contains_key("path") => {
                vec![Value::Object(map)]
            }
            None => {
                warn!(reviewer_id, "reviewer output object has no findings");
                return Vec::new();
            }
        },
        other => {
            warn!(reviewer_id, kind = json_kind(&other), "unexpected reviewer output shape");
            return Vec::new();
        }
    };

    let total = items.len();
    let findings: Vec<RawFinding> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let input = match serde_json::from_value::<RawFindingInput>(item) {
                Ok(input) => input,
                Err(err) => {
                    warn!(reviewer_id, index, "dropping unreadable finding: {err}");
                    return None;
                }
            };
            match input.into_finding(reviewer_id) {
                Ok(finding) => Some(finding),
                Err(err) => {
                    warn!(reviewer_id, index, "dropping malformed finding: {err}");
                    None
                }
            }
        })
        .collect();

    debug!(
        reviewer_id,
        accepted = findings.len(),
        dropped = total - findings.len(),
        "parsed reviewer findings"
    );
    findings
}

/// Find the JSON payload in reviewer output.
///
/// Strategies in order: direct parse, last ```json fence, outermost
/// bracket-balanced region.
fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    if let Some(value) = extract_from_fence(trimmed).and_then(|f| serde_json::from_str(&f).ok()) {
        return Some(value);
    }
    extract_balanced_region(trimmed).and_then(|r| serde_json::from_str(r).ok())
}

fn extract_from_fence(content: &str) -> Option<String> {
    let mut fences = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        match current.as_mut() {
            None if trimmed.eq_ignore_ascii_case("```json") || trimmed == "```" => {
                current = Some(Vec::new());
            }
            None => {}
            Some(body) if trimmed == "```" => {
                if !body.is_empty() {
                    fences.push(body.join("\n"));
                }
                current = None;
            }
            Some(body) => body.push(line),
        }
    }

    fences.pop()
}

/// Outermost `[...]` or `{...}` region, respecting string literals.
fn extract_balanced_region(content: &str) -> Option<&str> {
    let start = content.find(['[', '{'])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in content[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&content[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn input_with_line_alias_and_string_scores() {
        let input: RawFindingInput = serde_json::from_str(
            r#"{"file": "src/db.py", "line": 42, "category": "SQL Injection",
                "severity": "9", "confidence": 8.5, "description": " Unsanitized query ",
                "remediation": "Use bound parameters"}"#,
        )
        .unwrap();
        let finding = input.into_finding("security").unwrap();

        assert_eq!(finding.file, "src/db.py");
        assert_eq!((finding.line_start, finding.line_end), (42, 42));
        assert_eq!(finding.severity, 9.0);
        assert_eq!(finding.confidence, 8.5);
        assert_eq!(finding.category, "SQL Injection");
        assert_eq!(finding.description, "Unsanitized query");
        assert_eq!(finding.remediation, vec!["Use bound parameters".to_string()]);
        assert_eq!(finding.reviewer_id, "security");
    }

    #[test]
    fn scores_are_clamped_and_defaulted() {
        let input = RawFindingInput {
            file: Some("a.rs".into()),
            category: Some("bug".into()),
            severity: Some(NumberOrText::Number(14.0)),
            ..Default::default()
        };
        let finding = input.into_finding("correctness").unwrap();
        assert_eq!(finding.severity, MAX_SCORE);
        assert_eq!(finding.confidence, DEFAULT_SCORE);
        assert_eq!(finding.line_start, 1);
    }

    #[test]
    fn reversed_range_is_normalized() {
        let input = RawFindingInput {
            file: Some("a.rs".into()),
            category: Some("bug".into()),
            line_start: Some(NumberOrText::Number(20.0)),
            line_end: Some(NumberOrText::Number(12.0)),
            ..Default::default()
        };
        let finding = input.into_finding("correctness").unwrap();
        assert_eq!((finding.line_start, finding.line_end), (12, 20));
    }

    #[test]
    fn missing_file_or_category_is_rejected() {
        let no_file = RawFindingInput {
            category: Some("bug".into()),
            ..Default::default()
        };
        let err = no_file.into_finding("r1").unwrap_err();
        assert!(matches!(err, FindingError::MissingField { field: "file", .. }));

        let blank_category = RawFindingInput {
            file: Some("a.rs".into()),
            category: Some("   ".into()),
            ..Default::default()
        };
        let err = blank_category.into_finding("r1").unwrap_err();
        assert!(err.to_string().contains("category"));
    }

    #[test]
    fn non_numeric_severity_is_rejected() {
        let input = RawFindingInput {
            file: Some("a.rs".into()),
            category: Some("bug".into()),
            severity: Some(NumberOrText::Text("high".into())),
            ..Default::default()
        };
        assert!(matches!(
            input.into_finding("r1"),
            Err(FindingError::InvalidScore { field: "severity", .. })
        ));
    }

    #[test]
    fn parses_bare_array_and_drops_malformed() {
        let text = r#"[
            {"file": "a.py", "line_start": 3, "line_end": 5, "category": "bug", "severity": 6, "confidence": 7},
            {"category": "bug"},
            {"file": "b.py", "category": "style", "remediation": ["a", " ", "b"]}
        ]"#;
        let findings = parse_reviewer_output(text, "correctness");
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].line_end, 5);
        assert_eq!(findings[1].remediation, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn parses_fenced_object_with_findings_key() {
        let text = "Here is my review.\n\n```json\n{\"findings\": [{\"file\": \"x.go\", \"line\": 7, \"category\": \"race\"}]}\n```\nThanks.";
        let findings = parse_reviewer_output(text, "reliability");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "x.go");
        assert_eq!(findings[0].line_start, 7);
    }

    #[test]
    fn parses_json_buried_in_prose() {
        let text = "Findings follow: [{\"file\": \"x.go\", \"category\": \"leak\", \"description\": \"uses [brackets] and \\\"quotes\\\"\"}] end";
        let findings = parse_reviewer_output(text, "reliability");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].description, "uses [brackets] and \"quotes\"");
    }

    #[test]
    fn single_finding_object_is_accepted() {
        let findings = parse_reviewer_output(r#"{"path": "a.rs", "category": "bug"}"#, "r1");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "a.rs");
    }

    #[test]
    fn garbage_output_yields_nothing() {
        assert!(parse_reviewer_output("", "r1").is_empty());
        assert!(parse_reviewer_output("no issues found", "r1").is_empty());
        assert!(parse_reviewer_output("42", "r1").is_empty());
        assert!(parse_reviewer_output(r#"{"findings": "none"}"#, "r1").is_empty());
    }

    #[test]
    fn validate_flags_blank_fields_and_nan() {
        assert!(RawFinding::new("r1", "a.rs", "bug").validate().is_ok());
        assert!(RawFinding::new("r1", " ", "bug").validate().is_err());
        assert!(RawFinding::new("r1", "a.rs", "").validate().is_err());

        let nan = RawFinding::new("r1", "a.rs", "bug").with_scores(f64::NAN, 5.0);
        assert!(matches!(
            nan.validate(),
            Err(FindingError::InvalidScore { field: "severity", .. })
        ));
    }
}
