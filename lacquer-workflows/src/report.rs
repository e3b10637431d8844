//! ABOUTME: Compile-time issue reporting - aggregates parse/validation findings with source context
//! ABOUTME: Every issue carries a position, a source excerpt, and an actionable suggestion

use lacquer_core::document::SourcePosition;
use serde::{Deserialize, Serialize};

/// How serious an issue is. Only `Error` aborts compilation; `Warning`s are
/// surfaced but do not flip `Report::valid` to false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Which validation layer raised the issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Yaml,
    Schema,
    Semantic,
}

/// The `±2` lines of source around an issue's position, with a caret span
/// over the offending token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceExcerpt {
    pub lines: Vec<String>,
    /// Index into `lines` of the line the issue is actually on.
    pub highlight_index: usize,
    pub caret_start: u32,
    pub caret_len: u32,
}

impl SourceExcerpt {
    /// Build the excerpt for `position` out of the full source text, taking
    /// up to two lines of context on either side.
    #[must_use]
    pub fn extract(source: &str, position: SourcePosition, caret_len: u32) -> Self {
        let all_lines: Vec<&str> = source.lines().collect();
        let target = position.line.saturating_sub(1) as usize;
        let start = target.saturating_sub(2);
        let end = (target + 2).min(all_lines.len().saturating_sub(1));

        let lines = all_lines
            .get(start..=end.max(start))
            .unwrap_or_default()
            .iter()
            .map(|s| (*s).to_string())
            .collect();

        Self {
            lines,
            highlight_index: target.saturating_sub(start),
            caret_start: position.column,
            caret_len: caret_len.max(1),
        }
    }
}

/// A single compile-time finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: Category,
    pub code: String,
    pub message: String,
    pub path: String,
    pub position: Option<SourcePosition>,
    pub excerpt: Option<SourceExcerpt>,
    pub suggestion: Option<String>,
}

impl Issue {
    #[must_use]
    pub fn error(category: Category, code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            code: code.into(),
            message: message.into(),
            path: path.into(),
            position: None,
            excerpt: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn warning(category: Category, code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            code: code.into(),
            message: message.into(),
            path: path.into(),
            position: None,
            excerpt: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn with_excerpt(mut self, source: &str) -> Self {
        if let Some(position) = self.position {
            self.excerpt = Some(SourceExcerpt::extract(source, position, 1));
        }
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Aggregated compile-time findings, sorted by position before being
/// returned to the caller. The runtime refuses to execute a document whose
/// report is not `valid`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub issues: Vec<Issue>,
}

impl Report {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.issues.extend(issues);
    }

    pub fn merge(&mut self, other: Report) {
        self.issues.extend(other.issues);
    }

    /// Sort all issues by `(line, column)`, with positionless issues last
    /// and stably ordered amongst themselves.
    pub fn sort_by_position(&mut self) {
        self.issues.sort_by_key(|issue| {
            issue
                .position
                .map_or((u32::MAX, u32::MAX), |p| (p.line, p.column))
        });
    }

    #[must_use]
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    #[must_use]
    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_is_false_when_any_error_present() {
        let mut report = Report::new();
        report.push(Issue::warning(Category::Semantic, "W001", "steps[0]", "unused output"));
        assert!(report.valid());
        report.push(Issue::error(Category::Schema, "E001", "steps[1]", "missing field"));
        assert!(!report.valid());
    }

    #[test]
    fn sort_by_position_orders_positionless_last() {
        let mut report = Report::new();
        report.push(Issue::error(Category::Yaml, "E1", "a", "m").with_position(SourcePosition { line: 5, column: 1 }));
        report.push(Issue::error(Category::Yaml, "E2", "b", "m"));
        report.push(Issue::error(Category::Yaml, "E3", "c", "m").with_position(SourcePosition { line: 2, column: 1 }));
        report.sort_by_position();
        assert_eq!(report.issues[0].code, "E3");
        assert_eq!(report.issues[1].code, "E1");
        assert_eq!(report.issues[2].code, "E2");
    }

    #[test]
    fn excerpt_extracts_two_lines_of_context() {
        let source = "a\nb\nc\nd\ne\nf\ng";
        let excerpt = SourceExcerpt::extract(source, SourcePosition { line: 4, column: 1 }, 1);
        assert_eq!(excerpt.lines, vec!["b", "c", "d", "e", "f"]);
        assert_eq!(excerpt.highlight_index, 2);
    }
}
