//! ABOUTME: Validator (C3) - aggregates the structural, AST-shape and semantic layers into a Report
//! ABOUTME: A document with zero error-severity issues is safe to hand to the scheduler

mod ast;
pub(crate) mod semantic;
mod structural;

use crate::report::Report;
use lacquer_core::document::WorkflowDocument;

/// Run all three validation layers and return the aggregated, position-sorted
/// report. Warnings never block compilation; any error does.
#[must_use]
pub fn validate(doc: &WorkflowDocument) -> Report {
    let mut report = Report::new();
    structural::check(doc, &mut report);
    ast::check(doc, &mut report);
    semantic::check(doc, &mut report);
    report.sort_by_position();
    report
}
