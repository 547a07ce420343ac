use overlay::DocumentReport;
use prettytable::row;

use crate::prelude::{eprintln, *};

/// Print a human-readable summary of one document's outcome.
pub fn print_document_report(name: &str, report: &DocumentReport) {
    let mut table = new_table();
    table.add_row(row!["Document", name]);
    table.add_row(row!["Pages", report.page_count]);
    table.add_row(row!["Values placed", report.placements.len()]);
    table.add_row(row!["Highlight boxes", report.highlight_boxes.len()]);
    if !report.unmatched_keys.is_empty() {
        table.add_row(row!["Unmatched keys", report.unmatched_keys.join(", ")]);
    }
    if !report.unmatched_terms.is_empty() {
        table.add_row(row!["Unmatched terms", report.unmatched_terms.join(", ")]);
    }
    if !report.overflows.is_empty() {
        let keys: Vec<&str> = report
            .overflows
            .iter()
            .map(|o| o.field_key.as_str())
            .collect();
        table.add_row(row!["Clipped values", keys.join(", ")]);
    }
    table.printstd();

    for failure in &report.page_failures {
        eprintln!(
            "warning: page {} skipped: {}",
            failure.page_index + 1,
            failure.error
        );
    }
}
