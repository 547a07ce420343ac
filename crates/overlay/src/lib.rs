//! Label matching and overlay composition for analyzed documents.
//!
//! Given an externally produced page-layout analysis (text lines with
//! bounding boxes), this crate matches free-text form labels against
//! caller-supplied values, computes where each value should be drawn,
//! locates every occurrence of each highlight term, and composites both
//! as overlays onto the original PDF pages:
//!
//! ```text
//! AnalysisResult -> PageLayout[] -> { Match[], HighlightBox[] }
//!                                      |             |
//!                                  Placement[]       |
//!                                      \            /
//!                                    compose_document -> filled PDF
//! ```
//!
//! The pipeline is a pure, stateless transform per page: nothing is
//! retained across documents, and the shared [`FillMap`],
//! [`SynonymTable`], and term list are read-only throughout.

use serde::Serialize;
use thiserror::Error;

pub mod highlight;
pub mod layout;
pub mod matcher;
pub mod placement;
pub mod render;
pub mod text;
pub mod types;

pub use layout::{AnalysisResult, PageLayout};
pub use placement::PlacementOverflow;
pub use render::{PageFailure, PagePlan};
pub use types::*;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("malformed layout: {0}")]
    MalformedLayout(String),
    #[error("render failure: {0}")]
    Render(String),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// What happened to one document: the composited bytes plus everything
/// the caller needs to know about omissions and per-page failures.
///
/// Unmatched keys and terms are informational, never errors; a document
/// either aborts early with [`OverlayError::MalformedLayout`] or comes
/// back here, possibly with some pages listed in `page_failures`.
#[derive(Debug, Clone)]
pub struct FilledDocument {
    pub pdf: Vec<u8>,
    pub report: DocumentReport,
}

/// The per-document processing report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentReport {
    pub page_count: usize,
    pub placements: Vec<Placement>,
    pub highlight_boxes: Vec<HighlightBox>,
    /// Fill-map keys that matched no line on any page.
    pub unmatched_keys: Vec<String>,
    /// Highlight terms that matched no line on any page.
    pub unmatched_terms: Vec<String>,
    /// Values clipped at the right margin (rendered anyway).
    pub overflows: Vec<PlacementOverflow>,
    /// Pages whose overlays could not be composited.
    pub page_failures: Vec<PageFailure>,
}

/// Run the full pipeline over one document.
///
/// Each page's chain depends only on that page's analysis plus the
/// read-only configuration, so failures are isolated per page: a page
/// that cannot be composited keeps its original content and is recorded
/// in the report. Only a malformed layout aborts the whole document.
pub fn fill_document(
    pdf_bytes: &[u8],
    analysis: &AnalysisResult,
    fill_map: &FillMap,
    table: &SynonymTable,
    highlight_terms: &[String],
    cfg: &OverlayConfig,
) -> Result<FilledDocument, OverlayError> {
    let pages = layout::normalize(analysis)?;

    let mut plans = Vec::with_capacity(pages.len());
    let mut all_matches = Vec::new();
    let mut all_placements = Vec::new();
    let mut all_highlights = Vec::new();
    let mut overflows = Vec::new();

    for page in &pages {
        let matches = matcher::resolve_page(table, fill_map, &page.lines);
        let (placements, page_overflows) =
            placement::plan_page(&matches, fill_map, &page.geometry, cfg);
        let highlights = highlight::locate_page(highlight_terms, &page.lines);

        plans.push(PagePlan {
            page_index: page.index,
            placements: placements.clone(),
            highlights: highlights.clone(),
        });
        all_matches.extend(matches);
        all_placements.extend(placements);
        all_highlights.extend(highlights);
        overflows.extend(page_overflows);
    }

    let (pdf, page_failures) = render::compose_document(pdf_bytes, &plans, cfg)?;

    let report = DocumentReport {
        page_count: pages.len(),
        unmatched_keys: matcher::unmatched_keys(fill_map, &all_matches),
        unmatched_terms: highlight::unmatched_terms(highlight_terms, &all_highlights),
        placements: all_placements,
        highlight_boxes: all_highlights,
        overflows,
        page_failures,
    };

    Ok(FilledDocument { pdf, report })
}
