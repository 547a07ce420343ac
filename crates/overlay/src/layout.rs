//! Layout normalization.
//!
//! Converts the raw per-page result of the external layout-analysis
//! service into the internal line/box model, unifying coordinate units
//! along the way:
//!
//! ```text
//! AnalysisResult  ->  PageLayout[]  ->  { matcher, highlight } inputs
//!   (wire shape)       normalize
//! ```
//!
//! The analysis service reports polygons in a top-left origin, y-down
//! convention; normalized rectangles keep that convention and carry the
//! [`Origin`] tag so downstream consumers flip exactly once.

use serde::Deserialize;

use crate::types::{Origin, PageGeometry, Rect, TextLine};
use crate::OverlayError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// The layout-analysis response, as received from the external service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub pages: Vec<AnalysisPage>,
    /// Document-level paragraphs, each anchored to a page through its
    /// bounding region. Optional; not every analysis model emits them.
    #[serde(default)]
    pub paragraphs: Vec<AnalysisParagraph>,
}

/// One analyzed page: dimensions, measurement unit, and detected lines in
/// reading order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPage {
    /// 1-based page number.
    pub page_number: u32,
    pub width: f32,
    pub height: f32,
    /// Measurement unit for coordinates and dimensions ("inch", "point",
    /// or "pixel"). Missing means point.
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub lines: Vec<AnalysisLine>,
}

/// A detected text line with its bounding polygon, a flat
/// `[x0, y0, x1, y1, ...]` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisLine {
    pub content: String,
    #[serde(default)]
    pub polygon: Vec<f32>,
}

/// A document-level paragraph anchored to a page by a bounding region.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisParagraph {
    pub content: String,
    #[serde(default)]
    pub bounding_regions: Vec<BoundingRegion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingRegion {
    pub page_number: u32,
    #[serde(default)]
    pub polygon: Vec<f32>,
}

impl AnalysisResult {
    /// Parse an analysis response from its JSON encoding.
    pub fn from_json(bytes: &[u8]) -> Result<Self, OverlayError> {
        serde_json::from_slice(bytes)
            .map_err(|e| OverlayError::MalformedLayout(format!("invalid analysis JSON: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Normalized model
// ---------------------------------------------------------------------------

/// One page's normalized layout: geometry in points plus its text lines
/// in reading order.
#[derive(Debug, Clone)]
pub struct PageLayout {
    /// 0-based page index.
    pub index: usize,
    pub geometry: PageGeometry,
    pub lines: Vec<TextLine>,
}

/// Points per unit of the analysis coordinate space.
fn unit_scale(unit: Option<&str>) -> f32 {
    match unit {
        Some("inch") => 72.0,
        // Pixel output is already aligned with the rendered page surface.
        _ => 1.0,
    }
}

/// Convert a bounding polygon to an axis-aligned rectangle in points.
///
/// Needs at least two `(x, y)` pairs. Non-finite coordinates are
/// rejected; analysis output containing them has no usable position.
fn polygon_to_rect(polygon: &[f32], scale: f32) -> Result<Rect, OverlayError> {
    if polygon.len() < 4 || polygon.len() % 2 != 0 {
        return Err(OverlayError::MalformedLayout(format!(
            "bounding polygon has {} coordinates, need at least 4",
            polygon.len()
        )));
    }
    if polygon.iter().any(|v| !v.is_finite()) {
        return Err(OverlayError::MalformedLayout(
            "bounding polygon contains a non-finite coordinate".to_string(),
        ));
    }

    let xs = polygon.iter().step_by(2);
    let ys = polygon.iter().skip(1).step_by(2);
    let min_x = xs.clone().fold(f32::INFINITY, |a, &b| a.min(b));
    let max_x = xs.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let min_y = ys.clone().fold(f32::INFINITY, |a, &b| a.min(b));
    let max_y = ys.fold(f32::NEG_INFINITY, |a, &b| a.max(b));

    Ok(Rect::new(
        min_x * scale,
        min_y * scale,
        (max_x - min_x) * scale,
        (max_y - min_y) * scale,
        Origin::TopLeftYDown,
    ))
}

/// Normalize a raw analysis result into per-page line sets.
///
/// Lines keep the source reading order; page-anchored paragraphs are
/// appended after the page's lines so the more granular line matches win
/// reading-order tie-breaks. A line without a usable position or a
/// paragraph anchored to an unknown page aborts the document with
/// [`OverlayError::MalformedLayout`]. Pages with zero detected lines are
/// valid.
pub fn normalize(analysis: &AnalysisResult) -> Result<Vec<PageLayout>, OverlayError> {
    let page_count = analysis.pages.len();
    let mut pages = Vec::with_capacity(page_count);

    for (index, page) in analysis.pages.iter().enumerate() {
        let scale = unit_scale(page.unit.as_deref());
        if !(page.width.is_finite() && page.height.is_finite())
            || page.width <= 0.0
            || page.height <= 0.0
        {
            return Err(OverlayError::MalformedLayout(format!(
                "page {} has invalid dimensions {}x{}",
                page.page_number, page.width, page.height
            )));
        }

        let geometry = PageGeometry {
            width: page.width * scale,
            height: page.height * scale,
        };

        let mut lines = Vec::with_capacity(page.lines.len());
        for line in &page.lines {
            let rect = polygon_to_rect(&line.polygon, scale)?;
            lines.push(TextLine {
                text: line.content.clone(),
                rect,
                page_index: index,
            });
        }

        pages.push(PageLayout {
            index,
            geometry,
            lines,
        });
    }

    for paragraph in &analysis.paragraphs {
        let Some(region) = paragraph.bounding_regions.first() else {
            // A paragraph without an anchor cannot be placed; skip it.
            continue;
        };
        let index = region.page_number as usize;
        if index == 0 || index > page_count {
            return Err(OverlayError::MalformedLayout(format!(
                "paragraph anchored to unknown page {}",
                region.page_number
            )));
        }
        let index = index - 1;
        let scale = unit_scale(analysis.pages[index].unit.as_deref());
        let rect = polygon_to_rect(&region.polygon, scale)?;
        pages[index].lines.push(TextLine {
            text: paragraph.content.clone(),
            rect,
            page_index: index,
        });
    }

    Ok(pages)
}
