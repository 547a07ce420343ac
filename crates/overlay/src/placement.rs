//! Placement computation: where a filled value lands relative to its
//! matched label.
//!
//! All geometry here stays in the analysis convention (top-left origin,
//! y-down); the compositor performs the single flip into page space.
//! The collision shift and width estimate are documented best-effort
//! heuristics, not guarantees, and their knobs live in
//! [`OverlayConfig`].

use crate::types::{FillMap, Match, OverlayConfig, PageGeometry, Placement, Rect};

/// Upper bound on downward collision shifts for a single placement.
/// Adversarial label layouts stop moving after this many increments.
const MAX_SHIFT_ATTEMPTS: usize = 16;

/// A value that did not fit in the space remaining before the right
/// margin and was clipped. Informational; the text is still rendered and
/// may visually overflow its box.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlacementOverflow {
    pub field_key: String,
    /// Width the value wanted beyond what was available, in points.
    pub clipped_by: f32,
}

/// Compute placements for one page's matches.
///
/// Default policy puts the value immediately right of its label box,
/// vertically centered, offset by the configured gap. The box width is
/// the estimated rendered width at the nominal font size, clipped to the
/// space remaining before the right margin. A label too close to the
/// right margin gets its value directly below instead. Later placements
/// (in reading order) that would overlap an earlier one are shifted down
/// one line height at a time.
pub fn plan_page(
    matches: &[Match],
    fill_map: &FillMap,
    geometry: &PageGeometry,
    cfg: &OverlayConfig,
) -> (Vec<Placement>, Vec<PlacementOverflow>) {
    // Collision policy is defined over reading order of the matched
    // labels, not key order.
    let mut ordered: Vec<&Match> = matches.iter().collect();
    ordered.sort_by(|a, b| {
        (a.line.rect.y, a.line.rect.x)
            .partial_cmp(&(b.line.rect.y, b.line.rect.x))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut placements: Vec<Placement> = Vec::with_capacity(ordered.len());
    let mut overflows: Vec<PlacementOverflow> = Vec::new();

    for m in ordered {
        let Some(value) = fill_map.get(&m.field_key) else {
            continue;
        };
        let (mut rect, overflow) = position_value(&m.line.rect, value, geometry, cfg);

        if let Some(clipped_by) = overflow {
            log::warn!(
                "value for '{}' clipped by {:.1}pt at the right margin",
                m.field_key,
                clipped_by
            );
            overflows.push(PlacementOverflow {
                field_key: m.field_key.clone(),
                clipped_by,
            });
        }

        let mut attempts = 0;
        while attempts < MAX_SHIFT_ATTEMPTS && placements.iter().any(|p| p.rect.overlaps(&rect)) {
            rect.y += cfg.line_height;
            attempts += 1;
        }

        placements.push(Placement {
            text: value.to_string(),
            rect,
            page_index: m.line.page_index,
        });
    }

    (placements, overflows)
}

/// Compute the unshifted box for a value next to (or below) its label.
///
/// Returns the box and, when the estimated width exceeded the available
/// space, the amount that was clipped.
fn position_value(
    label: &Rect,
    value: &str,
    geometry: &PageGeometry,
    cfg: &OverlayConfig,
) -> (Rect, Option<f32>) {
    let beside_x = label.right() + cfg.label_gap;
    let beside_room = geometry.width - cfg.right_margin - beside_x;

    let (x, y) = if beside_room < cfg.edge_fallback_width {
        // Label hugs the right margin; fall back to directly below it.
        (label.x, label.far_y() + cfg.label_gap / 2.0)
    } else {
        // Vertically centered on the label box.
        (beside_x, label.y + (label.height - cfg.font_size) / 2.0)
    };

    let available = (geometry.width - cfg.right_margin - x).max(0.0);
    let estimated = cfg.estimate_text_width(value);
    let width = estimated.min(available);
    let overflow = (estimated > available).then_some(estimated - available);

    (
        Rect::new(x, y, width, cfg.font_size, label.origin),
        overflow,
    )
}
