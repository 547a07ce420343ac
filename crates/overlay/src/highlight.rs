//! Highlight location: every occurrence of every term across a page's
//! line set, each with an estimated visual extent.
//!
//! Matching is case-insensitive substring containment with no stemming
//! and no word-boundary requirement, so a term like "sign" also matches
//! inside "signature". The horizontal extent of an occurrence is a
//! monospaced-width approximation over the line's box; no font metrics
//! are consulted.

use crate::types::{HighlightBox, Rect, TextLine};

/// Locate every occurrence of every term in one page's lines.
///
/// Each occurrence yields its own box, including multiple occurrences of
/// one term within a single line. Boxes from different terms are never
/// deduplicated, even when they cover the same substring.
pub fn locate_page(terms: &[String], lines: &[TextLine]) -> Vec<HighlightBox> {
    let mut boxes = Vec::new();

    for line in lines {
        let haystack = line.text.to_lowercase();
        let total_chars = haystack.chars().count();
        if total_chars == 0 {
            continue;
        }

        for term in terms {
            let needle = term.to_lowercase();
            if needle.is_empty() {
                continue;
            }
            for (byte_offset, _) in haystack.match_indices(&needle) {
                let start_chars = haystack[..byte_offset].chars().count();
                let len_chars = needle.chars().count();
                boxes.push(HighlightBox {
                    term: term.clone(),
                    rect: char_span_rect(&line.rect, start_chars, len_chars, total_chars),
                    page_index: line.page_index,
                });
            }
        }
    }

    boxes
}

/// Terms that produced no box on any page of the document.
pub fn unmatched_terms(terms: &[String], boxes: &[HighlightBox]) -> Vec<String> {
    terms
        .iter()
        .filter(|term| !boxes.iter().any(|b| b.term == **term))
        .cloned()
        .collect()
}

/// Estimate the sub-span of a line box covered by a character range.
///
/// Horizontal extent is proportional to character offset and length over
/// the line's character count; vertical extent is the full line height.
fn char_span_rect(line: &Rect, start_chars: usize, len_chars: usize, total_chars: usize) -> Rect {
    let total = total_chars as f32;
    let x = line.x + line.width * (start_chars as f32 / total);
    let width = line.width * (len_chars as f32 / total);
    Rect::new(x, line.y, width, line.height, line.origin)
}
