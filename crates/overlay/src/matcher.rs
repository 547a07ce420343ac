//! Synonym resolution: mapping canonical field keys to matched lines.
//!
//! Pure scan over one page's normalized line set. Matching is literal
//! substring containment over normalized text; there is no scoring,
//! edit-distance fuzzing, or word-boundary requirement.

use crate::text::normalize_text;
use crate::types::{FillMap, Match, SynonymTable, TextLine};

/// Resolve fill-map keys against one page's lines.
///
/// Keys are tried in the synonym table's declared order, which makes the
/// outcome deterministic when a single line contains labels for several
/// keys. For each key the lines are scanned in reading order and the
/// first line whose normalized text contains any of the key's phrasings
/// (tried in declared order) produces the key's single match for the
/// page; scanning for that key then stops.
///
/// Keys without a fill value are never attempted. Keys matching no line
/// simply produce no match; the caller reports them as omissions.
pub fn resolve_page(
    table: &SynonymTable,
    fill_map: &FillMap,
    lines: &[TextLine],
) -> Vec<Match> {
    if fill_map.is_empty() || lines.is_empty() {
        return Vec::new();
    }

    // Normalize each line once; every key scans the same normalized text.
    let normalized: Vec<String> = lines.iter().map(|l| normalize_text(&l.text)).collect();

    let mut matches = Vec::new();
    for key in table.keys() {
        if fill_map.get(key).is_none() {
            continue;
        }
        let Some(phrasings) = table.phrasings(key) else {
            continue;
        };

        let hit = lines.iter().zip(&normalized).find_map(|(line, text)| {
            phrasings
                .iter()
                .find(|phrase| text.contains(phrase.as_str()))
                .map(|phrase| (line, phrase))
        });

        if let Some((line, phrase)) = hit {
            log::debug!(
                "field '{}' matched phrase '{}' in line '{}' on page {}",
                key,
                phrase,
                line.text,
                line.page_index
            );
            matches.push(Match {
                field_key: key.to_string(),
                line: line.clone(),
                matched_phrase: phrase.clone(),
            });
        }
    }

    matches
}

/// Fill-map keys that resolved to no line on any page of the document.
pub fn unmatched_keys(fill_map: &FillMap, matches: &[Match]) -> Vec<String> {
    fill_map
        .keys()
        .filter(|key| !matches.iter().any(|m| m.field_key == *key))
        .map(str::to_string)
        .collect()
}
