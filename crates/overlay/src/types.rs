use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Coordinate space
// ---------------------------------------------------------------------------

/// Which corner a rectangle's `y` is measured from.
///
/// Layout-analysis services report boxes with a top-left origin and y
/// increasing downward; PDF page space uses a bottom-left origin with y
/// increasing upward. Every [`Rect`] carries its convention so a consumer
/// can tell whether a conversion already happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    TopLeftYDown,
    BottomLeftYUp,
}

/// An axis-aligned rectangle in a stated coordinate convention.
///
/// Units are PDF points. The origin tag travels with the rectangle so the
/// `y` flip between conventions is applied exactly once -- flipping twice
/// restores the original value (see [`Rect::flipped`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub origin: Origin,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32, origin: Origin) -> Self {
        Rect {
            x,
            y,
            width,
            height,
            origin,
        }
    }

    /// X coordinate of the right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Y coordinate of the edge furthest from the origin corner.
    pub fn far_y(&self) -> f32 {
        self.y + self.height
    }

    /// Convert between coordinate conventions for a page of the given
    /// height: `y' = page_height - y - height`, toggling the origin tag.
    ///
    /// The conversion is an involution: `r.flipped(h).flipped(h) == r`.
    pub fn flipped(&self, page_height: f32) -> Rect {
        Rect {
            x: self.x,
            y: page_height - self.y - self.height,
            width: self.width,
            height: self.height,
            origin: match self.origin {
                Origin::TopLeftYDown => Origin::BottomLeftYUp,
                Origin::BottomLeftYUp => Origin::TopLeftYDown,
            },
        }
    }

    /// Whether two rectangles in the same convention intersect.
    pub fn overlaps(&self, other: &Rect) -> bool {
        debug_assert_eq!(self.origin, other.origin);
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.far_y()
            && other.y < self.far_y()
    }
}

// ---------------------------------------------------------------------------
// Normalized layout
// ---------------------------------------------------------------------------

/// One detected text line on a page, as produced by the layout normalizer.
///
/// Immutable once created. Lines keep the reading order reported by the
/// analysis source; they are not re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub rect: Rect,
    pub page_index: usize,
}

/// Page dimensions in points, used for margin math and the y flip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

// ---------------------------------------------------------------------------
// Matching and overlay instructions
// ---------------------------------------------------------------------------

/// The resolution of one fill-map key against the line set of a page.
///
/// At most one `Match` per key per page is acted upon; when several lines
/// contain a synonym for the same key, the first in reading order wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub field_key: String,
    pub line: TextLine,
    pub matched_phrase: String,
}

/// An instruction to draw `text` inside `rect` on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub text: String,
    pub rect: Rect,
    pub page_index: usize,
}

/// One visual occurrence of a highlight term.
///
/// Overlapping terms are not deduplicated; two terms matching the same
/// substring each produce their own box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightBox {
    pub term: String,
    pub rect: Rect,
    pub page_index: usize,
}

// ---------------------------------------------------------------------------
// Caller-supplied configuration
// ---------------------------------------------------------------------------

/// Mapping from canonical field key (e.g. `phone`) to the value to fill in.
///
/// Keys are unique; the map is read-only for the duration of one
/// document's processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FillMap(BTreeMap<String, String>);

impl FillMap {
    pub fn new() -> Self {
        FillMap(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for FillMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        FillMap(iter.into_iter().collect())
    }
}

/// Mapping from canonical field key to its recognized label phrasings.
///
/// Key order and phrasing order are both significant: keys are tried in
/// declared order (deterministic precedence when one line contains several
/// labels) and phrasings in declared order within a key. Phrasings are
/// stored lower-cased and whitespace-collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymTable {
    entries: Vec<(String, Vec<String>)>,
}

impl SynonymTable {
    pub fn new() -> Self {
        SynonymTable {
            entries: Vec::new(),
        }
    }

    /// Add or replace the phrasings recognized for a field key.
    pub fn insert<I, S>(&mut self, key: impl Into<String>, phrasings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        let phrasings: Vec<String> = phrasings
            .into_iter()
            .map(|p| crate::text::normalize_text(&p.into()))
            .filter(|p| !p.is_empty())
            .collect();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = phrasings;
        } else {
            self.entries.push((key, phrasings));
        }
    }

    /// Phrasings for a key, in declared order.
    pub fn phrasings(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p.as_slice())
    }

    /// Keys in declared order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The stock table of field labels recognized out of the box.
    pub fn stock() -> Self {
        let mut table = SynonymTable::new();
        table.insert(
            "name",
            [
                "name",
                "patient name",
                "full name",
                "first name",
                "last name",
                "patient",
            ],
        );
        table.insert("dob", ["dob", "date of birth", "birth date", "birthday"]);
        table.insert(
            "phone",
            ["phone", "telephone", "tel", "phone number", "mobile", "cell"],
        );
        table.insert(
            "address",
            ["address", "street address", "mailing address", "home address"],
        );
        table.insert("email", ["email", "e-mail", "email address"]);
        table.insert("ssn", ["ssn", "social security", "social security number"]);
        table.insert("id", ["id", "identification", "patient id", "account number"]);
        table.insert(
            "signature",
            ["signature", "sign", "signed by", "patient signature"],
        );
        table.insert(
            "consent",
            ["consent", "agreement", "authorization", "permission"],
        );
        table.insert(
            "emergency",
            ["emergency", "emergency contact", "next of kin"],
        );
        table.insert(
            "insurance",
            ["insurance", "insurance provider", "policy number", "group number"],
        );
        table.insert("allergies", ["allergies", "allergic", "allergy"]);
        table.insert(
            "medications",
            ["medications", "meds", "current medications", "prescriptions"],
        );
        table.insert("diagnosis", ["diagnosis", "condition", "medical condition"]);
        table.insert("treatment", ["treatment", "therapy", "procedure"]);
        table.insert(
            "date",
            ["date", "appointment date", "visit date", "service date"],
        );
        table
    }
}

// ---------------------------------------------------------------------------
// Overlay constants
// ---------------------------------------------------------------------------

/// Horizontal gap between a matched label's right edge and the filled value.
pub const DEFAULT_LABEL_GAP: f32 = 10.0;

/// Nominal font size for filled values and width estimation, in points.
pub const DEFAULT_FONT_SIZE: f32 = 10.0;

/// Approximate character width as a fraction of font size. 0.5 is a
/// reasonable default for proportional fonts; no glyph metrics are
/// consulted.
pub const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Vertical increment used when shifting a colliding placement downward.
pub const DEFAULT_LINE_HEIGHT: f32 = 12.0;

/// Width of the page's right margin, in points.
pub const DEFAULT_RIGHT_MARGIN: f32 = 36.0;

/// When less than this much horizontal room remains before the right
/// margin, the value is placed below the label instead of beside it.
pub const DEFAULT_EDGE_FALLBACK_WIDTH: f32 = 54.0;

/// Fixed highlight fill, as RGB in the 0..=1 range. All highlights are
/// visually identical; term identity is not color-coded.
pub const HIGHLIGHT_COLOR: [f32; 3] = [1.0, 1.0, 0.0];

/// Constant alpha applied to highlight rectangles.
pub const HIGHLIGHT_OPACITY: f32 = 0.3;

/// Fill color for placed value text.
pub const TEXT_COLOR: [f32; 3] = [0.0, 0.0, 0.0];

/// Tunable constants for placement and compositing.
///
/// The collision shift and character-width estimate are best-effort
/// approximations; they are exposed here rather than hard-coded, but their
/// approximate nature is intentional scope-limiting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub label_gap: f32,
    pub font_size: f32,
    pub char_width_ratio: f32,
    pub line_height: f32,
    pub right_margin: f32,
    pub edge_fallback_width: f32,
    pub highlight_color: [f32; 3],
    pub highlight_opacity: f32,
    pub text_color: [f32; 3],
}

impl Default for OverlayConfig {
    fn default() -> Self {
        OverlayConfig {
            label_gap: DEFAULT_LABEL_GAP,
            font_size: DEFAULT_FONT_SIZE,
            char_width_ratio: APPROX_CHAR_WIDTH_RATIO,
            line_height: DEFAULT_LINE_HEIGHT,
            right_margin: DEFAULT_RIGHT_MARGIN,
            edge_fallback_width: DEFAULT_EDGE_FALLBACK_WIDTH,
            highlight_color: HIGHLIGHT_COLOR,
            highlight_opacity: HIGHLIGHT_OPACITY,
            text_color: TEXT_COLOR,
        }
    }
}

impl OverlayConfig {
    /// Estimated rendered width of `text` at the nominal font size.
    pub fn estimate_text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size * self.char_width_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(x, y, w, h, Origin::TopLeftYDown)
    }

    #[test]
    fn test_flip_is_involution() {
        let r = rect(10.0, 10.0, 100.0, 20.0);
        let twice = r.flipped(792.0).flipped(792.0);
        assert_eq!(r, twice);
    }

    #[test]
    fn test_flip_y_arithmetic() {
        let r = rect(10.0, 10.0, 100.0, 20.0);
        let flipped = r.flipped(792.0);
        assert_eq!(flipped.y, 792.0 - 10.0 - 20.0);
        assert_eq!(flipped.origin, Origin::BottomLeftYUp);
        assert_eq!(flipped.x, r.x);
        assert_eq!(flipped.width, r.width);
        assert_eq!(flipped.height, r.height);
    }

    #[test]
    fn test_overlaps() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(5.0, 5.0, 10.0, 10.0);
        let c = rect(20.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_overlaps_edge_touching() {
        // Sharing an edge is not an intersection.
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(10.0, 0.0, 10.0, 10.0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_synonym_table_normalizes_phrasings() {
        let mut table = SynonymTable::new();
        table.insert("phone", ["  Phone   Number ", "TELEPHONE"]);
        assert_eq!(
            table.phrasings("phone").unwrap(),
            &["phone number".to_string(), "telephone".to_string()]
        );
    }

    #[test]
    fn test_synonym_table_preserves_declared_order() {
        let mut table = SynonymTable::new();
        table.insert("zeta", ["zeta"]);
        table.insert("alpha", ["alpha"]);
        let keys: Vec<&str> = table.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_synonym_table_insert_replaces() {
        let mut table = SynonymTable::new();
        table.insert("phone", ["phone"]);
        table.insert("phone", ["telephone"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.phrasings("phone").unwrap(), &["telephone".to_string()]);
    }

    #[test]
    fn test_stock_table_has_phone_synonyms() {
        let table = SynonymTable::stock();
        let phrasings = table.phrasings("phone").unwrap();
        assert!(phrasings.contains(&"telephone".to_string()));
    }

    #[test]
    fn test_estimate_text_width() {
        let cfg = OverlayConfig::default();
        let w = cfg.estimate_text_width("555-1234");
        assert_eq!(w, 8.0 * cfg.font_size * cfg.char_width_ratio);
    }
}
