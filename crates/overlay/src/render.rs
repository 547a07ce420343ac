//! Overlay composition onto PDF pages.
//!
//! Takes the original document plus per-page placement and highlight
//! instructions and appends a content-stream overlay to each touched
//! page:
//!
//! ```text
//! q <original content> Q  <highlight rects>  <filled text>
//! ```
//!
//! Highlights are painted strictly before filled text so values stay
//! legible over a highlight occupying the same region. Original page
//! content is preserved untouched beneath the overlays, wrapped in a
//! `q`/`Q` pair so its graphics state cannot leak into ours.
//!
//! Instructions arrive in the analysis convention (top-left origin,
//! y-down) and are flipped exactly once into PDF page space using the
//! page's media-box height; the [`Origin`] tag on each box guards
//! against double conversion.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use crate::types::{HighlightBox, Origin, OverlayConfig, Placement, Rect};
use crate::OverlayError;

/// Resource name for the overlay text font (Helvetica, base-14).
const FONT_RESOURCE: &str = "OvF1";

/// Resource name for the highlight transparency graphics state.
const GSTATE_RESOURCE: &str = "OvGs1";

/// Everything to draw on one page.
#[derive(Debug, Clone, Default)]
pub struct PagePlan {
    /// 0-based page index into the document.
    pub page_index: usize,
    pub placements: Vec<Placement>,
    pub highlights: Vec<HighlightBox>,
}

impl PagePlan {
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty() && self.highlights.is_empty()
    }
}

/// A page that could not be composited. The page keeps its original
/// content in the output; only its overlays are dropped.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PageFailure {
    pub page_index: usize,
    pub error: String,
}

/// Composite overlays onto `pdf_bytes` and return the new document.
///
/// Failures are isolated per page: a page whose media box or content
/// cannot be worked with is recorded in the failure list and left
/// unmodified, while the remaining pages proceed. Page count and
/// dimensions are always preserved.
pub fn compose_document(
    pdf_bytes: &[u8],
    plans: &[PagePlan],
    cfg: &OverlayConfig,
) -> Result<(Vec<u8>, Vec<PageFailure>), OverlayError> {
    let mut doc = Document::load_mem(pdf_bytes)?;
    let pages = doc.get_pages();

    let active: Vec<&PagePlan> = plans.iter().filter(|p| !p.is_empty()).collect();
    let mut failures = Vec::new();

    if active.is_empty() {
        let mut out = Vec::new();
        doc.save_to(&mut out)?;
        return Ok((out, failures));
    }

    // Shared overlay resources, added once per document.
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let gs_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => cfg.highlight_opacity,
        "CA" => cfg.highlight_opacity,
    });

    for plan in active {
        let page_number = plan.page_index as u32 + 1;
        let Some(&page_id) = pages.get(&page_number) else {
            failures.push(PageFailure {
                page_index: plan.page_index,
                error: format!("document has no page {page_number}"),
            });
            continue;
        };

        if let Err(error) = compose_page(&mut doc, page_id, plan, cfg, font_id, gs_id) {
            log::warn!("skipping overlays on page {page_number}: {error}");
            failures.push(PageFailure {
                page_index: plan.page_index,
                error,
            });
        }
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok((out, failures))
}

/// Append one page's overlay to its content stream.
fn compose_page(
    doc: &mut Document,
    page_id: ObjectId,
    plan: &PagePlan,
    cfg: &OverlayConfig,
    font_id: ObjectId,
    gs_id: ObjectId,
) -> Result<(), String> {
    let media = inherited_media_box(doc, page_id)
        .ok_or_else(|| "page has no usable MediaBox".to_string())?;
    let page_height = media[3] - media[1];
    if !page_height.is_finite() || page_height <= 0.0 {
        return Err(format!("page height {page_height} is not drawable"));
    }

    let overlay = overlay_operations(plan, cfg, page_height);
    let overlay_bytes = Content {
        operations: overlay,
    }
    .encode()
    .map_err(|e| format!("failed to encode overlay content: {e}"))?;

    let original = doc
        .get_page_content(page_id)
        .map_err(|e| format!("failed to read page content: {e}"))?;

    // Isolate the original content's graphics state, then append ours.
    let mut content = Vec::with_capacity(original.len() + overlay_bytes.len() + 8);
    content.extend_from_slice(b"q\n");
    content.extend_from_slice(&original);
    content.extend_from_slice(b"\nQ\n");
    content.extend_from_slice(&overlay_bytes);

    register_resources(doc, page_id, font_id, gs_id)
        .map_err(|e| format!("failed to register overlay resources: {e}"))?;

    doc.change_page_content(page_id, content)
        .map_err(|e| format!("failed to replace page content: {e}"))?;

    Ok(())
}

/// Build the overlay operation list: highlights first, then filled text.
fn overlay_operations(plan: &PagePlan, cfg: &OverlayConfig, page_height: f32) -> Vec<Operation> {
    let mut ops = Vec::new();

    let [hr, hg, hb] = cfg.highlight_color;
    for highlight in &plan.highlights {
        let r = into_page_space(&highlight.rect, page_height);
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("gs", vec![GSTATE_RESOURCE.into()]));
        ops.push(Operation::new("rg", vec![hr.into(), hg.into(), hb.into()]));
        ops.push(Operation::new(
            "re",
            vec![r.x.into(), r.y.into(), r.width.into(), r.height.into()],
        ));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    let [tr, tg, tb] = cfg.text_color;
    for placement in &plan.placements {
        let r = into_page_space(&placement.rect, page_height);
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![FONT_RESOURCE.into(), cfg.font_size.into()],
        ));
        ops.push(Operation::new("rg", vec![tr.into(), tg.into(), tb.into()]));
        // The flipped box bottom is the text baseline.
        ops.push(Operation::new("Td", vec![r.x.into(), r.y.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(placement.text.as_str())],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    ops
}

/// Flip an analysis-convention box into page space, exactly once.
fn into_page_space(rect: &Rect, page_height: f32) -> Rect {
    match rect.origin {
        Origin::TopLeftYDown => rect.flipped(page_height),
        // Already converted upstream; do not flip again.
        Origin::BottomLeftYUp => *rect,
    }
}

// ---------------------------------------------------------------------------
// Page dictionary plumbing
// ---------------------------------------------------------------------------

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

/// Resolve a page's MediaBox, walking up the page tree for inherited
/// values.
fn inherited_media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let mut current = page_id;
    // Page trees are shallow; the bound guards against Parent cycles.
    for _ in 0..32 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(obj) = dict.get(b"MediaBox") {
            let obj = match obj {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            };
            let arr = obj.as_array().ok()?;
            if arr.len() != 4 {
                return None;
            }
            let mut out = [0.0f32; 4];
            for (slot, value) in out.iter_mut().zip(arr) {
                *slot = number(value)?;
            }
            return Some(out);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}

/// Where a page's direct resource dictionary lives.
enum ResourceSlot {
    /// `/Resources` is an inline dictionary in the page dict.
    Inline,
    /// `/Resources` is a reference to a shared dictionary object.
    Referenced(ObjectId),
}

/// Make sure the page has a direct resource dictionary containing the
/// overlay font and graphics state.
///
/// Pages without their own `/Resources` get the inherited dictionary
/// materialized onto them first, so sibling pages sharing the parent's
/// resources are unaffected.
fn register_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    gs_id: ObjectId,
) -> Result<(), lopdf::Error> {
    let probe = match doc.get_object(page_id)?.as_dict()?.get(b"Resources") {
        Ok(Object::Reference(id)) => Some(ResourceSlot::Referenced(*id)),
        Ok(Object::Dictionary(_)) => Some(ResourceSlot::Inline),
        _ => None,
    };
    let slot = match probe {
        Some(slot) => slot,
        None => {
            let inherited = inherited_resources(doc, page_id).unwrap_or_default();
            let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
            page_dict.set("Resources", Object::Dictionary(inherited));
            ResourceSlot::Inline
        }
    };

    set_resource_entry(doc, page_id, &slot, "Font", FONT_RESOURCE, font_id)?;
    set_resource_entry(doc, page_id, &slot, "ExtGState", GSTATE_RESOURCE, gs_id)?;
    Ok(())
}

/// Resolve the nearest `/Resources` dictionary above a page.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut current = page_id;
    for _ in 0..32 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(obj) = dict.get(b"Resources") {
            let obj = match obj {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            };
            return obj.as_dict().ok().cloned();
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}

/// Insert `name -> target` into one category (`Font`, `ExtGState`) of the
/// page's resource dictionary, following one level of indirection if the
/// category itself is a reference.
fn set_resource_entry(
    doc: &mut Document,
    page_id: ObjectId,
    slot: &ResourceSlot,
    category: &str,
    name: &str,
    target: ObjectId,
) -> Result<(), lopdf::Error> {
    // Probe the category without holding a mutable borrow.
    let category_ref = {
        let resources = resources_dict(doc, page_id, slot)?;
        match resources.get(category.as_bytes()) {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    if let Some(id) = category_ref {
        let dict = doc.get_object_mut(id)?.as_dict_mut()?;
        dict.set(name, Object::Reference(target));
        return Ok(());
    }

    let resources = resources_dict_mut(doc, page_id, slot)?;
    match resources.get_mut(category.as_bytes()) {
        Ok(Object::Dictionary(dict)) => {
            dict.set(name, Object::Reference(target));
        }
        _ => {
            let mut dict = Dictionary::new();
            dict.set(name, Object::Reference(target));
            resources.set(category, Object::Dictionary(dict));
        }
    }
    Ok(())
}

fn resources_dict<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    slot: &ResourceSlot,
) -> Result<&'a Dictionary, lopdf::Error> {
    match slot {
        ResourceSlot::Referenced(id) => doc.get_object(*id)?.as_dict(),
        ResourceSlot::Inline => doc
            .get_object(page_id)?
            .as_dict()?
            .get(b"Resources")?
            .as_dict(),
    }
}

fn resources_dict_mut<'a>(
    doc: &'a mut Document,
    page_id: ObjectId,
    slot: &ResourceSlot,
) -> Result<&'a mut Dictionary, lopdf::Error> {
    match slot {
        ResourceSlot::Referenced(id) => doc.get_object_mut(*id)?.as_dict_mut(),
        ResourceSlot::Inline => doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .get_mut(b"Resources")?
            .as_dict_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Origin, OverlayConfig, Placement, Rect};

    /// Minimal one-page document with an empty content stream.
    fn test_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let content_id = doc.add_object(Object::Stream(lopdf::Stream::new(
            dictionary! {},
            Vec::new(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn analysis_rect(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(x, y, w, h, Origin::TopLeftYDown)
    }

    fn sample_plan() -> PagePlan {
        PagePlan {
            page_index: 0,
            placements: vec![Placement {
                text: "555-1234".to_string(),
                rect: analysis_rect(120.0, 15.0, 40.0, 10.0),
                page_index: 0,
            }],
            highlights: vec![HighlightBox {
                term: "signature".to_string(),
                rect: analysis_rect(80.0, 100.0, 90.0, 20.0),
                page_index: 0,
            }],
        }
    }

    #[test]
    fn test_compose_produces_valid_pdf() {
        let pdf = test_pdf();
        let (out, failures) =
            compose_document(&pdf, &[sample_plan()], &OverlayConfig::default()).unwrap();

        assert!(failures.is_empty());
        assert!(out.starts_with(b"%PDF-"));
        let doc = Document::load_mem(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_compose_registers_overlay_resources() {
        let pdf = test_pdf();
        let (out, _) =
            compose_document(&pdf, &[sample_plan()], &OverlayConfig::default()).unwrap();

        let doc = Document::load_mem(&out).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(resources.get(b"Font").unwrap().as_dict().unwrap().has(FONT_RESOURCE.as_bytes()));
        assert!(resources
            .get(b"ExtGState")
            .unwrap()
            .as_dict()
            .unwrap()
            .has(GSTATE_RESOURCE.as_bytes()));
    }

    #[test]
    fn test_compose_appends_highlight_before_text() {
        let pdf = test_pdf();
        let (out, _) =
            compose_document(&pdf, &[sample_plan()], &OverlayConfig::default()).unwrap();

        let doc = Document::load_mem(&out).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        let text = String::from_utf8_lossy(&content);
        let rect_pos = text.find(" re").expect("highlight rect drawn");
        let text_pos = text.find("BT").expect("text object drawn");
        assert!(rect_pos < text_pos);
    }

    #[test]
    fn test_compose_flips_into_page_space() {
        let pdf = test_pdf();
        let plan = PagePlan {
            page_index: 0,
            placements: vec![],
            highlights: vec![HighlightBox {
                term: "x".to_string(),
                rect: analysis_rect(10.0, 10.0, 100.0, 20.0),
                page_index: 0,
            }],
        };
        let (out, _) = compose_document(&pdf, &[plan], &OverlayConfig::default()).unwrap();

        let doc = Document::load_mem(&out).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        let text = String::from_utf8_lossy(&content);
        // y' = 792 - 10 - 20 = 762
        assert!(text.contains("762"), "content was: {text}");
    }

    #[test]
    fn test_compose_is_deterministic() {
        let pdf = test_pdf();
        let cfg = OverlayConfig::default();
        let (a, _) = compose_document(&pdf, &[sample_plan()], &cfg).unwrap();
        let (b, _) = compose_document(&pdf, &[sample_plan()], &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_plans_keep_document() {
        let pdf = test_pdf();
        let (out, failures) =
            compose_document(&pdf, &[], &OverlayConfig::default()).unwrap();
        assert!(failures.is_empty());
        let doc = Document::load_mem(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_plan_for_missing_page_is_isolated() {
        let pdf = test_pdf();
        let mut bad = sample_plan();
        bad.page_index = 9;
        let good = sample_plan();

        let (out, failures) =
            compose_document(&pdf, &[bad, good], &OverlayConfig::default()).unwrap();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].page_index, 9);
        // The valid page still composited.
        let doc = Document::load_mem(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        let result = compose_document(b"not a pdf", &[], &OverlayConfig::default());
        assert!(result.is_err());
    }
}
