//! Overlay flattening
//!
//! The algorithm, per page and in page order:
//! 1. Read the page's own MediaBox (pages may differ in size).
//! 2. Rebuild the page content: opaque white over the full rectangle,
//!    then the original content replayed through a Form XObject, then
//!    the page's slice of the overlay as an RGB image XObject with an
//!    SMask alpha channel.
//! 3. The overlay slice is the page's band of one continuous
//!    overlay-space in which pages stack vertically; if that slice
//!    renders degenerate, the whole drawing is drawn scaled-to-fit
//!    instead so markup is never silently dropped.
//!
//! Callers replace the on-disk document only with a fully-written byte
//! stream and must reload any in-memory document afterwards.

use std::fs;
use std::io::Write;
use std::path::Path;

use exampad_overlay::{Overlay, OverlayRect, Raster};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::atomic_write;
use crate::error::ComposeError;

/// Device pixels per PDF point when rasterizing overlay ink.
pub const DEFAULT_RASTER_SCALE: f64 = 2.0;

/// Flatten `overlay` into every page of the document given as bytes.
///
/// Returns the complete new document; the input is never modified. Page
/// count and per-page MediaBox sizes are preserved exactly.
pub fn flatten(pdf_bytes: &[u8], overlay: &Overlay, scale: f64) -> Result<Vec<u8>, ComposeError> {
    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| ComposeError::ParseError(e.to_string()))?;

    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    if pages.is_empty() {
        return Err(ComposeError::StructureError("document has no pages".into()));
    }

    // Pages stack vertically in overlay-space, one page-height per page.
    let mut y_offset = 0.0;
    for (_page_num, page_id) in &pages {
        let media_box = page_media_box(&doc, *page_id)?;
        y_offset += flatten_page(&mut doc, *page_id, media_box, overlay, y_offset, scale)?;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| ComposeError::WriteError(e.to_string()))?;
    Ok(output)
}

/// Flatten the document at `path` in place (temp file + rename).
///
/// The pre-flatten bytes stay untouched on disk until the full output
/// is ready; any in-memory copy of the document is stale afterwards and
/// must be reloaded from the path.
pub fn flatten_file(
    path: impl AsRef<Path>,
    overlay: &Overlay,
    scale: f64,
) -> Result<(), ComposeError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let flattened = flatten(&bytes, overlay, scale)?;
    atomic_write(path, &flattened)?;
    debug!(path = %path.display(), "flattened document rewritten");
    Ok(())
}

/// Rebuild one page; returns the page height consumed in overlay-space.
fn flatten_page(
    doc: &mut Document,
    page_id: ObjectId,
    media_box: [f64; 4],
    overlay: &Overlay,
    y_offset: f64,
    scale: f64,
) -> Result<f64, ComposeError> {
    let [x0, y0, x1, y1] = media_box;
    let width = x1 - x0;
    let height = y1 - y0;

    // Original page content replayed as a Form XObject; it executes in
    // native PDF (bottom-left-origin) space, so it is placed with the
    // identity matrix.
    let content = doc
        .get_page_content(page_id)
        .map_err(|e| ComposeError::StructureError(e.to_string()))?;
    let mut form_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => vec![
            Object::Real(x0 as f32),
            Object::Real(y0 as f32),
            Object::Real(x1 as f32),
            Object::Real(y1 as f32),
        ],
    };
    form_dict.set("Resources", page_resources(doc, page_id));
    let form_id = doc.add_object(Object::Stream(Stream::new(form_dict, content)));

    let mut xobjects = Dictionary::new();
    xobjects.set("Fx0", Object::Reference(form_id));

    // Opaque white first: source pages and overlays may have transparent
    // regions that otherwise render black through certain renderers.
    let mut ops = format!(
        "q 1 1 1 rg {} {} {} {} re f Q\nq /Fx0 Do Q\n",
        fmt_num(x0),
        fmt_num(y0),
        fmt_num(width),
        fmt_num(height),
    );

    if !overlay.is_empty() {
        if let Some((raster, [dx, dy, dw, dh])) = page_ink(overlay, media_box, y_offset, scale) {
            let image_id = add_image_xobject(doc, &raster)?;
            xobjects.set("Im0", Object::Reference(image_id));
            // PDF image space maps the first raster row to the top of the
            // image square, which absorbs the top-left/bottom-left flip
            // between overlay-space and page-space.
            ops.push_str(&format!(
                "q {} 0 0 {} {} {} cm /Im0 Do Q\n",
                fmt_num(dw),
                fmt_num(dh),
                fmt_num(dx),
                fmt_num(dy),
            ));
        }
    }

    let content_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        ops.into_bytes(),
    )));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| ComposeError::StructureError(e.to_string()))?;
    let page_dict = page
        .as_dict_mut()
        .map_err(|e| ComposeError::StructureError(e.to_string()))?;
    page_dict.set("Contents", Object::Reference(content_id));
    page_dict.set(
        "Resources",
        Object::Dictionary(dictionary! { "XObject" => Object::Dictionary(xobjects) }),
    );
    page_dict.set(
        "MediaBox",
        vec![
            Object::Real(x0 as f32),
            Object::Real(y0 as f32),
            Object::Real(x1 as f32),
            Object::Real(y1 as f32),
        ],
    );
    // The ink is baked in; nothing interactive survives flattening.
    page_dict.remove(b"Annots");

    Ok(height)
}

/// Pick the ink raster for a page and its placement rectangle.
///
/// Slice-first: the page's vertical band of overlay-space at device
/// pixel scale. Fallback on a degenerate slice render: the whole
/// drawing, scaled to fit the page rectangle, centered, aspect
/// preserved.
fn page_ink(
    overlay: &Overlay,
    media_box: [f64; 4],
    y_offset: f64,
    scale: f64,
) -> Option<(Raster, [f64; 4])> {
    let [x0, y0, x1, y1] = media_box;
    let width = x1 - x0;
    let height = y1 - y0;

    let slice = OverlayRect::new(0.0, y_offset, width, height);
    let raster = overlay.render_slice(slice, scale);
    if !raster.is_degenerate() {
        return Some((raster, [x0, y0, width, height]));
    }

    debug!(
        y_offset,
        width, height, "degenerate overlay slice, falling back to whole-drawing render"
    );
    let (raster, bounds) = overlay.render_whole(scale)?;
    let fit = (width / bounds.width).min(height / bounds.height);
    let dw = bounds.width * fit;
    let dh = bounds.height * fit;
    let dx = x0 + (width - dw) / 2.0;
    let dy = y0 + (height - dh) / 2.0;
    Some((raster, [dx, dy, dw, dh]))
}

/// Embed a raster as an RGB image XObject with an SMask alpha channel,
/// both FlateDecode-compressed.
fn add_image_xobject(doc: &mut Document, raster: &Raster) -> Result<ObjectId, ComposeError> {
    let (rgb, alpha) = raster.to_rgb_and_alpha();

    let smask_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => raster.width() as i64,
        "Height" => raster.height() as i64,
        "ColorSpace" => "DeviceGray",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    let smask_id = doc.add_object(Object::Stream(Stream::new(smask_dict, deflate(&alpha)?)));

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => raster.width() as i64,
        "Height" => raster.height() as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    image_dict.set("SMask", Object::Reference(smask_id));
    Ok(doc.add_object(Object::Stream(Stream::new(image_dict, deflate(&rgb)?))))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ComposeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// The page's MediaBox, walking Parent nodes for inherited values.
fn page_media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4], ComposeError> {
    let mut current = page_id;
    for _ in 0..32 {
        let dict = doc
            .get_object(current)
            .and_then(Object::as_dict)
            .map_err(|e| ComposeError::StructureError(format!("invalid page object: {}", e)))?;

        if let Ok(media_box) = dict.get(b"MediaBox") {
            let media_box = match media_box.as_reference() {
                Ok(id) => doc
                    .get_object(id)
                    .map_err(|e| ComposeError::StructureError(e.to_string()))?,
                Err(_) => media_box,
            };
            let values = media_box
                .as_array()
                .map_err(|_| ComposeError::StructureError("MediaBox is not an array".into()))?;
            if values.len() != 4 {
                return Err(ComposeError::StructureError(
                    "MediaBox does not have 4 entries".into(),
                ));
            }
            let mut rect = [0.0; 4];
            for (slot, value) in rect.iter_mut().zip(values) {
                *slot = number(value).ok_or_else(|| {
                    ComposeError::StructureError("MediaBox entry is not a number".into())
                })?;
            }
            return Ok(rect);
        }

        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }
    Err(ComposeError::StructureError("page has no MediaBox".into()))
}

/// The page's Resources entry (direct or inherited); the returned object
/// may be a Reference, which stays valid because flattening mutates the
/// same document.
fn page_resources(doc: &Document, page_id: ObjectId) -> Object {
    let mut current = page_id;
    for _ in 0..32 {
        let Ok(dict) = doc.get_object(current).and_then(Object::as_dict) else {
            break;
        };
        if let Ok(resources) = dict.get(b"Resources") {
            return resources.clone();
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }
    Object::Dictionary(Dictionary::new())
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Plain decimal formatting; PDF content streams do not accept exponent
/// notation.
fn fmt_num(v: f64) -> String {
    let s = format!("{:.4}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use exampad_overlay::{Stroke, StrokePoint};
    use pretty_assertions::assert_eq;

    /// Helper to create a PDF with one page per `(width, height)` entry
    fn create_test_pdf(page_sizes: &[(f64, f64)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");

        let pages_id = doc.new_object_id();
        let mut page_ids = Vec::new();

        for (i, (width, height)) in page_sizes.iter().enumerate() {
            let content = format!("BT /F1 12 Tf 50 700 Td (Page-{}) Tj ET", i + 1);
            let content_id = doc.add_object(Object::Stream(Stream::new(
                Dictionary::new(),
                content.into_bytes(),
            )));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    Object::Real(*width as f32),
                    Object::Real(*height as f32),
                ],
            });
            page_ids.push(Object::Reference(page_id));
        }

        let count = page_ids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn dot_overlay(x: f64, y: f64) -> Overlay {
        let mut overlay = Overlay::new();
        overlay.push_stroke(Stroke::new(
            vec![StrokePoint::new(x, y, 0, 1.0)],
            3.0,
            "#000000",
        ));
        overlay
    }

    fn page_xobject_names(doc: &Document, page_id: ObjectId) -> Vec<String> {
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        xobjects
            .iter()
            .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
            .collect()
    }

    #[test]
    fn test_flatten_preserves_page_count_and_sizes() {
        let pdf = create_test_pdf(&[(612.0, 792.0), (595.0, 842.0), (400.0, 300.0)]);
        let result = flatten(&pdf, &dot_overlay(100.0, 100.0), 2.0).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let pages: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(pages.len(), 3);

        let expected = [(612.0, 792.0), (595.0, 842.0), (400.0, 300.0)];
        for (page_id, (width, height)) in pages.iter().zip(expected) {
            let rect = page_media_box(&doc, *page_id).unwrap();
            assert_eq!(rect[2] - rect[0], width);
            assert_eq!(rect[3] - rect[1], height);
        }
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let pdf = create_test_pdf(&[(595.0, 842.0), (595.0, 842.0)]);
        let mut overlay = Overlay::new();
        overlay.push_stroke(Stroke::new(
            vec![
                StrokePoint::new(80.0, 120.0, 0, 0.6),
                StrokePoint::new(300.0, 900.0, 40, 0.9),
            ],
            2.5,
            "#2040C0",
        ));

        let a = flatten(&pdf, &overlay, 2.0).unwrap();
        let b = flatten(&pdf, &overlay, 2.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_flatten_rejects_garbage() {
        let result = flatten(b"definitely not a pdf", &Overlay::new(), 2.0);
        assert!(matches!(result, Err(ComposeError::ParseError(_))));
    }

    #[test]
    fn test_flatten_paints_white_background_first() {
        let pdf = create_test_pdf(&[(595.0, 842.0)]);
        let result = flatten(&pdf, &Overlay::new(), 2.0).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let (_num, page_id) = doc.get_pages().into_iter().next().unwrap();
        let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();

        let white = content.find("1 1 1 rg").expect("white fill missing");
        let original = content.find("/Fx0 Do").expect("original content missing");
        assert!(white < original, "white fill must be painted first");
    }

    #[test]
    fn test_flatten_embeds_ink_on_every_page() {
        let pdf = create_test_pdf(&[(595.0, 842.0), (595.0, 842.0)]);
        // Ink only inside the second page's band
        let result = flatten(&pdf, &dot_overlay(100.0, 1000.0), 2.0).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        for page_id in doc.get_pages().into_values() {
            let mut names = page_xobject_names(&doc, page_id);
            names.sort();
            assert_eq!(names, vec!["Fx0".to_string(), "Im0".to_string()]);
        }
    }

    #[test]
    fn test_flatten_empty_overlay_embeds_no_image() {
        let pdf = create_test_pdf(&[(595.0, 842.0)]);
        let result = flatten(&pdf, &Overlay::new(), 2.0).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let (_num, page_id) = doc.get_pages().into_iter().next().unwrap();
        assert_eq!(page_xobject_names(&doc, page_id), vec!["Fx0".to_string()]);
    }

    #[test]
    fn test_degenerate_slice_falls_back_to_whole_drawing() {
        let pdf = create_test_pdf(&[(400.0, 300.0)]);
        // A scale this small makes the page slice render degenerate; the
        // markup must still land on the page via the whole-drawing path.
        let result = flatten(&pdf, &dot_overlay(50.0, 50.0), 0.001).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let (_num, page_id) = doc.get_pages().into_iter().next().unwrap();
        let mut names = page_xobject_names(&doc, page_id);
        names.sort();
        assert_eq!(names, vec!["Fx0".to_string(), "Im0".to_string()]);
    }

    #[test]
    fn test_flatten_file_replaces_document_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Angabe.pdf");
        std::fs::write(&path, create_test_pdf(&[(595.0, 842.0)])).unwrap();

        flatten_file(&path, &dot_overlay(10.0, 10.0), 2.0).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_flatten_file_missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = flatten_file(dir.path().join("nope.pdf"), &Overlay::new(), 2.0);
        assert!(matches!(result, Err(ComposeError::Io(_))));
    }

    #[test]
    fn test_flatten_file_leaves_corrupt_input_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"garbage bytes").unwrap();

        let result = flatten_file(&path, &Overlay::new(), 2.0);
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"garbage bytes");
    }

    #[test]
    fn test_fmt_num_plain_decimal() {
        assert_eq!(fmt_num(595.0), "595");
        assert_eq!(fmt_num(421.5), "421.5");
        assert_eq!(fmt_num(0.0001), "0.0001");
    }
}
