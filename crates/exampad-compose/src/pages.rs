//! Utility page appending
//!
//! Students can append blank, lined, or grid pages for extra working
//! space. Pages are fixed A4 portrait (595x842 points) with a white
//! background painted unconditionally first; rules are light gray at
//! 0.5pt.

use std::fs;
use std::path::Path;

use exampad_types::{A4_HEIGHT, A4_WIDTH};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::atomic_write;
use crate::error::ComposeError;

const MARGIN: f64 = 50.0;
const LINE_SPACING: f64 = 25.0;
const GRID_SPACING: f64 = 20.0;
const GRID_RIGHT_MARGIN: f64 = 60.0;

const RULE_GRAY: &str = "0.85 0.85 0.85 RG 0.5 w";

/// The kind of utility page to append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Blank,
    Lined,
    Grid,
}

/// Append one utility page after the current last page.
///
/// Returns the complete new document bytes; the input is unmodified.
pub fn append_page(pdf_bytes: &[u8], kind: PageKind) -> Result<Vec<u8>, ComposeError> {
    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| ComposeError::ParseError(e.to_string()))?;

    let pages_id = pages_root(&doc)?;
    let page_id = add_utility_page(&mut doc, pages_id, kind);

    // Push onto the root Kids array and bump Count
    let pages = doc
        .get_object_mut(pages_id)
        .map_err(|e| ComposeError::StructureError(e.to_string()))?;
    let pages_dict = pages
        .as_dict_mut()
        .map_err(|_| ComposeError::StructureError("invalid pages dictionary".into()))?;

    match pages_dict.get_mut(b"Kids") {
        Ok(Object::Array(kids)) => kids.push(Object::Reference(page_id)),
        _ => return Err(ComposeError::StructureError("Kids is not an array".into())),
    }
    let count = pages_dict
        .get(b"Count")
        .ok()
        .and_then(|c| c.as_i64().ok())
        .unwrap_or(0);
    pages_dict.set("Count", Object::Integer(count + 1));

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| ComposeError::WriteError(e.to_string()))?;
    Ok(output)
}

/// A fresh single-page document consisting of one utility page.
pub fn new_document(kind: PageKind) -> Result<Vec<u8>, ComposeError> {
    let mut doc = Document::with_version("1.7");

    let pages_id = doc.new_object_id();
    let page_id = add_utility_page(&mut doc, pages_id, kind);
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| ComposeError::WriteError(e.to_string()))?;
    Ok(output)
}

/// Append a utility page to the document at `path`, creating a fresh
/// single-page document if none exists yet. The file is replaced
/// atomically; failures leave it untouched.
pub fn append_page_file(path: impl AsRef<Path>, kind: PageKind) -> Result<(), ComposeError> {
    let path = path.as_ref();

    let output = if path.exists() {
        append_page(&fs::read(path)?, kind)?
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        new_document(kind)?
    };

    atomic_write(path, &output)?;
    debug!(path = %path.display(), ?kind, "utility page appended");
    Ok(())
}

/// Create the page object (content stream + page dictionary), leaving
/// the page tree untouched.
fn add_utility_page(doc: &mut Document, parent_id: ObjectId, kind: PageKind) -> ObjectId {
    let content_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        page_content(kind).into_bytes(),
    )));

    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(parent_id),
        "Contents" => Object::Reference(content_id),
        "Resources" => Dictionary::new(),
        "MediaBox" => vec![
            0.into(),
            0.into(),
            Object::Real(A4_WIDTH as f32),
            Object::Real(A4_HEIGHT as f32),
        ],
    })
}

fn page_content(kind: PageKind) -> String {
    let mut ops = format!(
        "q 1 1 1 rg 0 0 {} {} re f Q\n",
        A4_WIDTH as i64, A4_HEIGHT as i64
    );

    match kind {
        PageKind::Blank => {}
        PageKind::Lined => {
            ops.push_str(&format!("q {}\n", RULE_GRAY));
            let mut y = MARGIN;
            while y <= A4_HEIGHT - MARGIN {
                ops.push_str(&format!(
                    "{} {} m {} {} l S\n",
                    MARGIN as i64,
                    y as i64,
                    (A4_WIDTH - MARGIN) as i64,
                    y as i64
                ));
                y += LINE_SPACING;
            }
            ops.push_str("Q\n");
        }
        PageKind::Grid => {
            ops.push_str(&format!("q {}\n", RULE_GRAY));
            let right = A4_WIDTH - GRID_RIGHT_MARGIN;
            let top = A4_HEIGHT - MARGIN;
            let mut y = MARGIN;
            while y <= top {
                ops.push_str(&format!(
                    "{} {} m {} {} l S\n",
                    MARGIN as i64, y as i64, right as i64, y as i64
                ));
                y += GRID_SPACING;
            }
            let mut x = MARGIN;
            while x <= right {
                ops.push_str(&format!(
                    "{} {} m {} {} l S\n",
                    x as i64, MARGIN as i64, x as i64, top as i64
                ));
                x += GRID_SPACING;
            }
            ops.push_str("Q\n");
        }
    }

    ops
}

/// Walk trailer -> catalog -> Pages to the page tree root.
fn pages_root(doc: &Document) -> Result<ObjectId, ComposeError> {
    let root = doc
        .trailer
        .get(b"Root")
        .map_err(|_| ComposeError::StructureError("No Root in trailer".into()))?;
    let catalog_id = root
        .as_reference()
        .map_err(|_| ComposeError::StructureError("Root is not a reference".into()))?;

    let catalog = doc
        .get_object(catalog_id)
        .map_err(|e| ComposeError::StructureError(e.to_string()))?
        .as_dict()
        .map_err(|_| ComposeError::StructureError("Invalid catalog".into()))?;

    catalog
        .get(b"Pages")
        .map_err(|_| ComposeError::StructureError("No Pages in catalog".into()))?
        .as_reference()
        .map_err(|_| ComposeError::StructureError("Pages is not a reference".into()))
}
