//! PDF composition for annotated exams
//!
//! This crate provides the two document transformations of the exam
//! pipeline, both built on lopdf:
//!
//! - `flatten` / `flatten_file`: merge a base PDF with a freehand
//!   annotation overlay into a new document where the ink is baked into
//!   each page (no longer a separate editable layer)
//! - `append_page` / `append_page_file`: append blank, lined, or grid
//!   A4 utility pages
//!
//! File variants only ever replace the canonical path with a complete
//! new byte stream (temp file + rename); a failed transformation leaves
//! the original untouched.

mod error;
mod flatten;
mod pages;

pub use error::ComposeError;
pub use flatten::{flatten, flatten_file, DEFAULT_RASTER_SCALE};
pub use pages::{append_page, append_page_file, new_document, PageKind};

use std::fs;
use std::path::{Path, PathBuf};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, ComposeError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| ComposeError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Replace `path` with `bytes` without ever exposing a partial file.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
