//! Local exam store
//!
//! The filesystem mirror of the relay's class/subject/file hierarchy,
//! rooted in an app-private directory:
//!
//! ```text
//! <root>/Exams/<class>/<subject>/<filename>                  current exam
//! <root>/Exams/<class>/<subject>/Submissions/<filename>      submission copy
//! <root>/Exams/<class>/<subject>/Drawings/<filename>_drawing.data
//! <root>/Exams/<class>/<subject>/.<filename>.submitted       submitted marker
//! ```
//!
//! Path mapping is pure and reproducible; no other component invents
//! paths on its own. Intermediate directories are created before any
//! write, and writes replace files atomically (temp + rename).

mod error;

pub use error::StoreError;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use exampad_overlay::Overlay;
use exampad_types::{DocumentRef, Role};
use serde::{Deserialize, Serialize};
use tracing::debug;

const EXAMS_DIR: &str = "Exams";
const SUBMISSIONS_DIR: &str = "Submissions";
const DRAWINGS_DIR: &str = "Drawings";
const DRAWING_SUFFIX: &str = "_drawing.data";

/// Contents of a submitted marker file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubmittedRecord {
    filename: String,
    submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExamStore {
    root: PathBuf,
}

impl ExamStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn subject_dir(&self, class_id: &str, subject_id: &str) -> PathBuf {
        self.root.join(EXAMS_DIR).join(class_id).join(subject_id)
    }

    /// `Exams/<class>/<subject>/<filename>`
    pub fn exam_path(&self, class_id: &str, subject_id: &str, filename: &str) -> PathBuf {
        self.subject_dir(class_id, subject_id).join(filename)
    }

    /// `Exams/<class>/<subject>/Submissions/<filename>`
    pub fn submission_path(&self, class_id: &str, subject_id: &str, filename: &str) -> PathBuf {
        self.subject_dir(class_id, subject_id)
            .join(SUBMISSIONS_DIR)
            .join(filename)
    }

    /// `Exams/<class>/<subject>/Drawings/<filename>_drawing.data`
    pub fn overlay_path(&self, class_id: &str, subject_id: &str, filename: &str) -> PathBuf {
        let mut name = OsString::from(filename);
        name.push(DRAWING_SUFFIX);
        self.subject_dir(class_id, subject_id)
            .join(DRAWINGS_DIR)
            .join(name)
    }

    fn submitted_marker_path(&self, class_id: &str, subject_id: &str, filename: &str) -> PathBuf {
        self.subject_dir(class_id, subject_id)
            .join(format!(".{}.submitted", filename))
    }

    /// Resolve a document reference by role: student refs map to the
    /// exam path, teacher refs to the submission copy.
    pub fn resolve(&self, doc: &DocumentRef) -> PathBuf {
        match doc.role {
            Role::Student => self.exam_path(&doc.class_id, &doc.subject_id, &doc.filename),
            Role::Teacher => self.submission_path(&doc.class_id, &doc.subject_id, &doc.filename),
        }
    }

    /// Store a fetched exam, overwriting any existing copy (fetched
    /// content is canonical from the server).
    pub fn store_exam(
        &self,
        class_id: &str,
        subject_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = self.exam_path(class_id, subject_id, filename);
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), "exam stored");
        Ok(path)
    }

    /// Store a fetched submission copy under `Submissions/`.
    pub fn store_submission(
        &self,
        class_id: &str,
        subject_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = self.submission_path(class_id, subject_id, filename);
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), "submission stored");
        Ok(path)
    }

    /// Persist the drawing for an exam. Called on every dismissal of the
    /// document view, so save and load for one key are serialized within
    /// a session.
    pub fn save_overlay(
        &self,
        class_id: &str,
        subject_id: &str,
        filename: &str,
        overlay: &Overlay,
    ) -> Result<(), StoreError> {
        let path = self.overlay_path(class_id, subject_id, filename);
        let bytes = overlay
            .to_bytes()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&path, &bytes)?;
        debug!(path = %path.display(), "overlay saved");
        Ok(())
    }

    /// Load the saved drawing, `None` when the exam has none yet.
    pub fn load_overlay(
        &self,
        class_id: &str,
        subject_id: &str,
        filename: &str,
    ) -> Result<Option<Overlay>, StoreError> {
        let path = self.overlay_path(class_id, subject_id, filename);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let overlay =
            Overlay::from_bytes(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(overlay))
    }

    /// Delete the drawing once a submission succeeds; deleting a
    /// non-existent drawing is not an error.
    pub fn delete_overlay(
        &self,
        class_id: &str,
        subject_id: &str,
        filename: &str,
    ) -> Result<(), StoreError> {
        let path = self.overlay_path(class_id, subject_id, filename);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "overlay deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no overlay to delete");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the exam has already been submitted; gates re-editing.
    pub fn is_submitted(&self, class_id: &str, subject_id: &str, filename: &str) -> bool {
        self.submitted_marker_path(class_id, subject_id, filename)
            .exists()
    }

    pub fn mark_submitted(
        &self,
        class_id: &str,
        subject_id: &str,
        filename: &str,
    ) -> Result<(), StoreError> {
        let record = SubmittedRecord {
            filename: filename.to_string(),
            submitted_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let path = self.submitted_marker_path(class_id, subject_id, filename);
        write_atomic(&path, &bytes)?;
        debug!(path = %path.display(), "exam marked submitted");
        Ok(())
    }
}

/// Create every missing directory above `path`; called before any
/// write into the store tree.
pub fn ensure_parent_dirs(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Create intermediate directories and replace the file atomically.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    ensure_parent_dirs(path)?;

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use exampad_overlay::{Stroke, StrokePoint};
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, ExamStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ExamStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_exam_path_layout() {
        let (_dir, store) = store();
        let path = store.exam_path("5BHIT", "Mathe", "Test1.pdf");
        assert_eq!(
            path,
            store.root().join("Exams").join("5BHIT").join("Mathe").join("Test1.pdf")
        );
    }

    #[test]
    fn test_resolve_dispatches_on_role() {
        let (_dir, store) = store();

        let student = store.resolve(&DocumentRef::student("5BHIT", "Mathe", "Test1.pdf"));
        assert!(student.ends_with("Exams/5BHIT/Mathe/Test1.pdf"));

        let teacher = store.resolve(&DocumentRef::teacher("5BHIT", "Mathe", "Test1.pdf"));
        assert!(teacher.ends_with("Exams/5BHIT/Mathe/Submissions/Test1.pdf"));
    }

    #[test]
    fn test_overlay_path_uses_drawing_suffix() {
        let (_dir, store) = store();
        let path = store.overlay_path("5BHIT", "Mathe", "Test1.pdf");
        assert!(path.ends_with("Exams/5BHIT/Mathe/Drawings/Test1.pdf_drawing.data"));
    }

    #[test]
    fn test_store_exam_creates_directories_and_overwrites() {
        let (_dir, store) = store();

        let path = store.store_exam("5BHIT", "Mathe", "Angabe.pdf", b"%PDF-1.7 one").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7 one");

        // Fetched content is canonical, replacing is expected
        store.store_exam("5BHIT", "Mathe", "Angabe.pdf", b"%PDF-1.7 two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7 two");
    }

    #[test]
    fn test_overlay_roundtrip() {
        let (_dir, store) = store();

        let mut overlay = Overlay::new();
        overlay.push_stroke(Stroke::new(
            vec![StrokePoint::new(10.0, 20.0, 0, 0.8)],
            2.0,
            "#000000",
        ));

        store.save_overlay("5BHIT", "Mathe", "Angabe.pdf", &overlay).unwrap();
        let loaded = store.load_overlay("5BHIT", "Mathe", "Angabe.pdf").unwrap();
        assert_eq!(loaded, Some(overlay));
    }

    #[test]
    fn test_load_missing_overlay_is_none() {
        let (_dir, store) = store();
        let loaded = store.load_overlay("5BHIT", "Mathe", "Angabe.pdf").unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn test_delete_overlay_is_idempotent() {
        let (_dir, store) = store();

        store
            .save_overlay("5BHIT", "Mathe", "Angabe.pdf", &Overlay::new())
            .unwrap();
        store.delete_overlay("5BHIT", "Mathe", "Angabe.pdf").unwrap();
        assert_eq!(store.load_overlay("5BHIT", "Mathe", "Angabe.pdf").unwrap(), None);

        // Deleting again finds nothing and still succeeds
        store.delete_overlay("5BHIT", "Mathe", "Angabe.pdf").unwrap();
    }

    #[test]
    fn test_submitted_flag_roundtrip() {
        let (_dir, store) = store();

        assert!(!store.is_submitted("5BHIT", "Mathe", "Angabe.pdf"));
        store.mark_submitted("5BHIT", "Mathe", "Angabe.pdf").unwrap();
        assert!(store.is_submitted("5BHIT", "Mathe", "Angabe.pdf"));

        // Scoped to the exact triple
        assert!(!store.is_submitted("5BHIT", "Mathe", "Angabe2.pdf"));
        assert!(!store.is_submitted("5BHIT", "Englisch", "Angabe.pdf"));
    }

    #[test]
    fn test_marker_record_is_json() {
        let (_dir, store) = store();
        store.mark_submitted("5BHIT", "Mathe", "Angabe.pdf").unwrap();

        let marker = store
            .root()
            .join("Exams/5BHIT/Mathe/.Angabe.pdf.submitted");
        let record: SubmittedRecord =
            serde_json::from_slice(&fs::read(marker).unwrap()).unwrap();
        assert_eq!(record.filename, "Angabe.pdf");
    }
}
