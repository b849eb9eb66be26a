use serde::{Deserialize, Serialize};

/// A4 portrait page size in PDF points, used for appended utility pages.
pub const A4_WIDTH: f64 = 595.0;
pub const A4_HEIGHT: f64 = 842.0;

/// Leading bytes of every valid PDF stream.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Check whether a downloaded body looks like a PDF.
///
/// The relay is a small trusted-network service; this is the only
/// content validation applied before bytes are written into the store.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// The caller's role towards the relay, sent as the `X-ROLE` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn header_value(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
        }
    }
}

/// Identifies one exam artifact on the relay and in the local store.
///
/// `(class_id, subject_id, filename)` uniquely addresses a document on the
/// server; teacher-role references resolve into the `Submissions`
/// sub-namespace holding one file per submitting identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub class_id: String,
    pub subject_id: String,
    pub filename: String,
    pub role: Role,
}

impl DocumentRef {
    pub fn student(class_id: impl Into<String>, subject_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            subject_id: subject_id.into(),
            filename: filename.into(),
            role: Role::Student,
        }
    }

    pub fn teacher(class_id: impl Into<String>, subject_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            subject_id: subject_id.into(),
            filename: filename.into(),
            role: Role::Teacher,
        }
    }
}

/// One row of the student exam listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub filename: String,
}

/// One row of the teacher submission listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub filename: String,
}

/// The signed-in user, passed explicitly into the relay client and the
/// submission workflow instead of living in ambient view state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Display name as reported by the identity provider, e.g.
    /// "Max Mustermann" or "Mustermann, Max".
    pub display_name: String,
    pub role: Role,
}

impl UserSession {
    pub fn student(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            role: Role::Student,
        }
    }

    pub fn teacher(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            role: Role::Teacher,
        }
    }
}
