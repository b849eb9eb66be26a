//! Shared exampad domain types
//!
//! This crate provides the common types used across the monolith:
//! document references, relay listing rows, the user session, and the
//! cheap PDF validity check applied to every binary download.

mod types;

pub use types::{
    has_pdf_magic, DocumentRef, DocumentSummary, Role, SubmissionSummary, UserSession,
    A4_HEIGHT, A4_WIDTH, PDF_MAGIC,
};
