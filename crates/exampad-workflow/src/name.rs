//! Submitter filename derivation
//!
//! The relay stores one submission per submitting identity, named after
//! the student's display name. Identity providers report names either
//! as "First Last" or as "Last, First"; both map to
//! `<firstName(s)>_<lastName>.pdf`.

/// Derive the submission filename from a display name.
///
/// - `"Max Mustermann"` and `"Mustermann, Max"` both yield
///   `"Max_Mustermann.pdf"`
/// - a single token is used as-is, a blank name becomes
///   `"Unbekannt.pdf"`
pub fn derive_submitter_filename(display_name: &str) -> String {
    let name = display_name.trim();
    if name.is_empty() {
        return "Unbekannt.pdf".to_string();
    }

    let parts: Vec<&str> = match name.split_once(',') {
        // "Last, First [Middle]" — given names come first in the result
        Some((last, first)) => first
            .split_whitespace()
            .chain(last.split_whitespace())
            .collect(),
        // "First [Middle] Last" — already in order, last token is the
        // family name
        None => name.split_whitespace().collect(),
    };

    if parts.is_empty() {
        return "Unbekannt.pdf".to_string();
    }
    format!("{}.pdf", parts.join("_"))
}
