//! The per-exam submission state machine

use std::fs;

use exampad_overlay::Overlay;
use exampad_relay::RelayClient;
use exampad_store::ExamStore;
use exampad_types::UserSession;
use tracing::{info, warn};

use crate::name::derive_submitter_filename;

/// Observable states of one exam instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    /// Overlay mutable, document displayed.
    Editing,
    /// Compositing the overlay into the document; a mutual-exclusion
    /// region — only one flatten per document reference at a time.
    Flattening,
    /// Flattened bytes on their way to the relay.
    Submitting,
    /// Handed in: flag set, overlay deleted, edits disabled.
    Submitted,
    /// Something failed; the exam stays editable and a retry re-runs
    /// the whole path.
    SubmitFailed,
}

/// Drives one exam through flatten -> submit -> bookkeeping.
#[derive(Debug)]
pub struct SubmissionWorkflow {
    state: SubmissionState,
}

impl Default for SubmissionWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionWorkflow {
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Editing,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Flatten the exam's overlay into its document and hand the result
    /// in. Returns the resulting state; all failures are recoverable by
    /// calling again.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit(
        &mut self,
        session: &UserSession,
        store: &ExamStore,
        relay: &RelayClient,
        class_id: &str,
        subject_id: &str,
        filename: &str,
        scale: f64,
    ) -> SubmissionState {
        if store.is_submitted(class_id, subject_id, filename) {
            info!(class_id, subject_id, filename, "exam already submitted");
            self.state = SubmissionState::Submitted;
            return self.state;
        }

        // Flattening is synchronous and must complete before any
        // network call.
        self.state = SubmissionState::Flattening;
        let overlay = match store.load_overlay(class_id, subject_id, filename) {
            Ok(Some(overlay)) => overlay,
            Ok(None) => Overlay::new(),
            Err(e) => {
                warn!(class_id, subject_id, filename, error = %e, "loading overlay failed");
                self.state = SubmissionState::SubmitFailed;
                return self.state;
            }
        };

        let exam_path = store.exam_path(class_id, subject_id, filename);
        if let Err(e) = exampad_compose::flatten_file(&exam_path, &overlay, scale) {
            warn!(class_id, subject_id, filename, error = %e, "flattening failed, not submitting");
            self.state = SubmissionState::SubmitFailed;
            return self.state;
        }

        self.state = SubmissionState::Submitting;
        let pdf_bytes = match fs::read(&exam_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(class_id, subject_id, filename, error = %e, "reading flattened exam failed");
                self.state = SubmissionState::SubmitFailed;
                return self.state;
            }
        };

        let submitter_filename = derive_submitter_filename(&session.display_name);
        let accepted = relay
            .submit_exam(class_id, subject_id, filename, &submitter_filename, pdf_bytes)
            .await;
        if !accepted {
            // Flattened file stays on disk; the retry does not need it
            // but re-derives the same output anyway.
            self.state = SubmissionState::SubmitFailed;
            return self.state;
        }

        // The ink is baked into the submitted file; the overlay has
        // served its purpose.
        if let Err(e) = store
            .mark_submitted(class_id, subject_id, filename)
            .and_then(|()| store.delete_overlay(class_id, subject_id, filename))
        {
            warn!(class_id, subject_id, filename, error = %e, "post-submit bookkeeping failed");
            self.state = SubmissionState::SubmitFailed;
            return self.state;
        }

        info!(class_id, subject_id, filename, submitter = %submitter_filename, "exam submitted");
        self.state = SubmissionState::Submitted;
        self.state
    }
}
