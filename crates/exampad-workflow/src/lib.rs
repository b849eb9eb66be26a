//! Submission workflow
//!
//! The state machine driving one exam from editable to handed-in:
//!
//! ```text
//! Editing -> Flattening -> Submitting -> { Submitted | SubmitFailed }
//! ```
//!
//! Flattening happens synchronously before any network call; a flatten
//! failure never reaches the relay. A failed upload leaves the exam
//! editable and the flattened file on disk, so a retry simply re-runs
//! the whole path — re-deriving the same output from the current
//! overlay makes the retry idempotent.

mod name;
mod submit;

pub use name::derive_submitter_filename;
pub use submit::{SubmissionState, SubmissionWorkflow};
