use thiserror::Error;

/// Internal failure taxonomy. The public client API collapses all of
/// these to empty/`None`/`false` after logging the cause; callers only
/// see success or absence.
#[derive(Error, Debug)]
pub(crate) enum RelayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("response body is not a PDF")]
    NotPdf,

    #[error("storage error: {0}")]
    Storage(#[from] exampad_store::StoreError),

    #[error("invalid request: {0}")]
    Request(String),
}
