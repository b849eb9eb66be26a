use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Failed to serialize overlay: {0}")]
    Serialize(String),

    #[error("Failed to parse overlay data: {0}")]
    Parse(String),
}
