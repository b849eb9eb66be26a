use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF structure error: {0}")]
    StructureError(String),

    #[error("Failed to write PDF: {0}")]
    WriteError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
