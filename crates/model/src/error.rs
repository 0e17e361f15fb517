use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("descriptor error: {0}")]
    Parse(#[from] ParseError),
}

/// Failure to decode a descriptor or configuration file.
///
/// Kept separate from [`ModelError`] because callers treat it as a
/// transient mid-edit state rather than a fault.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct ParseError(pub(crate) String);
