use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by cast parsing, frame sampling and SVG synthesis.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cast file is missing a valid header line")]
    InvalidHeader,
    #[error("unsupported asciicast version: {0}")]
    UnsupportedVersion(u32),
    #[error("invalid SVG template: {0}")]
    InvalidTemplate(String),
    #[error("template {0:?} not found")]
    TemplateNotFound(String),
    #[error("animation has zero duration")]
    InvalidAnimation,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
