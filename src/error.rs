use thiserror::Error;

/// Errors surfaced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A frame could not be serialized to a compressed image. Non-fatal to
    /// tracker state; the caller decides whether to retry or skip.
    #[error("failed to encode frame: {0}")]
    Encoding(String),

    /// A configuration value is outside its valid range. Raised at
    /// construction, fatal.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
