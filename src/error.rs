//! Error taxonomy for the generation pipeline.
//!
//! Every error aborts generation before anything is written; a half-compiled
//! program deployed to the pen could leave the device stuck.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    /// Malformed or missing mandatory input.
    #[error("config: {0}")]
    Config(String),

    /// A pair's required audio clip could not be resolved.
    #[error("missing audio asset `{clip}` for pair `{pair}` (no media file, no speak entry)")]
    AssetMissing { pair: String, clip: String },

    /// Register, line-command or entry-code budget of the device exceeded.
    #[error("device capacity exceeded: {0}")]
    Capacity(String),

    /// The emitted program failed a self-check. Always a bug in the emitter.
    #[error("generation invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, GenError>;

impl GenError {
    pub fn config(msg: impl Into<String>) -> Self {
        GenError::Config(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        GenError::Capacity(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        GenError::Invariant(msg.into())
    }
}
