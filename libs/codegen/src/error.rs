//! Error types for binding generation
//!
//! The taxonomy follows the granularity at which generation recovers:
//! descriptor errors cost a device, resolution errors a packet, emission
//! errors one (device, language) file, and I/O errors one write.

use std::path::PathBuf;
use thiserror::Error;

/// A high-level descriptor that cannot be mapped onto its packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("packet '{packet}': stream '{stream}' has no chunk data element '{element}'")]
    MissingChunkData {
        packet: String,
        stream: String,
        element: String,
    },

    #[error("packet '{packet}': stream '{stream}' needs a length element '{element}' or a fixed length")]
    MissingLength {
        packet: String,
        stream: String,
        element: String,
    },

    #[error("packet '{packet}': multi-chunk stream '{stream}' needs a chunk offset element '{element}'")]
    MissingChunkOffset {
        packet: String,
        stream: String,
        element: String,
    },

    #[error("packet '{packet}': element '{element}' must be an {expected} element")]
    WrongDirection {
        packet: String,
        element: String,
        expected: &'static str,
    },

    #[error("packet '{packet}': element '{element}' must be a scalar integer")]
    NotAnInteger { packet: String, element: String },

    #[error("packet '{packet}': chunk data element '{element}' has unsupported type {ty}")]
    UnsupportedChunkType {
        packet: String,
        element: String,
        ty: String,
    },

    #[error("callback '{packet}' cannot carry an input stream")]
    StreamInCallback { packet: String },

    #[error("packet '{packet}': fixed length {fixed_length} exceeds the length field maximum {max}")]
    FixedLengthTooLarge {
        packet: String,
        fixed_length: usize,
        max: usize,
    },
}

/// Violations of the streaming protocol observed while assembling or
/// splitting stream data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("stream is out of sync: expected chunk offset {expected}, got {actual}")]
    OutOfSync { expected: usize, actual: usize },

    #[error("stream length changed from {previous} to {current}")]
    LengthChanged { previous: usize, current: usize },

    #[error("stream length {length} exceeds the maximum of {max}")]
    TooLong { length: usize, max: usize },

    #[error("stream is already complete")]
    AlreadyComplete,

    #[error("chunk {chunk} returned a different result than the chunks before it")]
    InconsistentResults { chunk: usize },
}

/// A construct an emitter cannot render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("{language}: no type mapping for '{ty}'")]
    UnsupportedType { language: &'static str, ty: String },

    #[error("{language}: cannot render {construct}")]
    UnsupportedConstruct {
        language: &'static str,
        construct: String,
    },
}

/// Everything a generation run can report.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Descriptor(#[from] devbind_model::Error),

    #[error("device '{device}': {error}")]
    Resolve { device: String, error: ResolveError },

    #[error("device '{device}', {language}: {error}")]
    Emit {
        device: String,
        language: &'static str,
        error: EmitError,
    },

    #[error("device '{device}', {language}: generation task panicked")]
    TaskPanicked {
        device: String,
        language: &'static str,
    },

    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, GenerateError>;
