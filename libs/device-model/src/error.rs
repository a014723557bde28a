//! Error types for descriptor loading

use std::path::PathBuf;
use thiserror::Error;

/// A malformed or inconsistent device descriptor.
///
/// Any of these aborts loading of the one device it was found in.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("unknown element type '{0}'")]
    UnknownType(String),

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("feature '{feature}' is not available for category {category}")]
    FeatureCategoryMismatch { feature: String, category: String },

    #[error("element '{element}' of packet '{packet}' references unknown constant group '{group}'")]
    DanglingConstantGroup {
        packet: String,
        element: String,
        group: String,
    },

    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("function ID {id} is used by both '{first}' and '{second}'")]
    DuplicateFunctionId { id: u8, first: String, second: String },

    #[error("constant '{constant}' of group '{group}' does not fit into {ty}")]
    ConstantOutOfRange {
        group: String,
        constant: String,
        ty: String,
    },

    #[error("example '{example}' references unknown {kind} '{packet}'")]
    DanglingExampleStep {
        example: String,
        kind: &'static str,
        packet: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: DescriptorError,
    },

    #[error("device identifier {identifier} of '{name}' is already used by '{existing}'")]
    DuplicateDevice {
        identifier: u16,
        name: String,
        existing: String,
    },

    #[error("unsupported descriptor file extension: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
