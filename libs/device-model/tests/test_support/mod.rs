#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// The descriptors shipped with the workspace.
pub fn descriptor_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../descriptors")
}

pub const MINIMAL: &str = r#"{
    "author": "Jane Doe <jane@example.com>",
    "api_version": [2, 0, 0],
    "category": "Bricklet",
    "device_identifier": 2100,
    "name": "Example",
    "description": {"en": "An example device"},
    "released": true,
    "packets": [
        {
            "type": "function",
            "name": "Get Value",
            "elements": [["Channel", "uint32", 1, "in"], ["Value", "int32", 1, "out"], ["Unit", "char", 1, "out"]],
            "since_firmware": [1, 0, 0],
            "doc": ["bf", {"en": "Returns the value."}]
        },
        {
            "type": "callback",
            "name": "Tick",
            "elements": [],
            "since_firmware": [1, 0, 0],
            "doc": ["c", {"en": "Triggered periodically."}]
        }
    ]
}"#;

/// A temporary directory holding `files` as (name, contents) pairs.
pub fn descriptor_tree(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    for (name, contents) in files {
        fs::write(dir.path().join(name), contents).expect("failed to write descriptor");
    }
    dir
}
