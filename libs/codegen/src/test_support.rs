//! Fixture devices for unit tests

use std::sync::Arc;

use chrono::NaiveDate;
use devbind_model::{load_descriptor, DescriptorFormat, Device};
use semver::Version;

use crate::generators::RenderContext;
use crate::resolver::{resolve_device, ResolvedDevice};

pub(crate) const GPS_V2: &str = include_str!("../../../descriptors/bricklet_gps_v2.json");
pub(crate) const SERIAL_LINK: &str = include_str!("../../../descriptors/bricklet_serial_link.yaml");

/// One function (uint32 in; int32 and char out) and one empty callback.
pub(crate) const EXAMPLE: &str = r#"{
    "author": "Jane Doe <jane@example.com>",
    "api_version": [2, 0, 0],
    "category": "Bricklet",
    "device_identifier": 2100,
    "name": "Example",
    "display_name": "Example",
    "description": {"en": "An example device"},
    "released": true,
    "packets": [
        {
            "type": "function",
            "name": "Get Value",
            "elements": [["Channel", "uint32", 1, "in"], ["Value", "int32", 1, "out"], ["Unit", "char", 1, "out"]],
            "since_firmware": [1, 0, 0],
            "doc": ["bf", {"en": "Returns the value of a channel."}]
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

const CONSTANTS: &str = r#"{
    "author": "Jane Doe <jane@example.com>",
    "api_version": [2, 0, 0],
    "category": "Bricklet",
    "device_identifier": 2101,
    "name": "Modes",
    "description": {"en": "Mode switching"},
    "released": true,
    "constant_groups": [
        {"name": "Mode", "type": "uint8", "constants": [["Slow", 0], ["Fast", 1]]}
    ],
    "packets": [
        {
            "type": "function",
            "name": "Set Mode",
            "elements": [
                ["Mode", "uint8", 1, "in", {"constant_group": "Mode"}],
                ["Fallback Mode", "uint8", 1, "in", {"constant_group": "Mode"}]
            ],
            "since_firmware": [1, 0, 0],
            "doc": ["bf", {"en": "Sets the mode."}]
        }
    ]
}"#;

/// A callback streaming a single chunk whose length is carried on the wire.
const SAMPLES: &str = r#"{
    "author": "Jane Doe <jane@example.com>",
    "api_version": [2, 0, 0],
    "category": "Bricklet",
    "device_identifier": 2103,
    "name": "Sampler",
    "description": {"en": "Reports sample bursts"},
    "released": true,
    "packets": [
        {
            "type": "callback",
            "name": "Samples Low Level",
            "elements": [["Samples Length", "uint16", 1, "out"], ["Samples Data", "int16", 8, "out"]],
            "since_firmware": [1, 0, 0],
            "doc": ["c", {"en": "Triggered for every burst."}],
            "high_level": {"stream_out": {"name": "Samples", "single_chunk": true}}
        }
    ]
}"#;

fn load_json(text: &str) -> Device {
    load_descriptor(text, DescriptorFormat::Json).unwrap()
}

pub(crate) fn example_device() -> Arc<Device> {
    Arc::new(load_json(EXAMPLE))
}

pub(crate) fn device_with_constants() -> Device {
    load_json(CONSTANTS)
}

pub(crate) fn sampler() -> Arc<Device> {
    Arc::new(load_json(SAMPLES))
}

pub(crate) fn gps_v2() -> Arc<Device> {
    Arc::new(load_json(GPS_V2))
}

pub(crate) fn serial_link() -> Arc<Device> {
    Arc::new(load_descriptor(SERIAL_LINK, DescriptorFormat::Yaml).unwrap())
}

pub(crate) fn resolved(device: Arc<Device>) -> ResolvedDevice {
    let resolved = resolve_device(device);
    assert!(resolved.errors.is_empty(), "{:?}", resolved.errors);
    resolved
}

pub(crate) fn context() -> RenderContext {
    RenderContext {
        generate_docs: true,
        locale: "en".to_string(),
        bindings_version: Version::new(2, 1, 30),
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    }
}

/// Lines of `code` that start with `prefix` after indentation.
pub(crate) fn lines_starting_with<'a>(code: &'a str, prefix: &str) -> Vec<&'a str> {
    code.lines()
        .map(str::trim_start)
        .filter(|l| l.starts_with(prefix))
        .collect()
}
