mod test_support;

use std::fs;

use devbind_codegen::provenance::{normalize, HeaderMatcher};
use devbind_codegen::{
    generate_from_dir, CodeGenerator, GenerateError, GenerationDriver, GeneratorConfig, Language,
};
use test_support::{config_on, date, descriptor_dir, read, single_hunk};

#[test]
fn generates_every_language_for_the_shipped_descriptors() {
    let out = tempfile::tempdir().unwrap();
    let summary = generate_from_dir(
        &descriptor_dir(),
        out.path(),
        &Language::ALL,
        &config_on(date(2024, 5, 14)),
        &GenerationDriver::new().with_workers(2),
    )
    .unwrap();

    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(summary.devices, 2);

    for path in [
        "python/bricklet_gps_v2.py",
        "python/bricklet_serial_link.py",
        "python/device_factory.py",
        "python/examples/bricklet_gps_v2/example_simple.py",
        "rust/bricklet_gps_v2.rs",
        "c/bricklet_serial_link.h",
        "javascript/BrickletGPSV2.js",
        "javascript/index.js",
    ] {
        assert!(out.path().join(path).is_file(), "missing {}", path);
    }

    let python = read(out.path().join("python/bricklet_gps_v2.py"));
    assert!(python.contains("# This file was automatically generated on 2024-05-14."));
    assert!(python.contains("# Python Bindings Version 2.1.30"));

    let header = read(out.path().join("c/bricklet_serial_link.h"));
    assert!(header.contains("__DEVICE_IS_NOT_RELEASED__"));
    assert!(!read(out.path().join("c/bricklet_gps_v2.h")).contains("__DEVICE_IS_NOT_RELEASED__"));

    let index = read(out.path().join("javascript/index.js"));
    assert!(index.contains("BrickletGPSV2"));
    assert!(!index.contains("BrickletSerialLink"));
}

#[test]
fn regeneration_only_moves_the_banner() {
    let driver = GenerationDriver::new();
    let first = CodeGenerator::from_dir(&descriptor_dir())
        .unwrap()
        .generate(&Language::ALL, &config_on(date(2024, 5, 14)), &driver);
    let second = CodeGenerator::from_dir(&descriptor_dir())
        .unwrap()
        .generate(&Language::ALL, &config_on(date(2024, 6, 2)), &driver);

    assert_eq!(
        first.files.keys().collect::<Vec<_>>(),
        second.files.keys().collect::<Vec<_>>()
    );

    let matcher = HeaderMatcher::new();
    for (key, old) in &first.files {
        let new = &second.files[key];
        assert_eq!(normalize(old), normalize(new), "{:?}", key);
        if let Some(hunk) = single_hunk(old, new) {
            assert!(matcher.is_header_only(&hunk), "{:?}:\n{}", key, hunk);
        }
    }
}

#[test]
fn same_inputs_give_identical_files() {
    let config = config_on(date(2024, 5, 14));
    let one = CodeGenerator::from_dir(&descriptor_dir())
        .unwrap()
        .generate(&Language::ALL, &config, &GenerationDriver::new().with_workers(1));
    let many = CodeGenerator::from_dir(&descriptor_dir())
        .unwrap()
        .generate(&Language::ALL, &config, &GenerationDriver::new().with_workers(6));
    assert_eq!(one.files, many.files);
}

#[test]
fn a_real_change_is_not_header_only() {
    let driver = GenerationDriver::new();
    let report = CodeGenerator::from_dir(&descriptor_dir())
        .unwrap()
        .generate(&[Language::Python], &config_on(date(2024, 5, 14)), &driver);
    let old = report.file(Language::Python, "bricklet_gps_v2.py").unwrap();
    let new = old.replacen("def get_coordinates(", "def get_coordinates_v2(", 1);

    let hunk = single_hunk(old, &new).unwrap();
    assert!(!HeaderMatcher::new().is_header_only(&hunk));
}

#[test]
fn broken_descriptors_are_reported_with_the_others_generated() {
    let descriptors = tempfile::tempdir().unwrap();
    fs::copy(
        descriptor_dir().join("bricklet_gps_v2.json"),
        descriptors.path().join("bricklet_gps_v2.json"),
    )
    .unwrap();
    fs::write(descriptors.path().join("broken.json"), "{\"name\": ").unwrap();

    let out = tempfile::tempdir().unwrap();
    let summary = generate_from_dir(
        descriptors.path(),
        out.path(),
        &[Language::Python],
        &GeneratorConfig::default(),
        &GenerationDriver::new(),
    )
    .unwrap();

    assert_eq!(summary.devices, 1);
    assert_eq!(summary.failures.len(), 1);
    assert!(matches!(summary.failures[0], GenerateError::Descriptor(_)));
    assert!(out.path().join("python/bricklet_gps_v2.py").is_file());
}

#[test]
fn a_missing_descriptor_directory_fails_the_run() {
    let out = tempfile::tempdir().unwrap();
    let result = generate_from_dir(
        &out.path().join("missing"),
        out.path(),
        &Language::ALL,
        &GeneratorConfig::default(),
        &GenerationDriver::new(),
    );
    assert!(result.is_err());
}

#[test]
fn unrenderable_streams_lose_only_their_high_level_view() {
    let descriptors = tempfile::tempdir().unwrap();
    fs::write(
        descriptors.path().join("bricklet_text.json"),
        r#"{
            "author": "Jane Doe <jane@example.com>",
            "api_version": [2, 0, 0],
            "category": "Bricklet",
            "device_identifier": 2104,
            "name": "Text",
            "description": {"en": "Streams text"},
            "released": true,
            "packets": [
                {
                    "type": "function",
                    "name": "Get Value",
                    "elements": [["Value", "int32", 1, "out"]],
                    "since_firmware": [1, 0, 0],
                    "doc": ["bf", {"en": "Returns the value."}]
                },
                {
                    "type": "function",
                    "name": "Write Low Level",
                    "elements": [
                        ["Message Length", "uint16", 1, "in"],
                        ["Message Chunk Offset", "uint16", 1, "in"],
                        ["Message Chunk Data", "string", 60, "in"]
                    ],
                    "since_firmware": [1, 0, 0],
                    "doc": ["llf", {"en": "Writes text."}],
                    "high_level": {"stream_in": {"name": "Message"}}
                }
            ]
        }"#,
    )
    .unwrap();

    let out = tempfile::tempdir().unwrap();
    let summary = generate_from_dir(
        descriptors.path(),
        out.path(),
        &Language::ALL,
        &config_on(date(2024, 5, 14)),
        &GenerationDriver::new(),
    )
    .unwrap();

    assert_eq!(summary.failures.len(), 1, "{:?}", summary.failures);
    assert!(matches!(
        &summary.failures[0],
        GenerateError::Resolve { device, .. } if device == "Text"
    ));

    let python = read(out.path().join("python/bricklet_text.py"));
    assert!(python.contains("    def get_value(self):\n"));
    for path in ["rust/bricklet_text.rs", "c/bricklet_text.h", "javascript/BrickletText.js"] {
        assert!(out.path().join(path).is_file(), "missing {}", path);
    }
}
