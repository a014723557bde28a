mod test_support;

use devbind_model::{
    load_descriptor, load_dir, load_file, Category, ConstantValue, DescriptorError,
    DescriptorFormat, Direction, ElementType, Error, HighLevelSpec, Name, PacketKind,
};
use test_support::{descriptor_dir, descriptor_tree, MINIMAL};

#[test]
fn loads_the_shipped_descriptors() {
    let outcome = load_dir(&descriptor_dir()).unwrap();
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.registry.len(), 2);

    let gps = outcome.registry.get(276).unwrap();
    assert_eq!(gps.name, Name::new("GPS V2"));
    assert_eq!(gps.category, Category::Bricklet);
    assert_eq!(gps.long_display_name(), "GPS Bricklet 2.0");
    assert!(gps.released);

    let serial = outcome.registry.get_by_name("Serial Link").unwrap();
    assert_eq!(serial.identifier, 2901);
    assert!(!serial.released);

    let released: Vec<u16> = outcome.registry.released().map(|d| d.identifier).collect();
    assert_eq!(released, vec![276]);
}

#[test]
fn json_and_yaml_descriptors_share_one_model() {
    let gps = load_file(&descriptor_dir().join("bricklet_gps_v2.json")).unwrap();
    let serial = load_file(&descriptor_dir().join("bricklet_serial_link.yaml")).unwrap();

    let coordinates = gps.packet(&Name::new("Get Coordinates")).unwrap();
    assert_eq!(coordinates.kind, PacketKind::Function);
    assert_eq!(coordinates.function_id, 1);
    assert!(coordinates.outputs().count() > 1);

    let parity = serial.constant_group(&Name::new("Parity")).unwrap();
    assert_eq!(parity.ty, ElementType::Char);
    assert_eq!(parity.constants[0].value, ConstantValue::Char('n'));
}

#[test]
fn function_ids_follow_position_unless_overridden() {
    let serial = load_file(&descriptor_dir().join("bricklet_serial_link.yaml")).unwrap();
    let receive = serial.packet(&Name::new("Receive Low Level")).unwrap();
    assert_eq!(receive.kind, PacketKind::Callback);
    assert_eq!(receive.function_id, 13);
    assert!(receive.elements.iter().all(|e| e.direction == Direction::Out));

    let text = MINIMAL.replace(
        r#""name": "Tick","#,
        r#""name": "Tick", "function_id": 42,"#,
    );
    let device = load_descriptor(&text, DescriptorFormat::Json).unwrap();
    let ids: Vec<u8> = device.packets.iter().map(|p| p.function_id).collect();
    assert_eq!(ids, vec![1, 42]);
}

#[test]
fn high_level_specs_are_parsed() {
    let gps = load_file(&descriptor_dir().join("bricklet_gps_v2.json")).unwrap();
    let status = gps
        .packet(&Name::new("Get Satellite System Status Low Level"))
        .unwrap();
    assert!(matches!(
        &status.high_level,
        Some(HighLevelSpec::StreamOut { name, single_chunk: true, .. })
            if name == &Name::new("Satellite Numbers")
    ));
    assert_eq!(status.high_level_name(), Name::new("Get Satellite System Status"));
}

#[test]
fn broken_descriptors_only_cost_their_own_device() {
    let broken = MINIMAL.replace(r#""uint32""#, r#""uint33""#);
    let duplicate = MINIMAL.replace(r#""name": "Example""#, r#""name": "Example Copy""#);
    let dir = descriptor_tree(&[
        ("a_example.json", MINIMAL),
        ("b_broken.json", broken.as_str()),
        ("c_duplicate.json", duplicate.as_str()),
        ("notes.txt", "not a descriptor"),
    ]);

    let outcome = load_dir(dir.path()).unwrap();
    assert_eq!(outcome.registry.len(), 1);
    assert_eq!(outcome.failures.len(), 2);
    assert!(matches!(
        &outcome.failures[0],
        Error::Descriptor { source: DescriptorError::UnknownType(t), .. } if t == "uint33"
    ));
    assert!(matches!(
        &outcome.failures[1],
        Error::DuplicateDevice { identifier: 2100, existing, .. } if existing == "Example"
    ));
}

#[test]
fn a_missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(load_dir(&missing), Err(Error::Io { .. })));
}

#[test]
fn unknown_extensions_are_rejected() {
    let dir = descriptor_tree(&[("device.toml", MINIMAL)]);
    assert!(matches!(
        load_file(&dir.path().join("device.toml")),
        Err(Error::UnsupportedFormat(_))
    ));
}

#[test]
fn dangling_constant_groups_are_rejected() {
    let text = MINIMAL.replace(
        r#"["Channel", "uint32", 1, "in"]"#,
        r#"["Channel", "uint32", 1, "in", {"constant_group": "Channel"}]"#,
    );
    let err = load_descriptor(&text, DescriptorFormat::Json).unwrap_err();
    assert!(matches!(
        err,
        DescriptorError::DanglingConstantGroup { group, .. } if group == "Channel"
    ));
}

#[test]
fn constants_must_fit_their_group_type() {
    let text = MINIMAL.replace(
        r#""packets": ["#,
        r#""constant_groups": [{"name": "Level", "type": "uint8", "constants": [["High", 256]]}],
        "packets": ["#,
    );
    let err = load_descriptor(&text, DescriptorFormat::Json).unwrap_err();
    assert!(matches!(
        err,
        DescriptorError::ConstantOutOfRange { constant, .. } if constant == "High"
    ));
}

#[test]
fn duplicate_constant_values_are_rejected() {
    let text = MINIMAL.replace(
        r#""packets": ["#,
        r#""constant_groups": [{"name": "Level", "type": "uint8", "constants": [["Low", 1], ["High", 1]]}],
        "packets": ["#,
    );
    assert!(matches!(
        load_descriptor(&text, DescriptorFormat::Json),
        Err(DescriptorError::Duplicate { kind: "constant value", .. })
    ));
}

#[test]
fn duplicate_function_ids_are_rejected() {
    let text = MINIMAL.replace(
        r#""name": "Tick","#,
        r#""name": "Tick", "function_id": 1,"#,
    );
    let err = load_descriptor(&text, DescriptorFormat::Json).unwrap_err();
    assert!(matches!(err, DescriptorError::DuplicateFunctionId { id: 1, .. }));
}

#[test]
fn callbacks_cannot_take_inputs() {
    let text = MINIMAL.replace(
        r#""name": "Tick",
            "elements": []"#,
        r#""name": "Tick",
            "elements": [["Count", "uint8", 1, "in"]]"#,
    );
    assert!(matches!(
        load_descriptor(&text, DescriptorFormat::Json),
        Err(DescriptorError::InvalidValue { field, .. }) if field == "packets.elements"
    ));
}

#[test]
fn example_steps_must_reference_existing_packets() {
    let text = MINIMAL.replace(
        r#""packets": ["#,
        r#""examples": [{"name": "Simple", "steps": [{"kind": "getter", "packet": "Get Nothing"}]}],
        "packets": ["#,
    );
    let err = load_descriptor(&text, DescriptorFormat::Json).unwrap_err();
    assert!(matches!(
        err,
        DescriptorError::DanglingExampleStep {
            kind: "function",
            packet,
            ..
        } if packet == "Get Nothing"
    ));
}
