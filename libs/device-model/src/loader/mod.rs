//! Loader for device descriptors
//!
//! Parses one declarative descriptor per device into the IR and validates it
//! up front, so emitters never see dangling references or duplicate IDs. A
//! broken descriptor only costs its own device: `load_dir` reports it and keeps
//! going.

mod raw;

use semver::Version;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DescriptorError, Error, Result};
use crate::features::{self, Feature};
use crate::ir::{
    Category, Constant, ConstantGroup, ConstantValue, Device, Doc, Element, Example, ExampleStep,
    ExampleStepKind, HighLevelSpec, LocalizedText, Packet, PacketKind,
};
use crate::name::Name;
use crate::registry::DeviceRegistry;
use crate::types::{Direction, ElementType};
use raw::{
    RawConstantValue, RawDevice, RawElement, RawExample, RawHighLevel, RawPacket, RawStream,
};

/// Serialization format of a descriptor file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    Json,
    Yaml,
}

impl DescriptorFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(DescriptorFormat::Json),
            Some("yaml") | Some("yml") => Some(DescriptorFormat::Yaml),
            _ => None,
        }
    }
}

/// Result of loading a directory of descriptors.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub registry: DeviceRegistry,
    /// Descriptors that were skipped, with the reason.
    pub failures: Vec<Error>,
}

/// Parse and validate a single descriptor.
pub fn load_descriptor(
    text: &str,
    format: DescriptorFormat,
) -> std::result::Result<Device, DescriptorError> {
    let raw: RawDevice = match format {
        DescriptorFormat::Json => serde_json::from_str(text)?,
        DescriptorFormat::Yaml => serde_yaml::from_str(text)?,
    };
    build_device(raw)
}

/// Load one descriptor file, choosing the format from its extension.
pub fn load_file(path: &Path) -> Result<Device> {
    let format = DescriptorFormat::from_path(path)
        .ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    load_descriptor(&text, format).map_err(|source| Error::Descriptor {
        path: path.to_path_buf(),
        source,
    })
}

/// Load every `.json`/`.yaml`/`.yml` descriptor in `dir` (not recursive).
///
/// Only failing to read the directory itself is an error; broken descriptors
/// end up in [`LoadOutcome::failures`].
pub fn load_dir(dir: &Path) -> Result<LoadOutcome> {
    let entries = fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && DescriptorFormat::from_path(p).is_some())
        .collect();
    paths.sort();

    let mut outcome = LoadOutcome::default();

    for path in paths {
        let loaded = load_file(&path).and_then(|device| outcome.registry.insert(device));
        match loaded {
            Ok(()) => tracing::debug!(path = %path.display(), "Loaded device descriptor"),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "Skipping device descriptor"
                );
                outcome.failures.push(error);
            }
        }
    }

    tracing::info!(
        devices = outcome.registry.len(),
        failures = outcome.failures.len(),
        dir = %dir.display(),
        "Loaded device descriptors"
    );

    Ok(outcome)
}

fn require<T>(value: Option<T>, field: &str) -> std::result::Result<T, DescriptorError> {
    value.ok_or_else(|| DescriptorError::MissingField(field.to_string()))
}

fn invalid(field: &str, message: impl Into<String>) -> DescriptorError {
    DescriptorError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn parse_version(parts: [u64; 3]) -> Version {
    Version::new(parts[0], parts[1], parts[2])
}

fn build_device(raw: RawDevice) -> std::result::Result<Device, DescriptorError> {
    let name = Name::new(require(raw.name, "name")?);
    if name.is_empty() {
        return Err(invalid("name", "must not be empty"));
    }

    let category = match require(raw.category, "category")?.as_str() {
        "Brick" => Category::Brick,
        "Bricklet" => Category::Bricklet,
        "TNG" => Category::Tng,
        other => return Err(invalid("category", format!("unknown category '{}'", other))),
    };

    let features = raw
        .features
        .unwrap_or_default()
        .iter()
        .map(|f| Feature::parse_for(f, category))
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;

    let mut constant_groups = raw
        .constant_groups
        .unwrap_or_default()
        .into_iter()
        .map(build_constant_group)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let shared = features::shared_surface(&features);
    constant_groups.extend(shared.constant_groups);

    let mut group_names = HashSet::new();
    for group in &constant_groups {
        if !group_names.insert(group.name.clone()) {
            return Err(DescriptorError::Duplicate {
                kind: "constant group",
                name: group.name.to_string(),
            });
        }
    }

    let raw_packets = require(raw.packets, "packets")?;
    let mut packets = Vec::with_capacity(raw_packets.len() + shared.packets.len());
    for (index, raw_packet) in raw_packets.into_iter().enumerate() {
        packets.push(build_packet(raw_packet, index)?);
    }
    packets.extend(shared.packets);

    validate_packets(&packets, &constant_groups)?;

    let examples = raw
        .examples
        .unwrap_or_default()
        .into_iter()
        .map(|e| build_example(e, &packets))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let device = Device {
        identifier: require(raw.device_identifier, "device_identifier")?,
        display_name: raw.display_name.unwrap_or_else(|| name.to_string()),
        name,
        category,
        api_version: parse_version(require(raw.api_version, "api_version")?),
        author: require(raw.author, "author")?,
        manufacturer: raw.manufacturer.unwrap_or_default(),
        description: LocalizedText(require(raw.description, "description")?),
        released: require(raw.released, "released")?,
        documented: raw.documented.unwrap_or(false),
        discontinued: raw.discontinued.unwrap_or(false),
        features,
        constant_groups,
        packets,
        examples,
    };

    tracing::trace!(
        device = %device.name,
        packets = device.packets.len(),
        "Built device IR"
    );

    Ok(device)
}

fn build_constant_group(
    raw: raw::RawConstantGroup,
) -> std::result::Result<ConstantGroup, DescriptorError> {
    let name = Name::new(require(raw.name, "constant_groups.name")?);
    let ty: ElementType = require(raw.ty, "constant_groups.type")?.parse()?;

    if !ty.is_integer() && ty != ElementType::Char {
        return Err(invalid(
            "constant_groups.type",
            format!("group '{}' must be backed by an integer or char type", name),
        ));
    }

    let mut labels = HashSet::new();
    let mut values = HashSet::new();
    let mut constants = Vec::new();

    for (label, value) in require(raw.constants, "constant_groups.constants")? {
        let label = Name::new(label);
        let value = match (value, ty) {
            (RawConstantValue::Int(v), ty) if ty.is_integer() => {
                let (min, max) = ty.integer_range().unwrap_or((i128::MIN, i128::MAX));
                if (v as i128) < min || (v as i128) > max {
                    return Err(DescriptorError::ConstantOutOfRange {
                        group: name.to_string(),
                        constant: label.to_string(),
                        ty: ty.to_string(),
                    });
                }
                ConstantValue::Int(v)
            }
            (RawConstantValue::Str(s), ElementType::Char) if s.chars().count() == 1 => {
                ConstantValue::Char(s.chars().next().unwrap_or_default())
            }
            _ => {
                return Err(DescriptorError::ConstantOutOfRange {
                    group: name.to_string(),
                    constant: label.to_string(),
                    ty: ty.to_string(),
                })
            }
        };

        if !labels.insert(label.clone()) {
            return Err(DescriptorError::Duplicate {
                kind: "constant",
                name: format!("{} {}", name, label),
            });
        }
        if !values.insert(value) {
            return Err(DescriptorError::Duplicate {
                kind: "constant value",
                name: format!("{} = {}", label, value),
            });
        }

        constants.push(Constant { name: label, value });
    }

    Ok(ConstantGroup {
        name,
        ty,
        constants,
    })
}

fn build_packet(raw: RawPacket, index: usize) -> std::result::Result<Packet, DescriptorError> {
    let name = Name::new(require(raw.name, "packets.name")?);
    let kind = match require(raw.kind, "packets.type")?.as_str() {
        "function" => PacketKind::Function,
        "callback" => PacketKind::Callback,
        other => {
            return Err(invalid(
                "packets.type",
                format!("'{}' is neither 'function' nor 'callback'", other),
            ))
        }
    };

    // Function IDs default to the 1-based position within the packet list.
    let function_id = match raw.function_id {
        Some(id) => id,
        None => u8::try_from(index + 1)
            .map_err(|_| invalid("packets.function_id", format!("no ID left for '{}'", name)))?,
    };
    if function_id == 0 {
        return Err(invalid("packets.function_id", "0 is reserved"));
    }

    let elements = require(raw.elements, "packets.elements")?
        .into_iter()
        .map(build_element)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if kind == PacketKind::Callback && elements.iter().any(|e| e.direction == Direction::In) {
        return Err(invalid(
            "packets.elements",
            format!("callback '{}' cannot have input elements", name),
        ));
    }

    let (role, text) = require(raw.doc, "packets.doc")?;

    Ok(Packet {
        kind,
        name,
        function_id,
        elements,
        since_firmware: parse_version(require(raw.since_firmware, "packets.since_firmware")?),
        doc: Doc {
            role,
            text: LocalizedText(text),
        },
        high_level: raw.high_level.map(build_high_level).transpose()?,
    })
}

fn build_element(raw: RawElement) -> std::result::Result<Element, DescriptorError> {
    let (name, ty, cardinality, direction, constant_group) = raw.into_parts();

    if cardinality == 0 {
        return Err(invalid(
            "elements.cardinality",
            format!("element '{}' must have a cardinality of at least 1", name),
        ));
    }

    Ok(Element {
        name: Name::new(name),
        ty: ty.parse()?,
        cardinality,
        direction: direction.parse()?,
        constant_group: constant_group.map(Name::new),
    })
}

fn build_high_level(raw: RawHighLevel) -> std::result::Result<HighLevelSpec, DescriptorError> {
    let stream = |raw: RawStream| -> std::result::Result<_, DescriptorError> {
        let name = Name::new(require(raw.name, "high_level.name")?);
        if raw.fixed_length == Some(0) {
            return Err(invalid("high_level.fixed_length", "must be positive"));
        }
        Ok((name, raw.fixed_length, raw.single_chunk.unwrap_or(false)))
    };

    match (raw.stream_in, raw.stream_out) {
        (Some(s), None) => {
            let (name, fixed_length, single_chunk) = stream(s)?;
            Ok(HighLevelSpec::StreamIn {
                name,
                fixed_length,
                single_chunk,
            })
        }
        (None, Some(s)) => {
            let (name, fixed_length, single_chunk) = stream(s)?;
            Ok(HighLevelSpec::StreamOut {
                name,
                fixed_length,
                single_chunk,
            })
        }
        _ => Err(invalid(
            "high_level",
            "expected exactly one of 'stream_in' or 'stream_out'",
        )),
    }
}

fn validate_packets(
    packets: &[Packet],
    constant_groups: &[ConstantGroup],
) -> std::result::Result<(), DescriptorError> {
    let mut names = HashSet::new();
    let mut ids: BTreeMap<u8, &Name> = BTreeMap::new();

    for packet in packets {
        if !names.insert(&packet.name) {
            return Err(DescriptorError::Duplicate {
                kind: "packet",
                name: packet.name.to_string(),
            });
        }

        if let Some(first) = ids.insert(packet.function_id, &packet.name) {
            return Err(DescriptorError::DuplicateFunctionId {
                id: packet.function_id,
                first: first.to_string(),
                second: packet.name.to_string(),
            });
        }

        let mut element_names = HashSet::new();
        for element in &packet.elements {
            if !element_names.insert(&element.name) {
                return Err(DescriptorError::Duplicate {
                    kind: "element",
                    name: format!("{}.{}", packet.name, element.name),
                });
            }

            if let Some(group) = &element.constant_group {
                if !constant_groups.iter().any(|g| &g.name == group) {
                    return Err(DescriptorError::DanglingConstantGroup {
                        packet: packet.name.to_string(),
                        element: element.name.to_string(),
                        group: group.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn build_example(
    raw: RawExample,
    packets: &[Packet],
) -> std::result::Result<Example, DescriptorError> {
    let name = Name::new(require(raw.name, "examples.name")?);
    let mut steps = Vec::new();

    for step in require(raw.steps, "examples.steps")? {
        let kind = step.kind;
        let packet = Name::new(step.packet);

        let (wanted_kind, wanted_name, label) = match kind {
            ExampleStepKind::Getter | ExampleStepKind::Setter => {
                (PacketKind::Function, packet.clone(), "function")
            }
            ExampleStepKind::Callback => (PacketKind::Callback, packet.clone(), "callback"),
            ExampleStepKind::CallbackPeriod => (
                PacketKind::Function,
                Name::new(format!("Set {} Callback Period", packet)),
                "function",
            ),
        };

        if !packets
            .iter()
            .any(|p| p.kind == wanted_kind && p.name == wanted_name)
        {
            return Err(DescriptorError::DanglingExampleStep {
                example: name.to_string(),
                kind: label,
                packet: wanted_name.to_string(),
            });
        }

        steps.push(ExampleStep {
            kind,
            packet,
            arguments: step.arguments,
            period_ms: step.period_ms,
        });
    }

    Ok(Example { name, steps })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MINIMAL: &str = r#"{
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

    pub(crate) fn minimal_device() -> Device {
        load_descriptor(MINIMAL, DescriptorFormat::Json).unwrap()
    }

    #[test]
    fn assigns_positional_function_ids() {
        let device = minimal_device();
        let ids: Vec<u8> = device.packets.iter().map(|p| p.function_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(device.api_version, Version::new(2, 0, 0));
        assert!(device.constant_groups.is_empty());
    }

    #[test]
    fn reports_missing_fields_by_name() {
        let text = MINIMAL.replace(r#""device_identifier": 2100,"#, "");
        let err = load_descriptor(&text, DescriptorFormat::Json).unwrap_err();
        assert!(matches!(err, DescriptorError::MissingField(f) if f == "device_identifier"));
    }

    #[test]
    fn rejects_zero_cardinality() {
        let text = MINIMAL.replace(
            r#"["Channel", "uint32", 1, "in"]"#,
            r#"["Channel", "uint32", 0, "in"]"#,
        );
        assert!(matches!(
            load_descriptor(&text, DescriptorFormat::Json),
            Err(DescriptorError::InvalidValue { .. })
        ));
    }
}
