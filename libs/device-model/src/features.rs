//! Capability flags and the shared packets they bring along
//!
//! Flags are a closed set so a typo in a descriptor fails loading instead of
//! silently disabling shared behavior.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DescriptorError;
use crate::ir::{
    Category, Constant, ConstantGroup, ConstantValue, Doc, DocRole, Element, LocalizedText,
    Packet, PacketKind,
};
use crate::name::Name;
use crate::types::{Direction, ElementType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    ComcuBricklet,
    BrickletGetIdentity,
    BrickGetIdentity,
    BrickStatusLed,
    BrickChipTemperature,
    BrickReset,
    SendTimeoutCount,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::ComcuBricklet,
        Feature::BrickletGetIdentity,
        Feature::BrickGetIdentity,
        Feature::BrickStatusLed,
        Feature::BrickChipTemperature,
        Feature::BrickReset,
        Feature::SendTimeoutCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::ComcuBricklet => "comcu_bricklet",
            Feature::BrickletGetIdentity => "bricklet_get_identity",
            Feature::BrickGetIdentity => "brick_get_identity",
            Feature::BrickStatusLed => "brick_status_led",
            Feature::BrickChipTemperature => "brick_chip_temperature",
            Feature::BrickReset => "brick_reset",
            Feature::SendTimeoutCount => "send_timeout_count",
        }
    }

    pub fn allowed_for(&self, category: Category) -> bool {
        match self {
            Feature::ComcuBricklet | Feature::BrickletGetIdentity => {
                matches!(category, Category::Bricklet | Category::Tng)
            }
            Feature::BrickGetIdentity
            | Feature::BrickStatusLed
            | Feature::BrickChipTemperature
            | Feature::BrickReset
            | Feature::SendTimeoutCount => category == Category::Brick,
        }
    }

    /// Parse a descriptor flag and check it against the device category.
    pub fn parse_for(value: &str, category: Category) -> Result<Feature, DescriptorError> {
        let feature: Feature = value.parse()?;
        if !feature.allowed_for(category) {
            return Err(DescriptorError::FeatureCategoryMismatch {
                feature: value.to_string(),
                category: category.to_string(),
            });
        }
        Ok(feature)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| DescriptorError::UnknownFeature(s.to_string()))
    }
}

/// Packets and constant groups contributed by a set of features.
#[derive(Debug, Default)]
pub struct SharedSurface {
    pub constant_groups: Vec<ConstantGroup>,
    pub packets: Vec<Packet>,
}

/// Collect the shared surface for `features`, in reserved function ID order.
pub fn shared_surface<'a>(features: impl IntoIterator<Item = &'a Feature>) -> SharedSurface {
    let mut surface = SharedSurface::default();

    for feature in features {
        match feature {
            Feature::ComcuBricklet => comcu_surface(&mut surface),
            Feature::BrickletGetIdentity | Feature::BrickGetIdentity => {
                surface.packets.push(get_identity());
            }
            Feature::BrickStatusLed => {
                surface.packets.push(function(
                    238,
                    "Enable Status LED",
                    vec![],
                    "Enables the status LED.",
                ));
                surface.packets.push(function(
                    239,
                    "Disable Status LED",
                    vec![],
                    "Disables the status LED.",
                ));
                surface.packets.push(function(
                    240,
                    "Is Status LED Enabled",
                    vec![out("Enabled", ElementType::Bool, 1)],
                    "Returns *true* if the status LED is enabled, *false* otherwise.",
                ));
            }
            Feature::BrickChipTemperature => surface.packets.push(chip_temperature()),
            Feature::BrickReset => surface.packets.push(reset()),
            Feature::SendTimeoutCount => {
                surface.constant_groups.push(group(
                    "Communication Method",
                    &[
                        ("None", 0),
                        ("USB", 1),
                        ("SPI Stack", 2),
                        ("Chibi", 3),
                        ("RS485", 4),
                        ("WIFI", 5),
                        ("Ethernet", 6),
                        ("WIFI V2", 7),
                    ],
                ));
                surface.packets.push(function(
                    233,
                    "Get Send Timeout Count",
                    vec![
                        with_group(
                            input("Communication Method", ElementType::UInt8, 1),
                            "Communication Method",
                        ),
                        out("Timeout Count", ElementType::UInt32, 1),
                    ],
                    "Returns the timeout count for the different communication methods.",
                ));
            }
        }
    }

    surface.packets.sort_by_key(|p| p.function_id);
    surface
}

fn comcu_surface(surface: &mut SharedSurface) {
    surface.constant_groups.push(group(
        "Bootloader Mode",
        &[
            ("Bootloader", 0),
            ("Firmware", 1),
            ("Bootloader Wait For Reboot", 2),
            ("Firmware Wait For Reboot", 3),
            ("Firmware Wait For Erase And Reboot", 4),
        ],
    ));
    surface.constant_groups.push(group(
        "Bootloader Status",
        &[
            ("OK", 0),
            ("Invalid Mode", 1),
            ("No Change", 2),
            ("Entry Function Not Present", 3),
            ("Device Identifier Incorrect", 4),
            ("CRC Mismatch", 5),
        ],
    ));
    surface.constant_groups.push(group(
        "Status LED Config",
        &[("Off", 0), ("On", 1), ("Show Heartbeat", 2), ("Show Status", 3)],
    ));

    surface.packets.push(function(
        234,
        "Get SPITFP Error Count",
        vec![
            out("Error Count Ack Checksum", ElementType::UInt32, 1),
            out("Error Count Message Checksum", ElementType::UInt32, 1),
            out("Error Count Frame", ElementType::UInt32, 1),
            out("Error Count Overflow", ElementType::UInt32, 1),
        ],
        "Returns the error count for the communication between Brick and Bricklet.",
    ));
    surface.packets.push(function(
        235,
        "Set Bootloader Mode",
        vec![
            with_group(input("Mode", ElementType::UInt8, 1), "Bootloader Mode"),
            with_group(out("Status", ElementType::UInt8, 1), "Bootloader Status"),
        ],
        "Sets the bootloader mode and returns the status after the requested mode change was instigated.",
    ));
    surface.packets.push(function(
        236,
        "Get Bootloader Mode",
        vec![with_group(out("Mode", ElementType::UInt8, 1), "Bootloader Mode")],
        "Returns the current bootloader mode, see :func:`Set Bootloader Mode`.",
    ));
    surface.packets.push(function(
        237,
        "Set Write Firmware Pointer",
        vec![input("Pointer", ElementType::UInt32, 1)],
        "Sets the firmware pointer for :func:`Write Firmware`.",
    ));
    surface.packets.push(function(
        238,
        "Write Firmware",
        vec![
            input("Data", ElementType::UInt8, 64),
            out("Status", ElementType::UInt8, 1),
        ],
        "Writes 64 Bytes of firmware at the position as written by :func:`Set Write Firmware Pointer` before.",
    ));
    surface.packets.push(function(
        239,
        "Set Status LED Config",
        vec![with_group(input("Config", ElementType::UInt8, 1), "Status LED Config")],
        "Sets the status LED configuration.",
    ));
    surface.packets.push(function(
        240,
        "Get Status LED Config",
        vec![with_group(out("Config", ElementType::UInt8, 1), "Status LED Config")],
        "Returns the configuration as set by :func:`Set Status LED Config`",
    ));
    surface.packets.push(chip_temperature());
    surface.packets.push(reset());
    surface.packets.push(function(
        248,
        "Write UID",
        vec![input("UID", ElementType::UInt32, 1)],
        "Writes a new UID into flash.",
    ));
    surface.packets.push(function(
        249,
        "Read UID",
        vec![out("UID", ElementType::UInt32, 1)],
        "Returns the current UID as an integer.",
    ));
}

fn get_identity() -> Packet {
    function(
        255,
        "Get Identity",
        vec![
            out("UID", ElementType::String, 8),
            out("Connected UID", ElementType::String, 8),
            out("Position", ElementType::Char, 1),
            out("Hardware Version", ElementType::UInt8, 3),
            out("Firmware Version", ElementType::UInt8, 3),
            out("Device Identifier", ElementType::UInt16, 1),
        ],
        "Returns the UID, the UID where the device is connected to, the position, \
         the hardware and firmware version as well as the device identifier.",
    )
}

fn chip_temperature() -> Packet {
    function(
        242,
        "Get Chip Temperature",
        vec![out("Temperature", ElementType::Int16, 1)],
        "Returns the temperature as measured inside the microcontroller.",
    )
}

fn reset() -> Packet {
    function(243, "Reset", vec![], "Calling this function will reset the device.")
}

fn function(id: u8, name: &str, elements: Vec<Element>, doc: &str) -> Packet {
    let mut text = BTreeMap::new();
    text.insert("en".to_string(), doc.to_string());

    Packet {
        kind: PacketKind::Function,
        name: Name::new(name),
        function_id: id,
        elements,
        since_firmware: Version::new(1, 0, 0),
        doc: Doc {
            role: DocRole::Af,
            text: LocalizedText(text),
        },
        high_level: None,
    }
}

fn element(name: &str, ty: ElementType, cardinality: usize, direction: Direction) -> Element {
    Element {
        name: Name::new(name),
        ty,
        cardinality,
        direction,
        constant_group: None,
    }
}

fn input(name: &str, ty: ElementType, cardinality: usize) -> Element {
    element(name, ty, cardinality, Direction::In)
}

fn out(name: &str, ty: ElementType, cardinality: usize) -> Element {
    element(name, ty, cardinality, Direction::Out)
}

fn with_group(mut element: Element, group: &str) -> Element {
    element.constant_group = Some(Name::new(group));
    element
}

fn group(name: &str, constants: &[(&str, i64)]) -> ConstantGroup {
    ConstantGroup {
        name: Name::new(name),
        ty: ElementType::UInt8,
        constants: constants
            .iter()
            .map(|(label, value)| Constant {
                name: Name::new(*label),
                value: ConstantValue::Int(*value),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_and_misplaced_flags() {
        assert!(matches!(
            Feature::parse_for("comcu_brickelt", Category::Bricklet),
            Err(DescriptorError::UnknownFeature(_))
        ));
        assert!(matches!(
            Feature::parse_for("brick_reset", Category::Bricklet),
            Err(DescriptorError::FeatureCategoryMismatch { .. })
        ));
        assert_eq!(
            Feature::parse_for("comcu_bricklet", Category::Bricklet).unwrap(),
            Feature::ComcuBricklet
        );
    }

    #[test]
    fn comcu_surface_uses_reserved_ids_in_order() {
        let surface = shared_surface(&[Feature::ComcuBricklet, Feature::BrickletGetIdentity]);
        let ids: Vec<u8> = surface.packets.iter().map(|p| p.function_id).collect();
        assert_eq!(ids, vec![234, 235, 236, 237, 238, 239, 240, 242, 243, 248, 249, 255]);
        assert_eq!(surface.constant_groups.len(), 3);
    }
}
