//! Intermediate Representation (IR)
//!
//! Language-agnostic representation of one device's protocol surface, built by
//! the loader and read (never mutated) by the resolver and every emitter.
//! Element and packet order is significant: it defines the wire layout and the
//! order of call signatures.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::features::Feature;
use crate::name::Name;
use crate::types::{Direction, ElementType};

/// One hardware/firmware unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Stable wire identifier, unique across all devices
    pub identifier: u16,
    pub name: Name,
    pub display_name: String,
    pub category: Category,
    pub api_version: Version,
    pub author: String,
    pub manufacturer: String,
    pub description: LocalizedText,
    pub released: bool,
    pub documented: bool,
    pub discontinued: bool,
    pub features: BTreeSet<Feature>,
    pub constant_groups: Vec<ConstantGroup>,
    pub packets: Vec<Packet>,
    pub examples: Vec<Example>,
}

impl Device {
    pub fn functions(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter().filter(|p| p.kind == PacketKind::Function)
    }

    pub fn callbacks(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter().filter(|p| p.kind == PacketKind::Callback)
    }

    pub fn packet(&self, name: &Name) -> Option<&Packet> {
        self.packets.iter().find(|p| &p.name == name)
    }

    pub fn constant_group(&self, name: &Name) -> Option<&ConstantGroup> {
        self.constant_groups.iter().find(|g| &g.name == name)
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Category prefixed name, e.g. `Bricklet GPS V2`.
    pub fn full_name(&self) -> Name {
        Name::new(format!("{} {}", self.category.name(), self.name))
    }

    /// Display name with the category inserted before a trailing version
    /// number: `GPS 2.0` becomes `GPS Bricklet 2.0`.
    pub fn long_display_name(&self) -> String {
        let category = self.category.name();
        match self.display_name.rsplit_once(' ') {
            Some((head, tail)) if tail.chars().next().is_some_and(|c| c.is_ascii_digit()) => {
                format!("{} {} {}", head, category, tail)
            }
            _ => format!("{} {}", self.display_name, category),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Brick,
    Bricklet,
    #[serde(rename = "TNG")]
    Tng,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Brick => "Brick",
            Category::Bricklet => "Bricklet",
            Category::Tng => "TNG",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Text keyed by locale (`en`, `de`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(pub BTreeMap<String, String>);

impl LocalizedText {
    /// Text for `locale`, falling back to English and then to any locale.
    pub fn get(&self, locale: &str) -> &str {
        self.0
            .get(locale)
            .or_else(|| self.0.get("en"))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// A named enumeration restricting the values of elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantGroup {
    pub name: Name,
    pub ty: ElementType,
    pub constants: Vec<Constant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constant {
    pub name: Name,
    pub value: ConstantValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Int(i64),
    Char(char),
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Int(v) => write!(f, "{}", v),
            ConstantValue::Char(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketKind {
    Function,
    Callback,
}

/// One callable unit of the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub kind: PacketKind,
    pub name: Name,
    pub function_id: u8,
    pub elements: Vec<Element>,
    pub since_firmware: Version,
    pub doc: Doc,
    pub high_level: Option<HighLevelSpec>,
}

impl Packet {
    pub fn elements(&self, direction: Direction) -> impl Iterator<Item = &Element> {
        self.elements
            .iter()
            .filter(move |e| e.direction == direction)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Element> {
        self.elements(Direction::In)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Element> {
        self.elements(Direction::Out)
    }

    pub fn output_count(&self) -> usize {
        self.outputs().count()
    }

    pub fn is_callback(&self) -> bool {
        self.kind == PacketKind::Callback
    }

    pub fn element(&self, name: &Name) -> Option<(usize, &Element)> {
        self.elements.iter().enumerate().find(|(_, e)| &e.name == name)
    }

    /// Packets with a trailing `Low Level` are wrapped by a high-level
    /// counterpart without that suffix.
    pub fn high_level_name(&self) -> Name {
        if self.name.ends_with_words("Low Level") {
            self.name.without_suffix(2)
        } else {
            self.name.clone()
        }
    }
}

/// One parameter or return value of a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: Name,
    pub ty: ElementType,
    /// 1 for scalars, the array length otherwise. For strings this is the
    /// maximum length.
    pub cardinality: usize,
    pub direction: Direction,
    pub constant_group: Option<Name>,
}

impl Element {
    pub fn is_array(&self) -> bool {
        self.cardinality > 1 && self.ty != ElementType::String
    }

    pub fn wire_size(&self) -> usize {
        self.ty.wire_size(self.cardinality)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doc {
    pub role: DocRole,
    pub text: LocalizedText,
}

/// Documentation role of a packet, which also drives response expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocRole {
    /// Basic function
    Bf,
    /// Advanced function
    Af,
    /// Callback configuration function
    Ccf,
    /// Callback
    C,
    /// Low-level function
    Llf,
    /// Internal function
    If,
}

/// Declares a packet as one chunk of a client-visible stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighLevelSpec {
    /// The caller's array is split into chunks sent by repeated calls.
    StreamIn {
        name: Name,
        fixed_length: Option<usize>,
        single_chunk: bool,
    },
    /// Chunks returned (or called back) by the device are reassembled.
    StreamOut {
        name: Name,
        fixed_length: Option<usize>,
        single_chunk: bool,
    },
}

impl HighLevelSpec {
    pub fn stream_name(&self) -> &Name {
        match self {
            HighLevelSpec::StreamIn { name, .. } | HighLevelSpec::StreamOut { name, .. } => name,
        }
    }

    pub fn fixed_length(&self) -> Option<usize> {
        match self {
            HighLevelSpec::StreamIn { fixed_length, .. }
            | HighLevelSpec::StreamOut { fixed_length, .. } => *fixed_length,
        }
    }

    pub fn single_chunk(&self) -> bool {
        match self {
            HighLevelSpec::StreamIn { single_chunk, .. }
            | HighLevelSpec::StreamOut { single_chunk, .. } => *single_chunk,
        }
    }
}

/// Usage steps carried through to generated example programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub name: Name,
    pub steps: Vec<ExampleStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleStep {
    pub kind: ExampleStepKind,
    pub packet: Name,
    #[serde(default)]
    pub arguments: Vec<serde_json::Value>,
    #[serde(default)]
    pub period_ms: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleStepKind {
    Getter,
    Setter,
    Callback,
    CallbackPeriod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_display_name_inserts_category_before_version() {
        let mut device = crate::loader::tests::minimal_device();
        device.display_name = "GPS 2.0".to_string();
        assert_eq!(device.long_display_name(), "GPS Bricklet 2.0");
        device.display_name = "Temperature".to_string();
        assert_eq!(device.long_display_name(), "Temperature Bricklet");
    }

    #[test]
    fn localized_text_falls_back_to_english() {
        let mut text = LocalizedText::default();
        text.0.insert("en".into(), "Hello".into());
        assert_eq!(text.get("de"), "Hello");
        text.0.insert("de".into(), "Hallo".into());
        assert_eq!(text.get("de"), "Hallo");
        assert_eq!(LocalizedText::default().get("en"), "");
    }
}
