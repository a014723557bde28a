//! Descriptor records as written on disk
//!
//! Every field is optional here so the loader can report missing keys by name
//! instead of surfacing a generic deserializer message.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::ir::{DocRole, ExampleStepKind};

#[derive(Debug, Deserialize)]
pub(super) struct RawDevice {
    pub author: Option<String>,
    pub api_version: Option<[u64; 3]>,
    pub category: Option<String>,
    pub device_identifier: Option<u16>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub manufacturer: Option<String>,
    pub description: Option<BTreeMap<String, String>>,
    pub released: Option<bool>,
    pub documented: Option<bool>,
    pub discontinued: Option<bool>,
    pub features: Option<Vec<String>>,
    pub constant_groups: Option<Vec<RawConstantGroup>>,
    pub packets: Option<Vec<RawPacket>>,
    pub examples: Option<Vec<RawExample>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawConstantGroup {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub constants: Option<Vec<(String, RawConstantValue)>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RawConstantValue {
    Int(i64),
    Str(String),
}

#[derive(Debug, Deserialize)]
pub(super) struct RawPacket {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub function_id: Option<u8>,
    pub elements: Option<Vec<RawElement>>,
    pub since_firmware: Option<[u64; 3]>,
    pub doc: Option<(DocRole, BTreeMap<String, String>)>,
    pub high_level: Option<RawHighLevel>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawElementExtra {
    pub constant_group: Option<String>,
}

/// Elements come either as `[name, type, cardinality, direction, {extra}]`
/// or as an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum RawElement {
    WithExtra(String, String, usize, String, RawElementExtra),
    Compact(String, String, usize, String),
    Object {
        name: String,
        #[serde(rename = "type")]
        ty: String,
        #[serde(default = "default_cardinality")]
        cardinality: usize,
        direction: String,
        #[serde(default)]
        constant_group: Option<String>,
    },
}

fn default_cardinality() -> usize {
    1
}

impl RawElement {
    pub fn into_parts(self) -> (String, String, usize, String, Option<String>) {
        match self {
            RawElement::WithExtra(name, ty, cardinality, direction, extra) => {
                (name, ty, cardinality, direction, extra.constant_group)
            }
            RawElement::Compact(name, ty, cardinality, direction) => {
                (name, ty, cardinality, direction, None)
            }
            RawElement::Object {
                name,
                ty,
                cardinality,
                direction,
                constant_group,
            } => (name, ty, cardinality, direction, constant_group),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RawHighLevel {
    pub stream_in: Option<RawStream>,
    pub stream_out: Option<RawStream>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawStream {
    pub name: Option<String>,
    pub fixed_length: Option<usize>,
    pub single_chunk: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawExample {
    pub name: Option<String>,
    pub steps: Option<Vec<RawExampleStep>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawExampleStep {
    pub kind: ExampleStepKind,
    pub packet: String,
    #[serde(default)]
    pub arguments: Vec<serde_json::Value>,
    #[serde(default)]
    pub period_ms: Option<u32>,
}
