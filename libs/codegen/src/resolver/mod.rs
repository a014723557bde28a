//! High-level feature resolver
//!
//! Maps each packet's high-level descriptor onto its elements and derives the
//! view the emitters render convenience methods from. The IR itself is left
//! untouched: the low-level packet keeps its wire contract and callable.
//!
//! Element roles are found by name. For a stream called `Message`:
//!
//! * `Message Length`: total length on the wire (absent with a fixed length)
//! * `Message Chunk Offset`: offset of this chunk (absent for single chunks)
//! * `Message Chunk Data`: the chunk payload, its cardinality is the chunk size
//!   (`Message Data` is accepted for single-chunk streams)

mod stream;

pub use stream::{Chunk, StreamInPlan, StreamInResults, StreamOutAssembler};

use std::collections::BTreeMap;
use std::sync::Arc;

use devbind_model::{
    Device, Direction, Element, ElementType, HighLevelSpec, Name, Packet, PacketKind,
};

use crate::error::ResolveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    Length,
    ChunkOffset,
    ChunkData,
}

impl StreamRole {
    /// Role tag understood by the runtimes' callback reassembly.
    pub fn tag(&self) -> &'static str {
        match self {
            StreamRole::Length => "stream_length",
            StreamRole::ChunkOffset => "stream_chunk_offset",
            StreamRole::ChunkData => "stream_chunk_data",
        }
    }
}

/// Where the total stream length comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthSource {
    Fixed(usize),
    /// Carried by the element at `element`, at most `max`.
    Wire { element: usize, max: usize },
}

/// One entry of a high-level signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'p> {
    /// The reassembled (or to be split) stream
    Stream,
    /// An element passed through unchanged
    Element(&'p Element),
}

/// Derived high-level view of one streamed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighLevelView {
    /// Name of the high-level callable (`Get Satellite System Status`)
    pub name: Name,
    /// Stream name (`Satellite Numbers`)
    pub stream: Name,
    pub direction: StreamDirection,
    /// Element indexes into `Packet::elements`
    pub chunk_data: usize,
    pub chunk_offset: Option<usize>,
    pub length: LengthSource,
    pub chunk_cardinality: usize,
    pub single_chunk: bool,
    /// High-level callbacks use the negated low-level ID.
    pub callback_id: Option<i16>,
}

impl HighLevelView {
    /// Whether the element at `index` is managed by the stream logic.
    pub fn is_stream_element(&self, index: usize) -> bool {
        index == self.chunk_data
            || Some(index) == self.chunk_offset
            || matches!(self.length, LengthSource::Wire { element, .. } if element == index)
    }

    /// Elements the caller still sees on the high-level signature, in order,
    /// for the given direction.
    pub fn passthrough<'p>(
        &'p self,
        packet: &'p Packet,
        direction: Direction,
    ) -> impl Iterator<Item = &'p Element> + 'p {
        packet
            .elements
            .iter()
            .enumerate()
            .filter(move |(i, e)| e.direction == direction && !self.is_stream_element(*i))
            .map(|(_, e)| e)
    }

    /// Caller-visible signature in one direction, in element order: the
    /// stream takes the place of its chunk data, length and offset vanish.
    pub fn fields<'p>(&self, packet: &'p Packet, direction: Direction) -> Vec<Field<'p>> {
        packet
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.direction == direction)
            .filter_map(|(i, e)| {
                if i == self.chunk_data {
                    Some(Field::Stream)
                } else if self.is_stream_element(i) {
                    None
                } else {
                    Some(Field::Element(e))
                }
            })
            .collect()
    }

    /// Role of the element at `index`, if it belongs to the stream.
    pub fn role(&self, index: usize) -> Option<StreamRole> {
        if index == self.chunk_data {
            Some(StreamRole::ChunkData)
        } else if Some(index) == self.chunk_offset {
            Some(StreamRole::ChunkOffset)
        } else if matches!(self.length, LengthSource::Wire { element, .. } if element == index) {
            Some(StreamRole::Length)
        } else {
            None
        }
    }

    pub fn chunk_data_element<'p>(&self, packet: &'p Packet) -> &'p Element {
        &packet.elements[self.chunk_data]
    }

    pub fn length_element<'p>(&self, packet: &'p Packet) -> Option<&'p Element> {
        match self.length {
            LengthSource::Wire { element, .. } => Some(&packet.elements[element]),
            LengthSource::Fixed(_) => None,
        }
    }

    pub fn chunk_offset_element<'p>(&self, packet: &'p Packet) -> Option<&'p Element> {
        self.chunk_offset.map(|i| &packet.elements[i])
    }

    /// Largest stream the client may send or accept.
    pub fn max_length(&self) -> usize {
        match self.length {
            LengthSource::Fixed(n) => n,
            LengthSource::Wire { max, .. } if self.single_chunk => max.min(self.chunk_cardinality),
            LengthSource::Wire { max, .. } => max,
        }
    }

    pub fn fixed_length(&self) -> Option<usize> {
        match self.length {
            LengthSource::Fixed(n) => Some(n),
            LengthSource::Wire { .. } => None,
        }
    }

    pub fn in_plan(&self) -> StreamInPlan {
        StreamInPlan::new(self.chunk_cardinality, self.max_length(), self.single_chunk)
    }

    pub fn out_assembler<T: Clone>(&self) -> StreamOutAssembler<T> {
        StreamOutAssembler::new(self.chunk_cardinality, self.fixed_length(), self.single_chunk)
    }
}

/// A device together with the high-level views of its packets.
#[derive(Debug, Clone)]
pub struct ResolvedDevice {
    pub device: Arc<Device>,
    /// Views keyed by low-level function ID
    views: BTreeMap<u8, HighLevelView>,
    /// Packets whose high-level descriptor could not be resolved
    pub errors: Vec<ResolveError>,
}

impl ResolvedDevice {
    pub fn high_level(&self, packet: &Packet) -> Option<&HighLevelView> {
        self.views.get(&packet.function_id)
    }

    pub fn views(&self) -> impl Iterator<Item = (&Packet, &HighLevelView)> {
        self.device
            .packets
            .iter()
            .filter_map(|p| self.views.get(&p.function_id).map(|v| (p, v)))
    }

    pub fn stream_in_functions(&self) -> impl Iterator<Item = (&Packet, &HighLevelView)> {
        self.views()
            .filter(|(_, v)| v.direction == StreamDirection::In)
    }

    pub fn stream_out_functions(&self) -> impl Iterator<Item = (&Packet, &HighLevelView)> {
        self.views()
            .filter(|(p, v)| v.direction == StreamDirection::Out && !p.is_callback())
    }

    pub fn stream_out_callbacks(&self) -> impl Iterator<Item = (&Packet, &HighLevelView)> {
        self.views().filter(|(p, _)| p.is_callback())
    }
}

/// Resolve every high-level packet of `device`.
///
/// Never fails as a whole: packets with broken descriptors are recorded in
/// [`ResolvedDevice::errors`] and simply get no high-level view.
pub fn resolve_device(device: Arc<Device>) -> ResolvedDevice {
    let mut views = BTreeMap::new();
    let mut errors = Vec::new();

    for packet in &device.packets {
        let Some(spec) = &packet.high_level else {
            continue;
        };

        match resolve_packet(packet, spec) {
            Ok(view) => {
                views.insert(packet.function_id, view);
            }
            Err(error) => {
                tracing::warn!(
                    device = %device.name,
                    packet = %packet.name,
                    error = %error,
                    "Skipping high-level view"
                );
                errors.push(error);
            }
        }
    }

    ResolvedDevice {
        device,
        views,
        errors,
    }
}

/// Element types every emitter can split into and join from chunks.
fn is_chunk_type(ty: ElementType) -> bool {
    ty.is_integer() || matches!(ty, ElementType::Float | ElementType::Bool | ElementType::Char)
}

/// Resolve a single packet against its high-level descriptor.
pub fn resolve_packet(
    packet: &Packet,
    spec: &HighLevelSpec,
) -> Result<HighLevelView, ResolveError> {
    let (direction, wire_direction) = match spec {
        HighLevelSpec::StreamIn { .. } => {
            if packet.kind == PacketKind::Callback {
                return Err(ResolveError::StreamInCallback {
                    packet: packet.name.to_string(),
                });
            }
            (StreamDirection::In, Direction::In)
        }
        HighLevelSpec::StreamOut { .. } => (StreamDirection::Out, Direction::Out),
    };

    let stream = spec.stream_name().clone();
    let expected = match wire_direction {
        Direction::In => "input",
        Direction::Out => "output",
    };

    let find = |suffix: &str| -> Result<Option<usize>, ResolveError> {
        let name = stream.join(suffix);
        match packet.element(&name) {
            None => Ok(None),
            Some((_, e)) if e.direction != wire_direction => Err(ResolveError::WrongDirection {
                packet: packet.name.to_string(),
                element: name.to_string(),
                expected,
            }),
            Some((i, _)) => Ok(Some(i)),
        }
    };

    // Single-chunk streams may name their payload `<Stream> Data`.
    let chunk_data = match find("Chunk Data")? {
        Some(index) => Some(index),
        None if spec.single_chunk() => find("Data")?,
        None => None,
    }
    .ok_or_else(|| ResolveError::MissingChunkData {
        packet: packet.name.to_string(),
        stream: stream.to_string(),
        element: stream.join("Chunk Data").to_string(),
    })?;
    let chunk_element = &packet.elements[chunk_data];
    if !is_chunk_type(chunk_element.ty) {
        return Err(ResolveError::UnsupportedChunkType {
            packet: packet.name.to_string(),
            element: chunk_element.name.to_string(),
            ty: chunk_element.ty.to_string(),
        });
    }
    let chunk_cardinality = chunk_element.cardinality;

    let scalar_integer = |index: usize| -> Result<usize, ResolveError> {
        let element = &packet.elements[index];
        match element.ty.integer_range() {
            Some((_, max)) if element.cardinality == 1 => {
                Ok(usize::try_from(max).unwrap_or(usize::MAX))
            }
            _ => Err(ResolveError::NotAnInteger {
                packet: packet.name.to_string(),
                element: element.name.to_string(),
            }),
        }
    };

    let length = match (find("Length")?, spec.fixed_length()) {
        (_, Some(fixed)) => LengthSource::Fixed(fixed),
        (Some(element), None) => LengthSource::Wire {
            element,
            max: scalar_integer(element)?,
        },
        (None, None) => {
            return Err(ResolveError::MissingLength {
                packet: packet.name.to_string(),
                stream: stream.to_string(),
                element: stream.join("Length").to_string(),
            })
        }
    };

    let chunk_offset = match find("Chunk Offset")? {
        Some(element) => {
            let max = scalar_integer(element)?;
            if let LengthSource::Fixed(fixed) = length {
                if fixed > max.saturating_add(chunk_cardinality) {
                    return Err(ResolveError::FixedLengthTooLarge {
                        packet: packet.name.to_string(),
                        fixed_length: fixed,
                        max,
                    });
                }
            }
            Some(element)
        }
        None if spec.single_chunk() => None,
        None => {
            return Err(ResolveError::MissingChunkOffset {
                packet: packet.name.to_string(),
                stream: stream.to_string(),
                element: stream.join("Chunk Offset").to_string(),
            })
        }
    };

    let callback_id = (packet.kind == PacketKind::Callback).then(|| -(packet.function_id as i16));

    Ok(HighLevelView {
        name: packet.high_level_name(),
        stream,
        direction,
        chunk_data,
        chunk_offset,
        length,
        chunk_cardinality,
        single_chunk: spec.single_chunk(),
        callback_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gps_v2, serial_link};
    use devbind_model::{Doc, DocRole, ElementType, LocalizedText};
    use semver::Version;

    fn element(name: &str, ty: ElementType, cardinality: usize, direction: Direction) -> Element {
        Element {
            name: Name::new(name),
            ty,
            cardinality,
            direction,
            constant_group: None,
        }
    }

    fn packet(kind: PacketKind, elements: Vec<Element>) -> Packet {
        Packet {
            kind,
            name: Name::new("Write Low Level"),
            function_id: 7,
            elements,
            since_firmware: Version::new(1, 0, 0),
            doc: Doc {
                role: DocRole::Llf,
                text: LocalizedText::default(),
            },
            high_level: None,
        }
    }

    fn stream_in(fixed_length: Option<usize>, single_chunk: bool) -> HighLevelSpec {
        HighLevelSpec::StreamIn {
            name: Name::new("Data"),
            fixed_length,
            single_chunk,
        }
    }

    fn view<'d>(resolved: &'d ResolvedDevice, name: &str) -> (&'d Packet, &'d HighLevelView) {
        resolved
            .views()
            .find(|(_, v)| v.name.space() == name)
            .unwrap_or_else(|| panic!("no view '{}'", name))
    }

    #[test]
    fn resolves_every_stream_shape() {
        let resolved = resolve_device(serial_link());
        assert!(resolved.errors.is_empty());
        assert_eq!(resolved.views().count(), 6);
        assert_eq!(resolved.stream_in_functions().count(), 2);
        assert_eq!(resolved.stream_out_functions().count(), 3);
        assert_eq!(resolved.stream_out_callbacks().count(), 1);

        let (packet, write) = view(&resolved, "Write");
        assert_eq!(write.direction, StreamDirection::In);
        assert_eq!(write.chunk_cardinality, 60);
        assert_eq!(write.max_length(), 65535);
        assert_eq!(write.role(0), Some(StreamRole::Length));
        assert_eq!(write.role(1), Some(StreamRole::ChunkOffset));
        assert_eq!(write.role(2), Some(StreamRole::ChunkData));
        assert_eq!(write.fields(packet, Direction::In), vec![Field::Stream]);

        let (_, pattern) = view(&resolved, "Set Pattern");
        assert_eq!(pattern.fixed_length(), Some(100));
        assert_eq!(pattern.in_plan().chunk_count(100), 4);

        let (_, receive) = view(&resolved, "Receive");
        assert_eq!(receive.callback_id, Some(-13));
    }

    #[test]
    fn single_chunk_streams_keep_passthrough_fields() {
        let resolved = resolve_device(gps_v2());
        let (packet, status) = view(&resolved, "Get Satellite System Status");
        assert!(status.single_chunk);
        assert_eq!(status.chunk_offset, None);
        assert_eq!(status.max_length(), 12);

        let names: Vec<&str> = status
            .passthrough(packet, Direction::Out)
            .map(|e| e.name.space())
            .collect();
        assert_eq!(names, vec!["Fix", "PDOP", "HDOP", "VDOP"]);
        assert_eq!(status.fields(packet, Direction::Out)[0], Field::Stream);
        assert_eq!(status.fields(packet, Direction::In).len(), 1);
    }

    #[test]
    fn missing_chunk_data_is_reported() {
        let p = packet(
            PacketKind::Function,
            vec![element("Data Length", ElementType::UInt16, 1, Direction::In)],
        );
        assert!(matches!(
            resolve_packet(&p, &stream_in(None, false)),
            Err(ResolveError::MissingChunkData { element, .. }) if element == "Data Chunk Data"
        ));
    }

    #[test]
    fn roles_must_have_the_stream_direction() {
        let p = packet(
            PacketKind::Function,
            vec![
                element("Data Length", ElementType::UInt16, 1, Direction::Out),
                element("Data Chunk Offset", ElementType::UInt16, 1, Direction::In),
                element("Data Chunk Data", ElementType::UInt8, 60, Direction::In),
            ],
        );
        assert!(matches!(
            resolve_packet(&p, &stream_in(None, false)),
            Err(ResolveError::WrongDirection { expected: "input", .. })
        ));
    }

    #[test]
    fn length_and_offset_requirements() {
        let data = element("Data Chunk Data", ElementType::UInt8, 60, Direction::In);
        let offset = element("Data Chunk Offset", ElementType::UInt16, 1, Direction::In);

        let p = packet(PacketKind::Function, vec![offset.clone(), data.clone()]);
        assert!(matches!(
            resolve_packet(&p, &stream_in(None, false)),
            Err(ResolveError::MissingLength { .. })
        ));
        assert!(resolve_packet(&p, &stream_in(Some(100), false)).is_ok());

        let p = packet(
            PacketKind::Function,
            vec![
                element("Data Length", ElementType::Float, 1, Direction::In),
                offset.clone(),
                data.clone(),
            ],
        );
        assert!(matches!(
            resolve_packet(&p, &stream_in(None, false)),
            Err(ResolveError::NotAnInteger { .. })
        ));

        let p = packet(PacketKind::Function, vec![data.clone()]);
        assert!(matches!(
            resolve_packet(&p, &stream_in(Some(10), false)),
            Err(ResolveError::MissingChunkOffset { .. })
        ));
        assert!(resolve_packet(&p, &stream_in(Some(10), true)).is_ok());

        let narrow = element("Data Chunk Offset", ElementType::UInt8, 1, Direction::In);
        let p = packet(PacketKind::Function, vec![narrow, data]);
        assert!(matches!(
            resolve_packet(&p, &stream_in(Some(1000), false)),
            Err(ResolveError::FixedLengthTooLarge { fixed_length: 1000, max: 255, .. })
        ));
    }

    #[test]
    fn chunk_data_must_have_a_chunkable_type() {
        let p = packet(
            PacketKind::Function,
            vec![element("Data Chunk Data", ElementType::String, 60, Direction::In)],
        );
        assert!(matches!(
            resolve_packet(&p, &stream_in(Some(60), true)),
            Err(ResolveError::UnsupportedChunkType { ty, .. }) if ty == "string"
        ));

        for ty in [ElementType::Char, ElementType::Bool, ElementType::Float, ElementType::Int64] {
            let p = packet(
                PacketKind::Function,
                vec![element("Data Chunk Data", ty, 60, Direction::In)],
            );
            assert!(resolve_packet(&p, &stream_in(Some(60), true)).is_ok(), "{}", ty);
        }
    }

    #[test]
    fn callbacks_cannot_stream_in() {
        let p = packet(
            PacketKind::Callback,
            vec![element("Data Chunk Data", ElementType::UInt8, 60, Direction::Out)],
        );
        assert!(matches!(
            resolve_packet(&p, &stream_in(Some(60), true)),
            Err(ResolveError::StreamInCallback { .. })
        ));
    }

    #[test]
    fn broken_views_do_not_fail_the_device() {
        let mut device = (*serial_link()).clone();
        device.packets[0].elements.retain(|e| e.name.space() != "Message Chunk Data");
        let resolved = resolve_device(Arc::new(device));
        assert_eq!(resolved.errors.len(), 1);
        assert_eq!(resolved.views().count(), 5);
    }
}
