//! Response expectation of packets
//!
//! Decides per packet whether the generated client waits for a response,
//! and whether the user may change that at runtime.

use devbind_model::{DocRole, Packet, PacketKind};

/// Per-packet response flag as emitted into every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseExpected {
    /// Callbacks: the device never answers.
    AlwaysFalse,
    /// Functions with outputs: the response carries the result.
    AlwaysTrue,
    /// Optional, enabled by default.
    True,
    /// Optional, disabled by default.
    False,
}

/// Coarse classification of [`ResponseExpected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseClass {
    NoResponse,
    Optional,
    Always,
}

impl ResponseExpected {
    pub fn class(&self) -> ResponseClass {
        match self {
            ResponseExpected::AlwaysFalse => ResponseClass::NoResponse,
            ResponseExpected::AlwaysTrue => ResponseClass::Always,
            ResponseExpected::True | ResponseExpected::False => ResponseClass::Optional,
        }
    }

    /// Constant suffix shared by all runtimes, e.g. `ALWAYS_TRUE`.
    pub fn upper_name(&self) -> &'static str {
        match self {
            ResponseExpected::AlwaysFalse => "ALWAYS_FALSE",
            ResponseExpected::AlwaysTrue => "ALWAYS_TRUE",
            ResponseExpected::True => "TRUE",
            ResponseExpected::False => "FALSE",
        }
    }

    pub fn camel_name(&self) -> &'static str {
        match self {
            ResponseExpected::AlwaysFalse => "AlwaysFalse",
            ResponseExpected::AlwaysTrue => "AlwaysTrue",
            ResponseExpected::True => "True",
            ResponseExpected::False => "False",
        }
    }
}

pub fn classify_response(packet: &Packet) -> ResponseExpected {
    if packet.kind == PacketKind::Callback {
        ResponseExpected::AlwaysFalse
    } else if packet.output_count() > 0 {
        ResponseExpected::AlwaysTrue
    } else if matches!(packet.doc.role, DocRole::Ccf | DocRole::Llf) {
        ResponseExpected::True
    } else {
        ResponseExpected::False
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devbind_model::{Direction, Doc, Element, ElementType, LocalizedText, Name};
    use semver::Version;

    fn packet(kind: PacketKind, role: DocRole, outputs: usize) -> Packet {
        Packet {
            kind,
            name: Name::new("Test"),
            function_id: 1,
            elements: (0..outputs)
                .map(|i| Element {
                    name: Name::new(format!("Out {}", i)),
                    ty: ElementType::UInt8,
                    cardinality: 1,
                    direction: Direction::Out,
                    constant_group: None,
                })
                .collect(),
            since_firmware: Version::new(1, 0, 0),
            doc: Doc {
                role,
                text: LocalizedText::default(),
            },
            high_level: None,
        }
    }

    #[test]
    fn callbacks_never_expect_a_response() {
        let p = packet(PacketKind::Callback, DocRole::C, 2);
        assert_eq!(classify_response(&p), ResponseExpected::AlwaysFalse);
        assert_eq!(classify_response(&p).class(), ResponseClass::NoResponse);
    }

    #[test]
    fn outputs_always_expect_a_response() {
        let p = packet(PacketKind::Function, DocRole::Ccf, 1);
        assert_eq!(classify_response(&p), ResponseExpected::AlwaysTrue);
    }

    #[test]
    fn configuration_and_low_level_setters_default_to_true() {
        for role in [DocRole::Ccf, DocRole::Llf] {
            let p = packet(PacketKind::Function, role, 0);
            assert_eq!(classify_response(&p), ResponseExpected::True);
        }
        for role in [DocRole::Bf, DocRole::Af, DocRole::If] {
            let p = packet(PacketKind::Function, role, 0);
            assert_eq!(classify_response(&p), ResponseExpected::False);
            assert_eq!(classify_response(&p).class(), ResponseClass::Optional);
        }
    }
}
