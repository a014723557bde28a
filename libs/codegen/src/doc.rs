//! Documentation text for generated code
//!
//! Descriptor docs are reStructuredText-ish prose with `:func:` and `:cb:`
//! references to other packets by canonical name. Emitters supply a closure
//! that renders a reference in the target language.

use devbind_model::{Constant, ConstantGroup, Device, Name, Packet};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use semver::Version;

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":(func|cb):`([^`]+)`").expect("reference regex must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Function,
    Callback,
}

/// A `:func:`/`:cb:` reference found in doc text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub name: Name,
}

/// Replace every reference in `text` with what `render` returns for it.
pub fn rewrite_references(text: &str, render: impl Fn(&Reference) -> String) -> String {
    REFERENCE
        .replace_all(text, |caps: &Captures<'_>| {
            let kind = if &caps[1] == "func" {
                ReferenceKind::Function
            } else {
                ReferenceKind::Callback
            };
            render(&Reference {
                kind,
                name: Name::new(&caps[2]),
            })
        })
        .into_owned()
}

/// `.. versionadded::` note for packets newer than the first firmware.
pub fn since_firmware_note(packet: &Packet) -> Option<String> {
    (packet.since_firmware > Version::new(1, 0, 0)).then(|| {
        format!(
            ".. versionadded:: {} (Firmware)",
            packet.since_firmware
        )
    })
}

/// List of the constants usable with `packet`'s elements, one group per
/// referenced constant group, in element order.
pub fn constants_note(
    device: &Device,
    packet: &Packet,
    render: impl Fn(&ConstantGroup, &Constant) -> String,
) -> Option<String> {
    let mut groups: Vec<&ConstantGroup> = Vec::new();
    for element in &packet.elements {
        let Some(group) = element
            .constant_group
            .as_ref()
            .and_then(|name| device.constant_group(name))
        else {
            continue;
        };
        if !groups.iter().any(|g| g.name == group.name) {
            groups.push(group);
        }
    }

    if groups.is_empty() {
        return None;
    }

    let subject = if packet.is_callback() { "callback" } else { "function" };
    let mut note = format!("The following constants are available for this {}:\n", subject);
    for group in groups {
        note.push_str(&format!("\nFor {}:\n\n", group.name));
        for constant in &group.constants {
            note.push_str(&format!("* {} = {}\n", render(group, constant), constant.value));
        }
    }

    Some(note.trim_end().to_string())
}

/// Full doc text of a packet: localized prose with rewritten references,
/// then the constants and since-firmware notes.
pub fn packet_doc(
    device: &Device,
    packet: &Packet,
    locale: &str,
    reference: impl Fn(&Reference) -> String,
    constant: impl Fn(&ConstantGroup, &Constant) -> String,
) -> String {
    let mut text = rewrite_references(packet.doc.text.get(locale).trim(), reference);

    for note in [
        constants_note(device, packet, constant),
        since_firmware_note(packet),
    ]
    .into_iter()
    .flatten()
    {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&note);
    }

    text
}

/// Prefix every line, trimming the trailing space on blank lines.
pub fn prefix_lines(text: &str, prefix: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        if line.is_empty() {
            out.push_str(prefix.trim_end());
        } else {
            out.push_str(prefix);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}
