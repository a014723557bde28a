//! Code generators for different programming languages
//!
//! Each language has its own module that implements the `Generator` trait.
//! Shared behaviour lives in the helper modules (`naming`, `doc`,
//! `provenance`, `classify`) rather than in a base type.

pub mod c;
pub mod javascript;
pub mod python;
pub mod rust;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use devbind_model::{Device, ElementType, Name, Packet};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::classify::{self, ResponseExpected};
use crate::error::EmitError;
use crate::naming::NameKind;
use crate::provenance::{CommentStyle, Provenance};
use crate::resolver::ResolvedDevice;

/// Marker line the packaging step looks for to keep a device out of releases.
pub const NOT_RELEASED_MARKER: &str = "__DEVICE_IS_NOT_RELEASED__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Rust,
    C,
    #[serde(rename = "javascript")]
    JavaScript,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::Rust,
        Language::C,
        Language::JavaScript,
    ];

    /// Name used in banners, e.g. `Python Bindings Version 2.1.30`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Rust => "Rust",
            Language::C => "C/C++",
            Language::JavaScript => "JavaScript",
        }
    }

    /// Output subdirectory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Rust => "rust",
            Language::C => "c",
            Language::JavaScript => "javascript",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "rust" | "rs" => Ok(Language::Rust),
            "c" => Ok(Language::C),
            "javascript" | "js" => Ok(Language::JavaScript),
            other => Err(format!("unknown language '{}'", other)),
        }
    }
}

/// Configuration options for code generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Whether to generate documentation comments
    pub generate_docs: bool,
    /// Locale doc text is selected in
    pub locale: String,
    /// Version stamped into every banner
    pub bindings_version: Version,
    /// Banner date; today when unset
    pub date: Option<NaiveDate>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            generate_docs: true,
            locale: "en".to_string(),
            bindings_version: Version::new(2, 0, 0),
            date: None,
        }
    }
}

impl GeneratorConfig {
    pub fn context(&self) -> RenderContext {
        RenderContext {
            generate_docs: self.generate_docs,
            locale: self.locale.clone(),
            bindings_version: self.bindings_version.clone(),
            date: self
                .date
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
        }
    }
}

/// Everything an emitter needs besides the device, fixed for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub generate_docs: bool,
    pub locale: String,
    pub bindings_version: Version,
    pub date: NaiveDate,
}

impl RenderContext {
    pub fn provenance(&self, language: Language) -> Provenance {
        Provenance {
            language: language.display_name(),
            version: self.bindings_version.clone(),
            date: self.date,
        }
    }
}

/// A file produced besides the per-device bindings (examples, factories).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path relative to the language's output directory
    pub file_name: String,
    pub contents: String,
}

/// Trait that all language generators must implement
pub trait Generator: Send + Sync {
    fn language(&self) -> Language;

    /// File the device's bindings are written to.
    fn file_name(&self, device: &Device) -> String;

    fn comment_style(&self) -> CommentStyle;

    /// Render a canonical name as an identifier of the given kind.
    fn translate_name(&self, name: &Name, kind: NameKind) -> String;

    /// Target type for an element. Unknown element types are an error.
    fn map_type(&self, ty: ElementType, cardinality: usize) -> Result<String, EmitError>;

    fn classify_response(&self, packet: &Packet) -> ResponseExpected {
        classify::classify_response(packet)
    }

    /// Complete source of the device's bindings.
    fn render_device(
        &self,
        device: &ResolvedDevice,
        ctx: &RenderContext,
    ) -> Result<String, EmitError>;

    fn render_examples(
        &self,
        _device: &ResolvedDevice,
        _ctx: &RenderContext,
    ) -> Result<Vec<Artifact>, EmitError> {
        Ok(Vec::new())
    }

    /// Cross-device artifacts, rendered once from the released devices.
    fn finish(
        &self,
        _released: &[Arc<Device>],
        _ctx: &RenderContext,
    ) -> Result<Vec<Artifact>, EmitError> {
        Ok(Vec::new())
    }

    fn header(&self, ctx: &RenderContext) -> String {
        ctx.provenance(self.language()).header(self.comment_style())
    }

    /// Marker line for unreleased devices, empty otherwise.
    fn released_marker(&self, device: &Device) -> String {
        if device.released {
            return String::new();
        }
        match self.comment_style() {
            CommentStyle::Hash => format!("\n#### {} ####\n", NOT_RELEASED_MARKER),
            CommentStyle::CBlock => format!("\n/* #### {} #### */\n", NOT_RELEASED_MARKER),
        }
    }
}

pub fn generator_for(language: Language) -> Box<dyn Generator> {
    match language {
        Language::Python => Box::new(python::PythonGenerator::new()),
        Language::Rust => Box::new(rust::RustGenerator::new()),
        Language::C => Box::new(c::CGenerator::new()),
        Language::JavaScript => Box::new(javascript::JavaScriptGenerator::new()),
    }
}

pub fn generators_for(languages: &[Language]) -> Vec<Box<dyn Generator>> {
    languages.iter().map(|l| generator_for(*l)).collect()
}

pub fn all_generators() -> Vec<Box<dyn Generator>> {
    generators_for(&Language::ALL)
}

/// Zero value used to pad chunks, per language literal syntax.
pub(crate) fn pad_kind(ty: ElementType) -> PadValue {
    match ty {
        ElementType::Bool => PadValue::False,
        ElementType::Char | ElementType::String => PadValue::Nul,
        ElementType::Float => PadValue::FloatZero,
        _ => PadValue::Zero,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PadValue {
    Zero,
    FloatZero,
    False,
    Nul,
}

/// Struct-format token shared by the Python and JavaScript runtimes:
/// `I`, `60B`, `c`, `20s`, `8!`.
pub(crate) fn struct_format(
    language: &'static str,
    ty: ElementType,
    cardinality: usize,
) -> Result<String, EmitError> {
    let token = match ty {
        ElementType::Int8 => "b",
        ElementType::UInt8 => "B",
        ElementType::Int16 => "h",
        ElementType::UInt16 => "H",
        ElementType::Int32 => "i",
        ElementType::UInt32 => "I",
        ElementType::Int64 => "q",
        ElementType::UInt64 => "Q",
        ElementType::Float => "f",
        ElementType::Bool => "!",
        ElementType::Char => "c",
        ElementType::String => "s",
        other => {
            return Err(EmitError::UnsupportedType {
                language,
                ty: other.to_string(),
            })
        }
    };

    if cardinality > 1 || ty == ElementType::String {
        Ok(format!("{}{}", cardinality, token))
    } else {
        Ok(token.to_string())
    }
}

/// Struct formats of `packet`'s elements in one direction, space separated.
pub(crate) fn format_list(
    language: &'static str,
    packet: &Packet,
    direction: devbind_model::Direction,
) -> Result<String, EmitError> {
    let formats = packet
        .elements(direction)
        .map(|e| struct_format(language, e.ty, e.cardinality))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(formats.join(" "))
}

/// Request or response size on the wire, including the 8 byte header.
pub(crate) fn packet_size(packet: &Packet, direction: devbind_model::Direction) -> usize {
    8 + packet.elements(direction).map(|e| e.wire_size()).sum::<usize>()
}

/// `'text'` with backslashes and single quotes escaped.
pub(crate) fn quote_single(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// `"text"` with backslashes and double quotes escaped.
pub(crate) fn quote_double(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Drop trailing whitespace from every line.
pub(crate) fn strip_trailing_whitespace(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    for line in code.lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// `Coordinates` for `Get Coordinates`: getters name their aggregate after
/// what they return.
pub(crate) fn aggregate_name(name: &Name) -> Name {
    match name.words().next() {
        Some("Get") if name.words().count() > 1 => Name::new(
            name.words().skip(1).collect::<Vec<_>>().join(" "),
        ),
        _ => name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_language_names() {
        assert_eq!("js".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("Python".parse::<Language>().unwrap(), Language::Python);
        assert!("cobol".parse::<Language>().is_err());
        assert_eq!(Language::C.display_name(), "C/C++");
    }

    #[test]
    fn struct_formats_carry_width_and_count() {
        assert_eq!(struct_format("Python", ElementType::UInt32, 1).unwrap(), "I");
        assert_eq!(struct_format("Python", ElementType::Int16, 30).unwrap(), "30h");
        assert_eq!(struct_format("Python", ElementType::String, 1).unwrap(), "1s");
        assert_eq!(struct_format("Python", ElementType::Bool, 8).unwrap(), "8!");
    }

    #[test]
    fn quotes_and_aggregates() {
        assert_eq!(quote_single("it's"), "'it\\'s'");
        assert_eq!(quote_double("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(aggregate_name(&Name::new("Get Coordinates")).space(), "Coordinates");
        assert_eq!(aggregate_name(&Name::new("Get")).space(), "Get");
        assert_eq!(aggregate_name(&Name::new("Read Low Level")).space(), "Read Low Level");
    }

    #[test]
    fn every_generator_has_a_distinct_language() {
        let languages: Vec<Language> = all_generators().iter().map(|g| g.language()).collect();
        assert_eq!(languages, Language::ALL.to_vec());
    }
}
