//! C/C++ bindings generator
//!
//! Emits one header per device. Declarations come first; the definitions
//! follow in a section guarded by `<GUARD>_IMPLEMENTATION` so exactly one
//! translation unit compiles them. All calls return an `E_*` error code and
//! hand results back through `ret_` pointers.

use devbind_model::{ConstantValue, Device, Direction, Element, ElementType, Name, Packet};

use super::{
    aggregate_name, pad_kind, quote_double, strip_trailing_whitespace, Generator, Language,
    PadValue, RenderContext,
};
use crate::doc::{self, Reference, ReferenceKind};
use crate::error::EmitError;
use crate::naming::{self, Escape, NameKind, C_KEYWORDS};
use crate::provenance::CommentStyle;
use crate::resolver::{Field, HighLevelView, ResolvedDevice, StreamRole};

const LANGUAGE: &str = "C/C++";

const PACKING: &str = "#if defined _MSC_VER || defined __BORLANDC__
	#pragma pack(push)
	#pragma pack(1)
	#define ATTRIBUTE_PACKED
#elif defined __GNUC__
	#ifdef _WIN32
		// workaround struct packing bug in GCC 4.7 on Windows
		// https://gcc.gnu.org/bugzilla/show_bug.cgi?id=52991
		#define ATTRIBUTE_PACKED __attribute__((gcc_struct, packed))
	#else
		#define ATTRIBUTE_PACKED __attribute__((packed))
	#endif
#else
	#error unknown compiler, do not know how to enable struct packing
#endif
";

const UNPACKING: &str = "#if defined _MSC_VER || defined __BORLANDC__
	#pragma pack(pop)
#endif
#undef ATTRIBUTE_PACKED
";

/// Generator for C/C++ device headers
pub struct CGenerator;

impl CGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for CGenerator {
    fn language(&self) -> Language {
        Language::C
    }

    fn file_name(&self, device: &Device) -> String {
        format!(
            "{}.h",
            self.translate_name(&device.full_name(), NameKind::Module)
        )
    }

    fn comment_style(&self) -> CommentStyle {
        CommentStyle::CBlock
    }

    fn translate_name(&self, name: &Name, kind: NameKind) -> String {
        match kind {
            NameKind::Type => name.camel(),
            NameKind::Function | NameKind::Module => name.snake(),
            NameKind::Parameter | NameKind::Field => naming::escape(
                naming::guard_leading_digit(name.snake()),
                C_KEYWORDS,
                Escape::TrailingUnderscore,
            ),
            NameKind::Constant => naming::guard_leading_digit(name.upper()),
        }
    }

    fn map_type(&self, ty: ElementType, cardinality: usize) -> Result<String, EmitError> {
        let base = base_type(ty)?;
        if cardinality > 1 && ty != ElementType::String {
            Ok(format!("{}[{}]", base, cardinality))
        } else if ty == ElementType::String {
            Ok(format!("char[{}]", cardinality + 1))
        } else {
            Ok(base.to_string())
        }
    }

    fn render_device(
        &self,
        resolved: &ResolvedDevice,
        ctx: &RenderContext,
    ) -> Result<String, EmitError> {
        let writer = HeaderWriter::new(self, resolved, ctx);
        let mut code = String::new();

        code.push_str(&self.header(ctx));
        code.push_str(&self.released_marker(&resolved.device));
        code.push_str(&format!(
            "\n#ifndef {g}_H\n#define {g}_H\n\n#include \"ip_connection.h\"\n\n#ifdef __cplusplus\nextern \"C\" {{\n#endif\n\n",
            g = writer.guard
        ));
        code.push_str(&writer.declarations()?);
        code.push_str(&format!("#ifdef {}_IMPLEMENTATION\n\n", writer.guard));
        code.push_str("#include <stdlib.h>\n#include <string.h>\n\n");
        code.push_str(&writer.definitions()?);
        code.push_str(&format!("#endif // {}_IMPLEMENTATION\n\n", writer.guard));
        code.push_str("#ifdef __cplusplus\n}\n#endif\n\n#endif\n");

        Ok(strip_trailing_whitespace(&code))
    }
}

fn base_type(ty: ElementType) -> Result<&'static str, EmitError> {
    Ok(match ty {
        ElementType::Int8 => "int8_t",
        ElementType::UInt8 => "uint8_t",
        ElementType::Int16 => "int16_t",
        ElementType::UInt16 => "uint16_t",
        ElementType::Int32 => "int32_t",
        ElementType::UInt32 => "uint32_t",
        ElementType::Int64 => "int64_t",
        ElementType::UInt64 => "uint64_t",
        ElementType::Float => "float",
        ElementType::Bool => "bool",
        ElementType::Char | ElementType::String => "char",
        other => {
            return Err(EmitError::UnsupportedType {
                language: LANGUAGE,
                ty: other.to_string(),
            })
        }
    })
}

/// `leconvert_<suffix>_to/_from` for types wider than a byte.
fn leconvert(ty: ElementType) -> Option<&'static str> {
    match ty {
        ElementType::Int16 => Some("int16"),
        ElementType::UInt16 => Some("uint16"),
        ElementType::Int32 => Some("int32"),
        ElementType::UInt32 => Some("uint32"),
        ElementType::Int64 => Some("int64"),
        ElementType::UInt64 => Some("uint64"),
        ElementType::Float => Some("float"),
        _ => None,
    }
}

/// Whether converting the element needs an index loop.
fn needs_loop(element: &Element) -> bool {
    element.is_array() && (element.ty == ElementType::Bool || leconvert(element.ty).is_some())
}

/// Field of a packed request, response or callback struct.
fn packed_decl(element: &Element, name: &str) -> Result<String, EmitError> {
    Ok(match element.ty {
        ElementType::Bool if element.is_array() => {
            format!("uint8_t {}[{}]", name, element.wire_size())
        }
        ElementType::Bool => format!("uint8_t {}", name),
        ElementType::String => format!("char {}[{}]", name, element.cardinality),
        ty if element.is_array() => format!("{} {}[{}]", base_type(ty)?, name, element.cardinality),
        ty => format!("{} {}", base_type(ty)?, name),
    })
}

/// Declaration of a value holding an unpacked element: aggregate fields
/// and locals.
fn value_decl(element: &Element, name: &str) -> Result<String, EmitError> {
    Ok(match element.ty {
        ElementType::String => format!("char {}[{}]", name, element.cardinality + 1),
        ty if element.is_array() => format!("{} {}[{}]", base_type(ty)?, name, element.cardinality),
        ty => format!("{} {}", base_type(ty)?, name),
    })
}

fn param_decl(element: &Element, name: &str) -> Result<String, EmitError> {
    Ok(match element.ty {
        ElementType::String => format!("const char *{}", name),
        ty if element.is_array() => {
            format!("const {} {}[{}]", base_type(ty)?, name, element.cardinality)
        }
        ty => format!("{} {}", base_type(ty)?, name),
    })
}

fn ret_param_decl(element: &Element, name: &str) -> Result<String, EmitError> {
    Ok(match element.ty {
        ElementType::String => format!("char ret_{}[{}]", name, element.cardinality + 1),
        ty if element.is_array() => {
            format!("{} ret_{}[{}]", base_type(ty)?, name, element.cardinality)
        }
        ty => format!("{} *ret_{}", base_type(ty)?, name),
    })
}

/// Parameter of a callback function, after unpacking.
fn callback_param_decl(element: &Element, name: &str) -> Result<String, EmitError> {
    Ok(match element.ty {
        ElementType::String => format!("char *{}", name),
        ty if element.is_array() => format!("{} *{}", base_type(ty)?, name),
        ty => format!("{} {}", base_type(ty)?, name),
    })
}

/// Where an unpacked value goes: the scalar lvalue and the array base.
struct Target {
    scalar: String,
    array: String,
}

impl Target {
    fn pointer(name: &str) -> Self {
        Self {
            scalar: format!("*ret_{}", name),
            array: format!("ret_{}", name),
        }
    }

    fn field(base: &str, name: &str) -> Self {
        Self {
            scalar: format!("{}->{}", base, name),
            array: format!("{}->{}", base, name),
        }
    }

    fn local(name: &str) -> Self {
        Self {
            scalar: name.to_string(),
            array: name.to_string(),
        }
    }
}

/// Statements writing parameter `src` into the packed field `dst`.
fn pack(element: &Element, dst: &str, src: &str, indent: &str) -> String {
    let n = element.cardinality;
    match element.ty {
        ElementType::String => format!("{i}strncpy({d}, {s}, {n});\n", i = indent, d = dst, s = src, n = n),
        ElementType::Bool if element.is_array() => format!(
            "{i}memset({d}, 0, {b});\n{i}for (i = 0; i < {n}; i++) {d}[i / 8] |= ({s}[i] ? 1 : 0) << (i % 8);\n",
            i = indent,
            d = dst,
            s = src,
            n = n,
            b = element.wire_size()
        ),
        ElementType::Bool => format!("{}{} = {} ? 1 : 0;\n", indent, dst, src),
        ty => match (leconvert(ty), element.is_array()) {
            (Some(conv), true) => format!(
                "{i}for (i = 0; i < {n}; i++) {d}[i] = leconvert_{c}_to({s}[i]);\n",
                i = indent,
                d = dst,
                s = src,
                n = n,
                c = conv
            ),
            (Some(conv), false) => format!("{}{} = leconvert_{}_to({});\n", indent, dst, conv, src),
            (None, true) => format!(
                "{}memcpy({}, {}, {} * sizeof({}));\n",
                indent,
                dst,
                src,
                n,
                base_type(ty).unwrap_or("uint8_t")
            ),
            (None, false) => format!("{}{} = {};\n", indent, dst, src),
        },
    }
}

/// Statements reading the packed field `src` into `target`.
fn unpack(element: &Element, target: &Target, src: &str, indent: &str) -> String {
    let n = element.cardinality;
    match element.ty {
        ElementType::String => format!(
            "{i}memcpy({a}, {s}, {n});\n{i}{a}[{n}] = '\\0';\n",
            i = indent,
            a = target.array,
            s = src,
            n = n
        ),
        ElementType::Bool if element.is_array() => format!(
            "{i}for (i = 0; i < {n}; i++) {a}[i] = ({s}[i / 8] & (1 << (i % 8))) != 0;\n",
            i = indent,
            a = target.array,
            s = src,
            n = n
        ),
        ElementType::Bool => format!("{}{} = {} != 0;\n", indent, target.scalar, src),
        ty => match (leconvert(ty), element.is_array()) {
            (Some(conv), true) => format!(
                "{i}for (i = 0; i < {n}; i++) {a}[i] = leconvert_{c}_from({s}[i]);\n",
                i = indent,
                a = target.array,
                s = src,
                n = n,
                c = conv
            ),
            (Some(conv), false) => format!(
                "{}{} = leconvert_{}_from({});\n",
                indent, target.scalar, conv, src
            ),
            (None, true) => format!(
                "{}memcpy({}, {}, {} * sizeof({}));\n",
                indent,
                target.array,
                src,
                n,
                base_type(ty).unwrap_or("uint8_t")
            ),
            (None, false) => format!("{}{} = {};\n", indent, target.scalar, src),
        },
    }
}

fn pad_literal(pad: PadValue) -> &'static str {
    match pad {
        PadValue::Zero => "0",
        PadValue::FloatZero => "0.0f",
        PadValue::False => "false",
        PadValue::Nul => "'\\0'",
    }
}

fn char_literal(c: char) -> String {
    match c {
        '\'' => "'\\''".to_string(),
        '\\' => "'\\\\'".to_string(),
        c => format!("'{}'", c),
    }
}

/// Renders the declarations and definitions of one device header.
struct HeaderWriter<'a> {
    generator: &'a CGenerator,
    resolved: &'a ResolvedDevice,
    device: &'a Device,
    ctx: &'a RenderContext,
    /// `gps_v2`
    prefix: String,
    /// `GPS_V2`
    upper: String,
    /// `GPSV2`
    type_name: String,
    /// `BRICKLET_GPS_V2`
    guard: String,
}

impl<'a> HeaderWriter<'a> {
    fn new(
        generator: &'a CGenerator,
        resolved: &'a ResolvedDevice,
        ctx: &'a RenderContext,
    ) -> Self {
        let device = &resolved.device;
        Self {
            generator,
            resolved,
            device,
            ctx,
            prefix: device.name.snake(),
            upper: device.name.upper(),
            type_name: device.name.camel(),
            guard: device.full_name().upper(),
        }
    }

    fn param(&self, name: &Name) -> String {
        self.generator.translate_name(name, NameKind::Parameter)
    }

    fn function(&self, name: &Name) -> String {
        format!(
            "{}_{}",
            self.prefix,
            self.generator.translate_name(name, NameKind::Function)
        )
    }

    fn function_id(&self, packet: &Packet) -> String {
        format!(
            "{}_FUNCTION_{}",
            self.upper,
            self.generator.translate_name(&packet.name, NameKind::Constant)
        )
    }

    fn callback_id(&self, name: &Name) -> String {
        format!(
            "{}_CALLBACK_{}",
            self.upper,
            self.generator.translate_name(name, NameKind::Constant)
        )
    }

    fn aggregate_type(&self, packet: &Packet) -> String {
        format!("{}{}", self.type_name, aggregate_name(&packet.name).camel())
    }

    fn callback_type(&self, name: &Name) -> String {
        format!("{}_{}CallbackFunction", self.type_name, name.camel())
    }

    fn wire_type(&self, packet: &Packet, suffix: &str) -> String {
        format!("{}_{}_{}", self.type_name, packet.name.camel(), suffix)
    }

    fn doc_block(&self, body: &str) -> String {
        let mut code = format!("/**\n * \\ingroup {}\n", self.device.full_name().camel());
        if !body.is_empty() {
            code.push_str(" *\n");
            code.push_str(&doc::prefix_lines(body, " * "));
        }
        code.push_str(" */\n");
        code
    }

    fn packet_doc(&self, packet: &Packet) -> String {
        if !self.ctx.generate_docs {
            return String::new();
        }
        doc::packet_doc(
            self.device,
            packet,
            &self.ctx.locale,
            |r| self.reference(r),
            |group, constant| self.constant_name(&group.name, &constant.name),
        )
    }

    fn reference(&self, reference: &Reference) -> String {
        match reference.kind {
            ReferenceKind::Function => format!("{{@link {}}}", self.function(&reference.name)),
            ReferenceKind::Callback => format!("{{@link {}}}", self.callback_id(&reference.name)),
        }
    }

    fn constant_name(&self, group: &Name, constant: &Name) -> String {
        format!("{}_{}", self.upper, naming::constant_name(group, constant))
    }

    // ---- declarations ----

    fn declarations(&self) -> Result<String, EmitError> {
        let mut code = String::new();
        let group = self.device.full_name().camel();

        code.push_str(&format!(
            "/**\n * \\defgroup {} {}\n */\n\n",
            group,
            self.device.long_display_name()
        ));
        let description = if self.ctx.generate_docs {
            self.device.description.get(&self.ctx.locale).to_string()
        } else {
            String::new()
        };
        code.push_str(&self.doc_block(&description));
        code.push_str(&format!("typedef Device {};\n\n", self.type_name));

        code.push_str(&self.id_defines()?);
        code.push_str(&self.constant_defines());
        code.push_str(&self.doc_block("This constant is used to identify a device."));
        code.push_str(&format!(
            "#define {}_DEVICE_IDENTIFIER {}\n\n",
            self.upper, self.device.identifier
        ));
        code.push_str(&self.doc_block("This constant represents the display name of a device."));
        code.push_str(&format!(
            "#define {}_DEVICE_DISPLAY_NAME {}\n\n",
            self.upper,
            quote_double(&self.device.long_display_name())
        ));

        code.push_str(&self.aggregate_types()?);
        code.push_str(&self.callback_types()?);
        code.push_str(&self.prototypes()?);

        Ok(code)
    }

    fn id_defines(&self) -> Result<String, EmitError> {
        let mut code = String::new();

        for packet in self.device.functions() {
            code.push_str(&self.doc_block(""));
            code.push_str(&format!(
                "#define {} {}\n\n",
                self.function_id(packet),
                packet.function_id
            ));
        }

        for packet in self.device.callbacks() {
            let params = self.callback_params(packet)?;
            let mut body = format!(
                "Signature: \\code void callback({}) \\endcode\n",
                params.join(", ")
            );
            let text = self.packet_doc(packet);
            if !text.is_empty() {
                body.push('\n');
                body.push_str(&text);
            }
            code.push_str(&self.doc_block(&body));
            code.push_str(&format!(
                "#define {} {}\n\n",
                self.callback_id(&packet.name),
                packet.function_id
            ));
        }

        for (packet, view) in self.resolved.stream_out_callbacks() {
            let Some(id) = view.callback_id else {
                continue;
            };
            let params = self.high_level_callback_params(packet, view)?;
            code.push_str(&self.doc_block(&format!(
                "Signature: \\code void callback({}) \\endcode\n\nHigh-level variant of {}.",
                params.join(", "),
                self.callback_id(&packet.name)
            )));
            code.push_str(&format!(
                "#define {} ({})\n\n",
                self.callback_id(&view.name),
                id
            ));
        }

        Ok(code)
    }

    fn constant_defines(&self) -> String {
        let mut code = String::new();
        for group in &self.device.constant_groups {
            code.push_str(&self.doc_block(""));
            for constant in &group.constants {
                let value = match constant.value {
                    ConstantValue::Int(v) => v.to_string(),
                    ConstantValue::Char(c) => char_literal(c),
                };
                code.push_str(&format!(
                    "#define {} {}\n",
                    self.constant_name(&group.name, &constant.name),
                    value
                ));
            }
            code.push('\n');
        }
        code
    }

    fn aggregate_types(&self) -> Result<String, EmitError> {
        let mut code = String::new();
        for packet in self.device.functions() {
            if packet.output_count() < 2 {
                continue;
            }
            code.push_str(&self.doc_block(&format!(
                "Result of {{@link {}}}.",
                self.function(&packet.name)
            )));
            code.push_str("typedef struct {\n");
            for element in packet.outputs() {
                code.push_str(&format!("\t{};\n", value_decl(element, &self.param(&element.name))?));
            }
            code.push_str(&format!("}} {};\n\n", self.aggregate_type(packet)));
        }
        Ok(code)
    }

    fn callback_params(&self, packet: &Packet) -> Result<Vec<String>, EmitError> {
        let mut params = packet
            .outputs()
            .map(|e| callback_param_decl(e, &self.param(&e.name)))
            .collect::<Result<Vec<_>, _>>()?;
        params.push("void *user_data".to_string());
        Ok(params)
    }

    fn high_level_callback_params(
        &self,
        packet: &Packet,
        view: &HighLevelView,
    ) -> Result<Vec<String>, EmitError> {
        let stream = self.param(&view.stream);
        let data = view.chunk_data_element(packet);
        let mut params = Vec::new();
        for field in view.fields(packet, Direction::Out) {
            match field {
                Field::Stream => {
                    params.push(format!("{} *{}", base_type(data.ty)?, stream));
                    params.push(format!("uint16_t {}_length", stream));
                }
                Field::Element(e) => params.push(callback_param_decl(e, &self.param(&e.name))?),
            }
        }
        params.push("void *user_data".to_string());
        Ok(params)
    }

    fn callback_types(&self) -> Result<String, EmitError> {
        let mut code = String::new();
        for packet in self.device.callbacks() {
            code.push_str(&format!(
                "typedef void (*{})({});\n",
                self.callback_type(&packet.name),
                self.callback_params(packet)?.join(", ")
            ));
        }
        for (packet, view) in self.resolved.stream_out_callbacks() {
            code.push_str(&format!(
                "typedef void (*{})({});\n",
                self.callback_type(&view.name),
                self.high_level_callback_params(packet, view)?.join(", ")
            ));
        }
        if !code.is_empty() {
            code.push('\n');
        }
        Ok(code)
    }

    fn device_param(&self) -> String {
        format!("{} *{}", self.type_name, self.prefix)
    }

    /// Low-level signature parameters after the device pointer.
    fn low_level_params(&self, packet: &Packet) -> Result<Vec<String>, EmitError> {
        let mut params = packet
            .inputs()
            .map(|e| param_decl(e, &self.param(&e.name)))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs: Vec<&Element> = packet.outputs().collect();
        match outputs.as_slice() {
            [] => {}
            [single] => params.push(ret_param_decl(single, &self.param(&single.name))?),
            _ => params.push(format!("{} *ret", self.aggregate_type(packet))),
        }
        Ok(params)
    }

    fn stream_in_params(
        &self,
        packet: &Packet,
        view: &HighLevelView,
    ) -> Result<Vec<String>, EmitError> {
        let stream = self.param(&view.stream);
        let data = view.chunk_data_element(packet);
        let mut params = Vec::new();
        for field in view.fields(packet, Direction::In) {
            match field {
                Field::Stream => {
                    params.push(format!("const {} *{}", base_type(data.ty)?, stream));
                    params.push(format!("{} {}_length", self.length_type(packet, view)?, stream));
                }
                Field::Element(e) => params.push(param_decl(e, &self.param(&e.name))?),
            }
        }
        let outputs: Vec<&Element> = packet.outputs().collect();
        match outputs.as_slice() {
            [] => {}
            [single] => params.push(ret_param_decl(single, &self.param(&single.name))?),
            _ => params.push(format!("{} *ret", self.aggregate_type(packet))),
        }
        Ok(params)
    }

    fn stream_out_params(
        &self,
        packet: &Packet,
        view: &HighLevelView,
    ) -> Result<Vec<String>, EmitError> {
        let stream = self.param(&view.stream);
        let data = view.chunk_data_element(packet);
        let mut params = packet
            .inputs()
            .map(|e| param_decl(e, &self.param(&e.name)))
            .collect::<Result<Vec<_>, _>>()?;
        for field in view.fields(packet, Direction::Out) {
            match field {
                Field::Stream => {
                    params.push(format!("{} *ret_{}", base_type(data.ty)?, stream));
                    params.push(format!("{} *ret_{}_length", self.length_type(packet, view)?, stream));
                }
                Field::Element(e) => params.push(ret_param_decl(e, &self.param(&e.name))?),
            }
        }
        Ok(params)
    }

    /// C type of a stream length: the wire length field's type, `uint16_t`
    /// for fixed lengths.
    fn length_type(
        &self,
        packet: &Packet,
        view: &HighLevelView,
    ) -> Result<&'static str, EmitError> {
        match view.length_element(packet) {
            Some(element) => base_type(element.ty),
            None => Ok("uint16_t"),
        }
    }

    fn signature(&self, name: &Name, params: &[String]) -> String {
        let mut all = vec![self.device_param()];
        all.extend(params.iter().cloned());
        format!("int {}({})", self.function(name), all.join(", "))
    }

    fn prototypes(&self) -> Result<String, EmitError> {
        let mut code = String::new();
        let device = self.device_param();

        code.push_str(&self.doc_block(&format!(
            "Creates the device object \\c {p} with the unique device ID \\c uid and adds\nit to the IPConnection \\c ipcon.",
            p = self.prefix
        )));
        code.push_str(&format!(
            "void {}_create({}, const char *uid, IPConnection *ipcon);\n\n",
            self.prefix, device
        ));
        code.push_str(&self.doc_block(&format!(
            "Removes the device object \\c {} from its IPConnection and destroys it.\nThe device object cannot be used anymore afterwards.",
            self.prefix
        )));
        code.push_str(&format!("void {}_destroy({});\n\n", self.prefix, device));

        code.push_str(&self.doc_block("Returns the response expected flag for the function specified by the\n\\c function_id parameter."));
        code.push_str(&format!(
            "int {}_get_response_expected({}, uint8_t function_id, bool *ret_response_expected);\n\n",
            self.prefix, device
        ));
        code.push_str(&self.doc_block("Changes the response expected flag of the function specified by the\n\\c function_id parameter. This flag can only be changed for setter\n(default value: *false*) and callback configuration functions\n(default value: *true*). For getter functions it is always enabled."));
        code.push_str(&format!(
            "int {}_set_response_expected({}, uint8_t function_id, bool response_expected);\n\n",
            self.prefix, device
        ));
        code.push_str(&self.doc_block("Changes the response expected flag for all setter and callback configuration\nfunctions of this device at once."));
        code.push_str(&format!(
            "int {}_set_response_expected_all({}, bool response_expected);\n\n",
            self.prefix, device
        ));
        code.push_str(&self.doc_block("Registers the given \\c function with the given \\c callback_id. The\n\\c user_data will be passed as the last parameter to the \\c function."));
        code.push_str(&format!(
            "void {}_register_callback({}, int16_t callback_id, void (*function)(void), void *user_data);\n\n",
            self.prefix, device
        ));
        code.push_str(&self.doc_block("Returns the API version (major, minor, release) of the bindings for this\ndevice."));
        code.push_str(&format!(
            "int {}_get_api_version({}, uint8_t ret_api_version[3]);\n\n",
            self.prefix, device
        ));

        for packet in self.device.functions() {
            code.push_str(&self.doc_block(&self.packet_doc(packet)));
            code.push_str(&format!(
                "{};\n\n",
                self.signature(&packet.name, &self.low_level_params(packet)?)
            ));
        }
        for (packet, view) in self.resolved.stream_in_functions() {
            code.push_str(&self.doc_block(&self.packet_doc(packet)));
            code.push_str(&format!(
                "{};\n\n",
                self.signature(&view.name, &self.stream_in_params(packet, view)?)
            ));
        }
        for (packet, view) in self.resolved.stream_out_functions() {
            code.push_str(&self.doc_block(&self.packet_doc(packet)));
            code.push_str(&format!(
                "{};\n\n",
                self.signature(&view.name, &self.stream_out_params(packet, view)?)
            ));
        }

        Ok(code)
    }

    // ---- definitions ----

    fn definitions(&self) -> Result<String, EmitError> {
        let mut code = String::new();

        code.push_str(PACKING);
        code.push('\n');
        code.push_str(&self.wire_structs()?);
        code.push_str(UNPACKING);
        code.push('\n');

        code.push_str(&self.callback_wrappers()?);
        code.push_str(&self.create_function());
        code.push_str(&self.device_functions());

        for packet in self.device.functions() {
            code.push_str(&self.function_body(packet)?);
        }
        for (packet, view) in self.resolved.stream_in_functions() {
            code.push_str(&self.stream_in_body(packet, view)?);
        }
        for (packet, view) in self.resolved.stream_out_functions() {
            code.push_str(&self.stream_out_body(packet, view)?);
        }

        Ok(code)
    }

    fn wire_struct(&self, name: &str, elements: &[&Element]) -> Result<String, EmitError> {
        let mut code = String::from("typedef struct {\n\tPacketHeader header;\n");
        for element in elements {
            code.push_str(&format!("\t{};\n", packed_decl(element, &self.param(&element.name))?));
        }
        code.push_str(&format!("}} ATTRIBUTE_PACKED {};\n\n", name));
        Ok(code)
    }

    fn wire_structs(&self) -> Result<String, EmitError> {
        let mut code = String::new();
        for packet in &self.device.packets {
            if packet.is_callback() {
                let outputs: Vec<&Element> = packet.outputs().collect();
                code.push_str(&self.wire_struct(&self.wire_type(packet, "Callback"), &outputs)?);
                continue;
            }
            let inputs: Vec<&Element> = packet.inputs().collect();
            code.push_str(&self.wire_struct(&self.wire_type(packet, "Request"), &inputs)?);
            if packet.output_count() > 0 {
                let outputs: Vec<&Element> = packet.outputs().collect();
                code.push_str(&self.wire_struct(&self.wire_type(packet, "Response"), &outputs)?);
            }
        }
        Ok(code)
    }

    fn callback_wrappers(&self) -> Result<String, EmitError> {
        let mut code = String::new();

        for (packet, view) in self.resolved.stream_out_callbacks() {
            code.push_str(&self.high_level_callback_wrapper(packet, view)?);
        }

        for packet in self.device.callbacks() {
            let outputs: Vec<&Element> = packet.outputs().collect();
            let names: Vec<String> = outputs.iter().map(|e| self.param(&e.name)).collect();
            let wire = self.wire_type(packet, "Callback");

            code.push_str(&format!(
                "static void {}_callback_wrapper_{}(DevicePrivate *device_p, Packet *packet) {{\n",
                self.prefix,
                packet.name.snake()
            ));
            code.push_str(&format!("\t{} callback_function;\n\tvoid *user_data;\n", self.callback_type(&packet.name)));
            if outputs.is_empty() {
                code.push_str("\n\t(void)packet;\n");
            } else {
                code.push_str(&format!("\t{} *callback = ({} *)packet;\n", wire, wire));
                for (element, name) in outputs.iter().zip(&names) {
                    code.push_str(&format!("\t{};\n", value_decl(element, name)?));
                }
                if outputs.iter().any(|e| needs_loop(e)) {
                    code.push_str("\tint i;\n");
                }
                code.push('\n');
                for (element, name) in outputs.iter().zip(&names) {
                    code.push_str(&unpack(element, &Target::local(name), &format!("callback->{}", name), "\t"));
                }
            }

            code.push_str(&format!(
                "\n\tcallback_function = ({})device_get_callback(device_p, {}, &user_data);\n\n",
                self.callback_type(&packet.name),
                self.callback_id(&packet.name)
            ));
            let mut args = names.clone();
            args.push("user_data".to_string());
            code.push_str(&format!(
                "\tif (callback_function != NULL) {{\n\t\tcallback_function({});\n\t}}\n",
                args.join(", ")
            ));

            if let Some(view) = self.resolved.high_level(packet) {
                code.push_str(&format!(
                    "\n\t{}_callback_wrapper_{}(device_p, {});\n",
                    self.prefix,
                    view.name.snake(),
                    names.join(", ")
                ));
            }
            code.push_str("}\n\n");
        }

        Ok(code)
    }

    fn high_level_callback_wrapper(
        &self,
        packet: &Packet,
        view: &HighLevelView,
    ) -> Result<String, EmitError> {
        let stream = self.param(&view.stream);
        let data = view.chunk_data_element(packet);
        let item = base_type(data.ty)?;
        let chunk = view.chunk_cardinality;
        let params = packet
            .outputs()
            .map(|e| callback_param_decl(e, &self.param(&e.name)))
            .collect::<Result<Vec<_>, _>>()?;

        let length = match view.length_element(packet) {
            Some(e) => self.param(&e.name),
            None => view.fixed_length().unwrap_or(chunk).to_string(),
        };
        let offset = view
            .chunk_offset_element(packet)
            .map_or_else(|| "0".to_string(), |e| self.param(&e.name));
        let data_name = self.param(&data.name);

        let mut args = Vec::new();
        for field in view.fields(packet, Direction::Out) {
            match field {
                Field::Stream => {
                    args.push(format!("({} *)high_level_callback->data", item));
                    args.push("high_level_callback->length".to_string());
                }
                Field::Element(e) => args.push(self.param(&e.name)),
            }
        }
        args.push("user_data".to_string());

        let mut code = format!(
            "static void {}_callback_wrapper_{}(DevicePrivate *device_p, {}) {{\n",
            self.prefix,
            view.name.snake(),
            params.join(", ")
        );
        code.push_str(&format!("\t{} callback_function;\n\tvoid *user_data;\n", self.callback_type(&view.name)));
        code.push_str(&format!(
            "\tHighLevelCallback *high_level_callback = device_get_high_level_callback(device_p, {});\n",
            self.callback_id(&view.name)
        ));
        code.push_str(&format!(
            "\tuint16_t {s}_chunk_length = (uint16_t)({l} - {o});\n\n",
            s = stream,
            l = length,
            o = offset
        ));
        code.push_str(&format!(
            "\tif ({s}_chunk_length > {n}) {{\n\t\t{s}_chunk_length = {n};\n\t}}\n\n",
            s = stream,
            n = chunk
        ));
        code.push_str(&format!(
            "\tcallback_function = ({})device_get_callback(device_p, {}, &user_data);\n\n",
            self.callback_type(&view.name),
            self.callback_id(&view.name)
        ));

        code.push_str(&format!(
            "\tif (high_level_callback->data == NULL) {{ // no stream in-progress\n\t\tif ({o} != 0) {{ // ignore tail of current stream, wait for next stream start\n\t\t\treturn;\n\t\t}}\n\n\t\thigh_level_callback->data = malloc(sizeof({t}) * ({l} > 0 ? {l} : 1));\n\t\thigh_level_callback->length = 0;\n\n\t\tif (high_level_callback->data == NULL) {{\n\t\t\treturn;\n\t\t}}\n\t}}\n\n",
            o = offset,
            t = item,
            l = length
        ));
        code.push_str(&format!(
            "\tif ({o} != high_level_callback->length) {{ // stream out-of-sync\n\t\tfree(high_level_callback->data);\n\t\thigh_level_callback->data = NULL;\n\t\thigh_level_callback->length = 0;\n\n\t\treturn;\n\t}}\n\n",
            o = offset
        ));
        code.push_str(&format!(
            "\tmemcpy(&(({t} *)high_level_callback->data)[high_level_callback->length], {d}, sizeof({t}) * {s}_chunk_length);\n\thigh_level_callback->length += {s}_chunk_length;\n\n",
            t = item,
            d = data_name,
            s = stream
        ));
        // A single chunk completes the stream even when the wire length exceeds it.
        let complete = if view.single_chunk {
            format!("({l} < {n} ? {l} : {n})", l = length, n = chunk)
        } else {
            length.clone()
        };
        code.push_str(&format!(
            "\tif (high_level_callback->length >= {l}) {{ // stream complete\n\t\tif (callback_function != NULL) {{\n\t\t\tcallback_function({a});\n\t\t}}\n\n\t\tfree(high_level_callback->data);\n\t\thigh_level_callback->data = NULL;\n\t\thigh_level_callback->length = 0;\n\t}}\n}}\n\n",
            l = complete,
            a = args.join(", ")
        ));

        Ok(code)
    }

    fn create_function(&self) -> String {
        let api = &self.device.api_version;
        let mut code = format!(
            "void {p}_create({d}, const char *uid, IPConnection *ipcon) {{\n\tDevicePrivate *device_p;\n\n\tdevice_create({p}, uid, ipcon->p, {ma}, {mi}, {pa}, {u}_DEVICE_IDENTIFIER);\n\n\tdevice_p = {p}->p;\n\n",
            p = self.prefix,
            d = self.device_param(),
            ma = api.major,
            mi = api.minor,
            pa = api.patch,
            u = self.upper
        );

        for packet in self.device.functions() {
            code.push_str(&format!(
                "\tdevice_p->response_expected[{}] = DEVICE_RESPONSE_EXPECTED_{};\n",
                self.function_id(packet),
                self.generator.classify_response(packet).upper_name()
            ));
        }
        code.push('\n');

        let mut wrappers = String::new();
        for packet in self.device.callbacks() {
            wrappers.push_str(&format!(
                "\tdevice_p->callback_wrappers[{}] = {}_callback_wrapper_{};\n",
                self.callback_id(&packet.name),
                self.prefix,
                packet.name.snake()
            ));
        }
        if !wrappers.is_empty() {
            wrappers.push('\n');
        }
        code.push_str(&wrappers);

        code.push_str("\tipcon_add_device(ipcon->p, device_p);\n}\n\n");
        code
    }

    fn device_functions(&self) -> String {
        format!(
            "void {p}_destroy({d}) {{\n\tdevice_release({p}->p);\n}}\n\n\
             int {p}_get_response_expected({d}, uint8_t function_id, bool *ret_response_expected) {{\n\treturn device_get_response_expected({p}->p, function_id, ret_response_expected);\n}}\n\n\
             int {p}_set_response_expected({d}, uint8_t function_id, bool response_expected) {{\n\treturn device_set_response_expected({p}->p, function_id, response_expected);\n}}\n\n\
             int {p}_set_response_expected_all({d}, bool response_expected) {{\n\treturn device_set_response_expected_all({p}->p, response_expected);\n}}\n\n\
             void {p}_register_callback({d}, int16_t callback_id, void (*function)(void), void *user_data) {{\n\tdevice_register_callback({p}->p, callback_id, function, user_data);\n}}\n\n\
             int {p}_get_api_version({d}, uint8_t ret_api_version[3]) {{\n\treturn device_get_api_version({p}->p, ret_api_version);\n}}\n\n",
            p = self.prefix,
            d = self.device_param()
        )
    }

    fn function_body(&self, packet: &Packet) -> Result<String, EmitError> {
        let request = self.wire_type(packet, "Request");
        let response = self.wire_type(packet, "Response");
        let outputs: Vec<&Element> = packet.outputs().collect();
        let has_response = !outputs.is_empty();

        let mut code = format!(
            "{} {{\n",
            self.signature(&packet.name, &self.low_level_params(packet)?)
        );
        code.push_str(&format!("\tDevicePrivate *device_p = {}->p;\n", self.prefix));
        code.push_str(&format!("\t{} request;\n", request));
        if has_response {
            code.push_str(&format!("\t{} response;\n", response));
        }
        code.push_str("\tint ret;\n");
        if packet.elements.iter().any(needs_loop) {
            code.push_str("\tint i;\n");
        }
        code.push_str("\n\tret = d_check_validity(device_p);\n\n\tif (ret < 0) {\n\t\treturn ret;\n\t}\n\n");
        code.push_str(&format!(
            "\tret = packet_header_create(&request.header, sizeof(request), {}, device_p->ipcon_p, device_p);\n\n\tif (ret < 0) {{\n\t\treturn ret;\n\t}}\n\n",
            self.function_id(packet)
        ));

        let mut packing = String::new();
        for element in packet.inputs() {
            let name = self.param(&element.name);
            packing.push_str(&pack(element, &format!("request.{}", name), &name, "\t"));
        }
        if !packing.is_empty() {
            packing.push('\n');
        }
        code.push_str(&packing);

        if has_response {
            code.push_str("\tret = device_send_request(device_p, (Packet *)&request, (Packet *)&response, sizeof(response));\n\n");
        } else {
            code.push_str("\tret = device_send_request(device_p, (Packet *)&request, NULL, 0);\n\n");
        }
        code.push_str("\tif (ret < 0) {\n\t\treturn ret;\n\t}\n");

        if has_response {
            code.push('\n');
            for element in &outputs {
                let name = self.param(&element.name);
                let target = if outputs.len() == 1 {
                    Target::pointer(&name)
                } else {
                    Target::field("ret", &name)
                };
                code.push_str(&unpack(element, &target, &format!("response.{}", name), "\t"));
            }
        }

        code.push_str("\n\treturn ret;\n}\n\n");
        Ok(code)
    }

    /// Declaration of the low-level result inside a high-level body, the
    /// argument passing it, and how an element of it is read.
    fn low_level_result(&self, packet: &Packet, var: &str) -> Result<(String, String), EmitError> {
        let outputs: Vec<&Element> = packet.outputs().collect();
        Ok(match outputs.as_slice() {
            [] => (String::new(), String::new()),
            [single] if single.is_array() || single.ty == ElementType::String => {
                (format!("\t{};\n", value_decl(single, var)?), var.to_string())
            }
            [single] => (format!("\t{};\n", value_decl(single, var)?), format!("&{}", var)),
            _ => (
                format!("\t{} {};\n", self.aggregate_type(packet), var),
                format!("&{}", var),
            ),
        })
    }

    fn result_access(&self, packet: &Packet, var: &str, element: &Element) -> String {
        if packet.output_count() >= 2 {
            format!("{}.{}", var, self.param(&element.name))
        } else {
            var.to_string()
        }
    }

    fn low_level_call(&self, packet: &Packet, view: &HighLevelView, result_arg: &str) -> String {
        let stream = self.param(&view.stream);
        let mut args = vec![self.prefix.clone()];
        for (i, element) in packet.elements.iter().enumerate() {
            if element.direction != Direction::In {
                continue;
            }
            args.push(match view.role(i) {
                Some(StreamRole::ChunkData) => format!("{}_chunk_data", stream),
                Some(StreamRole::ChunkOffset) => format!("{}_chunk_offset", stream),
                Some(StreamRole::Length) => format!("{}_length", stream),
                None => self.param(&element.name),
            });
        }
        if !result_arg.is_empty() {
            args.push(result_arg.to_string());
        }
        format!("{}({})", self.function(&packet.name), args.join(", "))
    }

    fn stream_in_body(&self, packet: &Packet, view: &HighLevelView) -> Result<String, EmitError> {
        let stream = self.param(&view.stream);
        let data = view.chunk_data_element(packet);
        let item = base_type(data.ty)?;
        let chunk = view.chunk_cardinality;
        let max = view.max_length();
        let offset_ty = view
            .chunk_offset_element(packet)
            .map(|e| base_type(e.ty))
            .transpose()?
            .unwrap_or("uint16_t");
        let has_result = packet.output_count() > 0;
        let (result_decl, _) = self.low_level_result(packet, "result")?;
        let (chunk_decl, chunk_arg) = self.low_level_result(packet, "chunk_result")?;

        let mut code = format!(
            "{} {{\n",
            self.signature(&view.name, &self.stream_in_params(packet, view)?)
        );
        code.push_str(&format!("\tDevicePrivate *device_p = {}->p;\n\tint ret = 0;\n", self.prefix));
        code.push_str(&format!(
            "\t{o} {s}_chunk_offset = 0;\n\t{t} {s}_chunk_data[{n}];\n\t{o} {s}_chunk_length;\n",
            o = offset_ty,
            s = stream,
            t = item,
            n = chunk
        ));
        if has_result {
            code.push_str(&result_decl);
            code.push_str(&chunk_decl);
            code.push_str("\tbool first_chunk = true;\n");
        }
        code.push_str(&format!(
            "\n\tif ({s}_length > {m}) {{\n\t\treturn E_INVALID_PARAMETER;\n\t}}\n\n",
            s = stream,
            m = max
        ));
        if has_result {
            code.push_str("\tmemset(&result, 0, sizeof(result));\n\tmemset(&chunk_result, 0, sizeof(chunk_result));\n\n");
        }
        code.push_str("\tmutex_lock(&device_p->stream_mutex);\n\n");

        code.push_str("\tfor (;;) {\n");
        code.push_str(&format!(
            "\t\t{s}_chunk_length = {s}_length - {s}_chunk_offset;\n\n\t\tif ({s}_chunk_length > {n}) {{\n\t\t\t{s}_chunk_length = {n};\n\t\t}}\n\n",
            s = stream,
            n = chunk
        ));
        code.push_str(&format!(
            "\t\tif ({s}_chunk_length > 0) {{\n\t\t\tmemcpy({s}_chunk_data, &{s}[{s}_chunk_offset], sizeof({t}) * {s}_chunk_length);\n\t\t}}\n\n\t\tfor ({o} k = {s}_chunk_length; k < {n}; k++) {{\n\t\t\t{s}_chunk_data[k] = {p};\n\t\t}}\n\n",
            s = stream,
            t = item,
            o = offset_ty,
            n = chunk,
            p = pad_literal(pad_kind(data.ty))
        ));
        code.push_str(&format!(
            "\t\tret = {};\n\n\t\tif (ret < 0) {{\n\t\t\tbreak;\n\t\t}}\n\n",
            self.low_level_call(packet, view, &chunk_arg)
        ));
        if has_result {
            code.push_str("\t\tif (!first_chunk && memcmp(&chunk_result, &result, sizeof(result)) != 0) {\n\t\t\tret = E_STREAM_OUT_OF_SYNC;\n\t\t\tbreak;\n\t\t}\n\n");
            code.push_str("\t\tmemcpy(&result, &chunk_result, sizeof(result));\n\t\tfirst_chunk = false;\n\n");
        }
        if view.single_chunk {
            code.push_str("\t\tbreak;\n\t}\n\n");
        } else {
            code.push_str(&format!(
                "\t\t{s}_chunk_offset += {n};\n\n\t\tif ({s}_chunk_offset >= {s}_length) {{\n\t\t\tbreak;\n\t\t}}\n\t}}\n\n",
                s = stream,
                n = chunk
            ));
        }
        code.push_str("\tmutex_unlock(&device_p->stream_mutex);\n\n");

        if has_result {
            let outputs: Vec<&Element> = packet.outputs().collect();
            let copy = match outputs.as_slice() {
                [single] if single.is_array() || single.ty == ElementType::String => {
                    format!("\t\tmemcpy(ret_{}, result, sizeof(result));\n", self.param(&single.name))
                }
                [single] => format!("\t\t*ret_{} = result;\n", self.param(&single.name)),
                _ => "\t\t*ret = result;\n".to_string(),
            };
            code.push_str(&format!("\tif (ret == 0) {{\n{}\t}}\n\n", copy));
        }

        code.push_str("\treturn ret;\n}\n\n");
        Ok(code)
    }

    fn stream_out_body(&self, packet: &Packet, view: &HighLevelView) -> Result<String, EmitError> {
        let stream = self.param(&view.stream);
        let data = view.chunk_data_element(packet);
        let item = base_type(data.ty)?;
        let chunk = view.chunk_cardinality;
        let length_ty = self.length_type(packet, view)?;
        let (decl, arg) = self.low_level_result(packet, "low_level")?;
        let call = self.low_level_call(packet, view, &arg);
        let data_src = self.result_access(packet, "low_level", data);
        let length = match view.length_element(packet) {
            Some(e) => self.result_access(packet, "low_level", e),
            None => view.fixed_length().unwrap_or(chunk).to_string(),
        };

        let mut code = format!(
            "{} {{\n",
            self.signature(&view.name, &self.stream_out_params(packet, view)?)
        );
        code.push_str(&format!("\tDevicePrivate *device_p = {}->p;\n\tint ret = 0;\n", self.prefix));
        code.push_str(&decl);
        code.push_str(&format!(
            "\t{l} {s}_length = 0;\n\t{l} {s}_chunk_length;\n",
            l = length_ty,
            s = stream
        ));

        let indent = if view.single_chunk { "\t" } else { "\t\t" };
        let mut passthrough = String::new();
        for element in view.passthrough(packet, Direction::Out) {
            let name = self.param(&element.name);
            let src = self.result_access(packet, "low_level", element);
            if element.is_array() || element.ty == ElementType::String {
                passthrough.push_str(&format!("{}memcpy(ret_{}, {s}, sizeof({s}));\n", indent, name, s = src));
            } else {
                passthrough.push_str(&format!("{}*ret_{} = {};\n", indent, name, src));
            }
        }

        if view.single_chunk {
            code.push_str(&format!(
                "\n\t*ret_{s}_length = 0;\n\n\tret = {c};\n\n\tif (ret < 0) {{\n\t\treturn ret;\n\t}}\n\n",
                s = stream,
                c = call
            ));
            code.push_str(&format!(
                "\t{s}_length = {l};\n\t{s}_chunk_length = {s}_length > {n} ? {n} : {s}_length;\n\n\tmemcpy(ret_{s}, {d}, sizeof({t}) * {s}_chunk_length);\n\t*ret_{s}_length = {s}_chunk_length;\n",
                s = stream,
                l = length,
                n = chunk,
                d = data_src,
                t = item
            ));
            if !passthrough.is_empty() {
                code.push('\n');
                code.push_str(&passthrough);
            }
            code.push_str("\n\treturn ret;\n}\n\n");
            return Ok(code);
        }

        let offset = view
            .chunk_offset_element(packet)
            .map_or_else(|| "0".to_string(), |e| self.result_access(packet, "low_level", e));

        code.push_str(&format!(
            "\t{l} {s}_chunk_offset = 0;\n\tbool {s}_out_of_sync;\n\n\t*ret_{s}_length = 0;\n\n\tmutex_lock(&device_p->stream_mutex);\n\n",
            l = length_ty,
            s = stream
        ));
        code.push_str(&format!(
            "\tret = {c};\n\n\tif (ret < 0) {{\n\t\tgoto unlock;\n\t}}\n\n\t{s}_length = {l};\n\t{s}_chunk_offset = {o};\n\t{s}_out_of_sync = {s}_chunk_offset != 0;\n\n",
            c = call,
            s = stream,
            l = length,
            o = offset
        ));
        code.push_str(&format!(
            "\tif (!{s}_out_of_sync) {{\n\t\t{s}_chunk_length = {s}_length - {s}_chunk_offset;\n\n\t\tif ({s}_chunk_length > {n}) {{\n\t\t\t{s}_chunk_length = {n};\n\t\t}}\n\n\t\tmemcpy(ret_{s}, {d}, sizeof({t}) * {s}_chunk_length);\n\t\t*ret_{s}_length = {s}_chunk_length;\n\n",
            s = stream,
            n = chunk,
            d = data_src,
            t = item
        ));
        code.push_str(&format!(
            "\t\twhile (*ret_{s}_length < {s}_length) {{\n\t\t\tret = {c};\n\n\t\t\tif (ret < 0) {{\n\t\t\t\tgoto unlock;\n\t\t\t}}\n\n\t\t\t{s}_chunk_offset = {o};\n\t\t\t{s}_out_of_sync = {s}_chunk_offset != *ret_{s}_length;\n\n\t\t\tif ({s}_out_of_sync) {{\n\t\t\t\tbreak;\n\t\t\t}}\n\n",
            s = stream,
            c = call,
            o = offset
        ));
        code.push_str(&format!(
            "\t\t\t{s}_chunk_length = {s}_length - {s}_chunk_offset;\n\n\t\t\tif ({s}_chunk_length > {n}) {{\n\t\t\t\t{s}_chunk_length = {n};\n\t\t\t}}\n\n\t\t\tmemcpy(&ret_{s}[*ret_{s}_length], {d}, sizeof({t}) * {s}_chunk_length);\n\t\t\t*ret_{s}_length += {s}_chunk_length;\n\t\t}}\n\t}}\n\n",
            s = stream,
            n = chunk,
            d = data_src,
            t = item
        ));
        code.push_str(&format!(
            "\tif ({s}_out_of_sync) {{\n\t\t*ret_{s}_length = 0; // return empty array\n\n\t\t// discard remaining stream to bring it back in-sync\n\t\twhile ({s}_chunk_offset + {n} < {s}_length) {{\n\t\t\tret = {c};\n\n\t\t\tif (ret < 0) {{\n\t\t\t\tgoto unlock;\n\t\t\t}}\n\n\t\t\t{s}_chunk_offset = {o};\n\t\t}}\n\n\t\tret = E_STREAM_OUT_OF_SYNC;\n\t}}\n",
            s = stream,
            n = chunk,
            c = call,
            o = offset
        ));
        if !passthrough.is_empty() {
            code.push_str(&format!("\n\tif (ret == 0) {{\n{}\t}}\n", passthrough));
        }
        code.push_str("\nunlock:\n\tmutex_unlock(&device_p->stream_mutex);\n\n\treturn ret;\n}\n\n");

        Ok(code)
    }
}
