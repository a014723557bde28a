//! JavaScript bindings generator
//!
//! Emits one Node.js module per device on top of the `Device` and
//! `IPConnection` runtime modules. Calls are asynchronous: every method
//! takes a `returnCallback` and an `errorCallback`. Results with more than
//! one value are handed to `returnCallback` as a single object.

use std::sync::Arc;

use devbind_model::{ConstantValue, Device, Direction, Element, ElementType, Name, Packet};

use super::{
    format_list, packet_size, pad_kind, quote_single, strip_trailing_whitespace, Artifact,
    Generator, Language, PadValue, RenderContext,
};
use crate::doc::{self, Reference, ReferenceKind};
use crate::error::EmitError;
use crate::naming::{self, Escape, NameKind, JAVASCRIPT_KEYWORDS};
use crate::provenance::CommentStyle;
use crate::resolver::{Field, HighLevelView, ResolvedDevice, StreamRole};

const LANGUAGE: &str = "JavaScript";

/// Generator for JavaScript device modules
pub struct JavaScriptGenerator;

impl JavaScriptGenerator {
    pub fn new() -> Self {
        Self
    }

    fn class_name(&self, device: &Device) -> String {
        self.translate_name(&device.full_name(), NameKind::Type)
    }
}

impl Default for JavaScriptGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for JavaScriptGenerator {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn file_name(&self, device: &Device) -> String {
        format!("{}.js", self.translate_name(&device.full_name(), NameKind::Module))
    }

    fn comment_style(&self) -> CommentStyle {
        CommentStyle::CBlock
    }

    fn translate_name(&self, name: &Name, kind: NameKind) -> String {
        match kind {
            NameKind::Type | NameKind::Module => name.camel(),
            NameKind::Function => name.headless_camel(),
            NameKind::Parameter | NameKind::Field => naming::escape(
                naming::guard_leading_digit(name.headless_camel()),
                JAVASCRIPT_KEYWORDS,
                Escape::TrailingUnderscore,
            ),
            NameKind::Constant => naming::guard_leading_digit(name.upper()),
        }
    }

    fn map_type(&self, ty: ElementType, cardinality: usize) -> Result<String, EmitError> {
        let base = match ty {
            ElementType::Int8
            | ElementType::UInt8
            | ElementType::Int16
            | ElementType::UInt16
            | ElementType::Int32
            | ElementType::UInt32
            | ElementType::Float => "number",
            // Doubles lose precision beyond 2^53.
            ElementType::Int64 | ElementType::UInt64 => "number",
            ElementType::Bool => "boolean",
            ElementType::Char | ElementType::String => "string",
            other => {
                return Err(EmitError::UnsupportedType {
                    language: LANGUAGE,
                    ty: other.to_string(),
                })
            }
        };

        if cardinality > 1 && ty != ElementType::String {
            Ok(format!("{}[]", base))
        } else {
            Ok(base.to_string())
        }
    }

    fn render_device(
        &self,
        resolved: &ResolvedDevice,
        ctx: &RenderContext,
    ) -> Result<String, EmitError> {
        let writer = ModuleWriter::new(self, resolved, ctx);
        let mut code = String::new();

        code.push_str(&self.header(ctx));
        code.push_str(&self.released_marker(&resolved.device));
        code.push_str("\nvar Device = require('./Device');\nvar IPConnection = require('./IPConnection');\n\n");
        code.push_str(&writer.statics());
        code.push_str(&writer.constructor()?);
        code.push_str(&format!("\nmodule.exports = {};\n", writer.class));

        Ok(strip_trailing_whitespace(&code))
    }

    fn finish(
        &self,
        released: &[Arc<Device>],
        ctx: &RenderContext,
    ) -> Result<Vec<Artifact>, EmitError> {
        let mut classes: Vec<(u16, String)> = released
            .iter()
            .map(|d| (d.identifier, self.class_name(d)))
            .collect();
        classes.sort();

        let mut code = self.header(ctx);
        code.push_str("\nmodule.exports = {\n    IPConnection: require('./IPConnection'),\n");
        for (_, class) in &classes {
            code.push_str(&format!("    {c}: require('./{c}'),\n", c = class));
        }
        code.push_str("};\n");

        Ok(vec![Artifact {
            file_name: "index.js".to_string(),
            contents: strip_trailing_whitespace(&code),
        }])
    }
}

fn pad_literal(pad: PadValue) -> &'static str {
    match pad {
        PadValue::Zero | PadValue::FloatZero => "0",
        PadValue::False => "false",
        PadValue::Nul => "'\\0'",
    }
}

fn constant_literal(value: ConstantValue) -> String {
    match value {
        ConstantValue::Int(v) => v.to_string(),
        ConstantValue::Char(c) => quote_single(&c.to_string()),
    }
}

fn is_char_stream(element: &Element) -> bool {
    matches!(element.ty, ElementType::Char | ElementType::String)
}

/// Renders the pieces of one device's module.
struct ModuleWriter<'a> {
    generator: &'a JavaScriptGenerator,
    resolved: &'a ResolvedDevice,
    device: &'a Device,
    ctx: &'a RenderContext,
    class: String,
}

impl<'a> ModuleWriter<'a> {
    fn new(
        generator: &'a JavaScriptGenerator,
        resolved: &'a ResolvedDevice,
        ctx: &'a RenderContext,
    ) -> Self {
        Self {
            generator,
            resolved,
            device: &resolved.device,
            ctx,
            class: generator.class_name(&resolved.device),
        }
    }

    fn param(&self, name: &Name) -> String {
        self.generator.translate_name(name, NameKind::Parameter)
    }

    fn function(&self, name: &Name) -> String {
        self.generator.translate_name(name, NameKind::Function)
    }

    fn constant(&self, name: &Name) -> String {
        self.generator.translate_name(name, NameKind::Constant)
    }

    fn statics(&self) -> String {
        let class = &self.class;
        let mut code = format!(
            "{c}.DEVICE_IDENTIFIER = {};\n{c}.DEVICE_DISPLAY_NAME = {};\n",
            self.device.identifier,
            quote_single(&self.device.long_display_name()),
            c = class
        );

        for packet in self.device.callbacks() {
            code.push_str(&format!(
                "{}.CALLBACK_{} = {};\n",
                class,
                self.constant(&packet.name),
                packet.function_id
            ));
        }
        for (packet, view) in self.resolved.stream_out_callbacks() {
            if let Some(id) = view.callback_id {
                code.push_str(&format!(
                    "{}.CALLBACK_{} = {};\n",
                    class,
                    self.constant(&packet.high_level_name()),
                    id
                ));
            }
        }
        for packet in self.device.functions() {
            code.push_str(&format!(
                "{}.FUNCTION_{} = {};\n",
                class,
                self.constant(&packet.name),
                packet.function_id
            ));
        }
        for group in &self.device.constant_groups {
            for constant in &group.constants {
                code.push_str(&format!(
                    "{}.{} = {};\n",
                    class,
                    naming::guard_leading_digit(naming::constant_name(&group.name, &constant.name)),
                    constant_literal(constant.value)
                ));
            }
        }

        code.push('\n');
        code
    }

    fn constructor(&self) -> Result<String, EmitError> {
        let class = &self.class;
        let mut code = format!("function {}(uid, ipcon) {{\n", class);
        code.push_str(&format!(
            "\t//{}\n\n",
            self.device.description.get(&self.ctx.locale)
        ));
        code.push_str(
            "\t/*\n\tCreates an object with the unique device ID *uid* and adds it to\n\tthe IP Connection *ipcon*.\n\t*/\n",
        );
        code.push_str(&format!(
            "\tDevice.call(this, this, uid, ipcon, {c}.DEVICE_IDENTIFIER, {c}.DEVICE_DISPLAY_NAME);\n\t{c}.prototype = Object.create(Device);\n",
            c = class
        ));
        let api = &self.device.api_version;
        code.push_str(&format!(
            "\tthis.APIVersion = [{}, {}, {}];\n",
            api.major, api.minor, api.patch
        ));

        code.push_str("\tthis.responseExpected = {};\n");
        for packet in &self.device.packets {
            let prefix = if packet.is_callback() { "CALLBACK" } else { "FUNCTION" };
            code.push_str(&format!(
                "\tthis.responseExpected[{c}.{p}_{n}] = Device.RESPONSE_EXPECTED_{r};\n",
                c = class,
                p = prefix,
                n = self.constant(&packet.name),
                r = self.generator.classify_response(packet).upper_name()
            ));
        }

        code.push_str("\tthis.callbackFormats = {};\n");
        for packet in self.device.callbacks() {
            code.push_str(&format!(
                "\tthis.callbackFormats[{}.CALLBACK_{}] = [{}, '{}'];\n",
                class,
                self.constant(&packet.name),
                packet_size(packet, Direction::Out),
                format_list(LANGUAGE, packet, Direction::Out)?
            ));
        }

        code.push_str("\tthis.highLevelCallbacks = {};\n");
        for (packet, view) in self.resolved.stream_out_callbacks() {
            let roles: Vec<String> = packet
                .elements
                .iter()
                .enumerate()
                .filter(|(_, e)| e.direction == Direction::Out)
                .map(|(i, _)| match view.role(i) {
                    Some(role) => format!("'{}'", role.tag()),
                    None => "null".to_string(),
                })
                .collect();
            code.push_str(&format!(
                "\tthis.highLevelCallbacks[{}.CALLBACK_{}] = [[{}], {{'fixedLength': {}, 'singleChunk': {}}}, null];\n",
                class,
                self.constant(&packet.high_level_name()),
                roles.join(", "),
                view.fixed_length().map_or("null".to_string(), |n| n.to_string()),
                view.single_chunk
            ));
        }
        code.push('\n');

        for packet in self.device.functions() {
            code.push_str(&self.method(packet)?);
        }
        for (packet, view) in self.resolved.stream_in_functions() {
            code.push_str(&self.stream_in_method(packet, view)?);
        }
        for (packet, view) in self.resolved.stream_out_functions() {
            code.push_str(&self.stream_out_method(packet, view)?);
        }
        code.push_str(&self.register_callback());

        code.push_str("\tthis.ipcon.addDevice(this);\n}\n");
        Ok(code)
    }

    fn doc_comment(&self, packet: &Packet) -> String {
        if !self.ctx.generate_docs {
            return String::new();
        }
        let text = doc::packet_doc(
            self.device,
            packet,
            &self.ctx.locale,
            |r| self.reference(r),
            |group, constant| {
                format!(
                    "{}.{}",
                    self.class,
                    naming::guard_leading_digit(naming::constant_name(&group.name, &constant.name))
                )
            },
        );
        if text.is_empty() {
            return String::new();
        }
        format!("\t\t/*\n{}\t\t*/\n", doc::prefix_lines(&text, "\t\t"))
    }

    fn reference(&self, reference: &Reference) -> String {
        match reference.kind {
            ReferenceKind::Function => format!("{{@link {}#{}}}", self.class, self.function(&reference.name)),
            ReferenceKind::Callback => {
                format!("{{@link {}#CALLBACK_{}}}", self.class, self.constant(&reference.name))
            }
        }
    }

    fn signature(&self, name: &Name, params: &[String]) -> String {
        let mut args = params.to_vec();
        args.push("returnCallback".to_string());
        args.push("errorCallback".to_string());
        format!("\tthis.{} = function({}) {{\n", self.function(name), args.join(", "))
    }

    /// `{latitude: latitude, ns: ns}` for aggregate results.
    fn object_literal(&self, fields: &[(String, String)]) -> String {
        let entries: Vec<String> = fields.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        format!("{{{}}}", entries.join(", "))
    }

    fn method(&self, packet: &Packet) -> Result<String, EmitError> {
        let params: Vec<String> = packet.inputs().map(|e| self.param(&e.name)).collect();
        let mut code = self.signature(&packet.name, &params);
        code.push_str(&self.doc_comment(packet));

        let outputs: Vec<String> = packet.outputs().map(|e| self.param(&e.name)).collect();
        let return_callback = if outputs.len() >= 2 {
            let fields: Vec<(String, String)> =
                outputs.iter().map(|o| (o.clone(), o.clone())).collect();
            format!(
                "function ({}) {{\n\t\t\tif (returnCallback !== undefined) {{\n\t\t\t\treturnCallback({});\n\t\t\t}}\n\t\t}}",
                outputs.join(", "),
                self.object_literal(&fields)
            )
        } else {
            "returnCallback".to_string()
        };

        code.push_str(&format!(
            "\t\tthis.ipcon.sendRequest(this, {}.FUNCTION_{}, [{}], '{}', {}, '{}', {}, errorCallback);\n\t}};\n",
            self.class,
            self.constant(&packet.name),
            params.join(", "),
            format_list(LANGUAGE, packet, Direction::In)?,
            packet_size(packet, Direction::Out),
            format_list(LANGUAGE, packet, Direction::Out)?,
            return_callback
        ));

        Ok(code)
    }

    fn fail_function(&self) -> &'static str {
        "\t\t\tfunction fail(error) {\n\t\t\t\tunlock();\n\n\t\t\t\tif (errorCallback !== undefined) {\n\t\t\t\t\terrorCallback(error);\n\t\t\t\t}\n\t\t\t}\n\n"
    }

    fn stream_in_method(&self, packet: &Packet, view: &HighLevelView) -> Result<String, EmitError> {
        let stream = self.param(&view.stream);
        let chunk = view.chunk_cardinality;
        let data = view.chunk_data_element(packet);
        let params: Vec<String> = view
            .fields(packet, Direction::In)
            .iter()
            .map(|f| match f {
                Field::Stream => stream.clone(),
                Field::Element(e) => self.param(&e.name),
            })
            .collect();
        let has_result = packet.output_count() > 0;

        let mut code = self.signature(&view.name, &params);
        code.push_str(&self.doc_comment(packet));
        code.push_str("\t\tvar device = this;\n");
        if is_char_stream(data) {
            code.push_str(&format!(
                "\n\t\tif (typeof {s} === 'string') {{\n\t\t\t{s} = {s}.split('');\n\t\t}}\n\n",
                s = stream
            ));
        }
        code.push_str(&format!(
            "\t\tvar {s}Length = {s}.length;\n\t\tvar {s}ChunkOffset = 0;\n",
            s = stream
        ));
        if has_result {
            code.push_str("\t\tvar result = undefined;\n");
        }
        code.push_str(&format!(
            "\n\t\tif ({s}Length > {m}) {{\n\t\t\tif (errorCallback !== undefined) {{\n\t\t\t\terrorCallback(IPConnection.ERROR_INVALID_PARAMETER);\n\t\t\t}}\n\n\t\t\treturn;\n\t\t}}\n\n",
            s = stream,
            m = view.max_length()
        ));

        let args: Vec<String> = packet
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.direction == Direction::In)
            .map(|(i, e)| match view.role(i) {
                Some(StreamRole::ChunkData) => format!("{}ChunkData", stream),
                Some(StreamRole::ChunkOffset) => format!("{}ChunkOffset", stream),
                Some(StreamRole::Length) => format!("{}Length", stream),
                None => self.param(&e.name),
            })
            .collect();

        code.push_str("\t\tthis.lockStream(function (unlock) {\n");
        code.push_str(self.fail_function());
        code.push_str("\t\t\tfunction sendChunk() {\n");
        code.push_str(&format!(
            "\t\t\t\tvar {s}ChunkData = {s}.slice({s}ChunkOffset, {s}ChunkOffset + {n});\n\n\t\t\t\twhile ({s}ChunkData.length < {n}) {{\n\t\t\t\t\t{s}ChunkData.push({p});\n\t\t\t\t}}\n\n",
            s = stream,
            n = chunk,
            p = pad_literal(pad_kind(data.ty))
        ));

        let mut done = String::from("\t\t\t\t\tunlock();\n\n\t\t\t\t\tif (returnCallback !== undefined) {\n");
        done.push_str(if has_result {
            "\t\t\t\t\t\treturnCallback(result);\n"
        } else {
            "\t\t\t\t\t\treturnCallback();\n"
        });
        done.push_str("\t\t\t\t\t}\n");

        code.push_str(&format!(
            "\t\t\t\tdevice.{}({}, function (chunkResult) {{\n",
            self.function(&packet.name),
            args.join(", ")
        ));
        if has_result {
            code.push_str("\t\t\t\t\tif (result !== undefined && JSON.stringify(chunkResult) !== JSON.stringify(result)) {\n\t\t\t\t\t\tfail(IPConnection.ERROR_STREAM_OUT_OF_SYNC);\n\t\t\t\t\t\treturn;\n\t\t\t\t\t}\n\n\t\t\t\t\tresult = chunkResult;\n");
        }
        if view.single_chunk {
            code.push_str(&done);
        } else {
            code.push_str(&format!(
                "\t\t\t\t\t{s}ChunkOffset += {n};\n\n\t\t\t\t\tif ({s}ChunkOffset < {s}Length) {{\n\t\t\t\t\t\tsendChunk();\n\t\t\t\t\t\treturn;\n\t\t\t\t\t}}\n\n",
                s = stream,
                n = chunk
            ));
            code.push_str(&done);
        }
        code.push_str("\t\t\t\t}, fail);\n\t\t\t}\n\n\t\t\tsendChunk();\n\t\t});\n\t};\n");

        Ok(code)
    }

    fn stream_out_method(
        &self,
        packet: &Packet,
        view: &HighLevelView,
    ) -> Result<String, EmitError> {
        let stream = self.param(&view.stream);
        let chunk = view.chunk_cardinality;
        let params: Vec<String> = packet.inputs().map(|e| self.param(&e.name)).collect();
        let wrapped = packet.output_count() >= 2;
        let access = |element: &Element| {
            if wrapped {
                format!("ret.{}", self.param(&element.name))
            } else {
                "ret".to_string()
            }
        };
        let length = match view.length_element(packet) {
            Some(element) => access(element),
            None => view.fixed_length().unwrap_or(chunk).to_string(),
        };
        let data = access(view.chunk_data_element(packet));

        let fields = view.fields(packet, Direction::Out);
        let values: Vec<(String, String)> = fields
            .iter()
            .map(|field| match field {
                Field::Stream => (stream.clone(), format!("{}Data", stream)),
                Field::Element(element) => (self.param(&element.name), access(element)),
            })
            .collect();
        let result = match values.as_slice() {
            [(_, value)] => value.clone(),
            _ => self.object_literal(&values),
        };

        let mut call_args = params.clone();
        let mut code = self.signature(&view.name, &params);
        code.push_str(&self.doc_comment(packet));
        code.push_str("\t\tvar device = this;\n");

        if view.single_chunk {
            call_args.push("function (ret) {".to_string());
            code.push_str(&format!(
                "\n\t\tthis.{}({}\n",
                self.function(&packet.name),
                call_args.join(", ")
            ));
            code.push_str(&format!(
                "\t\t\tvar {s}Length = Math.min({l}, {n});\n\t\t\tvar {s}Data = {d}.slice(0, {s}Length);\n\n\t\t\tif (returnCallback !== undefined) {{\n\t\t\t\treturnCallback({r});\n\t\t\t}}\n\t\t}}, errorCallback);\n\t}};\n",
                s = stream,
                l = length,
                n = chunk,
                d = data,
                r = result
            ));
            return Ok(code);
        }

        let offset = view
            .chunk_offset_element(packet)
            .map(access)
            .unwrap_or_else(|| "0".to_string());
        call_args.push("handler".to_string());
        call_args.push("fail".to_string());

        code.push_str(&format!(
            "\t\tvar {s}Length = 0;\n\t\tvar {s}Data = [];\n\n",
            s = stream
        ));
        code.push_str("\t\tthis.lockStream(function (unlock) {\n");
        code.push_str(self.fail_function());
        code.push_str(&format!(
            "\t\t\tfunction readChunk(handler) {{\n\t\t\t\tdevice.{}({});\n\t\t\t}}\n\n",
            self.function(&packet.name),
            call_args.join(", ")
        ));
        code.push_str(&format!(
            "\t\t\tfunction discard(ret) {{ // discard remaining stream to bring it back in-sync\n\t\t\t\tif ({o} + {n} < {s}Length) {{\n\t\t\t\t\treadChunk(discard);\n\t\t\t\t\treturn;\n\t\t\t\t}}\n\n\t\t\t\tfail(IPConnection.ERROR_STREAM_OUT_OF_SYNC);\n\t\t\t}}\n\n",
            o = offset,
            n = chunk,
            s = stream
        ));
        code.push_str(&format!(
            "\t\t\tfunction collect(ret) {{\n\t\t\t\tif ({o} !== {s}Data.length) {{\n\t\t\t\t\t{s}Data = [];\n\t\t\t\t\tdiscard(ret);\n\t\t\t\t\treturn;\n\t\t\t\t}}\n\n",
            o = offset,
            s = stream
        ));
        code.push_str(&format!(
            "\t\t\t\t{s}Data = {s}Data.concat({d}.slice(0, Math.min({n}, {s}Length - {s}Data.length)));\n\n\t\t\t\tif ({s}Data.length < {s}Length) {{\n\t\t\t\t\treadChunk(collect);\n\t\t\t\t\treturn;\n\t\t\t\t}}\n\n",
            s = stream,
            d = data,
            n = chunk
        ));
        code.push_str(&format!(
            "\t\t\t\tunlock();\n\n\t\t\t\tif (returnCallback !== undefined) {{\n\t\t\t\t\treturnCallback({});\n\t\t\t\t}}\n\t\t\t}}\n\n",
            result
        ));
        code.push_str(&format!(
            "\t\t\treadChunk(function (ret) {{\n\t\t\t\t{s}Length = {l};\n\t\t\t\tcollect(ret);\n\t\t\t}});\n\t\t}});\n\t}};\n",
            s = stream,
            l = length
        ));

        Ok(code)
    }

    fn register_callback(&self) -> String {
        if self.device.callbacks().next().is_none() {
            return String::new();
        }
        let mut code = String::from("\tthis.on = function (callbackID, function_, errorCallback) {\n");
        code.push_str("\t\t/*\n\t\tRegisters the given *function_* with the given *callbackID*.\n\t\t*/\n");
        code.push_str("\t\tif (function_ === undefined) {\n\t\t\tdelete this.registeredCallbacks[callbackID];\n\t\t} else {\n\t\t\tthis.registeredCallbacks[callbackID] = function_;\n\t\t}\n\t};\n");
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        context, example_device, gps_v2, lines_starting_with, resolved, serial_link,
    };

    fn render(device: Arc<Device>) -> String {
        JavaScriptGenerator::new()
            .render_device(&resolved(device), &context())
            .unwrap()
    }

    #[test]
    fn names_follow_javascript_conventions() {
        let generator = JavaScriptGenerator::new();
        assert_eq!(generator.file_name(&gps_v2()), "BrickletGPSV2.js");
        assert_eq!(generator.translate_name(&Name::new("Get Coordinates"), NameKind::Function), "getCoordinates");
        assert_eq!(generator.translate_name(&Name::new("Delete"), NameKind::Parameter), "delete_");
        assert_eq!(generator.map_type(ElementType::UInt16, 30).unwrap(), "number[]");
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render(serial_link()), render(serial_link()));
    }

    #[test]
    fn example_device_returns_an_object() {
        let code = render(example_device());
        assert!(code.contains("BrickletExample.FUNCTION_GET_VALUE = 1;\n"));
        assert!(code.contains("BrickletExample.CALLBACK_TICK = 2;\n"));
        assert!(code.contains("\tthis.getValue = function(channel, returnCallback, errorCallback) {\n"));
        assert!(code.contains("[channel], 'I', 13, 'i c', function (value, unit) {"));
        assert!(code.contains("returnCallback({value: value, unit: unit});"));
        assert!(code.contains("this.responseExpected[BrickletExample.FUNCTION_GET_VALUE] = Device.RESPONSE_EXPECTED_ALWAYS_TRUE;"));
        assert!(code.contains("this.responseExpected[BrickletExample.CALLBACK_TICK] = Device.RESPONSE_EXPECTED_ALWAYS_FALSE;"));
        assert!(code.contains("this.callbackFormats[BrickletExample.CALLBACK_TICK] = [8, ''];"));
        assert!(code.contains("\tthis.on = function (callbackID, function_, errorCallback) {\n"));
        assert!(code.trim_end().ends_with("module.exports = BrickletExample;"));
    }

    #[test]
    fn scalar_and_unit_returns_pass_the_callback_through() {
        let code = render(gps_v2());
        assert!(code.contains("this.ipcon.sendRequest(this, BrickletGPSV2.FUNCTION_GET_FIX_LED_CONFIG, [], '', 9, 'B', returnCallback, errorCallback);"));
        assert!(code.contains("this.ipcon.sendRequest(this, BrickletGPSV2.FUNCTION_RESTART, [restartType], 'B', 8, '', returnCallback, errorCallback);"));
    }

    #[test]
    fn constants_are_rendered_once() {
        let code = render(serial_link());
        assert_eq!(lines_starting_with(&code, "BrickletSerialLink.PARITY_NONE = 'n';").len(), 1);
        assert_eq!(lines_starting_with(&code, "BrickletSerialLink.STOPBITS_1 = 1;").len(), 1);
        let gps = render(gps_v2());
        assert_eq!(lines_starting_with(&gps, "BrickletGPSV2.FIX_2D_FIX = 2;").len(), 1);
    }

    #[test]
    fn streams() {
        let code = render(serial_link());
        assert!(code.contains("\tthis.write = function(message, returnCallback, errorCallback) {\n"));
        assert!(code.contains("message = message.split('');"));
        assert!(code.contains("messageChunkData.push('\\0');"));
        assert!(code.contains("fail(IPConnection.ERROR_STREAM_OUT_OF_SYNC);"));
        assert!(code.contains("\tthis.read = function(length, returnCallback, errorCallback) {\n"));
        assert!(code.contains("device.readLowLevel(length, handler, fail);"));
        assert!(code.contains("['stream_length', 'stream_chunk_offset', 'stream_chunk_data']"));
        assert!(code.contains("var lineFlagsLength = Math.min(ret.lineFlagsLength, 16);"));
        assert!(code.contains("/* #### __DEVICE_IS_NOT_RELEASED__ #### */"));
    }

    #[test]
    fn index_lists_released_devices() {
        let artifacts = JavaScriptGenerator::new()
            .finish(&[gps_v2(), example_device()], &context())
            .unwrap();
        assert_eq!(artifacts.len(), 1);
        let index = &artifacts[0].contents;
        let gps = index.find("BrickletGPSV2: require('./BrickletGPSV2')").unwrap();
        let example = index.find("BrickletExample: require('./BrickletExample')").unwrap();
        assert!(gps < example);
    }
}
