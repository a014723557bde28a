//! Python bindings generator
//!
//! Emits one module per device on top of the `ip_connection` runtime: a
//! `Device` subclass with ID and constant attributes, one method per
//! function, high-level stream methods and `namedtuple` result types.
//! Also renders example programs and the `device_factory` module.

use std::sync::Arc;

use devbind_model::{
    ConstantValue, Device, Direction, Element, ElementType, Example, ExampleStep,
    ExampleStepKind, Name, Packet,
};

use super::{
    aggregate_name, format_list, packet_size, pad_kind, quote_single, strip_trailing_whitespace,
    Artifact, Generator, Language, PadValue, RenderContext,
};
use crate::doc::{self, Reference, ReferenceKind};
use crate::error::EmitError;
use crate::naming::{self, Escape, NameKind, PYTHON_KEYWORDS};
use crate::provenance::CommentStyle;
use crate::resolver::{Field, HighLevelView, ResolvedDevice, StreamRole};

const LANGUAGE: &str = "Python";

const IMPORTS: &str = "
from collections import namedtuple

try:
    from .ip_connection import Device, IPConnection, Error, create_char, create_char_list, create_string
except (ValueError, ImportError):
    from ip_connection import Device, IPConnection, Error, create_char, create_char_list, create_string
";

/// Generator for Python device modules
pub struct PythonGenerator;

impl PythonGenerator {
    pub fn new() -> Self {
        Self
    }

    fn module_name(&self, device: &Device) -> String {
        self.translate_name(&device.full_name(), NameKind::Module)
    }

    fn class_name(&self, device: &Device) -> String {
        self.translate_name(&device.full_name(), NameKind::Type)
    }
}

impl Default for PythonGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for PythonGenerator {
    fn language(&self) -> Language {
        Language::Python
    }

    fn file_name(&self, device: &Device) -> String {
        format!("{}.py", self.module_name(device))
    }

    fn comment_style(&self) -> CommentStyle {
        CommentStyle::Hash
    }

    fn translate_name(&self, name: &Name, kind: NameKind) -> String {
        match kind {
            NameKind::Type => name.camel(),
            NameKind::Function | NameKind::Module => name.snake(),
            NameKind::Parameter | NameKind::Field => naming::escape(
                naming::guard_leading_digit(name.snake()),
                PYTHON_KEYWORDS,
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
            | ElementType::Int64
            | ElementType::UInt64 => "int",
            ElementType::Float => "float",
            ElementType::Bool => "bool",
            ElementType::Char | ElementType::String => "str",
            other => {
                return Err(EmitError::UnsupportedType {
                    language: LANGUAGE,
                    ty: other.to_string(),
                })
            }
        };

        if cardinality > 1 && ty != ElementType::String {
            Ok(format!("[{}, ...]", base))
        } else {
            Ok(base.to_string())
        }
    }

    fn render_device(
        &self,
        resolved: &ResolvedDevice,
        ctx: &RenderContext,
    ) -> Result<String, EmitError> {
        let writer = DeviceWriter::new(self, resolved, ctx);
        let mut code = String::new();

        code.push_str("# -*- coding: utf-8 -*-\n");
        code.push_str(&self.header(ctx));
        code.push_str(&self.released_marker(&resolved.device));
        code.push_str(IMPORTS);
        code.push_str(&writer.namedtuples()?);
        code.push_str(&writer.class_header());
        code.push_str(&writer.init()?);
        code.push_str(&writer.methods()?);
        code.push_str(&writer.register_callback());
        code.push_str(&format!(
            "\n{} = {} # for backward compatibility\n",
            resolved.device.name.camel(),
            writer.class
        ));

        Ok(strip_trailing_whitespace(&code))
    }

    fn render_examples(
        &self,
        resolved: &ResolvedDevice,
        ctx: &RenderContext,
    ) -> Result<Vec<Artifact>, EmitError> {
        let writer = DeviceWriter::new(self, resolved, ctx);
        resolved
            .device
            .examples
            .iter()
            .map(|example| {
                Ok(Artifact {
                    file_name: format!(
                        "examples/{}/example_{}.py",
                        self.module_name(&resolved.device),
                        example.name.snake()
                    ),
                    contents: strip_trailing_whitespace(&writer.example(example)?),
                })
            })
            .collect()
    }

    fn finish(
        &self,
        released: &[Arc<Device>],
        ctx: &RenderContext,
    ) -> Result<Vec<Artifact>, EmitError> {
        let mut entries: Vec<(u16, String, String)> = released
            .iter()
            .map(|d| (d.identifier, self.module_name(d), self.class_name(d)))
            .collect();
        entries.sort();

        let mut code = String::new();
        code.push_str("# -*- coding: utf-8 -*-\n");
        code.push_str(&self.header(ctx));
        code.push('\n');
        for (_, module, class) in &entries {
            code.push_str(&format!(
                "try:\n    from .{m} import {c}\nexcept (ValueError, ImportError):\n    from {m} import {c}\n",
                m = module,
                c = class
            ));
        }
        code.push_str("\nDEVICE_CLASSES = {\n");
        for (identifier, _, class) in &entries {
            code.push_str(&format!("    {}: {},\n", identifier, class));
        }
        code.push_str("}\n\n");
        code.push_str(
            "def get_device_class(device_identifier):\n    return DEVICE_CLASSES[device_identifier]\n\n\
             def get_device_display_name(device_identifier):\n    try:\n        return get_device_class(device_identifier).DEVICE_DISPLAY_NAME\n    except KeyError:\n        return 'Unknown Device [{0}]'.format(device_identifier)\n\n\
             def create_device(device_identifier, uid, ipcon):\n    return get_device_class(device_identifier)(uid, ipcon)\n",
        );

        Ok(vec![Artifact {
            file_name: "device_factory.py".to_string(),
            contents: strip_trailing_whitespace(&code),
        }])
    }
}

/// Renders the pieces of one device's module.
struct DeviceWriter<'a> {
    generator: &'a PythonGenerator,
    resolved: &'a ResolvedDevice,
    device: &'a Device,
    ctx: &'a RenderContext,
    class: String,
}

impl<'a> DeviceWriter<'a> {
    fn new(
        generator: &'a PythonGenerator,
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

    fn field_name(&self, field: &Field<'_>, view: &HighLevelView) -> String {
        match field {
            Field::Stream => self.param(&view.stream),
            Field::Element(element) => self.param(&element.name),
        }
    }

    fn namedtuple(&self, name: &Name, fields: &[String]) -> String {
        let quoted: Vec<String> = fields.iter().map(|f| format!("'{}'", f)).collect();
        let type_name = aggregate_name(name).camel();
        format!(
            "{} = namedtuple('{}', [{}])\n",
            type_name,
            type_name,
            quoted.join(", ")
        )
    }

    fn namedtuples(&self) -> Result<String, EmitError> {
        let mut code = String::new();

        for packet in self.device.functions() {
            if packet.output_count() < 2 {
                continue;
            }
            let fields: Vec<String> = packet.outputs().map(|e| self.param(&e.name)).collect();
            code.push_str(&self.namedtuple(&packet.name, &fields));
        }

        for (packet, view) in self.resolved.stream_out_functions() {
            let fields = view.fields(packet, Direction::Out);
            if fields.len() < 2 {
                continue;
            }
            let names: Vec<String> = fields.iter().map(|f| self.field_name(f, view)).collect();
            code.push_str(&self.namedtuple(&view.name, &names));
        }

        if !code.is_empty() {
            code.insert(0, '\n');
        }
        Ok(code)
    }

    fn class_header(&self) -> String {
        let mut code = format!("\nclass {}(Device):\n", self.class);
        code.push_str(&format!(
            "    r\"\"\"\n    {}\n    \"\"\"\n\n",
            self.device.description.get(&self.ctx.locale)
        ));

        code.push_str(&format!(
            "    DEVICE_IDENTIFIER = {}\n    DEVICE_DISPLAY_NAME = {}\n    DEVICE_URL_PART = '{}' # internal\n\n",
            self.device.identifier,
            quote_single(&self.device.long_display_name()),
            self.device.name.snake()
        ));

        let mut ids = String::new();
        for packet in self.device.callbacks() {
            ids.push_str(&format!(
                "    CALLBACK_{} = {}\n",
                self.constant(&packet.name),
                packet.function_id
            ));
        }
        for (packet, view) in self.resolved.stream_out_callbacks() {
            if let Some(id) = view.callback_id {
                ids.push_str(&format!("    CALLBACK_{} = {}\n", self.constant(&packet.high_level_name()), id));
            }
        }
        if !ids.is_empty() {
            ids.push('\n');
        }
        code.push_str(&ids);

        for packet in self.device.functions() {
            code.push_str(&format!(
                "    FUNCTION_{} = {}\n",
                self.constant(&packet.name),
                packet.function_id
            ));
        }
        code.push('\n');

        for group in &self.device.constant_groups {
            for constant in &group.constants {
                code.push_str(&format!(
                    "    {} = {}\n",
                    naming::guard_leading_digit(naming::constant_name(&group.name, &constant.name)),
                    constant_literal(constant.value)
                ));
            }
        }
        if !self.device.constant_groups.is_empty() {
            code.push('\n');
        }

        code
    }

    fn init(&self) -> Result<String, EmitError> {
        let class = &self.class;
        let mut code = String::new();
        code.push_str("    def __init__(self, uid, ipcon):\n");
        code.push_str(
            "        r\"\"\"\n        Creates an object with the unique device ID *uid* and adds it to\n        the IP Connection *ipcon*.\n        \"\"\"\n",
        );
        code.push_str(&format!(
            "        Device.__init__(self, uid, ipcon, {c}.DEVICE_IDENTIFIER, {c}.DEVICE_DISPLAY_NAME)\n\n",
            c = class
        ));
        let api = &self.device.api_version;
        code.push_str(&format!(
            "        self.api_version = ({}, {}, {})\n\n",
            api.major, api.minor, api.patch
        ));

        for packet in &self.device.packets {
            let prefix = if packet.is_callback() { "CALLBACK" } else { "FUNCTION" };
            code.push_str(&format!(
                "        self.response_expected[{c}.{p}_{n}] = {c}.RESPONSE_EXPECTED_{r}\n",
                c = class,
                p = prefix,
                n = self.constant(&packet.name),
                r = self.generator.classify_response(packet).upper_name()
            ));
        }
        code.push('\n');

        let mut formats = String::new();
        for packet in self.device.callbacks() {
            formats.push_str(&format!(
                "        self.callback_formats[{}.CALLBACK_{}] = ({}, '{}')\n",
                class,
                self.constant(&packet.name),
                packet_size(packet, Direction::Out),
                format_list(LANGUAGE, packet, Direction::Out)?
            ));
        }
        if !formats.is_empty() {
            formats.push('\n');
        }
        code.push_str(&formats);

        let mut high_level = String::new();
        for (packet, view) in self.resolved.stream_out_callbacks() {
            let roles: Vec<String> = packet
                .elements
                .iter()
                .enumerate()
                .filter(|(_, e)| e.direction == Direction::Out)
                .map(|(i, _)| match view.role(i) {
                    Some(role) => format!("'{}'", role.tag()),
                    None => "None".to_string(),
                })
                .collect();
            high_level.push_str(&format!(
                "        self.high_level_callbacks[{}.CALLBACK_{}] = [{}, {{'fixed_length': {}, 'single_chunk': {}}}, None]\n",
                class,
                self.constant(&packet.high_level_name()),
                python_tuple(&roles),
                view.fixed_length().map_or("None".to_string(), |n| n.to_string()),
                python_bool(view.single_chunk)
            ));
        }
        if !high_level.is_empty() {
            high_level.push('\n');
        }
        code.push_str(&high_level);

        code.push_str("        ipcon.add_device(self)\n");
        Ok(code)
    }

    fn docstring(&self, packet: &Packet) -> String {
        if !self.ctx.generate_docs {
            return String::new();
        }
        let text = doc::packet_doc(
            self.device,
            packet,
            &self.ctx.locale,
            |r| self.reference(r),
            |group, constant| {
                naming::guard_leading_digit(naming::constant_name(&group.name, &constant.name))
            },
        );
        if text.is_empty() {
            return String::new();
        }
        format!(
            "        r\"\"\"\n{}        \"\"\"\n",
            doc::prefix_lines(&text, "        ")
        )
    }

    fn reference(&self, reference: &Reference) -> String {
        match reference.kind {
            ReferenceKind::Function => format!(":func:`{}`", self.function(&reference.name)),
            ReferenceKind::Callback => format!(":cb:`CALLBACK_{}`", self.constant(&reference.name)),
        }
    }

    fn methods(&self) -> Result<String, EmitError> {
        let mut code = String::new();

        for packet in self.device.functions() {
            code.push('\n');
            code.push_str(&self.method(packet)?);
        }
        for (packet, view) in self.resolved.stream_in_functions() {
            code.push('\n');
            code.push_str(&self.stream_in_method(packet, view)?);
        }
        for (packet, view) in self.resolved.stream_out_functions() {
            code.push('\n');
            code.push_str(&self.stream_out_method(packet, view)?);
        }

        Ok(code)
    }

    fn signature(&self, name: &Name, params: &[String]) -> String {
        let mut args = String::from("self");
        for param in params {
            args.push_str(", ");
            args.push_str(param);
        }
        format!("    def {}({}):\n", self.function(name), args)
    }

    fn method(&self, packet: &Packet) -> Result<String, EmitError> {
        let params: Vec<String> = packet.inputs().map(|e| self.param(&e.name)).collect();
        let mut code = self.signature(&packet.name, &params);
        code.push_str(&self.docstring(packet));

        let mut conversions = String::new();
        for element in packet.inputs() {
            let name = self.param(&element.name);
            conversions.push_str(&format!("        {} = {}\n", name, conversion(element, &name)?));
        }
        if !conversions.is_empty() {
            conversions.push('\n');
        }
        code.push_str(&conversions);

        let request = python_tuple(&params);
        let call = format!(
            "self.ipcon.send_request(self, {}.FUNCTION_{}, {}, '{}', {}, '{}')",
            self.class,
            self.constant(&packet.name),
            request,
            format_list(LANGUAGE, packet, Direction::In)?,
            packet_size(packet, Direction::Out),
            format_list(LANGUAGE, packet, Direction::Out)?
        );

        match packet.output_count() {
            0 => code.push_str(&format!("        {}\n", call)),
            1 => code.push_str(&format!("        return {}\n", call)),
            _ => code.push_str(&format!(
                "        return {}(*{})\n",
                aggregate_name(&packet.name).camel(),
                call
            )),
        }

        Ok(code)
    }

    fn stream_in_method(&self, packet: &Packet, view: &HighLevelView) -> Result<String, EmitError> {
        let stream = self.param(&view.stream);
        let chunk = view.chunk_cardinality;
        let data = view.chunk_data_element(packet);
        let params: Vec<String> = view
            .fields(packet, Direction::In)
            .iter()
            .map(|f| self.field_name(f, view))
            .collect();

        let mut code = self.signature(&view.name, &params);
        code.push_str(&self.docstring(packet));

        for element in view.passthrough(packet, Direction::In) {
            let name = self.param(&element.name);
            code.push_str(&format!("        {} = {}\n", name, conversion(element, &name)?));
        }
        code.push_str(&format!(
            "        {s} = {}\n\n",
            list_conversion(data.ty, &stream)?,
            s = stream
        ));

        let max = view.max_length();
        code.push_str(&format!(
            "        if len({s}) > {m}:\n            raise Error(Error.INVALID_PARAMETER, '{} can be at most {m} items long')\n\n",
            view.stream,
            s = stream,
            m = max
        ));

        let has_result = packet.output_count() > 0;
        code.push_str(&format!("        {s}_length = len({s})\n", s = stream));
        code.push_str(&format!("        {}_chunk_offset = 0\n", stream));
        if has_result {
            code.push_str("        result = None\n");
        }
        code.push('\n');

        let args: Vec<String> = packet
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.direction == Direction::In)
            .map(|(i, e)| match view.role(i) {
                Some(StreamRole::ChunkData) => format!("{}_chunk_data", stream),
                Some(StreamRole::ChunkOffset) => format!("{}_chunk_offset", stream),
                Some(StreamRole::Length) => format!("{}_length", stream),
                None => self.param(&e.name),
            })
            .collect();
        let low_level = format!("self.{}({})", self.function(&packet.name), args.join(", "));

        code.push_str("        with self.stream_lock:\n");
        code.push_str("            while True:\n");
        code.push_str(&format!(
            "                {s}_chunk_data = {s}[{s}_chunk_offset:{s}_chunk_offset + {n}]\n\n",
            s = stream,
            n = chunk
        ));
        code.push_str(&format!(
            "                if len({s}_chunk_data) < {n}:\n                    {s}_chunk_data += [{p}] * ({n} - len({s}_chunk_data))\n\n",
            s = stream,
            n = chunk,
            p = pad_literal(pad_kind(data.ty))
        ));

        if has_result {
            code.push_str(&format!("                chunk_result = {}\n\n", low_level));
            code.push_str(&format!(
                "                if result is not None and chunk_result != result:\n                    raise Error(Error.STREAM_OUT_OF_SYNC, '{} returned different results for different chunks')\n\n",
                view.name
            ));
            code.push_str("                result = chunk_result\n");
        } else {
            code.push_str(&format!("                {}\n", low_level));
        }

        if view.single_chunk {
            code.push_str("                break\n");
        } else {
            code.push_str(&format!(
                "                {s}_chunk_offset += {n}\n\n                if {s}_chunk_offset >= {s}_length:\n                    break\n",
                s = stream,
                n = chunk
            ));
        }

        if has_result {
            code.push_str("\n        return result\n");
        }

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

        let mut code = self.signature(&view.name, &params);
        code.push_str(&self.docstring(packet));

        for element in packet.inputs() {
            let name = self.param(&element.name);
            code.push_str(&format!("        {} = {}\n", name, conversion(element, &name)?));
        }
        if !params.is_empty() {
            code.push('\n');
        }

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
        let low_level = format!("self.{}({})", self.function(&packet.name), params.join(", "));
        let data = access(view.chunk_data_element(packet));

        if view.single_chunk {
            code.push_str(&format!("        ret = {}\n", low_level));
            code.push_str(&format!("        {}_length = {}\n", stream, length));
            code.push_str(&format!("        {}_data = list({})\n", stream, data));
        } else {
            let offset = view
                .chunk_offset_element(packet)
                .map(access)
                .unwrap_or_else(|| "0".to_string());

            code.push_str("        with self.stream_lock:\n");
            code.push_str(&format!("            ret = {}\n", low_level));
            code.push_str(&format!("            {}_length = {}\n", stream, length));
            code.push_str(&format!("            {}_out_of_sync = {} != 0\n", stream, offset));
            code.push_str(&format!("            {}_data = list({})\n\n", stream, data));
            code.push_str(&format!(
                "            while not {s}_out_of_sync and len({s}_data) < {s}_length:\n",
                s = stream
            ));
            code.push_str(&format!("                ret = {}\n", low_level));
            code.push_str(&format!(
                "                {s}_out_of_sync = {} != len({s}_data)\n",
                offset,
                s = stream
            ));
            code.push_str(&format!("                {}_data += {}\n\n", stream, data));
            code.push_str(&format!(
                "            if {}_out_of_sync: # discard remaining stream to bring it back in-sync\n",
                stream
            ));
            code.push_str(&format!(
                "                while {} + {} < {}_length:\n",
                offset, chunk, stream
            ));
            code.push_str(&format!("                    ret = {}\n\n", low_level));
            code.push_str(&format!(
                "                raise Error(Error.STREAM_OUT_OF_SYNC, '{} stream is out-of-sync')\n",
                view.stream
            ));
        }
        code.push('\n');

        let fields = view.fields(packet, Direction::Out);
        let values: Vec<String> = fields
            .iter()
            .map(|field| match field {
                Field::Stream => format!("{s}_data[:{s}_length]", s = stream),
                Field::Element(element) => access(element),
            })
            .collect();
        if values.len() == 1 {
            code.push_str(&format!("        return {}\n", values[0]));
        } else {
            code.push_str(&format!(
                "        return {}({})\n",
                aggregate_name(&view.name).camel(),
                values.join(", ")
            ));
        }

        Ok(code)
    }

    fn register_callback(&self) -> String {
        if self.device.callbacks().next().is_none() {
            return String::new();
        }
        let mut code = String::from("\n    def register_callback(self, callback_id, function):\n");
        code.push_str("        r\"\"\"\n        Registers the given *function* with the given *callback_id*.\n        \"\"\"\n");
        code.push_str(
            "        if function is None:\n            self.registered_callbacks.pop(callback_id, None)\n        else:\n            self.registered_callbacks[callback_id] = function\n",
        );
        code
    }

    /// Callable name and visible outputs of a packet, preferring its
    /// high-level form.
    fn visible_outputs(&self, packet: &'a Packet) -> (Name, Vec<String>) {
        match self.resolved.high_level(packet) {
            Some(view) => (
                view.name.clone(),
                view.fields(packet, Direction::Out)
                    .iter()
                    .map(|f| self.field_name(f, view))
                    .collect(),
            ),
            None => (
                packet.name.clone(),
                packet.outputs().map(|e| self.param(&e.name)).collect(),
            ),
        }
    }

    fn lookup(&self, name: &Name) -> Result<&'a Packet, EmitError> {
        self.device
            .packet(name)
            .ok_or_else(|| EmitError::UnsupportedConstruct {
                language: LANGUAGE,
                construct: format!("example step for unknown packet '{}'", name),
            })
    }

    fn example(&self, example: &Example) -> Result<String, EmitError> {
        let var = self.device.name.snake();
        let mut code = String::from("#!/usr/bin/env python\n# -*- coding: utf-8 -*-\n\n");
        code.push_str(&format!(
            "HOST = \"localhost\"\nPORT = 4223\nUID = \"XYZ\" # Change XYZ to the UID of your {}\n\n",
            self.device.long_display_name()
        ));
        code.push_str(&format!(
            "from ip_connection import IPConnection\nfrom {} import {}\n",
            self.generator.module_name(self.device),
            self.class
        ));

        for step in &example.steps {
            if step.kind != ExampleStepKind::Callback {
                continue;
            }
            let packet = self.lookup(&step.packet)?;
            let (name, outputs) = self.visible_outputs(packet);
            code.push_str(&format!(
                "\n# Callback function for {} callback\ndef cb_{}({}):\n",
                name.space().to_lowercase(),
                self.function(&name),
                outputs.join(", ")
            ));
            code.push_str(&print_lines(&name, &outputs, "    "));
        }

        code.push_str("\nif __name__ == \"__main__\":\n");
        code.push_str("    ipcon = IPConnection() # Create IP connection\n");
        code.push_str(&format!("    {} = {}(UID, ipcon) # Create device object\n\n", var, self.class));
        code.push_str("    ipcon.connect(HOST, PORT) # Connect to brickd\n");
        code.push_str("    # Don't use device before ipcon is connected\n");

        for step in &example.steps {
            code.push('\n');
            code.push_str(&self.example_step(&var, step)?);
        }

        code.push_str("\n    input(\"Press key to exit\\n\") # Use raw_input() in Python 2\n");
        code.push_str("    ipcon.disconnect()\n");
        Ok(code)
    }

    fn example_step(&self, var: &str, step: &ExampleStep) -> Result<String, EmitError> {
        let arguments = step
            .arguments
            .iter()
            .map(python_literal)
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        match step.kind {
            ExampleStepKind::Getter => {
                let packet = self.lookup(&step.packet)?;
                let (name, outputs) = self.visible_outputs(packet);
                let subject = aggregate_name(&name);
                let call = format!("{}.{}({})", var, self.function(&name), arguments);
                let mut code = format!("    # Get current {}\n", subject.space().to_lowercase());
                if outputs.is_empty() {
                    code.push_str(&format!("    {}\n", call));
                } else {
                    code.push_str(&format!("    {} = {}\n\n", outputs.join(", "), call));
                    code.push_str(&print_lines(&subject, &outputs, "    "));
                }
                Ok(code)
            }
            ExampleStepKind::Setter => {
                let packet = self.lookup(&step.packet)?;
                let name = self
                    .resolved
                    .high_level(packet)
                    .map_or_else(|| packet.name.clone(), |v| v.name.clone());
                Ok(format!("    {}.{}({})\n", var, self.function(&name), arguments))
            }
            ExampleStepKind::Callback => {
                let packet = self.lookup(&step.packet)?;
                let name = packet.high_level_name();
                let handler = self.function(&self.visible_outputs(packet).0);
                Ok(format!(
                    "    # Register {} callback to function cb_{}\n    {}.register_callback({}.CALLBACK_{}, cb_{})\n",
                    name.space().to_lowercase(),
                    handler,
                    var,
                    var,
                    self.constant(&name),
                    handler
                ))
            }
            ExampleStepKind::CallbackPeriod => {
                let setter = Name::new(format!("Set {} Callback Period", step.packet));
                let period = step.period_ms.unwrap_or(1000);
                let args = if arguments.is_empty() { period.to_string() } else { arguments };
                Ok(format!(
                    "    # Set period for {} callback to {}s ({}ms)\n    {}.{}({})\n",
                    step.packet.space().to_lowercase(),
                    format_seconds(period),
                    period,
                    var,
                    self.function(&setter),
                    args
                ))
            }
        }
    }
}

fn print_lines(subject: &Name, values: &[String], indent: &str) -> String {
    if values.is_empty() {
        return format!("{}print(\"{}\")\n", indent, subject.space());
    }
    let mut code = String::new();
    for value in values {
        let label = Name::new(value.replace('_', " "));
        code.push_str(&format!(
            "{}print(\"{}: \" + str({}))\n",
            indent,
            label.words().map(capitalize).collect::<Vec<_>>().join(" "),
            value
        ));
    }
    if values.len() > 1 {
        code.push_str(&format!("{}print(\"\")\n", indent));
    }
    code
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_seconds(ms: u32) -> String {
    if ms % 1000 == 0 {
        (ms / 1000).to_string()
    } else {
        format!("{}", f64::from(ms) / 1000.0)
    }
}

/// Input conversion applied before packing.
fn conversion(element: &Element, name: &str) -> Result<String, EmitError> {
    if element.is_array() {
        return list_conversion(element.ty, name);
    }
    Ok(match element.ty {
        ElementType::Float => format!("float({})", name),
        ElementType::Bool => format!("bool({})", name),
        ElementType::Char => format!("create_char({})", name),
        ElementType::String => format!("create_string({})", name),
        ty if ty.is_integer() => format!("int({})", name),
        other => {
            return Err(EmitError::UnsupportedType {
                language: LANGUAGE,
                ty: other.to_string(),
            })
        }
    })
}

fn list_conversion(ty: ElementType, name: &str) -> Result<String, EmitError> {
    Ok(match ty {
        ElementType::Float => format!("list(map(float, {}))", name),
        ElementType::Bool => format!("list(map(bool, {}))", name),
        ElementType::Char => format!("create_char_list({})", name),
        ty if ty.is_integer() => format!("list(map(int, {}))", name),
        other => {
            return Err(EmitError::UnsupportedType {
                language: LANGUAGE,
                ty: other.to_string(),
            })
        }
    })
}

fn pad_literal(pad: PadValue) -> &'static str {
    match pad {
        PadValue::Zero => "0",
        PadValue::FloatZero => "0.0",
        PadValue::False => "False",
        PadValue::Nul => "'\\0'",
    }
}

fn constant_literal(value: ConstantValue) -> String {
    match value {
        ConstantValue::Int(v) => v.to_string(),
        ConstantValue::Char(c) => quote_single(&c.to_string()),
    }
}

fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn python_tuple(items: &[String]) -> String {
    match items {
        [] => "()".to_string(),
        [single] => format!("({},)", single),
        _ => format!("({})", items.join(", ")),
    }
}

fn python_literal(value: &serde_json::Value) -> Result<String, EmitError> {
    Ok(match value {
        serde_json::Value::Null => "None".to_string(),
        serde_json::Value::Bool(b) => python_bool(*b).to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote_single(s),
        serde_json::Value::Array(items) => {
            let items = items.iter().map(python_literal).collect::<Result<Vec<_>, _>>()?;
            format!("[{}]", items.join(", "))
        }
        serde_json::Value::Object(_) => {
            return Err(EmitError::UnsupportedConstruct {
                language: LANGUAGE,
                construct: "object example argument".to_string(),
            })
        }
    })
}
