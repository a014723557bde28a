//! Rust code generator for device bindings
//!
//! One module per device on top of the runtime's `device` and
//! `byte_converter` modules. Calls are blocking and return
//! `Result<_, DeviceError>`; callbacks are delivered through receivers.

mod types;

use devbind_model::{ConstantValue, Device, Direction, Element, ElementType, Name, Packet};

use super::{
    aggregate_name, pad_kind, quote_double, strip_trailing_whitespace, Generator, Language,
    PadValue, RenderContext,
};
use crate::doc::{self, Reference, ReferenceKind};
use crate::error::EmitError;
use crate::naming::{self, NameKind};
use crate::provenance::CommentStyle;
use crate::resolver::{Field, HighLevelView, ResolvedDevice, StreamDirection, StreamRole};
use types::{
    generate_from_byte_slice, generate_struct, layout, map_element_type, sanitize_field_name,
    stream_item_type, StructField,
};

pub(crate) const LANGUAGE: &str = "Rust";

const IMPORTS: &str = "use crate::{
    byte_converter::*,
    device::{CallbackReceiver, Device, DeviceError, ResponseExpectedFlag},
    ip_connection::IpConnection,
};
";

/// Rust code generator
pub struct RustGenerator;

impl RustGenerator {
    pub fn new() -> Self {
        Self
    }

    fn type_name(&self, device: &Device) -> String {
        self.translate_name(&device.full_name(), NameKind::Type)
    }
}

impl Default for RustGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RustGenerator {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn file_name(&self, device: &Device) -> String {
        format!(
            "{}.rs",
            self.translate_name(&device.full_name(), NameKind::Module)
        )
    }

    fn comment_style(&self) -> CommentStyle {
        CommentStyle::CBlock
    }

    fn translate_name(&self, name: &Name, kind: NameKind) -> String {
        match kind {
            NameKind::Type => name.upper_camel(),
            NameKind::Function | NameKind::Module => name.snake(),
            NameKind::Parameter | NameKind::Field => sanitize_field_name(name),
            NameKind::Constant => naming::guard_leading_digit(name.upper()),
        }
    }

    fn map_type(&self, ty: ElementType, cardinality: usize) -> Result<String, EmitError> {
        map_element_type(ty, cardinality)
    }

    fn render_device(
        &self,
        resolved: &ResolvedDevice,
        ctx: &RenderContext,
    ) -> Result<String, EmitError> {
        let writer = ModuleWriter::new(self, resolved, ctx);
        let device = &resolved.device;
        let mut code = String::new();

        code.push_str(&self.header(ctx));
        code.push_str(&self.released_marker(device));
        code.push('\n');
        if ctx.generate_docs {
            code.push_str(&format!(
                "//! {}.\n\n",
                device.description.get(&ctx.locale).trim_end_matches('.')
            ));
        }
        code.push_str(IMPORTS);
        code.push('\n');
        code.push_str(&writer.function_enum());
        code.push_str(&writer.constants()?);
        code.push_str(&writer.aggregates()?);
        code.push_str(&writer.device_struct()?);

        Ok(strip_trailing_whitespace(&code))
    }
}

/// Renders the pieces of one device module.
struct ModuleWriter<'a> {
    generator: &'a RustGenerator,
    resolved: &'a ResolvedDevice,
    device: &'a Device,
    ctx: &'a RenderContext,
    type_name: String,
    function_enum: String,
}

impl<'a> ModuleWriter<'a> {
    fn new(
        generator: &'a RustGenerator,
        resolved: &'a ResolvedDevice,
        ctx: &'a RenderContext,
    ) -> Self {
        let type_name = generator.type_name(&resolved.device);
        Self {
            generator,
            resolved,
            device: &resolved.device,
            ctx,
            function_enum: format!("{}Function", type_name),
            type_name,
        }
    }

    fn function(&self, name: &Name) -> String {
        self.generator.translate_name(name, NameKind::Function)
    }

    fn param(&self, name: &Name) -> String {
        self.generator.translate_name(name, NameKind::Parameter)
    }

    fn variant(&self, packet: &Packet) -> String {
        if packet.is_callback() {
            format!("Callback{}", packet.name.upper_camel())
        } else {
            packet.name.upper_camel()
        }
    }

    fn function_id(&self, packet: &Packet) -> String {
        format!("u8::from({}::{})", self.function_enum, self.variant(packet))
    }

    fn function_enum(&self) -> String {
        let mut code = String::from("#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]\n");
        code.push_str(&format!("pub enum {} {{\n", self.function_enum));
        for packet in &self.device.packets {
            code.push_str(&format!("    {},\n", self.variant(packet)));
        }
        code.push_str("}\n\n");

        code.push_str(&format!("impl From<{}> for u8 {{\n", self.function_enum));
        code.push_str(&format!("    fn from(fun: {}) -> Self {{\n", self.function_enum));
        code.push_str("        match fun {\n");
        for packet in &self.device.packets {
            code.push_str(&format!(
                "            {}::{} => {},\n",
                self.function_enum,
                self.variant(packet),
                packet.function_id
            ));
        }
        code.push_str("        }\n    }\n}\n\n");
        code
    }

    fn constants(&self) -> Result<String, EmitError> {
        let mut code = String::new();
        for group in &self.device.constant_groups {
            let ty = map_element_type(group.ty, 1)?;
            for constant in &group.constants {
                let value = match constant.value {
                    ConstantValue::Int(v) => v.to_string(),
                    ConstantValue::Char(c) => format!("{:?}", c),
                };
                code.push_str(&format!(
                    "pub const {}: {} = {};\n",
                    naming::guard_leading_digit(naming::constant_name(&group.name, &constant.name)),
                    ty,
                    value
                ));
            }
        }
        if !code.is_empty() {
            code.push('\n');
        }
        Ok(code)
    }

    /// Name of the struct returned by a function with several outputs.
    fn result_type(&self, packet: &Packet) -> String {
        aggregate_name(&packet.name).upper_camel()
    }

    fn event_type(&self, packet: &Packet) -> String {
        format!("{}Event", packet.name.upper_camel())
    }

    /// Return type of a low-level call or callback.
    fn output_type(&self, packet: &Packet) -> Result<String, EmitError> {
        let outputs: Vec<&Element> = packet.outputs().collect();
        match outputs.as_slice() {
            [] => Ok("()".to_string()),
            [single] => map_element_type(single.ty, single.cardinality),
            _ if packet.is_callback() => Ok(self.event_type(packet)),
            _ => Ok(self.result_type(packet)),
        }
    }

    fn stream_fields(
        &self,
        packet: &Packet,
        view: &HighLevelView,
    ) -> Result<Vec<StructField>, EmitError> {
        let item = stream_item_type(view.chunk_data_element(packet))?;
        view.fields(packet, Direction::Out)
            .iter()
            .map(|field| match field {
                Field::Stream => Ok(StructField {
                    name: self.param(&view.stream),
                    ty: format!("Vec<{}>", item),
                    element_ty: view.chunk_data_element(packet).ty,
                }),
                Field::Element(element) => StructField::from_element(element),
            })
            .collect()
    }

    /// Return type of a high-level stream-out call or callback.
    fn stream_output_type(
        &self,
        packet: &Packet,
        view: &HighLevelView,
    ) -> Result<String, EmitError> {
        let fields = self.stream_fields(packet, view)?;
        match fields.as_slice() {
            [single] => Ok(single.ty.clone()),
            _ if packet.is_callback() => Ok(format!("{}Event", view.name.upper_camel())),
            _ => Ok(aggregate_name(&view.name).upper_camel()),
        }
    }

    fn aggregates(&self) -> Result<String, EmitError> {
        let mut code = String::new();

        for packet in &self.device.packets {
            let outputs: Vec<&Element> = packet.outputs().collect();
            if outputs.len() < 2 {
                continue;
            }
            let name = self.output_type(packet)?;
            let fields = outputs
                .iter()
                .map(|e| StructField::from_element(e))
                .collect::<Result<Vec<_>, _>>()?;
            code.push_str(&generate_struct(&name, None, &fields));
            code.push_str(&generate_from_byte_slice(&name, &outputs)?);
            code.push('\n');
        }

        for (packet, view) in self.resolved.views() {
            if view.direction != StreamDirection::Out {
                continue;
            }
            let fields = self.stream_fields(packet, view)?;
            if fields.len() < 2 {
                continue;
            }
            let name = self.stream_output_type(packet, view)?;
            code.push_str(&generate_struct(&name, None, &fields));
            code.push('\n');
        }

        Ok(code)
    }

    fn device_struct(&self) -> Result<String, EmitError> {
        let name = &self.type_name;
        let mut code = String::new();

        if self.ctx.generate_docs {
            code.push_str(&format!(
                "/// {}\n",
                self.device.description.get(&self.ctx.locale)
            ));
        }
        code.push_str(&format!(
            "#[derive(Clone)]\npub struct {} {{\n    device: Device,\n}}\n\n",
            name
        ));
        code.push_str(&format!("impl {} {{\n", name));
        code.push_str(&format!(
            "    pub const DEVICE_IDENTIFIER: u16 = {};\n    pub const DEVICE_DISPLAY_NAME: &'static str = {};\n\n",
            self.device.identifier,
            quote_double(&self.device.long_display_name())
        ));

        code.push_str(&self.constructor());
        code.push_str(&self.response_expected_accessors());

        for packet in self.device.callbacks() {
            code.push('\n');
            code.push_str(&self.callback_receiver(packet)?);
        }
        for (packet, view) in self.resolved.stream_out_callbacks() {
            code.push('\n');
            code.push_str(&self.high_level_callback_receiver(packet, view)?);
        }
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

        code.push_str("}\n");
        Ok(code)
    }

    fn constructor(&self) -> String {
        let name = &self.type_name;
        let api = &self.device.api_version;
        let mut code = String::new();
        code.push_str("    /// Creates an object with the unique device ID `uid`. This object can then be used\n");
        code.push_str("    /// after the IP Connection `ip_connection` is connected.\n");
        code.push_str(&format!(
            "    pub fn new(uid: &str, ip_connection: &IpConnection) -> {} {{\n",
            name
        ));
        code.push_str(&format!(
            "        let mut result = {} {{\n            device: Device::new([{}, {}, {}], uid, ip_connection, {}::DEVICE_DISPLAY_NAME),\n        }};\n",
            name, api.major, api.minor, api.patch, name
        ));
        for packet in &self.device.packets {
            code.push_str(&format!(
                "        result.device.response_expected[{} as usize] = ResponseExpectedFlag::{};\n",
                self.function_id(packet),
                self.generator.classify_response(packet).camel_name()
            ));
        }
        code.push_str("        result\n    }\n");
        code
    }

    fn response_expected_accessors(&self) -> String {
        let fun = &self.function_enum;
        format!(
            "
    /// Returns the response expected flag for the function specified by `fun`.
    pub fn get_response_expected(&self, fun: {fun}) -> Result<bool, DeviceError> {{
        self.device.get_response_expected(u8::from(fun))
    }}

    /// Changes the response expected flag of the function specified by `fun`. Only
    /// functions without a return value and without a fixed flag can be changed.
    pub fn set_response_expected(&mut self, fun: {fun}, response_expected: bool) -> Result<(), DeviceError> {{
        self.device.set_response_expected(u8::from(fun), response_expected)
    }}

    /// Changes the response expected flag for all changeable functions of this device.
    pub fn set_response_expected_all(&mut self, response_expected: bool) {{
        self.device.set_response_expected_all(response_expected)
    }}
",
            fun = fun
        )
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
                naming::guard_leading_digit(naming::constant_name(&group.name, &constant.name))
            },
        );
        doc::prefix_lines(&text, "    /// ")
    }

    fn reference(&self, reference: &Reference) -> String {
        match reference.kind {
            ReferenceKind::Function => format!("[`{}`]", self.function(&reference.name)),
            ReferenceKind::Callback => format!(
                "[`get_{}_callback_receiver`]",
                self.function(&reference.name)
            ),
        }
    }

    fn callback_receiver(&self, packet: &Packet) -> Result<String, EmitError> {
        let mut code = self.doc_comment(packet);
        code.push_str(&format!(
            "    pub fn get_{}_callback_receiver(&self) -> CallbackReceiver<{}> {{\n",
            self.function(&packet.name),
            self.output_type(packet)?
        ));
        code.push_str(&format!(
            "        CallbackReceiver::new(self.device.get_callback_receiver({}))\n    }}\n",
            self.function_id(packet)
        ));
        Ok(code)
    }

    /// Accessor for an element of a low-level result named `var`.
    fn access(&self, packet: &Packet, var: &str, element: &Element) -> String {
        if packet.output_count() >= 2 {
            format!("{}.{}", var, self.param(&element.name))
        } else {
            var.to_string()
        }
    }

    fn length_expr(&self, packet: &Packet, view: &HighLevelView, var: &str) -> String {
        match view.length_element(packet) {
            Some(element) => format!("{} as usize", self.access(packet, var, element)),
            None => view.fixed_length().unwrap_or(view.chunk_cardinality).to_string(),
        }
    }

    /// Final value of a stream-out call or callback from the reassembled
    /// data and the last low-level result.
    fn stream_result(
        &self,
        packet: &Packet,
        view: &HighLevelView,
        data: &str,
        var: &str,
    ) -> Result<String, EmitError> {
        let fields = view.fields(packet, Direction::Out);
        if fields.len() == 1 {
            return Ok(data.to_string());
        }
        let values: Vec<String> = fields
            .iter()
            .map(|field| match field {
                Field::Stream => format!("{}: {}", self.param(&view.stream), data),
                Field::Element(element) => format!(
                    "{}: {}",
                    self.param(&element.name),
                    self.access(packet, var, element)
                ),
            })
            .collect();
        Ok(format!(
            "{} {{ {} }}",
            self.stream_output_type(packet, view)?,
            values.join(", ")
        ))
    }

    fn high_level_callback_receiver(
        &self,
        packet: &Packet,
        view: &HighLevelView,
    ) -> Result<String, EmitError> {
        let stream = self.param(&view.stream);
        let data = self.access(packet, "event", view.chunk_data_element(packet));
        let mut code = self.doc_comment(packet);
        code.push_str(&format!(
            "    pub fn get_{}_callback_receiver(&self) -> impl Iterator<Item = {}> {{\n",
            self.function(&view.name),
            self.stream_output_type(packet, view)?
        ));

        if view.single_chunk {
            code.push_str(&format!(
                "        self.get_{}_callback_receiver().into_iter().map(|event| {{\n",
                self.function(&packet.name)
            ));
            code.push_str(&format!(
                "            let mut {s}_data = {d}.to_vec();\n            {s}_data.truncate({l});\n",
                s = stream,
                d = data,
                l = self.length_expr(packet, view, "event")
            ));
            code.push_str(&format!(
                "            {}\n        }})\n    }}\n",
                self.stream_result(packet, view, &format!("{}_data", stream), "event")?
            ));
            return Ok(code);
        }

        let offset = view
            .chunk_offset_element(packet)
            .map(|e| format!("{} as usize", self.access(packet, "event", e)))
            .unwrap_or_else(|| "0".to_string());

        code.push_str(&format!("        let mut {}_data = Vec::new();\n", stream));
        code.push_str(&format!(
            "        self.get_{}_callback_receiver()\n            .into_iter()\n            .filter_map(move |event| {{\n",
            self.function(&packet.name)
        ));
        code.push_str(&format!(
            "                let {}_length = {};\n",
            stream,
            self.length_expr(packet, view, "event")
        ));
        code.push_str(&format!("                let {}_chunk_offset = {};\n\n", stream, offset));
        code.push_str(&format!(
            "                if {s}_chunk_offset != {s}_data.len() {{\n                    // out of sync, drop the partial stream and wait for the next one\n                    {s}_data.clear();\n                    if {s}_chunk_offset != 0 {{\n                        return None;\n                    }}\n                }}\n\n",
            s = stream
        ));
        code.push_str(&format!(
            "                {s}_data.extend_from_slice(&{d});\n                if {s}_data.len() < {s}_length {{\n                    return None;\n                }}\n\n",
            s = stream,
            d = data
        ));
        code.push_str(&format!("                {s}_data.truncate({s}_length);\n", s = stream));
        code.push_str(&format!(
            "                Some({})\n            }})\n    }}\n",
            self.stream_result(
                packet,
                view,
                &format!("std::mem::take(&mut {}_data)", stream),
                "event"
            )?
        ));

        Ok(code)
    }

    fn signature(&self, name: &Name, params: &[String], ret: &str) -> String {
        let mut args = String::from("&self");
        for param in params {
            args.push_str(", ");
            args.push_str(param);
        }
        format!(
            "    pub fn {}({}) -> Result<{}, DeviceError> {{\n",
            self.function(name),
            args,
            ret
        )
    }

    fn typed_params<'e>(
        &self,
        elements: impl IntoIterator<Item = &'e Element>,
    ) -> Result<Vec<String>, EmitError> {
        elements
            .into_iter()
            .map(|e| {
                Ok(format!(
                    "{}: {}",
                    self.param(&e.name),
                    map_element_type(e.ty, e.cardinality)?
                ))
            })
            .collect()
    }

    fn method(&self, packet: &Packet) -> Result<String, EmitError> {
        let params = self.typed_params(packet.inputs())?;
        let ret = self.output_type(packet)?;
        let mut code = self.doc_comment(packet);
        code.push_str(&self.signature(&packet.name, &params, &ret));

        let inputs = layout(packet.inputs());
        let size = inputs.last().map_or(0, |(_, _, end)| *end);
        if inputs.is_empty() {
            code.push_str("        let payload = [0; 0];\n");
        } else {
            code.push_str(&format!("        let mut payload = [0; {}];\n", size));
            for (element, start, end) in &inputs {
                code.push_str(&format!(
                    "        {}.write_to_slice(&mut payload[{}..{}]);\n",
                    self.param(&element.name),
                    start,
                    end
                ));
            }
        }
        code.push('\n');

        if packet.output_count() == 0 {
            code.push_str(&format!(
                "        self.device.set({}, &payload)?;\n        Ok(())\n",
                self.function_id(packet)
            ));
        } else {
            code.push_str(&format!(
                "        let response = self.device.get({}, &payload)?;\n        Ok(<{}>::from_le_byte_slice(&response))\n",
                self.function_id(packet),
                ret
            ));
        }
        code.push_str("    }\n");
        Ok(code)
    }

    /// Low-level call arguments of a high-level method, with stream roles
    /// bound to the local chunk variables.
    fn low_level_args(
        &self,
        packet: &Packet,
        view: &HighLevelView,
        direction: Direction,
    ) -> Result<String, EmitError> {
        let stream = self.param(&view.stream);
        let args = packet
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.direction == direction)
            .map(|(i, e)| {
                Ok(match view.role(i) {
                    Some(StreamRole::ChunkData) => format!("{}_chunk_data", stream),
                    Some(StreamRole::ChunkOffset) => format!(
                        "{}_chunk_offset as {}",
                        stream,
                        map_element_type(e.ty, 1)?
                    ),
                    Some(StreamRole::Length) => format!("{}_length", stream),
                    None if e.ty == ElementType::String => format!("{}.clone()", self.param(&e.name)),
                    None => self.param(&e.name),
                })
            })
            .collect::<Result<Vec<_>, EmitError>>()?;
        Ok(args.join(", "))
    }

    fn stream_in_method(&self, packet: &Packet, view: &HighLevelView) -> Result<String, EmitError> {
        let stream = self.param(&view.stream);
        let chunk = view.chunk_cardinality;
        let data = view.chunk_data_element(packet);
        let item = stream_item_type(data)?;

        let params = view
            .fields(packet, Direction::In)
            .iter()
            .map(|field| match field {
                Field::Stream => Ok(format!("{}: &[{}]", stream, item)),
                Field::Element(e) => Ok(format!(
                    "{}: {}",
                    self.param(&e.name),
                    map_element_type(e.ty, e.cardinality)?
                )),
            })
            .collect::<Result<Vec<_>, EmitError>>()?;
        let has_result = packet.output_count() > 0;
        let ret = self.output_type(packet)?;

        let mut code = self.doc_comment(packet);
        code.push_str(&self.signature(&view.name, &params, &ret));

        let max = view.max_length();
        code.push_str(&format!(
            "        if {s}.len() > {m} {{\n            return Err(DeviceError::InvalidParameter({:?}.to_string()));\n        }}\n\n",
            format!("{} can be at most {} items long", view.stream, max),
            s = stream,
            m = max
        ));

        if let Some(length) = view.length_element(packet) {
            code.push_str(&format!(
                "        let {s}_length = {s}.len() as {};\n",
                map_element_type(length.ty, 1)?,
                s = stream
            ));
        }

        let pad = pad_literal(pad_kind(data.ty));
        let low_level = format!(
            "self.{}({})?",
            self.function(&packet.name),
            self.low_level_args(packet, view, Direction::In)?
        );

        if view.single_chunk {
            if view.chunk_offset.is_some() {
                code.push_str(&format!("        let {}_chunk_offset = 0;\n", stream));
            }
            code.push_str(&format!(
                "        let mut {s}_chunk_data = [{p}; {n}];\n        {s}_chunk_data[..{s}.len()].copy_from_slice({s});\n\n",
                s = stream,
                p = pad,
                n = chunk
            ));
            if has_result {
                code.push_str(&format!("        Ok({})\n    }}\n", low_level));
            } else {
                code.push_str(&format!("        {};\n        Ok(())\n    }}\n", low_level));
            }
            return Ok(code);
        }

        code.push_str(&format!("        let mut {}_chunk_offset = 0;\n", stream));
        if has_result {
            code.push_str("        let mut result = None;\n");
        }
        code.push_str("        let _stream = self.device.lock_stream();\n\n");
        code.push_str("        loop {\n");
        code.push_str(&format!(
            "            let mut {s}_chunk_data = [{p}; {n}];\n            let {s}_chunk_end = ({s}_chunk_offset + {n}).min({s}.len());\n            {s}_chunk_data[..{s}_chunk_end - {s}_chunk_offset].copy_from_slice(&{s}[{s}_chunk_offset..{s}_chunk_end]);\n\n",
            s = stream,
            p = pad,
            n = chunk
        ));
        if has_result {
            code.push_str(&format!("            let chunk_result = {};\n", low_level));
            code.push_str(
                "            if let Some(previous) = &result {\n                if previous != &chunk_result {\n                    return Err(DeviceError::StreamOutOfSync);\n                }\n            }\n            result = Some(chunk_result);\n\n",
            );
        } else {
            code.push_str(&format!("            {};\n\n", low_level));
        }
        code.push_str(&format!(
            "            {s}_chunk_offset += {n};\n            if {s}_chunk_offset >= {s}.len() {{\n                break;\n            }}\n        }}\n\n",
            s = stream,
            n = chunk
        ));
        if has_result {
            code.push_str("        result.ok_or(DeviceError::StreamOutOfSync)\n    }\n");
        } else {
            code.push_str("        Ok(())\n    }\n");
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
        let params = self.typed_params(packet.inputs())?;
        let ret = self.stream_output_type(packet, view)?;
        let data = self.access(packet, "ret", view.chunk_data_element(packet));
        let low_level = format!(
            "self.{}({})?",
            self.function(&packet.name),
            self.low_level_args(packet, view, Direction::In)?
        );

        let mut code = self.doc_comment(packet);
        code.push_str(&self.signature(&view.name, &params, &ret));

        if view.single_chunk {
            code.push_str(&format!("        let ret = {};\n", low_level));
            code.push_str(&format!(
                "        let mut {s}_data = {d}.to_vec();\n        {s}_data.truncate({l});\n\n",
                s = stream,
                d = data,
                l = self.length_expr(packet, view, "ret")
            ));
        } else {
            let offset = view
                .chunk_offset_element(packet)
                .map(|e| format!("{} as usize", self.access(packet, "ret", e)))
                .unwrap_or_else(|| "0".to_string());

            code.push_str("        let _stream = self.device.lock_stream();\n");
            code.push_str(&format!("        let mut ret = {};\n", low_level));
            code.push_str(&format!(
                "        let {}_length = {};\n",
                stream,
                self.length_expr(packet, view, "ret")
            ));
            code.push_str(&format!("        let mut {}_chunk_offset = {};\n", stream, offset));
            code.push_str(&format!(
                "        let mut {s}_out_of_sync = {s}_chunk_offset != 0;\n        let mut {s}_data = {d}.to_vec();\n\n",
                s = stream,
                d = data
            ));
            code.push_str(&format!(
                "        while !{s}_out_of_sync && {s}_data.len() < {s}_length {{\n            ret = {ll};\n            {s}_chunk_offset = {o};\n            {s}_out_of_sync = {s}_chunk_offset != {s}_data.len();\n            {s}_data.extend_from_slice(&{d});\n        }}\n\n",
                s = stream,
                ll = low_level,
                o = offset,
                d = data
            ));
            code.push_str(&format!(
                "        if {s}_out_of_sync {{\n            // discard remaining stream to bring it back in-sync\n            while {s}_chunk_offset + {n} < {s}_length {{\n                ret = {ll};\n                {s}_chunk_offset = {o};\n            }}\n            return Err(DeviceError::StreamOutOfSync);\n        }}\n\n",
                s = stream,
                n = chunk,
                ll = low_level,
                o = offset
            ));
            code.push_str(&format!("        {s}_data.truncate({s}_length);\n", s = stream));
        }

        code.push_str(&format!(
            "        Ok({})\n    }}\n",
            self.stream_result(packet, view, &format!("{}_data", stream), "ret")?
        ));
        Ok(code)
    }
}

fn pad_literal(pad: PadValue) -> &'static str {
    match pad {
        PadValue::Zero => "0",
        PadValue::FloatZero => "0.0",
        PadValue::False => "false",
        PadValue::Nul => "'\\0'",
    }
}
