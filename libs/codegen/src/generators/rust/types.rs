//! Type generation for Rust structs

use devbind_model::{Element, ElementType, Name};

use super::LANGUAGE;
use crate::error::EmitError;
use crate::naming::{self, Escape, RUST_KEYWORDS};

/// Map a wire type to a Rust type; arrays become fixed-size arrays.
pub fn map_element_type(ty: ElementType, cardinality: usize) -> Result<String, EmitError> {
    let base = match ty {
        ElementType::Int8 => "i8",
        ElementType::UInt8 => "u8",
        ElementType::Int16 => "i16",
        ElementType::UInt16 => "u16",
        ElementType::Int32 => "i32",
        ElementType::UInt32 => "u32",
        ElementType::Int64 => "i64",
        ElementType::UInt64 => "u64",
        ElementType::Float => "f32",
        ElementType::Bool => "bool",
        ElementType::Char => "char",
        ElementType::String => return Ok("String".to_string()),
        other => {
            return Err(EmitError::UnsupportedType {
                language: LANGUAGE,
                ty: other.to_string(),
            })
        }
    };

    if cardinality > 1 {
        Ok(format!("[{}; {}]", base, cardinality))
    } else {
        Ok(base.to_string())
    }
}

/// Element type of a high-level stream, `char` for `[char; 60]`.
pub fn stream_item_type(element: &Element) -> Result<String, EmitError> {
    map_element_type(element.ty, 1)
}

/// Sanitize a field name to be a valid Rust identifier
pub fn sanitize_field_name(name: &Name) -> String {
    naming::escape(
        naming::guard_leading_digit(name.snake()),
        RUST_KEYWORDS,
        Escape::Raw,
    )
}

/// Byte ranges of `elements` packed back to back.
pub fn layout<'e>(
    elements: impl IntoIterator<Item = &'e Element>,
) -> Vec<(&'e Element, usize, usize)> {
    let mut offset = 0;
    elements
        .into_iter()
        .map(|element| {
            let start = offset;
            offset += element.wire_size();
            (element, start, offset)
        })
        .collect()
}

/// One struct field of the aggregate.
pub struct StructField {
    pub name: String,
    pub ty: String,
    pub element_ty: ElementType,
}

impl StructField {
    pub fn from_element(element: &Element) -> Result<Self, EmitError> {
        Ok(Self {
            name: sanitize_field_name(&element.name),
            ty: map_element_type(element.ty, element.cardinality)?,
            element_ty: element.ty,
        })
    }
}

/// Generate a Rust struct for an aggregate of named fields
pub fn generate_struct(name: &str, doc: Option<&str>, fields: &[StructField]) -> String {
    let mut code = String::new();

    if let Some(doc) = doc {
        code.push_str(&format!("/// {}\n", doc));
    }

    let has_float = fields.iter().any(|f| f.element_ty == ElementType::Float);
    let has_string = fields
        .iter()
        .any(|f| f.element_ty == ElementType::String || f.ty.starts_with("Vec<"));

    // Generate derive macros
    code.push_str("#[derive(Clone");
    if !has_string {
        code.push_str(", Copy");
    }
    code.push_str(", Debug, PartialEq");
    if !has_float {
        code.push_str(", Eq, Hash");
    }
    code.push_str(")]\n");

    code.push_str(&format!("pub struct {} {{\n", name));
    for field in fields {
        code.push_str(&generate_field(field));
    }
    code.push_str("}\n");

    code
}

/// Generate a field for a struct
fn generate_field(field: &StructField) -> String {
    format!("    pub {}: {},\n", field.name, field.ty)
}

/// `FromByteSlice` for a wire aggregate, decoding each field from its range.
pub fn generate_from_byte_slice(name: &str, elements: &[&Element]) -> Result<String, EmitError> {
    let ranges = layout(elements.iter().copied());
    let size = ranges.last().map_or(0, |(_, _, end)| *end);

    let mut code = format!("impl FromByteSlice for {} {{\n", name);
    code.push_str(&format!(
        "    fn bytes_expected() -> usize {{\n        {}\n    }}\n\n",
        size
    ));
    code.push_str(&format!(
        "    fn from_le_byte_slice(bytes: &[u8]) -> {} {{\n        {} {{\n",
        name, name
    ));
    for (element, start, end) in ranges {
        code.push_str(&format!(
            "            {}: <{}>::from_le_byte_slice(&bytes[{}..{}]),\n",
            sanitize_field_name(&element.name),
            map_element_type(element.ty, element.cardinality)?,
            start,
            end
        ));
    }
    code.push_str("        }\n    }\n}\n");

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devbind_model::Direction;

    fn element(name: &str, ty: ElementType, cardinality: usize) -> Element {
        Element {
            name: Name::new(name),
            ty,
            cardinality,
            direction: Direction::Out,
            constant_group: None,
        }
    }

    #[test]
    fn maps_widths_and_signedness() {
        assert_eq!(map_element_type(ElementType::Int8, 1).unwrap(), "i8");
        assert_eq!(map_element_type(ElementType::UInt64, 1).unwrap(), "u64");
        assert_eq!(map_element_type(ElementType::UInt16, 30).unwrap(), "[u16; 30]");
        assert_eq!(map_element_type(ElementType::String, 16).unwrap(), "String");
    }

    #[test]
    fn escapes_keywords() {
        assert_eq!(sanitize_field_name(&Name::new("Type")), "r#type");
        assert_eq!(sanitize_field_name(&Name::new("Self")), "self_");
        assert_eq!(sanitize_field_name(&Name::new("Has Fix")), "has_fix");
    }

    #[test]
    fn decodes_fields_from_packed_ranges() {
        let value = element("Value", ElementType::Int32, 1);
        let flags = element("Flags", ElementType::Bool, 10);
        let unit = element("Unit", ElementType::Char, 1);
        let code = generate_from_byte_slice("Reading", &[&value, &flags, &unit]).unwrap();
        assert!(code.contains("        6\n"));
        assert!(code.contains("value: <i32>::from_le_byte_slice(&bytes[0..4]),"));
        assert!(code.contains("flags: <[bool; 10]>::from_le_byte_slice(&bytes[4..6]),"));
        assert!(code.contains("unit: <char>::from_le_byte_slice(&bytes[6..7]),"));
    }

    #[test]
    fn derives_follow_field_types() {
        let load = StructField::from_element(&element("Load", ElementType::Float, 1)).unwrap();
        let code = generate_struct("Statistics", None, &[load]);
        assert!(code.starts_with("#[derive(Clone, Copy, Debug, PartialEq)]\n"));

        let label = StructField::from_element(&element("Label", ElementType::String, 16)).unwrap();
        let code = generate_struct("Label", None, &[label]);
        assert!(code.starts_with("#[derive(Clone, Debug, PartialEq, Eq, Hash)]\n"));
    }
}
