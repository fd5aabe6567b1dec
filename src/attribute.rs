//! Custom attribute and permission set value blobs (ECMA-335 II.23.3 and II.22.11).

use std::fmt::Write as _;

use widestring::U16String;

use crate::content_id::public_key_token;
use crate::error::{Error, Result};
use crate::model::{
    AssemblyRefId, MemberRefId, MemberReference, Module, ResolutionScope, TypeDefId, TypeRefId,
    TypeReference,
};
use crate::writer::Writer;

/// Prolog of every custom attribute blob.
pub const ATTRIBUTE_PROLOG: u16 = 0x0001;
/// `FIELD` marker of a named argument.
pub const NAMED_FIELD: u8 = 0x53;
/// `PROPERTY` marker of a named argument.
pub const NAMED_PROPERTY: u8 = 0x54;
/// Format byte of a permission set blob.
pub const PERMISSION_SET_FORMAT: u8 = b'.';

/// Type of an attribute argument as written in a FieldOrPropType.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
    /// `System.Type`, written as its serialized name.
    Type,
    /// `System.Object`; the value carries its own type tag.
    Object,
    /// An enum, by serialized type name.
    Enum(String),
    SzArray(Box<AttributeType>),
}

impl AttributeType {
    /// Write the FieldOrPropType encoding.
    pub fn write(&self, w: &mut Writer) -> Result<()> {
        match self {
            Self::Boolean => w.write_u8(0x02),
            Self::Char => w.write_u8(0x03),
            Self::SByte => w.write_u8(0x04),
            Self::Byte => w.write_u8(0x05),
            Self::Int16 => w.write_u8(0x06),
            Self::UInt16 => w.write_u8(0x07),
            Self::Int32 => w.write_u8(0x08),
            Self::UInt32 => w.write_u8(0x09),
            Self::Int64 => w.write_u8(0x0A),
            Self::UInt64 => w.write_u8(0x0B),
            Self::Single => w.write_u8(0x0C),
            Self::Double => w.write_u8(0x0D),
            Self::String => w.write_u8(0x0E),
            Self::Type => w.write_u8(0x50),
            Self::Object => w.write_u8(0x51),
            Self::Enum(name) => {
                w.write_u8(0x55);
                write_ser_str(w, Some(name))?;
            }
            Self::SzArray(element) => {
                w.write_u8(0x1D);
                element.write(w)?;
            }
        }
        Ok(())
    }
}

/// A fixed or named attribute argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Boolean(bool),
    Char(u16),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    String(Option<U16String>),
    /// A `System.Type` by serialized name; `None` is a null type.
    Type(Option<String>),
    /// An enum value; `value` holds the underlying integral.
    Enum {
        type_name: String,
        value: Box<AttributeValue>,
    },
    /// A single-dimensional array; `None` is a null array.
    Array {
        element: AttributeType,
        values: Option<Vec<AttributeValue>>,
    },
    /// A value passed where the parameter or member is typed `object`.
    Boxed(Box<AttributeValue>),
}

impl AttributeValue {
    /// The FieldOrPropType of this value.
    #[must_use]
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Boolean(_) => AttributeType::Boolean,
            Self::Char(_) => AttributeType::Char,
            Self::SByte(_) => AttributeType::SByte,
            Self::Byte(_) => AttributeType::Byte,
            Self::Int16(_) => AttributeType::Int16,
            Self::UInt16(_) => AttributeType::UInt16,
            Self::Int32(_) => AttributeType::Int32,
            Self::UInt32(_) => AttributeType::UInt32,
            Self::Int64(_) => AttributeType::Int64,
            Self::UInt64(_) => AttributeType::UInt64,
            Self::Single(_) => AttributeType::Single,
            Self::Double(_) => AttributeType::Double,
            Self::String(_) => AttributeType::String,
            Self::Type(_) => AttributeType::Type,
            Self::Enum { type_name, .. } => AttributeType::Enum(type_name.clone()),
            Self::Array { element, .. } => AttributeType::SzArray(Box::new(element.clone())),
            Self::Boxed(_) => AttributeType::Object,
        }
    }

    /// Write the value as an `Elem`, prefixing boxed values with their type.
    pub fn write(&self, w: &mut Writer) -> Result<()> {
        match self {
            Self::Boolean(v) => w.write_bool(*v),
            Self::Char(v) => w.write_u16(*v),
            Self::SByte(v) => w.write_i8(*v),
            Self::Byte(v) => w.write_u8(*v),
            Self::Int16(v) => w.write_i16(*v),
            Self::UInt16(v) => w.write_u16(*v),
            Self::Int32(v) => w.write_i32(*v),
            Self::UInt32(v) => w.write_u32(*v),
            Self::Int64(v) => w.write_i64(*v),
            Self::UInt64(v) => w.write_u64(*v),
            Self::Single(v) => w.write_f32(*v),
            Self::Double(v) => w.write_f64(*v),
            Self::String(s) => w.write_ser_string(s.as_deref())?,
            Self::Type(name) => write_ser_str(w, name.as_deref())?,
            Self::Enum { value, .. } => value.write(w)?,
            Self::Array { values: None, .. } => w.write_u32(u32::MAX),
            Self::Array {
                values: Some(values),
                ..
            } => {
                w.write_u32(values.len() as u32);
                for value in values {
                    value.write(w)?;
                }
            }
            Self::Boxed(value) => {
                value.attribute_type().write(w)?;
                value.write(w)?;
            }
        }
        Ok(())
    }
}

/// A named field or property argument.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    pub is_field: bool,
    pub name: String,
    pub value: AttributeValue,
}

impl NamedArgument {
    fn write(&self, w: &mut Writer) -> Result<()> {
        w.write_u8(if self.is_field {
            NAMED_FIELD
        } else {
            NAMED_PROPERTY
        });
        self.value.attribute_type().write(w)?;
        write_ser_str(w, Some(&self.name))?;
        match &self.value {
            // The member type is already `object`; the value tag follows.
            AttributeValue::Boxed(inner) => {
                inner.attribute_type().write(w)?;
                inner.write(w)
            }
            value => value.write(w),
        }
    }
}

/// An attribute application.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// The attribute constructor.
    pub constructor: MemberRefId,
    pub fixed_arguments: Vec<AttributeValue>,
    pub named_arguments: Vec<NamedArgument>,
    /// The attribute type allows multiple applications; only consulted for netmodules.
    pub allow_multiple: bool,
}

impl CustomAttribute {
    #[must_use]
    pub fn new(constructor: MemberRefId) -> Self {
        Self {
            constructor,
            fixed_arguments: Vec::new(),
            named_arguments: Vec::new(),
            allow_multiple: false,
        }
    }

    /// The #Blob content of a CustomAttribute row.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        w.write_u16(ATTRIBUTE_PROLOG);
        for value in &self.fixed_arguments {
            value.write(&mut w)?;
        }
        w.write_u16(self.named_arguments.len() as u16);
        for named in &self.named_arguments {
            named.write(&mut w)?;
        }
        Ok(w.to_vec())
    }
}

/// The #Blob content of a DeclSecurity row.
///
/// Each attribute contributes its serialized type name and a length-prefixed block of
/// named arguments; fixed arguments (the action) are carried by the row itself.
pub fn permission_set_blob(module: &Module, attributes: &[CustomAttribute]) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.write_u8(PERMISSION_SET_FORMAT);
    w.write_compressed_uint(attributes.len() as u32)?;
    for attribute in attributes {
        let type_name = attribute_type_name(module, attribute.constructor)?;
        write_ser_str(&mut w, Some(&type_name))?;

        let mut args = Writer::new();
        args.write_compressed_uint(attribute.named_arguments.len() as u32)?;
        for named in &attribute.named_arguments {
            named.write(&mut args)?;
        }
        w.write_compressed_uint(args.len() as u32)?;
        w.link_suffix(args);
    }
    Ok(w.to_vec())
}

fn attribute_type_name(module: &Module, constructor: MemberRefId) -> Result<String> {
    match module.member_ref(constructor) {
        MemberReference::MethodRef { parent, .. } => serialized_type_name(module, *parent),
        MemberReference::Method(method) => module
            .type_defs()
            .find(|(_, def)| def.methods.contains(method))
            .map(|(id, _)| definition_name(module, id))
            .ok_or_else(|| Error::Unresolved(format!("owner of method {method:?}"))),
        other => Err(Error::Unresolved(format!(
            "attribute constructor must be a method, got {other:?}"
        ))),
    }
}

/// Assembly-qualified name of a named type, as used in attribute blobs.
pub fn serialized_type_name(module: &Module, id: TypeRefId) -> Result<String> {
    match module.type_ref(id) {
        TypeReference::Primitive(p) => Ok(format!("System.{}", p.name())),
        TypeReference::Definition(def) => Ok(definition_name(module, *def)),
        TypeReference::Namespace {
            scope,
            namespace,
            name,
            ..
        } => {
            let mut out = qualified(namespace, name);
            if let ResolutionScope::AssemblyRef(assembly) = scope {
                out.push_str(", ");
                out.push_str(&assembly_strong_name(module, *assembly));
            }
            Ok(out)
        }
        TypeReference::Nested {
            enclosing, name, ..
        } => {
            let outer = serialized_type_name(module, *enclosing)?;
            // The assembly qualifier stays at the end.
            Ok(match outer.split_once(", ") {
                Some((ty, assembly)) => format!("{ty}+{name}, {assembly}"),
                None => format!("{outer}+{name}"),
            })
        }
        TypeReference::GenericInstance { generic, .. } => serialized_type_name(module, *generic),
        other => Err(Error::Unresolved(format!(
            "serialized name of {other:?}"
        ))),
    }
}

fn definition_name(module: &Module, id: TypeDefId) -> String {
    let def = module.type_def(id);
    match def.enclosing_type {
        Some(outer) => format!("{}+{}", definition_name(module, outer), def.name),
        None => qualified(&def.namespace, &def.name),
    }
}

fn qualified(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

fn assembly_strong_name(module: &Module, id: AssemblyRefId) -> String {
    let assembly = module.assembly_ref(id);
    let (major, minor, build, revision) = assembly.version;
    let culture = if assembly.culture.is_empty() {
        "neutral"
    } else {
        &assembly.culture
    };
    let mut out = format!(
        "{}, Version={major}.{minor}.{build}.{revision}, Culture={culture}, PublicKeyToken=",
        assembly.name
    );
    let token = match assembly.public_key_or_token.len() {
        0 => None,
        8 => Some(assembly.public_key_or_token.clone()),
        _ => Some(public_key_token(&assembly.public_key_or_token).to_vec()),
    };
    match token {
        Some(token) => {
            for byte in token {
                let _ = write!(out, "{byte:02x}");
            }
        }
        None => out.push_str("null"),
    }
    out
}

fn write_ser_str(w: &mut Writer, s: Option<&str>) -> Result<()> {
    match s {
        Some(s) => w.write_ser_string(Some(U16String::from_str(s).as_ustr())),
        None => w.write_ser_string(None),
    }
}

#[cfg(test)]
mod tests {
    use widestring::u16str;

    use super::*;
    use crate::model::{AssemblyReference, MethodSignature, PrimitiveType};

    fn constructor(module: &mut Module) -> MemberRefId {
        let mscorlib = module.add_assembly_ref(AssemblyReference::new("mscorlib", (4, 0, 0, 0)));
        let parent = module.add_type_ref(TypeReference::Namespace {
            scope: ResolutionScope::AssemblyRef(mscorlib),
            namespace: "System".into(),
            name: "ObsoleteAttribute".into(),
            is_value_type: false,
        });
        let void = module.primitive(PrimitiveType::Void);
        module.add_member_ref(MemberReference::MethodRef {
            parent,
            name: ".ctor".into(),
            signature: MethodSignature::new_instance(void, vec![]),
        })
    }

    #[test]
    fn test_empty_attribute() {
        let mut module = Module::new("m.dll");
        let ctor = constructor(&mut module);
        let blob = CustomAttribute::new(ctor).to_blob().unwrap();
        assert_eq!(blob, vec![0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_fixed_and_named_arguments() {
        let mut module = Module::new("m.dll");
        let mut attribute = CustomAttribute::new(constructor(&mut module));
        attribute.fixed_arguments = vec![
            AttributeValue::String(Some(u16str!("x").to_owned())),
            AttributeValue::String(None),
        ];
        attribute.named_arguments = vec![NamedArgument {
            is_field: false,
            name: "IsError".into(),
            value: AttributeValue::Boolean(true),
        }];
        let blob = attribute.to_blob().unwrap();
        let mut expected = vec![0x01, 0x00, 0x01, b'x', 0xFF, 0x01, 0x00, 0x54, 0x02, 0x07];
        expected.extend_from_slice(b"IsError");
        expected.push(0x01);
        assert_eq!(blob, expected);
    }

    #[test]
    fn test_enum_boxed_and_arrays() {
        let mut w = Writer::new();
        AttributeValue::Boxed(Box::new(AttributeValue::Enum {
            type_name: "E".into(),
            value: Box::new(AttributeValue::Int32(2)),
        }))
        .write(&mut w)
        .unwrap();
        assert_eq!(w.to_vec(), vec![0x55, 0x01, b'E', 0x02, 0x00, 0x00, 0x00]);

        let mut w = Writer::new();
        AttributeValue::Array {
            element: AttributeType::Int32,
            values: None,
        }
        .write(&mut w)
        .unwrap();
        AttributeValue::Array {
            element: AttributeType::Byte,
            values: Some(vec![AttributeValue::Byte(7)]),
        }
        .write(&mut w)
        .unwrap();
        assert_eq!(w.to_vec(), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0x00, 0x07]);

        let mut w = Writer::new();
        AttributeType::SzArray(Box::new(AttributeType::Type))
            .write(&mut w)
            .unwrap();
        assert_eq!(w.to_vec(), vec![0x1D, 0x50]);
    }

    #[test]
    fn test_named_object_argument() {
        let named = NamedArgument {
            is_field: true,
            name: "F".into(),
            value: AttributeValue::Boxed(Box::new(AttributeValue::Int16(1))),
        };
        let mut w = Writer::new();
        named.write(&mut w).unwrap();
        assert_eq!(w.to_vec(), vec![0x53, 0x51, 0x01, b'F', 0x06, 0x01, 0x00]);
    }

    #[test]
    fn test_permission_set() {
        let mut module = Module::new("m.dll");
        let mut attribute = CustomAttribute::new(constructor(&mut module));
        attribute.named_arguments.push(NamedArgument {
            is_field: false,
            name: "A".into(),
            value: AttributeValue::Boolean(false),
        });
        let blob = permission_set_blob(&module, &[attribute]).unwrap();
        let name = b"System.ObsoleteAttribute, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=null";
        assert_eq!(&blob[..2], &[b'.', 0x01]);
        assert_eq!(blob[2] as usize, name.len());
        assert_eq!(&blob[3..3 + name.len()], name);
        let rest = &blob[3 + name.len()..];
        assert_eq!(rest, &[0x06, 0x01, 0x54, 0x02, 0x01, b'A', 0x00]);
    }
}
