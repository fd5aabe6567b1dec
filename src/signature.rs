//! Signature blob encoding for methods, fields, properties, locals and type specs.
//!
//! ECMA-335 II.23.2 defines the blob signature format.

use crate::error::Result;
use crate::model::{
    CustomModifier, LocalVariable, MethodCallKind, MethodSignature, Module, ParameterType,
    TypeRefId, TypeReference,
};
use crate::tables::{CodedIndex, CodedIndexKind};
use crate::writer::Writer;

/// Element type codes (ECMA-335 II.23.1.16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementType {
    End = 0x00,
    Void = 0x01,
    Boolean = 0x02,
    Char = 0x03,
    I1 = 0x04,
    U1 = 0x05,
    I2 = 0x06,
    U2 = 0x07,
    I4 = 0x08,
    U4 = 0x09,
    I8 = 0x0A,
    U8 = 0x0B,
    R4 = 0x0C,
    R8 = 0x0D,
    String = 0x0E,
    Ptr = 0x0F,
    ByRef = 0x10,
    ValueType = 0x11,
    Class = 0x12,
    Var = 0x13,
    Array = 0x14,
    GenericInst = 0x15,
    TypedByRef = 0x16,
    IntPtr = 0x18,
    UIntPtr = 0x19,
    FnPtr = 0x1B,
    Object = 0x1C,
    SzArray = 0x1D,
    MVar = 0x1E,
    CModReqd = 0x1F,
    CModOpt = 0x20,
    Sentinel = 0x41,
    Pinned = 0x45,
}

/// Calling convention byte of a signature (ECMA-335 II.23.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallingConvention(pub u8);

impl CallingConvention {
    pub const DEFAULT: u8 = 0x00;
    pub const C: u8 = 0x01;
    pub const STDCALL: u8 = 0x02;
    pub const THISCALL: u8 = 0x03;
    pub const FASTCALL: u8 = 0x04;
    pub const VARARG: u8 = 0x05;
    pub const FIELD: u8 = 0x06;
    pub const LOCAL_SIG: u8 = 0x07;
    pub const PROPERTY: u8 = 0x08;
    pub const GENERIC_INST: u8 = 0x0A;
    pub const GENERIC: u8 = 0x10;
    pub const HAS_THIS: u8 = 0x20;
    pub const EXPLICIT_THIS: u8 = 0x40;

    /// Header byte of a method signature.
    #[must_use]
    pub fn for_method(sig: &MethodSignature) -> Self {
        let mut value = match sig.kind {
            MethodCallKind::Default => Self::DEFAULT,
            MethodCallKind::VarArg => Self::VARARG,
            MethodCallKind::C => Self::C,
            MethodCallKind::StdCall => Self::STDCALL,
            MethodCallKind::ThisCall => Self::THISCALL,
            MethodCallKind::FastCall => Self::FASTCALL,
        };
        if sig.generic_parameter_count > 0 {
            value |= Self::GENERIC;
        }
        if sig.has_this {
            value |= Self::HAS_THIS;
        }
        if sig.explicit_this {
            value |= Self::EXPLICIT_THIS;
        }
        Self(value)
    }
}

/// Supplies the TypeDef, TypeRef or TypeSpec row a type reference is encoded as.
pub trait TypeHandleResolver {
    /// Row of `id` as a `TypeDefOrRef` coded index, allocating it if needed.
    fn type_def_or_ref(&mut self, module: &Module, id: TypeRefId) -> Result<CodedIndex>;
}

/// Writes one signature blob.
pub struct SignatureEncoder<'a, R: TypeHandleResolver + ?Sized> {
    module: &'a Module,
    resolver: &'a mut R,
    writer: Writer,
}

impl<'a, R: TypeHandleResolver + ?Sized> SignatureEncoder<'a, R> {
    pub fn new(module: &'a Module, resolver: &'a mut R) -> Self {
        Self {
            module,
            resolver,
            writer: Writer::new(),
        }
    }

    /// The encoded blob.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.writer.to_vec()
    }

    /// MethodDefSig, MethodRefSig or StandAloneMethodSig.
    pub fn method(&mut self, sig: &MethodSignature) -> Result<()> {
        self.writer.write_u8(CallingConvention::for_method(sig).0);
        if sig.generic_parameter_count > 0 {
            self.writer.write_compressed_uint(sig.generic_parameter_count)?;
        }
        let count = sig.parameters.len() + sig.vararg_parameters.len();
        self.writer.write_compressed_uint(count as u32)?;
        self.parameter(&sig.return_type)?;
        for param in &sig.parameters {
            self.parameter(param)?;
        }
        if !sig.vararg_parameters.is_empty() {
            self.writer.write_u8(ElementType::Sentinel as u8);
            for param in &sig.vararg_parameters {
                self.parameter(param)?;
            }
        }
        Ok(())
    }

    /// FieldSig.
    pub fn field(&mut self, field_type: &ParameterType) -> Result<()> {
        self.writer.write_u8(CallingConvention::FIELD);
        self.parameter(field_type)
    }

    /// PropertySig.
    pub fn property(
        &mut self,
        has_this: bool,
        property_type: &ParameterType,
        parameters: &[ParameterType],
    ) -> Result<()> {
        let mut header = CallingConvention::PROPERTY;
        if has_this {
            header |= CallingConvention::HAS_THIS;
        }
        self.writer.write_u8(header);
        self.writer.write_compressed_uint(parameters.len() as u32)?;
        self.parameter(property_type)?;
        for param in parameters {
            self.parameter(param)?;
        }
        Ok(())
    }

    /// LocalVarSig.
    pub fn locals(&mut self, locals: &[LocalVariable]) -> Result<()> {
        self.writer.write_u8(CallingConvention::LOCAL_SIG);
        self.writer.write_compressed_uint(locals.len() as u32)?;
        for local in locals {
            self.modifiers(&local.local_type.modifiers)?;
            if local.pinned {
                self.writer.write_u8(ElementType::Pinned as u8);
            }
            if local.local_type.by_ref {
                self.writer.write_u8(ElementType::ByRef as u8);
            }
            self.type_ref(local.local_type.type_ref)?;
        }
        Ok(())
    }

    /// MethodSpec instantiation.
    pub fn method_spec(&mut self, arguments: &[TypeRefId]) -> Result<()> {
        self.writer.write_u8(CallingConvention::GENERIC_INST);
        self.writer.write_compressed_uint(arguments.len() as u32)?;
        for &arg in arguments {
            self.type_ref(arg)?;
        }
        Ok(())
    }

    /// Param or RetType: modifiers, optional BYREF, then the type.
    pub fn parameter(&mut self, param: &ParameterType) -> Result<()> {
        self.modifiers(&param.modifiers)?;
        if param.by_ref {
            self.writer.write_u8(ElementType::ByRef as u8);
        }
        self.type_ref(param.type_ref)
    }

    fn modifiers(&mut self, modifiers: &[CustomModifier]) -> Result<()> {
        for modifier in modifiers {
            let code = if modifier.required {
                ElementType::CModReqd
            } else {
                ElementType::CModOpt
            };
            self.writer.write_u8(code as u8);
            self.type_handle(modifier.modifier)?;
        }
        Ok(())
    }

    fn type_handle(&mut self, id: TypeRefId) -> Result<()> {
        let coded = self.resolver.type_def_or_ref(self.module, id)?;
        let value = coded.encode(CodedIndexKind::TypeDefOrRef)?;
        self.writer.write_compressed_uint(value)
    }

    /// A Type, as used by TypeSpec blobs and inside other signatures.
    ///
    /// Arrays, pointers, pinned and modified types form chains; those are walked in a loop
    /// with array shapes written once the element type is out.
    pub fn type_ref(&mut self, id: TypeRefId) -> Result<()> {
        let module = self.module;
        let mut shapes = Vec::new();
        let mut current = id;
        loop {
            match module.type_ref(current) {
                TypeReference::SzArray(element) => {
                    self.writer.write_u8(ElementType::SzArray as u8);
                    current = *element;
                }
                TypeReference::Pointer(element) => {
                    self.writer.write_u8(ElementType::Ptr as u8);
                    current = *element;
                }
                TypeReference::Pinned(element) => {
                    self.writer.write_u8(ElementType::Pinned as u8);
                    current = *element;
                }
                TypeReference::Modified {
                    modifiers,
                    unmodified,
                } => {
                    self.modifiers(modifiers)?;
                    current = *unmodified;
                }
                TypeReference::Array {
                    element,
                    rank,
                    sizes,
                    lower_bounds,
                } => {
                    self.writer.write_u8(ElementType::Array as u8);
                    shapes.push((*rank, sizes, lower_bounds));
                    current = *element;
                }
                _ => break,
            }
        }

        self.leaf(current)?;

        for (rank, sizes, lower_bounds) in shapes.into_iter().rev() {
            self.writer.write_compressed_uint(rank)?;
            self.writer.write_compressed_uint(sizes.len() as u32)?;
            for &size in sizes {
                self.writer.write_compressed_uint(size)?;
            }
            self.writer.write_compressed_uint(lower_bounds.len() as u32)?;
            for &bound in lower_bounds {
                self.writer.write_compressed_int(bound)?;
            }
        }
        Ok(())
    }

    fn leaf(&mut self, id: TypeRefId) -> Result<()> {
        let module = self.module;
        match module.type_ref(id) {
            TypeReference::Primitive(primitive) => {
                self.writer.write_u8(primitive.element_type() as u8);
            }
            TypeReference::Definition(_)
            | TypeReference::Namespace { .. }
            | TypeReference::Nested { .. } => {
                self.writer.write_u8(class_or_value_type(module, id) as u8);
                self.type_handle(id)?;
            }
            TypeReference::GenericInstance { generic, arguments } => {
                self.writer.write_u8(ElementType::GenericInst as u8);
                self.writer.write_u8(class_or_value_type(module, *generic) as u8);
                self.type_handle(*generic)?;
                self.writer.write_compressed_uint(arguments.len() as u32)?;
                for &arg in arguments {
                    self.type_ref(arg)?;
                }
            }
            TypeReference::GenericTypeParameter(index) => {
                self.writer.write_u8(ElementType::Var as u8);
                self.writer.write_compressed_uint(*index)?;
            }
            TypeReference::GenericMethodParameter(index) => {
                self.writer.write_u8(ElementType::MVar as u8);
                self.writer.write_compressed_uint(*index)?;
            }
            TypeReference::FunctionPointer(sig) => {
                self.writer.write_u8(ElementType::FnPtr as u8);
                self.method(sig)?;
            }
            TypeReference::SzArray(_)
            | TypeReference::Array { .. }
            | TypeReference::Pointer(_)
            | TypeReference::Pinned(_)
            | TypeReference::Modified { .. } => {
                debug_assert!(false, "type chains are unwound by type_ref");
            }
        }
        Ok(())
    }
}

/// `CLASS` or `VALUETYPE` for a named type.
#[must_use]
pub fn class_or_value_type(module: &Module, id: TypeRefId) -> ElementType {
    let is_value_type = match module.type_ref(id) {
        TypeReference::Primitive(primitive) => primitive.is_value_type(),
        TypeReference::Definition(def) => module.type_def(*def).is_value_type,
        TypeReference::Namespace { is_value_type, .. }
        | TypeReference::Nested { is_value_type, .. } => *is_value_type,
        _ => false,
    };
    if is_value_type {
        ElementType::ValueType
    } else {
        ElementType::Class
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PrimitiveType, ResolutionScope};
    use crate::tables::TableId;

    /// Hands out TypeRef rows in first-seen order.
    #[derive(Default)]
    struct Rows(Vec<TypeRefId>);

    impl TypeHandleResolver for Rows {
        fn type_def_or_ref(&mut self, _module: &Module, id: TypeRefId) -> Result<CodedIndex> {
            let row = match self.0.iter().position(|&seen| seen == id) {
                Some(i) => i + 1,
                None => {
                    self.0.push(id);
                    self.0.len()
                }
            };
            Ok(CodedIndex::new(TableId::TypeRef, row as u32))
        }
    }

    fn named(module: &mut Module, name: &str, is_value_type: bool) -> TypeRefId {
        module.add_type_ref(TypeReference::Namespace {
            scope: ResolutionScope::Module,
            namespace: "N".to_string(),
            name: name.to_string(),
            is_value_type,
        })
    }

    #[test]
    fn test_static_method() {
        let mut module = Module::new("m");
        let void = module.primitive(PrimitiveType::Void);
        let int32 = module.primitive(PrimitiveType::Int32);
        let string = module.primitive(PrimitiveType::String);
        let sig = MethodSignature::new_static(void, vec![int32, string]);

        let mut rows = Rows::default();
        let mut enc = SignatureEncoder::new(&module, &mut rows);
        enc.method(&sig).unwrap();
        assert_eq!(enc.finish(), vec![0x00, 0x02, 0x01, 0x08, 0x0E]);
    }

    #[test]
    fn test_generic_instance_method() {
        let mut module = Module::new("m");
        let t = named(&mut module, "T", false);
        let s = named(&mut module, "S", true);
        let arg = module.add_type_ref(TypeReference::GenericMethodParameter(0));
        let list = module.add_type_ref(TypeReference::GenericInstance {
            generic: t,
            arguments: vec![arg, s],
        });
        let mut sig = MethodSignature::new_instance(list, vec![]);
        sig.generic_parameter_count = 1;

        let mut rows = Rows::default();
        let mut enc = SignatureEncoder::new(&module, &mut rows);
        enc.method(&sig).unwrap();
        // HASTHIS|GENERIC, 1 generic param, 0 params, GENERICINST CLASS T<!!0, valuetype S>
        assert_eq!(
            enc.finish(),
            vec![0x30, 0x01, 0x00, 0x15, 0x12, 0x05, 0x02, 0x1E, 0x00, 0x11, 0x09]
        );
    }

    #[test]
    fn test_array_shapes_follow_element() {
        let mut module = Module::new("m");
        let int32 = module.primitive(PrimitiveType::Int32);
        let inner = module.add_type_ref(TypeReference::Array {
            element: int32,
            rank: 2,
            sizes: vec![],
            lower_bounds: vec![0, -1],
        });
        let ptr = module.add_type_ref(TypeReference::Pointer(inner));
        let outer = module.add_type_ref(TypeReference::Array {
            element: ptr,
            rank: 1,
            sizes: vec![3],
            lower_bounds: vec![],
        });

        let mut rows = Rows::default();
        let mut enc = SignatureEncoder::new(&module, &mut rows);
        enc.type_ref(outer).unwrap();
        assert_eq!(
            enc.finish(),
            vec![
                0x14, 0x0F, 0x14, 0x08, // ARRAY PTR ARRAY int32
                0x02, 0x00, 0x02, 0x00, 0x7F, // inner shape: rank 2, bounds 0, -1
                0x01, 0x01, 0x03, 0x00, // outer shape: rank 1, size 3
            ]
        );
    }

    #[test]
    fn test_deep_chain() {
        let mut module = Module::new("m");
        let mut current = module.primitive(PrimitiveType::Byte);
        for _ in 0..10_000 {
            current = module.add_type_ref(TypeReference::SzArray(current));
        }
        let mut rows = Rows::default();
        let mut enc = SignatureEncoder::new(&module, &mut rows);
        enc.type_ref(current).unwrap();
        let blob = enc.finish();
        assert_eq!(blob.len(), 10_001);
        assert_eq!(blob[10_000], 0x05);
    }

    #[test]
    fn test_locals_and_modifiers() {
        let mut module = Module::new("m");
        let int32 = module.primitive(PrimitiveType::Int32);
        let volatile = named(&mut module, "IsVolatile", false);
        let local = LocalVariable {
            name: None,
            pinned: true,
            local_type: ParameterType {
                modifiers: vec![CustomModifier {
                    required: true,
                    modifier: volatile,
                }],
                by_ref: true,
                type_ref: int32,
            },
            hidden: false,
        };

        let mut rows = Rows::default();
        let mut enc = SignatureEncoder::new(&module, &mut rows);
        enc.locals(&[local]).unwrap();
        assert_eq!(enc.finish(), vec![0x07, 0x01, 0x1F, 0x05, 0x45, 0x10, 0x08]);
    }

    #[test]
    fn test_vararg_sentinel() {
        let mut module = Module::new("m");
        let void = module.primitive(PrimitiveType::Void);
        let int32 = module.primitive(PrimitiveType::Int32);
        let mut sig = MethodSignature::new_static(void, vec![int32]);
        sig.kind = MethodCallKind::VarArg;
        sig.vararg_parameters.push(ParameterType::new(int32));

        let mut rows = Rows::default();
        let mut enc = SignatureEncoder::new(&module, &mut rows);
        enc.method(&sig).unwrap();
        assert_eq!(enc.finish(), vec![0x05, 0x02, 0x01, 0x08, 0x41, 0x08]);
    }

    #[test]
    fn test_field_and_property() {
        let mut module = Module::new("m");
        let int32 = module.primitive(PrimitiveType::Int32);
        let mut rows = Rows::default();

        let mut enc = SignatureEncoder::new(&module, &mut rows);
        enc.field(&ParameterType::new(int32)).unwrap();
        assert_eq!(enc.finish(), vec![0x06, 0x08]);

        let mut enc = SignatureEncoder::new(&module, &mut rows);
        enc.property(true, &ParameterType::new(int32), &[ParameterType::new(int32)])
            .unwrap();
        assert_eq!(enc.finish(), vec![0x28, 0x01, 0x08, 0x08]);
    }
}
