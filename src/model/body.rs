//! Method bodies and their debug information.

use widestring::U16String;

use crate::constant::ConstantValue;

use super::{
    AssemblyRefId, CustomDebugInfo, DocumentId, ImportScopeId, MemberRefId, MethodDefId,
    MethodSignature, ParameterType, TypeRefId,
};

/// Kind of an exception handling clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionRegionKind {
    /// Typed handler; carries the caught type.
    Catch(TypeRefId),
    /// Filter handler; carries the IL offset of the filter block.
    Filter(u32),
    Finally,
    Fault,
}

/// A protected region and its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionRegion {
    pub kind: ExceptionRegionKind,
    pub try_offset: u32,
    pub try_length: u32,
    pub handler_offset: u32,
    pub handler_length: u32,
}

/// A metadata entity an IL instruction refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum IlOperand {
    Type(TypeRefId),
    Member(MemberRefId),
    /// `ldstr` literal.
    String(U16String),
    /// `calli` call site signature.
    Signature(MethodSignature),
}

/// A 4-byte token slot in the IL stream to be filled with the token of `operand`.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenFixup {
    pub offset: u32,
    pub operand: IlOperand,
}

/// A local variable slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    /// Name recorded in debug metadata; unnamed slots are not.
    pub name: Option<String>,
    pub pinned: bool,
    pub local_type: ParameterType,
    /// Hidden from the debugger.
    pub hidden: bool,
}

/// A named constant in a local scope.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalConstant {
    pub name: String,
    pub value: ConstantValue,
    /// Enum type of the value, or the static type of a null reference.
    pub constant_type: Option<TypeRefId>,
}

/// A lexical scope of a method body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalScope {
    pub start_offset: u32,
    pub length: u32,
    /// Indices into [`MethodBody::locals`].
    pub variables: Vec<usize>,
    pub constants: Vec<LocalConstant>,
}

/// Line value of a hidden sequence point.
pub const HIDDEN_LINE: u32 = 0x00FE_EFEE;

/// Maps an IL offset to a source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencePoint {
    pub document: DocumentId,
    pub il_offset: u32,
    pub start_line: u32,
    pub start_column: u16,
    pub end_line: u32,
    pub end_column: u16,
}

impl SequencePoint {
    /// A point that hides `il_offset` from the debugger.
    #[must_use]
    pub fn hidden(document: DocumentId, il_offset: u32) -> Self {
        Self {
            document,
            il_offset,
            start_line: HIDDEN_LINE,
            start_column: 0,
            end_line: HIDDEN_LINE,
            end_column: 0,
        }
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.start_line == HIDDEN_LINE
    }
}

/// The body of a method.
#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    pub il: Vec<u8>,
    pub max_stack: u16,
    /// Zero-initialize locals (`localsinit`).
    pub init_locals: bool,
    pub locals: Vec<LocalVariable>,
    pub exception_regions: Vec<ExceptionRegion>,
    pub fixups: Vec<TokenFixup>,
    pub sequence_points: Vec<SequencePoint>,
    pub scopes: Vec<LocalScope>,
    pub import_scope: Option<ImportScopeId>,
    /// For a `MoveNext` method, the async or iterator method it implements.
    pub state_machine_kickoff: Option<MethodDefId>,
    pub custom_debug_info: Vec<CustomDebugInfo>,
}

impl MethodBody {
    /// A body that is just the given IL.
    #[must_use]
    pub fn new(il: Vec<u8>, max_stack: u16) -> Self {
        Self {
            il,
            max_stack,
            ..Self::default()
        }
    }
}

/// What an import brings into scope.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportTarget {
    Namespace {
        assembly: Option<AssemblyRefId>,
        namespace: String,
    },
    Type(TypeRefId),
    XmlNamespace(String),
    /// `extern alias`, with the aliased assembly when known.
    AssemblyAlias(Option<AssemblyRefId>),
}

/// One import of an import scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub alias: Option<String>,
    pub target: ImportTarget,
}

/// A set of imports; scopes form chains through `parent`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportScope {
    pub parent: Option<ImportScopeId>,
    pub imports: Vec<Import>,
}
