//! Declaration model
//!
//! Declarations are pure, serializable data: the extraction pipeline
//! produces an ordered sequence of these and hands it to a registrar.
//! No declaration mutates another.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One synthesized host-representable construct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    /// Named constant (from a macro or a probe result)
    Constant(ConstantDecl),
    /// Aggregate type definition (struct or union)
    Type(StructDecl),
    /// Enumeration with inline value table
    Enum(EnumDecl),
    /// Function signature bound to a library symbol
    Function(FunctionDecl),
    /// Type alias (typedef)
    Alias(AliasDecl),
    /// Generated zero-value constructor for an aggregate type
    Ctor(CtorDecl),
    /// Informational record: logged by the registrar, never registered
    Info(String),
}

impl Declaration {
    /// Primary symbol name, if this declaration registers one
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Constant(c) => Some(&c.name),
            Declaration::Type(s) => Some(&s.name),
            Declaration::Enum(e) => Some(&e.name),
            Declaration::Function(f) => Some(&f.name),
            Declaration::Alias(a) => Some(&a.name),
            Declaration::Ctor(_) | Declaration::Info(_) => None,
        }
    }
}

/// Named constant declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantDecl {
    /// Constant name
    pub name: String,
    /// Typed literal value
    pub value: ConstValue,
}

/// Typed literal value of a constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    /// Integer literal
    Int(i64),
    /// Quoted string literal
    Str(String),
    /// Single-character literal
    Char(char),
    /// Passthrough numeric or other expression
    Expr(String),
}

impl ConstValue {
    /// Integer value, if this constant is integral
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Str(s) => write!(f, "{:?}", s),
            ConstValue::Char(c) => write!(f, "{:?}", c),
            ConstValue::Expr(e) => write!(f, "{}", e),
        }
    }
}

/// A C type reference as it appears in a declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CType {
    /// Base type name (e.g. "int", "struct stat", "size_t")
    pub name: String,
    /// Pointer indirection depth (0 for non-pointers)
    pub pointer_depth: u32,
    /// Const qualifier
    pub is_const: bool,
    /// Fixed array length, if this is an array type
    pub array_len: Option<usize>,
}

impl CType {
    /// Plain named type
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pointer_depth: 0,
            is_const: false,
            array_len: None,
        }
    }

    /// Pointer to a named type
    pub fn pointer(name: impl Into<String>, depth: u32) -> Self {
        Self {
            name: name.into(),
            pointer_depth: depth,
            is_const: false,
            array_len: None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            write!(f, "const ")?;
        }
        write!(f, "{}", self.name)?;
        for _ in 0..self.pointer_depth {
            write!(f, "*")?;
        }
        if let Some(len) = self.array_len {
            write!(f, "[{}]", len)?;
        }
        Ok(())
    }
}

/// Struct or union definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    /// Type name
    pub name: String,
    /// True for unions
    pub is_union: bool,
    /// Fields in declaration order
    pub fields: Vec<StructField>,
}

/// One aggregate field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: CType,
}

/// Enumeration definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    /// Enum name (generated for anonymous enums)
    pub name: String,
    /// Members in declaration order, values resolved
    pub members: Vec<EnumMember>,
}

/// One enumerator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    /// Enumerator name
    pub name: String,
    /// Resolved integer value
    pub value: i64,
}

/// Function signature bound to a library symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Symbol name
    pub name: String,
    /// Return type
    pub return_type: CType,
    /// Parameters in declaration order
    pub params: Vec<ParamDecl>,
    /// Trailing `...` parameter
    pub variadic: bool,
    /// Library the symbol resolves from; `None` means the default
    /// library, resolved as a bare symbol without qualification
    pub library: Option<String>,
}

/// One function parameter (name may be empty for unnamed parameters)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub ty: CType,
}

/// Type alias (typedef)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasDecl {
    /// Alias name
    pub name: String,
    /// Aliased type
    pub target: CType,
}

/// Generated zero-value constructor for an aggregate type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtorDecl {
    /// Aggregate type this constructor builds
    pub type_name: String,
    /// Mutable variant flag
    pub mutable: bool,
    /// Zero value per field, in field order
    pub fields: Vec<ZeroValue>,
}

/// Recursively defined zero value for a field
///
/// Terminates for any acyclic aggregate: pointers are scalar nulls, not
/// embedded recursion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZeroValue {
    /// Canonical zero literal of an intrinsic type ("0", "0.0", "null")
    Scalar(String),
    /// Fixed-size sequence of the element's zero value
    Array { elem: Box<ZeroValue>, len: usize },
    /// The type's own zero constructor applied to its field zeros
    Aggregate {
        type_name: String,
        fields: Vec<ZeroValue>,
    },
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declaration::Constant(c) => write!(f, "const {} = {}", c.name, c.value),
            Declaration::Type(s) => {
                let kw = if s.is_union { "union" } else { "struct" };
                write!(f, "{} {} {{ ", kw, s.name)?;
                for (i, field) in s.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, " }}")
            }
            Declaration::Enum(e) => {
                write!(f, "enum {} {{ ", e.name)?;
                for (i, m) in e.members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", m.name, m.value)?;
                }
                write!(f, " }}")
            }
            Declaration::Function(func) => {
                write!(f, "fn {}(", func.name)?;
                for (i, p) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if p.name.is_empty() {
                        write!(f, "{}", p.ty)?;
                    } else {
                        write!(f, "{}: {}", p.name, p.ty)?;
                    }
                }
                if func.variadic {
                    if !func.params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ") -> {}", func.return_type)?;
                match &func.library {
                    Some(lib) => write!(f, " [{}]", lib),
                    None => Ok(()),
                }
            }
            Declaration::Alias(a) => write!(f, "type {} = {}", a.name, a.target),
            Declaration::Ctor(c) => {
                let variant = if c.mutable { "mutable" } else { "immutable" };
                write!(f, "zero {} ({})", c.type_name, variant)
            }
            Declaration::Info(msg) => write!(f, "info: {}", msg),
        }
    }
}
