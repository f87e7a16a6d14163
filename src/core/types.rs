// This module carries the LLVM-level half of the external interface: the
// LlvmType model used by signatures and operand evaluation (scalar integers,
// ptr, float/double, and literal structs for multi-result functions), and the
// signature table schema (FuncSig, FrameLayout, FrameSlot) that maps Plan 9
// FP-relative argument/result slots onto LLVM formal parameters. FrameSlot
// field indices support aggregate formals decomposed into fields (string =
// {ptr, len}, slice = {ptr, len, cap}); field -1 denotes the whole value.
// Types render to LLVM syntax through Display so the textual writer can embed
// them directly.

//! LLVM-level types and the per-function signature table schema.

use std::fmt;

use super::source::Reg;

/// An LLVM type as used by signatures and lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlvmType {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    Ptr,
    Float,
    Double,
    /// Literal struct, e.g. `{ i64, i64 }` for multi-result returns.
    Struct(Vec<LlvmType>),
}

impl LlvmType {
    /// Integer bit width, if this is an integer type.
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            LlvmType::I1 => Some(1),
            LlvmType::I8 => Some(8),
            LlvmType::I16 => Some(16),
            LlvmType::I32 => Some(32),
            LlvmType::I64 => Some(64),
            _ => None,
        }
    }

    /// The constant rendering of this type's zero value.
    pub fn zero_value(&self) -> &'static str {
        match self {
            LlvmType::Ptr => "null",
            LlvmType::Float | LlvmType::Double => "0.0",
            LlvmType::Struct(_) => "zeroinitializer",
            _ => "0",
        }
    }

    /// Parse the textual spelling used by signature tables.
    pub fn parse(s: &str) -> Option<LlvmType> {
        let s = s.trim();
        Some(match s {
            "void" => LlvmType::Void,
            "i1" => LlvmType::I1,
            "i8" => LlvmType::I8,
            "i16" => LlvmType::I16,
            "i32" => LlvmType::I32,
            "i64" => LlvmType::I64,
            "ptr" => LlvmType::Ptr,
            "float" => LlvmType::Float,
            "double" => LlvmType::Double,
            _ => {
                let inner = s.strip_prefix('{')?.strip_suffix('}')?;
                let mut fields = Vec::new();
                for part in inner.split(',') {
                    fields.push(LlvmType::parse(part)?);
                }
                LlvmType::Struct(fields)
            }
        })
    }
}

impl fmt::Display for LlvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlvmType::Void => f.write_str("void"),
            LlvmType::I1 => f.write_str("i1"),
            LlvmType::I8 => f.write_str("i8"),
            LlvmType::I16 => f.write_str("i16"),
            LlvmType::I32 => f.write_str("i32"),
            LlvmType::I64 => f.write_str("i64"),
            LlvmType::Ptr => f.write_str("ptr"),
            LlvmType::Float => f.write_str("float"),
            LlvmType::Double => f.write_str("double"),
            LlvmType::Struct(fields) => {
                f.write_str("{ ")?;
                for (i, ty) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

/// One typed byte offset within the FP frame, mapping to one scalar or one
/// field of an aggregate parameter/result.
#[derive(Debug, Clone)]
pub struct FrameSlot {
    /// Byte offset relative to FP.
    pub offset: i64,
    pub ty: LlvmType,
    /// Index of the enclosing formal parameter or result.
    pub index: usize,
    /// Field index within a decomposed aggregate formal; -1 for whole value.
    pub field: i32,
}

impl FrameSlot {
    pub fn scalar(offset: i64, ty: LlvmType, index: usize) -> FrameSlot {
        FrameSlot {
            offset,
            ty,
            index,
            field: -1,
        }
    }
}

/// Ordered FP slot layouts for parameters and results.
#[derive(Debug, Clone, Default)]
pub struct FrameLayout {
    pub params: Vec<FrameSlot>,
    pub results: Vec<FrameSlot>,
}

/// Externally supplied signature for one function symbol.
#[derive(Debug, Clone)]
pub struct FuncSig {
    /// Resolved LLVM global name.
    pub name: String,
    pub args: Vec<LlvmType>,
    pub ret: LlvmType,
    pub frame: FrameLayout,
    /// Optional override of the register-based argument ABI.
    pub arg_regs: Vec<Reg>,
    /// Optional attribute-group reference attached to the definition, e.g. `#0`.
    pub attrs: Option<String>,
}

impl FuncSig {
    /// A register-in/void-out stub used when a callee has no known signature.
    pub fn void_stub(name: &str) -> FuncSig {
        FuncSig {
            name: name.to_string(),
            args: Vec::new(),
            ret: LlvmType::Void,
            frame: FrameLayout::default(),
            arg_regs: Vec::new(),
            attrs: None,
        }
    }

    /// Whether `other` can be tail-called with this function's own formals.
    pub fn same_shape(&self, other: &FuncSig) -> bool {
        self.ret == other.ret && self.args == other.args
    }
}

/// Render a symbol as an LLVM global reference, quoting when needed.
pub fn llvm_global(name: &str) -> String {
    let plain = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$' || c == '-');
    if plain && !name.is_empty() {
        format!("@{name}")
    } else {
        format!("@\"{name}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_type_renders_literally() {
        let ty = LlvmType::Struct(vec![LlvmType::I64, LlvmType::Ptr]);
        assert_eq!(ty.to_string(), "{ i64, ptr }");
        assert_eq!(LlvmType::parse("{ i64, ptr }"), Some(ty));
    }

    #[test]
    fn globals_quote_exotic_names() {
        assert_eq!(llvm_global("runtime.memmove"), "@runtime.memmove");
        assert_eq!(llvm_global("a<b>"), "@\"a<b>\"");
    }
}
