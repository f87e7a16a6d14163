// This module defines the parsed-source data model consumed by the lowering
// backends: a File holds the architecture tag plus the functions and
// DATA/GLOBL entries of one assembly compilation unit, a Func is one TEXT
// routine with its attribute word and instruction stream, and an Instr is a
// single upper-cased opcode with its ordered operand list and the original
// source line retained for diagnostics. Operands are a tagged union over the
// seven Plan 9 operand shapes (immediate, register, memory with
// base/index/scale/displacement, FP slot, FP slot address, SB symbol, label)
// plus register lists for NEON load/store forms and raw identifiers for MRS
// system registers. Registers are string-backed names so one model serves
// both architectures; backends interpret them (X/Y vector names on amd64,
// Vn.B16 arrangements and R1<<n shifted forms on arm64).

//! Parsed Plan 9 assembly data model (the parser output schema).

use std::fmt;

/// Architecture tag of a parsed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Amd64 => f.write_str("amd64"),
            Arch::Arm64 => f.write_str("arm64"),
        }
    }
}

/// An architectural register name as written in the source (`AX`, `R12`,
/// `X7`, `V3.B16`, `F0`, `ZR`). Comparison is by exact text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(Box<str>);

impl Reg {
    pub fn new(name: impl AsRef<str>) -> Reg {
        Reg(name.as_ref().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Reg {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Reg {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl From<&str> for Reg {
    fn from(s: &str) -> Reg {
        Reg::new(s)
    }
}

/// A `d(B)(I*s)` effective address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mem {
    pub base: Reg,
    pub index: Option<Reg>,
    /// Index scale, one of 1, 2, 4, 8.
    pub scale: u8,
    pub disp: i64,
}

impl Mem {
    pub fn base(base: impl AsRef<str>) -> Mem {
        Mem {
            base: Reg::new(base),
            index: None,
            scale: 1,
            disp: 0,
        }
    }

    pub fn base_disp(base: impl AsRef<str>, disp: i64) -> Mem {
        Mem {
            disp,
            ..Mem::base(base)
        }
    }
}

/// One operand of a parsed instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `$N` immediate.
    Imm(i64),
    /// Architectural register.
    Reg(Reg),
    /// `d(B)(I*s)` memory reference.
    Mem(Mem),
    /// `name+off(FP)` caller-visible argument/result slot.
    Fp { name: Box<str>, offset: i64 },
    /// `$name+off(FP)` literal address of an FP slot.
    FpAddr { name: Box<str>, offset: i64 },
    /// `sym(SB)` global reference, possibly `$`-prefixed for address-of.
    Sym(Box<str>),
    /// `[V1.B16, V2.B16]` NEON register list.
    RegList(Vec<Reg>),
    /// Raw identifier (`MRS` system register names).
    Ident(Box<str>),
    /// Branch target label within the function.
    Label(Box<str>),
}

impl Operand {
    pub fn sym(s: impl AsRef<str>) -> Operand {
        Operand::Sym(s.as_ref().into())
    }

    pub fn label(s: impl AsRef<str>) -> Operand {
        Operand::Label(s.as_ref().into())
    }

    pub fn fp(name: impl AsRef<str>, offset: i64) -> Operand {
        Operand::Fp {
            name: name.as_ref().into(),
            offset,
        }
    }

    pub fn reg(name: impl AsRef<str>) -> Operand {
        Operand::Reg(Reg::new(name))
    }

    /// The register payload, if this is a plain register operand.
    pub fn as_reg(&self) -> Option<&Reg> {
        match self {
            Operand::Reg(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Imm(v) => write!(f, "${v}"),
            Operand::Reg(r) => write!(f, "{r}"),
            Operand::Mem(m) => {
                if m.disp != 0 {
                    write!(f, "{}", m.disp)?;
                }
                write!(f, "({})", m.base)?;
                if let Some(idx) = &m.index {
                    write!(f, "({idx}*{})", m.scale)?;
                }
                Ok(())
            }
            Operand::Fp { name, offset } => write!(f, "{name}+{offset}(FP)"),
            Operand::FpAddr { name, offset } => write!(f, "${name}+{offset}(FP)"),
            Operand::Sym(s) => f.write_str(s),
            Operand::RegList(regs) => {
                f.write_str("[")?;
                for (i, r) in regs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{r}")?;
                }
                f.write_str("]")
            }
            Operand::Ident(s) => f.write_str(s),
            Operand::Label(s) => f.write_str(s),
        }
    }
}

/// A single assembled instruction or pseudo-op.
#[derive(Debug, Clone)]
pub struct Instr {
    /// Upper-cased mnemonic, possibly carrying a suffix (`MOVD.P`).
    pub op: Box<str>,
    pub args: Vec<Operand>,
    /// Original source line, kept verbatim for diagnostics.
    pub raw: String,
    pub line: u32,
}

impl Instr {
    pub fn new(op: impl AsRef<str>, args: Vec<Operand>) -> Instr {
        Instr {
            op: op.as_ref().to_ascii_uppercase().into(),
            args,
            raw: String::new(),
            line: 0,
        }
    }

    /// Mnemonic with any `.`-suffix removed (`MOVD.P` -> `MOVD`).
    pub fn base_op(&self) -> &str {
        match self.op.find('.') {
            Some(dot) => &self.op[..dot],
            None => &self.op,
        }
    }

    /// True when the mnemonic carries the given suffix (`.P`, `.W`).
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.op
            .find('.')
            .map(|dot| self.op[dot..].split('.').any(|s| s == &suffix[1..]))
            .unwrap_or(false)
    }
}

/// One assembly routine.
#[derive(Debug, Clone)]
pub struct Func {
    /// Exported symbol as written in the TEXT directive (dots normalized).
    pub sym: String,
    /// Raw attribute word text (`NOSPLIT`, frame/arg sizes as written).
    pub attrs: String,
    pub frame_size: i64,
    pub arg_size: i64,
    pub instrs: Vec<Instr>,
}

/// A `DATA sym+off(SB)/width, $value` entry.
#[derive(Debug, Clone)]
pub struct DataDef {
    pub sym: String,
    pub offset: i64,
    pub width: u8,
    pub value: DataValue,
}

/// Initializer payload of a DATA entry.
#[derive(Debug, Clone)]
pub enum DataValue {
    Int(i64),
    Bytes(Vec<u8>),
    /// Address of another symbol; materialized as a ptr-sized relocation.
    SymAddr(String),
}

/// A `GLOBL sym(SB), flags, $size` entry.
#[derive(Debug, Clone)]
pub struct GloblDef {
    pub sym: String,
    pub size: i64,
    pub rodata: bool,
}

/// One parsed asm compilation unit. Constructed by the parser, read-only to
/// the lowering core.
#[derive(Debug, Clone)]
pub struct File {
    pub arch: Arch,
    pub funcs: Vec<Func>,
    pub data: Vec<DataDef>,
    pub globls: Vec<GloblDef>,
}

impl File {
    pub fn new(arch: Arch) -> File {
        File {
            arch,
            funcs: Vec::new(),
            data: Vec::new(),
            globls: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_op_strips_suffix() {
        let ins = Instr::new("MOVD.P", vec![]);
        assert_eq!(ins.base_op(), "MOVD");
        assert!(ins.has_suffix(".P"));
        assert!(!ins.has_suffix(".W"));
    }

    #[test]
    fn operand_display_round_trips_shapes() {
        let m = Operand::Mem(Mem {
            base: Reg::new("BX"),
            index: Some(Reg::new("CX")),
            scale: 8,
            disp: 16,
        });
        assert_eq!(m.to_string(), "16(BX)(CX*8)");
        assert_eq!(Operand::fp("a", 8).to_string(), "a+8(FP)");
    }
}
