//! plan9ll - Plan 9 assembly to LLVM IR translation.
//!
//! plan9ll lowers Plan 9-style assembly (the dialect the Go toolchain uses
//! for hand-written amd64 and arm64 routines) into LLVM IR functions that
//! are ABI-compatible with their high-level declarations, so an LLVM-based
//! toolchain can compile code that would otherwise require a Plan 9
//! assembler.
//!
//! # Primary usage
//!
//! ```
//! use plan9ll::{parse, translate, Arch, Options, FuncSig, FrameLayout, FrameSlot, LlvmType};
//! use std::collections::HashMap;
//!
//! let file = parse(Arch::Amd64, "
//! TEXT add2(SB),NOSPLIT,$0-24
//!     MOVQ a+0(FP), AX
//!     ADDQ b+8(FP), AX
//!     MOVQ AX, ret+16(FP)
//!     RET
//! ").unwrap();
//!
//! let mut sigs = HashMap::new();
//! sigs.insert("add2".to_string(), FuncSig {
//!     name: "add2".to_string(),
//!     args: vec![LlvmType::I64, LlvmType::I64],
//!     ret: LlvmType::I64,
//!     frame: FrameLayout {
//!         params: vec![
//!             FrameSlot::scalar(0, LlvmType::I64, 0),
//!             FrameSlot::scalar(8, LlvmType::I64, 1),
//!         ],
//!         results: vec![FrameSlot::scalar(16, LlvmType::I64, 0)],
//!     },
//!     arg_regs: vec![],
//!     attrs: None,
//! });
//!
//! let ir = translate(&file, &Options { sigs, ..Options::default() }).unwrap();
//! assert!(ir.contains("define i64 @add2"));
//! ```
//!
//! # Architecture
//!
//! - [`core`] - shared infrastructure (data model, types, errors, IR writer,
//!   block discovery, arena session)
//! - [`amd64`] - x86-64 lowering backend
//! - [`arm64`] - AArch64 lowering backend
//! - [`parser`] - minimal Plan 9 assembly parser
//! - [`prelude`] - target triples and intrinsic declarations
//! - [`translate`] - module translation pipeline

pub mod amd64;
pub mod arm64;
pub mod core;
pub mod parser;
pub mod prelude;
pub mod translate;

pub use crate::core::{
    Arch, DataDef, DataValue, File, FrameLayout, FrameSlot, Func, FuncSig, GloblDef, Instr,
    LlvmType, Mem, Operand, Reg, Session, SessionStats, TranslateError, TranslateResult,
};
pub use crate::parser::parse;
pub use crate::prelude::target_triple;
pub use crate::translate::{default_resolve, translate, Options};

#[cfg(feature = "llvm")]
pub use crate::translate::translate_module;
