// Syscall and feature-probe family. SYSCALL marshals the Linux argument
// registers into the external @syscall helper declared by the prelude.
// CPUID/XGETBV lower to inline asm with the hardware's register constraints
// so linked code observes real host values; RDTSC/RDTSCP store zero, an
// explicitly recorded approximation (consumers needing real timestamps must
// not be routed through this translator).

use log::warn;

use crate::core::writer::emit;
use crate::core::{Flow, Instr, Reg, TranslateResult};

use super::ops::Op;
use super::FnCtx;

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Syscall => {
            let num = c.load_reg(&Reg::new("AX"))?;
            let mut args = vec![format!("i64 {num}")];
            for r in ["DI", "SI", "DX", "R10", "R8", "R9"] {
                let v = c.load_reg(&Reg::new(r))?;
                args.push(format!("i64 {v}"));
            }
            let t = c.fresh();
            emit!(c.w, "{t} = call i64 @syscall({})", args.join(", "));
            c.store_reg(&Reg::new("AX"), &t)?;
            Ok(Some(Flow::Next))
        }

        Op::Cpuid => {
            let ax64 = c.load_reg(&Reg::new("AX"))?;
            let cx64 = c.load_reg(&Reg::new("CX"))?;
            let ax32 = c.fresh();
            emit!(c.w, "{ax32} = trunc i64 {ax64} to i32");
            let cx32 = c.fresh();
            emit!(c.w, "{cx32} = trunc i64 {cx64} to i32");
            let call = c.fresh();
            emit!(
                c.w,
                "{call} = call {{ i32, i32, i32, i32 }} asm sideeffect \"cpuid\", \"={{ax}},={{bx}},={{cx}},={{dx}},{{ax}},{{cx}},~{{dirflag}},~{{fpsr}},~{{flags}}\"(i32 {ax32}, i32 {cx32})"
            );
            for (idx, reg) in [(0, "AX"), (1, "BX"), (2, "CX"), (3, "DX")] {
                let part = c.fresh();
                emit!(
                    c.w,
                    "{part} = extractvalue {{ i32, i32, i32, i32 }} {call}, {idx}"
                );
                let wide = c.fresh();
                emit!(c.w, "{wide} = zext i32 {part} to i64");
                c.store_reg(&Reg::new(reg), &wide)?;
            }
            Ok(Some(Flow::Next))
        }

        Op::Xgetbv => {
            let cx64 = c.load_reg(&Reg::new("CX"))?;
            let cx32 = c.fresh();
            emit!(c.w, "{cx32} = trunc i64 {cx64} to i32");
            let call = c.fresh();
            emit!(
                c.w,
                "{call} = call {{ i32, i32 }} asm sideeffect \"xgetbv\", \"={{ax}},={{dx}},{{cx}},~{{dirflag}},~{{fpsr}},~{{flags}}\"(i32 {cx32})"
            );
            for (idx, reg) in [(0, "AX"), (1, "DX")] {
                let part = c.fresh();
                emit!(c.w, "{part} = extractvalue {{ i32, i32 }} {call}, {idx}");
                let wide = c.fresh();
                emit!(c.w, "{wide} = zext i32 {part} to i64");
                c.store_reg(&Reg::new(reg), &wide)?;
            }
            Ok(Some(Flow::Next))
        }

        Op::Rdtsc => {
            warn!("RDTSC lowered to zero at line {}", ins.line);
            c.store_reg(&Reg::new("AX"), "0")?;
            c.store_reg(&Reg::new("DX"), "0")?;
            Ok(Some(Flow::Next))
        }
        Op::Rdtscp => {
            warn!("RDTSCP lowered to zero at line {}", ins.line);
            c.store_reg(&Reg::new("AX"), "0")?;
            c.store_reg(&Reg::new("DX"), "0")?;
            c.store_reg(&Reg::new("CX"), "0")?;
            Ok(Some(Flow::Next))
        }

        _ => Ok(None),
    }
}
