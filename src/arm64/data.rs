// Data movement family: the MOV{D,W,WU,H,HU,B,BU} spellings over all operand
// shapes with the Plan 9 width conventions (signed loads sign-extend into
// the 64-bit register, U forms zero-extend; stores truncate to their width),
// including pre-indexed (.W) and post-indexed (.P) memory forms, and the
// LDP/STP register pairs. FP-slot destinations write the declared result
// allocas; FP-slot sources read the function's formal parameters.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, LlvmType, Operand, TranslateResult};

use super::eval::AddrMode;
use super::ops::Op;
use super::FnCtx;

fn int_ty(bits: u32) -> &'static str {
    match bits {
        8 => "i8",
        16 => "i16",
        32 => "i32",
        _ => "i64",
    }
}

fn llvm_ty(bits: u32) -> LlvmType {
    match bits {
        8 => LlvmType::I8,
        16 => LlvmType::I16,
        32 => LlvmType::I32,
        _ => LlvmType::I64,
    }
}

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
    post_inc: bool,
    pre_index: bool,
) -> TranslateResult<Option<Flow>> {
    let mode = AddrMode::from_flags(post_inc, pre_index);
    match op {
        Op::Movd => mov(c, ins, 64, false, mode),
        Op::Movw => mov(c, ins, 32, true, mode),
        Op::Movwu => mov(c, ins, 32, false, mode),
        Op::Movh => mov(c, ins, 16, true, mode),
        Op::Movhu => mov(c, ins, 16, false, mode),
        Op::Movb => mov(c, ins, 8, true, mode),
        Op::Movbu => mov(c, ins, 8, false, mode),
        Op::Ldp => ldp(c, ins, mode),
        Op::Stp => stp(c, ins, mode),
        _ => Ok(None),
    }
}

/// MOV src, dst at a given width. `signed` selects the extension applied
/// when a narrow value lands in a register.
fn mov(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    bits: u32,
    signed: bool,
    mode: AddrMode,
) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    // Vector-register MOVD forms (FMOV aliases) belong to other families.
    if ins.args.iter().any(|a| {
        a.as_reg()
            .map(|r| super::v_reg_base(r).is_some() || super::f_reg_base(r).is_some())
            .unwrap_or(false)
    }) {
        return Ok(None);
    }
    let ty = int_ty(bits);

    // Narrow value headed for a register, extended per the mnemonic.
    let widen = |c: &mut FnCtx<'_>, v: &str| -> String {
        if bits == 64 {
            return v.to_string();
        }
        let t = c.fresh();
        if signed {
            emit!(c.w, "{t} = sext {ty} {v} to i64");
        } else {
            emit!(c.w, "{t} = zext {ty} {v} to i64");
        }
        t
    };

    let value64: String = match &ins.args[0] {
        Operand::Mem(m) => {
            let m = m.clone();
            let (addr, base, inc) = c.addr_i64(&m, mode, ins)?;
            let p = c.ptr_from_addr(&addr);
            let v = c.fresh();
            emit!(c.w, "{v} = load {ty}, ptr {p}, align 1");
            if mode == AddrMode::Post {
                let inc = if inc == 0 { bits as i64 / 8 } else { inc };
                c.apply_post_inc(&base, inc)?;
            }
            widen(c, &v)
        }
        Operand::Sym(s) if !s.starts_with('$') => {
            let p = c.ptr_from_sym(&s.clone())?;
            let v = c.fresh();
            emit!(c.w, "{v} = load {ty}, ptr {p}, align 1");
            widen(c, &v)
        }
        Operand::Imm(v) => match bits {
            8 => (*v as i8 as i64).to_string(),
            16 => (*v as i16 as i64).to_string(),
            32 if signed => (*v as i32 as i64).to_string(),
            32 => (*v as u32 as i64).to_string(),
            _ => v.to_string(),
        },
        other => {
            let v = c.eval_i64(other, ins)?;
            if bits == 64 {
                v
            } else {
                let tr = c.fresh();
                emit!(c.w, "{tr} = trunc i64 {v} to {ty}");
                widen(c, &tr)
            }
        }
    };

    match &ins.args[1] {
        Operand::Reg(r) => {
            c.store_reg(&r.clone(), &value64)?;
        }
        Operand::Mem(m) => {
            let m = m.clone();
            let narrowed = if bits == 64 {
                value64
            } else {
                let t = c.fresh();
                emit!(c.w, "{t} = trunc i64 {value64} to {ty}");
                t
            };
            let (addr, base, inc) = c.addr_i64(&m, mode, ins)?;
            let p = c.ptr_from_addr(&addr);
            emit!(c.w, "store {ty} {narrowed}, ptr {p}, align 1");
            if mode == AddrMode::Post {
                let inc = if inc == 0 { bits as i64 / 8 } else { inc };
                c.apply_post_inc(&base, inc)?;
            }
        }
        Operand::Fp { offset, .. } => {
            // Result slot write; the slot cast narrows as needed.
            let val_ty = llvm_ty(64);
            c.store_fp_result(*offset, &val_ty, &value64, ins)?;
        }
        Operand::Sym(s) if !s.starts_with('$') => {
            let narrowed = if bits == 64 {
                value64
            } else {
                let t = c.fresh();
                emit!(c.w, "{t} = trunc i64 {value64} to {ty}");
                t
            };
            let p = c.ptr_from_sym(&s.clone())?;
            emit!(c.w, "store {ty} {narrowed}, ptr {p}, align 1");
        }
        _ => return Err(c.unsupported_operand(ins)),
    }
    Ok(Some(Flow::Next))
}

/// LDP mem, (Ra, Rb): load a 16-byte pair.
fn ldp(c: &mut FnCtx<'_>, ins: &Instr, mode: AddrMode) -> TranslateResult<Option<Flow>> {
    let (m, regs) = match (&ins.args[..], ins.args.len()) {
        ([Operand::Mem(m), Operand::RegList(regs)], 2) if regs.len() == 2 => {
            (m.clone(), regs.clone())
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let (addr, base, inc) = c.addr_i64(&m, mode, ins)?;
    for (i, r) in regs.iter().enumerate() {
        let ai = if i == 0 {
            addr.clone()
        } else {
            let t = c.fresh();
            emit!(c.w, "{t} = add i64 {addr}, 8");
            t
        };
        let p = c.ptr_from_addr(&ai);
        let v = c.fresh();
        emit!(c.w, "{v} = load i64, ptr {p}, align 1");
        c.store_reg(r, &v)?;
    }
    if mode == AddrMode::Post {
        let inc = if inc == 0 { 16 } else { inc };
        c.apply_post_inc(&base, inc)?;
    }
    Ok(Some(Flow::Next))
}

/// STP (Ra, Rb), mem: store a 16-byte pair.
fn stp(c: &mut FnCtx<'_>, ins: &Instr, mode: AddrMode) -> TranslateResult<Option<Flow>> {
    let (regs, m) = match (&ins.args[..], ins.args.len()) {
        ([Operand::RegList(regs), Operand::Mem(m)], 2) if regs.len() == 2 => {
            (regs.clone(), m.clone())
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let (addr, base, inc) = c.addr_i64(&m, mode, ins)?;
    for (i, r) in regs.iter().enumerate() {
        let v = c.load_reg(r)?;
        let ai = if i == 0 {
            addr.clone()
        } else {
            let t = c.fresh();
            emit!(c.w, "{t} = add i64 {addr}, 8");
            t
        };
        let p = c.ptr_from_addr(&ai);
        emit!(c.w, "store i64 {v}, ptr {p}, align 1");
    }
    if mode == AddrMode::Post {
        let inc = if inc == 0 { 16 } else { inc };
        c.apply_post_inc(&base, inc)?;
    }
    Ok(Some(Flow::Next))
}
