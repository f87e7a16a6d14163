// Data movement family: MOV{B,W,L,Q} across all operand shapes, the
// sign/zero-extending MOVZX/MOVSX spellings, LEA{L,Q}, the virtual-stack
// PUSH/POP forms, one-shot string helpers (MOVSB/MOVSQ/STOSQ), exchanges and
// the CQO/CDQ sign extensions. Width semantics follow the hardware: 32-bit
// writes zero-extend into the full register, 8/16-bit writes merge into the
// low bits, loads narrower than 64 bits load their exact width.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, LlvmType, Operand, Reg, TranslateResult};

use super::ops::Op;
use super::FnCtx;

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Movq => mov(c, ins, 64),
        Op::Movl => mov(c, ins, 32),
        Op::Movw => mov(c, ins, 16),
        Op::Movb => mov(c, ins, 8),

        Op::Movblzx => mov_ext(c, ins, 8, false),
        Op::Movblsx => mov_ext(c, ins, 8, true),
        Op::Movwlzx => mov_ext(c, ins, 16, false),
        Op::Movwlsx => mov_ext(c, ins, 16, true),
        Op::Movbqzx => mov_ext(c, ins, 8, false),
        Op::Movbqsx => mov_ext(c, ins, 8, true),
        Op::Movwqzx => mov_ext(c, ins, 16, false),
        Op::Movwqsx => mov_ext(c, ins, 16, true),
        Op::Movlqzx => mov_ext(c, ins, 32, false),
        Op::Movlqsx => mov_ext(c, ins, 32, true),

        Op::Leaq | Op::Leal => lea(c, ins, matches!(op, Op::Leal)),

        Op::Pushq => {
            if ins.args.len() != 1 {
                return Err(c.unsupported_operand(ins));
            }
            let v = c.eval_i64(&ins.args[0], ins)?;
            c.push_val(v);
            Ok(Some(Flow::Next))
        }
        Op::Popq => {
            let dst = match ins.args.first().and_then(|a| a.as_reg()) {
                Some(r) => r.clone(),
                None => return Err(c.unsupported_operand(ins)),
            };
            let v = c.pop_val();
            c.store_reg(&dst, &v)?;
            Ok(Some(Flow::Next))
        }
        Op::Pushfq => {
            // Flag register modeling is minimal; preserve stack shape only.
            c.push_val("0".to_string());
            Ok(Some(Flow::Next))
        }
        Op::Popfq => {
            let _ = c.pop_val();
            Ok(Some(Flow::Next))
        }

        Op::Movsb => string_move(c, ins, 8),
        Op::Movsq => string_move(c, ins, 64),
        Op::Stosq => {
            let di = c.load_reg(&Reg::new("DI"))?;
            let ax = c.load_reg(&Reg::new("AX"))?;
            let p = c.ptr_from_addr(&di);
            emit!(c.w, "store i64 {ax}, ptr {p}, align 1");
            let nd = c.fresh();
            emit!(c.w, "{nd} = add i64 {di}, 8");
            c.store_reg(&Reg::new("DI"), &nd)?;
            Ok(Some(Flow::Next))
        }

        Op::Xchgq => xchg(c, ins, 64),
        Op::Xchgl => xchg(c, ins, 32),

        Op::Cqo => {
            let ax = c.load_reg(&Reg::new("AX"))?;
            let s = c.fresh();
            emit!(c.w, "{s} = ashr i64 {ax}, 63");
            c.store_reg(&Reg::new("DX"), &s)?;
            Ok(Some(Flow::Next))
        }
        Op::Cdq => {
            let ax = c.load_reg(&Reg::new("AX"))?;
            let tr = c.fresh();
            emit!(c.w, "{tr} = trunc i64 {ax} to i32");
            let s = c.fresh();
            emit!(c.w, "{s} = ashr i32 {tr}, 31");
            let z = c.fresh();
            emit!(c.w, "{z} = zext i32 {s} to i64");
            c.store_reg(&Reg::new("DX"), &z)?;
            Ok(Some(Flow::Next))
        }

        _ => Ok(None),
    }
}

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

impl<'a> FnCtx<'a> {
    /// Evaluate a source operand at the given width. Memory and symbol
    /// sources load their exact width; everything else narrows from i64.
    pub(super) fn eval_width(
        &mut self,
        op: &Operand,
        bits: u32,
        ins: &Instr,
    ) -> TranslateResult<String> {
        let ty = int_ty(bits);
        match op {
            Operand::Imm(v) => Ok(match bits {
                8 => (*v as i8 as i64).to_string(),
                16 => (*v as i16 as i64).to_string(),
                32 => (*v as i32 as i64).to_string(),
                _ => v.to_string(),
            }),
            Operand::Mem(m) => {
                let m = m.clone();
                let addr = self.addr_of_mem(&m, ins)?;
                let p = self.ptr_from_addr(&addr);
                let t = self.fresh();
                emit!(self.w, "{t} = load {ty}, ptr {p}, align 1");
                Ok(t)
            }
            Operand::Sym(s) if !s.starts_with('$') => {
                let p = self.ptr_from_sym(s)?;
                let t = self.fresh();
                emit!(self.w, "{t} = load {ty}, ptr {p}, align 1");
                Ok(t)
            }
            _ => {
                let v = self.eval_i64(op, ins)?;
                if bits == 64 {
                    return Ok(v);
                }
                let t = self.fresh();
                emit!(self.w, "{t} = trunc i64 {v} to {ty}");
                Ok(t)
            }
        }
    }

    /// Store a width-sized value into a MOV destination.
    pub(super) fn store_width(
        &mut self,
        dst: &Operand,
        v: &str,
        bits: u32,
        ins: &Instr,
    ) -> TranslateResult<()> {
        let ty = int_ty(bits);
        match dst {
            Operand::Reg(r) => {
                let r = r.clone();
                match bits {
                    64 => self.store_reg(&r, v),
                    32 => {
                        // 32-bit writes zero the upper half.
                        let z = self.fresh();
                        emit!(self.w, "{z} = zext i32 {v} to i64");
                        self.store_reg(&r, &z)
                    }
                    _ => {
                        // 8/16-bit writes merge into the low bits.
                        let old = self.load_reg(&r)?;
                        let mask: u64 = !((1u64 << bits) - 1);
                        let keep = self.fresh();
                        emit!(self.w, "{keep} = and i64 {old}, {}", mask as i64);
                        let z = self.fresh();
                        emit!(self.w, "{z} = zext {ty} {v} to i64");
                        let merged = self.fresh();
                        emit!(self.w, "{merged} = or i64 {keep}, {z}");
                        self.store_reg(&r, &merged)
                    }
                }
            }
            Operand::Mem(m) => {
                let m = m.clone();
                let addr = self.addr_of_mem(&m, ins)?;
                let p = self.ptr_from_addr(&addr);
                emit!(self.w, "store {ty} {v}, ptr {p}, align 1");
                Ok(())
            }
            Operand::Fp { offset, .. } => self.store_fp_result(*offset, &llvm_ty(bits), v, ins),
            Operand::Sym(s) if !s.starts_with('$') => {
                let s = s.clone();
                let p = self.ptr_from_sym(&s)?;
                emit!(self.w, "store {ty} {v}, ptr {p}, align 1");
                Ok(())
            }
            _ => Err(self.unsupported_operand(ins)),
        }
    }
}

fn mov(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let v = c.eval_width(&ins.args[0], bits, ins)?;
    c.store_width(&ins.args[1], &v, bits, ins)?;
    Ok(Some(Flow::Next))
}

/// MOVZX/MOVSX: extend a narrow source into a register destination. The
/// destination write always zero-extends into the full 64 bits (the visible
/// architectural effect of both the L and Q spellings).
fn mov_ext(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    src_bits: u32,
    signed: bool,
) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let dst = match ins.args[1].as_reg() {
        Some(r) => r.clone(),
        None => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(src_bits);
    let v = c.eval_width(&ins.args[0], src_bits, ins)?;
    let wide = c.fresh();
    if signed {
        emit!(c.w, "{wide} = sext {ty} {v} to i64");
    } else {
        emit!(c.w, "{wide} = zext {ty} {v} to i64");
    }
    c.store_reg(&dst, &wide)?;
    Ok(Some(Flow::Next))
}

fn lea(c: &mut FnCtx<'_>, ins: &Instr, narrow: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let dst = match ins.args[1].as_reg() {
        Some(r) => r.clone(),
        None => return Err(c.unsupported_operand(ins)),
    };
    let addr = match &ins.args[0] {
        Operand::Mem(m) => {
            let m = m.clone();
            c.addr_of_mem(&m, ins)?
        }
        Operand::Fp { offset, .. } | Operand::FpAddr { offset, .. } => {
            // LEA of a return slot, e.g. "LEAQ ret+32(FP), R8"; fall back to
            // the slot's value as a pointer-like integer otherwise.
            let off = *offset;
            let alloca = c.fp_result(off).map(|(_, a)| a.to_string());
            match alloca {
                Some(alloca) => {
                    let t = c.fresh();
                    emit!(c.w, "{t} = ptrtoint ptr {alloca} to i64");
                    t
                }
                None => c.eval_fp_i64(off, ins).unwrap_or_else(|_| "0".to_string()),
            }
        }
        Operand::Sym(s) => {
            let s = s.clone();
            let p = c.ptr_from_sym(s.trim_start_matches('$'))?;
            let t = c.fresh();
            emit!(c.w, "{t} = ptrtoint ptr {p} to i64");
            t
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    if narrow {
        let tr = c.fresh();
        emit!(c.w, "{tr} = trunc i64 {addr} to i32");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {tr} to i64");
        c.store_reg(&dst, &z)?;
    } else {
        c.store_reg(&dst, &addr)?;
    }
    Ok(Some(Flow::Next))
}

/// One MOVSB/MOVSQ step: copy an element from (SI) to (DI) and advance both.
fn string_move(c: &mut FnCtx<'_>, _ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let ty = int_ty(bits);
    let step = bits as i64 / 8;
    let si = c.load_reg(&Reg::new("SI"))?;
    let di = c.load_reg(&Reg::new("DI"))?;
    let ps = c.ptr_from_addr(&si);
    let pd = c.ptr_from_addr(&di);
    let v = c.fresh();
    emit!(c.w, "{v} = load {ty}, ptr {ps}, align 1");
    emit!(c.w, "store {ty} {v}, ptr {pd}, align 1");
    let ns = c.fresh();
    emit!(c.w, "{ns} = add i64 {si}, {step}");
    let nd = c.fresh();
    emit!(c.w, "{nd} = add i64 {di}, {step}");
    c.store_reg(&Reg::new("SI"), &ns)?;
    c.store_reg(&Reg::new("DI"), &nd)?;
    Ok(Some(Flow::Next))
}

fn xchg(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = int_ty(bits);
    match (&ins.args[0], &ins.args[1]) {
        (Operand::Reg(a), Operand::Reg(b)) => {
            let (a, b) = (a.clone(), b.clone());
            let va = c.load_reg(&a)?;
            let vb = c.load_reg(&b)?;
            c.store_reg(&a, &vb)?;
            c.store_reg(&b, &va)?;
        }
        (Operand::Reg(r), Operand::Mem(m)) | (Operand::Mem(m), Operand::Reg(r)) => {
            // XCHG with memory is implicitly locked on x86.
            let (r, m) = (r.clone(), m.clone());
            let rv = c.load_reg(&r)?;
            let narrowed = if bits == 64 {
                rv
            } else {
                let t = c.fresh();
                emit!(c.w, "{t} = trunc i64 {rv} to {ty}");
                t
            };
            let addr = c.addr_of_mem(&m, ins)?;
            let p = c.ptr_from_addr(&addr);
            let old = c.fresh();
            emit!(c.w, "{old} = atomicrmw xchg ptr {p}, {ty} {narrowed} seq_cst");
            let wide = if bits == 64 {
                old
            } else {
                let t = c.fresh();
                emit!(c.w, "{t} = zext {ty} {old} to i64");
                t
            };
            c.store_reg(&r, &wide)?;
        }
        _ => return Err(c.unsupported_operand(ins)),
    }
    Ok(Some(Flow::Next))
}
