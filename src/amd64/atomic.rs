// Atomic family: the LOCK-prefixed read-modify-write forms the runtime uses.
// XADD lowers to atomicrmw add with the old value written back to the source
// register, CMPXCHG to a cmpxchg against AX with ZF carrying the success bit.
// The standalone LOCK prefix itself is a no-op at this level; every memory
// form here is emitted seq_cst.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, Operand, Reg, TranslateResult};

use super::ops::Op;
use super::{Flag, FnCtx};

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Xaddq => xadd(c, ins, 64),
        Op::Xaddl => xadd(c, ins, 32),
        Op::Cmpxchgq => cmpxchg(c, ins, 64),
        Op::Cmpxchgl => cmpxchg(c, ins, 32),
        _ => Ok(None),
    }
}

fn int_ty(bits: u32) -> &'static str {
    if bits == 64 {
        "i64"
    } else {
        "i32"
    }
}

/// XADD src, mem: mem += src, src = old value; flags from the sum.
fn xadd(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let (src, mem) = match (&ins.args[0], &ins.args[1]) {
        (Operand::Reg(r), Operand::Mem(m)) => (r.clone(), m.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let sv64 = c.load_reg(&src)?;
    let sv = if bits == 64 {
        sv64
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {sv64} to i32");
        t
    };
    let addr = c.addr_of_mem(&mem, ins)?;
    let p = c.ptr_from_addr(&addr);
    let old = c.fresh();
    emit!(c.w, "{old} = atomicrmw add ptr {p}, {ty} {sv} seq_cst");
    let sum = c.fresh();
    emit!(c.w, "{sum} = add {ty} {old}, {sv}");
    let wide = if bits == 64 {
        old
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = zext i32 {old} to i64");
        t
    };
    c.store_reg(&src, &wide)?;
    c.clear_cf_of();
    c.set_result_flags(&sum, ty);
    Ok(Some(Flow::Next))
}

/// CMPXCHG src, mem: compare AX with mem, store src on match; ZF reports
/// success and AX receives the old value.
fn cmpxchg(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let (src, mem) = match (&ins.args[0], &ins.args[1]) {
        (Operand::Reg(r), Operand::Mem(m)) => (r.clone(), m.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let ax = Reg::new("AX");
    let expected64 = c.load_reg(&ax)?;
    let new64 = c.load_reg(&src)?;
    let (expected, new) = if bits == 64 {
        (expected64, new64)
    } else {
        let e = c.fresh();
        emit!(c.w, "{e} = trunc i64 {expected64} to i32");
        let n = c.fresh();
        emit!(c.w, "{n} = trunc i64 {new64} to i32");
        (e, n)
    };
    let addr = c.addr_of_mem(&mem, ins)?;
    let p = c.ptr_from_addr(&addr);
    let pair = c.fresh();
    emit!(
        c.w,
        "{pair} = cmpxchg ptr {p}, {ty} {expected}, {ty} {new} seq_cst seq_cst"
    );
    let old = c.fresh();
    emit!(c.w, "{old} = extractvalue {{ {ty}, i1 }} {pair}, 0");
    let ok = c.fresh();
    emit!(c.w, "{ok} = extractvalue {{ {ty}, i1 }} {pair}, 1");
    let wide = if bits == 64 {
        old
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = zext i32 {old} to i64");
        t
    };
    c.store_reg(&ax, &wide)?;
    c.store_flag(Flag::Zf, &ok);
    Ok(Some(Flow::Next))
}
