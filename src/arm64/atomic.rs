// Atomic family: acquire/release loads and stores (LDAR/STLR and widths),
// load/store-exclusive pairs, and the LSE read-modify-write forms. The
// exclusive pairs are lowered as plain atomic accesses with the store's
// status register forced to zero, so LL/SC retry loops take their success
// path on the first iteration. LSE ops map directly onto atomicrmw/cmpxchg
// with seq_cst ordering; fence strength beyond what LLVM's atomic orderings
// already guarantee is not modeled.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, Operand, TranslateResult};

use super::ops::Op;
use super::FnCtx;

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Ldar | Op::Ldaxr | Op::Ldxr => atomic_load(c, ins, 64, "acquire"),
        Op::Ldarw | Op::Ldaxrw | Op::Ldxrw => atomic_load(c, ins, 32, "acquire"),
        Op::Ldarb => atomic_load(c, ins, 8, "acquire"),
        Op::Ldarh => atomic_load(c, ins, 16, "acquire"),

        Op::Stlr => atomic_store(c, ins, 64),
        Op::Stlrw => atomic_store(c, ins, 32),
        Op::Stlrb => atomic_store(c, ins, 8),
        Op::Stlrh => atomic_store(c, ins, 16),

        Op::Stlxr | Op::Stxr => store_exclusive(c, ins, 64),
        Op::Stlxrw | Op::Stxrw => store_exclusive(c, ins, 32),

        Op::Ldaddald => ldadd(c, ins, 64),
        Op::Ldaddalw => ldadd(c, ins, 32),
        Op::Swpald => swp(c, ins, 64),
        Op::Swpalw => swp(c, ins, 32),
        Op::Casald => cas(c, ins, 64),
        Op::Casalw => cas(c, ins, 32),

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

fn mem_ptr(c: &mut FnCtx<'_>, m: &crate::core::Mem, ins: &Instr) -> TranslateResult<String> {
    let (addr, _, _) = c.addr_i64(m, super::eval::AddrMode::Offset, ins)?;
    Ok(c.ptr_from_addr(&addr))
}

/// LDAR*/LDAXR*/LDXR* (Rn), Rt.
fn atomic_load(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    bits: u32,
    ordering: &str,
) -> TranslateResult<Option<Flow>> {
    let (m, dst) = match &ins.args[..] {
        [Operand::Mem(m), Operand::Reg(r)] => (m.clone(), r.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let p = mem_ptr(c, &m, ins)?;
    let v = c.fresh();
    emit!(
        c.w,
        "{v} = load atomic {ty}, ptr {p} {ordering}, align {}",
        bits / 8
    );
    let wide = if bits == 64 {
        v
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = zext {ty} {v} to i64");
        t
    };
    c.store_reg(&dst, &wide)?;
    Ok(Some(Flow::Next))
}

/// STLR* Rt, (Rn).
fn atomic_store(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let (src, m) = match &ins.args[..] {
        [Operand::Reg(r), Operand::Mem(m)] => (r.clone(), m.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let v64 = c.load_reg(&src)?;
    let v = if bits == 64 {
        v64
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {v64} to {ty}");
        t
    };
    let p = mem_ptr(c, &m, ins)?;
    emit!(c.w, "store atomic {ty} {v}, ptr {p} release, align {}", bits / 8);
    Ok(Some(Flow::Next))
}

/// STLXR/STXR Rt, (Rn), Rs: release store with the status register cleared,
/// so the enclosing retry loop exits immediately.
fn store_exclusive(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let (src, m, status) = match &ins.args[..] {
        [Operand::Reg(r), Operand::Mem(m), Operand::Reg(s)] => {
            (r.clone(), m.clone(), s.clone())
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let v64 = c.load_reg(&src)?;
    let v = if bits == 64 {
        v64
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {v64} to {ty}");
        t
    };
    let p = mem_ptr(c, &m, ins)?;
    emit!(
        c.w,
        "store atomic {ty} {v}, ptr {p} seq_cst, align {}",
        bits / 8
    );
    c.store_reg(&status, "0")?;
    Ok(Some(Flow::Next))
}

/// LDADDAL* Rs, (Rn), Rt: Rt = old, memory += Rs.
fn ldadd(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let (src, m, dst) = match &ins.args[..] {
        [Operand::Reg(r), Operand::Mem(m), Operand::Reg(d)] => {
            (r.clone(), m.clone(), d.clone())
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let v64 = c.load_reg(&src)?;
    let v = if bits == 64 {
        v64
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {v64} to {ty}");
        t
    };
    let p = mem_ptr(c, &m, ins)?;
    let old = c.fresh();
    emit!(c.w, "{old} = atomicrmw add ptr {p}, {ty} {v} seq_cst");
    let wide = if bits == 64 {
        old
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = zext {ty} {old} to i64");
        t
    };
    c.store_reg(&dst, &wide)?;
    Ok(Some(Flow::Next))
}

/// SWPAL* Rs, (Rn), Rt: atomic exchange.
fn swp(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let (src, m, dst) = match &ins.args[..] {
        [Operand::Reg(r), Operand::Mem(m), Operand::Reg(d)] => {
            (r.clone(), m.clone(), d.clone())
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let v64 = c.load_reg(&src)?;
    let v = if bits == 64 {
        v64
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {v64} to {ty}");
        t
    };
    let p = mem_ptr(c, &m, ins)?;
    let old = c.fresh();
    emit!(c.w, "{old} = atomicrmw xchg ptr {p}, {ty} {v} seq_cst");
    let wide = if bits == 64 {
        old
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = zext {ty} {old} to i64");
        t
    };
    c.store_reg(&dst, &wide)?;
    Ok(Some(Flow::Next))
}

/// CASAL* Rs, (Rn), Rt: compare Rs with memory, store Rt on match; Rs
/// receives the old value.
fn cas(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let (expected, m, new) = match &ins.args[..] {
        [Operand::Reg(r), Operand::Mem(m), Operand::Reg(d)] => {
            (r.clone(), m.clone(), d.clone())
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let exp64 = c.load_reg(&expected)?;
    let new64 = c.load_reg(&new)?;
    let (exp, newv) = if bits == 64 {
        (exp64, new64)
    } else {
        let e = c.fresh();
        emit!(c.w, "{e} = trunc i64 {exp64} to {ty}");
        let n = c.fresh();
        emit!(c.w, "{n} = trunc i64 {new64} to {ty}");
        (e, n)
    };
    let p = mem_ptr(c, &m, ins)?;
    let pair = c.fresh();
    emit!(
        c.w,
        "{pair} = cmpxchg ptr {p}, {ty} {exp}, {ty} {newv} seq_cst seq_cst"
    );
    let old = c.fresh();
    emit!(c.w, "{old} = extractvalue {{ {ty}, i1 }} {pair}, 0");
    let wide = if bits == 64 {
        old
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = zext {ty} {old} to i64");
        t
    };
    c.store_reg(&expected, &wide)?;
    Ok(Some(Flow::Next))
}
