// NEON family over the <16 x i8> vector model. VMOV covers the stdlib's
// broadcast, lane-insert, and lane-extract patterns using the arrangement
// and lane syntax carried in the register name (V1.B16, V2.D[0]); VLD1/VST1
// handle both the lane forms and multi-register lists with post-increment
// base update; the arithmetic subset (VEOR/VORR/VAND/VADD/VADDP/VUADDLV/
// VCMEQ) follows the arrangement when it changes semantics (.D2 pairwise
// adds and compares). Unmodeled crypto ops never reach this file; they sit
// on the permissive allowlist.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, Operand, Reg, TranslateResult};

use super::ops::Op;
use super::{FnCtx, VEC_TY};

/// Parse a lane reference like `V2.D[1]` into (kind, lane).
fn parse_lane(r: &Reg) -> Option<(char, usize)> {
    let s = r.as_str();
    let (_, rest) = s.split_once('.')?;
    let kind = rest.chars().next()?;
    let idx = rest.get(2..rest.len().checked_sub(1)?)?;
    if !rest[1..].starts_with('[') || !rest.ends_with(']') {
        return None;
    }
    let lane: usize = idx.parse().ok()?;
    let max = match kind {
        'B' => 16,
        'H' => 8,
        'S' => 4,
        'D' => 2,
        _ => return None,
    };
    (lane < max).then_some((kind, lane))
}

fn lane_ty(kind: char) -> (&'static str, &'static str, u32) {
    match kind {
        'D' => ("<2 x i64>", "i64", 64),
        'S' => ("<4 x i32>", "i32", 32),
        'H' => ("<8 x i16>", "i16", 16),
        _ => ("<16 x i8>", "i8", 8),
    }
}

fn arrangement(r: &Reg) -> Option<&str> {
    r.as_str().split_once('.').map(|(_, a)| a)
}

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
    post_inc: bool,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Vmov => vmov(c, ins),
        Op::Veor => vlogic(c, ins, "xor"),
        Op::Vorr => vlogic(c, ins, "or"),
        Op::Vand => vlogic(c, ins, "and"),
        Op::Vld1 => vld1(c, ins, post_inc),
        Op::Vst1 => vst1(c, ins, post_inc),
        Op::Vcmeq => vcmeq(c, ins),
        Op::Vaddp => vaddp(c, ins),
        Op::Vuaddlv => vuaddlv(c, ins),
        Op::Vadd => vadd(c, ins),
        _ => Ok(None),
    }
}

fn vmov(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let (src, dst) = match (ins.args[0].as_reg(), ins.args[1].as_reg()) {
        (Some(s), Some(d)) => (s.clone(), d.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };

    if super::v_reg_base(&dst).is_some() {
        // V -> V copy.
        if super::v_reg_base(&src).is_some() {
            let v = c.load_v(&src, ins)?;
            return c.store_v(&dst, &v, ins).map(|_| Some(Flow::Next));
        }
        // GPR -> V lane insert.
        if let Some((kind, lane)) = parse_lane(&dst) {
            let rv = c.load_reg(&src)?;
            let cur = c.load_v(&dst, ins)?;
            let (vec_ty, elem_ty, bits) = lane_ty(kind);
            let elem = if bits == 64 {
                rv
            } else {
                let t = c.fresh();
                emit!(c.w, "{t} = trunc i64 {rv} to {elem_ty}");
                t
            };
            let out = insert_lane(c, &cur, vec_ty, elem_ty, &elem, lane);
            return c.store_v(&dst, &out, ins).map(|_| Some(Flow::Next));
        }
        // GPR -> V broadcast per the arrangement.
        let rv = c.load_reg(&src)?;
        let out = match arrangement(&dst) {
            Some("S4") => {
                let t = c.fresh();
                emit!(c.w, "{t} = trunc i64 {rv} to i32");
                broadcast(c, "<4 x i32>", "i32", &t)
            }
            Some("D2") => broadcast(c, "<2 x i64>", "i64", &rv),
            _ => {
                let t = c.fresh();
                emit!(c.w, "{t} = trunc i64 {rv} to i8");
                broadcast(c, "<16 x i8>", "i8", &t)
            }
        };
        return c.store_v(&dst, &out, ins).map(|_| Some(Flow::Next));
    }

    // V -> GPR lane extract.
    if super::v_reg_base(&src).is_some() {
        let v = c.load_v(&src, ins)?;
        if let Some((kind, lane)) = parse_lane(&src) {
            let (vec_ty, elem_ty, bits) = lane_ty(kind);
            let e = extract_lane(c, &v, vec_ty, elem_ty, lane);
            let wide = if bits == 64 {
                e
            } else {
                let t = c.fresh();
                emit!(c.w, "{t} = zext {elem_ty} {e} to i64");
                t
            };
            return c.store_reg(&dst, &wide).map(|_| Some(Flow::Next));
        }
        if !src.as_str().contains('.') {
            // Whole-register move reads the low 64-bit lane.
            let e = extract_lane(c, &v, "<2 x i64>", "i64", 0);
            return c.store_reg(&dst, &e).map(|_| Some(Flow::Next));
        }
    }
    Err(c.unsupported_operand(ins))
}

fn insert_lane(
    c: &mut FnCtx<'_>,
    vec: &str,
    vec_ty: &str,
    elem_ty: &str,
    elem: &str,
    lane: usize,
) -> String {
    if vec_ty == VEC_TY {
        let out = c.fresh();
        emit!(c.w, "{out} = insertelement {VEC_TY} {vec}, i8 {elem}, i32 {lane}");
        return out;
    }
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast {VEC_TY} {vec} to {vec_ty}");
    let insv = c.fresh();
    emit!(c.w, "{insv} = insertelement {vec_ty} {bc}, {elem_ty} {elem}, i32 {lane}");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast {vec_ty} {insv} to {VEC_TY}");
    out
}

fn extract_lane(
    c: &mut FnCtx<'_>,
    vec: &str,
    vec_ty: &str,
    elem_ty: &str,
    lane: usize,
) -> String {
    if vec_ty == VEC_TY {
        let e = c.fresh();
        emit!(c.w, "{e} = extractelement {VEC_TY} {vec}, i32 {lane}");
        return e;
    }
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast {VEC_TY} {vec} to {vec_ty}");
    let e = c.fresh();
    emit!(c.w, "{e} = extractelement {vec_ty} {bc}, i32 {lane}");
    let _ = elem_ty;
    e
}

fn broadcast(c: &mut FnCtx<'_>, vec_ty: &str, elem_ty: &str, v: &str) -> String {
    let seed = c.fresh();
    emit!(c.w, "{seed} = insertelement {vec_ty} undef, {elem_ty} {v}, i32 0");
    let spl = c.fresh();
    emit!(
        c.w,
        "{spl} = shufflevector {vec_ty} {seed}, {vec_ty} poison, <{n} x i32> zeroinitializer",
        n = match elem_ty {
            "i64" => 2,
            "i32" => 4,
            "i16" => 8,
            _ => 16,
        }
    );
    if vec_ty == VEC_TY {
        return spl;
    }
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast {vec_ty} {spl} to {VEC_TY}");
    bc
}

fn vlogic(c: &mut FnCtx<'_>, ins: &Instr, ir_op: &str) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    let (a, b, d) = match (
        ins.args[0].as_reg(),
        ins.args[1].as_reg(),
        ins.args[2].as_reg(),
    ) {
        (Some(a), Some(b), Some(d)) => (a.clone(), b.clone(), d.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let av = c.load_v(&a, ins)?;
    let bv = c.load_v(&b, ins)?;
    let t = c.fresh();
    emit!(c.w, "{t} = {ir_op} {VEC_TY} {av}, {bv}");
    c.store_v(&d, &t, ins)?;
    Ok(Some(Flow::Next))
}

fn vld1(c: &mut FnCtx<'_>, ins: &Instr, post_inc: bool) -> TranslateResult<Option<Flow>> {
    // Lane form: VLD1(.P) mem, Vn.{B,H,S,D}[lane].
    if let [Operand::Mem(m), Operand::Reg(vr)] = &ins.args[..] {
        let (kind, lane) = parse_lane(vr).ok_or_else(|| c.unsupported_operand(ins))?;
        let (m, vr) = (m.clone(), vr.clone());
        let (vec_ty, elem_ty, bits) = lane_ty(kind);
        let (addr, base, mut inc) =
            c.addr_i64(&m, super::eval::AddrMode::from_flags(post_inc, false), ins)?;
        if post_inc && inc == 0 {
            inc = bits as i64 / 8;
        }
        let p = c.ptr_from_addr(&addr);
        let e = c.fresh();
        emit!(c.w, "{e} = load {elem_ty}, ptr {p}, align 1");
        let cur = c.load_v(&vr, ins)?;
        let out = insert_lane(c, &cur, vec_ty, elem_ty, &e, lane);
        c.store_v(&vr, &out, ins)?;
        if post_inc {
            c.apply_post_inc(&base, inc)?;
        }
        return Ok(Some(Flow::Next));
    }

    // List form: VLD1(.P) mem, [V1.B16, V2.B16, ...].
    let (m, regs) = match &ins.args[..] {
        [Operand::Mem(m), Operand::RegList(regs)] if (1..=4).contains(&regs.len()) => {
            (m.clone(), regs.clone())
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let (addr, base, mut inc) =
        c.addr_i64(&m, super::eval::AddrMode::from_flags(post_inc, false), ins)?;
    if post_inc && inc == 0 {
        inc = 16 * regs.len() as i64;
    }
    for (i, r) in regs.iter().enumerate() {
        let ai = if i == 0 {
            addr.clone()
        } else {
            let t = c.fresh();
            emit!(c.w, "{t} = add i64 {addr}, {}", 16 * i);
            t
        };
        let p = c.ptr_from_addr(&ai);
        let v = c.fresh();
        emit!(c.w, "{v} = load {VEC_TY}, ptr {p}, align 1");
        c.store_v(r, &v, ins)?;
    }
    if post_inc {
        c.apply_post_inc(&base, inc)?;
    }
    Ok(Some(Flow::Next))
}

fn vst1(c: &mut FnCtx<'_>, ins: &Instr, post_inc: bool) -> TranslateResult<Option<Flow>> {
    let (regs, m) = match &ins.args[..] {
        [Operand::RegList(regs), Operand::Mem(m)] if (1..=4).contains(&regs.len()) => {
            (regs.clone(), m.clone())
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let (addr, base, mut inc) =
        c.addr_i64(&m, super::eval::AddrMode::from_flags(post_inc, false), ins)?;
    if post_inc && inc == 0 {
        inc = 16 * regs.len() as i64;
    }
    for (i, r) in regs.iter().enumerate() {
        let v = c.load_v(r, ins)?;
        let ai = if i == 0 {
            addr.clone()
        } else {
            let t = c.fresh();
            emit!(c.w, "{t} = add i64 {addr}, {}", 16 * i);
            t
        };
        let p = c.ptr_from_addr(&ai);
        emit!(c.w, "store {VEC_TY} {v}, ptr {p}, align 1");
    }
    if post_inc {
        c.apply_post_inc(&base, inc)?;
    }
    Ok(Some(Flow::Next))
}

fn vcmeq(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    let (a, b, d) = match (
        ins.args[0].as_reg(),
        ins.args[1].as_reg(),
        ins.args[2].as_reg(),
    ) {
        (Some(a), Some(b), Some(d)) => (a.clone(), b.clone(), d.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let av = c.load_v(&a, ins)?;
    let bv = c.load_v(&b, ins)?;
    let wide = arrangement(&a) == Some("D2") || arrangement(&b) == Some("D2");
    if wide {
        let ab = c.fresh();
        emit!(c.w, "{ab} = bitcast {VEC_TY} {av} to <2 x i64>");
        let bb = c.fresh();
        emit!(c.w, "{bb} = bitcast {VEC_TY} {bv} to <2 x i64>");
        let cmp = c.fresh();
        emit!(c.w, "{cmp} = icmp eq <2 x i64> {ab}, {bb}");
        let sext = c.fresh();
        emit!(c.w, "{sext} = sext <2 x i1> {cmp} to <2 x i64>");
        let out = c.fresh();
        emit!(c.w, "{out} = bitcast <2 x i64> {sext} to {VEC_TY}");
        c.store_v(&d, &out, ins)?;
        return Ok(Some(Flow::Next));
    }
    let cmp = c.fresh();
    emit!(c.w, "{cmp} = icmp eq {VEC_TY} {av}, {bv}");
    // sext i1 -> i8 yields 0 or 0xFF, matching CMEQ's all-ones convention.
    let sext = c.fresh();
    emit!(c.w, "{sext} = sext <16 x i1> {cmp} to {VEC_TY}");
    c.store_v(&d, &sext, ins)?;
    Ok(Some(Flow::Next))
}

fn vaddp(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    let (a, b, d) = match (
        ins.args[0].as_reg(),
        ins.args[1].as_reg(),
        ins.args[2].as_reg(),
    ) {
        (Some(a), Some(b), Some(d)) => (a.clone(), b.clone(), d.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let av = c.load_v(&a, ins)?;
    let bv = c.load_v(&b, ins)?;

    if arrangement(&a) == Some("D2") || arrangement(&b) == Some("D2") {
        let ab = c.fresh();
        emit!(c.w, "{ab} = bitcast {VEC_TY} {av} to <2 x i64>");
        let bb = c.fresh();
        emit!(c.w, "{bb} = bitcast {VEC_TY} {bv} to <2 x i64>");
        let a0 = c.fresh();
        emit!(c.w, "{a0} = extractelement <2 x i64> {ab}, i32 0");
        let a1 = c.fresh();
        emit!(c.w, "{a1} = extractelement <2 x i64> {ab}, i32 1");
        let b0 = c.fresh();
        emit!(c.w, "{b0} = extractelement <2 x i64> {bb}, i32 0");
        let b1 = c.fresh();
        emit!(c.w, "{b1} = extractelement <2 x i64> {bb}, i32 1");
        let asum = c.fresh();
        emit!(c.w, "{asum} = add i64 {a0}, {a1}");
        let bsum = c.fresh();
        emit!(c.w, "{bsum} = add i64 {b0}, {b1}");
        let v0 = c.fresh();
        emit!(c.w, "{v0} = insertelement <2 x i64> undef, i64 {asum}, i32 0");
        let v1 = c.fresh();
        emit!(c.w, "{v1} = insertelement <2 x i64> {v0}, i64 {bsum}, i32 1");
        let out = c.fresh();
        emit!(c.w, "{out} = bitcast <2 x i64> {v1} to {VEC_TY}");
        c.store_v(&d, &out, ins)?;
        return Ok(Some(Flow::Next));
    }

    // B16: low 8 output bytes pair-sum the second operand, high 8 the first.
    let mut cur = "undef".to_string();
    for i in 0..16 {
        let (src, off) = if i < 8 { (&bv, i * 2) } else { (&av, (i - 8) * 2) };
        let e0 = c.fresh();
        emit!(c.w, "{e0} = extractelement {VEC_TY} {src}, i32 {off}");
        let e1 = c.fresh();
        emit!(c.w, "{e1} = extractelement {VEC_TY} {src}, i32 {}", off + 1);
        let sum = c.fresh();
        emit!(c.w, "{sum} = add i8 {e0}, {e1}");
        let next = c.fresh();
        emit!(c.w, "{next} = insertelement {VEC_TY} {cur}, i8 {sum}, i32 {i}");
        cur = next;
    }
    c.store_v(&d, &cur, ins)?;
    Ok(Some(Flow::Next))
}

/// VUADDLV Vn.B16, Vd: widening sum of all byte lanes into lane 0.
fn vuaddlv(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let (src, dst) = match (ins.args[0].as_reg(), ins.args[1].as_reg()) {
        (Some(s), Some(d)) => (s.clone(), d.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let v = c.load_v(&src, ins)?;
    let z = c.fresh();
    emit!(c.w, "{z} = zext {VEC_TY} {v} to <16 x i64>");
    let mut sum = "0".to_string();
    for i in 0..16 {
        let e = c.fresh();
        emit!(c.w, "{e} = extractelement <16 x i64> {z}, i32 {i}");
        let a = c.fresh();
        emit!(c.w, "{a} = add i64 {sum}, {e}");
        sum = a;
    }
    let v0 = c.fresh();
    emit!(c.w, "{v0} = insertelement <2 x i64> undef, i64 {sum}, i32 0");
    let v1 = c.fresh();
    emit!(c.w, "{v1} = insertelement <2 x i64> {v0}, i64 0, i32 1");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <2 x i64> {v1} to {VEC_TY}");
    c.store_v(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

/// VADD: 3-operand S4 vector add, or 2-operand accumulate in D[0].
fn vadd(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() == 3 {
        let (a, b, d) = match (
            ins.args[0].as_reg(),
            ins.args[1].as_reg(),
            ins.args[2].as_reg(),
        ) {
            (Some(a), Some(b), Some(d)) => (a.clone(), b.clone(), d.clone()),
            _ => return Err(c.unsupported_operand(ins)),
        };
        let av = c.load_v(&a, ins)?;
        let bv = c.load_v(&b, ins)?;
        let ab = c.fresh();
        emit!(c.w, "{ab} = bitcast {VEC_TY} {av} to <4 x i32>");
        let bb = c.fresh();
        emit!(c.w, "{bb} = bitcast {VEC_TY} {bv} to <4 x i32>");
        let sum = c.fresh();
        emit!(c.w, "{sum} = add <4 x i32> {ab}, {bb}");
        let out = c.fresh();
        emit!(c.w, "{out} = bitcast <4 x i32> {sum} to {VEC_TY}");
        c.store_v(&d, &out, ins)?;
        return Ok(Some(Flow::Next));
    }
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let (src, dst) = match (ins.args[0].as_reg(), ins.args[1].as_reg()) {
        (Some(s), Some(d)) => (s.clone(), d.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let sv = c.load_v(&src, ins)?;
    let dv = c.load_v(&dst, ins)?;
    let se = extract_lane(c, &sv, "<2 x i64>", "i64", 0);
    let de = extract_lane(c, &dv, "<2 x i64>", "i64", 0);
    let add = c.fresh();
    emit!(c.w, "{add} = add i64 {de}, {se}");
    let v0 = c.fresh();
    emit!(c.w, "{v0} = insertelement <2 x i64> undef, i64 {add}, i32 0");
    let v1 = c.fresh();
    emit!(c.w, "{v1} = insertelement <2 x i64> {v0}, i64 0, i32 1");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <2 x i64> {v1} to {VEC_TY}");
    c.store_v(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}
