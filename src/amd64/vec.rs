// Vector family: SSE/SSE2/SSSE3/SSE4/AVX2/AES/SHA/PCLMUL. X registers are
// <16 x i8> slots and Y registers <32 x i8>; element-width ops bitcast to the
// lane type they need and bitcast back. Everything is expressed through
// portable shufflevector/arith operators except the handful of ops with no
// portable equivalent (PSHUFB, AES rounds, PCLMULQDQ, PMOVMSKB), which call
// the named x86 intrinsics. The 256-bit PSHUFB/PMOVMSKB/PALIGNR/byte-shift
// forms are emulated by lane-splitting into two 128-bit halves: the native
// 256-bit intrinsics miscompile in some backend versions. MOVQ/MOVL/MOVD
// claim an instruction here only when one side is a vector register;
// otherwise they fall through to the data family.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, Operand, Reg, TranslateResult};

use super::ops::Op;
use super::{x_reg_index, y_reg_index, Flag, FnCtx};

fn is_x(op: &Operand) -> bool {
    op.as_reg().map(|r| x_reg_index(r).is_some()).unwrap_or(false)
}

fn is_y(op: &Operand) -> bool {
    op.as_reg().map(|r| y_reg_index(r).is_some()).unwrap_or(false)
}

fn reg(op: &Operand) -> Reg {
    op.as_reg().cloned().unwrap_or_else(|| Reg::new("X0"))
}

/// `<n x i32> <start, start+1, ...>` shuffle mask.
fn range_mask(start: usize, n: usize) -> String {
    let elems = (0..n)
        .map(|i| format!("i32 {}", start + i))
        .collect::<Vec<_>>()
        .join(", ");
    format!("<{n} x i32> <{elems}>")
}

/// Mask shifting 16 bytes right by n, pulling zeros from the second vector.
fn shift_right_bytes_mask(n: i64) -> String {
    let elems = (0..16)
        .map(|i| {
            let idx = i + n;
            if idx < 16 {
                format!("i32 {idx}")
            } else {
                "i32 16".to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("<{elems}>")
}

/// Mask shifting 16 bytes left by n, pulling zeros from the second vector.
fn shift_left_bytes_mask(n: i64) -> String {
    let elems = (0..16)
        .map(|i| {
            let idx = i - n;
            if idx >= 0 {
                format!("i32 {idx}")
            } else {
                "i32 16".to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("<{elems}>")
}

/// Mask for alignr(dst, src, n) over the [dst, src] concatenation.
fn align_right_bytes_mask(n: i64) -> String {
    let elems = (0..16)
        .map(|i| {
            let idx = i + n;
            if idx < 32 {
                format!("i32 {idx}")
            } else {
                "i32 16".to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("<{elems}>")
}

fn all_ones_i8(n: usize) -> String {
    let elems = (0..n).map(|_| "i8 -1").collect::<Vec<_>>().join(", ");
    format!("<{elems}>")
}

/// Split a `<32 x i8>` value into its 128-bit halves.
fn split_y(c: &mut FnCtx<'_>, v: &str) -> (String, String) {
    let lo = c.fresh();
    emit!(
        c.w,
        "{lo} = shufflevector <32 x i8> {v}, <32 x i8> zeroinitializer, {}",
        range_mask(0, 16)
    );
    let hi = c.fresh();
    emit!(
        c.w,
        "{hi} = shufflevector <32 x i8> {v}, <32 x i8> zeroinitializer, {}",
        range_mask(16, 16)
    );
    (lo, hi)
}

/// Join two `<16 x i8>` halves back into `<32 x i8>`.
fn join_y(c: &mut FnCtx<'_>, lo: &str, hi: &str) -> String {
    let t = c.fresh();
    emit!(
        c.w,
        "{t} = shufflevector <16 x i8> {lo}, <16 x i8> {hi}, {}",
        range_mask(0, 32)
    );
    t
}

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    // Aliases collapse before dispatch.
    let op = match op {
        Op::Vmovdqa => Op::Vmovdqu,
        Op::Vperm2f128 => Op::Vperm2i128,
        Op::Movups | Op::Movaps | Op::Movo => Op::Movou,
        other => other.clone(),
    };

    match &op {
        // MOVL/MOVD src, Xn: seed the low 32 bits.
        Op::Movl | Op::Movd if ins.args.len() == 2 && is_x(&ins.args[1]) => {
            let dst = reg(&ins.args[1]);
            let v64 = c.eval_i64(&ins.args[0], ins)?;
            let tr = c.fresh();
            emit!(c.w, "{tr} = trunc i64 {v64} to i32");
            let vec = c.fresh();
            emit!(
                c.w,
                "{vec} = insertelement <4 x i32> zeroinitializer, i32 {tr}, i32 0"
            );
            let bc = c.fresh();
            emit!(c.w, "{bc} = bitcast <4 x i32> {vec} to <16 x i8>");
            c.store_x(&dst, &bc, ins)?;
            Ok(Some(Flow::Next))
        }

        // MOVD/MOVL Xn, dst: extract the low 32 bits.
        Op::Movl | Op::Movd if ins.args.len() == 2 && is_x(&ins.args[0]) => {
            let src = reg(&ins.args[0]);
            let xv = c.load_x(&src, ins)?;
            let bc = c.fresh();
            emit!(c.w, "{bc} = bitcast <16 x i8> {xv} to <4 x i32>");
            let lo = c.fresh();
            emit!(c.w, "{lo} = extractelement <4 x i32> {bc}, i32 0");
            let z = c.fresh();
            emit!(c.w, "{z} = zext i32 {lo} to i64");
            match &ins.args[1] {
                Operand::Reg(r) => c.store_reg(&r.clone(), &z)?,
                _ => return Err(c.unsupported_operand(ins)),
            }
            Ok(Some(Flow::Next))
        }

        // MOVQ src, Xn: load the low 64 bits.
        Op::Movq if ins.args.len() == 2 && is_x(&ins.args[1]) => {
            let dst = reg(&ins.args[1]);
            let low = c.eval_i64(&ins.args[0], ins)?;
            let vec = c.fresh();
            emit!(
                c.w,
                "{vec} = insertelement <2 x i64> zeroinitializer, i64 {low}, i32 0"
            );
            let bc = c.fresh();
            emit!(c.w, "{bc} = bitcast <2 x i64> {vec} to <16 x i8>");
            c.store_x(&dst, &bc, ins)?;
            Ok(Some(Flow::Next))
        }

        // MOVQ Xn, dst: extract the low 64 bits.
        Op::Movq if ins.args.len() == 2 && is_x(&ins.args[0]) => {
            let src = reg(&ins.args[0]);
            let xv = c.load_x(&src, ins)?;
            let bc = c.fresh();
            emit!(c.w, "{bc} = bitcast <16 x i8> {xv} to <2 x i64>");
            let lo = c.fresh();
            emit!(c.w, "{lo} = extractelement <2 x i64> {bc}, i32 0");
            match &ins.args[1] {
                Operand::Reg(r) => c.store_reg(&r.clone(), &lo)?,
                Operand::Mem(m) => {
                    let m = m.clone();
                    let addr = c.addr_of_mem(&m, ins)?;
                    let p = c.ptr_from_addr(&addr);
                    emit!(c.w, "store i64 {lo}, ptr {p}, align 1");
                }
                Operand::Fp { offset, .. } => {
                    c.store_fp_result(*offset, &crate::core::LlvmType::I64, &lo, ins)?;
                }
                _ => return Err(c.unsupported_operand(ins)),
            }
            Ok(Some(Flow::Next))
        }

        Op::Movou | Op::Movoa => movou(c, ins),
        Op::Vmovdqu => vmovdqu(c, ins),
        Op::Vmovntdq => vmovntdq(c, ins),

        Op::Vpxor | Op::Vpor | Op::Vpand | Op::Vpaddd | Op::Vpaddq => vthree(c, &op, ins),

        Op::Vpshufb => vpshufb(c, ins),
        Op::Vpshufd => vpshufd(c, ins),
        Op::Vpslld | Op::Vpsrld => vps_d(c, &op, ins),
        Op::Vpsllq | Op::Vpsrlq => vps_q(c, &op, ins),
        Op::Vpslldq | Op::Vpsrldq => vps_dq(c, &op, ins),
        Op::Vpalignr => vpalignr(c, ins),
        Op::Vperm2i128 => vperm2i128(c, ins),
        Op::Vinserti128 => vinserti128(c, ins),
        Op::Vpblendd => vpblendd(c, ins),
        Op::Vpbroadcastb => vpbroadcastb(c, ins),
        Op::Vpcmpeqb => vpcmpeqb(c, ins),
        Op::Vpmovmskb => vpmovmskb(c, ins),
        Op::Vptest => vptest(c, ins),

        Op::Pxor | Op::Pand | Op::Pandn => plogic(c, &op, ins),
        Op::Paddd | Op::Paddl | Op::Psubl => paddsub(c, &op, ins),
        Op::Pslll | Op::Psrll | Op::Psral => pshift_l(c, &op, ins),
        Op::Psrlq => psrlq(c, ins),
        Op::Psrldq | Op::Pslldq => pbyteshift(c, &op, ins),
        Op::Palignr => palignr(c, ins),
        Op::Punpcklbw => punpcklbw(c, ins),
        Op::Pshufl | Op::Pshufd => pshufd(c, ins),
        Op::Pshufhw => pshufhw(c, ins),
        Op::Shufps => shufps(c, ins),
        Op::Pblendw => pblendw(c, ins),
        Op::Pcmpeqb => pcmpeqb(c, ins),
        Op::Pcmpeql => pcmpeql(c, ins),
        Op::Pmovmskb => pmovmskb(c, ins),
        Op::Pshufb => pshufb(c, ins),
        Op::Pclmulqdq => pclmulqdq(c, ins),
        Op::Pinsrq => pinsr(c, ins, 64),
        Op::Pinsrd => pinsr(c, ins, 32),
        Op::Pinsrw => pinsr(c, ins, 16),
        Op::Pinsrb => pinsr(c, ins, 8),
        Op::Pextrd => pextrd(c, ins),
        Op::Pextrb => pextrb(c, ins),
        Op::Pcmpestri => pcmpestri(c, ins),

        Op::Aesenc | Op::Aesenclast | Op::Aesdec | Op::Aesdeclast => aes_round(c, &op, ins),
        Op::Aesimc => aesimc(c, ins),
        Op::Aeskeygenassist => aeskeygenassist(c, ins),
        Op::Sha256msg1 | Op::Sha256msg2 => sha_msg(c, ins),
        Op::Sha256rnds2 => sha_rnds2(c, ins),

        _ => Ok(None),
    }
}

fn movou(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    if is_x(&ins.args[1]) {
        let dst = reg(&ins.args[1]);
        let v = c.load_x_operand(&ins.args[0], ins)?;
        c.store_x(&dst, &v, ins)?;
        return Ok(Some(Flow::Next));
    }
    if !is_x(&ins.args[0]) {
        return Ok(None);
    }
    let src = reg(&ins.args[0]);
    let v = c.load_x(&src, ins)?;
    match &ins.args[1] {
        Operand::Mem(m) => {
            let m = m.clone();
            let addr = c.addr_of_mem(&m, ins)?;
            let p = c.ptr_from_addr(&addr);
            emit!(c.w, "store <16 x i8> {v}, ptr {p}, align 1");
        }
        Operand::Sym(s) => {
            let p = c.ptr_from_sym(&s.clone())?;
            emit!(c.w, "store <16 x i8> {v}, ptr {p}, align 1");
        }
        _ => return Err(c.unsupported_operand(ins)),
    }
    Ok(Some(Flow::Next))
}

fn vmovdqu(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    if is_y(&ins.args[1]) {
        let dst = reg(&ins.args[1]);
        let v = c.load_y_operand(&ins.args[0], ins)?;
        c.store_y(&dst, &v, ins)?;
        return Ok(Some(Flow::Next));
    }
    if is_x(&ins.args[1]) {
        let dst = reg(&ins.args[1]);
        let v = c.load_x_operand(&ins.args[0], ins)?;
        c.store_x(&dst, &v, ins)?;
        return Ok(Some(Flow::Next));
    }
    if is_y(&ins.args[0]) {
        let src = reg(&ins.args[0]);
        let v = c.load_y(&src, ins)?;
        store_vec_to(c, ins, &ins.args[1].clone(), "<32 x i8>", &v)?;
        return Ok(Some(Flow::Next));
    }
    if is_x(&ins.args[0]) {
        let src = reg(&ins.args[0]);
        let v = c.load_x(&src, ins)?;
        store_vec_to(c, ins, &ins.args[1].clone(), "<16 x i8>", &v)?;
        return Ok(Some(Flow::Next));
    }
    Ok(None)
}

fn store_vec_to(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    dst: &Operand,
    ty: &str,
    v: &str,
) -> TranslateResult<()> {
    match dst {
        Operand::Mem(m) => {
            let m = m.clone();
            let addr = c.addr_of_mem(&m, ins)?;
            let p = c.ptr_from_addr(&addr);
            emit!(c.w, "store {ty} {v}, ptr {p}, align 1");
            Ok(())
        }
        Operand::Sym(s) => {
            let p = c.ptr_from_sym(&s.clone())?;
            emit!(c.w, "store {ty} {v}, ptr {p}, align 1");
            Ok(())
        }
        _ => Err(c.unsupported_operand(ins)),
    }
}

fn vmovntdq(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_y(&ins.args[0]) {
        return Ok(None);
    }
    let src = reg(&ins.args[0]);
    let v = c.load_y(&src, ins)?;
    store_vec_to(c, ins, &ins.args[1].clone(), "<32 x i8>", &v)?;
    Ok(Some(Flow::Next))
}

/// Three-operand V* ops over either width.
fn vthree(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || ins.args[2].as_reg().is_none() {
        return Err(c.unsupported_operand(ins));
    }
    let dst = reg(&ins.args[2]);
    if is_y(&ins.args[2]) {
        let a = c.load_y_operand(&ins.args[0], ins)?;
        let b = c.load_y_operand(&ins.args[1], ins)?;
        let out = match op {
            Op::Vpxor => bytewise(c, "xor", 32, &a, &b),
            Op::Vpor => bytewise(c, "or", 32, &a, &b),
            Op::Vpand => bytewise(c, "and", 32, &a, &b),
            Op::Vpaddd => lanewise(c, "add", "<32 x i8>", "<8 x i32>", &a, &b),
            _ => lanewise(c, "add", "<32 x i8>", "<4 x i64>", &a, &b),
        };
        c.store_y(&dst, &out, ins)?;
        return Ok(Some(Flow::Next));
    }
    if is_x(&ins.args[2]) {
        let a = c.load_x_operand(&ins.args[0], ins)?;
        let b = c.load_x_operand(&ins.args[1], ins)?;
        let out = match op {
            Op::Vpxor => bytewise(c, "xor", 16, &a, &b),
            Op::Vpor => bytewise(c, "or", 16, &a, &b),
            Op::Vpand => bytewise(c, "and", 16, &a, &b),
            Op::Vpaddd => lanewise(c, "add", "<16 x i8>", "<4 x i32>", &a, &b),
            _ => lanewise(c, "add", "<16 x i8>", "<2 x i64>", &a, &b),
        };
        c.store_x(&dst, &out, ins)?;
        return Ok(Some(Flow::Next));
    }
    Ok(None)
}

fn bytewise(c: &mut FnCtx<'_>, ir_op: &str, n: usize, a: &str, b: &str) -> String {
    let t = c.fresh();
    emit!(c.w, "{t} = {ir_op} <{n} x i8> {a}, {b}");
    t
}

fn lanewise(
    c: &mut FnCtx<'_>,
    ir_op: &str,
    byte_ty: &str,
    lane_ty: &str,
    a: &str,
    b: &str,
) -> String {
    let ab = c.fresh();
    emit!(c.w, "{ab} = bitcast {byte_ty} {a} to {lane_ty}");
    let bb = c.fresh();
    emit!(c.w, "{bb} = bitcast {byte_ty} {b} to {lane_ty}");
    let r = c.fresh();
    emit!(c.w, "{r} = {ir_op} {lane_ty} {ab}, {bb}");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast {lane_ty} {r} to {byte_ty}");
    out
}

fn pshufb_128(c: &mut FnCtx<'_>, src: &str, mask: &str) -> String {
    let t = c.fresh();
    emit!(
        c.w,
        "{t} = call <16 x i8> @llvm.x86.ssse3.pshuf.b.128(<16 x i8> {src}, <16 x i8> {mask})"
    );
    t
}

fn vpshufb(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || ins.args[2].as_reg().is_none() {
        return Err(c.unsupported_operand(ins));
    }
    let dst = reg(&ins.args[2]);
    if is_y(&ins.args[2]) {
        let mask = c.load_y_operand(&ins.args[0], ins)?;
        let src = c.load_y_operand(&ins.args[1], ins)?;
        // 256-bit PSHUFB shuffles within each 128-bit lane.
        let (src_lo, src_hi) = split_y(c, &src);
        let (mask_lo, mask_hi) = split_y(c, &mask);
        let out_lo = pshufb_128(c, &src_lo, &mask_lo);
        let out_hi = pshufb_128(c, &src_hi, &mask_hi);
        let out = join_y(c, &out_lo, &out_hi);
        c.store_y(&dst, &out, ins)?;
        return Ok(Some(Flow::Next));
    }
    if is_x(&ins.args[2]) {
        let mask = c.load_x_operand(&ins.args[0], ins)?;
        let src = c.load_x_operand(&ins.args[1], ins)?;
        let out = pshufb_128(c, &src, &mask);
        c.store_x(&dst, &out, ins)?;
        return Ok(Some(Flow::Next));
    }
    Ok(None)
}

fn imm_of(c: &FnCtx<'_>, op: &Operand, ins: &Instr) -> TranslateResult<i64> {
    match op {
        Operand::Imm(v) => Ok(*v),
        _ => Err(c.unsupported_operand(ins)),
    }
}

fn vpshufd(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[1]) || !is_y(&ins.args[2]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? as u64 & 0xff;
    let idx = |k: u64| (imm >> (2 * k)) & 3;
    let src = c.load_y(&reg(&ins.args[1]), ins)?;
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <32 x i8> {src} to <8 x i32>");
    let mask = format!(
        "<8 x i32> <i32 {}, i32 {}, i32 {}, i32 {}, i32 {}, i32 {}, i32 {}, i32 {}>",
        idx(0),
        idx(1),
        idx(2),
        idx(3),
        4 + idx(0),
        4 + idx(1),
        4 + idx(2),
        4 + idx(3)
    );
    let sh = c.fresh();
    emit!(
        c.w,
        "{sh} = shufflevector <8 x i32> {bc}, <8 x i32> zeroinitializer, {mask}"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <8 x i32> {sh} to <32 x i8>");
    c.store_y(&reg(&ins.args[2]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn vps_d(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[1]) || !is_y(&ins.args[2]) {
        return Ok(None);
    }
    let n = imm_of(c, &ins.args[0], ins)? & 31;
    let src = c.load_y(&reg(&ins.args[1]), ins)?;
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <32 x i8> {src} to <8 x i32>");
    let splat = (0..8).map(|_| format!("i32 {n}")).collect::<Vec<_>>().join(", ");
    let sh = c.fresh();
    let ir_op = if matches!(op, Op::Vpslld) { "shl" } else { "lshr" };
    emit!(c.w, "{sh} = {ir_op} <8 x i32> {bc}, <{splat}>");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <8 x i32> {sh} to <32 x i8>");
    c.store_y(&reg(&ins.args[2]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn vps_q(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[1]) || !is_y(&ins.args[2]) {
        return Ok(None);
    }
    let n = imm_of(c, &ins.args[0], ins)? & 63;
    let src = c.load_y(&reg(&ins.args[1]), ins)?;
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <32 x i8> {src} to <4 x i64>");
    let splat = (0..4).map(|_| format!("i64 {n}")).collect::<Vec<_>>().join(", ");
    let sh = c.fresh();
    let ir_op = if matches!(op, Op::Vpsllq) { "shl" } else { "lshr" };
    emit!(c.w, "{sh} = {ir_op} <4 x i64> {bc}, <{splat}>");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <4 x i64> {sh} to <32 x i8>");
    c.store_y(&reg(&ins.args[2]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn vps_dq(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[1]) || !is_y(&ins.args[2]) {
        return Ok(None);
    }
    let n = imm_of(c, &ins.args[0], ins)?.clamp(0, 16);
    let src = c.load_y(&reg(&ins.args[1]), ins)?;
    let (lo, hi) = split_y(c, &src);
    let mask = if matches!(op, Op::Vpslldq) {
        shift_left_bytes_mask(n)
    } else {
        shift_right_bytes_mask(n)
    };
    let lo2 = c.fresh();
    emit!(
        c.w,
        "{lo2} = shufflevector <16 x i8> {lo}, <16 x i8> zeroinitializer, <16 x i32> {mask}"
    );
    let hi2 = c.fresh();
    emit!(
        c.w,
        "{hi2} = shufflevector <16 x i8> {hi}, <16 x i8> zeroinitializer, <16 x i32> {mask}"
    );
    let out = join_y(c, &lo2, &hi2);
    c.store_y(&reg(&ins.args[2]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn vpalignr(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 4 {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[1]) || !is_y(&ins.args[2]) || !is_y(&ins.args[3]) {
        return Ok(None);
    }
    let n = imm_of(c, &ins.args[0], ins)?.clamp(0, 255);
    let src1 = c.load_y(&reg(&ins.args[1]), ins)?;
    let src2 = c.load_y(&reg(&ins.args[2]), ins)?;
    let (lo1, hi1) = split_y(c, &src1);
    let (lo2, hi2) = split_y(c, &src2);
    let mask = align_right_bytes_mask(n);
    let out_lo = c.fresh();
    emit!(
        c.w,
        "{out_lo} = shufflevector <16 x i8> {lo2}, <16 x i8> {lo1}, <16 x i32> {mask}"
    );
    let out_hi = c.fresh();
    emit!(
        c.w,
        "{out_hi} = shufflevector <16 x i8> {hi2}, <16 x i8> {hi1}, <16 x i32> {mask}"
    );
    let out = join_y(c, &out_lo, &out_hi);
    c.store_y(&reg(&ins.args[3]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn vperm2i128(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 4 || ins.args[3].as_reg().is_none() {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[3]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? as u64 & 0xff;
    // AT&T order: imm, src1, src2, dst; lanes select from [src2, src1].
    let src1 = c.load_y_operand(&ins.args[1], ins)?;
    let src2 = c.load_y_operand(&ins.args[2], ins)?;
    let sel = |bits: u64| -> u64 { bits & 0x3 };
    let lo_sel = sel(imm);
    let hi_sel = sel(imm >> 4);
    let mask = format!(
        "<4 x i32> <i32 {}, i32 {}, i32 {}, i32 {}>",
        lo_sel * 2,
        lo_sel * 2 + 1,
        hi_sel * 2,
        hi_sel * 2 + 1
    );
    let b2 = c.fresh();
    emit!(c.w, "{b2} = bitcast <32 x i8> {src2} to <4 x i64>");
    let b1 = c.fresh();
    emit!(c.w, "{b1} = bitcast <32 x i8> {src1} to <4 x i64>");
    let mut sh = c.fresh();
    emit!(c.w, "{sh} = shufflevector <4 x i64> {b2}, <4 x i64> {b1}, {mask}");
    // Zeroing controls.
    let zero_lo = (imm >> 3) & 1 == 1;
    let zero_hi = (imm >> 7) & 1 == 1;
    if zero_lo {
        let i0 = c.fresh();
        emit!(c.w, "{i0} = insertelement <4 x i64> {sh}, i64 0, i32 0");
        let i1 = c.fresh();
        emit!(c.w, "{i1} = insertelement <4 x i64> {i0}, i64 0, i32 1");
        sh = i1;
    }
    if zero_hi {
        let i2 = c.fresh();
        emit!(c.w, "{i2} = insertelement <4 x i64> {sh}, i64 0, i32 2");
        let i3 = c.fresh();
        emit!(c.w, "{i3} = insertelement <4 x i64> {i2}, i64 0, i32 3");
        sh = i3;
    }
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <4 x i64> {sh} to <32 x i8>");
    c.store_y(&reg(&ins.args[3]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn vinserti128(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 4 {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[2]) || !is_y(&ins.args[3]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? & 1;
    let xsrc = c.load_x_operand(&ins.args[1], ins)?;
    let ysrc = c.load_y(&reg(&ins.args[2]), ins)?;
    let y64 = c.fresh();
    emit!(c.w, "{y64} = bitcast <32 x i8> {ysrc} to <4 x i64>");
    let x64 = c.fresh();
    emit!(c.w, "{x64} = bitcast <16 x i8> {xsrc} to <2 x i64>");
    let e0 = c.fresh();
    emit!(c.w, "{e0} = extractelement <2 x i64> {x64}, i32 0");
    let e1 = c.fresh();
    emit!(c.w, "{e1} = extractelement <2 x i64> {x64}, i32 1");
    let base = if imm == 0 { 0 } else { 2 };
    let s0 = c.fresh();
    emit!(c.w, "{s0} = insertelement <4 x i64> {y64}, i64 {e0}, i32 {base}");
    let s1 = c.fresh();
    emit!(c.w, "{s1} = insertelement <4 x i64> {s0}, i64 {e1}, i32 {}", base + 1);
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <4 x i64> {s1} to <32 x i8>");
    c.store_y(&reg(&ins.args[3]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn vpblendd(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 4 {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[3]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? as u64 & 0xff;
    let a = c.load_y_operand(&ins.args[1], ins)?;
    let b = c.load_y_operand(&ins.args[2], ins)?;
    let av = c.fresh();
    emit!(c.w, "{av} = bitcast <32 x i8> {a} to <8 x i32>");
    let bv = c.fresh();
    emit!(c.w, "{bv} = bitcast <32 x i8> {b} to <8 x i32>");
    let mask = (0..8)
        .map(|i| {
            if (imm >> i) & 1 != 0 {
                format!("i32 {i}")
            } else {
                format!("i32 {}", 8 + i)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let sh = c.fresh();
    emit!(
        c.w,
        "{sh} = shufflevector <8 x i32> {av}, <8 x i32> {bv}, <8 x i32> <{mask}>"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <8 x i32> {sh} to <32 x i8>");
    c.store_y(&reg(&ins.args[3]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn vpbroadcastb(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[0]) || !is_y(&ins.args[1]) {
        return Ok(None);
    }
    let xv = c.load_x(&reg(&ins.args[0]), ins)?;
    let e = c.fresh();
    emit!(c.w, "{e} = extractelement <16 x i8> {xv}, i32 0");
    let seed = c.fresh();
    emit!(c.w, "{seed} = insertelement <32 x i8> undef, i8 {e}, i32 0");
    let spl = c.fresh();
    emit!(
        c.w,
        "{spl} = shufflevector <32 x i8> {seed}, <32 x i8> zeroinitializer, <32 x i32> zeroinitializer"
    );
    c.store_y(&reg(&ins.args[1]), &spl, ins)?;
    Ok(Some(Flow::Next))
}

fn vpcmpeqb(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[0]) || !is_y(&ins.args[1]) || !is_y(&ins.args[2]) {
        return Ok(None);
    }
    let a = c.load_y(&reg(&ins.args[0]), ins)?;
    let b = c.load_y(&reg(&ins.args[1]), ins)?;
    let cmp = c.fresh();
    emit!(c.w, "{cmp} = icmp eq <32 x i8> {a}, {b}");
    let sel = c.fresh();
    emit!(
        c.w,
        "{sel} = select <32 x i1> {cmp}, <32 x i8> {}, <32 x i8> zeroinitializer",
        all_ones_i8(32)
    );
    c.store_y(&reg(&ins.args[2]), &sel, ins)?;
    Ok(Some(Flow::Next))
}

fn pmovmskb_128(c: &mut FnCtx<'_>, v: &str) -> String {
    let t = c.fresh();
    emit!(
        c.w,
        "{t} = call i32 @llvm.x86.sse2.pmovmskb.128(<16 x i8> {v})"
    );
    t
}

fn vpmovmskb(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || ins.args[1].as_reg().is_none() {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[0]) {
        return Ok(None);
    }
    let v = c.load_y(&reg(&ins.args[0]), ins)?;
    // Lane-split to the SSE2 intrinsic; the AVX2 one has backend issues.
    let (lo, hi) = split_y(c, &v);
    let ml = pmovmskb_128(c, &lo);
    let mh = pmovmskb_128(c, &hi);
    let sh = c.fresh();
    emit!(c.w, "{sh} = shl i32 {mh}, 16");
    let or = c.fresh();
    emit!(c.w, "{or} = or i32 {sh}, {ml}");
    let z = c.fresh();
    emit!(c.w, "{z} = zext i32 {or} to i64");
    let dst = reg(&ins.args[1]);
    c.store_reg(&dst, &z)?;
    Ok(Some(Flow::Next))
}

/// VPTEST implements the ZF behavior only (ZF = (a & b) == 0); the stdlib
/// pairs it with JZ/JNZ.
fn vptest(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    if !is_y(&ins.args[0]) || !is_y(&ins.args[1]) {
        return Ok(None);
    }
    let a = c.load_y(&reg(&ins.args[0]), ins)?;
    let b = c.load_y(&reg(&ins.args[1]), ins)?;
    let and = c.fresh();
    emit!(c.w, "{and} = and <32 x i8> {a}, {b}");
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <32 x i8> {and} to <4 x i64>");
    let mut acc = String::new();
    for i in 0..4 {
        let e = c.fresh();
        emit!(c.w, "{e} = extractelement <4 x i64> {bc}, i32 {i}");
        if i == 0 {
            acc = e;
        } else {
            let o = c.fresh();
            emit!(c.w, "{o} = or i64 {acc}, {e}");
            acc = o;
        }
    }
    let z = c.fresh();
    emit!(c.w, "{z} = icmp eq i64 {acc}, 0");
    c.store_flag(Flag::Zf, &z);
    c.store_flag(Flag::Cf, "false");
    Ok(Some(Flow::Next))
}

fn plogic(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let dst = reg(&ins.args[1]);
    let src = c.load_x_operand(&ins.args[0], ins)?;
    let dv = c.load_x(&dst, ins)?;
    let t = c.fresh();
    match op {
        Op::Pxor => emit!(c.w, "{t} = xor <16 x i8> {dv}, {src}"),
        Op::Pandn => {
            let notv = c.fresh();
            emit!(c.w, "{notv} = xor <16 x i8> {dv}, {}", all_ones_i8(16));
            emit!(c.w, "{t} = and <16 x i8> {notv}, {src}");
        }
        _ => emit!(c.w, "{t} = and <16 x i8> {dv}, {src}"),
    }
    c.store_x(&dst, &t, ins)?;
    Ok(Some(Flow::Next))
}

fn paddsub(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let dst = reg(&ins.args[1]);
    let src = c.load_x_operand(&ins.args[0], ins)?;
    let dv = c.load_x(&dst, ins)?;
    let ir_op = if matches!(op, Op::Psubl) { "sub" } else { "add" };
    let out = lanewise(c, ir_op, "<16 x i8>", "<4 x i32>", &dv, &src);
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn pshift_l(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let n = imm_of(c, &ins.args[0], ins)? & 31;
    let dst = reg(&ins.args[1]);
    let v = c.load_x(&dst, ins)?;
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <16 x i8> {v} to <4 x i32>");
    let splat = (0..4).map(|_| format!("i32 {n}")).collect::<Vec<_>>().join(", ");
    let ir_op = match op {
        Op::Pslll => "shl",
        Op::Psral => "ashr",
        _ => "lshr",
    };
    let sh = c.fresh();
    emit!(c.w, "{sh} = {ir_op} <4 x i32> {bc}, <{splat}>");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <4 x i32> {sh} to <16 x i8>");
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn psrlq(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let n = imm_of(c, &ins.args[0], ins)? & 63;
    let dst = reg(&ins.args[1]);
    let v = c.load_x(&dst, ins)?;
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <16 x i8> {v} to <2 x i64>");
    let sh = c.fresh();
    emit!(c.w, "{sh} = lshr <2 x i64> {bc}, <i64 {n}, i64 {n}>");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <2 x i64> {sh} to <16 x i8>");
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn pbyteshift(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let n = imm_of(c, &ins.args[0], ins)?;
    if !(0..=16).contains(&n) {
        return Err(c.unsupported_operand(ins));
    }
    let dst = reg(&ins.args[1]);
    let v = c.load_x(&dst, ins)?;
    let mask = if matches!(op, Op::Pslldq) {
        shift_left_bytes_mask(n)
    } else {
        shift_right_bytes_mask(n)
    };
    let sh = c.fresh();
    emit!(
        c.w,
        "{sh} = shufflevector <16 x i8> {v}, <16 x i8> zeroinitializer, <16 x i32> {mask}"
    );
    c.store_x(&dst, &sh, ins)?;
    Ok(Some(Flow::Next))
}

fn palignr(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[1]) || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let n = imm_of(c, &ins.args[0], ins)?.clamp(0, 255);
    let src = c.load_x(&reg(&ins.args[1]), ins)?;
    let dst = reg(&ins.args[2]);
    let dv = c.load_x(&dst, ins)?;
    let sh = c.fresh();
    emit!(
        c.w,
        "{sh} = shufflevector <16 x i8> {dv}, <16 x i8> {src}, <16 x i32> {}",
        align_right_bytes_mask(n)
    );
    c.store_x(&dst, &sh, ins)?;
    Ok(Some(Flow::Next))
}

/// Interleave low 8 bytes: dst = [dst0, src0, dst1, src1, ...].
fn punpcklbw(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[0]) || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let src = c.load_x(&reg(&ins.args[0]), ins)?;
    let dst = reg(&ins.args[1]);
    let dv = c.load_x(&dst, ins)?;
    let mask = "<16 x i32> <i32 0, i32 16, i32 1, i32 17, i32 2, i32 18, i32 3, i32 19, i32 4, i32 20, i32 5, i32 21, i32 6, i32 22, i32 7, i32 23>";
    let sh = c.fresh();
    emit!(c.w, "{sh} = shufflevector <16 x i8> {dv}, <16 x i8> {src}, {mask}");
    c.store_x(&dst, &sh, ins)?;
    Ok(Some(Flow::Next))
}

fn pshufd(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[1]) || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? as u64 & 0xff;
    let idx = |k: u64| (imm >> (2 * k)) & 3;
    let src = c.load_x(&reg(&ins.args[1]), ins)?;
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <16 x i8> {src} to <4 x i32>");
    let mask = format!(
        "<4 x i32> <i32 {}, i32 {}, i32 {}, i32 {}>",
        idx(0),
        idx(1),
        idx(2),
        idx(3)
    );
    let sh = c.fresh();
    emit!(
        c.w,
        "{sh} = shufflevector <4 x i32> {bc}, <4 x i32> zeroinitializer, {mask}"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <4 x i32> {sh} to <16 x i8>");
    c.store_x(&reg(&ins.args[2]), &out, ins)?;
    Ok(Some(Flow::Next))
}

/// Shuffle high 4 words; low 4 words pass through.
fn pshufhw(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[1]) || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? as u64 & 0xff;
    let idx = |k: u64| (imm >> (2 * k)) & 3;
    let src = c.load_x(&reg(&ins.args[1]), ins)?;
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <16 x i8> {src} to <8 x i16>");
    let mask = format!(
        "<8 x i32> <i32 0, i32 1, i32 2, i32 3, i32 {}, i32 {}, i32 {}, i32 {}>",
        4 + idx(0),
        4 + idx(1),
        4 + idx(2),
        4 + idx(3)
    );
    let sh = c.fresh();
    emit!(
        c.w,
        "{sh} = shufflevector <8 x i16> {bc}, <8 x i16> zeroinitializer, {mask}"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <8 x i16> {sh} to <16 x i8>");
    c.store_x(&reg(&ins.args[2]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn shufps(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? as u64 & 0xff;
    let idx = |k: u64| (imm >> (2 * k)) & 3;
    let src = c.load_x_operand(&ins.args[1], ins)?;
    let dst = reg(&ins.args[2]);
    let dv = c.load_x(&dst, ins)?;
    let ds = c.fresh();
    emit!(c.w, "{ds} = bitcast <16 x i8> {dv} to <4 x i32>");
    let ss = c.fresh();
    emit!(c.w, "{ss} = bitcast <16 x i8> {src} to <4 x i32>");
    let mask = format!(
        "<4 x i32> <i32 {}, i32 {}, i32 {}, i32 {}>",
        idx(0),
        idx(1),
        4 + idx(2),
        4 + idx(3)
    );
    let sh = c.fresh();
    emit!(c.w, "{sh} = shufflevector <4 x i32> {ds}, <4 x i32> {ss}, {mask}");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <4 x i32> {sh} to <16 x i8>");
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn pblendw(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? as u64 & 0xff;
    let src = c.load_x_operand(&ins.args[1], ins)?;
    let dst = reg(&ins.args[2]);
    let dv = c.load_x(&dst, ins)?;
    let sv = c.fresh();
    emit!(c.w, "{sv} = bitcast <16 x i8> {src} to <8 x i16>");
    let dvv = c.fresh();
    emit!(c.w, "{dvv} = bitcast <16 x i8> {dv} to <8 x i16>");
    let mask = (0..8)
        .map(|i| {
            if (imm >> i) & 1 != 0 {
                format!("i32 {}", 8 + i)
            } else {
                format!("i32 {i}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let sh = c.fresh();
    emit!(
        c.w,
        "{sh} = shufflevector <8 x i16> {dvv}, <8 x i16> {sv}, <8 x i32> <{mask}>"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <8 x i16> {sh} to <16 x i8>");
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn pcmpeqb(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[0]) || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let ones = all_ones_i8(16);
    let (src, dst) = (reg(&ins.args[0]), reg(&ins.args[1]));
    // Common idiom: PCMPEQB X3, X3 -> all ones.
    if src == dst {
        c.store_x(&dst, &ones, ins)?;
        return Ok(Some(Flow::Next));
    }
    let sv = c.load_x(&src, ins)?;
    let dv = c.load_x(&dst, ins)?;
    let cmp = c.fresh();
    emit!(c.w, "{cmp} = icmp eq <16 x i8> {dv}, {sv}");
    let sel = c.fresh();
    emit!(
        c.w,
        "{sel} = select <16 x i1> {cmp}, <16 x i8> {ones}, <16 x i8> zeroinitializer"
    );
    c.store_x(&dst, &sel, ins)?;
    Ok(Some(Flow::Next))
}

fn pcmpeql(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[0]) || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let sv = c.load_x(&reg(&ins.args[0]), ins)?;
    let dst = reg(&ins.args[1]);
    let dv = c.load_x(&dst, ins)?;
    let sa = c.fresh();
    emit!(c.w, "{sa} = bitcast <16 x i8> {sv} to <4 x i32>");
    let da = c.fresh();
    emit!(c.w, "{da} = bitcast <16 x i8> {dv} to <4 x i32>");
    let cmp = c.fresh();
    emit!(c.w, "{cmp} = icmp eq <4 x i32> {da}, {sa}");
    let sext = c.fresh();
    emit!(c.w, "{sext} = sext <4 x i1> {cmp} to <4 x i32>");
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <4 x i32> {sext} to <16 x i8>");
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn pmovmskb(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[0]) || ins.args[1].as_reg().is_none() {
        return Ok(None);
    }
    let v = c.load_x(&reg(&ins.args[0]), ins)?;
    let m = pmovmskb_128(c, &v);
    let z = c.fresh();
    emit!(c.w, "{z} = zext i32 {m} to i64");
    let dst = reg(&ins.args[1]);
    c.store_reg(&dst, &z)?;
    Ok(Some(Flow::Next))
}

fn pshufb(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let mask = c.load_x_operand(&ins.args[0], ins)?;
    let dst = reg(&ins.args[1]);
    let dv = c.load_x(&dst, ins)?;
    let out = pshufb_128(c, &dv, &mask);
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn pclmulqdq(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[1]) || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? & 0xff;
    let src = c.load_x(&reg(&ins.args[1]), ins)?;
    let dst = reg(&ins.args[2]);
    let dv = c.load_x(&dst, ins)?;
    let bd = c.fresh();
    emit!(c.w, "{bd} = bitcast <16 x i8> {dv} to <2 x i64>");
    let bs = c.fresh();
    emit!(c.w, "{bs} = bitcast <16 x i8> {src} to <2 x i64>");
    let call = c.fresh();
    emit!(
        c.w,
        "{call} = call <2 x i64> @llvm.x86.pclmulqdq(<2 x i64> {bd}, <2 x i64> {bs}, i8 {imm})"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <2 x i64> {call} to <16 x i8>");
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn pinsr(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let lanes = 128 / bits as i64;
    let idx = imm_of(c, &ins.args[0], ins)? & (lanes - 1);
    let src64 = c.eval_i64(&ins.args[1], ins)?;
    let dst = reg(&ins.args[2]);
    let dv = c.load_x(&dst, ins)?;
    if bits == 8 {
        let b = c.fresh();
        emit!(c.w, "{b} = trunc i64 {src64} to i8");
        let out = c.fresh();
        emit!(c.w, "{out} = insertelement <16 x i8> {dv}, i8 {b}, i32 {idx}");
        c.store_x(&dst, &out, ins)?;
        return Ok(Some(Flow::Next));
    }
    let lane_ty = match bits {
        64 => "i64",
        32 => "i32",
        _ => "i16",
    };
    let vec_ty = format!("<{lanes} x {lane_ty}>");
    let narrowed = if bits == 64 {
        src64
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {src64} to {lane_ty}");
        t
    };
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <16 x i8> {dv} to {vec_ty}");
    let insv = c.fresh();
    emit!(
        c.w,
        "{insv} = insertelement {vec_ty} {bc}, {lane_ty} {narrowed}, i32 {idx}"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast {vec_ty} {insv} to <16 x i8>");
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn pextrd(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[1]) || ins.args[2].as_reg().is_none() {
        return Ok(None);
    }
    let idx = imm_of(c, &ins.args[0], ins)? & 3;
    let v = c.load_x(&reg(&ins.args[1]), ins)?;
    let bc = c.fresh();
    emit!(c.w, "{bc} = bitcast <16 x i8> {v} to <4 x i32>");
    let e = c.fresh();
    emit!(c.w, "{e} = extractelement <4 x i32> {bc}, i32 {idx}");
    let z = c.fresh();
    emit!(c.w, "{z} = zext i32 {e} to i64");
    let dst = reg(&ins.args[2]);
    c.store_reg(&dst, &z)?;
    Ok(Some(Flow::Next))
}

fn pextrb(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let idx = imm_of(c, &ins.args[0], ins)? & 15;
    let v = c.load_x(&reg(&ins.args[1]), ins)?;
    let e = c.fresh();
    emit!(c.w, "{e} = extractelement <16 x i8> {v}, i32 {idx}");
    match &ins.args[2] {
        Operand::Reg(r) => {
            let z = c.fresh();
            emit!(c.w, "{z} = zext i8 {e} to i64");
            c.store_reg(&r.clone(), &z)?;
        }
        Operand::Mem(m) => {
            let m = m.clone();
            let addr = c.addr_of_mem(&m, ins)?;
            let p = c.ptr_from_addr(&addr);
            emit!(c.w, "store i8 {e}, ptr {p}, align 1");
        }
        Operand::Sym(s) => {
            let p = c.ptr_from_sym(&s.clone())?;
            emit!(c.w, "store i8 {e}, ptr {p}, align 1");
        }
        _ => return Err(c.unsupported_operand(ins)),
    }
    Ok(Some(Flow::Next))
}

/// PCMPESTRI with imm8 = 0x0C (unsigned bytes, equal ordered, first match):
/// the one mode the stdlib's string search uses. The first index in [0..16)
/// where the needle prefix matches (fully, or partially at the block end)
/// lands in CX; 16 means no match.
fn pcmpestri(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? & 0xff;
    if imm != 0x0c {
        return Err(c.unsupported_operand(ins));
    }
    let needle = c.load_x(&reg(&ins.args[2]), ins)?;
    let hay = c.load_x_operand(&ins.args[1], ins)?;
    let ax = c.load_reg(&Reg::new("AX"))?;
    let len_a = c.fresh();
    emit!(c.w, "{len_a} = trunc i64 {ax} to i32");

    let ones = all_ones_i8(16);
    let mut prev = "16".to_string();
    for i in 0..16 {
        // Rotate the haystack so element 0 is hay[i], zero-padded past 16.
        let mask_elems = (0..16)
            .map(|k| {
                let j = i + k;
                if j < 16 {
                    format!("i32 {j}")
                } else {
                    "i32 16".to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sh = c.fresh();
        emit!(
            c.w,
            "{sh} = shufflevector <16 x i8> {hay}, <16 x i8> zeroinitializer, <16 x i32> <{mask_elems}>"
        );
        let cmp = c.fresh();
        emit!(c.w, "{cmp} = icmp eq <16 x i8> {sh}, {needle}");
        let sel = c.fresh();
        emit!(
            c.w,
            "{sel} = select <16 x i1> {cmp}, <16 x i8> {ones}, <16 x i8> zeroinitializer"
        );
        let pm = pmovmskb_128(c, &sel);

        // minLen = min(lenA, 16 - i); require that many matching prefix bits.
        let cap = 16 - i;
        let lt = c.fresh();
        emit!(c.w, "{lt} = icmp ult i32 {len_a}, {cap}");
        let min = c.fresh();
        emit!(c.w, "{min} = select i1 {lt}, i32 {len_a}, i32 {cap}");
        let sh1 = c.fresh();
        emit!(c.w, "{sh1} = shl i32 1, {min}");
        let req = c.fresh();
        emit!(c.w, "{req} = sub i32 {sh1}, 1");
        let have = c.fresh();
        emit!(c.w, "{have} = and i32 {pm}, {req}");
        let ok = c.fresh();
        emit!(c.w, "{ok} = icmp eq i32 {have}, {req}");

        let unset = c.fresh();
        emit!(c.w, "{unset} = icmp eq i32 {prev}, 16");
        let take = c.fresh();
        emit!(c.w, "{take} = and i1 {ok}, {unset}");
        let next = c.fresh();
        emit!(c.w, "{next} = select i1 {take}, i32 {i}, i32 {prev}");
        prev = next;
    }
    let z = c.fresh();
    emit!(c.w, "{z} = zext i32 {prev} to i64");
    c.store_reg(&Reg::new("CX"), &z)?;
    Ok(Some(Flow::Next))
}

fn aes_round(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let src = c.load_x_operand(&ins.args[0], ins)?;
    let dst = reg(&ins.args[1]);
    let dv = c.load_x(&dst, ins)?;
    let s2 = c.fresh();
    emit!(c.w, "{s2} = bitcast <16 x i8> {src} to <2 x i64>");
    let d2 = c.fresh();
    emit!(c.w, "{d2} = bitcast <16 x i8> {dv} to <2 x i64>");
    let intr = match op {
        Op::Aesenc => "@llvm.x86.aesni.aesenc",
        Op::Aesenclast => "@llvm.x86.aesni.aesenclast",
        Op::Aesdec => "@llvm.x86.aesni.aesdec",
        _ => "@llvm.x86.aesni.aesdeclast",
    };
    let call = c.fresh();
    emit!(
        c.w,
        "{call} = call <2 x i64> {intr}(<2 x i64> {d2}, <2 x i64> {s2})"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <2 x i64> {call} to <16 x i8>");
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn aesimc(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let src = c.load_x_operand(&ins.args[0], ins)?;
    let s2 = c.fresh();
    emit!(c.w, "{s2} = bitcast <16 x i8> {src} to <2 x i64>");
    let call = c.fresh();
    emit!(
        c.w,
        "{call} = call <2 x i64> @llvm.x86.aesni.aesimc(<2 x i64> {s2})"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <2 x i64> {call} to <16 x i8>");
    c.store_x(&reg(&ins.args[1]), &out, ins)?;
    Ok(Some(Flow::Next))
}

fn aeskeygenassist(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[1]) || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let imm = imm_of(c, &ins.args[0], ins)? & 0xff;
    let src = c.load_x(&reg(&ins.args[1]), ins)?;
    let s2 = c.fresh();
    emit!(c.w, "{s2} = bitcast <16 x i8> {src} to <2 x i64>");
    let call = c.fresh();
    emit!(
        c.w,
        "{call} = call <2 x i64> @llvm.x86.aesni.aeskeygenassist(<2 x i64> {s2}, i8 {imm})"
    );
    let out = c.fresh();
    emit!(c.w, "{out} = bitcast <2 x i64> {call} to <16 x i8>");
    c.store_x(&reg(&ins.args[2]), &out, ins)?;
    Ok(Some(Flow::Next))
}

/// SHA scheduling helpers as per-lane adds: placeholders that keep SSA flow,
/// not semantic implementations.
fn sha_msg(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Ok(None);
    }
    let src = c.load_x_operand(&ins.args[0], ins)?;
    let dst = reg(&ins.args[1]);
    let dv = c.load_x(&dst, ins)?;
    let out = lanewise(c, "add", "<16 x i8>", "<4 x i32>", &dv, &src);
    c.store_x(&dst, &out, ins)?;
    Ok(Some(Flow::Next))
}

fn sha_rnds2(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || !is_x(&ins.args[2]) {
        return Ok(None);
    }
    let a = c.load_x_operand(&ins.args[0], ins)?;
    let b = c.load_x_operand(&ins.args[1], ins)?;
    let out = lanewise(c, "add", "<16 x i8>", "<4 x i32>", &a, &b);
    c.store_x(&reg(&ins.args[2]), &out, ins)?;
    Ok(Some(Flow::Next))
}
