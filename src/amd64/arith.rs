// Integer arithmetic and logic family. Width-generic ADD/SUB/AND/OR/XOR over
// register and memory destinations with exact flag semantics: CF from the
// unsigned compare the instruction defines, OF from operand/result signs for
// additive ops and cleared by logicals, ZF/SF/PF from the result. Carry
// chains go through ADC/SBB (i128 widening for the carry-out) and the
// BMI2 ADCX/ADOX pair, which update only their own carry bit so interleaved
// chains stay isolated. Also here: INC/DEC (CF preserved), NEG/NOT, the
// MUL/IMUL/MULX/DIV group on the AX:DX register pair, bit scans and counts
// via LLVM intrinsics, shifts and rotates (including RORX and the
// rotate-through-carry RCRQ used by the runtime's division path), CMP/TEST,
// and the cc-driven SETcc/CMOVQcc forms.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, LlvmType, Operand, Reg, TranslateResult};

use super::ops::Op;
use super::{Flag, FnCtx};

#[derive(Clone, Copy, PartialEq)]
enum BinKind {
    Add,
    Sub,
    And,
    Or,
    Xor,
}

impl BinKind {
    fn ir_op(self) -> &'static str {
        match self {
            BinKind::Add => "add",
            BinKind::Sub => "sub",
            BinKind::And => "and",
            BinKind::Or => "or",
            BinKind::Xor => "xor",
        }
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

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Addq => binop(c, ins, 64, BinKind::Add),
        Op::Subq => binop(c, ins, 64, BinKind::Sub),
        Op::Andq => binop(c, ins, 64, BinKind::And),
        Op::Orq => binop(c, ins, 64, BinKind::Or),
        Op::Xorq => binop(c, ins, 64, BinKind::Xor),
        Op::Addl => binop(c, ins, 32, BinKind::Add),
        Op::Subl => binop(c, ins, 32, BinKind::Sub),
        Op::Andl => binop(c, ins, 32, BinKind::And),
        Op::Orl => binop(c, ins, 32, BinKind::Or),
        Op::Xorl => binop(c, ins, 32, BinKind::Xor),
        Op::Addb => binop(c, ins, 8, BinKind::Add),
        Op::Subb => binop(c, ins, 8, BinKind::Sub),
        Op::Andb => binop(c, ins, 8, BinKind::And),
        Op::Orb => binop(c, ins, 8, BinKind::Or),
        Op::Xorb => binop(c, ins, 8, BinKind::Xor),

        Op::Adcq | Op::Sbbq => adc_sbb(c, ins, matches!(op, Op::Adcq)),
        Op::Adcxq | Op::Adoxq => adcx_adox(c, ins, matches!(op, Op::Adoxq)),

        Op::Incq => inc_dec(c, ins, 64, true),
        Op::Decq => inc_dec(c, ins, 64, false),
        Op::Incl => inc_dec(c, ins, 32, true),
        Op::Decl => inc_dec(c, ins, 32, false),

        Op::Negq => neg(c, ins, 64),
        Op::Negl => neg(c, ins, 32),
        Op::Notq => not(c, ins, 64),
        Op::Notl => not(c, ins, 32),

        Op::Mulq => mulq(c, ins),
        Op::Mull => mull(c, ins),
        Op::Mulxq => mulxq(c, ins),
        Op::Imulq | Op::Imul3q => imul(c, ins, matches!(op, Op::Imul3q)),
        Op::Divl => divl(c, ins),
        Op::Divq => divq(c, ins),

        Op::Bswapq | Op::Bswapl => bswap(c, ins, matches!(op, Op::Bswapq)),
        Op::Bsfq | Op::Bsrq | Op::Bsfl | Op::Bsrl => bitscan(c, op, ins),
        Op::Popcntq | Op::Popcntl => popcnt(c, ins, matches!(op, Op::Popcntq)),
        Op::Andnq | Op::Andnl => andn(c, ins, matches!(op, Op::Andnq)),

        Op::Shlq | Op::Salq => shift(c, ins, 64, "shl"),
        Op::Shrq => shift(c, ins, 64, "lshr"),
        Op::Sarq => shift(c, ins, 64, "ashr"),
        Op::Shll | Op::Sall => shift(c, ins, 32, "shl"),
        Op::Shrl => shift(c, ins, 32, "lshr"),
        Op::Sarl => shift(c, ins, 32, "ashr"),

        Op::Rolq => rotate(c, ins, 64, true),
        Op::Roll => rotate(c, ins, 32, true),
        Op::Rorq => rotate(c, ins, 64, false),
        Op::Rorl => rotate(c, ins, 32, false),
        Op::Rorxq => rorx(c, ins, 64),
        Op::Rorxl => rorx(c, ins, 32),
        Op::Rcrq => rcrq(c, ins),

        Op::Cmpq => cmp(c, ins, 64),
        Op::Cmpl => cmp(c, ins, 32),
        Op::Cmpw => cmp(c, ins, 16),
        Op::Cmpb => cmp(c, ins, 8),
        Op::Testq => test(c, ins, 64),
        Op::Testl => test(c, ins, 32),
        Op::Testb => test(c, ins, 8),

        Op::Set(cc) => {
            let cc = *cc;
            if ins.args.len() != 1 {
                return Err(c.unsupported_operand(ins));
            }
            let cond = c.cond_value(cc);
            match &ins.args[0] {
                Operand::Reg(r) => {
                    let r = r.clone();
                    let sel = c.fresh();
                    emit!(c.w, "{sel} = select i1 {cond}, i64 1, i64 0");
                    c.store_reg(&r, &sel)?;
                }
                Operand::Fp { offset, .. } => {
                    c.store_fp_result(*offset, &LlvmType::I1, &cond, ins)?;
                }
                Operand::Mem(m) => {
                    let m = m.clone();
                    let byte = c.fresh();
                    emit!(c.w, "{byte} = zext i1 {cond} to i8");
                    let addr = c.addr_of_mem(&m, ins)?;
                    let p = c.ptr_from_addr(&addr);
                    emit!(c.w, "store i8 {byte}, ptr {p}, align 1");
                }
                _ => return Err(c.unsupported_operand(ins)),
            }
            Ok(Some(Flow::Next))
        }

        Op::Cmov(cc) => {
            let cc = *cc;
            if ins.args.len() != 2 {
                return Err(c.unsupported_operand(ins));
            }
            let dst = match ins.args[1].as_reg() {
                Some(r) => r.clone(),
                None => return Err(c.unsupported_operand(ins)),
            };
            let src = c.eval_i64(&ins.args[0], ins)?;
            let cur = c.load_reg(&dst)?;
            let cond = c.cond_value(cc);
            let sel = c.fresh();
            emit!(c.w, "{sel} = select i1 {cond}, i64 {src}, i64 {cur}");
            c.store_reg(&dst, &sel)?;
            Ok(Some(Flow::Next))
        }

        _ => Ok(None),
    }
}

fn binop(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    bits: u32,
    kind: BinKind,
) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = int_ty(bits);
    let dv = c.eval_width(&ins.args[1], bits, ins)?;
    let src = c.eval_width(&ins.args[0], bits, ins)?;
    let r = c.fresh();
    emit!(c.w, "{r} = {} {ty} {dv}, {src}", kind.ir_op());
    c.store_width(&ins.args[1], &r, bits, ins)?;

    match kind {
        BinKind::Add => {
            let cf = c.fresh();
            emit!(c.w, "{cf} = icmp ult {ty} {r}, {dv}");
            c.store_flag(Flag::Cf, &cf);
            c.set_add_overflow(ty, &dv, &src, &r);
        }
        BinKind::Sub => {
            let cf = c.fresh();
            emit!(c.w, "{cf} = icmp ult {ty} {dv}, {src}");
            c.store_flag(Flag::Cf, &cf);
            c.set_sub_overflow(ty, &dv, &src, &r);
        }
        _ => c.clear_cf_of(),
    }
    c.set_result_flags(&r, ty);
    Ok(Some(Flow::Next))
}

/// ADCQ/SBBQ: carry-in from CF, carry-out via i128 widening.
fn adc_sbb(c: &mut FnCtx<'_>, ins: &Instr, is_adc: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || ins.args[1].as_reg().is_none() {
        return Err(c.unsupported_operand(ins));
    }
    let dst = ins.args[1].as_reg().cloned().unwrap_or_else(|| Reg::new("AX"));
    let src = c.eval_i64(&ins.args[0], ins)?;
    let dv = c.load_reg(&dst)?;
    let cf_in = c.load_flag(Flag::Cf);
    let cf64 = c.fresh();
    emit!(c.w, "{cf64} = zext i1 {cf_in} to i64");

    let dv128 = c.fresh();
    emit!(c.w, "{dv128} = zext i64 {dv} to i128");
    let src128 = c.fresh();
    emit!(c.w, "{src128} = zext i64 {src} to i128");
    let cf128 = c.fresh();
    emit!(c.w, "{cf128} = zext i64 {cf64} to i128");

    if is_adc {
        let sum = c.fresh();
        emit!(c.w, "{sum} = add i64 {dv}, {src}");
        let res = c.fresh();
        emit!(c.w, "{res} = add i64 {sum}, {cf64}");
        c.store_reg(&dst, &res)?;

        let t1 = c.fresh();
        emit!(c.w, "{t1} = add i128 {dv128}, {src128}");
        let t2 = c.fresh();
        emit!(c.w, "{t2} = add i128 {t1}, {cf128}");
        let cf = c.fresh();
        emit!(c.w, "{cf} = icmp ugt i128 {t2}, 18446744073709551615");
        c.store_flag(Flag::Cf, &cf);
        c.store_flag(Flag::Of, "false");
        c.set_result_flags(&res, "i64");
        return Ok(Some(Flow::Next));
    }

    let sub = c.fresh();
    emit!(c.w, "{sub} = add i128 {src128}, {cf128}");
    let borrow = c.fresh();
    emit!(c.w, "{borrow} = icmp ult i128 {dv128}, {sub}");
    let r1 = c.fresh();
    emit!(c.w, "{r1} = sub i64 {dv}, {src}");
    let r2 = c.fresh();
    emit!(c.w, "{r2} = sub i64 {r1}, {cf64}");
    c.store_reg(&dst, &r2)?;
    c.store_flag(Flag::Cf, &borrow);
    c.store_flag(Flag::Of, "false");
    c.set_result_flags(&r2, "i64");
    Ok(Some(Flow::Next))
}

/// ADCX/ADOX: carry chains isolated to CF or OF respectively; no other flag
/// bits are touched.
fn adcx_adox(c: &mut FnCtx<'_>, ins: &Instr, use_of: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || ins.args[1].as_reg().is_none() {
        return Err(c.unsupported_operand(ins));
    }
    let dst = ins.args[1].as_reg().cloned().unwrap_or_else(|| Reg::new("AX"));
    let src = c.eval_i64(&ins.args[0], ins)?;
    let dv = c.load_reg(&dst)?;
    let flag = if use_of { Flag::Of } else { Flag::Cf };
    let carry_in = c.load_flag(flag);
    let cf64 = c.fresh();
    emit!(c.w, "{cf64} = zext i1 {carry_in} to i64");
    let sum = c.fresh();
    emit!(c.w, "{sum} = add i64 {dv}, {src}");
    let res = c.fresh();
    emit!(c.w, "{res} = add i64 {sum}, {cf64}");
    c.store_reg(&dst, &res)?;

    let dv128 = c.fresh();
    emit!(c.w, "{dv128} = zext i64 {dv} to i128");
    let src128 = c.fresh();
    emit!(c.w, "{src128} = zext i64 {src} to i128");
    let cf128 = c.fresh();
    emit!(c.w, "{cf128} = zext i64 {cf64} to i128");
    let t1 = c.fresh();
    emit!(c.w, "{t1} = add i128 {dv128}, {src128}");
    let t2 = c.fresh();
    emit!(c.w, "{t2} = add i128 {t1}, {cf128}");
    let carry = c.fresh();
    emit!(c.w, "{carry} = icmp ugt i128 {t2}, 18446744073709551615");
    c.store_flag(flag, &carry);
    Ok(Some(Flow::Next))
}

/// INC/DEC define ZF/SF/OF but preserve CF.
fn inc_dec(c: &mut FnCtx<'_>, ins: &Instr, bits: u32, inc: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = int_ty(bits);
    let dv = c.eval_width(&ins.args[0], bits, ins)?;
    let r = c.fresh();
    if inc {
        emit!(c.w, "{r} = add {ty} {dv}, 1");
        c.set_add_overflow(ty, &dv, "1", &r);
    } else {
        emit!(c.w, "{r} = sub {ty} {dv}, 1");
        c.set_sub_overflow(ty, &dv, "1", &r);
    }
    c.store_width(&ins.args[0], &r, bits, ins)?;
    c.set_result_flags(&r, ty);
    Ok(Some(Flow::Next))
}

fn neg(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = int_ty(bits);
    let dv = c.eval_width(&ins.args[0], bits, ins)?;
    let r = c.fresh();
    emit!(c.w, "{r} = sub {ty} 0, {dv}");
    c.store_width(&ins.args[0], &r, bits, ins)?;
    let cf = c.fresh();
    emit!(c.w, "{cf} = icmp ne {ty} {dv}, 0");
    c.store_flag(Flag::Cf, &cf);
    c.set_sub_overflow(ty, "0", &dv, &r);
    c.set_result_flags(&r, ty);
    Ok(Some(Flow::Next))
}

fn not(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = int_ty(bits);
    let dv = c.eval_width(&ins.args[0], bits, ins)?;
    let r = c.fresh();
    emit!(c.w, "{r} = xor {ty} {dv}, -1");
    c.store_width(&ins.args[0], &r, bits, ins)?;
    Ok(Some(Flow::Next))
}

/// MULQ src: RDX:RAX = RAX * src (unsigned).
fn mulq(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let src = c.eval_i64(&ins.args[0], ins)?;
    let ax = c.load_reg(&Reg::new("AX"))?;
    let (lo, hi) = wide_mul(c, &ax, &src, false);
    c.store_reg(&Reg::new("AX"), &lo)?;
    c.store_reg(&Reg::new("DX"), &hi)?;
    let cf = c.fresh();
    emit!(c.w, "{cf} = icmp ne i64 {hi}, 0");
    c.store_flag(Flag::Cf, &cf);
    c.store_flag(Flag::Of, &cf);
    Ok(Some(Flow::Next))
}

/// 64x64 -> 128 multiply returning (lo, hi) halves.
fn wide_mul(c: &mut FnCtx<'_>, a: &str, b: &str, signed: bool) -> (String, String) {
    let ext = if signed { "sext" } else { "zext" };
    let shr = if signed { "ashr" } else { "lshr" };
    let a128 = c.fresh();
    emit!(c.w, "{a128} = {ext} i64 {a} to i128");
    let b128 = c.fresh();
    emit!(c.w, "{b128} = {ext} i64 {b} to i128");
    let p = c.fresh();
    emit!(c.w, "{p} = mul i128 {a128}, {b128}");
    let lo = c.fresh();
    emit!(c.w, "{lo} = trunc i128 {p} to i64");
    let hi_shift = c.fresh();
    emit!(c.w, "{hi_shift} = {shr} i128 {p}, 64");
    let hi = c.fresh();
    emit!(c.w, "{hi} = trunc i128 {hi_shift} to i64");
    (lo, hi)
}

/// MULL src: EDX:EAX = EAX * src (unsigned 32-bit).
fn mull(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let src = c.eval_width(&ins.args[0], 32, ins)?;
    let ax64 = c.load_reg(&Reg::new("AX"))?;
    let ax32 = c.fresh();
    emit!(c.w, "{ax32} = trunc i64 {ax64} to i32");
    let az = c.fresh();
    emit!(c.w, "{az} = zext i32 {ax32} to i64");
    let bz = c.fresh();
    emit!(c.w, "{bz} = zext i32 {src} to i64");
    let p = c.fresh();
    emit!(c.w, "{p} = mul i64 {az}, {bz}");
    let lo = c.fresh();
    emit!(c.w, "{lo} = and i64 {p}, 4294967295");
    let hi = c.fresh();
    emit!(c.w, "{hi} = lshr i64 {p}, 32");
    c.store_reg(&Reg::new("AX"), &lo)?;
    c.store_reg(&Reg::new("DX"), &hi)?;
    Ok(Some(Flow::Next))
}

/// MULXQ src, loDst, hiDst: {hi,lo} = RDX * src without touching flags.
fn mulxq(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 || ins.args[1].as_reg().is_none() || ins.args[2].as_reg().is_none() {
        return Err(c.unsupported_operand(ins));
    }
    let src = c.eval_i64(&ins.args[0], ins)?;
    let dx = c.load_reg(&Reg::new("DX"))?;
    let (lo, hi) = wide_mul(c, &dx, &src, false);
    let lo_dst = ins.args[1].as_reg().cloned().unwrap_or_else(|| Reg::new("AX"));
    let hi_dst = ins.args[2].as_reg().cloned().unwrap_or_else(|| Reg::new("DX"));
    c.store_reg(&lo_dst, &lo)?;
    c.store_reg(&hi_dst, &hi)?;
    Ok(Some(Flow::Next))
}

fn imul(c: &mut FnCtx<'_>, ins: &Instr, three: bool) -> TranslateResult<Option<Flow>> {
    match ins.args.len() {
        1 if !three => {
            // RDX:RAX = signed RAX * src.
            let src = c.eval_i64(&ins.args[0], ins)?;
            let ax = c.load_reg(&Reg::new("AX"))?;
            let (lo, hi) = wide_mul(c, &ax, &src, true);
            c.store_reg(&Reg::new("AX"), &lo)?;
            c.store_reg(&Reg::new("DX"), &hi)?;
            Ok(Some(Flow::Next))
        }
        2 if !three => {
            let dst = match ins.args[1].as_reg() {
                Some(r) => r.clone(),
                None => return Err(c.unsupported_operand(ins)),
            };
            let src = c.eval_i64(&ins.args[0], ins)?;
            let dv = c.load_reg(&dst)?;
            let r = c.fresh();
            emit!(c.w, "{r} = mul i64 {dv}, {src}");
            c.store_reg(&dst, &r)?;
            Ok(Some(Flow::Next))
        }
        3 => {
            let dst = match ins.args[2].as_reg() {
                Some(r) => r.clone(),
                None => return Err(c.unsupported_operand(ins)),
            };
            let imm = c.eval_i64(&ins.args[0], ins)?;
            let src = c.eval_i64(&ins.args[1], ins)?;
            let r = c.fresh();
            emit!(c.w, "{r} = mul i64 {src}, {imm}");
            c.store_reg(&dst, &r)?;
            Ok(Some(Flow::Next))
        }
        _ => Err(c.unsupported_operand(ins)),
    }
}

/// DIVL src: unsigned divide EDX:EAX by src; quotient->EAX, remainder->EDX.
fn divl(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let src = c.eval_width(&ins.args[0], 32, ins)?;
    let ax64 = c.load_reg(&Reg::new("AX"))?;
    let dx64 = c.load_reg(&Reg::new("DX"))?;
    let ax = c.fresh();
    emit!(c.w, "{ax} = and i64 {ax64}, 4294967295");
    let dx = c.fresh();
    emit!(c.w, "{dx} = and i64 {dx64}, 4294967295");
    let divisor = c.fresh();
    emit!(c.w, "{divisor} = zext i32 {src} to i64");
    let hi = c.fresh();
    emit!(c.w, "{hi} = shl i64 {dx}, 32");
    let dividend = c.fresh();
    emit!(c.w, "{dividend} = or i64 {hi}, {ax}");
    let q = c.fresh();
    emit!(c.w, "{q} = udiv i64 {dividend}, {divisor}");
    let rem = c.fresh();
    emit!(c.w, "{rem} = urem i64 {dividend}, {divisor}");
    let q32 = c.fresh();
    emit!(c.w, "{q32} = and i64 {q}, 4294967295");
    let r32 = c.fresh();
    emit!(c.w, "{r32} = and i64 {rem}, 4294967295");
    c.store_reg(&Reg::new("AX"), &q32)?;
    c.store_reg(&Reg::new("DX"), &r32)?;
    Ok(Some(Flow::Next))
}

/// DIVQ src: unsigned divide RDX:RAX by src via i128.
fn divq(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let src = c.eval_i64(&ins.args[0], ins)?;
    let ax = c.load_reg(&Reg::new("AX"))?;
    let dx = c.load_reg(&Reg::new("DX"))?;
    let lo = c.fresh();
    emit!(c.w, "{lo} = zext i64 {ax} to i128");
    let hi = c.fresh();
    emit!(c.w, "{hi} = zext i64 {dx} to i128");
    let hi_shift = c.fresh();
    emit!(c.w, "{hi_shift} = shl i128 {hi}, 64");
    let dividend = c.fresh();
    emit!(c.w, "{dividend} = or i128 {hi_shift}, {lo}");
    let divisor = c.fresh();
    emit!(c.w, "{divisor} = zext i64 {src} to i128");
    let q = c.fresh();
    emit!(c.w, "{q} = udiv i128 {dividend}, {divisor}");
    let rem = c.fresh();
    emit!(c.w, "{rem} = urem i128 {dividend}, {divisor}");
    let q64 = c.fresh();
    emit!(c.w, "{q64} = trunc i128 {q} to i64");
    let r64 = c.fresh();
    emit!(c.w, "{r64} = trunc i128 {rem} to i64");
    c.store_reg(&Reg::new("AX"), &q64)?;
    c.store_reg(&Reg::new("DX"), &r64)?;
    Ok(Some(Flow::Next))
}

fn bswap(c: &mut FnCtx<'_>, ins: &Instr, wide: bool) -> TranslateResult<Option<Flow>> {
    let r = match ins.args.first().and_then(|a| a.as_reg()) {
        Some(r) => r.clone(),
        None => return Err(c.unsupported_operand(ins)),
    };
    let v = c.load_reg(&r)?;
    if wide {
        let t = c.fresh();
        emit!(c.w, "{t} = call i64 @llvm.bswap.i64(i64 {v})");
        c.store_reg(&r, &t)?;
    } else {
        let tr = c.fresh();
        emit!(c.w, "{tr} = trunc i64 {v} to i32");
        let sw = c.fresh();
        emit!(c.w, "{sw} = call i32 @llvm.bswap.i32(i32 {tr})");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {sw} to i64");
        c.store_reg(&r, &z)?;
    }
    Ok(Some(Flow::Next))
}

/// BSF/BSR set ZF from the source and use the non-poison cttz/ctlz forms so
/// a zero source stays defined.
fn bitscan(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let (src, dst) = match ins.args.len() {
        1 => match ins.args[0].as_reg() {
            Some(r) => (r.clone(), r.clone()),
            None => return Err(c.unsupported_operand(ins)),
        },
        2 => match (ins.args[0].as_reg(), ins.args[1].as_reg()) {
            (Some(s), Some(d)) => (s.clone(), d.clone()),
            _ => return Err(c.unsupported_operand(ins)),
        },
        _ => return Err(c.unsupported_operand(ins)),
    };
    let sv = c.load_reg(&src)?;
    match op {
        Op::Bsfq | Op::Bsrq => {
            let zf = c.fresh();
            emit!(c.w, "{zf} = icmp eq i64 {sv}, 0");
            c.store_flag(Flag::Zf, &zf);
            let t = c.fresh();
            if matches!(op, Op::Bsfq) {
                emit!(c.w, "{t} = call i64 @llvm.cttz.i64(i64 {sv}, i1 false)");
                c.store_reg(&dst, &t)?;
            } else {
                emit!(c.w, "{t} = call i64 @llvm.ctlz.i64(i64 {sv}, i1 false)");
                let sub = c.fresh();
                emit!(c.w, "{sub} = sub i64 63, {t}");
                c.store_reg(&dst, &sub)?;
            }
        }
        _ => {
            let tr = c.fresh();
            emit!(c.w, "{tr} = trunc i64 {sv} to i32");
            let zf = c.fresh();
            emit!(c.w, "{zf} = icmp eq i32 {tr}, 0");
            c.store_flag(Flag::Zf, &zf);
            let t = c.fresh();
            if matches!(op, Op::Bsfl) {
                emit!(c.w, "{t} = call i32 @llvm.cttz.i32(i32 {tr}, i1 false)");
                let z = c.fresh();
                emit!(c.w, "{z} = zext i32 {t} to i64");
                c.store_reg(&dst, &z)?;
            } else {
                emit!(c.w, "{t} = call i32 @llvm.ctlz.i32(i32 {tr}, i1 false)");
                let sub = c.fresh();
                emit!(c.w, "{sub} = sub i32 31, {t}");
                let z = c.fresh();
                emit!(c.w, "{z} = zext i32 {sub} to i64");
                c.store_reg(&dst, &z)?;
            }
        }
    }
    Ok(Some(Flow::Next))
}

fn popcnt(c: &mut FnCtx<'_>, ins: &Instr, wide: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let dst = match ins.args[1].as_reg() {
        Some(r) => r.clone(),
        None => return Err(c.unsupported_operand(ins)),
    };
    if wide {
        let v = c.eval_i64(&ins.args[0], ins)?;
        let t = c.fresh();
        emit!(c.w, "{t} = call i64 @llvm.ctpop.i64(i64 {v})");
        c.store_reg(&dst, &t)?;
    } else {
        let v = c.eval_width(&ins.args[0], 32, ins)?;
        let t = c.fresh();
        emit!(c.w, "{t} = call i32 @llvm.ctpop.i32(i32 {v})");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {t} to i64");
        c.store_reg(&dst, &z)?;
    }
    Ok(Some(Flow::Next))
}

/// BMI1 ANDN: dst = ~src2 & src1.
fn andn(c: &mut FnCtx<'_>, ins: &Instr, wide: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    let dst = match ins.args[2].as_reg() {
        Some(r) => r.clone(),
        None => return Err(c.unsupported_operand(ins)),
    };
    if wide {
        let s1 = c.eval_i64(&ins.args[0], ins)?;
        let s2 = c.eval_i64(&ins.args[1], ins)?;
        let n = c.fresh();
        emit!(c.w, "{n} = xor i64 {s2}, -1");
        let a = c.fresh();
        emit!(c.w, "{a} = and i64 {n}, {s1}");
        c.store_reg(&dst, &a)?;
    } else {
        let s1 = c.eval_width(&ins.args[0], 32, ins)?;
        let s2 = c.eval_width(&ins.args[1], 32, ins)?;
        let n = c.fresh();
        emit!(c.w, "{n} = xor i32 {s2}, -1");
        let a = c.fresh();
        emit!(c.w, "{a} = and i32 {n}, {s1}");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {a} to i64");
        c.store_reg(&dst, &z)?;
    }
    Ok(Some(Flow::Next))
}

/// Shifts, 2-operand (amt, dst) and 3-operand (amt, src, dst) forms. Shift
/// counts mask to the operand width as the hardware does.
fn shift(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    bits: u32,
    ir_op: &str,
) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 && ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    let dst = match ins.args.last().and_then(|a| a.as_reg()) {
        Some(r) => r.clone(),
        None => return Err(c.unsupported_operand(ins)),
    };
    let src_reg = if ins.args.len() == 3 {
        match ins.args[1].as_reg() {
            Some(r) => r.clone(),
            None => return Err(c.unsupported_operand(ins)),
        }
    } else {
        dst.clone()
    };
    let ty = int_ty(bits);
    let mask = (bits - 1) as i64;

    let amt = match &ins.args[0] {
        Operand::Imm(v) => (v & mask).to_string(),
        Operand::Reg(r) => {
            let r = r.clone();
            let av = c.load_reg(&r)?;
            let m = c.fresh();
            emit!(c.w, "{m} = and i64 {av}, {mask}");
            m
        }
        _ => return Err(c.unsupported_operand(ins)),
    };

    let dv = c.load_reg(&src_reg)?;
    if bits == 64 {
        let t = c.fresh();
        emit!(c.w, "{t} = {ir_op} i64 {dv}, {amt}");
        c.store_reg(&dst, &t)?;
        return Ok(Some(Flow::Next));
    }

    let tr = c.fresh();
    emit!(c.w, "{tr} = trunc i64 {dv} to {ty}");
    let amt32 = if amt.starts_with('%') {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {amt} to {ty}");
        t
    } else {
        amt
    };
    let sh = c.fresh();
    emit!(c.w, "{sh} = {ir_op} {ty} {tr}, {amt32}");
    let z = c.fresh();
    emit!(c.w, "{z} = zext {ty} {sh} to i64");
    c.store_reg(&dst, &z)?;
    Ok(Some(Flow::Next))
}

fn rotate(c: &mut FnCtx<'_>, ins: &Instr, bits: u32, left: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let dst = match ins.args[1].as_reg() {
        Some(r) => r.clone(),
        None => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let mask = (bits - 1) as i64;
    let dv64 = c.load_reg(&dst)?;
    let dv = if bits == 64 {
        dv64
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {dv64} to {ty}");
        t
    };
    let cnt = match &ins.args[0] {
        Operand::Imm(v) => (v & mask).to_string(),
        Operand::Reg(r) => {
            let r = r.clone();
            let cv = c.load_reg(&r)?;
            let narrowed = if bits == 64 {
                cv
            } else {
                let t = c.fresh();
                emit!(c.w, "{t} = trunc i64 {cv} to {ty}");
                t
            };
            let m = c.fresh();
            emit!(c.w, "{m} = and {ty} {narrowed}, {mask}");
            m
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let rot = emit_rotate(c, ty, bits, &dv, &cnt, left);
    if bits == 64 {
        c.store_reg(&dst, &rot)?;
    } else {
        let z = c.fresh();
        emit!(c.w, "{z} = zext {ty} {rot} to i64");
        c.store_reg(&dst, &z)?;
    }
    Ok(Some(Flow::Next))
}

fn emit_rotate(
    c: &mut FnCtx<'_>,
    ty: &str,
    bits: u32,
    v: &str,
    cnt: &str,
    left: bool,
) -> String {
    let mask = bits - 1;
    let neg = c.fresh();
    emit!(c.w, "{neg} = sub {ty} {bits}, {cnt}");
    let nm = c.fresh();
    emit!(c.w, "{nm} = and {ty} {neg}, {mask}");
    let lhs = c.fresh();
    let rhs = c.fresh();
    if left {
        emit!(c.w, "{lhs} = shl {ty} {v}, {cnt}");
        emit!(c.w, "{rhs} = lshr {ty} {v}, {nm}");
    } else {
        emit!(c.w, "{lhs} = lshr {ty} {v}, {cnt}");
        emit!(c.w, "{rhs} = shl {ty} {v}, {nm}");
    }
    let rot = c.fresh();
    emit!(c.w, "{rot} = or {ty} {lhs}, {rhs}");
    rot
}

/// BMI2 rotate-right without flags: RORX $imm, srcReg, dstReg.
fn rorx(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 3 {
        return Err(c.unsupported_operand(ins));
    }
    let (imm, src, dst) = match (&ins.args[0], ins.args[1].as_reg(), ins.args[2].as_reg()) {
        (Operand::Imm(v), Some(s), Some(d)) => (*v, s.clone(), d.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let ty = int_ty(bits);
    let n = (imm as u64 & (bits as u64 - 1)).to_string();
    let sv64 = c.load_reg(&src)?;
    let sv = if bits == 64 {
        sv64
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {sv64} to {ty}");
        t
    };
    let rot = emit_rotate(c, ty, bits, &sv, &n, false);
    if bits == 64 {
        c.store_reg(&dst, &rot)?;
    } else {
        let z = c.fresh();
        emit!(c.w, "{z} = zext {ty} {rot} to i64");
        c.store_reg(&dst, &z)?;
    }
    Ok(Some(Flow::Next))
}

/// Rotate through carry right by one, as used by the runtime's time division
/// path.
fn rcrq(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let ok = matches!(ins.args.first(), Some(Operand::Imm(1)));
    let dst = ins.args.get(1).and_then(|a| a.as_reg()).cloned();
    let dst = match (ok, dst) {
        (true, Some(r)) => r,
        _ => return Err(c.unsupported_operand(ins)),
    };
    let dv = c.load_reg(&dst)?;
    let old_cf = c.load_flag(Flag::Cf);
    let lsb = c.fresh();
    emit!(c.w, "{lsb} = and i64 {dv}, 1");
    let new_cf = c.fresh();
    emit!(c.w, "{new_cf} = icmp ne i64 {lsb}, 0");
    c.store_flag(Flag::Cf, &new_cf);
    let shr = c.fresh();
    emit!(c.w, "{shr} = lshr i64 {dv}, 1");
    let cf64 = c.fresh();
    emit!(c.w, "{cf64} = zext i1 {old_cf} to i64");
    let cfhi = c.fresh();
    emit!(c.w, "{cfhi} = shl i64 {cf64}, 63");
    let out = c.fresh();
    emit!(c.w, "{out} = or i64 {shr}, {cfhi}");
    c.store_reg(&dst, &out)?;
    c.set_result_flags(&out, "i64");
    Ok(Some(Flow::Next))
}

/// CMP reads its operands left-to-right: flags come from args[0] - args[1].
fn cmp(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = int_ty(bits);
    let a = c.eval_width(&ins.args[0], bits, ins)?;
    let b = c.eval_width(&ins.args[1], bits, ins)?;
    let r = c.fresh();
    emit!(c.w, "{r} = sub {ty} {a}, {b}");
    let cf = c.fresh();
    emit!(c.w, "{cf} = icmp ult {ty} {a}, {b}");
    c.store_flag(Flag::Cf, &cf);
    c.set_sub_overflow(ty, &a, &b, &r);
    c.set_result_flags(&r, ty);
    Ok(Some(Flow::Next))
}

fn test(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = int_ty(bits);
    let a = c.eval_width(&ins.args[0], bits, ins)?;
    let b = c.eval_width(&ins.args[1], bits, ins)?;
    let r = c.fresh();
    emit!(c.w, "{r} = and {ty} {a}, {b}");
    c.clear_cf_of();
    c.set_result_flags(&r, ty);
    Ok(Some(Flow::Next))
}
