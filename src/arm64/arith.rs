// Integer arithmetic family. Operand order follows the Plan 9 convention:
// the destination is last, two-operand forms accumulate in place, and SUB
// subtracts its first operand from its second. Flag-setting ops record the
// comparison state (operand pair, carry, overflow) consumed by Bcc and the
// conditional-select group. Division guards the zero-divisor and INT_MIN/-1
// cases so the emitted IR matches AArch64's defined results instead of
// tripping LLVM UB. Bit-field ops implement the UBFX/SBFX/UBFIZ/SBFIZ/BFI/
// BFXIL aliases, with raw UBFM/SBFM decoded onto them. CRC32 goes through
// the AArch64 intrinsics; the byte-reverse group uses bswap plus lane
// arithmetic for REV16/REV32.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, Operand, Reg, TranslateResult};

use super::ops::{Cond, Op};
use super::FnCtx;

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Add => binop(c, ins, "add", 64, false),
        Op::Adds => binop(c, ins, "add", 64, true),
        Op::Addw => binop(c, ins, "add", 32, false),
        Op::Sub => binop(c, ins, "sub", 64, false),
        Op::Subs => binop(c, ins, "sub", 64, true),
        Op::Subw => binop(c, ins, "sub", 32, false),
        Op::And => binop(c, ins, "and", 64, false),
        Op::Ands => binop(c, ins, "and", 64, true),
        Op::Andw => binop(c, ins, "and", 32, false),
        Op::Orr => binop(c, ins, "or", 64, false),
        Op::Orrw => binop(c, ins, "or", 32, false),
        Op::Eor => binop(c, ins, "xor", 64, false),
        Op::Eorw => binop(c, ins, "xor", 32, false),
        Op::Bic | Op::Orn | Op::Eon => negated_logic(c, op, ins),

        Op::Cmp => cmp(c, ins, 64),
        Op::Cmpw => cmp(c, ins, 32),
        Op::Cmn => cmn(c, ins, 64),
        Op::Cmnw => cmn(c, ins, 32),
        Op::Tst | Op::Tstw => tst(c, ins, matches!(op, Op::Tstw)),

        Op::Neg | Op::Negs | Op::Negw => neg(c, op, ins),

        Op::Mul => mul(c, ins, 64),
        Op::Mulw => mul(c, ins, 32),
        Op::Umulh => mulh(c, ins, false),
        Op::Smulh => mulh(c, ins, true),
        Op::Madd => madd(c, ins, true),
        Op::Msub => madd(c, ins, false),
        Op::Udiv => div(c, ins, 64, false),
        Op::Udivw => div(c, ins, 32, false),
        Op::Sdiv => div(c, ins, 64, true),
        Op::Sdivw => div(c, ins, 32, true),

        Op::Lsl => shift(c, ins, "shl", 64),
        Op::Lslw => shift(c, ins, "shl", 32),
        Op::Lsr => shift(c, ins, "lshr", 64),
        Op::Lsrw => shift(c, ins, "lshr", 32),
        Op::Asr => shift(c, ins, "ashr", 64),
        Op::Asrw => shift(c, ins, "ashr", 32),
        Op::Ror => ror(c, ins, 64),
        Op::Rorw => ror(c, ins, 32),
        Op::Extr => extr(c, ins),

        Op::Clz => clz(c, ins, 64),
        Op::Clzw => clz(c, ins, 32),
        Op::Rbit => rbit(c, ins, 64),
        Op::Rbitw => rbit(c, ins, 32),
        Op::Rev => rev(c, ins),
        Op::Revw => revw(c, ins),
        Op::Rev16 => rev16(c, ins),
        Op::Rev32 => rev32(c, ins),

        Op::Ubfx => bitfield_extract(c, ins, false),
        Op::Sbfx => bitfield_extract(c, ins, true),
        Op::Ubfiz => bitfield_insert_zero(c, ins, false),
        Op::Sbfiz => bitfield_insert_zero(c, ins, true),
        Op::Bfi => bfi(c, ins),
        Op::Bfxil => bfxil(c, ins),
        Op::Ubfm => bfm(c, ins, false),
        Op::Sbfm => bfm(c, ins, true),
        Op::Bfm => bfm_insert(c, ins),

        Op::Csel | Op::Csinc => csel(c, op, ins),
        Op::Cset | Op::Csetm => cset(c, op, ins),

        Op::Crc32b | Op::Crc32cb => crc32(c, op, ins, 8),
        Op::Crc32h | Op::Crc32ch => crc32(c, op, ins, 16),
        Op::Crc32w | Op::Crc32cw => crc32(c, op, ins, 32),
        Op::Crc32x | Op::Crc32cx => crc32(c, op, ins, 64),

        _ => Ok(None),
    }
}

/// Sign-of-result overflow for `r = a + b`.
fn add_ovf(c: &mut FnCtx<'_>, a: &str, b: &str, r: &str) -> String {
    let axr = c.fresh();
    emit!(c.w, "{axr} = xor i64 {a}, {r}");
    let axb = c.fresh();
    emit!(c.w, "{axb} = xor i64 {a}, {b}");
    let nab = c.fresh();
    emit!(c.w, "{nab} = xor i64 {axb}, -1");
    let m = c.fresh();
    emit!(c.w, "{m} = and i64 {axr}, {nab}");
    let v = c.fresh();
    emit!(c.w, "{v} = icmp slt i64 {m}, 0");
    v
}

/// Sign-of-result overflow for `r = a - b`.
fn sub_ovf(c: &mut FnCtx<'_>, a: &str, b: &str, r: &str) -> String {
    let axb = c.fresh();
    emit!(c.w, "{axb} = xor i64 {a}, {b}");
    let axr = c.fresh();
    emit!(c.w, "{axr} = xor i64 {a}, {r}");
    let m = c.fresh();
    emit!(c.w, "{m} = and i64 {axb}, {axr}");
    let v = c.fresh();
    emit!(c.w, "{v} = icmp slt i64 {m}, 0");
    v
}

/// Destination and (lhs, rhs) operands under the dst-last convention.
fn operands_2_3(
    c: &mut FnCtx<'_>,
    ins: &Instr,
) -> TranslateResult<(Reg, String, String)> {
    match ins.args.len() {
        2 => {
            let dst = ins.args[1]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            let lhs = c.load_reg(&dst)?;
            let rhs = c.eval_i64(&ins.args[0], ins)?;
            Ok((dst, lhs, rhs))
        }
        3 => {
            let dst = ins.args[2]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            let lhs = c.eval_i64(&ins.args[1], ins)?;
            let rhs = c.eval_i64(&ins.args[0], ins)?;
            Ok((dst, lhs, rhs))
        }
        _ => Err(c.unsupported_operand(ins)),
    }
}

fn narrow32(c: &mut FnCtx<'_>, v: &str) -> String {
    let t = c.fresh();
    emit!(c.w, "{t} = trunc i64 {v} to i32");
    t
}

fn binop(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    ir_op: &str,
    bits: u32,
    set_flags: bool,
) -> TranslateResult<Option<Flow>> {
    let (dst, lhs, rhs) = operands_2_3(c, ins)?;
    if bits == 32 {
        let l = narrow32(c, &lhs);
        let r = narrow32(c, &rhs);
        let x = c.fresh();
        emit!(c.w, "{x} = {ir_op} i32 {l}, {r}");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {x} to i64");
        c.store_reg(&dst, &z)?;
        return Ok(Some(Flow::Next));
    }
    let r = c.fresh();
    emit!(c.w, "{r} = {ir_op} i64 {lhs}, {rhs}");
    c.store_reg(&dst, &r)?;
    if set_flags {
        match ir_op {
            "add" => {
                let carry = c.fresh();
                emit!(c.w, "{carry} = icmp ult i64 {r}, {lhs}");
                let over = add_ovf(c, &lhs, &rhs, &r);
                c.set_int_flags(&r.clone(), "0", &carry, &over);
            }
            "sub" => {
                let carry = c.fresh();
                emit!(c.w, "{carry} = icmp uge i64 {lhs}, {rhs}");
                let over = sub_ovf(c, &lhs, &rhs, &r);
                c.set_int_flags(&lhs, &rhs, &carry, &over);
            }
            _ => {
                c.set_int_flags(&r.clone(), "0", "false", "false");
            }
        }
    }
    Ok(Some(Flow::Next))
}

/// BIC/ORN/EON: logic with an inverted second source.
fn negated_logic(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let (dst, lhs, rhs) = operands_2_3(c, ins)?;
    let n = c.fresh();
    emit!(c.w, "{n} = xor i64 {rhs}, -1");
    let r = c.fresh();
    match op {
        Op::Bic => emit!(c.w, "{r} = and i64 {lhs}, {n}"),
        Op::Orn => emit!(c.w, "{r} = or i64 {lhs}, {n}"),
        _ => emit!(c.w, "{r} = xor i64 {lhs}, {n}"),
    }
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

/// CMP src, dst: flags from dst - src.
fn cmp(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let rhs64 = c.eval_i64(&ins.args[0], ins)?;
    let lhs64 = c.eval_i64(&ins.args[1], ins)?;
    let (lhs, rhs) = if bits == 32 {
        // Sign-extended 32-bit values preserve both signed and unsigned
        // order under 64-bit predicates.
        let lt = narrow32(c, &lhs64);
        let rt = narrow32(c, &rhs64);
        let ls = c.fresh();
        emit!(c.w, "{ls} = sext i32 {lt} to i64");
        let rs = c.fresh();
        emit!(c.w, "{rs} = sext i32 {rt} to i64");
        (ls, rs)
    } else {
        (lhs64, rhs64)
    };
    let r = c.fresh();
    emit!(c.w, "{r} = sub i64 {lhs}, {rhs}");
    let carry = c.fresh();
    emit!(c.w, "{carry} = icmp uge i64 {lhs}, {rhs}");
    let over = sub_ovf(c, &lhs, &rhs, &r);
    c.set_int_flags(&lhs, &rhs, &carry, &over);
    Ok(Some(Flow::Next))
}

/// CMN src, dst: flags from dst + src; predicates see dst vs -src.
fn cmn(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let rhs64 = c.eval_i64(&ins.args[0], ins)?;
    let lhs64 = c.eval_i64(&ins.args[1], ins)?;
    let (lhs, rhs) = if bits == 32 {
        let lt = narrow32(c, &lhs64);
        let rt = narrow32(c, &rhs64);
        let ls = c.fresh();
        emit!(c.w, "{ls} = sext i32 {lt} to i64");
        let rs = c.fresh();
        emit!(c.w, "{rs} = sext i32 {rt} to i64");
        (ls, rs)
    } else {
        (lhs64, rhs64)
    };
    let sum = c.fresh();
    emit!(c.w, "{sum} = add i64 {lhs}, {rhs}");
    let carry = c.fresh();
    emit!(c.w, "{carry} = icmp ult i64 {sum}, {lhs}");
    let over = add_ovf(c, &lhs, &rhs, &sum);
    let neg = c.fresh();
    emit!(c.w, "{neg} = sub i64 0, {rhs}");
    c.set_int_flags(&lhs, &neg, &carry, &over);
    Ok(Some(Flow::Next))
}

fn tst(c: &mut FnCtx<'_>, ins: &Instr, narrow: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let a = c.eval_i64(&ins.args[0], ins)?;
    let b = c.eval_i64(&ins.args[1], ins)?;
    let r = c.fresh();
    emit!(c.w, "{r} = and i64 {a}, {b}");
    let masked = if narrow {
        let t = c.fresh();
        emit!(c.w, "{t} = and i64 {r}, 4294967295");
        t
    } else {
        r
    };
    c.set_int_flags(&masked, "0", "false", "false");
    Ok(Some(Flow::Next))
}

fn neg(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let (src, dst) = match ins.args.len() {
        1 => {
            let r = ins.args[0]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            (Operand::Reg(r.clone()), r)
        }
        2 => {
            let dst = ins.args[1]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            (ins.args[0].clone(), dst)
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    let v = c.eval_i64(&src, ins)?;
    if matches!(op, Op::Negw) {
        let t = narrow32(c, &v);
        let n = c.fresh();
        emit!(c.w, "{n} = sub i32 0, {t}");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {n} to i64");
        c.store_reg(&dst, &z)?;
        return Ok(Some(Flow::Next));
    }
    let r = c.fresh();
    emit!(c.w, "{r} = sub i64 0, {v}");
    c.store_reg(&dst, &r)?;
    if matches!(op, Op::Negs) {
        let carry = c.fresh();
        emit!(c.w, "{carry} = icmp uge i64 0, {v}");
        let over = sub_ovf(c, "0", &v, &r);
        c.set_int_flags("0", &v, &carry, &over);
    }
    Ok(Some(Flow::Next))
}

fn mul(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let (dst, lhs, rhs) = operands_2_3(c, ins)?;
    if bits == 32 {
        let l = narrow32(c, &lhs);
        let r = narrow32(c, &rhs);
        let x = c.fresh();
        emit!(c.w, "{x} = mul i32 {l}, {r}");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {x} to i64");
        c.store_reg(&dst, &z)?;
        return Ok(Some(Flow::Next));
    }
    let r = c.fresh();
    emit!(c.w, "{r} = mul i64 {lhs}, {rhs}");
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

/// UMULH/SMULH: high 64 bits of the 128-bit product.
fn mulh(c: &mut FnCtx<'_>, ins: &Instr, signed: bool) -> TranslateResult<Option<Flow>> {
    let (dst, lhs, rhs) = operands_2_3(c, ins)?;
    let ext = if signed { "sext" } else { "zext" };
    let shr = if signed { "ashr" } else { "lshr" };
    let a = c.fresh();
    emit!(c.w, "{a} = {ext} i64 {lhs} to i128");
    let b = c.fresh();
    emit!(c.w, "{b} = {ext} i64 {rhs} to i128");
    let p = c.fresh();
    emit!(c.w, "{p} = mul i128 {a}, {b}");
    let hi = c.fresh();
    emit!(c.w, "{hi} = {shr} i128 {p}, 64");
    let t = c.fresh();
    emit!(c.w, "{t} = trunc i128 {hi} to i64");
    c.store_reg(&dst, &t)?;
    Ok(Some(Flow::Next))
}

/// MADD/MSUB Rn, Ra, Rm, Rd: Rd = Ra ± Rm*Rn.
fn madd(c: &mut FnCtx<'_>, ins: &Instr, add: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 4 {
        return Err(c.unsupported_operand(ins));
    }
    let dst = ins.args[3]
        .as_reg()
        .cloned()
        .ok_or_else(|| c.unsupported_operand(ins))?;
    let rn = c.eval_i64(&ins.args[0], ins)?;
    let ra = c.eval_i64(&ins.args[1], ins)?;
    let rm = c.eval_i64(&ins.args[2], ins)?;
    let p = c.fresh();
    emit!(c.w, "{p} = mul i64 {rm}, {rn}");
    let r = c.fresh();
    if add {
        emit!(c.w, "{r} = add i64 {ra}, {p}");
    } else {
        emit!(c.w, "{r} = sub i64 {ra}, {p}");
    }
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

/// UDIV/SDIV with AArch64's defined corner cases: division by zero yields
/// zero and INT_MIN/-1 wraps to INT_MIN.
fn div(c: &mut FnCtx<'_>, ins: &Instr, bits: u32, signed: bool) -> TranslateResult<Option<Flow>> {
    let (dst, lhs64, rhs64) = operands_2_3(c, ins)?;
    let (ty, lhs, rhs) = if bits == 32 {
        let l = narrow32(c, &lhs64);
        let r = narrow32(c, &rhs64);
        ("i32", l, r)
    } else {
        ("i64", lhs64, rhs64)
    };
    let zero = c.fresh();
    emit!(c.w, "{zero} = icmp eq {ty} {rhs}, 0");
    let safe = if signed {
        let min = if bits == 32 {
            i32::MIN as i64
        } else {
            i64::MIN
        };
        let is_min = c.fresh();
        emit!(c.w, "{is_min} = icmp eq {ty} {lhs}, {min}");
        let is_m1 = c.fresh();
        emit!(c.w, "{is_m1} = icmp eq {ty} {rhs}, -1");
        let ovf = c.fresh();
        emit!(c.w, "{ovf} = and i1 {is_min}, {is_m1}");
        let bad = c.fresh();
        emit!(c.w, "{bad} = or i1 {zero}, {ovf}");
        let safe = c.fresh();
        emit!(c.w, "{safe} = select i1 {bad}, {ty} 1, {ty} {rhs}");
        let q0 = c.fresh();
        emit!(c.w, "{q0} = sdiv {ty} {lhs}, {safe}");
        let q1 = c.fresh();
        emit!(c.w, "{q1} = select i1 {ovf}, {ty} {min}, {ty} {q0}");
        let q = c.fresh();
        emit!(c.w, "{q} = select i1 {zero}, {ty} 0, {ty} {q1}");
        q
    } else {
        let safe = c.fresh();
        emit!(c.w, "{safe} = select i1 {zero}, {ty} 1, {ty} {rhs}");
        let q0 = c.fresh();
        emit!(c.w, "{q0} = udiv {ty} {lhs}, {safe}");
        let q = c.fresh();
        emit!(c.w, "{q} = select i1 {zero}, {ty} 0, {ty} {q0}");
        q
    };
    if bits == 32 {
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {safe} to i64");
        c.store_reg(&dst, &z)?;
    } else {
        c.store_reg(&dst, &safe)?;
    }
    Ok(Some(Flow::Next))
}

fn shift(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    ir_op: &str,
    bits: u32,
) -> TranslateResult<Option<Flow>> {
    let (dst, lhs, rhs) = operands_2_3(c, ins)?;
    // Operand roles flip for shifts: the count is the first operand.
    let (value, count) = (lhs, rhs);
    let mask = (bits - 1) as i64;
    if bits == 32 {
        let v = narrow32(c, &value);
        let cnt64 = c.fresh();
        emit!(c.w, "{cnt64} = and i64 {count}, {mask}");
        let cnt = narrow32(c, &cnt64);
        let x = c.fresh();
        emit!(c.w, "{x} = {ir_op} i32 {v}, {cnt}");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {x} to i64");
        c.store_reg(&dst, &z)?;
        return Ok(Some(Flow::Next));
    }
    let cnt = c.fresh();
    emit!(c.w, "{cnt} = and i64 {count}, {mask}");
    let r = c.fresh();
    emit!(c.w, "{r} = {ir_op} i64 {value}, {cnt}");
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

fn ror(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let (dst, lhs, rhs) = operands_2_3(c, ins)?;
    let (value64, count64) = (lhs, rhs);
    let mask = (bits - 1) as i64;
    let ty = if bits == 32 { "i32" } else { "i64" };
    let (value, count) = if bits == 32 {
        let v = narrow32(c, &value64);
        let cm = c.fresh();
        emit!(c.w, "{cm} = and i64 {count64}, {mask}");
        let ct = narrow32(c, &cm);
        (v, ct)
    } else {
        let cm = c.fresh();
        emit!(c.w, "{cm} = and i64 {count64}, {mask}");
        (value64, cm)
    };
    let neg = c.fresh();
    emit!(c.w, "{neg} = sub {ty} {bits}, {count}");
    let nm = c.fresh();
    emit!(c.w, "{nm} = and {ty} {neg}, {mask}");
    let lo = c.fresh();
    emit!(c.w, "{lo} = lshr {ty} {value}, {count}");
    let hi = c.fresh();
    emit!(c.w, "{hi} = shl {ty} {value}, {nm}");
    let rot = c.fresh();
    emit!(c.w, "{rot} = or {ty} {lo}, {hi}");
    if bits == 32 {
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {rot} to i64");
        c.store_reg(&dst, &z)?;
    } else {
        c.store_reg(&dst, &rot)?;
    }
    Ok(Some(Flow::Next))
}

/// EXTR $lsb, Rn, Rm, Rd: Rd = (Rm:Rn) >> lsb.
fn extr(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 4 {
        return Err(c.unsupported_operand(ins));
    }
    let lsb = match &ins.args[0] {
        Operand::Imm(v) => v & 63,
        _ => return Err(c.unsupported_operand(ins)),
    };
    let dst = ins.args[3]
        .as_reg()
        .cloned()
        .ok_or_else(|| c.unsupported_operand(ins))?;
    let rn = c.eval_i64(&ins.args[1], ins)?;
    let rm = c.eval_i64(&ins.args[2], ins)?;
    if lsb == 0 {
        c.store_reg(&dst, &rn)?;
        return Ok(Some(Flow::Next));
    }
    let lo = c.fresh();
    emit!(c.w, "{lo} = lshr i64 {rn}, {lsb}");
    let hi = c.fresh();
    emit!(c.w, "{hi} = shl i64 {rm}, {}", 64 - lsb);
    let r = c.fresh();
    emit!(c.w, "{r} = or i64 {lo}, {hi}");
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

fn unary_src_dst(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<(String, Reg)> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let dst = ins.args[1]
        .as_reg()
        .cloned()
        .ok_or_else(|| c.unsupported_operand(ins))?;
    let v = c.eval_i64(&ins.args[0], ins)?;
    Ok((v, dst))
}

fn clz(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let (v, dst) = unary_src_dst(c, ins)?;
    if bits == 32 {
        let t = narrow32(c, &v);
        let r = c.fresh();
        emit!(c.w, "{r} = call i32 @llvm.ctlz.i32(i32 {t}, i1 false)");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {r} to i64");
        c.store_reg(&dst, &z)?;
    } else {
        let r = c.fresh();
        emit!(c.w, "{r} = call i64 @llvm.ctlz.i64(i64 {v}, i1 false)");
        c.store_reg(&dst, &r)?;
    }
    Ok(Some(Flow::Next))
}

fn rbit(c: &mut FnCtx<'_>, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    let (v, dst) = unary_src_dst(c, ins)?;
    if bits == 32 {
        let t = narrow32(c, &v);
        let r = c.fresh();
        emit!(c.w, "{r} = call i32 @llvm.bitreverse.i32(i32 {t})");
        let z = c.fresh();
        emit!(c.w, "{z} = zext i32 {r} to i64");
        c.store_reg(&dst, &z)?;
    } else {
        let r = c.fresh();
        emit!(c.w, "{r} = call i64 @llvm.bitreverse.i64(i64 {v})");
        c.store_reg(&dst, &r)?;
    }
    Ok(Some(Flow::Next))
}

fn rev(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let (v, dst) = unary_src_dst(c, ins)?;
    let r = c.fresh();
    emit!(c.w, "{r} = call i64 @llvm.bswap.i64(i64 {v})");
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

fn revw(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let (v, dst) = unary_src_dst(c, ins)?;
    let t = narrow32(c, &v);
    let r = c.fresh();
    emit!(c.w, "{r} = call i32 @llvm.bswap.i32(i32 {t})");
    let z = c.fresh();
    emit!(c.w, "{z} = zext i32 {r} to i64");
    c.store_reg(&dst, &z)?;
    Ok(Some(Flow::Next))
}

/// REV16: byte-swap within each halfword.
fn rev16(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let (v, dst) = unary_src_dst(c, ins)?;
    let lo = c.fresh();
    emit!(c.w, "{lo} = and i64 {v}, 71777214294589695"); // 0x00ff00ff00ff00ff
    let hi = c.fresh();
    emit!(c.w, "{hi} = lshr i64 {v}, 8");
    let hi_m = c.fresh();
    emit!(c.w, "{hi_m} = and i64 {hi}, 71777214294589695");
    let lo_sh = c.fresh();
    emit!(c.w, "{lo_sh} = shl i64 {lo}, 8");
    let r = c.fresh();
    emit!(c.w, "{r} = or i64 {lo_sh}, {hi_m}");
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

/// REV32: byte-swap within each 32-bit word.
fn rev32(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let (v, dst) = unary_src_dst(c, ins)?;
    let lo32 = narrow32(c, &v);
    let hi_sh = c.fresh();
    emit!(c.w, "{hi_sh} = lshr i64 {v}, 32");
    let hi32 = narrow32(c, &hi_sh);
    let lo_sw = c.fresh();
    emit!(c.w, "{lo_sw} = call i32 @llvm.bswap.i32(i32 {lo32})");
    let hi_sw = c.fresh();
    emit!(c.w, "{hi_sw} = call i32 @llvm.bswap.i32(i32 {hi32})");
    let lo_z = c.fresh();
    emit!(c.w, "{lo_z} = zext i32 {lo_sw} to i64");
    let hi_z = c.fresh();
    emit!(c.w, "{hi_z} = zext i32 {hi_sw} to i64");
    let hi_pos = c.fresh();
    emit!(c.w, "{hi_pos} = shl i64 {hi_z}, 32");
    let r = c.fresh();
    emit!(c.w, "{r} = or i64 {hi_pos}, {lo_z}");
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

fn bitfield_args(
    c: &mut FnCtx<'_>,
    ins: &Instr,
) -> TranslateResult<(i64, String, i64, Reg)> {
    if ins.args.len() != 4 {
        return Err(c.unsupported_operand(ins));
    }
    let lsb = match &ins.args[0] {
        Operand::Imm(v) => *v & 63,
        _ => return Err(c.unsupported_operand(ins)),
    };
    let width = match &ins.args[2] {
        Operand::Imm(v) => (*v).clamp(1, 64),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let dst = ins.args[3]
        .as_reg()
        .cloned()
        .ok_or_else(|| c.unsupported_operand(ins))?;
    let src = c.eval_i64(&ins.args[1], ins)?;
    Ok((lsb, src, width, dst))
}

fn width_mask(width: i64) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// UBFX/SBFX $lsb, Rn, $width, Rd: extract a field to bit 0.
fn bitfield_extract(c: &mut FnCtx<'_>, ins: &Instr, signed: bool) -> TranslateResult<Option<Flow>> {
    let (lsb, src, width, dst) = bitfield_args(c, ins)?;
    let r = if signed {
        let up = 64 - lsb - width;
        let sh = c.fresh();
        emit!(c.w, "{sh} = shl i64 {src}, {up}");
        let t = c.fresh();
        emit!(c.w, "{t} = ashr i64 {sh}, {}", 64 - width);
        t
    } else {
        let sh = c.fresh();
        emit!(c.w, "{sh} = lshr i64 {src}, {lsb}");
        let t = c.fresh();
        emit!(c.w, "{t} = and i64 {sh}, {}", width_mask(width) as i64);
        t
    };
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

/// UBFIZ/SBFIZ $lsb, Rn, $width, Rd: place a field at lsb.
fn bitfield_insert_zero(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    signed: bool,
) -> TranslateResult<Option<Flow>> {
    let (lsb, src, width, dst) = bitfield_args(c, ins)?;
    let field = if signed {
        let up = 64 - width;
        let sh = c.fresh();
        emit!(c.w, "{sh} = shl i64 {src}, {up}");
        let t = c.fresh();
        emit!(c.w, "{t} = ashr i64 {sh}, {up}");
        t
    } else {
        let t = c.fresh();
        emit!(c.w, "{t} = and i64 {src}, {}", width_mask(width) as i64);
        t
    };
    let r = c.fresh();
    emit!(c.w, "{r} = shl i64 {field}, {lsb}");
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

/// BFI $lsb, Rn, $width, Rd: insert a field into Rd at lsb.
fn bfi(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let (lsb, src, width, dst) = bitfield_args(c, ins)?;
    let mask = width_mask(width);
    let cur = c.load_reg(&dst)?;
    let keep = c.fresh();
    emit!(c.w, "{keep} = and i64 {cur}, {}", !(mask << lsb) as i64);
    let field = c.fresh();
    emit!(c.w, "{field} = and i64 {src}, {}", mask as i64);
    let placed = c.fresh();
    emit!(c.w, "{placed} = shl i64 {field}, {lsb}");
    let r = c.fresh();
    emit!(c.w, "{r} = or i64 {keep}, {placed}");
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

/// BFXIL $lsb, Rn, $width, Rd: extract from Rn, insert at bit 0 of Rd.
fn bfxil(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    let (lsb, src, width, dst) = bitfield_args(c, ins)?;
    let mask = width_mask(width);
    let cur = c.load_reg(&dst)?;
    let keep = c.fresh();
    emit!(c.w, "{keep} = and i64 {cur}, {}", !mask as i64);
    let sh = c.fresh();
    emit!(c.w, "{sh} = lshr i64 {src}, {lsb}");
    let field = c.fresh();
    emit!(c.w, "{field} = and i64 {sh}, {}", mask as i64);
    let r = c.fresh();
    emit!(c.w, "{r} = or i64 {keep}, {field}");
    c.store_reg(&dst, &r)?;
    Ok(Some(Flow::Next))
}

/// Raw BFM $immr, Rn, $imms, Rd decoded onto the inserting aliases (BFXIL
/// for extract-low, BFI for insert-at).
fn bfm_insert(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 4 {
        return Err(c.unsupported_operand(ins));
    }
    let (immr, imms) = match (&ins.args[0], &ins.args[2]) {
        (Operand::Imm(r), Operand::Imm(s)) => (*r & 63, *s & 63),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let mut alias = ins.clone();
    if imms >= immr {
        alias.args[0] = Operand::Imm(immr);
        alias.args[2] = Operand::Imm(imms - immr + 1);
        bfxil(c, &alias)
    } else {
        alias.args[0] = Operand::Imm(64 - immr);
        alias.args[2] = Operand::Imm(imms + 1);
        bfi(c, &alias)
    }
}

/// Raw UBFM/SBFM $immr, Rn, $imms, Rd decoded onto the alias helpers.
fn bfm(c: &mut FnCtx<'_>, ins: &Instr, signed: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 4 {
        return Err(c.unsupported_operand(ins));
    }
    let (immr, imms) = match (&ins.args[0], &ins.args[2]) {
        (Operand::Imm(r), Operand::Imm(s)) => (*r & 63, *s & 63),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let mut alias = ins.clone();
    if imms >= immr {
        // Field extract: lsb = immr, width = imms - immr + 1.
        alias.args[0] = Operand::Imm(immr);
        alias.args[2] = Operand::Imm(imms - immr + 1);
        bitfield_extract(c, &alias, signed)
    } else {
        // Insert at lsb = 64 - immr, width = imms + 1.
        alias.args[0] = Operand::Imm(64 - immr);
        alias.args[2] = Operand::Imm(imms + 1);
        bitfield_insert_zero(c, &alias, signed)
    }
}

fn cond_operand(c: &FnCtx<'_>, op: &Operand, ins: &Instr) -> TranslateResult<Cond> {
    let name = match op {
        Operand::Label(s) => s,
        Operand::Ident(s) => s,
        _ => return Err(c.unsupported_operand(ins)),
    };
    Cond::parse(name).ok_or_else(|| c.unsupported_operand(ins))
}

/// CSEL cond, Rn, Rm, Rd and CSINC cond, Rn, Rm, Rd.
fn csel(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 4 {
        return Err(c.unsupported_operand(ins));
    }
    let cond = cond_operand(c, &ins.args[0], ins)?;
    let dst = ins.args[3]
        .as_reg()
        .cloned()
        .ok_or_else(|| c.unsupported_operand(ins))?;
    let rn = c.eval_i64(&ins.args[1], ins)?;
    let rm = c.eval_i64(&ins.args[2], ins)?;
    let alt = if matches!(op, Op::Csinc) {
        let t = c.fresh();
        emit!(c.w, "{t} = add i64 {rm}, 1");
        t
    } else {
        rm
    };
    let cv = c.cond_value(cond);
    let sel = c.fresh();
    emit!(c.w, "{sel} = select i1 {cv}, i64 {rn}, i64 {alt}");
    c.store_reg(&dst, &sel)?;
    Ok(Some(Flow::Next))
}

/// CSET cond, Rd (0/1) and CSETM cond, Rd (0/-1).
fn cset(c: &mut FnCtx<'_>, op: &Op, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let cond = cond_operand(c, &ins.args[0], ins)?;
    let dst = ins.args[1]
        .as_reg()
        .cloned()
        .ok_or_else(|| c.unsupported_operand(ins))?;
    let cv = c.cond_value(cond);
    let on = if matches!(op, Op::Csetm) { "-1" } else { "1" };
    let sel = c.fresh();
    emit!(c.w, "{sel} = select i1 {cv}, i64 {on}, i64 0");
    c.store_reg(&dst, &sel)?;
    Ok(Some(Flow::Next))
}

/// CRC32*/CRC32C* Rm, Rd: Rd = crc(Rd, Rm) through the AArch64 intrinsics.
fn crc32(c: &mut FnCtx<'_>, op: &Op, ins: &Instr, bits: u32) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let dst = ins.args[1]
        .as_reg()
        .cloned()
        .ok_or_else(|| c.unsupported_operand(ins))?;
    let data64 = c.eval_i64(&ins.args[0], ins)?;
    let acc64 = c.load_reg(&dst)?;
    let acc = narrow32(c, &acc64);
    let castagnoli = matches!(
        op,
        Op::Crc32cb | Op::Crc32ch | Op::Crc32cw | Op::Crc32cx
    );
    let name = match (castagnoli, bits) {
        (false, 8) => "llvm.aarch64.crc32b",
        (false, 16) => "llvm.aarch64.crc32h",
        (false, 32) => "llvm.aarch64.crc32w",
        (false, _) => "llvm.aarch64.crc32x",
        (true, 8) => "llvm.aarch64.crc32cb",
        (true, 16) => "llvm.aarch64.crc32ch",
        (true, 32) => "llvm.aarch64.crc32cw",
        (true, _) => "llvm.aarch64.crc32cx",
    };
    let r = c.fresh();
    if bits == 64 {
        emit!(c.w, "{r} = call i32 @{name}(i32 {acc}, i64 {data64})");
    } else {
        // B/H forms take the data operand as i32 with the low bits used.
        let data = narrow32(c, &data64);
        emit!(c.w, "{r} = call i32 @{name}(i32 {acc}, i32 {data})");
    }
    let z = c.fresh();
    emit!(c.w, "{z} = zext i32 {r} to i64");
    c.store_reg(&dst, &z)?;
    Ok(Some(Flow::Next))
}
