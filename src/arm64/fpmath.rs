// Scalar floating-point family. F registers hold raw 64-bit patterns, so the
// S and D views of one register alias the way the hardware's do: D ops
// bitcast the whole pattern to double, S ops truncate to the low 32 bits and
// bitcast to float, and stores go back through the same path. FMOV moves
// patterns between the integer and float files without conversion; FCMP
// records float predicate bits for the following Bcc.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, LlvmType, Operand, Reg, TranslateResult};

use super::ops::Op;
use super::FnCtx;

impl<'a> FnCtx<'a> {
    /// An F register viewed as double.
    fn load_fd(&mut self, r: &Reg, ins: &Instr) -> TranslateResult<String> {
        let bits = self.load_f_bits(r, ins)?;
        let t = self.fresh();
        emit!(self.w, "{t} = bitcast i64 {bits} to double");
        Ok(t)
    }

    fn store_fd(&mut self, r: &Reg, v: &str, ins: &Instr) -> TranslateResult<()> {
        let t = self.fresh();
        emit!(self.w, "{t} = bitcast double {v} to i64");
        self.store_f_bits(r, &t, ins)
    }

    /// An F register's low 32 bits viewed as float.
    fn load_fs(&mut self, r: &Reg, ins: &Instr) -> TranslateResult<String> {
        let bits = self.load_f_bits(r, ins)?;
        let lo = self.fresh();
        emit!(self.w, "{lo} = trunc i64 {bits} to i32");
        let t = self.fresh();
        emit!(self.w, "{t} = bitcast i32 {lo} to float");
        Ok(t)
    }

    fn store_fs(&mut self, r: &Reg, v: &str, ins: &Instr) -> TranslateResult<()> {
        let lo = self.fresh();
        emit!(self.w, "{lo} = bitcast float {v} to i32");
        let wide = self.fresh();
        emit!(self.w, "{wide} = zext i32 {lo} to i64");
        self.store_f_bits(r, &wide, ins)
    }
}

fn is_f(op: &Operand) -> bool {
    op.as_reg()
        .map(|r| super::f_reg_base(r).is_some())
        .unwrap_or(false)
}

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Fmovd => fmov(c, ins, true),
        Op::Fmovs => fmov(c, ins, false),
        Op::Faddd => fbin(c, ins, "fadd", true),
        Op::Fadds => fbin(c, ins, "fadd", false),
        Op::Fsubd => fbin(c, ins, "fsub", true),
        Op::Fsubs => fbin(c, ins, "fsub", false),
        Op::Fmuld => fbin(c, ins, "fmul", true),
        Op::Fmuls => fbin(c, ins, "fmul", false),
        Op::Fdivd => fbin(c, ins, "fdiv", true),
        Op::Fdivs => fbin(c, ins, "fdiv", false),
        Op::Fsqrtd | Op::Fsqrts => fsqrt(c, ins, matches!(op, Op::Fsqrtd)),
        Op::Fcmpd | Op::Fcmps => fcmp(c, ins, matches!(op, Op::Fcmpd)),
        Op::Fcvtsd => {
            // Single to double.
            let (src, dst) = two_f_regs(c, ins)?;
            let v = c.load_fs(&src, ins)?;
            let d = c.fresh();
            emit!(c.w, "{d} = fpext float {v} to double");
            c.store_fd(&dst, &d, ins)?;
            Ok(Some(Flow::Next))
        }
        Op::Fcvtds => {
            // Double to single.
            let (src, dst) = two_f_regs(c, ins)?;
            let v = c.load_fd(&src, ins)?;
            let s = c.fresh();
            emit!(c.w, "{s} = fptrunc double {v} to float");
            c.store_fs(&dst, &s, ins)?;
            Ok(Some(Flow::Next))
        }
        Op::Fcvtzsd => {
            // Double to signed integer register.
            if ins.args.len() != 2 || !is_f(&ins.args[0]) {
                return Err(c.unsupported_operand(ins));
            }
            let src = ins.args[0].as_reg().cloned().ok_or_else(|| c.unsupported_operand(ins))?;
            let dst = ins.args[1]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            let v = c.load_fd(&src, ins)?;
            let t = c.fresh();
            emit!(c.w, "{t} = fptosi double {v} to i64");
            c.store_reg(&dst, &t)?;
            Ok(Some(Flow::Next))
        }
        Op::Scvtfd => {
            // Signed integer register to double.
            if ins.args.len() != 2 || !is_f(&ins.args[1]) {
                return Err(c.unsupported_operand(ins));
            }
            let dst = ins.args[1].as_reg().cloned().ok_or_else(|| c.unsupported_operand(ins))?;
            let v = c.eval_i64(&ins.args[0], ins)?;
            let d = c.fresh();
            emit!(c.w, "{d} = sitofp i64 {v} to double");
            c.store_fd(&dst, &d, ins)?;
            Ok(Some(Flow::Next))
        }
        _ => Ok(None),
    }
}

fn two_f_regs(c: &FnCtx<'_>, ins: &Instr) -> TranslateResult<(Reg, Reg)> {
    match (&ins.args[..], ins.args.len()) {
        ([Operand::Reg(a), Operand::Reg(b)], 2) => Ok((a.clone(), b.clone())),
        _ => Err(c.unsupported_operand(ins)),
    }
}

/// FMOV: bit-pattern moves among F registers, integer registers, memory,
/// and float immediates.
fn fmov(c: &mut FnCtx<'_>, ins: &Instr, double: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = if double { "double" } else { "float" };
    match (&ins.args[0], &ins.args[1]) {
        // F -> F.
        (Operand::Reg(a), Operand::Reg(b)) if is_f(&ins.args[0]) && is_f(&ins.args[1]) => {
            let (a, b) = (a.clone(), b.clone());
            let v = c.load_f_bits(&a, ins)?;
            c.store_f_bits(&b, &v, ins)?;
        }
        // GPR -> F (raw bits).
        (Operand::Reg(a), Operand::Reg(b)) if is_f(&ins.args[1]) => {
            let (a, b) = (a.clone(), b.clone());
            let v = c.load_reg(&a)?;
            if double {
                c.store_f_bits(&b, &v, ins)?;
            } else {
                let lo = c.fresh();
                emit!(c.w, "{lo} = and i64 {v}, 4294967295");
                c.store_f_bits(&b, &lo, ins)?;
            }
        }
        // F -> GPR (raw bits).
        (Operand::Reg(a), Operand::Reg(b)) if is_f(&ins.args[0]) => {
            let (a, b) = (a.clone(), b.clone());
            let v = c.load_f_bits(&a, ins)?;
            if double {
                c.store_reg(&b, &v)?;
            } else {
                let lo = c.fresh();
                emit!(c.w, "{lo} = and i64 {v}, 4294967295");
                c.store_reg(&b, &lo)?;
            }
        }
        // Immediate -> F (the parser delivers float immediates as ints only
        // for the $0 pattern the stdlib uses).
        (Operand::Imm(v), Operand::Reg(b)) if is_f(&ins.args[1]) => {
            let b = b.clone();
            if *v == 0 {
                c.store_f_bits(&b, "0", ins)?;
            } else {
                let bits = if double {
                    (*v as f64).to_bits() as i64
                } else {
                    (*v as f32).to_bits() as i64
                };
                c.store_f_bits(&b, &bits.to_string(), ins)?;
            }
        }
        // Memory -> F.
        (Operand::Mem(m), Operand::Reg(b)) if is_f(&ins.args[1]) => {
            let (m, b) = (m.clone(), b.clone());
            let (addr, _, _) = c.addr_i64(&m, super::eval::AddrMode::Offset, ins)?;
            let p = c.ptr_from_addr(&addr);
            let v = c.fresh();
            emit!(c.w, "{v} = load {ty}, ptr {p}, align 1");
            if double {
                c.store_fd(&b, &v, ins)?;
            } else {
                c.store_fs(&b, &v, ins)?;
            }
        }
        // F -> memory.
        (Operand::Reg(a), Operand::Mem(m)) if is_f(&ins.args[0]) => {
            let (a, m) = (a.clone(), m.clone());
            let v = if double {
                c.load_fd(&a, ins)?
            } else {
                c.load_fs(&a, ins)?
            };
            let (addr, _, _) = c.addr_i64(&m, super::eval::AddrMode::Offset, ins)?;
            let p = c.ptr_from_addr(&addr);
            emit!(c.w, "store {ty} {v}, ptr {p}, align 1");
        }
        // FP slot -> F and F -> FP slot.
        (Operand::Fp { offset, .. }, Operand::Reg(b)) if is_f(&ins.args[1]) => {
            let (off, b) = (*offset, b.clone());
            let v = c.eval_fp_i64(off, ins)?;
            c.store_f_bits(&b, &v, ins)?;
        }
        (Operand::Reg(a), Operand::Fp { offset, .. }) if is_f(&ins.args[0]) => {
            let (a, off) = (a.clone(), *offset);
            let v = c.load_f_bits(&a, ins)?;
            c.store_fp_result(off, &LlvmType::I64, &v, ins)?;
        }
        _ => return Err(c.unsupported_operand(ins)),
    }
    Ok(Some(Flow::Next))
}

fn fbin(
    c: &mut FnCtx<'_>,
    ins: &Instr,
    ir_op: &str,
    double: bool,
) -> TranslateResult<Option<Flow>> {
    // 2-operand accumulate or 3-operand form, destination last.
    let (src, lhs_reg, dst) = match ins.args.len() {
        2 => {
            let s = ins.args[0]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            let d = ins.args[1]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            (s, d.clone(), d)
        }
        3 => {
            let s = ins.args[0]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            let l = ins.args[1]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            let d = ins.args[2]
                .as_reg()
                .cloned()
                .ok_or_else(|| c.unsupported_operand(ins))?;
            (s, l, d)
        }
        _ => return Err(c.unsupported_operand(ins)),
    };
    if double {
        let a = c.load_fd(&lhs_reg, ins)?;
        let b = c.load_fd(&src, ins)?;
        let r = c.fresh();
        emit!(c.w, "{r} = {ir_op} double {a}, {b}");
        c.store_fd(&dst, &r, ins)?;
    } else {
        let a = c.load_fs(&lhs_reg, ins)?;
        let b = c.load_fs(&src, ins)?;
        let r = c.fresh();
        emit!(c.w, "{r} = {ir_op} float {a}, {b}");
        c.store_fs(&dst, &r, ins)?;
    }
    Ok(Some(Flow::Next))
}

fn fsqrt(c: &mut FnCtx<'_>, ins: &Instr, double: bool) -> TranslateResult<Option<Flow>> {
    let (src, dst) = two_f_regs(c, ins)?;
    if double {
        let v = c.load_fd(&src, ins)?;
        let r = c.fresh();
        emit!(c.w, "{r} = call double @llvm.sqrt.f64(double {v})");
        c.store_fd(&dst, &r, ins)?;
    } else {
        let v = c.load_fs(&src, ins)?;
        let r = c.fresh();
        emit!(c.w, "{r} = call float @llvm.sqrt.f32(float {v})");
        c.store_fs(&dst, &r, ins)?;
    }
    Ok(Some(Flow::Next))
}

/// FCMP Fm, Fn: flags from Fn compared against Fm.
fn fcmp(c: &mut FnCtx<'_>, ins: &Instr, double: bool) -> TranslateResult<Option<Flow>> {
    let (rhs_reg, lhs_reg) = two_f_regs(c, ins)?;
    let ty = if double { "double" } else { "float" };
    let (a, b) = if double {
        (c.load_fd(&lhs_reg, ins)?, c.load_fd(&rhs_reg, ins)?)
    } else {
        (c.load_fs(&lhs_reg, ins)?, c.load_fs(&rhs_reg, ins)?)
    };
    let eq = c.fresh();
    emit!(c.w, "{eq} = fcmp oeq {ty} {a}, {b}");
    let lt = c.fresh();
    emit!(c.w, "{lt} = fcmp olt {ty} {a}, {b}");
    let uno = c.fresh();
    emit!(c.w, "{uno} = fcmp uno {ty} {a}, {b}");
    c.set_float_flags(&eq, &lt, &uno);
    Ok(Some(Flow::Next))
}
