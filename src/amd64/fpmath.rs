// Scalar floating-point family over the X register file. Doubles live in
// lane 0 of the <2 x double> view of an X register and floats in lane 0 of
// the <4 x float> view; scalar ops merge their result back into the low lane
// the way the hardware forms do. UCOMIS* writes the x86 unordered-compare
// flag triple (ZF/CF/PF, with SF/OF cleared). Conversions use the fp<->int
// cast instructions.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, Operand, TranslateResult};

use super::ops::Op;
use super::{Flag, FnCtx};

fn is_x(op: &Operand) -> bool {
    op.as_reg()
        .map(|r| super::x_reg_index(r).is_some())
        .unwrap_or(false)
}

impl<'a> FnCtx<'a> {
    /// Lane 0 of an X register viewed as double.
    fn load_f64(&mut self, op: &Operand, ins: &Instr) -> TranslateResult<String> {
        match op {
            Operand::Reg(r) if super::x_reg_index(r).is_some() => {
                let v = self.load_x(&r.clone(), ins)?;
                let bc = self.fresh();
                emit!(self.w, "{bc} = bitcast <16 x i8> {v} to <2 x double>");
                let e = self.fresh();
                emit!(self.w, "{e} = extractelement <2 x double> {bc}, i32 0");
                Ok(e)
            }
            Operand::Mem(m) => {
                let m = m.clone();
                let addr = self.addr_of_mem(&m, ins)?;
                let p = self.ptr_from_addr(&addr);
                let t = self.fresh();
                emit!(self.w, "{t} = load double, ptr {p}, align 1");
                Ok(t)
            }
            Operand::Sym(s) => {
                let p = self.ptr_from_sym(&s.clone())?;
                let t = self.fresh();
                emit!(self.w, "{t} = load double, ptr {p}, align 1");
                Ok(t)
            }
            _ => Err(self.unsupported_operand(ins)),
        }
    }

    /// Merge a double into lane 0 of an X register.
    fn store_f64(&mut self, r: &crate::core::Reg, v: &str, ins: &Instr) -> TranslateResult<()> {
        let cur = self.load_x(r, ins)?;
        let bc = self.fresh();
        emit!(self.w, "{bc} = bitcast <16 x i8> {cur} to <2 x double>");
        let merged = self.fresh();
        emit!(self.w, "{merged} = insertelement <2 x double> {bc}, double {v}, i32 0");
        let back = self.fresh();
        emit!(self.w, "{back} = bitcast <2 x double> {merged} to <16 x i8>");
        self.store_x(r, &back, ins)
    }

    fn load_f32(&mut self, op: &Operand, ins: &Instr) -> TranslateResult<String> {
        match op {
            Operand::Reg(r) if super::x_reg_index(r).is_some() => {
                let v = self.load_x(&r.clone(), ins)?;
                let bc = self.fresh();
                emit!(self.w, "{bc} = bitcast <16 x i8> {v} to <4 x float>");
                let e = self.fresh();
                emit!(self.w, "{e} = extractelement <4 x float> {bc}, i32 0");
                Ok(e)
            }
            Operand::Mem(m) => {
                let m = m.clone();
                let addr = self.addr_of_mem(&m, ins)?;
                let p = self.ptr_from_addr(&addr);
                let t = self.fresh();
                emit!(self.w, "{t} = load float, ptr {p}, align 1");
                Ok(t)
            }
            Operand::Sym(s) => {
                let p = self.ptr_from_sym(&s.clone())?;
                let t = self.fresh();
                emit!(self.w, "{t} = load float, ptr {p}, align 1");
                Ok(t)
            }
            _ => Err(self.unsupported_operand(ins)),
        }
    }

    fn store_f32(&mut self, r: &crate::core::Reg, v: &str, ins: &Instr) -> TranslateResult<()> {
        let cur = self.load_x(r, ins)?;
        let bc = self.fresh();
        emit!(self.w, "{bc} = bitcast <16 x i8> {cur} to <4 x float>");
        let merged = self.fresh();
        emit!(self.w, "{merged} = insertelement <4 x float> {bc}, float {v}, i32 0");
        let back = self.fresh();
        emit!(self.w, "{back} = bitcast <4 x float> {merged} to <16 x i8>");
        self.store_x(r, &back, ins)
    }
}

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Movsd => movs(c, ins, true),
        Op::Movss => movs(c, ins, false),
        Op::Addsd => fbin(c, ins, "fadd"),
        Op::Subsd => fbin(c, ins, "fsub"),
        Op::Mulsd => fbin(c, ins, "fmul"),
        Op::Divsd => fbin(c, ins, "fdiv"),
        Op::Sqrtsd => {
            if ins.args.len() != 2 || !is_x(&ins.args[1]) {
                return Err(c.unsupported_operand(ins));
            }
            let v = c.load_f64(&ins.args[0], ins)?;
            let r = c.fresh();
            emit!(c.w, "{r} = call double @llvm.sqrt.f64(double {v})");
            let dst = ins.args[1].as_reg().cloned().ok_or_else(|| c.unsupported_operand(ins))?;
            c.store_f64(&dst, &r, ins)?;
            Ok(Some(Flow::Next))
        }
        Op::Ucomisd | Op::Ucomiss => ucomis(c, ins, matches!(op, Op::Ucomisd)),
        Op::Cvtsq2sd => {
            if ins.args.len() != 2 || !is_x(&ins.args[1]) {
                return Err(c.unsupported_operand(ins));
            }
            let v = c.eval_i64(&ins.args[0], ins)?;
            let d = c.fresh();
            emit!(c.w, "{d} = sitofp i64 {v} to double");
            let dst = ins.args[1].as_reg().cloned().ok_or_else(|| c.unsupported_operand(ins))?;
            c.store_f64(&dst, &d, ins)?;
            Ok(Some(Flow::Next))
        }
        Op::Cvttsd2sq => {
            if ins.args.len() != 2 {
                return Err(c.unsupported_operand(ins));
            }
            let dst = match ins.args[1].as_reg() {
                Some(r) => r.clone(),
                None => return Err(c.unsupported_operand(ins)),
            };
            let v = c.load_f64(&ins.args[0], ins)?;
            let t = c.fresh();
            emit!(c.w, "{t} = fptosi double {v} to i64");
            c.store_reg(&dst, &t)?;
            Ok(Some(Flow::Next))
        }
        Op::Cvtss2sd => {
            if ins.args.len() != 2 || !is_x(&ins.args[1]) {
                return Err(c.unsupported_operand(ins));
            }
            let v = c.load_f32(&ins.args[0], ins)?;
            let d = c.fresh();
            emit!(c.w, "{d} = fpext float {v} to double");
            let dst = ins.args[1].as_reg().cloned().ok_or_else(|| c.unsupported_operand(ins))?;
            c.store_f64(&dst, &d, ins)?;
            Ok(Some(Flow::Next))
        }
        Op::Cvtsd2ss => {
            if ins.args.len() != 2 || !is_x(&ins.args[1]) {
                return Err(c.unsupported_operand(ins));
            }
            let v = c.load_f64(&ins.args[0], ins)?;
            let f = c.fresh();
            emit!(c.w, "{f} = fptrunc double {v} to float");
            let dst = ins.args[1].as_reg().cloned().ok_or_else(|| c.unsupported_operand(ins))?;
            c.store_f32(&dst, &f, ins)?;
            Ok(Some(Flow::Next))
        }
        _ => Ok(None),
    }
}

fn movs(c: &mut FnCtx<'_>, ins: &Instr, double: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = if double { "double" } else { "float" };
    if is_x(&ins.args[1]) {
        let dst = ins.args[1].as_reg().cloned().ok_or_else(|| c.unsupported_operand(ins))?;
        let v = if double {
            c.load_f64(&ins.args[0], ins)?
        } else {
            c.load_f32(&ins.args[0], ins)?
        };
        if double {
            c.store_f64(&dst, &v, ins)?;
        } else {
            c.store_f32(&dst, &v, ins)?;
        }
        return Ok(Some(Flow::Next));
    }
    if is_x(&ins.args[0]) {
        let v = if double {
            c.load_f64(&ins.args[0], ins)?
        } else {
            c.load_f32(&ins.args[0], ins)?
        };
        match &ins.args[1] {
            Operand::Mem(m) => {
                let m = m.clone();
                let addr = c.addr_of_mem(&m, ins)?;
                let p = c.ptr_from_addr(&addr);
                emit!(c.w, "store {ty} {v}, ptr {p}, align 1");
            }
            Operand::Sym(s) => {
                let p = c.ptr_from_sym(&s.clone())?;
                emit!(c.w, "store {ty} {v}, ptr {p}, align 1");
            }
            _ => return Err(c.unsupported_operand(ins)),
        }
        return Ok(Some(Flow::Next));
    }
    Err(c.unsupported_operand(ins))
}

fn fbin(c: &mut FnCtx<'_>, ins: &Instr, ir_op: &str) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 || !is_x(&ins.args[1]) {
        return Err(c.unsupported_operand(ins));
    }
    let dst = ins.args[1].as_reg().cloned().ok_or_else(|| c.unsupported_operand(ins))?;
    let src = c.load_f64(&ins.args[0], ins)?;
    let cur = c.load_f64(&ins.args[1], ins)?;
    let r = c.fresh();
    emit!(c.w, "{r} = {ir_op} double {cur}, {src}");
    c.store_f64(&dst, &r, ins)?;
    Ok(Some(Flow::Next))
}

/// UCOMIS*: ZF = eq|unordered, CF = lt|unordered, PF = unordered; SF/OF
/// cleared.
fn ucomis(c: &mut FnCtx<'_>, ins: &Instr, double: bool) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 2 {
        return Err(c.unsupported_operand(ins));
    }
    let ty = if double { "double" } else { "float" };
    // Plan 9 order: flags from args[1] compared against args[0].
    let (a, b) = if double {
        (
            c.load_f64(&ins.args[1], ins)?,
            c.load_f64(&ins.args[0], ins)?,
        )
    } else {
        (
            c.load_f32(&ins.args[1], ins)?,
            c.load_f32(&ins.args[0], ins)?,
        )
    };
    let uno = c.fresh();
    emit!(c.w, "{uno} = fcmp uno {ty} {a}, {b}");
    let eq = c.fresh();
    emit!(c.w, "{eq} = fcmp oeq {ty} {a}, {b}");
    let lt = c.fresh();
    emit!(c.w, "{lt} = fcmp olt {ty} {a}, {b}");
    let zf = c.fresh();
    emit!(c.w, "{zf} = or i1 {eq}, {uno}");
    let cf = c.fresh();
    emit!(c.w, "{cf} = or i1 {lt}, {uno}");
    c.store_flag(Flag::Zf, &zf);
    c.store_flag(Flag::Cf, &cf);
    c.store_flag(Flag::Pf, &uno);
    c.store_flag(Flag::Sf, "false");
    c.store_flag(Flag::Of, "false");
    Ok(Some(Flow::Next))
}
