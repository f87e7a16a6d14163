// Branch and call family, following the original stdlib patterns: B/JMP to
// labels and conservative n(PC) targets, symbol targets promoted to tail
// calls, BL/CALL marshaling arguments from R0.. (or the callee's explicit
// ArgRegs), indirect calls through a register address via `blr $0` inline
// asm, and the flag-reading Bcc plus the flag-bypassing CBZ/CBNZ/TBZ/TBNZ
// forms. Tail calls into a callee whose signature matches the caller forward
// the caller's own SSA parameters.

use crate::core::llvm_global;
use crate::core::writer::emit;
use crate::core::{Flow, FuncSig, Instr, LlvmType, Operand, Reg, TranslateError, TranslateResult};

use super::ops::{Cond, Op};
use super::FnCtx;

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    bi: usize,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Bl | Op::Blr | Op::Call => call(c, ins),
        Op::B | Op::Jmp => b(c, bi, ins),
        Op::Br => {
            // Indirect branch through a register; no block-level target.
            if let Some(Operand::Reg(r)) = ins.args.first() {
                let addr = c.load_reg(&r.clone())?;
                emit!(
                    c.w,
                    "call void asm sideeffect \"br $0\", \"r,~{{memory}}\"(i64 {addr})"
                );
                c.lower_ret_zero();
                return Ok(Some(Flow::Stop));
            }
            Err(c.unsupported_operand(ins))
        }
        Op::Branch(cond) => bcc(c, bi, *cond, ins),
        Op::Cbz => cbz(c, bi, ins, 64, true),
        Op::Cbnz => cbz(c, bi, ins, 64, false),
        Op::Cbzw => cbz(c, bi, ins, 32, true),
        Op::Cbnzw => cbz(c, bi, ins, 32, false),
        Op::Tbz => tbz(c, bi, ins, true),
        Op::Tbnz => tbz(c, bi, ins, false),
        _ => Ok(None),
    }
}

fn unresolved(ins: &Instr) -> TranslateError {
    TranslateError::UnresolvedBranch {
        line: ins.line,
        source_text: ins.raw.clone(),
    }
}

fn fall_of(c: &FnCtx<'_>, bi: usize, ins: &Instr) -> TranslateResult<String> {
    c.fallthrough(bi)
        .map(|s| s.to_string())
        .ok_or_else(|| unresolved(ins))
}

fn call(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    match &ins.args[0] {
        Operand::Reg(r) => {
            let addr = c.load_reg(&r.clone())?;
            emit!(
                c.w,
                "call void asm sideeffect \"blr $0\", \"r,~{{memory}}\"(i64 {addr})"
            );
            Ok(Some(Flow::Next))
        }
        Operand::Mem(m) => {
            let m = m.clone();
            let (addr, _, _) = c.addr_i64(&m, super::eval::AddrMode::Offset, ins)?;
            emit!(
                c.w,
                "call void asm sideeffect \"blr $0\", \"r,~{{memory}}\"(i64 {addr})"
            );
            Ok(Some(Flow::Next))
        }
        Operand::Sym(s) if s.ends_with("(SB)") => {
            call_sym(c, &s.clone())?;
            Ok(Some(Flow::Next))
        }
        _ => Err(c.unsupported_operand(ins)),
    }
}

fn b(c: &mut FnCtx<'_>, bi: usize, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    match &ins.args[0] {
        Operand::Reg(r) => {
            let addr = c.load_reg(&r.clone())?;
            emit!(
                c.w,
                "call void asm sideeffect \"br $0\", \"r,~{{memory}}\"(i64 {addr})"
            );
            c.lower_ret_zero();
            Ok(Some(Flow::Stop))
        }
        Operand::Sym(s) if s.ends_with("(SB)") => {
            tail_call(c, &s.clone())?;
            Ok(Some(Flow::Stop))
        }
        other => {
            let target = c.branch_target(bi, other).ok_or_else(|| unresolved(ins))?;
            emit!(c.w, "br label %{target}");
            Ok(Some(Flow::Stop))
        }
    }
}

fn bcc(c: &mut FnCtx<'_>, bi: usize, cond: Cond, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let target = c
        .branch_target(bi, &ins.args[0])
        .ok_or_else(|| unresolved(ins))?;
    let fall = fall_of(c, bi, ins)?;
    let cv = c.cond_value(cond);
    emit!(c.w, "br i1 {cv}, label %{target}, label %{fall}");
    Ok(Some(Flow::Stop))
}

/// CBZ/CBNZ bypass the flag state entirely.
fn cbz(
    c: &mut FnCtx<'_>,
    bi: usize,
    ins: &Instr,
    bits: u32,
    on_zero: bool,
) -> TranslateResult<Option<Flow>> {
    let (reg, target_op) = match &ins.args[..] {
        [Operand::Reg(r), t] => (r.clone(), t.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let v64 = c.load_reg(&reg)?;
    let pred = if on_zero { "eq" } else { "ne" };
    let cond = if bits == 32 {
        let t = c.fresh();
        emit!(c.w, "{t} = trunc i64 {v64} to i32");
        let cv = c.fresh();
        emit!(c.w, "{cv} = icmp {pred} i32 {t}, 0");
        cv
    } else {
        let cv = c.fresh();
        emit!(c.w, "{cv} = icmp {pred} i64 {v64}, 0");
        cv
    };
    let target = c
        .branch_target(bi, &target_op)
        .ok_or_else(|| unresolved(ins))?;
    let fall = fall_of(c, bi, ins)?;
    emit!(c.w, "br i1 {cond}, label %{target}, label %{fall}");
    Ok(Some(Flow::Stop))
}

/// TBZ/TBNZ $bit, Rn, label.
fn tbz(c: &mut FnCtx<'_>, bi: usize, ins: &Instr, on_zero: bool) -> TranslateResult<Option<Flow>> {
    let (bit, reg, target_op) = match &ins.args[..] {
        [Operand::Imm(bit), Operand::Reg(r), t] => (*bit & 63, r.clone(), t.clone()),
        _ => return Err(c.unsupported_operand(ins)),
    };
    let v = c.load_reg(&reg)?;
    let sh = c.fresh();
    emit!(c.w, "{sh} = lshr i64 {v}, {bit}");
    let masked = c.fresh();
    emit!(c.w, "{masked} = and i64 {sh}, 1");
    let pred = if on_zero { "eq" } else { "ne" };
    let cond = c.fresh();
    emit!(c.w, "{cond} = icmp {pred} i64 {masked}, 0");
    let target = c
        .branch_target(bi, &target_op)
        .ok_or_else(|| unresolved(ins))?;
    let fall = fall_of(c, bi, ins)?;
    emit!(c.w, "br i1 {cond}, label %{target}, label %{fall}");
    Ok(Some(Flow::Stop))
}

fn resolve_callee(c: &FnCtx<'_>, sym: &str) -> String {
    let name = sym.trim().trim_end_matches("(SB)").trim_start_matches('$');
    (c.resolve)(name.trim())
}

fn callee_arg_reg(csig: &FuncSig, i: usize) -> Reg {
    if i < csig.arg_regs.len() {
        csig.arg_regs[i].clone()
    } else {
        Reg::new(format!("R{i}"))
    }
}

fn marshal_arg(c: &mut FnCtx<'_>, reg: &Reg, ty: &LlvmType) -> TranslateResult<String> {
    let v = c.load_reg(reg)?;
    let cast = c.cast_value(&v, &LlvmType::I64, ty)?;
    Ok(format!("{ty} {cast}"))
}

/// Direct BL: marshal arguments per the callee ABI, store a scalar result
/// into R0.
pub(super) fn call_sym(c: &mut FnCtx<'_>, sym: &str) -> TranslateResult<()> {
    let callee = resolve_callee(c, sym);
    // Syscall stubs bracket SVC with scheduler hooks this layer elides.
    if callee == "runtime.entersyscall" || callee == "runtime.exitsyscall" {
        return Ok(());
    }
    let csig = c
        .sigs
        .get(&callee)
        .cloned()
        .unwrap_or_else(|| FuncSig::void_stub(&callee));

    let mut args = Vec::with_capacity(csig.args.len());
    for (i, ty) in csig.args.iter().enumerate() {
        let r = callee_arg_reg(&csig, i);
        args.push(marshal_arg(c, &r, ty)?);
    }
    let arg_list = args.join(", ");
    let global = llvm_global(&callee);
    match &csig.ret {
        LlvmType::Void => {
            emit!(c.w, "call void {global}({arg_list})");
            Ok(())
        }
        ret => {
            let t = c.fresh();
            emit!(c.w, "{t} = call {ret} {global}({arg_list})");
            let wide = c.cast_value(&t, ret, &LlvmType::I64)?;
            c.store_reg(&Reg::new("R0"), &wide)
        }
    }
}

/// Tail-B to a symbol: call and return. Stack-ABI trampolines (no ArgRegs,
/// same shape as the caller) forward the caller's own SSA parameters.
pub(super) fn tail_call(c: &mut FnCtx<'_>, sym: &str) -> TranslateResult<()> {
    let callee = resolve_callee(c, sym);
    let csig = match c.sigs.get(&callee) {
        Some(s) => s.clone(),
        None => {
            let mut s = c.sig.clone();
            s.name = callee.clone();
            s
        }
    };

    let pass_through = csig.arg_regs.is_empty() && csig.same_shape(c.sig);
    let mut args = Vec::with_capacity(csig.args.len());
    if pass_through {
        for (i, ty) in csig.args.iter().enumerate() {
            args.push(format!("{ty} %arg{i}"));
        }
    } else {
        for (i, ty) in csig.args.iter().enumerate() {
            let r = callee_arg_reg(&csig, i);
            args.push(marshal_arg(c, &r, ty)?);
        }
    }
    let arg_list = args.join(", ");
    let global = llvm_global(&callee);
    let caller_ret = c.sig.ret.clone();

    match &csig.ret {
        LlvmType::Void => {
            emit!(c.w, "call void {global}({arg_list})");
            if c.use_result_slots {
                return c.lower_ret();
            }
            match caller_ret {
                LlvmType::Void => emit!(c.w, "ret void"),
                ty => emit!(c.w, "ret {ty} {}", ty.zero_value()),
            }
            Ok(())
        }
        ret => {
            let t = c.fresh();
            emit!(c.w, "{t} = call {ret} {global}({arg_list})");
            match caller_ret {
                LlvmType::Void => {
                    emit!(c.w, "ret void");
                    Ok(())
                }
                ref cty if cty == ret => {
                    emit!(c.w, "ret {ret} {t}");
                    Ok(())
                }
                cty => Err(TranslateError::SignatureMismatch {
                    callee,
                    reason: format!("tail-call return mismatch: caller {cty}, callee {ret}"),
                }),
            }
        }
    }
}
