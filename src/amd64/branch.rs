// Branch and call family. Labels and n(PC) targets resolve through the
// block map; a symbol target promotes JMP to a tail call
// and CALL to a direct call with arguments marshaled from the callee's
// register ABI. Indirect branches through a register or memory address have
// no block-level target and lower to side-effecting inline asm. Conditional
// jumps read the flag slots via the shared cc table and branch between the
// resolved target and the textual fall-through block. LOOP decrements CX and
// loops while it is nonzero.

use crate::core::writer::emit;
use crate::core::{Flow, FuncSig, Instr, LlvmType, Operand, Reg, TranslateError, TranslateResult};
use crate::core::llvm_global;

use super::ops::{Cc, Op};
use super::FnCtx;

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    bi: usize,
    op: &Op,
    ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Jmp => jmp(c, bi, ins),
        Op::Jump(cc) => jcc(c, bi, *cc, ins),
        Op::Call => call(c, ins),
        Op::Loop => loop_op(c, bi, ins),
        _ => Ok(None),
    }
}

fn unresolved(ins: &Instr) -> TranslateError {
    TranslateError::UnresolvedBranch {
        line: ins.line,
        source_text: ins.raw.clone(),
    }
}

fn jmp(c: &mut FnCtx<'_>, bi: usize, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    match &ins.args[0] {
        Operand::Sym(s) if s.ends_with("(SB)") => {
            tail_call(c, &s.clone(), ins)?;
            Ok(Some(Flow::Stop))
        }
        Operand::Reg(r) => {
            let addr = c.load_reg(&r.clone())?;
            emit!(
                c.w,
                "call void asm sideeffect \"jmp *$0\", \"r,~{{memory}}\"(i64 {addr})"
            );
            c.lower_ret_zero();
            Ok(Some(Flow::Stop))
        }
        Operand::Mem(m) if m.base != "PC" => {
            let m = m.clone();
            let addr = c.addr_of_mem(&m, ins)?;
            emit!(
                c.w,
                "call void asm sideeffect \"jmp *$0\", \"r,~{{memory}}\"(i64 {addr})"
            );
            c.lower_ret_zero();
            Ok(Some(Flow::Stop))
        }
        other => {
            let target = c.branch_target(bi, other).ok_or_else(|| unresolved(ins))?;
            emit!(c.w, "br label %{target}");
            Ok(Some(Flow::Stop))
        }
    }
}

fn jcc(c: &mut FnCtx<'_>, bi: usize, cc: Cc, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let target = c
        .branch_target(bi, &ins.args[0])
        .ok_or_else(|| unresolved(ins))?;
    let fall = c
        .fallthrough(bi)
        .map(|s| s.to_string())
        .ok_or_else(|| unresolved(ins))?;
    let cond = c.cond_value(cc);
    emit!(c.w, "br i1 {cond}, label %{target}, label %{fall}");
    Ok(Some(Flow::Stop))
}

fn call(c: &mut FnCtx<'_>, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    match &ins.args[0] {
        Operand::Sym(s) if s.ends_with("(SB)") => {
            call_sym(c, &s.clone())?;
            Ok(Some(Flow::Next))
        }
        Operand::Reg(r) => {
            let addr = c.load_reg(&r.clone())?;
            emit!(
                c.w,
                "call void asm sideeffect \"call *$0\", \"r,~{{memory}}\"(i64 {addr})"
            );
            Ok(Some(Flow::Next))
        }
        Operand::Mem(m) if m.base != "PC" => {
            let m = m.clone();
            let addr = c.addr_of_mem(&m, ins)?;
            emit!(
                c.w,
                "call void asm sideeffect \"call *$0\", \"r,~{{memory}}\"(i64 {addr})"
            );
            Ok(Some(Flow::Next))
        }
        _ => Err(c.unsupported_operand(ins)),
    }
}

fn loop_op(c: &mut FnCtx<'_>, bi: usize, ins: &Instr) -> TranslateResult<Option<Flow>> {
    if ins.args.len() != 1 {
        return Err(c.unsupported_operand(ins));
    }
    let target = c
        .branch_target(bi, &ins.args[0])
        .ok_or_else(|| unresolved(ins))?;
    let fall = c
        .fallthrough(bi)
        .map(|s| s.to_string())
        .ok_or_else(|| unresolved(ins))?;
    let cx = Reg::new("CX");
    let v = c.load_reg(&cx)?;
    let dec = c.fresh();
    emit!(c.w, "{dec} = sub i64 {v}, 1");
    c.store_reg(&cx, &dec)?;
    let nz = c.fresh();
    emit!(c.w, "{nz} = icmp ne i64 {dec}, 0");
    emit!(c.w, "br i1 {nz}, label %{target}, label %{fall}");
    Ok(Some(Flow::Stop))
}

fn resolve_callee(c: &FnCtx<'_>, sym: &str) -> String {
    let name = sym.trim().trim_end_matches("(SB)").trim_start_matches('$');
    (c.resolve)(name.trim())
}

/// Marshal one argument register into an argument of the callee's type.
fn marshal_arg(
    c: &mut FnCtx<'_>,
    reg: &Reg,
    ty: &LlvmType,
) -> TranslateResult<String> {
    let v = c.load_reg(reg)?;
    let cast = c.cast_value(&v, &LlvmType::I64, ty)?;
    Ok(format!("{ty} {cast}"))
}

fn callee_arg_reg(csig: &FuncSig, i: usize, callee: &str) -> TranslateResult<Reg> {
    if i < csig.arg_regs.len() {
        return Ok(csig.arg_regs[i].clone());
    }
    super::DEFAULT_ARG_REGS
        .get(i)
        .map(|r| Reg::new(r))
        .ok_or_else(|| TranslateError::SignatureMismatch {
            callee: callee.to_string(),
            reason: format!("no argument register for parameter {i}"),
        })
}

/// Direct CALL: marshal arguments per the callee ABI, store a scalar result
/// into AX.
pub(super) fn call_sym(c: &mut FnCtx<'_>, sym: &str) -> TranslateResult<()> {
    let callee = resolve_callee(c, sym);
    // Scheduler hooks around syscalls are not needed at this layer.
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
        let r = callee_arg_reg(&csig, i, &callee)?;
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
            c.store_reg(&Reg::new("AX"), &wide)
        }
    }
}

/// Tail-JMP to a symbol: call then return the result. When the callee has no
/// explicit register ABI and matches the caller's shape, forward the caller's
/// own SSA parameters (stack-ABI pass-through, the stdlib trampoline form).
pub(super) fn tail_call(c: &mut FnCtx<'_>, sym: &str, _ins: &Instr) -> TranslateResult<()> {
    let callee = resolve_callee(c, sym);
    let csig = match c.sigs.get(&callee) {
        Some(s) => s.clone(),
        None => {
            // Cross-package trampoline with no discovered signature: assume
            // the caller's own shape.
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
            let r = callee_arg_reg(&csig, i, &callee)?;
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
            // rt0-style stubs tail into entrypoints that do not return; keep
            // lowering permissive with a zero return.
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
