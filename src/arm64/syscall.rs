// Syscall family: SVC marshals the Linux AArch64 convention (number in R8,
// arguments in R0..R5) into the external @syscall helper and stores the
// result back into R0. The scheduler hooks that bracket SVC in runtime stubs
// are elided at the call layer.

use crate::core::writer::emit;
use crate::core::{Flow, Instr, Reg, TranslateResult};

use super::ops::Op;
use super::FnCtx;

pub(super) fn lower(
    c: &mut FnCtx<'_>,
    op: &Op,
    _ins: &Instr,
) -> TranslateResult<Option<Flow>> {
    match op {
        Op::Svc => {
            let num = c.load_reg(&Reg::new("R8"))?;
            let mut args = vec![format!("i64 {num}")];
            for i in 0..6 {
                let v = c.load_reg(&Reg::new(format!("R{i}")))?;
                args.push(format!("i64 {v}"));
            }
            let t = c.fresh();
            emit!(c.w, "{t} = call i64 @syscall({})", args.join(", "));
            c.store_reg(&Reg::new("R0"), &t)?;
            Ok(Some(Flow::Next))
        }
        _ => Ok(None),
    }
}
