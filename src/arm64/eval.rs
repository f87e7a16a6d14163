// arm64 operand evaluation: i64 values from immediates, registers (including
// ZR and shifted forms), FP parameter slots, memory, and SB symbols; plus
// the addressing helper shared by loads, stores and NEON list ops, which
// understands the three indexing modes (plain offset, pre-indexed .W with
// base writeback, post-indexed .P where the increment applies after the
// access). Bare non-(SB) constants resolve to zero as on amd64.

//! arm64 operand evaluation and addressing.

use crate::core::writer::emit;
use crate::core::{llvm_global, Instr, LlvmType, Mem, Operand, Reg, TranslateResult};

use super::FnCtx;

/// Indexing mode decoded from a mnemonic suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AddrMode {
    /// `off(Rn)`: plain base+offset.
    Offset,
    /// `.W off(Rn)`: base updates to base+offset before the access.
    Pre,
    /// `.P off(Rn)`: access at base, base updates to base+offset after.
    Post,
}

impl AddrMode {
    pub(super) fn from_flags(post_inc: bool, pre_index: bool) -> AddrMode {
        if post_inc {
            AddrMode::Post
        } else if pre_index {
            AddrMode::Pre
        } else {
            AddrMode::Offset
        }
    }
}

impl<'a> FnCtx<'a> {
    /// Evaluate an operand as an i64 SSA value.
    pub fn eval_i64(&mut self, op: &Operand, ins: &Instr) -> TranslateResult<String> {
        match op {
            Operand::Imm(v) => Ok(v.to_string()),
            Operand::Reg(r) => self.load_reg(r),
            Operand::Fp { offset, .. } => self.eval_fp_i64(*offset, ins),
            Operand::FpAddr { offset, .. } => {
                let alloca = match self.fp_result(*offset) {
                    Some((_, a)) => a.to_string(),
                    None => return Err(self.unsupported_operand(ins)),
                };
                let t = self.fresh();
                emit!(self.w, "{t} = ptrtoint ptr {alloca} to i64");
                Ok(t)
            }
            Operand::Mem(m) => {
                let (addr, _, _) = self.addr_i64(m, AddrMode::Offset, ins)?;
                let p = self.ptr_from_addr(&addr);
                let t = self.fresh();
                emit!(self.w, "{t} = load i64, ptr {p}, align 1");
                Ok(t)
            }
            Operand::Sym(s) => {
                let s = s.trim();
                let addr_only = s.starts_with('$');
                let name = s.trim_start_matches('$').trim();
                match self.ptr_from_sym(name) {
                    Ok(p) => {
                        let t = self.fresh();
                        if addr_only {
                            emit!(self.w, "{t} = ptrtoint ptr {p} to i64");
                        } else {
                            emit!(self.w, "{t} = load i64, ptr {p}, align 1");
                        }
                        Ok(t)
                    }
                    Err(e) => {
                        if !name.contains("(SB)") {
                            Ok("0".to_string())
                        } else {
                            Err(e)
                        }
                    }
                }
            }
            _ => Err(self.unsupported_operand(ins)),
        }
    }

    /// Effective address of a memory operand under an indexing mode.
    ///
    /// Returns the access address, the base register, and the increment the
    /// caller should apply via [`FnCtx::apply_post_inc`] for `.P` forms
    /// (zero means "default to the transfer size").
    pub(super) fn addr_i64(
        &mut self,
        m: &Mem,
        mode: AddrMode,
        ins: &Instr,
    ) -> TranslateResult<(String, Reg, i64)> {
        if m.base == "PC" || m.base == "FP" || m.base == "SB" {
            return Err(self.unsupported_operand(ins));
        }
        let base_val = self.load_reg(&m.base)?;
        let mut addr = base_val;
        if let Some(idx) = m.index.clone() {
            let iv = self.load_reg(&idx)?;
            let scaled = if m.scale > 1 {
                let t = self.fresh();
                emit!(self.w, "{t} = mul i64 {iv}, {}", m.scale);
                t
            } else {
                iv
            };
            let t = self.fresh();
            emit!(self.w, "{t} = add i64 {addr}, {scaled}");
            addr = t;
        }
        match mode {
            AddrMode::Post => {
                // Access at the unmodified base; displacement is the
                // post-increment.
                Ok((addr, m.base.clone(), m.disp))
            }
            AddrMode::Pre => {
                if m.disp != 0 {
                    let t = self.fresh();
                    emit!(self.w, "{t} = add i64 {addr}, {}", m.disp);
                    addr = t;
                }
                self.store_reg(&m.base.clone(), &addr)?;
                Ok((addr, m.base.clone(), 0))
            }
            AddrMode::Offset => {
                if m.disp != 0 {
                    let t = self.fresh();
                    emit!(self.w, "{t} = add i64 {addr}, {}", m.disp);
                    addr = t;
                }
                Ok((addr, m.base.clone(), 0))
            }
        }
    }

    /// Advance a post-indexed base register.
    pub(super) fn apply_post_inc(&mut self, base: &Reg, inc: i64) -> TranslateResult<()> {
        let v = self.load_reg(base)?;
        let t = self.fresh();
        emit!(self.w, "{t} = add i64 {v}, {inc}");
        self.store_reg(base, &t)
    }

    pub fn ptr_from_addr(&mut self, addr: &str) -> String {
        let t = self.fresh();
        emit!(self.w, "{t} = inttoptr i64 {addr} to ptr");
        t
    }

    /// Pointer to a `sym(SB)` global, applying `sym+off(SB)` displacements.
    pub fn ptr_from_sym(&mut self, sym: &str) -> TranslateResult<String> {
        let body = match sym.strip_suffix("(SB)") {
            Some(b) => b.trim(),
            None => {
                return Err(crate::core::TranslateError::UnresolvedSymbol {
                    sym: sym.to_string(),
                })
            }
        };
        let (name, off) = match body.rfind('+') {
            Some(i) => match body[i + 1..].parse::<i64>() {
                Ok(off) => (&body[..i], off),
                Err(_) => (body, 0),
            },
            None => (body, 0),
        };
        let global = llvm_global(&(self.resolve)(name.trim()));
        if off == 0 {
            return Ok(global);
        }
        let t = self.fresh();
        emit!(self.w, "{t} = getelementptr i8, ptr {global}, i64 {off}");
        Ok(t)
    }

    /// Read the formal parameter backing an FP slot, typed per the slot.
    pub fn fp_arg_value(
        &mut self,
        off: i64,
        ins: &Instr,
    ) -> TranslateResult<(String, LlvmType)> {
        let slot = match self.fp_param(off) {
            Some(s) => s.clone(),
            None => return Err(self.unsupported_operand(ins)),
        };
        let arg_ty = self
            .sig
            .args
            .get(slot.index)
            .cloned()
            .ok_or_else(|| self.unsupported_operand(ins))?;
        let arg = format!("%arg{}", slot.index);
        if slot.field >= 0 {
            let t = self.fresh();
            emit!(self.w, "{t} = extractvalue {arg_ty} {arg}, {}", slot.field);
            Ok((t, slot.ty))
        } else {
            Ok((arg, slot.ty))
        }
    }

    pub fn eval_fp_i64(&mut self, off: i64, ins: &Instr) -> TranslateResult<String> {
        let (v, ty) = self.fp_arg_value(off, ins)?;
        self.cast_value(&v, &ty, &LlvmType::I64)
    }
}
