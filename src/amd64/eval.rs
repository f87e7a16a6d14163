// This module is the amd64 operand evaluator: it turns parsed operands into
// typed SSA values, emitting the loads and casts they require. Immediates
// print directly; registers load from their slots; FP operands read the
// matching formal parameter (extracting the field of a decomposed aggregate
// when the slot names one); memory operands compute base+index*scale+disp as
// i64 and go through inttoptr; SB symbols resolve through the caller-supplied
// resolver, with bare non-(SB) constants falling back to immediate zero
// because they come from includes this layer does not materialize. All
// memory traffic uses align 1 since assembly offsets carry no alignment
// guarantees. Vector operand loaders for the X (128-bit) and Y (256-bit)
// register files live here as well.

//! amd64 operand evaluation.

use crate::core::writer::emit;
use crate::core::{llvm_global, Instr, LlvmType, Mem, Operand, TranslateResult};

use super::{x_reg_index, y_reg_index, FnCtx};

impl<'a> FnCtx<'a> {
    /// Evaluate an operand as an i64 SSA value.
    pub fn eval_i64(&mut self, op: &Operand, ins: &Instr) -> TranslateResult<String> {
        match op {
            Operand::Imm(v) => Ok(v.to_string()),
            Operand::Reg(r) => self.load_reg(r),
            Operand::Fp { offset, .. } => self.eval_fp_i64(*offset, ins),
            Operand::FpAddr { offset, .. } => {
                // Address of a result slot alloca.
                let alloca = match self.fp_result(*offset) {
                    Some((_, a)) => a.to_string(),
                    None => return Err(self.unsupported_operand(ins)),
                };
                let t = self.fresh();
                emit!(self.w, "{t} = ptrtoint ptr {alloca} to i64");
                Ok(t)
            }
            Operand::Mem(m) => {
                let addr = self.addr_of_mem(m, ins)?;
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
                        // Runtime constants exposed through includes are not
                        // materialized here; bare symbols read as zero.
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

    /// Effective address of a `d(B)(I*s)` reference as i64.
    pub fn addr_of_mem(&mut self, m: &Mem, ins: &Instr) -> TranslateResult<String> {
        if m.base == "PC" || m.base == "FP" || m.base == "SB" {
            return Err(self.unsupported_operand(ins));
        }
        let mut addr = self.load_reg(&m.base)?;
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
        if m.disp != 0 {
            let t = self.fresh();
            emit!(self.w, "{t} = add i64 {addr}, {}", m.disp);
            addr = t;
        }
        Ok(addr)
    }

    /// Cast an i64 address into a pointer.
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

    /// Read an FP parameter slot widened to i64.
    pub fn eval_fp_i64(&mut self, off: i64, ins: &Instr) -> TranslateResult<String> {
        let (v, ty) = self.fp_arg_value(off, ins)?;
        self.cast_value(&v, &ty, &LlvmType::I64)
    }

    fn vec_slot(&self, r: &crate::core::Reg, ins: &Instr) -> TranslateResult<String> {
        if x_reg_index(r).is_some() || y_reg_index(r).is_some() {
            Ok(format!("%v.{r}"))
        } else {
            Err(self.unsupported_operand(ins))
        }
    }

    /// Load an X register as `<16 x i8>`.
    pub fn load_x(&mut self, r: &crate::core::Reg, ins: &Instr) -> TranslateResult<String> {
        let slot = self.vec_slot(r, ins)?;
        let t = self.fresh();
        emit!(self.w, "{t} = load <16 x i8>, ptr {slot}");
        Ok(t)
    }

    pub fn store_x(
        &mut self,
        r: &crate::core::Reg,
        v: &str,
        ins: &Instr,
    ) -> TranslateResult<()> {
        let slot = self.vec_slot(r, ins)?;
        emit!(self.w, "store <16 x i8> {v}, ptr {slot}");
        Ok(())
    }

    /// Load a Y register as `<32 x i8>`.
    pub fn load_y(&mut self, r: &crate::core::Reg, ins: &Instr) -> TranslateResult<String> {
        let slot = self.vec_slot(r, ins)?;
        let t = self.fresh();
        emit!(self.w, "{t} = load <32 x i8>, ptr {slot}");
        Ok(t)
    }

    pub fn store_y(
        &mut self,
        r: &crate::core::Reg,
        v: &str,
        ins: &Instr,
    ) -> TranslateResult<()> {
        let slot = self.vec_slot(r, ins)?;
        emit!(self.w, "store <32 x i8> {v}, ptr {slot}");
        Ok(())
    }

    /// Evaluate an X-sized vector operand: register, memory, or symbol.
    pub fn load_x_operand(&mut self, op: &Operand, ins: &Instr) -> TranslateResult<String> {
        match op {
            Operand::Reg(r) if x_reg_index(r).is_some() => self.load_x(r, ins),
            Operand::Mem(m) => {
                let addr = self.addr_of_mem(m, ins)?;
                let p = self.ptr_from_addr(&addr);
                let t = self.fresh();
                emit!(self.w, "{t} = load <16 x i8>, ptr {p}, align 1");
                Ok(t)
            }
            Operand::Sym(s) => {
                let p = self.ptr_from_sym(s.trim_start_matches('$'))?;
                let t = self.fresh();
                emit!(self.w, "{t} = load <16 x i8>, ptr {p}, align 1");
                Ok(t)
            }
            _ => Err(self.unsupported_operand(ins)),
        }
    }

    /// Evaluate a Y-sized vector operand: register, memory, or symbol.
    pub fn load_y_operand(&mut self, op: &Operand, ins: &Instr) -> TranslateResult<String> {
        match op {
            Operand::Reg(r) if y_reg_index(r).is_some() => self.load_y(r, ins),
            Operand::Mem(m) => {
                let addr = self.addr_of_mem(m, ins)?;
                let p = self.ptr_from_addr(&addr);
                let t = self.fresh();
                emit!(self.w, "{t} = load <32 x i8>, ptr {p}, align 1");
                Ok(t)
            }
            Operand::Sym(s) => {
                let p = self.ptr_from_sym(s.trim_start_matches('$'))?;
                let t = self.fresh();
                emit!(self.w, "{t} = load <32 x i8>, ptr {p}, align 1");
                Ok(t)
            }
            _ => Err(self.unsupported_operand(ins)),
        }
    }
}
