// This module is the arm64 function translator. The register model covers
// the general-purpose file (R0..R30, RSP plus the pseudo-SP, LR, the
// scheduler's g register as an ordinary slot) with ZR reading as constant
// zero and discarding writes, the scalar floating-point file F0..F31 as i64
// slots holding bit patterns (so S- and D-width views of the same register
// alias correctly), and the NEON file V0..V31 as <16 x i8> slots keyed by
// base name regardless of arrangement suffix. Condition state follows the
// last flag-setting op: two i64 slots hold its left/right values for the
// relational predicates, i1 slots hold the computed carry and overflow, and
// float compares store their predicate bits separately with a translation-
// time marker routing Bcc through them. Entry emission, block walking, RET
// and the implicit zero return mirror the amd64 translator.

//! arm64 backend: function translation and lowering context.

mod arith;
mod atomic;
mod branch;
mod data;
mod eval;
mod fpmath;
mod ops;
mod syscall;
mod vec;

pub use ops::{Cond, Op};

use std::collections::{BTreeSet, HashMap};

use log::{debug, trace};

use crate::core::blocks::{split_blocks, Block};
use crate::core::writer::emit;
use crate::core::{
    llvm_global, Flow, FrameSlot, Func, FuncSig, Instr, IrWriter, LlvmType, Mem, Operand, Reg,
    Session, TranslateError, TranslateResult,
};

/// NEON registers are modeled at their full 128-bit width.
pub(crate) const VEC_TY: &str = "<16 x i8>";

/// Strip an arrangement or lane suffix from a vector register name
/// (`V1.B16` -> `V1`).
pub(crate) fn v_reg_base(r: &Reg) -> Option<String> {
    let s = r.as_str();
    let base = s.split('.').next().unwrap_or(s);
    let n: u32 = base.strip_prefix('V')?.parse().ok()?;
    (n <= 31).then(|| base.to_string())
}

pub(crate) fn f_reg_base(r: &Reg) -> Option<String> {
    let n: u32 = r.as_str().strip_prefix('F')?.parse().ok()?;
    (n <= 31).then(|| r.as_str().to_string())
}

/// Shifted-register operand forms (`R3<<8`, `R2>>1`).
pub(crate) fn split_reg_shift(r: &Reg) -> (Reg, Option<(&'static str, i64)>) {
    let s = r.as_str();
    if let Some((base, amt)) = s.split_once("<<") {
        if let Ok(n) = amt.parse::<i64>() {
            return (Reg::new(base), Some(("shl", n)));
        }
    }
    if let Some((base, amt)) = s.split_once("->") {
        if let Ok(n) = amt.parse::<i64>() {
            return (Reg::new(base), Some(("ashr", n)));
        }
    }
    if let Some((base, amt)) = s.split_once(">>") {
        if let Ok(n) = amt.parse::<i64>() {
            return (Reg::new(base), Some(("lshr", n)));
        }
    }
    (r.clone(), None)
}

fn is_gp_reg(r: &Reg) -> bool {
    let s = r.as_str();
    if matches!(s, "RSP" | "SP" | "LR" | "g") {
        return true;
    }
    s.strip_prefix('R')
        .and_then(|n| n.parse::<u32>().ok())
        .map(|n| n <= 30)
        .unwrap_or(false)
}

/// Per-function lowering context.
pub(crate) struct FnCtx<'a> {
    pub w: IrWriter,
    pub func: &'a Func,
    pub sig: &'a FuncSig,
    pub sigs: &'a HashMap<String, FuncSig>,
    pub resolve: &'a dyn Fn(&str) -> String,
    pub annotate: bool,

    pub blocks: Vec<Block>,
    labels: HashMap<String, usize>,

    gp_slots: BTreeSet<Reg>,
    f_slots: BTreeSet<String>,
    v_slots: BTreeSet<String>,

    fp_params: HashMap<i64, FrameSlot>,
    fp_results: Vec<(FrameSlot, String)>,
    pub(crate) use_result_slots: bool,

    /// True when the last flag-setting op was a float compare; Bcc then
    /// routes through the float predicate slots.
    pub(crate) flags_float: bool,
}

impl<'a> FnCtx<'a> {
    pub fn fresh(&mut self) -> String {
        self.w.fresh()
    }

    pub fn unsupported_operand(&self, ins: &Instr) -> TranslateError {
        TranslateError::UnsupportedOperand {
            op: ins.op.to_string(),
            line: ins.line,
            source_text: ins.raw.clone(),
        }
    }

    pub fn unsupported_opcode(&self, ins: &Instr) -> TranslateError {
        TranslateError::UnsupportedOpcode {
            op: ins.op.to_string(),
            line: ins.line,
            source_text: ins.raw.clone(),
        }
    }

    /// Load a general-purpose register; ZR reads as zero, shifted forms
    /// apply their shift.
    pub fn load_reg(&mut self, r: &Reg) -> TranslateResult<String> {
        if r.as_str() == "ZR" {
            return Ok("0".to_string());
        }
        let (base, shift) = split_reg_shift(r);
        if !self.gp_slots.contains(&base) {
            return Err(TranslateError::internal(format!(
                "arm64: no slot for register {r}"
            )));
        }
        let t = self.fresh();
        emit!(self.w, "{t} = load i64, ptr %r.{base}");
        match shift {
            None => Ok(t),
            Some((op, n)) => {
                let s = self.fresh();
                emit!(self.w, "{s} = {op} i64 {t}, {n}");
                Ok(s)
            }
        }
    }

    /// Store into a register slot; writes to ZR are discarded.
    pub fn store_reg(&mut self, r: &Reg, v: &str) -> TranslateResult<()> {
        if r.as_str() == "ZR" {
            return Ok(());
        }
        if !self.gp_slots.contains(r) {
            return Err(TranslateError::internal(format!(
                "arm64: no slot for register {r}"
            )));
        }
        emit!(self.w, "store i64 {v}, ptr %r.{r}");
        Ok(())
    }

    /// Load a NEON register as `<16 x i8>`.
    pub fn load_v(&mut self, r: &Reg, ins: &Instr) -> TranslateResult<String> {
        let base = v_reg_base(r).ok_or_else(|| self.unsupported_operand(ins))?;
        let t = self.fresh();
        emit!(self.w, "{t} = load {VEC_TY}, ptr %v.{base}");
        Ok(t)
    }

    pub fn store_v(&mut self, r: &Reg, v: &str, ins: &Instr) -> TranslateResult<()> {
        let base = v_reg_base(r).ok_or_else(|| self.unsupported_operand(ins))?;
        emit!(self.w, "store {VEC_TY} {v}, ptr %v.{base}");
        Ok(())
    }

    /// Load a floating-point register's raw 64-bit pattern.
    pub fn load_f_bits(&mut self, r: &Reg, ins: &Instr) -> TranslateResult<String> {
        let base = f_reg_base(r).ok_or_else(|| self.unsupported_operand(ins))?;
        let t = self.fresh();
        emit!(self.w, "{t} = load i64, ptr %fr.{base}");
        Ok(t)
    }

    pub fn store_f_bits(&mut self, r: &Reg, v: &str, ins: &Instr) -> TranslateResult<()> {
        let base = f_reg_base(r).ok_or_else(|| self.unsupported_operand(ins))?;
        emit!(self.w, "store i64 {v}, ptr %fr.{base}");
        Ok(())
    }

    /// Record an integer comparison: `lhs` relative to `rhs`, plus carry and
    /// overflow bits computed by the defining op.
    pub fn set_int_flags(&mut self, lhs: &str, rhs: &str, carry: &str, over: &str) {
        emit!(self.w, "store i64 {lhs}, ptr %cc.lhs");
        emit!(self.w, "store i64 {rhs}, ptr %cc.rhs");
        emit!(self.w, "store i1 {carry}, ptr %cc.carry");
        emit!(self.w, "store i1 {over}, ptr %cc.over");
        self.flags_float = false;
    }

    /// Record a float comparison's predicate bits.
    pub fn set_float_flags(&mut self, eq: &str, lt: &str, uno: &str) {
        emit!(self.w, "store i1 {eq}, ptr %cc.feq");
        emit!(self.w, "store i1 {lt}, ptr %cc.flt");
        emit!(self.w, "store i1 {uno}, ptr %cc.funo");
        self.flags_float = true;
    }

    fn load_cc_pair(&mut self) -> (String, String) {
        let lhs = self.fresh();
        emit!(self.w, "{lhs} = load i64, ptr %cc.lhs");
        let rhs = self.fresh();
        emit!(self.w, "{rhs} = load i64, ptr %cc.rhs");
        (lhs, rhs)
    }

    fn load_cc_bit(&mut self, slot: &str) -> String {
        let t = self.fresh();
        emit!(self.w, "{t} = load i1, ptr {slot}");
        t
    }

    pub fn not_i1(&mut self, v: &str) -> String {
        let t = self.fresh();
        emit!(self.w, "{t} = xor i1 {v}, true");
        t
    }

    /// Materialize a condition as an i1 from the recorded comparison.
    pub fn cond_value(&mut self, cond: Cond) -> String {
        if self.flags_float {
            return self.float_cond_value(cond);
        }
        let icmp = |c: &mut Self, pred: &str| {
            let (lhs, rhs) = c.load_cc_pair();
            let t = c.fresh();
            emit!(c.w, "{t} = icmp {pred} i64 {lhs}, {rhs}");
            t
        };
        match cond {
            Cond::Eq => icmp(self, "eq"),
            Cond::Ne => icmp(self, "ne"),
            Cond::Lt => icmp(self, "slt"),
            Cond::Le => icmp(self, "sle"),
            Cond::Gt => icmp(self, "sgt"),
            Cond::Ge => icmp(self, "sge"),
            Cond::Mi => icmp(self, "slt"),
            Cond::Pl => icmp(self, "sge"),
            Cond::Hs => self.load_cc_bit("%cc.carry"),
            Cond::Lo => {
                let cs = self.load_cc_bit("%cc.carry");
                self.not_i1(&cs)
            }
            Cond::Hi => {
                let cs = self.load_cc_bit("%cc.carry");
                let ne = icmp(self, "ne");
                let t = self.fresh();
                emit!(self.w, "{t} = and i1 {cs}, {ne}");
                t
            }
            Cond::Ls => {
                let hi = self.cond_value(Cond::Hi);
                self.not_i1(&hi)
            }
            Cond::Vs => self.load_cc_bit("%cc.over"),
            Cond::Vc => {
                let vs = self.load_cc_bit("%cc.over");
                self.not_i1(&vs)
            }
        }
    }

    fn float_cond_value(&mut self, cond: Cond) -> String {
        let eq = self.load_cc_bit("%cc.feq");
        let lt = self.load_cc_bit("%cc.flt");
        match cond {
            Cond::Eq => eq,
            Cond::Ne => self.not_i1(&eq),
            Cond::Lt | Cond::Lo | Cond::Mi => lt,
            Cond::Le | Cond::Ls => {
                let t = self.fresh();
                emit!(self.w, "{t} = or i1 {eq}, {lt}");
                t
            }
            Cond::Gt | Cond::Hi => {
                let uno = self.load_cc_bit("%cc.funo");
                let le = self.fresh();
                emit!(self.w, "{le} = or i1 {eq}, {lt}");
                let bad = self.fresh();
                emit!(self.w, "{bad} = or i1 {le}, {uno}");
                self.not_i1(&bad)
            }
            Cond::Ge | Cond::Hs | Cond::Pl => {
                let uno = self.load_cc_bit("%cc.funo");
                let bad = self.fresh();
                emit!(self.w, "{bad} = or i1 {lt}, {uno}");
                self.not_i1(&bad)
            }
            Cond::Vs => self.load_cc_bit("%cc.funo"),
            Cond::Vc => {
                let uno = self.load_cc_bit("%cc.funo");
                self.not_i1(&uno)
            }
        }
    }

    pub fn fp_param(&self, off: i64) -> Option<&FrameSlot> {
        self.fp_params.get(&off)
    }

    pub fn fp_result(&self, off: i64) -> Option<(&FrameSlot, &str)> {
        self.fp_results
            .iter()
            .find(|(s, _)| s.offset == off)
            .map(|(s, a)| (s, a.as_str()))
    }

    pub fn store_fp_result(
        &mut self,
        off: i64,
        val_ty: &LlvmType,
        v: &str,
        ins: &Instr,
    ) -> TranslateResult<()> {
        let (slot_ty, alloca) = match self.fp_result(off) {
            Some((s, a)) => (s.ty.clone(), a.to_string()),
            None => {
                return Err(TranslateError::internal(format!(
                    "store to unknown result slot +{off}(FP): {}",
                    ins.raw
                )))
            }
        };
        let cast = self.cast_value(v, val_ty, &slot_ty)?;
        emit!(self.w, "store {slot_ty} {cast}, ptr {alloca}");
        Ok(())
    }

    pub fn cast_value(
        &mut self,
        v: &str,
        from: &LlvmType,
        to: &LlvmType,
    ) -> TranslateResult<String> {
        if from == to {
            return Ok(v.to_string());
        }
        if let (Some(fb), Some(tb)) = (from.int_bits(), to.int_bits()) {
            let t = self.fresh();
            if fb > tb {
                emit!(self.w, "{t} = trunc {from} {v} to {to}");
            } else {
                emit!(self.w, "{t} = zext {from} {v} to {to}");
            }
            return Ok(t);
        }
        match (from, to) {
            (LlvmType::Ptr, _) if to.int_bits().is_some() => {
                let t = self.fresh();
                emit!(self.w, "{t} = ptrtoint ptr {v} to {to}");
                Ok(t)
            }
            (_, LlvmType::Ptr) if from.int_bits().is_some() => {
                let t = self.fresh();
                emit!(self.w, "{t} = inttoptr {from} {v} to ptr");
                Ok(t)
            }
            (LlvmType::I64, LlvmType::Double) | (LlvmType::Double, LlvmType::I64) => {
                let t = self.fresh();
                emit!(self.w, "{t} = bitcast {from} {v} to {to}");
                Ok(t)
            }
            _ => Err(TranslateError::internal(format!(
                "unsupported cast {from} -> {to}"
            ))),
        }
    }

    /// Resolve a branch operand to a block name: labels directly, `n(PC)`
    /// conservatively (current block for n <= 0, next block otherwise).
    pub fn branch_target(&self, bi: usize, op: &Operand) -> Option<String> {
        match op {
            Operand::Label(l) => self.labels.get(&**l).map(|&b| self.blocks[b].name.clone()),
            Operand::Mem(Mem { base, disp, .. }) if base == &"PC" => {
                if *disp <= 0 {
                    Some(self.blocks[bi].name.clone())
                } else if bi + 1 < self.blocks.len() {
                    Some(self.blocks[bi + 1].name.clone())
                } else {
                    Some(self.blocks[bi].name.clone())
                }
            }
            _ => None,
        }
    }

    pub fn fallthrough(&self, bi: usize) -> Option<&str> {
        self.blocks.get(bi + 1).map(|b| b.name.as_str())
    }

    fn maybe_annotate(&mut self, ins: &Instr) {
        if self.annotate && !ins.raw.is_empty() {
            emit!(self.w, "; {}", ins.raw);
        }
    }
}

/// Lower one arm64 function to a textual `define`.
pub fn translate_func(
    func: &Func,
    sig: &FuncSig,
    sigs: &HashMap<String, FuncSig>,
    resolve: &dyn Fn(&str) -> String,
    annotate: bool,
    session: &Session<'_>,
) -> TranslateResult<String> {
    debug!("arm64: translating {} ({} instrs)", sig.name, func.instrs.len());
    session.count_function();
    session.count_instructions(func.instrs.len());
    for ins in &func.instrs {
        if Op::is_permissive(ins.base_op()) {
            session.count_elided();
        }
    }

    let (blocks, labels) = split_blocks(&func.instrs, |ins| {
        Op::parse(ins.base_op()).ends_block()
    });
    trace!("arm64: {}: {} blocks", sig.name, blocks.len());

    let fp_params = sig
        .frame
        .params
        .iter()
        .map(|s| (s.offset, s.clone()))
        .collect::<HashMap<_, _>>();
    let fp_results = sig
        .frame
        .results
        .iter()
        .enumerate()
        .map(|(i, s)| (s.clone(), format!("%res{i}")))
        .collect::<Vec<_>>();
    let use_result_slots = !fp_results.is_empty()
        && func.instrs.iter().any(|ins| {
            ins.args.iter().any(|a| match a {
                Operand::Fp { offset, .. } | Operand::FpAddr { offset, .. } => {
                    fp_results.iter().any(|(s, _)| s.offset == *offset)
                }
                _ => false,
            })
        });

    let mut ctx = FnCtx {
        w: IrWriter::new(),
        func,
        sig,
        sigs,
        resolve,
        annotate,
        blocks,
        labels,
        gp_slots: BTreeSet::new(),
        f_slots: BTreeSet::new(),
        v_slots: BTreeSet::new(),
        fp_params,
        fp_results,
        use_result_slots,
        flags_float: false,
    };
    ctx.collect_touched();
    ctx.emit_entry()?;
    ctx.lower_blocks()?;

    let mut out = String::new();
    out.push_str(&format!("define {} {}(", sig.ret, llvm_global(&sig.name)));
    for (i, ty) in sig.args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{ty} %arg{i}"));
    }
    out.push(')');
    if let Some(attrs) = &sig.attrs {
        out.push(' ');
        out.push_str(attrs);
    }
    out.push_str(" {\nentry:\n");
    out.push_str(ctx.w.as_str());
    out.push_str("}\n");
    Ok(out)
}

impl<'a> FnCtx<'a> {
    fn arg_regs_for(sig: &FuncSig) -> Vec<Reg> {
        if !sig.arg_regs.is_empty() {
            return sig.arg_regs.iter().take(sig.args.len()).cloned().collect();
        }
        (0..sig.args.len().min(8))
            .map(|i| Reg::new(format!("R{i}")))
            .collect()
    }

    fn touch(&mut self, r: &Reg) {
        if r.as_str() == "ZR" || r.as_str() == "PC" {
            return;
        }
        if let Some(base) = v_reg_base(r) {
            self.v_slots.insert(base);
            return;
        }
        if let Some(base) = f_reg_base(r) {
            self.f_slots.insert(base);
            return;
        }
        let (base, _) = split_reg_shift(r);
        if is_gp_reg(&base) {
            self.gp_slots.insert(base);
        }
    }

    fn collect_touched(&mut self) {
        self.touch(&Reg::new("R0"));
        for r in Self::arg_regs_for(self.sig) {
            self.touch(&r);
        }
        for ins in &self.func.instrs {
            for arg in &ins.args {
                match arg {
                    Operand::Reg(r) => self.touch(r),
                    Operand::Mem(m) => {
                        if m.base != "PC" {
                            self.touch(&m.base);
                        }
                        if let Some(idx) = &m.index {
                            self.touch(idx);
                        }
                    }
                    Operand::RegList(regs) => {
                        for r in regs {
                            self.touch(r);
                        }
                    }
                    _ => {}
                }
            }
            let op = Op::parse(ins.base_op());
            if matches!(op, Op::Svc) {
                for i in 0..9 {
                    self.touch(&Reg::new(format!("R{i}")));
                }
            }
            if matches!(op, Op::Bl | Op::Call | Op::B | Op::Jmp) {
                if let Some(Operand::Sym(s)) = ins.args.first() {
                    if let Some(name) = s.strip_suffix("(SB)") {
                        let callee = (self.resolve)(name.trim_start_matches('$').trim());
                        match self.sigs.get(&callee) {
                            Some(csig) => {
                                for r in Self::arg_regs_for(csig) {
                                    self.touch(&r);
                                }
                            }
                            None => {
                                for i in 0..8 {
                                    self.touch(&Reg::new(format!("R{i}")));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn needs_frame(&self) -> bool {
        self.func.frame_size > 0
            || self.func.instrs.iter().any(|ins| {
                ins.args.iter().any(
                    |a| matches!(a, Operand::Mem(m) if m.base == "RSP" || m.base == "SP"),
                )
            })
    }

    fn emit_entry(&mut self) -> TranslateResult<()> {
        let gp = self.gp_slots.iter().cloned().collect::<Vec<_>>();
        for r in &gp {
            emit!(self.w, "%r.{r} = alloca i64");
            emit!(self.w, "store i64 0, ptr %r.{r}");
        }
        let fs = self.f_slots.iter().cloned().collect::<Vec<_>>();
        for f in &fs {
            emit!(self.w, "%fr.{f} = alloca i64");
            emit!(self.w, "store i64 0, ptr %fr.{f}");
        }
        let vs = self.v_slots.iter().cloned().collect::<Vec<_>>();
        for v in &vs {
            emit!(self.w, "%v.{v} = alloca {VEC_TY}");
            emit!(self.w, "store {VEC_TY} zeroinitializer, ptr %v.{v}");
        }
        for slot in ["%cc.lhs", "%cc.rhs"] {
            emit!(self.w, "{slot} = alloca i64");
            emit!(self.w, "store i64 0, ptr {slot}");
        }
        for slot in ["%cc.carry", "%cc.over", "%cc.feq", "%cc.flt", "%cc.funo"] {
            emit!(self.w, "{slot} = alloca i1");
            emit!(self.w, "store i1 false, ptr {slot}");
        }

        if self.needs_frame() {
            let size = self.func.frame_size.max(0) + 16;
            emit!(self.w, "%frame = alloca [{size} x i8]");
            let base = self.fresh();
            emit!(self.w, "{base} = ptrtoint ptr %frame to i64");
            let top = self.fresh();
            emit!(self.w, "{top} = add i64 {base}, {}", self.func.frame_size.max(0));
            for sp in ["RSP", "SP"] {
                let sp = Reg::new(sp);
                if self.gp_slots.contains(&sp) {
                    emit!(self.w, "store i64 {top}, ptr %r.{sp}");
                }
            }
        }

        let results = self.fp_results.clone();
        for (slot, alloca) in &results {
            emit!(self.w, "{alloca} = alloca {}", slot.ty);
            emit!(self.w, "store {} {}, ptr {alloca}", slot.ty, slot.ty.zero_value());
        }

        let arg_regs = Self::arg_regs_for(self.sig);
        let arg_tys = self.sig.args.clone();
        for (i, r) in arg_regs.iter().enumerate() {
            // Aggregate formals have no register image; their fields arrive
            // through FP slots.
            if arg_tys[i].int_bits().is_none() && arg_tys[i] != LlvmType::Ptr {
                continue;
            }
            let v = self.cast_value(&format!("%arg{i}"), &arg_tys[i], &LlvmType::I64)?;
            self.store_reg(r, &v)?;
        }

        if let Some(first) = self.blocks.first() {
            emit!(self.w, "br label %{}", first.name);
        } else {
            self.lower_ret_zero();
        }
        Ok(())
    }

    fn lower_blocks(&mut self) -> TranslateResult<()> {
        for bi in 0..self.blocks.len() {
            self.w.raw(&format!("\n{}:\n", self.blocks[bi].name));
            let (start, end) = (self.blocks[bi].start, self.blocks[bi].end);
            let mut terminated = false;
            for i in start..end {
                let ins = self.func.instrs[i].clone();
                if &*ins.op == "LABEL" {
                    continue;
                }
                self.maybe_annotate(&ins);
                match self.lower_instr(bi, &ins)? {
                    Flow::Next => {}
                    Flow::Stop => {
                        terminated = true;
                        break;
                    }
                }
            }
            if terminated {
                continue;
            }
            match self.fallthrough(bi) {
                Some(next) => {
                    let next = next.to_string();
                    emit!(self.w, "br label %{next}");
                }
                None => self.lower_ret_zero(),
            }
        }
        Ok(())
    }

    fn lower_instr(&mut self, bi: usize, ins: &Instr) -> TranslateResult<Flow> {
        let raw_op = ins.op.to_ascii_uppercase();
        if Op::is_permissive(&raw_op) || Op::is_permissive(ins.base_op()) {
            return Ok(Flow::Next);
        }
        let op = Op::parse(ins.base_op());
        match op {
            Op::Text | Op::Byte | Op::Label => return Ok(Flow::Next),
            Op::Ret => {
                self.lower_ret()?;
                return Ok(Flow::Stop);
            }
            Op::Mrs => {
                // MRS ident, reg: read a system register via inline asm.
                let (src, dst) = match (ins.args.first(), ins.args.get(1)) {
                    (Some(Operand::Ident(s)), Some(Operand::Reg(r))) => (s.clone(), r.clone()),
                    _ => return Err(self.unsupported_operand(ins)),
                };
                let t = self.fresh();
                emit!(
                    self.w,
                    "{t} = call i64 asm \"mrs $0, {src}\", \"=r\"()"
                );
                self.store_reg(&dst, &t)?;
                return Ok(Flow::Next);
            }
            _ => {}
        }

        let post_inc = ins.has_suffix(".P");
        let pre_index = ins.has_suffix(".W");

        if let Some(flow) = data::lower(self, &op, ins, post_inc, pre_index)? {
            return Ok(flow);
        }
        if let Some(flow) = atomic::lower(self, &op, ins)? {
            return Ok(flow);
        }
        if let Some(flow) = vec::lower(self, &op, ins, post_inc)? {
            return Ok(flow);
        }
        if let Some(flow) = arith::lower(self, &op, ins)? {
            return Ok(flow);
        }
        if let Some(flow) = fpmath::lower(self, &op, ins)? {
            return Ok(flow);
        }
        if let Some(flow) = syscall::lower(self, &op, ins)? {
            return Ok(flow);
        }
        if let Some(flow) = branch::lower(self, bi, &op, ins)? {
            return Ok(flow);
        }
        Err(self.unsupported_opcode(ins))
    }

    /// RET: prefer classic FP result slots when the function references
    /// them; many stdlib routines never materialize the result in R0.
    pub(crate) fn lower_ret(&mut self) -> TranslateResult<()> {
        let ret_ty = self.sig.ret.clone();
        if self.use_result_slots {
            let results = self.fp_results.clone();
            if results.len() == 1 {
                let (slot, alloca) = &results[0];
                let v = self.fresh();
                emit!(self.w, "{v} = load {}, ptr {alloca}", slot.ty);
                let cast = self.cast_value(&v, &slot.ty, &ret_ty)?;
                emit!(self.w, "ret {ret_ty} {cast}");
                return Ok(());
            }
            let mut cur = "undef".to_string();
            for (slot, alloca) in &results {
                let v = self.fresh();
                emit!(self.w, "{v} = load {}, ptr {alloca}", slot.ty);
                let t = self.fresh();
                emit!(
                    self.w,
                    "{t} = insertvalue {ret_ty} {cur}, {} {v}, {}",
                    slot.ty,
                    slot.index
                );
                cur = t;
            }
            emit!(self.w, "ret {ret_ty} {cur}");
            return Ok(());
        }

        match ret_ty {
            LlvmType::Void => {
                emit!(self.w, "ret void");
                Ok(())
            }
            ty => {
                let r0 = self.load_reg(&Reg::new("R0"))?;
                let cast = self.cast_value(&r0, &LlvmType::I64, &ty)?;
                emit!(self.w, "ret {ty} {cast}");
                Ok(())
            }
        }
    }

    pub(crate) fn lower_ret_zero(&mut self) {
        let ret = self.sig.ret.clone();
        match ret {
            LlvmType::Void => emit!(self.w, "ret void"),
            ty => emit!(self.w, "ret {ty} {}", ty.zero_value()),
        }
    }
}
