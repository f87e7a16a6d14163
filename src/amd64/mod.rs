// This module is the amd64 function translator: it owns the per-function
// lowering context (register, vector, and flag slots backed by entry-block
// allocas; FP result allocas; the virtual PUSH/POP stack), discovers which
// registers a function touches (explicit operands plus the implicit sets of
// MUL/DIV/CPUID/string/syscall forms and callee argument registers), emits
// the entry block that zero-initializes every slot and seeds the
// argument-carrying registers, then walks the basic blocks dispatching each
// instruction through the family lowerers (vec, data, arith, atomic, fpmath,
// syscall, branch). Flag state is five i1 slots (CF/ZF/SF/OF/PF); cond_value
// combines them per condition code for Jcc/SETcc/CMOVQcc. RET reads either
// the declared FP result slots (when the function references them) or AX,
// per the Plan 9 calling convention.

//! amd64 backend: function translation and lowering context.

mod arith;
mod atomic;
mod branch;
mod data;
mod eval;
mod fpmath;
mod ops;
mod syscall;
mod vec;

pub use ops::{Cc, Op};

use std::collections::{BTreeSet, HashMap};

use log::{debug, trace};

use crate::core::blocks::{split_blocks, Block};
use crate::core::writer::emit;
use crate::core::{
    llvm_global, Flow, FrameSlot, Func, FuncSig, Instr, IrWriter, LlvmType, Mem, Operand, Reg,
    Session, TranslateError, TranslateResult,
};

/// Default register-based argument ABI (System V order, as the runtime uses).
const DEFAULT_ARG_REGS: [&str; 6] = ["DI", "SI", "DX", "CX", "R8", "R9"];

/// x86 flag bits backed by i1 slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flag {
    Cf,
    Zf,
    Sf,
    Of,
    Pf,
}

impl Flag {
    pub(crate) fn slot(self) -> &'static str {
        match self {
            Flag::Cf => "%f.cf",
            Flag::Zf => "%f.zf",
            Flag::Sf => "%f.sf",
            Flag::Of => "%f.of",
            Flag::Pf => "%f.pf",
        }
    }

    const ALL: [Flag; 5] = [Flag::Cf, Flag::Zf, Flag::Sf, Flag::Of, Flag::Pf];
}

/// X register index for `X0`..`X15`.
pub(crate) fn x_reg_index(r: &Reg) -> Option<u8> {
    numbered(r.as_str(), 'X', 15)
}

/// Y register index for `Y0`..`Y15`.
pub(crate) fn y_reg_index(r: &Reg) -> Option<u8> {
    numbered(r.as_str(), 'Y', 15)
}

fn numbered(s: &str, prefix: char, max: u8) -> Option<u8> {
    let rest = s.strip_prefix(prefix)?;
    let n: u8 = rest.parse().ok()?;
    (n <= max).then_some(n)
}

fn is_gp_reg(r: &Reg) -> bool {
    matches!(
        r.as_str(),
        "AX" | "BX" | "CX" | "DX" | "SI" | "DI" | "BP" | "SP"
    ) || numbered(r.as_str(), 'R', 15).map(|n| n >= 8).unwrap_or(false)
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
    x_slots: BTreeSet<Reg>,
    y_slots: BTreeSet<Reg>,

    fp_params: HashMap<i64, FrameSlot>,
    /// (slot, alloca name) in declared order.
    fp_results: Vec<(FrameSlot, String)>,
    use_result_slots: bool,

    /// Translation-time stack backing PUSHQ/POPQ in straight-line stubs.
    vstack: Vec<String>,
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

    fn reg_slot(&self, r: &Reg) -> TranslateResult<String> {
        if self.gp_slots.contains(r) {
            Ok(format!("%r.{r}"))
        } else {
            Err(TranslateError::internal(format!(
                "amd64: no slot for register {r}"
            )))
        }
    }

    /// Load the 64-bit value of a general-purpose register.
    pub fn load_reg(&mut self, r: &Reg) -> TranslateResult<String> {
        let slot = self.reg_slot(r)?;
        let t = self.fresh();
        emit!(self.w, "{t} = load i64, ptr {slot}");
        Ok(t)
    }

    /// Store a 64-bit value into a general-purpose register slot.
    pub fn store_reg(&mut self, r: &Reg, v: &str) -> TranslateResult<()> {
        let slot = self.reg_slot(r)?;
        emit!(self.w, "store i64 {v}, ptr {slot}");
        Ok(())
    }

    pub fn load_flag(&mut self, f: Flag) -> String {
        let t = self.fresh();
        emit!(self.w, "{t} = load i1, ptr {}", f.slot());
        t
    }

    pub fn store_flag(&mut self, f: Flag, v: &str) {
        emit!(self.w, "store i1 {v}, ptr {}", f.slot());
    }

    pub fn not_i1(&mut self, v: &str) -> String {
        let t = self.fresh();
        emit!(self.w, "{t} = xor i1 {v}, true");
        t
    }

    /// Materialize a condition code from the flag slots.
    pub fn cond_value(&mut self, cc: Cc) -> String {
        match cc {
            Cc::Eq => self.load_flag(Flag::Zf),
            Cc::Ne => {
                let z = self.load_flag(Flag::Zf);
                self.not_i1(&z)
            }
            Cc::Carry => self.load_flag(Flag::Cf),
            Cc::NoCarry => {
                let c = self.load_flag(Flag::Cf);
                self.not_i1(&c)
            }
            Cc::BelowEq => {
                let c = self.load_flag(Flag::Cf);
                let z = self.load_flag(Flag::Zf);
                let t = self.fresh();
                emit!(self.w, "{t} = or i1 {c}, {z}");
                t
            }
            Cc::Above => {
                let be = self.cond_value(Cc::BelowEq);
                self.not_i1(&be)
            }
            Cc::Neg => self.load_flag(Flag::Sf),
            Cc::Pos => {
                let s = self.load_flag(Flag::Sf);
                self.not_i1(&s)
            }
            Cc::Lt => {
                let s = self.load_flag(Flag::Sf);
                let o = self.load_flag(Flag::Of);
                let t = self.fresh();
                emit!(self.w, "{t} = xor i1 {s}, {o}");
                t
            }
            Cc::Ge => {
                let lt = self.cond_value(Cc::Lt);
                self.not_i1(&lt)
            }
            Cc::Le => {
                let z = self.load_flag(Flag::Zf);
                let lt = self.cond_value(Cc::Lt);
                let t = self.fresh();
                emit!(self.w, "{t} = or i1 {z}, {lt}");
                t
            }
            Cc::Gt => {
                let le = self.cond_value(Cc::Le);
                self.not_i1(&le)
            }
            Cc::Ov => self.load_flag(Flag::Of),
            Cc::NoOv => {
                let o = self.load_flag(Flag::Of);
                self.not_i1(&o)
            }
            Cc::Par => self.load_flag(Flag::Pf),
            Cc::NoPar => {
                let p = self.load_flag(Flag::Pf);
                self.not_i1(&p)
            }
        }
    }

    /// Define ZF, SF and PF from an integer result. `ty` is the result's
    /// LLVM integer type spelling (`i8`, `i32`, `i64`).
    pub fn set_result_flags(&mut self, v: &str, ty: &str) {
        let zf = self.fresh();
        emit!(self.w, "{zf} = icmp eq {ty} {v}, 0");
        self.store_flag(Flag::Zf, &zf);
        let sf = self.fresh();
        emit!(self.w, "{sf} = icmp slt {ty} {v}, 0");
        self.store_flag(Flag::Sf, &sf);
        let low = if ty == "i8" {
            v.to_string()
        } else {
            let t = self.fresh();
            emit!(self.w, "{t} = trunc {ty} {v} to i8");
            t
        };
        let pop = self.fresh();
        emit!(self.w, "{pop} = call i8 @llvm.ctpop.i8(i8 {low})");
        let bit = self.fresh();
        emit!(self.w, "{bit} = and i8 {pop}, 1");
        let pf = self.fresh();
        emit!(self.w, "{pf} = icmp eq i8 {bit}, 0");
        self.store_flag(Flag::Pf, &pf);
    }

    /// Define OF from addition operands and result (same-sign inputs whose
    /// result sign differs).
    pub fn set_add_overflow(&mut self, ty: &str, a: &str, b: &str, r: &str) {
        let axr = self.fresh();
        emit!(self.w, "{axr} = xor {ty} {a}, {r}");
        let axb = self.fresh();
        emit!(self.w, "{axb} = xor {ty} {a}, {b}");
        let nab = self.fresh();
        emit!(self.w, "{nab} = xor {ty} {axb}, -1");
        let m = self.fresh();
        emit!(self.w, "{m} = and {ty} {axr}, {nab}");
        let of = self.fresh();
        emit!(self.w, "{of} = icmp slt {ty} {m}, 0");
        self.store_flag(Flag::Of, &of);
    }

    /// Define OF from subtraction `r = a - b`.
    pub fn set_sub_overflow(&mut self, ty: &str, a: &str, b: &str, r: &str) {
        let axb = self.fresh();
        emit!(self.w, "{axb} = xor {ty} {a}, {b}");
        let axr = self.fresh();
        emit!(self.w, "{axr} = xor {ty} {a}, {r}");
        let m = self.fresh();
        emit!(self.w, "{m} = and {ty} {axb}, {axr}");
        let of = self.fresh();
        emit!(self.w, "{of} = icmp slt {ty} {m}, 0");
        self.store_flag(Flag::Of, &of);
    }

    pub fn clear_cf_of(&mut self) {
        self.store_flag(Flag::Cf, "false");
        self.store_flag(Flag::Of, "false");
    }

    pub fn push_val(&mut self, v: String) {
        self.vstack.push(v);
    }

    pub fn pop_val(&mut self) -> String {
        self.vstack.pop().unwrap_or_else(|| "0".to_string())
    }

    pub fn fp_param(&self, off: i64) -> Option<&FrameSlot> {
        self.fp_params.get(&off)
    }

    /// Result alloca and slot for an FP offset, if it names a declared result.
    pub fn fp_result(&self, off: i64) -> Option<(&FrameSlot, &str)> {
        self.fp_results
            .iter()
            .find(|(s, _)| s.offset == off)
            .map(|(s, a)| (s, a.as_str()))
    }

    /// Store a value of `val_ty` into the result slot at `off`, casting to
    /// the slot's declared type.
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

    /// Cast between the integer/pointer types used by slot traffic.
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
            Operand::Label(l) => self
                .labels
                .get(&**l)
                .map(|&b| self.blocks[b].name.clone()),
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

    /// Name of the textually next block (conditional fall-through).
    pub fn fallthrough(&self, bi: usize) -> Option<&str> {
        self.blocks.get(bi + 1).map(|b| b.name.as_str())
    }

    fn maybe_annotate(&mut self, ins: &Instr) {
        if self.annotate && !ins.raw.is_empty() {
            emit!(self.w, "; {}", ins.raw);
        }
    }
}

/// Lower one amd64 function to a textual `define`.
pub fn translate_func(
    func: &Func,
    sig: &FuncSig,
    sigs: &HashMap<String, FuncSig>,
    resolve: &dyn Fn(&str) -> String,
    annotate: bool,
    session: &Session<'_>,
) -> TranslateResult<String> {
    debug!("amd64: translating {} ({} instrs)", sig.name, func.instrs.len());
    session.count_function();
    session.count_instructions(func.instrs.len());
    for ins in &func.instrs {
        if matches!(
            Op::parse(&ins.op),
            Op::Lfence
                | Op::Mfence
                | Op::Sfence
                | Op::Pause
                | Op::Prefetchnta
                | Op::Vzeroupper
                | Op::Undef
        ) {
            session.count_elided();
        }
    }

    let (blocks, labels) = split_blocks(&func.instrs, |ins| Op::parse(&ins.op).ends_block());
    trace!("amd64: {}: {} blocks", sig.name, blocks.len());

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
        x_slots: BTreeSet::new(),
        y_slots: BTreeSet::new(),
        fp_params,
        fp_results,
        use_result_slots,
        vstack: Vec::new(),
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
    /// Argument-carrying registers for a signature (ArgRegs override or the
    /// default mapping), truncated to the argument count.
    fn arg_regs_for(sig: &FuncSig) -> Vec<Reg> {
        if !sig.arg_regs.is_empty() {
            return sig.arg_regs.iter().take(sig.args.len()).cloned().collect();
        }
        DEFAULT_ARG_REGS
            .iter()
            .take(sig.args.len())
            .map(|r| Reg::new(r))
            .collect()
    }

    fn touch(&mut self, r: &Reg) {
        if x_reg_index(r).is_some() {
            self.x_slots.insert(r.clone());
        } else if y_reg_index(r).is_some() {
            self.y_slots.insert(r.clone());
        } else if is_gp_reg(r) {
            self.gp_slots.insert(r.clone());
        }
    }

    fn collect_touched(&mut self) {
        self.touch(&Reg::new("AX"));
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
            for r in implicit_regs(&Op::parse(&ins.op)) {
                self.touch(&Reg::new(r));
            }
            // Calls and symbol tail-jumps marshal the callee's argument set.
            if matches!(Op::parse(&ins.op), Op::Call | Op::Jmp) {
                if let Some(Operand::Sym(s)) = ins.args.first() {
                    if let Some(name) = s.strip_suffix("(SB)") {
                        let callee = (self.resolve)(name.trim_start_matches('$').trim());
                        if let Some(csig) = self.sigs.get(&callee) {
                            for r in Self::arg_regs_for(csig) {
                                self.touch(&r);
                            }
                        } else {
                            // Unknown callee defaults to the register ABI.
                            for r in DEFAULT_ARG_REGS {
                                self.touch(&Reg::new(r));
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
                ins.args
                    .iter()
                    .any(|a| matches!(a, Operand::Mem(m) if m.base == "SP"))
            })
    }

    fn emit_entry(&mut self) -> TranslateResult<()> {
        let gp = self.gp_slots.iter().cloned().collect::<Vec<_>>();
        for r in &gp {
            emit!(self.w, "%r.{r} = alloca i64");
            emit!(self.w, "store i64 0, ptr %r.{r}");
        }
        let xs = self.x_slots.iter().cloned().collect::<Vec<_>>();
        for r in &xs {
            emit!(self.w, "%v.{r} = alloca <16 x i8>");
            emit!(self.w, "store <16 x i8> zeroinitializer, ptr %v.{r}");
        }
        let ys = self.y_slots.iter().cloned().collect::<Vec<_>>();
        for r in &ys {
            emit!(self.w, "%v.{r} = alloca <32 x i8>");
            emit!(self.w, "store <32 x i8> zeroinitializer, ptr %v.{r}");
        }
        for f in Flag::ALL {
            emit!(self.w, "{} = alloca i1", f.slot());
            emit!(self.w, "store i1 false, ptr {}", f.slot());
        }

        if self.needs_frame() && self.gp_slots.contains(&Reg::new("SP")) {
            // Local frame for pseudo-SP addressing; locals sit at negative
            // offsets from the seeded value.
            let size = self.func.frame_size.max(0) + 16;
            emit!(self.w, "%frame = alloca [{size} x i8]");
            let base = self.fresh();
            emit!(self.w, "{base} = ptrtoint ptr %frame to i64");
            let top = self.fresh();
            emit!(self.w, "{top} = add i64 {base}, {}", self.func.frame_size.max(0));
            emit!(self.w, "store i64 {top}, ptr %r.SP");
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
            // Every block, including the first, gets a label header; the
            // entry block branches into it.
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
        let op = Op::parse(&ins.op);
        match op {
            Op::Text | Op::Byte | Op::Label | Op::Nop | Op::Pcdata | Op::Funcdata
            | Op::Pcalign | Op::NoLocalPointers | Op::GoArgs | Op::GoResultsInitialized
            | Op::Undef | Op::Lock => return Ok(Flow::Next),
            Op::Lfence | Op::Mfence | Op::Sfence | Op::Pause | Op::Prefetchnta
            | Op::Vzeroupper => {
                // Ordering and prefetch hints do not change SSA-visible values.
                return Ok(Flow::Next);
            }
            Op::Ret => {
                self.lower_ret()?;
                return Ok(Flow::Stop);
            }
            _ => {}
        }

        if let Some(flow) = vec::lower(self, &op, ins)? {
            return Ok(flow);
        }
        if let Some(flow) = data::lower(self, &op, ins)? {
            return Ok(flow);
        }
        if let Some(flow) = arith::lower(self, &op, ins)? {
            return Ok(flow);
        }
        if let Some(flow) = atomic::lower(self, &op, ins)? {
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

    fn lower_ret(&mut self) -> TranslateResult<()> {
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
                let ax = self.load_reg(&Reg::new("AX"))?;
                let cast = self.cast_value(&ax, &LlvmType::I64, &ty)?;
                emit!(self.w, "ret {ty} {cast}");
                Ok(())
            }
        }
    }

    fn lower_ret_zero(&mut self) {
        let ret = self.sig.ret.clone();
        match ret {
            LlvmType::Void => emit!(self.w, "ret void"),
            ty => emit!(self.w, "ret {ty} {}", ty.zero_value()),
        }
    }
}

/// Registers an opcode reads or writes without naming them.
fn implicit_regs(op: &Op) -> &'static [&'static str] {
    match op {
        Op::Mulq | Op::Mull | Op::Imulq | Op::Divl | Op::Divq | Op::Cqo | Op::Cdq => {
            &["AX", "DX"]
        }
        Op::Mulxq => &["DX"],
        Op::Rdtsc => &["AX", "DX"],
        Op::Rdtscp => &["AX", "CX", "DX"],
        Op::Cpuid => &["AX", "BX", "CX", "DX"],
        Op::Xgetbv => &["AX", "CX", "DX"],
        Op::Syscall => &["AX", "DI", "SI", "DX", "R10", "R8", "R9", "CX", "R11"],
        Op::Movsb | Op::Movsq => &["SI", "DI"],
        Op::Stosq => &["DI", "AX"],
        Op::Cmpxchgq | Op::Cmpxchgl => &["AX"],
        Op::Pcmpestri => &["AX", "CX", "DX"],
        Op::Loop => &["CX"],
        _ => &[],
    }
}
