// Top-level module translation pipeline: given a parsed File and the
// signature table, pick the backend for the file's architecture, write the
// module prelude (target triple, intrinsic declarations, attribute groups),
// materialize DATA/GLOBL entries as byte-array globals, and lower each
// function. A function that fails to lower aborts the whole translation with
// its symbol attached and its partial IR discarded, so downstream parsing
// never sees an ill-formed definition. The optional inkwell integration
// parses the emitted text into an in-memory LLVM module through a memory
// buffer; the caller's context owns the result.

//! Module translation: textual IR pipeline and optional LLVM module parse.

use std::collections::HashMap;

use bumpalo::Bump;
use log::{debug, warn};

use crate::core::{
    llvm_global, Arch, DataValue, File, FuncSig, GloblDef, Session, TranslateError,
    TranslateResult,
};
use crate::{amd64, arm64};

/// Translation options supplied by the driver.
pub struct Options {
    /// LLVM target triple; omitted from the module when unset.
    pub triple: Option<String>,
    /// Signature table keyed by resolved LLVM global name.
    pub sigs: HashMap<String, FuncSig>,
    /// Symbol resolver mapping raw Plan 9 symbols to LLVM global names.
    /// Defaults to middle-dot normalization.
    pub resolver: Option<Box<dyn Fn(&str) -> String>>,
    /// Emit original source lines as IR comments.
    pub annotate_source: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            triple: None,
            sigs: HashMap::new(),
            resolver: None,
            annotate_source: false,
        }
    }
}

/// Default symbol resolution: normalize `·` to `.` and drop the leading
/// package shorthand dot.
pub fn default_resolve(sym: &str) -> String {
    let s = sym.replace('·', ".");
    s.trim_start_matches('.').to_string()
}

/// Translate a parsed file into one textual LLVM IR module.
pub fn translate(file: &File, opts: &Options) -> TranslateResult<String> {
    let mut out = String::new();
    if let Some(triple) = &opts.triple {
        out.push_str(&format!("target triple = \"{triple}\"\n\n"));
    }
    crate::prelude::emit_prelude(&mut out, file.arch);
    emit_globals(&mut out, file);

    let resolve: Box<dyn Fn(&str) -> String + '_> = match &opts.resolver {
        Some(f) => Box::new(|s: &str| f(s)),
        None => Box::new(|s: &str| default_resolve(s)),
    };

    let arena = Bump::new();
    let session = Session::new(&arena);

    for func in &file.funcs {
        let name = resolve(&func.sym);
        let sig = opts
            .sigs
            .get(&name)
            .ok_or_else(|| TranslateError::MissingSignature { name: name.clone() })?;
        let text = match file.arch {
            Arch::Amd64 => amd64::translate_func(
                func,
                sig,
                &opts.sigs,
                &resolve,
                opts.annotate_source,
                &session,
            ),
            Arch::Arm64 => arm64::translate_func(
                func,
                sig,
                &opts.sigs,
                &resolve,
                opts.annotate_source,
                &session,
            ),
        }
        .map_err(|e| e.in_function(&name))?;
        out.push_str(&text);
        out.push('\n');
    }

    let stats = session.stats();
    debug!(
        "translated {} functions, {} instructions ({} elided)",
        stats.functions, stats.instructions, stats.elided
    );
    Ok(out)
}

/// Materialize GLOBL/DATA entries as module-level byte arrays, zero-filled
/// where no DATA entry covers an offset.
fn emit_globals(out: &mut String, file: &File) {
    let mut globls: Vec<GloblDef> = file.globls.clone();
    // DATA without a GLOBL still defines storage; derive its extent.
    for d in &file.data {
        let end = d.offset + d.width as i64;
        match globls.iter_mut().find(|g| g.sym == d.sym) {
            Some(g) => g.size = g.size.max(end),
            None => globls.push(GloblDef {
                sym: d.sym.clone(),
                size: end,
                rodata: true,
            }),
        }
    }

    for g in &globls {
        let mut bytes = vec![0u8; g.size.max(0) as usize];
        for d in file.data.iter().filter(|d| d.sym == g.sym) {
            let start = d.offset.max(0) as usize;
            match &d.value {
                DataValue::Int(v) => {
                    let le = v.to_le_bytes();
                    for i in 0..(d.width as usize).min(8) {
                        if let Some(slot) = bytes.get_mut(start + i) {
                            *slot = le[i];
                        }
                    }
                }
                DataValue::Bytes(bs) => {
                    for (i, b) in bs.iter().enumerate().take(d.width as usize) {
                        if let Some(slot) = bytes.get_mut(start + i) {
                            *slot = *b;
                        }
                    }
                }
                DataValue::SymAddr(sym) => {
                    // Byte arrays cannot hold relocations; leave zeros.
                    warn!("DATA {}+{}: symbol address {sym} not materialized", g.sym, d.offset);
                }
            }
        }
        let elems = bytes
            .iter()
            .map(|b| format!("i8 {b}"))
            .collect::<Vec<_>>()
            .join(", ");
        let kind = if g.rodata { "constant" } else { "global" };
        out.push_str(&format!(
            "{} = {kind} [{} x i8] [{elems}]\n",
            llvm_global(&default_resolve(&g.sym)),
            bytes.len()
        ));
    }
    if !globls.is_empty() {
        out.push('\n');
    }
}

/// Parse the emitted textual IR into an in-memory LLVM module. The context
/// owns the returned module.
#[cfg(feature = "llvm")]
pub fn translate_module<'ctx>(
    file: &File,
    opts: &Options,
    ctx: &'ctx inkwell::context::Context,
) -> TranslateResult<inkwell::module::Module<'ctx>> {
    let ir = translate(file, opts)?;
    let buf = inkwell::memory_buffer::MemoryBuffer::create_from_memory_range_copy(
        ir.as_bytes(),
        "plan9ll",
    );
    ctx.create_module_from_ir(buf)
        .map_err(|e| TranslateError::Internal {
            reason: format!("parse generated ir: {}", e.to_string()),
        })
}
