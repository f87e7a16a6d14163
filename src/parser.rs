// This module is the minimal line-oriented front end that turns Plan 9
// assembly text into the core data model. It understands TEXT/DATA/GLOBL
// directives, label definitions, and instruction lines with the operand
// grammar the lowering backends consume: $imm (decimal/hex), registers
// including arm64 arrangement and lane suffixes (V1.B16, V2.D[0]) and
// shifted forms (R1<<3), d(B)(I*s) memory references, name+off(FP) frame
// slots and their $-prefixed addresses, sym(SB) globals, register lists for
// NEON and LDP/STP pairs, and n(PC) branch targets. Preprocessor directives
// and comments are skipped; macro expansion is out of scope and belongs to
// the external preprocessor. Register-ness of a bare token is decided per
// architecture so the same grammar serves both backends; unknown bare tokens
// become branch labels (or raw identifiers for MRS/MSR system registers).

//! Minimal Plan 9 assembly parser producing the [`crate::core::source`] model.

use crate::core::{
    Arch, DataDef, DataValue, File, Func, GloblDef, Instr, Mem, Operand, Reg, TranslateError,
    TranslateResult,
};

/// Parse one assembly compilation unit for the given architecture.
pub fn parse(arch: Arch, src: &str) -> TranslateResult<File> {
    let mut file = File::new(arch);
    let mut cur: Option<Func> = None;

    for (idx, raw_line) in src.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() || line.starts_with('#') {
            // Blank, or a preprocessor remnant the external preprocessor owns.
            continue;
        }

        let mut rest = line;
        // Label definitions, possibly followed by an instruction on the line.
        while let Some((label, tail)) = split_label(rest) {
            let func = cur.as_mut().ok_or_else(|| parse_err(line_no, "label outside TEXT"))?;
            func.instrs.push(with_source(
                Instr::new("LABEL", vec![Operand::label(label)]),
                raw_line,
                line_no,
            ));
            rest = tail.trim();
            if rest.is_empty() {
                break;
            }
        }
        if rest.is_empty() {
            continue;
        }

        let (op, args_text) = match rest.find(|c: char| c.is_ascii_whitespace()) {
            Some(i) => (&rest[..i], rest[i..].trim()),
            None => (rest, ""),
        };
        let op_upper = op.to_ascii_uppercase();

        match op_upper.as_str() {
            "TEXT" => {
                if let Some(done) = cur.take() {
                    file.funcs.push(done);
                }
                cur = Some(parse_text_directive(args_text, line_no)?);
            }
            "DATA" => file.data.push(parse_data_directive(args_text, line_no)?),
            "GLOBL" => file.globls.push(parse_globl_directive(args_text, line_no)?),
            _ => {
                let func = cur
                    .as_mut()
                    .ok_or_else(|| parse_err(line_no, "instruction outside TEXT"))?;
                let args = split_operands(args_text)
                    .into_iter()
                    .map(|t| parse_operand(arch, &op_upper, t, line_no))
                    .collect::<TranslateResult<Vec<_>>>()?;
                func.instrs
                    .push(with_source(Instr::new(&op_upper, args), raw_line, line_no));
            }
        }
    }
    if let Some(done) = cur.take() {
        file.funcs.push(done);
    }
    Ok(file)
}

fn with_source(mut ins: Instr, raw: &str, line: u32) -> Instr {
    ins.raw = raw.trim().to_string();
    ins.line = line;
    ins
}

fn parse_err(line: u32, reason: impl Into<String>) -> TranslateError {
    TranslateError::Parse {
        line,
        reason: reason.into(),
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Split a leading `ident:` label off a line. Avoids matching `::` or
/// operands; labels start the line and contain no spaces or punctuation
/// besides `_`.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let head = &line[..colon];
    if head.is_empty()
        || !head
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return None;
    }
    Some((head, &line[colon + 1..]))
}

/// `name(SB), NOSPLIT, $frame-args` (flags optional).
fn parse_text_directive(text: &str, line: u32) -> TranslateResult<Func> {
    let parts = split_operands(text);
    let sym_part = parts
        .first()
        .ok_or_else(|| parse_err(line, "TEXT needs a symbol"))?;
    let sym = sym_part
        .strip_suffix("(SB)")
        .ok_or_else(|| parse_err(line, "TEXT symbol must end in (SB)"))?
        .trim()
        .to_string();

    let mut attrs = String::new();
    let mut frame_size = 0i64;
    let mut arg_size = 0i64;
    for part in &parts[1..] {
        if let Some(sizes) = part.strip_prefix('$') {
            let (frame, args) = match sizes.split_once('-') {
                Some((f, a)) => (f, Some(a)),
                None => (sizes, None),
            };
            frame_size = parse_int(frame).unwrap_or(0);
            if let Some(a) = args {
                arg_size = parse_int(a).unwrap_or(0);
            }
        } else {
            if !attrs.is_empty() {
                attrs.push('|');
            }
            attrs.push_str(part);
        }
    }
    Ok(Func {
        sym,
        attrs,
        frame_size,
        arg_size,
        instrs: Vec::new(),
    })
}

/// `sym+off(SB)/width, $value`
fn parse_data_directive(text: &str, line: u32) -> TranslateResult<DataDef> {
    let parts = split_operands(text);
    if parts.len() != 2 {
        return Err(parse_err(line, "DATA expects addr/width, $value"));
    }
    let (addr, width) = parts[0]
        .split_once('/')
        .ok_or_else(|| parse_err(line, "DATA address needs /width"))?;
    let addr = addr
        .strip_suffix("(SB)")
        .ok_or_else(|| parse_err(line, "DATA address must end in (SB)"))?;
    let (sym, offset) = match addr.rfind('+') {
        Some(i) => (
            &addr[..i],
            parse_int(&addr[i + 1..]).ok_or_else(|| parse_err(line, "bad DATA offset"))?,
        ),
        None => (addr, 0),
    };
    let width: u8 = width
        .trim()
        .parse()
        .map_err(|_| parse_err(line, "bad DATA width"))?;

    let value_text = parts[1]
        .strip_prefix('$')
        .ok_or_else(|| parse_err(line, "DATA value must be $-prefixed"))?;
    let value = if let Some(q) = value_text.strip_prefix('"') {
        let body = q.strip_suffix('"').unwrap_or(q);
        DataValue::Bytes(unescape_bytes(body))
    } else if let Some(v) = parse_int(value_text) {
        DataValue::Int(v)
    } else if let Some(sym) = value_text.strip_suffix("(SB)") {
        DataValue::SymAddr(sym.trim().to_string())
    } else {
        return Err(parse_err(line, "unsupported DATA value"));
    };

    Ok(DataDef {
        sym: sym.trim().to_string(),
        offset,
        width,
        value,
    })
}

/// `sym(SB), [flags,] $size`
fn parse_globl_directive(text: &str, line: u32) -> TranslateResult<GloblDef> {
    let parts = split_operands(text);
    if parts.len() < 2 {
        return Err(parse_err(line, "GLOBL expects sym(SB), [flags,] $size"));
    }
    let sym = parts[0]
        .strip_suffix("(SB)")
        .ok_or_else(|| parse_err(line, "GLOBL symbol must end in (SB)"))?
        .trim()
        .to_string();
    let rodata = parts[1..parts.len() - 1].iter().any(|p| *p == "RODATA");
    let size = parts
        .last()
        .and_then(|p| p.strip_prefix('$'))
        .and_then(parse_int)
        .ok_or_else(|| parse_err(line, "GLOBL needs a $size"))?;
    Ok(GloblDef { sym, size, rodata })
}

/// Split an operand list on top-level commas (commas inside `()`/`[]` bind to
/// their operand: register lists, memory index expressions).
fn split_operands(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                let piece = text[start..i].trim();
                if !piece.is_empty() {
                    out.push(piece);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let piece = text[start..].trim();
    if !piece.is_empty() {
        out.push(piece);
    }
    out
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let v = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()? as i64
    } else {
        body.parse::<i64>().ok()?
    };
    Some(if neg { v.wrapping_neg() } else { v })
}

fn unescape_bytes(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.bytes().peekable();
    while let Some(b) = chars.next() {
        if b == b'\\' {
            match chars.next() {
                Some(b'n') => out.push(b'\n'),
                Some(b't') => out.push(b'\t'),
                Some(b'0') => out.push(0),
                Some(other) => out.push(other),
                None => out.push(b'\\'),
            }
        } else {
            out.push(b);
        }
    }
    out
}

fn parse_operand(arch: Arch, op: &str, text: &str, line: u32) -> TranslateResult<Operand> {
    let text = text.trim();

    // Register lists: [V1.B16, V2.B16] or the LDP/STP pair form (R1, R2).
    if text.starts_with('[') && text.ends_with(']') {
        let inner = &text[1..text.len() - 1];
        let regs = inner
            .split(',')
            .map(|r| Reg::new(r.trim()))
            .collect::<Vec<_>>();
        return Ok(Operand::RegList(regs));
    }
    if text.starts_with('(') && text.ends_with(')') && text.contains(',') {
        let inner = &text[1..text.len() - 1];
        let regs = inner
            .split(',')
            .map(|r| Reg::new(r.trim()))
            .collect::<Vec<_>>();
        return Ok(Operand::RegList(regs));
    }

    // Immediates and $-prefixed address forms.
    if let Some(body) = text.strip_prefix('$') {
        if let Some(v) = parse_int(body) {
            return Ok(Operand::Imm(v));
        }
        if body.ends_with("(FP)") {
            let (name, offset) = parse_fp_body(body, line)?;
            return Ok(Operand::FpAddr {
                name: name.into(),
                offset,
            });
        }
        // $sym(SB) or a bare macro constant; evaluators resolve or zero it.
        return Ok(Operand::Sym(text.into()));
    }

    if text.ends_with("(FP)") {
        let (name, offset) = parse_fp_body(text, line)?;
        return Ok(Operand::Fp {
            name: name.into(),
            offset,
        });
    }
    if text.ends_with("(SB)") {
        return Ok(Operand::Sym(text.into()));
    }

    // Memory references d(B)(I*s), (B), n(PC).
    if text.ends_with(')') {
        if let Some(mem) = parse_mem(text) {
            return Ok(Operand::Mem(mem));
        }
    }

    // Bare token: register, system-register identifier, or branch label.
    if is_reg_name(arch, text) {
        return Ok(Operand::Reg(Reg::new(text)));
    }
    if matches!(op, "MRS" | "MSR") {
        return Ok(Operand::Ident(text.into()));
    }
    Ok(Operand::Label(text.into()))
}

fn parse_fp_body(text: &str, line: u32) -> TranslateResult<(String, i64)> {
    let body = text
        .strip_suffix("(FP)")
        .ok_or_else(|| parse_err(line, "expected (FP) suffix"))?;
    match body.rfind(['+', '-']) {
        Some(i) if i > 0 => {
            let off =
                parse_int(&body[i..]).ok_or_else(|| parse_err(line, "bad FP offset"))?;
            Ok((body[..i].to_string(), off))
        }
        _ => {
            // `off(FP)` with no slot name.
            let off = parse_int(body).ok_or_else(|| parse_err(line, "bad FP offset"))?;
            Ok((String::new(), off))
        }
    }
}

/// `disp(Base)`, `(Base)`, `disp(Base)(Index*scale)`, `(Base)(Index*scale)`.
fn parse_mem(text: &str) -> Option<Mem> {
    let open = text.find('(')?;
    let disp = if open == 0 {
        0
    } else {
        parse_int(&text[..open])?
    };
    let rest = &text[open..];
    let close = rest.find(')')?;
    let base = rest[1..close].trim();
    if base.is_empty() || base.contains(',') {
        return None;
    }
    let mut mem = Mem {
        base: Reg::new(base),
        index: None,
        scale: 1,
        disp,
    };
    let tail = &rest[close + 1..];
    if tail.is_empty() {
        return Some(mem);
    }
    let inner = tail.strip_prefix('(')?.strip_suffix(')')?;
    let (index, scale) = match inner.split_once('*') {
        Some((r, s)) => (r.trim(), s.trim().parse::<u8>().ok()?),
        None => (inner.trim(), 1),
    };
    if !matches!(scale, 1 | 2 | 4 | 8) {
        return None;
    }
    mem.index = Some(Reg::new(index));
    mem.scale = scale;
    Some(mem)
}

fn is_reg_name(arch: Arch, s: &str) -> bool {
    match arch {
        Arch::Amd64 => is_amd64_reg(s),
        Arch::Arm64 => is_arm64_reg(s),
    }
}

fn is_amd64_reg(s: &str) -> bool {
    matches!(
        s,
        "AX" | "BX" | "CX" | "DX" | "SI" | "DI" | "BP" | "SP" | "IP"
    ) || numbered(s, "R", 8, 15)
        || numbered(s, "X", 0, 15)
        || numbered(s, "Y", 0, 15)
}

fn is_arm64_reg(s: &str) -> bool {
    if matches!(s, "RSP" | "ZR" | "LR" | "g" | "PC") {
        return true;
    }
    // Shifted/extended register forms keep the register operand kind.
    let base = s
        .split_once("<<")
        .or_else(|| s.split_once(">>"))
        .map(|(b, _)| b)
        .unwrap_or(s);
    // Arrangement / lane suffixes (V1.B16, V2.D[0]).
    let base = base.split_once('.').map(|(b, _)| b).unwrap_or(base);
    numbered(base, "R", 0, 30) || numbered(base, "V", 0, 31) || numbered(base, "F", 0, 31)
}

fn numbered(s: &str, prefix: &str, lo: u32, hi: u32) -> bool {
    s.strip_prefix(prefix)
        .and_then(|n| n.parse::<u32>().ok())
        .map(|n| n >= lo && n <= hi)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_instructions() {
        let src = "
TEXT add2(SB),NOSPLIT,$0-24
	MOVQ a+0(FP), AX
	ADDQ b+8(FP), AX
	MOVQ AX, ret+16(FP)
	RET
";
        let file = parse(Arch::Amd64, src).unwrap();
        assert_eq!(file.funcs.len(), 1);
        let f = &file.funcs[0];
        assert_eq!(f.sym, "add2");
        assert_eq!(f.attrs, "NOSPLIT");
        assert_eq!(f.arg_size, 24);
        assert_eq!(f.instrs.len(), 4);
        assert_eq!(&*f.instrs[0].op, "MOVQ");
        assert_eq!(f.instrs[0].args[0], Operand::fp("a", 0));
        assert_eq!(f.instrs[0].args[1], Operand::reg("AX"));
    }

    #[test]
    fn parses_labels_and_branches() {
        let src = "
TEXT f(SB),NOSPLIT,$0
	JMP done
done:
	RET
";
        let file = parse(Arch::Amd64, src).unwrap();
        let f = &file.funcs[0];
        assert_eq!(&*f.instrs[0].op, "JMP");
        assert_eq!(f.instrs[0].args[0], Operand::label("done"));
        assert_eq!(&*f.instrs[1].op, "LABEL");
    }

    #[test]
    fn parses_memory_operands() {
        let src = "
TEXT f(SB),$0
	MOVQ 16(BX)(CX*8), AX
	MOVQ (DI), AX
	JMP 2(PC)
";
        let file = parse(Arch::Amd64, src).unwrap();
        let f = &file.funcs[0];
        match &f.instrs[0].args[0] {
            Operand::Mem(m) => {
                assert_eq!(m.base, "BX");
                assert_eq!(m.index.as_ref().unwrap(), "CX");
                assert_eq!(m.scale, 8);
                assert_eq!(m.disp, 16);
            }
            other => panic!("expected mem, got {other:?}"),
        }
        match &f.instrs[2].args[0] {
            Operand::Mem(m) => assert_eq!(m.base, "PC"),
            other => panic!("expected PC-relative mem, got {other:?}"),
        }
    }

    #[test]
    fn parses_arm64_lists_and_lanes() {
        let src = "
TEXT f(SB),$0
	VLD1.P (R0), [V1.B16, V2.B16]
	VMOV V1.D[0], R3
	LDP (R0), (R1, R2)
	ADD R1<<3, R2
";
        let file = parse(Arch::Arm64, src).unwrap();
        let f = &file.funcs[0];
        assert!(matches!(&f.instrs[0].args[1], Operand::RegList(v) if v.len() == 2));
        assert_eq!(f.instrs[1].args[0], Operand::reg("V1.D[0]"));
        assert!(matches!(&f.instrs[2].args[1], Operand::RegList(v) if v.len() == 2));
        assert_eq!(f.instrs[3].args[0], Operand::reg("R1<<3"));
        assert!(f.instrs[0].has_suffix(".P"));
    }

    #[test]
    fn parses_data_and_globl() {
        let src = r#"
GLOBL mask<>(SB), RODATA, $16
DATA mask<>+0(SB)/8, $0x00ff00ff00ff00ff
DATA mask<>+8(SB)/8, $-1
"#;
        let file = parse(Arch::Amd64, src).unwrap();
        assert_eq!(file.globls.len(), 1);
        assert!(file.globls[0].rodata);
        assert_eq!(file.data.len(), 2);
        assert_eq!(file.data[1].offset, 8);
        assert!(matches!(file.data[0].value, DataValue::Int(_)));
    }

    #[test]
    fn hex_and_negative_immediates() {
        let src = "
TEXT f(SB),$0
	MOVQ $0x7FFFFFFFFFFFFFFF, AX
	MOVQ $-2, BX
";
        let file = parse(Arch::Amd64, src).unwrap();
        let f = &file.funcs[0];
        assert_eq!(f.instrs[0].args[0], Operand::Imm(i64::MAX));
        assert_eq!(f.instrs[1].args[0], Operand::Imm(-2));
    }
}
