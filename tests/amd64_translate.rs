// End-to-end amd64 lowering tests against the emitted IR text: the
// add-two-64 frame-slot round trip, the ADDL+JLE and ADDL+JB flag scenarios
// (signed-compound and carry conditions respectively), multi-word ADC carry
// chains, the CPUID/XGETBV inline-asm constraint strings, and structural
// checks that every emitted function has exactly one terminator per block
// and no references to undefined labels.

use std::collections::HashMap;

use plan9ll::{
    parse, translate, Arch, FrameLayout, FrameSlot, FuncSig, LlvmType, Options,
};

fn i64_sig_2in_1out(name: &str) -> FuncSig {
    FuncSig {
        name: name.to_string(),
        args: vec![LlvmType::I64, LlvmType::I64],
        ret: LlvmType::I64,
        frame: FrameLayout {
            params: vec![
                FrameSlot::scalar(0, LlvmType::I64, 0),
                FrameSlot::scalar(8, LlvmType::I64, 1),
            ],
            results: vec![FrameSlot::scalar(16, LlvmType::I64, 0)],
        },
        arg_regs: vec![],
        attrs: None,
    }
}

fn translate_one(name: &str, src: &str) -> String {
    let file = parse(Arch::Amd64, src).expect("parse");
    let mut sigs = HashMap::new();
    sigs.insert(name.to_string(), i64_sig_2in_1out(name));
    translate(
        &file,
        &Options {
            sigs,
            ..Options::default()
        },
    )
    .expect("translate")
}

/// Structural verifier: every block between a label and the next has
/// exactly one terminator, placed last, and all referenced labels exist.
fn check_function_structure(ir: &str) {
    let mut in_func = false;
    let mut defined = Vec::new();
    let mut referenced = Vec::new();
    let mut saw_terminator = false;

    for line in ir.lines() {
        if line.starts_with("define ") {
            in_func = true;
            saw_terminator = false;
            continue;
        }
        if !in_func {
            continue;
        }
        if line == "}" {
            in_func = false;
            continue;
        }
        if let Some(label) = line.strip_suffix(':') {
            if !label.contains(' ') {
                assert!(
                    saw_terminator || defined.is_empty(),
                    "block before {label:?} fell through without a terminator"
                );
                defined.push(label.to_string());
                saw_terminator = false;
                continue;
            }
        }
        let body = line.trim_start();
        if body.starts_with("ret ") || body == "ret void" || body.starts_with("br ") {
            assert!(!saw_terminator, "two terminators in one block: {line:?}");
            saw_terminator = true;
            let mut rest = body;
            while let Some(i) = rest.find("label %") {
                let tail = &rest[i + "label %".len()..];
                let name: String = tail
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_')
                    .collect();
                referenced.push(name);
                rest = tail;
            }
        } else if !body.is_empty() {
            assert!(!saw_terminator, "instruction after terminator: {line:?}");
        }
    }

    for r in referenced {
        assert!(defined.contains(&r), "branch to undefined label {r:?}");
    }
}

#[test]
fn add_two_64_uses_frame_slots() {
    let ir = translate_one(
        "add2",
        "
TEXT add2(SB),NOSPLIT,$0-24
	MOVQ a+0(FP), AX
	ADDQ b+8(FP), AX
	MOVQ AX, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("define i64 @add2(i64 %arg0, i64 %arg1)"));
    // Arguments seed the default register ABI and flow through the AX slot.
    assert!(ir.contains("store i64 %arg0, ptr %r.DI"));
    assert!(ir.contains("store i64 %arg0, ptr %r.AX"));
    // The result slot is written and returned.
    assert!(ir.contains("%res0 = alloca i64"));
    assert!(ir.contains("ptr %res0"));
    assert!(ir.contains("ret i64 %"));
    check_function_structure(&ir);
}

#[test]
fn addl_jle_reads_signed_compound_condition() {
    let ir = translate_one(
        "addlJLE",
        "
TEXT addlJLE(SB),NOSPLIT,$0-24
	MOVL a+0(FP), AX
	ADDL b+8(FP), AX
	JLE le
	MOVQ $0, AX
	MOVQ AX, ret+16(FP)
	RET
le:
	MOVQ $1, AX
	MOVQ AX, ret+16(FP)
	RET
",
    );
    // 32-bit add defines SF and OF; JLE combines ZF with SF != OF.
    assert!(ir.contains("add i32"));
    assert!(ir.contains("icmp slt i32"));
    assert!(ir.contains("xor i1"));
    assert!(ir.contains("br i1"));
    assert!(ir.contains("lbl.le:"));
    check_function_structure(&ir);
}

#[test]
fn addl_jb_reads_the_carry_flag() {
    let ir = translate_one(
        "addlJB",
        "
TEXT addlJB(SB),NOSPLIT,$0-24
	MOVL a+0(FP), AX
	ADDL b+8(FP), AX
	JB carry
	MOVQ $0, AX
	MOVQ AX, ret+16(FP)
	RET
carry:
	MOVQ $1, AX
	MOVQ AX, ret+16(FP)
	RET
",
    );
    // ADD's carry is the unsigned wrap of the 32-bit result.
    assert!(ir.contains("icmp ult i32"));
    assert!(ir.contains("ptr %f.cf"));
    assert!(ir.contains("lbl.carry:"));
    check_function_structure(&ir);
}

#[test]
fn adc_chain_widens_through_i128() {
    let ir = translate_one(
        "add256",
        "
TEXT add256(SB),NOSPLIT,$0-24
	MOVQ a+0(FP), AX
	ADDQ b+8(FP), AX
	ADCQ $0, BX
	ADCQ $0, CX
	ADCXQ DX, BX
	ADOXQ DX, CX
	MOVQ AX, ret+16(FP)
	RET
",
    );
    // Carry-out of each limb goes through unsigned 128-bit arithmetic.
    assert!(ir.contains("zext i64"));
    assert!(ir.contains("add i128"));
    assert!(ir.contains("icmp ugt i128"));
    // ADCX touches CF, ADOX touches OF.
    assert!(ir.contains("ptr %f.cf"));
    assert!(ir.contains("ptr %f.of"));
    check_function_structure(&ir);
}

#[test]
fn cpuid_and_xgetbv_use_hardware_constraints() {
    let ir = translate_one(
        "probe",
        "
TEXT probe(SB),NOSPLIT,$0-24
	MOVL $1, AX
	MOVL $0, CX
	CPUID
	XGETBV
	MOVQ AX, ret+16(FP)
	RET
",
    );
    assert!(ir.contains(
        "\"={ax},={bx},={cx},={dx},{ax},{cx},~{dirflag},~{fpsr},~{flags}\""
    ));
    assert!(ir.contains("\"={ax},={dx},{cx},~{dirflag},~{fpsr},~{flags}\""));
    assert!(ir.contains("asm sideeffect \"cpuid\""));
    assert!(ir.contains("asm sideeffect \"xgetbv\""));
    check_function_structure(&ir);
}

#[test]
fn cmp_reads_operands_left_to_right() {
    let ir = translate_one(
        "cmpjlt",
        "
TEXT cmpjlt(SB),NOSPLIT,$0-24
	MOVQ a+0(FP), AX
	MOVQ b+8(FP), BX
	CMPQ AX, BX
	JLT less
	MOVQ $0, AX
	MOVQ AX, ret+16(FP)
	RET
less:
	MOVQ $1, AX
	MOVQ AX, ret+16(FP)
	RET
",
    );
    // CMP computes a - b, with CF from the unsigned compare.
    assert!(ir.contains("sub i64"));
    assert!(ir.contains("icmp ult i64"));
    check_function_structure(&ir);
}

#[test]
fn vector_ops_lane_split_256_bit_forms() {
    let ir = translate_one(
        "scan",
        "
TEXT scan(SB),NOSPLIT,$0-24
	MOVQ a+0(FP), SI
	VMOVDQU (SI), Y1
	VPCMPEQB Y0, Y1, Y2
	VPMOVMSKB Y2, AX
	MOVQ AX, ret+16(FP)
	RET
",
    );
    // 256-bit PMOVMSKB is emulated by two 128-bit halves.
    let hits = ir.matches("@llvm.x86.sse2.pmovmskb.128").count();
    assert!(hits >= 3, "expected lane-split pmovmskb calls plus declaration, got {hits}");
    assert!(ir.contains("shl i32"));
    assert!(ir.contains("icmp eq <32 x i8>"));
    check_function_structure(&ir);
}

#[test]
fn atomic_ops_lower_to_llvm_atomics() {
    let ir = translate_one(
        "incr",
        "
TEXT incr(SB),NOSPLIT,$0-24
	MOVQ a+0(FP), BX
	MOVQ b+8(FP), AX
	LOCK
	XADDQ AX, (BX)
	MOVQ AX, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("atomicrmw add ptr"));
    assert!(ir.contains("seq_cst"));
    check_function_structure(&ir);
}

#[test]
fn setcc_and_cmov_share_condition_decoding() {
    let ir = translate_one(
        "pick",
        "
TEXT pick(SB),NOSPLIT,$0-24
	MOVQ a+0(FP), AX
	MOVQ b+8(FP), BX
	CMPQ AX, BX
	SETHI CX
	CMOVQCS BX, AX
	MOVQ AX, ret+16(FP)
	RET
",
    );
    // SETHI materializes !(CF|ZF); CMOVQCS selects on CF.
    assert!(ir.contains("select i1"));
    assert!(ir.contains("ptr %f.zf"));
    check_function_structure(&ir);
}

#[test]
fn pc_relative_branches_resolve_conservatively() {
    let ir = translate_one(
        "spin",
        "
TEXT spin(SB),NOSPLIT,$0-24
	MOVQ a+0(FP), AX
	JMP 2(PC)
	MOVQ $0, AX
	MOVQ AX, ret+16(FP)
	RET
",
    );
    // Forward n(PC) goes to the next block.
    assert!(ir.contains("br label %b1"));
    check_function_structure(&ir);
}

#[test]
fn missing_signature_is_reported() {
    let file = parse(Arch::Amd64, "\nTEXT orphan(SB),NOSPLIT,$0\n\tRET\n").unwrap();
    let err = translate(&file, &Options::default()).unwrap_err();
    assert!(err.to_string().contains("missing signature"));
}

#[test]
fn unsupported_opcode_carries_source_line() {
    let file = parse(
        Arch::Amd64,
        "\nTEXT bad(SB),NOSPLIT,$0-24\n\tFNORD AX, BX\n\tRET\n",
    )
    .unwrap();
    let mut sigs = HashMap::new();
    sigs.insert("bad".to_string(), i64_sig_2in_1out("bad"));
    let err = translate(
        &file,
        &Options {
            sigs,
            ..Options::default()
        },
    )
    .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("bad"), "missing function context: {msg}");
    assert!(
        format!("{:#}", source_chain(&err)).contains("FNORD"),
        "missing source text: {err:?}"
    );
}

fn source_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut cur = err.source();
    while let Some(e) = cur {
        out.push_str(": ");
        out.push_str(&e.to_string());
        cur = e.source();
    }
    out
}
