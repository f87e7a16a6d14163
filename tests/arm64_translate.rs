// End-to-end arm64 lowering tests: the add-two-64 register/frame-slot round
// trip, CMP+BLE signed comparison, CBZ/TBZ flag-bypassing branches, LDP/STP
// pairs with post-increment, acquire/release and LSE atomics, CRC32
// intrinsics, NEON loads and compares, and the conservative n(PC)
// resolution. Structural block checks mirror the amd64 suite.

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
    let file = parse(Arch::Arm64, src).expect("parse");
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

#[test]
fn add_two_64_through_registers() {
    let ir = translate_one(
        "add2",
        "
TEXT add2(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	MOVD b+8(FP), R1
	ADD R1, R0
	MOVD R0, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("define i64 @add2(i64 %arg0, i64 %arg1)"));
    assert!(ir.contains("store i64 %arg0, ptr %r.R0"));
    assert!(ir.contains("add i64"));
    assert!(ir.contains("%res0 = alloca i64"));
    assert!(ir.contains("ret i64 %"));
}

#[test]
fn cmp_ble_emits_signed_le_predicate() {
    let ir = translate_one(
        "cmpBLE",
        "
TEXT cmpBLE(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	MOVD b+8(FP), R1
	CMP R1, R0
	BLE le
	MOVD $0, R0
	MOVD R0, ret+16(FP)
	RET
le:
	MOVD $1, R0
	MOVD R0, ret+16(FP)
	RET
",
    );
    // CMP records its operands; BLE materializes icmp sle over them.
    assert!(ir.contains("store i64 %"));
    assert!(ir.contains("ptr %cc.lhs"));
    assert!(ir.contains("icmp sle i64"));
    assert!(ir.contains("lbl.le:"));
}

#[test]
fn cbz_and_tbz_bypass_the_flags() {
    let ir = translate_one(
        "bits",
        "
TEXT bits(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	CBZ R0, zero
	TBZ $3, R0, zero
	MOVD $1, R0
	MOVD R0, ret+16(FP)
	RET
zero:
	MOVD $0, R0
	MOVD R0, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("icmp eq i64"));
    assert!(ir.contains("lshr i64"));
    assert!(!ir.contains("%cc.lhs =") || ir.contains("%cc.lhs = alloca"));
    assert!(ir.contains("lbl.zero:"));
}

#[test]
fn ldp_stp_move_pairs_with_post_increment() {
    let ir = translate_one(
        "pairs",
        "
TEXT pairs(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	LDP.P 16(R0), (R1, R2)
	STP (R1, R2), (R0)
	MOVD R1, ret+16(FP)
	RET
",
    );
    // Two loads, two stores, and the base register advanced by 16.
    assert!(ir.matches("load i64, ptr").count() >= 3);
    assert!(ir.contains("add i64"));
    assert!(ir.contains("store i64"));
}

#[test]
fn acquire_release_and_lse_atomics() {
    let ir = translate_one(
        "atom",
        "
TEXT atom(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	MOVD b+8(FP), R1
	LDAR (R0), R2
	STLR R1, (R0)
	LDADDALD R1, (R0), R3
	CASALD R2, (R0), R1
	MOVD R3, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("load atomic i64"));
    assert!(ir.contains("acquire"));
    assert!(ir.contains("store atomic i64"));
    assert!(ir.contains("release"));
    assert!(ir.contains("atomicrmw add ptr"));
    assert!(ir.contains("cmpxchg ptr"));
}

#[test]
fn exclusive_store_clears_its_status_register() {
    let ir = translate_one(
        "llsc",
        "
TEXT llsc(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	MOVD b+8(FP), R1
loop:
	LDAXR (R0), R2
	ADD R1, R2
	STLXR R2, (R0), R3
	CBNZ R3, loop
	MOVD R2, ret+16(FP)
	RET
",
    );
    // Status register forced to zero: the retry loop exits first time.
    assert!(ir.contains("store i64 0, ptr %r.R3"));
    assert!(ir.contains("lbl.loop:"));
}

#[test]
fn crc32_goes_through_aarch64_intrinsics() {
    let ir = translate_one(
        "crc",
        "
TEXT crc(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	MOVD b+8(FP), R1
	CRC32CX R1, R0
	CRC32B R1, R0
	MOVD R0, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("@llvm.aarch64.crc32cx(i32"));
    assert!(ir.contains("@llvm.aarch64.crc32b(i32"));
}

#[test]
fn neon_list_load_and_compare() {
    let ir = translate_one(
        "scan",
        "
TEXT scan(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	VLD1.P (R0), [V1.B16, V2.B16]
	VCMEQ V1.B16, V2.B16, V3.B16
	VMOV V3.D[0], R1
	MOVD R1, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("load <16 x i8>"));
    // Post-increment by the list size.
    assert!(ir.contains("add i64"));
    assert!(ir.contains("icmp eq <16 x i8>"));
    assert!(ir.contains("sext <16 x i1>"));
    assert!(ir.contains("extractelement <2 x i64>"));
}

#[test]
fn bitfield_extracts_mask_and_shift() {
    let ir = translate_one(
        "fields",
        "
TEXT fields(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	UBFX $8, R0, $16, R1
	SBFX $4, R0, $8, R2
	BFI $0, R1, $8, R2
	MOVD R2, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("lshr i64"));
    assert!(ir.contains("and i64"));
    assert!(ir.contains("ashr i64"));
}

#[test]
fn division_guards_the_zero_divisor() {
    let ir = translate_one(
        "quot",
        "
TEXT quot(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	MOVD b+8(FP), R1
	UDIV R1, R0, R2
	SDIV R1, R0, R3
	MOVD R2, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("icmp eq i64"));
    assert!(ir.contains("select i1"));
    assert!(ir.contains("udiv i64"));
    assert!(ir.contains("sdiv i64"));
}

#[test]
fn zr_reads_zero_and_drops_writes() {
    let ir = translate_one(
        "zr",
        "
TEXT zr(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	ADD ZR, R0
	MOVD ZR, R1
	MOVD R0, ret+16(FP)
	RET
",
    );
    // No slot is ever allocated for ZR.
    assert!(!ir.contains("%r.ZR"));
}

#[test]
fn permissive_opcodes_are_elided() {
    let ir = translate_one(
        "hints",
        "
TEXT hints(SB),NOSPLIT,$0-24
	MOVD a+0(FP), R0
	DMB $0x9
	PRFM (R0), PLDL1KEEP
	NOP
	MOVD R0, ret+16(FP)
	RET
",
    );
    assert!(ir.contains("ret i64"));
    assert!(!ir.contains("DMB"));
}

#[test]
fn tail_jump_forwards_matching_signature() {
    let src = "
TEXT outer(SB),NOSPLIT,$0-24
	B inner(SB)
";
    let file = parse(Arch::Arm64, src).unwrap();
    let mut sigs = HashMap::new();
    sigs.insert("outer".to_string(), i64_sig_2in_1out("outer"));
    sigs.insert("inner".to_string(), i64_sig_2in_1out("inner"));
    let ir = translate(
        &file,
        &Options {
            sigs,
            ..Options::default()
        },
    )
    .unwrap();
    // Same shape, no ArgRegs: the caller's own formals pass through.
    assert!(ir.contains("call i64 @inner(i64 %arg0, i64 %arg1)"));
    assert!(ir.contains("ret i64 %"));
}
