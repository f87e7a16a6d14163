// Module-level pipeline tests: target triple emission, prelude declarations,
// DATA/GLOBL byte-array globals, symbol resolution of middle-dot names,
// multi-result aggregate returns, register-ABI overrides via ArgRegs, and
// the ABI identity round trip of a MOV-args-RET body.

use std::collections::HashMap;

use plan9ll::{
    parse, target_triple, translate, Arch, FrameLayout, FrameSlot, FuncSig, LlvmType, Options,
};

#[test]
fn triple_line_is_emitted_when_configured() {
    let file = parse(Arch::Amd64, "\nTEXT f(SB),NOSPLIT,$0\n\tRET\n").unwrap();
    let mut sigs = HashMap::new();
    sigs.insert(
        "f".to_string(),
        FuncSig {
            name: "f".to_string(),
            args: vec![],
            ret: LlvmType::Void,
            frame: FrameLayout::default(),
            arg_regs: vec![],
            attrs: None,
        },
    );
    let ir = translate(
        &file,
        &Options {
            triple: target_triple("linux", "amd64").map(str::to_string),
            sigs,
            ..Options::default()
        },
    )
    .unwrap();
    assert!(ir.starts_with("target triple = \"x86_64-unknown-linux-gnu\""));
    assert!(ir.contains("declare i64 @syscall"));
    assert!(ir.contains("ret void"));
}

#[test]
fn data_globl_materialize_byte_arrays() {
    let src = r#"
GLOBL shifts<>(SB), RODATA, $16
DATA shifts<>+0(SB)/8, $0x0706050403020100
DATA shifts<>+8(SB)/8, $-1

TEXT f(SB),NOSPLIT,$0
	RET
"#;
    let file = parse(Arch::Amd64, src).unwrap();
    let mut sigs = HashMap::new();
    sigs.insert(
        "f".to_string(),
        FuncSig {
            name: "f".to_string(),
            args: vec![],
            ret: LlvmType::Void,
            frame: FrameLayout::default(),
            arg_regs: vec![],
            attrs: None,
        },
    );
    let ir = translate(
        &file,
        &Options {
            sigs,
            ..Options::default()
        },
    )
    .unwrap();
    // Little-endian byte expansion of both words, as a constant array.
    assert!(ir.contains("constant [16 x i8]"));
    assert!(ir.contains("i8 0, i8 1, i8 2, i8 3, i8 4, i8 5, i8 6, i8 7"));
    assert!(ir.contains("i8 255, i8 255"));
}

#[test]
fn middle_dot_symbols_resolve_to_llvm_names() {
    let src = "
TEXT ·IndexByte(SB),NOSPLIT,$0-16
	MOVQ a+0(FP), AX
	MOVQ AX, ret+8(FP)
	RET
";
    let file = parse(Arch::Amd64, src).unwrap();
    let mut sigs = HashMap::new();
    sigs.insert(
        "IndexByte".to_string(),
        FuncSig {
            name: "IndexByte".to_string(),
            args: vec![LlvmType::I64],
            ret: LlvmType::I64,
            frame: FrameLayout {
                params: vec![FrameSlot::scalar(0, LlvmType::I64, 0)],
                results: vec![FrameSlot::scalar(8, LlvmType::I64, 0)],
            },
            arg_regs: vec![],
            attrs: None,
        },
    );
    let ir = translate(
        &file,
        &Options {
            sigs,
            ..Options::default()
        },
    )
    .unwrap();
    assert!(ir.contains("define i64 @IndexByte"));
}

#[test]
fn aggregate_results_build_the_return_struct() {
    // string-shaped result: {ptr, len} decomposed into two slots.
    let src = "
TEXT pair(SB),NOSPLIT,$0-32
	MOVQ a+0(FP), AX
	MOVQ AX, ret+16(FP)
	MOVQ b+8(FP), BX
	MOVQ BX, ret1+24(FP)
	RET
";
    let file = parse(Arch::Amd64, src).unwrap();
    let ret = LlvmType::Struct(vec![LlvmType::I64, LlvmType::I64]);
    let mut sigs = HashMap::new();
    sigs.insert(
        "pair".to_string(),
        FuncSig {
            name: "pair".to_string(),
            args: vec![LlvmType::I64, LlvmType::I64],
            ret: ret.clone(),
            frame: FrameLayout {
                params: vec![
                    FrameSlot::scalar(0, LlvmType::I64, 0),
                    FrameSlot::scalar(8, LlvmType::I64, 1),
                ],
                results: vec![
                    FrameSlot::scalar(16, LlvmType::I64, 0),
                    FrameSlot::scalar(24, LlvmType::I64, 1),
                ],
            },
            arg_regs: vec![],
            attrs: None,
        },
    );
    let ir = translate(
        &file,
        &Options {
            sigs,
            ..Options::default()
        },
    )
    .unwrap();
    assert!(ir.contains("define { i64, i64 } @pair"));
    assert!(ir.contains("insertvalue { i64, i64 }"));
    assert!(ir.contains("ret { i64, i64 } %"));
}

#[test]
fn arg_regs_override_the_default_abi() {
    let src = "
TEXT swap(SB),NOSPLIT,$0-24
	MOVQ BX, AX
	MOVQ AX, ret+16(FP)
	RET
";
    let file = parse(Arch::Amd64, src).unwrap();
    let mut sigs = HashMap::new();
    sigs.insert(
        "swap".to_string(),
        FuncSig {
            name: "swap".to_string(),
            args: vec![LlvmType::I64, LlvmType::I64],
            ret: LlvmType::I64,
            frame: FrameLayout {
                params: vec![
                    FrameSlot::scalar(0, LlvmType::I64, 0),
                    FrameSlot::scalar(8, LlvmType::I64, 1),
                ],
                results: vec![FrameSlot::scalar(16, LlvmType::I64, 0)],
            },
            arg_regs: vec!["AX".into(), "BX".into()],
            attrs: None,
        },
    );
    let ir = translate(
        &file,
        &Options {
            sigs,
            ..Options::default()
        },
    )
    .unwrap();
    assert!(ir.contains("store i64 %arg0, ptr %r.AX"));
    assert!(ir.contains("store i64 %arg1, ptr %r.BX"));
}

#[test]
fn abi_identity_round_trip_shape() {
    // MOV args; RET returns the argument tuple unchanged through the slots.
    let src = "
TEXT ident(SB),NOSPLIT,$0-16
	MOVQ a+0(FP), AX
	MOVQ AX, ret+8(FP)
	RET
";
    let file = parse(Arch::Amd64, src).unwrap();
    let mut sigs = HashMap::new();
    sigs.insert(
        "ident".to_string(),
        FuncSig {
            name: "ident".to_string(),
            args: vec![LlvmType::I64],
            ret: LlvmType::I64,
            frame: FrameLayout {
                params: vec![FrameSlot::scalar(0, LlvmType::I64, 0)],
                results: vec![FrameSlot::scalar(8, LlvmType::I64, 0)],
            },
            arg_regs: vec![],
            attrs: None,
        },
    );
    let ir = translate(
        &file,
        &Options {
            sigs,
            ..Options::default()
        },
    )
    .unwrap();
    // %arg0 flows into the result slot and back out unmodified.
    assert!(ir.contains("store i64 %arg0, ptr %r.AX"));
    assert!(ir.contains("store i64 %"));
    assert!(ir.contains("ret i64 %"));
    assert!(!ir.contains("undef"));
}

#[test]
fn decomposed_string_params_read_their_fields() {
    // string argument decomposed as {ptr, len}: two FP slots onto one formal.
    let src = "
TEXT strlen(SB),NOSPLIT,$0-24
	MOVQ s_len+8(FP), AX
	MOVQ AX, ret+16(FP)
	RET
";
    let file = parse(Arch::Amd64, src).unwrap();
    let mut sigs = HashMap::new();
    sigs.insert(
        "strlen".to_string(),
        FuncSig {
            name: "strlen".to_string(),
            args: vec![LlvmType::Struct(vec![LlvmType::Ptr, LlvmType::I64])],
            ret: LlvmType::I64,
            frame: FrameLayout {
                params: vec![
                    FrameSlot {
                        offset: 0,
                        ty: LlvmType::Ptr,
                        index: 0,
                        field: 0,
                    },
                    FrameSlot {
                        offset: 8,
                        ty: LlvmType::I64,
                        index: 0,
                        field: 1,
                    },
                ],
                results: vec![FrameSlot::scalar(16, LlvmType::I64, 0)],
            },
            arg_regs: vec![],
            attrs: None,
        },
    );
    let ir = translate(
        &file,
        &Options {
            sigs,
            ..Options::default()
        },
    )
    .unwrap();
    assert!(ir.contains("extractvalue { ptr, i64 } %arg0, 1"));
}
