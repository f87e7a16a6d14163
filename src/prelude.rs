// Module prelude emission: the target-triple table keyed by GOOS/GOARCH and
// the per-architecture declaration blocks (the external @syscall helper, the
// generic LLVM intrinsics the lowerings call, the x86 SSSE3/SSE2/AES/PCLMUL
// intrinsics, the AArch64 CRC32 intrinsics) plus the attribute groups
// signatures may reference to enable optional ISA features. Everything a
// family lowerer may emit a call to must be declared here so the produced
// module is self-contained.

//! Module prelude: target triples, intrinsic declarations, attribute groups.

use crate::core::Arch;

/// Map GOOS/GOARCH onto an LLVM target triple. Unknown combinations yield
/// `None` and the module carries no target line.
pub fn target_triple(goos: &str, goarch: &str) -> Option<&'static str> {
    Some(match (goos, goarch) {
        ("darwin", "amd64") => "x86_64-apple-macosx",
        ("darwin", "arm64") => "arm64-apple-macosx",
        ("darwin", "386") => "i386-apple-macosx",
        ("linux", "amd64") => "x86_64-unknown-linux-gnu",
        ("linux", "arm64") => "aarch64-unknown-linux-gnu",
        ("linux", "386") => "i386-unknown-linux-gnu",
        ("windows", "amd64") => "x86_64-pc-windows-msvc",
        ("windows", "arm64") => "aarch64-pc-windows-msvc",
        ("windows", "386") => "i386-pc-windows-msvc",
        _ => return None,
    })
}

/// Emit the architecture prelude into the module buffer.
pub fn emit_prelude(out: &mut String, arch: Arch) {
    match arch {
        Arch::Amd64 => emit_amd64(out),
        Arch::Arm64 => emit_arm64(out),
    }
}

fn emit_amd64(out: &mut String) {
    out.push_str("declare i64 @syscall(i64, i64, i64, i64, i64, i64, i64)\n");
    out.push_str("declare i8 @llvm.ctpop.i8(i8)\n");
    out.push_str("declare i32 @llvm.ctpop.i32(i32)\n");
    out.push_str("declare i64 @llvm.ctpop.i64(i64)\n");
    out.push_str("declare i32 @llvm.cttz.i32(i32, i1)\n");
    out.push_str("declare i64 @llvm.cttz.i64(i64, i1)\n");
    out.push_str("declare i32 @llvm.ctlz.i32(i32, i1)\n");
    out.push_str("declare i64 @llvm.ctlz.i64(i64, i1)\n");
    out.push_str("declare i32 @llvm.bswap.i32(i32)\n");
    out.push_str("declare i64 @llvm.bswap.i64(i64)\n");
    out.push_str("declare double @llvm.sqrt.f64(double)\n");
    out.push_str("declare <16 x i8> @llvm.x86.ssse3.pshuf.b.128(<16 x i8>, <16 x i8>)\n");
    out.push_str("declare i32 @llvm.x86.sse2.pmovmskb.128(<16 x i8>)\n");
    out.push_str("declare <2 x i64> @llvm.x86.pclmulqdq(<2 x i64>, <2 x i64>, i8)\n");
    out.push_str("declare <2 x i64> @llvm.x86.aesni.aesenc(<2 x i64>, <2 x i64>)\n");
    out.push_str("declare <2 x i64> @llvm.x86.aesni.aesenclast(<2 x i64>, <2 x i64>)\n");
    out.push_str("declare <2 x i64> @llvm.x86.aesni.aesdec(<2 x i64>, <2 x i64>)\n");
    out.push_str("declare <2 x i64> @llvm.x86.aesni.aesdeclast(<2 x i64>, <2 x i64>)\n");
    out.push_str("declare <2 x i64> @llvm.x86.aesni.aesimc(<2 x i64>)\n");
    out.push_str("declare <2 x i64> @llvm.x86.aesni.aeskeygenassist(<2 x i64>, i8)\n");
    out.push('\n');
    // Attribute group referenced by signatures of SIMD fast paths.
    out.push_str(
        "attributes #0 = { \"target-features\"=\"+aes,+ssse3,+sse4.2,+pclmul,+avx,+avx2\" }\n\n",
    );
}

fn emit_arm64(out: &mut String) {
    out.push_str("declare i64 @syscall(i64, i64, i64, i64, i64, i64, i64)\n");
    out.push_str("declare i32 @llvm.bitreverse.i32(i32)\n");
    out.push_str("declare i64 @llvm.bitreverse.i64(i64)\n");
    out.push_str("declare i32 @llvm.ctlz.i32(i32, i1)\n");
    out.push_str("declare i64 @llvm.ctlz.i64(i64, i1)\n");
    out.push_str("declare i32 @llvm.bswap.i32(i32)\n");
    out.push_str("declare i64 @llvm.bswap.i64(i64)\n");
    out.push_str("declare float @llvm.sqrt.f32(float)\n");
    out.push_str("declare double @llvm.sqrt.f64(double)\n");
    // CRC32 and CRC32C intrinsics; B/H forms take the data operand as i32
    // with the low bits used.
    out.push_str("declare i32 @llvm.aarch64.crc32b(i32, i32)\n");
    out.push_str("declare i32 @llvm.aarch64.crc32h(i32, i32)\n");
    out.push_str("declare i32 @llvm.aarch64.crc32w(i32, i32)\n");
    out.push_str("declare i32 @llvm.aarch64.crc32x(i32, i64)\n");
    out.push_str("declare i32 @llvm.aarch64.crc32cb(i32, i32)\n");
    out.push_str("declare i32 @llvm.aarch64.crc32ch(i32, i32)\n");
    out.push_str("declare i32 @llvm.aarch64.crc32cw(i32, i32)\n");
    out.push_str("declare i32 @llvm.aarch64.crc32cx(i32, i64)\n");
    out.push('\n');
    // Attribute group enabling optional ISA features for hash/crc fast
    // paths.
    out.push_str("attributes #0 = { \"target-features\"=\"+crc\" }\n\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triples_cover_the_matrix() {
        assert_eq!(target_triple("linux", "amd64"), Some("x86_64-unknown-linux-gnu"));
        assert_eq!(target_triple("darwin", "arm64"), Some("arm64-apple-macosx"));
        assert_eq!(target_triple("windows", "386"), Some("i386-pc-windows-msvc"));
        assert_eq!(target_triple("plan9", "amd64"), None);
    }

    #[test]
    fn preludes_declare_their_intrinsics() {
        let mut amd = String::new();
        emit_prelude(&mut amd, Arch::Amd64);
        assert!(amd.contains("@llvm.x86.ssse3.pshuf.b.128"));
        assert!(amd.contains("@syscall"));

        let mut arm = String::new();
        emit_prelude(&mut arm, Arch::Arm64);
        assert!(arm.contains("@llvm.aarch64.crc32cx"));
        assert!(arm.contains("+crc"));
    }
}
