// arm64 opcode universe and condition codes. Mnemonic suffixes (.P/.W
// addressing modes, NEON arrangement dots) are stripped by the dispatcher
// before table lookup, so the table holds base mnemonics only. Condition
// codes serve both the Bcc family and the CSEL/CSET conditional data ops;
// parsing accepts the Plan 9 spellings (LO/HS aliases of CC/CS included).
// Macro-expansion remnants and unmodeled crypto/NEON ops are recognized in
// the permissive allowlist rather than the table.

//! arm64 opcode and condition-code tables.

/// AArch64 condition codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    /// Unsigned lower (carry clear).
    Lo,
    /// Unsigned higher-or-same (carry set).
    Hs,
    /// Unsigned higher.
    Hi,
    /// Unsigned lower-or-same.
    Ls,
    Lt,
    Le,
    Gt,
    Ge,
    /// Negative.
    Mi,
    /// Positive-or-zero.
    Pl,
    /// Overflow set.
    Vs,
    /// Overflow clear.
    Vc,
}

impl Cond {
    pub fn parse(s: &str) -> Option<Cond> {
        Some(match s {
            "EQ" => Cond::Eq,
            "NE" => Cond::Ne,
            "LO" | "CC" => Cond::Lo,
            "HS" | "CS" => Cond::Hs,
            "HI" => Cond::Hi,
            "LS" => Cond::Ls,
            "LT" => Cond::Lt,
            "LE" => Cond::Le,
            "GT" => Cond::Gt,
            "GE" => Cond::Ge,
            "MI" => Cond::Mi,
            "PL" => Cond::Pl,
            "VS" => Cond::Vs,
            "VC" => Cond::Vc,
            _ => return None,
        })
    }
}

macro_rules! opcode_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $name {
            $($variant,)+
            /// Conditional branch with its decoded condition.
            Branch(Cond),
            /// Unrecognized mnemonic kept verbatim for permissive handling.
            Other(Box<str>),
        }

        impl $name {
            fn from_table(m: &str) -> Option<$name> {
                match m {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

opcode_table! {
    /// Every arm64 opcode the lowering models.
    pub enum Op {
        Text = "TEXT",
        Byte = "BYTE",
        Label = "LABEL",
        Ret = "RET",
        Mrs = "MRS",
        Svc = "SVC",

        // Data movement.
        Movd = "MOVD",
        Movw = "MOVW",
        Movwu = "MOVWU",
        Movh = "MOVH",
        Movhu = "MOVHU",
        Movb = "MOVB",
        Movbu = "MOVBU",
        Ldp = "LDP",
        Stp = "STP",

        // Integer arithmetic and logic.
        Add = "ADD",
        Adds = "ADDS",
        Addw = "ADDW",
        Sub = "SUB",
        Subs = "SUBS",
        Subw = "SUBW",
        Cmp = "CMP",
        Cmpw = "CMPW",
        Cmn = "CMN",
        Cmnw = "CMNW",
        Neg = "NEG",
        Negs = "NEGS",
        Negw = "NEGW",
        Mul = "MUL",
        Mulw = "MULW",
        Umulh = "UMULH",
        Smulh = "SMULH",
        Madd = "MADD",
        Msub = "MSUB",
        Udiv = "UDIV",
        Udivw = "UDIVW",
        Sdiv = "SDIV",
        Sdivw = "SDIVW",
        And = "AND",
        Ands = "ANDS",
        Andw = "ANDW",
        Orr = "ORR",
        Orrw = "ORRW",
        Eor = "EOR",
        Eorw = "EORW",
        Bic = "BIC",
        Orn = "ORN",
        Eon = "EON",
        Tst = "TST",
        Tstw = "TSTW",
        Lsl = "LSL",
        Lslw = "LSLW",
        Lsr = "LSR",
        Lsrw = "LSRW",
        Asr = "ASR",
        Asrw = "ASRW",
        Ror = "ROR",
        Rorw = "RORW",
        Clz = "CLZ",
        Clzw = "CLZW",
        Rbit = "RBIT",
        Rbitw = "RBITW",
        Rev = "REV",
        Revw = "REVW",
        Rev16 = "REV16",
        Rev32 = "REV32",
        Extr = "EXTR",
        Ubfx = "UBFX",
        Sbfx = "SBFX",
        Ubfiz = "UBFIZ",
        Sbfiz = "SBFIZ",
        Bfi = "BFI",
        Bfxil = "BFXIL",
        Ubfm = "UBFM",
        Sbfm = "SBFM",
        Bfm = "BFM",
        Csel = "CSEL",
        Cset = "CSET",
        Csetm = "CSETM",
        Csinc = "CSINC",
        Crc32b = "CRC32B",
        Crc32h = "CRC32H",
        Crc32w = "CRC32W",
        Crc32x = "CRC32X",
        Crc32cb = "CRC32CB",
        Crc32ch = "CRC32CH",
        Crc32cw = "CRC32CW",
        Crc32cx = "CRC32CX",

        // Branches and calls.
        B = "B",
        Jmp = "JMP",
        Bl = "BL",
        Blr = "BLR",
        Br = "BR",
        Call = "CALL",
        Cbz = "CBZ",
        Cbnz = "CBNZ",
        Cbzw = "CBZW",
        Cbnzw = "CBNZW",
        Tbz = "TBZ",
        Tbnz = "TBNZ",

        // Acquire/release and LSE atomics.
        Ldar = "LDAR",
        Ldarw = "LDARW",
        Ldarb = "LDARB",
        Ldarh = "LDARH",
        Stlr = "STLR",
        Stlrw = "STLRW",
        Stlrb = "STLRB",
        Stlrh = "STLRH",
        Ldaxr = "LDAXR",
        Ldaxrw = "LDAXRW",
        Ldxr = "LDXR",
        Ldxrw = "LDXRW",
        Stlxr = "STLXR",
        Stlxrw = "STLXRW",
        Stxr = "STXR",
        Stxrw = "STXRW",
        Ldaddald = "LDADDALD",
        Ldaddalw = "LDADDALW",
        Swpald = "SWPALD",
        Swpalw = "SWPALW",
        Casald = "CASALD",
        Casalw = "CASALW",

        // NEON subset.
        Vld1 = "VLD1",
        Vst1 = "VST1",
        Vmov = "VMOV",
        Veor = "VEOR",
        Vorr = "VORR",
        Vand = "VAND",
        Vadd = "VADD",
        Vaddp = "VADDP",
        Vuaddlv = "VUADDLV",
        Vcmeq = "VCMEQ",

        // Scalar floating point.
        Fmovs = "FMOVS",
        Fmovd = "FMOVD",
        Fadds = "FADDS",
        Faddd = "FADDD",
        Fsubs = "FSUBS",
        Fsubd = "FSUBD",
        Fmuls = "FMULS",
        Fmuld = "FMULD",
        Fdivs = "FDIVS",
        Fdivd = "FDIVD",
        Fcmps = "FCMPS",
        Fcmpd = "FCMPD",
        Fsqrts = "FSQRTS",
        Fsqrtd = "FSQRTD",
        Fcvtsd = "FCVTSD",
        Fcvtds = "FCVTDS",
        Fcvtzsd = "FCVTZSD",
        Scvtfd = "SCVTFD",
    }
}

/// Opcodes accepted and silently elided: hints, macro remnants, and
/// crypto/NEON placeholders with no SSA-visible modeling. Extensions to this
/// list are deliberate decisions, not defaults.
const PERMISSIVE: &[&str] = &[
    "PCALIGN",
    "NO_LOCAL_POINTERS",
    "PCDATA",
    "FUNCDATA",
    "GO_ARGS",
    "GO_RESULTS_INITIALIZED",
    "WORD",
    "DMB",
    "DSB",
    "ISB",
    "PRFM",
    "BREAK",
    "BRK",
    "UNDEF",
    "#UNDEF",
    "YIELD",
    "NOP",
    "SEVL",
    "WFE",
    "HINT",
    "FLDPD",
    "FSTPD",
    "STY",
    "P256ADDINLINE",
    "P256MULBY2INLINE",
    "MOV",
    "CCMP",
    "#IFDEF",
    "#ELSE",
    "#ENDIF",
    // Crypto and NEON ops kept permissive for forward progress; these are
    // placeholders, not semantic approximations.
    "AESE",
    "AESD",
    "AESMC",
    "AESIMC",
    "SHA1C",
    "SHA1H",
    "SHA1M",
    "SHA1P",
    "SHA1SU0",
    "SHA1SU1",
    "SHA256H",
    "SHA256H2",
    "SHA256SU0",
    "SHA256SU1",
    "SHA512H",
    "SHA512H2",
    "SHA512SU0",
    "SHA512SU1",
    "VPMULL",
    "VPMULL2",
    "VREV32",
    "VREV64",
    "VSHL",
    "VSRI",
    "VTBL",
    "VZIP1",
    "VZIP2",
    "VEXT",
    "VUSHR",
    "VLD1R",
    "VLD4R",
    "VDUP",
];

const PERMISSIVE_PREFIXES: &[&str] = &[
    "SAVE_R19_TO_R28(",
    "RESTORE_R19_TO_R28(",
    "SAVE_F8_TO_F15(",
    "RESTORE_F8_TO_F15(",
];

impl Op {
    /// Decode a base mnemonic (suffixes already stripped).
    pub fn parse(m: &str) -> Op {
        if let Some(op) = Op::from_table(m) {
            return op;
        }
        if let Some(cond) = m.strip_prefix('B').and_then(Cond::parse) {
            return Op::Branch(cond);
        }
        Op::Other(m.into())
    }

    /// Whether a raw mnemonic is on the permissive elision allowlist.
    pub fn is_permissive(raw: &str) -> bool {
        PERMISSIVE.contains(&raw)
            || PERMISSIVE_PREFIXES.iter().any(|p| raw.starts_with(p))
    }

    /// True when the instruction always ends its basic block.
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Op::Ret
                | Op::B
                | Op::Jmp
                | Op::Br
                | Op::Branch(_)
                | Op::Cbz
                | Op::Cbnz
                | Op::Cbzw
                | Op::Cbnzw
                | Op::Tbz
                | Op::Tbnz
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_and_cond_parsing() {
        assert_eq!(Op::parse("ADD"), Op::Add);
        assert_eq!(Op::parse("BLE"), Op::Branch(Cond::Le));
        assert_eq!(Op::parse("BCC"), Op::Branch(Cond::Lo));
        assert_eq!(Op::parse("BL"), Op::Bl);
        assert_eq!(Op::parse("B"), Op::B);
        assert!(matches!(Op::parse("FROB"), Op::Other(_)));
    }

    #[test]
    fn permissive_covers_macro_forms() {
        assert!(Op::is_permissive("SAVE_R19_TO_R28(8*0)"));
        assert!(Op::is_permissive("DMB"));
        assert!(!Op::is_permissive("ADD"));
    }
}
