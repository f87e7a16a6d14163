// This module defines the amd64 opcode universe as a single enum so family
// dispatchers match on typed variants instead of raw mnemonic strings, with a
// wildcard variant carrying anything unrecognized for permissive handling.
// Condition-code families (Jcc, SETcc, CMOVQcc) parse their cc suffix into a
// shared Cc enum that also serves flag materialization, covering both the
// Plan 9 spellings (JHI, JCS, SETEQ) and the Intel aliases the assembler
// accepts (JA, JB, SETE). The table intentionally lists only modeled opcodes;
// everything else lands in Other and is either on the permissive allowlist or
// reported as UnsupportedOpcode.

//! amd64 opcode and condition-code tables.

/// x86 condition codes, named by predicate rather than flag spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cc {
    /// ZF
    Eq,
    /// !ZF
    Ne,
    /// CF (below / carry set)
    Carry,
    /// !CF (above-or-equal / carry clear)
    NoCarry,
    /// CF | ZF (below-or-equal)
    BelowEq,
    /// !(CF | ZF) (above)
    Above,
    /// SF (sign / minus)
    Neg,
    /// !SF (plus)
    Pos,
    /// SF != OF (signed less)
    Lt,
    /// SF == OF (signed greater-or-equal)
    Ge,
    /// ZF | (SF != OF) (signed less-or-equal)
    Le,
    /// !(ZF | (SF != OF)) (signed greater)
    Gt,
    /// OF
    Ov,
    /// !OF
    NoOv,
    /// PF
    Par,
    /// !PF
    NoPar,
}

impl Cc {
    /// Parse a Plan 9 or Intel condition suffix.
    pub fn parse(s: &str) -> Option<Cc> {
        Some(match s {
            "EQ" | "E" | "Z" => Cc::Eq,
            "NE" | "NZ" => Cc::Ne,
            "CS" | "B" | "C" => Cc::Carry,
            "CC" | "AE" | "NC" => Cc::NoCarry,
            "LS" | "BE" => Cc::BelowEq,
            "HI" | "A" => Cc::Above,
            "MI" | "S" => Cc::Neg,
            "PL" | "NS" => Cc::Pos,
            "LT" | "L" => Cc::Lt,
            "GE" => Cc::Ge,
            "LE" => Cc::Le,
            "GT" | "G" => Cc::Gt,
            "OS" | "O" => Cc::Ov,
            "OC" | "NO" => Cc::NoOv,
            "PS" | "P" | "PE" => Cc::Par,
            "PC" | "NP" | "PO" => Cc::NoPar,
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
            /// Conditional jump with its decoded condition.
            Jump(Cc),
            /// SETcc byte materialization.
            Set(Cc),
            /// CMOVQcc conditional move.
            Cmov(Cc),
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
    /// Every amd64 opcode the lowering models.
    pub enum Op {
        // Pseudo-ops and hints.
        Text = "TEXT",
        Byte = "BYTE",
        Label = "LABEL",
        Nop = "NOP",
        Pcdata = "PCDATA",
        Funcdata = "FUNCDATA",
        Pcalign = "PCALIGN",
        NoLocalPointers = "NO_LOCAL_POINTERS",
        GoArgs = "GO_ARGS",
        GoResultsInitialized = "GO_RESULTS_INITIALIZED",
        Undef = "UNDEF",
        Lock = "LOCK",
        Lfence = "LFENCE",
        Mfence = "MFENCE",
        Sfence = "SFENCE",
        Pause = "PAUSE",
        Prefetchnta = "PREFETCHNTA",
        Vzeroupper = "VZEROUPPER",

        // Data movement.
        Movq = "MOVQ",
        Movl = "MOVL",
        Movw = "MOVW",
        Movb = "MOVB",
        Movblzx = "MOVBLZX",
        Movblsx = "MOVBLSX",
        Movwlzx = "MOVWLZX",
        Movwlsx = "MOVWLSX",
        Movbqzx = "MOVBQZX",
        Movbqsx = "MOVBQSX",
        Movwqzx = "MOVWQZX",
        Movwqsx = "MOVWQSX",
        Movlqzx = "MOVLQZX",
        Movlqsx = "MOVLQSX",
        Leaq = "LEAQ",
        Leal = "LEAL",
        Pushq = "PUSHQ",
        Popq = "POPQ",
        Pushfq = "PUSHFQ",
        Popfq = "POPFQ",
        Movsb = "MOVSB",
        Movsq = "MOVSQ",
        Stosq = "STOSQ",
        Xchgq = "XCHGQ",
        Xchgl = "XCHGL",
        Cqo = "CQO",
        Cdq = "CDQ",

        // Integer arithmetic and logic.
        Addq = "ADDQ",
        Subq = "SUBQ",
        Andq = "ANDQ",
        Orq = "ORQ",
        Xorq = "XORQ",
        Addl = "ADDL",
        Subl = "SUBL",
        Andl = "ANDL",
        Orl = "ORL",
        Xorl = "XORL",
        Addb = "ADDB",
        Subb = "SUBB",
        Andb = "ANDB",
        Orb = "ORB",
        Xorb = "XORB",
        Adcq = "ADCQ",
        Sbbq = "SBBQ",
        Adcxq = "ADCXQ",
        Adoxq = "ADOXQ",
        Incq = "INCQ",
        Decq = "DECQ",
        Incl = "INCL",
        Decl = "DECL",
        Negq = "NEGQ",
        Negl = "NEGL",
        Notq = "NOTQ",
        Notl = "NOTL",
        Mulq = "MULQ",
        Mull = "MULL",
        Mulxq = "MULXQ",
        Imulq = "IMULQ",
        Imul3q = "IMUL3Q",
        Divl = "DIVL",
        Divq = "DIVQ",
        Bswapq = "BSWAPQ",
        Bswapl = "BSWAPL",
        Bsfq = "BSFQ",
        Bsrq = "BSRQ",
        Bsfl = "BSFL",
        Bsrl = "BSRL",
        Popcntl = "POPCNTL",
        Popcntq = "POPCNTQ",
        Andnl = "ANDNL",
        Andnq = "ANDNQ",
        Shlq = "SHLQ",
        Shrq = "SHRQ",
        Salq = "SALQ",
        Sarq = "SARQ",
        Shll = "SHLL",
        Shrl = "SHRL",
        Sall = "SALL",
        Sarl = "SARL",
        Rolq = "ROLQ",
        Roll = "ROLL",
        Rorq = "RORQ",
        Rorl = "RORL",
        Rorxq = "RORXQ",
        Rorxl = "RORXL",
        Rcrq = "RCRQ",
        Cmpq = "CMPQ",
        Cmpl = "CMPL",
        Cmpw = "CMPW",
        Cmpb = "CMPB",
        Testq = "TESTQ",
        Testl = "TESTL",
        Testb = "TESTB",

        // Control.
        Jmp = "JMP",
        Call = "CALL",
        Ret = "RET",
        Loop = "LOOP",
        Syscall = "SYSCALL",
        Cpuid = "CPUID",
        Xgetbv = "XGETBV",
        Rdtsc = "RDTSC",
        Rdtscp = "RDTSCP",

        // Atomics.
        Xaddq = "XADDQ",
        Xaddl = "XADDL",
        Cmpxchgq = "CMPXCHGQ",
        Cmpxchgl = "CMPXCHGL",

        // SSE/AVX2/AES/SHA/PCLMUL vector set.
        Movou = "MOVOU",
        Movoa = "MOVOA",
        Movups = "MOVUPS",
        Movaps = "MOVAPS",
        Movo = "MOVO",
        Movd = "MOVD",
        Vmovdqu = "VMOVDQU",
        Vmovdqa = "VMOVDQA",
        Vmovntdq = "VMOVNTDQ",
        Vpcmpeqb = "VPCMPEQB",
        Vpmovmskb = "VPMOVMSKB",
        Vpbroadcastb = "VPBROADCASTB",
        Vpand = "VPAND",
        Vpxor = "VPXOR",
        Vpor = "VPOR",
        Vpaddd = "VPADDD",
        Vpaddq = "VPADDQ",
        Vptest = "VPTEST",
        Vpshufb = "VPSHUFB",
        Vpshufd = "VPSHUFD",
        Vpslld = "VPSLLD",
        Vpsrld = "VPSRLD",
        Vpsllq = "VPSLLQ",
        Vpsrlq = "VPSRLQ",
        Vpslldq = "VPSLLDQ",
        Vpsrldq = "VPSRLDQ",
        Vpalignr = "VPALIGNR",
        Vperm2i128 = "VPERM2I128",
        Vperm2f128 = "VPERM2F128",
        Vinserti128 = "VINSERTI128",
        Vpblendd = "VPBLENDD",
        Pxor = "PXOR",
        Pand = "PAND",
        Pandn = "PANDN",
        Paddd = "PADDD",
        Paddl = "PADDL",
        Psubl = "PSUBL",
        Pclmulqdq = "PCLMULQDQ",
        Pcmpeqb = "PCMPEQB",
        Pcmpeql = "PCMPEQL",
        Pmovmskb = "PMOVMSKB",
        Pshufb = "PSHUFB",
        Psrldq = "PSRLDQ",
        Pslldq = "PSLLDQ",
        Psrlq = "PSRLQ",
        Psrll = "PSRLL",
        Pslll = "PSLLL",
        Psral = "PSRAL",
        Pextrd = "PEXTRD",
        Pextrb = "PEXTRB",
        Pinsrq = "PINSRQ",
        Pinsrd = "PINSRD",
        Pinsrb = "PINSRB",
        Pinsrw = "PINSRW",
        Palignr = "PALIGNR",
        Punpcklbw = "PUNPCKLBW",
        Pshufl = "PSHUFL",
        Pshufd = "PSHUFD",
        Pshufhw = "PSHUFHW",
        Shufps = "SHUFPS",
        Pblendw = "PBLENDW",
        Sha256msg1 = "SHA256MSG1",
        Sha256msg2 = "SHA256MSG2",
        Sha256rnds2 = "SHA256RNDS2",
        Aesenc = "AESENC",
        Aesenclast = "AESENCLAST",
        Aesdec = "AESDEC",
        Aesdeclast = "AESDECLAST",
        Aesimc = "AESIMC",
        Aeskeygenassist = "AESKEYGENASSIST",
        Pcmpestri = "PCMPESTRI",

        // Scalar floating point.
        Movsd = "MOVSD",
        Movss = "MOVSS",
        Addsd = "ADDSD",
        Subsd = "SUBSD",
        Mulsd = "MULSD",
        Divsd = "DIVSD",
        Sqrtsd = "SQRTSD",
        Ucomisd = "UCOMISD",
        Ucomiss = "UCOMISS",
        Cvtsq2sd = "CVTSQ2SD",
        Cvttsd2sq = "CVTTSD2SQ",
        Cvtss2sd = "CVTSS2SD",
        Cvtsd2ss = "CVTSD2SS",
    }
}

impl Op {
    /// Decode an upper-cased mnemonic into the typed opcode space.
    pub fn parse(m: &str) -> Op {
        if let Some(op) = Op::from_table(m) {
            return op;
        }
        if let Some(cc) = m.strip_prefix("CMOVQ").and_then(Cc::parse) {
            return Op::Cmov(cc);
        }
        if let Some(cc) = m.strip_prefix("SET").and_then(Cc::parse) {
            return Op::Set(cc);
        }
        if let Some(cc) = m.strip_prefix("J").and_then(Cc::parse) {
            return Op::Jump(cc);
        }
        Op::Other(m.into())
    }

    /// True when the instruction always ends its basic block.
    pub fn ends_block(&self) -> bool {
        matches!(self, Op::Jmp | Op::Ret | Op::Jump(_) | Op::Loop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_and_cc_parsing() {
        assert_eq!(Op::parse("ADDQ"), Op::Addq);
        assert_eq!(Op::parse("JLE"), Op::Jump(Cc::Le));
        assert_eq!(Op::parse("JB"), Op::Jump(Cc::Carry));
        assert_eq!(Op::parse("SETHI"), Op::Set(Cc::Above));
        assert_eq!(Op::parse("CMOVQCS"), Op::Cmov(Cc::Carry));
        assert!(matches!(Op::parse("FROB"), Op::Other(_)));
    }

    #[test]
    fn jmp_is_not_a_condition() {
        // "MP" must not decode as a cc suffix.
        assert_eq!(Op::parse("JMP"), Op::Jmp);
    }
}
