//! Error types for the translation core.
//!
//! Using thiserror for more idiomatic error handling. Every variant that
//! originates at an instruction carries the original source text and line
//! number so drivers can report failures against the input file.

use thiserror::Error;

/// Main error type for Plan 9 asm lowering.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("unsupported opcode {op} at line {line}: {source_text}")]
    UnsupportedOpcode {
        op: String,
        line: u32,
        source_text: String,
    },

    #[error("unsupported operand for {op} at line {line}: {source_text}")]
    UnsupportedOperand {
        op: String,
        line: u32,
        source_text: String,
    },

    #[error("unresolved symbol {sym:?}")]
    UnresolvedSymbol { sym: String },

    #[error("unresolved branch target at line {line}: {source_text}")]
    UnresolvedBranch { line: u32, source_text: String },

    #[error("signature mismatch calling {callee}: {reason}")]
    SignatureMismatch { callee: String, reason: String },

    #[error("missing signature for {name:?}")]
    MissingSignature { name: String },

    #[error("parse error at line {line}: {reason}")]
    Parse { line: u32, reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },

    #[error("{func}: {source}")]
    InFunction {
        func: String,
        #[source]
        source: Box<TranslateError>,
    },
}

impl TranslateError {
    /// Wrap an error with the enclosing function symbol for driver reports.
    pub fn in_function(self, func: &str) -> TranslateError {
        TranslateError::InFunction {
            func: func.to_string(),
            source: Box::new(self),
        }
    }

    pub(crate) fn internal(reason: impl Into<String>) -> TranslateError {
        TranslateError::Internal {
            reason: reason.into(),
        }
    }
}

/// Result type alias for translation operations.
pub type TranslateResult<T> = Result<T, TranslateError>;
