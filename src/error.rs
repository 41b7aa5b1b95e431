use thiserror::Error;

#[derive(Debug, Error)]
pub enum LensError {
    #[error(
        "export is missing required column(s): {}; expected `unix_begin`, `unix_end` and `notes`",
        missing.join(", ")
    )]
    Schema { missing: Vec<String> },
    #[error("invalid record on line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },
    #[error("topic classification disabled: {0}")]
    CredentialMissing(String),
    #[error("switched off with --no-classify")]
    ClassifyOptOut,
    #[error("classification oracle failed: {0}")]
    Oracle(String),
}

impl LensError {
    pub fn oracle(reason: impl Into<String>) -> Self {
        Self::Oracle(reason.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnCode {
    MappingIncomplete,
    OracleFailed,
    ClassifyDisabled,
    AuditWriteFailed,
    RowSkipped,
}

impl WarnCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MappingIncomplete => "MAPPING_INCOMPLETE",
            Self::OracleFailed => "ORACLE_FAILED",
            Self::ClassifyDisabled => "CLASSIFY_DISABLED",
            Self::AuditWriteFailed => "AUDIT_WRITE_FAILED",
            Self::RowSkipped => "ROW_SKIPPED",
        }
    }
}
