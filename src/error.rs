//! Error taxonomy for the rules core.
//!
//! None of these are fatal. `MissingContext` is handed back to the caller,
//! which re-reads state; the other two are logged and gameplay continues.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An operation ran without the question/card/choice it needs.
    #[error("missing context for {op}: {detail}")]
    MissingContext { op: &'static str, detail: String },

    /// A precondition the caller should have enforced was broken.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Effect kind this build does not understand; staged and ignored.
    #[error("unknown effect kind `{0}`")]
    UnknownEffectKind(String),
}

impl EngineError {
    pub fn missing(op: &'static str, detail: impl Into<String>) -> Self {
        Self::MissingContext {
            op,
            detail: detail.into(),
        }
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MissingContext { .. } => "missing_context",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::UnknownEffectKind(_) => "unknown_effect_kind",
        }
    }
}
