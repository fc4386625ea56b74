use crate::traps::TrapKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithError {
    #[error("digit buffer allocation failed ({digits} digits requested)")]
    Allocation { digits: usize },
    #[error("exponent overflow")]
    Overflow,
    #[error("exponent underflow")]
    Underflow,
    #[error("division by zero")]
    DivByZero,
    #[error("invalid operation")]
    InvalidOperation,
    #[error("inexact result")]
    Inexact,
    #[error("operand index out of range: {index} (length {len})")]
    IndexRange { index: usize, len: usize },
    #[error("trap {kind:?} raised in `{op}`")]
    Trapped { kind: TrapKind, op: &'static str },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unexpected character {found:?} at position {pos}")]
    UnexpectedChar { pos: usize, found: char },
    #[error("expected digits at position {pos}")]
    MissingDigits { pos: usize },
    #[error("decimal exponent out of range")]
    ExponentRange,
    #[error("non-finite values have no decimal form")]
    NonFinite,
    #[error(transparent)]
    Arith(#[from] ArithError),
}

impl ArithError {
    /// Trap class an error is reported under
    pub fn trap_kind(&self) -> TrapKind {
        match self {
            ArithError::Allocation { .. } => TrapKind::Allocation,
            ArithError::Overflow => TrapKind::Overflow,
            ArithError::Underflow => TrapKind::Underflow,
            ArithError::DivByZero => TrapKind::DivByZero,
            ArithError::InvalidOperation => TrapKind::InvalidOperation,
            ArithError::Inexact => TrapKind::Inexact,
            ArithError::IndexRange { .. } => TrapKind::IndexRange,
            ArithError::Trapped { kind, .. } => *kind,
        }
    }
}
