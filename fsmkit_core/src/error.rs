use thiserror::Error;

/// Failures of the construction core.
///
/// Only condition key space exhaustion is an error; degenerate machines are
/// repaired in place by the operators instead.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FsmError {
    #[error("not enough key space for a condition space of {conds} conditions: {needed} keys needed, {available} available")]
    KeySpaceExhausted {
        conds: usize,
        needed: u128,
        available: u128,
    },
}

pub type Result<T> = std::result::Result<T, FsmError>;
