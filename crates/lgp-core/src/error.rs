//! Error kinds for the engine.
//!
//! Configuration/shape errors fail fast before evolution begins. Operator and
//! evaluation errors are recovered per generation by the caller and folded
//! into `Statistics`; this module only defines the error values, not the
//! recovery policy.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LgpError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation {op} expected {expected} argument(s), got {actual}")]
    Arity {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("register {index} is read-only (Constant kind)")]
    RegisterAccess { index: usize },

    #[error("register index {index} out of range (file has {len} registers)")]
    RegisterOutOfRange { index: usize, len: usize },

    #[error("dataset row has {actual} features, expected {expected}")]
    RowShape { expected: usize, actual: usize },

    #[error("generator exhausted after {attempts} attempts")]
    GenerationExhausted { attempts: usize },

    #[error("operator {operator} failed after {attempts} attempts: {reason}")]
    OperatorFailure {
        operator: &'static str,
        attempts: usize,
        reason: String,
    },

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("run cancelled at generation {generation}")]
    Cancelled { generation: usize },
}

pub type Result<T> = std::result::Result<T, LgpError>;
