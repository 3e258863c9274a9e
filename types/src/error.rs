use thiserror::Error;

use crate::amount::Amount;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    #[error("amounts do not sum to the requested total: requested {requested}, got {actual}")]
    AmountMismatch { requested: Amount, actual: Amount },

    #[error("amount arithmetic overflow")]
    Overflow,
}
