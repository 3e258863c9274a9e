use pocket_store::StoreError;
use pocket_types::{Amount, AmountError, MintUrlError, TokenError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    InvalidMintUrl(#[from] MintUrlError),

    #[error("mint communication error: {0}")]
    MintCommunication(String),

    #[error("blind signatures do not verify against the keyset: {0}")]
    SignatureVerification(String),

    #[error("keyset {0} is not the mint's active keyset")]
    KeysetInactive(String),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("proof already exists in the store")]
    DuplicateProof,

    #[error("quote {0} has not been paid")]
    QuoteNotPaid(String),

    #[error("quote {0} is paid but its settled amount is not known")]
    QuoteAmountUnknown(String),

    #[error("quote {0} has already been issued")]
    QuoteAlreadyIssued(String),

    #[error("quote {0} has expired")]
    QuoteExpired(String),

    #[error("quote not found: {0}")]
    QuoteNotFound(String),

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("transaction cannot be reverted: {0}")]
    TransactionNotRevertible(String),

    #[error("subscription closed")]
    SubscriptionClosed,

    #[error("token does not belong to this wallet: {0}")]
    WrongMint(String),

    #[error(transparent)]
    InvalidToken(#[from] TokenError),

    #[error("cannot satisfy spending conditions: {0}")]
    SpendingConditionsNotMet(String),

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => Self::DuplicateProof,
            StoreError::InvalidTransition { .. } => Self::InvalidStateTransition(err.to_string()),
            other => Self::Store(other),
        }
    }
}
