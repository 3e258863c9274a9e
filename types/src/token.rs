//! Serialized token format for transporting proofs between wallets.
//!
//! Tokens are JSON wrapped in url-safe base64 with a `cashuA` prefix.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::Amount;
use crate::error::AmountError;
use crate::mint_url::MintUrl;
use crate::proof::Proof;
use crate::unit::CurrencyUnit;

const TOKEN_PREFIX: &str = "cashuA";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token must start with `{TOKEN_PREFIX}`")]
    UnsupportedFormat,

    #[error("token encoding error: {0}")]
    Encoding(String),

    #[error("token carries no proofs")]
    Empty,
}

/// A bundle of proofs redeemable at one mint, serialized for transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub mint: MintUrl,
    pub unit: CurrencyUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub proofs: Vec<Proof>,
}

impl Token {
    pub fn new(
        mint: MintUrl,
        unit: CurrencyUnit,
        memo: Option<String>,
        proofs: Vec<Proof>,
    ) -> Self {
        Self {
            mint,
            unit,
            memo,
            proofs,
        }
    }

    /// Sum of the carried proof amounts.
    pub fn total_amount(&self) -> Result<Amount, AmountError> {
        Amount::try_sum(self.proofs.iter().map(|p| p.amount))
    }

    /// Serialize to the transport string.
    pub fn encode(&self) -> Result<String, TokenError> {
        let json = serde_json::to_vec(self).map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
    }

    /// Parse a transport string back into a token.
    pub fn decode(raw: &str) -> Result<Self, TokenError> {
        let encoded = raw
            .trim()
            .strip_prefix(TOKEN_PREFIX)
            .ok_or(TokenError::UnsupportedFormat)?;
        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        let token: Token =
            serde_json::from_slice(&json).map_err(|e| TokenError::Encoding(e.to_string()))?;
        if token.proofs.is_empty() {
            return Err(TokenError::Empty);
        }
        Ok(token)
    }
}
