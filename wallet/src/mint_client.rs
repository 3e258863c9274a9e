//! Mint client — the wallet's view of the mint's HTTP API.
//!
//! The engine depends only on the [`MintConnector`] trait; tests substitute
//! a scriptable fake, production uses [`HttpMintConnector`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use pocket_types::{
    Amount, CurrencyUnit, Keyset, KeysetId, MeltOptions, MeltQuote, MeltQuoteState, MintQuote,
    MintQuoteState, MintUrl, Proof, ProofId, ProofState, Timestamp,
};

use crate::error::WalletError;

// ── Wire types ──────────────────────────────────────────────────────────

/// Descriptive information published by the mint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub motd: Option<String>,
}

/// A blinded secret submitted to the mint for signing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedMessage {
    pub amount: Amount,
    #[serde(rename = "id")]
    pub keyset_id: KeysetId,
    #[serde(rename = "B_")]
    pub blinded_secret: String,
}

/// The mint's signature over a blinded secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    pub amount: Amount,
    #[serde(rename = "id")]
    pub keyset_id: KeysetId,
    #[serde(rename = "C_")]
    pub signature: String,
}

/// Outcome of submitting a melt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltResponse {
    pub state: MeltQuoteState,
    #[serde(default)]
    pub payment_preimage: Option<String>,
}

// ── Connector trait ─────────────────────────────────────────────────────

/// Abstract capability interface to a mint.
///
/// All transport and protocol failures surface as
/// [`WalletError::MintCommunication`].
#[async_trait]
pub trait MintConnector: Send + Sync {
    async fn get_mint_info(&self) -> Result<Option<MintInfo>, WalletError>;

    /// Keysets the mint currently advertises for a unit.
    async fn get_keysets(&self, unit: &CurrencyUnit) -> Result<Vec<Keyset>, WalletError>;

    async fn post_mint_quote(
        &self,
        unit: &CurrencyUnit,
        amount: Option<Amount>,
        description: Option<String>,
    ) -> Result<MintQuote, WalletError>;

    async fn get_mint_quote(&self, quote_id: &str) -> Result<MintQuote, WalletError>;

    async fn post_mint(
        &self,
        quote_id: &str,
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, WalletError>;

    async fn post_melt_quote(
        &self,
        request: &str,
        unit: &CurrencyUnit,
        options: Option<MeltOptions>,
    ) -> Result<MeltQuote, WalletError>;

    async fn get_melt_quote(&self, quote_id: &str) -> Result<MeltQuote, WalletError>;

    async fn post_melt(
        &self,
        quote_id: &str,
        inputs: &[Proof],
    ) -> Result<MeltResponse, WalletError>;

    /// Exchange proofs for fresh blind signatures over `outputs`.
    async fn post_swap(
        &self,
        inputs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, WalletError>;

    /// The mint's view of each proof's spend state, in request order.
    async fn post_check_state(
        &self,
        proof_ids: &[ProofId],
    ) -> Result<Vec<ProofState>, WalletError>;
}

// ── HTTP implementation ─────────────────────────────────────────────────

/// HTTP client for a Cashu mint's v1 REST API.
pub struct HttpMintConnector {
    http: reqwest::Client,
    mint_url: MintUrl,
}

impl HttpMintConnector {
    pub fn new(mint_url: MintUrl) -> Result<Self, WalletError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                WalletError::MintCommunication(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self { http, mint_url })
    }

    pub fn mint_url(&self) -> &MintUrl {
        &self.mint_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, WalletError> {
        let url = self.mint_url.endpoint(path);
        tracing::debug!(%url, "mint GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::MintCommunication(format!("request failed: {e}")))?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, WalletError> {
        let url = self.mint_url.endpoint(path);
        tracing::debug!(%url, "mint POST");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| WalletError::MintCommunication(format!("request failed: {e}")))?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, WalletError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(WalletError::MintCommunication(format!(
                "mint returned HTTP {status}: {detail}"
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| WalletError::MintCommunication(format!("failed to read response: {e}")))?;
        serde_json::from_slice(&body)
            .map_err(|e| WalletError::MintCommunication(format!("invalid JSON response: {e}")))
    }
}

// Wire shapes for the v1 endpoints.

#[derive(Deserialize)]
struct KeysResponse {
    keysets: Vec<WireKeyset>,
}

#[derive(Deserialize)]
struct WireKeyset {
    id: KeysetId,
    unit: CurrencyUnit,
    #[serde(default)]
    keys: BTreeMap<u64, String>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    input_fee_ppk: u64,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct MintQuoteRequest<'a> {
    unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Deserialize)]
struct MintQuoteResponse {
    quote: String,
    request: String,
    #[serde(default)]
    amount: Option<Amount>,
    #[serde(default)]
    unit: Option<CurrencyUnit>,
    state: MintQuoteState,
    #[serde(default)]
    expiry: Option<u64>,
}

#[derive(Serialize)]
struct MintRequest<'a> {
    quote: &'a str,
    outputs: &'a [BlindedMessage],
}

#[derive(Deserialize)]
struct SignaturesResponse {
    signatures: Vec<BlindSignature>,
}

#[derive(Serialize)]
struct MeltQuoteRequest<'a> {
    request: &'a str,
    unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<MeltOptions>,
}

#[derive(Deserialize)]
struct MeltQuoteResponse {
    quote: String,
    #[serde(default)]
    request: Option<String>,
    amount: Amount,
    #[serde(default)]
    fee_reserve: Amount,
    #[serde(default)]
    unit: Option<CurrencyUnit>,
    state: MeltQuoteState,
    #[serde(default)]
    expiry: Option<u64>,
    #[serde(default)]
    payment_preimage: Option<String>,
}

#[derive(Serialize)]
struct MeltRequest<'a> {
    quote: &'a str,
    inputs: &'a [Proof],
}

#[derive(Serialize)]
struct SwapRequest<'a> {
    inputs: &'a [Proof],
    outputs: &'a [BlindedMessage],
}

#[derive(Serialize)]
struct CheckStateRequest {
    #[serde(rename = "Ys")]
    ys: Vec<String>,
}

#[derive(Deserialize)]
struct CheckStateResponse {
    states: Vec<CheckStateEntry>,
}

#[derive(Deserialize)]
struct CheckStateEntry {
    state: ProofState,
}

impl MintQuoteResponse {
    fn into_quote(self, fallback_unit: &CurrencyUnit) -> MintQuote {
        MintQuote {
            id: self.quote,
            amount: self.amount,
            unit: self.unit.unwrap_or_else(|| fallback_unit.clone()),
            request: self.request,
            state: self.state,
            expiry: self.expiry.map(Timestamp::new),
        }
    }
}

impl MeltQuoteResponse {
    fn into_quote(self, fallback_unit: &CurrencyUnit, fallback_request: &str) -> MeltQuote {
        MeltQuote {
            id: self.quote,
            unit: self.unit.unwrap_or_else(|| fallback_unit.clone()),
            request: self.request.unwrap_or_else(|| fallback_request.to_string()),
            amount: self.amount,
            fee_reserve: self.fee_reserve,
            state: self.state,
            expiry: self.expiry.map(Timestamp::new),
            payment_preimage: self.payment_preimage,
            reserved_proofs: vec![],
        }
    }
}

#[async_trait]
impl MintConnector for HttpMintConnector {
    async fn get_mint_info(&self) -> Result<Option<MintInfo>, WalletError> {
        let info: MintInfo = self.get_json("/v1/info").await?;
        Ok(Some(info))
    }

    async fn get_keysets(&self, unit: &CurrencyUnit) -> Result<Vec<Keyset>, WalletError> {
        let response: KeysResponse = self.get_json("/v1/keys").await?;
        Ok(response
            .keysets
            .into_iter()
            .filter(|ks| &ks.unit == unit)
            .map(|ks| Keyset {
                id: ks.id,
                unit: ks.unit,
                keys: ks.keys,
                active: ks.active,
                input_fee_ppk: ks.input_fee_ppk,
            })
            .collect())
    }

    async fn post_mint_quote(
        &self,
        unit: &CurrencyUnit,
        amount: Option<Amount>,
        description: Option<String>,
    ) -> Result<MintQuote, WalletError> {
        let body = MintQuoteRequest {
            unit: unit.to_string(),
            amount,
            description: description.as_deref(),
        };
        let response: MintQuoteResponse = self.post_json("/v1/mint/quote/bolt11", &body).await?;
        Ok(response.into_quote(unit))
    }

    async fn get_mint_quote(&self, quote_id: &str) -> Result<MintQuote, WalletError> {
        let response: MintQuoteResponse = self
            .get_json(&format!("/v1/mint/quote/bolt11/{quote_id}"))
            .await?;
        Ok(response.into_quote(&CurrencyUnit::Sat))
    }

    async fn post_mint(
        &self,
        quote_id: &str,
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, WalletError> {
        let body = MintRequest {
            quote: quote_id,
            outputs,
        };
        let response: SignaturesResponse = self.post_json("/v1/mint/bolt11", &body).await?;
        Ok(response.signatures)
    }

    async fn post_melt_quote(
        &self,
        request: &str,
        unit: &CurrencyUnit,
        options: Option<MeltOptions>,
    ) -> Result<MeltQuote, WalletError> {
        let body = MeltQuoteRequest {
            request,
            unit: unit.to_string(),
            options,
        };
        let response: MeltQuoteResponse = self.post_json("/v1/melt/quote/bolt11", &body).await?;
        Ok(response.into_quote(unit, request))
    }

    async fn get_melt_quote(&self, quote_id: &str) -> Result<MeltQuote, WalletError> {
        let response: MeltQuoteResponse = self
            .get_json(&format!("/v1/melt/quote/bolt11/{quote_id}"))
            .await?;
        Ok(response.into_quote(&CurrencyUnit::Sat, ""))
    }

    async fn post_melt(
        &self,
        quote_id: &str,
        inputs: &[Proof],
    ) -> Result<MeltResponse, WalletError> {
        let body = MeltRequest {
            quote: quote_id,
            inputs,
        };
        self.post_json("/v1/melt/bolt11", &body).await
    }

    async fn post_swap(
        &self,
        inputs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, WalletError> {
        let body = SwapRequest { inputs, outputs };
        let response: SignaturesResponse = self.post_json("/v1/swap", &body).await?;
        Ok(response.signatures)
    }

    async fn post_check_state(
        &self,
        proof_ids: &[ProofId],
    ) -> Result<Vec<ProofState>, WalletError> {
        let body = CheckStateRequest {
            ys: proof_ids.iter().map(ToString::to_string).collect(),
        };
        let response: CheckStateResponse = self.post_json("/v1/checkstate", &body).await?;
        if response.states.len() != proof_ids.len() {
            return Err(WalletError::MintCommunication(format!(
                "checkstate returned {} states for {} proofs",
                response.states.len(),
                proof_ids.len()
            )));
        }
        Ok(response.states.into_iter().map(|s| s.state).collect())
    }
}
