//! Nullable mint — a scriptable in-process mint for testing.
//!
//! Implements the wallet's mint connector without any networking. Tests
//! script payment outcomes (`pay_mint_quote`, `set_melt_behavior`,
//! `resolve_melt`) and assert on call counters.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use pocket_types::{
    Amount, CurrencyUnit, Keyset, KeysetId, MeltOptions, MeltQuote, MeltQuoteState, MintQuote,
    MintQuoteState, Proof, ProofId, ProofState,
};
use pocket_wallet::error::WalletError;
use pocket_wallet::mint_client::{
    BlindSignature, BlindedMessage, MeltResponse, MintConnector, MintInfo,
};

/// What the mint does when asked to pay a melt quote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MeltBehavior {
    /// Settle the payment immediately.
    #[default]
    Pay,
    /// Reject the payment cleanly.
    Fail,
    /// Accept the request but leave the payment in flight.
    Pending,
    /// Drop the request mid-flight, leaving the outcome unknown.
    TransportError,
}

#[derive(Default)]
struct State {
    mint_quotes: HashMap<String, MintQuote>,
    melt_quotes: HashMap<String, MeltQuote>,
    invoices: HashMap<String, (Amount, Amount)>,
    spent_secrets: HashSet<String>,
    spent_ids: HashSet<ProofId>,
    melt_behavior: MeltBehavior,
    unresponsive: bool,
    next_quote: u64,
    keyset_fetches: u64,
    swap_calls: u64,
}

/// A test mint that signs anything structurally valid.
pub struct NullMint {
    keyset: Keyset,
    state: Mutex<State>,
}

impl NullMint {
    pub fn new(unit: CurrencyUnit) -> Self {
        Self::with_fee(unit, 0)
    }

    /// A mint whose keyset charges `fee_ppk` per thousand inputs.
    pub fn with_fee(unit: CurrencyUnit, fee_ppk: u64) -> Self {
        let keys: BTreeMap<u64, String> = (0..32)
            .map(|i| (1u64 << i, format!("02mintkey{i:02}")))
            .collect();
        Self {
            keyset: Keyset {
                id: KeysetId::new("00null0000000000"),
                unit,
                keys,
                active: true,
                input_fee_ppk: fee_ppk,
            },
            state: Mutex::new(State::default()),
        }
    }

    pub fn keyset_id(&self) -> &KeysetId {
        &self.keyset.id
    }

    // ── scripting ───────────────────────────────────────────────────────

    /// Simulate the payer settling a mint quote's invoice. For amountless
    /// quotes `paid_amount` supplies the value the payer chose.
    pub fn pay_mint_quote(&self, quote_id: &str, paid_amount: Option<Amount>) {
        let mut state = self.state.lock().unwrap();
        if let Some(quote) = state.mint_quotes.get_mut(quote_id) {
            quote.state = MintQuoteState::Paid;
            if quote.amount.is_none() {
                quote.amount = paid_amount;
            }
        }
    }

    /// Register a payable invoice with its amount and fee reserve.
    pub fn register_invoice(&self, request: &str, amount: Amount, fee_reserve: Amount) {
        self.state
            .lock()
            .unwrap()
            .invoices
            .insert(request.to_string(), (amount, fee_reserve));
    }

    pub fn set_melt_behavior(&self, behavior: MeltBehavior) {
        self.state.lock().unwrap().melt_behavior = behavior;
    }

    /// Settle an in-flight melt out of band; the wallet observes the new
    /// state on its next poll.
    pub fn resolve_melt(&self, quote_id: &str, outcome: MeltQuoteState) {
        let mut state = self.state.lock().unwrap();
        if let Some(quote) = state.melt_quotes.get_mut(quote_id) {
            quote.state = outcome;
            if outcome == MeltQuoteState::Paid {
                quote.payment_preimage = Some(format!("preimage-{quote_id}"));
            }
        }
    }

    /// When unresponsive every call fails with a transport error.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.state.lock().unwrap().unresponsive = unresponsive;
    }

    // ── assertions ──────────────────────────────────────────────────────

    pub fn keyset_fetch_count(&self) -> u64 {
        self.state.lock().unwrap().keyset_fetches
    }

    pub fn swap_call_count(&self) -> u64 {
        self.state.lock().unwrap().swap_calls
    }

    // ── internals ───────────────────────────────────────────────────────

    fn check_responsive(state: &State) -> Result<(), WalletError> {
        if state.unresponsive {
            Err(WalletError::MintCommunication("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn next_quote_id(state: &mut State, prefix: &str) -> String {
        state.next_quote += 1;
        format!("{prefix}-{}", state.next_quote)
    }

    fn sign(&self, output: &BlindedMessage) -> BlindSignature {
        let mut hasher = Sha256::new();
        hasher.update(output.blinded_secret.as_bytes());
        hasher.update(output.keyset_id.as_str().as_bytes());
        BlindSignature {
            amount: output.amount,
            keyset_id: output.keyset_id.clone(),
            signature: format!("03{}", hex::encode(hasher.finalize())),
        }
    }

    /// Consume inputs, rejecting any proof spent before.
    fn consume_inputs(state: &mut State, inputs: &[Proof]) -> Result<Amount, WalletError> {
        for proof in inputs {
            if state.spent_secrets.contains(&proof.secret) {
                return Err(WalletError::MintCommunication(format!(
                    "proof already spent: {}",
                    proof.id()
                )));
            }
        }
        for proof in inputs {
            state.spent_secrets.insert(proof.secret.clone());
            state.spent_ids.insert(proof.id());
        }
        Ok(Amount::try_sum(inputs.iter().map(|p| p.amount))
            .map_err(|e| WalletError::MintCommunication(e.to_string()))?)
    }
}

#[async_trait]
impl MintConnector for NullMint {
    async fn get_mint_info(&self) -> Result<Option<MintInfo>, WalletError> {
        let state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        Ok(Some(MintInfo {
            name: Some("null mint".into()),
            version: Some("0.0.0".into()),
            description: None,
            motd: None,
        }))
    }

    async fn get_keysets(&self, unit: &CurrencyUnit) -> Result<Vec<Keyset>, WalletError> {
        let mut state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        state.keyset_fetches += 1;
        if *unit == self.keyset.unit {
            Ok(vec![self.keyset.clone()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn post_mint_quote(
        &self,
        unit: &CurrencyUnit,
        amount: Option<Amount>,
        _description: Option<String>,
    ) -> Result<MintQuote, WalletError> {
        let mut state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        let id = Self::next_quote_id(&mut state, "mq");
        let quote = MintQuote {
            id: id.clone(),
            amount,
            unit: unit.clone(),
            request: format!("lnbc-invoice-{id}"),
            state: MintQuoteState::Unpaid,
            expiry: None,
        };
        state.mint_quotes.insert(id, quote.clone());
        Ok(quote)
    }

    async fn get_mint_quote(&self, quote_id: &str) -> Result<MintQuote, WalletError> {
        let state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        state
            .mint_quotes
            .get(quote_id)
            .cloned()
            .ok_or_else(|| WalletError::MintCommunication(format!("unknown quote {quote_id}")))
    }

    async fn post_mint(
        &self,
        quote_id: &str,
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, WalletError> {
        let mut state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        let quote = state
            .mint_quotes
            .get(quote_id)
            .cloned()
            .ok_or_else(|| WalletError::MintCommunication(format!("unknown quote {quote_id}")))?;
        if quote.state != MintQuoteState::Paid {
            return Err(WalletError::MintCommunication(format!(
                "quote {quote_id} not paid"
            )));
        }
        let requested = Amount::try_sum(outputs.iter().map(|o| o.amount))
            .map_err(|e| WalletError::MintCommunication(e.to_string()))?;
        if Some(requested) != quote.amount {
            return Err(WalletError::MintCommunication(format!(
                "outputs total {requested} does not match quote"
            )));
        }
        if let Some(q) = state.mint_quotes.get_mut(quote_id) {
            q.state = MintQuoteState::Issued;
        }
        Ok(outputs.iter().map(|o| self.sign(o)).collect())
    }

    async fn post_melt_quote(
        &self,
        request: &str,
        unit: &CurrencyUnit,
        options: Option<MeltOptions>,
    ) -> Result<MeltQuote, WalletError> {
        let mut state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        let (amount, fee_reserve) = match (state.invoices.get(request).copied(), options) {
            (_, Some(MeltOptions::Amountless { amount_msat })) => {
                (Amount::new(amount_msat.value() / 1000), Amount::ZERO)
            }
            (_, Some(MeltOptions::Mpp { amount })) => (amount, Amount::ZERO),
            (Some(pair), None) => pair,
            (None, None) => {
                return Err(WalletError::MintCommunication(format!(
                    "unknown invoice {request}"
                )))
            }
        };
        let id = Self::next_quote_id(&mut state, "melt");
        let quote = MeltQuote {
            id: id.clone(),
            unit: unit.clone(),
            request: request.to_string(),
            amount,
            fee_reserve,
            state: MeltQuoteState::Unpaid,
            expiry: None,
            payment_preimage: None,
            reserved_proofs: Vec::new(),
        };
        state.melt_quotes.insert(id, quote.clone());
        Ok(quote)
    }

    async fn get_melt_quote(&self, quote_id: &str) -> Result<MeltQuote, WalletError> {
        let state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        state
            .melt_quotes
            .get(quote_id)
            .cloned()
            .ok_or_else(|| WalletError::MintCommunication(format!("unknown quote {quote_id}")))
    }

    async fn post_melt(
        &self,
        quote_id: &str,
        inputs: &[Proof],
    ) -> Result<MeltResponse, WalletError> {
        let mut state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        let quote = state
            .melt_quotes
            .get(quote_id)
            .cloned()
            .ok_or_else(|| WalletError::MintCommunication(format!("unknown quote {quote_id}")))?;
        let provided = Amount::try_sum(inputs.iter().map(|p| p.amount))
            .map_err(|e| WalletError::MintCommunication(e.to_string()))?;
        if provided < quote.total() {
            return Err(WalletError::MintCommunication(format!(
                "inputs {provided} below quote total {}",
                quote.total()
            )));
        }

        match state.melt_behavior {
            MeltBehavior::Pay => {
                Self::consume_inputs(&mut state, inputs)?;
                if let Some(q) = state.melt_quotes.get_mut(quote_id) {
                    q.state = MeltQuoteState::Paid;
                    q.payment_preimage = Some(format!("preimage-{quote_id}"));
                }
                Ok(MeltResponse {
                    state: MeltQuoteState::Paid,
                    payment_preimage: Some(format!("preimage-{quote_id}")),
                })
            }
            MeltBehavior::Fail => {
                if let Some(q) = state.melt_quotes.get_mut(quote_id) {
                    q.state = MeltQuoteState::Failed;
                }
                Ok(MeltResponse {
                    state: MeltQuoteState::Failed,
                    payment_preimage: None,
                })
            }
            MeltBehavior::Pending => {
                Self::consume_inputs(&mut state, inputs)?;
                if let Some(q) = state.melt_quotes.get_mut(quote_id) {
                    q.state = MeltQuoteState::Pending;
                }
                Ok(MeltResponse {
                    state: MeltQuoteState::Pending,
                    payment_preimage: None,
                })
            }
            MeltBehavior::TransportError => {
                // The payment may or may not have gone through.
                Self::consume_inputs(&mut state, inputs)?;
                if let Some(q) = state.melt_quotes.get_mut(quote_id) {
                    q.state = MeltQuoteState::Pending;
                }
                Err(WalletError::MintCommunication(
                    "connection reset mid-request".into(),
                ))
            }
        }
    }

    async fn post_swap(
        &self,
        inputs: &[Proof],
        outputs: &[BlindedMessage],
    ) -> Result<Vec<BlindSignature>, WalletError> {
        let mut state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        state.swap_calls += 1;
        let input_total = Self::consume_inputs(&mut state, inputs)?;
        let output_total = Amount::try_sum(outputs.iter().map(|o| o.amount))
            .map_err(|e| WalletError::MintCommunication(e.to_string()))?;
        let fee = self.keyset.fee_for(inputs.len());
        if output_total + fee > input_total {
            return Err(WalletError::MintCommunication(format!(
                "outputs {output_total} plus fee {fee} exceed inputs {input_total}"
            )));
        }
        Ok(outputs.iter().map(|o| self.sign(o)).collect())
    }

    async fn post_check_state(
        &self,
        proof_ids: &[ProofId],
    ) -> Result<Vec<ProofState>, WalletError> {
        let state = self.state.lock().unwrap();
        Self::check_responsive(&state)?;
        Ok(proof_ids
            .iter()
            .map(|id| {
                if state.spent_ids.contains(id) {
                    ProofState::Spent
                } else {
                    ProofState::Unspent
                }
            })
            .collect())
    }
}
