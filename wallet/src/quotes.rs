//! Mint and melt quote lifecycles.
//!
//! A mint quote moves Unpaid → Paid → Issued; a melt quote moves
//! Unpaid → Pending → Paid/Failed. Both are driven by the mint: this
//! module persists every observed state, publishes it on the bus, and
//! enforces the preconditions before committing funds.

use std::collections::HashMap;
use std::sync::Arc;

use pocket_store::{StoreError, WalletDatabase};
use pocket_types::{
    Amount, AmountError, CurrencyUnit, Keyset, MeltOptions, MeltQuote, MeltQuoteState, MintQuote,
    MintQuoteState, Proof, SpendingConditions, SplitTarget, Timestamp, TransactionDirection,
};

use crate::error::WalletError;
use crate::keyset_cache::KeysetCache;
use crate::mint_client::MintConnector;
use crate::proofs::{ProofLedger, Selection, SelectionPolicy};
use crate::secrets::{PreMintBatch, SecretDeriver};
use crate::subscription::SubscriptionBus;
use crate::transactions::TransactionLedger;

/// Drives quote state machines against the mint.
#[derive(Clone)]
pub struct QuoteManager {
    client: Arc<dyn MintConnector>,
    db: Arc<dyn WalletDatabase>,
    proofs: ProofLedger,
    keysets: KeysetCache,
    bus: SubscriptionBus,
    deriver: Arc<SecretDeriver>,
    transactions: TransactionLedger,
}

impl QuoteManager {
    pub fn new(
        client: Arc<dyn MintConnector>,
        db: Arc<dyn WalletDatabase>,
        proofs: ProofLedger,
        keysets: KeysetCache,
        bus: SubscriptionBus,
        deriver: Arc<SecretDeriver>,
        transactions: TransactionLedger,
    ) -> Self {
        Self {
            client,
            db,
            proofs,
            keysets,
            bus,
            deriver,
            transactions,
        }
    }

    // ── mint quotes ─────────────────────────────────────────────────────

    /// Ask the mint for an invoice to fund the wallet. `amount` may be
    /// `None` for an amountless invoice where the payer picks the value.
    pub async fn request_mint_quote(
        &self,
        unit: &CurrencyUnit,
        amount: Option<Amount>,
        description: Option<String>,
    ) -> Result<MintQuote, WalletError> {
        let quote = self.client.post_mint_quote(unit, amount, description).await?;
        self.db.put_mint_quote(&quote)?;
        self.bus.publish_mint_quote(&quote);
        tracing::debug!(id = %quote.id, amount = ?quote.amount, "requested mint quote");
        Ok(quote)
    }

    /// Fetch the quote's current state from the mint, persist and publish it.
    pub async fn poll_mint_quote(&self, quote_id: &str) -> Result<MintQuote, WalletError> {
        let known = self.get_mint_quote(quote_id)?;
        let mut quote = self.client.get_mint_quote(quote_id).await?;
        // The mint does not echo local-only fields.
        quote.unit = known.unit;
        self.db.put_mint_quote(&quote)?;
        self.bus.publish_mint_quote(&quote);
        Ok(quote)
    }

    pub fn get_mint_quote(&self, quote_id: &str) -> Result<MintQuote, WalletError> {
        self.db.get_mint_quote(quote_id).map_err(|err| match err {
            StoreError::NotFound(_) => WalletError::QuoteNotFound(quote_id.to_string()),
            other => other.into(),
        })
    }

    /// Redeem a paid mint quote into fresh proofs.
    pub async fn mint(
        &self,
        quote_id: &str,
        split_target: &SplitTarget,
        conditions: Option<SpendingConditions>,
    ) -> Result<Vec<Proof>, WalletError> {
        let quote = self.get_mint_quote(quote_id)?;
        match quote.state {
            MintQuoteState::Paid => {}
            MintQuoteState::Unpaid => {
                return Err(WalletError::QuoteNotPaid(quote_id.to_string()))
            }
            MintQuoteState::Issued => {
                return Err(WalletError::QuoteAlreadyIssued(quote_id.to_string()))
            }
        }
        if quote.is_expired(Timestamp::now()) {
            return Err(WalletError::QuoteExpired(quote_id.to_string()));
        }
        let amount = match quote.amount {
            Some(amount) => amount,
            // Amountless invoice: the mint may have learned the paid amount
            // after our last poll.
            None => self
                .client
                .get_mint_quote(quote_id)
                .await?
                .amount
                .ok_or_else(|| WalletError::QuoteAmountUnknown(quote_id.to_string()))?,
        };

        let keyset = self.keysets.active_keyset(&quote.unit).await?;
        let amounts = amount.split_targeted(split_target)?;
        let counter = self
            .db
            .increment_keyset_counter(&keyset.id, amounts.len() as u32)?;
        let batch = PreMintBatch::new(&self.deriver, &keyset.id, counter, &amounts);

        let signatures = self
            .client
            .post_mint(quote_id, &batch.blinded_messages())
            .await?;
        let proofs = batch.unblind(signatures, &keyset, &quote.unit, conditions.as_ref())?;

        self.proofs.insert_unspent(proofs.clone())?;

        let mut issued = quote.clone();
        issued.state = MintQuoteState::Issued;
        self.db.put_mint_quote(&issued)?;
        self.bus.publish_mint_quote(&issued);

        self.transactions.record(
            TransactionDirection::Incoming,
            amount,
            Amount::ZERO,
            quote.unit.clone(),
            proofs.iter().map(Proof::id).collect(),
            None,
            HashMap::new(),
        )?;

        tracing::info!(id = %quote.id, %amount, proofs = proofs.len(), "minted proofs");
        Ok(proofs)
    }

    // ── melt quotes ─────────────────────────────────────────────────────

    /// Ask the mint what paying `request` will cost.
    pub async fn request_melt_quote(
        &self,
        request: &str,
        unit: &CurrencyUnit,
        options: Option<MeltOptions>,
    ) -> Result<MeltQuote, WalletError> {
        let quote = self.client.post_melt_quote(request, unit, options).await?;
        self.db.put_melt_quote(&quote)?;
        self.bus.publish_melt_quote(&quote);
        tracing::debug!(id = %quote.id, amount = %quote.amount, fee_reserve = %quote.fee_reserve, "requested melt quote");
        Ok(quote)
    }

    /// Fetch the melt quote's state from the mint and resolve any proofs
    /// still reserved for it: settle on Paid, release on Failed.
    pub async fn poll_melt_quote(&self, quote_id: &str) -> Result<MeltQuote, WalletError> {
        let known = self.get_melt_quote(quote_id)?;
        let mut quote = self.client.get_melt_quote(quote_id).await?;
        quote.unit = known.unit;
        quote.reserved_proofs = known.reserved_proofs;

        if !quote.reserved_proofs.is_empty() {
            match quote.state {
                MeltQuoteState::Paid => {
                    self.settle_melt(&mut quote)?;
                }
                MeltQuoteState::Failed => {
                    self.proofs.release(&quote.reserved_proofs)?;
                    quote.reserved_proofs.clear();
                }
                MeltQuoteState::Unpaid | MeltQuoteState::Pending => {}
            }
        }

        self.db.put_melt_quote(&quote)?;
        self.bus.publish_melt_quote(&quote);
        Ok(quote)
    }

    pub fn get_melt_quote(&self, quote_id: &str) -> Result<MeltQuote, WalletError> {
        self.db.get_melt_quote(quote_id).map_err(|err| match err {
            StoreError::NotFound(_) => WalletError::QuoteNotFound(quote_id.to_string()),
            other => other.into(),
        })
    }

    /// Pay the quoted request with wallet proofs.
    ///
    /// Proofs covering amount + fee_reserve are reserved before the mint is
    /// contacted. When the outcome is ambiguous (transport error, or the
    /// mint reports Pending) the proofs stay reserved and the quote stays
    /// Pending; [`Self::poll_melt_quote`] resolves it later. The wallet
    /// never guesses a payment outcome.
    pub async fn melt(&self, quote_id: &str) -> Result<MeltQuote, WalletError> {
        let mut quote = self.get_melt_quote(quote_id)?;
        match quote.state {
            MeltQuoteState::Unpaid => {}
            MeltQuoteState::Paid => return Ok(quote),
            MeltQuoteState::Pending => {
                return Err(WalletError::InvalidStateTransition(format!(
                    "melt quote {quote_id} is already in flight"
                )))
            }
            MeltQuoteState::Failed => {
                return Err(WalletError::InvalidStateTransition(format!(
                    "melt quote {quote_id} already failed"
                )))
            }
        }
        if quote.is_expired(Timestamp::now()) {
            return Err(WalletError::QuoteExpired(quote_id.to_string()));
        }

        let keyset = self.keysets.active_keyset(&quote.unit).await?;
        let selection = self.reserve_for_melt(&quote, &keyset).await?;

        quote.state = MeltQuoteState::Pending;
        quote.reserved_proofs = selection.ids();
        self.db.put_melt_quote(&quote)?;
        self.bus.publish_melt_quote(&quote);

        let response = match self.client.post_melt(quote_id, &selection.proofs).await {
            Ok(response) => response,
            Err(err) => {
                // Outcome unknown: leave proofs Pending for the next poll.
                tracing::warn!(id = %quote.id, %err, "melt outcome unknown, proofs stay reserved");
                return Err(err);
            }
        };

        match response.state {
            MeltQuoteState::Paid => {
                quote.state = MeltQuoteState::Paid;
                quote.payment_preimage = response.payment_preimage;
                self.settle_melt(&mut quote)?;
            }
            MeltQuoteState::Failed => {
                quote.state = MeltQuoteState::Failed;
                self.proofs.release(&quote.reserved_proofs)?;
                quote.reserved_proofs.clear();
            }
            MeltQuoteState::Pending | MeltQuoteState::Unpaid => {
                // Mint has not settled the payment yet.
                quote.state = MeltQuoteState::Pending;
            }
        }

        self.db.put_melt_quote(&quote)?;
        self.bus.publish_melt_quote(&quote);
        tracing::info!(id = %quote.id, state = ?quote.state, "melt attempted");
        Ok(quote)
    }

    /// Reserve proofs summing exactly to the quote total plus their own
    /// input fee. A melt consumes whatever it is given, so overshoot in the
    /// reserved set would be forfeited; when held denominations cannot
    /// match exactly, swap a covering selection at the mint first and
    /// reserve the fresh exact proofs, keeping the rest as change.
    async fn reserve_for_melt(
        &self,
        quote: &MeltQuote,
        keyset: &Keyset,
    ) -> Result<Selection, WalletError> {
        let policy = SelectionPolicy {
            exact: true,
            include_fee: keyset.input_fee_ppk > 0,
            fee_ppk: keyset.input_fee_ppk,
            ..SelectionPolicy::default()
        };
        match self.proofs.reserve(quote.total(), &quote.unit, policy).await {
            Ok(selection) => Ok(selection),
            Err(WalletError::InsufficientFunds { .. }) => {
                let covering = self
                    .proofs
                    .reserve(
                        quote.total(),
                        &quote.unit,
                        SelectionPolicy {
                            exact: false,
                            ..policy
                        },
                    )
                    .await?;
                self.swap_to_exact(covering, quote.total(), keyset, &quote.unit)
                    .await
            }
            Err(err) => Err(err),
        }
    }

    /// Swap `inputs` at the mint for proofs summing exactly to `target`
    /// (plus their input fee) and change. The inputs are settled, the exact
    /// proofs come back reserved, the change lands unspent.
    async fn swap_to_exact(
        &self,
        inputs: Selection,
        target: Amount,
        keyset: &Keyset,
        unit: &CurrencyUnit,
    ) -> Result<Selection, WalletError> {
        // The exact proofs pay their own input fee, which depends on how
        // many of them the split produces. Iterate until stable.
        let mut exact_total = target;
        let mut exact_amounts = exact_total.split();
        if keyset.input_fee_ppk > 0 {
            for _ in 0..8 {
                let fee = keyset.fee_for(exact_amounts.len());
                let with_fee = target.checked_add(fee).ok_or(AmountError::Overflow)?;
                if with_fee == exact_total {
                    break;
                }
                exact_total = with_fee;
                exact_amounts = exact_total.split();
            }
        }

        let swap_fee = keyset.fee_for(inputs.proofs.len());
        let change_amount = match inputs
            .total
            .checked_sub(exact_total)
            .and_then(|rest| rest.checked_sub(swap_fee))
        {
            Some(change) => change,
            None => {
                self.proofs.release(&inputs.ids())?;
                return Err(WalletError::InsufficientFunds {
                    needed: exact_total.saturating_add(swap_fee),
                    available: inputs.total,
                });
            }
        };
        let change_amounts = change_amount.split();
        let output_count = (exact_amounts.len() + change_amounts.len()) as u32;
        let counter = self.db.increment_keyset_counter(&keyset.id, output_count)?;

        let exact_batch = PreMintBatch::new(&self.deriver, &keyset.id, counter, &exact_amounts);
        let change_batch = PreMintBatch::new(
            &self.deriver,
            &keyset.id,
            counter + exact_amounts.len() as u32,
            &change_amounts,
        );
        let mut outputs = exact_batch.blinded_messages();
        outputs.extend(change_batch.blinded_messages());

        let signatures = match self.client.post_swap(&inputs.proofs, &outputs).await {
            Ok(signatures) => signatures,
            Err(err) => {
                // Swap failed cleanly; the inputs were not consumed.
                self.proofs.release(&inputs.ids())?;
                return Err(err);
            }
        };
        if signatures.len() != outputs.len() {
            self.proofs.release(&inputs.ids())?;
            return Err(WalletError::SignatureVerification(format!(
                "expected {} signatures, got {}",
                outputs.len(),
                signatures.len()
            )));
        }
        let (exact_sigs, change_sigs) = {
            let mut sigs = signatures;
            let change = sigs.split_off(exact_batch.len());
            (sigs, change)
        };
        let exact_proofs = exact_batch.unblind(exact_sigs, keyset, unit, None)?;
        let change_proofs = change_batch.unblind(change_sigs, keyset, unit, None)?;

        self.proofs.settle(&inputs.ids())?;
        self.proofs.insert_pending(exact_proofs.clone())?;
        if !change_proofs.is_empty() {
            self.proofs.insert_unspent(change_proofs)?;
        }
        let fee = exact_total.saturating_sub(target);
        Ok(Selection {
            proofs: exact_proofs,
            total: exact_total,
            fee,
        })
    }

    /// Mark the reserved proofs spent and record the outgoing transaction.
    fn settle_melt(&self, quote: &mut MeltQuote) -> Result<(), WalletError> {
        let ids = std::mem::take(&mut quote.reserved_proofs);
        self.proofs.settle(&ids)?;
        self.transactions.record(
            TransactionDirection::Outgoing,
            quote.amount,
            quote.fee_reserve,
            quote.unit.clone(),
            ids,
            None,
            HashMap::new(),
        )?;
        Ok(())
    }
}
