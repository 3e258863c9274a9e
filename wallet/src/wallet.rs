//! The wallet facade tying the engine together.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use pocket_store::WalletDatabase;
use pocket_types::{
    Amount, CurrencyUnit, MeltOptions, MeltQuote, MintQuote, MintUrl, Proof, ProofId, ProofState,
    SpendingConditions, SplitTarget, Token, Transaction, TransactionDirection, TransactionId,
    Witness,
};

use crate::error::WalletError;
use crate::keyset_cache::KeysetCache;
use crate::mint_client::{HttpMintConnector, MintConnector, MintInfo};
use crate::proofs::{ProofLedger, SelectionPolicy};
use crate::quotes::QuoteManager;
use crate::secrets::{PreMintBatch, SecretDeriver};
use crate::subscription::{ActiveSubscription, SubscribeParams, SubscriptionBus};
use crate::transactions::TransactionLedger;

const SUBSCRIPTION_CAPACITY: usize = 256;

/// Tunables for a wallet instance.
#[derive(Clone, Debug, Default)]
pub struct WalletConfig {
    /// Shape minted and received proofs toward this many denominations so
    /// later sends need fewer swaps.
    pub target_proof_count: Option<usize>,
}

/// A memo attached to an outgoing token.
#[derive(Clone, Debug)]
pub struct SendMemo {
    pub memo: String,
    /// Embed the memo in the token itself, not just the local record.
    pub include_in_token: bool,
}

/// How a send is allowed to obtain the requested amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendKind {
    /// Swap through the mint if held denominations cannot match exactly.
    #[default]
    OnlineExact,
    /// Like [`SendKind::OnlineExact`], but accept overpaying by up to the
    /// tolerance instead of swapping.
    OnlineTolerant(Amount),
    /// Existing denominations only; fail unless an exact subset exists.
    OfflineExact,
    /// Existing denominations only; overpay by up to the tolerance.
    OfflineTolerant(Amount),
}

impl SendKind {
    fn is_online(&self) -> bool {
        matches!(self, Self::OnlineExact | Self::OnlineTolerant(_))
    }

    fn tolerance(&self) -> Option<Amount> {
        match self {
            Self::OnlineTolerant(t) | Self::OfflineTolerant(t) => Some(*t),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    pub memo: Option<SendMemo>,
    /// Lock the sent proofs to a receiver. Requires an online send.
    pub conditions: Option<SpendingConditions>,
    pub amount_split_target: SplitTarget,
    pub send_kind: SendKind,
    /// Cover the mint's input fee so the receiver nets the full amount.
    pub include_fee: bool,
    pub max_proofs: Option<usize>,
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, Debug, Default)]
pub struct ReceiveOptions {
    pub amount_split_target: SplitTarget,
    /// Keys able to sign for P2PK-locked proofs in the token.
    pub p2pk_signing_keys: Vec<String>,
    /// Preimages for HTLC-locked proofs in the token.
    pub preimages: Vec<String>,
    pub metadata: HashMap<String, String>,
}

/// A single-mint, single-unit ecash wallet.
#[derive(Clone)]
pub struct Wallet {
    mint_url: MintUrl,
    unit: CurrencyUnit,
    config: WalletConfig,
    client: Arc<dyn MintConnector>,
    db: Arc<dyn WalletDatabase>,
    proofs: ProofLedger,
    keysets: KeysetCache,
    quotes: QuoteManager,
    transactions: TransactionLedger,
    bus: SubscriptionBus,
    deriver: Arc<SecretDeriver>,
}

impl Wallet {
    /// Open a wallet against `mint_url`, deriving secrets from `mnemonic`.
    pub fn new(
        mint_url: MintUrl,
        unit: CurrencyUnit,
        mnemonic: &str,
        db: Arc<dyn WalletDatabase>,
        config: WalletConfig,
    ) -> Result<Self, WalletError> {
        let client = Arc::new(HttpMintConnector::new(mint_url.clone())?);
        Self::with_connector(mint_url, unit, mnemonic, db, config, client)
    }

    /// Open a wallet over an arbitrary connector. Tests inject fakes here.
    pub fn with_connector(
        mint_url: MintUrl,
        unit: CurrencyUnit,
        mnemonic: &str,
        db: Arc<dyn WalletDatabase>,
        config: WalletConfig,
        client: Arc<dyn MintConnector>,
    ) -> Result<Self, WalletError> {
        let deriver = Arc::new(SecretDeriver::from_mnemonic(mnemonic)?);
        let bus = SubscriptionBus::new(SUBSCRIPTION_CAPACITY);
        let proofs = ProofLedger::new(db.clone(), bus.clone());
        let keysets = KeysetCache::new(client.clone(), db.clone());
        let transactions = TransactionLedger::new(db.clone(), proofs.clone());
        let quotes = QuoteManager::new(
            client.clone(),
            db.clone(),
            proofs.clone(),
            keysets.clone(),
            bus.clone(),
            deriver.clone(),
            transactions.clone(),
        );
        Ok(Self {
            mint_url,
            unit,
            config,
            client,
            db,
            proofs,
            keysets,
            quotes,
            transactions,
            bus,
            deriver,
        })
    }

    pub fn mint_url(&self) -> &MintUrl {
        &self.mint_url
    }

    pub fn unit(&self) -> &CurrencyUnit {
        &self.unit
    }

    pub async fn get_mint_info(&self) -> Result<Option<MintInfo>, WalletError> {
        self.client.get_mint_info().await
    }

    // ── balances and proofs ─────────────────────────────────────────────

    /// Sum of unspent proofs.
    pub fn balance(&self) -> Result<Amount, WalletError> {
        self.proofs.balance(&self.unit)
    }

    pub fn get_proofs_by_states(
        &self,
        states: &[ProofState],
    ) -> Result<Vec<(Proof, ProofState)>, WalletError> {
        self.proofs.get_by_states(Some(&self.unit), states)
    }

    /// Reconcile orphaned `Pending` proofs with the mint's view of them.
    ///
    /// A crash or cancellation between reserving proofs and learning the
    /// outcome of a swap can strand them `Pending` with nothing referencing
    /// them. Proofs reserved for an in-flight melt or backing an outgoing
    /// token are left alone; for the rest, the mint is asked which were
    /// actually spent. Spent ones are settled, the others return to the
    /// balance. Returns the amount released.
    pub async fn reclaim_pending(&self) -> Result<Amount, WalletError> {
        let referenced: HashSet<ProofId> = self
            .db
            .get_melt_quotes()?
            .into_iter()
            .flat_map(|q| q.reserved_proofs)
            .chain(
                self.transactions
                    .list(Some(TransactionDirection::Outgoing))?
                    .into_iter()
                    .flat_map(|tx| tx.proof_ids),
            )
            .collect();

        let orphaned: Vec<Proof> = self
            .proofs
            .get_by_states(Some(&self.unit), &[ProofState::Pending])?
            .into_iter()
            .map(|(p, _)| p)
            .filter(|p| !referenced.contains(&p.id()))
            .collect();
        if orphaned.is_empty() {
            return Ok(Amount::ZERO);
        }

        let ids: Vec<ProofId> = orphaned.iter().map(Proof::id).collect();
        let states = self.client.post_check_state(&ids).await?;

        let mut to_release = Vec::new();
        let mut to_settle = Vec::new();
        let mut released = Amount::ZERO;
        for ((proof, id), state) in orphaned.iter().zip(&ids).zip(states) {
            if state == ProofState::Spent {
                to_settle.push(*id);
            } else {
                released = released
                    .checked_add(proof.amount)
                    .ok_or(pocket_types::AmountError::Overflow)?;
                to_release.push(*id);
            }
        }
        if !to_settle.is_empty() {
            self.proofs.settle(&to_settle)?;
        }
        if !to_release.is_empty() {
            self.proofs.release(&to_release)?;
        }
        tracing::info!(
            %released,
            settled = to_settle.len(),
            "reclaimed orphaned pending proofs"
        );
        Ok(released)
    }

    // ── quotes ──────────────────────────────────────────────────────────

    pub async fn mint_quote(
        &self,
        amount: Option<Amount>,
        description: Option<String>,
    ) -> Result<MintQuote, WalletError> {
        self.quotes
            .request_mint_quote(&self.unit, amount, description)
            .await
    }

    pub async fn poll_mint_quote(&self, quote_id: &str) -> Result<MintQuote, WalletError> {
        self.quotes.poll_mint_quote(quote_id).await
    }

    pub async fn melt_quote(
        &self,
        request: &str,
        options: Option<MeltOptions>,
    ) -> Result<MeltQuote, WalletError> {
        self.quotes
            .request_melt_quote(request, &self.unit, options)
            .await
    }

    pub async fn poll_melt_quote(&self, quote_id: &str) -> Result<MeltQuote, WalletError> {
        self.quotes.poll_melt_quote(quote_id).await
    }

    /// Redeem a paid mint quote into proofs, shaped by the split target.
    pub async fn mint(
        &self,
        quote_id: &str,
        split_target: SplitTarget,
        conditions: Option<SpendingConditions>,
    ) -> Result<Vec<Proof>, WalletError> {
        let quote = self.quotes.get_mint_quote(quote_id)?;
        let target = if split_target == SplitTarget::None {
            match quote.amount {
                Some(amount) => self.shaped_target(amount),
                None => split_target,
            }
        } else {
            split_target
        };
        self.quotes.mint(quote_id, &target, conditions).await
    }

    pub async fn melt(&self, quote_id: &str) -> Result<MeltQuote, WalletError> {
        self.quotes.melt(quote_id).await
    }

    // ── send / receive ──────────────────────────────────────────────────

    /// Prepare a token paying `amount` to its bearer.
    ///
    /// The proofs backing the token move to `Pending` and stay there until
    /// the receiver redeems them or the transaction is reverted.
    pub async fn send(&self, amount: Amount, opts: SendOptions) -> Result<Token, WalletError> {
        if opts.conditions.is_some() && !opts.send_kind.is_online() {
            return Err(WalletError::SpendingConditionsNotMet(
                "spending conditions require an online send".into(),
            ));
        }

        let keyset = self.keysets.active_keyset(&self.unit).await?;
        let exact_policy = SelectionPolicy {
            exact: opts.send_kind.tolerance().is_none(),
            tolerance: opts.send_kind.tolerance(),
            include_fee: opts.include_fee,
            fee_ppk: keyset.input_fee_ppk,
            max_proofs: opts.max_proofs,
        };

        // Held denominations first; a swap only when allowed and needed.
        let send_proofs = if opts.conditions.is_none() {
            match self.proofs.reserve(amount, &self.unit, exact_policy).await {
                Ok(selection) => Some(selection.proofs),
                Err(WalletError::InsufficientFunds { .. }) if opts.send_kind.is_online() => None,
                Err(err) => return Err(err),
            }
        } else {
            None
        };

        let send_proofs = match send_proofs {
            Some(proofs) => proofs,
            None => self.swap_for_send(amount, &opts).await?,
        };

        let fee = Amount::try_sum(send_proofs.iter().map(|p| p.amount))?.saturating_sub(amount);
        let tx = self.transactions.record(
            TransactionDirection::Outgoing,
            amount,
            fee,
            self.unit.clone(),
            send_proofs.iter().map(Proof::id).collect(),
            opts.memo.as_ref().map(|m| m.memo.clone()),
            opts.metadata.clone(),
        )?;
        tracing::info!(tx = %tx.id, %amount, proofs = send_proofs.len(), "prepared send");

        Ok(Token {
            mint: self.mint_url.clone(),
            unit: self.unit.clone(),
            memo: opts
                .memo
                .filter(|m| m.include_in_token)
                .map(|m| m.memo),
            proofs: send_proofs,
        })
    }

    /// Swap reserved inputs at the mint for exact send proofs plus change.
    /// Inputs are settled, send proofs land `Pending`, change lands
    /// `Unspent`.
    async fn swap_for_send(
        &self,
        amount: Amount,
        opts: &SendOptions,
    ) -> Result<Vec<Proof>, WalletError> {
        let keyset = self.keysets.active_keyset(&self.unit).await?;

        // With include_fee the token also carries the receiver's redemption
        // fee, which depends on the output count, which depends on the
        // amount. Iterate until the split is stable.
        let mut send_total = amount;
        let mut send_amounts = send_total.split_targeted(&opts.amount_split_target)?;
        if opts.include_fee {
            // The split can only grow a bounded number of times.
            for _ in 0..8 {
                let receiver_fee = keyset.fee_for(send_amounts.len());
                let with_fee = amount
                    .checked_add(receiver_fee)
                    .ok_or(pocket_types::AmountError::Overflow)?;
                if with_fee == send_total {
                    break;
                }
                send_total = with_fee;
                send_amounts = send_total.split_targeted(&opts.amount_split_target)?;
            }
        }

        let selection = self
            .proofs
            .reserve(
                send_total,
                &self.unit,
                SelectionPolicy {
                    include_fee: true,
                    fee_ppk: keyset.input_fee_ppk,
                    max_proofs: opts.max_proofs,
                    ..SelectionPolicy::default()
                },
            )
            .await?;

        let swap_fee = keyset.fee_for(selection.proofs.len());
        let change_amount = selection
            .total
            .saturating_sub(send_total)
            .saturating_sub(swap_fee);
        let change_amounts = change_amount.split();
        let output_count = (send_amounts.len() + change_amounts.len()) as u32;
        let counter = self.db.increment_keyset_counter(&keyset.id, output_count)?;

        let send_batch = PreMintBatch::new(&self.deriver, &keyset.id, counter, &send_amounts);
        let change_batch = PreMintBatch::new(
            &self.deriver,
            &keyset.id,
            counter + send_amounts.len() as u32,
            &change_amounts,
        );

        let mut outputs = send_batch.blinded_messages();
        outputs.extend(change_batch.blinded_messages());

        let signatures = match self.client.post_swap(&selection.proofs, &outputs).await {
            Ok(signatures) => signatures,
            Err(err) => {
                // Swap failed cleanly; the inputs were not consumed.
                self.proofs.release(&selection.ids())?;
                return Err(err);
            }
        };
        if signatures.len() != outputs.len() {
            self.proofs.release(&selection.ids())?;
            return Err(WalletError::SignatureVerification(format!(
                "expected {} signatures, got {}",
                outputs.len(),
                signatures.len()
            )));
        }
        let (send_sigs, change_sigs) = {
            let mut sigs = signatures;
            let change = sigs.split_off(send_batch.len());
            (sigs, change)
        };

        let send_proofs =
            send_batch.unblind(send_sigs, &keyset, &self.unit, opts.conditions.as_ref())?;
        let change_proofs = change_batch.unblind(change_sigs, &keyset, &self.unit, None)?;

        self.proofs.settle(&selection.ids())?;
        self.proofs.insert_pending(send_proofs.clone())?;
        if !change_proofs.is_empty() {
            self.proofs.insert_unspent(change_proofs)?;
        }
        Ok(send_proofs)
    }

    /// Redeem a received token: witness any locked proofs, swap them at the
    /// mint for fresh ones, and credit the wallet. Returns the amount
    /// credited net of the mint's input fee.
    pub async fn receive(
        &self,
        token: Token,
        opts: ReceiveOptions,
    ) -> Result<Amount, WalletError> {
        if token.mint != self.mint_url {
            return Err(WalletError::WrongMint(token.mint.to_string()));
        }
        if token.unit != self.unit {
            return Err(WalletError::WrongMint(format!(
                "token unit {} does not match wallet unit {}",
                token.unit, self.unit
            )));
        }

        let mut inputs = token.proofs;
        if inputs.is_empty() {
            return Err(pocket_types::TokenError::Empty.into());
        }
        for proof in &mut inputs {
            Self::attach_witness(proof, &opts)?;
        }

        let keyset = self.keysets.active_keyset(&self.unit).await?;
        let total = Amount::try_sum(inputs.iter().map(|p| p.amount))?;
        let fee = keyset.fee_for(inputs.len());
        let credited = total.saturating_sub(fee);
        if credited.is_zero() {
            return Err(WalletError::InsufficientFunds {
                needed: fee,
                available: total,
            });
        }

        let target = match &opts.amount_split_target {
            SplitTarget::None => self.shaped_target(credited),
            other => other.clone(),
        };
        let amounts = credited.split_targeted(&target)?;
        let counter = self
            .db
            .increment_keyset_counter(&keyset.id, amounts.len() as u32)?;
        let batch = PreMintBatch::new(&self.deriver, &keyset.id, counter, &amounts);

        let signatures = self
            .client
            .post_swap(&inputs, &batch.blinded_messages())
            .await?;
        let fresh = batch.unblind(signatures, &keyset, &self.unit, None)?;

        self.proofs.insert_unspent(fresh.clone())?;
        self.transactions.record(
            TransactionDirection::Incoming,
            credited,
            fee,
            self.unit.clone(),
            fresh.iter().map(Proof::id).collect(),
            token.memo,
            opts.metadata,
        )?;
        tracing::info!(%credited, %fee, "received token");
        Ok(credited)
    }

    fn attach_witness(proof: &mut Proof, opts: &ReceiveOptions) -> Result<(), WalletError> {
        match &proof.conditions {
            None => Ok(()),
            Some(SpendingConditions::P2pk { pubkey }) => {
                let key = opts
                    .p2pk_signing_keys
                    .iter()
                    .find(|k| *k == pubkey)
                    .ok_or_else(|| {
                        WalletError::SpendingConditionsNotMet(format!(
                            "no signing key for {pubkey}"
                        ))
                    })?;
                proof.witness = Some(Witness::Signature(key.clone()));
                Ok(())
            }
            Some(SpendingConditions::Htlc { hash }) => {
                let preimage = opts
                    .preimages
                    .iter()
                    .find(|p| hex::encode(Sha256::digest(p.as_bytes())) == *hash)
                    .ok_or_else(|| {
                        WalletError::SpendingConditionsNotMet(format!(
                            "no preimage for hash {hash}"
                        ))
                    })?;
                proof.witness = Some(Witness::Preimage(preimage.clone()));
                Ok(())
            }
        }
    }

    // ── transactions ────────────────────────────────────────────────────

    pub fn list_transactions(
        &self,
        direction: Option<TransactionDirection>,
    ) -> Result<Vec<Transaction>, WalletError> {
        self.transactions.list(direction)
    }

    pub fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Transaction>, WalletError> {
        self.transactions.get(id)
    }

    /// Cancel an outgoing send whose token was never redeemed, restoring
    /// the reserved proofs.
    pub fn revert_transaction(&self, id: &TransactionId) -> Result<(), WalletError> {
        self.transactions.revert(id)
    }

    // ── subscriptions ───────────────────────────────────────────────────

    pub fn subscribe(&self, params: SubscribeParams) -> ActiveSubscription {
        self.bus.subscribe(params)
    }

    fn shaped_target(&self, amount: Amount) -> SplitTarget {
        match self.config.target_proof_count {
            Some(count) => SplitTarget::Values(amount.split_toward_count(count)),
            None => SplitTarget::None,
        }
    }
}
