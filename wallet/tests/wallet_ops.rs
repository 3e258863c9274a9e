//! Integration tests exercising the full wallet pipeline:
//! quote → mint → select → send/melt → receive → history.
//!
//! These tests wire the wallet facade to the nullable mint and store,
//! verifying the engine end-to-end without any network or filesystem.

use std::sync::Arc;

use pocket_nullables::{MeltBehavior, NullMint, NullStore};
use pocket_store::ProofStore;
use pocket_types::{
    Amount, CurrencyUnit, MeltQuoteState, MintQuoteState, Proof, ProofState, SpendingConditions,
    SplitTarget, TransactionDirection,
};
use pocket_wallet::{
    KeysetCache, MintConnector, NotificationKind, ReceiveOptions, SendKind, SendOptions,
    SubscribeParams, Wallet, WalletConfig, WalletError, WalletNotification,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MNEMONIC_A: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const MNEMONIC_B: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

fn wallet_with(mint: Arc<NullMint>, db: Arc<NullStore>, mnemonic: &str) -> Wallet {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Wallet::with_connector(
        "https://mint.example.com".parse().expect("valid url"),
        CurrencyUnit::Sat,
        mnemonic,
        db,
        WalletConfig::default(),
        mint,
    )
    .expect("wallet")
}

fn setup() -> (Wallet, Arc<NullMint>, Arc<NullStore>) {
    let mint = Arc::new(NullMint::new(CurrencyUnit::Sat));
    let db = Arc::new(NullStore::new());
    let wallet = wallet_with(mint.clone(), db.clone(), MNEMONIC_A);
    (wallet, mint, db)
}

/// Mint `amount` sats into the wallet via a paid quote.
async fn fund(wallet: &Wallet, mint: &NullMint, amount: u64) {
    let quote = wallet
        .mint_quote(Some(Amount::new(amount)), None)
        .await
        .expect("quote");
    mint.pay_mint_quote(&quote.id, None);
    wallet.poll_mint_quote(&quote.id).await.expect("poll");
    wallet
        .mint(&quote.id, SplitTarget::None, None)
        .await
        .expect("mint");
}

// ---------------------------------------------------------------------------
// 1. Fresh wallet
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_wallet_is_empty() {
    let (wallet, _mint, _db) = setup();
    assert_eq!(wallet.balance().unwrap(), Amount::ZERO);
    assert!(wallet.list_transactions(None).unwrap().is_empty());
    assert!(wallet
        .list_transactions(Some(TransactionDirection::Incoming))
        .unwrap()
        .is_empty());
}

// ---------------------------------------------------------------------------
// 2. Mint quote lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mint_before_payment_fails_without_side_effects() {
    let (wallet, _mint, db) = setup();
    let quote = wallet.mint_quote(Some(Amount::new(64)), None).await.unwrap();
    assert_eq!(quote.state, MintQuoteState::Unpaid);

    let err = wallet
        .mint(&quote.id, SplitTarget::None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::QuoteNotPaid(_)));
    assert_eq!(wallet.balance().unwrap(), Amount::ZERO);
    assert_eq!(db.proof_count(), 0);
    assert!(wallet.list_transactions(None).unwrap().is_empty());
}

#[tokio::test]
async fn paid_quote_mints_proofs_once() {
    let (wallet, mint, _db) = setup();
    let quote = wallet.mint_quote(Some(Amount::new(100)), None).await.unwrap();
    mint.pay_mint_quote(&quote.id, None);
    let polled = wallet.poll_mint_quote(&quote.id).await.unwrap();
    assert_eq!(polled.state, MintQuoteState::Paid);

    let proofs = wallet
        .mint(&quote.id, SplitTarget::None, None)
        .await
        .unwrap();
    assert_eq!(
        Amount::try_sum(proofs.iter().map(|p| p.amount)).unwrap(),
        Amount::new(100)
    );
    assert_eq!(wallet.balance().unwrap(), Amount::new(100));

    // A second redemption of the same quote is refused.
    let err = wallet
        .mint(&quote.id, SplitTarget::None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::QuoteAlreadyIssued(_)));
    assert_eq!(wallet.balance().unwrap(), Amount::new(100));

    let history = wallet.list_transactions(None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].direction, TransactionDirection::Incoming);
    assert_eq!(history[0].amount, Amount::new(100));
}

#[tokio::test]
async fn amountless_quote_uses_payer_amount() {
    let (wallet, mint, _db) = setup();
    let quote = wallet.mint_quote(None, None).await.unwrap();
    mint.pay_mint_quote(&quote.id, Some(Amount::new(21)));
    wallet.poll_mint_quote(&quote.id).await.unwrap();
    wallet
        .mint(&quote.id, SplitTarget::None, None)
        .await
        .unwrap();
    assert_eq!(wallet.balance().unwrap(), Amount::new(21));
}

#[tokio::test]
async fn paid_amountless_quote_without_settled_amount_is_distinguished() {
    let (wallet, mint, _db) = setup();
    let quote = wallet.mint_quote(None, None).await.unwrap();
    mint.pay_mint_quote(&quote.id, None);
    wallet.poll_mint_quote(&quote.id).await.unwrap();

    // The quote is paid; only the settled amount is missing.
    let err = wallet
        .mint(&quote.id, SplitTarget::None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::QuoteAmountUnknown(_)));

    // Once the mint learns the amount, minting works without another poll.
    mint.pay_mint_quote(&quote.id, Some(Amount::new(21)));
    wallet
        .mint(&quote.id, SplitTarget::None, None)
        .await
        .unwrap();
    assert_eq!(wallet.balance().unwrap(), Amount::new(21));
}

#[tokio::test]
async fn split_target_value_yields_mintable_denominations() {
    let (wallet, mint, _db) = setup();
    let quote = wallet.mint_quote(Some(Amount::new(1000)), None).await.unwrap();
    mint.pay_mint_quote(&quote.id, None);
    wallet.poll_mint_quote(&quote.id).await.unwrap();

    let proofs = wallet
        .mint(&quote.id, SplitTarget::Value(Amount::new(500)), None)
        .await
        .unwrap();
    // Mints only sign power-of-two denominations, so each 500 arrives as
    // 500's binary decomposition.
    let mut amounts: Vec<u64> = proofs.iter().map(|p| p.amount.value()).collect();
    amounts.sort_unstable();
    assert_eq!(amounts, vec![4, 4, 16, 16, 32, 32, 64, 64, 128, 128, 256, 256]);
    assert_eq!(wallet.balance().unwrap(), Amount::new(1000));
}

// ---------------------------------------------------------------------------
// 3. Send and receive
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_exact_send_reserves_matching_denominations() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 96).await; // proofs 32 + 64

    let token = wallet
        .send(
            Amount::new(32),
            SendOptions {
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(token.total_amount().unwrap(), Amount::new(32));
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));

    let pending = wallet.get_proofs_by_states(&[ProofState::Pending]).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0.amount, Amount::new(32));
}

#[tokio::test]
async fn offline_exact_send_fails_when_no_subset_matches() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 64).await; // a single 64 proof

    let err = wallet
        .send(
            Amount::new(48),
            SendOptions {
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { .. }));
    // Nothing was reserved.
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));
    assert!(wallet
        .get_proofs_by_states(&[ProofState::Pending])
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn online_send_swaps_for_exact_change() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 64).await;

    let token = wallet
        .send(Amount::new(48), SendOptions::default())
        .await
        .unwrap();
    assert_eq!(token.total_amount().unwrap(), Amount::new(48));
    assert_eq!(wallet.balance().unwrap(), Amount::new(16));
    assert_eq!(mint.swap_call_count(), 1);
}

#[tokio::test]
async fn offline_tolerant_send_accepts_bounded_overpay() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 64).await;

    let token = wallet
        .send(
            Amount::new(48),
            SendOptions {
                send_kind: SendKind::OfflineTolerant(Amount::new(16)),
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();
    // The 64 proof is within tolerance of the 48 request.
    assert_eq!(token.total_amount().unwrap(), Amount::new(64));
    assert_eq!(mint.swap_call_count(), 0);
}

#[tokio::test]
async fn send_receive_roundtrip_between_wallets() {
    let mint = Arc::new(NullMint::new(CurrencyUnit::Sat));
    let alice = wallet_with(mint.clone(), Arc::new(NullStore::new()), MNEMONIC_A);
    let bob = wallet_with(mint.clone(), Arc::new(NullStore::new()), MNEMONIC_B);
    fund(&alice, &mint, 96).await;

    let token = alice
        .send(
            Amount::new(32),
            SendOptions {
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();

    let credited = bob.receive(token, ReceiveOptions::default()).await.unwrap();
    assert_eq!(credited, Amount::new(32));
    assert_eq!(bob.balance().unwrap(), Amount::new(32));
    assert_eq!(alice.balance().unwrap(), Amount::new(64));

    let history = bob
        .list_transactions(Some(TransactionDirection::Incoming))
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, Amount::new(32));
}

#[tokio::test]
async fn cross_mint_token_is_rejected() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 64).await;
    let mut token = wallet
        .send(
            Amount::new(64),
            SendOptions {
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();
    token.mint = "https://other-mint.example.com".parse().unwrap();

    let err = wallet
        .receive(token, ReceiveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::WrongMint(_)));
}

#[tokio::test]
async fn received_proofs_are_swapped_for_fresh_ones() {
    let mint = Arc::new(NullMint::new(CurrencyUnit::Sat));
    let alice = wallet_with(mint.clone(), Arc::new(NullStore::new()), MNEMONIC_A);
    let bob = wallet_with(mint.clone(), Arc::new(NullStore::new()), MNEMONIC_B);
    fund(&alice, &mint, 64).await;

    let token = alice
        .send(
            Amount::new(64),
            SendOptions {
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();
    let sent_secrets: Vec<String> = token.proofs.iter().map(|p| p.secret.clone()).collect();

    bob.receive(token, ReceiveOptions::default()).await.unwrap();
    let bob_proofs = bob.get_proofs_by_states(&[ProofState::Unspent]).unwrap();
    assert!(bob_proofs
        .iter()
        .all(|(p, _)| !sent_secrets.contains(&p.secret)));
}

// ---------------------------------------------------------------------------
// 4. Spending conditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn p2pk_locked_send_requires_signing_key() {
    let mint = Arc::new(NullMint::new(CurrencyUnit::Sat));
    let alice = wallet_with(mint.clone(), Arc::new(NullStore::new()), MNEMONIC_A);
    let bob = wallet_with(mint.clone(), Arc::new(NullStore::new()), MNEMONIC_B);
    fund(&alice, &mint, 64).await;

    let token = alice
        .send(
            Amount::new(8),
            SendOptions {
                conditions: Some(SpendingConditions::P2pk {
                    pubkey: "02bobkey".into(),
                }),
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();

    let err = bob
        .receive(token.clone(), ReceiveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::SpendingConditionsNotMet(_)));

    let credited = bob
        .receive(
            token,
            ReceiveOptions {
                p2pk_signing_keys: vec!["02bobkey".into()],
                ..ReceiveOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(credited, Amount::new(8));
}

#[tokio::test]
async fn conditions_require_an_online_send() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 64).await;

    let err = wallet
        .send(
            Amount::new(8),
            SendOptions {
                conditions: Some(SpendingConditions::P2pk {
                    pubkey: "02bobkey".into(),
                }),
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::SpendingConditionsNotMet(_)));
}

// ---------------------------------------------------------------------------
// 5. Melt
// ---------------------------------------------------------------------------

#[tokio::test]
async fn melt_pays_invoice_and_settles_proofs() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 98).await; // proofs 2 + 32 + 64
    mint.register_invoice("lnbc-bill", Amount::new(32), Amount::new(2));

    let quote = wallet.melt_quote("lnbc-bill", None).await.unwrap();
    assert_eq!(quote.total(), Amount::new(34));

    let paid = wallet.melt(&quote.id).await.unwrap();
    assert_eq!(paid.state, MeltQuoteState::Paid);
    assert!(paid.payment_preimage.is_some());
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));

    let history = wallet
        .list_transactions(Some(TransactionDirection::Outgoing))
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, Amount::new(32));
    assert_eq!(history[0].fee, Amount::new(2));
}

#[tokio::test]
async fn melt_without_exact_denominations_keeps_the_overshoot() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 64).await; // a single 64 proof
    mint.register_invoice("lnbc-bill", Amount::new(30), Amount::new(3));

    let quote = wallet.melt_quote("lnbc-bill", None).await.unwrap();
    let paid = wallet.melt(&quote.id).await.unwrap();
    assert_eq!(paid.state, MeltQuoteState::Paid);

    // The 64 was swapped down to an exact 33 before melting; everything
    // above amount + fee reserve stays in the wallet.
    assert_eq!(mint.swap_call_count(), 1);
    assert_eq!(wallet.balance().unwrap(), Amount::new(31));

    let history = wallet
        .list_transactions(Some(TransactionDirection::Outgoing))
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, Amount::new(30));
    assert_eq!(history[0].fee, Amount::new(3));
}

#[tokio::test]
async fn melt_before_quote_exists_fails_cleanly() {
    let (wallet, mint, db) = setup();
    fund(&wallet, &mint, 64).await;

    let err = wallet.melt("no-such-quote").await.unwrap_err();
    assert!(matches!(err, WalletError::QuoteNotFound(_)));
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));
    assert_eq!(db.proof_count(), 1);
}

#[tokio::test]
async fn failed_melt_releases_reserved_proofs() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 98).await;
    mint.register_invoice("lnbc-bill", Amount::new(32), Amount::new(2));
    mint.set_melt_behavior(MeltBehavior::Fail);

    let quote = wallet.melt_quote("lnbc-bill", None).await.unwrap();
    let outcome = wallet.melt(&quote.id).await.unwrap();
    assert_eq!(outcome.state, MeltQuoteState::Failed);
    assert_eq!(wallet.balance().unwrap(), Amount::new(98));
    assert!(wallet
        .get_proofs_by_states(&[ProofState::Pending])
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn ambiguous_melt_keeps_proofs_pending_until_polled() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 98).await;
    mint.register_invoice("lnbc-bill", Amount::new(32), Amount::new(2));
    mint.set_melt_behavior(MeltBehavior::TransportError);

    let quote = wallet.melt_quote("lnbc-bill", None).await.unwrap();
    let err = wallet.melt(&quote.id).await.unwrap_err();
    assert!(matches!(err, WalletError::MintCommunication(_)));

    // Outcome unknown: the proofs stay reserved, nothing is guessed.
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));
    assert!(!wallet
        .get_proofs_by_states(&[ProofState::Pending])
        .unwrap()
        .is_empty());
    assert!(wallet
        .list_transactions(Some(TransactionDirection::Outgoing))
        .unwrap()
        .is_empty());

    // The payment eventually settled; the next poll resolves it.
    mint.resolve_melt(&quote.id, MeltQuoteState::Paid);
    let resolved = wallet.poll_melt_quote(&quote.id).await.unwrap();
    assert_eq!(resolved.state, MeltQuoteState::Paid);
    assert!(wallet
        .get_proofs_by_states(&[ProofState::Pending])
        .unwrap()
        .is_empty());
    assert_eq!(
        wallet
            .list_transactions(Some(TransactionDirection::Outgoing))
            .unwrap()
            .len(),
        1
    );
}

// ---------------------------------------------------------------------------
// 6. Transaction history and revert
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reverting_a_send_restores_the_proofs() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 96).await;
    wallet
        .send(
            Amount::new(32),
            SendOptions {
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));

    let tx = wallet
        .list_transactions(Some(TransactionDirection::Outgoing))
        .unwrap()
        .remove(0);
    wallet.revert_transaction(&tx.id).unwrap();

    assert_eq!(wallet.balance().unwrap(), Amount::new(96));
    assert!(wallet
        .list_transactions(Some(TransactionDirection::Outgoing))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn settled_melt_cannot_be_reverted() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 98).await;
    mint.register_invoice("lnbc-bill", Amount::new(32), Amount::new(2));
    let quote = wallet.melt_quote("lnbc-bill", None).await.unwrap();
    wallet.melt(&quote.id).await.unwrap();

    let tx = wallet
        .list_transactions(Some(TransactionDirection::Outgoing))
        .unwrap()
        .remove(0);
    let err = wallet.revert_transaction(&tx.id).unwrap_err();
    assert!(matches!(err, WalletError::TransactionNotRevertible(_)));
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));
}

#[tokio::test]
async fn incoming_transactions_cannot_be_reverted() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 64).await;
    let tx = wallet.list_transactions(None).unwrap().remove(0);
    let err = wallet.revert_transaction(&tx.id).unwrap_err();
    assert!(matches!(err, WalletError::TransactionNotRevertible(_)));
}

#[tokio::test]
async fn reverting_unknown_transaction_fails() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 64).await;
    let token = wallet
        .send(
            Amount::new(64),
            SendOptions {
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();
    let tx = wallet
        .list_transactions(Some(TransactionDirection::Outgoing))
        .unwrap()
        .remove(0);
    wallet.revert_transaction(&tx.id).unwrap();
    drop(token);

    let err = wallet.revert_transaction(&tx.id).unwrap_err();
    assert!(matches!(err, WalletError::TransactionNotFound));
}

// ---------------------------------------------------------------------------
// 7. Concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_sends_over_the_same_funds_cannot_both_win() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 64).await;

    let (a, b) = tokio::join!(
        wallet.send(Amount::new(48), SendOptions::default()),
        wallet.send(Amount::new(48), SendOptions::default()),
    );
    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(WalletError::InsufficientFunds { .. })
    )));
}

#[tokio::test]
async fn spent_proofs_are_never_reselected() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 98).await;
    mint.register_invoice("lnbc-bill", Amount::new(32), Amount::new(2));
    let quote = wallet.melt_quote("lnbc-bill", None).await.unwrap();
    wallet.melt(&quote.id).await.unwrap();

    // Only 64 remains; asking for more reports exactly what is available.
    let err = wallet
        .send(Amount::new(80), SendOptions::default())
        .await
        .unwrap_err();
    match err {
        WalletError::InsufficientFunds { available, .. } => {
            assert_eq!(available, Amount::new(64));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// 8. Subscriptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscriber_observes_quote_paid_before_minting() {
    let (wallet, mint, _db) = setup();
    let quote = wallet.mint_quote(Some(Amount::new(64)), None).await.unwrap();

    let mut sub = wallet.subscribe(SubscribeParams {
        kind: NotificationKind::MintQuoteUpdate,
        filters: vec![quote.id.clone()],
        id: None,
    });

    mint.pay_mint_quote(&quote.id, None);
    wallet.poll_mint_quote(&quote.id).await.unwrap();

    match sub.recv().await.unwrap() {
        WalletNotification::MintQuoteUpdate(update) => {
            assert_eq!(update.id, quote.id);
            assert_eq!(update.state, MintQuoteState::Paid);
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    wallet
        .mint(&quote.id, SplitTarget::None, None)
        .await
        .unwrap();
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));
}

#[tokio::test]
async fn proof_state_updates_are_published() {
    let (wallet, mint, _db) = setup();

    let mut sub = wallet.subscribe(SubscribeParams {
        kind: NotificationKind::ProofState,
        filters: Vec::new(),
        id: None,
    });

    fund(&wallet, &mint, 4).await;
    match sub.recv().await.unwrap() {
        WalletNotification::ProofStateUpdate { state, .. } => {
            assert_eq!(state, ProofState::Unspent);
        }
        other => panic!("unexpected notification: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// 9. Keyset caching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn keysets_are_fetched_once_across_operations() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 96).await;
    wallet
        .send(
            Amount::new(32),
            SendOptions {
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();
    fund(&wallet, &mint, 8).await;

    assert_eq!(mint.keyset_fetch_count(), 1);
}

#[tokio::test]
async fn concurrent_keyset_lookups_share_one_fetch() {
    let mint = Arc::new(NullMint::new(CurrencyUnit::Sat));
    let cache = KeysetCache::new(mint.clone(), Arc::new(NullStore::new()));

    let (a, b, c) = tokio::join!(
        cache.active_keyset(&CurrencyUnit::Sat),
        cache.active_keyset(&CurrencyUnit::Sat),
        cache.active_keyset(&CurrencyUnit::Sat),
    );
    assert_eq!(a.unwrap().id, *mint.keyset_id());
    assert_eq!(b.unwrap().id, *mint.keyset_id());
    assert_eq!(c.unwrap().id, *mint.keyset_id());
    assert_eq!(mint.keyset_fetch_count(), 1);
}

// ---------------------------------------------------------------------------
// 10. Balance invariant
// ---------------------------------------------------------------------------

#[tokio::test]
async fn balance_tracks_every_operation() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 100).await;
    assert_eq!(wallet.balance().unwrap(), Amount::new(100));

    wallet
        .send(Amount::new(37), SendOptions::default())
        .await
        .unwrap();
    assert_eq!(wallet.balance().unwrap(), Amount::new(63));

    mint.register_invoice("lnbc-bill", Amount::new(30), Amount::ZERO);
    let quote = wallet.melt_quote("lnbc-bill", None).await.unwrap();
    wallet.melt(&quote.id).await.unwrap();
    assert_eq!(wallet.balance().unwrap(), Amount::new(33));

    fund(&wallet, &mint, 7).await;
    assert_eq!(wallet.balance().unwrap(), Amount::new(40));
}

// ---------------------------------------------------------------------------
// 11. Reclaiming stranded proofs
// ---------------------------------------------------------------------------

/// Strand every unspent proof as `Pending` with nothing referencing it,
/// as an interrupted swap would.
fn strand_unspent(wallet: &Wallet, db: &NullStore) -> Vec<Proof> {
    let proofs: Vec<Proof> = wallet
        .get_proofs_by_states(&[ProofState::Unspent])
        .unwrap()
        .into_iter()
        .map(|(p, _)| p)
        .collect();
    let ids: Vec<_> = proofs.iter().map(Proof::id).collect();
    db.update_proofs_state(&ids, ProofState::Pending).unwrap();
    proofs
}

#[tokio::test]
async fn reclaim_pending_restores_proofs_the_mint_never_saw() {
    let (wallet, mint, db) = setup();
    fund(&wallet, &mint, 64).await;

    strand_unspent(&wallet, &db);
    assert_eq!(wallet.balance().unwrap(), Amount::ZERO);

    let released = wallet.reclaim_pending().await.unwrap();
    assert_eq!(released, Amount::new(64));
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));
}

#[tokio::test]
async fn reclaim_pending_settles_proofs_the_mint_saw_spent() {
    let (wallet, mint, db) = setup();
    fund(&wallet, &mint, 32).await;

    // The swap reached the mint before the interruption.
    let stranded = strand_unspent(&wallet, &db);
    mint.post_swap(&stranded, &[]).await.unwrap();

    let released = wallet.reclaim_pending().await.unwrap();
    assert_eq!(released, Amount::ZERO);
    assert_eq!(wallet.balance().unwrap(), Amount::ZERO);
    assert_eq!(
        wallet.get_proofs_by_states(&[ProofState::Spent]).unwrap().len(),
        stranded.len()
    );
}

#[tokio::test]
async fn reclaim_pending_leaves_outgoing_tokens_reserved() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 96).await;
    wallet
        .send(
            Amount::new(32),
            SendOptions {
                send_kind: SendKind::OfflineExact,
                ..SendOptions::default()
            },
        )
        .await
        .unwrap();

    let released = wallet.reclaim_pending().await.unwrap();
    assert_eq!(released, Amount::ZERO);
    // The token's proofs stay reserved until redeemed or reverted.
    assert_eq!(
        wallet.get_proofs_by_states(&[ProofState::Pending]).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn reclaim_pending_ignores_melt_reserved_proofs() {
    let (wallet, mint, _db) = setup();
    fund(&wallet, &mint, 98).await;
    mint.register_invoice("lnbc-bill", Amount::new(32), Amount::new(2));
    mint.set_melt_behavior(MeltBehavior::TransportError);

    let quote = wallet.melt_quote("lnbc-bill", None).await.unwrap();
    wallet.melt(&quote.id).await.unwrap_err();

    // The melt is still in flight; its proofs belong to the next poll.
    let released = wallet.reclaim_pending().await.unwrap();
    assert_eq!(released, Amount::ZERO);
    assert!(!wallet
        .get_proofs_by_states(&[ProofState::Pending])
        .unwrap()
        .is_empty());

    mint.resolve_melt(&quote.id, MeltQuoteState::Paid);
    wallet.poll_melt_quote(&quote.id).await.unwrap();
    assert_eq!(wallet.balance().unwrap(), Amount::new(64));
}
