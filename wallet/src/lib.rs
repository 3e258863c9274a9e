//! Ecash wallet engine: proof custody, quote lifecycles, sends and
//! receives against a single Cashu mint.
//!
//! The [`Wallet`] facade wires together the proof ledger, the quote
//! manager, the transaction ledger, the keyset cache, and the
//! subscription bus over a pluggable [`MintConnector`] and a pluggable
//! [`pocket_store::WalletDatabase`].

pub mod error;
pub mod keyset_cache;
pub mod mint_client;
pub mod proofs;
pub mod quotes;
pub mod secrets;
pub mod subscription;
pub mod transactions;
pub mod wallet;

pub use error::WalletError;
pub use keyset_cache::KeysetCache;
pub use mint_client::{
    BlindSignature, BlindedMessage, HttpMintConnector, MeltResponse, MintConnector, MintInfo,
};
pub use proofs::{ProofLedger, Selection, SelectionPolicy};
pub use quotes::QuoteManager;
pub use secrets::generate_mnemonic;
pub use subscription::{
    ActiveSubscription, NotificationKind, SubscribeParams, SubscriptionBus, WalletNotification,
};
pub use transactions::TransactionLedger;
pub use wallet::{ReceiveOptions, SendKind, SendMemo, SendOptions, Wallet, WalletConfig};
