//! Subscription bus — real-time state-change notifications.
//!
//! A single logical event stream multiplexing quote-state and proof-state
//! changes to any number of active subscriptions. Events are delivered via
//! per-kind broadcast channels and filtered per subscription, so every
//! subscription receives its own copy of matching events.

use tokio::sync::broadcast;

use pocket_types::{MeltQuote, MintQuote, ProofId, ProofState};

use crate::error::WalletError;

/// The notification kinds a subscription can listen for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    MintQuoteUpdate,
    MeltQuoteUpdate,
    ProofState,
}

/// A request to observe state changes for a set of ids.
#[derive(Clone, Debug)]
pub struct SubscribeParams {
    pub kind: NotificationKind,
    /// Quote ids or proof ids (hex) to match; empty matches every event
    /// of the subscribed kind.
    pub filters: Vec<String>,
    /// Optional caller-chosen subscription id.
    pub id: Option<String>,
}

/// A state-change notification delivered to subscribers.
#[derive(Clone, Debug)]
pub enum WalletNotification {
    MintQuoteUpdate(MintQuote),
    MeltQuoteUpdate(MeltQuote),
    ProofStateUpdate { id: ProofId, state: ProofState },
}

impl WalletNotification {
    fn matches(&self, filters: &[String]) -> bool {
        if filters.is_empty() {
            return true;
        }
        match self {
            Self::MintQuoteUpdate(quote) => filters.iter().any(|f| f == &quote.id),
            Self::MeltQuoteUpdate(quote) => filters.iter().any(|f| f == &quote.id),
            Self::ProofStateUpdate { id, .. } => {
                let hex = id.to_string();
                filters.iter().any(|f| f == &hex)
            }
        }
    }
}

/// Shared bus state: one broadcast channel per notification kind.
#[derive(Clone)]
pub struct SubscriptionBus {
    mint_quote_tx: broadcast::Sender<WalletNotification>,
    melt_quote_tx: broadcast::Sender<WalletNotification>,
    proof_state_tx: broadcast::Sender<WalletNotification>,
}

impl SubscriptionBus {
    /// Create a bus with the given per-kind channel capacity.
    pub fn new(channel_capacity: usize) -> Self {
        let (mint_quote_tx, _) = broadcast::channel(channel_capacity);
        let (melt_quote_tx, _) = broadcast::channel(channel_capacity);
        let (proof_state_tx, _) = broadcast::channel(channel_capacity);
        Self {
            mint_quote_tx,
            melt_quote_tx,
            proof_state_tx,
        }
    }

    fn sender_for(&self, kind: NotificationKind) -> &broadcast::Sender<WalletNotification> {
        match kind {
            NotificationKind::MintQuoteUpdate => &self.mint_quote_tx,
            NotificationKind::MeltQuoteUpdate => &self.melt_quote_tx,
            NotificationKind::ProofState => &self.proof_state_tx,
        }
    }

    /// Publish a mint-quote state change. No-op when nobody listens.
    pub fn publish_mint_quote(&self, quote: &MintQuote) {
        let _ = self
            .mint_quote_tx
            .send(WalletNotification::MintQuoteUpdate(quote.clone()));
    }

    /// Publish a melt-quote state change.
    pub fn publish_melt_quote(&self, quote: &MeltQuote) {
        let _ = self
            .melt_quote_tx
            .send(WalletNotification::MeltQuoteUpdate(quote.clone()));
    }

    /// Publish committed proof-state transitions.
    pub fn publish_proof_states(&self, updates: &[(ProofId, ProofState)]) {
        for (id, state) in updates {
            let _ = self.proof_state_tx.send(WalletNotification::ProofStateUpdate {
                id: *id,
                state: *state,
            });
        }
    }

    /// Register a subscription. Dropping the returned handle unregisters it.
    pub fn subscribe(&self, params: SubscribeParams) -> ActiveSubscription {
        let rx = self.sender_for(params.kind).subscribe();
        let id = params
            .id
            .unwrap_or_else(|| format!("sub-{:08x}", rand::random::<u32>()));
        ActiveSubscription {
            id,
            filters: params.filters,
            rx,
        }
    }
}

/// A live subscription handle.
///
/// Holds a broadcast receiver; dropping it releases the subscription
/// without side effects on quote or proof state.
pub struct ActiveSubscription {
    id: String,
    filters: Vec<String>,
    rx: broadcast::Receiver<WalletNotification>,
}

impl ActiveSubscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next notification matching this subscription's filters.
    ///
    /// Suspends until a match arrives; fails with
    /// [`WalletError::SubscriptionClosed`] once the bus is gone. Events for
    /// one id arrive in commit order; a slow consumer that overflows the
    /// channel skips the overwritten events. Delivery is best-effort, so
    /// callers needing certainty reconcile by polling.
    pub async fn recv(&mut self) -> Result<WalletNotification, WalletError> {
        loop {
            match self.rx.recv().await {
                Ok(notification) if notification.matches(&self.filters) => {
                    return Ok(notification)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(subscription = %self.id, skipped, "subscription lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(WalletError::SubscriptionClosed)
                }
            }
        }
    }
}
