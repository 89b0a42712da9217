use super::contestant::{Contestant, ContestantId, ContestantUpdate};
use super::pricing::Reference;
use super::vote::{PaymentIntent, PaymentOutcome, Receipt, VoteStatus, VoteTransaction};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::oneshot;

/// The per-contestant tally plus administrator-owned metadata.
#[async_trait]
pub trait ContestantStore: Send + Sync {
    /// Inserts or replaces a whole record, tally included.
    ///
    /// Meant for new records. Edits to an existing contestant go through the
    /// field-scoped operations below, which never write a stale tally.
    async fn put(&self, contestant: Contestant) -> Result<()>;
    async fn get(&self, id: &ContestantId) -> Result<Option<Contestant>>;
    /// All contestants in stable insertion order.
    async fn all(&self) -> Result<Vec<Contestant>>;
    /// Atomically adds `votes` to the tally and returns the new value.
    async fn increment_votes(&self, id: &ContestantId, votes: u64) -> Result<u64>;
    /// Applies a metadata edit in place, leaving the tally untouched.
    async fn update_metadata(
        &self,
        id: &ContestantId,
        update: ContestantUpdate,
        now: DateTime<Utc>,
    ) -> Result<Contestant>;
    /// Sets the eviction flag in place, leaving the tally untouched.
    async fn set_evicted(
        &self,
        id: &ContestantId,
        evicted: bool,
        now: DateTime<Utc>,
    ) -> Result<Contestant>;
    /// Overwrites the tally only if it still equals `expected`.
    ///
    /// Fails with `TallyChanged` otherwise.
    async fn set_votes(
        &self,
        id: &ContestantId,
        expected: u64,
        votes: u64,
        now: DateTime<Utc>,
    ) -> Result<Contestant>;
    /// Inserts `contestants` only when the store holds none. Returns whether it seeded.
    async fn seed_if_empty(&self, contestants: Vec<Contestant>) -> Result<bool>;
}

/// Append-mostly record of payment attempts, keyed by our reference.
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Fails with `ReferenceCollision` if the reference is already present.
    async fn append(&self, entry: VoteTransaction) -> Result<()>;
    async fn entry(&self, reference: &Reference) -> Result<Option<VoteTransaction>>;
    /// Conditional status write; only a `pending` entry can move.
    async fn transition(
        &self,
        reference: &Reference,
        to: VoteStatus,
        provider_reference: Option<String>,
    ) -> Result<VoteTransaction>;
    async fn entries_for(&self, contestant: &ContestantId) -> Result<Vec<VoteTransaction>>;
    async fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<VoteTransaction>>;
}

/// A backend holding both the tally and the ledger, able to credit them together.
#[async_trait]
pub trait VoteStore: ContestantStore + VoteLedger {
    /// Completes a pending entry and adds its votes to the contestant's tally.
    ///
    /// Readers observe both changes or neither. Returns the completed entry and
    /// the new tally.
    async fn credit(
        &self,
        reference: &Reference,
        provider_reference: &str,
    ) -> Result<(VoteTransaction, u64)>;

    /// Deletes a contestant that no ledger entry points at.
    ///
    /// The ledger check and the delete are one write. Fails with
    /// `ContestantReferenced` if any entry exists.
    async fn remove_unreferenced(&self, id: &ContestantId) -> Result<Option<Contestant>>;
}

pub type VoteStoreRef = Arc<dyn VoteStore>;

/// A payment session that resolves exactly once.
///
/// The gateway keeps the sending half; dropping it without sending models a
/// callback that never arrives.
#[derive(Debug)]
pub struct PaymentSession {
    reference: Reference,
    outcome: oneshot::Receiver<PaymentOutcome>,
}

impl PaymentSession {
    pub fn new(reference: Reference, outcome: oneshot::Receiver<PaymentOutcome>) -> Self {
        Self { reference, outcome }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// Waits for the provider. `None` means the callback was lost.
    pub async fn outcome(self) -> Option<PaymentOutcome> {
        self.outcome.await.ok()
    }
}

/// Hosted checkout boundary. Notifies, never mutates the ledger or tally.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Whether the checkout can be opened right now.
    fn is_available(&self) -> bool;
    /// Opens a checkout for `intent`, rejecting it with every violated constraint.
    async fn initiate(&self, intent: PaymentIntent) -> Result<PaymentSession>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

#[async_trait]
pub trait PurchaseNotifier: Send + Sync {
    async fn notify(&self, receipt: &Receipt) -> Result<()>;
}

pub type PurchaseNotifierRef = Arc<dyn PurchaseNotifier>;
