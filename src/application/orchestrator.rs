use super::ranking::{Standings, rank};
use crate::config::VoteConfig;
use crate::domain::contestant::{Contestant, ContestantId};
use crate::domain::ports::{PaymentGatewayRef, PaymentSession, PurchaseNotifierRef, VoteStoreRef};
use crate::domain::pricing::{Amount, Reference, VoteCount, generate_reference, price_at};
use crate::domain::vote::{
    Email, PaymentIntent, PaymentOutcome, PurchaseRequest, Receipt, VoteStatus, VoteTransaction,
};
use crate::error::{ErrorClass, Result, VoteError};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// How many fresh references to try when the ledger reports a collision.
const REFERENCE_ATTEMPTS: u32 = 3;

/// Lifecycle of a single purchase attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseState {
    Draft,
    AwaitingPayment,
    Crediting,
    Completed,
    ValidationFailed,
    PaymentCancelled,
    CreditingFailed,
}

impl PurchaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseState::Completed
                | PurchaseState::ValidationFailed
                | PurchaseState::PaymentCancelled
                | PurchaseState::CreditingFailed
        )
    }

    /// The only moves a purchase may make. Nothing skips a state.
    pub fn can_advance_to(&self, next: PurchaseState) -> bool {
        use PurchaseState::*;
        matches!(
            (self, next),
            (Draft, AwaitingPayment)
                | (Draft, ValidationFailed)
                | (AwaitingPayment, Crediting)
                | (AwaitingPayment, PaymentCancelled)
                | (Crediting, Completed)
                | (Crediting, CreditingFailed)
        )
    }
}

/// Tracks the state of one attempt and logs each move.
#[derive(Debug)]
struct Attempt {
    reference: Option<Reference>,
    state: PurchaseState,
}

impl Attempt {
    fn new(state: PurchaseState) -> Self {
        Self {
            reference: None,
            state,
        }
    }

    fn resume(reference: &Reference, state: PurchaseState) -> Self {
        Self {
            reference: Some(reference.clone()),
            state,
        }
    }

    fn advance(&mut self, next: PurchaseState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal purchase move {:?} -> {:?}",
            self.state,
            next
        );
        debug!(reference = ?self.reference, from = ?self.state, to = ?next, "purchase state");
        self.state = next;
    }
}

/// A purchase whose ledger entry exists and whose checkout is open.
#[derive(Debug)]
pub struct PendingPurchase {
    entry: VoteTransaction,
    session: PaymentSession,
}

impl PendingPurchase {
    pub fn reference(&self) -> &Reference {
        &self.entry.reference
    }

    pub fn entry(&self) -> &VoteTransaction {
        &self.entry
    }

    pub fn state(&self) -> PurchaseState {
        PurchaseState::AwaitingPayment
    }
}

/// A contestant whose tally disagrees with their completed ledger entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyDrift {
    pub contestant_id: ContestantId,
    pub contestant_name: String,
    pub tally: u64,
    pub ledger_total: u64,
}

struct Validated {
    contestant: Contestant,
    vote_count: VoteCount,
    amount: Amount,
    email: Email,
}

/// Sequences payment confirmation, ledger completion and tally credit.
///
/// Every purchase leaves a ledger entry before the checkout opens. A success
/// callback credits through [`VoteStore::credit`](crate::domain::ports::VoteStore::credit),
/// whose conditional write makes replays harmless.
#[derive(Clone)]
pub struct VoteOrchestrator {
    store: VoteStoreRef,
    gateway: PaymentGatewayRef,
    notifier: PurchaseNotifierRef,
    config: VoteConfig,
}

impl VoteOrchestrator {
    pub fn new(
        store: VoteStoreRef,
        gateway: PaymentGatewayRef,
        notifier: PurchaseNotifierRef,
        config: VoteConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &VoteConfig {
        &self.config
    }

    /// Runs a whole purchase: open the checkout, wait for the purchaser, settle.
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<Receipt> {
        let pending = self.begin(request).await?;
        self.settle(pending).await
    }

    /// `Draft -> AwaitingPayment`.
    ///
    /// Validates the request, records a `pending` ledger entry and opens the
    /// checkout. Validation failures leave nothing behind.
    pub async fn begin(&self, request: PurchaseRequest) -> Result<PendingPurchase> {
        let mut attempt = Attempt::new(PurchaseState::Draft);

        let validated = match self.validate(&request).await {
            Ok(validated) => validated,
            Err(e) => {
                attempt.advance(PurchaseState::ValidationFailed);
                info!(contestant = %request.contestant_id, error = %e, "purchase rejected");
                return Err(e);
            }
        };

        if !self.gateway.is_available() {
            warn!(contestant = %request.contestant_id, "payment system unavailable");
            return Err(VoteError::PaymentSystemUnavailable);
        }

        let entry = self.open_entry(&validated).await?;
        attempt.reference = Some(entry.reference.clone());

        let intent = PaymentIntent {
            email: entry.email.to_string(),
            amount: entry.amount.minor_units(),
            reference: entry.reference.clone(),
        };
        let session = match self.gateway.initiate(intent).await {
            Ok(session) => session,
            Err(e) => {
                // The checkout never opened, so nothing can confirm this entry.
                warn!(reference = %entry.reference, error = %e, "checkout refused");
                if let Err(mark) = self
                    .store
                    .transition(&entry.reference, VoteStatus::Failed, None)
                    .await
                {
                    error!(reference = %entry.reference, error = %mark, "could not mark refused checkout as failed");
                }
                return Err(e);
            }
        };

        attempt.advance(PurchaseState::AwaitingPayment);
        info!(
            reference = %entry.reference,
            contestant = %entry.contestant_id,
            votes = entry.vote_count.get(),
            amount = entry.amount.minor_units(),
            "awaiting payment"
        );
        Ok(PendingPurchase { entry, session })
    }

    /// Waits for the checkout and applies whichever callback fires.
    pub async fn settle(&self, pending: PendingPurchase) -> Result<Receipt> {
        let PendingPurchase { entry, session } = pending;
        match session.outcome().await {
            Some(PaymentOutcome::Success { provider_reference }) => {
                self.confirm(&entry.reference, &provider_reference).await
            }
            Some(PaymentOutcome::Cancelled) => {
                self.cancel(&entry.reference).await?;
                Err(VoteError::PaymentCancelled(entry.reference.to_string()))
            }
            None => {
                warn!(reference = %entry.reference, "payment callback lost; entry left pending");
                Err(VoteError::CallbackLost(entry.reference.to_string()))
            }
        }
    }

    /// Success callback: `AwaitingPayment -> Crediting -> Completed`.
    ///
    /// Also the retry path for an entry whose earlier credit failed. A second
    /// confirmation of a completed entry reports `DuplicateCompletion` and
    /// credits nothing.
    pub async fn confirm(&self, reference: &Reference, provider_reference: &str) -> Result<Receipt> {
        let mut attempt = Attempt::resume(reference, PurchaseState::AwaitingPayment);

        let entry = match self.store.entry(reference).await? {
            Some(entry) => entry,
            None => {
                let e = VoteError::LedgerEntryMissing(reference.to_string());
                error!(%reference, provider_reference, "success callback for unknown entry");
                return Err(e);
            }
        };
        match entry.status {
            VoteStatus::Pending => {}
            VoteStatus::Completed => {
                error!(%reference, provider_reference, "replayed success callback ignored");
                return Err(VoteError::DuplicateCompletion(reference.to_string()));
            }
            VoteStatus::Failed => {
                error!(%reference, provider_reference, "success callback for a failed entry");
                return Err(VoteError::InvalidTransition {
                    reference: reference.to_string(),
                    from: VoteStatus::Failed,
                    to: VoteStatus::Completed,
                });
            }
        }

        attempt.advance(PurchaseState::Crediting);
        let (entry, tally) = match self.credit_with_retry(reference, provider_reference).await {
            Ok(credited) => credited,
            Err(e) if e.class() == ErrorClass::Consistency => {
                error!(%reference, error = %e, "credit aborted");
                return Err(e);
            }
            Err(e) => {
                attempt.advance(PurchaseState::CreditingFailed);
                error!(%reference, provider_reference, error = %e, "credit failed; entry left pending for reconciliation");
                return Err(e);
            }
        };
        attempt.advance(PurchaseState::Completed);

        let receipt = Receipt {
            reference: entry.reference,
            provider_reference: provider_reference.to_string(),
            contestant_id: entry.contestant_id,
            contestant_name: entry.contestant_name,
            votes: entry.vote_count.get(),
            amount: entry.amount,
            email: entry.email,
            tally,
        };
        if let Err(e) = self.notifier.notify(&receipt).await {
            warn!(%reference, error = %e, "purchase notification failed");
        }
        Ok(receipt)
    }

    /// Cancel callback: `AwaitingPayment -> PaymentCancelled`. The entry is kept as `failed`.
    pub async fn cancel(&self, reference: &Reference) -> Result<VoteTransaction> {
        let mut attempt = Attempt::resume(reference, PurchaseState::AwaitingPayment);
        let entry = self
            .store
            .transition(reference, VoteStatus::Failed, None)
            .await
            .inspect_err(|e| error!(%reference, error = %e, "cancel callback rejected"))?;
        attempt.advance(PurchaseState::PaymentCancelled);
        warn!(%reference, contestant = %entry.contestant_id, "payment cancelled");
        Ok(entry)
    }

    /// Current standings, recomputed from the store.
    pub async fn standings(&self) -> Result<Standings> {
        Ok(rank(&self.store.all().await?))
    }

    /// Pending entries older than the alert threshold as of `now`, each logged.
    pub async fn stale_pending(&self, now: DateTime<Utc>) -> Result<Vec<VoteTransaction>> {
        let cutoff = now - self.config.pending_alert_after;
        let stale = self.store.pending_before(cutoff).await?;
        for entry in &stale {
            warn!(
                reference = %entry.reference,
                contestant = %entry.contestant_id,
                created = %entry.timestamp,
                "ledger entry still pending"
            );
        }
        Ok(stale)
    }

    /// Compares each tally with the sum of its completed ledger entries.
    pub async fn audit(&self) -> Result<Vec<TallyDrift>> {
        let mut drifts = Vec::new();
        for contestant in self.store.all().await? {
            let ledger_total: u64 = self
                .store
                .entries_for(&contestant.id)
                .await?
                .iter()
                .filter(|entry| entry.status == VoteStatus::Completed)
                .map(|entry| u64::from(entry.vote_count.get()))
                .sum();
            if ledger_total != contestant.vote_count {
                warn!(
                    contestant = %contestant.id,
                    tally = contestant.vote_count,
                    ledger_total,
                    "tally drift"
                );
                drifts.push(TallyDrift {
                    contestant_id: contestant.id,
                    contestant_name: contestant.name,
                    tally: contestant.vote_count,
                    ledger_total,
                });
            }
        }
        Ok(drifts)
    }

    async fn validate(&self, request: &PurchaseRequest) -> Result<Validated> {
        let vote_count = VoteCount::new(request.vote_count)?;
        if vote_count.get() > self.config.max_votes_per_purchase {
            return Err(VoteError::QuantityTooLarge {
                requested: request.vote_count,
                max: self.config.max_votes_per_purchase,
            });
        }
        let email = Email::parse(&request.email)?;
        let contestant = self
            .store
            .get(&request.contestant_id)
            .await?
            .ok_or_else(|| VoteError::ContestantNotFound(request.contestant_id.to_string()))?;
        if !contestant.is_votable() {
            return Err(VoteError::ContestantNotVotable(contestant.id.to_string()));
        }
        let amount = price_at(vote_count, self.config.price_per_vote)?;
        Ok(Validated {
            contestant,
            vote_count,
            amount,
            email,
        })
    }

    async fn open_entry(&self, validated: &Validated) -> Result<VoteTransaction> {
        let mut tries = 0;
        loop {
            tries += 1;
            let entry = VoteTransaction::pending(
                generate_reference(),
                &validated.contestant,
                validated.vote_count,
                validated.amount,
                validated.email.clone(),
                Utc::now(),
            );
            match self.store.append(entry.clone()).await {
                Ok(()) => return Ok(entry),
                Err(VoteError::ReferenceCollision(reference)) if tries < REFERENCE_ATTEMPTS => {
                    error!(%reference, "transaction reference collision; regenerating");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn credit_with_retry(
        &self,
        reference: &Reference,
        provider_reference: &str,
    ) -> Result<(VoteTransaction, u64)> {
        let policy = self.config.credit_retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.credit(reference, provider_reference).await {
                Ok(credited) => return Ok(credited),
                Err(e) if e.class() == ErrorClass::Consistency => return Err(e),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!(%reference, attempt, ?delay, error = %e, "credit attempt failed; retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(VoteError::CreditingFailed {
                        reference: reference.to_string(),
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
            }
        }
    }
}
