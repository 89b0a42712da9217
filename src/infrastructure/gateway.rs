use crate::domain::ports::{PaymentGateway, PaymentSession};
use crate::domain::pricing::Reference;
use crate::domain::vote::{PaymentIntent, PaymentOutcome};
use crate::error::{Result, VoteError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Default)]
struct Sessions {
    open: HashMap<Reference, oneshot::Sender<PaymentOutcome>>,
    seen: HashSet<Reference>,
}

/// An in-process stand-in for the hosted checkout.
///
/// Each `initiate` parks the sending half of a oneshot channel; the purchaser's
/// action is then played back with [`succeed`](Self::succeed),
/// [`cancel`](Self::cancel) or [`drop_callback`](Self::drop_callback).
/// Removing the sender on resolution is what makes each session fire once.
pub struct SimulatedGateway {
    available: AtomicBool,
    sessions: Mutex<Sessions>,
    next_provider_id: AtomicU64,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            sessions: Mutex::new(Sessions::default()),
            next_provider_id: AtomicU64::new(1),
        }
    }

    /// Simulates the checkout script failing to load, or loading again.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn sessions(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Confirms payment with a generated provider reference, returned on delivery.
    pub fn succeed(&self, reference: &Reference) -> Option<String> {
        let provider_reference = format!(
            "SIM_{:08}",
            self.next_provider_id.fetch_add(1, Ordering::SeqCst)
        );
        self.succeed_with(reference, &provider_reference)
            .then_some(provider_reference)
    }

    /// Confirms payment with a caller-chosen provider reference.
    pub fn succeed_with(&self, reference: &Reference, provider_reference: &str) -> bool {
        self.resolve(
            reference,
            PaymentOutcome::Success {
                provider_reference: provider_reference.to_string(),
            },
        )
    }

    /// The purchaser closed the checkout.
    pub fn cancel(&self, reference: &Reference) -> bool {
        self.resolve(reference, PaymentOutcome::Cancelled)
    }

    /// Discards the session without firing either callback.
    pub fn drop_callback(&self, reference: &Reference) -> bool {
        self.sessions().open.remove(reference).is_some()
    }

    pub fn open_sessions(&self) -> Vec<Reference> {
        self.sessions().open.keys().cloned().collect()
    }

    fn resolve(&self, reference: &Reference, outcome: PaymentOutcome) -> bool {
        let Some(sender) = self.sessions().open.remove(reference) else {
            debug!(%reference, "no open checkout session");
            return false;
        };
        sender.send(outcome).is_ok()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn initiate(&self, intent: PaymentIntent) -> Result<PaymentSession> {
        if !self.is_available() {
            return Err(VoteError::PaymentSystemUnavailable);
        }

        let mut sessions = self.sessions();
        let mut violations = intent.violations();
        if !intent.reference.is_empty() && sessions.seen.contains(&intent.reference) {
            violations.push("Transaction reference has already been used".to_string());
        }
        if !violations.is_empty() {
            return Err(VoteError::InvalidPaymentIntent(violations));
        }

        let (sender, receiver) = oneshot::channel();
        sessions.seen.insert(intent.reference.clone());
        sessions.open.insert(intent.reference.clone(), sender);
        info!(reference = %intent.reference, amount = intent.amount, "checkout opened");

        Ok(PaymentSession::new(intent.reference, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(reference: &str) -> PaymentIntent {
        PaymentIntent {
            email: "fan@example.com".to_string(),
            amount: 10_000,
            reference: Reference::new(reference),
        }
    }

    #[tokio::test]
    async fn test_success_fires_once() {
        let gateway = SimulatedGateway::new();
        let session = gateway.initiate(intent("R1")).await.unwrap();

        let provider_reference = gateway.succeed(&Reference::new("R1")).unwrap();
        assert!(!gateway.cancel(&Reference::new("R1")));
        assert_eq!(
            session.outcome().await,
            Some(PaymentOutcome::Success { provider_reference })
        );
    }

    #[tokio::test]
    async fn test_cancel() {
        let gateway = SimulatedGateway::new();
        let session = gateway.initiate(intent("R1")).await.unwrap();
        assert!(gateway.cancel(&Reference::new("R1")));
        assert_eq!(session.outcome().await, Some(PaymentOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_callback_resolves_to_none() {
        let gateway = SimulatedGateway::new();
        let session = gateway.initiate(intent("R1")).await.unwrap();
        assert!(gateway.drop_callback(&Reference::new("R1")));
        assert_eq!(session.outcome().await, None);
    }

    #[tokio::test]
    async fn test_unavailable_gateway() {
        let gateway = SimulatedGateway::new();
        gateway.set_available(false);
        assert!(matches!(
            gateway.initiate(intent("R1")).await,
            Err(VoteError::PaymentSystemUnavailable)
        ));
        assert!(gateway.open_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_reused_reference() {
        let gateway = SimulatedGateway::new();
        let _session = gateway.initiate(intent("R1")).await.unwrap();
        gateway.cancel(&Reference::new("R1"));

        match gateway.initiate(intent("R1")).await {
            Err(VoteError::InvalidPaymentIntent(errors)) => {
                assert_eq!(errors, vec!["Transaction reference has already been used"]);
            }
            other => panic!("expected InvalidPaymentIntent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_collects_all_violations() {
        let gateway = SimulatedGateway::new();
        let bad = PaymentIntent {
            email: String::new(),
            amount: 0,
            reference: Reference::new(""),
        };
        match gateway.initiate(bad).await {
            Err(VoteError::InvalidPaymentIntent(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected InvalidPaymentIntent, got {other:?}"),
        }
    }
}
