mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{contestant, fast_config, harness_with, request};
use std::sync::{Arc, Mutex};
use votepay::application::admin::AdminService;
use votepay::config::VoteConfig;
use votepay::domain::contestant::{Contestant, ContestantId, ContestantUpdate};
use votepay::domain::ports::{ContestantStore, VoteLedger, VoteStore};
use votepay::domain::pricing::Reference;
use votepay::domain::vote::{VoteStatus, VoteTransaction};
use votepay::error::{ErrorClass, Result, VoteError};
use votepay::infrastructure::in_memory::InMemoryStore;

const ADMIN: &str = "admin@example.com";

/// Lands a pending credit right after the next contestant read returns.
struct CreditAfterRead {
    inner: InMemoryStore,
    armed: Mutex<Option<Reference>>,
}

impl CreditAfterRead {
    fn arm(&self, reference: &Reference) {
        *self.armed.lock().unwrap() = Some(reference.clone());
    }
}

#[async_trait]
impl ContestantStore for CreditAfterRead {
    async fn put(&self, contestant: Contestant) -> Result<()> {
        self.inner.put(contestant).await
    }
    async fn get(&self, id: &ContestantId) -> Result<Option<Contestant>> {
        let read = self.inner.get(id).await?;
        let armed = self.armed.lock().unwrap().take();
        if let Some(reference) = armed {
            self.inner.credit(&reference, "PSK_RACE").await?;
        }
        Ok(read)
    }
    async fn all(&self) -> Result<Vec<Contestant>> {
        self.inner.all().await
    }
    async fn increment_votes(&self, id: &ContestantId, votes: u64) -> Result<u64> {
        self.inner.increment_votes(id, votes).await
    }
    async fn update_metadata(
        &self,
        id: &ContestantId,
        update: ContestantUpdate,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        self.inner.update_metadata(id, update, now).await
    }
    async fn set_evicted(
        &self,
        id: &ContestantId,
        evicted: bool,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        self.inner.set_evicted(id, evicted, now).await
    }
    async fn set_votes(
        &self,
        id: &ContestantId,
        expected: u64,
        votes: u64,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        self.inner.set_votes(id, expected, votes, now).await
    }
    async fn seed_if_empty(&self, contestants: Vec<Contestant>) -> Result<bool> {
        self.inner.seed_if_empty(contestants).await
    }
}

#[async_trait]
impl VoteLedger for CreditAfterRead {
    async fn append(&self, entry: VoteTransaction) -> Result<()> {
        self.inner.append(entry).await
    }
    async fn entry(&self, reference: &Reference) -> Result<Option<VoteTransaction>> {
        self.inner.entry(reference).await
    }
    async fn transition(
        &self,
        reference: &Reference,
        to: VoteStatus,
        provider_reference: Option<String>,
    ) -> Result<VoteTransaction> {
        self.inner.transition(reference, to, provider_reference).await
    }
    async fn entries_for(&self, contestant: &ContestantId) -> Result<Vec<VoteTransaction>> {
        self.inner.entries_for(contestant).await
    }
    async fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<VoteTransaction>> {
        self.inner.pending_before(cutoff).await
    }
}

#[async_trait]
impl VoteStore for CreditAfterRead {
    async fn credit(
        &self,
        reference: &Reference,
        provider_reference: &str,
    ) -> Result<(VoteTransaction, u64)> {
        self.inner.credit(reference, provider_reference).await
    }
    async fn remove_unreferenced(&self, id: &ContestantId) -> Result<Option<Contestant>> {
        self.inner.remove_unreferenced(id).await
    }
}

struct Setup {
    admin: AdminService,
    store: InMemoryStore,
    racing: Arc<CreditAfterRead>,
    reference: Reference,
}

/// Contestant `x` with one pending 5-vote purchase whose callback never arrives.
async fn setup() -> Setup {
    let store = InMemoryStore::new();
    store.put(contestant("x", "Ada")).await.unwrap();
    let racing = Arc::new(CreditAfterRead {
        inner: store.clone(),
        armed: Mutex::new(None),
    });
    let h = harness_with(store.clone(), racing.clone(), fast_config());

    let pending = h.orchestrator.begin(request("x", 5)).await.unwrap();
    let reference = pending.reference().clone();
    h.gateway.drop_callback(&reference);

    let config = VoteConfig {
        admins: vec![ADMIN.to_string()],
        ..Default::default()
    };
    Setup {
        admin: AdminService::new(racing.clone(), config),
        store,
        racing,
        reference,
    }
}

async fn assert_credited(setup: &Setup) {
    let x = setup.store.get(&ContestantId::new("x")).await.unwrap().unwrap();
    assert_eq!(x.vote_count, 5);
    let entry = setup.store.entry(&setup.reference).await.unwrap().unwrap();
    assert_eq!(entry.status, VoteStatus::Completed);
}

#[tokio::test]
async fn test_toggle_keeps_credit_landing_mid_edit() {
    let s = setup().await;
    s.racing.arm(&s.reference);

    let toggled = s.admin.toggle_evicted(ADMIN, &ContestantId::new("x")).await.unwrap();

    assert!(toggled.evicted);
    assert_eq!(toggled.vote_count, 5);
    assert_credited(&s).await;
}

#[tokio::test]
async fn test_field_edits_after_stale_read_keep_credit() {
    let s = setup().await;
    let id = ContestantId::new("x");

    // An admin screen loaded before the credit landed.
    s.racing.arm(&s.reference);
    let stale = s.racing.get(&id).await.unwrap().unwrap();
    assert_eq!(stale.vote_count, 0);

    let evicted = s.admin.set_evicted(ADMIN, &id, true).await.unwrap();
    assert_eq!(evicted.vote_count, 5);

    let update = ContestantUpdate {
        name: Some("Ada Obi".to_string()),
        location: Some("Lagos, Nigeria".to_string()),
        ..Default::default()
    };
    let updated = s.admin.update_contestant(ADMIN, &id, update).await.unwrap();
    assert_eq!(updated.name, "Ada Obi");
    assert!(updated.evicted);
    assert_eq!(updated.vote_count, 5);
    assert_credited(&s).await;
}

#[tokio::test]
async fn test_correction_refused_when_credit_lands_mid_edit() {
    let s = setup().await;
    let id = ContestantId::new("x");
    s.racing.arm(&s.reference);

    let err = s.admin.correct_votes(ADMIN, &id, 2).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Consistency);
    match err {
        VoteError::TallyChanged {
            expected, actual, ..
        } => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_credited(&s).await;

    // A retry against the fresh tally goes through.
    let corrected = s.admin.correct_votes(ADMIN, &id, 2).await.unwrap();
    assert_eq!(corrected.vote_count, 2);
}
