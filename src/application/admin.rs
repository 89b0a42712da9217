use crate::config::VoteConfig;
use crate::domain::contestant::{Contestant, ContestantId, ContestantUpdate, NewContestant};
use crate::domain::ports::VoteStoreRef;
use crate::error::{Result, VoteError};
use chrono::Utc;
use tracing::{info, warn};

/// Contestant management for allow-listed administrators.
#[derive(Clone)]
pub struct AdminService {
    store: VoteStoreRef,
    config: VoteConfig,
}

impl AdminService {
    pub fn new(store: VoteStoreRef, config: VoteConfig) -> Self {
        Self { store, config }
    }

    fn authorize(&self, actor: &str) -> Result<()> {
        if self.config.is_admin(actor) {
            Ok(())
        } else {
            warn!(actor, "admin access denied");
            Err(VoteError::Unauthorized(actor.to_string()))
        }
    }

    async fn existing(&self, id: &ContestantId) -> Result<Contestant> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| VoteError::ContestantNotFound(id.to_string()))
    }

    pub async fn add_contestant(&self, actor: &str, details: NewContestant) -> Result<Contestant> {
        self.authorize(actor)?;
        let contestant = Contestant::new(ContestantId::generate(), details, Utc::now());
        self.store.put(contestant.clone()).await?;
        info!(actor, contestant = %contestant.id, name = %contestant.name, "contestant added");
        Ok(contestant)
    }

    pub async fn update_contestant(
        &self,
        actor: &str,
        id: &ContestantId,
        update: ContestantUpdate,
    ) -> Result<Contestant> {
        self.authorize(actor)?;
        let contestant = self.store.update_metadata(id, update, Utc::now()).await?;
        info!(actor, contestant = %id, "contestant updated");
        Ok(contestant)
    }

    pub async fn set_evicted(&self, actor: &str, id: &ContestantId, evicted: bool) -> Result<Contestant> {
        self.authorize(actor)?;
        let contestant = self.store.set_evicted(id, evicted, Utc::now()).await?;
        info!(actor, contestant = %id, evicted, "eviction flag changed");
        Ok(contestant)
    }

    pub async fn toggle_evicted(&self, actor: &str, id: &ContestantId) -> Result<Contestant> {
        self.authorize(actor)?;
        let current = self.existing(id).await?.evicted;
        self.set_evicted(actor, id, !current).await
    }

    /// Overwrites a tally. The only sanctioned way for a tally to go down.
    ///
    /// Refused with `TallyChanged` if a credit lands between the read and the write.
    pub async fn correct_votes(&self, actor: &str, id: &ContestantId, vote_count: u64) -> Result<Contestant> {
        self.authorize(actor)?;
        let current = self.existing(id).await?.vote_count;
        let contestant = self
            .store
            .set_votes(id, current, vote_count, Utc::now())
            .await?;
        warn!(
            actor,
            contestant = %id,
            from = current,
            to = vote_count,
            "manual tally correction"
        );
        Ok(contestant)
    }

    /// Hard delete, refused while any ledger entry points at the contestant.
    pub async fn delete_contestant(&self, actor: &str, id: &ContestantId) -> Result<Contestant> {
        self.authorize(actor)?;
        let removed = self
            .store
            .remove_unreferenced(id)
            .await?
            .ok_or_else(|| VoteError::ContestantNotFound(id.to_string()))?;
        info!(actor, contestant = %id, "contestant deleted");
        Ok(removed)
    }

    /// Bootstraps an empty store. Safe to call on every start.
    pub async fn seed_if_empty(&self, contestants: Vec<Contestant>) -> Result<bool> {
        let count = contestants.len();
        let seeded = self.store.seed_if_empty(contestants).await?;
        if seeded {
            info!(count, "seeded contestants");
        } else {
            info!("contestants already present; seed skipped");
        }
        Ok(seeded)
    }
}
