use crate::domain::contestant::{Contestant, ContestantId, ContestantUpdate};
use crate::domain::ports::{ContestantStore, VoteLedger, VoteStore};
use crate::domain::pricing::Reference;
use crate::domain::vote::{VoteStatus, VoteTransaction};
use crate::error::{Result, VoteError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    contestants: HashMap<ContestantId, Contestant>,
    /// Insertion order, which is also the ranking tie-break order.
    order: Vec<ContestantId>,
    ledger: HashMap<Reference, VoteTransaction>,
}

impl State {
    fn contestant_mut(&mut self, id: &ContestantId) -> Result<&mut Contestant> {
        self.contestants
            .get_mut(id)
            .ok_or_else(|| VoteError::ContestantNotFound(id.to_string()))
    }
}

/// A thread-safe in-memory document store holding tally and ledger together.
///
/// Every mutation happens under a single write guard, which gives atomic
/// increments, conditional status writes and an all-or-nothing credit.
/// `Clone` shares the underlying state.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContestantStore for InMemoryStore {
    async fn put(&self, contestant: Contestant) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.contestants.contains_key(&contestant.id) {
            state.order.push(contestant.id.clone());
        }
        state.contestants.insert(contestant.id.clone(), contestant);
        Ok(())
    }

    async fn get(&self, id: &ContestantId) -> Result<Option<Contestant>> {
        let state = self.state.read().await;
        Ok(state.contestants.get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<Contestant>> {
        let state = self.state.read().await;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.contestants.get(id).cloned())
            .collect())
    }

    async fn increment_votes(&self, id: &ContestantId, votes: u64) -> Result<u64> {
        let mut state = self.state.write().await;
        let contestant = state.contestant_mut(id)?;
        contestant.vote_count = contestant
            .vote_count
            .checked_add(votes)
            .ok_or_else(|| VoteError::Storage(format!("vote tally overflow for {id}")))?;
        Ok(contestant.vote_count)
    }

    async fn update_metadata(
        &self,
        id: &ContestantId,
        update: ContestantUpdate,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        let mut state = self.state.write().await;
        let contestant = state.contestant_mut(id)?;
        update.apply(contestant, now);
        Ok(contestant.clone())
    }

    async fn set_evicted(
        &self,
        id: &ContestantId,
        evicted: bool,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        let mut state = self.state.write().await;
        let contestant = state.contestant_mut(id)?;
        contestant.evicted = evicted;
        contestant.updated_at = now;
        Ok(contestant.clone())
    }

    async fn set_votes(
        &self,
        id: &ContestantId,
        expected: u64,
        votes: u64,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        let mut state = self.state.write().await;
        let contestant = state.contestant_mut(id)?;
        if contestant.vote_count != expected {
            return Err(VoteError::TallyChanged {
                contestant: id.to_string(),
                expected,
                actual: contestant.vote_count,
            });
        }
        contestant.vote_count = votes;
        contestant.updated_at = now;
        Ok(contestant.clone())
    }

    async fn seed_if_empty(&self, contestants: Vec<Contestant>) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.contestants.is_empty() {
            return Ok(false);
        }
        for contestant in contestants {
            if !state.contestants.contains_key(&contestant.id) {
                state.order.push(contestant.id.clone());
            }
            state.contestants.insert(contestant.id.clone(), contestant);
        }
        Ok(true)
    }
}

#[async_trait]
impl VoteLedger for InMemoryStore {
    async fn append(&self, entry: VoteTransaction) -> Result<()> {
        let mut state = self.state.write().await;
        if state.ledger.contains_key(&entry.reference) {
            return Err(VoteError::ReferenceCollision(entry.reference.to_string()));
        }
        state.ledger.insert(entry.reference.clone(), entry);
        Ok(())
    }

    async fn entry(&self, reference: &Reference) -> Result<Option<VoteTransaction>> {
        let state = self.state.read().await;
        Ok(state.ledger.get(reference).cloned())
    }

    async fn transition(
        &self,
        reference: &Reference,
        to: VoteStatus,
        provider_reference: Option<String>,
    ) -> Result<VoteTransaction> {
        let mut state = self.state.write().await;
        let entry = state
            .ledger
            .get_mut(reference)
            .ok_or_else(|| VoteError::LedgerEntryMissing(reference.to_string()))?;
        entry.transition(to, provider_reference)?;
        Ok(entry.clone())
    }

    async fn entries_for(&self, contestant: &ContestantId) -> Result<Vec<VoteTransaction>> {
        let state = self.state.read().await;
        let mut entries: Vec<VoteTransaction> = state
            .ledger
            .values()
            .filter(|entry| &entry.contestant_id == contestant)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    async fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<VoteTransaction>> {
        let state = self.state.read().await;
        let mut entries: Vec<VoteTransaction> = state
            .ledger
            .values()
            .filter(|entry| entry.status == VoteStatus::Pending && entry.timestamp < cutoff)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }
}

#[async_trait]
impl VoteStore for InMemoryStore {
    async fn credit(
        &self,
        reference: &Reference,
        provider_reference: &str,
    ) -> Result<(VoteTransaction, u64)> {
        let mut state = self.state.write().await;

        // Stage both changes before touching either record.
        let mut entry = state
            .ledger
            .get(reference)
            .cloned()
            .ok_or_else(|| VoteError::LedgerEntryMissing(reference.to_string()))?;
        entry.transition(VoteStatus::Completed, Some(provider_reference.to_string()))?;

        let tally = state
            .contestants
            .get(&entry.contestant_id)
            .ok_or_else(|| VoteError::ContestantNotFound(entry.contestant_id.to_string()))?
            .vote_count
            .checked_add(u64::from(entry.vote_count.get()))
            .ok_or_else(|| {
                VoteError::Storage(format!("vote tally overflow for {}", entry.contestant_id))
            })?;

        if let Some(contestant) = state.contestants.get_mut(&entry.contestant_id) {
            contestant.vote_count = tally;
        }
        state.ledger.insert(reference.clone(), entry.clone());
        Ok((entry, tally))
    }

    async fn remove_unreferenced(&self, id: &ContestantId) -> Result<Option<Contestant>> {
        let mut state = self.state.write().await;
        if state.ledger.values().any(|entry| &entry.contestant_id == id) {
            return Err(VoteError::ContestantReferenced(id.to_string()));
        }
        let removed = state.contestants.remove(id);
        if removed.is_some() {
            state.order.retain(|existing| existing != id);
        }
        Ok(removed)
    }
}
