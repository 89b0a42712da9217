use crate::domain::contestant::{Contestant, ContestantId, ContestantUpdate};
use crate::domain::ports::{ContestantStore, VoteLedger, VoteStore};
use crate::domain::pricing::Reference;
use crate::domain::vote::{VoteStatus, VoteTransaction};
use crate::error::{Result, VoteError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for contestant records.
pub const CF_CONTESTANTS: &str = "contestants";
/// Column Family for ledger entries.
pub const CF_LEDGER: &str = "ledger";
/// Column Family for store bookkeeping.
pub const CF_META: &str = "meta";

const NEXT_SEQ_KEY: &[u8] = b"next_seq";

/// Contestant plus its insertion sequence, which fixes iteration order.
#[derive(Serialize, Deserialize)]
struct StoredContestant {
    seq: u64,
    contestant: Contestant,
}

/// A persistent store implementation using RocksDB.
///
/// RocksDB has no native "add to field" or "write if unchanged" primitive, so
/// every read-modify-write runs under one writer mutex and multi-record
/// changes go out as a single `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at `path` with the required column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_CONTESTANTS, CF_LEDGER, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| VoteError::Storage(format!("{name} column family not found")))
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn next_seq(&self) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        Ok(match self.db.get_cf(cf, NEXT_SEQ_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| VoteError::Storage("corrupt sequence counter".to_string()))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        })
    }

    fn stored_contestant(&self, id: &ContestantId) -> Result<Option<StoredContestant>> {
        self.read(CF_CONTESTANTS, id.as_str().as_bytes())
    }

    /// Read-modify-write of one contestant. Callers hold `writer`.
    fn rewrite_contestant<F>(&self, id: &ContestantId, change: F) -> Result<Contestant>
    where
        F: FnOnce(&mut Contestant) -> Result<()>,
    {
        let mut stored = self
            .stored_contestant(id)?
            .ok_or_else(|| VoteError::ContestantNotFound(id.to_string()))?;
        change(&mut stored.contestant)?;
        self.db.put_cf(
            self.cf(CF_CONTESTANTS)?,
            id.as_str().as_bytes(),
            serde_json::to_vec(&stored)?,
        )?;
        Ok(stored.contestant)
    }

    /// Stages a contestant write, allocating a sequence number for new records.
    fn stage_contestant(
        &self,
        batch: &mut WriteBatch,
        contestant: Contestant,
        next_seq: &mut u64,
    ) -> Result<()> {
        let seq = match self.stored_contestant(&contestant.id)? {
            Some(existing) => existing.seq,
            None => {
                let seq = *next_seq;
                *next_seq += 1;
                seq
            }
        };
        let key = contestant.id.as_str().as_bytes().to_vec();
        let value = serde_json::to_vec(&StoredContestant { seq, contestant })?;
        batch.put_cf(self.cf(CF_CONTESTANTS)?, key, value);
        Ok(())
    }
}

#[async_trait]
impl ContestantStore for RocksDbStore {
    async fn put(&self, contestant: Contestant) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut next_seq = self.next_seq()?;
        let mut batch = WriteBatch::default();
        self.stage_contestant(&mut batch, contestant, &mut next_seq)?;
        batch.put_cf(self.cf(CF_META)?, NEXT_SEQ_KEY, next_seq.to_be_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, id: &ContestantId) -> Result<Option<Contestant>> {
        Ok(self.stored_contestant(id)?.map(|stored| stored.contestant))
    }

    async fn all(&self) -> Result<Vec<Contestant>> {
        let mut stored: Vec<StoredContestant> = self.scan(CF_CONTESTANTS)?;
        stored.sort_by_key(|record| record.seq);
        Ok(stored.into_iter().map(|record| record.contestant).collect())
    }

    async fn increment_votes(&self, id: &ContestantId, votes: u64) -> Result<u64> {
        let _guard = self.writer.lock().await;
        let contestant = self.rewrite_contestant(id, |contestant| {
            contestant.vote_count = contestant
                .vote_count
                .checked_add(votes)
                .ok_or_else(|| VoteError::Storage(format!("vote tally overflow for {id}")))?;
            Ok(())
        })?;
        Ok(contestant.vote_count)
    }

    async fn update_metadata(
        &self,
        id: &ContestantId,
        update: ContestantUpdate,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        let _guard = self.writer.lock().await;
        self.rewrite_contestant(id, |contestant| {
            update.apply(contestant, now);
            Ok(())
        })
    }

    async fn set_evicted(
        &self,
        id: &ContestantId,
        evicted: bool,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        let _guard = self.writer.lock().await;
        self.rewrite_contestant(id, |contestant| {
            contestant.evicted = evicted;
            contestant.updated_at = now;
            Ok(())
        })
    }

    async fn set_votes(
        &self,
        id: &ContestantId,
        expected: u64,
        votes: u64,
        now: DateTime<Utc>,
    ) -> Result<Contestant> {
        let _guard = self.writer.lock().await;
        self.rewrite_contestant(id, |contestant| {
            if contestant.vote_count != expected {
                return Err(VoteError::TallyChanged {
                    contestant: id.to_string(),
                    expected,
                    actual: contestant.vote_count,
                });
            }
            contestant.vote_count = votes;
            contestant.updated_at = now;
            Ok(())
        })
    }

    async fn seed_if_empty(&self, contestants: Vec<Contestant>) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let cf = self.cf(CF_CONTESTANTS)?;
        if self.db.iterator_cf(cf, IteratorMode::Start).next().is_some() {
            return Ok(false);
        }
        let mut next_seq = self.next_seq()?;
        let mut batch = WriteBatch::default();
        for contestant in contestants {
            self.stage_contestant(&mut batch, contestant, &mut next_seq)?;
        }
        batch.put_cf(self.cf(CF_META)?, NEXT_SEQ_KEY, next_seq.to_be_bytes());
        self.db.write(batch)?;
        Ok(true)
    }
}

#[async_trait]
impl VoteLedger for RocksDbStore {
    async fn append(&self, entry: VoteTransaction) -> Result<()> {
        let _guard = self.writer.lock().await;
        let cf = self.cf(CF_LEDGER)?;
        let key = entry.reference.as_str().as_bytes();
        if self.db.get_pinned_cf(cf, key)?.is_some() {
            return Err(VoteError::ReferenceCollision(entry.reference.to_string()));
        }
        self.db.put_cf(cf, key, serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    async fn entry(&self, reference: &Reference) -> Result<Option<VoteTransaction>> {
        self.read(CF_LEDGER, reference.as_str().as_bytes())
    }

    async fn transition(
        &self,
        reference: &Reference,
        to: VoteStatus,
        provider_reference: Option<String>,
    ) -> Result<VoteTransaction> {
        let _guard = self.writer.lock().await;
        let mut entry: VoteTransaction = self
            .read(CF_LEDGER, reference.as_str().as_bytes())?
            .ok_or_else(|| VoteError::LedgerEntryMissing(reference.to_string()))?;
        entry.transition(to, provider_reference)?;
        self.db.put_cf(
            self.cf(CF_LEDGER)?,
            reference.as_str().as_bytes(),
            serde_json::to_vec(&entry)?,
        )?;
        Ok(entry)
    }

    async fn entries_for(&self, contestant: &ContestantId) -> Result<Vec<VoteTransaction>> {
        let mut entries: Vec<VoteTransaction> = self
            .scan::<VoteTransaction>(CF_LEDGER)?
            .into_iter()
            .filter(|entry| &entry.contestant_id == contestant)
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    async fn pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<VoteTransaction>> {
        let mut entries: Vec<VoteTransaction> = self
            .scan::<VoteTransaction>(CF_LEDGER)?
            .into_iter()
            .filter(|entry| entry.status == VoteStatus::Pending && entry.timestamp < cutoff)
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }
}

#[async_trait]
impl VoteStore for RocksDbStore {
    async fn credit(
        &self,
        reference: &Reference,
        provider_reference: &str,
    ) -> Result<(VoteTransaction, u64)> {
        let _guard = self.writer.lock().await;

        let mut entry: VoteTransaction = self
            .read(CF_LEDGER, reference.as_str().as_bytes())?
            .ok_or_else(|| VoteError::LedgerEntryMissing(reference.to_string()))?;
        entry.transition(VoteStatus::Completed, Some(provider_reference.to_string()))?;

        let mut stored = self
            .stored_contestant(&entry.contestant_id)?
            .ok_or_else(|| VoteError::ContestantNotFound(entry.contestant_id.to_string()))?;
        stored.contestant.vote_count = stored
            .contestant
            .vote_count
            .checked_add(u64::from(entry.vote_count.get()))
            .ok_or_else(|| {
                VoteError::Storage(format!("vote tally overflow for {}", entry.contestant_id))
            })?;
        let tally = stored.contestant.vote_count;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_LEDGER)?,
            reference.as_str().as_bytes(),
            serde_json::to_vec(&entry)?,
        );
        batch.put_cf(
            self.cf(CF_CONTESTANTS)?,
            entry.contestant_id.as_str().as_bytes(),
            serde_json::to_vec(&stored)?,
        );
        self.db.write(batch)?;

        Ok((entry, tally))
    }

    async fn remove_unreferenced(&self, id: &ContestantId) -> Result<Option<Contestant>> {
        let _guard = self.writer.lock().await;
        let referenced = self
            .scan::<VoteTransaction>(CF_LEDGER)?
            .iter()
            .any(|entry| &entry.contestant_id == id);
        if referenced {
            return Err(VoteError::ContestantReferenced(id.to_string()));
        }
        let existing = self.stored_contestant(id)?;
        if existing.is_some() {
            self.db
                .delete_cf(self.cf(CF_CONTESTANTS)?, id.as_str().as_bytes())?;
        }
        Ok(existing.map(|stored| stored.contestant))
    }
}
