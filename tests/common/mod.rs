#![allow(dead_code)]

use chrono::Utc;
use std::io::{Error, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use votepay::application::orchestrator::VoteOrchestrator;
use votepay::config::{RetryPolicy, VoteConfig};
use votepay::domain::contestant::{Contestant, ContestantId, NewContestant};
use votepay::domain::ports::{ContestantStore, VoteStoreRef};
use votepay::domain::vote::PurchaseRequest;
use votepay::infrastructure::gateway::SimulatedGateway;
use votepay::infrastructure::in_memory::InMemoryStore;
use votepay::infrastructure::notifier::LogNotifier;

pub const FAN: &str = "fan@example.com";

pub fn contestant(id: &str, name: &str) -> Contestant {
    Contestant::new(
        ContestantId::new(id),
        NewContestant {
            name: name.to_string(),
            category: "Music".to_string(),
            ..Default::default()
        },
        Utc::now(),
    )
}

pub fn request(contestant: &str, votes: i64) -> PurchaseRequest {
    PurchaseRequest {
        contestant_id: ContestantId::new(contestant),
        email: FAN.to_string(),
        vote_count: votes,
    }
}

/// Retries quickly so failure paths do not slow the suite down.
pub fn fast_config() -> VoteConfig {
    VoteConfig {
        credit_retry: RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(5),
        },
        ..Default::default()
    }
}

pub struct Harness {
    pub orchestrator: VoteOrchestrator,
    pub store: InMemoryStore,
    pub gateway: Arc<SimulatedGateway>,
}

/// An in-memory setup with contestants `x` (Ada) and `y` (Bola).
pub async fn harness() -> Harness {
    let store = InMemoryStore::new();
    store.put(contestant("x", "Ada")).await.unwrap();
    store.put(contestant("y", "Bola")).await.unwrap();
    harness_with(store.clone(), Arc::new(store), fast_config())
}

pub fn harness_with(store: InMemoryStore, backend: VoteStoreRef, config: VoteConfig) -> Harness {
    let gateway = Arc::new(SimulatedGateway::new());
    let orchestrator = VoteOrchestrator::new(
        backend,
        gateway.clone(),
        Arc::new(LogNotifier::default()),
        config,
    );
    Harness {
        orchestrator,
        store,
        gateway,
    }
}

pub fn events_csv(rows: &[&str]) -> Result<NamedTempFile, Error> {
    write_csv("type, contestant, email, votes, outcome", rows)
}

pub fn roster_csv(rows: &[&str]) -> Result<NamedTempFile, Error> {
    write_csv("id, name, bio, category, location, age, image_url", rows)
}

fn write_csv(header: &str, rows: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{header}")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    file.flush()?;
    Ok(file)
}

pub fn generate_events(path: &Path, purchases: usize) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(["type", "contestant", "email", "votes", "outcome"])?;
    for i in 0..purchases {
        let contestant = if i % 2 == 0 { "x" } else { "y" };
        wtr.write_record(["purchase", contestant, FAN, "1", "success"])?;
    }
    wtr.flush()?;
    Ok(())
}
