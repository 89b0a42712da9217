use crate::domain::contestant::ContestantId;
use crate::domain::vote::PurchaseRequest;
use crate::error::{Result, VoteError};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Purchase,
    Evict,
    Reinstate,
}

/// What the simulated provider does once the checkout is open.
#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallbackOutcome {
    #[default]
    Success,
    Cancel,
    /// The callback never arrives.
    Drop,
}

/// One raw row: `type, contestant, email, votes, outcome`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub contestant: ContestantId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub votes: Option<i64>,
    #[serde(default)]
    pub outcome: Option<CallbackOutcome>,
}

/// A scripted step, checked for the fields its type needs.
#[derive(Debug, PartialEq, Clone)]
pub enum Event {
    Purchase {
        request: PurchaseRequest,
        outcome: CallbackOutcome,
    },
    Evict(ContestantId),
    Reinstate(ContestantId),
}

impl TryFrom<EventRecord> for Event {
    type Error = VoteError;

    fn try_from(record: EventRecord) -> Result<Self> {
        match record.kind {
            EventType::Purchase => {
                let email = record.email.ok_or_else(|| {
                    VoteError::InvalidEvent(format!("purchase for {} has no email", record.contestant))
                })?;
                let vote_count = record.votes.ok_or_else(|| {
                    VoteError::InvalidEvent(format!("purchase for {} has no votes", record.contestant))
                })?;
                Ok(Event::Purchase {
                    request: PurchaseRequest {
                        contestant_id: record.contestant,
                        email,
                        vote_count,
                    },
                    outcome: record.outcome.unwrap_or_default(),
                })
            }
            EventType::Evict => Ok(Event::Evict(record.contestant)),
            EventType::Reinstate => Ok(Event::Reinstate(record.contestant)),
        }
    }
}

/// Reads scripted events from a CSV source.
///
/// Whitespace is trimmed and short rows are accepted, so `evict, c1` needs no
/// trailing commas.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one result per row. A bad row does not end the stream.
    pub fn events(self) -> impl Iterator<Item = Result<Event>> {
        self.reader.into_deserialize::<EventRecord>().map(|result| {
            result
                .map_err(VoteError::from)
                .and_then(Event::try_from)
        })
    }
}
