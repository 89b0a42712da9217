use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable, opaque contestant identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContestantId(String);

impl ContestantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Allocates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContestantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contestant record as held by the tally store.
///
/// Only `id`, `vote_count` and `evicted` matter to the purchase workflow; the
/// remaining fields are display metadata owned by administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contestant {
    pub id: ContestantId,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub vote_count: u64,
    /// Records written before eviction existed carry no flag and read as active.
    #[serde(default)]
    pub evicted: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Contestant {
    pub fn new(id: ContestantId, details: NewContestant, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: details.name,
            bio: details.bio,
            category: details.category,
            location: details.location,
            age: details.age,
            image_url: details.image_url,
            vote_count: 0,
            evicted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_votable(&self) -> bool {
        !self.evicted
    }
}

/// Display metadata supplied when an administrator creates a contestant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContestant {
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub image_url: String,
}

/// A partial edit of display metadata. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestantUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub age: Option<u8>,
    pub image_url: Option<String>,
}

impl ContestantUpdate {
    pub fn apply(self, contestant: &mut Contestant, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            contestant.name = name;
        }
        if let Some(bio) = self.bio {
            contestant.bio = bio;
        }
        if let Some(category) = self.category {
            contestant.category = category;
        }
        if let Some(location) = self.location {
            contestant.location = location;
        }
        if let Some(age) = self.age {
            contestant.age = Some(age);
        }
        if let Some(image_url) = self.image_url {
            contestant.image_url = image_url;
        }
        contestant.updated_at = now;
    }
}
