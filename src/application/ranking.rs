use crate::domain::contestant::{Contestant, ContestantId};

/// Badge shown next to the first three active places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

/// A contestant's position in the standings.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub contestant: Contestant,
    /// 1-based place among active contestants; always `None` once evicted.
    pub rank: Option<u32>,
}

impl Placement {
    pub fn medal(&self) -> Option<Medal> {
        match self.rank {
            Some(1) => Some(Medal::Gold),
            Some(2) => Some(Medal::Silver),
            Some(3) => Some(Medal::Bronze),
            _ => None,
        }
    }
}

/// Read-only projection of the tally store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Standings {
    active: Vec<Placement>,
    evicted: Vec<Placement>,
}

impl Standings {
    pub fn active(&self) -> &[Placement] {
        &self.active
    }

    pub fn evicted(&self) -> &[Placement] {
        &self.evicted
    }

    /// Active contestants first, then evicted ones, each by votes descending.
    pub fn display_order(&self) -> impl Iterator<Item = &Placement> {
        self.active.iter().chain(self.evicted.iter())
    }

    pub fn rank_of(&self, id: &ContestantId) -> Option<u32> {
        self.active
            .iter()
            .find(|placement| &placement.contestant.id == id)
            .and_then(|placement| placement.rank)
    }

    pub fn leader(&self) -> Option<&Placement> {
        self.active.first()
    }

    /// Votes across every contestant, evicted included.
    pub fn total_votes(&self) -> u64 {
        self.display_order()
            .map(|placement| placement.contestant.vote_count)
            .sum()
    }
}

/// Ranks a snapshot of contestants.
///
/// Ties keep the order of `contestants`, which callers take from the store's
/// stable iteration order.
pub fn rank(contestants: &[Contestant]) -> Standings {
    let (mut active, mut evicted): (Vec<&Contestant>, Vec<&Contestant>) =
        contestants.iter().partition(|contestant| !contestant.evicted);

    // `sort_by` is stable.
    active.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
    evicted.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));

    Standings {
        active: active
            .into_iter()
            .zip(1u32..)
            .map(|(contestant, place)| Placement {
                contestant: contestant.clone(),
                rank: Some(place),
            })
            .collect(),
        evicted: evicted
            .into_iter()
            .map(|contestant| Placement {
                contestant: contestant.clone(),
                rank: None,
            })
            .collect(),
    }
}
