use crate::application::ranking::{Placement, Standings};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct StandingsRow<'a> {
    /// Empty for evicted contestants.
    rank: Option<u32>,
    id: &'a str,
    name: &'a str,
    votes: u64,
    evicted: bool,
}

impl<'a> From<&'a Placement> for StandingsRow<'a> {
    fn from(placement: &'a Placement) -> Self {
        Self {
            rank: placement.rank,
            id: placement.contestant.id.as_str(),
            name: &placement.contestant.name,
            votes: placement.contestant.vote_count,
            evicted: placement.contestant.evicted,
        }
    }
}

/// Writes standings as `rank,id,name,votes,evicted`, active contestants first.
pub struct StandingsWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StandingsWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_standings(&mut self, standings: &Standings) -> Result<()> {
        let mut wrote_any = false;
        for placement in standings.display_order() {
            self.writer.serialize(StandingsRow::from(placement))?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer
                .write_record(["rank", "id", "name", "votes", "evicted"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ranking::rank;
    use crate::domain::contestant::{Contestant, ContestantId, NewContestant};
    use chrono::Utc;

    fn contestant(id: &str, name: &str, votes: u64, evicted: bool) -> Contestant {
        let mut contestant = Contestant::new(
            ContestantId::new(id),
            NewContestant {
                name: name.to_string(),
                ..Default::default()
            },
            Utc::now(),
        );
        contestant.vote_count = votes;
        contestant.evicted = evicted;
        contestant
    }

    fn render(standings: &Standings) -> String {
        let mut out = Vec::new();
        StandingsWriter::new(&mut out)
            .write_standings(standings)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_writes_active_then_evicted() {
        let standings = rank(&[
            contestant("a", "Ada", 50, false),
            contestant("b", "Bola", 80, true),
            contestant("c", "Chidi, Jr.", 30, false),
        ]);
        assert_eq!(
            render(&standings),
            "rank,id,name,votes,evicted\n\
             1,a,Ada,50,false\n\
             2,c,\"Chidi, Jr.\",30,false\n\
             ,b,Bola,80,true\n"
        );
    }

    #[test]
    fn test_empty_standings_still_has_header() {
        assert_eq!(render(&Standings::default()), "rank,id,name,votes,evicted\n");
    }
}
