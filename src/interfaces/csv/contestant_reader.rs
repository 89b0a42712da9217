use crate::domain::contestant::{Contestant, ContestantId, NewContestant};
use crate::error::{Result, VoteError};
use chrono::Utc;
use serde::Deserialize;
use std::io::Read;

/// One seed row: `id, name, bio, category, location, age, image_url`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ContestantRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<ContestantRecord> for Contestant {
    /// Rows without an id get a generated one. Tallies always start at zero.
    fn from(record: ContestantRecord) -> Self {
        let id = record
            .id
            .map(ContestantId::new)
            .unwrap_or_else(ContestantId::generate);
        let details = NewContestant {
            name: record.name,
            bio: record.bio.unwrap_or_default(),
            category: record.category.unwrap_or_default(),
            location: record.location.unwrap_or_default(),
            age: record.age,
            image_url: record.image_url.unwrap_or_default(),
        };
        Contestant::new(id, details, Utc::now())
    }
}

/// Reads the seed roster from a CSV source.
///
/// Unquoted fields are trimmed. A quoted field must open right after the
/// comma; `, "Lagos, Nigeria"` is read as two unquoted fields.
pub struct ContestantReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ContestantReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn contestants(self) -> impl Iterator<Item = Result<Contestant>> {
        self.reader
            .into_deserialize::<ContestantRecord>()
            .map(|result| result.map(Contestant::from).map_err(VoteError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_roster() {
        let data = "id,name,bio,category,location,age,image_url\n\
                    c1,Ada Obi,Sings,Music,\"Lagos, Nigeria\",24,https://img/1.png\n\
                    , Tunde, , Dance\n";
        let results: Vec<Result<Contestant>> =
            ContestantReader::new(data.as_bytes()).contestants().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.id.as_str(), "c1");
        assert_eq!(first.location, "Lagos, Nigeria");
        assert_eq!(first.age, Some(24));
        assert_eq!(first.vote_count, 0);
        assert!(!first.evicted);

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.name, "Tunde");
        assert_eq!(second.category, "Dance");
        assert!(!second.id.as_str().is_empty());
        assert_eq!(second.age, None);
    }

    #[test]
    fn test_quoted_locations_keep_their_commas() {
        let data = "id,name,bio,category,location,age,image_url\n\
                    p1,Chioma Eze,\"Singer, songwriter\",Music,\"Port Harcourt, Nigeria\",23,\n\
                    p2,Kwame Mensah,Comedian,Comedy,\"Kumasi, Ghana\",,\n";
        let roster: Vec<Contestant> = ContestantReader::new(data.as_bytes())
            .contestants()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].bio, "Singer, songwriter");
        assert_eq!(roster[0].location, "Port Harcourt, Nigeria");
        assert_eq!(roster[0].age, Some(23));
        assert_eq!(roster[1].location, "Kumasi, Ghana");
        assert_eq!(roster[1].age, None);
    }

    #[test]
    fn test_reader_malformed_age() {
        let data = "id, name, bio, category, location, age\nc1, Ada, , , , old\n";
        let results: Vec<Result<Contestant>> =
            ContestantReader::new(data.as_bytes()).contestants().collect();
        assert!(matches!(results[0], Err(VoteError::Csv(_))));
    }
}
