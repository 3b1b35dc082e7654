//! Pacenote entries for one stage

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PacenoteError;

/// Distance-keyed pacenote cues for a stage.
///
/// Each cue is one or more whitespace-separated sound identifiers. A
/// distance appears at most once; inserting it again replaces the cue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacenoteSet {
    entries: BTreeMap<i32, String>,
}

impl PacenoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, distance: i32, cue: impl Into<String>) {
        self.entries.insert(distance, cue.into().trim().to_string());
    }

    pub fn get(&self, distance: i32) -> Option<&str> {
        self.entries.get(&distance).map(String::as_str)
    }

    /// Entries in ascending distance order
    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.entries.iter().map(|(d, c)| (*d, c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a pacenote file body: one `distance,cue` per line, blank lines skipped
    pub fn parse(text: &str) -> Result<Self, PacenoteError> {
        let mut set = Self::new();

        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let invalid = || PacenoteError::Parse {
                line: idx + 1,
                content: line.to_string(),
            };
            let (distance, cue) = line.split_once(',').ok_or_else(invalid)?;
            let distance = distance.trim().parse::<i32>().map_err(|_| invalid())?;

            set.insert(distance, cue);
        }

        Ok(set)
    }
}

impl FromIterator<(i32, String)> for PacenoteSet {
    fn from_iter<I: IntoIterator<Item = (i32, String)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (distance, cue) in iter {
            set.insert(distance, cue);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines() {
        let set = PacenoteSet::parse("50,left3\n\n120,right2 caution\n   \n-10,go\n").unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(50), Some("left3"));
        assert_eq!(set.get(120), Some("right2 caution"));
        assert_eq!(set.get(-10), Some("go"));

        let order: Vec<i32> = set.iter().map(|(d, _)| d).collect();
        assert_eq!(order, vec![-10, 50, 120]);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let set = PacenoteSet::parse("50,left3\n50,right6 long\n").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(50), Some("right6 long"));
    }

    #[test]
    fn test_cue_is_trimmed() {
        let set = PacenoteSet::parse("75,  over_crest  \r\n").unwrap();
        assert_eq!(set.get(75), Some("over_crest"));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = PacenoteSet::parse("50,left3\nfifty,left4\n").unwrap_err();
        match err {
            PacenoteError::Parse { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "fifty,left4");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(PacenoteSet::parse("no comma here\n").is_err());
    }

    #[test]
    fn test_json_uses_distance_keys() {
        let set: PacenoteSet = serde_json::from_str(r#"{"50":"left3","120":"right2 caution"}"#).unwrap();
        assert_eq!(set.get(120), Some("right2 caution"));
    }
}
