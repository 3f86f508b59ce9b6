//! Most-recent-first list of submitted search queries.

use serde::{Deserialize, Serialize};

pub const RECENT_SEARCH_CAPACITY: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentSearches {
    entries: Vec<String>,
}

impl RecentSearches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored entries (most recent first), re-applying the
    /// ordering, de-duplication and capacity rules.
    pub fn from_entries(entries: Vec<String>) -> Self {
        let mut recent = Self::new();
        for entry in entries.iter().rev() {
            recent.record(entry);
        }
        recent
    }

    /// Move `query` to the front. Case-insensitive duplicates are dropped and
    /// the list is capped at [`RECENT_SEARCH_CAPACITY`]. Returns false for a
    /// blank query.
    pub fn record(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }

        let lowered = query.to_lowercase();
        self.entries.retain(|e| e.to_lowercase() != lowered);
        self.entries.insert(0, query.to_string());
        self.entries.truncate(RECENT_SEARCH_CAPACITY);
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_puts_latest_first() {
        let mut recent = RecentSearches::new();
        recent.record("Paris");
        recent.record("Oslo");
        assert_eq!(recent.entries(), ["Oslo", "Paris"]);
    }

    #[test]
    fn test_case_insensitive_duplicate_moves_to_front() {
        let mut recent = RecentSearches::new();
        recent.record("Paris");
        recent.record("Oslo");
        recent.record("  PARIS ");
        assert_eq!(recent.entries(), ["PARIS", "Oslo"]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut recent = RecentSearches::new();
        for city in ["A", "B", "C", "D", "E", "F"] {
            recent.record(city);
        }
        assert_eq!(recent.len(), RECENT_SEARCH_CAPACITY);
        assert_eq!(recent.entries(), ["F", "E", "D", "C", "B"]);
    }

    #[test]
    fn test_blank_query_ignored() {
        let mut recent = RecentSearches::new();
        assert!(!recent.record("   "));
        assert!(recent.is_empty());
    }

    #[test]
    fn test_from_entries_normalizes_stored_list() {
        let stored = ["Paris", "paris", "Oslo", "", "Rome", "Lima", "Kyiv", "Baku"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let recent = RecentSearches::from_entries(stored);
        assert_eq!(recent.entries(), ["Paris", "Oslo", "Rome", "Lima", "Kyiv"]);
    }
}
