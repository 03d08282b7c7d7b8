//! Player profile and card models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::PlayerTag;

/// Lowest card level tracked by the histogram.
pub const MIN_TRACKED_LEVEL: u8 = 9;

/// Highest card level tracked by the histogram.
pub const MAX_TRACKED_LEVEL: u8 = 16;

/// Basic profile information from a player's main page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicProfile {
    /// Canonical tag
    pub tag: PlayerTag,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// King level (1-60)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub king_level: Option<u32>,

    /// Current trophies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trophies: Option<u32>,

    /// Personal best trophies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_trophies: Option<u32>,

    /// Arena index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arena: Option<u32>,

    /// Clan name, `None` when the player is not in a clan.
    /// Always serialized.
    pub clan: Option<String>,

    /// Lifetime three-crown wins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub three_crown_wins: Option<u64>,

    /// Unlocked achievement names, sorted and unique
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub achievements: Vec<String>,
}

impl BasicProfile {
    /// Create an empty profile for a tag.
    pub fn new(tag: PlayerTag) -> Self {
        Self {
            tag,
            name: None,
            king_level: None,
            trophies: None,
            best_trophies: None,
            arena: None,
            clan: None,
            three_crown_wins: None,
            achievements: Vec::new(),
        }
    }
}

/// Count of owned cards per level band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardLevelHistogram {
    /// Level -> count, always holding every key from 9 to 16
    pub levels: BTreeMap<u8, u32>,
    pub total_14_plus: u32,
    pub total_15_plus: u32,
}

impl Default for CardLevelHistogram {
    fn default() -> Self {
        Self::from_counts(std::iter::empty())
    }
}

impl CardLevelHistogram {
    /// Build a histogram from `(level, count)` pairs.
    ///
    /// Levels outside 9..=16 are ignored; missing levels count as zero.
    /// Repeated levels are summed, saturating at `u32::MAX`.
    pub fn from_counts(counts: impl IntoIterator<Item = (u8, u32)>) -> Self {
        let mut levels: BTreeMap<u8, u32> = (MIN_TRACKED_LEVEL..=MAX_TRACKED_LEVEL)
            .map(|level| (level, 0))
            .collect();

        for (level, count) in counts {
            if let Some(slot) = levels.get_mut(&level) {
                *slot = slot.saturating_add(count);
            }
        }

        let mut histogram = Self {
            levels,
            total_14_plus: 0,
            total_15_plus: 0,
        };
        histogram.recompute_totals();
        histogram
    }

    /// Count at a given level (zero for untracked levels).
    pub fn count(&self, level: u8) -> u32 {
        self.levels.get(&level).copied().unwrap_or(0)
    }

    /// Returns true if every bucket is zero.
    pub fn is_empty(&self) -> bool {
        self.levels.values().all(|&c| c == 0)
    }

    fn recompute_totals(&mut self) {
        self.total_15_plus = self.count(15).saturating_add(self.count(16));
        self.total_14_plus = self.total_15_plus.saturating_add(self.count(14));
    }
}

/// Unlocked cards in the special collections of a profile page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCollection {
    pub tower: Vec<String>,
    pub hero: Vec<String>,
    pub evolution: Vec<String>,
}

/// A `{count, cards}` pair as exposed in API payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub count: usize,
    pub cards: Vec<String>,
}

impl From<Vec<String>> for CollectionSummary {
    fn from(cards: Vec<String>) -> Self {
        Self {
            count: cards.len(),
            cards,
        }
    }
}

/// Cards owned at one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardByLevelEntry {
    pub level: u8,
    pub count: usize,
    pub cards: Vec<String>,
}

impl CardByLevelEntry {
    /// Build an entry, sorting the names alphabetically.
    pub fn new(level: u8, mut cards: Vec<String>) -> Self {
        cards.sort();
        Self {
            level,
            count: cards.len(),
            cards,
        }
    }
}

/// Rarity breakdown, approximated from collection sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityCounts {
    pub champion: usize,
    pub evolution: usize,
}

/// Card statistics section of a player record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStats {
    #[serde(flatten)]
    pub histogram: CardLevelHistogram,
    pub by_rarity: RarityCounts,
}

/// Complete player record returned by the main endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(flatten)]
    pub profile: BasicProfile,

    /// `None` when the card levels page was unavailable
    pub cards: Option<CardStats>,

    pub towers: CollectionSummary,
    pub heroes: CollectionSummary,
    pub evolutions: CollectionSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_histogram_default_has_all_levels() {
        let histogram = CardLevelHistogram::default();
        let keys: Vec<u8> = histogram.levels.keys().copied().collect();
        assert_eq!(keys, vec![9, 10, 11, 12, 13, 14, 15, 16]);
        assert!(histogram.is_empty());
        assert_eq!(histogram.total_14_plus, 0);
        assert_eq!(histogram.total_15_plus, 0);
    }

    #[test]
    fn test_histogram_totals() {
        let histogram =
            CardLevelHistogram::from_counts([(16, 2), (15, 3), (14, 5), (13, 7), (9, 1)]);
        assert_eq!(histogram.total_15_plus, 5);
        assert_eq!(histogram.total_14_plus, 10);
        assert_eq!(histogram.count(13), 7);
    }

    #[test]
    fn test_histogram_ignores_untracked_levels() {
        let histogram = CardLevelHistogram::from_counts([(8, 4), (17, 1), (12, 2)]);
        assert_eq!(histogram.levels.len(), 8);
        assert_eq!(histogram.count(12), 2);
        assert_eq!(histogram.count(8), 0);
    }

    #[test]
    fn test_histogram_saturates_huge_counts() {
        let histogram =
            CardLevelHistogram::from_counts([(16, u32::MAX), (16, 1), (15, 4_000_000_000)]);
        assert_eq!(histogram.count(16), u32::MAX);
        assert_eq!(histogram.total_15_plus, u32::MAX);
        assert_eq!(histogram.total_14_plus, u32::MAX);
    }

    #[test]
    fn test_histogram_serialization_uses_string_keys() {
        let histogram = CardLevelHistogram::from_counts([(14, 1)]);
        let value = serde_json::to_value(&histogram).unwrap();
        assert_eq!(value["levels"]["14"], json!(1));
        assert_eq!(value["levels"]["9"], json!(0));
        assert_eq!(value["total_14_plus"], json!(1));
    }

    #[test]
    fn test_basic_profile_serializes_null_clan() {
        let profile = BasicProfile::new(PlayerTag::normalize("abc"));
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value, json!({"tag": "#ABC", "clan": null}));
    }

    #[test]
    fn test_card_by_level_entry_sorts() {
        let entry = CardByLevelEntry::new(
            15,
            vec!["Zap".to_string(), "Archers".to_string(), "Knight".to_string()],
        );
        assert_eq!(entry.cards, vec!["Archers", "Knight", "Zap"]);
        assert_eq!(entry.count, 3);
    }

    #[test]
    fn test_collection_summary_from_vec() {
        let summary = CollectionSummary::from(vec!["Tower Princess".to_string()]);
        assert_eq!(summary.count, 1);
    }
}
