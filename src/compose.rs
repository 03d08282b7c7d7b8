//! Assembly of the full player record from independent extractions.

use crate::models::{
    BasicProfile, CardCollection, CardLevelHistogram, CardStats, PlayerRecord, RarityCounts,
};
use crate::parse::{extract_basic_profile, extract_card_levels, extract_collections, PageDocument};

impl PlayerRecord {
    /// Combine a profile, an optional histogram and the card collections.
    ///
    /// Rarity counts reuse the collection sizes: champions are the hero
    /// cards, evolutions the evolution cards.
    pub fn compose(
        profile: BasicProfile,
        histogram: Option<CardLevelHistogram>,
        collection: CardCollection,
    ) -> Self {
        let cards = histogram.map(|histogram| CardStats {
            histogram,
            by_rarity: RarityCounts {
                champion: collection.hero.len(),
                evolution: collection.evolution.len(),
            },
        });

        Self {
            profile,
            cards,
            towers: collection.tower.into(),
            heroes: collection.hero.into(),
            evolutions: collection.evolution.into(),
        }
    }

    /// Extract and compose a record from a profile page and an optional
    /// card levels page.
    pub fn from_pages(tag: &str, profile_html: &str, card_levels_html: Option<&str>) -> Self {
        let doc = PageDocument::parse(profile_html);
        let profile = extract_basic_profile(&doc, tag);
        let collection = extract_collections(&doc);
        let histogram = card_levels_html.map(|html| extract_card_levels(&PageDocument::parse(html)));
        Self::compose(profile, histogram, collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayerTag;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn collection() -> CardCollection {
        CardCollection {
            tower: vec!["Tower Princess".to_string(), "Cannoneer".to_string()],
            hero: vec!["Hero Knight".to_string()],
            evolution: vec![
                "Evo Bats".to_string(),
                "Evo Archers".to_string(),
                "Evo Knight".to_string(),
            ],
        }
    }

    #[test]
    fn test_compose_with_histogram() {
        let profile = BasicProfile::new(PlayerTag::normalize("L2QV2J2RC"));
        let histogram = CardLevelHistogram::from_counts([(15, 4), (14, 6)]);
        let record = PlayerRecord::compose(profile, Some(histogram.clone()), collection());

        let cards = record.cards.expect("card stats");
        assert_eq!(cards.histogram, histogram);
        assert_eq!(
            cards.by_rarity,
            RarityCounts {
                champion: 1,
                evolution: 3
            }
        );
        assert_eq!(record.towers.count, 2);
        assert_eq!(record.towers.cards, vec!["Tower Princess", "Cannoneer"]);
        assert_eq!(record.heroes.count, 1);
        assert_eq!(record.evolutions.count, 3);
    }

    #[test]
    fn test_compose_without_histogram_serializes_null_cards() {
        let mut profile = BasicProfile::new(PlayerTag::normalize("#l2qv2j2rc"));
        profile.name = Some("TestPlayer".to_string());
        let record = PlayerRecord::compose(profile, None, CardCollection::default());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "tag": "#L2QV2J2RC",
                "name": "TestPlayer",
                "clan": null,
                "cards": null,
                "towers": {"count": 0, "cards": []},
                "heroes": {"count": 0, "cards": []},
                "evolutions": {"count": 0, "cards": []},
            })
        );
    }

    #[test]
    fn test_from_pages() {
        let profile = r#"<html><head><title>TestPlayer #L2QV2J2RC</title></head><body>
            <h3>Hero Card Collection</h3>
            <div><div class="player_card"><img alt="Hero Knight"></div></div>
            </body></html>"#;
        let card_levels = r#"<span class="card-level">Lvl 15</span>"#;

        let record = PlayerRecord::from_pages("l2qv2j2rc", profile, Some(card_levels));
        assert_eq!(record.profile.name.as_deref(), Some("TestPlayer"));
        assert_eq!(record.profile.tag.as_str(), "#L2QV2J2RC");
        let cards = record.cards.expect("card stats");
        assert_eq!(cards.histogram.count(15), 1);
        assert_eq!(cards.by_rarity.champion, 1);

        let record = PlayerRecord::from_pages("l2qv2j2rc", profile, None);
        assert!(record.cards.is_none());
        assert_eq!(record.heroes.cards, vec!["Hero Knight"]);
    }

    #[test]
    fn test_card_stats_flatten_histogram() {
        let profile = BasicProfile::new(PlayerTag::normalize("abc"));
        let histogram = CardLevelHistogram::from_counts([(16, 1)]);
        let record = PlayerRecord::compose(profile, Some(histogram), collection());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["cards"]["levels"]["16"], json!(1));
        assert_eq!(value["cards"]["total_15_plus"], json!(1));
        assert_eq!(value["cards"]["by_rarity"], json!({"champion": 1, "evolution": 3}));
    }
}
