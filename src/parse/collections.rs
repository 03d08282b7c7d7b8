//! Tower, hero and evolution card collections from a profile page.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::{attr_value, class_attr, element_text, next_section_container, selector, PageDocument};
use crate::models::CardCollection;

static SECTION_HEADING: Lazy<Selector> = Lazy::new(|| selector("h3"));
static CARD_ITEM: Lazy<Selector> =
    Lazy::new(|| selector("div.player_card, div[class*='player_card']"));
static IMG: Lazy<Selector> = Lazy::new(|| selector("img"));

/// Heading text that opens each collection section.
pub const TOWER_SECTION: &str = "Tower Card Collection";
pub const HERO_SECTION: &str = "Hero Card Collection";
pub const EVOLUTION_SECTION: &str = "Evo Card Collection";

/// Extract the three collections. Missing sections give empty lists.
pub fn extract_collections(doc: &PageDocument) -> CardCollection {
    CardCollection {
        tower: section_cards(doc.html(), TOWER_SECTION),
        hero: section_cards(doc.html(), HERO_SECTION),
        evolution: section_cards(doc.html(), EVOLUTION_SECTION),
    }
}

/// Unlocked card names listed under the first heading containing `marker`.
fn section_cards(html: &Html, marker: &str) -> Vec<String> {
    let Some(heading) = html
        .select(&SECTION_HEADING)
        .find(|h| element_text(h).contains(marker))
    else {
        tracing::debug!(section = marker, "Collection section not found");
        return Vec::new();
    };

    let Some(container) = next_section_container(&heading, &CARD_ITEM, &SECTION_HEADING) else {
        return Vec::new();
    };

    let mut cards: Vec<String> = Vec::new();
    for item in container.select(&CARD_ITEM) {
        if is_locked(&item) {
            continue;
        }
        if let Some(name) = card_name(&item) {
            if !cards.contains(&name) {
                cards.push(name);
            }
        }
    }
    cards
}

fn is_locked(item: &ElementRef) -> bool {
    let class = class_attr(item);
    if ["grey", "locked", "not_found"].iter().any(|m| class.contains(m)) {
        return true;
    }
    item.select(&IMG).next().is_some_and(|img| {
        let img_class = class_attr(&img);
        img_class.contains("grey") || img_class.contains("locked")
    })
}

/// Image alt, then image title, then the item's `data-content`.
fn card_name(item: &ElementRef) -> Option<String> {
    let img = item.select(&IMG).next();
    img.as_ref()
        .and_then(|img| attr_value(img, "alt"))
        .or_else(|| img.as_ref().and_then(|img| attr_value(img, "title")))
        .or_else(|| attr_value(item, "data-content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROFILE_HTML: &str = r#"
        <html><body>
          <h3>Tower Card Collection</h3>
          <div class="ui cards">
            <div class="player_card"><img alt="Tower Princess"></div>
            <div class="player_card"><img alt="Cannoneer"></div>
            <div class="player_card grey"><img alt="Dagger Duchess"></div>
          </div>
          <h3>Hero Card Collection</h3>
          <p class="description">Heroes you have unlocked</p>
          <div class="ui cards">
            <div class="player_card"><img title="Hero Knight"></div>
            <div class="player_card" data-content="Hero Giant"><img></div>
            <div class="player_card"><img class="greyscale" alt="Hero Mini Pekka"></div>
            <div class="player_card"><img alt="Hero Knight"></div>
          </div>
          <h3>Evo Card Collection</h3>
          <h3>Something Else</h3>
          <div class="ui cards">
            <div class="player_card"><img alt="Not An Evo"></div>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_sections() {
        let collection = extract_collections(&PageDocument::parse(PROFILE_HTML));
        assert_eq!(collection.tower, vec!["Tower Princess", "Cannoneer"]);
        assert_eq!(collection.hero, vec!["Hero Knight", "Hero Giant"]);
        assert!(collection.evolution.is_empty());
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let collection = extract_collections(&PageDocument::parse(""));
        assert_eq!(collection, CardCollection::default());
    }

    #[test]
    fn test_not_found_items_skipped() {
        let html = r#"<h3>Evo Card Collection</h3>
            <div><div class="player_card not_found"><img alt="Evo Bats"></div>
            <div class="player_card"><img alt="Evo Archers"></div></div>"#;
        let collection = extract_collections(&PageDocument::parse(html));
        assert_eq!(collection.evolution, vec!["Evo Archers"]);
    }
}
