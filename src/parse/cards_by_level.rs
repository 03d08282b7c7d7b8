//! Card names grouped by level, from the card levels page.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

use super::{attr_value, element_text, parent_element, parse_level, selector, PageDocument};
use crate::models::{CardByLevelEntry, MAX_TRACKED_LEVEL, MIN_TRACKED_LEVEL};

static CARD_LIKE: Lazy<Selector> = Lazy::new(|| selector("[class*='card']"));
static LEVEL_LABEL_ELEMENT: Lazy<Selector> =
    Lazy::new(|| selector("[class*='level'], [class*='lvl']"));
static IMG: Lazy<Selector> = Lazy::new(|| selector("img"));

/// Inside an element already labeled as a level the prefix is optional.
static LABELED_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Lvl|Level)?\s*(\d{1,2})").unwrap());

/// Group card names by level, highest level first.
///
/// Only levels holding at least one card are returned; names within a level
/// are unique and sorted.
pub fn extract_cards_by_level(doc: &PageDocument) -> Vec<CardByLevelEntry> {
    let mut buckets: BTreeMap<u8, Vec<String>> = (MIN_TRACKED_LEVEL..=MAX_TRACKED_LEVEL)
        .map(|level| (level, Vec::new()))
        .collect();

    for card in doc.html().select(&CARD_LIKE) {
        let Some(level) = card_level(&card) else {
            continue;
        };
        let Some(name) = card_name(&card) else {
            continue;
        };
        if let Some(cards) = buckets.get_mut(&level) {
            if !cards.contains(&name) {
                cards.push(name);
            }
        }
    }

    buckets
        .into_iter()
        .rev()
        .filter(|(_, cards)| !cards.is_empty())
        .map(|(level, cards)| CardByLevelEntry::new(level, cards))
        .collect()
}

/// Level from a nested level label, else from the parent's text.
fn card_level(card: &ElementRef) -> Option<u8> {
    let nested = card.select(&LEVEL_LABEL_ELEMENT).next().and_then(|label| {
        LABELED_LEVEL
            .captures(&element_text(&label))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|&l| l > 0)
    });

    let level = nested.or_else(|| {
        parent_element(card)
            .and_then(|parent| parse_level(&element_text(&parent)))
            .filter(|&l| l > 0)
    })?;

    u8::try_from(level)
        .ok()
        .filter(|l| (MIN_TRACKED_LEVEL..=MAX_TRACKED_LEVEL).contains(l))
}

fn card_name(card: &ElementRef) -> Option<String> {
    let img = card.select(&IMG).next();
    img.as_ref()
        .and_then(|img| attr_value(img, "alt"))
        .or_else(|| img.as_ref().and_then(|img| attr_value(img, "title")))
        .or_else(|| attr_value(card, "data-content"))
}
