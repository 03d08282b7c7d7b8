//! Basic profile extraction.
//!
//! Field resolution order:
//!
//! - **name**: page title `"<name> #<tag>"`
//! - **trophies**: stat block, `og:description`, `current / best` ratio,
//!   keyword patterns
//! - **best trophies**: stat block, ratio, keyword patterns
//! - **king level / arena**: stat block, keyword patterns; arena is then
//!   inferred from league text
//! - **clan**: clan element, then `Clan:` / `Member of:` text, unless the
//!   page says "Not in Clan"
//! - **achievements**: unlocked badge icons
//! - **three-crown wins**: page-wide pattern

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

use super::{
    attr_value, class_attr, element_text, first_text, leading_int, parent_element, selector,
    PageDocument,
};
use crate::models::{BasicProfile, PlayerTag};

/// Highest arena index; reached at Legendary Arena / Ultimate Champion.
pub const MAX_ARENA: u32 = 23;

static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static STAT_VALUE: Lazy<Selector> =
    Lazy::new(|| selector(".player_stat_value, .stats_item_value, [class*='stat']"));
static STAT_LABEL: Lazy<Selector> =
    Lazy::new(|| selector(".player_stat_name, .stats_item_name, [class*='label']"));
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:description"]"#));
static CLAN_ELEMENT: Lazy<Selector> = Lazy::new(|| selector(".clan_name, [class*='clan']"));
static BADGE_ICON: Lazy<Selector> = Lazy::new(|| selector(".badge-icon, [class*='badge-icon']"));

static TITLE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.+?)\s*#").unwrap());
static META_TROPHIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,5})\s*trophies").unwrap());
static TROPHY_RATIO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,5})\s*/\s*(\d{1,5})").unwrap());
static KING_LEVEL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)King.*?Level[:\s]*(\d+)", r"(?i)Level (\d+)"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});
static TROPHY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(\d{4,5})\s*(?:Current )?Trophies",
        r"(?i)Trophy.*?(\d{4,5})",
        r"(?i)(\d{4,5})\s*(?:/|,)",
        r"(?i)Current Trophies[:\s]*(\d{4,5})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static BEST_TROPHY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Personal Best[:\s]*(\d{4,5})",
        r"(?i)(?:Best|PB|Highest)[:\s]*(\d{4,5})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static ARENA_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Arena (\d+)").unwrap());
static LEAGUE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"League (\d+)").unwrap());
static CLAN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Clan|Member of)[:\s]*([^\n]+?)(?:\n|Role|Donations)").unwrap()
});
static BADGE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^badge-([a-z0-9-]+?)(?:-\d+)?$").unwrap());
static THREE_CROWN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:,\d{3})+|\d+)\s*(?:three crown|3 crown)").unwrap()
});

/// Extract the basic profile of a player page.
pub fn extract_basic_profile(doc: &PageDocument, tag: &str) -> BasicProfile {
    let text = doc.text();
    let mut profile = BasicProfile::new(PlayerTag::normalize(tag));

    profile.name = name_from_title(doc);

    let stats = StatBlock::scan(doc);
    let ratio = trophy_ratio(text);

    profile.trophies = stats
        .trophies
        .or_else(|| trophies_from_meta(doc))
        .or_else(|| ratio.map(|(current, _)| current).filter(|&c| c > 0))
        .or_else(|| trophies_from_text(text));

    profile.best_trophies = stats
        .best_trophies
        .or_else(|| ratio.map(|(_, best)| best))
        .or_else(|| best_trophies_from_text(text, profile.trophies));

    if let (Some(current), Some(best)) = (profile.trophies, profile.best_trophies) {
        if best < current {
            tracing::debug!(current, best, "Discarding best trophies below current");
            profile.best_trophies = None;
        }
    }

    profile.king_level = stats.king_level.or_else(|| king_level_from_text(text));

    profile.arena = stats
        .arena
        .or_else(|| arena_from_text(text))
        .or_else(|| infer_arena(text));

    profile.clan = extract_clan(doc);
    profile.achievements = extract_achievements(doc);
    profile.three_crown_wins = three_crown_wins(text);

    profile
}

fn name_from_title(doc: &PageDocument) -> Option<String> {
    let title = first_text(&doc.html().root_element(), &TITLE)?;
    TITLE_NAME
        .captures(&title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Values found by pairing stat-value elements with their labels.
#[derive(Debug, Default)]
struct StatBlock {
    trophies: Option<u32>,
    best_trophies: Option<u32>,
    arena: Option<u32>,
    king_level: Option<u32>,
}

impl StatBlock {
    fn scan(doc: &PageDocument) -> Self {
        let mut stats = Self::default();

        for value_el in doc.html().select(&STAT_VALUE) {
            let Some(parent) = parent_element(&value_el) else {
                continue;
            };
            let Some(value) = leading_int(&element_text(&value_el))
                .and_then(|n| u32::try_from(n).ok())
                .filter(|&n| n > 0)
            else {
                continue;
            };

            let label = parent
                .select(&STAT_LABEL)
                .map(|el| element_text(&el))
                .collect::<String>()
                .to_lowercase();

            if label.contains("trophy") || label.contains("trophies") {
                if label.contains("best") || label.contains("personal") {
                    stats.best_trophies.get_or_insert(value);
                } else {
                    stats.trophies.get_or_insert(value);
                }
            }

            if label.contains("arena") {
                stats.arena.get_or_insert(value);
            }

            if label.contains("level") && (1..=60).contains(&value) {
                stats.king_level.get_or_insert(value);
            }
        }

        stats
    }
}

fn trophies_from_meta(doc: &PageDocument) -> Option<u32> {
    let content = doc
        .html()
        .select(&META_DESCRIPTION)
        .find_map(|el| attr_value(&el, "content"))?;
    first_capture(&META_TROPHIES, &content)
}

/// The first `current / best` pair on the page, if best >= current.
fn trophy_ratio(text: &str) -> Option<(u32, u32)> {
    let caps = TROPHY_RATIO.captures(text)?;
    let current: u32 = caps.get(1)?.as_str().parse().ok()?;
    let best: u32 = caps.get(2)?.as_str().parse().ok()?;
    (best >= current).then_some((current, best))
}

fn king_level_from_text(text: &str) -> Option<u32> {
    KING_LEVEL_PATTERNS
        .iter()
        .find_map(|re| first_capture(re, text).filter(|l| (1..=60).contains(l)))
}

fn trophies_from_text(text: &str) -> Option<u32> {
    TROPHY_PATTERNS
        .iter()
        .find_map(|re| first_capture(re, text).filter(|&t| t > 0))
}

fn best_trophies_from_text(text: &str, current: Option<u32>) -> Option<u32> {
    let floor = current.unwrap_or(0);
    BEST_TROPHY_PATTERNS
        .iter()
        .find_map(|re| first_capture(re, text).filter(|&b| b > 0 && b >= floor))
}

fn arena_from_text(text: &str) -> Option<u32> {
    first_capture(&ARENA_PATTERN, text).filter(|&a| a > 0)
}

/// Infer the arena from league wording when no number was found.
fn infer_arena(text: &str) -> Option<u32> {
    if text.contains("Legendary Arena") || text.contains("Ultimate Champion") {
        return Some(MAX_ARENA);
    }
    first_capture(&LEAGUE_PATTERN, text)
        .filter(|league| (1..=10).contains(league))
        .map(|league| 14 + league)
}

fn extract_clan(doc: &PageDocument) -> Option<String> {
    let text = doc.text();
    if text.contains("Not in Clan") {
        return None;
    }

    let from_element = doc
        .html()
        .select(&CLAN_ELEMENT)
        .next()
        .map(|el| element_text(&el))
        .and_then(accept_clan);

    from_element.or_else(|| {
        CLAN_TEXT
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| accept_clan(m.as_str().to_string()))
    })
}

fn accept_clan(candidate: String) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.chars().count() > 2 && !trimmed.to_lowercase().contains("not in") {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Unlocked badges, named from their `badge-<name>[-<tier>]` class.
fn extract_achievements(doc: &PageDocument) -> Vec<String> {
    let mut names = BTreeSet::new();

    for badge in doc.html().select(&BADGE_ICON) {
        let class = class_attr(&badge);
        let lower = class.to_lowercase();
        if ["inactive", "locked", "grey"].iter().any(|m| lower.contains(m)) {
            continue;
        }

        let hidden = parent_element(&badge)
            .and_then(|p| p.value().attr("data-hidden"))
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        if hidden {
            continue;
        }

        let raw = class
            .split_whitespace()
            .filter(|token| !token.eq_ignore_ascii_case("badge-icon"))
            .find_map(|token| BADGE_CLASS.captures(token))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase());

        let Some(raw) = raw else {
            continue;
        };
        if raw.len() < 2 || raw.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let name = badge_display_name(&raw);
        if name.trim().chars().count() > 1 {
            names.insert(name);
        }
    }

    names.into_iter().collect()
}

fn badge_display_name(raw: &str) -> String {
    raw.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn three_crown_wins(text: &str) -> Option<u64> {
    let caps = THREE_CROWN.captures(text)?;
    caps.get(1)?.as_str().replace(',', "").parse().ok()
}

fn first_capture(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
