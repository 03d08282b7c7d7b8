//! Card level histogram from the card levels page.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

use super::{element_text, parse_level, selector, PageDocument};
use crate::models::{CardLevelHistogram, MAX_TRACKED_LEVEL, MIN_TRACKED_LEVEL};

static LEVEL_ELEMENT: Lazy<Selector> = Lazy::new(|| selector("[class*='level'], [class*='lvl']"));

/// Per-level summary row patterns: `Level <N> <count> <x> <pct>%`, then the
/// same without the label. Indexed by level.
static SUMMARY_ROWS: Lazy<Vec<(u8, [Regex; 2])>> = Lazy::new(|| {
    (MIN_TRACKED_LEVEL..=MAX_TRACKED_LEVEL)
        .rev()
        .map(|level| {
            let labeled = format!(r"(?i)(?:Lvl|Level)\s*{}\s+(\d+)\s+\d+\s+\d+%", level);
            let bare = format!(r"(?i){}\s+(\d+)\s+\d+\s+\d+%", level);
            (level, [Regex::new(&labeled).unwrap(), Regex::new(&bare).unwrap()])
        })
        .collect()
});

/// Count owned cards per level.
///
/// Counts level-labeled elements (one per matching element, nested labels
/// included). When nothing is found, falls back to summary rows in the page
/// text.
pub fn extract_card_levels(doc: &PageDocument) -> CardLevelHistogram {
    let histogram = count_level_elements(doc);
    if !histogram.is_empty() {
        return histogram;
    }

    tracing::debug!("No level elements found, trying summary rows");
    summary_rows(doc.text())
}

fn count_level_elements(doc: &PageDocument) -> CardLevelHistogram {
    let levels = doc
        .html()
        .select(&LEVEL_ELEMENT)
        .filter_map(|el| parse_level(element_text(&el).trim()))
        .filter_map(|level| u8::try_from(level).ok())
        .map(|level| (level, 1));
    CardLevelHistogram::from_counts(levels)
}

fn summary_rows(text: &str) -> CardLevelHistogram {
    let counts = SUMMARY_ROWS.iter().filter_map(|(level, patterns)| {
        let count = patterns.iter().find_map(|re| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                // Digits only, so a failed parse is an overflow.
                .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX))
        })?;
        (count > 0).then_some((*level, count))
    });
    CardLevelHistogram::from_counts(counts)
}
