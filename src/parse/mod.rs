//! HTML extraction engine.
//!
//! Each extractor is a pure function over a [`PageDocument`]. None of them
//! fail: missing markup yields absent fields or empty collections. Fields
//! that can be recovered from several places are resolved through an
//! ordered chain of strategies, each returning `Option`, where the first
//! `Some` wins.

pub mod basic;
pub mod battles;
pub mod card_levels;
pub mod cards_by_level;
pub mod collections;

pub use basic::extract_basic_profile;
pub use battles::{extract_battle_history, BattleError};
pub use card_levels::extract_card_levels;
pub use cards_by_level::extract_cards_by_level;
pub use collections::extract_collections;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// `Lvl 14` / `Level 14`, case-insensitive.
static LEVEL_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Lvl|Level)\s*(\d{1,2})").unwrap());

/// A parsed page: the element tree plus its flattened visible text.
pub struct PageDocument {
    html: Html,
    text: String,
}

impl PageDocument {
    /// Parse raw HTML. Never fails; empty input gives an empty document.
    pub fn parse(raw: &str) -> Self {
        let html = Html::parse_document(raw);
        let mut text = String::new();
        collect_text(&html.root_element(), &mut text);
        Self { html, text }
    }

    /// The element tree.
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// All visible text, with line breaks around block elements.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Debug for PageDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageDocument")
            .field("text_len", &self.text.len())
            .finish()
    }
}

fn collect_text(element: &ElementRef, text: &mut String) {
    const BLOCK_TAGS: &[&str] = &[
        "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "br", "hr",
        "blockquote", "pre", "section", "article", "table", "td", "th", "ul", "ol", "title",
    ];
    const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "template"];

    for child in element.children() {
        match child.value() {
            scraper::node::Node::Text(t) => text.push_str(&t.text),
            scraper::node::Node::Element(el) => {
                let tag = el.name();
                if SKIP_TAGS.contains(&tag) {
                    continue;
                }

                if let Some(child_ref) = ElementRef::wrap(child) {
                    let is_block = BLOCK_TAGS.contains(&tag);
                    if is_block {
                        text.push('\n');
                    }
                    collect_text(&child_ref, text);
                    if is_block {
                        text.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
}

/// Build a selector from a constant. Only used with literals.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {:?}: {:?}", css, e))
}

/// Concatenated text of an element and its descendants.
pub(crate) fn element_text(element: &ElementRef) -> String {
    element.text().collect()
}

/// Concatenated text of every match of `sel` under `scope`.
pub(crate) fn joined_text(scope: &ElementRef, sel: &Selector) -> String {
    scope
        .select(sel)
        .map(|el| element_text(&el))
        .collect::<String>()
}

/// Trimmed text of the first match, `None` when missing or blank.
pub(crate) fn first_text(scope: &ElementRef, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .map(|el| element_text(&el).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The raw `class` attribute, or an empty string.
pub(crate) fn class_attr<'a>(element: &ElementRef<'a>) -> &'a str {
    element.value().attr("class").unwrap_or("")
}

/// Non-empty, trimmed attribute value.
pub(crate) fn attr_value(element: &ElementRef, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The parent node, if it is an element.
pub(crate) fn parent_element<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.parent().and_then(ElementRef::wrap)
}

/// Parse a level out of a `Lvl <N>` / `Level <N>` label.
pub(crate) fn parse_level(text: &str) -> Option<u32> {
    LEVEL_LABEL
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse the leading integer of a text, ignoring thousands separators.
///
/// `"9,679 trophies"` gives `9679`; text that does not start with a digit
/// (after an optional sign) gives `None`.
pub(crate) fn leading_int(text: &str) -> Option<i64> {
    let cleaned: String = text.trim().chars().filter(|&c| c != ',').collect();
    let (sign, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Walk forward from `start` through its following sibling elements and
/// return the first one containing a match for `content`.
///
/// Stops with `None` when a sibling matching `boundary` (e.g. the next
/// section heading) is reached first.
pub(crate) fn next_section_container<'a>(
    start: &ElementRef<'a>,
    content: &Selector,
    boundary: &Selector,
) -> Option<ElementRef<'a>> {
    for sibling in start.next_siblings().filter_map(ElementRef::wrap) {
        if boundary.matches(&sibling) {
            return None;
        }
        if sibling.select(content).next().is_some() {
            return Some(sibling);
        }
    }
    None
}
