//! Battle log models.

use serde::{Deserialize, Serialize};

use super::PlayerTag;

/// Level assumed for a deck card when the page does not show one.
pub const DEFAULT_CARD_LEVEL: u32 = 14;

/// Outcome of a battle from the player's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BattleResult {
    #[default]
    Victory,
    Defeat,
    Draw,
}

/// Game mode of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleMode {
    Ladder,
    #[serde(rename = "Path of Legend")]
    PathOfLegend,
    #[serde(rename = "Trophy Road")]
    TrophyRoad,
    #[serde(rename = "2v2")]
    TwoVsTwo,
    Challenge,
    Tournament,
    Friendly,
    #[serde(rename = "Special Event")]
    SpecialEvent,
    Unknown,
}

impl BattleMode {
    /// Classify a mode header by keyword containment.
    pub fn classify(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        if lower.contains("ladder") {
            BattleMode::Ladder
        } else if lower.contains("path of legend") {
            BattleMode::PathOfLegend
        } else if lower.contains("trophy road") {
            BattleMode::TrophyRoad
        } else if lower.contains("2v2") {
            BattleMode::TwoVsTwo
        } else if lower.contains("challenge") {
            BattleMode::Challenge
        } else if lower.contains("tournament") {
            BattleMode::Tournament
        } else if lower.contains("friendly") {
            BattleMode::Friendly
        } else if lower.contains("special") || lower.contains("event") {
            BattleMode::SpecialEvent
        } else {
            BattleMode::Unknown
        }
    }
}

impl std::fmt::Display for BattleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BattleMode::Ladder => "Ladder",
            BattleMode::PathOfLegend => "Path of Legend",
            BattleMode::TrophyRoad => "Trophy Road",
            BattleMode::TwoVsTwo => "2v2",
            BattleMode::Challenge => "Challenge",
            BattleMode::Tournament => "Tournament",
            BattleMode::Friendly => "Friendly",
            BattleMode::SpecialEvent => "Special Event",
            BattleMode::Unknown => "Unknown",
        };
        write!(f, "{}", label)
    }
}

/// A card in a battle deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckCard {
    pub name: String,
    pub level: u32,
    pub is_evolution: bool,
}

impl DeckCard {
    /// Build a deck card from a raw key such as `mega-knight` or `firecracker-ev1`.
    pub fn from_key(key: &str, level: Option<u32>) -> Self {
        let is_evolution = strip_evolution_suffix(key).len() != key.len();
        Self {
            name: display_name_from_key(key),
            level: level.unwrap_or(DEFAULT_CARD_LEVEL),
            is_evolution,
        }
    }
}

/// Turn a raw card key into a display name.
///
/// Drops a trailing `-ev<N>` suffix, splits on `-` and capitalizes each word.
pub fn display_name_from_key(key: &str) -> String {
    let base = strip_evolution_suffix(key);
    base.split('-')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_evolution_suffix(key: &str) -> &str {
    if let Some(idx) = key.rfind("-ev") {
        let digits = &key[idx + 3..];
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return &key[..idx];
        }
    }
    key
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// King tower information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerInfo {
    pub level: u32,
}

/// One side of a battle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleParticipant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub clan: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trophies: Option<u32>,

    /// Signed trophy change from this battle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trophy_change: Option<i32>,

    pub crowns: u32,

    pub deck: Vec<DeckCard>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tower: Option<TowerInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_elixir: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_cost: Option<f64>,
}

impl BattleParticipant {
    /// An empty participant with a known crown count.
    pub fn with_crowns(crowns: u32) -> Self {
        Self {
            crowns,
            ..Default::default()
        }
    }
}

/// A single battle from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battle {
    pub result: BattleResult,
    pub mode: BattleMode,

    /// Relative time label as shown on the page (e.g. "2h ago")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ago: Option<String>,

    pub player: BattleParticipant,
    pub opponent: BattleParticipant,
}

impl Battle {
    /// Returns true if at least one side has a deck card.
    pub fn has_deck(&self) -> bool {
        !self.player.deck.is_empty() || !self.opponent.deck.is_empty()
    }
}

/// Battle history for a player, in page order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleHistory {
    pub tag: PlayerTag,
    pub total_battles: usize,
    pub battles: Vec<Battle>,
}

impl BattleHistory {
    pub fn new(tag: PlayerTag, battles: Vec<Battle>) -> Self {
        Self {
            tag,
            total_battles: battles.len(),
            battles,
        }
    }
}
