//! Battle log extraction.
//!
//! Every battle container is parsed on its own. A container that fails is
//! logged and skipped, so one malformed battle never voids the history.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use thiserror::Error;

use super::{
    attr_value, class_attr, element_text, first_text, joined_text, parse_level, selector,
    PageDocument,
};
use crate::models::{
    Battle, BattleHistory, BattleMode, BattleParticipant, BattleResult, DeckCard, PlayerTag,
    TowerInfo,
};

static CONTAINER: Lazy<Selector> =
    Lazy::new(|| selector(".battle_list_battle, .ui.attached.segment.battle"));
static RIBBON: Lazy<Selector> =
    Lazy::new(|| selector(".ui.left.ribbon.label, .ui.right.ribbon.label"));
static MODE_HEADER: Lazy<Selector> = Lazy::new(|| selector(".game_mode_header, h4.ui.header"));
static TIME_LABEL: Lazy<Selector> =
    Lazy::new(|| selector(".battle-timestamp-popup, .i18n_duration_short"));
static RESULT_HEADER: Lazy<Selector> = Lazy::new(|| selector(".result_header"));
static TEAM_SEGMENT: Lazy<Selector> = Lazy::new(|| selector(".team-segment"));
static PLAYER_NAME: Lazy<Selector> = Lazy::new(|| selector(".player_name_header"));
static PLAYER_CLAN: Lazy<Selector> = Lazy::new(|| selector(".battle_player_clan"));
static TROPHY_LABEL: Lazy<Selector> =
    Lazy::new(|| selector(".trophy_container .ui.label:not(.basic)"));
static TROPHY_DELTA_LABEL: Lazy<Selector> =
    Lazy::new(|| selector(".trophy_container .ui.basic.label"));
static DECK_CARD: Lazy<Selector> = Lazy::new(|| selector(".deck_card"));
static DECK_CARD_SLOT: Lazy<Selector> = Lazy::new(|| selector(".deck_card__four_wide"));
static CARD_LEVEL: Lazy<Selector> = Lazy::new(|| selector(".card-level"));
static TOWER_CARD: Lazy<Selector> =
    Lazy::new(|| selector(".deck_tower_card__container, .deck_tower_card"));
static STAT_ITEM: Lazy<Selector> = Lazy::new(|| selector(".battle_stats .item"));

static SCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*[-–—]\s*(\d+)").unwrap());
static TROPHY_DELTA: Lazy<Regex> = Lazy::new(|| Regex::new(r"([+-]\d+)").unwrap());
static LEADING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d[\d,]*)").unwrap());
static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

const AVG_ELIXIR_LABEL: &str = "Avg Elixir";
const CYCLE_LABEL: &str = "4-Card Cycle";

/// Why a single battle container could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BattleError {
    #[error("{field} value {raw:?} is out of range")]
    NumberOutOfRange { field: &'static str, raw: String },
}

/// Extract the battle history, in page order.
pub fn extract_battle_history(doc: &PageDocument, tag: &str) -> BattleHistory {
    let tag = PlayerTag::normalize(tag);
    let mut battles = Vec::new();

    for (index, container) in doc.html().select(&CONTAINER).enumerate() {
        match parse_battle(&container) {
            Ok(battle) if battle.has_deck() => battles.push(battle),
            Ok(_) => {
                tracing::debug!(index, "Dropping battle container without deck cards");
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping malformed battle container");
            }
        }
    }

    tracing::debug!(tag = %tag, count = battles.len(), "Extracted battles");
    BattleHistory::new(tag, battles)
}

fn parse_battle(container: &ElementRef) -> Result<Battle, BattleError> {
    let result = battle_result(container);

    let mode_text = first_text(container, &MODE_HEADER).unwrap_or_else(|| "Ladder".to_string());
    let mode = BattleMode::classify(&mode_text);

    // The duration span sits inside the popup; one match is the whole label.
    let time_ago = first_text(container, &TIME_LABEL);

    let (player_crowns, opponent_crowns) = crown_score(container)?;

    let mut player = BattleParticipant::with_crowns(player_crowns);
    let mut opponent = BattleParticipant::with_crowns(opponent_crowns);
    for (position, segment) in container.select(&TEAM_SEGMENT).take(2).enumerate() {
        if position == 0 {
            player = parse_participant(&segment, player_crowns)?;
        } else {
            opponent = parse_participant(&segment, opponent_crowns)?;
        }
    }

    Ok(Battle {
        result,
        mode,
        time_ago,
        player,
        opponent,
    })
}

/// Ribbon text wins over ribbon color; a red ribbon means defeat.
fn battle_result(container: &ElementRef) -> BattleResult {
    let Some(ribbon) = container.select(&RIBBON).next() else {
        return BattleResult::Victory;
    };
    let text = element_text(&ribbon).to_lowercase();
    let is_red = class_attr(&ribbon).split_whitespace().any(|c| c == "red");

    if text.contains("defeat") || is_red {
        BattleResult::Defeat
    } else if text.contains("draw") {
        BattleResult::Draw
    } else {
        BattleResult::Victory
    }
}

fn crown_score(container: &ElementRef) -> Result<(u32, u32), BattleError> {
    let header = joined_text(container, &RESULT_HEADER);
    let Some(caps) = SCORE.captures(&header) else {
        return Ok((0, 0));
    };
    let player = parse_number("crowns", &caps[1])?;
    let opponent = parse_number("crowns", &caps[2])?;
    Ok((player, opponent))
}

fn parse_participant(segment: &ElementRef, crowns: u32) -> Result<BattleParticipant, BattleError> {
    let trophies = match first_text(segment, &TROPHY_LABEL) {
        Some(label) => match LEADING_DIGITS.captures(&label) {
            Some(caps) => Some(parse_number("trophies", &caps[1].replace(',', ""))?),
            None => None,
        },
        None => None,
    };

    let delta_text = joined_text(segment, &TROPHY_DELTA_LABEL);
    let trophy_change = match TROPHY_DELTA.captures(&delta_text) {
        Some(caps) => Some(parse_number("trophy change", &caps[1])?),
        None => None,
    };

    Ok(BattleParticipant {
        name: first_text(segment, &PLAYER_NAME),
        clan: first_text(segment, &PLAYER_CLAN),
        trophies,
        trophy_change,
        crowns,
        deck: deck_cards(segment),
        tower: tower_level(segment).map(|level| TowerInfo { level }),
        avg_elixir: stat_value(segment, AVG_ELIXIR_LABEL),
        cycle_cost: stat_value(segment, CYCLE_LABEL),
    })
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, BattleError> {
    raw.parse().map_err(|_| BattleError::NumberOutOfRange {
        field,
        raw: raw.to_string(),
    })
}

fn deck_cards(segment: &ElementRef) -> Vec<DeckCard> {
    segment
        .select(&DECK_CARD)
        .filter_map(|card| {
            let key = attr_value(&card, "data-card-key")?;
            Some(DeckCard::from_key(&key, deck_card_level(&card)))
        })
        .collect()
}

/// Level label from the card's slot, else from a label next to the card.
fn deck_card_level(card: &ElementRef) -> Option<u32> {
    let slot = card
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| DECK_CARD_SLOT.matches(el));

    if let Some(level) = slot.and_then(|slot| parse_level(&joined_text(&slot, &CARD_LEVEL))) {
        return Some(level);
    }

    sibling_level_label(card).and_then(|label| parse_level(&element_text(&label)))
}

/// Nearest level label among the card's siblings, not crossing another card.
///
/// Labels before the card are preferred over labels after it.
fn sibling_level_label<'a>(card: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let is_other_card =
        |el: &ElementRef| DECK_CARD.matches(el) || el.select(&DECK_CARD).next().is_some();
    let label_in = |el: ElementRef<'a>| {
        if CARD_LEVEL.matches(&el) {
            Some(el)
        } else {
            el.select(&CARD_LEVEL).next()
        }
    };

    card.prev_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(|el| !is_other_card(el))
        .find_map(label_in)
        .or_else(|| {
            card.next_siblings()
                .filter_map(ElementRef::wrap)
                .take_while(|el| !is_other_card(el))
                .find_map(label_in)
        })
}

fn tower_level(segment: &ElementRef) -> Option<u32> {
    let text: String = segment
        .select(&TOWER_CARD)
        .map(|tower| joined_text(&tower, &CARD_LEVEL))
        .collect();
    parse_level(&text)
}

/// First decimal after `label` in the matching stats item.
///
/// Falls back to the item text with the label removed, for items that put
/// the value first.
fn stat_value(segment: &ElementRef, label: &str) -> Option<f64> {
    let text = segment
        .select(&STAT_ITEM)
        .map(|item| element_text(&item))
        .find(|text| text.contains(label))?;

    let (before, after) = text.split_once(label)?;
    DECIMAL
        .find(after)
        .or_else(|| DECIMAL.find(before))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(html: &str) -> BattleHistory {
        extract_battle_history(&PageDocument::parse(html), "TEST")
    }

    fn simple_battle(ribbon: &str, player_key: &str, opponent_key: &str) -> String {
        format!(
            r#"<div class="battle_list_battle">
                {ribbon}
                <div class="team-segment">
                  <div class="deck_card__four_wide">
                    <img class="deck_card" data-card-key="{player_key}" />
                  </div>
                </div>
                <div class="team-segment">
                  <div class="deck_card__four_wide">
                    <img class="deck_card" data-card-key="{opponent_key}" />
                  </div>
                </div>
              </div>"#
        )
    }

    #[test]
    fn test_empty_page() {
        let history = extract_battle_history(&PageDocument::parse(""), "L2QV2J2RC");
        assert_eq!(history.tag.as_str(), "#L2QV2J2RC");
        assert_eq!(history.total_battles, 0);
        assert!(history.battles.is_empty());
    }

    #[test]
    fn test_tag_normalization() {
        let doc = PageDocument::parse("<html><body></body></html>");
        for raw in ["L2QV2J2RC", "#L2QV2J2RC", "l2qv2j2rc"] {
            assert_eq!(extract_battle_history(&doc, raw).tag.as_str(), "#L2QV2J2RC");
        }
    }

    #[test]
    fn test_result_and_mode() {
        let html = r#"<html><body>
            <div class="battle_list_battle">
              <div class="ui left ribbon label blue">Victory</div>
              <h4 class="game_mode_header">Ladder</h4>
              <div class="battle-timestamp-popup">2h ago</div>
              <div class="result_header">3 - 0</div>
              <div class="team-segment">
                <a class="player_name_header">TestPlayer</a>
                <div class="deck_card__four_wide">
                  <div class="card-level">Lvl 15</div>
                  <img class="deck_card" data-card-key="pekka" />
                </div>
              </div>
              <div class="team-segment">
                <a class="player_name_header">Opponent</a>
                <div class="deck_card__four_wide">
                  <div class="card-level">Lvl 14</div>
                  <img class="deck_card" data-card-key="giant" />
                </div>
              </div>
            </div>
        </body></html>"#;

        let history = parse(html);
        assert_eq!(history.total_battles, 1);
        let battle = &history.battles[0];
        assert_eq!(battle.result, BattleResult::Victory);
        assert_eq!(battle.mode, BattleMode::Ladder);
        assert_eq!(battle.time_ago.as_deref(), Some("2h ago"));
        assert_eq!(battle.player.crowns, 3);
        assert_eq!(battle.opponent.crowns, 0);
    }

    #[test]
    fn test_crowns_and_red_ribbon() {
        let html = r#"<div class="battle_list_battle">
              <div class="ui left ribbon label red">Defeat</div>
              <div class="result_header">1 – 3</div>
              <div class="team-segment">
                <div class="deck_card__four_wide"><img class="deck_card" data-card-key="pekka" /></div>
              </div>
              <div class="team-segment">
                <div class="deck_card__four_wide"><img class="deck_card" data-card-key="giant" /></div>
              </div>
            </div>"#;

        let battle = &parse(html).battles[0];
        assert_eq!(battle.result, BattleResult::Defeat);
        assert_eq!(battle.player.crowns, 1);
        assert_eq!(battle.opponent.crowns, 3);
        assert_eq!(battle.time_ago, None);
    }

    #[test]
    fn test_draw_and_missing_score() {
        let html = simple_battle(
            r#"<div class="ui left ribbon label">Draw</div>"#,
            "pekka",
            "giant",
        );
        let battle = &parse(&html).battles[0];
        assert_eq!(battle.result, BattleResult::Draw);
        assert_eq!(battle.player.crowns, 0);
        assert_eq!(battle.opponent.crowns, 0);
    }

    #[test]
    fn test_participants() {
        let html = r#"<div class="battle_list_battle">
              <div class="team-segment">
                <a class="player_name_header">PlayerOne</a>
                <a class="battle_player_clan">Elite Warriors</a>
                <div class="trophy_container">
                  <div class="ui label">9,679</div>
                  <div class="ui basic blue label">+30</div>
                </div>
                <div class="deck_card__four_wide">
                  <div class="card-level">Lvl 15</div>
                  <img class="deck_card" data-card-key="pekka" />
                </div>
                <div class="deck_card__four_wide">
                  <div class="card-level">Lvl 14</div>
                  <img class="deck_card" data-card-key="mega-knight" />
                </div>
                <div class="deck_card__four_wide">
                  <div class="card-level">Lvl 16</div>
                  <img class="deck_card" data-card-key="firecracker-ev1" />
                </div>
                <div class="deck_tower_card__container">
                  <div class="card-level">Level 15</div>
                </div>
                <div class="ui menu battle_stats">
                  <div class="item">Avg Elixir 3.8</div>
                  <div class="item">4-Card Cycle 10</div>
                </div>
              </div>
              <div class="team-segment">
                <a class="player_name_header">PlayerTwo</a>
                <div class="trophy_container">
                  <div class="ui basic red label">-28</div>
                </div>
                <div class="deck_card__four_wide">
                  <div class="card-level">Lvl 13</div>
                  <img class="deck_card" data-card-key="giant" />
                </div>
              </div>
            </div>"#;

        let battle = &parse(html).battles[0];
        let player = &battle.player;
        assert_eq!(player.name.as_deref(), Some("PlayerOne"));
        assert_eq!(player.clan.as_deref(), Some("Elite Warriors"));
        assert_eq!(player.trophies, Some(9679));
        assert_eq!(player.trophy_change, Some(30));
        assert_eq!(
            player.deck,
            vec![
                DeckCard {
                    name: "Pekka".to_string(),
                    level: 15,
                    is_evolution: false
                },
                DeckCard {
                    name: "Mega Knight".to_string(),
                    level: 14,
                    is_evolution: false
                },
                DeckCard {
                    name: "Firecracker".to_string(),
                    level: 16,
                    is_evolution: true
                },
            ]
        );
        assert_eq!(player.tower, Some(TowerInfo { level: 15 }));
        assert_eq!(player.avg_elixir, Some(3.8));
        assert_eq!(player.cycle_cost, Some(10.0));

        let opponent = &battle.opponent;
        assert_eq!(opponent.name.as_deref(), Some("PlayerTwo"));
        assert_eq!(opponent.clan, None);
        assert_eq!(opponent.trophies, None);
        assert_eq!(opponent.trophy_change, Some(-28));
        assert_eq!(opponent.deck.len(), 1);
        assert_eq!(opponent.deck[0].name, "Giant");
        assert_eq!(opponent.deck[0].level, 13);
        assert_eq!(opponent.tower, None);
        assert_eq!(opponent.avg_elixir, None);
    }

    #[test]
    fn test_deck_level_defaults_without_label() {
        let html = simple_battle("", "hog-rider", "golem");
        let battle = &parse(&html).battles[0];
        assert_eq!(battle.player.deck[0].name, "Hog Rider");
        assert_eq!(battle.player.deck[0].level, 14);
    }

    #[test]
    fn test_deck_level_from_parent() {
        let html = r#"<div class="battle_list_battle"><div class="team-segment">
              <div><span class="card-level">Lvl 12</span><img class="deck_card" data-card-key="knight" /></div>
            </div></div>"#;
        let battle = &parse(html).battles[0];
        assert_eq!(battle.player.deck[0].level, 12);
        assert!(battle.opponent.deck.is_empty());
    }

    #[test]
    fn test_deck_levels_from_adjacent_labels() {
        let html = r#"<div class="battle_list_battle"><div class="team-segment">
              <span class="card-level">Lvl 11</span><img class="deck_card" data-card-key="knight" />
              <span class="card-level">Lvl 12</span><img class="deck_card" data-card-key="archers" />
              <img class="deck_card" data-card-key="goblins" /><span class="card-level">Lvl 13</span>
            </div></div>"#;
        let deck = &parse(html).battles[0].player.deck;
        let levels: Vec<u32> = deck.iter().map(|card| card.level).collect();
        assert_eq!(levels, vec![11, 12, 13]);
    }

    #[test]
    fn test_nested_time_label_not_doubled() {
        let html = simple_battle(
            r#"<div class="battle-timestamp-popup"><span class="i18n_duration_short">2h ago</span></div>"#,
            "pekka",
            "giant",
        );
        let battle = &parse(&html).battles[0];
        assert_eq!(battle.time_ago.as_deref(), Some("2h ago"));
    }

    #[test]
    fn test_multiple_battles_in_order() {
        let html = format!(
            "<html><body>{}{}</body></html>",
            simple_battle(
                r#"<div class="ui left ribbon label blue">Victory</div>"#,
                "pekka",
                "giant"
            ),
            simple_battle(
                r#"<div class="ui left ribbon label red">Defeat</div>"#,
                "hog-rider",
                "golem"
            ),
        );
        let history = parse(&html);
        assert_eq!(history.total_battles, 2);
        assert_eq!(history.battles[0].result, BattleResult::Victory);
        assert_eq!(history.battles[1].result, BattleResult::Defeat);
        assert_eq!(history.battles[1].player.deck[0].name, "Hog Rider");
    }

    #[test]
    fn test_containers_without_decks_dropped() {
        let html = format!(
            r#"<div class="battle_list_battle">
                 <div class="ui left ribbon label blue">Victory</div>
               </div>{}"#,
            simple_battle(
                r#"<div class="ui left ribbon label red">Defeat</div>"#,
                "pekka",
                "giant"
            ),
        );
        let history = parse(&html);
        assert_eq!(history.total_battles, 1);
        assert_eq!(history.battles[0].result, BattleResult::Defeat);
    }

    #[test]
    fn test_malformed_container_skipped() {
        let broken = r#"<div class="battle_list_battle">
              <div class="result_header">99999999999 - 0</div>
              <div class="team-segment">
                <div class="deck_card__four_wide"><img class="deck_card" data-card-key="pekka" /></div>
              </div>
            </div>"#;
        let html = format!("{}{}", broken, simple_battle("", "giant", "golem"));
        let history = parse(&html);
        assert_eq!(history.total_battles, 1);
        assert_eq!(history.battles[0].player.deck[0].name, "Giant");
    }

    #[test]
    fn test_modes() {
        let cases = [
            ("Ladder", BattleMode::Ladder),
            ("Path of Legend", BattleMode::PathOfLegend),
            ("2v2", BattleMode::TwoVsTwo),
            ("Challenge", BattleMode::Challenge),
            ("Tournament", BattleMode::Tournament),
            ("Friendly Battle", BattleMode::Friendly),
            ("Special Event", BattleMode::SpecialEvent),
            ("Mystery", BattleMode::Unknown),
        ];
        for (header, expected) in cases {
            let html = simple_battle(
                &format!(r#"<h4 class="game_mode_header">{}</h4>"#, header),
                "pekka",
                "giant",
            );
            assert_eq!(parse(&html).battles[0].mode, expected, "header {:?}", header);
        }

        let html = simple_battle("", "pekka", "giant");
        assert_eq!(parse(&html).battles[0].mode, BattleMode::Ladder);
    }

    #[test]
    fn test_stat_value_before_label() {
        let html = r#"<div class="team-segment"><div class="battle_stats">
              <div class="item">3.1 Avg Elixir</div>
              <div class="item">4-Card Cycle</div>
            </div></div>"#;
        let doc = PageDocument::parse(html);
        let segment = doc.html().select(&TEAM_SEGMENT).next().unwrap();
        assert_eq!(stat_value(&segment, AVG_ELIXIR_LABEL), Some(3.1));
        assert_eq!(stat_value(&segment, CYCLE_LABEL), None);
    }
}
