//! Player endpoints under `/api/v1/player/:tag`.
//!
//! Tags are validated before anything is fetched. HTML parsing runs on the
//! blocking pool since a page can take a while to walk.

use axum::extract::{Path, State};
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::{ApiError, ApiResponse};
use crate::models::{
    BattleHistory, CardByLevelEntry, CardLevelHistogram, CollectionSummary, PlayerRecord,
    PlayerTag,
};
use crate::parse::{
    extract_battle_history, extract_card_levels, extract_cards_by_level, extract_collections,
    PageDocument,
};

/// Collections payload: each list with its size.
#[derive(Debug, Serialize)]
pub struct CollectionsResponse {
    pub tower: CollectionSummary,
    pub hero: CollectionSummary,
    pub evolution: CollectionSummary,
}

fn validated_tag(raw: &str) -> Result<PlayerTag, ApiError> {
    if !PlayerTag::is_valid(raw) {
        return Err(ApiError::InvalidTag(raw.to_string()));
    }
    Ok(PlayerTag::normalize(raw))
}

async fn parse_blocking<T, F>(parse: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(parse).await?)
}

/// Card levels page, where a missing page means the player has no card data.
async fn required_card_levels_page(state: &AppState, tag: &PlayerTag) -> Result<String, ApiError> {
    state
        .source
        .card_levels_page(tag)
        .await?
        .ok_or_else(|| ApiError::PlayerNotFound(format!("Player with tag {} not found", tag)))
}

/// Complete player record.
pub async fn get_player(
    State(state): State<AppState>,
    Path(raw_tag): Path<String>,
) -> Result<ApiResponse<PlayerRecord>, ApiError> {
    let tag = validated_tag(&raw_tag)?;

    let (profile, card_levels) = tokio::join!(
        state.source.profile_page(&tag),
        state.source.card_levels_page(&tag)
    );
    let profile = profile?;
    let card_levels = card_levels.unwrap_or_else(|e| {
        tracing::warn!(tag = %tag, error = %e, "Continuing without card levels");
        None
    });

    let record = parse_blocking(move || {
        PlayerRecord::from_pages(tag.as_str(), &profile, card_levels.as_deref())
    })
    .await?;

    Ok(ApiResponse::new(record))
}

/// Card level histogram only.
pub async fn get_cards(
    State(state): State<AppState>,
    Path(raw_tag): Path<String>,
) -> Result<ApiResponse<CardLevelHistogram>, ApiError> {
    let tag = validated_tag(&raw_tag)?;
    let html = required_card_levels_page(&state, &tag).await?;
    let histogram = parse_blocking(move || extract_card_levels(&PageDocument::parse(&html))).await?;
    Ok(ApiResponse::new(histogram))
}

/// Tower, hero and evolution collections.
pub async fn get_collections(
    State(state): State<AppState>,
    Path(raw_tag): Path<String>,
) -> Result<ApiResponse<CollectionsResponse>, ApiError> {
    let tag = validated_tag(&raw_tag)?;
    let html = state.source.profile_page(&tag).await?;
    let collection = parse_blocking(move || extract_collections(&PageDocument::parse(&html))).await?;

    Ok(ApiResponse::new(CollectionsResponse {
        tower: collection.tower.into(),
        hero: collection.hero.into(),
        evolution: collection.evolution.into(),
    }))
}

/// Card names grouped by level.
pub async fn get_cards_by_level(
    State(state): State<AppState>,
    Path(raw_tag): Path<String>,
) -> Result<ApiResponse<Vec<CardByLevelEntry>>, ApiError> {
    let tag = validated_tag(&raw_tag)?;
    let html = required_card_levels_page(&state, &tag).await?;
    let entries = parse_blocking(move || extract_cards_by_level(&PageDocument::parse(&html))).await?;
    Ok(ApiResponse::new(entries))
}

/// Recent battles.
pub async fn get_battles(
    State(state): State<AppState>,
    Path(raw_tag): Path<String>,
) -> Result<ApiResponse<BattleHistory>, ApiError> {
    let tag = validated_tag(&raw_tag)?;
    let html = state.source.battles_page(&tag).await?;
    let history = parse_blocking(move || {
        extract_battle_history(&PageDocument::parse(&html), tag.as_str())
    })
    .await?;
    Ok(ApiResponse::new(history))
}
