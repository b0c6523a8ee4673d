use axum::extract::{Path, Query, State};
use axum::Extension;
use serde::Deserialize;

use crate::api::validation::{self, OrdinalRule, VerseBody};
use crate::app::AppState;
use crate::database::models::Verse;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, ValidatedAdmin};
use crate::types::Scope;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseQuery {
    pub chapter_id: Option<String>,
}

pub async fn list(State(state): State<AppState>, Query(query): Query<VerseQuery>) -> ApiResult<Vec<Verse>> {
    let chapter_id = query
        .chapter_id
        .as_deref()
        .map(|raw| validation::parse_id(raw, "chapter"))
        .transpose()?;

    let verses = state.verses.list(chapter_id).await?;
    Ok(ApiResponse::ok("Verse data fetched", verses))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Verse> {
    let id = validation::parse_id(&id, "verse")?;
    let verse = state.verses.get(id).await?;
    Ok(ApiResponse::ok("Verse data fetched", verse))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseLookup {
    pub chapter_id: Option<String>,
    pub number: Option<String>,
}

/// GET /verse/lookup?chapterId=&number= - natural-key lookup within one chapter
pub async fn lookup(State(state): State<AppState>, Query(query): Query<VerseLookup>) -> ApiResult<Verse> {
    let chapter_id = validation::parse_id(query.chapter_id.as_deref().unwrap_or_default(), "chapter")?;
    let number = validation::parse_number(query.number.as_deref(), "number", "Invalid verse number type")?;

    let verse = state
        .verses
        .find_by_ordinal(Scope::Parent(chapter_id), number)
        .await?
        .ok_or_else(|| ApiError::not_found("Verse not found"))?;
    Ok(ApiResponse::ok("Verse data fetched", verse))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(admin): Extension<ValidatedAdmin>,
    ApiJson(body): ApiJson<VerseBody>,
) -> ApiResult<Verse> {
    let (draft, number) = validation::verse_input(body, OrdinalRule::Optional)?;
    let verse = state.verses.create(draft, number).await?;
    tracing::info!("Verse {} of chapter {} created by {}", verse.number, verse.chapter_id, admin.username);
    Ok(ApiResponse::created("A verse was successfully created", verse))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<VerseBody>,
) -> ApiResult<Verse> {
    let id = validation::parse_id(&id, "verse")?;
    let (draft, number) = validation::verse_input(body, OrdinalRule::Required)?;
    let number = validation::required(number, "number", "Invalid verse number type")?;

    let verse = state.verses.update(id, draft, number).await?;
    tracing::info!("Verse {} updated by {}", verse.id, admin.username);
    Ok(ApiResponse::ok("Verse updated successfully", verse))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<String>,
) -> ApiResult<Verse> {
    let id = validation::parse_id(&id, "verse")?;
    let verse = state.verses.delete(id).await?;
    tracing::info!("Verse {} of chapter {} deleted by {}", verse.number, verse.chapter_id, admin.username);
    Ok(ApiResponse::ok("Verse successfully deleted", verse))
}
