use axum::extract::{Path, Query, State};
use axum::Extension;
use serde::Deserialize;

use crate::api::validation::{self, ChapterBody, OrdinalRule};
use crate::app::AppState;
use crate::database::models::Chapter;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, ValidatedAdmin};
use crate::types::Scope;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterQuery {
    pub book_id: Option<String>,
}

/// GET /chapter[?bookId=] - ordered by book, then number
pub async fn list(State(state): State<AppState>, Query(query): Query<ChapterQuery>) -> ApiResult<Vec<Chapter>> {
    let book_id = query
        .book_id
        .as_deref()
        .map(|raw| validation::parse_id(raw, "book"))
        .transpose()?;

    let chapters = state.chapters.list(book_id).await?;
    Ok(ApiResponse::ok("Chapter data fetched", chapters))
}

/// GET /chapter/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Chapter> {
    let id = validation::parse_id(&id, "chapter")?;
    let chapter = state.chapters.get(id).await?;
    Ok(ApiResponse::ok("Chapter data fetched", chapter))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterLookup {
    pub book_id: Option<String>,
    pub number: Option<String>,
}

/// GET /chapter/lookup?bookId=&number= - natural-key lookup within one book
pub async fn lookup(State(state): State<AppState>, Query(query): Query<ChapterLookup>) -> ApiResult<Chapter> {
    let book_id = validation::parse_id(query.book_id.as_deref().unwrap_or_default(), "book")?;
    let number = validation::parse_number(query.number.as_deref(), "number", "Invalid chapter number type")?;

    let chapter = state
        .chapters
        .find_by_ordinal(Scope::Parent(book_id), number)
        .await?
        .ok_or_else(|| ApiError::not_found("Chapter not found"))?;
    Ok(ApiResponse::ok("Chapter data fetched", chapter))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(admin): Extension<ValidatedAdmin>,
    ApiJson(body): ApiJson<ChapterBody>,
) -> ApiResult<Chapter> {
    let (draft, number) = validation::chapter_input(body, OrdinalRule::Optional)?;
    let chapter = state.chapters.create(draft, number).await?;
    tracing::info!("Chapter {} of book {} created by {}", chapter.number, chapter.book_id, admin.username);
    Ok(ApiResponse::created("A chapter was successfully created", chapter))
}

/// PUT /chapter/:id - may move the chapter to another book
pub async fn update(
    State(state): State<AppState>,
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ChapterBody>,
) -> ApiResult<Chapter> {
    let id = validation::parse_id(&id, "chapter")?;
    let (draft, number) = validation::chapter_input(body, OrdinalRule::Required)?;
    let number = validation::required(number, "number", "Invalid chapter number type")?;

    let chapter = state.chapters.update(id, draft, number).await?;
    tracing::info!("Chapter {} updated by {}", chapter.id, admin.username);
    Ok(ApiResponse::ok("Chapter updated successfully", chapter))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<String>,
) -> ApiResult<Chapter> {
    let id = validation::parse_id(&id, "chapter")?;
    let chapter = state.chapters.delete(id).await?;
    tracing::info!("Chapter {} of book {} deleted by {}", chapter.number, chapter.book_id, admin.username);
    Ok(ApiResponse::ok("Chapter successfully deleted", chapter))
}
