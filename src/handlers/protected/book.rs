use axum::extract::{Path, Query, State};
use axum::Extension;
use serde::Deserialize;

use crate::api::validation::{self, BookBody, OrdinalRule};
use crate::app::AppState;
use crate::database::models::Book;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, ValidatedAdmin};

/// GET /book - all books by order index
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Book>> {
    let books = state.books.list(None).await?;
    Ok(ApiResponse::ok("Book data fetched", books))
}

/// GET /book/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Book> {
    let id = validation::parse_id(&id, "book")?;
    let book = state.books.get(id).await?;
    Ok(ApiResponse::ok("Book data fetched", book))
}

#[derive(Debug, Default, Deserialize)]
pub struct BookLookup {
    pub name: Option<String>,
}

/// GET /book/lookup?name= - natural-key lookup by unique name
pub async fn lookup(State(state): State<AppState>, Query(query): Query<BookLookup>) -> ApiResult<Book> {
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::field_error("name", "Invalid name type"))?;

    let book = state
        .books
        .find_by_name(name)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;
    Ok(ApiResponse::ok("Book data fetched", book))
}

/// POST /book - `orderIndex` is optional and appends when absent
pub async fn create(
    State(state): State<AppState>,
    Extension(admin): Extension<ValidatedAdmin>,
    ApiJson(body): ApiJson<BookBody>,
) -> ApiResult<Book> {
    let (draft, order_index) = validation::book_input(body, OrdinalRule::Optional)?;
    let book = state.books.create(draft, order_index).await?;
    tracing::info!("Book '{}' created by {}", book.name, admin.username);
    Ok(ApiResponse::created("A book was successfully created", book))
}

/// PUT /book/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<BookBody>,
) -> ApiResult<Book> {
    let id = validation::parse_id(&id, "book")?;
    let (draft, order_index) = validation::book_input(body, OrdinalRule::Required)?;
    let order_index = validation::required(order_index, "orderIndex", "Invalid Order Index type")?;

    let book = state.books.update(id, draft, order_index).await?;
    tracing::info!("Book '{}' updated by {}", book.name, admin.username);
    Ok(ApiResponse::ok("Book updated successfully", book))
}

/// DELETE /book/:id - chapters and verses go with it
pub async fn delete(
    State(state): State<AppState>,
    Extension(admin): Extension<ValidatedAdmin>,
    Path(id): Path<String>,
) -> ApiResult<Book> {
    let id = validation::parse_id(&id, "book")?;
    let book = state.books.delete(id).await?;
    tracing::info!("Book '{}' deleted by {}", book.name, admin.username);
    Ok(ApiResponse::ok("Book successfully deleted", book))
}
