//! Article handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::error::ApiError;
use super::pagination::PageQuery;
use super::AppState;
use crate::storage::{Article, ArticleWithSubscription};

/// GET /articles/:id
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    state
        .db
        .get_article(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Article not found"))
}

/// POST /articles/:id/markread
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.db.mark_article_read(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Article not found"))
    }
}

/// POST /articles/:id/readlater
pub async fn add_read_later(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.db.add_to_read_later(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Article not found"))
    }
}

/// DELETE /articles/:id/readlater
pub async fn remove_read_later(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.remove_from_read_later(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /readlater?page=&limit=
pub async fn read_later(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ArticleWithSubscription>>, ApiError> {
    let page = query.page();
    Ok(Json(state.db.get_read_later(page.limit, page.offset).await?))
}

/// GET /unread
pub async fn unread(
    State(state): State<AppState>,
) -> Result<Json<Vec<ArticleWithSubscription>>, ApiError> {
    Ok(Json(state.db.get_unread_articles().await?))
}
