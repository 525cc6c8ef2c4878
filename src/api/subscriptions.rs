//! Subscription handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::feed::{candidates_from_items, select_new};
use crate::storage::{Article, NewSubscription, Subscription};
use crate::util::validate_feed_url;

#[derive(Debug, Deserialize)]
pub struct FeedInfoQuery {
    url: String,
}

/// Metadata of a remote feed, with `id` set when it is already subscribed.
#[derive(Debug, Serialize)]
pub struct FeedInfo {
    pub id: Option<i64>,
    pub feed_type: String,
    pub url: String,
    pub link: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    url: String,
    /// Overrides the feed's own title.
    title: Option<String>,
    /// Overrides the feed's own description.
    description: Option<String>,
}

/// GET /subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    Ok(Json(state.db.list_subscriptions().await?))
}

/// GET /subscriptions/:id
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Subscription>, ApiError> {
    state
        .db
        .get_subscription(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Subscription not found"))
}

/// GET /subscriptions/:id/articles
pub async fn subscription_articles(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Article>>, ApiError> {
    if state.db.get_subscription(id).await?.is_none() {
        return Err(ApiError::not_found("Subscription not found"));
    }
    Ok(Json(state.db.get_articles_for_subscription(id).await?))
}

/// GET /feedinfo?url=
pub async fn feed_info(
    State(state): State<AppState>,
    Query(query): Query<FeedInfoQuery>,
) -> Result<Json<FeedInfo>, ApiError> {
    let url = validate_feed_url(&query.url, state.allow_private_feeds)?;
    let feed = state.refresher.fetch_feed(url.as_str()).await?;
    let id = state.db.subscription_exists(url.as_str()).await?;

    Ok(Json(FeedInfo {
        id,
        feed_type: feed.feed_type,
        url: url.to_string(),
        link: feed.link,
        title: feed.title,
        description: feed.description,
        thumbnail: feed.image_url,
    }))
}

/// POST /subscribe
///
/// Answers 302 with a `Location` when the feed is already subscribed, 201
/// with the new subscription otherwise. The feed's current items are stored
/// together with the subscription.
pub async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let url = validate_feed_url(&request.url, state.allow_private_feeds)?;

    if let Some(id) = state.db.subscription_exists(url.as_str()).await? {
        return Ok(already_subscribed(id));
    }

    let feed = state.refresher.fetch_feed(url.as_str()).await?;
    let new = NewSubscription {
        feed_type: feed.feed_type,
        url: url.to_string(),
        title: non_empty(request.title).unwrap_or(feed.title),
        description: non_empty(request.description).or(feed.description),
        thumbnail: feed.image_url,
    };
    // A feed may list the same link twice; keep the first
    let articles = select_new(&[], candidates_from_items(0, feed.items, Utc::now()));

    match state
        .db
        .create_subscription_with_articles(&new, &articles)
        .await
    {
        Ok((subscription, _)) => Ok((
            StatusCode::CREATED,
            [(LOCATION, format!("/subscriptions/{}", subscription.id))],
            Json(subscription),
        )
            .into_response()),
        // Lost a race with a concurrent subscribe to the same URL
        Err(e) if e.is_unique_violation() => {
            match state.db.subscription_exists(url.as_str()).await? {
                Some(id) => Ok(already_subscribed(id)),
                None => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn already_subscribed(id: i64) -> Response {
    (
        StatusCode::FOUND,
        [(LOCATION, format!("/subscriptions/{}", id))],
    )
        .into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
