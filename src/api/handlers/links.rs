//! Handlers for reading links back: the caller's list and single lookup.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::json;

use crate::api::dto::pagination::PaginationParams;
use crate::api::dto::shorten::{LinkListResponse, LinkResponse};
use crate::api::middleware::auth::MaybeCaller;
use crate::error::AppError;
use crate::state::AppState;

/// Lists the authenticated caller's links, newest first.
///
/// # Endpoint
///
/// `GET /api/urls?page=1&page_size=20`
///
/// # Errors
///
/// - `401` without a valid Bearer token
/// - `400` on invalid pagination parameters
pub async fn list_links_handler(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Query(params): Query<PaginationParams>,
) -> Result<Json<LinkListResponse>, AppError> {
    let caller = caller.required()?;

    let (page, page_size) = params
        .page_and_size()
        .map_err(|msg| AppError::bad_request(msg, json!({})))?;

    let result = state
        .link_service
        .list_by_owner(&caller.owner_id, page, page_size)
        .await?;

    let items = result
        .items
        .into_iter()
        .map(|link| {
            let short_url = state.short_url(&link.code);
            LinkResponse::new(link, short_url)
        })
        .collect();

    Ok(Json(LinkListResponse {
        items,
        total: result.total,
        page: result.page,
        page_size: result.page_size,
    }))
}

/// Looks up a single link without following it.
///
/// # Endpoint
///
/// `GET /api/urls/{code}`
///
/// Private links answer `404` to everyone but their owner, so their existence is not
/// revealed. Subject to the per-path lookup limit.
pub async fn get_link_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    caller: MaybeCaller,
) -> Result<Json<LinkResponse>, AppError> {
    let link = state.link_service.resolve(&code).await?;

    if !link.is_visible_to(caller.owner_id()) {
        return Err(AppError::not_found(
            "Short link not found",
            json!({ "code": code }),
        ));
    }

    let short_url = state.short_url(&link.code);
    Ok(Json(LinkResponse::new(link, short_url)))
}
