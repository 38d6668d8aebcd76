//! Listing endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tradepost_core::{CategoryKey, NewListing, RemovalFilter, TradeListing};

use crate::http::error::ApiError;
use crate::http::extractors::ValidId;
use crate::http::server::AppState;

/// Listings sharing one category
#[derive(Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub key: CategoryKey,
    pub listings: Vec<TradeListing>,
}

/// Search query parameters
#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
}

/// Removal response
#[derive(Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
    pub indices: Vec<u64>,
}

impl From<Vec<TradeListing>> for RemovedResponse {
    fn from(rows: Vec<TradeListing>) -> Self {
        let mut indices: Vec<u64> = rows.iter().map(|t| t.index).collect();
        indices.sort_unstable();
        indices.dedup();
        Self {
            removed: rows.len(),
            indices,
        }
    }
}

/// POST /listings - list an item on one or more platforms
#[instrument(skip(state, req), fields(owner = %req.owner_id))]
async fn create_listing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewListing>,
) -> Result<(StatusCode, Json<Vec<TradeListing>>), ApiError> {
    let rows = state.market.listings.create_listing(req).await?;
    Ok((StatusCode::CREATED, Json(rows)))
}

/// GET /listings - every listing grouped by category
async fn list_listings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryGroup>>, ApiError> {
    let groups = state.market.listings.list_grouped_by_category().await?;
    Ok(Json(
        groups
            .into_iter()
            .map(|(key, listings)| CategoryGroup {
                category: key.to_string(),
                key,
                listings,
            })
            .collect(),
    ))
}

/// GET /listings/search?q= - keyword search
#[instrument(skip(state, params), fields(q = %params.q))]
async fn search_listings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<TradeListing>>, ApiError> {
    Ok(Json(state.market.listings.search(&params.q).await?))
}

/// GET /listings/{index} - all rows of one listing
async fn get_listing(
    State(state): State<Arc<AppState>>,
    ValidId(index): ValidId,
) -> Result<Json<Vec<TradeListing>>, ApiError> {
    Ok(Json(state.market.listings.get(index).await?))
}

/// DELETE /listings/{index} - remove a listing on every platform
#[instrument(skip(state, id), fields(index = id.0))]
async fn remove_listing(
    State(state): State<Arc<AppState>>,
    id: ValidId,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = state.market.listings.remove_by_index(id.0).await?;
    Ok(Json(removed.into()))
}

/// DELETE /listings?owner=&index= - moderator removal by owner and/or index
#[instrument(skip(state))]
async fn remove_listings(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RemovalFilter>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = state.market.listings.remove(filter).await?;
    Ok(Json(removed.into()))
}

/// Listing routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/listings",
            get(list_listings).post(create_listing).delete(remove_listings),
        )
        .route("/listings/search", get(search_listings))
        .route("/listings/{index}", get(get_listing).delete(remove_listing))
}
