//! Offer endpoints
//!
//! The acting user comes from the `x-tradepost-actor` header; whether they may
//! act is decided by the offer manager.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use tradepost_core::interaction::parse_id;
use tradepost_core::{Offer, OfferAction};

use crate::http::error::ApiError;
use crate::http::extractors::{Actor, ValidId};
use crate::http::server::AppState;

/// Body of POST /offers
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOfferRequest {
    pub trade_index: u64,
    #[serde(alias = "yourOffer")]
    pub terms: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of POST /offers/{id}/{action}
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default, alias = "counterOffer")]
    pub counter_terms: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffersQuery {
    pub trade_index: u64,
}

/// POST /offers - the actor makes an offer on a listing
#[instrument(skip(state, req), fields(trade_index = req.trade_index))]
async fn submit_offer(
    State(state): State<Arc<AppState>>,
    Actor(buyer): Actor,
    Json(req): Json<SubmitOfferRequest>,
) -> Result<(StatusCode, Json<Offer>), ApiError> {
    let offer = state
        .market
        .offers
        .submit_offer(req.trade_index, &buyer, &req.terms, req.notes.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

/// GET /offers?tradeIndex= - offers made against one listing
async fn list_offers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OffersQuery>,
) -> Result<Json<Vec<Offer>>, ApiError> {
    Ok(Json(state.market.offers.offers_for_listing(query.trade_index).await?))
}

/// GET /offers/{id}
async fn get_offer(
    State(state): State<Arc<AppState>>,
    ValidId(offer_id): ValidId,
) -> Result<Json<Offer>, ApiError> {
    Ok(Json(state.market.offers.get(offer_id).await?))
}

/// POST /offers/{id}/{action} - accept, decline, retract, counter, archive,
/// accept-counter or decline-counter
#[instrument(skip(state, body))]
async fn act_on_offer(
    State(state): State<Arc<AppState>>,
    Path((id, action)): Path<(String, String)>,
    Actor(actor): Actor,
    body: Option<Json<ActionRequest>>,
) -> Result<Json<Offer>, ApiError> {
    let offer_id = parse_id("offer id", &id)?;
    let action: OfferAction = action.parse()?;
    let Json(body) = body.unwrap_or_default();

    let offer = state
        .market
        .offers
        .perform(action, offer_id, &actor, body.counter_terms.as_deref())
        .await?;
    Ok(Json(offer))
}

/// Offer routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/offers", get(list_offers).post(submit_offer))
        .route("/offers/{id}", get(get_offer))
        .route("/offers/{id}/{action}", post(act_on_offer))
}
