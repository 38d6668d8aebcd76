//! Chat interaction endpoints for the platform relay
//!
//! Commands that need a follow-up modal hold their request open until the
//! relay forwards the submission to `/interactions/submissions`, or until the
//! submission timeout passes (504).

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tradepost_core::interaction::{
    counter_modal_id, parse_counter_modal_id, COUNTER_MODAL_PREFIX, OFFER_MODAL,
    TRADE_DETAILS_MODAL,
};
use tradepost_core::{
    ActionId, Ladder, ListingDetails, ModalFields, Mode, NewListing, Offer, OfferAction,
    OfferSubmission, Platform, Region, SubmissionKey, TradeListing, ValidationError,
};

use crate::http::error::ApiError;
use crate::http::server::AppState;

/// Options of the `trade` command. Labels are parsed leniently
/// ("hc", "non-ladder").
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeCommand {
    pub user_id: String,
    pub item: String,
    #[serde(alias = "wantedInReturn")]
    pub trade_for: String,
    pub mode: String,
    pub ladder: String,
    pub platforms: Vec<String>,
    pub region: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// Labels of a `trade` command, parsed
struct TradeOptions {
    mode: Mode,
    ladder: Ladder,
    region: Region,
    platforms: Vec<Platform>,
}

impl TradeCommand {
    fn options(&self) -> Result<TradeOptions, ValidationError> {
        Ok(TradeOptions {
            mode: self.mode.parse()?,
            ladder: self.ladder.parse()?,
            region: self.region.parse()?,
            platforms: self
                .platforms
                .iter()
                .map(|p| p.parse())
                .collect::<Result<Vec<Platform>, _>>()?,
        })
    }

    /// Combine the command options with the details modal.
    fn into_listing(self, options: TradeOptions, details: ListingDetails) -> NewListing {
        NewListing {
            owner_id: self.user_id,
            item: self.item,
            wanted_in_return: self.trade_for,
            mode: Some(options.mode),
            ladder: Some(options.ladder),
            platforms: options.platforms,
            region: Some(options.region),
            base: details.base,
            socket_count: details.socket_count,
            is_ethereal: details.is_ethereal,
            notes: details.notes,
            external_link: self.link,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCommand {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub custom_id: String,
    pub user_id: String,
    #[serde(default)]
    pub fields: ModalFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonRequest {
    pub custom_id: String,
    pub user_id: String,
}

/// What the relay should do in reply to an interaction
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionResponse {
    /// Show the modal with this custom id to the user
    OpenModal {
        #[serde(rename = "customId")]
        custom_id: String,
    },
    /// The submission reached the waiting command
    Delivered,
    /// The offer changed
    Updated { offer: Offer },
}

/// POST /interactions/commands/trade
#[instrument(skip(state, cmd), fields(user = %cmd.user_id))]
async fn trade_command(
    State(state): State<Arc<AppState>>,
    Json(cmd): Json<TradeCommand>,
) -> Result<(StatusCode, Json<Vec<TradeListing>>), ApiError> {
    // reject bad options before asking for details
    let options = cmd.options()?;

    let pending = state
        .market
        .submissions
        .expect(SubmissionKey::new(TRADE_DETAILS_MODAL, cmd.user_id.clone()));
    let fields = pending.wait(state.submission_timeout).await?;
    let details = ListingDetails::from_modal(&fields)?;

    let rows = state
        .market
        .listings
        .create_listing(cmd.into_listing(options, details))
        .await?;
    Ok((StatusCode::CREATED, Json(rows)))
}

/// POST /interactions/commands/offer
#[instrument(skip(state, cmd), fields(user = %cmd.user_id))]
async fn offer_command(
    State(state): State<Arc<AppState>>,
    Json(cmd): Json<OfferCommand>,
) -> Result<(StatusCode, Json<Offer>), ApiError> {
    let pending = state
        .market
        .submissions
        .expect(SubmissionKey::new(OFFER_MODAL, cmd.user_id.clone()));
    let fields = pending.wait(state.submission_timeout).await?;
    let submission = OfferSubmission::from_modal(&fields)?;

    let offer = state
        .market
        .offers
        .submit_offer(
            submission.trade_index,
            &cmd.user_id,
            &submission.terms,
            submission.notes.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

/// POST /interactions/submissions - a modal was submitted
#[instrument(skip(state, req), fields(custom_id = %req.custom_id, user = %req.user_id))]
async fn submission(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmissionRequest>,
) -> Result<Json<InteractionResponse>, ApiError> {
    if req.custom_id.starts_with(COUNTER_MODAL_PREFIX) {
        let offer_id = parse_counter_modal_id(&req.custom_id)?;
        let terms = req.fields.required("counterOffer")?;
        let offer = state
            .market
            .offers
            .counter(offer_id, &req.user_id, &terms)
            .await?;
        return Ok(Json(InteractionResponse::Updated { offer }));
    }

    let key = SubmissionKey::new(req.custom_id, req.user_id);
    if !state.market.submissions.deliver(&key, req.fields) {
        return Err(ApiError::NotFound {
            resource: "pending submission",
            id: key.custom_id,
        });
    }
    Ok(Json(InteractionResponse::Delivered))
}

/// POST /interactions/actions - an offer button was pressed
#[instrument(skip(state, req), fields(custom_id = %req.custom_id, user = %req.user_id))]
async fn button(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ButtonRequest>,
) -> Result<Json<InteractionResponse>, ApiError> {
    let id: ActionId = req.custom_id.parse()?;

    if id.action == OfferAction::Counter {
        // the counter terms come from a modal; only open it for the seller
        state
            .market
            .offers
            .ensure_allowed(id.offer_id, &req.user_id, OfferAction::Counter)
            .await?;
        return Ok(Json(InteractionResponse::OpenModal {
            custom_id: counter_modal_id(id.offer_id),
        }));
    }

    let offer = state
        .market
        .offers
        .perform(id.action, id.offer_id, &req.user_id, None)
        .await?;
    Ok(Json(InteractionResponse::Updated { offer }))
}

/// Interaction routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/interactions/commands/trade", post(trade_command))
        .route("/interactions/commands/offer", post(offer_command))
        .route("/interactions/submissions", post(submission))
        .route("/interactions/actions", post(button))
}
