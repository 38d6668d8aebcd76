//! Parsing of raw interaction payloads
//!
//! Button ids arrive as `"{tag}:{offer id}"` strings and modal submissions as
//! loose string maps. Both are validated here so unparsable input becomes a
//! `ValidationError` for the user instead of a failed handler.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{OfferAction, MAX_SOCKETS};
use crate::validation::{non_empty, optional_text, ValidationError};

/// Modal shown by the `trade` command
pub const TRADE_DETAILS_MODAL: &str = "tradeDetails";
/// Modal shown by the `offer` command
pub const OFFER_MODAL: &str = "offerModal";
/// Prefix of the per-offer counter modal (`offerCounterModal:{id}`)
pub const COUNTER_MODAL_PREFIX: &str = "offerCounterModal";

/// Button id: an offer action bound to an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionId {
    pub action: OfferAction,
    pub offer_id: u64,
}

impl ActionId {
    pub fn new(action: OfferAction, offer_id: u64) -> Self {
        Self { action, offer_id }
    }

    fn tag(action: OfferAction) -> &'static str {
        match action {
            OfferAction::Accept => "offerAccept",
            OfferAction::Decline => "offerDecline",
            OfferAction::Retract => "offerRetract",
            OfferAction::Counter => "offerCounter",
            OfferAction::Archive => "offerArchive",
            OfferAction::AcceptCounter => "offerAcceptCounter",
            OfferAction::DeclineCounter => "offerDeclineCounter",
        }
    }

    fn action_for_tag(tag: &str) -> Option<OfferAction> {
        OfferAction::ALL
            .iter()
            .copied()
            .find(|a| Self::tag(*a) == tag)
            .or_else(|| tag.parse().ok())
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", Self::tag(self.action), self.offer_id)
    }
}

impl FromStr for ActionId {
    type Err = ValidationError;

    /// Accepts the canonical `offerAccept:42` form and the short
    /// `accept:42` alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, id) = s.trim().split_once(':').ok_or(ValidationError::InvalidFormat {
            field: "action id",
            reason: "expected '<action>:<offer id>'",
        })?;

        let action = Self::action_for_tag(tag).ok_or_else(|| ValidationError::InvalidVariant {
            field: "action",
            value: tag.to_owned(),
        })?;
        let offer_id = parse_id("offer id", id)?;

        Ok(Self { action, offer_id })
    }
}

impl TryFrom<String> for ActionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ActionId> for String {
    fn from(id: ActionId) -> Self {
        id.to_string()
    }
}

/// Custom id of the counter modal for an offer
pub fn counter_modal_id(offer_id: u64) -> String {
    format!("{}:{}", COUNTER_MODAL_PREFIX, offer_id)
}

/// Offer id encoded in a counter modal custom id
pub fn parse_counter_modal_id(custom_id: &str) -> Result<u64, ValidationError> {
    match custom_id.split_once(':') {
        Some((COUNTER_MODAL_PREFIX, id)) => parse_id("offer id", id),
        _ => Err(ValidationError::InvalidFormat {
            field: "modal id",
            reason: "expected 'offerCounterModal:<offer id>'",
        }),
    }
}

/// Field values of a submitted modal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModalFields(HashMap<String, String>);

impl ModalFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Raw value, if the field was submitted
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Trimmed non-empty value
    pub fn required(&self, name: &'static str) -> Result<String, ValidationError> {
        non_empty(name, self.get(name).unwrap_or_default())
    }

    /// Trimmed value, `None` when absent or blank
    pub fn optional(&self, name: &str) -> Option<String> {
        optional_text(self.get(name))
    }
}

impl FromIterator<(String, String)> for ModalFields {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Positive integer id typed by a user or carried in a path
pub fn parse_id(field: &'static str, raw: &str) -> Result<u64, ValidationError> {
    let trimmed = raw.trim();
    let value: u64 = trimmed.parse().map_err(|_| ValidationError::NotANumber {
        field,
        value: trimmed.to_owned(),
    })?;
    if value == 0 {
        return Err(ValidationError::OutOfRange {
            field,
            min: 1,
            max: u64::MAX,
        });
    }
    Ok(value)
}

/// Trade index typed into a modal
pub fn parse_trade_index(raw: &str) -> Result<u64, ValidationError> {
    parse_id("trade index", raw)
}

/// Yes/no flag typed into a modal; blank means no.
pub fn parse_yes_no(field: &'static str, raw: &str) -> Result<bool, ValidationError> {
    match raw.trim().to_lowercase().as_str() {
        "" | "no" | "n" | "false" => Ok(false),
        "yes" | "y" | "true" => Ok(true),
        _ => Err(ValidationError::InvalidVariant {
            field,
            value: raw.to_owned(),
        }),
    }
}

/// Socket count typed into a modal; blank means unsocketed.
pub fn parse_socket_count(raw: &str) -> Result<Option<u8>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let count: u8 = trimmed.parse().map_err(|_| ValidationError::NotANumber {
        field: "sockets",
        value: trimmed.to_owned(),
    })?;
    if !(1..=MAX_SOCKETS).contains(&count) {
        return Err(ValidationError::OutOfRange {
            field: "sockets",
            min: 1,
            max: MAX_SOCKETS as u64,
        });
    }
    Ok(Some(count))
}

/// Fields of the `tradeDetails` modal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDetails {
    pub base: Option<String>,
    pub is_ethereal: bool,
    pub socket_count: Option<u8>,
    pub notes: Option<String>,
}

impl ListingDetails {
    pub fn from_modal(fields: &ModalFields) -> Result<Self, ValidationError> {
        Ok(Self {
            base: fields.optional("base"),
            is_ethereal: parse_yes_no("ethereal", fields.get("ethereal").unwrap_or_default())?,
            socket_count: parse_socket_count(fields.get("sockets").unwrap_or_default())?,
            notes: fields.optional("notes"),
        })
    }
}

/// Fields of the `offerModal` modal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferSubmission {
    pub trade_index: u64,
    pub terms: String,
    pub notes: Option<String>,
}

impl OfferSubmission {
    pub fn from_modal(fields: &ModalFields) -> Result<Self, ValidationError> {
        Ok(Self {
            trade_index: parse_trade_index(fields.get("tradeIndex").unwrap_or_default())?,
            terms: fields.required("yourOffer")?,
            notes: fields.optional("notes"),
        })
    }
}
