//! Offers and their lifecycle
//!
//! ```text
//!            accept            archive
//! Pending ───────────► Accepted ───────► Archived
//!   │  │                  ▲
//!   │  │ counter          │ accept-counter (buyer)
//!   │  └──────► CounterOffered ──► Declined (decline-counter, buyer)
//!   │                │
//!   │ decline        │ retract (buyer)
//!   ▼                ▼
//! Declined       Retracted ◄── retract (buyer, from Pending)
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::listing::lenient;
use crate::validation::ValidationError;

/// Offer status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
    Retracted,
    #[serde(rename = "Counter Offered", alias = "CounterOffered")]
    CounterOffered,
    Archived,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
            Self::Retracted => "Retracted",
            Self::CounterOffered => "Counter Offered",
            Self::Archived => "Archived",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Declined | Self::Retracted | Self::Archived)
    }

    /// Status reached by applying `action`, or `None` when the action is not
    /// allowed from this status.
    pub fn after(self, action: OfferAction) -> Option<OfferStatus> {
        use OfferAction as A;
        use OfferStatus as S;

        match (self, action) {
            (S::Pending, A::Accept) => Some(S::Accepted),
            (S::Pending, A::Decline) => Some(S::Declined),
            (S::Pending, A::Counter) => Some(S::CounterOffered),
            (S::Pending | S::CounterOffered, A::Retract) => Some(S::Retracted),
            (S::CounterOffered, A::AcceptCounter) => Some(S::Accepted),
            (S::CounterOffered, A::DeclineCounter) => Some(S::Declined),
            (S::Accepted, A::Archive) => Some(S::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of an offer may perform an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Seller,
    Buyer,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seller => f.write_str("seller"),
            Self::Buyer => f.write_str("buyer"),
        }
    }
}

/// Lifecycle actions an actor can take on an existing offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferAction {
    Accept,
    Decline,
    Retract,
    Counter,
    Archive,
    AcceptCounter,
    DeclineCounter,
}

impl OfferAction {
    pub const ALL: &'static [OfferAction] = &[
        Self::Accept,
        Self::Decline,
        Self::Retract,
        Self::Counter,
        Self::Archive,
        Self::AcceptCounter,
        Self::DeclineCounter,
    ];

    /// Party allowed to perform the action.
    ///
    /// The counter-offer is addressed to the buyer, so only the buyer
    /// answers it.
    pub fn actor(&self) -> Party {
        match self {
            Self::Accept | Self::Decline | Self::Counter | Self::Archive => Party::Seller,
            Self::Retract | Self::AcceptCounter | Self::DeclineCounter => Party::Buyer,
        }
    }

    /// Verb used in messages and errors
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Retract => "retract",
            Self::Counter => "counter",
            Self::Archive => "archive",
            Self::AcceptCounter => "accept the counter of",
            Self::DeclineCounter => "decline the counter of",
        }
    }

    /// URL segment (`accept-counter`)
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Retract => "retract",
            Self::Counter => "counter",
            Self::Archive => "archive",
            Self::AcceptCounter => "accept-counter",
            Self::DeclineCounter => "decline-counter",
        }
    }
}

impl FromStr for OfferAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.slug() == wanted)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "offer action",
                value: s.to_owned(),
            })
    }
}

/// A buyer's proposal against a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub offer_id: u64,
    pub trade_index: u64,
    pub seller_id: String,
    pub buyer_id: String,
    #[serde(alias = "yourOffer")]
    pub proposed_terms: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub notes: Option<String>,
    pub status: OfferStatus,
    #[serde(
        default,
        alias = "counterOffer",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::text"
    )]
    pub counter_terms: Option<String>,
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "privateChannelId", skip_serializing_if = "Option::is_none")]
    pub private_channel_ref: Option<String>,
}

impl Offer {
    pub fn party_id(&self, party: Party) -> &str {
        match party {
            Party::Seller => &self.seller_id,
            Party::Buyer => &self.buyer_id,
        }
    }

    /// Private conversation naming for this offer's seller and buyer
    pub fn private_context(&self, item: &str) -> PrivateContext {
        PrivateContext {
            seller_id: self.seller_id.clone(),
            trade_index: self.trade_index,
            buyer_id: self.buyer_id.clone(),
            item: item.to_owned(),
        }
    }
}

static CATEGORY_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\- ]").expect("invalid category name regex"));
static CHANNEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\-]").expect("invalid channel name regex"));

const MAX_CHANNEL_NAME_LEN: usize = 90;

/// Restricted conversation between the seller and one buyer of a listing.
///
/// The platform groups one conversation per buyer under a category per
/// (seller, listing).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateContext {
    pub seller_id: String,
    pub trade_index: u64,
    pub buyer_id: String,
    pub item: String,
}

impl PrivateContext {
    /// `{seller}-{index}-{item}`, restricted to letters, digits, dashes and spaces
    pub fn category_name(&self) -> String {
        let raw = format!("{}-{}-{}", self.seller_id, self.trade_index, self.item);
        truncate(CATEGORY_NAME_RE.replace_all(&raw, "").into_owned())
    }

    /// `{buyer}-offer`, lowercase slug
    pub fn channel_name(&self) -> String {
        let raw = format!("{}-offer", self.buyer_id).to_lowercase();
        truncate(CHANNEL_NAME_RE.replace_all(&raw, "").into_owned())
    }
}

fn truncate(mut s: String) -> String {
    if let Some((cut, _)) = s.char_indices().nth(MAX_CHANNEL_NAME_LEN) {
        s.truncate(cut);
    }
    s
}
