//! Typed records for listings and offers
//!
//! Optional fields are `Option`s and enums are closed sets, so malformed
//! records are rejected when they cross the store boundary instead of
//! leaking into formatting.

pub mod listing;
pub mod offer;

pub use listing::{CategoryKey, Ladder, Mode, NewListing, Platform, Region, TradeListing, MAX_SOCKETS};
pub use offer::{Offer, OfferAction, OfferStatus, Party, PrivateContext};
