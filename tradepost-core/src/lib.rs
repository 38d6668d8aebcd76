pub mod config;
pub mod error;
pub mod format;
pub mod interaction;
pub mod listings;
pub mod marketplace;
pub mod model;
pub mod offers;
pub mod ports;
pub mod projection;
pub mod store;
pub mod submission;
pub mod validation;

pub use config::TradeConfig;
pub use error::{Result, SideEffectError, TradeError};
pub use interaction::{ActionId, ListingDetails, ModalFields, OfferSubmission};
pub use listings::{ListingManager, RemovalFilter};
pub use marketplace::Marketplace;
pub use model::{
    CategoryKey, Ladder, Mode, NewListing, Offer, OfferAction, OfferStatus, Party, Platform,
    PrivateContext, Region, TradeListing,
};
pub use offers::OfferManager;
pub use ports::{Announcement, Announcer, ChannelRef, ChannelResolver, Detached, MessageRef};
pub use store::RecordStore;
pub use submission::{PendingSubmission, SubmissionBroker, SubmissionKey};
pub use validation::ValidationError;
