//! Route handlers organized by resource

pub mod health;
pub mod interactions;
pub mod listings;
pub mod offers;
pub mod outbox;
pub mod summary;
