//! tradepost-server: HTTP adapter for the marketplace core
//!
//! The platform relay forwards slash commands, modal submissions and button
//! presses here, then drains `/outbox` to perform the resulting platform
//! side effects (posts, direct messages, private channels, the pinned
//! summary).

pub mod http;
pub mod outbox;

pub use http::{build_router, run_server, ApiError, AppState, ServerConfig, ServerError};
pub use outbox::{OutboundEvent, Outbox};
