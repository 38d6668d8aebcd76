//! Latest-trades summary endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use tradepost_core::projection::SUMMARY_TITLE;

use crate::http::error::ApiError;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SummaryResponse {
    pub title: &'static str,
    pub text: String,
}

/// GET /summary - the summary as it would be published now
async fn get_summary(State(state): State<Arc<AppState>>) -> Result<Json<SummaryResponse>, ApiError> {
    Ok(Json(SummaryResponse {
        title: SUMMARY_TITLE,
        text: state.market.listings.summary().await?,
    }))
}

/// POST /summary/refresh - recompute and republish
#[instrument(skip(state))]
async fn refresh_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SummaryResponse>, ApiError> {
    Ok(Json(SummaryResponse {
        title: SUMMARY_TITLE,
        text: state.market.listings.refresh_summary().await?,
    }))
}

/// Summary routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/summary", get(get_summary))
        .route("/summary/refresh", post(refresh_summary))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::http::server::testing::{app, send};

    #[tokio::test]
    async fn summary_tracks_listings() {
        let temp = TempDir::new().unwrap();
        let (app, state) = app(&temp, Duration::from_secs(1)).await;

        let (status, body) = send(&app, "GET", "/summary", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "📌 Latest Trades");
        assert_eq!(body["text"], "");

        let listing = json!({
            "ownerId": "U1",
            "item": "Shako",
            "wantedInReturn": "Ist",
            "mode": "Softcore",
            "ladder": "Non-Ladder",
            "platforms": ["PC", "Xbox"],
            "region": "Asia"
        });
        send(&app, "POST", "/listings", None, Some(listing)).await;

        let (_, body) = send(&app, "GET", "/summary", None, None).await;
        let text = body["text"].as_str().unwrap();
        assert!(text.contains("Shako"));
        // both platform rows collapse into one entry
        assert_eq!(text.matches("Shako").count(), 1);

        state.outbox.drain(100);
        let (status, _) = send(&app, "POST", "/summary/refresh", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let published = serde_json::to_value(&state.outbox.drain(1)[0]).unwrap();
        assert_eq!(published["type"], "publish_summary");
        assert_eq!(published["channel"], "summary");
    }
}
