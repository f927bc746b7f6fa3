//! Vote endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::post;
use axum::Router;
use serde::Serialize;

use crate::db::repos::{BlogRepo, VoteRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidSlug, VoterId};
use crate::http::rate_limit::{enforce, RateLimits};
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::models::{VoteRequest, VotingStats};

#[derive(Serialize)]
pub struct VotingData {
    pub voting: VotingStats,
}

/// POST /api/v1/blogs/{slug}/vote
async fn vote(
    State(state): State<Arc<AppState>>,
    ValidSlug(slug): ValidSlug,
    VoterId(voter): VoterId,
    ValidJson(req): ValidJson<VoteRequest>,
) -> Result<Envelope<VotingData>, ApiError> {
    let vote_type = req.validate()?;
    let blog = BlogRepo::new(&state.db).find(slug.as_str()).await?;
    let voting = VoteRepo::new(&state.db).vote(&blog, vote_type, &voter).await?;
    Ok(Envelope::ok(VotingData { voting }).with_message("Vote recorded successfully"))
}

/// DELETE /api/v1/blogs/{slug}/vote
async fn remove_vote(
    State(state): State<Arc<AppState>>,
    ValidSlug(slug): ValidSlug,
    VoterId(voter): VoterId,
) -> Result<Envelope<VotingData>, ApiError> {
    let blog = BlogRepo::new(&state.db).find(slug.as_str()).await?;
    let voting = VoteRepo::new(&state.db).remove(&blog, &voter).await?;
    Ok(Envelope::ok(VotingData { voting }).with_message("Vote removed successfully"))
}

/// Vote routes
pub fn router(limits: &RateLimits) -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/v1/blogs/{slug}/vote",
        post(vote)
            .delete(remove_vote)
            .route_layer(from_fn_with_state(limits.public.clone(), enforce)),
    )
}
