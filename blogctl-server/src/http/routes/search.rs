//! Search endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::db::repos::{SearchHit, SearchRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ClientIp, ValidQuery};
use crate::http::rate_limit::{enforce, RateLimits};
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::models::{PaginationMeta, SearchParams};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
    pub pagination: PaginationMeta,
    pub query: String,
    pub total_results: i64,
}

/// GET /api/v1/search?q=&page=&limit=&tags=
async fn search(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ValidQuery(params): ValidQuery<SearchParams>,
) -> Result<Envelope<SearchResults>, ApiError> {
    let query = params.validate()?;
    let page = SearchRepo::new(&state.db)
        .search(&query, ip.as_deref())
        .await?;

    Ok(Envelope::ok(SearchResults {
        pagination: page.meta(),
        total_results: page.total,
        results: page.items,
        query: query.q,
    }))
}

/// Search routes
pub fn router(limits: &RateLimits) -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/v1/search",
        get(search).route_layer(from_fn_with_state(limits.public.clone(), enforce)),
    )
}
