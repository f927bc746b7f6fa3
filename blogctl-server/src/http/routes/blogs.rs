//! Blog endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use serde::Serialize;

use crate::db::repos::{BlogDetail, BlogPreview, BlogRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{RequireAdmin, ValidJson, ValidQuery, ValidSlug, VoterId};
use crate::http::rate_limit::{enforce, RateLimits};
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::models::{BlogListParams, BlogRequest, PaginationMeta};

#[derive(Serialize)]
pub struct BlogList {
    pub blogs: Vec<BlogPreview>,
    pub pagination: PaginationMeta,
}

#[derive(Serialize)]
pub struct BlogData {
    pub blog: BlogDetail,
}

/// GET /api/v1/blogs - published posts with filters and pagination
async fn list_blogs(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<BlogListParams>,
) -> Result<Envelope<BlogList>, ApiError> {
    let filter = params.validate()?;
    let page = BlogRepo::new(&state.db).list(&filter).await?;

    Ok(Envelope::ok(BlogList {
        pagination: page.meta(),
        blogs: page.items,
    }))
}

/// GET /api/v1/blogs/{slug} - one published post
async fn get_blog(
    State(state): State<Arc<AppState>>,
    ValidSlug(slug): ValidSlug,
    VoterId(voter): VoterId,
) -> Result<Envelope<BlogData>, ApiError> {
    let blog = BlogRepo::new(&state.db)
        .get_published(slug.as_str(), &voter)
        .await?;
    Ok(Envelope::ok(BlogData { blog }))
}

/// POST /api/v1/blogs
async fn create_blog(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    ValidJson(req): ValidJson<BlogRequest>,
) -> Result<Envelope<BlogData>, ApiError> {
    let input = req.validate_create()?;
    let blog = BlogRepo::new(&state.db).create(&input).await?;
    Ok(Envelope::created(BlogData { blog }).with_message("Blog created successfully"))
}

/// PUT /api/v1/blogs/{slug} - sparse update
async fn update_blog(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    ValidSlug(slug): ValidSlug,
    ValidJson(req): ValidJson<BlogRequest>,
) -> Result<Envelope<BlogData>, ApiError> {
    let patch = req.validate_update()?;
    let blog = BlogRepo::new(&state.db).update(slug.as_str(), &patch).await?;
    Ok(Envelope::ok(BlogData { blog }).with_message("Blog updated successfully"))
}

/// DELETE /api/v1/blogs/{slug}
async fn delete_blog(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    ValidSlug(slug): ValidSlug,
) -> Result<Envelope<()>, ApiError> {
    BlogRepo::new(&state.db).delete(slug.as_str()).await?;
    Ok(Envelope::message("Blog deleted successfully"))
}

/// Blog routes
pub fn router(limits: &RateLimits) -> Router<Arc<AppState>> {
    let public = || from_fn_with_state(limits.public.clone(), enforce);
    let admin = || from_fn_with_state(limits.admin.clone(), enforce);

    Router::new()
        .route(
            "/api/v1/blogs",
            get(list_blogs)
                .route_layer(public())
                .merge(post(create_blog).route_layer(admin())),
        )
        .route(
            "/api/v1/blogs/{slug}",
            get(get_blog)
                .route_layer(public())
                .merge(put(update_blog).delete(delete_blog).route_layer(admin())),
        )
}

#[cfg(test)]
mod tests {
    // Router-level behaviour (auth, validation, limits) is covered in
    // http::server tests. Store-backed flows:
    // Run with: DATABASE_URL=... cargo test -p blogctl-server -- --ignored
}
