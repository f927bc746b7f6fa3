//! Comment endpoints
//!
//! Posting has its own hourly limiter; moderation is admin only.

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::Serialize;

use crate::db::repos::{BlogRepo, Comment, CommentRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{ClientIp, RequireAdmin, ValidJson, ValidQuery, ValidSlug, ValidUuid};
use crate::http::rate_limit::{enforce, RateLimits};
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::models::{
    CommentListParams, CommentRequest, CommentStatusRequest, PaginationMeta,
};

#[derive(Serialize)]
pub struct CommentList {
    pub comments: Vec<Comment>,
    pub pagination: PaginationMeta,
}

#[derive(Serialize)]
pub struct CommentData {
    pub comment: Comment,
}

/// GET /api/v1/blogs/{slug}/comments - approved comments
async fn list_comments(
    State(state): State<Arc<AppState>>,
    ValidSlug(slug): ValidSlug,
    ValidQuery(params): ValidQuery<CommentListParams>,
) -> Result<Envelope<CommentList>, ApiError> {
    let (sort, page) = params.validate()?;
    let blog = BlogRepo::new(&state.db).find(slug.as_str()).await?;
    let page = CommentRepo::new(&state.db).list(&blog, sort, page).await?;

    Ok(Envelope::ok(CommentList {
        pagination: page.meta(),
        comments: page.items,
    }))
}

/// POST /api/v1/blogs/{slug}/comments
async fn create_comment(
    State(state): State<Arc<AppState>>,
    ValidSlug(slug): ValidSlug,
    ClientIp(ip): ClientIp,
    ValidJson(req): ValidJson<CommentRequest>,
) -> Result<Envelope<CommentData>, ApiError> {
    let input = req.validate()?;
    let blog = BlogRepo::new(&state.db).find(slug.as_str()).await?;
    let comment = CommentRepo::new(&state.db)
        .create(&blog, &input, ip.as_deref())
        .await?;
    Ok(Envelope::created(CommentData { comment }).with_message("Comment posted successfully"))
}

/// DELETE /api/v1/blogs/{slug}/comments/{id}
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    ValidSlug(slug): ValidSlug,
    ValidUuid(id): ValidUuid,
) -> Result<Envelope<()>, ApiError> {
    let blog = BlogRepo::new(&state.db).find(slug.as_str()).await?;
    CommentRepo::new(&state.db).delete(&blog, id).await?;
    Ok(Envelope::message("Comment deleted successfully"))
}

/// PUT /api/v1/blogs/{slug}/comments/{id}/status
async fn update_comment_status(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    ValidSlug(slug): ValidSlug,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<CommentStatusRequest>,
) -> Result<Envelope<CommentData>, ApiError> {
    let status = req.validate()?;
    let blog = BlogRepo::new(&state.db).find(slug.as_str()).await?;
    let comment = CommentRepo::new(&state.db)
        .set_status(&blog, id, status)
        .await?;
    Ok(Envelope::ok(CommentData { comment }).with_message("Comment status updated successfully"))
}

/// Comment routes
pub fn router(limits: &RateLimits) -> Router<Arc<AppState>> {
    let admin = || from_fn_with_state(limits.admin.clone(), enforce);

    Router::new()
        .route(
            "/api/v1/blogs/{slug}/comments",
            get(list_comments)
                .route_layer(from_fn_with_state(limits.public.clone(), enforce))
                .merge(
                    post(create_comment)
                        .route_layer(from_fn_with_state(limits.comments.clone(), enforce)),
                ),
        )
        .route(
            "/api/v1/blogs/{slug}/comments/{id}",
            delete(delete_comment).route_layer(admin()),
        )
        .route(
            "/api/v1/blogs/{slug}/comments/{id}/status",
            put(update_comment_status).route_layer(admin()),
        )
}
