//! Tag endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::db::repos::{BlogPreview, BlogRepo, Tag, TagRepo, TagWithCount};
use crate::http::error::ApiError;
use crate::http::extractors::{ValidQuery, ValidSlug};
use crate::http::rate_limit::{enforce, RateLimits};
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::models::blog::{BLOG_PAGE_DEFAULT, BLOG_PAGE_MAX};
use crate::models::{BlogFilter, Pagination, PaginationMeta, PaginationParams, TagListParams};

#[derive(Serialize)]
pub struct TagList {
    pub tags: Vec<TagWithCount>,
}

#[derive(Serialize)]
pub struct TagBlogs {
    pub tag: Tag,
    pub blogs: Vec<BlogPreview>,
    pub pagination: PaginationMeta,
}

/// GET /api/v1/tags?popular=&limit=
async fn list_tags(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<TagListParams>,
) -> Result<Envelope<TagList>, ApiError> {
    let listing = params.validate()?;
    let tags = TagRepo::new(&state.db).list(listing).await?;
    Ok(Envelope::ok(TagList { tags }))
}

/// GET /api/v1/tags/{slug} - the tag and its published posts
async fn get_tag(
    State(state): State<Arc<AppState>>,
    ValidSlug(slug): ValidSlug,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Envelope<TagBlogs>, ApiError> {
    let page = Pagination::from_params(&params, BLOG_PAGE_DEFAULT, BLOG_PAGE_MAX)?;
    let tag = TagRepo::new(&state.db).get(slug.as_str()).await?;

    let mut filter = BlogFilter::new(page);
    filter.tags = vec![tag.slug.clone()];
    let blogs = BlogRepo::new(&state.db).list(&filter).await?;

    Ok(Envelope::ok(TagBlogs {
        tag,
        pagination: blogs.meta(),
        blogs: blogs.items,
    }))
}

/// Tag routes
pub fn router(limits: &RateLimits) -> Router<Arc<AppState>> {
    let public = || from_fn_with_state(limits.public.clone(), enforce);

    Router::new()
        .route("/api/v1/tags", get(list_tags).route_layer(public()))
        .route("/api/v1/tags/{slug}", get(get_tag).route_layer(public()))
}
