//! Custom Axum extractors

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::ApiError;
use super::server::AppState;
use crate::models::{Slug, ValidationError, Voter};

const API_KEY_HEADER: &str = "x-api-key";
const SESSION_HEADER: &str = "x-session-id";
const FORWARDED_FOR: &str = "x-forwarded-for";

async fn path_param<S>(parts: &mut Parts, state: &S, name: &'static str) -> Result<String, ApiError>
where
    S: Send + Sync,
{
    let Path(params): Path<HashMap<String, String>> = Path::from_request_parts(parts, state)
        .await
        .map_err(|_| ApiError::from(ValidationError::Empty { field: name }))?;
    params
        .get(name)
        .cloned()
        .ok_or_else(|| ApiError::from(ValidationError::Empty { field: name }))
}

/// Extract and validate the `{slug}` path segment
pub struct ValidSlug(pub Slug);

impl<S> FromRequestParts<S> for ValidSlug
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = path_param(parts, state, "slug").await?;
        Ok(Self(Slug::new(&raw)?))
    }
}

/// Extract and validate the `{id}` path segment as a UUID
pub struct ValidUuid(pub Uuid);

impl<S> FromRequestParts<S> for ValidUuid
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = path_param(parts, state, "id").await?;
        let uuid = Uuid::parse_str(&raw).map_err(|_| ValidationError::InvalidFormat {
            field: "id",
            reason: "invalid UUID format",
        })?;
        Ok(Self(uuid))
    }
}

/// JSON body whose rejections use the API envelope.
///
/// Shape mismatches are field validation failures (422); unparseable bodies
/// are plain bad requests (400).
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(JsonRejection::JsonDataError(_)) => Err(ValidationError::InvalidFormat {
                field: "body",
                reason: "request body does not match the expected shape",
            }
            .into()),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// Query string whose rejections use the API envelope (422).
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|_: QueryRejection| {
                ValidationError::InvalidFormat {
                    field: "query",
                    reason: "malformed query parameters",
                }
                .into()
            })
    }
}

/// Guard for admin routes: `X-API-Key` must equal the configured key.
///
/// With no key configured every request is refused.
pub struct RequireAdmin;

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::Unauthorized("API key is required for this operation"))?;

        match state.config.admin_api_key.as_deref() {
            Some(expected) if expected == provided => Ok(Self),
            _ => {
                tracing::warn!("rejected admin request with an invalid API key");
                Err(ApiError::Unauthorized("Invalid API key"))
            }
        }
    }
}

/// Address of the socket peer, when the server recorded one.
pub fn peer_ip(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Client address: first `X-Forwarded-For` entry, else the peer address.
///
/// The header is client-supplied; anything that must not be spoofable keys
/// on [`peer_ip`] instead.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    forwarded.or_else(|| peer_ip(extensions))
}

/// Client address, when one can be determined
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_ip(&parts.headers, &parts.extensions)))
    }
}

/// Caller identity for votes: client address plus optional `X-Session-ID`
pub struct VoterId(pub Voter);

impl<S> FromRequestParts<S> for VoterId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(Self(Voter::new(
            client_ip(&parts.headers, &parts.extensions),
            session,
        )))
    }
}
