//! Calendar event endpoints
//!
//! Reads are public; writes need the admin key.

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::Utc;
use serde::Serialize;

use crate::db::repos::{CalendarEvent, CalendarRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{RequireAdmin, ValidJson, ValidQuery, ValidUuid};
use crate::http::rate_limit::{enforce, RateLimits};
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::models::{EventRangeParams, EventRequest};

#[derive(Serialize)]
pub struct EventList {
    pub events: Vec<CalendarEvent>,
}

#[derive(Serialize)]
pub struct EventData {
    pub event: CalendarEvent,
}

/// GET /api/v1/calendar/events?startDate=&endDate=&blogId=
///
/// Without bounds the current month is returned.
async fn list_events(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<EventRangeParams>,
) -> Result<Envelope<EventList>, ApiError> {
    let range = params.validate(Utc::now().date_naive())?;
    let events = CalendarRepo::new(&state.db).list(&range).await?;
    Ok(Envelope::ok(EventList { events }))
}

/// GET /api/v1/calendar/events/{id}
async fn get_event(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> Result<Envelope<EventData>, ApiError> {
    let event = CalendarRepo::new(&state.db).get(id).await?;
    Ok(Envelope::ok(EventData { event }))
}

/// POST /api/v1/calendar/events
async fn create_event(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    ValidJson(req): ValidJson<EventRequest>,
) -> Result<Envelope<EventData>, ApiError> {
    let input = req.validate_create()?;
    let event = CalendarRepo::new(&state.db).create(&input).await?;
    Ok(Envelope::created(EventData { event }).with_message("Event created successfully"))
}

/// PUT /api/v1/calendar/events/{id}
async fn update_event(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<EventRequest>,
) -> Result<Envelope<EventData>, ApiError> {
    let patch = req.validate_update()?;
    let event = CalendarRepo::new(&state.db).update(id, &patch).await?;
    Ok(Envelope::ok(EventData { event }).with_message("Event updated successfully"))
}

/// DELETE /api/v1/calendar/events/{id}
async fn delete_event(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    ValidUuid(id): ValidUuid,
) -> Result<Envelope<()>, ApiError> {
    CalendarRepo::new(&state.db).delete(id).await?;
    Ok(Envelope::message("Event deleted successfully"))
}

/// Calendar routes
pub fn router(limits: &RateLimits) -> Router<Arc<AppState>> {
    let public = || from_fn_with_state(limits.public.clone(), enforce);
    let admin = || from_fn_with_state(limits.admin.clone(), enforce);

    Router::new()
        .route(
            "/api/v1/calendar/events",
            get(list_events)
                .route_layer(public())
                .merge(post(create_event).route_layer(admin())),
        )
        .route(
            "/api/v1/calendar/events/{id}",
            get(get_event)
                .route_layer(public())
                .merge(put(update_event).delete(delete_event).route_layer(admin())),
        )
}
