//! Calendar events, optionally linked to a post

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;

use super::validation::{optional_text, required_text};
use super::{EventColor, ValidationError, ValidationErrors};

const MAX_TITLE_LEN: usize = 255;
const MAX_DESCRIPTION_LEN: usize = 2000;

/// Parse `HH:mm` (24h, hour may be a single digit).
pub fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, ValidationError> {
    let invalid = ValidationError::InvalidFormat {
        field,
        reason: "must be in HH:mm format",
    };
    let (hour, minute) = value.trim().split_once(':').ok_or(invalid.clone())?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return Err(invalid);
    }
    if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid);
    }
    let (hour, minute) = match (hour.parse::<u32>(), minute.parse::<u32>()) {
        (Ok(h), Ok(m)) => (h, m),
        _ => return Err(invalid),
    };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or(invalid)
}

/// Stored and returned form of an event time
pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parse an ISO-8601 date, or a datetime whose date part is kept.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }
    Err(ValidationError::InvalidFormat {
        field,
        reason: "must be a valid ISO 8601 date",
    })
}

fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(value.trim()).map_err(|_| ValidationError::InvalidFormat {
        field,
        reason: "must be a valid UUID",
    })
}

/// End strictly after start when both are set.
pub fn times_in_order(start: Option<NaiveTime>, end: Option<NaiveTime>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => end > start,
        _ => true,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub color: Option<String>,
    pub blog_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub color: EventColor,
    pub blog_id: Option<Uuid>,
}

/// Sparse event update
///
/// `Some(None)` clears an optional column; the request spells that `""`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<Option<NaiveTime>>,
    pub end_time: Option<Option<NaiveTime>>,
    pub color: Option<EventColor>,
    pub blog_id: Option<Option<Uuid>>,
}

/// Blank clears, anything else must parse.
fn clearable<T>(
    value: &str,
    parse: impl FnOnce(&str) -> Result<T, ValidationError>,
) -> Result<Option<T>, ValidationError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse(value).map(Some)
    }
}

impl EventRequest {
    pub fn validate_create(self) -> Result<NewEvent, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = errors.check(required_text(
            "title",
            self.title.as_deref().unwrap_or_default(),
            MAX_TITLE_LEN,
        ));
        let description = errors
            .check(optional_text("description", self.description.as_deref(), MAX_DESCRIPTION_LEN))
            .flatten();
        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(ValidationError::Empty { field: "date" });
                None
            }
            Some(d) => errors.check(parse_date("date", d)),
        };
        let start_time = self
            .start_time
            .as_deref()
            .and_then(|t| errors.check(parse_time("startTime", t)));
        let end_time = self
            .end_time
            .as_deref()
            .and_then(|t| errors.check(parse_time("endTime", t)));
        let color = match self.color.as_deref() {
            Some(c) => errors.check(EventColor::parse(c)),
            None => Some(EventColor::default()),
        };
        let blog_id = self
            .blog_id
            .as_deref()
            .and_then(|id| errors.check(parse_uuid("blogId", id)));

        errors.finish()?;

        Ok(NewEvent {
            title: title.unwrap_or_default(),
            description,
            date: date.unwrap_or_default(),
            start_time,
            end_time,
            color: color.unwrap_or_default(),
            blog_id,
        })
    }

    pub fn validate_update(self) -> Result<EventPatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = self
            .title
            .as_deref()
            .and_then(|t| errors.check(required_text("title", t, MAX_TITLE_LEN)));
        let description = self.description.as_deref().and_then(|d| {
            errors.check(optional_text("description", Some(d), MAX_DESCRIPTION_LEN))
        });
        let date = self
            .date
            .as_deref()
            .and_then(|d| errors.check(parse_date("date", d)));
        let start_time = self
            .start_time
            .as_deref()
            .and_then(|t| errors.check(clearable(t, |t| parse_time("startTime", t))));
        let end_time = self
            .end_time
            .as_deref()
            .and_then(|t| errors.check(clearable(t, |t| parse_time("endTime", t))));
        let color = self
            .color
            .as_deref()
            .and_then(|c| errors.check(EventColor::parse(c)));
        let blog_id = self
            .blog_id
            .as_deref()
            .and_then(|id| errors.check(clearable(id, |id| parse_uuid("blogId", id))));

        errors.finish()?;

        Ok(EventPatch {
            title,
            description,
            date,
            start_time,
            end_time,
            color,
            blog_id,
        })
    }
}

/// Query string for `GET /api/v1/calendar/events`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub blog_id: Option<String>,
}

/// Inclusive date range plus an optional post filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub blog_id: Option<Uuid>,
}

/// First and last day of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(day);
    (first, last)
}

impl EventRangeParams {
    /// Missing bounds default to the month containing `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<EventRange, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let (month_start, month_end) = month_bounds(today);

        let start = match self.start_date.as_deref() {
            Some(d) => errors.check(parse_date("startDate", d)),
            None => Some(month_start),
        };
        let end = match self.end_date.as_deref() {
            Some(d) => errors.check(parse_date("endDate", d)),
            None => Some(month_end),
        };
        let blog_id = self
            .blog_id
            .as_deref()
            .and_then(|id| errors.check(parse_uuid("blogId", id)));

        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                errors.push(ValidationError::InvalidFormat {
                    field: "endDate",
                    reason: "must not be before startDate",
                });
            }
        }
        errors.finish()?;

        Ok(EventRange {
            start: start.unwrap_or(month_start),
            end: end.unwrap_or(month_end),
            blog_id,
        })
    }
}
