//! Calendar event repository

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::db::{Database, DbError};
use crate::models::calendar::{format_time, parse_time, times_in_order};
use crate::models::{EventPatch, EventRange, NewEvent};

use super::blogs::BlogRepo;

const TIME_ORDER: &str = "End time must be after start time";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventBlog {
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub color: String,
    pub blog_id: Option<Uuid>,
    pub blog: Option<EventBlog>,
}

const EVENT_SELECT: &str = r#"
    SELECT e.id, e.title, e.description, e.event_date, e.start_time, e.end_time,
           e.color, e.blog_id, b.slug AS blog_slug, b.title AS blog_title
    FROM calendar_events e
    LEFT JOIN blogs b ON b.id = e.blog_id
"#;

fn event_from_row(row: &PgRow) -> Result<CalendarEvent, sqlx::Error> {
    let blog_slug: Option<String> = row.try_get("blog_slug")?;
    let blog_title: Option<String> = row.try_get("blog_title")?;
    Ok(CalendarEvent {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        date: row.try_get("event_date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        color: row.try_get("color")?,
        blog_id: row.try_get("blog_id")?,
        blog: blog_slug
            .zip(blog_title)
            .map(|(slug, title)| EventBlog { slug, title }),
    })
}

/// Stored times are `HH:mm`; anything else is treated as unset.
fn stored_time(value: Option<&str>) -> Option<NaiveTime> {
    value.and_then(|v| parse_time("time", v).ok())
}

/// The time an update leaves behind: the patched value (possibly cleared),
/// else the stored one.
fn merged_time(patched: Option<Option<NaiveTime>>, stored: Option<&str>) -> Option<NaiveTime> {
    patched.unwrap_or_else(|| stored_time(stored))
}

/// Calendar repository
pub struct CalendarRepo<'a> {
    db: &'a Database,
}

impl<'a> CalendarRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Events within the inclusive date range, earliest first.
    pub async fn list(&self, range: &EventRange) -> Result<Vec<CalendarEvent>, DbError> {
        let sql = format!(
            "{EVENT_SELECT}
             WHERE e.event_date BETWEEN $1 AND $2
               AND ($3::uuid IS NULL OR e.blog_id = $3)
             ORDER BY e.event_date ASC, e.start_time ASC NULLS FIRST"
        );
        let sql = sql.as_str();
        let pool = self.db.pool();
        let range = *range;
        let rows = self
            .db
            .run(move || async move {
                let rows = sqlx::query(sql)
                    .bind(range.start)
                    .bind(range.end)
                    .bind(range.blog_id)
                    .fetch_all(pool)
                    .await?;
                Ok::<_, DbError>(rows)
            })
            .await?;

        Ok(rows
            .iter()
            .map(event_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn get(&self, id: Uuid) -> Result<CalendarEvent, DbError> {
        let sql = format!("{EVENT_SELECT} WHERE e.id = $1");
        let sql = sql.as_str();
        let pool = self.db.pool();
        let row = self
            .db
            .run(move || async move {
                let row = sqlx::query(sql).bind(id).fetch_optional(pool).await?;
                Ok::<_, DbError>(row)
            })
            .await?
            .ok_or_else(|| DbError::not_found("event", id))?;

        Ok(event_from_row(&row)?)
    }

    async fn ensure_blog(&self, blog_id: Option<Uuid>) -> Result<(), DbError> {
        if let Some(id) = blog_id {
            if !BlogRepo::new(self.db).exists(id).await? {
                return Err(DbError::not_found("blog", id));
            }
        }
        Ok(())
    }

    pub async fn create(&self, input: &NewEvent) -> Result<CalendarEvent, DbError> {
        if !times_in_order(input.start_time, input.end_time) {
            return Err(DbError::Rejected(TIME_ORDER));
        }
        self.ensure_blog(input.blog_id).await?;

        let pool = self.db.pool();
        let start = input.start_time.map(format_time);
        let end = input.end_time.map(format_time);
        let (start, end) = (start.as_deref(), end.as_deref());
        let id = self
            .db
            .run(move || async move {
                let id: Uuid = sqlx::query_scalar(
                    r#"
                    INSERT INTO calendar_events
                        (title, description, event_date, start_time, end_time, color, blog_id)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING id
                    "#,
                )
                .bind(&input.title)
                .bind(input.description.as_deref())
                .bind(input.date)
                .bind(start)
                .bind(end)
                .bind(input.color.as_str())
                .bind(input.blog_id)
                .fetch_one(pool)
                .await?;
                Ok::<_, DbError>(id)
            })
            .await?;

        info!(event_id = %id, "calendar event created");
        self.get(id).await
    }

    /// Sparse update. The time-order rule is checked against the merged
    /// result, so changing only one end is validated too.
    pub async fn update(&self, id: Uuid, patch: &EventPatch) -> Result<CalendarEvent, DbError> {
        let existing = self.get(id).await?;
        let start = merged_time(patch.start_time, existing.start_time.as_deref());
        let end = merged_time(patch.end_time, existing.end_time.as_deref());
        if !times_in_order(start, end) {
            return Err(DbError::Rejected(TIME_ORDER));
        }
        self.ensure_blog(patch.blog_id.flatten()).await?;

        let pool = self.db.pool();
        let start = patch.start_time.flatten().map(format_time);
        let end = patch.end_time.flatten().map(format_time);
        let (start, end) = (start.as_deref(), end.as_deref());
        self.db
            .run(move || async move {
                sqlx::query(
                    r#"
                    UPDATE calendar_events SET
                        title = COALESCE($2, title),
                        description = CASE WHEN $3 THEN $4 ELSE description END,
                        event_date = COALESCE($5, event_date),
                        start_time = CASE WHEN $6 THEN $7 ELSE start_time END,
                        end_time = CASE WHEN $8 THEN $9 ELSE end_time END,
                        color = COALESCE($10, color),
                        blog_id = CASE WHEN $11 THEN $12 ELSE blog_id END,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(patch.title.as_deref())
                .bind(patch.description.is_some())
                .bind(patch.description.as_ref().and_then(Option::as_deref))
                .bind(patch.date)
                .bind(patch.start_time.is_some())
                .bind(start)
                .bind(patch.end_time.is_some())
                .bind(end)
                .bind(patch.color.map(|c| c.as_str()))
                .bind(patch.blog_id.is_some())
                .bind(patch.blog_id.flatten())
                .execute(pool)
                .await?;
                Ok::<_, DbError>(())
            })
            .await?;

        info!(event_id = %id, "calendar event updated");
        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let pool = self.db.pool();
        let deleted = self
            .db
            .run(move || async move {
                let result = sqlx::query("DELETE FROM calendar_events WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await?;
                Ok::<_, DbError>(result.rows_affected())
            })
            .await?;

        if deleted == 0 {
            return Err(DbError::not_found("event", id));
        }
        info!(event_id = %id, "calendar event deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventColor;

    #[test]
    fn event_serializes_date_only() {
        let event = CalendarEvent {
            id: Uuid::nil(),
            title: "Launch".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            start_time: Some("09:00".into()),
            end_time: None,
            color: "blue".into(),
            blog_id: None,
            blog: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["date"], "2024-05-01");
        assert_eq!(json["startTime"], "09:00");
        assert!(json["blog"].is_null());
    }

    #[test]
    fn stored_times_parse_leniently() {
        assert_eq!(stored_time(Some("09:30")).map(format_time).as_deref(), Some("09:30"));
        assert_eq!(stored_time(Some("garbage")), None);
        assert_eq!(stored_time(None), None);
    }

    #[test]
    fn cleared_times_do_not_fall_back_to_stored_ones() {
        let nine = parse_time("t", "09:00").ok();
        assert_eq!(merged_time(None, Some("10:00")), parse_time("t", "10:00").ok());
        assert_eq!(merged_time(Some(None), Some("10:00")), None);
        assert_eq!(merged_time(Some(nine), None), nine);

        // clearing the start lets an earlier end stand
        let start = merged_time(Some(None), Some("10:00"));
        let end = merged_time(Some(nine), Some("11:00"));
        assert!(times_in_order(start, end));
    }

    #[tokio::test]
    async fn inverted_times_are_rejected_before_the_store() {
        let pool = crate::db::create_lazy_pool("postgres://blog@127.0.0.1:1/blog", 1)
            .expect("url parses");
        let db = Database::new(pool);
        let input = NewEvent {
            title: "Standup".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            start_time: parse_time("startTime", "10:00").ok(),
            end_time: parse_time("endTime", "09:00").ok(),
            color: EventColor::Green,
            blog_id: None,
        };
        let err = CalendarRepo::new(&db).create(&input).await.unwrap_err();
        assert!(matches!(err, DbError::Rejected(TIME_ORDER)));
    }
}
