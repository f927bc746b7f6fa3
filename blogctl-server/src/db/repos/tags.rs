//! Tag repository
//!
//! Tags are created implicitly by blog writes; this side only reads.

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::db::{Database, DbError};
use crate::models::TagListing;

/// Tag with the number of published posts using it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagWithCount {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub blog_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

fn tag_from_row(row: &PgRow) -> Result<Tag, sqlx::Error> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
    })
}

/// Tag repository
pub struct TagRepo<'a> {
    db: &'a Database,
}

impl<'a> TagRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// All tags by name, or with `popular` only tags in use, most used first.
    ///
    /// Counts come from the same query (LEFT JOIN, no N+1).
    pub async fn list(&self, listing: TagListing) -> Result<Vec<TagWithCount>, DbError> {
        let sql = if listing.popular {
            r#"
            SELECT t.id, t.name, t.slug, t.description, COUNT(b.id) AS blog_count
            FROM tags t
            JOIN blog_tags bt ON bt.tag_id = t.id
            JOIN blogs b ON b.id = bt.blog_id AND b.status = 'published'
            GROUP BY t.id
            ORDER BY blog_count DESC, t.name ASC
            LIMIT $1
            "#
        } else {
            r#"
            SELECT t.id, t.name, t.slug, t.description, COUNT(b.id) AS blog_count
            FROM tags t
            LEFT JOIN blog_tags bt ON bt.tag_id = t.id
            LEFT JOIN blogs b ON b.id = bt.blog_id AND b.status = 'published'
            GROUP BY t.id
            ORDER BY t.name ASC
            LIMIT $1
            "#
        };

        let pool = self.db.pool();
        let limit = listing.limit;
        let rows = self
            .db
            .run(move || async move {
                // LIMIT NULL means no limit
                let rows = sqlx::query(sql).bind(limit).fetch_all(pool).await?;
                Ok::<_, DbError>(rows)
            })
            .await?;

        rows.iter()
            .map(|row| {
                let tag = tag_from_row(row)?;
                Ok(TagWithCount {
                    id: tag.id,
                    name: tag.name,
                    slug: tag.slug,
                    description: tag.description,
                    blog_count: row.try_get("blog_count")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DbError::from)
    }

    /// Get a tag by slug.
    pub async fn get(&self, slug: &str) -> Result<Tag, DbError> {
        let pool = self.db.pool();
        let row = self
            .db
            .run(move || async move {
                let row = sqlx::query("SELECT id, name, slug, description FROM tags WHERE slug = $1")
                    .bind(slug)
                    .fetch_optional(pool)
                    .await?;
                Ok::<_, DbError>(row)
            })
            .await?
            .ok_or_else(|| DbError::not_found("tag", slug))?;

        Ok(tag_from_row(&row)?)
    }
}
