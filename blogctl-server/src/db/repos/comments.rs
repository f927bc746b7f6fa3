//! Comment repository
//!
//! Public reads see approved comments only. Moderation calls are scoped to
//! the post in the path, so a comment id from another post is a 404.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::db::{Database, DbError};
use crate::models::{CommentSort, CommentStatus, NewComment, Paginated, Pagination};

use super::blogs::BlogRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub name: String,
    pub comment: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

fn comment_from_row(row: &PgRow) -> Result<Comment, sqlx::Error> {
    Ok(Comment {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        comment: row.try_get("comment")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Comment repository
pub struct CommentRepo<'a> {
    db: &'a Database,
}

impl<'a> CommentRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Approved comments on a post, one page, with the total.
    pub async fn list(
        &self,
        blog: &BlogRef,
        sort: CommentSort,
        page: Pagination,
    ) -> Result<Paginated<Comment>, DbError> {
        let sql = match sort {
            CommentSort::Newest => {
                r#"
                SELECT id, name, comment, status, created_at, COUNT(*) OVER() AS total
                FROM comments
                WHERE blog_id = $1 AND status = 'approved'
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#
            }
            CommentSort::Oldest => {
                r#"
                SELECT id, name, comment, status, created_at, COUNT(*) OVER() AS total
                FROM comments
                WHERE blog_id = $1 AND status = 'approved'
                ORDER BY created_at ASC
                LIMIT $2 OFFSET $3
                "#
            }
        };

        let pool = self.db.pool();
        let blog_id = blog.id;
        let rows = self
            .db
            .run(move || async move {
                let rows = sqlx::query(sql)
                    .bind(blog_id)
                    .bind(page.limit())
                    .bind(page.offset())
                    .fetch_all(pool)
                    .await?;
                Ok::<_, DbError>(rows)
            })
            .await?;

        let window = rows
            .first()
            .map(|row| row.try_get::<i64, _>("total"))
            .transpose()?;
        let total = match page.window_total(window) {
            Some(total) => total,
            None => {
                self.db
                    .run(move || async move {
                        let total: i64 = sqlx::query_scalar(
                            "SELECT COUNT(*) FROM comments WHERE blog_id = $1 AND status = 'approved'",
                        )
                        .bind(blog_id)
                        .fetch_one(pool)
                        .await?;
                        Ok::<_, DbError>(total)
                    })
                    .await?
            }
        };
        let items = rows
            .iter()
            .map(comment_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paginated { items, total, page })
    }

    /// Post a comment. New comments are approved immediately.
    pub async fn create(
        &self,
        blog: &BlogRef,
        input: &NewComment,
        ip: Option<&str>,
    ) -> Result<Comment, DbError> {
        if !blog.enable_comments {
            return Err(DbError::Rejected("Comments are disabled for this blog"));
        }

        let pool = self.db.pool();
        let blog_id = blog.id;
        let row = self
            .db
            .run(move || async move {
                let row = sqlx::query(
                    r#"
                    INSERT INTO comments (blog_id, name, comment, ip_address, status)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, name, comment, status, created_at
                    "#,
                )
                .bind(blog_id)
                .bind(&input.name)
                .bind(&input.comment)
                .bind(ip)
                .bind(CommentStatus::Approved.as_str())
                .fetch_one(pool)
                .await?;
                Ok::<_, DbError>(row)
            })
            .await?;

        let comment = comment_from_row(&row)?;
        info!(blog_id = %blog_id, comment_id = %comment.id, "comment posted");
        Ok(comment)
    }

    /// Delete a comment belonging to `blog`.
    pub async fn delete(&self, blog: &BlogRef, id: Uuid) -> Result<(), DbError> {
        let pool = self.db.pool();
        let blog_id = blog.id;
        let deleted = self
            .db
            .run(move || async move {
                let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND blog_id = $2")
                    .bind(id)
                    .bind(blog_id)
                    .execute(pool)
                    .await?;
                Ok::<_, DbError>(result.rows_affected())
            })
            .await?;

        if deleted == 0 {
            return Err(DbError::not_found("comment", id));
        }
        info!(comment_id = %id, "comment deleted");
        Ok(())
    }

    /// Moderate a comment belonging to `blog`.
    pub async fn set_status(
        &self,
        blog: &BlogRef,
        id: Uuid,
        status: CommentStatus,
    ) -> Result<Comment, DbError> {
        let pool = self.db.pool();
        let blog_id = blog.id;
        let row = self
            .db
            .run(move || async move {
                let row = sqlx::query(
                    r#"
                    UPDATE comments SET status = $3, updated_at = NOW()
                    WHERE id = $1 AND blog_id = $2
                    RETURNING id, name, comment, status, created_at
                    "#,
                )
                .bind(id)
                .bind(blog_id)
                .bind(status.as_str())
                .fetch_optional(pool)
                .await?;
                Ok::<_, DbError>(row)
            })
            .await?
            .ok_or_else(|| DbError::not_found("comment", id))?;

        info!(comment_id = %id, status = %status, "comment status updated");
        Ok(comment_from_row(&row)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_db() -> Database {
        let pool = crate::db::create_lazy_pool("postgres://blog@127.0.0.1:1/blog", 1)
            .expect("url parses");
        Database::new(pool)
    }

    #[tokio::test]
    async fn disabled_comments_are_rejected_before_touching_the_store() {
        let db = lazy_db();
        let blog = BlogRef {
            id: Uuid::nil(),
            enable_voting: true,
            enable_comments: false,
        };
        let input = NewComment {
            name: "Ada".into(),
            comment: "Hi".into(),
        };

        let err = CommentRepo::new(&db)
            .create(&blog, &input, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rejected("Comments are disabled for this blog")));
    }
}
