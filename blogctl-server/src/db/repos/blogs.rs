//! Blog repository
//!
//! - list: one query with tag aggregation and `COUNT(*) OVER()` (no N+1),
//!   plus a plain count when a page lands past the end
//! - create/update: one transaction per attempt (post row, tags, links, blocks)
//! - slugs: assigned through the core slug assigner, re-assigned on a race

use async_trait::async_trait;
use blogctl_core::{estimate_read_time, SlugAssigner, SlugError, SlugLookup};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{Database, DbError};
use crate::models::{
    BlogFilter, BlogPatch, BlogSort, NewBlock, NewBlog, NewLink, Paginated, TagRef, Voter,
    VotingStats,
};

/// Slug reassignment rounds when a concurrent insert wins the race.
const SLUG_RACE_ROUNDS: u32 = 3;

const SLUG_CONSTRAINT: &str = "blogs_slug_key";

/// Listing filter over `blogs b`: `$1` tag slugs, `$2` author, `$3` ILIKE pattern.
const LIST_FILTER: &str = r#"b.status = 'published'
              AND ($1::text[] IS NULL OR EXISTS (
                    SELECT 1 FROM blog_tags ft JOIN tags fg ON fg.id = ft.tag_id
                    WHERE ft.blog_id = b.id AND fg.slug = ANY($1)))
              AND ($2::text IS NULL OR b.author = $2)
              AND ($3::text IS NULL
                   OR b.title ILIKE $3
                   OR b.description ILIKE $3
                   OR EXISTS (
                        SELECT 1 FROM blog_tags st JOIN tags sg ON sg.id = st.tag_id
                        WHERE st.blog_id = b.id AND sg.name ILIKE $3))"#;

const SHARE_PLATFORMS: &[&str] = &["twitter", "facebook", "linkedin", "copy"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogMeta {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub read_time: Option<i32>,
    pub cover_image: Option<String>,
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlogPreview {
    pub id: Uuid,
    pub slug: String,
    pub meta: BlogMeta,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogLayout {
    #[serde(rename = "type")]
    pub layout_type: String,
    pub max_width: String,
    pub show_table_of_contents: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogSettings {
    pub enable_voting: bool,
    pub enable_social_share: bool,
    pub enable_comments: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogLink {
    pub id: Uuid,
    pub label: String,
    pub url: String,
    #[serde(rename = "type")]
    pub link_type: String,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogBlock {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub block_type: String,
    pub content: Value,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialShare {
    pub enabled: bool,
    pub platforms: &'static [&'static str],
}

/// Full post as rendered by the detail endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogDetail {
    pub id: Uuid,
    pub slug: String,
    pub status: String,
    pub meta: BlogMeta,
    pub tags: Vec<String>,
    pub layout: BlogLayout,
    pub settings: BlogSettings,
    pub comments_count: i64,
    pub links: Vec<BlogLink>,
    pub blocks: Vec<BlogBlock>,
    pub voting: VotingStats,
    pub social_share: SocialShare,
}

/// The columns other repositories need before touching a post's children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlogRef {
    pub id: Uuid,
    pub enable_voting: bool,
    pub enable_comments: bool,
}

/// Which post a detail load targets
#[derive(Debug, Clone, Copy)]
enum BlogKey<'s> {
    /// Public lookup: published posts only
    PublishedSlug(&'s str),
    /// Admin lookup after a write: any status
    Id(Uuid),
}

/// Escape `%`, `_` and `\` for an ILIKE pattern and wrap it in wildcards.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Next move after a write lost its slug to a concurrent insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlugRace {
    /// Derive a fresh slug and write again
    Reassign,
    /// The slug was not generated here, so it is simply taken
    Taken,
    /// Every round lost
    GiveUp,
}

/// `round` is the 0-based index of the write that just failed.
fn slug_race_step(fixed_slug: bool, round: u32) -> SlugRace {
    if fixed_slug {
        SlugRace::Taken
    } else if round + 1 >= SLUG_RACE_ROUNDS {
        SlugRace::GiveUp
    } else {
        SlugRace::Reassign
    }
}

fn order_clause(sort: BlogSort) -> &'static str {
    match sort {
        BlogSort::Newest => "b.published_at DESC NULLS LAST, b.created_at DESC",
        BlogSort::Oldest => "b.published_at ASC NULLS LAST, b.created_at ASC",
        BlogSort::Popular => "upvotes DESC, b.published_at DESC NULLS LAST, b.created_at DESC",
    }
}

fn read_time(blocks: &[NewBlock]) -> Option<i32> {
    if blocks.is_empty() {
        return None;
    }
    Some(estimate_read_time(
        blocks.iter().map(|b| (b.block_type.as_str(), &b.content)),
    ))
}

fn preview_from_row(row: &PgRow) -> Result<BlogPreview, sqlx::Error> {
    Ok(BlogPreview {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        meta: meta_from_row(row)?,
        tags: row.try_get("tags")?,
    })
}

fn meta_from_row(row: &PgRow) -> Result<BlogMeta, sqlx::Error> {
    Ok(BlogMeta {
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        author: row.try_get("author")?,
        published_at: row.try_get("published_at")?,
        read_time: row.try_get("read_time")?,
        cover_image: row.try_get("cover_image")?,
    })
}

/// Blog repository
pub struct BlogRepo<'a> {
    db: &'a Database,
}

impl<'a> BlogRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// List published posts matching `filter`.
    ///
    /// "popular" orders by upvote count inside the same query.
    pub async fn list(&self, filter: &BlogFilter) -> Result<Paginated<BlogPreview>, DbError> {
        let sql = format!(
            r#"
            SELECT
                b.id, b.slug, b.title, b.description, b.author,
                b.published_at, b.read_time, b.cover_image,
                COALESCE(
                    ARRAY_AGG(t.name ORDER BY t.name) FILTER (WHERE t.id IS NOT NULL),
                    '{{}}'
                ) AS tags,
                (SELECT COUNT(*) FROM blog_votes v
                  WHERE v.blog_id = b.id AND v.vote_type = 'upvote') AS upvotes,
                COUNT(*) OVER() AS total
            FROM blogs b
            LEFT JOIN blog_tags bt ON bt.blog_id = b.id
            LEFT JOIN tags t ON t.id = bt.tag_id
            WHERE {filter}
            GROUP BY b.id
            ORDER BY {order}
            LIMIT $4 OFFSET $5
            "#,
            filter = LIST_FILTER,
            order = order_clause(filter.sort)
        );

        let pool = self.db.pool();
        let sql = sql.as_str();
        let tags = (!filter.tags.is_empty()).then_some(filter.tags.as_slice());
        let author = filter.author.as_deref();
        let search = filter.search.as_deref().map(contains_pattern);
        let search = search.as_deref();
        let page = filter.page;

        let rows = self
            .db
            .run(move || async move {
                let rows = sqlx::query(sql)
                    .bind(tags)
                    .bind(author)
                    .bind(search)
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
                let count_sql = format!("SELECT COUNT(*) FROM blogs b WHERE {LIST_FILTER}");
                let count_sql = count_sql.as_str();
                self.db
                    .run(move || async move {
                        let total: i64 = sqlx::query_scalar(count_sql)
                            .bind(tags)
                            .bind(author)
                            .bind(search)
                            .fetch_one(pool)
                            .await?;
                        Ok::<_, DbError>(total)
                    })
                    .await?
            }
        };
        let items = rows
            .iter()
            .map(preview_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paginated { items, total, page })
    }

    /// Published post with blocks, links, tags, comment count and votes.
    pub async fn get_published(&self, slug: &str, voter: &Voter) -> Result<BlogDetail, DbError> {
        self.load_detail(BlogKey::PublishedSlug(slug), voter).await
    }

    /// Any post by id, regardless of status (used after admin writes).
    pub async fn get_by_id(&self, id: Uuid) -> Result<BlogDetail, DbError> {
        self.load_detail(BlogKey::Id(id), &Voter::default()).await
    }

    async fn load_detail(&self, key: BlogKey<'_>, voter: &Voter) -> Result<BlogDetail, DbError> {
        let condition = match key {
            BlogKey::PublishedSlug(_) => "b.slug = $1 AND b.status = 'published'",
            BlogKey::Id(_) => "b.id = $1",
        };
        let sql = format!(
            r#"
            SELECT
                b.*,
                (SELECT COUNT(*) FROM comments c
                  WHERE c.blog_id = b.id AND c.status = 'approved') AS comments_count,
                (SELECT COUNT(*) FROM blog_votes v
                  WHERE v.blog_id = b.id AND v.vote_type = 'upvote') AS upvotes,
                (SELECT COUNT(*) FROM blog_votes v
                  WHERE v.blog_id = b.id AND v.vote_type = 'downvote') AS downvotes,
                (SELECT v.vote_type FROM blog_votes v
                  WHERE v.blog_id = b.id AND (v.ip_address = $2 OR v.session_id = $3)
                  ORDER BY v.updated_at DESC LIMIT 1) AS user_vote,
                COALESCE((SELECT ARRAY_AGG(t.name ORDER BY t.name)
                  FROM blog_tags bt JOIN tags t ON t.id = bt.tag_id
                  WHERE bt.blog_id = b.id), '{{}}') AS tags
            FROM blogs b
            WHERE {condition}
            "#
        );

        let pool = self.db.pool();
        let sql = sql.as_str();
        let ip = voter.ip.as_deref();
        let session = voter.session.as_deref();

        let (row, links, blocks) = self
            .db
            .run(move || async move {
                let query = sqlx::query(sql);
                let query = match key {
                    BlogKey::PublishedSlug(slug) => query.bind(slug),
                    BlogKey::Id(id) => query.bind(id),
                };
                let Some(row) = query.bind(ip).bind(session).fetch_optional(pool).await? else {
                    return Ok(None);
                };
                let id: Uuid = row.try_get("id")?;

                let links = sqlx::query(
                    "SELECT id, label, url, link_type, link_order FROM blog_links
                     WHERE blog_id = $1 ORDER BY link_order, created_at",
                )
                .bind(id)
                .fetch_all(pool)
                .await?;
                let blocks = sqlx::query(
                    "SELECT id, block_type, content, block_order FROM blog_blocks
                     WHERE blog_id = $1 ORDER BY block_order, created_at",
                )
                .bind(id)
                .fetch_all(pool)
                .await?;
                Ok::<_, DbError>(Some((row, links, blocks)))
            })
            .await?
            .ok_or_else(|| match key {
                BlogKey::PublishedSlug(slug) => DbError::not_found("blog", slug),
                BlogKey::Id(id) => DbError::not_found("blog", id),
            })?;

        let links = links
            .iter()
            .map(|r| {
                Ok(BlogLink {
                    id: r.try_get("id")?,
                    label: r.try_get("label")?,
                    url: r.try_get("url")?,
                    link_type: r.try_get("link_type")?,
                    order: r.try_get("link_order")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        let blocks = blocks
            .iter()
            .map(|r| {
                Ok(BlogBlock {
                    id: r.try_get("id")?,
                    block_type: r.try_get("block_type")?,
                    content: r.try_get("content")?,
                    order: r.try_get("block_order")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let enable_voting: bool = row.try_get("enable_voting")?;
        let enable_social_share: bool = row.try_get("enable_social_share")?;

        Ok(BlogDetail {
            id: row.try_get("id")?,
            slug: row.try_get("slug")?,
            status: row.try_get("status")?,
            meta: meta_from_row(&row)?,
            tags: row.try_get("tags")?,
            layout: BlogLayout {
                layout_type: row.try_get("layout_type")?,
                max_width: row.try_get("max_width")?,
                show_table_of_contents: row.try_get("show_table_of_contents")?,
            },
            settings: BlogSettings {
                enable_voting,
                enable_social_share,
                enable_comments: row.try_get("enable_comments")?,
            },
            comments_count: row.try_get("comments_count")?,
            links,
            blocks,
            voting: VotingStats {
                enabled: enable_voting,
                upvotes: row.try_get("upvotes")?,
                downvotes: row.try_get("downvotes")?,
                user_vote: row.try_get("user_vote")?,
            },
            social_share: SocialShare {
                enabled: enable_social_share,
                platforms: SHARE_PLATFORMS,
            },
        })
    }

    /// Id and feature flags of a post in any status.
    pub async fn find(&self, slug: &str) -> Result<BlogRef, DbError> {
        let pool = self.db.pool();
        let row = self
            .db
            .run(move || async move {
                let row = sqlx::query(
                    "SELECT id, enable_voting, enable_comments FROM blogs WHERE slug = $1",
                )
                .bind(slug)
                .fetch_optional(pool)
                .await?;
                Ok::<_, DbError>(row)
            })
            .await?
            .ok_or_else(|| DbError::not_found("blog", slug))?;

        Ok(BlogRef {
            id: row.try_get("id")?,
            enable_voting: row.try_get("enable_voting")?,
            enable_comments: row.try_get("enable_comments")?,
        })
    }

    /// Whether a post with this id exists.
    pub async fn exists(&self, id: Uuid) -> Result<bool, DbError> {
        let pool = self.db.pool();
        self.db
            .run(move || async move {
                let found: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM blogs WHERE id = $1)")
                        .bind(id)
                        .fetch_one(pool)
                        .await?;
                Ok::<_, DbError>(found)
            })
            .await
    }

    /// Create a post. Without an explicit slug one is derived from the title.
    pub async fn create(&self, input: &NewBlog) -> Result<BlogDetail, DbError> {
        let mut slug = match &input.slug {
            Some(explicit) => explicit.as_str().to_owned(),
            None => self.assign_slug(&input.title, None).await?,
        };

        let mut round = 0;
        let id = loop {
            match self.insert(input, &slug).await {
                Ok(id) => break id,
                Err(err) if err.unique_violation() == Some(SLUG_CONSTRAINT) => {
                    match slug_race_step(input.slug.is_some(), round) {
                        SlugRace::Reassign => {}
                        SlugRace::Taken => {
                            return Err(DbError::Conflict(format!(
                                "slug '{slug}' is already in use"
                            )));
                        }
                        SlugRace::GiveUp => {
                            return Err(DbError::Conflict(format!(
                                "could not reserve a slug for '{}'",
                                input.title
                            )));
                        }
                    }
                    round += 1;
                    warn!(slug = %slug, round, "slug taken concurrently, reassigning");
                    slug = self.assign_slug(&input.title, None).await?;
                }
                Err(err) => return Err(err),
            }
        };

        info!(blog_id = %id, slug = %slug, "blog created");
        self.get_by_id(id).await
    }

    async fn insert(&self, input: &NewBlog, slug: &str) -> Result<Uuid, DbError> {
        let pool = self.db.pool();
        let read_time = read_time(&input.blocks);

        self.db
            .run(move || async move {
                let mut tx = pool.begin().await?;

                let id: Uuid = sqlx::query_scalar(
                    r#"
                    INSERT INTO blogs (
                        slug, title, description, author, cover_image, read_time,
                        layout_type, max_width, show_table_of_contents,
                        enable_voting, enable_social_share, enable_comments,
                        status, published_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                            CASE WHEN $13 = 'published' THEN NOW() END)
                    RETURNING id
                    "#,
                )
                .bind(slug)
                .bind(&input.title)
                .bind(input.description.as_deref())
                .bind(input.author.as_deref())
                .bind(input.cover_image.as_deref())
                .bind(read_time)
                .bind(input.layout_type.as_str())
                .bind(&input.max_width)
                .bind(input.show_table_of_contents)
                .bind(input.enable_voting)
                .bind(input.enable_social_share)
                .bind(input.enable_comments)
                .bind(input.status.as_str())
                .fetch_one(&mut *tx)
                .await?;

                replace_tags(&mut tx, id, &input.tags).await?;
                replace_links(&mut tx, id, &input.links).await?;
                replace_blocks(&mut tx, id, &input.blocks).await?;

                tx.commit().await?;
                Ok::<_, DbError>(id)
            })
            .await
    }

    /// Apply a sparse update to the post at `slug` (any status).
    ///
    /// The slug is re-derived only when the title changes and no explicit
    /// slug was given.
    pub async fn update(&self, slug: &str, patch: &BlogPatch) -> Result<BlogDetail, DbError> {
        let pool = self.db.pool();
        let current = self
            .db
            .run(move || async move {
                let row = sqlx::query("SELECT id, title FROM blogs WHERE slug = $1")
                    .bind(slug)
                    .fetch_optional(pool)
                    .await?;
                Ok::<_, DbError>(row)
            })
            .await?
            .ok_or_else(|| DbError::not_found("blog", slug))?;
        let id: Uuid = current.try_get("id")?;
        let current_title: String = current.try_get("title")?;

        let retitled = patch
            .title
            .as_deref()
            .filter(|title| *title != current_title);
        let mut new_slug = match (&patch.slug, retitled) {
            (Some(explicit), _) => explicit.as_str().to_owned(),
            (None, Some(title)) => self.assign_slug(title, Some(slug)).await?,
            (None, None) => slug.to_owned(),
        };

        let regenerated = retitled.filter(|_| patch.slug.is_none());
        let mut round = 0;
        loop {
            match self.apply_patch(id, patch, &new_slug).await {
                Ok(()) => break,
                Err(err) if err.unique_violation() == Some(SLUG_CONSTRAINT) => {
                    let title = match (slug_race_step(regenerated.is_none(), round), regenerated) {
                        (SlugRace::Reassign, Some(title)) => title,
                        (SlugRace::GiveUp, Some(title)) => {
                            return Err(DbError::Conflict(format!(
                                "could not reserve a slug for '{title}'"
                            )));
                        }
                        _ => {
                            return Err(DbError::Conflict(format!(
                                "slug '{new_slug}' is already in use"
                            )));
                        }
                    };
                    round += 1;
                    warn!(slug = %new_slug, round, "slug taken concurrently, reassigning");
                    new_slug = self.assign_slug(title, Some(slug)).await?;
                }
                Err(err) => return Err(err),
            }
        }

        info!(blog_id = %id, slug = %new_slug, "blog updated");
        self.get_by_id(id).await
    }

    async fn apply_patch(&self, id: Uuid, patch: &BlogPatch, slug: &str) -> Result<(), DbError> {
        let pool = self.db.pool();
        let read_time = patch.blocks.as_deref().map(read_time);

        self.db
            .run(move || async move {
                let mut tx = pool.begin().await?;

                sqlx::query(
                    r#"
                    UPDATE blogs SET
                        slug = $2,
                        title = COALESCE($3, title),
                        description = CASE WHEN $4 THEN $5 ELSE description END,
                        author = CASE WHEN $6 THEN $7 ELSE author END,
                        cover_image = CASE WHEN $8 THEN $9 ELSE cover_image END,
                        read_time = CASE WHEN $10 THEN $11 ELSE read_time END,
                        layout_type = COALESCE($12, layout_type),
                        max_width = COALESCE($13, max_width),
                        show_table_of_contents = COALESCE($14, show_table_of_contents),
                        enable_voting = COALESCE($15, enable_voting),
                        enable_social_share = COALESCE($16, enable_social_share),
                        enable_comments = COALESCE($17, enable_comments),
                        status = COALESCE($18, status),
                        published_at = CASE
                            WHEN $18 = 'published' AND published_at IS NULL THEN NOW()
                            ELSE published_at
                        END,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(slug)
                .bind(patch.title.as_deref())
                .bind(patch.description.is_some())
                .bind(patch.description.as_ref().and_then(Option::as_deref))
                .bind(patch.author.is_some())
                .bind(patch.author.as_ref().and_then(Option::as_deref))
                .bind(patch.cover_image.is_some())
                .bind(patch.cover_image.as_ref().and_then(Option::as_deref))
                .bind(read_time.is_some())
                .bind(read_time.flatten())
                .bind(patch.layout_type.map(|l| l.as_str()))
                .bind(patch.max_width.as_deref())
                .bind(patch.show_table_of_contents)
                .bind(patch.enable_voting)
                .bind(patch.enable_social_share)
                .bind(patch.enable_comments)
                .bind(patch.status.map(|s| s.as_str()))
                .execute(&mut *tx)
                .await?;

                if let Some(tags) = &patch.tags {
                    replace_tags(&mut tx, id, tags).await?;
                }
                if let Some(links) = &patch.links {
                    replace_links(&mut tx, id, links).await?;
                }
                if let Some(blocks) = &patch.blocks {
                    replace_blocks(&mut tx, id, blocks).await?;
                }

                tx.commit().await?;
                Ok::<_, DbError>(())
            })
            .await
    }

    /// Delete a post and, through cascades, everything hanging off it.
    pub async fn delete(&self, slug: &str) -> Result<(), DbError> {
        let pool = self.db.pool();
        let deleted = self
            .db
            .run(move || async move {
                let result = sqlx::query("DELETE FROM blogs WHERE slug = $1")
                    .bind(slug)
                    .execute(pool)
                    .await?;
                Ok::<_, DbError>(result.rows_affected())
            })
            .await?;

        if deleted == 0 {
            return Err(DbError::not_found("blog", slug));
        }
        info!(slug = %slug, "blog deleted");
        Ok(())
    }

    async fn assign_slug(&self, title: &str, existing: Option<&str>) -> Result<String, DbError> {
        let assigner = SlugAssigner::new(self, self.db.executor());
        let slug = assigner.assign(title, existing).await.map_err(|err| match err {
            SlugError::Store(err) => err,
            SlugError::EmptyCandidate { .. } => {
                DbError::Rejected("Title must contain letters or digits to derive a slug")
            }
            exhausted @ SlugError::Exhausted { .. } => DbError::Conflict(exhausted.to_string()),
        })?;
        debug!(title = %title, slug = %slug, "slug assigned");
        Ok(slug)
    }
}

#[async_trait]
impl SlugLookup for BlogRepo<'_> {
    type Error = DbError;

    async fn slug_taken(&self, slug: &str) -> Result<bool, DbError> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM blogs WHERE slug = $1)")
            .bind(slug)
            .fetch_one(self.db.pool())
            .await?;
        Ok(taken)
    }
}

/// Replace the post's tag set, creating missing tags.
async fn replace_tags(conn: &mut PgConnection, blog_id: Uuid, tags: &[TagRef]) -> Result<(), DbError> {
    sqlx::query("DELETE FROM blog_tags WHERE blog_id = $1")
        .bind(blog_id)
        .execute(&mut *conn)
        .await?;

    for tag in tags {
        // the no-op update makes RETURNING yield the existing row too
        let tag_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tags (name, slug) VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING id
            "#,
        )
        .bind(&tag.name)
        .bind(&tag.slug)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO blog_tags (blog_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(blog_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn replace_links(
    conn: &mut PgConnection,
    blog_id: Uuid,
    links: &[NewLink],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM blog_links WHERE blog_id = $1")
        .bind(blog_id)
        .execute(&mut *conn)
        .await?;

    for link in links {
        sqlx::query(
            "INSERT INTO blog_links (blog_id, label, url, link_type, link_order)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(blog_id)
        .bind(&link.label)
        .bind(&link.url)
        .bind(link.link_type.as_str())
        .bind(link.order)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn replace_blocks(
    conn: &mut PgConnection,
    blog_id: Uuid,
    blocks: &[NewBlock],
) -> Result<(), DbError> {
    sqlx::query("DELETE FROM blog_blocks WHERE blog_id = $1")
        .bind(blog_id)
        .execute(&mut *conn)
        .await?;

    for block in blocks {
        sqlx::query(
            "INSERT INTO blog_blocks (blog_id, block_type, content, block_order)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(blog_id)
        .bind(block.block_type.as_str())
        .bind(&block.content)
        .bind(block.order)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::BlockType;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(contains_pattern("rust"), "%rust%");
        assert_eq!(contains_pattern("100%_off"), "%100\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn popular_sort_orders_by_upvotes() {
        assert!(order_clause(BlogSort::Popular).starts_with("upvotes DESC"));
        assert!(order_clause(BlogSort::Oldest).contains("ASC"));
    }

    #[test]
    fn fixed_slugs_conflict_on_the_first_race() {
        assert_eq!(slug_race_step(true, 0), SlugRace::Taken);
        assert_eq!(slug_race_step(true, 2), SlugRace::Taken);
    }

    #[test]
    fn generated_slugs_are_reassigned_until_rounds_run_out() {
        let steps: Vec<SlugRace> = (0..SLUG_RACE_ROUNDS)
            .map(|round| slug_race_step(false, round))
            .collect();
        assert_eq!(
            steps,
            vec![SlugRace::Reassign, SlugRace::Reassign, SlugRace::GiveUp]
        );
    }

    #[test]
    fn read_time_is_absent_without_blocks() {
        assert_eq!(read_time(&[]), None);
        let blocks = vec![NewBlock {
            block_type: BlockType::Paragraph,
            content: json!({ "text": "a few words" }),
            order: 0,
        }];
        assert_eq!(read_time(&blocks), Some(1));
    }

    #[test]
    fn detail_serializes_with_camel_case_members() {
        let detail = BlogDetail {
            id: Uuid::nil(),
            slug: "hello".into(),
            status: "published".into(),
            meta: BlogMeta {
                title: "Hello".into(),
                description: None,
                author: None,
                published_at: None,
                read_time: Some(2),
                cover_image: None,
            },
            tags: vec!["rust".into()],
            layout: BlogLayout {
                layout_type: "single-column".into(),
                max_width: "800px".into(),
                show_table_of_contents: false,
            },
            settings: BlogSettings {
                enable_voting: true,
                enable_social_share: true,
                enable_comments: false,
            },
            comments_count: 4,
            links: vec![],
            blocks: vec![],
            voting: VotingStats {
                enabled: true,
                upvotes: 1,
                downvotes: 0,
                user_vote: Some("upvote".into()),
            },
            social_share: SocialShare {
                enabled: true,
                platforms: SHARE_PLATFORMS,
            },
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["meta"]["readTime"], 2);
        assert_eq!(json["layout"]["type"], "single-column");
        assert_eq!(json["settings"]["enableComments"], false);
        assert_eq!(json["commentsCount"], 4);
        assert_eq!(json["voting"]["userVote"], "upvote");
        assert_eq!(json["socialShare"]["platforms"][3], "copy");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn create_assigns_suffixed_slugs() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url, 2).await.expect("pool");
        let db = Database::new(pool);
        crate::db::migrations::run(&db).await.expect("migrations");
        let repo = BlogRepo::new(&db);

        let title = format!("Repo Test {}", Uuid::new_v4());
        let input = crate::models::BlogRequest {
            title: Some(title.clone()),
            ..Default::default()
        }
        .validate_create()
        .expect("valid");

        let first = repo.create(&input).await.expect("first create");
        let second = repo.create(&input).await.expect("second create");
        assert_eq!(second.slug, format!("{}-1", first.slug));

        repo.delete(&first.slug).await.expect("delete first");
        repo.delete(&second.slug).await.expect("delete second");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn pages_past_the_end_keep_the_total() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url, 2).await.expect("pool");
        let db = Database::new(pool);
        crate::db::migrations::run(&db).await.expect("migrations");
        let repo = BlogRepo::new(&db);

        let author = format!("paging-{}", Uuid::new_v4());
        let mut slugs = Vec::new();
        for n in 0..3 {
            let input = crate::models::BlogRequest {
                title: Some(format!("{author} post {n}")),
                author: Some(author.clone()),
                status: Some("published".into()),
                ..Default::default()
            }
            .validate_create()
            .expect("valid");
            slugs.push(repo.create(&input).await.expect("create").slug);
        }

        let mut filter = BlogFilter::new(crate::models::Pagination::new(99, 10, 50));
        filter.author = Some(author.clone());
        let page = repo.list(&filter).await.expect("list");
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.meta().total_pages, 1);

        for slug in &slugs {
            repo.delete(slug).await.expect("delete");
        }
    }
}
