//! Search over published posts
//!
//! Matching is the blog listing's ILIKE filter; ranking happens per page.

use serde::Serialize;
use tracing::warn;

use crate::db::{Database, DbError};
use crate::models::{relevance_score, BlogFilter, Paginated, SearchQuery};

use super::blogs::{BlogPreview, BlogRepo};

/// Search hit: a listing entry plus its score
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub blog: BlogPreview,
    pub relevance_score: f64,
}

/// Order hits by score, highest first; ties keep listing order.
fn rank(query: &str, blogs: Vec<BlogPreview>) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = blogs
        .into_iter()
        .map(|blog| SearchHit {
            relevance_score: relevance_score(
                query,
                &blog.meta.title,
                blog.meta.description.as_deref(),
                &blog.tags,
            ),
            blog,
        })
        .collect();
    hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    hits
}

/// Search repository
pub struct SearchRepo<'a> {
    db: &'a Database,
}

impl<'a> SearchRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Run a search. When `ip` is known the query is recorded in
    /// `search_history`; a failed write is logged and otherwise ignored.
    pub async fn search(
        &self,
        query: &SearchQuery,
        ip: Option<&str>,
    ) -> Result<Paginated<SearchHit>, DbError> {
        let mut filter = BlogFilter::new(query.page);
        filter.tags = query.tags.clone();
        filter.search = Some(query.q.clone());

        let page = BlogRepo::new(self.db).list(&filter).await?;
        let total = page.total;
        let hits = Paginated {
            items: rank(&query.q, page.items),
            total,
            page: page.page,
        };

        if let Some(ip) = ip {
            if let Err(err) = self.record(&query.q, ip, total).await {
                warn!(error = %err, "failed to record search history");
            }
        }

        Ok(hits)
    }

    async fn record(&self, q: &str, ip: &str, results: i64) -> Result<(), DbError> {
        let pool = self.db.pool();
        let results = i32::try_from(results).unwrap_or(i32::MAX);
        self.db
            .run(move || async move {
                sqlx::query(
                    "INSERT INTO search_history (ip_address, query, results_count) VALUES ($1, $2, $3)",
                )
                .bind(ip)
                .bind(q)
                .bind(results)
                .execute(pool)
                .await?;
                Ok::<_, DbError>(())
            })
            .await
    }
}
