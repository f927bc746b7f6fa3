//! Vote repository
//!
//! One vote per voter per post, where a voter is matched by ip address or
//! session id. Voting again replaces the previous vote.

use sqlx::Row;
use tracing::debug;

use crate::db::{Database, DbError};
use crate::models::{Voter, VoteType, VotingStats};

use super::blogs::BlogRef;

const ANONYMOUS_VOTER: &str = "IP address or session ID is required";
const VOTING_DISABLED: &str = "Voting is disabled for this blog";

/// Vote repository
pub struct VoteRepo<'a> {
    db: &'a Database,
}

impl<'a> VoteRepo<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record or replace the voter's vote, then return fresh counts.
    pub async fn vote(
        &self,
        blog: &BlogRef,
        vote_type: VoteType,
        voter: &Voter,
    ) -> Result<VotingStats, DbError> {
        if !blog.enable_voting {
            return Err(DbError::Rejected(VOTING_DISABLED));
        }
        if voter.is_anonymous() {
            return Err(DbError::Rejected(ANONYMOUS_VOTER));
        }

        let pool = self.db.pool();
        let blog_id = blog.id;
        let ip = voter.ip.as_deref();
        let session = voter.session.as_deref();
        self.db
            .run(move || async move {
                let mut tx = pool.begin().await?;

                let updated = sqlx::query(
                    r#"
                    UPDATE blog_votes SET vote_type = $4, updated_at = NOW()
                    WHERE blog_id = $1 AND (ip_address = $2 OR session_id = $3)
                    "#,
                )
                .bind(blog_id)
                .bind(ip)
                .bind(session)
                .bind(vote_type.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();

                if updated == 0 {
                    sqlx::query(
                        r#"
                        INSERT INTO blog_votes (blog_id, ip_address, session_id, vote_type)
                        VALUES ($1, $2, $3, $4)
                        "#,
                    )
                    .bind(blog_id)
                    .bind(ip)
                    .bind(session)
                    .bind(vote_type.as_str())
                    .execute(&mut *tx)
                    .await?;
                }

                tx.commit().await?;
                Ok::<_, DbError>(())
            })
            .await?;

        debug!(blog_id = %blog_id, vote = %vote_type, "vote recorded");
        self.stats(blog, voter).await
    }

    /// Remove the voter's vote, if any.
    pub async fn remove(&self, blog: &BlogRef, voter: &Voter) -> Result<VotingStats, DbError> {
        if voter.is_anonymous() {
            return Err(DbError::Rejected(ANONYMOUS_VOTER));
        }

        let pool = self.db.pool();
        let blog_id = blog.id;
        let ip = voter.ip.as_deref();
        let session = voter.session.as_deref();
        let removed = self
            .db
            .run(move || async move {
                let result = sqlx::query(
                    "DELETE FROM blog_votes WHERE blog_id = $1 AND (ip_address = $2 OR session_id = $3)",
                )
                .bind(blog_id)
                .bind(ip)
                .bind(session)
                .execute(pool)
                .await?;
                Ok::<_, DbError>(result.rows_affected())
            })
            .await?;

        debug!(blog_id = %blog_id, removed, "vote removed");
        let mut stats = self.stats(blog, voter).await?;
        stats.user_vote = None;
        Ok(stats)
    }

    /// Up/down counts plus the voter's own vote.
    pub async fn stats(&self, blog: &BlogRef, voter: &Voter) -> Result<VotingStats, DbError> {
        let pool = self.db.pool();
        let blog_id = blog.id;
        let ip = voter.ip.as_deref();
        let session = voter.session.as_deref();
        let row = self
            .db
            .run(move || async move {
                let row = sqlx::query(
                    r#"
                    SELECT
                        COUNT(*) FILTER (WHERE vote_type = 'upvote') AS upvotes,
                        COUNT(*) FILTER (WHERE vote_type = 'downvote') AS downvotes,
                        (SELECT v.vote_type FROM blog_votes v
                          WHERE v.blog_id = $1 AND (v.ip_address = $2 OR v.session_id = $3)
                          ORDER BY v.updated_at DESC LIMIT 1) AS user_vote
                    FROM blog_votes
                    WHERE blog_id = $1
                    "#,
                )
                .bind(blog_id)
                .bind(ip)
                .bind(session)
                .fetch_one(pool)
                .await?;
                Ok::<_, DbError>(row)
            })
            .await?;

        Ok(VotingStats {
            enabled: blog.enable_voting,
            upvotes: row.try_get("upvotes")?,
            downvotes: row.try_get("downvotes")?,
            user_vote: row.try_get("user_vote")?,
        })
    }
}
