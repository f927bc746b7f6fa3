//! Schema migrations
//!
//! Every statement is idempotent, so running them on each start is safe.

use tracing::info;

use super::{Database, DbError};

const SCHEMA: &[(&str, &str)] = &[
    (
        "blogs",
        r#"
        CREATE TABLE IF NOT EXISTS blogs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            slug TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            author TEXT,
            cover_image TEXT,
            read_time INTEGER,
            layout_type TEXT NOT NULL DEFAULT 'single-column',
            max_width TEXT NOT NULL DEFAULT '800px',
            show_table_of_contents BOOLEAN NOT NULL DEFAULT FALSE,
            enable_voting BOOLEAN NOT NULL DEFAULT TRUE,
            enable_social_share BOOLEAN NOT NULL DEFAULT TRUE,
            enable_comments BOOLEAN NOT NULL DEFAULT TRUE,
            status TEXT NOT NULL DEFAULT 'published',
            published_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT blogs_slug_key UNIQUE (slug)
        )
        "#,
    ),
    (
        "blog_blocks",
        r#"
        CREATE TABLE IF NOT EXISTS blog_blocks (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            blog_id UUID NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
            block_type TEXT NOT NULL,
            content JSONB NOT NULL DEFAULT '{}',
            block_order INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "tags",
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "blog_tags",
        r#"
        CREATE TABLE IF NOT EXISTS blog_tags (
            blog_id UUID NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
            tag_id UUID NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (blog_id, tag_id)
        )
        "#,
    ),
    (
        "blog_links",
        r#"
        CREATE TABLE IF NOT EXISTS blog_links (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            blog_id UUID NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
            label TEXT NOT NULL,
            url TEXT NOT NULL,
            link_type TEXT NOT NULL DEFAULT 'external',
            link_order INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "blog_votes",
        r#"
        CREATE TABLE IF NOT EXISTS blog_votes (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            blog_id UUID NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
            ip_address TEXT,
            session_id TEXT,
            vote_type TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (ip_address IS NOT NULL OR session_id IS NOT NULL)
        )
        "#,
    ),
    (
        "comments",
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            blog_id UUID NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            comment TEXT NOT NULL,
            ip_address TEXT,
            status TEXT NOT NULL DEFAULT 'approved',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "calendar_events",
        r#"
        CREATE TABLE IF NOT EXISTS calendar_events (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            title TEXT NOT NULL,
            description TEXT,
            event_date DATE NOT NULL,
            start_time TEXT,
            end_time TEXT,
            color TEXT NOT NULL DEFAULT 'blue',
            blog_id UUID REFERENCES blogs(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "search_history",
        r#"
        CREATE TABLE IF NOT EXISTS search_history (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            ip_address TEXT,
            query TEXT NOT NULL,
            results_count INTEGER,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "indexes",
        r#"
        CREATE INDEX IF NOT EXISTS idx_blogs_status_created ON blogs (status, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_blog_blocks_blog ON blog_blocks (blog_id, block_order);
        CREATE INDEX IF NOT EXISTS idx_blog_links_blog ON blog_links (blog_id, link_order);
        CREATE INDEX IF NOT EXISTS idx_blog_tags_tag ON blog_tags (tag_id);
        CREATE INDEX IF NOT EXISTS idx_blog_votes_blog ON blog_votes (blog_id, vote_type);
        CREATE INDEX IF NOT EXISTS idx_comments_blog ON comments (blog_id, status, created_at);
        CREATE INDEX IF NOT EXISTS idx_calendar_events_date ON calendar_events (event_date, start_time)
        "#,
    ),
];

/// Create every table and index that does not exist yet.
pub async fn run(db: &Database) -> Result<(), DbError> {
    info!("running migrations");

    let pool = db.pool();
    for &(name, statement) in SCHEMA {
        db.run(move || async move {
            // raw_sql allows the multi-statement index batch
            sqlx::raw_sql(statement).execute(pool).await?;
            Ok::<_, DbError>(())
        })
        .await?;
        tracing::debug!(step = name, "migration applied");
    }

    info!(steps = SCHEMA.len(), "migrations complete");
    Ok(())
}
