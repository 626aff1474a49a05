use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::db::DbPool;
use crate::errors::BlogResult;

/// Running totals kept on the `blog_stats` singleton row.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
pub struct Stats {
    pub users_active: i64,
    pub posts_approved: i64,
    pub likes: i64,
    pub bookmarks: i64,
    pub version: i64,
}

/// One adjustable column of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    UsersActive,
    PostsApproved,
    Likes,
    Bookmarks,
}

impl Counter {
    fn column(self) -> &'static str {
        match self {
            Counter::UsersActive => "users_active",
            Counter::PostsApproved => "posts_approved",
            Counter::Likes => "likes",
            Counter::Bookmarks => "bookmarks",
        }
    }
}

impl Stats {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Stats {
            users_active: row.get("users_active")?,
            posts_approved: row.get("posts_approved")?,
            likes: row.get("likes")?,
            bookmarks: row.get("bookmarks")?,
            version: row.get("version")?,
        })
    }

    pub fn get(pool: &DbPool) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM blog_stats WHERE id = 1", [], Self::from_row)
            .ok()
    }

    /// Apply a delta to one counter. Must be called with the connection (or
    /// transaction) that performs the triggering mutation.
    pub fn adjust(conn: &Connection, counter: Counter, delta: i64) -> BlogResult<()> {
        if delta == 0 {
            return Ok(());
        }
        let sql = format!(
            "UPDATE blog_stats SET {col} = {col} + ?1, version = version + 1,
             updated_at = CURRENT_TIMESTAMP WHERE id = 1",
            col = counter.column()
        );
        conn.execute(&sql, params![delta])?;
        Ok(())
    }

    /// Totals derived from the underlying tables. `version` is left at zero.
    pub fn recount(pool: &DbPool) -> Option<Self> {
        let conn = pool.get().ok()?;
        Self::recount_with(&conn).ok()
    }

    fn recount_with(conn: &Connection) -> rusqlite::Result<Self> {
        conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM users WHERE blocked = 0),
                (SELECT COUNT(*) FROM posts WHERE admin_approved = 1),
                (SELECT COUNT(*) FROM likes),
                (SELECT COUNT(*) FROM bookmarks)",
            [],
            |row| {
                Ok(Stats {
                    users_active: row.get(0)?,
                    posts_approved: row.get(1)?,
                    likes: row.get(2)?,
                    bookmarks: row.get(3)?,
                    version: 0,
                })
            },
        )
    }

    /// Overwrite the stored counters with the derived totals.
    pub fn resync(pool: &DbPool) -> BlogResult<Self> {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let fresh = Self::recount_with(&tx)?;
        tx.execute(
            "UPDATE blog_stats SET users_active = ?1, posts_approved = ?2, likes = ?3,
             bookmarks = ?4, version = version + 1, updated_at = CURRENT_TIMESTAMP WHERE id = 1",
            params![fresh.users_active, fresh.posts_approved, fresh.likes, fresh.bookmarks],
        )?;
        let stored = tx.query_row("SELECT * FROM blog_stats WHERE id = 1", [], Self::from_row)?;
        tx.commit()?;
        log::info!("Statistics resynchronised (version {})", stored.version);
        Ok(stored)
    }

    /// True when every stored counter matches its derived value.
    pub fn matches(&self, other: &Stats) -> bool {
        self.users_active == other.users_active
            && self.posts_approved == other.posts_approved
            && self.likes == other.likes
            && self.bookmarks == other.bookmarks
    }
}
