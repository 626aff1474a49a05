use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;

use crate::db::DbPool;
use crate::errors::{BlogError, BlogResult};
use crate::models::stats::{Counter, Stats};

/// The two kinds of (user, post) edge. Both share one table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    Like,
    Bookmark,
}

/// A single stored edge, joined with display names for the dashboard.
#[derive(Debug, Serialize, Clone)]
pub struct Edge {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub post_id: i64,
    pub post_title: String,
    pub created_at: NaiveDateTime,
}

/// Result of a toggle: whether the edge exists now, and how many edges the
/// post has in total.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    pub active: bool,
    pub count: i64,
}

impl Edge {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Edge {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            user_name: row.get("user_name")?,
            post_id: row.get("post_id")?,
            post_title: row.get("post_title")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl Membership {
    fn table(self) -> &'static str {
        match self {
            Membership::Like => "likes",
            Membership::Bookmark => "bookmarks",
        }
    }

    fn counter(self) -> Counter {
        match self {
            Membership::Like => Counter::Likes,
            Membership::Bookmark => Counter::Bookmarks,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Membership::Like => "Like",
            Membership::Bookmark => "Bookmark",
        }
    }

    // ── Toggle ──

    /// Flip the edge for (user, post). The UNIQUE(user_id, post_id)
    /// constraint guarantees at most one edge; if a concurrent toggle wins
    /// the insert, the stored state is re-read and returned instead.
    pub fn toggle(self, pool: &DbPool, user_id: i64, post_id: i64) -> BlogResult<Toggle> {
        let mut conn = pool.get()?;
        match self.toggle_with(&mut conn, user_id, post_id) {
            Err(e) if e.is_constraint_violation() => {
                log::debug!(
                    "{} toggle raced for user {} post {}, reconciling",
                    self.label(),
                    user_id,
                    post_id
                );
                Ok(Toggle {
                    active: self.exists_with(&conn, user_id, post_id)?,
                    count: self.count_with(&conn, post_id)?,
                })
            }
            other => other,
        }
    }

    fn toggle_with(self, conn: &mut Connection, user_id: i64, post_id: i64) -> BlogResult<Toggle> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let post_exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
            params![post_id],
            |row| row.get(0),
        )?;
        if !post_exists {
            return Err(BlogError::NotFound("Post"));
        }

        let removed = tx.execute(
            &format!("DELETE FROM {} WHERE user_id = ?1 AND post_id = ?2", self.table()),
            params![user_id, post_id],
        )?;

        let active = if removed > 0 {
            Stats::adjust(&tx, self.counter(), -(removed as i64))?;
            false
        } else {
            tx.execute(
                &format!("INSERT INTO {} (user_id, post_id) VALUES (?1, ?2)", self.table()),
                params![user_id, post_id],
            )?;
            Stats::adjust(&tx, self.counter(), 1)?;
            true
        };

        let count = self.count_with(&tx, post_id)?;
        tx.commit()?;
        Ok(Toggle { active, count })
    }

    // ── Queries ──

    fn exists_with(self, conn: &Connection, user_id: i64, post_id: i64) -> BlogResult<bool> {
        Ok(conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1 AND post_id = ?2)",
                self.table()
            ),
            params![user_id, post_id],
            |row| row.get(0),
        )?)
    }

    fn count_with(self, conn: &Connection, post_id: i64) -> BlogResult<i64> {
        Ok(conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE post_id = ?1", self.table()),
            params![post_id],
            |row| row.get(0),
        )?)
    }

    pub fn exists(self, pool: &DbPool, user_id: i64, post_id: i64) -> bool {
        pool.get()
            .ok()
            .and_then(|conn| self.exists_with(&conn, user_id, post_id).ok())
            .unwrap_or(false)
    }

    pub fn count_for_post(self, pool: &DbPool, post_id: i64) -> i64 {
        pool.get()
            .ok()
            .and_then(|conn| self.count_with(&conn, post_id).ok())
            .unwrap_or(0)
    }

    fn list_where(self, pool: &DbPool, filter: &str, params: &[&dyn rusqlite::types::ToSql]) -> Vec<Edge> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let sql = format!(
            "SELECT e.id, e.user_id, u.name AS user_name, e.post_id, p.title AS post_title, e.created_at
             FROM {} e
             JOIN users u ON u.id = e.user_id
             JOIN posts p ON p.id = e.post_id
             {} ORDER BY e.id ASC",
            self.table(),
            filter
        );
        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params, Edge::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn list_all(self, pool: &DbPool) -> Vec<Edge> {
        self.list_where(pool, "", params![])
    }

    pub fn list_for_user(self, pool: &DbPool, user_id: i64) -> Vec<Edge> {
        self.list_where(pool, "WHERE e.user_id = ?1", params![user_id])
    }

    // ── Removal ──

    /// Dashboard removal of a single edge by id.
    pub fn delete_by_id(self, pool: &DbPool, id: i64) -> BlogResult<()> {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let found = tx
            .query_row(
                &format!("SELECT id FROM {} WHERE id = ?1", self.table()),
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(BlogError::NotFound(self.label()));
        }
        tx.execute(&format!("DELETE FROM {} WHERE id = ?1", self.table()), params![id])?;
        Stats::adjust(&tx, self.counter(), -1)?;
        tx.commit()?;
        log::info!("{} {} deleted", self.label(), id);
        Ok(())
    }

    /// Remove every edge owned by a user; the counter drops by one per row.
    pub fn remove_all_for_user(self, conn: &Connection, user_id: i64) -> BlogResult<usize> {
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE user_id = ?1", self.table()),
            params![user_id],
        )?;
        Stats::adjust(conn, self.counter(), -(removed as i64))?;
        Ok(removed)
    }

    /// Remove every edge pointing at a post; the counter drops by one per row.
    pub fn remove_all_for_post(self, conn: &Connection, post_id: i64) -> BlogResult<usize> {
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE post_id = ?1", self.table()),
            params![post_id],
        )?;
        Stats::adjust(conn, self.counter(), -(removed as i64))?;
        Ok(removed)
    }
}
