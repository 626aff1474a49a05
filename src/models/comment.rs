use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::DbPool;
use crate::errors::{BlogError, BlogResult};

#[derive(Debug, Serialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_picture: String,
    pub text: String,
    pub blocked: bool,
    pub date_submitted: NaiveDateTime,
}

#[derive(Debug, Serialize, Clone)]
pub struct Reply {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_picture: String,
    pub comment_id: i64,
    pub text: String,
    pub blocked: bool,
    pub date_submitted: NaiveDateTime,
}

fn non_empty(text: &str, what: &str) -> BlogResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BlogError::Validation(format!("{} empty", what)));
    }
    Ok(trimmed.to_string())
}

fn query_all<T>(
    pool: &DbPool,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
    map: fn(&Row) -> rusqlite::Result<T>,
) -> Vec<T> {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return vec![],
    };
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(_) => return vec![],
    };
    stmt.query_map(params, map)
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
}

impl Comment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Comment {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            user_id: row.get("user_id")?,
            user_name: row.get("user_name")?,
            user_picture: row.get("user_picture")?,
            text: row.get("text")?,
            blocked: row.get("blocked")?,
            date_submitted: row.get("date_submitted")?,
        })
    }

    const SELECT: &'static str =
        "SELECT c.*, u.name AS user_name, u.picture AS user_picture
         FROM comments c JOIN users u ON u.id = c.user_id";

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("{} WHERE c.id = ?1", Self::SELECT),
            params![id],
            Self::from_row,
        )
        .ok()
    }

    /// Visible comments on a post, newest first.
    pub fn for_post(pool: &DbPool, post_id: i64, limit: i64) -> Vec<Self> {
        query_all(
            pool,
            &format!(
                "{} WHERE c.post_id = ?1 AND c.blocked = 0
                 ORDER BY c.date_submitted DESC, c.id DESC LIMIT ?2",
                Self::SELECT
            ),
            params![post_id, limit],
            Self::from_row,
        )
    }

    pub fn list_all(pool: &DbPool) -> Vec<Self> {
        query_all(
            pool,
            &format!("{} ORDER BY c.id ASC", Self::SELECT),
            params![],
            Self::from_row,
        )
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn create(pool: &DbPool, post_id: i64, user_id: i64, text: &str) -> BlogResult<i64> {
        let text = non_empty(text, "Comment")?;
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO comments (post_id, user_id, text) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, text],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete a comment together with all of its replies.
    pub fn delete(pool: &DbPool, id: i64) -> BlogResult<()> {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let replies = tx.execute("DELETE FROM replies WHERE comment_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(BlogError::NotFound("Comment"));
        }
        tx.commit()?;
        log::info!("Comment {} deleted with {} repl(ies)", id, replies);
        Ok(())
    }

    /// Used when the owning post goes away.
    pub fn delete_all_for_post(conn: &Connection, post_id: i64) -> BlogResult<()> {
        conn.execute("DELETE FROM replies WHERE post_id = ?1", params![post_id])?;
        conn.execute(
            "DELETE FROM replies WHERE comment_id IN (SELECT id FROM comments WHERE post_id = ?1)",
            params![post_id],
        )?;
        conn.execute("DELETE FROM comments WHERE post_id = ?1", params![post_id])?;
        Ok(())
    }
}

impl Reply {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Reply {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            user_id: row.get("user_id")?,
            user_name: row.get("user_name")?,
            user_picture: row.get("user_picture")?,
            comment_id: row.get("comment_id")?,
            text: row.get("text")?,
            blocked: row.get("blocked")?,
            date_submitted: row.get("date_submitted")?,
        })
    }

    const SELECT: &'static str =
        "SELECT r.*, u.name AS user_name, u.picture AS user_picture
         FROM replies r JOIN users u ON u.id = r.user_id";

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("{} WHERE r.id = ?1", Self::SELECT),
            params![id],
            Self::from_row,
        )
        .ok()
    }

    /// Visible replies on a post, oldest first.
    pub fn for_post(pool: &DbPool, post_id: i64, limit: i64) -> Vec<Self> {
        query_all(
            pool,
            &format!(
                "{} WHERE r.post_id = ?1 AND r.blocked = 0
                 ORDER BY r.date_submitted ASC, r.id ASC LIMIT ?2",
                Self::SELECT
            ),
            params![post_id, limit],
            Self::from_row,
        )
    }

    pub fn list_all(pool: &DbPool) -> Vec<Self> {
        query_all(
            pool,
            &format!("{} ORDER BY r.id ASC", Self::SELECT),
            params![],
            Self::from_row,
        )
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM replies", [], |row| row.get(0))
            .unwrap_or(0)
    }

    /// The parent comment must exist on the same post.
    pub fn create(
        pool: &DbPool,
        post_id: i64,
        user_id: i64,
        comment_id: i64,
        text: &str,
    ) -> BlogResult<i64> {
        let text = non_empty(text, "Reply")?;
        let conn = pool.get()?;
        let parent_post: Option<i64> = conn
            .query_row(
                "SELECT post_id FROM comments WHERE id = ?1",
                params![comment_id],
                |row| row.get(0),
            )
            .optional()?;
        if parent_post != Some(post_id) {
            return Err(BlogError::NotFound("Comment"));
        }
        conn.execute(
            "INSERT INTO replies (post_id, user_id, comment_id, text) VALUES (?1, ?2, ?3, ?4)",
            params![post_id, user_id, comment_id, text],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn delete(pool: &DbPool, id: i64) -> BlogResult<()> {
        let conn = pool.get()?;
        let removed = conn.execute("DELETE FROM replies WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(BlogError::NotFound("Reply"));
        }
        log::info!("Reply {} deleted", id);
        Ok(())
    }
}
