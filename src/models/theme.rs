use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::errors::{BlogError, BlogResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Theme {
    pub id: i64,
    pub name: String,
    pub picture: String,
    pub picture_source: String,
}

#[derive(Debug, Clone, FromForm, Deserialize)]
pub struct ThemeForm {
    pub name: String,
    pub picture: String,
    pub picture_source: String,
}

impl Theme {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Theme {
            id: row.get("id")?,
            name: row.get("name")?,
            picture: row.get("picture")?,
            picture_source: row.get("picture_source")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM themes WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare("SELECT * FROM themes ORDER BY id ASC") {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count_posts(pool: &DbPool, id: i64) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE theme_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    pub fn create(pool: &DbPool, form: &ThemeForm) -> BlogResult<i64> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(BlogError::Validation("Theme name is required.".to_string()));
        }
        let conn = pool.get()?;
        let taken: Option<i64> = conn
            .query_row("SELECT id FROM themes WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?;
        if taken.is_some() {
            return Err(BlogError::Validation(format!(
                "Theme '{}' already exists.",
                name
            )));
        }
        conn.execute(
            "INSERT INTO themes (name, picture, picture_source) VALUES (?1, ?2, ?3)",
            params![name, form.picture, form.picture_source],
        )?;
        let id = conn.last_insert_rowid();
        log::info!("Theme {} ({}) added", id, name);
        Ok(id)
    }

    /// Themes still referenced by posts are kept; the posts must move first.
    pub fn delete(pool: &DbPool, id: i64) -> BlogResult<()> {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let in_use: i64 = tx.query_row(
            "SELECT COUNT(*) FROM posts WHERE theme_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(BlogError::Conflict(format!(
                "Theme is used by {} post(s).",
                in_use
            )));
        }
        let removed = tx.execute("DELETE FROM themes WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(BlogError::NotFound("Theme"));
        }
        tx.commit()?;
        log::info!("Theme {} deleted", id);
        Ok(())
    }
}
