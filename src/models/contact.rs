use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::errors::{BlogError, BlogResult};

#[derive(Debug, Serialize, Clone)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromForm, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactMessage {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ContactMessage {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            message: row.get("message")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(pool: &DbPool, form: &ContactForm) -> BlogResult<i64> {
        if form.name.trim().is_empty() || form.message.trim().is_empty() {
            return Err(BlogError::Validation(
                "Name and message are required.".to_string(),
            ));
        }
        if !form.email.contains('@') {
            return Err(BlogError::Validation("Invalid email address.".to_string()));
        }
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO contact_messages (name, email, message) VALUES (?1, ?2, ?3)",
            params![form.name.trim(), form.email.trim(), form.message.trim()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare("SELECT * FROM contact_messages ORDER BY id DESC") {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }
}
