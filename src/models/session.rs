use chrono::{Duration, Utc};
use rusqlite::params;

use crate::db::DbPool;
use crate::errors::BlogResult;
use crate::models::user::User;

pub struct Session;

impl Session {
    pub fn create(
        pool: &DbPool,
        user_id: i64,
        session_id: &str,
        expiry_hours: i64,
        ip_hash: Option<&str>,
    ) -> BlogResult<()> {
        let conn = pool.get()?;
        let now = Utc::now().naive_utc();
        let expires = now + Duration::hours(expiry_hours.max(1));
        conn.execute(
            "INSERT INTO sessions (id, user_id, created_at, expires_at, ip_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, user_id, now, expires, ip_hash],
        )?;
        Ok(())
    }

    /// The owner of a live session, if any.
    pub fn get_user(pool: &DbPool, session_id: &str) -> Option<User> {
        let user_id: i64 = {
            let conn = pool.get().ok()?;
            conn.query_row(
                "SELECT user_id FROM sessions WHERE id = ?1 AND expires_at > ?2",
                params![session_id, Utc::now().naive_utc()],
                |row| row.get(0),
            )
            .ok()?
        };
        User::get_by_id(pool, user_id)
    }

    pub fn delete(pool: &DbPool, session_id: &str) -> BlogResult<()> {
        let conn = pool.get()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(())
    }

    pub fn cleanup_expired(pool: &DbPool) -> usize {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![Utc::now().naive_utc()],
        )
        .unwrap_or(0)
    }
}
