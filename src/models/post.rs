use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::errors::{BlogError, BlogResult};
use crate::images::{self, PictureSlot};
use crate::models::comment::Comment;
use crate::models::membership::Membership;
use crate::models::settings::Setting;
use crate::models::stats::{Counter, Stats};

/// Publicly visible: approved by an admin and past its scheduled date.
const VISIBLE: &str = "p.admin_approved = 1 AND p.date_to_post <= ?1";

const SELECT_BASE: &str = "SELECT p.*, u.name AS author_name, t.name AS theme_name
     FROM posts p
     JOIN users u ON u.id = p.author_id
     JOIN themes t ON t.id = p.theme_id";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Post {
    pub id: i64,
    pub theme_id: i64,
    pub theme_name: String,
    pub author_id: i64,
    pub author_name: String,
    pub title: String,
    pub intro: String,
    pub body: String,
    pub picture_v: String,
    pub picture_v_source: String,
    pub picture_h: String,
    pub picture_h_source: String,
    pub picture_s: String,
    pub picture_s_source: String,
    pub picture_alt: String,
    pub meta_tag: String,
    pub title_tag: String,
    pub admin_approved: bool,
    pub date_submitted: NaiveDateTime,
    pub date_to_post: NaiveDateTime,
}

#[derive(Debug, Clone, FromForm, Deserialize)]
pub struct PostForm {
    pub theme_id: i64,
    /// `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM`
    pub date_to_post: String,
    pub title: String,
    pub intro: String,
    pub body: String,
    pub picture_v_source: String,
    pub picture_h_source: String,
    pub picture_s_source: String,
    pub picture_alt: String,
    pub meta_tag: String,
    pub title_tag: String,
}

impl PostForm {
    fn scheduled_at(&self) -> BlogResult<NaiveDateTime> {
        let raw = self.date_to_post.trim();
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
            .or_else(|_| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
            })
            .map_err(|_| BlogError::Validation(format!("Invalid publish date: {}", raw)))
    }

    fn validate(&self, conn: &Connection) -> BlogResult<NaiveDateTime> {
        if self.title.trim().is_empty() {
            return Err(BlogError::Validation("Title is required.".to_string()));
        }
        let theme_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM themes WHERE id = ?1)",
            params![self.theme_id],
            |row| row.get(0),
        )?;
        if !theme_exists {
            return Err(BlogError::NotFound("Theme"));
        }
        self.scheduled_at()
    }
}

impl Post {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Post {
            id: row.get("id")?,
            theme_id: row.get("theme_id")?,
            theme_name: row.get("theme_name")?,
            author_id: row.get("author_id")?,
            author_name: row.get("author_name")?,
            title: row.get("title")?,
            intro: row.get("intro")?,
            body: row.get("body")?,
            picture_v: row.get("picture_v")?,
            picture_v_source: row.get("picture_v_source")?,
            picture_h: row.get("picture_h")?,
            picture_h_source: row.get("picture_h_source")?,
            picture_s: row.get("picture_s")?,
            picture_s_source: row.get("picture_s_source")?,
            picture_alt: row.get("picture_alt")?,
            meta_tag: row.get("meta_tag")?,
            title_tag: row.get("title_tag")?,
            admin_approved: row.get("admin_approved")?,
            date_submitted: row.get("date_submitted")?,
            date_to_post: row.get("date_to_post")?,
        })
    }

    fn find_with(conn: &Connection, id: i64) -> BlogResult<Self> {
        conn.query_row(
            &format!("{} WHERE p.id = ?1", SELECT_BASE),
            params![id],
            Self::from_row,
        )
        .optional()?
        .ok_or(BlogError::NotFound("Post"))
    }

    fn query_list(pool: &DbPool, sql: &str, params: &[&dyn rusqlite::types::ToSql]) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params, Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// Any post, regardless of approval. Used by the dashboard.
    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        Self::find_with(&conn, id).ok()
    }

    /// A post only when readers are allowed to see it.
    pub fn find_visible(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("{} WHERE {} AND p.id = ?2", SELECT_BASE, VISIBLE),
            params![Utc::now().naive_utc(), id],
            Self::from_row,
        )
        .ok()
    }

    /// Latest visible posts, optionally restricted to one theme.
    pub fn list_visible(pool: &DbPool, theme_id: Option<i64>, limit: i64) -> Vec<Self> {
        let now = Utc::now().naive_utc();
        match theme_id {
            Some(t) => Self::query_list(
                pool,
                &format!(
                    "{} WHERE {} AND p.theme_id = ?2 ORDER BY p.date_to_post DESC LIMIT ?3",
                    SELECT_BASE, VISIBLE
                ),
                params![now, t, limit],
            ),
            None => Self::query_list(
                pool,
                &format!(
                    "{} WHERE {} ORDER BY p.date_to_post DESC LIMIT ?2",
                    SELECT_BASE, VISIBLE
                ),
                params![now, limit],
            ),
        }
    }

    pub fn list_all(pool: &DbPool) -> Vec<Self> {
        Self::query_list(pool, &format!("{} ORDER BY p.id ASC", SELECT_BASE), params![])
    }

    pub fn list_by_author(pool: &DbPool, author_id: i64) -> Vec<Self> {
        Self::query_list(
            pool,
            &format!("{} WHERE p.author_id = ?1 ORDER BY p.id ASC", SELECT_BASE),
            params![author_id],
        )
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn picture(&self, slot: PictureSlot) -> &str {
        match slot {
            PictureSlot::V => &self.picture_v,
            PictureSlot::H => &self.picture_h,
            PictureSlot::S => &self.picture_s,
        }
    }

    /// Intro shortened for listings.
    pub fn short_intro(&self, max_chars: usize) -> String {
        if self.intro.chars().count() > max_chars {
            let cut: String = self.intro.chars().take(max_chars).collect();
            format!("{}...", cut)
        } else {
            self.intro.clone()
        }
    }

    // ── Create / update ──

    /// New posts always start unapproved.
    pub fn create(pool: &DbPool, author_id: i64, form: &PostForm) -> BlogResult<i64> {
        let conn = pool.get()?;
        let date_to_post = form.validate(&conn)?;
        conn.execute(
            "INSERT INTO posts (theme_id, author_id, title, intro, body, picture_v_source,
             picture_h_source, picture_s_source, picture_alt, meta_tag, title_tag,
             admin_approved, date_to_post)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12)",
            params![
                form.theme_id,
                author_id,
                form.title.trim(),
                form.intro,
                form.body,
                form.picture_v_source,
                form.picture_h_source,
                form.picture_s_source,
                form.picture_alt,
                form.meta_tag,
                form.title_tag,
                date_to_post,
            ],
        )?;
        let id = conn.last_insert_rowid();
        log::info!("Post {} submitted by account {}", id, author_id);
        Ok(id)
    }

    pub fn update(pool: &DbPool, id: i64, form: &PostForm) -> BlogResult<()> {
        let conn = pool.get()?;
        let date_to_post = form.validate(&conn)?;
        let changed = conn.execute(
            "UPDATE posts SET theme_id = ?1, title = ?2, intro = ?3, body = ?4,
             picture_v_source = ?5, picture_h_source = ?6, picture_s_source = ?7,
             picture_alt = ?8, meta_tag = ?9, title_tag = ?10, date_to_post = ?11
             WHERE id = ?12",
            params![
                form.theme_id,
                form.title.trim(),
                form.intro,
                form.body,
                form.picture_v_source,
                form.picture_h_source,
                form.picture_s_source,
                form.picture_alt,
                form.meta_tag,
                form.title_tag,
                date_to_post,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(BlogError::NotFound("Post"));
        }
        Ok(())
    }

    pub fn set_picture(pool: &DbPool, id: i64, slot: PictureSlot, filename: &str) -> BlogResult<()> {
        let conn = pool.get()?;
        let sql = format!("UPDATE posts SET {} = ?1 WHERE id = ?2", slot.column());
        let changed = conn.execute(&sql, params![filename, id])?;
        if changed == 0 {
            return Err(BlogError::NotFound("Post"));
        }
        Ok(())
    }

    /// Blank every picture column still naming `filename`, once the file is gone.
    pub fn clear_picture(pool: &DbPool, filename: &str) -> BlogResult<usize> {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let mut cleared = 0;
        for slot in [PictureSlot::V, PictureSlot::H, PictureSlot::S] {
            let sql = format!("UPDATE posts SET {col} = '' WHERE {col} = ?1", col = slot.column());
            cleared += tx.execute(&sql, params![filename])?;
        }
        tx.commit()?;
        Ok(cleared)
    }

    // ── Approval ──

    /// Flip the approval flag. The approved-post counter only moves when the
    /// flag actually changes, so repeated calls are harmless.
    pub fn set_approval(pool: &DbPool, id: i64, approved: bool) -> BlogResult<bool> {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let current: bool = tx
            .query_row(
                "SELECT admin_approved FROM posts WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(BlogError::NotFound("Post"))?;

        if current == approved {
            return Ok(false);
        }

        tx.execute(
            "UPDATE posts SET admin_approved = ?1 WHERE id = ?2",
            params![approved, id],
        )?;
        Stats::adjust(&tx, Counter::PostsApproved, if approved { 1 } else { -1 })?;
        tx.commit()?;
        log::info!("Post {} approved = {}", id, approved);
        Ok(true)
    }

    // ── Authorship ──

    /// Point every post of `from_author` at `to_author` in one statement.
    /// The target must exist and be allowed to author posts.
    pub fn reassign_authorship_with(
        conn: &Connection,
        from_author: i64,
        to_author: i64,
    ) -> BlogResult<usize> {
        let target: Option<crate::models::user::Role> = conn
            .query_row(
                "SELECT role FROM users WHERE id = ?1",
                params![to_author],
                |row| row.get(0),
            )
            .optional()?;
        match target {
            None => return Err(BlogError::NotFound("Fallback author")),
            Some(role) if !role.can_author() => {
                return Err(BlogError::Validation(format!(
                    "Account {} cannot own posts",
                    to_author
                )))
            }
            Some(_) => {}
        }

        let moved = conn.execute(
            "UPDATE posts SET author_id = ?1 WHERE author_id = ?2",
            params![to_author, from_author],
        )?;
        if moved > 0 {
            log::info!("Moved {} post(s) from account {} to {}", moved, from_author, to_author);
        }
        Ok(moved)
    }

    // ── Delete ──

    /// Remove a post and everything hanging off it, keeping counters in step.
    pub fn delete(pool: &DbPool, id: i64) -> BlogResult<Post> {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let post = Self::find_with(&tx, id)?;

        Comment::delete_all_for_post(&tx, id)?;
        for kind in [Membership::Like, Membership::Bookmark] {
            kind.remove_all_for_post(&tx, id)?;
        }
        tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        if post.admin_approved {
            Stats::adjust(&tx, Counter::PostsApproved, -1)?;
        }
        tx.commit()?;

        let blog_dir = Setting::get_or(pool, "images_blog_path", "website/uploads/blog");
        for picture in [&post.picture_v, &post.picture_h, &post.picture_s] {
            if let Err(e) = images::remove_stored_picture(&blog_dir, picture) {
                log::warn!("Post {} deleted but picture {} remained: {}", id, picture, e);
            }
        }

        log::info!("Deleted post {} ({})", id, post.title);
        Ok(post)
    }
}
