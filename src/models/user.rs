use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbPool, DELETED_USER_ID, FALLBACK_AUTHOR_ID, SUPER_ADMIN_ID};
use crate::errors::{BlogError, BlogResult};
use crate::images;
use crate::models::membership::Membership;
use crate::models::post::Post;
use crate::models::settings::Setting;
use crate::models::stats::{Counter, Stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Author,
    User,
    Dummy,
}

impl Role {
    /// Roles an admin may hand out from the dashboard.
    pub const ASSIGNABLE: [Role; 3] = [Role::Admin, Role::Author, Role::User];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Author => "author",
            Role::User => "user",
            Role::Dummy => "dummy",
        }
    }

    pub fn is_admin(self) -> bool {
        match self {
            Role::SuperAdmin | Role::Admin => true,
            Role::Author | Role::User | Role::Dummy => false,
        }
    }

    pub fn can_author(self) -> bool {
        match self {
            Role::SuperAdmin | Role::Admin | Role::Author => true,
            Role::User | Role::Dummy => false,
        }
    }

    /// Demo accounts hold seeded posts without being able to write new ones.
    pub fn owns_posts(self) -> bool {
        self.can_author() || self == Role::Dummy
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = BlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "author" => Ok(Role::Author),
            "user" => Ok(Role::User),
            "dummy" => Ok(Role::Dummy),
            other => Err(BlogError::Validation(format!("Invalid role: {}", other))),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: BlogError| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub blocked: bool,
    pub about: String,
    pub picture: String,
    pub created_at: NaiveDateTime,
}

/// Fields an admin can change on any account.
#[derive(Debug, Clone)]
pub struct UserAdminUpdate {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub blocked: bool,
}

impl User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            role: row.get("role")?,
            blocked: row.get("blocked")?,
            about: row.get("about")?,
            picture: row.get("picture")?,
            created_at: row.get("created_at")?,
        })
    }

    fn find_with(conn: &Connection, id: i64) -> BlogResult<Self> {
        conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], Self::from_row)
            .optional()?
            .ok_or(BlogError::NotFound("User"))
    }

    // ── Lookups ──

    pub fn get_by_id(pool: &DbPool, id: i64) -> Option<User> {
        let conn = pool.get().ok()?;
        Self::find_with(&conn, id).ok()
    }

    pub fn get_by_email(pool: &DbPool, email: &str) -> Option<User> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM users WHERE email = ?1",
            params![email],
            Self::from_row,
        )
        .ok()
    }

    pub fn list_all(pool: &DbPool) -> Vec<User> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare("SELECT * FROM users ORDER BY id ASC") {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// Non-blocked authors, newest account first.
    pub fn list_authors(pool: &DbPool, limit: i64) -> Vec<User> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT * FROM users WHERE blocked = 0 AND role = ?1 ORDER BY id DESC LIMIT ?2",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![Role::Author, limit], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap_or(0)
    }

    /// Reject a name or email already held by another account.
    fn ensure_unique(conn: &Connection, id: Option<i64>, name: &str, email: &str) -> BlogResult<()> {
        let other = id.unwrap_or(0);
        let email_taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id != ?2)",
            params![email, other],
            |row| row.get(0),
        )?;
        if email_taken {
            return Err(BlogError::Validation(
                "This email is already registered.".to_string(),
            ));
        }
        let name_taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE name = ?1 AND id != ?2)",
            params![name, other],
            |row| row.get(0),
        )?;
        if name_taken {
            return Err(BlogError::Validation(
                "This username is already taken.".to_string(),
            ));
        }
        Ok(())
    }

    // ── Create ──

    pub fn create(
        pool: &DbPool,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> BlogResult<i64> {
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(BlogError::Validation(
                "Username and email are required.".to_string(),
            ));
        }
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        Self::ensure_unique(&tx, None, name, email)?;
        tx.execute(
            "INSERT INTO users (name, email, password_hash, role) VALUES (?1, ?2, ?3, ?4)",
            params![name, email, password_hash, role],
        )?;
        let id = tx.last_insert_rowid();
        Stats::adjust(&tx, Counter::UsersActive, 1)?;
        tx.commit()?;
        log::info!("Created account {} ({})", id, role);
        Ok(id)
    }

    // ── Update ──

    pub fn update_profile(
        pool: &DbPool,
        id: i64,
        name: &str,
        email: &str,
        about: &str,
    ) -> BlogResult<()> {
        let max_about = Setting::get_i64(pool, "about_max_chars").max(1) as usize;
        if about.chars().count() > max_about {
            return Err(BlogError::Validation(format!(
                "About text must be at most {} characters.",
                max_about
            )));
        }
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(BlogError::Validation(
                "Username and email are required.".to_string(),
            ));
        }
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        Self::find_with(&tx, id)?;
        Self::ensure_unique(&tx, Some(id), name, email)?;
        tx.execute(
            "UPDATE users SET name = ?1, email = ?2, about = ?3 WHERE id = ?4",
            params![name, email, about, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn update_picture(pool: &DbPool, id: i64, picture: &str) -> BlogResult<()> {
        let conn = pool.get()?;
        let changed = conn.execute(
            "UPDATE users SET picture = ?1 WHERE id = ?2",
            params![picture, id],
        )?;
        if changed == 0 {
            return Err(BlogError::NotFound("User"));
        }
        Ok(())
    }

    pub fn update_password(pool: &DbPool, id: i64, password_hash: &str) -> BlogResult<()> {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        Ok(())
    }

    /// Dashboard edit of name, email, role and blocked flag as one unit.
    /// Demoting an author hands their posts to the fallback author first.
    pub fn admin_update(pool: &DbPool, id: i64, update: &UserAdminUpdate) -> BlogResult<()> {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let user = Self::find_with(&tx, id)?;

        if id == SUPER_ADMIN_ID && (update.role != user.role || update.blocked) {
            return Err(BlogError::Forbidden(
                "cannot change role or block this user.".to_string(),
            ));
        }
        if id == FALLBACK_AUTHOR_ID && !update.role.can_author() {
            return Err(BlogError::Forbidden(
                "the default author must keep an authoring role.".to_string(),
            ));
        }
        if id == DELETED_USER_ID && (update.role != user.role || update.blocked) {
            return Err(BlogError::Forbidden(
                "cannot change role or block this user.".to_string(),
            ));
        }
        if update.role != user.role && !Role::ASSIGNABLE.contains(&update.role) {
            return Err(BlogError::Validation(format!("Invalid role: {}", update.role)));
        }
        Self::ensure_unique(&tx, Some(id), &update.name, &update.email)?;

        if user.role.owns_posts() && !update.role.owns_posts() {
            Post::reassign_authorship_with(&tx, id, FALLBACK_AUTHOR_ID)?;
        }

        tx.execute(
            "UPDATE users SET name = ?1, email = ?2, role = ?3 WHERE id = ?4",
            params![update.name, update.email, update.role, id],
        )?;
        Self::apply_blocked(&tx, &user, update.blocked)?;
        tx.commit()?;
        log::info!("Updated account {} (role {}, blocked {})", id, update.role, update.blocked);
        Ok(())
    }

    // ── Blocking ──

    /// Set the blocked flag and mirror it onto the user's comments and replies.
    pub fn set_blocked(pool: &DbPool, id: i64, blocked: bool) -> BlogResult<()> {
        if id == SUPER_ADMIN_ID || id == DELETED_USER_ID {
            return Err(BlogError::Forbidden("cannot block this user.".to_string()));
        }
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let user = Self::find_with(&tx, id)?;
        Self::apply_blocked(&tx, &user, blocked)?;
        tx.commit()?;
        log::info!("Account {} blocked = {}", id, blocked);
        Ok(())
    }

    fn apply_blocked(conn: &Connection, user: &User, blocked: bool) -> BlogResult<()> {
        conn.execute(
            "UPDATE users SET blocked = ?1 WHERE id = ?2",
            params![blocked, user.id],
        )?;
        conn.execute(
            "UPDATE comments SET blocked = ?1 WHERE user_id = ?2",
            params![blocked, user.id],
        )?;
        conn.execute(
            "UPDATE replies SET blocked = ?1 WHERE user_id = ?2",
            params![blocked, user.id],
        )?;
        if blocked {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user.id])?;
        }
        match (user.blocked, blocked) {
            (false, true) => Stats::adjust(conn, Counter::UsersActive, -1)?,
            (true, false) => Stats::adjust(conn, Counter::UsersActive, 1)?,
            _ => {}
        }
        Ok(())
    }

    // ── Delete ──

    /// Remove an account while keeping everything that referenced it intact.
    ///
    /// Steps, all inside one transaction:
    /// 1. authored posts move to the fallback author
    /// 2. comments and replies move to the deleted-user placeholder
    /// 3. likes and bookmarks are removed, counters decremented per row
    /// 4. sessions and the user row are removed
    ///
    /// The profile picture is unlinked only after the commit succeeds.
    pub fn delete(pool: &DbPool, id: i64) -> BlogResult<User> {
        if id == SUPER_ADMIN_ID {
            return Err(BlogError::Forbidden("cannot delete this user.".to_string()));
        }
        if id == FALLBACK_AUTHOR_ID || id == DELETED_USER_ID {
            return Err(BlogError::Forbidden(
                "placeholder accounts cannot be deleted.".to_string(),
            ));
        }

        let mut conn = pool.get()?;
        let tx = conn.transaction()?;
        let user = Self::find_with(&tx, id)?;

        Post::reassign_authorship_with(&tx, id, FALLBACK_AUTHOR_ID)?;

        tx.execute(
            "UPDATE comments SET user_id = ?1 WHERE user_id = ?2",
            params![DELETED_USER_ID, id],
        )?;
        tx.execute(
            "UPDATE replies SET user_id = ?1 WHERE user_id = ?2",
            params![DELETED_USER_ID, id],
        )?;

        for kind in [Membership::Like, Membership::Bookmark] {
            kind.remove_all_for_user(&tx, id)?;
        }

        tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if !user.blocked {
            Stats::adjust(&tx, Counter::UsersActive, -1)?;
        }
        tx.commit()?;

        let profile_dir = Setting::get_or(pool, "images_profile_path", "website/uploads/profile");
        if let Err(e) = images::remove_stored_picture(&profile_dir, &user.picture) {
            log::warn!("Account {} deleted but picture {} remained: {}", id, user.picture, e);
        }

        log::info!("Deleted account {} ({})", id, user.name);
        Ok(user)
    }

    // ── Helpers ──

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn can_author(&self) -> bool {
        self.role.can_author()
    }

    pub fn is_active(&self) -> bool {
        !self.blocked
    }
}
