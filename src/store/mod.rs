use crate::errors::BlogResult;
use crate::images::PictureSlot;
use crate::models::comment::{Comment, Reply};
use crate::models::contact::{ContactForm, ContactMessage};
use crate::models::membership::{Edge, Membership, Toggle};
use crate::models::post::{Post, PostForm};
use crate::models::stats::Stats;
use crate::models::theme::{Theme, ThemeForm};
use crate::models::user::{Role, User, UserAdminUpdate};

pub mod sqlite;

/// Unified data-access trait. Every database operation goes through here.
/// Multi-row mutations are all-or-nothing inside the implementation.
pub trait Store: Send + Sync {
    // ── Lifecycle ───────────────────────────────────────────────────
    fn run_migrations(&self) -> Result<(), String>;
    fn seed_defaults(&self) -> Result<(), String>;
    fn seed_demo(&self) -> Result<bool, String>;

    // ── Settings ────────────────────────────────────────────────────
    fn setting_get(&self, key: &str) -> Option<String>;
    fn setting_get_or(&self, key: &str, default: &str) -> String {
        self.setting_get(key).unwrap_or_else(|| default.to_string())
    }
    fn setting_get_i64(&self, key: &str) -> i64 {
        self.setting_get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
    fn setting_get_list(&self, key: &str) -> Vec<String>;
    fn setting_set(&self, key: &str, value: &str) -> BlogResult<()>;

    // ── Users ───────────────────────────────────────────────────────
    fn user_get_by_id(&self, id: i64) -> Option<User>;
    fn user_get_by_email(&self, email: &str) -> Option<User>;
    fn user_list_all(&self) -> Vec<User>;
    fn user_list_authors(&self, limit: i64) -> Vec<User>;
    fn user_count(&self) -> i64;
    fn user_create(&self, name: &str, email: &str, password_hash: &str, role: Role)
        -> BlogResult<i64>;
    fn user_update_profile(&self, id: i64, name: &str, email: &str, about: &str)
        -> BlogResult<()>;
    fn user_update_picture(&self, id: i64, picture: &str) -> BlogResult<()>;
    fn user_update_password(&self, id: i64, password_hash: &str) -> BlogResult<()>;
    fn user_admin_update(&self, id: i64, update: &UserAdminUpdate) -> BlogResult<()>;
    fn user_set_blocked(&self, id: i64, blocked: bool) -> BlogResult<()>;
    fn user_delete(&self, id: i64) -> BlogResult<User>;

    // ── Posts ───────────────────────────────────────────────────────
    fn post_find_by_id(&self, id: i64) -> Option<Post>;
    fn post_find_visible(&self, id: i64) -> Option<Post>;
    fn post_list_visible(&self, theme_id: Option<i64>, limit: i64) -> Vec<Post>;
    fn post_list_all(&self) -> Vec<Post>;
    fn post_list_by_author(&self, author_id: i64) -> Vec<Post>;
    fn post_count(&self) -> i64;
    fn post_create(&self, author_id: i64, form: &PostForm) -> BlogResult<i64>;
    fn post_update(&self, id: i64, form: &PostForm) -> BlogResult<()>;
    fn post_set_picture(&self, id: i64, slot: PictureSlot, filename: &str) -> BlogResult<()>;
    fn post_clear_picture(&self, filename: &str) -> BlogResult<usize>;
    fn post_set_approval(&self, id: i64, approved: bool) -> BlogResult<bool>;
    fn post_delete(&self, id: i64) -> BlogResult<Post>;

    // ── Themes ──────────────────────────────────────────────────────
    fn theme_find_by_id(&self, id: i64) -> Option<Theme>;
    fn theme_list(&self) -> Vec<Theme>;
    fn theme_count_posts(&self, id: i64) -> i64;
    fn theme_create(&self, form: &ThemeForm) -> BlogResult<i64>;
    fn theme_delete(&self, id: i64) -> BlogResult<()>;

    // ── Comments & replies ──────────────────────────────────────────
    fn comment_find_by_id(&self, id: i64) -> Option<Comment>;
    fn comment_for_post(&self, post_id: i64, limit: i64) -> Vec<Comment>;
    fn comment_list_all(&self) -> Vec<Comment>;
    fn comment_create(&self, post_id: i64, user_id: i64, text: &str) -> BlogResult<i64>;
    fn comment_delete(&self, id: i64) -> BlogResult<()>;
    fn reply_find_by_id(&self, id: i64) -> Option<Reply>;
    fn reply_for_post(&self, post_id: i64, limit: i64) -> Vec<Reply>;
    fn reply_list_all(&self) -> Vec<Reply>;
    fn reply_create(&self, post_id: i64, user_id: i64, comment_id: i64, text: &str)
        -> BlogResult<i64>;
    fn reply_delete(&self, id: i64) -> BlogResult<()>;

    // ── Likes & bookmarks ───────────────────────────────────────────
    fn membership_toggle(&self, kind: Membership, user_id: i64, post_id: i64)
        -> BlogResult<Toggle>;
    fn membership_exists(&self, kind: Membership, user_id: i64, post_id: i64) -> bool;
    fn membership_count_for_post(&self, kind: Membership, post_id: i64) -> i64;
    fn membership_list_all(&self, kind: Membership) -> Vec<Edge>;
    fn membership_list_for_user(&self, kind: Membership, user_id: i64) -> Vec<Edge>;
    fn membership_delete(&self, kind: Membership, id: i64) -> BlogResult<()>;

    // ── Statistics ──────────────────────────────────────────────────
    fn stats_get(&self) -> Option<Stats>;
    fn stats_recount(&self) -> Option<Stats>;
    fn stats_resync(&self) -> BlogResult<Stats>;

    // ── Contact ─────────────────────────────────────────────────────
    fn contact_create(&self, form: &ContactForm) -> BlogResult<i64>;
    fn contact_list(&self) -> Vec<ContactMessage>;

    // ── Sessions ────────────────────────────────────────────────────
    fn session_create(
        &self,
        user_id: i64,
        session_id: &str,
        expiry_hours: i64,
        ip_hash: Option<&str>,
    ) -> BlogResult<()>;
    fn session_get_user(&self, session_id: &str) -> Option<User>;
    fn session_delete(&self, session_id: &str) -> BlogResult<()>;
    fn session_cleanup_expired(&self) -> usize;
}
