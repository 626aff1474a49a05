use crate::db::DbPool;
use crate::errors::BlogResult;
use crate::images::PictureSlot;
use crate::models::comment::{Comment, Reply};
use crate::models::contact::{ContactForm, ContactMessage};
use crate::models::membership::{Edge, Membership, Toggle};
use crate::models::post::{Post, PostForm};
use crate::models::session::Session;
use crate::models::settings::Setting;
use crate::models::stats::Stats;
use crate::models::theme::{Theme, ThemeForm};
use crate::models::user::{Role, User, UserAdminUpdate};

use super::Store;

/// SQLite-backed implementation of the Store trait.
/// Wraps the r2d2 connection pool and delegates to model methods.
pub struct SqliteStore {
    pub pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl Store for SqliteStore {
    // ── Lifecycle ───────────────────────────────────────────────────

    fn run_migrations(&self) -> Result<(), String> {
        crate::db::run_migrations(&self.pool).map_err(|e| e.to_string())
    }

    fn seed_defaults(&self) -> Result<(), String> {
        crate::db::seed_defaults(&self.pool).map_err(|e| e.to_string())
    }

    fn seed_demo(&self) -> Result<bool, String> {
        crate::db::seed_demo(&self.pool).map_err(|e| e.to_string())
    }

    // ── Settings ────────────────────────────────────────────────────

    fn setting_get(&self, key: &str) -> Option<String> {
        Setting::get(&self.pool, key)
    }

    fn setting_get_list(&self, key: &str) -> Vec<String> {
        Setting::get_list(&self.pool, key)
    }

    fn setting_set(&self, key: &str, value: &str) -> BlogResult<()> {
        Setting::set(&self.pool, key, value)
    }

    // ── Users ───────────────────────────────────────────────────────

    fn user_get_by_id(&self, id: i64) -> Option<User> {
        User::get_by_id(&self.pool, id)
    }

    fn user_get_by_email(&self, email: &str) -> Option<User> {
        User::get_by_email(&self.pool, email)
    }

    fn user_list_all(&self) -> Vec<User> {
        User::list_all(&self.pool)
    }

    fn user_list_authors(&self, limit: i64) -> Vec<User> {
        User::list_authors(&self.pool, limit)
    }

    fn user_count(&self) -> i64 {
        User::count(&self.pool)
    }

    fn user_create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> BlogResult<i64> {
        User::create(&self.pool, name, email, password_hash, role)
    }

    fn user_update_profile(&self, id: i64, name: &str, email: &str, about: &str) -> BlogResult<()> {
        User::update_profile(&self.pool, id, name, email, about)
    }

    fn user_update_picture(&self, id: i64, picture: &str) -> BlogResult<()> {
        User::update_picture(&self.pool, id, picture)
    }

    fn user_update_password(&self, id: i64, password_hash: &str) -> BlogResult<()> {
        User::update_password(&self.pool, id, password_hash)
    }

    fn user_admin_update(&self, id: i64, update: &UserAdminUpdate) -> BlogResult<()> {
        User::admin_update(&self.pool, id, update)
    }

    fn user_set_blocked(&self, id: i64, blocked: bool) -> BlogResult<()> {
        User::set_blocked(&self.pool, id, blocked)
    }

    fn user_delete(&self, id: i64) -> BlogResult<User> {
        User::delete(&self.pool, id)
    }

    // ── Posts ───────────────────────────────────────────────────────

    fn post_find_by_id(&self, id: i64) -> Option<Post> {
        Post::find_by_id(&self.pool, id)
    }

    fn post_find_visible(&self, id: i64) -> Option<Post> {
        Post::find_visible(&self.pool, id)
    }

    fn post_list_visible(&self, theme_id: Option<i64>, limit: i64) -> Vec<Post> {
        Post::list_visible(&self.pool, theme_id, limit)
    }

    fn post_list_all(&self) -> Vec<Post> {
        Post::list_all(&self.pool)
    }

    fn post_list_by_author(&self, author_id: i64) -> Vec<Post> {
        Post::list_by_author(&self.pool, author_id)
    }

    fn post_count(&self) -> i64 {
        Post::count(&self.pool)
    }

    fn post_create(&self, author_id: i64, form: &PostForm) -> BlogResult<i64> {
        Post::create(&self.pool, author_id, form)
    }

    fn post_update(&self, id: i64, form: &PostForm) -> BlogResult<()> {
        Post::update(&self.pool, id, form)
    }

    fn post_set_picture(&self, id: i64, slot: PictureSlot, filename: &str) -> BlogResult<()> {
        Post::set_picture(&self.pool, id, slot, filename)
    }

    fn post_clear_picture(&self, filename: &str) -> BlogResult<usize> {
        Post::clear_picture(&self.pool, filename)
    }

    fn post_set_approval(&self, id: i64, approved: bool) -> BlogResult<bool> {
        Post::set_approval(&self.pool, id, approved)
    }

    fn post_delete(&self, id: i64) -> BlogResult<Post> {
        Post::delete(&self.pool, id)
    }

    // ── Themes ──────────────────────────────────────────────────────

    fn theme_find_by_id(&self, id: i64) -> Option<Theme> {
        Theme::find_by_id(&self.pool, id)
    }

    fn theme_list(&self) -> Vec<Theme> {
        Theme::list(&self.pool)
    }

    fn theme_count_posts(&self, id: i64) -> i64 {
        Theme::count_posts(&self.pool, id)
    }

    fn theme_create(&self, form: &ThemeForm) -> BlogResult<i64> {
        Theme::create(&self.pool, form)
    }

    fn theme_delete(&self, id: i64) -> BlogResult<()> {
        Theme::delete(&self.pool, id)
    }

    // ── Comments & replies ──────────────────────────────────────────

    fn comment_find_by_id(&self, id: i64) -> Option<Comment> {
        Comment::find_by_id(&self.pool, id)
    }

    fn comment_for_post(&self, post_id: i64, limit: i64) -> Vec<Comment> {
        Comment::for_post(&self.pool, post_id, limit)
    }

    fn comment_list_all(&self) -> Vec<Comment> {
        Comment::list_all(&self.pool)
    }

    fn comment_create(&self, post_id: i64, user_id: i64, text: &str) -> BlogResult<i64> {
        Comment::create(&self.pool, post_id, user_id, text)
    }

    fn comment_delete(&self, id: i64) -> BlogResult<()> {
        Comment::delete(&self.pool, id)
    }

    fn reply_find_by_id(&self, id: i64) -> Option<Reply> {
        Reply::find_by_id(&self.pool, id)
    }

    fn reply_for_post(&self, post_id: i64, limit: i64) -> Vec<Reply> {
        Reply::for_post(&self.pool, post_id, limit)
    }

    fn reply_list_all(&self) -> Vec<Reply> {
        Reply::list_all(&self.pool)
    }

    fn reply_create(
        &self,
        post_id: i64,
        user_id: i64,
        comment_id: i64,
        text: &str,
    ) -> BlogResult<i64> {
        Reply::create(&self.pool, post_id, user_id, comment_id, text)
    }

    fn reply_delete(&self, id: i64) -> BlogResult<()> {
        Reply::delete(&self.pool, id)
    }

    // ── Likes & bookmarks ───────────────────────────────────────────

    fn membership_toggle(&self, kind: Membership, user_id: i64, post_id: i64) -> BlogResult<Toggle> {
        kind.toggle(&self.pool, user_id, post_id)
    }

    fn membership_exists(&self, kind: Membership, user_id: i64, post_id: i64) -> bool {
        kind.exists(&self.pool, user_id, post_id)
    }

    fn membership_count_for_post(&self, kind: Membership, post_id: i64) -> i64 {
        kind.count_for_post(&self.pool, post_id)
    }

    fn membership_list_all(&self, kind: Membership) -> Vec<Edge> {
        kind.list_all(&self.pool)
    }

    fn membership_list_for_user(&self, kind: Membership, user_id: i64) -> Vec<Edge> {
        kind.list_for_user(&self.pool, user_id)
    }

    fn membership_delete(&self, kind: Membership, id: i64) -> BlogResult<()> {
        kind.delete_by_id(&self.pool, id)
    }

    // ── Statistics ──────────────────────────────────────────────────

    fn stats_get(&self) -> Option<Stats> {
        Stats::get(&self.pool)
    }

    fn stats_recount(&self) -> Option<Stats> {
        Stats::recount(&self.pool)
    }

    fn stats_resync(&self) -> BlogResult<Stats> {
        Stats::resync(&self.pool)
    }

    // ── Contact ─────────────────────────────────────────────────────

    fn contact_create(&self, form: &ContactForm) -> BlogResult<i64> {
        ContactMessage::create(&self.pool, form)
    }

    fn contact_list(&self) -> Vec<ContactMessage> {
        ContactMessage::list(&self.pool)
    }

    // ── Sessions ────────────────────────────────────────────────────

    fn session_create(
        &self,
        user_id: i64,
        session_id: &str,
        expiry_hours: i64,
        ip_hash: Option<&str>,
    ) -> BlogResult<()> {
        Session::create(&self.pool, user_id, session_id, expiry_hours, ip_hash)
    }

    fn session_get_user(&self, session_id: &str) -> Option<User> {
        Session::get_user(&self.pool, session_id)
    }

    fn session_delete(&self, session_id: &str) -> BlogResult<()> {
        Session::delete(&self.pool, session_id)
    }

    fn session_cleanup_expired(&self) -> usize {
        Session::cleanup_expired(&self.pool)
    }
}
