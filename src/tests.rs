#![cfg(test)]

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use rocket_dyn_templates::Template;

use crate::db::{
    run_migrations, seed_defaults, seed_demo, DbPool, DEFAULT_THEMES, DELETED_USER_ID,
    FALLBACK_AUTHOR_ID, SUPER_ADMIN_ID,
};
use crate::errors::BlogError;
use crate::images::{self, PictureSlot};
use crate::models::comment::{Comment, Reply};
use crate::models::contact::{ContactForm, ContactMessage};
use crate::models::membership::Membership;
use crate::models::post::{Post, PostForm};
use crate::models::session::Session;
use crate::models::settings::Setting;
use crate::models::stats::Stats;
use crate::models::theme::{Theme, ThemeForm};
use crate::models::user::{Role, User, UserAdminUpdate};
use crate::rate_limit::{RateLimiter, SWEEP_THRESHOLD};
use crate::security::auth;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

/// Atomic counter for unique DB names so parallel tests don't collide.
static TEST_DB_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

fn next_db_id() -> u64 {
    TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
}

/// Fresh in-memory SQLite pool with migrations and seed data applied.
/// Named shared-cache DB so every pooled connection sees the same data.
/// The hash cost is pinned low before seeding so the placeholder accounts
/// don't pay for DEFAULT_COST bcrypt rounds.
fn test_pool() -> DbPool {
    let uri = format!("file:blogtest_{}?mode=memory&cache=shared", next_db_id());
    let manager = SqliteConnectionManager::file(uri)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .expect("Failed to create test pool");
    run_migrations(&pool).expect("Failed to run migrations");
    Setting::set(&pool, "password_hash_cost", "4").unwrap();
    seed_defaults(&pool).expect("Failed to seed defaults");
    pool
}

/// Fast bcrypt hash for tests (cost=4 instead of DEFAULT_COST=12).
fn fast_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

fn make_user(pool: &DbPool, name: &str, role: Role) -> i64 {
    let email = format!("{}@example.com", name.to_lowercase());
    User::create(pool, name, &email, &fast_hash("password123"), role).unwrap()
}

fn make_theme(pool: &DbPool, name: &str) -> i64 {
    Theme::create(
        pool,
        &ThemeForm {
            name: name.to_string(),
            picture: String::new(),
            picture_source: String::new(),
        },
    )
    .unwrap()
}

fn post_form(theme_id: i64, title: &str, date: &str) -> PostForm {
    PostForm {
        theme_id,
        date_to_post: date.to_string(),
        title: title.to_string(),
        intro: "A short look at the trip.".to_string(),
        body: "Day one, day two, day three.".to_string(),
        picture_v_source: String::new(),
        picture_h_source: String::new(),
        picture_s_source: String::new(),
        picture_alt: String::new(),
        meta_tag: String::new(),
        title_tag: String::new(),
    }
}

/// An approved post dated in the past, so readers can see it.
fn make_visible_post(pool: &DbPool, author_id: i64, theme_id: i64, title: &str) -> i64 {
    let id = Post::create(pool, author_id, &post_form(theme_id, title, "2020-01-01")).unwrap();
    Post::set_approval(pool, id, true).unwrap();
    id
}

fn stats(pool: &DbPool) -> Stats {
    Stats::get(pool).expect("stats row missing")
}

fn assert_stats_in_sync(pool: &DbPool) {
    let stored = stats(pool);
    let derived = Stats::recount(pool).unwrap();
    assert!(
        stored.matches(&derived),
        "stored {:?} != derived {:?}",
        stored,
        derived
    );
}

// ═══════════════════════════════════════════════════════════
// Seed data & settings
// ═══════════════════════════════════════════════════════════

#[test]
fn seed_creates_reserved_accounts() {
    let pool = test_pool();
    let admin = User::get_by_id(&pool, SUPER_ADMIN_ID).unwrap();
    assert_eq!(admin.role, Role::SuperAdmin);
    let team = User::get_by_id(&pool, FALLBACK_AUTHOR_ID).unwrap();
    assert_eq!(team.role, Role::Author);
    assert_eq!(team.picture, "Picture_default_author.jpg");
    let deleted = User::get_by_id(&pool, DELETED_USER_ID).unwrap();
    assert_eq!(deleted.name, "[Deleted]");

    let s = stats(&pool);
    assert_eq!(s.users_active, 3);
    assert_eq!(s.posts_approved, 0);
    assert_stats_in_sync(&pool);
}

#[test]
fn seed_is_idempotent() {
    let pool = test_pool();
    seed_defaults(&pool).unwrap();
    assert_eq!(User::count(&pool), 3);
    assert_eq!(stats(&pool).users_active, 3);
}

#[test]
fn fresh_install_has_default_themes() {
    let pool = test_pool();
    let names: Vec<String> = Theme::list(&pool).into_iter().map(|t| t.name).collect();
    for name in DEFAULT_THEMES {
        assert!(names.iter().any(|n| n == name), "missing theme {}", name);
    }
    seed_defaults(&pool).unwrap();
    assert_eq!(Theme::list(&pool).len(), DEFAULT_THEMES.len());
}

#[test]
fn demo_content_is_seeded_once() {
    let pool = test_pool();
    assert!(seed_demo(&pool).unwrap());
    assert!(!seed_demo(&pool).unwrap());

    let demo: Vec<User> = User::list_all(&pool)
        .into_iter()
        .filter(|u| u.role == Role::Dummy)
        .collect();
    assert_eq!(demo.len(), 3);
    let visible = Post::list_visible(&pool, None, 100);
    assert_eq!(visible.len(), 6);
    assert!(visible.iter().all(|p| demo.iter().any(|u| u.id == p.author_id)));

    let s = stats(&pool);
    assert_eq!(s.users_active, 6);
    assert_eq!(s.posts_approved, 6);
    assert_stats_in_sync(&pool);
}

#[test]
fn demoting_a_demo_author_hands_posts_to_default_author() {
    let pool = test_pool();
    seed_demo(&pool).unwrap();
    let demo = User::list_all(&pool)
        .into_iter()
        .find(|u| u.role == Role::Dummy)
        .unwrap();
    let owned = Post::list_by_author(&pool, demo.id);
    assert!(!owned.is_empty());

    // Keeping the demo role is allowed, handing it out is not
    let rename = UserAdminUpdate {
        name: format!("{} (demo)", demo.name),
        email: demo.email.clone(),
        role: Role::Dummy,
        blocked: false,
    };
    User::admin_update(&pool, demo.id, &rename).unwrap();

    let demote = UserAdminUpdate { role: Role::User, ..rename };
    User::admin_update(&pool, demo.id, &demote).unwrap();
    for post in owned {
        assert_eq!(Post::find_by_id(&pool, post.id).unwrap().author_id, FALLBACK_AUTHOR_ID);
    }
}

#[test]
fn settings_upsert_and_list() {
    let pool = test_pool();
    assert_eq!(Setting::get_i64(&pool, "session_expiry_hours"), 24);
    Setting::set(&pool, "images_allowed_types", " JPG, png ,,webp").unwrap();
    assert_eq!(
        Setting::get_list(&pool, "images_allowed_types"),
        vec!["jpg", "png", "webp"]
    );
    assert_eq!(Setting::get_or(&pool, "missing_key", "fallback"), "fallback");
}

// ═══════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════

#[test]
fn user_create_rejects_duplicates() {
    let pool = test_pool();
    make_user(&pool, "Alice", Role::User);
    let dup_email = User::create(&pool, "Other", "alice@example.com", "x", Role::User);
    assert!(matches!(dup_email, Err(BlogError::Validation(_))));
    let dup_name = User::create(&pool, "Alice", "new@example.com", "x", Role::User);
    assert!(matches!(dup_name, Err(BlogError::Validation(_))));
    assert_eq!(stats(&pool).users_active, 4);
}

#[test]
fn role_round_trips_through_text() {
    for role in [Role::SuperAdmin, Role::Admin, Role::Author, Role::User, Role::Dummy] {
        assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
    }
    assert!("editor".parse::<Role>().is_err());
    assert!(Role::Admin.is_admin() && Role::Admin.can_author());
    assert!(!Role::Author.is_admin() && Role::Author.can_author());
    assert!(!Role::User.can_author());
}

#[test]
fn profile_about_length_is_capped() {
    let pool = test_pool();
    let id = make_user(&pool, "Writer", Role::User);
    Setting::set(&pool, "about_max_chars", "10").unwrap();
    let long = User::update_profile(&pool, id, "Writer", "writer@example.com", "far too long for this");
    assert!(matches!(long, Err(BlogError::Validation(_))));
    User::update_profile(&pool, id, "Writer", "writer@example.com", "short").unwrap();
    assert_eq!(User::get_by_id(&pool, id).unwrap().about, "short");
}

#[test]
fn super_admin_cannot_be_deleted_or_blocked() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Asia");
    let post = make_visible_post(&pool, SUPER_ADMIN_ID, theme, "Tokyo");
    Membership::Like.toggle(&pool, SUPER_ADMIN_ID, post).unwrap();
    let before = stats(&pool);

    assert!(matches!(User::delete(&pool, SUPER_ADMIN_ID), Err(BlogError::Forbidden(_))));
    assert!(matches!(
        User::set_blocked(&pool, SUPER_ADMIN_ID, true),
        Err(BlogError::Forbidden(_))
    ));
    let demote = UserAdminUpdate {
        name: "Super Admin".to_string(),
        email: "super@admin".to_string(),
        role: Role::User,
        blocked: false,
    };
    assert!(matches!(
        User::admin_update(&pool, SUPER_ADMIN_ID, &demote),
        Err(BlogError::Forbidden(_))
    ));

    // Nothing moved
    assert_eq!(stats(&pool), before);
    assert_eq!(Post::find_by_id(&pool, post).unwrap().author_id, SUPER_ADMIN_ID);
    assert!(Membership::Like.exists(&pool, SUPER_ADMIN_ID, post));
    assert_eq!(User::count(&pool), 3);
}

#[test]
fn placeholder_accounts_cannot_be_deleted() {
    let pool = test_pool();
    assert!(matches!(User::delete(&pool, FALLBACK_AUTHOR_ID), Err(BlogError::Forbidden(_))));
    assert!(matches!(User::delete(&pool, DELETED_USER_ID), Err(BlogError::Forbidden(_))));
}

#[test]
fn super_admin_role_cannot_be_granted() {
    let pool = test_pool();
    let id = make_user(&pool, "Climber", Role::User);
    let promote = UserAdminUpdate {
        name: "Climber".to_string(),
        email: "climber@example.com".to_string(),
        role: Role::SuperAdmin,
        blocked: false,
    };
    assert!(User::admin_update(&pool, id, &promote).is_err());
    assert_eq!(User::get_by_id(&pool, id).unwrap().role, Role::User);
}

#[test]
fn demo_role_cannot_be_granted() {
    let pool = test_pool();
    let id = make_user(&pool, "Lurker", Role::User);
    let update = UserAdminUpdate {
        name: "Lurker".to_string(),
        email: "lurker@example.com".to_string(),
        role: Role::Dummy,
        blocked: false,
    };
    assert!(matches!(User::admin_update(&pool, id, &update), Err(BlogError::Validation(_))));
    assert_eq!(User::get_by_id(&pool, id).unwrap().role, Role::User);
}

#[test]
fn default_author_keeps_an_authoring_role() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Fjords");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Geiranger");
    let team = User::get_by_id(&pool, FALLBACK_AUTHOR_ID).unwrap();

    let demote = UserAdminUpdate {
        name: team.name.clone(),
        email: team.email.clone(),
        role: Role::User,
        blocked: false,
    };
    assert!(matches!(
        User::admin_update(&pool, FALLBACK_AUTHOR_ID, &demote),
        Err(BlogError::Forbidden(_))
    ));
    assert_eq!(User::get_by_id(&pool, FALLBACK_AUTHOR_ID).unwrap().role, Role::Author);
    assert_eq!(Post::find_by_id(&pool, post).unwrap().author_id, FALLBACK_AUTHOR_ID);

    // Still a valid target, so removals keep working
    let reader = make_user(&pool, "Passerby", Role::User);
    User::delete(&pool, reader).unwrap();
    let author = make_user(&pool, "Leaving", Role::Author);
    let theirs = make_visible_post(&pool, author, theme, "Alesund");
    User::delete(&pool, author).unwrap();
    assert_eq!(Post::find_by_id(&pool, theirs).unwrap().author_id, FALLBACK_AUTHOR_ID);

    let promote = UserAdminUpdate { role: Role::Admin, ..demote };
    User::admin_update(&pool, FALLBACK_AUTHOR_ID, &promote).unwrap();
    assert_eq!(User::get_by_id(&pool, FALLBACK_AUTHOR_ID).unwrap().role, Role::Admin);
}

#[test]
fn deleted_placeholder_cannot_be_changed_or_blocked() {
    let pool = test_pool();
    let placeholder = User::get_by_id(&pool, DELETED_USER_ID).unwrap();
    let promote = UserAdminUpdate {
        name: placeholder.name.clone(),
        email: placeholder.email.clone(),
        role: Role::Author,
        blocked: false,
    };
    assert!(matches!(
        User::admin_update(&pool, DELETED_USER_ID, &promote),
        Err(BlogError::Forbidden(_))
    ));
    let block = UserAdminUpdate { role: Role::User, blocked: true, ..promote };
    assert!(matches!(
        User::admin_update(&pool, DELETED_USER_ID, &block),
        Err(BlogError::Forbidden(_))
    ));
    assert!(matches!(
        User::set_blocked(&pool, DELETED_USER_ID, true),
        Err(BlogError::Forbidden(_))
    ));
    let after = User::get_by_id(&pool, DELETED_USER_ID).unwrap();
    assert_eq!(after.role, Role::User);
    assert!(!after.blocked);
}

#[test]
fn failed_user_delete_rolls_back_every_step() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Canyons");
    let author = make_user(&pool, "Anchored", Role::Author);
    let post = make_visible_post(&pool, author, theme, "Grand Canyon");
    let comment = Comment::create(&pool, post, author, "Sunrise at the rim").unwrap();
    let reply = Reply::create(&pool, post, author, comment, "Bring water").unwrap();
    Membership::Like.toggle(&pool, author, post).unwrap();
    Membership::Bookmark.toggle(&pool, author, post).unwrap();
    let before = stats(&pool);

    pool.get()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER refuse_user_delete BEFORE DELETE ON users
             BEGIN SELECT RAISE(ABORT, 'user rows are locked'); END;",
        )
        .unwrap();

    assert!(matches!(User::delete(&pool, author), Err(BlogError::Database(_))));

    assert!(User::get_by_id(&pool, author).is_some());
    assert_eq!(Post::find_by_id(&pool, post).unwrap().author_id, author);
    assert_eq!(Comment::find_by_id(&pool, comment).unwrap().user_id, author);
    assert_eq!(Reply::find_by_id(&pool, reply).unwrap().user_id, author);
    assert!(Membership::Like.exists(&pool, author, post));
    assert!(Membership::Bookmark.exists(&pool, author, post));
    let after = stats(&pool);
    assert_eq!(after.likes, before.likes);
    assert_eq!(after.bookmarks, before.bookmarks);
    assert_eq!(after.users_active, before.users_active);
    assert_eq!(after.version, before.version);
}

#[test]
fn user_delete_reassigns_content() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Europe");
    let author = make_user(&pool, "Author", Role::Author);
    let reader = make_user(&pool, "Reader", Role::User);
    let post = make_visible_post(&pool, author, theme, "Lisbon");

    let comment = Comment::create(&pool, post, author, "Thanks for reading").unwrap();
    let reply = Reply::create(&pool, post, author, comment, "Follow-up").unwrap();
    Comment::create(&pool, post, reader, "Great post").unwrap();
    Membership::Like.toggle(&pool, author, post).unwrap();
    Membership::Bookmark.toggle(&pool, author, post).unwrap();
    Membership::Like.toggle(&pool, reader, post).unwrap();
    assert_eq!(stats(&pool).likes, 2);

    let removed = User::delete(&pool, author).unwrap();
    assert_eq!(removed.name, "Author");
    assert!(User::get_by_id(&pool, author).is_none());

    assert_eq!(Post::find_by_id(&pool, post).unwrap().author_id, FALLBACK_AUTHOR_ID);
    assert_eq!(Comment::find_by_id(&pool, comment).unwrap().user_id, DELETED_USER_ID);
    assert_eq!(Reply::find_by_id(&pool, reply).unwrap().user_id, DELETED_USER_ID);
    assert_eq!(Membership::Like.count_for_post(&pool, post), 1);
    assert_eq!(Membership::Bookmark.count_for_post(&pool, post), 0);

    let s = stats(&pool);
    assert_eq!(s.likes, 1);
    assert_eq!(s.bookmarks, 0);
    assert_eq!(s.users_active, 4);
    assert_stats_in_sync(&pool);
}

#[test]
fn like_then_delete_user_restores_counter() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Africa");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Marrakesh");
    let reader = make_user(&pool, "Fan", Role::User);

    Membership::Like.toggle(&pool, reader, post).unwrap();
    assert_eq!(stats(&pool).likes, 1);
    User::delete(&pool, reader).unwrap();
    assert_eq!(stats(&pool).likes, 0);
    assert_stats_in_sync(&pool);
}

#[test]
fn demoting_an_author_reassigns_posts() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Oceania");
    let author = make_user(&pool, "Guest", Role::Author);
    let p1 = Post::create(&pool, author, &post_form(theme, "Sydney", "2020-01-01")).unwrap();
    let p2 = Post::create(&pool, author, &post_form(theme, "Auckland", "2020-02-01")).unwrap();

    let demote = UserAdminUpdate {
        name: "Guest".to_string(),
        email: "guest@example.com".to_string(),
        role: Role::User,
        blocked: false,
    };
    User::admin_update(&pool, author, &demote).unwrap();

    assert_eq!(User::get_by_id(&pool, author).unwrap().role, Role::User);
    for id in [p1, p2] {
        assert_eq!(Post::find_by_id(&pool, id).unwrap().author_id, FALLBACK_AUTHOR_ID);
    }
    assert!(Post::list_by_author(&pool, author).is_empty());
}

#[test]
fn promoting_keeps_authorship() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Americas");
    let author = make_user(&pool, "Rising", Role::Author);
    let post = Post::create(&pool, author, &post_form(theme, "Lima", "2020-01-01")).unwrap();
    let promote = UserAdminUpdate {
        name: "Rising".to_string(),
        email: "rising@example.com".to_string(),
        role: Role::Admin,
        blocked: false,
    };
    User::admin_update(&pool, author, &promote).unwrap();
    assert_eq!(Post::find_by_id(&pool, post).unwrap().author_id, author);
}

#[test]
fn reassign_rejects_non_author_target() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Arctic");
    let author = make_user(&pool, "Polar", Role::Author);
    Post::create(&pool, author, &post_form(theme, "Svalbard", "2020-01-01")).unwrap();
    let conn = pool.get().unwrap();
    let err = Post::reassign_authorship_with(&conn, author, DELETED_USER_ID).unwrap_err();
    assert!(matches!(err, BlogError::Validation(_)));
    assert!(Post::reassign_authorship_with(&conn, author, 999).unwrap_err().is_not_found());
    assert_eq!(Post::reassign_authorship_with(&conn, author, FALLBACK_AUTHOR_ID).unwrap(), 1);
}

#[test]
fn blocking_hides_comments_and_adjusts_counter() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Islands");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Crete");
    let troll = make_user(&pool, "Troll", Role::User);
    let kind = make_user(&pool, "Kind", Role::User);
    let c = Comment::create(&pool, post, troll, "Spam").unwrap();
    Reply::create(&pool, post, troll, c, "More spam").unwrap();
    Comment::create(&pool, post, kind, "Nice").unwrap();
    Session::create(&pool, troll, "troll-session", 24, None).unwrap();
    let active = stats(&pool).users_active;

    User::set_blocked(&pool, troll, true).unwrap();
    assert_eq!(Comment::for_post(&pool, post, 25).len(), 1);
    assert!(Reply::for_post(&pool, post, 100).is_empty());
    assert!(Session::get_user(&pool, "troll-session").is_none());
    assert_eq!(stats(&pool).users_active, active - 1);

    // Blocking twice does not count twice
    User::set_blocked(&pool, troll, true).unwrap();
    assert_eq!(stats(&pool).users_active, active - 1);

    User::set_blocked(&pool, troll, false).unwrap();
    assert_eq!(Comment::for_post(&pool, post, 25).len(), 2);
    assert_eq!(Reply::for_post(&pool, post, 100).len(), 1);
    assert_eq!(stats(&pool).users_active, active);
    assert_stats_in_sync(&pool);
}

#[test]
fn admin_update_applies_block_flag() {
    let pool = test_pool();
    let id = make_user(&pool, "Loud", Role::User);
    let update = UserAdminUpdate {
        name: "Loud".to_string(),
        email: "loud@example.com".to_string(),
        role: Role::User,
        blocked: true,
    };
    User::admin_update(&pool, id, &update).unwrap();
    assert!(User::get_by_id(&pool, id).unwrap().blocked);
    assert_stats_in_sync(&pool);
}

// ═══════════════════════════════════════════════════════════
// Posts & approval
// ═══════════════════════════════════════════════════════════

#[test]
fn new_posts_wait_for_approval() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Mountains");
    let id = Post::create(&pool, FALLBACK_AUTHOR_ID, &post_form(theme, "Alps", "2020-01-01")).unwrap();
    assert!(Post::find_visible(&pool, id).is_none());
    assert!(Post::find_by_id(&pool, id).is_some());

    assert!(Post::set_approval(&pool, id, true).unwrap());
    assert!(Post::find_visible(&pool, id).is_some());
    assert_eq!(stats(&pool).posts_approved, 1);

    // Approving again changes nothing
    assert!(!Post::set_approval(&pool, id, true).unwrap());
    assert_eq!(stats(&pool).posts_approved, 1);

    assert!(Post::set_approval(&pool, id, false).unwrap());
    assert!(Post::find_visible(&pool, id).is_none());
    assert_eq!(stats(&pool).posts_approved, 0);
    assert!(Post::set_approval(&pool, 999, true).unwrap_err().is_not_found());
}

#[test]
fn scheduled_posts_stay_hidden() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Deserts");
    let future = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Sahara");
    Post::update(&pool, future, &post_form(theme, "Sahara", "2999-01-01T08:30")).unwrap();
    assert!(Post::find_visible(&pool, future).is_none());
    let past = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Atacama");
    let listed: Vec<i64> = Post::list_visible(&pool, Some(theme), 25).iter().map(|p| p.id).collect();
    assert_eq!(listed, vec![past]);
}

#[test]
fn post_form_validation() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Rivers");
    let no_title = Post::create(&pool, FALLBACK_AUTHOR_ID, &post_form(theme, "  ", "2020-01-01"));
    assert!(matches!(no_title, Err(BlogError::Validation(_))));
    let bad_date = Post::create(&pool, FALLBACK_AUTHOR_ID, &post_form(theme, "Nile", "yesterday"));
    assert!(matches!(bad_date, Err(BlogError::Validation(_))));
    let no_theme = Post::create(&pool, FALLBACK_AUTHOR_ID, &post_form(999, "Nile", "2020-01-01"));
    assert!(no_theme.unwrap_err().is_not_found());
}

#[test]
fn post_delete_cascades() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Lakes");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Bled");
    let reader = make_user(&pool, "Swimmer", Role::User);
    let c = Comment::create(&pool, post, reader, "Cold water").unwrap();
    Reply::create(&pool, post, reader, c, "Very cold").unwrap();
    Membership::Like.toggle(&pool, reader, post).unwrap();
    Membership::Bookmark.toggle(&pool, reader, post).unwrap();

    let removed = Post::delete(&pool, post).unwrap();
    assert_eq!(removed.title, "Bled");
    assert!(Post::find_by_id(&pool, post).is_none());
    assert_eq!(Comment::count(&pool), 0);
    assert_eq!(Reply::count(&pool), 0);
    let s = stats(&pool);
    assert_eq!((s.posts_approved, s.likes, s.bookmarks), (0, 0, 0));
    assert_stats_in_sync(&pool);
    assert!(Post::delete(&pool, post).unwrap_err().is_not_found());
}

#[test]
fn short_intro_truncates_on_chars() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Coasts");
    let id = Post::create(&pool, FALLBACK_AUTHOR_ID, &post_form(theme, "Amalfi", "2020-01-01")).unwrap();
    let post = Post::find_by_id(&pool, id).unwrap();
    assert_eq!(post.short_intro(7), "A short...");
    assert_eq!(post.short_intro(300), post.intro);
}

// ═══════════════════════════════════════════════════════════
// Themes
// ═══════════════════════════════════════════════════════════

#[test]
fn theme_delete_refused_while_in_use() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Cities");
    let post = Post::create(&pool, FALLBACK_AUTHOR_ID, &post_form(theme, "Paris", "2020-01-01")).unwrap();

    assert!(matches!(Theme::delete(&pool, theme), Err(BlogError::Conflict(_))));
    assert!(Theme::find_by_id(&pool, theme).is_some());

    Post::delete(&pool, post).unwrap();
    Theme::delete(&pool, theme).unwrap();
    assert!(Theme::find_by_id(&pool, theme).is_none());
    assert!(Theme::delete(&pool, theme).unwrap_err().is_not_found());
}

#[test]
fn theme_names_are_unique() {
    let pool = test_pool();
    make_theme(&pool, "Forests");
    let again = Theme::create(
        &pool,
        &ThemeForm {
            name: " Forests ".to_string(),
            picture: String::new(),
            picture_source: String::new(),
        },
    );
    assert!(matches!(again, Err(BlogError::Validation(_))));
    assert_eq!(Theme::list(&pool).iter().filter(|t| t.name == "Forests").count(), 1);
}

// ═══════════════════════════════════════════════════════════
// Comments & replies
// ═══════════════════════════════════════════════════════════

#[test]
fn comment_delete_removes_replies() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Valleys");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Yosemite");
    let user = make_user(&pool, "Hiker", Role::User);
    let keep = Comment::create(&pool, post, user, "Keep me").unwrap();
    let kept_reply = Reply::create(&pool, post, user, keep, "Stay").unwrap();
    let doomed = Comment::create(&pool, post, user, "Remove me").unwrap();
    Reply::create(&pool, post, user, doomed, "Gone 1").unwrap();
    Reply::create(&pool, post, user, doomed, "Gone 2").unwrap();

    Comment::delete(&pool, doomed).unwrap();
    assert!(Comment::find_by_id(&pool, doomed).is_none());
    assert_eq!(Reply::count(&pool), 1);
    assert!(Reply::find_by_id(&pool, kept_reply).is_some());
    assert!(Comment::delete(&pool, doomed).unwrap_err().is_not_found());
}

#[test]
fn empty_comments_are_rejected() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Caves");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Postojna");
    let user = make_user(&pool, "Spelunker", Role::User);
    let err = Comment::create(&pool, post, user, "   ").unwrap_err();
    assert_eq!(err.to_string(), "Comment empty");
}

#[test]
fn reply_must_target_comment_on_same_post() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Bridges");
    let a = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Golden Gate");
    let b = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Tower Bridge");
    let user = make_user(&pool, "Walker", Role::User);
    let on_a = Comment::create(&pool, a, user, "Foggy").unwrap();
    assert!(Reply::create(&pool, b, user, on_a, "Wrong post").unwrap_err().is_not_found());
    assert!(Reply::create(&pool, a, user, 999, "No parent").unwrap_err().is_not_found());
    Reply::create(&pool, a, user, on_a, "Very foggy").unwrap();
}

#[test]
fn comments_newest_first_replies_oldest_first() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Harbours");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Hamburg");
    let user = make_user(&pool, "Sailor", Role::User);
    let first = Comment::create(&pool, post, user, "first").unwrap();
    let second = Comment::create(&pool, post, user, "second").unwrap();
    let r1 = Reply::create(&pool, post, user, first, "r1").unwrap();
    let r2 = Reply::create(&pool, post, user, first, "r2").unwrap();

    let comments: Vec<i64> = Comment::for_post(&pool, post, 25).iter().map(|c| c.id).collect();
    assert_eq!(comments, vec![second, first]);
    let replies: Vec<i64> = Reply::for_post(&pool, post, 100).iter().map(|r| r.id).collect();
    assert_eq!(replies, vec![r1, r2]);
}

// ═══════════════════════════════════════════════════════════
// Likes & bookmarks
// ═══════════════════════════════════════════════════════════

#[test]
fn toggle_twice_nets_zero() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Beaches");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Bondi");
    let user = make_user(&pool, "Surfer", Role::User);

    let on = Membership::Like.toggle(&pool, user, post).unwrap();
    assert!(on.active);
    assert_eq!(on.count, 1);
    assert_eq!(stats(&pool).likes, 1);

    let off = Membership::Like.toggle(&pool, user, post).unwrap();
    assert!(!off.active);
    assert_eq!(off.count, 0);
    assert_eq!(stats(&pool).likes, 0);
    assert_stats_in_sync(&pool);
}

#[test]
fn likes_and_bookmarks_are_independent() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Volcanoes");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Etna");
    let user = make_user(&pool, "Geologist", Role::User);
    Membership::Bookmark.toggle(&pool, user, post).unwrap();
    assert!(Membership::Bookmark.exists(&pool, user, post));
    assert!(!Membership::Like.exists(&pool, user, post));
    assert_eq!(Membership::Bookmark.list_for_user(&pool, user).len(), 1);
    assert!(Membership::Like.list_for_user(&pool, user).is_empty());
    let s = stats(&pool);
    assert_eq!((s.likes, s.bookmarks), (0, 1));
}

#[test]
fn toggle_on_missing_post_is_not_found() {
    let pool = test_pool();
    let user = make_user(&pool, "Lost", Role::User);
    assert!(Membership::Like.toggle(&pool, user, 404).unwrap_err().is_not_found());
    assert_eq!(stats(&pool).likes, 0);
}

#[test]
fn dashboard_edge_delete_adjusts_counter() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Glaciers");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Perito Moreno");
    let user = make_user(&pool, "Ice", Role::User);
    Membership::Bookmark.toggle(&pool, user, post).unwrap();
    let edge = Membership::Bookmark.list_all(&pool)[0].id;

    Membership::Bookmark.delete_by_id(&pool, edge).unwrap();
    assert_eq!(stats(&pool).bookmarks, 0);
    let again = Membership::Bookmark.delete_by_id(&pool, edge).unwrap_err();
    assert_eq!(again.to_string(), "Bookmark not found");
    assert_stats_in_sync(&pool);
}

/// Temp-file DB: shared-cache memory databases report SQLITE_LOCKED
/// instead of waiting on the busy timeout.
fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "travelblog_test_{}_{}.db",
        std::process::id(),
        next_db_id()
    ))
}

fn remove_db_files(path: &PathBuf) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

#[test]
fn concurrent_toggles_keep_one_edge() {
    let path = temp_db_path();
    let store = Arc::new(SqliteStore::new(crate::db::init_pool_at(path.to_str().unwrap()).unwrap()));
    store.run_migrations().unwrap();
    store.setting_set("password_hash_cost", "4").unwrap();
    store.seed_defaults().unwrap();
    let theme = make_theme(&store.pool, "Rush hour");
    let post = make_visible_post(&store.pool, FALLBACK_AUTHOR_ID, theme, "Shibuya");
    let user = make_user(&store.pool, "Clicker", Role::User);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    let _ = store.membership_toggle(Membership::Like, user, post);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let edges = store.membership_count_for_post(Membership::Like, post);
    assert!(edges <= 1, "found {} like rows for one user", edges);
    let stored = store.stats_get().unwrap();
    let derived = store.stats_recount().unwrap();
    assert_eq!(stored.likes, derived.likes);

    drop(store);
    remove_db_files(&path);
}

// ═══════════════════════════════════════════════════════════
// Statistics
// ═══════════════════════════════════════════════════════════

#[test]
fn resync_repairs_drift() {
    let pool = test_pool();
    {
        let conn = pool.get().unwrap();
        conn.execute("UPDATE blog_stats SET likes = 42, users_active = 0 WHERE id = 1", [])
            .unwrap();
    }
    let before = stats(&pool);
    assert!(!before.matches(&Stats::recount(&pool).unwrap()));

    let after = Stats::resync(&pool).unwrap();
    assert_eq!(after.likes, 0);
    assert_eq!(after.users_active, 3);
    assert!(after.version > before.version);
    assert_stats_in_sync(&pool);
}

#[test]
fn every_counter_change_bumps_version() {
    let pool = test_pool();
    let v0 = stats(&pool).version;
    make_user(&pool, "Counter", Role::User);
    let v1 = stats(&pool).version;
    assert!(v1 > v0);
    // No-op block leaves the version alone
    User::set_blocked(&pool, DELETED_USER_ID, false).unwrap();
    assert_eq!(stats(&pool).version, v1);
}

// ═══════════════════════════════════════════════════════════
// Contact, sessions, rate limiting
// ═══════════════════════════════════════════════════════════

#[test]
fn contact_message_validation() {
    let pool = test_pool();
    let mut form = ContactForm {
        name: "Visitor".to_string(),
        email: "not-an-email".to_string(),
        message: "Hello".to_string(),
    };
    assert!(ContactMessage::create(&pool, &form).is_err());
    form.email = "visitor@example.com".to_string();
    ContactMessage::create(&pool, &form).unwrap();
    assert_eq!(ContactMessage::list(&pool).len(), 1);
}

#[test]
fn expired_sessions_are_ignored_and_cleaned() {
    let pool = test_pool();
    let user = make_user(&pool, "Sleeper", Role::User);
    Session::create(&pool, user, "live", 24, Some("abc")).unwrap();
    assert_eq!(Session::get_user(&pool, "live").unwrap().id, user);
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES ('old', ?1, '2000-01-01 00:00:00', '2000-01-02 00:00:00')",
            rusqlite::params![user],
        )
        .unwrap();
    }
    assert!(Session::get_user(&pool, "old").is_none());
    assert_eq!(Session::cleanup_expired(&pool), 1);
    Session::delete(&pool, "live").unwrap();
    assert!(Session::get_user(&pool, "live").is_none());
}

#[test]
fn rate_limiter_blocks_after_limit() {
    let limiter = RateLimiter::new();
    let window = Duration::from_secs(60);
    for _ in 0..3 {
        assert!(limiter.check_and_record("login:abc", 3, window));
    }
    assert!(!limiter.check_and_record("login:abc", 3, window));
    assert!(limiter.check_and_record("login:other", 3, window));
    limiter.reset("login:abc");
    assert!(limiter.check_and_record("login:abc", 3, window));
}

#[test]
fn rate_limiter_sweeps_stale_keys() {
    let limiter = RateLimiter::new();
    for i in 0..SWEEP_THRESHOLD {
        assert!(limiter.check_and_record(&format!("login:{}", i), 5, Duration::ZERO));
    }
    assert_eq!(limiter.tracked_keys(), SWEEP_THRESHOLD);

    // Every earlier attempt is outside a zero window, so only the new key stays
    assert!(limiter.check_and_record("login:fresh", 5, Duration::ZERO));
    assert_eq!(limiter.tracked_keys(), 1);

    let live = RateLimiter::new();
    for i in 0..SWEEP_THRESHOLD {
        live.check_and_record(&format!("login:{}", i), 5, Duration::from_secs(60));
    }
    live.check_and_record("login:fresh", 5, Duration::from_secs(60));
    assert_eq!(live.tracked_keys(), SWEEP_THRESHOLD + 1);
}

#[test]
fn hash_key_normalises_input() {
    assert_eq!(auth::hash_key(" Reader@Example.com "), auth::hash_key("reader@example.com"));
    assert_eq!(auth::hash_key("x").len(), 64);
}

#[test]
fn password_hash_uses_configured_cost() {
    let pool = test_pool();
    let store = SqliteStore::new(pool);
    let hash = auth::hash_password(&store, "correct horse").unwrap();
    assert!(hash.starts_with("$2b$04$"));
    assert!(auth::verify_password("correct horse", &hash));
    assert!(!auth::verify_password("wrong", &hash));
}

// ═══════════════════════════════════════════════════════════
// Images
// ═══════════════════════════════════════════════════════════

fn temp_image_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "travelblog_images_{}_{}",
        std::process::id(),
        next_db_id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn picture_names_follow_convention() {
    assert_eq!(images::post_picture_name(PictureSlot::H, 12, "jpg"), "Picture_h_12.jpg");
    assert_eq!(images::profile_picture_name(7, "png"), "Picture_profile_7.png");
    assert_eq!("picture_s".parse::<PictureSlot>().unwrap(), PictureSlot::S);
    assert!("x".parse::<PictureSlot>().is_err());

    let allowed = vec!["jpg".to_string(), "png".to_string()];
    assert_eq!(images::allowed_extension("Beach.JPG", &allowed).unwrap(), "jpg");
    assert!(images::allowed_extension("script.exe", &allowed).is_err());
    assert!(images::allowed_extension("noext", &allowed).is_err());
}

#[test]
fn default_images_are_protected() {
    let dir = temp_image_dir();
    let dir_str = dir.to_str().unwrap();
    std::fs::write(dir.join("Picture_default.jpg"), b"x").unwrap();
    std::fs::write(dir.join("Picture_v_1.jpg"), b"xy").unwrap();

    let listed = images::list_images(dir_str);
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().find(|i| i.name == "Picture_default.jpg").unwrap().protected);

    assert!(matches!(
        images::delete_image(dir_str, "Picture_default.jpg"),
        Err(BlogError::Forbidden(_))
    ));
    images::delete_image(dir_str, "Picture_v_1.jpg").unwrap();
    assert!(images::delete_image(dir_str, "Picture_v_1.jpg").unwrap_err().is_not_found());
    // Already gone is fine during cascades
    images::remove_stored_picture(dir_str, "Picture_v_1.jpg").unwrap();
    images::remove_stored_picture(dir_str, "").unwrap();
    assert!(dir.join("Picture_default.jpg").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn image_paths_cannot_escape_directory() {
    let dir = temp_image_dir();
    let dir_str = dir.to_str().unwrap();
    for bad in ["../secret.jpg", "a/b.jpg", "a\\b.jpg", ".hidden", ""] {
        assert!(images::upload_path(dir_str, bad).is_err(), "{} accepted", bad);
    }
    assert!(matches!(
        images::delete_image(dir_str, "../Cargo.toml"),
        Err(BlogError::Validation(_))
    ));
    assert_eq!(
        images::upload_path(dir_str, "Picture_s_3.png").unwrap(),
        dir.join("Picture_s_3.png")
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reupload_removes_the_replaced_picture() {
    let pool = test_pool();
    let dir = temp_image_dir();
    let dir_str = dir.to_str().unwrap();
    let theme = make_theme(&pool, "Lagoons");
    let post = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Bora Bora");

    std::fs::write(dir.join("Picture_h_1.jpg"), b"old").unwrap();
    Post::set_picture(&pool, post, PictureSlot::H, "Picture_h_1.jpg").unwrap();
    let previous = Post::find_by_id(&pool, post).unwrap();

    std::fs::write(dir.join("Picture_h_1.png"), b"new").unwrap();
    Post::set_picture(&pool, post, PictureSlot::H, "Picture_h_1.png").unwrap();
    images::replace_stored_picture(dir_str, previous.picture(PictureSlot::H), "Picture_h_1.png")
        .unwrap();
    assert!(!dir.join("Picture_h_1.jpg").exists());
    assert!(dir.join("Picture_h_1.png").exists());

    // Same name overwritten in place stays
    images::replace_stored_picture(dir_str, "Picture_h_1.png", "Picture_h_1.png").unwrap();
    assert!(dir.join("Picture_h_1.png").exists());
    // Nothing uploaded before and the shared default are both fine
    images::replace_stored_picture(dir_str, "", "Picture_profile_4.jpg").unwrap();
    images::replace_stored_picture(dir_str, "Picture_default.jpg", "Picture_profile_4.jpg").unwrap();

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn clearing_a_picture_blanks_every_column_using_it() {
    let pool = test_pool();
    let theme = make_theme(&pool, "Reefs");
    let a = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Great Barrier");
    let b = make_visible_post(&pool, FALLBACK_AUTHOR_ID, theme, "Ningaloo");
    Post::set_picture(&pool, a, PictureSlot::V, "Picture_v_9.jpg").unwrap();
    Post::set_picture(&pool, a, PictureSlot::S, "Picture_v_9.jpg").unwrap();
    Post::set_picture(&pool, b, PictureSlot::H, "Picture_h_2.jpg").unwrap();

    assert_eq!(Post::clear_picture(&pool, "Picture_v_9.jpg").unwrap(), 2);
    let a = Post::find_by_id(&pool, a).unwrap();
    assert_eq!(a.picture(PictureSlot::V), "");
    assert_eq!(a.picture(PictureSlot::S), "");
    assert_eq!(Post::find_by_id(&pool, b).unwrap().picture(PictureSlot::H), "Picture_h_2.jpg");
}

// ═══════════════════════════════════════════════════════════
// HTTP endpoints
// ═══════════════════════════════════════════════════════════

struct TestApp {
    client: Client,
    store: Arc<SqliteStore>,
}

fn test_app() -> TestApp {
    let store = Arc::new(SqliteStore::new(test_pool()));
    let client = Client::tracked(crate::app(store.clone()).attach(Template::fairing())).expect("valid rocket instance");
    TestApp { client, store }
}

fn login(client: &Client, email: &str, password: &str) {
    let res = client
        .post("/account/login")
        .header(ContentType::Form)
        .body(format!("email={}&password={}", email, password))
        .dispatch();
    assert_eq!(res.status(), Status::SeeOther);
}

fn json_post(client: &Client, uri: String, body: &str) -> (Status, serde_json::Value) {
    let res = client.post(uri).header(ContentType::JSON).body(body.to_string()).dispatch();
    let status = res.status();
    let value = res.into_json::<serde_json::Value>().unwrap_or_default();
    (status, value)
}

#[test]
fn http_comment_requires_json() {
    let app = test_app();
    let res = app.client.post("/comment_post/1").body("comment=hi").dispatch();
    assert_eq!(res.status(), Status::PreconditionFailed);
}

#[test]
fn http_comment_requires_login() {
    let app = test_app();
    let (status, body) = json_post(&app.client, "/comment_post/1".to_string(), r#"{"comment":"hi"}"#);
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["message"], "Login required");
}

#[test]
fn http_comment_and_reply_flow() {
    let app = test_app();
    let pool = &app.store.pool;
    let theme = make_theme(pool, "Trains");
    let post = make_visible_post(pool, FALLBACK_AUTHOR_ID, theme, "Glacier Express");
    make_user(pool, "Rider", Role::User);
    login(&app.client, "rider@example.com", "password123");

    let uri = format!("/comment_post/{}", post);
    let (status, body) = json_post(&app.client, uri.clone(), "{}");
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["message"], "Comment empty");

    let (status, _) = json_post(&app.client, uri.clone(), r#"{"comment":"Stunning views"}"#);
    assert_eq!(status, Status::Ok);
    let comment = Comment::for_post(pool, post, 25)[0].id;

    let reply = format!(r#"{{"reply":"Agreed","commentId":"{}"}}"#, comment);
    let (status, body) = json_post(&app.client, uri.clone(), &reply);
    assert_eq!(status, Status::Ok);
    assert_eq!(body["message"], "Reply added");
    assert_eq!(Reply::for_post(pool, post, 100).len(), 1);

    let (status, _) = json_post(&app.client, uri, r#"{"comment":"x","reply":"y"}"#);
    assert_eq!(status, Status::BadRequest);

    let (status, _) = json_post(&app.client, "/comment_post/999".to_string(), r#"{"comment":"x"}"#);
    assert_eq!(status, Status::NotFound);
}

#[test]
fn http_delete_comment_checks_owner() {
    let app = test_app();
    let pool = &app.store.pool;
    let theme = make_theme(pool, "Ferries");
    let post = make_visible_post(pool, FALLBACK_AUTHOR_ID, theme, "Bosphorus");
    let owner = make_user(pool, "Owner", Role::User);
    make_user(pool, "Stranger", Role::User);
    let comment = Comment::create(pool, post, owner, "Mine").unwrap();
    Reply::create(pool, post, owner, comment, "Also mine").unwrap();

    login(&app.client, "stranger@example.com", "password123");
    let uri = format!("/delete_comment_or_reply/{}", post);
    let body = format!(r#"{{"commentId":{}}}"#, comment);
    let (status, _) = json_post(&app.client, uri.clone(), &body);
    assert_eq!(status, Status::Forbidden);

    let (status, _) = json_post(&app.client, uri.clone(), r#"{"commentId":999}"#);
    assert_eq!(status, Status::NotFound);
    let (status, _) = json_post(&app.client, uri.clone(), "{}");
    assert_eq!(status, Status::BadRequest);

    login(&app.client, "owner@example.com", "password123");
    let (status, body_json) = json_post(&app.client, uri, &body);
    assert_eq!(status, Status::Ok);
    assert_eq!(body_json["message"], "Successfully deleted");
    assert_eq!(Comment::count(pool), 0);
    assert_eq!(Reply::count(pool), 0);
}

#[test]
fn http_like_toggle_reports_state() {
    let app = test_app();
    let pool = &app.store.pool;
    let theme = make_theme(pool, "Markets");
    let post = make_visible_post(pool, FALLBACK_AUTHOR_ID, theme, "Bangkok");
    let hidden = Post::create(pool, FALLBACK_AUTHOR_ID, &post_form(theme, "Draft", "2020-01-01")).unwrap();

    let res = app.client.post(format!("/like_post/{}", post)).dispatch();
    assert_eq!(res.status(), Status::Unauthorized);

    make_user(pool, "Shopper", Role::User);
    login(&app.client, "shopper@example.com", "password123");

    let (status, body) = json_post(&app.client, format!("/like_post/{}", post), "");
    assert_eq!(status, Status::Ok);
    assert_eq!(body["likes"], 1);
    assert_eq!(body["user_liked"], true);

    let (_, body) = json_post(&app.client, format!("/like_post/{}", post), "");
    assert_eq!(body["likes"], 0);
    assert_eq!(body["user_liked"], false);

    let (status, body) = json_post(&app.client, format!("/bookmark_post/{}", post), "");
    assert_eq!(status, Status::Ok);
    assert_eq!(body["user_bookmarked"], true);

    let (status, _) = json_post(&app.client, format!("/like_post/{}", hidden), "");
    assert_eq!(status, Status::NotFound);
    assert_stats_in_sync(pool);
}

#[test]
fn http_blocked_user_cannot_log_in() {
    let app = test_app();
    let pool = &app.store.pool;
    let id = make_user(pool, "Banned", Role::User);
    User::set_blocked(pool, id, true).unwrap();
    login(&app.client, "banned@example.com", "password123");
    let res = app.client.post("/like_post/1").dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn http_admin_resync_and_approve() {
    let app = test_app();
    let pool = &app.store.pool;
    let theme = make_theme(pool, "Palaces");
    let post = Post::create(pool, FALLBACK_AUTHOR_ID, &post_form(theme, "Versailles", "2020-01-01")).unwrap();
    User::create(pool, "Boss", "boss@example.com", &fast_hash("password123"), Role::Admin).unwrap();
    login(&app.client, "boss@example.com", "password123");

    let res = app.client.post(format!("/dashboard/posts/{}/approve", post)).dispatch();
    assert_eq!(res.status(), Status::SeeOther);
    assert!(Post::find_visible(pool, post).is_some());

    {
        let conn = pool.get().unwrap();
        conn.execute("UPDATE blog_stats SET posts_approved = 9 WHERE id = 1", []).unwrap();
    }
    let res = app.client.post("/dashboard/stats/resync").dispatch();
    assert_eq!(res.status(), Status::SeeOther);
    assert_eq!(stats(pool).posts_approved, 1);
}

#[test]
fn http_reader_cannot_approve() {
    let app = test_app();
    let pool = &app.store.pool;
    let theme = make_theme(pool, "Castles");
    let post = Post::create(pool, FALLBACK_AUTHOR_ID, &post_form(theme, "Neuschwanstein", "2020-01-01")).unwrap();
    make_user(pool, "Peasant", Role::User);
    login(&app.client, "peasant@example.com", "password123");

    app.client.post(format!("/dashboard/posts/{}/approve", post)).dispatch();
    assert!(Post::find_visible(pool, post).is_none());
    assert_eq!(stats(pool).posts_approved, 0);
}

#[test]
fn http_image_delete_clears_post_references() {
    let app = test_app();
    let pool = &app.store.pool;
    let dir = temp_image_dir();
    Setting::set(pool, "images_blog_path", dir.to_str().unwrap()).unwrap();
    let theme = make_theme(pool, "Dunes");
    let post = make_visible_post(pool, FALLBACK_AUTHOR_ID, theme, "Sossusvlei");
    std::fs::write(dir.join("Picture_v_5.jpg"), b"img").unwrap();
    Post::set_picture(pool, post, PictureSlot::V, "Picture_v_5.jpg").unwrap();

    make_user(pool, "Curator", Role::Admin);
    login(&app.client, "curator@example.com", "password123");
    let res = app.client.post("/dashboard/images/Picture_v_5.jpg/delete").dispatch();
    assert_eq!(res.status(), Status::SeeOther);

    assert!(!dir.join("Picture_v_5.jpg").exists());
    assert_eq!(Post::find_by_id(pool, post).unwrap().picture(PictureSlot::V), "");
    let _ = std::fs::remove_dir_all(&dir);
}
