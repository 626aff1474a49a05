use chrono::NaiveDateTime;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

use crate::models::stats::{Counter, Stats};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Account that can never be deleted or blocked.
pub const SUPER_ADMIN_ID: i64 = 1;
/// Receives the posts of authors that are demoted or removed.
pub const FALLBACK_AUTHOR_ID: i64 = 2;
/// Receives the comments and replies of removed accounts.
pub const DELETED_USER_ID: i64 = 3;

pub const DEFAULT_DB_PATH: &str = "website/db/blog.db";

/// Themes a fresh install starts with, so authors can post straight away.
pub const DEFAULT_THEMES: [&str; 6] = [
    "Adventure",
    "Culture & History",
    "Food & Drink",
    "Road Trips",
    "Slow Travel",
    "Wildlife",
];

const DEMO_AUTHORS: [(&str, &str); 3] = [
    ("Maya Hart", "Chasing trains and street food across three continents."),
    ("Leo Brandt", "Cyclist, map collector, reluctant early riser."),
    ("Ines Duarte", "Writes about slow journeys and small harbour towns."),
];

// (author index, theme, title, date_to_post)
const DEMO_POSTS: [(usize, &str, &str, &str); 6] = [
    (0, "Food & Drink", "Night Markets of Taipei", "2024-02-10 09:00:00"),
    (0, "Road Trips", "Driving the Ring Road in Winter", "2024-03-22 09:00:00"),
    (1, "Adventure", "Cycling the Danube from Passau to Vienna", "2024-04-05 09:00:00"),
    (1, "Wildlife", "Whale Watching off the Azores", "2024-05-18 09:00:00"),
    (2, "Slow Travel", "A Week on the Slow Boat down the Mekong", "2024-06-02 09:00:00"),
    (2, "Culture & History", "Walking the Old Town of Kotor", "2024-07-14 09:00:00"),
];

const DEMO_INTRO: &str = "Notes, photos and practical tips from the road.";
const DEMO_BODY: &str = "We arrived late, found the last open kitchen in town and planned the \
     rest of the trip over noodles. The days that followed were slow, sunny and full of detours.";

pub fn init_pool() -> Result<DbPool, Box<dyn std::error::Error>> {
    let path = std::env::var("BLOG_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    init_pool_at(&path)
}

pub fn init_pool_at(path: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    // foreign_keys is per-connection in SQLite, so it goes in the init hook
    let manager = SqliteConnectionManager::file(path)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;"));
    let pool = Pool::builder().max_size(10).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Accounts
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            blocked INTEGER NOT NULL DEFAULT 0,
            about TEXT NOT NULL DEFAULT '',
            picture TEXT NOT NULL DEFAULT 'Picture_default.jpg',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Post categories
        CREATE TABLE IF NOT EXISTS themes (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            picture TEXT NOT NULL DEFAULT '',
            picture_source TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            theme_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            intro TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL DEFAULT '',
            picture_v TEXT NOT NULL DEFAULT '',
            picture_v_source TEXT NOT NULL DEFAULT '',
            picture_h TEXT NOT NULL DEFAULT '',
            picture_h_source TEXT NOT NULL DEFAULT '',
            picture_s TEXT NOT NULL DEFAULT '',
            picture_s_source TEXT NOT NULL DEFAULT '',
            picture_alt TEXT NOT NULL DEFAULT '',
            meta_tag TEXT NOT NULL DEFAULT '',
            title_tag TEXT NOT NULL DEFAULT '',
            admin_approved INTEGER NOT NULL DEFAULT 0,
            date_submitted DATETIME DEFAULT CURRENT_TIMESTAMP,
            date_to_post DATETIME NOT NULL,
            FOREIGN KEY (theme_id) REFERENCES themes(id),
            FOREIGN KEY (author_id) REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_posts_visible ON posts(admin_approved, date_to_post);
        CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);

        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY,
            post_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            blocked INTEGER NOT NULL DEFAULT 0,
            date_submitted DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (post_id) REFERENCES posts(id),
            FOREIGN KEY (user_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS replies (
            id INTEGER PRIMARY KEY,
            post_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            comment_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            blocked INTEGER NOT NULL DEFAULT 0,
            date_submitted DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (post_id) REFERENCES posts(id),
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (comment_id) REFERENCES comments(id)
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
        CREATE INDEX IF NOT EXISTS idx_replies_comment ON replies(comment_id);

        -- Membership edges, one per (user, post)
        CREATE TABLE IF NOT EXISTS likes (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            post_id INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(user_id, post_id),
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (post_id) REFERENCES posts(id)
        );

        CREATE TABLE IF NOT EXISTS bookmarks (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            post_id INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(user_id, post_id),
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (post_id) REFERENCES posts(id)
        );

        CREATE TABLE IF NOT EXISTS contact_messages (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Denormalized dashboard counters (singleton row)
        CREATE TABLE IF NOT EXISTS blog_stats (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            users_active INTEGER NOT NULL DEFAULT 0,
            posts_approved INTEGER NOT NULL DEFAULT 0,
            likes INTEGER NOT NULL DEFAULT 0,
            bookmarks INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 0,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Settings (key-value)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at DATETIME NOT NULL,
            expires_at DATETIME NOT NULL,
            ip_hash TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let defaults = vec![
        ("site_name", "The Travel Blog"),
        ("session_expiry_hours", "24"),
        ("login_rate_limit", "5"),
        ("comments_rate_limit", "10"),
        ("password_hash_cost", "12"),
        ("images_allowed_types", "jpg,jpeg,png,gif,webp"),
        ("images_blog_path", "website/uploads/blog"),
        ("images_profile_path", "website/uploads/profile"),
        ("about_max_chars", "385"),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }

    let cost: u32 = conn
        .query_row(
            "SELECT value FROM settings WHERE key = 'password_hash_cost'",
            [],
            |row| row.get::<_, String>(0),
        )?
        .parse()
        .unwrap_or(bcrypt::DEFAULT_COST);

    // Fixed ids 1..3 are relied on by the cascading maintenance code
    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if user_count == 0 {
        let admin_email =
            std::env::var("BLOG_ADMIN_EMAIL").unwrap_or_else(|_| "super@admin".to_string());
        let admin_password =
            std::env::var("BLOG_ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
        // Placeholder accounts get an unguessable password nobody knows
        let placeholder_password = uuid::Uuid::new_v4().to_string();

        let accounts = [
            (
                SUPER_ADMIN_ID,
                "Super Admin",
                admin_email.as_str(),
                admin_password.as_str(),
                "super_admin",
                "",
                "Picture_default.jpg",
            ),
            (
                FALLBACK_AUTHOR_ID,
                "The Travel Blog Team",
                "travel@team",
                placeholder_password.as_str(),
                "author",
                "Posts written by our team of travellers.",
                "Picture_default_author.jpg",
            ),
            (
                DELETED_USER_ID,
                "[Deleted]",
                "deleted@users",
                placeholder_password.as_str(),
                "user",
                "This user's account has been deleted",
                "Picture_default.jpg",
            ),
        ];

        for (id, name, email, password, role, about, picture) in accounts {
            let hash = bcrypt::hash(password, cost)?;
            conn.execute(
                "INSERT INTO users (id, name, email, password_hash, role, about, picture)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, name, email, hash, role, about, picture],
            )?;
        }
    }

    let theme_count: i64 = conn.query_row("SELECT COUNT(*) FROM themes", [], |row| row.get(0))?;
    if theme_count == 0 {
        for name in DEFAULT_THEMES {
            conn.execute("INSERT INTO themes (name) VALUES (?1)", params![name])?;
        }
    }

    // Counters start from whatever the tables already hold
    conn.execute(
        "INSERT OR IGNORE INTO blog_stats (id, users_active, posts_approved, likes, bookmarks)
         VALUES (
            1,
            (SELECT COUNT(*) FROM users WHERE blocked = 0),
            (SELECT COUNT(*) FROM posts WHERE admin_approved = 1),
            (SELECT COUNT(*) FROM likes),
            (SELECT COUNT(*) FROM bookmarks)
         )",
        [],
    )?;

    Ok(())
}

/// Sample dummy-role authors with approved posts, for trying the site out.
/// Skipped once any dummy account exists. Returns whether anything was added.
pub fn seed_demo(pool: &DbPool) -> Result<bool, Box<dyn std::error::Error>> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let existing: i64 = tx.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'dummy'",
        [],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Ok(false);
    }

    // Demo accounts cannot log in; nobody needs to know the password
    let cost = tx
        .query_row(
            "SELECT value FROM settings WHERE key = 'password_hash_cost'",
            [],
            |row| row.get::<_, String>(0),
        )
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(bcrypt::DEFAULT_COST);
    let hash = bcrypt::hash(uuid::Uuid::new_v4().to_string(), cost)?;

    let mut author_ids = Vec::with_capacity(DEMO_AUTHORS.len());
    for (idx, (name, about)) in DEMO_AUTHORS.iter().enumerate() {
        tx.execute(
            "INSERT INTO users (name, email, password_hash, role, about, picture)
             VALUES (?1, ?2, ?3, 'dummy', ?4, 'Picture_default_author.jpg')",
            params![name, format!("{}@example.com", idx), hash, about],
        )?;
        author_ids.push(tx.last_insert_rowid());
    }
    Stats::adjust(&tx, Counter::UsersActive, author_ids.len() as i64)?;

    let mut approved = 0;
    for (author, theme, title, date_to_post) in DEMO_POSTS {
        let theme_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM themes WHERE name = ?1",
                params![theme],
                |row| row.get(0),
            )
            .optional()?;
        let Some(theme_id) = theme_id else {
            log::warn!("Demo post '{}' skipped: theme '{}' is missing", title, theme);
            continue;
        };
        let date_to_post = NaiveDateTime::parse_from_str(date_to_post, "%Y-%m-%d %H:%M:%S")?;
        tx.execute(
            "INSERT INTO posts (theme_id, author_id, title, intro, body, picture_alt,
                                admin_approved, date_to_post)
             VALUES (?1, ?2, ?3, ?4, ?5, ?3, 1, ?6)",
            params![theme_id, author_ids[author], title, DEMO_INTRO, DEMO_BODY, date_to_post],
        )?;
        approved += 1;
    }
    Stats::adjust(&tx, Counter::PostsApproved, approved)?;

    tx.commit()?;
    log::info!("Seeded {} demo authors and {} demo posts", author_ids.len(), approved);
    Ok(true)
}
