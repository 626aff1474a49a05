#[macro_use]
extern crate rocket;

use std::sync::Arc;

use rocket::fs::FileServer;
use rocket::response::content::RawHtml;
use rocket::response::Redirect;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;

mod boot;
mod db;
mod errors;
mod images;
mod models;
mod rate_limit;
mod routes;
mod security;
mod store;

#[cfg(test)]
mod tests;

use rate_limit::RateLimiter;
use store::sqlite::SqliteStore;
use store::Store;

#[catch(401)]
fn unauthorized() -> Redirect {
    Redirect::to("/account/login")
}

#[catch(403)]
fn forbidden() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>403</h1><p>You are not allowed to view this page.</p><a href='/'>Home</a></body></html>".to_string())
}

#[catch(404)]
fn not_found() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>404</h1><p>Page not found.</p><a href='/'>Home</a></body></html>".to_string())
}

#[catch(500)]
fn server_error() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>500</h1><p>Internal server error.</p><a href='/'>Home</a></body></html>".to_string())
}

/// Route tree and managed state, without templates or static files.
pub fn app(store: Arc<dyn Store>) -> Rocket<Build> {
    rocket::build()
        .manage(store)
        .manage(RateLimiter::new())
        .mount("/", routes::public::routes())
        .mount("/", routes::api::routes())
        .mount("/account", routes::account::routes())
        .mount("/dashboard", routes::dashboard::routes())
        .register("/", catchers![unauthorized, forbidden, not_found, server_error])
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    // Boot check: verify/create directories, validate critical files
    boot::run();

    let pool = db::init_pool().expect("Failed to initialize database pool");
    let store = SqliteStore::new(pool);
    store.run_migrations().expect("Failed to run database migrations");
    store.seed_defaults().expect("Failed to seed defaults");
    if std::env::var("BLOG_SEED_DEMO").is_ok_and(|v| v == "1" || v == "true") {
        store.seed_demo().expect("Failed to seed demo content");
    }

    let expired = store.session_cleanup_expired();
    if expired > 0 {
        log::info!("Removed {} expired session(s)", expired);
    }

    let store: Arc<dyn Store> = Arc::new(store);
    app(store)
        .attach(Template::fairing())
        .mount("/static", FileServer::from("website/static"))
        .mount("/uploads", FileServer::from("website/uploads"))
}
