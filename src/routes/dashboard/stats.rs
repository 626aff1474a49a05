use std::sync::Arc;

use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use super::super::{flash_outcome, page_context};
use crate::security::auth::AdminUser;
use crate::store::Store;

/// Stored counters next to the totals recounted from the tables.
#[get("/stats")]
pub fn stats_page(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let stored = s.stats_get().unwrap_or_default();
    let derived = s.stats_recount().unwrap_or_default();
    let context = page_context(
        s,
        Some(&admin.user),
        flash,
        json!({
            "page_title": "Statistics",
            "in_sync": stored.matches(&derived),
            "stored": stored,
            "derived": derived,
        }),
    );
    Template::render("dashboard/stats", &context)
}

#[post("/stats/resync")]
pub fn stats_resync(_admin: AdminUser, store: &State<Arc<dyn Store>>) -> Flash<Redirect> {
    flash_outcome(store.stats_resync(), "/dashboard/stats".to_string(), |stats| {
        format!("Statistics recounted (version {}).", stats.version)
    })
}

pub fn routes() -> Vec<rocket::Route> {
    routes![stats_page, stats_resync]
}
