use std::sync::Arc;

use rocket::request::FlashMessage;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use super::page_context;
use crate::models::membership::Membership;
use crate::security::auth::AdminUser;
use crate::store::Store;

pub mod engagement;
pub mod images;
pub mod posts;
pub mod stats;
pub mod themes;
pub mod users;

// ── Overview ─────────────────────────────────────────────────

#[get("/")]
pub fn overview(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let context = page_context(
        s,
        Some(&admin.user),
        flash,
        json!({
            "page_title": "Dashboard",
            "stats": s.stats_get(),
            "user_count": s.user_count(),
            "post_count": s.post_count(),
            "theme_count": s.theme_list().len(),
            "like_count": s.membership_list_all(Membership::Like).len(),
            "bookmark_count": s.membership_list_all(Membership::Bookmark).len(),
            "comment_count": s.comment_list_all().len(),
            "message_count": s.contact_list().len(),
        }),
    );
    Template::render("dashboard/index", &context)
}

pub fn routes() -> Vec<rocket::Route> {
    let mut all = routes![overview];
    all.extend(users::routes());
    all.extend(posts::routes());
    all.extend(themes::routes());
    all.extend(engagement::routes());
    all.extend(images::routes());
    all.extend(stats::routes());
    all
}
