use std::sync::Arc;

use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use super::super::{flash_outcome, page_context};
use crate::models::membership::Membership;
use crate::security::auth::AdminUser;
use crate::store::Store;

// ── Likes & bookmarks ────────────────────────────────────────

fn edges_page(
    admin: &AdminUser,
    store: &dyn Store,
    flash: Option<FlashMessage<'_>>,
    kind: Membership,
) -> Template {
    let (title, template) = match kind {
        Membership::Like => ("Likes", "dashboard/likes"),
        Membership::Bookmark => ("Bookmarks", "dashboard/bookmarks"),
    };
    let context = page_context(
        store,
        Some(&admin.user),
        flash,
        json!({ "page_title": title, "edges": store.membership_list_all(kind) }),
    );
    Template::render(template, &context)
}

#[get("/likes")]
pub fn likes_list(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    edges_page(&admin, store.inner().as_ref(), flash, Membership::Like)
}

#[post("/likes/<id>/delete")]
pub fn like_delete(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> Flash<Redirect> {
    flash_outcome(
        store.membership_delete(Membership::Like, id),
        "/dashboard/likes".to_string(),
        |_| "Like deleted.".to_string(),
    )
}

#[get("/bookmarks")]
pub fn bookmarks_list(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    edges_page(&admin, store.inner().as_ref(), flash, Membership::Bookmark)
}

#[post("/bookmarks/<id>/delete")]
pub fn bookmark_delete(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
) -> Flash<Redirect> {
    flash_outcome(
        store.membership_delete(Membership::Bookmark, id),
        "/dashboard/bookmarks".to_string(),
        |_| "Bookmark deleted.".to_string(),
    )
}

// ── Comments & replies ───────────────────────────────────────

#[get("/comments")]
pub fn comments_list(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let context = page_context(
        s,
        Some(&admin.user),
        flash,
        json!({ "page_title": "Comments", "comments": s.comment_list_all() }),
    );
    Template::render("dashboard/comments", &context)
}

/// Removes the comment together with its replies.
#[post("/comments/<id>/delete")]
pub fn comment_delete(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
) -> Flash<Redirect> {
    flash_outcome(store.comment_delete(id), "/dashboard/comments".to_string(), |_| {
        "Comment deleted.".to_string()
    })
}

#[get("/replies")]
pub fn replies_list(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let context = page_context(
        s,
        Some(&admin.user),
        flash,
        json!({ "page_title": "Replies", "replies": s.reply_list_all() }),
    );
    Template::render("dashboard/replies", &context)
}

#[post("/replies/<id>/delete")]
pub fn reply_delete(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> Flash<Redirect> {
    flash_outcome(store.reply_delete(id), "/dashboard/replies".to_string(), |_| {
        "Reply deleted.".to_string()
    })
}

// ── Contact messages ─────────────────────────────────────────

#[get("/messages")]
pub fn messages_list(admin: AdminUser, store: &State<Arc<dyn Store>>) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let context = page_context(
        s,
        Some(&admin.user),
        None,
        json!({ "page_title": "Messages", "messages": s.contact_list() }),
    );
    Template::render("dashboard/messages", &context)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        likes_list,
        like_delete,
        bookmarks_list,
        bookmark_delete,
        comments_list,
        comment_delete,
        replies_list,
        reply_delete,
        messages_list,
    ]
}
