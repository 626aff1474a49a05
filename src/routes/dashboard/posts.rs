use std::sync::Arc;

use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use super::super::{flash_outcome, page_context, save_upload, upload_extension};
use crate::errors::{BlogError, BlogResult};
use crate::images::{self, PictureSlot};
use crate::models::post::{Post, PostForm};
use crate::security::auth::{AdminUser, AuthorUser};
use crate::store::Store;

const POSTS: &str = "/dashboard/posts";

fn owned_post(store: &dyn Store, author: &AuthorUser, id: i64) -> BlogResult<Post> {
    let post = store.post_find_by_id(id).ok_or(BlogError::NotFound("Post"))?;
    if !author.may_edit(post.author_id) {
        return Err(BlogError::Forbidden("not the author of this post.".to_string()));
    }
    Ok(post)
}

// ── Listing ──────────────────────────────────────────────────

/// Admins see every post, authors only their own.
#[get("/posts")]
pub fn posts_list(
    author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let posts = if author.user.is_admin() {
        s.post_list_all()
    } else {
        s.post_list_by_author(author.user.id)
    };
    let context = page_context(
        s,
        Some(&author.user),
        flash,
        json!({ "page_title": "Posts", "posts": posts }),
    );
    Template::render("dashboard/posts", &context)
}

// ── Submit / edit ────────────────────────────────────────────

#[get("/posts/new")]
pub fn post_new_page(
    author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let context = page_context(
        s,
        Some(&author.user),
        flash,
        json!({
            "page_title": "New post",
            "themes": s.theme_list(),
            "action": format!("{}/new", POSTS),
        }),
    );
    Template::render("dashboard/post_form", &context)
}

#[post("/posts/new", data = "<form>")]
pub fn post_create(
    author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    form: Form<PostForm>,
) -> Flash<Redirect> {
    match store.post_create(author.user.id, &form) {
        Ok(id) => Flash::success(
            Redirect::to(format!("{}/{}/edit", POSTS, id)),
            "Post submitted. It will appear once an admin approves it.",
        ),
        Err(e) => Flash::error(Redirect::to(format!("{}/new", POSTS)), e.to_string()),
    }
}

#[get("/posts/<id>/edit")]
pub fn post_edit_page(
    author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
    id: i64,
) -> Result<Template, Flash<Redirect>> {
    let s: &dyn Store = store.inner().as_ref();
    let post = owned_post(s, &author, id)
        .map_err(|e| Flash::error(Redirect::to(POSTS), e.to_string()))?;
    let scheduled = post.date_to_post.format("%Y-%m-%dT%H:%M").to_string();
    let context = page_context(
        s,
        Some(&author.user),
        flash,
        json!({
            "page_title": format!("Edit {}", post.title),
            "themes": s.theme_list(),
            "post": post,
            "date_to_post": scheduled,
            "action": format!("{}/{}/edit", POSTS, id),
        }),
    );
    Ok(Template::render("dashboard/post_form", &context))
}

#[post("/posts/<id>/edit", data = "<form>")]
pub fn post_update(
    author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
    form: Form<PostForm>,
) -> Flash<Redirect> {
    let s: &dyn Store = store.inner().as_ref();
    let result = owned_post(s, &author, id).and_then(|_| s.post_update(id, &form));
    flash_outcome(result, format!("{}/{}/edit", POSTS, id), |_| "Post saved.".to_string())
}

/// Owners and admins can read a post before it is approved or published.
#[get("/posts/<id>/preview")]
pub fn post_preview(
    author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
) -> Result<Template, Flash<Redirect>> {
    let s: &dyn Store = store.inner().as_ref();
    let post = owned_post(s, &author, id)
        .map_err(|e| Flash::error(Redirect::to(POSTS), e.to_string()))?;
    let context = page_context(
        s,
        Some(&author.user),
        None,
        json!({ "page_title": "Preview", "post": post, "preview": true }),
    );
    Ok(Template::render("dashboard/post_preview", &context))
}

// ── Pictures ─────────────────────────────────────────────────

#[derive(FromForm)]
pub struct PictureUpload<'r> {
    pub slot: String,
    pub file: TempFile<'r>,
}

async fn store_post_picture(
    store: &dyn Store,
    author: &AuthorUser,
    id: i64,
    upload: &mut PictureUpload<'_>,
) -> BlogResult<String> {
    let post = owned_post(store, author, id)?;
    let slot: PictureSlot = upload.slot.parse()?;
    let ext = upload_extension(store, &upload.file)?;
    let name = images::post_picture_name(slot, id, &ext);
    let dir = store.setting_get_or("images_blog_path", "website/uploads/blog");
    save_upload(&mut upload.file, &dir, &name).await?;
    store.post_set_picture(id, slot, &name)?;
    let previous = post.picture(slot);
    if let Err(e) = images::replace_stored_picture(&dir, previous, &name) {
        log::warn!("Old picture {} of post {} was not removed: {}", previous, id, e);
    }
    Ok(name)
}

#[post("/posts/<id>/picture", data = "<form>")]
pub async fn post_picture(
    author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
    mut form: Form<PictureUpload<'_>>,
) -> Flash<Redirect> {
    let result = store_post_picture(store.inner().as_ref(), &author, id, &mut form).await;
    flash_outcome(result, format!("{}/{}/edit", POSTS, id), |name| {
        format!("Picture {} uploaded.", name)
    })
}

// ── Approval ─────────────────────────────────────────────────

#[post("/posts/<id>/approve")]
pub fn post_approve(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> Flash<Redirect> {
    flash_outcome(store.post_set_approval(id, true), POSTS.to_string(), |changed| {
        if changed {
            "Post approved.".to_string()
        } else {
            "Post was already approved.".to_string()
        }
    })
}

#[post("/posts/<id>/disallow")]
pub fn post_disallow(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> Flash<Redirect> {
    flash_outcome(store.post_set_approval(id, false), POSTS.to_string(), |changed| {
        if changed {
            "Post hidden from readers.".to_string()
        } else {
            "Post was not approved.".to_string()
        }
    })
}

// ── Delete ───────────────────────────────────────────────────

#[post("/posts/<id>/delete")]
pub fn post_delete(author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> Flash<Redirect> {
    let s: &dyn Store = store.inner().as_ref();
    let result = owned_post(s, &author, id).and_then(|_| s.post_delete(id));
    flash_outcome(result, POSTS.to_string(), |post| {
        format!("Post \"{}\" deleted.", post.title)
    })
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        posts_list,
        post_new_page,
        post_create,
        post_edit_page,
        post_update,
        post_preview,
        post_picture,
        post_approve,
        post_disallow,
        post_delete,
    ]
}
