use std::sync::Arc;

use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Value};

use super::{flash_outcome, page_context};
use crate::models::contact::ContactForm;
use crate::models::membership::Membership;
use crate::models::post::Post;
use crate::security::auth::AuthenticatedUser;
use crate::store::Store;

const POSTS_PER_THEME: usize = 3;
const LISTING_LIMIT: i64 = 25;
const INTRO_CHARS: usize = 300;
const ABOUT_AUTHORS: i64 = 25;
const COMMENTS_SHOWN: i64 = 25;
const REPLIES_SHOWN: i64 = 100;

fn listing_entry(post: &Post) -> Value {
    json!({
        "post": post,
        "intro": post.short_intro(INTRO_CHARS),
    })
}

// ── Homepage ───────────────────────────────────────────

#[get("/")]
pub fn index(
    store: &State<Arc<dyn Store>>,
    user: Option<AuthenticatedUser>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let themes = store.theme_list();
    let sections: Vec<Value> = themes
        .iter()
        .map(|theme| {
            let posts: Vec<Value> = store
                .post_list_visible(Some(theme.id), POSTS_PER_THEME as i64)
                .iter()
                .map(listing_entry)
                .collect();
            json!({ "theme": theme, "posts": posts })
        })
        .collect();

    let context = page_context(
        store.inner().as_ref(),
        user.as_ref().map(|u| &u.user),
        flash,
        json!({ "page_title": "Home", "sections": sections }),
    );
    Template::render("website/index", &context)
}

// ── Listing ────────────────────────────────────────────

/// Zero lists every theme.
#[get("/all/<index>")]
pub fn all_posts(
    store: &State<Arc<dyn Store>>,
    user: Option<AuthenticatedUser>,
    index: i64,
) -> Option<Template> {
    let (chosen_theme, theme_filter) = if index == 0 {
        (String::new(), None)
    } else {
        let theme = store.theme_find_by_id(index)?;
        (theme.name, Some(theme.id))
    };

    let posts: Vec<Value> = store
        .post_list_visible(theme_filter, LISTING_LIMIT)
        .iter()
        .map(listing_entry)
        .collect();

    let context = page_context(
        store.inner().as_ref(),
        user.as_ref().map(|u| &u.user),
        None,
        json!({
            "page_title": "All posts",
            "chosen_theme": chosen_theme,
            "themes": store.theme_list(),
            "posts": posts,
        }),
    );
    Some(Template::render("website/all_posts", &context))
}

// ── About / contact ────────────────────────────────────

#[get("/about")]
pub fn about(store: &State<Arc<dyn Store>>, user: Option<AuthenticatedUser>) -> Template {
    let context = page_context(
        store.inner().as_ref(),
        user.as_ref().map(|u| &u.user),
        None,
        json!({
            "page_title": "About",
            "authors": store.user_list_authors(ABOUT_AUTHORS),
        }),
    );
    Template::render("website/about", &context)
}

#[get("/contact")]
pub fn contact_page(
    store: &State<Arc<dyn Store>>,
    user: Option<AuthenticatedUser>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let context = page_context(
        store.inner().as_ref(),
        user.as_ref().map(|u| &u.user),
        flash,
        json!({ "page_title": "Contact" }),
    );
    Template::render("website/contact", &context)
}

#[post("/contact", data = "<form>")]
pub fn contact_submit(store: &State<Arc<dyn Store>>, form: Form<ContactForm>) -> Flash<Redirect> {
    flash_outcome(store.contact_create(&form), "/contact".to_string(), |id| {
        log::info!("Contact message {} stored", id);
        "Thank you, your message has been sent.".to_string()
    })
}

// ── Single post ────────────────────────────────────────

#[get("/post/<id>")]
pub fn post_page(
    store: &State<Arc<dyn Store>>,
    user: Option<AuthenticatedUser>,
    flash: Option<FlashMessage<'_>>,
    id: i64,
) -> Option<Template> {
    let post = store.post_find_visible(id)?;
    let current = user.as_ref().map(|u| &u.user);
    let (user_liked, user_bookmarked) = match current {
        Some(u) => (
            store.membership_exists(Membership::Like, u.id, id),
            store.membership_exists(Membership::Bookmark, u.id, id),
        ),
        None => (false, false),
    };

    let context = page_context(
        store.inner().as_ref(),
        current,
        flash,
        json!({
            "page_title": post.title_tag.clone(),
            "post": post,
            "comments": store.comment_for_post(id, COMMENTS_SHOWN),
            "replies": store.reply_for_post(id, REPLIES_SHOWN),
            "likes": store.membership_count_for_post(Membership::Like, id),
            "user_liked": user_liked,
            "user_bookmarked": user_bookmarked,
        }),
    );
    Some(Template::render("website/post", &context))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![index, all_posts, about, contact_page, contact_submit, post_page]
}
