use std::sync::Arc;

use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Value};

use super::super::{flash_outcome, page_context};
use crate::models::theme::ThemeForm;
use crate::security::auth::AdminUser;
use crate::store::Store;

const THEMES: &str = "/dashboard/themes";

#[get("/themes")]
pub fn themes_list(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let themes: Vec<Value> = s
        .theme_list()
        .into_iter()
        .map(|t| {
            let posts = s.theme_count_posts(t.id);
            json!({ "theme": t, "posts": posts })
        })
        .collect();
    let context = page_context(
        s,
        Some(&admin.user),
        flash,
        json!({ "page_title": "Themes", "themes": themes }),
    );
    Template::render("dashboard/themes", &context)
}

#[post("/themes", data = "<form>")]
pub fn theme_add(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    form: Form<ThemeForm>,
) -> Flash<Redirect> {
    flash_outcome(store.theme_create(&form), THEMES.to_string(), |_| {
        format!("Theme {} added.", form.name.trim())
    })
}

#[post("/themes/<id>/delete")]
pub fn theme_delete(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> Flash<Redirect> {
    flash_outcome(store.theme_delete(id), THEMES.to_string(), |_| {
        "Theme deleted.".to_string()
    })
}

pub fn routes() -> Vec<rocket::Route> {
    routes![themes_list, theme_add, theme_delete]
}
