use std::sync::Arc;

use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde::Deserialize;
use serde_json::json;

use super::super::{flash_outcome, page_context};
use crate::errors::BlogResult;
use crate::models::user::{Role, UserAdminUpdate};
use crate::security::auth::AdminUser;
use crate::store::Store;

const USERS: &str = "/dashboard/users";

// ── Users Management ─────────────────────────────────────────

#[get("/users")]
pub fn users_list(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let context = page_context(
        s,
        Some(&admin.user),
        flash,
        json!({ "page_title": "Users", "users": s.user_list_all() }),
    );
    Template::render("dashboard/users", &context)
}

#[get("/users/<id>")]
pub fn user_edit_page(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
    id: i64,
) -> Option<Template> {
    let s: &dyn Store = store.inner().as_ref();
    let user = s.user_get_by_id(id)?;
    let roles: Vec<&str> = Role::ASSIGNABLE.iter().map(|r| r.as_str()).collect();
    let context = page_context(
        s,
        Some(&admin.user),
        flash,
        json!({
            "page_title": format!("Edit {}", user.name),
            "user": user,
            "roles": roles,
            "authored_posts": s.post_list_by_author(id).len(),
        }),
    );
    Some(Template::render("dashboard/user_edit", &context))
}

#[derive(Debug, FromForm, Deserialize)]
pub struct UserUpdateForm {
    pub name: String,
    pub email: String,
    pub role: String,
    pub blocked: bool,
}

impl UserUpdateForm {
    fn into_update(self) -> BlogResult<UserAdminUpdate> {
        Ok(UserAdminUpdate {
            role: self.role.parse()?,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            blocked: self.blocked,
        })
    }
}

#[post("/users/<id>", data = "<form>")]
pub fn user_update(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
    form: Form<UserUpdateForm>,
) -> Flash<Redirect> {
    let result = form
        .into_inner()
        .into_update()
        .and_then(|update| store.user_admin_update(id, &update));
    flash_outcome(result, format!("{}/{}", USERS, id), |_| "User updated.".to_string())
}

#[post("/users/<id>/block")]
pub fn user_block(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> Flash<Redirect> {
    flash_outcome(store.user_set_blocked(id, true), USERS.to_string(), |_| {
        format!("User {} blocked.", id)
    })
}

#[post("/users/<id>/unblock")]
pub fn user_unblock(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> Flash<Redirect> {
    flash_outcome(store.user_set_blocked(id, false), USERS.to_string(), |_| {
        format!("User {} unblocked.", id)
    })
}

#[post("/users/<id>/delete")]
pub fn user_delete(admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> Flash<Redirect> {
    if id == admin.user.id {
        return Flash::error(
            Redirect::to(USERS),
            "Use the account settings page to delete your own account.",
        );
    }
    flash_outcome(store.user_delete(id), USERS.to_string(), |user| {
        format!("User {} deleted.", user.name)
    })
}

pub fn routes() -> Vec<rocket::Route> {
    routes![users_list, user_edit_page, user_update, user_block, user_unblock, user_delete]
}
