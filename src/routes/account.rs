use std::sync::Arc;
use std::time::Duration;

use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::CookieJar;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde::Deserialize;
use serde_json::json;

use super::{flash_outcome, page_context, save_upload, upload_extension};
use crate::errors::{BlogError, BlogResult};
use crate::images;
use crate::models::membership::Membership;
use crate::models::user::Role;
use crate::rate_limit::RateLimiter;
use crate::security::auth::{self, AuthenticatedUser, ClientIp};
use crate::store::Store;

const MIN_PASSWORD_LEN: usize = 8;

// ── Sign up ────────────────────────────────────────────

#[derive(Debug, FromForm, Deserialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[get("/signup")]
pub fn signup_page(store: &State<Arc<dyn Store>>, flash: Option<FlashMessage<'_>>) -> Template {
    let context = page_context(store.inner().as_ref(), None, flash, json!({ "page_title": "Sign up" }));
    Template::render("account/signup", &context)
}

fn register(store: &dyn Store, form: &SignupForm) -> BlogResult<i64> {
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(BlogError::Validation(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    if form.password != form.password_confirm {
        return Err(BlogError::Validation("Passwords do not match.".to_string()));
    }
    let hash = auth::hash_password(store, &form.password)?;
    store.user_create(form.name.trim(), form.email.trim(), &hash, Role::User)
}

#[post("/signup", data = "<form>")]
pub fn signup_submit(
    store: &State<Arc<dyn Store>>,
    cookies: &CookieJar<'_>,
    client_ip: ClientIp,
    form: Form<SignupForm>,
) -> Flash<Redirect> {
    let s: &dyn Store = store.inner().as_ref();
    match register(s, &form) {
        Ok(id) => {
            match auth::create_session(s, id, Some(&client_ip.0)) {
                Ok(sid) => auth::set_session_cookie(cookies, &sid),
                Err(e) => log::warn!("Account {} created but session failed: {}", id, e),
            }
            Flash::success(Redirect::to("/account/dashboard"), "Welcome aboard!")
        }
        Err(e) => Flash::error(Redirect::to("/account/signup"), e.to_string()),
    }
}

// ── Login / logout ─────────────────────────────────────

#[derive(Debug, FromForm, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[get("/login")]
pub fn login_page(store: &State<Arc<dyn Store>>, flash: Option<FlashMessage<'_>>) -> Template {
    let context = page_context(store.inner().as_ref(), None, flash, json!({ "page_title": "Log in" }));
    Template::render("account/login", &context)
}

#[post("/login", data = "<form>")]
pub fn login_submit(
    store: &State<Arc<dyn Store>>,
    limiter: &State<RateLimiter>,
    cookies: &CookieJar<'_>,
    client_ip: ClientIp,
    form: Form<LoginForm>,
) -> Flash<Redirect> {
    let s: &dyn Store = store.inner().as_ref();
    let fail = |msg: &str| Flash::error(Redirect::to("/account/login"), msg.to_string());

    let rate_key = format!("login:{}", auth::hash_key(&form.email));
    let max_attempts = s.setting_get_i64("login_rate_limit").max(1) as u64;
    if !limiter.check_and_record(&rate_key, max_attempts, Duration::from_secs(15 * 60)) {
        log::warn!("Login rate limit hit from {}", client_ip.0);
        return fail("Too many login attempts. Please try again in 15 minutes.");
    }

    let user = match s.user_get_by_email(form.email.trim()) {
        Some(u) if auth::verify_password(&form.password, &u.password_hash) => u,
        _ => return fail("Invalid credentials"),
    };
    if user.blocked {
        return fail("This account has been blocked.");
    }
    if user.role == Role::Dummy {
        return fail("This account cannot log in.");
    }

    match auth::create_session(s, user.id, Some(&client_ip.0)) {
        Ok(sid) => {
            auth::set_session_cookie(cookies, &sid);
            limiter.reset(&rate_key);
            log::info!("Account {} logged in", user.id);
            let target = if user.is_admin() { "/dashboard" } else { "/account/dashboard" };
            Flash::success(Redirect::to(target), format!("Welcome back, {}!", user.name))
        }
        Err(e) => {
            log::error!("Session creation failed for account {}: {}", user.id, e);
            fail("Login failed, please try again.")
        }
    }
}

#[post("/logout")]
pub fn logout(store: &State<Arc<dyn Store>>, cookies: &CookieJar<'_>) -> Flash<Redirect> {
    auth::end_session(store.inner().as_ref(), cookies);
    Flash::success(Redirect::to("/"), "You have been logged out.")
}

// ── User dashboard ─────────────────────────────────────

#[get("/dashboard")]
pub fn dashboard(
    current: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let user = &current.user;
    let posts = if user.can_author() {
        store.post_list_by_author(user.id)
    } else {
        vec![]
    };
    let context = page_context(
        store.inner().as_ref(),
        Some(user),
        flash,
        json!({
            "page_title": "My account",
            "bookmarks": store.membership_list_for_user(Membership::Bookmark, user.id),
            "likes": store.membership_list_for_user(Membership::Like, user.id),
            "posts": posts,
        }),
    );
    Template::render("account/dashboard", &context)
}

// ── Settings ───────────────────────────────────────────

#[derive(FromForm)]
pub struct AccountForm<'r> {
    pub name: String,
    pub email: String,
    pub about: String,
    pub picture: Option<TempFile<'r>>,
}

#[get("/settings")]
pub fn settings_page(
    current: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let context = page_context(
        s,
        Some(&current.user),
        flash,
        json!({
            "page_title": "Account settings",
            "about_max_chars": s.setting_get_i64("about_max_chars"),
        }),
    );
    Template::render("account/settings", &context)
}

async fn apply_account_update(
    store: &dyn Store,
    user_id: i64,
    form: &mut AccountForm<'_>,
) -> BlogResult<()> {
    store.user_update_profile(user_id, form.name.trim(), form.email.trim(), form.about.trim())?;

    if let Some(file) = form.picture.as_mut().filter(|f| f.len() > 0) {
        let ext = upload_extension(store, file)?;
        let name = images::profile_picture_name(user_id, &ext);
        let dir = store.setting_get_or("images_profile_path", "website/uploads/profile");
        let previous = store.user_get_by_id(user_id).map(|u| u.picture).unwrap_or_default();
        save_upload(file, &dir, &name).await?;
        store.user_update_picture(user_id, &name)?;
        if let Err(e) = images::replace_stored_picture(&dir, &previous, &name) {
            log::warn!("Old profile picture {} was not removed: {}", previous, e);
        }
    }
    Ok(())
}

#[post("/settings", data = "<form>")]
pub async fn settings_submit(
    current: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    mut form: Form<AccountForm<'_>>,
) -> Flash<Redirect> {
    let result = apply_account_update(store.inner().as_ref(), current.user.id, &mut form).await;
    flash_outcome(result, "/account/settings".to_string(), |_| {
        "Account updated.".to_string()
    })
}

#[derive(Debug, FromForm)]
pub struct PasswordForm {
    pub current: String,
    pub password: String,
    pub password_confirm: String,
}

#[post("/password", data = "<form>")]
pub fn password_submit(
    current: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    form: Form<PasswordForm>,
) -> Flash<Redirect> {
    let s: &dyn Store = store.inner().as_ref();
    let result = (|| {
        if !auth::verify_password(&form.current, &current.user.password_hash) {
            return Err(BlogError::Validation("Current password is incorrect.".to_string()));
        }
        if form.password.chars().count() < MIN_PASSWORD_LEN || form.password != form.password_confirm {
            return Err(BlogError::Validation(
                "New passwords must match and be at least 8 characters.".to_string(),
            ));
        }
        let hash = auth::hash_password(s, &form.password)?;
        s.user_update_password(current.user.id, &hash)
    })();
    flash_outcome(result, "/account/settings".to_string(), |_| {
        "Password changed.".to_string()
    })
}

// ── Delete own account ─────────────────────────────────

#[post("/delete")]
pub fn delete_account(
    current: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    cookies: &CookieJar<'_>,
) -> Flash<Redirect> {
    let s: &dyn Store = store.inner().as_ref();
    match s.user_delete(current.user.id) {
        Ok(user) => {
            auth::end_session(s, cookies);
            Flash::success(Redirect::to("/"), format!("Account {} deleted.", user.name))
        }
        Err(e) => Flash::error(Redirect::to("/account/settings"), e.to_string()),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        signup_page,
        signup_submit,
        login_page,
        login_submit,
        logout,
        dashboard,
        settings_page,
        settings_submit,
        password_submit,
        delete_account,
    ]
}
