use std::sync::Arc;

use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use super::super::{flash_outcome, page_context};
use crate::images;
use crate::security::auth::AdminUser;
use crate::store::Store;

fn blog_dir(store: &dyn Store) -> String {
    store.setting_get_or("images_blog_path", "website/uploads/blog")
}

#[get("/images")]
pub fn images_list(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = store.inner().as_ref();
    let context = page_context(
        s,
        Some(&admin.user),
        flash,
        json!({ "page_title": "Images", "images": images::list_images(&blog_dir(s)) }),
    );
    Template::render("dashboard/images", &context)
}

/// `Picture_default.jpg` and path-like names are refused by `images::delete_image`.
/// Posts still pointing at the file have that picture column blanked.
#[post("/images/<filename>/delete")]
pub fn image_delete(
    _admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    filename: &str,
) -> Flash<Redirect> {
    let s: &dyn Store = store.inner().as_ref();
    let dir = blog_dir(s);
    let result = images::delete_image(&dir, filename).and_then(|_| s.post_clear_picture(filename));
    flash_outcome(result, "/dashboard/images".to_string(), |cleared| match cleared {
        0 => format!("Image {} deleted.", filename),
        n => format!("Image {} deleted and removed from {} post picture(s).", filename, n),
    })
}

pub fn routes() -> Vec<rocket::Route> {
    routes![images_list, image_delete]
}
