use rocket::fs::TempFile;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use serde_json::{json, Value};

use crate::errors::{BlogError, BlogResult};
use crate::images;
use crate::models::user::User;
use crate::store::Store;

pub mod account;
pub mod api;
pub mod dashboard;
pub mod public;

/// Context shared by every rendered page, merged with the page's own values.
pub(crate) fn page_context(
    store: &dyn Store,
    user: Option<&User>,
    flash: Option<FlashMessage<'_>>,
    extra: Value,
) -> Value {
    let mut context = json!({
        "site_name": store.setting_get_or("site_name", "The Travel Blog"),
        "logged_in": user.is_some(),
        "current_user": user,
        "is_admin": user.map(|u| u.is_admin()).unwrap_or(false),
        "can_author": user.map(|u| u.can_author()).unwrap_or(false),
    });

    if let Some(ref f) = flash {
        context["flash_kind"] = json!(f.kind());
        context["flash_msg"] = json!(f.message());
    }

    if let (Some(base), Value::Object(more)) = (context.as_object_mut(), extra) {
        base.extend(more);
    }
    context
}

/// Turn a mutation result into a flash redirect back to `to`.
pub(crate) fn flash_outcome<T>(
    result: BlogResult<T>,
    to: String,
    success: impl FnOnce(T) -> String,
) -> Flash<Redirect> {
    match result {
        Ok(value) => Flash::success(Redirect::to(to), success(value)),
        Err(e) => {
            match e {
                BlogError::Database(_) | BlogError::Pool(_) | BlogError::Io(_) => {
                    log::error!("Mutation failed: {}", e)
                }
                _ => log::warn!("Mutation refused: {}", e),
            }
            Flash::error(Redirect::to(to), e.to_string())
        }
    }
}

/// Extension of an uploaded file, taken from the client's file name or,
/// failing that, the declared content type, then checked against the
/// configured allow list.
pub(crate) fn upload_extension(store: &dyn Store, file: &TempFile<'_>) -> BlogResult<String> {
    let allowed = store.setting_get_list("images_allowed_types");
    let original = file
        .raw_name()
        .map(|rn| rn.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .filter(|s| s.contains('.'))
        .or_else(|| {
            file.content_type()
                .and_then(|ct| ct.extension())
                .map(|e| format!("upload.{}", e))
        })
        .ok_or_else(|| BlogError::Validation("Could not determine the file type.".to_string()))?;
    images::allowed_extension(&original, &allowed)
}

/// Move an upload into `dir` under `name`.
pub(crate) async fn save_upload(file: &mut TempFile<'_>, dir: &str, name: &str) -> BlogResult<()> {
    if file.len() == 0 {
        return Err(BlogError::Validation("No file selected.".to_string()));
    }
    let dest = images::upload_path(dir, name)?;
    file.copy_to(&dest).await?;
    log::info!("Stored upload {}", dest.display());
    Ok(())
}
