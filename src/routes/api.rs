use std::sync::Arc;
use std::time::Duration;

use rocket::data::{Data, ToByteUnit};
use rocket::http::{ContentType, Status};
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::BlogError;
use crate::models::membership::Membership;
use crate::models::user::User;
use crate::rate_limit::RateLimiter;
use crate::security::auth::{self, AuthenticatedUser};
use crate::store::Store;

type JsonReply = (Status, Json<Value>);

fn reply(status: Status, message: &str) -> JsonReply {
    (status, Json(json!({ "message": message })))
}

fn failure(e: BlogError) -> JsonReply {
    let status = e.status();
    if status == Status::InternalServerError {
        log::error!("Engagement request failed: {}", e);
    }
    reply(status, &e.to_string())
}

/// Ids arrive either as JSON numbers or numeric strings.
fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a JSON body, enforcing the content type by hand so the caller
/// gets 412 rather than a routing miss.
async fn json_body(content_type: Option<&ContentType>, data: Data<'_>) -> Result<Value, JsonReply> {
    if !content_type.map(|ct| ct.is_json()).unwrap_or(false) {
        return Err(reply(Status::PreconditionFailed, "Content type not supported"));
    }
    let raw = data
        .open(64.kibibytes())
        .into_string()
        .await
        .map_err(|_| reply(Status::BadRequest, "Unreadable body"))?;
    serde_json::from_str(&raw.into_inner()).map_err(|_| reply(Status::BadRequest, "Invalid JSON"))
}

// ── Comments & replies ─────────────────────────────────

#[derive(Debug, Deserialize, Default)]
struct CommentPayload {
    comment: Option<String>,
    reply: Option<String>,
    #[serde(rename = "commentId")]
    comment_id: Option<Value>,
}

#[post("/comment_post/<id>", data = "<data>")]
pub async fn comment_post(
    store: &State<Arc<dyn Store>>,
    limiter: &State<RateLimiter>,
    user: Option<AuthenticatedUser>,
    content_type: Option<&ContentType>,
    id: i64,
    data: Data<'_>,
) -> JsonReply {
    let body = match json_body(content_type, data).await {
        Ok(v) => v,
        Err(r) => return r,
    };
    let user = match user {
        Some(u) => u.user,
        None => return reply(Status::Unauthorized, "Login required"),
    };
    let payload: CommentPayload = serde_json::from_value(body).unwrap_or_default();

    if store.post_find_visible(id).is_none() {
        return reply(Status::NotFound, "Post not found");
    }
    if !within_comment_limit(store.inner().as_ref(), limiter, &user) {
        return reply(Status::TooManyRequests, "Too many comments. Please wait before posting again.");
    }

    match payload {
        CommentPayload { reply: Some(text), comment_id: Some(cid), .. } => {
            let comment_id = match as_id(&cid) {
                Some(c) => c,
                None => return reply(Status::BadRequest, "Invalid commentId"),
            };
            match store.reply_create(id, user.id, comment_id, &text) {
                Ok(_) => reply(Status::Ok, "Reply added"),
                Err(e) => failure(e),
            }
        }
        CommentPayload { comment: Some(text), reply: None, .. } => {
            match store.comment_create(id, user.id, &text) {
                Ok(_) => reply(Status::Ok, "Comment added"),
                Err(e) => failure(e),
            }
        }
        CommentPayload { comment: None, reply: None, .. } => reply(Status::BadRequest, "Comment empty"),
        _ => reply(Status::BadRequest, "Must be either a comment or a reply"),
    }
}

fn within_comment_limit(store: &dyn Store, limiter: &RateLimiter, user: &User) -> bool {
    let key = format!("comment:{}", auth::hash_key(&user.id.to_string()));
    let max_attempts = store.setting_get_i64("comments_rate_limit").max(1) as u64;
    limiter.check_and_record(&key, max_attempts, Duration::from_secs(15 * 60))
}

#[derive(Debug, Deserialize, Default)]
struct DeletePayload {
    #[serde(rename = "commentId")]
    comment_id: Option<Value>,
    #[serde(rename = "replyId")]
    reply_id: Option<Value>,
}

/// Authors of a comment or reply may remove it; admins may remove any.
#[post("/delete_comment_or_reply/<id>", data = "<data>")]
pub async fn delete_comment_or_reply(
    store: &State<Arc<dyn Store>>,
    user: Option<AuthenticatedUser>,
    content_type: Option<&ContentType>,
    id: i64,
    data: Data<'_>,
) -> JsonReply {
    let body = match json_body(content_type, data).await {
        Ok(v) => v,
        Err(r) => return r,
    };
    let user = match user {
        Some(u) => u.user,
        None => return reply(Status::Unauthorized, "Login required"),
    };
    let payload: DeletePayload = serde_json::from_value(body).unwrap_or_default();

    match (payload.comment_id, payload.reply_id) {
        (None, None) => reply(Status::BadRequest, "Nothing to delete"),
        (Some(cid), None) => {
            let comment = match as_id(&cid).and_then(|c| store.comment_find_by_id(c)) {
                Some(c) if c.post_id == id => c,
                _ => return reply(Status::NotFound, "Comment not found"),
            };
            if comment.user_id != user.id && !user.is_admin() {
                return reply(Status::Forbidden, "Not allowed to delete this comment");
            }
            match store.comment_delete(comment.id) {
                Ok(()) => reply(Status::Ok, "Successfully deleted"),
                Err(e) => failure(e),
            }
        }
        (None, Some(rid)) => {
            let r = match as_id(&rid).and_then(|r| store.reply_find_by_id(r)) {
                Some(r) if r.post_id == id => r,
                _ => return reply(Status::NotFound, "Reply not found"),
            };
            if r.user_id != user.id && !user.is_admin() {
                return reply(Status::Forbidden, "Not allowed to delete this reply");
            }
            match store.reply_delete(r.id) {
                Ok(()) => reply(Status::Ok, "Successfully deleted"),
                Err(e) => failure(e),
            }
        }
        (Some(_), Some(_)) => reply(Status::BadRequest, "Must be either a commentId or a replyId"),
    }
}

// ── Like / bookmark toggles ────────────────────────────

fn toggle(store: &dyn Store, user: Option<AuthenticatedUser>, kind: Membership, id: i64) -> JsonReply {
    let user = match user {
        Some(u) => u.user,
        None => return reply(Status::Unauthorized, "Login required"),
    };
    if store.post_find_visible(id).is_none() {
        return reply(Status::NotFound, "Post not found");
    }
    match store.membership_toggle(kind, user.id, id) {
        Ok(t) => {
            let body = match kind {
                Membership::Like => json!({ "likes": t.count, "user_liked": t.active }),
                Membership::Bookmark => json!({ "bookmarks": t.count, "user_bookmarked": t.active }),
            };
            (Status::Ok, Json(body))
        }
        Err(e) => failure(e),
    }
}

#[post("/like_post/<id>")]
pub fn like_post(store: &State<Arc<dyn Store>>, user: Option<AuthenticatedUser>, id: i64) -> JsonReply {
    toggle(store.inner().as_ref(), user, Membership::Like, id)
}

#[post("/bookmark_post/<id>")]
pub fn bookmark_post(
    store: &State<Arc<dyn Store>>,
    user: Option<AuthenticatedUser>,
    id: i64,
) -> JsonReply {
    toggle(store.inner().as_ref(), user, Membership::Bookmark, id)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![comment_post, delete_comment_or_reply, like_post, bookmark_post]
}
