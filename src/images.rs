use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{BlogError, BlogResult};

/// Shared fallback image; never removed.
pub const DEFAULT_PICTURE: &str = "Picture_default.jpg";

/// The three picture columns of a post: vertical, horizontal and square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PictureSlot {
    V,
    H,
    S,
}

impl PictureSlot {
    pub fn letter(self) -> &'static str {
        match self {
            PictureSlot::V => "v",
            PictureSlot::H => "h",
            PictureSlot::S => "s",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            PictureSlot::V => "picture_v",
            PictureSlot::H => "picture_h",
            PictureSlot::S => "picture_s",
        }
    }
}

impl fmt::Display for PictureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

impl FromStr for PictureSlot {
    type Err = BlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v" | "picture_v" => Ok(PictureSlot::V),
            "h" | "picture_h" => Ok(PictureSlot::H),
            "s" | "picture_s" => Ok(PictureSlot::S),
            other => Err(BlogError::Validation(format!("Unknown picture column: {}", other))),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct StoredImage {
    pub name: String,
    pub size: u64,
    pub protected: bool,
}

/// Lowercased extension of an uploaded file, checked against the allow list.
pub fn allowed_extension(original: &str, allowed: &[String]) -> BlogResult<String> {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| BlogError::Validation("File has no extension.".to_string()))?;
    if !allowed.iter().any(|a| a == &ext) {
        return Err(BlogError::Validation(format!(
            "File type .{} is not allowed.",
            ext
        )));
    }
    Ok(ext)
}

/// `Picture_{v|h|s}_{postId}.{ext}`
pub fn post_picture_name(slot: PictureSlot, post_id: i64, ext: &str) -> String {
    format!("Picture_{}_{}.{}", slot.letter(), post_id, ext)
}

/// `Picture_profile_{userId}.{ext}`
pub fn profile_picture_name(user_id: i64, ext: &str) -> String {
    format!("Picture_profile_{}.{}", user_id, ext)
}

pub fn is_default(name: &str) -> bool {
    name.starts_with("Picture_default")
}

/// Plain file names only: no separators, no parent references.
fn check_name(name: &str) -> BlogResult<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(BlogError::Validation(format!("Invalid image name: {}", name)));
    }
    Ok(())
}

/// Where an upload with this name is written. Creates the directory.
pub fn upload_path(dir: &str, name: &str) -> BlogResult<PathBuf> {
    check_name(name)?;
    fs::create_dir_all(dir)?;
    Ok(Path::new(dir).join(name))
}

/// Delete one image by name. The shared default is refused.
pub fn delete_image(dir: &str, name: &str) -> BlogResult<()> {
    if name == DEFAULT_PICTURE || is_default(name) {
        return Err(BlogError::Forbidden("cannot delete default image.".to_string()));
    }
    check_name(name)?;
    let path = Path::new(dir).join(name);
    if !path.is_file() {
        return Err(BlogError::NotFound("Image"));
    }
    fs::remove_file(&path)?;
    log::info!("Removed image {}", path.display());
    Ok(())
}

/// Drop a picture that belonged to a removed post or account.
/// Empty names, defaults and files already gone are skipped.
pub fn remove_stored_picture(dir: &str, name: &str) -> BlogResult<()> {
    if name.is_empty() || is_default(name) {
        return Ok(());
    }
    match delete_image(dir, name) {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Files in an upload directory, sorted by name.
pub fn list_images(dir: &str) -> Vec<StoredImage> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return vec![],
    };
    let mut images: Vec<StoredImage> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            if name.starts_with('.') {
                return None;
            }
            let size = e.metadata().map(|m| m.len()).unwrap_or(0);
            Some(StoredImage {
                protected: is_default(&name),
                name,
                size,
            })
        })
        .collect();
    images.sort_by(|a, b| a.name.cmp(&b.name));
    images
}

/// After an upload has been recorded under `current`, drop the file it
/// replaced. A re-upload with another extension otherwise leaves it behind.
pub fn replace_stored_picture(dir: &str, previous: &str, current: &str) -> BlogResult<()> {
    if previous == current {
        return Ok(());
    }
    remove_stored_picture(dir, previous)
}
