use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::process;

/// Required directories that will be created if missing
const REQUIRED_DIRS: &[&str] = &[
    "website",
    "website/db",
    "website/uploads",
    "website/uploads/blog",
    "website/uploads/profile",
    "website/static",
    "website/templates",
];

/// Critical template files; pages cannot render without these
const CRITICAL_TEMPLATES: &[&str] = &[
    "website/templates/base.html.tera",
    "website/templates/website/index.html.tera",
    "website/templates/website/post.html.tera",
    "website/templates/dashboard/index.html.tera",
];

/// Shared fallback pictures referenced by seeded accounts
const DEFAULT_PICTURES: &[&str] = &[
    "website/uploads/profile/Picture_default.jpg",
    "website/uploads/profile/Picture_default_author.jpg",
];

fn ensure_writable(dir: &str) -> Result<(), std::io::Error> {
    let test_file = Path::new(dir).join(".write_test");
    fs::write(&test_file, "test")?;
    fs::remove_file(&test_file)
}

/// Run all boot checks. Call this before Rocket launches.
/// Creates missing directories, warns about missing files, and
/// aborts if critical dependencies are absent.
pub fn run() {
    info!("Boot check starting...");

    let mut warnings = 0u32;
    let mut errors = 0u32;

    // ── 1. Directories ─────────────────────────────────
    for dir in REQUIRED_DIRS {
        let path = Path::new(dir);
        if !path.exists() {
            match fs::create_dir_all(path) {
                Ok(_) => info!("  Created directory: {}", dir),
                Err(e) => {
                    error!("  FAILED to create directory {}: {}", dir, e);
                    errors += 1;
                }
            }
        }
    }

    // ── 2. Critical templates ──────────────────────────
    for file in CRITICAL_TEMPLATES {
        if !Path::new(file).exists() {
            error!("  MISSING critical template: {}", file);
            errors += 1;
        }
    }

    // ── 3. Default pictures ────────────────────────────
    for file in DEFAULT_PICTURES {
        if !Path::new(file).exists() {
            warn!("  Missing default picture: {} (profiles will show a broken image)", file);
            warnings += 1;
        }
    }

    // ── 4. Writable data directories ───────────────────
    if let Err(e) = ensure_writable("website/db") {
        error!("  Database directory not writable: {}", e);
        errors += 1;
    }
    for dir in ["website/uploads/blog", "website/uploads/profile"] {
        if let Err(e) = ensure_writable(dir) {
            warn!("  Upload directory {} not writable: {} (uploads will fail)", dir, e);
            warnings += 1;
        }
    }

    // ── 5. Rocket.toml exists ──────────────────────────
    if !Path::new("Rocket.toml").exists() {
        warn!("  Rocket.toml not found, using default config");
        warnings += 1;
    }

    // ── Summary ────────────────────────────────────────
    if errors > 0 {
        error!(
            "Boot check FAILED: {} error(s), {} warning(s). Aborting.",
            errors, warnings
        );
        process::exit(1);
    }

    if warnings > 0 {
        warn!(
            "Boot check passed with {} warning(s). Some features may not work correctly.",
            warnings
        );
    } else {
        info!("Boot check passed.");
    }
}
