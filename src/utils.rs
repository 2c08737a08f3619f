//! Utility functions for file naming and placement

use std::io;
use std::path::{Path, PathBuf};

/// Maximum number of numbered alternatives tried when resolving a name collision
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Return `path` if nothing exists there, otherwise the first free `name (n).ext` sibling
///
/// ```
/// use edr_printer::utils::unique_path;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/edr_report_1.html");
/// let free = unique_path(path).unwrap();
/// // If /tmp/edr_report_1.html exists, returns /tmp/edr_report_1 (1).html
/// ```
pub fn unique_path(path: &Path) -> io::Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot extract file stem from {}", path.display()),
        )
    })?;
    let extension = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let name = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "no free name for {} after {MAX_RENAME_ATTEMPTS} attempts",
            path.display()
        ),
    ))
}

/// Reduce an arbitrary string to something safe inside a file name
///
/// Keeps ASCII alphanumerics, `-` and `_`; everything else becomes `_`.
/// An empty result is replaced by `unknown`.
#[must_use]
pub fn sanitize_file_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Write `content` to a collision-free path derived from `dir` and `file_name`
///
/// Creates `dir` if needed and returns the path actually written.
pub async fn write_unique(dir: &Path, file_name: &str, content: &[u8]) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = unique_path(&dir.join(file_name))?;
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

/// Move `from` into `dir`, keeping its file name and avoiding collisions
///
/// Falls back to copy and remove when a rename is not possible (e.g. across filesystems).
pub async fn move_into(from: &Path, dir: &Path) -> io::Result<PathBuf> {
    let file_name = from.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", from.display()),
        )
    })?;

    tokio::fs::create_dir_all(dir).await?;
    let target = unique_path(&dir.join(file_name))?;

    if tokio::fs::rename(from, &target).await.is_err() {
        tokio::fs::copy(from, &target).await?;
        tokio::fs::remove_file(from).await?;
    }

    Ok(target)
}
