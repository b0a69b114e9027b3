//! Destination path helpers.

use crate::config::ERR_INVALID_PATH;
use crate::{UploadError, UploadResult};

/// Parent folder of a requested file path. A path without a folder maps to the root (`""`).
pub fn folder_of(file_path: &str) -> &str {
    let trimmed = file_path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Join `folder` and `name`, collapse repeated separators and strip the leading one.
pub fn join_destination(folder: &str, name: &str) -> String {
    let joined = format!("{}/{}", folder, name);
    let mut out = String::with_capacity(joined.len());
    let mut last_was_sep = false;
    for c in joined.chars() {
        if c == '/' {
            if last_was_sep {
                continue;
            }
            last_was_sep = true;
        } else {
            last_was_sep = false;
        }
        out.push(c);
    }
    out.trim_start_matches('/').to_string()
}

/// Final storage path for a file named `client_name` uploaded towards `file_path`.
pub fn destination_path(file_path: &str, client_name: &str) -> UploadResult<String> {
    // clients may send a full local path as the file name
    let name = client_name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(UploadError::validation(
            ERR_INVALID_PATH,
            format!("Invalid file name '{}'", client_name),
        ));
    }

    let path = join_destination(folder_of(file_path), name);
    if path.split('/').any(|segment| segment == "..") {
        return Err(UploadError::validation(
            ERR_INVALID_PATH,
            format!("Path '{}' escapes the disk root", path),
        ));
    }
    Ok(path)
}
