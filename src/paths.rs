use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

/// Turns a request path into a relative filesystem path.
///
/// Returns `None` for paths that are not valid UTF-8 once decoded or that try
/// to climb out of the served directory.
pub fn request_path(uri_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;
    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

/// Compares a path's extension against `ext`, ignoring ASCII case
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
