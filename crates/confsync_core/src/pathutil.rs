/// Document extension handled by the sync engine.
pub const DOC_EXTENSION: &str = ".md";

/// Canonicalize a relative path string for identifier-map lookups.
/// Backslashes become forward slashes; leading and trailing separators are
/// stripped. Equality of two normalized paths is the sole "same document"
/// criterion used by the rest of the engine.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}

/// Strip the trailing document extension, if present.
pub fn strip_doc_extension(path: &str) -> &str {
    path.strip_suffix(DOC_EXTENSION).unwrap_or(path)
}

/// The normalized parent directory of a relative path, or `None` when the
/// path sits directly at the tree root.
pub fn parent_dir(path: &str) -> Option<String> {
    let normalized = normalize(path);
    let (parent, _) = normalized.rsplit_once('/')?;
    if parent.is_empty() {
        return None;
    }
    Some(parent.to_string())
}

/// The file name of a relative path without its document extension. Used to
/// default a document's title.
pub fn file_stem(path: &str) -> String {
    let normalized = normalize(path);
    let name = normalized.rsplit('/').next().unwrap_or(&normalized);
    strip_doc_extension(name).to_string()
}

/// Resolve `target` against `base_dir` (both relative to the content root),
/// collapsing `.` and `..` segments. `base_dir` is empty for root-level
/// documents. No file-system access.
pub fn resolve_relative(base_dir: &str, target: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let joined = if base_dir.is_empty() {
        normalize(target)
    } else {
        format!("{}/{}", normalize(base_dir), normalize(target))
    };
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
