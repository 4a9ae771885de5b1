use crate::idmap::IdMap;
use crate::pathutil::{normalize, parent_dir, resolve_relative, strip_doc_extension};

/// Where rewritten links point.
#[derive(Debug, Clone)]
pub struct LinkTarget<'a> {
    pub base_url: &'a str,
    pub default_space_key: &'a str,
}

/// Rewrite every resolvable inline link `[text](url)` in a document body to
/// an absolute wiki URL. Scheme-qualified targets are left alone, and so is
/// every link that matches no identifier-map entry (forward references that
/// never resolve are not an error). Returns the rewritten body and the number
/// of links changed. The frontmatter is the caller's concern; only body text
/// passes through here.
pub fn rewrite_links(
    body: &str,
    map: &IdMap,
    document_path: &str,
    target: &LinkTarget<'_>,
) -> (String, usize) {
    let mut output = String::with_capacity(body.len());
    let mut rewritten = 0usize;
    let mut cursor = 0usize;

    while let Some(open) = body[cursor..].find('[') {
        let open = cursor + open;
        let Some(close) = body[open..].find("](") else {
            break;
        };
        let close = open + close;
        let Some(end) = body[close + 2..].find(')') else {
            break;
        };
        let end = close + 2 + end;
        let url = &body[close + 2..end];

        output.push_str(&body[cursor..close + 2]);
        if let Some(resolved) = resolve_url(url, map, document_path, target) {
            output.push_str(&resolved);
            rewritten += 1;
        } else {
            output.push_str(url);
        }
        output.push(')');
        cursor = end + 1;
    }
    output.push_str(&body[cursor..]);
    (output, rewritten)
}

fn resolve_url(
    url: &str,
    map: &IdMap,
    document_path: &str,
    target: &LinkTarget<'_>,
) -> Option<String> {
    if url.is_empty() || is_remote(url) || url.starts_with('#') {
        return None;
    }
    for candidate in candidates(url, document_path) {
        if let Some(page) = map.get(&candidate) {
            let base = target.base_url.trim_end_matches('/');
            let space = page
                .space_key
                .as_deref()
                .unwrap_or(target.default_space_key);
            return Some(format!("{base}/wiki/spaces/{space}/pages/{}", page.page_id));
        }
    }
    None
}

/// Any scheme-qualified URL is already remote.
fn is_remote(url: &str) -> bool {
    url.contains("://") || url.starts_with("mailto:")
}

/// The fixed, ordered candidate forms tried against the identifier map.
/// Simpler textual forms come first purely for lookup speed; every candidate
/// that resolves must agree on the identity, so order never affects the
/// outcome.
fn candidates(url: &str, document_path: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(6);
    let raw = normalize(url);
    out.push(raw.clone());
    let stripped = strip_doc_extension(&raw);
    if stripped != raw {
        out.push(stripped.to_string());
    }

    let directory = parent_dir(document_path).unwrap_or_default();
    let resolved = resolve_relative(&directory, url);
    out.push(resolved.clone());
    let resolved_stripped = strip_doc_extension(&resolved);
    if resolved_stripped != resolved {
        out.push(resolved_stripped.to_string());
    }

    if let Some(rest) = url.strip_prefix("./") {
        let rest = normalize(rest);
        out.push(rest.clone());
        let rest_stripped = strip_doc_extension(&rest);
        if rest_stripped != rest {
            out.push(rest_stripped.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::idmap::{IdMap, PageRef};

    use super::{LinkTarget, rewrite_links};

    fn map(entries: &[(&str, &str, Option<&str>)]) -> IdMap {
        let mut out = IdMap::default();
        for (key, id, space) in entries {
            out.insert_first(
                key,
                PageRef {
                    page_id: (*id).to_string(),
                    space_key: space.map(str::to_string),
                },
            );
        }
        out
    }

    fn target() -> LinkTarget<'static> {
        LinkTarget {
            base_url: "https://example.atlassian.net",
            default_space_key: "DOC",
        }
    }

    #[test]
    fn rewrites_sibling_link_by_raw_form() {
        let map = map(&[("b.md", "200", None), ("b", "200", None)]);
        let (body, count) = rewrite_links("See [B](b.md) for details.", &map, "a.md", &target());
        assert_eq!(count, 1);
        assert_eq!(
            body,
            "See [B](https://example.atlassian.net/wiki/spaces/DOC/pages/200) for details."
        );
    }

    #[test]
    fn rewrites_same_directory_marker_link() {
        let map = map(&[("b", "200", None)]);
        let (body, count) = rewrite_links("[B](./b.md)", &map, "a.md", &target());
        assert_eq!(count, 1);
        assert!(body.contains("/pages/200"));
    }

    #[test]
    fn rewrites_link_resolved_against_document_directory() {
        let map = map(&[("docs/b", "200", None)]);
        let (body, count) = rewrite_links("[B](b.md)", &map, "docs/a.md", &target());
        assert_eq!(count, 1);
        assert!(body.contains("/pages/200"));
    }

    #[test]
    fn rewrites_parent_directory_traversal() {
        let map = map(&[("guide/b", "77", None)]);
        let (body, count) = rewrite_links("[B](../guide/b.md)", &map, "notes/a.md", &target());
        assert_eq!(count, 1);
        assert!(body.contains("/pages/77"));
    }

    #[test]
    fn prefers_recorded_space_key_over_default() {
        let map = map(&[("b", "200", Some("OPS"))]);
        let (body, _) = rewrite_links("[B](b.md)", &map, "a.md", &target());
        assert!(body.contains("/wiki/spaces/OPS/pages/200"));
    }

    #[test]
    fn absolute_urls_are_untouched() {
        let map = map(&[("b", "200", None)]);
        let text = "[ext](https://other.example.org/b.md) [mail](mailto:x@y.z) [anchor](#top)";
        let (body, count) = rewrite_links(text, &map, "a.md", &target());
        assert_eq!(count, 0);
        assert_eq!(body, text);
    }

    #[test]
    fn unresolved_links_are_left_as_is() {
        let map = map(&[("b", "200", None)]);
        let (body, count) = rewrite_links("[missing](nowhere.md)", &map, "a.md", &target());
        assert_eq!(count, 0);
        assert_eq!(body, "[missing](nowhere.md)");
    }

    #[test]
    fn rewrite_is_stable_once_resolved() {
        let map = map(&[("b", "200", None)]);
        let (first, _) = rewrite_links("intro [B](b.md) outro", &map, "a.md", &target());
        let (second, count) = rewrite_links(&first, &map, "a.md", &target());
        assert_eq!(first, second);
        assert_eq!(count, 0);
    }

    #[test]
    fn multiple_links_in_one_body() {
        let map = map(&[("b", "1", None), ("c", "2", None)]);
        let (body, count) =
            rewrite_links("[B](b.md) then [C](c.md) then [X](x.md)", &map, "a.md", &target());
        assert_eq!(count, 2);
        assert!(body.contains("/pages/1"));
        assert!(body.contains("/pages/2"));
        assert!(body.contains("[X](x.md)"));
    }
}
