use std::collections::HashMap;

use crate::pathutil::{normalize, parent_dir, strip_doc_extension};
use crate::scan::Document;

const SUCCESS_PREFIX: &str = "SUCCESS:";
const CONTENT_MARKER: &str = "Content:";
const SPACES_SEGMENT: &str = "/wiki/spaces/";
const PAGES_SEGMENT: &str = "/pages/";

/// A remote page identity. One identifier may be reachable under several
/// normalized keys; all keys for the same document must resolve to the same
/// pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub page_id: String,
    pub space_key: Option<String>,
}

/// Mapping from every plausible local reference form of a document to its
/// remote page identity.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    entries: HashMap<String, PageRef>,
}

impl IdMap {
    /// First-write-wins insert. Later documents never overwrite earlier
    /// identical keys; this only matters when several documents could map to
    /// one directory key.
    pub fn insert_first(&mut self, key: &str, page: PageRef) {
        self.entries.entry(normalize(key)).or_insert(page);
    }

    pub fn get(&self, key: &str) -> Option<&PageRef> {
        self.entries.get(&normalize(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the map from identifiers already recorded in frontmatter. Every
/// identified document is registered under its full relative path, the path
/// with the extension stripped, and its immediate parent directory (directory
/// index form) when that parent is not the tree root.
pub fn from_documents(documents: &[Document]) -> IdMap {
    let mut map = IdMap::default();
    for document in documents {
        let Some(page_id) = document.frontmatter.page_id() else {
            continue;
        };
        let page = PageRef {
            page_id,
            space_key: document.frontmatter.space_key(),
        };
        map.insert_first(&document.relative_path, page.clone());
        map.insert_first(strip_doc_extension(&document.relative_path), page.clone());
        if let Some(parent) = parent_dir(&document.relative_path) {
            map.insert_first(&parent, page);
        }
    }
    map
}

/// One successfully published document as reported by the external
/// publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPage {
    pub relative_path: String,
    pub space_key: String,
    pub page_id: String,
}

/// Parse one line of publisher output. The line format is a narrow versioned
/// contract:
///
/// `SUCCESS: <relative-path> Content: ... Page URL: <base>/wiki/spaces/<SPACE>/pages/<ID>`
///
/// where `<ID>` is the trailing numeric path segment. Anything else yields
/// `None`.
pub fn parse_publish_line(line: &str) -> Option<PublishedPage> {
    let rest = line.trim().strip_prefix(SUCCESS_PREFIX)?;
    let (path_part, url_part) = rest.split_once(CONTENT_MARKER)?;
    let relative_path = path_part.trim();
    if relative_path.is_empty() {
        return None;
    }

    let after_spaces = &url_part[url_part.find(SPACES_SEGMENT)? + SPACES_SEGMENT.len()..];
    let (space_key, after_space) = after_spaces.split_once('/')?;
    if space_key.is_empty() {
        return None;
    }

    let pages_rest = after_space
        .strip_prefix(PAGES_SEGMENT.trim_start_matches('/'))
        .or_else(|| {
            let index = after_space.find(PAGES_SEGMENT)?;
            Some(&after_space[index + PAGES_SEGMENT.len()..])
        })?;
    let page_id = pages_rest
        .split('/')
        .next()
        .unwrap_or("")
        .trim();
    if page_id.is_empty() || !page_id.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    Some(PublishedPage {
        relative_path: normalize(relative_path),
        space_key: space_key.to_string(),
        page_id: page_id.to_string(),
    })
}

/// Extract every successfully published document from the publisher's
/// combined output text. Lines that do not match the contract are ignored.
pub fn parse_publish_output(output: &str) -> Vec<PublishedPage> {
    output.lines().filter_map(parse_publish_line).collect()
}

/// Register freshly published identifiers under the extension-stripped path
/// form without displacing already-known entries.
pub fn extend_from_publish(map: &mut IdMap, pages: &[PublishedPage]) {
    for page in pages {
        map.insert_first(
            strip_doc_extension(&page.relative_path),
            PageRef {
                page_id: page.page_id.clone(),
                space_key: Some(page.space_key.clone()),
            },
        );
    }
}
