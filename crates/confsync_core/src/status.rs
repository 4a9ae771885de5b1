use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::config::{CONFIG_FILENAME, MIRROR_DIR_NAME, SyncConfig, load_config};
use crate::pathutil::file_stem;
use crate::scan::scan_documents;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentStatus {
    pub relative_path: String,
    pub title: String,
    pub page_id: Option<String>,
    pub space_key: Option<String>,
    pub publish: Option<bool>,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub total: usize,
    pub with_page_id: usize,
    pub without_page_id: usize,
    pub documents: Vec<DocumentStatus>,
}

/// Walk the content tree and report each document's publish state without
/// touching the network or mutating anything.
pub fn collect_status(tree_root: &Path) -> Result<StatusReport> {
    let config = load_config(&tree_root.join(CONFIG_FILENAME))?;
    collect_status_with(tree_root, &config)
}

pub fn collect_status_with(tree_root: &Path, config: &SyncConfig) -> Result<StatusReport> {
    let content_root = config.content_root(tree_root);
    let mut ignore = config.ignore.clone();
    if !ignore.iter().any(|entry| entry == MIRROR_DIR_NAME) {
        ignore.push(MIRROR_DIR_NAME.to_string());
    }
    let documents = scan_documents(&content_root, &ignore)?;

    let mut statuses = Vec::with_capacity(documents.len());
    let mut with_page_id = 0usize;
    for document in &documents {
        let page_id = document.frontmatter.page_id();
        if page_id.is_some() {
            with_page_id += 1;
        }
        statuses.push(DocumentStatus {
            relative_path: document.relative_path.clone(),
            title: document
                .frontmatter
                .title()
                .unwrap_or_else(|| file_stem(&document.relative_path)),
            page_id,
            space_key: document.frontmatter.space_key(),
            publish: document.frontmatter.publish(),
            content_type: document.frontmatter.content_type().as_str().to_string(),
        });
    }

    Ok(StatusReport {
        total: documents.len(),
        with_page_id,
        without_page_id: documents.len() - with_page_id,
        documents: statuses,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::config::SyncConfig;

    use super::collect_status_with;

    #[test]
    fn status_reports_publish_state_per_document() {
        let temp = tempdir().expect("tempdir");
        fs::write(
            temp.path().join("a.md"),
            "---\npage-id: 100\ntitle: Alpha\nspace-key: DOC\n---\n\n# A\n",
        )
        .expect("write a");
        fs::write(
            temp.path().join("b.md"),
            "---\nblog-post-date: 2024-06-01\n---\n\n# B\n",
        )
        .expect("write b");

        let report =
            collect_status_with(temp.path(), &SyncConfig::default()).expect("status");
        assert_eq!(report.total, 2);
        assert_eq!(report.with_page_id, 1);
        assert_eq!(report.without_page_id, 1);

        let alpha = &report.documents[0];
        assert_eq!(alpha.relative_path, "a.md");
        assert_eq!(alpha.title, "Alpha");
        assert_eq!(alpha.page_id.as_deref(), Some("100"));
        assert_eq!(alpha.content_type, "page");

        let post = &report.documents[1];
        assert_eq!(post.title, "b");
        assert_eq!(post.page_id, None);
        assert_eq!(post.content_type, "blogpost");
    }

    #[test]
    fn status_never_descends_into_the_mirror() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join(".confsync_mirror")).expect("create mirror");
        fs::write(temp.path().join("a.md"), "# A\n").expect("write a");
        fs::write(temp.path().join(".confsync_mirror/a.md"), "# mirrored\n")
            .expect("write mirrored");

        let report =
            collect_status_with(temp.path(), &SyncConfig::default()).expect("status");
        assert_eq!(report.total, 1);
    }
}
