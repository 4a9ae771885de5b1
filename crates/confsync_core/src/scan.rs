use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::frontmatter::{self, Frontmatter};
use crate::pathutil::{DOC_EXTENSION, normalize};

/// One markdown document, described once per traversal so the map-build and
/// rewrite passes operate on an explicit in-memory list instead of
/// re-walking the tree.
#[derive(Debug, Clone)]
pub struct Document {
    /// Normalized path relative to the scanned root.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// Walk `root` and parse every document into a descriptor. Directories whose
/// name appears in `ignore` are not descended into. Results are sorted by
/// relative path so downstream first-write-wins behavior is deterministic.
pub fn scan_documents(root: &Path, ignore: &[String]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !ignore.iter().any(|ignored| ignored == name.as_ref())
    }) {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !path
            .to_string_lossy()
            .ends_with(DOC_EXTENSION)
        {
            continue;
        }
        let relative = path.strip_prefix(root).with_context(|| {
            format!(
                "failed to derive relative path from {} for {}",
                root.display(),
                path.display()
            )
        })?;
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed = frontmatter::parse(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        documents.push(Document {
            relative_path: normalize(&relative.to_string_lossy()),
            absolute_path: path.to_path_buf(),
            frontmatter: parsed.frontmatter,
            body: parsed.body,
        });
    }
    documents.sort_by(|left, right| left.relative_path.cmp(&right.relative_path));
    Ok(documents)
}
