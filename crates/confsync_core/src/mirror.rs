use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Recursively copy every entry under `source` into `dest`, creating
/// directories as needed. Any entry whose path equals `exclude` is skipped
/// with its whole subtree, so a mirror is never nested inside itself. The
/// first unreadable source or unwritable destination aborts the copy.
/// Returns the number of files copied.
pub fn build_mirror(source: &Path, dest: &Path, exclude: &Path) -> Result<usize> {
    fs::create_dir_all(dest)
        .with_context(|| format!("failed to create mirror directory {}", dest.display()))?;

    // Compare resolved paths so the exclusion holds no matter how the caller
    // spelled the source (`.`-components, symlinked temp dirs).
    let source = source
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", source.display()))?;
    let exclude = if exclude.exists() {
        exclude
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", exclude.display()))?
    } else {
        exclude.to_path_buf()
    };

    let mut copied = 0usize;
    let walker = WalkDir::new(&source).follow_links(false).into_iter();
    for entry in walker.filter_entry(|entry| entry.path() != exclude) {
        let entry = entry.with_context(|| format!("failed to walk {}", source.display()))?;
        let path = entry.path();
        if path == source {
            continue;
        }
        let relative = path.strip_prefix(&source).with_context(|| {
            format!(
                "failed to derive relative path from {} for {}",
                source.display(),
                path.display()
            )
        })?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::copy(path, &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    path.display(),
                    target.display()
                )
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove a mirror directory if it exists.
pub fn remove_mirror(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    fs::remove_dir_all(dir)
        .with_context(|| format!("failed to remove mirror directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{build_mirror, remove_mirror};

    #[test]
    fn mirror_copies_nested_tree() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("tree");
        let dest = temp.path().join("tree/.mirror");
        fs::create_dir_all(source.join("docs/deep")).expect("create dirs");
        fs::write(source.join("a.md"), "a").expect("write a");
        fs::write(source.join("docs/b.md"), "b").expect("write b");
        fs::write(source.join("docs/deep/c.md"), "c").expect("write c");

        let copied = build_mirror(&source, &dest, &dest).expect("mirror");
        assert_eq!(copied, 3);
        assert_eq!(fs::read_to_string(dest.join("a.md")).expect("read"), "a");
        assert_eq!(
            fs::read_to_string(dest.join("docs/deep/c.md")).expect("read"),
            "c"
        );
    }

    #[test]
    fn mirror_excludes_itself() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("tree");
        let dest = source.join(".mirror");
        fs::create_dir_all(&dest).expect("create pre-existing mirror");
        fs::write(source.join("a.md"), "a").expect("write a");
        fs::write(dest.join("stale.md"), "stale").expect("write stale");

        build_mirror(&source, &dest, &dest).expect("mirror");
        assert!(dest.join("a.md").exists());
        assert!(!dest.join(".mirror").exists());
    }

    #[test]
    fn mirror_copies_non_document_assets() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("tree");
        let dest = temp.path().join("out");
        fs::create_dir_all(source.join("assets")).expect("create assets");
        fs::write(source.join("assets/logo.png"), [0u8, 1, 2]).expect("write asset");

        build_mirror(&source, &dest, &dest).expect("mirror");
        assert!(dest.join("assets/logo.png").exists());
    }

    #[test]
    fn remove_mirror_tolerates_missing_directory() {
        let temp = tempdir().expect("tempdir");
        remove_mirror(&temp.path().join("never-created")).expect("remove");
    }
}
