use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::config::{self, CONFIG_FILENAME, MIRROR_DIR_NAME, SyncConfig};
use crate::frontmatter::{
    self, KEY_DONT_CHANGE_PARENT, KEY_PAGE_ID, KEY_PUBLISH, KEY_SPACE_KEY, KEY_TITLE,
};
use crate::idmap::{self, PublishedPage};
use crate::links::{LinkTarget, rewrite_links};
use crate::mirror::{build_mirror, remove_mirror};
use crate::pathutil::file_stem;
use crate::publish::{CommandPublisher, Publisher};
use crate::scan::scan_documents;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Build the mirror and rewrite references, but skip both publish
    /// invocations and the identifier merge into the source tree.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Documents the publisher reported as successfully published.
    pub published: usize,
    /// Documents that received their identifier during this run.
    pub new_ids: usize,
    /// Links rewritten to wiki URLs across both passes.
    pub links_rewritten: usize,
    /// Whether forward references forced a second publish.
    pub second_pass: bool,
    pub dry_run: bool,
    pub warnings: Vec<String>,
}

/// Everything one run operates on, threaded explicitly through each step.
#[derive(Debug, Clone)]
struct SyncContext {
    tree_root: PathBuf,
    content_root: PathBuf,
    mirror_dir: PathBuf,
    config_path: PathBuf,
    config: SyncConfig,
}

/// Run one two-phase synchronization cycle with the publisher configured in
/// `confsync.toml`.
pub fn run_sync(tree_root: &Path, options: &SyncOptions) -> Result<SyncReport> {
    let config = config::load_config(&tree_root.join(CONFIG_FILENAME))?;
    let publisher = CommandPublisher::new(config.publish_command())
        .with_credentials(config.username(), config.api_token());
    run_sync_with(tree_root, &publisher, options)
}

/// Run one cycle against an explicit publisher. The configuration file and
/// the mirror directory are exclusively owned here: the config is restored to
/// its pre-run bytes and the mirror removed on every exit, success or
/// failure.
pub fn run_sync_with(
    tree_root: &Path,
    publisher: &dyn Publisher,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let config_path = tree_root.join(CONFIG_FILENAME);
    let mut config = config::load_config(&config_path)?;
    // Configuration errors surface before anything is mutated.
    config.base_url()?;
    config.space_key()?;

    // Durable normalization, applied ahead of the restore snapshot: the
    // publisher must never descend into the mirror or attachment trees.
    let attachments_dir = config.attachments_dir().to_string();
    config::ensure_ignores(&config_path, &[MIRROR_DIR_NAME, &attachments_dir])?;
    for entry in [MIRROR_DIR_NAME.to_string(), attachments_dir] {
        if !config.ignore.contains(&entry) {
            config.ignore.push(entry);
        }
    }

    let original_config = fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let context = SyncContext {
        tree_root: tree_root.to_path_buf(),
        content_root: config.content_root(tree_root),
        mirror_dir: tree_root.join(MIRROR_DIR_NAME),
        config_path,
        config,
    };

    let outcome = run_cycle(&context, publisher, options);
    finish(&context, &original_config, outcome)
}

/// Unconditional cleanup: restore the configuration bytes and remove the
/// mirror, then hand back the cycle's outcome. A failed mirror removal is a
/// warning and never masks the run's result; a failed config restore on an
/// otherwise successful run is an error, since the restore is the durability
/// guarantee.
fn finish(
    context: &SyncContext,
    original_config: &str,
    outcome: Result<SyncReport>,
) -> Result<SyncReport> {
    let restore = fs::write(&context.config_path, original_config).with_context(|| {
        format!(
            "failed to restore configuration {}",
            context.config_path.display()
        )
    });
    let mut cleanup_warnings = Vec::new();
    if let Err(error) = remove_mirror(&context.mirror_dir) {
        cleanup_warnings.push(format!("mirror cleanup failed: {error:#}"));
    }
    for warning in &cleanup_warnings {
        eprintln!("warning: {warning}");
    }

    match outcome {
        Ok(mut report) => {
            restore?;
            report.warnings.extend(cleanup_warnings);
            Ok(report)
        }
        Err(error) => {
            if let Err(restore_error) = restore {
                eprintln!("warning: {restore_error:#}");
            }
            Err(error)
        }
    }
}

fn run_cycle(
    context: &SyncContext,
    publisher: &dyn Publisher,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let mut report = SyncReport {
        dry_run: options.dry_run,
        ..SyncReport::default()
    };

    // Phase one: mirror the tree, point the publisher at the mirror, and
    // resolve whatever references the existing frontmatter already can.
    // Documents with no prior identifiers simply keep their local links.
    config::repoint_publish_root(&context.config_path, MIRROR_DIR_NAME)?;
    // A mirror left behind by an interrupted run is discarded, never reused.
    remove_mirror(&context.mirror_dir)?;
    build_mirror(&context.content_root, &context.mirror_dir, &context.mirror_dir)?;
    report.links_rewritten += rewrite_pass(context, &[])?;
    if options.dry_run {
        return Ok(report);
    }

    let first_output = publisher.publish(&context.tree_root)?;
    let pages = idmap::parse_publish_output(&first_output);
    report.published = pages.len();
    report.new_ids = merge_identifiers(context, &pages, &mut report.warnings)?;
    if report.new_ids == 0 {
        return Ok(report);
    }

    // Phase two: the source tree now carries every identifier, so a fresh
    // mirror resolves the forward references the first pass could not.
    report.second_pass = true;
    remove_mirror(&context.mirror_dir)?;
    build_mirror(&context.content_root, &context.mirror_dir, &context.mirror_dir)?;
    report.links_rewritten += rewrite_pass(context, &pages)?;
    let second_output = publisher.publish(&context.tree_root)?;

    // Two passes suffice unless the second publish itself minted an
    // identifier. Flag that instead of silently under-resolving.
    for page in idmap::parse_publish_output(&second_output) {
        let original = context.content_root.join(&page.relative_path);
        // Paths with no source document were already flagged by the merge.
        if !original.exists() {
            continue;
        }
        let has_id = fs::read_to_string(&original)
            .ok()
            .and_then(|text| frontmatter::parse(&text).ok())
            .is_some_and(|parsed| parsed.frontmatter.page_id().is_some());
        if !has_id {
            report.warnings.push(format!(
                "page id {} for {} was first reported by the second publish; \
                 references to it stay unresolved until the next run",
                page.page_id, page.relative_path
            ));
        }
    }
    Ok(report)
}

/// Scan the mirror, build the identifier map from its frontmatter plus any
/// identifiers the publisher already reported, and rewrite every document
/// whose links resolve. Frontmatter entries take precedence; the publisher
/// output covers documents whose frontmatter merge could not land (a path
/// missing from the source tree still resolves as a link target). Only
/// changed documents are written back.
fn rewrite_pass(context: &SyncContext, published: &[PublishedPage]) -> Result<usize> {
    let documents = scan_documents(&context.mirror_dir, &context.config.ignore)?;
    let mut map = idmap::from_documents(&documents);
    idmap::extend_from_publish(&mut map, published);
    let target = LinkTarget {
        base_url: context.config.base_url()?,
        default_space_key: context.config.space_key()?,
    };

    let mut total = 0usize;
    for document in &documents {
        let (body, count) = rewrite_links(&document.body, &map, &document.relative_path, &target);
        if count == 0 {
            continue;
        }
        total += count;
        let text = frontmatter::serialize(&document.frontmatter, &body)?;
        fs::write(&document.absolute_path, text)
            .with_context(|| format!("failed to write {}", document.absolute_path.display()))?;
    }
    Ok(total)
}

/// Merge freshly assigned identifiers into the *original* tree's
/// frontmatter. Only documents without a prior identifier are touched: a
/// document that already carries `page-id` keeps its frontmatter exactly as
/// the user wrote it, `dont-change-parent` included. Bodies are untouched;
/// the mirror is the only place links are rewritten. Returns how many
/// documents received an identifier.
fn merge_identifiers(
    context: &SyncContext,
    pages: &[PublishedPage],
    warnings: &mut Vec<String>,
) -> Result<usize> {
    let mut new_ids = 0usize;
    for page in pages {
        let original = context.content_root.join(&page.relative_path);
        if !original.exists() {
            warnings.push(format!(
                "publisher reported {} which does not exist in the source tree",
                page.relative_path
            ));
            continue;
        }
        let text = fs::read_to_string(&original)
            .with_context(|| format!("failed to read {}", original.display()))?;
        let parsed = frontmatter::parse(&text)
            .with_context(|| format!("failed to parse {}", original.display()))?;
        if parsed.frontmatter.page_id().is_some() {
            continue;
        }
        new_ids += 1;

        let mut data = Mapping::new();
        data.insert(
            Value::String(KEY_PAGE_ID.to_string()),
            page_id_value(&page.page_id),
        );
        data.insert(Value::String(KEY_PUBLISH.to_string()), Value::Bool(true));
        data.insert(
            Value::String(KEY_SPACE_KEY.to_string()),
            Value::String(page.space_key.clone()),
        );
        data.insert(
            Value::String(KEY_DONT_CHANGE_PARENT.to_string()),
            Value::Bool(false),
        );
        if parsed.frontmatter.title().is_none() {
            data.insert(
                Value::String(KEY_TITLE.to_string()),
                Value::String(file_stem(&page.relative_path)),
            );
        }

        let updated = frontmatter::update(&text, &data)
            .with_context(|| format!("failed to update {}", original.display()))?;
        fs::write(&original, updated)
            .with_context(|| format!("failed to write {}", original.display()))?;
    }
    Ok(new_ids)
}

fn page_id_value(page_id: &str) -> Value {
    match page_id.parse::<u64>() {
        Ok(number) => Value::Number(number.into()),
        Err(_) => Value::String(page_id.to_string()),
    }
}
