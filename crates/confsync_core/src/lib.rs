//! Reference-resolution and two-phase synchronization engine for a tree of
//! interlinked markdown documents published to a remote wiki.
//!
//! A document's outbound links cannot become wiki URLs until the target has
//! been published and assigned an identifier, but publishing covers the whole
//! tree at once. The engine mirrors the tree, publishes once, merges the
//! assigned identifiers back into the source frontmatter, and publishes a
//! second time with forward references resolved.

pub mod config;
pub mod frontmatter;
pub mod idmap;
pub mod links;
pub mod mirror;
pub mod pathutil;
pub mod publish;
pub mod scan;
pub mod status;
pub mod sync;
