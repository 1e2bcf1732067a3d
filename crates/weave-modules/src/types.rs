//! Repository data types.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use weave_core::types::ModuleKind;

use crate::predicate::Predicate;

/// A guidance module loaded from the prompts directory.
#[derive(Debug, Clone)]
pub struct PromptModule {
    /// Identity: path relative to the prompts directory, forward slashes
    /// (`domains/filesystem.md`). Unique within a snapshot.
    pub id: String,
    /// Listing name: path under the kind subtree with the extension stripped
    /// (`filesystem`). Hints address modules by this name.
    pub name: String,
    /// Behavior or domain, derived from the subtree.
    pub kind: ModuleKind,
    /// Render order within a kind; lower first.
    pub priority: i32,
    /// Trigger gate evaluated by the selector.
    pub predicate: Predicate,
    /// Verbatim markdown body (header stripped).
    pub body: String,
}

/// Stat fingerprint for one scanned file, for cheap change detection.
///
/// Stamps cover every candidate `.md` file, including ones whose headers
/// failed to parse, so fixing a broken file invalidates a reused snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    /// Identity the file loads under.
    pub id: String,
    /// File size in bytes.
    pub len: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Error encountered while loading one module file.
///
/// Always recoverable: the module is skipped and the rest of the load
/// proceeds.
#[derive(Debug, Clone)]
pub struct ModuleScanError {
    /// Path of the problematic file.
    pub path: String,
    /// What went wrong.
    pub message: String,
}

/// Immutable, content-hashed set of modules loaded from one directory.
///
/// Snapshots are cheap to clone behind an `Arc` and are never mutated;
/// reloading installs a new snapshot.
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    root: PathBuf,
    modules: Vec<PromptModule>,
    stamps: Vec<FileStamp>,
    content_hash: String,
}

impl RepositorySnapshot {
    pub(crate) fn new(
        root: PathBuf,
        modules: Vec<PromptModule>,
        stamps: Vec<FileStamp>,
        content_hash: String,
    ) -> Self {
        Self {
            root,
            modules,
            stamps,
            content_hash,
        }
    }

    /// The prompts directory this snapshot was loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All modules, sorted by identity.
    pub fn modules(&self) -> &[PromptModule] {
        &self.modules
    }

    /// Look up one module by identity.
    pub fn get(&self, id: &str) -> Option<&PromptModule> {
        self.modules
            .binary_search_by(|module| module.id.as_str().cmp(id))
            .ok()
            .map(|index| &self.modules[index])
    }

    /// SHA-256 over every module's identity and raw bytes; the repository's
    /// cache-invalidation key.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Stat fingerprints of every scanned candidate file.
    pub fn stamps(&self) -> &[FileStamp] {
        &self.stamps
    }

    /// Number of loaded modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True when no modules loaded.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Outcome of loading a prompts directory: the snapshot plus any per-file
/// errors that were recovered along the way.
#[derive(Debug, Clone)]
pub struct RepositoryScan {
    /// The loaded snapshot.
    pub snapshot: RepositorySnapshot,
    /// Files skipped as "module unavailable".
    pub errors: Vec<ModuleScanError>,
}
