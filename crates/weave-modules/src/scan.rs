//! Prompts-directory scanning and snapshot construction.
//!
//! Layout consumed: `<dir>/domains/**/*.md` and `<dir>/behaviors/**/*.md`. A
//! missing subtree is an empty category; a missing root is an error. One
//! malformed module never blocks a load — it is skipped, logged, and reported
//! in the scan result.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;
use weave_core::types::ModuleKind;

use crate::header::parse_module_file;
use crate::types::{FileStamp, ModuleScanError, PromptModule, RepositoryScan, RepositorySnapshot};

/// Why a prompts directory could not be loaded at all.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The directory root does not exist or is not a directory.
    #[error("prompts directory not found: {path}")]
    RootNotFound {
        /// The missing path.
        path: String,
    },
}

/// Load and parse every module under a prompts directory.
pub fn load_repository(dir: &Path) -> Result<RepositoryScan, RepositoryError> {
    ensure_root(dir)?;

    let mut loaded: Vec<(PromptModule, String)> = Vec::new();
    let mut stamps = Vec::new();
    let mut errors = Vec::new();

    for kind in [ModuleKind::Behavior, ModuleKind::Domain] {
        scan_subtree(dir, kind, &mut loaded, &mut stamps, &mut errors);
    }

    loaded.sort_by(|a, b| a.0.id.cmp(&b.0.id));
    stamps.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = Sha256::new();
    for (module, raw) in &loaded {
        hasher.update(module.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(raw.as_bytes());
        hasher.update([0u8]);
    }
    let content_hash = format!("{:x}", hasher.finalize());

    let modules: Vec<PromptModule> = loaded.into_iter().map(|(module, _)| module).collect();
    debug!(
        dir = %dir.display(),
        modules = modules.len(),
        skipped = errors.len(),
        "loaded prompts directory"
    );

    Ok(RepositoryScan {
        snapshot: RepositorySnapshot::new(dir.to_path_buf(), modules, stamps, content_hash),
        errors,
    })
}

/// List module names under one kind's subtree, sorted ascending.
///
/// Listing is directory introspection, not validation: files whose headers
/// would fail to parse still appear.
pub fn list_modules(dir: &Path, kind: ModuleKind) -> Result<Vec<String>, RepositoryError> {
    ensure_root(dir)?;
    let subtree = dir.join(kind.subtree());
    let mut names = Vec::new();
    for path in markdown_files(&subtree) {
        if let Some(name) = relative_name(&subtree, &path) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// List domain module names.
pub fn list_domains(dir: &Path) -> Result<Vec<String>, RepositoryError> {
    list_modules(dir, ModuleKind::Domain)
}

/// List behavior module names.
pub fn list_behaviors(dir: &Path) -> Result<Vec<String>, RepositoryError> {
    list_modules(dir, ModuleKind::Behavior)
}

/// Stat every candidate module file without parsing, for change detection.
///
/// Returns stamps in the same identity order as
/// [`RepositorySnapshot::stamps`], so equality means "nothing changed".
pub fn stat_stamps(dir: &Path) -> Result<Vec<FileStamp>, RepositoryError> {
    ensure_root(dir)?;
    let mut stamps = Vec::new();
    for kind in [ModuleKind::Behavior, ModuleKind::Domain] {
        let subtree = dir.join(kind.subtree());
        for path in markdown_files(&subtree) {
            let Some(id) = relative_id(dir, &path) else {
                continue;
            };
            if let Some(stamp) = stat_file(id, &path) {
                stamps.push(stamp);
            }
        }
    }
    stamps.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(stamps)
}

fn ensure_root(dir: &Path) -> Result<(), RepositoryError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(RepositoryError::RootNotFound {
            path: dir.display().to_string(),
        })
    }
}

fn scan_subtree(
    root: &Path,
    kind: ModuleKind,
    loaded: &mut Vec<(PromptModule, String)>,
    stamps: &mut Vec<FileStamp>,
    errors: &mut Vec<ModuleScanError>,
) {
    let subtree = root.join(kind.subtree());
    if !subtree.is_dir() {
        return;
    }

    for path in markdown_files(&subtree) {
        let Some(id) = relative_id(root, &path) else {
            warn!(path = %path.display(), "skipping module with non-UTF-8 path");
            continue;
        };
        let Some(name) = relative_name(&subtree, &path) else {
            continue;
        };

        if let Some(stamp) = stat_file(id.clone(), &path) {
            stamps.push(stamp);
        }

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable module");
                errors.push(ModuleScanError {
                    path: id,
                    message: e.to_string(),
                });
                continue;
            }
        };

        match parse_module_file(&raw) {
            Ok(parsed) => loaded.push((
                PromptModule {
                    id,
                    name,
                    kind,
                    priority: parsed.priority,
                    predicate: parsed.predicate,
                    body: parsed.body,
                },
                raw,
            )),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping module with invalid header");
                errors.push(ModuleScanError {
                    path: id,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Deterministic, name-sorted walk of a subtree's `.md` files.
fn markdown_files(subtree: &Path) -> Vec<PathBuf> {
    if !subtree.is_dir() {
        return Vec::new();
    }
    WalkDir::new(subtree)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        })
        .collect()
}

fn stat_file(id: String, path: &Path) -> Option<FileStamp> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to stat module file");
            return None;
        }
    };
    Some(FileStamp {
        id,
        len: metadata.len(),
        modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    })
}

/// Path relative to the prompts directory, forward-slash separated.
fn relative_id(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_str()?.to_string());
    }
    Some(parts.join("/"))
}

/// Path relative to the kind subtree with the extension stripped.
fn relative_name(subtree: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(subtree).ok()?.with_extension("");
    let mut parts = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_str()?.to_string());
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    fn write_module(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample_repo() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write_module(
            tmp.path(),
            "behaviors/planning.md",
            "---\npriority: 10\nmin_complexity: medium\n---\nPlan before acting.\n",
        );
        write_module(tmp.path(), "behaviors/concise.md", "Keep answers short.\n");
        write_module(
            tmp.path(),
            "domains/filesystem.md",
            "---\npriority: 20\nrequires_tags: filesystem\n---\nMind file permissions.\n",
        );
        tmp
    }

    // -- load_repository --

    #[test]
    fn test_load_parses_all_modules() {
        let tmp = sample_repo();
        let scan = load_repository(tmp.path()).unwrap();
        assert!(scan.errors.is_empty());
        assert_eq!(scan.snapshot.len(), 3);

        let ids: Vec<&str> = scan
            .snapshot
            .modules()
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec![
                "behaviors/concise.md",
                "behaviors/planning.md",
                "domains/filesystem.md"
            ]
        );

        let planning = scan.snapshot.get("behaviors/planning.md").unwrap();
        assert_eq!(planning.kind, ModuleKind::Behavior);
        assert_eq!(planning.name, "planning");
        assert_eq!(planning.priority, 10);
        assert_eq!(planning.body, "Plan before acting.\n");
    }

    #[test]
    fn test_malformed_module_is_skipped_not_fatal() {
        let tmp = sample_repo();
        write_module(
            tmp.path(),
            "domains/broken.md",
            "---\npriority: not-a-number\n---\nbody\n",
        );

        let scan = load_repository(tmp.path()).unwrap();
        assert_eq!(scan.snapshot.len(), 3);
        assert_eq!(scan.errors.len(), 1);
        assert_eq!(scan.errors[0].path, "domains/broken.md");
        assert!(scan.errors[0].message.contains("priority"));
        // The broken file still stamps, so fixing it is detectable.
        assert!(
            scan.snapshot
                .stamps()
                .iter()
                .any(|s| s.id == "domains/broken.md")
        );
    }

    #[test]
    fn test_missing_subtree_is_empty_category() {
        let tmp = TempDir::new().unwrap();
        write_module(tmp.path(), "behaviors/one.md", "text\n");

        let scan = load_repository(tmp.path()).unwrap();
        assert_eq!(scan.snapshot.len(), 1);
        assert!(scan.errors.is_empty());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let result = load_repository(Path::new("/nonexistent/prompts"));
        assert_matches!(result, Err(RepositoryError::RootNotFound { .. }));
    }

    #[test]
    fn test_content_hash_tracks_content() {
        let tmp = sample_repo();
        let first = load_repository(tmp.path()).unwrap();
        let second = load_repository(tmp.path()).unwrap();
        assert_eq!(first.snapshot.content_hash(), second.snapshot.content_hash());

        write_module(
            tmp.path(),
            "behaviors/concise.md",
            "Keep answers short and direct.\n",
        );
        let third = load_repository(tmp.path()).unwrap();
        assert_ne!(first.snapshot.content_hash(), third.snapshot.content_hash());
    }

    #[test]
    fn test_non_markdown_files_ignored() {
        let tmp = sample_repo();
        write_module(tmp.path(), "domains/readme.txt", "not a module");
        write_module(tmp.path(), "domains/notes", "not a module");

        let scan = load_repository(tmp.path()).unwrap();
        assert_eq!(scan.snapshot.len(), 3);
    }

    #[test]
    fn test_nested_modules_load_with_nested_identity() {
        let tmp = sample_repo();
        write_module(tmp.path(), "domains/code/rust.md", "Rust guidance.\n");

        let scan = load_repository(tmp.path()).unwrap();
        let module = scan.snapshot.get("domains/code/rust.md").unwrap();
        assert_eq!(module.name, "code/rust");
    }

    // -- listings --

    #[test]
    fn test_list_domains_sorted() {
        let tmp = sample_repo();
        write_module(tmp.path(), "domains/api.md", "API guidance.\n");
        let names = list_domains(tmp.path()).unwrap();
        assert_eq!(names, vec!["api", "filesystem"]);
    }

    #[test]
    fn test_list_behaviors_sorted() {
        let tmp = sample_repo();
        let names = list_behaviors(tmp.path()).unwrap();
        assert_eq!(names, vec!["concise", "planning"]);
    }

    #[test]
    fn test_list_includes_unparsable_files() {
        let tmp = sample_repo();
        write_module(tmp.path(), "domains/broken.md", "---\nnever closed\n");
        let names = list_domains(tmp.path()).unwrap();
        assert_eq!(names, vec!["broken", "filesystem"]);
    }

    #[test]
    fn test_list_missing_subtree_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(list_domains(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_list_missing_root_is_an_error() {
        assert_matches!(
            list_domains(Path::new("/nonexistent/prompts")),
            Err(RepositoryError::RootNotFound { .. })
        );
    }

    // -- stamps --

    #[test]
    fn test_stamps_match_between_stat_and_load() {
        let tmp = sample_repo();
        let scan = load_repository(tmp.path()).unwrap();
        let stamps = stat_stamps(tmp.path()).unwrap();
        assert_eq!(scan.snapshot.stamps(), stamps.as_slice());
    }

    #[test]
    fn test_stamps_change_when_file_changes() {
        let tmp = sample_repo();
        let before = stat_stamps(tmp.path()).unwrap();
        write_module(
            tmp.path(),
            "behaviors/concise.md",
            "Keep answers short. Always.\n",
        );
        let after = stat_stamps(tmp.path()).unwrap();
        assert_ne!(before, after);
    }
}
