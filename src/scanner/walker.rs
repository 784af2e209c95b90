//! Lazy depth-first walker yielding one [`ScanEntry`] per symlink.
//!
//! Safety invariants:
//! - Symlinks are leaves. A link to a directory is yielded, never descended.
//! - Real directories are descended in `read_dir` order (no sorting).
//! - A subdirectory that cannot be listed becomes a synthetic entry whose
//!   target state is `Unreachable`; the walk continues with its siblings.
//! - Bounded by `max_depth`. A directory past the bound is yielded as a
//!   synthetic `Unreachable` entry instead of being descended.
//! - Skips excluded paths and excluded names.
//!
//! The walker only reads. Nothing here mutates the tree, and the iterator
//! holds open directory handles, so callers must drain it before deleting.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::core::errors::{LswError, Result};
use crate::core::paths::absolute_link_target;

/// Walker configuration derived from `ScanConfig`.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Deepest directory level descended into; the root is level 0.
    pub max_depth: usize,
    pub excluded_paths: HashSet<PathBuf>,
    /// Matched against each entry's file name.
    pub exclude_patterns: Vec<Regex>,
}

impl WalkerConfig {
    pub fn unbounded() -> Self {
        Self {
            max_depth: usize::MAX,
            ..Self::default()
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.contains(path) {
            return true;
        }
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        self.exclude_patterns.iter().any(|re| re.is_match(&name))
    }
}

/// Result of statting a link's target through the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TargetState {
    Exists,
    Missing,
    /// The check itself failed (permission, dead FUSE transport, ELOOP, ...).
    Unreachable { error: String },
}

/// One symlink (or unlistable directory) found during the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub is_symlink: bool,
    /// Immediate target as stored in the link (one `readlink` hop).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,
    /// `target` made absolute against the link's directory and normalized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_target: Option<PathBuf>,
    pub target_state: TargetState,
}

impl ScanEntry {
    /// Read a symlink's target and stat through it.
    pub fn probe(path: PathBuf) -> Self {
        let raw = match fs::read_link(&path) {
            Ok(raw) => raw,
            Err(err) => {
                return Self {
                    path,
                    is_symlink: true,
                    target: None,
                    resolved_target: None,
                    target_state: TargetState::Unreachable {
                        error: format!("readlink failed: {err}"),
                    },
                };
            }
        };
        let resolved = absolute_link_target(&path, &raw);

        // Statting the link path lets the kernel resolve the full chain.
        let target_state = match fs::metadata(&path) {
            Ok(_) => TargetState::Exists,
            Err(err) if is_missing(&err) => TargetState::Missing,
            Err(err) => TargetState::Unreachable {
                error: err.to_string(),
            },
        };

        Self {
            path,
            is_symlink: true,
            target: Some(raw),
            resolved_target: Some(resolved),
            target_state,
        }
    }

    /// Synthetic entry for a directory that could not be listed.
    pub fn listing_failed(path: PathBuf, err: impl fmt::Display) -> Self {
        Self::not_walked(path, format!("cannot list directory: {err}"))
    }

    /// Synthetic entry for a directory pruned by `max_depth`.
    pub fn depth_limited(path: PathBuf, max_depth: usize) -> Self {
        Self::not_walked(path, format!("not descended: deeper than max_depth {max_depth}"))
    }

    fn not_walked(path: PathBuf, error: String) -> Self {
        Self {
            path,
            is_symlink: false,
            target: None,
            resolved_target: None,
            target_state: TargetState::Unreachable { error },
        }
    }

    pub fn target_exists(&self) -> bool {
        self.target_state == TargetState::Exists
    }
}

/// "Does not exist" as opposed to "could not be checked".
pub(crate) fn is_missing(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

struct DirFrame {
    path: PathBuf,
    entries: fs::ReadDir,
    depth: usize,
}

/// Single-pass iterator over the symlinks under one root.
///
/// Not restartable: call [`walk`] again for a fresh pass over the disk.
pub struct SymlinkWalker {
    config: WalkerConfig,
    stack: Vec<DirFrame>,
}

/// Start a walk at `root`.
///
/// The root itself must be a listable directory; that is the only failure
/// that aborts the walk.
pub fn walk(root: &Path, config: WalkerConfig) -> Result<SymlinkWalker> {
    let unavailable = |details: String| LswError::MediaDirUnavailable {
        path: root.to_path_buf(),
        details,
    };

    let meta = fs::metadata(root).map_err(|err| unavailable(err.to_string()))?;
    if !meta.is_dir() {
        return Err(unavailable("not a directory".to_string()));
    }
    let entries = fs::read_dir(root).map_err(|err| unavailable(err.to_string()))?;

    Ok(SymlinkWalker {
        config,
        stack: vec![DirFrame {
            path: root.to_path_buf(),
            entries,
            depth: 0,
        }],
    })
}

impl Iterator for SymlinkWalker {
    type Item = ScanEntry;

    fn next(&mut self) -> Option<ScanEntry> {
        loop {
            let (next, depth) = {
                let frame = self.stack.last_mut()?;
                (frame.entries.next(), frame.depth)
            };

            let entry = match next {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Err(err)) => {
                    // A failing ReadDir is abandoned rather than retried.
                    let frame = self.stack.pop()?;
                    return Some(ScanEntry::listing_failed(frame.path, &err));
                }
                Some(Ok(entry)) => entry,
            };

            let path = entry.path();
            if self.config.is_excluded(&path) {
                continue;
            }

            // file_type() does not follow symlinks.
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(err) => return Some(ScanEntry::listing_failed(path, &err)),
            };

            if file_type.is_symlink() {
                return Some(ScanEntry::probe(path));
            }

            if file_type.is_dir() {
                let child_depth = depth + 1;
                if child_depth > self.config.max_depth {
                    return Some(ScanEntry::depth_limited(path, self.config.max_depth));
                }
                match fs::read_dir(&path) {
                    Ok(entries) => self.stack.push(DirFrame {
                        path,
                        entries,
                        depth: child_depth,
                    }),
                    Err(err) => return Some(ScanEntry::listing_failed(path, &err)),
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::{PermissionsExt, symlink};
    use tempfile::TempDir;

    fn paths(walker: SymlinkWalker) -> Vec<PathBuf> {
        walker.map(|e| e.path).collect()
    }

    #[test]
    fn yields_only_symlinks_recursively() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("movies/Film (2020)")).unwrap();
        fs::create_dir_all(root.join("shows/Show/S01")).unwrap();
        fs::write(root.join("movies/readme.txt"), b"plain file").unwrap();
        fs::write(root.join("real.mkv"), b"x").unwrap();

        symlink(root.join("real.mkv"), root.join("movies/Film (2020)/film.mkv")).unwrap();
        symlink("/mnt/ad1/gone.mkv", root.join("shows/Show/S01/e01.mkv")).unwrap();

        let mut found = paths(walk(root, WalkerConfig::unbounded()).unwrap());
        found.sort();
        assert_eq!(
            found,
            vec![
                root.join("movies/Film (2020)/film.mkv"),
                root.join("shows/Show/S01/e01.mkv"),
            ]
        );
    }

    #[test]
    fn symlinked_directory_is_a_leaf() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("media");
        let real = tmp.path().join("elsewhere");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&real).unwrap();
        symlink("/mnt/ad1/x.mkv", real.join("inner.mkv")).unwrap();
        symlink(&real, root.join("linked_dir")).unwrap();

        let found: Vec<ScanEntry> = walk(&root, WalkerConfig::unbounded()).unwrap().collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, root.join("linked_dir"));
        assert!(found[0].target_exists());
    }

    #[test]
    fn probe_records_target_state() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("present.mkv"), b"x").unwrap();
        symlink(root.join("present.mkv"), root.join("ok")).unwrap();
        symlink(root.join("absent.mkv"), root.join("dead")).unwrap();
        symlink("absent-relative.mkv", root.join("dead_rel")).unwrap();

        let ok = ScanEntry::probe(root.join("ok"));
        assert_eq!(ok.target_state, TargetState::Exists);
        assert_eq!(ok.target.as_deref(), Some(root.join("present.mkv").as_path()));

        let dead = ScanEntry::probe(root.join("dead"));
        assert_eq!(dead.target_state, TargetState::Missing);

        let dead_rel = ScanEntry::probe(root.join("dead_rel"));
        assert_eq!(dead_rel.target.as_deref(), Some(Path::new("absent-relative.mkv")));
        assert_eq!(
            dead_rel.resolved_target.as_deref(),
            Some(root.join("absent-relative.mkv").as_path())
        );
        assert_eq!(dead_rel.target_state, TargetState::Missing);
    }

    #[test]
    fn target_through_a_file_component_is_missing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("file"), b"x").unwrap();
        symlink(tmp.path().join("file/child.mkv"), tmp.path().join("link")).unwrap();

        let entry = ScanEntry::probe(tmp.path().join("link"));
        assert_eq!(entry.target_state, TargetState::Missing);
    }

    #[test]
    fn circular_chain_is_unreachable_not_missing() {
        let tmp = TempDir::new().unwrap();
        symlink(tmp.path().join("b"), tmp.path().join("a")).unwrap();
        symlink(tmp.path().join("a"), tmp.path().join("b")).unwrap();

        let entry = ScanEntry::probe(tmp.path().join("a"));
        assert!(
            matches!(entry.target_state, TargetState::Unreachable { .. }),
            "{:?}",
            entry.target_state
        );
    }

    #[test]
    fn respects_max_depth() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        symlink("/nowhere/1", root.join("top")).unwrap();
        symlink("/nowhere/2", root.join("a/one")).unwrap();
        symlink("/nowhere/3", root.join("a/b/two")).unwrap();

        let config = WalkerConfig {
            max_depth: 1,
            ..WalkerConfig::default()
        };
        let found: Vec<ScanEntry> = walk(root, config).unwrap().collect();
        let mut symlinks: Vec<PathBuf> = found
            .iter()
            .filter(|e| e.is_symlink)
            .map(|e| e.path.clone())
            .collect();
        symlinks.sort();
        assert_eq!(symlinks, vec![root.join("a/one"), root.join("top")]);

        let pruned: Vec<&ScanEntry> = found.iter().filter(|e| !e.is_symlink).collect();
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].path, root.join("a/b"));
        let TargetState::Unreachable { error } = &pruned[0].target_state else {
            panic!("pruned directory should be unreachable");
        };
        assert!(error.contains("max_depth 1"), "{error}");
    }

    #[test]
    fn skips_excluded_paths_and_names() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("@eaDir")).unwrap();
        fs::create_dir_all(root.join("skip")).unwrap();
        fs::create_dir_all(root.join("keep")).unwrap();
        symlink("/nowhere/a", root.join("@eaDir/thumb")).unwrap();
        symlink("/nowhere/b", root.join("skip/x")).unwrap();
        symlink("/nowhere/c", root.join("keep/x")).unwrap();
        symlink("/nowhere/d", root.join("keep/x.partial")).unwrap();

        let config = WalkerConfig {
            max_depth: 8,
            excluded_paths: HashSet::from([root.join("skip")]),
            exclude_patterns: vec![
                Regex::new("^@eaDir$").unwrap(),
                Regex::new(r"\.partial$").unwrap(),
            ],
        };
        assert_eq!(paths(walk(root, config).unwrap()), vec![root.join("keep/x")]);
    }

    #[test]
    fn root_must_be_a_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("file");
        fs::write(&file, b"x").unwrap();

        assert!(walk(&tmp.path().join("missing"), WalkerConfig::unbounded()).is_err());
        let err = walk(&file, WalkerConfig::unbounded()).err().unwrap();
        assert_eq!(err.code(), "LSW-1005");
    }

    #[test]
    fn unlistable_subdirectory_yields_synthetic_entry() {
        if nix::unistd::geteuid().is_root() {
            // Root bypasses directory permissions.
            return;
        }
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let locked = root.join("locked");
        fs::create_dir_all(&locked).unwrap();
        symlink("/nowhere/a", root.join("sibling")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let found: Vec<ScanEntry> = walk(root, WalkerConfig::unbounded()).unwrap().collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(found.len(), 2);
        let synthetic = found.iter().find(|e| e.path == locked).unwrap();
        assert!(!synthetic.is_symlink);
        assert!(matches!(synthetic.target_state, TargetState::Unreachable { .. }));
        assert!(found.iter().any(|e| e.path == root.join("sibling")));
    }

    #[test]
    fn walk_order_is_stable_for_unchanged_tree() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for dir in ["a", "b/c", "d"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        for (i, dir) in ["a", "b", "b/c", "d", "."].iter().enumerate() {
            symlink(format!("/nowhere/{i}"), root.join(dir).join(format!("l{i}"))).unwrap();
        }

        let first = paths(walk(root, WalkerConfig::unbounded()).unwrap());
        let second = paths(walk(root, WalkerConfig::unbounded()).unwrap());
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }
}
