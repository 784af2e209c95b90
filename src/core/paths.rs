//! Path normalization shared by config loading and link classification.
//!
//! Everything here is purely syntactic: link targets under a dead mount no
//! longer exist, so `fs::canonicalize` cannot be used to normalize them.

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without touching the filesystem.
///
/// `..` at the root is dropped (`/../foo` → `/foo`). Leading `..` on a
/// relative path is kept, since there is nothing to pop.
pub fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(..)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => {
                    components.push(component);
                }
            },
        }
    }
    components.into_iter().collect()
}

/// Absolute, normalized form of a symlink's immediate target.
///
/// Relative targets are interpreted against the directory containing the
/// link, which is how the kernel resolves them.
pub fn absolute_link_target(link_path: &Path, raw_target: &Path) -> PathBuf {
    if raw_target.is_absolute() {
        return normalize_syntactic(raw_target);
    }
    let base = link_path.parent().unwrap_or_else(|| Path::new("/"));
    normalize_syntactic(&base.join(raw_target))
}

/// Whether `inner` lies strictly inside, or is equal to, `outer`.
///
/// Comparison is component-wise: `/mnt/ad10` is not inside `/mnt/ad1`.
pub fn is_within(inner: &Path, outer: &Path) -> bool {
    inner.starts_with(outer)
}
