//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Make a path absolute without touching the filesystem.
///
/// Relative paths are joined onto the current working directory, then `.`
/// and `..` components are resolved syntactically. Symlinks are left alone so
/// that reported paths keep the names the user supplied.
pub fn absolutize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    normalize_syntactic(&absolute)
}

/// Split a comma-separated list of paths, dropping empty and blank entries.
///
/// An unset list flag arrives as `""`; it means "no paths", not "the path `""`".
pub fn split_path_list(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}
