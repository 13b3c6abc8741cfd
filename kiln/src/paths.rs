use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use walkdir::WalkDir;

/// Resolves every path against `workspace`. Paths that are already absolute are kept as is.
pub fn absolute_paths(workspace: &Path, paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let root = std::path::absolute(workspace).unwrap_or_else(|_| workspace.to_owned());
    paths
        .into_iter()
        .map(|path| {
            if path.is_absolute() {
                path
            } else {
                root.join(path)
            }
        })
        .collect()
}

/// Removes `.` components and a leading root so the path can be joined onto a build context.
pub fn context_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| matches!(component, Component::Normal(_) | Component::ParentDir))
        .collect()
}

/// Returns `path` if it names a file below `root`, or every file underneath it if it names a
/// directory. Symbolic links are followed. Returned paths are relative to `root` unless `path` is
/// absolute.
pub fn files_under(root: &Path, path: &Path) -> io::Result<Vec<PathBuf>> {
    let full = root.join(path);
    let metadata = fs::metadata(&full).map_err(|error| {
        io::Error::new(
            error.kind(),
            format!("failed to access {}: {error}", full.display()),
        )
    })?;
    if !metadata.is_dir() {
        return Ok(vec![path.to_owned()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&full)
        .follow_links(true)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(&full) {
            files.push(path.join(relative));
        }
    }
    Ok(files)
}
