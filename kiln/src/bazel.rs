use std::{
    ffi::OsStr,
    io::Write,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{context::Context, process, Result};

fn bazel(workspace: &Path) -> process::Command {
    process::Command::new("bazel").current_dir(workspace)
}

pub fn build(
    ctx: &Context,
    out: &mut dyn Write,
    workspace: &Path,
    target: &str,
    args: &[String],
) -> Result<()> {
    process::args!(bazel(workspace), "build")
        .args(args.iter().map(OsStr::new))
        .args([OsStr::new(target)])
        .stream(ctx, out)?;
    Ok(())
}

/// Returns the directory bazel writes build outputs to.
pub fn bazel_bin(ctx: &Context, workspace: &Path) -> Result<PathBuf> {
    let output = process::args!(bazel(workspace), "info", "bazel-bin").output(ctx)?;
    Ok(PathBuf::from(output.stdout_str()?.trim()))
}

/// Returns the path of the image tarball produced by `target`, relative to the bazel-bin
/// directory.
pub fn tar_path(target: &str) -> Result<PathBuf> {
    if !target.ends_with(".tar") {
        return Err(format!("the bazel target {target:?} should end with .tar").into());
    }
    label_to_path(target).ok_or_else(|| format!("invalid bazel target {target:?}").into())
}

/// Lists the source files `target` depends on, relative to the workspace.
pub fn dependencies(ctx: &Context, workspace: &Path, target: &str) -> Result<Vec<PathBuf>> {
    let query = format!("kind('source file', deps('{target}'))");
    let output = process::args!(
        bazel(workspace),
        "query",
        query,
        "--noimplicit_deps",
        "--order_output=no",
        "--output=label",
    )
    .output(ctx)?;

    let mut dependencies = output
        .stdout_str()?
        .lines()
        .filter_map(label_to_path)
        .collect::<Vec<_>>();
    if workspace.join("WORKSPACE").exists() {
        dependencies.push(PathBuf::from("WORKSPACE"));
    }
    dependencies.sort();
    dependencies.dedup();
    debug!("{target} depends on {} files", dependencies.len());
    Ok(dependencies)
}

/// Converts a label of the main repository such as `//pkg/sub:file.go` to `pkg/sub/file.go`.
/// Labels of external repositories have no path in the workspace.
fn label_to_path(label: &str) -> Option<PathBuf> {
    let label = label.trim().strip_prefix("//")?;
    let (package, name) = match label.split_once(':') {
        Some((package, name)) => (package, name),
        // `//pkg/sub` is short for `//pkg/sub:sub`.
        None => (label, label.rsplit('/').next().unwrap_or(label)),
    };
    Some(Path::new(package).join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(
            label_to_path("//pkg/sub:file.go"),
            Some(PathBuf::from("pkg/sub/file.go"))
        );
        assert_eq!(label_to_path("//:BUILD"), Some(PathBuf::from("BUILD")));
        assert_eq!(
            label_to_path("//pkg/sub"),
            Some(PathBuf::from("pkg/sub/sub"))
        );
        assert_eq!(label_to_path("@io_bazel_rules_go//go:def.bzl"), None);
    }

    #[test]
    fn tar_paths() {
        assert_eq!(
            tar_path("//app:image.tar").unwrap(),
            PathBuf::from("app/image.tar")
        );
        assert!(tar_path("//app:image").is_err());
    }
}
