//! Helpers shared by the Maven and Gradle flavours of the Jib plugin.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{paths, process, Result};

/// Precedes the JSON document printed by the `_skaffold-files-v2` goals.
pub const JSON_MARKER: &str = "BEGIN JIB JSON";

/// The files reported by the plugin. `build` lists build definitions, `inputs` the files and
/// directories that end up in the image and `ignore` what should not be watched.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SkaffoldFiles {
    pub build: Vec<PathBuf>,
    pub inputs: Vec<PathBuf>,
    pub ignore: Vec<PathBuf>,
}

pub fn parse_skaffold_files(stdout: &str) -> Result<SkaffoldFiles> {
    let mut lines = stdout.lines().skip_while(|line| line.trim() != JSON_MARKER);
    lines
        .next()
        .ok_or("unable to find the jib output in the build tool output")?;
    let json = lines
        .next()
        .ok_or("the jib output is missing after the marker")?;
    Ok(serde_json::from_str(json)?)
}

/// Flattens the reported files into a sorted list of files, expanding directories and dropping
/// ignored paths.
pub fn collect_dependencies(files: SkaffoldFiles) -> Result<Vec<PathBuf>> {
    let SkaffoldFiles {
        build,
        inputs,
        ignore,
    } = files;

    let mut dependencies = build;
    for input in inputs {
        // Source directories are reported even when a project does not have them.
        if input.exists() {
            dependencies.extend(paths::files_under(Path::new(""), &input)?);
        }
    }
    dependencies.retain(|path| !ignore.iter().any(|ignored| path.starts_with(ignored)));
    dependencies.sort();
    dependencies.dedup();
    Ok(dependencies)
}

/// Reads what Jib wrote to `jib-image.digest` when pushing or to `jib-image.id` when building
/// into the local daemon.
pub fn read_image_output(output_dir: &Path, pushed: bool) -> Result<String> {
    let path = output_dir.join(if pushed {
        "jib-image.digest"
    } else {
        "jib-image.id"
    });
    let value = fs::read_to_string(&path)
        .map_err(|error| format!("failed to read jib output {}: {error}", path.display()))?;
    Ok(value.trim().to_owned())
}

/// Prefers the wrapper script checked into the workspace over the globally installed tool.
pub fn tool(workspace: &Path, wrapper: &str, fallback: &str) -> process::Command {
    let wrapper = workspace.join(wrapper);
    let program = if wrapper.is_file() {
        wrapper
    } else {
        PathBuf::from(fallback)
    };
    process::Command::new(program).current_dir(workspace)
}
