use std::{
    ffi::OsStr,
    io::Write,
    path::{Path, PathBuf},
};

use super::{Backend, BuildArgs};
use crate::{
    artifact::{JibGradleArtifact, JibMavenArtifact},
    context::Context,
    jib, process, Result,
};

pub struct JibMavenBackend {
    pub push: bool,
}

fn maven(workspace: &Path, spec: &JibMavenArtifact) -> process::Command {
    let mut command = jib::tool(workspace, "mvnw", "mvn").args(spec.args.iter().map(OsStr::new));
    if let Some(profile) = &spec.profile {
        command = process::args!(command, "--activate-profiles", profile);
    }
    if let Some(module) = &spec.module {
        command = process::args!(command, "--projects", module);
    }
    command
}

impl Backend<JibMavenArtifact> for JibMavenBackend {
    fn build(
        &self,
        ctx: &Context,
        out: &mut dyn Write,
        args: BuildArgs<'_, JibMavenArtifact>,
    ) -> Result<String> {
        let BuildArgs {
            workspace,
            spec,
            tag,
        } = args;

        let goal = if self.push {
            "jib:build"
        } else {
            "jib:dockerBuild"
        };
        process::args!(
            maven(workspace, spec),
            "--batch-mode",
            "prepare-package",
            goal,
            format!("-Dimage={tag}"),
        )
        .stream(ctx, out)?;

        let module_dir = match &spec.module {
            Some(module) => workspace.join(module),
            None => workspace.to_owned(),
        };
        jib::read_image_output(&module_dir.join("target"), self.push)
    }

    fn dependencies(
        &self,
        ctx: &Context,
        workspace: &Path,
        spec: &JibMavenArtifact,
    ) -> Result<Vec<PathBuf>> {
        let output = process::args!(
            maven(workspace, spec),
            "--batch-mode",
            "--quiet",
            "jib:_skaffold-files-v2",
        )
        .output(ctx)?;

        jib::collect_dependencies(jib::parse_skaffold_files(output.stdout_str()?)?)
    }
}

pub struct JibGradleBackend {
    pub push: bool,
}

/// Qualifies `task` with the configured sub-project, if any.
fn gradle_task(spec: &JibGradleArtifact, task: &str) -> String {
    match &spec.project {
        Some(project) => format!(":{project}:{task}"),
        None => task.to_owned(),
    }
}

fn gradle(workspace: &Path, spec: &JibGradleArtifact) -> process::Command {
    jib::tool(workspace, "gradlew", "gradle").args(spec.args.iter().map(OsStr::new))
}

impl Backend<JibGradleArtifact> for JibGradleBackend {
    fn build(
        &self,
        ctx: &Context,
        out: &mut dyn Write,
        args: BuildArgs<'_, JibGradleArtifact>,
    ) -> Result<String> {
        let BuildArgs {
            workspace,
            spec,
            tag,
        } = args;

        let task = gradle_task(spec, if self.push { "jib" } else { "jibDockerBuild" });
        process::args!(gradle(workspace, spec), task, format!("--image={tag}")).stream(ctx, out)?;

        let project_dir = match &spec.project {
            Some(project) => workspace.join(project),
            None => workspace.to_owned(),
        };
        jib::read_image_output(&project_dir.join("build"), self.push)
    }

    fn dependencies(
        &self,
        ctx: &Context,
        workspace: &Path,
        spec: &JibGradleArtifact,
    ) -> Result<Vec<PathBuf>> {
        let task = gradle_task(spec, "_jibSkaffoldFilesV2");
        let output = process::args!(gradle(workspace, spec), task, "--quiet").output(ctx)?;

        jib::collect_dependencies(jib::parse_skaffold_files(output.stdout_str()?)?)
    }
}
