use std::{
    io::Write,
    path::{Path, PathBuf},
};

use log::debug;

use super::{Backend, BuildArgs};
use crate::{artifact::BazelArtifact, bazel, context::Context, docker::Docker, Result};

/// Builds a `.tar` image target with bazel and loads the tarball into the docker daemon.
pub struct BazelBackend {
    pub docker: Docker,
    pub push: bool,
}

impl Backend<BazelArtifact> for BazelBackend {
    fn build(
        &self,
        ctx: &Context,
        out: &mut dyn Write,
        args: BuildArgs<'_, BazelArtifact>,
    ) -> Result<String> {
        let BuildArgs {
            workspace,
            spec,
            tag,
        } = args;

        let tar_path = bazel::tar_path(&spec.target)?;
        bazel::build(ctx, out, workspace, &spec.target, &spec.args)?;
        let tarball = bazel::bazel_bin(ctx, workspace)?.join(tar_path);
        debug!("loading {}", tarball.display());

        let image_id = self.docker.load(ctx, &tarball)?;
        self.docker.tag(ctx, &image_id, tag)?;
        if self.push {
            self.docker.push(ctx, out, tag)
        } else {
            Ok(image_id)
        }
    }

    fn dependencies(
        &self,
        ctx: &Context,
        workspace: &Path,
        spec: &BazelArtifact,
    ) -> Result<Vec<PathBuf>> {
        bazel::dependencies(ctx, workspace, &spec.target)
    }
}
