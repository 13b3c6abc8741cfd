use std::{
    io::Write,
    path::{Path, PathBuf},
};

use super::{Backend, BuildArgs};
use crate::{
    artifact::DockerArtifact,
    context::Context,
    docker::{self, Docker},
    Result,
};

pub struct DockerBackend {
    pub docker: Docker,
    pub push: bool,
}

// The backend arguments carry the artifact specification, the docker command line abstraction
// wants the individual options.
fn into_docker_args<'a>(args: &BuildArgs<'a, DockerArtifact>) -> docker::BuildArgs<'a> {
    let BuildArgs {
        workspace,
        spec,
        tag,
    } = *args;
    docker::BuildArgs {
        workspace,
        dockerfile: &spec.dockerfile_path,
        tag,
        build_args: &spec.build_args,
        target: spec.target.as_deref(),
        cache_from: &spec.cache_from,
    }
}

impl Backend<DockerArtifact> for DockerBackend {
    fn build(
        &self,
        ctx: &Context,
        out: &mut dyn Write,
        args: BuildArgs<'_, DockerArtifact>,
    ) -> Result<String> {
        let image_id = self.docker.build(ctx, out, into_docker_args(&args))?;
        if self.push {
            self.docker.push(ctx, out, args.tag)
        } else {
            Ok(image_id)
        }
    }

    fn dependencies(
        &self,
        _ctx: &Context,
        workspace: &Path,
        spec: &DockerArtifact,
    ) -> Result<Vec<PathBuf>> {
        docker::dependencies(workspace, &spec.dockerfile_path)
    }
}
