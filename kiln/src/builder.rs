mod bazel;
mod docker;
mod jib;

use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub use bazel::*;
pub use docker::*;
pub use jib::*;

use crate::{
    artifact::{BazelArtifact, DockerArtifact, JibGradleArtifact, JibMavenArtifact},
    context::Context,
    docker::Docker,
    Result,
};

pub struct BuildArgs<'a, S> {
    pub workspace: &'a Path,
    pub spec: &'a S,
    pub tag: &'a str,
}

/// A build technology that knows how to turn artifacts described by `S` into images.
pub trait Backend<S> {
    /// Builds the artifact and returns either the digest of the pushed image or the id of the
    /// local image, depending on whether the backend pushes.
    fn build(&self, ctx: &Context, out: &mut dyn Write, args: BuildArgs<'_, S>) -> Result<String>;

    /// Lists the files the build of the artifact depends on. Relative paths are relative to the
    /// workspace.
    fn dependencies(&self, ctx: &Context, workspace: &Path, spec: &S) -> Result<Vec<PathBuf>>;
}

/// One backend per artifact kind.
pub struct Backends {
    pub docker: Box<dyn Backend<DockerArtifact>>,
    pub bazel: Box<dyn Backend<BazelArtifact>>,
    pub jib_maven: Box<dyn Backend<JibMavenArtifact>>,
    pub jib_gradle: Box<dyn Backend<JibGradleArtifact>>,
}

impl Backends {
    /// Backends that run the build tools installed on this machine.
    pub fn local(docker: &Docker, push: bool) -> Self {
        Self {
            docker: Box::new(DockerBackend {
                docker: docker.clone(),
                push,
            }),
            bazel: Box::new(BazelBackend {
                docker: docker.clone(),
                push,
            }),
            jib_maven: Box::new(JibMavenBackend { push }),
            jib_gradle: Box::new(JibGradleBackend { push }),
        }
    }
}
