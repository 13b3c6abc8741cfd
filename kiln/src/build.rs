//! Builds artifacts with the tools installed on this machine and records the resulting image
//! references.

mod error;
mod sequence;

use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::Serialize;

pub use error::Error;
pub use sequence::in_sequence;

use crate::{
    artifact::{Artifact, ArtifactType, BuildKind},
    builder::{Backends, BuildArgs},
    context::Context,
    daemon::{CloseOnDrop, Daemon},
    paths,
};

/// Maps image names to the tag each one should be built with.
pub type ImageTags = HashMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    /// Push images to their registry instead of keeping them in the local daemon.
    pub push_images: bool,
    /// Whether the current kubernetes context points at a cluster running on this machine.
    pub local_cluster: bool,
    pub kube_context: String,
}

/// The outcome of building one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    image_name: String,
    tag: String,
    reference: String,
}

impl BuildResult {
    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    /// The tag the artifact was built with.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `tag@digest` for pushed images, `image_name:id` for images kept in the local daemon.
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

pub struct LocalBuilder {
    config: BuilderConfig,
    backends: Backends,
    daemon: Box<dyn Daemon>,
}

impl LocalBuilder {
    pub fn new(config: BuilderConfig, backends: Backends, daemon: Box<dyn Daemon>) -> Self {
        Self {
            config,
            backends,
            daemon,
        }
    }

    /// Builds `artifacts` in order. The daemon handle is closed on return, whether the build
    /// succeeded or not.
    pub fn build(
        &self,
        ctx: &Context,
        out: &mut dyn Write,
        tags: &ImageTags,
        artifacts: &[Artifact],
    ) -> Result<Vec<BuildResult>, Error> {
        if self.config.local_cluster {
            if let Err(error) = writeln!(
                out,
                "Found [{}] context, using local docker daemon.",
                self.config.kube_context
            ) {
                warn!("failed to write to the build output: {error}");
            }
        }
        let _close = CloseOnDrop(self.daemon.as_ref());

        // TODO: build independent artifacts concurrently while reporting results in input order.
        in_sequence(ctx, out, tags, artifacts, |ctx, out, artifact, tag| {
            self.build_artifact(ctx, out, artifact, tag)
        })
    }

    fn build_artifact(
        &self,
        ctx: &Context,
        out: &mut dyn Write,
        artifact: &Artifact,
        tag: &str,
    ) -> Result<String, Error> {
        let digest_or_image_id = self
            .run_build_for_artifact(ctx, out, artifact, tag)
            .map_err(Error::BuildArtifact)?;

        if self.config.push_images {
            return Ok(format!("{tag}@{digest_or_image_id}"));
        }

        let image_id = digest_or_image_id
            .strip_prefix("sha256:")
            .unwrap_or(&digest_or_image_id);
        let image_ref = format!("{}:{image_id}", artifact.image_name);
        self.daemon
            .tag(ctx, &digest_or_image_id, &image_ref)
            .map_err(Error::Daemon)?;
        Ok(image_ref)
    }

    fn run_build_for_artifact(
        &self,
        ctx: &Context,
        out: &mut dyn Write,
        artifact: &Artifact,
        tag: &str,
    ) -> crate::Result<String> {
        let workspace = artifact.workspace.as_path();
        match kind(&artifact.artifact_type)? {
            BuildKind::Docker(spec) => {
                self.backends
                    .docker
                    .build(ctx, out, BuildArgs { workspace, spec, tag })
            }
            BuildKind::Bazel(spec) => {
                self.backends
                    .bazel
                    .build(ctx, out, BuildArgs { workspace, spec, tag })
            }
            BuildKind::JibMaven(spec) => {
                self.backends
                    .jib_maven
                    .build(ctx, out, BuildArgs { workspace, spec, tag })
            }
            BuildKind::JibGradle(spec) => {
                self.backends
                    .jib_gradle
                    .build(ctx, out, BuildArgs { workspace, spec, tag })
            }
        }
    }

    /// Lists the absolute paths of the files `artifact` is built from. When `ctx` has been
    /// cancelled, backend failures are ignored and an empty list is returned.
    pub fn dependencies_for_artifact(
        &self,
        ctx: &Context,
        artifact: &Artifact,
    ) -> Result<Vec<PathBuf>, Error> {
        let workspace = artifact.workspace.as_path();
        let build_kind = kind(&artifact.artifact_type)?;
        match self.dependencies(ctx, workspace, build_kind) {
            Ok(paths) => Ok(paths::absolute_paths(workspace, paths)),
            Err(error) if ctx.is_cancelled() => {
                debug!("ignore error since context is cancelled: {error}");
                Ok(Vec::new())
            }
            Err(error) => Err(Error::Dependencies(error)),
        }
    }

    fn dependencies(
        &self,
        ctx: &Context,
        workspace: &Path,
        kind: BuildKind<'_>,
    ) -> crate::Result<Vec<PathBuf>> {
        match kind {
            BuildKind::Docker(spec) => self.backends.docker.dependencies(ctx, workspace, spec),
            BuildKind::Bazel(spec) => self.backends.bazel.dependencies(ctx, workspace, spec),
            BuildKind::JibMaven(spec) => {
                self.backends.jib_maven.dependencies(ctx, workspace, spec)
            }
            BuildKind::JibGradle(spec) => {
                self.backends.jib_gradle.dependencies(ctx, workspace, spec)
            }
        }
    }
}

fn kind(artifact_type: &ArtifactType) -> Result<BuildKind<'_>, Error> {
    artifact_type
        .kind()
        .ok_or_else(|| Error::UndefinedArtifactType(format!("{artifact_type:?}")))
}
