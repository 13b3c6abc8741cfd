use std::{collections::BTreeMap, path::PathBuf};

use serde::Deserialize;

/// One buildable unit: an image name, the directory used as build context and exactly one build
/// specification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(rename = "image")]
    pub image_name: String,

    #[serde(rename = "context", default = "default_workspace")]
    pub workspace: PathBuf,

    #[serde(flatten)]
    pub artifact_type: ArtifactType,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

/// Mirrors the configuration schema where each backend has its own optional section. Use
/// [`ArtifactType::kind`] to obtain the single populated section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactType {
    #[serde(rename = "docker")]
    pub docker_artifact: Option<DockerArtifact>,

    #[serde(rename = "bazel")]
    pub bazel_artifact: Option<BazelArtifact>,

    #[serde(rename = "jibMaven")]
    pub jib_maven_artifact: Option<JibMavenArtifact>,

    #[serde(rename = "jibGradle")]
    pub jib_gradle_artifact: Option<JibGradleArtifact>,
}

/// The populated section of an [`ArtifactType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind<'a> {
    Docker(&'a DockerArtifact),
    Bazel(&'a BazelArtifact),
    JibMaven(&'a JibMavenArtifact),
    JibGradle(&'a JibGradleArtifact),
}

impl ArtifactType {
    /// Returns `None` unless exactly one section is populated.
    pub fn kind(&self) -> Option<BuildKind<'_>> {
        match (
            &self.docker_artifact,
            &self.bazel_artifact,
            &self.jib_maven_artifact,
            &self.jib_gradle_artifact,
        ) {
            (Some(spec), None, None, None) => Some(BuildKind::Docker(spec)),
            (None, Some(spec), None, None) => Some(BuildKind::Bazel(spec)),
            (None, None, Some(spec), None) => Some(BuildKind::JibMaven(spec)),
            (None, None, None, Some(spec)) => Some(BuildKind::JibGradle(spec)),
            _ => None,
        }
    }
}

impl From<DockerArtifact> for ArtifactType {
    fn from(value: DockerArtifact) -> Self {
        Self {
            docker_artifact: Some(value),
            ..Default::default()
        }
    }
}

impl From<BazelArtifact> for ArtifactType {
    fn from(value: BazelArtifact) -> Self {
        Self {
            bazel_artifact: Some(value),
            ..Default::default()
        }
    }
}

impl From<JibMavenArtifact> for ArtifactType {
    fn from(value: JibMavenArtifact) -> Self {
        Self {
            jib_maven_artifact: Some(value),
            ..Default::default()
        }
    }
}

impl From<JibGradleArtifact> for ArtifactType {
    fn from(value: JibGradleArtifact) -> Self {
        Self {
            jib_gradle_artifact: Some(value),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DockerArtifact {
    /// Relative to the workspace.
    #[serde(rename = "dockerfile")]
    pub dockerfile_path: PathBuf,
    pub build_args: BTreeMap<String, String>,
    pub target: Option<String>,
    pub cache_from: Vec<String>,
}

impl Default for DockerArtifact {
    fn default() -> Self {
        Self {
            dockerfile_path: PathBuf::from("Dockerfile"),
            build_args: Default::default(),
            target: None,
            cache_from: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BazelArtifact {
    /// A `.tar` target label such as `//app:image.tar`.
    pub target: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JibMavenArtifact {
    pub module: Option<String>,
    pub profile: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JibGradleArtifact {
    pub project: Option<String>,
    pub args: Vec<String>,
}
