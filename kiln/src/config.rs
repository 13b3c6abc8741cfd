//! The build configuration file.

use std::{
    collections::HashSet,
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    artifact::Artifact,
    image_name::{self, InvalidImageName},
};

pub const DEFAULT_CONFIG_FILE: &str = "kiln.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(deserialize_with = "deserialize_artifacts")]
    pub artifacts: Vec<Artifact>,
}

fn deserialize_artifacts<'de, D>(deserializer: D) -> Result<Vec<Artifact>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let artifacts = Vec::deserialize(deserializer)?;
    if artifacts.is_empty() {
        return Err(Error::custom("artifacts must not be empty"));
    }
    Ok(artifacts)
}

#[derive(Debug)]
pub enum ConfigError {
    Read(PathBuf, std::io::Error),
    Yaml(serde_yaml::Error),
    InvalidImageName(InvalidImageName),
    DuplicateImage(String),
    /// The artifact for this image does not have exactly one build section.
    ArtifactType(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(path, error) => {
                write!(f, "failed to read {}: {error}", path.display())
            }
            ConfigError::Yaml(error) => write!(f, "invalid build configuration: {error}"),
            ConfigError::InvalidImageName(error) => error.fmt(f),
            ConfigError::DuplicateImage(image) => {
                write!(f, "image {image:?} is configured more than once")
            }
            ConfigError::ArtifactType(image) => write!(
                f,
                "artifact {image:?} must have exactly one of docker, bazel, jibMaven or jibGradle"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read(_, error) => Some(error),
            ConfigError::Yaml(error) => Some(error),
            ConfigError::InvalidImageName(error) => Some(error),
            ConfigError::DuplicateImage(_) | ConfigError::ArtifactType(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        ConfigError::Yaml(value)
    }
}

impl From<InvalidImageName> for ConfigError {
    fn from(value: InvalidImageName) -> Self {
        ConfigError::InvalidImageName(value)
    }
}

impl BuildConfig {
    /// Parses and validates a configuration. Workspaces are left as written.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: BuildConfig = serde_yaml::from_str(contents)?;

        let mut seen = HashSet::new();
        for artifact in &config.artifacts {
            image_name::validate_name(&artifact.image_name)?;
            if artifact.artifact_type.kind().is_none() {
                return Err(ConfigError::ArtifactType(artifact.image_name.clone()));
            }
            if !seen.insert(artifact.image_name.as_str()) {
                return Err(ConfigError::DuplicateImage(artifact.image_name.clone()));
            }
        }

        Ok(config)
    }

    /// Loads the configuration at `path` and resolves every workspace against the directory that
    /// contains it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|error| ConfigError::Read(path.to_owned(), error))?;
        let mut config = Self::parse(&contents)?;

        let dir = path.parent().unwrap_or(Path::new(""));
        let dir = std::path::absolute(dir)
            .map_err(|error| ConfigError::Read(path.to_owned(), error))?;
        for artifact in &mut config.artifacts {
            artifact.workspace = dir.join(&artifact.workspace);
        }
        log::debug!(
            "loaded {} artifacts from {}",
            config.artifacts.len(),
            path.display()
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{artifact::BuildKind, temp_path::TempFile};

    const CONFIG: &str = r#"
artifacts:
  - image: gcr.io/project/app
    context: app
    docker:
      dockerfile: Dockerfile.prod
  - image: worker
    bazel:
      target: //worker:image.tar
  - image: api
    jibMaven:
      module: api
"#;

    #[test]
    fn parse_config() {
        let config = BuildConfig::parse(CONFIG).unwrap();
        let images = config
            .artifacts
            .iter()
            .map(|artifact| artifact.image_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(images, ["gcr.io/project/app", "worker", "api"]);
        assert!(matches!(
            config.artifacts[1].artifact_type.kind(),
            Some(BuildKind::Bazel(spec)) if spec.target == "//worker:image.tar"
        ));
        assert_eq!(config.artifacts[1].workspace, PathBuf::from("."));
    }

    #[test]
    fn empty_artifacts() {
        let error = BuildConfig::parse("artifacts: []\n").unwrap_err();
        assert!(error.to_string().contains("artifacts must not be empty"));
    }

    #[test]
    fn artifact_needs_exactly_one_section() {
        let none = BuildConfig::parse("artifacts:\n  - image: app\n").unwrap_err();
        assert!(matches!(&none, ConfigError::ArtifactType(image) if image == "app"));

        let both = BuildConfig::parse(
            "artifacts:\n  - image: app\n    docker: {}\n    jibGradle: {}\n",
        )
        .unwrap_err();
        assert!(matches!(both, ConfigError::ArtifactType(_)));
    }

    #[test]
    fn invalid_image_names() {
        for image in ["App", "app:v1", "app@sha256:abc"] {
            let config = format!("artifacts:\n  - image: {image:?}\n    docker: {{}}\n");
            let error = BuildConfig::parse(&config).unwrap_err();
            assert!(
                matches!(error, ConfigError::InvalidImageName(_)),
                "{image}: {error}"
            );
        }
    }

    #[test]
    fn duplicate_images() {
        let error = BuildConfig::parse(
            "artifacts:\n  - image: app\n    docker: {}\n  - image: app\n    bazel:\n      target: //:a.tar\n",
        )
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "image \"app\" is configured more than once"
        );
    }

    #[test]
    fn load_resolves_workspaces() {
        let file = TempFile::new("kiln-config-", ".yaml");
        fs::write(file.path(), CONFIG).unwrap();

        let config = BuildConfig::load(file.path()).unwrap();
        let dir = file.path().parent().unwrap();
        assert_eq!(config.artifacts[0].workspace, dir.join("app"));
        assert_eq!(config.artifacts[1].workspace, dir.join("."));
        assert!(config.artifacts.iter().all(|a| a.workspace.is_absolute()));
    }

    #[test]
    fn load_missing_file() {
        let error = BuildConfig::load(Path::new("/nonexistent/kiln.yaml")).unwrap_err();
        assert!(matches!(error, ConfigError::Read(..)));
    }
}
