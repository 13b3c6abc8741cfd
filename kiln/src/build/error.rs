use std::fmt;

use crate::BoxError;

/// Failures surfaced by [`super::LocalBuilder`].
#[derive(Debug)]
pub enum Error {
    /// The artifact does not have exactly one build specification.
    UndefinedArtifactType(String),
    /// No tag was supplied for the artifact with this image name.
    MissingTag(String),
    /// A backend failed to build an artifact.
    BuildArtifact(BoxError),
    /// The daemon failed to tag a local image.
    Daemon(BoxError),
    /// A backend failed to list the dependencies of an artifact.
    Dependencies(BoxError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UndefinedArtifactType(artifact_type) => {
                write!(f, "undefined artifact type: {artifact_type}")
            }
            Error::MissingTag(image_name) => {
                write!(f, "unable to find tag for image {image_name}")
            }
            Error::BuildArtifact(error) => write!(f, "build artifact: {error}"),
            Error::Daemon(error) | Error::Dependencies(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::BuildArtifact(error) | Error::Daemon(error) | Error::Dependencies(error) => {
                Some(error.as_ref())
            }
            Error::UndefinedArtifactType(_) | Error::MissingTag(_) => None,
        }
    }
}
