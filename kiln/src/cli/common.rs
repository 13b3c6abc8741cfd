use clap::ValueEnum;

use crate::{artifact::Artifact, Result};

#[derive(Debug, Default, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// A table meant for humans.
    #[default]
    Table,
    /// JSON meant for other programs.
    Json,
}

/// Keeps the artifacts whose image is listed in `images`, in configuration order. An empty
/// selection keeps every artifact.
pub fn select_artifacts(artifacts: Vec<Artifact>, images: &[String]) -> Result<Vec<Artifact>> {
    if let Some(unknown) = images
        .iter()
        .find(|image| !artifacts.iter().any(|a| &a.image_name == *image))
    {
        return Err(format!("image {unknown:?} is not configured").into());
    }
    if images.is_empty() {
        return Ok(artifacts);
    }
    Ok(artifacts
        .into_iter()
        .filter(|artifact| images.contains(&artifact.image_name))
        .collect())
}

pub fn table<const N: usize>(header: [&str; N]) -> comfy_table::Table {
    use comfy_table::{Attribute, Cell, ContentArrangement, Table};

    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .into_iter()
                .map(|name| Cell::new(name).add_attribute(Attribute::Bold)),
        );
    table
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::artifact::DockerArtifact;

    fn artifacts() -> Vec<Artifact> {
        ["web", "api", "worker"]
            .into_iter()
            .map(|image| Artifact {
                image_name: image.to_owned(),
                workspace: PathBuf::from(image),
                artifact_type: DockerArtifact::default().into(),
            })
            .collect()
    }

    fn names(artifacts: &[Artifact]) -> Vec<&str> {
        artifacts.iter().map(|a| a.image_name.as_str()).collect()
    }

    #[test]
    fn select_all_by_default() {
        let selected = select_artifacts(artifacts(), &[]).unwrap();
        assert_eq!(names(&selected), ["web", "api", "worker"]);
    }

    #[test]
    fn select_keeps_configuration_order() {
        let images = ["worker".to_owned(), "web".to_owned()];
        let selected = select_artifacts(artifacts(), &images).unwrap();
        assert_eq!(names(&selected), ["web", "worker"]);
    }

    #[test]
    fn select_unknown_image() {
        let error = select_artifacts(artifacts(), &["db".to_owned()]).unwrap_err();
        assert_eq!(error.to_string(), "image \"db\" is not configured");
    }
}
