use std::io::Write;

use log::info;

use super::{BuildResult, Error, ImageTags};
use crate::{artifact::Artifact, context::Context};

/// Builds `artifacts` one after the other in the given order. Stops at the first failure, in
/// which case no results are returned.
pub fn in_sequence<F>(
    ctx: &Context,
    out: &mut dyn Write,
    tags: &ImageTags,
    artifacts: &[Artifact],
    mut build_artifact: F,
) -> Result<Vec<BuildResult>, Error>
where
    F: FnMut(&Context, &mut dyn Write, &Artifact, &str) -> Result<String, Error>,
{
    let mut builds = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        info!("Building [{}]...", artifact.image_name);

        let tag = tags
            .get(&artifact.image_name)
            .ok_or_else(|| Error::MissingTag(artifact.image_name.clone()))?;

        let reference = build_artifact(ctx, &mut *out, artifact, tag.as_str())?;

        builds.push(BuildResult {
            image_name: artifact.image_name.clone(),
            tag: tag.clone(),
            reference,
        });
    }

    Ok(builds)
}
