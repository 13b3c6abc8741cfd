use std::path::PathBuf;

use clap::Args;
use itertools::Itertools;
use serde::Serialize;

use super::common::{self, OutputFormat};
use crate::{
    build::{BuilderConfig, LocalBuilder},
    builder::Backends,
    config::BuildConfig,
    context::Context,
    daemon::LocalDaemon,
    docker::Docker,
    Result,
};

#[derive(Debug, Args)]
pub struct DepsArgs {
    /// Only list the dependencies of this image. Can be repeated.
    #[arg(long = "image", short = 'b')]
    pub images: Vec<String>,

    #[arg(long = "output", short = 'o', value_enum, default_value_t)]
    pub output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct ArtifactDependencies {
    image: String,
    dependencies: Vec<PathBuf>,
}

pub fn deps(ctx: &Context, config: BuildConfig, args: DepsArgs) -> Result<()> {
    let DepsArgs { images, output } = args;

    let artifacts = common::select_artifacts(config.artifacts, &images)?;

    let docker = Docker::default();
    let builder = LocalBuilder::new(
        BuilderConfig::default(),
        Backends::local(&docker, false),
        Box::new(LocalDaemon::new(docker)),
    );

    let mut listing = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        listing.push(ArtifactDependencies {
            image: artifact.image_name.clone(),
            dependencies: builder.dependencies_for_artifact(ctx, artifact)?,
        });
    }

    match output {
        OutputFormat::Table => {
            let mut table = common::table(["image", "dependencies"]);
            for entry in &listing {
                let dependencies = entry
                    .dependencies
                    .iter()
                    .map(|path| path.display())
                    .join("\n");
                table.add_row([entry.image.as_str(), dependencies.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
    }

    Ok(())
}
