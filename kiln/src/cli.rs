mod build;
mod common;
mod deps;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{
    config::{BuildConfig, DEFAULT_CONFIG_FILE},
    context::Context,
    Result,
};

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path of the build configuration. Artifact contexts are relative to its directory.
    #[arg(long = "config", short = 'f', global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// The kubernetes context to build for. Defaults to the current context of kubectl.
    #[arg(long = "kube-context", global = true)]
    kube_context: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the configured artifacts
    Build(build::BuildArgs),

    /// List the files each artifact is built from
    Deps(deps::DepsArgs),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let Cli {
            command,
            config,
            kube_context,
        } = self;

        let ctx = Context::new();
        ctx.cancel_on_ctrlc()?;

        let config = BuildConfig::load(&config)?;

        match command {
            Commands::Build(args) => build::build(&ctx, config, kube_context, args),
            Commands::Deps(args) => deps::deps(&ctx, config, args),
        }
    }
}
