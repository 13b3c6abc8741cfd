use clap::Args;
use log::{debug, info};

use super::common::{self, OutputFormat};
use crate::{
    build::{BuildResult, BuilderConfig, ImageTags, LocalBuilder},
    builder::Backends,
    config::BuildConfig,
    context::Context,
    daemon::LocalDaemon,
    docker::Docker,
    image_name, kubectl, Result,
};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// The tag every built image is given.
    #[arg(long = "tag", short = 't', default_value = "latest", value_parser = expect_tag)]
    pub tag: String,

    /// Push the images to their registry. This is the default unless the kubernetes context points
    /// at a local cluster.
    #[arg(long = "push", overrides_with = "no_push")]
    pub push: bool,

    /// Keep the images in the local docker daemon.
    #[arg(long = "no-push", overrides_with = "push")]
    pub no_push: bool,

    /// Only build the artifact of this image. Can be repeated.
    #[arg(long = "image", short = 'b')]
    pub images: Vec<String>,

    #[arg(long = "output", short = 'o', value_enum, default_value_t)]
    pub output: OutputFormat,

    /// The docker daemon to talk to instead of the one configured in the environment.
    #[arg(long = "docker-host")]
    pub docker_host: Option<String>,
}

fn expect_tag(value: &str) -> Result<String, &'static str> {
    if !image_name::is_valid_tag(value) {
        return Err("expected up to 128 word characters, dots and dashes, not starting with either");
    }
    Ok(value.to_string())
}

/// Decides whether images are pushed when neither `--push` nor `--no-push` is given.
fn push_images(push: bool, no_push: bool, local_cluster: bool) -> bool {
    match (push, no_push) {
        (true, _) => true,
        (_, true) => false,
        _ => !local_cluster,
    }
}

/// Falls back to the current context of kubectl. A failed lookup only matters when the push mode
/// depends on it, otherwise the context is treated as a remote cluster.
fn resolve_kube_context(
    kube_context: Option<String>,
    push_decided: bool,
    current_context: impl FnOnce() -> Result<String>,
) -> Result<String> {
    if let Some(kube_context) = kube_context {
        return Ok(kube_context);
    }
    match current_context() {
        Ok(kube_context) => Ok(kube_context),
        Err(error) if push_decided => {
            debug!("unable to determine the kubernetes context: {error}");
            Ok(String::new())
        }
        Err(error) => Err(error),
    }
}

fn image_tags(config: &BuildConfig, tag: &str) -> ImageTags {
    config
        .artifacts
        .iter()
        .map(|artifact| {
            (
                artifact.image_name.clone(),
                format!("{}:{tag}", artifact.image_name),
            )
        })
        .collect()
}

pub fn build(
    ctx: &Context,
    config: BuildConfig,
    kube_context: Option<String>,
    args: BuildArgs,
) -> Result<()> {
    let BuildArgs {
        tag,
        push,
        no_push,
        images,
        output,
        docker_host,
    } = args;

    let kube_context = resolve_kube_context(kube_context, push || no_push, || {
        kubectl::current_context(ctx)
    })?;
    let local_cluster = kubectl::is_local_cluster(&kube_context);
    let push_images = push_images(push, no_push, local_cluster);
    info!("Building for kubernetes context {kube_context} (push: {push_images})");

    let tags = image_tags(&config, &tag);
    let artifacts = common::select_artifacts(config.artifacts, &images)?;

    let docker = Docker::new(docker_host);
    let builder = LocalBuilder::new(
        BuilderConfig {
            push_images,
            local_cluster,
            kube_context,
        },
        Backends::local(&docker, push_images),
        Box::new(LocalDaemon::new(docker)),
    );

    // Tool output goes to stderr so that stdout only carries the results.
    let results = builder.build(ctx, &mut std::io::stderr().lock(), &tags, &artifacts)?;

    match output {
        OutputFormat::Table => print_table(&results),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
    }

    Ok(())
}

fn print_table(results: &[BuildResult]) {
    let mut table = common::table(["image", "tag", "reference"]);
    for result in results {
        table.add_row([result.image_name(), result.tag(), result.reference()]);
    }
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_defaults_to_remote_clusters() {
        assert!(push_images(false, false, false));
        assert!(!push_images(false, false, true));
        assert!(push_images(true, false, true));
        assert!(!push_images(false, true, false));
    }

    #[test]
    fn kube_context_lookup() {
        let failing = || -> Result<String> { Err("kubectl not found".into()) };

        assert_eq!(
            resolve_kube_context(Some("kind-dev".to_owned()), false, failing).unwrap(),
            "kind-dev"
        );
        assert_eq!(
            resolve_kube_context(None, false, || Ok("minikube".to_owned())).unwrap(),
            "minikube"
        );

        let error = resolve_kube_context(None, false, failing).unwrap_err();
        assert_eq!(error.to_string(), "kubectl not found");

        let kube_context = resolve_kube_context(None, true, failing).unwrap();
        assert!(!kubectl::is_local_cluster(&kube_context));
    }

    #[test]
    fn tags_every_configured_image() {
        let config = BuildConfig::parse(
            "artifacts:\n  - image: gcr.io/p/web\n    docker: {}\n  - image: api\n    docker: {}\n",
        )
        .unwrap();
        let tags = image_tags(&config, "v1");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["gcr.io/p/web"], "gcr.io/p/web:v1");
        assert_eq!(tags["api"], "api:v1");
    }

    #[test]
    fn tag_validation() {
        assert_eq!(expect_tag("v1.2-rc").unwrap(), "v1.2-rc");
        assert!(expect_tag(".hidden").is_err());
        assert!(expect_tag("").is_err());
    }
}
