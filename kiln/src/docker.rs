mod dockerfile;

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::Path,
};

pub use dockerfile::dependencies;
use log::debug;

use crate::{context::Context, process, temp_path::TempFile, Result};

/// The `docker` command line, optionally pointed at a daemon other than the default one.
#[derive(Debug, Clone, Default)]
pub struct Docker {
    host: Option<String>,
}

pub struct BuildArgs<'a> {
    pub workspace: &'a Path,
    pub dockerfile: &'a Path,
    pub tag: &'a str,
    pub build_args: &'a BTreeMap<String, String>,
    pub target: Option<&'a str>,
    pub cache_from: &'a [String],
}

impl Docker {
    pub fn new(host: Option<String>) -> Self {
        Self { host }
    }

    fn docker(&self) -> process::Command {
        let command = process::Command::new("docker");
        match self.host.as_deref() {
            Some(host) => process::args!(command, "--host", host),
            None => command,
        }
    }

    /// Builds the image, tags it with `args.tag` and returns the image id.
    pub fn build(&self, ctx: &Context, out: &mut dyn Write, args: BuildArgs) -> Result<String> {
        let iid_file = TempFile::new("kiln-iid-", ".txt");

        let mut command = process::args!(
            self.docker(),
            "build",
            args.workspace,
            "--file",
            args.workspace.join(args.dockerfile),
            "--tag",
            args.tag,
            "--iidfile",
            iid_file.path(),
        );
        for (key, value) in args.build_args {
            command = process::args!(command, "--build-arg", format!("{key}={value}"));
        }
        if let Some(target) = args.target {
            command = process::args!(command, "--target", target);
        }
        for image in args.cache_from {
            command = process::args!(command, "--cache-from", image);
        }
        command.stream(ctx, out)?;

        let image_id = fs::read_to_string(iid_file.path())?.trim().to_owned();
        debug!("image id of {tag}: {image_id}", tag = args.tag);
        Ok(image_id)
    }

    /// Pushes `tag` and returns the digest reported by the registry.
    pub fn push(&self, ctx: &Context, out: &mut dyn Write, tag: &str) -> Result<String> {
        let output = process::args!(self.docker(), "push", tag).output(ctx)?;
        out.write_all(&output.stdout)?;

        let digest = parse_push_digest(output.stdout_str()?)
            .ok_or_else(|| format!("unable to find the digest of {tag} in the docker push output"))?
            .to_owned();
        debug!("digest of {tag}: {digest}");
        Ok(digest)
    }

    pub fn tag(&self, ctx: &Context, image: &str, new_tag: &str) -> Result<()> {
        process::args!(self.docker(), "tag", image, new_tag).output(ctx)?;
        Ok(())
    }

    /// Loads an image tarball and returns the id of the loaded image.
    pub fn load(&self, ctx: &Context, tarball: &Path) -> Result<String> {
        let output = process::args!(self.docker(), "load", "--input", tarball).output(ctx)?;

        match parse_loaded_image(output.stdout_str()?) {
            Some(LoadedImage::Id(id)) => Ok(id.to_owned()),
            Some(LoadedImage::Name(name)) => self.image_id(ctx, name),
            None => Err(format!(
                "unable to find the loaded image in the docker load output for {}",
                tarball.display()
            )
            .into()),
        }
    }

    pub fn image_id(&self, ctx: &Context, image: &str) -> Result<String> {
        let output =
            process::args!(self.docker(), "image", "inspect", "--format", "{{.Id}}", image)
                .output(ctx)?;

        Ok(output.stdout_str()?.trim().to_owned())
    }
}

/// Finds the digest in output such as `latest: digest: sha256:4b2c... size: 528`.
fn parse_push_digest(stdout: &str) -> Option<&str> {
    stdout.lines().rev().find_map(|line| {
        let (_, rest) = line.split_once("digest: ")?;
        rest.split_whitespace().next()
    })
}

#[derive(Debug, PartialEq, Eq)]
enum LoadedImage<'a> {
    Id(&'a str),
    Name(&'a str),
}

fn parse_loaded_image(stdout: &str) -> Option<LoadedImage<'_>> {
    stdout.lines().rev().find_map(|line| {
        if let Some(id) = line.strip_prefix("Loaded image ID: ") {
            Some(LoadedImage::Id(id.trim()))
        } else {
            line.strip_prefix("Loaded image: ")
                .map(|name| LoadedImage::Name(name.trim()))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_digest() {
        let stdout = "\
The push refers to repository [registry.io/app]
5f70bf18a086: Pushed
v1: digest: sha256:4b2cdbd5fc2c5f41f1a2e8d2c3b4a5968778695a4b3c2d1e0f9e8d7c6b5a4938 size: 528
";
        assert_eq!(
            parse_push_digest(stdout),
            Some("sha256:4b2cdbd5fc2c5f41f1a2e8d2c3b4a5968778695a4b3c2d1e0f9e8d7c6b5a4938")
        );
        assert_eq!(parse_push_digest("Everything up-to-date\n"), None);
    }

    #[test]
    fn loaded_image() {
        assert_eq!(
            parse_loaded_image("Loaded image ID: sha256:abc123\n"),
            Some(LoadedImage::Id("sha256:abc123"))
        );
        assert_eq!(
            parse_loaded_image("Loaded image: bazel/app:image\n"),
            Some(LoadedImage::Name("bazel/app:image"))
        );
        assert_eq!(parse_loaded_image(""), None);
    }
}
