pub mod artifact;
pub mod build;
pub mod builder;
pub mod config;
pub mod context;
pub mod daemon;
pub mod image_name;
pub mod paths;

pub(crate) mod bazel;
pub(crate) mod docker;
pub(crate) mod jib;
pub(crate) mod kubectl;
pub(crate) mod process;
pub(crate) mod temp_path;

pub mod cli;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = BoxError> = std::result::Result<T, E>;
