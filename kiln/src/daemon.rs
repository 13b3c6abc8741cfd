use std::cell::Cell;

use crate::{context::Context, docker::Docker, Result};

/// Handle to the daemon that stores locally built images.
pub trait Daemon {
    /// Gives the local image `image_id` the additional name `new_tag`.
    fn tag(&self, ctx: &Context, image_id: &str, new_tag: &str) -> Result<()>;

    /// Releases the handle. Calling it again has no effect.
    fn close(&self) -> Result<()>;
}

/// The docker daemon of this machine, reached through the docker command line.
#[derive(Debug)]
pub struct LocalDaemon {
    docker: Docker,
    closed: Cell<bool>,
}

impl LocalDaemon {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            closed: Cell::new(false),
        }
    }
}

impl Daemon for LocalDaemon {
    fn tag(&self, ctx: &Context, image_id: &str, new_tag: &str) -> Result<()> {
        if self.closed.get() {
            return Err("the docker daemon handle is closed".into());
        }
        self.docker.tag(ctx, image_id, new_tag)
    }

    fn close(&self) -> Result<()> {
        self.closed.set(true);
        Ok(())
    }
}

/// Closes the daemon when dropped, so every way out of a build releases it.
pub(crate) struct CloseOnDrop<'a>(pub &'a dyn Daemon);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.0.close() {
            log::warn!("failed to close the docker daemon handle: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_after_close_fails() {
        let daemon = LocalDaemon::new(Docker::default());
        daemon.close().unwrap();
        daemon.close().unwrap();

        let error = daemon
            .tag(&Context::new(), "sha256:abc123", "app:abc123")
            .unwrap_err();
        assert_eq!(error.to_string(), "the docker daemon handle is closed");
    }

    #[test]
    fn guard_closes_on_drop() {
        let daemon = LocalDaemon::new(Docker::default());
        {
            let _guard = CloseOnDrop(&daemon);
            assert!(!daemon.closed.get());
        }
        assert!(daemon.closed.get());
    }
}
