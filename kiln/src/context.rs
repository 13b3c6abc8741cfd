use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation signal shared by the caller and every backend invocation.
///
/// Cancelling is advisory. Commands started through [`crate::process`] observe the signal and kill
/// their child process, nothing else is interrupted.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels this context when the process receives an interrupt. Can only be installed once per
    /// process.
    pub fn cancel_on_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let context = self.clone();
        ctrlc::set_handler(move || {
            log::debug!("received interrupt, cancelling");
            context.cancel();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_signal() {
        let ctx = Context::new();
        let clone = ctx.clone();
        assert!(!ctx.is_cancelled());

        clone.cancel();
        assert!(ctx.is_cancelled());
        assert!(clone.is_cancelled());
    }
}
