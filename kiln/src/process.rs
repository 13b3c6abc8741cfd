use std::{
    ffi::OsStr,
    fmt,
    io::{self, Read, Write},
    num::NonZeroI32,
    path::Path,
    process,
    sync::mpsc,
    thread,
    time::Duration,
};

use log::debug;

use crate::context::Context;

/// How often a running child is checked for completion and cancellation.
pub const POLLING_INTERVAL: Duration = Duration::from_millis(100);

pub struct Command(process::Command);

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Command {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self(process::Command::new(program))
    }

    pub fn args<'a, I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = &'a OsStr>,
    {
        self.0.args(args);
        self
    }

    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.0.current_dir(dir);
        self
    }

    /// Runs the command and captures its stdout and stderr. The child is killed when `ctx` gets
    /// cancelled.
    pub fn try_output(mut self, ctx: &Context) -> Result<Output, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("capturing `{command:?}`...", command = &self.0);
        }

        if ctx.is_cancelled() {
            return Err(self.error(ErrorKind::Cancelled));
        }

        let mut child = match self
            .0
            .stdin(process::Stdio::null())
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(error) => return Err(self.error(error.into())),
        };

        let stdout = child.stdout.take().map(read_to_end);
        let stderr = child.stderr.take().map(read_to_end);
        match wait(ctx, &mut child) {
            Ok(status) => Ok(Output {
                command: self,
                output: process::Output {
                    status,
                    stdout: join_reader(stdout),
                    stderr: join_reader(stderr),
                },
            }),
            // After a kill the readers are left detached, grandchildren may keep the pipes open.
            Err(kind) => Err(self.error(kind)),
        }
    }

    pub fn output(self, ctx: &Context) -> Result<Output, Error> {
        self.try_output(ctx).and_then(Output::require_success)
    }

    /// Runs the command while copying everything it writes to stdout and stderr into `out`. The
    /// child is killed when `ctx` gets cancelled or when writing to `out` fails.
    pub fn try_stream(mut self, ctx: &Context, out: &mut dyn Write) -> Result<ExitStatus, Error> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("running `{command:?}`...", command = &self.0);
        }

        if ctx.is_cancelled() {
            return Err(self.error(ErrorKind::Cancelled));
        }

        let mut child = match self
            .0
            .stdin(process::Stdio::null())
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(error) => return Err(self.error(error.into())),
        };

        let (sender, receiver) = mpsc::channel();
        let readers = [
            child.stdout.take().map(|r| forward(r, sender.clone())),
            child.stderr.take().map(|r| forward(r, sender.clone())),
        ];
        drop(sender);

        let mut disconnected = false;
        let result = loop {
            if disconnected {
                thread::sleep(POLLING_INTERVAL);
            } else {
                match receiver.recv_timeout(POLLING_INTERVAL) {
                    Ok(chunk) => {
                        if let Err(error) = out.write_all(&chunk) {
                            kill(&mut child);
                            break Err(ErrorKind::Io(error));
                        }
                        continue;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => disconnected = true,
                }
            }

            if ctx.is_cancelled() {
                kill(&mut child);
                break Err(ErrorKind::Cancelled);
            }

            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) => {}
                Err(error) => {
                    kill(&mut child);
                    break Err(error.into());
                }
            }
        };

        // Whatever the child wrote right before exiting is still in the channel. After a kill the
        // readers are left detached, grandchildren may keep the pipes open.
        if result.is_ok() {
            for chunk in receiver.iter() {
                let _ = out.write_all(&chunk);
            }
            for reader in readers.into_iter().flatten() {
                let _ = reader.join();
            }
        }
        let _ = out.flush();

        match result {
            Ok(status) => Ok(ExitStatus {
                command: self,
                status,
            }),
            Err(kind) => Err(self.error(kind)),
        }
    }

    pub fn stream(self, ctx: &Context, out: &mut dyn Write) -> Result<(), Error> {
        self.try_stream(ctx, out)
            .and_then(ExitStatus::require_success)
    }

    fn error(self, kind: ErrorKind) -> Error {
        Error {
            command: self,
            kind,
        }
    }
}

fn wait(ctx: &Context, child: &mut process::Child) -> Result<process::ExitStatus, ErrorKind> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if ctx.is_cancelled() {
            kill(child);
            return Err(ErrorKind::Cancelled);
        }
        thread::sleep(POLLING_INTERVAL);
    }
}

fn kill(child: &mut process::Child) {
    if let Err(error) = child.kill() {
        debug!("failed to kill child process {}: {error}", child.id());
    }
    let _ = child.wait();
}

fn read_to_end<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        buffer
    })
}

fn join_reader(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn forward<R: Read + Send + 'static>(
    mut reader: R,
    sender: mpsc::Sender<Vec<u8>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if sender.send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[derive(Debug)]
pub struct ExitStatus {
    command: Command,
    status: process::ExitStatus,
}

impl ExitStatus {
    pub fn require_success(self) -> Result<(), Error> {
        let ExitStatus { command, status } = self;
        if status.success() {
            Ok(())
        } else {
            Err(Error {
                command,
                kind: ErrorKind::NonZeroExitStatus(status.code().and_then(NonZeroI32::new)),
            })
        }
    }
}

#[derive(Debug)]
pub struct Output {
    pub command: Command,
    pub output: process::Output,
}

impl Output {
    pub fn require_success(self) -> Result<Output, Error> {
        let Output { command, output } = self;
        if output.status.success() {
            Ok(Output { command, output })
        } else {
            if log::log_enabled!(log::Level::Debug) {
                debug!(
                    "`{command:?}` failed: {stderr}",
                    stderr = String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(Error {
                command,
                kind: ErrorKind::NonZeroExitStatus(output.status.code().and_then(NonZeroI32::new)),
            })
        }
    }

    pub fn stdout_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.output.stdout)
    }
}

impl std::ops::Deref for Output {
    type Target = process::Output;

    fn deref(&self) -> &Self::Target {
        &self.output
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Cancelled,
    Io(io::Error),
    NonZeroExitStatus(Option<NonZeroI32>),
}

impl From<io::Error> for ErrorKind {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Io(value),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub command: Command,
    pub kind: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to run `{command:?}`: ",
            command = &self.command.0
        )?;
        match &self.kind {
            ErrorKind::NotFound => {
                let program = self.command.0.get_program().to_string_lossy();
                write!(f, "the `{program}` command is required but not available on your system, please install it")
            }
            ErrorKind::PermissionDenied => {
                let program = self.command.0.get_program().to_string_lossy();
                write!(f, "the `{program}` command is available but does not have the right permissions, please make sure the binary is executable")
            }
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Io(error) => write!(f, "{error}"),
            ErrorKind::NonZeroExitStatus(code) => {
                if let Some(code) = code {
                    write!(f, "exited with non-zero exit code `{code}`")
                } else {
                    write!(f, "did not run successfully")
                }
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(error) => Some(error),
            _ => None,
        }
    }
}

/// Creates a new [`Command`] and supplies the provided arguments, if any, while calling
/// [`std::convert::AsRef::as_ref`] on each.
macro_rules! command {
    ($program:expr, $($arg:expr),* $(,)?) => {
        $crate::process::args!($crate::process::Command::new($program), $($arg,)*)
    };
}

/// Calls [`Command::args`] on the provided [`Command`] while calling [`std::convert::AsRef::as_ref`]
/// on each argument.
macro_rules! args {
    ($program:expr, $($arg:expr),+ $(,)?) => {
        $program.args([
            $(::std::convert::AsRef::<::std::ffi::OsStr>::as_ref(&$arg),)*
        ])
    }
}

pub(crate) use args;
pub(crate) use command;

#[cfg(all(test, unix))]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn output_captures_stdout() {
        let output = command!("sh", "-c", "echo hello; echo oops >&2")
            .output(&Context::new())
            .unwrap();
        assert_eq!(output.stdout_str().unwrap(), "hello\n");
        assert_eq!(output.stderr, b"oops\n");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let error = command!("sh", "-c", "exit 3")
            .output(&Context::new())
            .unwrap_err();
        assert!(matches!(
            error.kind,
            ErrorKind::NonZeroExitStatus(Some(code)) if code.get() == 3
        ));
    }

    #[test]
    fn missing_program_is_reported() {
        let error = command!("kiln-test-program-that-does-not-exist", "--help")
            .output(&Context::new())
            .unwrap_err();
        assert!(matches!(error.kind, ErrorKind::NotFound));
        assert!(error.to_string().contains("please install it"));
    }

    #[test]
    fn stream_forwards_output() {
        let mut out = Vec::new();
        command!("sh", "-c", "echo one; echo two >&2")
            .stream(&Context::new(), &mut out)
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("one\n"));
        assert!(out.contains("two\n"));
    }

    #[test]
    fn cancelled_context_does_not_spawn() {
        let ctx = Context::new();
        ctx.cancel();
        let error = command!("sh", "-c", "exit 0").output(&ctx).unwrap_err();
        assert!(matches!(error.kind, ErrorKind::Cancelled));
    }

    #[test]
    fn cancelling_kills_the_child() {
        let ctx = Context::new();
        let canceller = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(200));
                ctx.cancel();
            })
        };

        let start = Instant::now();
        let mut out = Vec::new();
        let error = command!("sleep", "30")
            .stream(&ctx, &mut out)
            .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(error.kind, ErrorKind::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn cancelling_does_not_wait_for_grandchildren() {
        let ctx = Context::new();
        let canceller = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(200));
                ctx.cancel();
            })
        };

        let start = Instant::now();
        let error = command!("sh", "-c", "sleep 6; echo done")
            .output(&ctx)
            .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(error.kind, ErrorKind::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
