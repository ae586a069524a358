// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{case::GoldenCase, errors::InvokeError, test_output::InvocationResult};
use camino::{Utf8Path, Utf8PathBuf};
use std::{io, pin::pin, process::ExitStatus, sync::Arc, time::Duration};
use tokio::{io::AsyncWriteExt, process::ChildStdin, sync::watch};
use tracing::debug;

mod imp;

use imp::ChildAccumulator;

/// The environment variable set to the case name for every invocation.
pub const CASE_NAME_ENV: &str = "FITCHECK_CASE_NAME";

/// Limits applied to a single invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvokeSettings {
    /// How long the child may run before it is terminated.
    pub timeout: Duration,

    /// How long a terminated child has to exit after SIGTERM before it is sent SIGKILL.
    pub grace_period: Duration,

    /// How long to keep reading output after the child has exited.
    pub leak_timeout: Duration,
}

impl Default for InvokeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            grace_period: Duration::from_secs(5),
            leak_timeout: Duration::from_millis(100),
        }
    }
}

/// The program under test, along with where to run it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GoldenCommand {
    program: Utf8PathBuf,
    cwd: Option<Utf8PathBuf>,
}

impl GoldenCommand {
    /// Creates a new command for this program.
    ///
    /// A program without a path separator is looked up on `PATH`.
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            cwd: None,
        }
    }

    /// Sets the working directory of the child.
    pub fn with_cwd(mut self, cwd: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The program that is run.
    pub fn program(&self) -> &Utf8Path {
        &self.program
    }

    /// The working directory of the child, if set.
    pub fn cwd(&self) -> Option<&Utf8Path> {
        self.cwd.as_deref()
    }

    /// Runs the program once for this case.
    ///
    /// The case's scripted input is written to the child's standard input, which is then closed.
    /// Standard output and standard error are drained concurrently while waiting for the child to
    /// exit, so a child that writes a lot to either stream can't stall. A nonzero exit status is
    /// not an error here.
    pub async fn invoke(
        &self,
        case: &GoldenCase,
        settings: &InvokeSettings,
    ) -> Result<InvocationResult, InvokeError> {
        self.invoke_impl(case, settings, None).await
    }

    pub(crate) async fn invoke_impl(
        &self,
        case: &GoldenCase,
        settings: &InvokeSettings,
        mut cancel_rx: Option<&mut watch::Receiver<bool>>,
    ) -> Result<InvocationResult, InvokeError> {
        let mut cmd = std::process::Command::new(self.program.as_std_path());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.env(CASE_NAME_ENV, case.name());

        let stopwatch = crate::time::stopwatch();
        let imp::Child {
            mut child,
            stdin,
            fds,
        } = imp::spawn(cmd).map_err(|error| InvokeError::Spawn {
            program: self.program.clone(),
            error: Arc::new(error),
        })?;
        debug!(
            case = case.name(),
            program = %self.program,
            pid = ?child.id(),
            "spawned child"
        );

        let mut acc = ChildAccumulator::new(fds);
        let mut stdin_fut = pin!(write_script(stdin, case.script_input()));
        let mut stdin_done = false;
        let mut timeout_sleep = pin!(tokio::time::sleep(settings.timeout));
        let mut interrupted = None;

        let wait_res = loop {
            tokio::select! {
                res = &mut stdin_fut, if !stdin_done => {
                    stdin_done = true;
                    res.map_err(|error| InvokeError::WriteStdin {
                        program: self.program.clone(),
                        error: Arc::new(error),
                    })?;
                }
                // Input is written before output is drained: the program reads its whole script
                // before it prints anything.
                () = acc.fill_buf(), if stdin_done && !acc.fds.is_done() => {}
                res = child.wait() => break res,
                () = &mut timeout_sleep => {
                    interrupted = Some(Interrupted::Timeout);
                    break terminate(&mut child, &mut acc, settings.grace_period).await;
                }
                () = cancel_requested(cancel_rx.as_deref_mut()) => {
                    interrupted = Some(Interrupted::Canceled);
                    break terminate(&mut child, &mut acc, settings.grace_period).await;
                }
            }
        };

        let exit_status = wait_res.map_err(|error| InvokeError::Wait {
            program: self.program.clone(),
            error: Arc::new(error),
        })?;
        let leaked = drain_after_exit(&mut acc, settings.leak_timeout).await;
        let snapshot = stopwatch.snapshot();
        debug!(
            case = case.name(),
            ?exit_status,
            leaked,
            time_taken = ?snapshot.duration,
            "child exited"
        );

        let ChildAccumulator { output, errors, .. } = acc;
        let output = output.freeze();
        match interrupted {
            Some(Interrupted::Timeout) => {
                return Err(InvokeError::Timeout {
                    program: self.program.clone(),
                    timeout: settings.timeout,
                    output,
                });
            }
            Some(Interrupted::Canceled) => {
                return Err(InvokeError::Canceled {
                    program: self.program.clone(),
                    output,
                });
            }
            None => {}
        }

        if let Some(error) = errors.into_iter().next() {
            return Err(InvokeError::ReadOutput {
                program: self.program.clone(),
                error,
            });
        }

        Ok(InvocationResult {
            output,
            exit_status,
            start_time: snapshot.start_time,
            time_taken: snapshot.duration,
            leaked,
        })
    }
}

#[derive(Clone, Copy, Debug)]
enum Interrupted {
    Timeout,
    Canceled,
}

async fn write_script(stdin: Option<ChildStdin>, script: String) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };

    match stdin.write_all(script.as_bytes()).await {
        Ok(()) => Ok(()),
        // The child exited without reading all of its input. Whatever it printed is still
        // checked against the golden output.
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => {
            debug!("child closed stdin before reading all input");
            Ok(())
        }
        Err(error) => Err(error),
    }
    // stdin is dropped here, which closes the pipe and signals end of input.
}

async fn terminate(
    child: &mut tokio::process::Child,
    acc: &mut ChildAccumulator,
    grace_period: Duration,
) -> io::Result<ExitStatus> {
    let result = imp::terminate_child(child, acc, grace_period).await;
    debug!(?result, "terminated child");
    child.wait().await
}

/// Keeps reading output after the child has exited, for at most `leak_timeout`.
///
/// Returns true if the pipes were still open when the timeout elapsed.
async fn drain_after_exit(acc: &mut ChildAccumulator, leak_timeout: Duration) -> bool {
    let mut sleep = pin!(tokio::time::sleep(leak_timeout));
    loop {
        if acc.fds.is_done() {
            return false;
        }
        tokio::select! {
            () = acc.fill_buf() => {}
            () = &mut sleep => return true,
        }
    }
}

/// Resolves once cancellation is requested. Never resolves without a receiver.
async fn cancel_requested(cancel_rx: Option<&mut watch::Receiver<bool>>) {
    if let Some(cancel_rx) = cancel_rx {
        let canceled = cancel_rx.wait_for(|canceled| *canceled).await.is_ok();
        if canceled {
            return;
        }
    }
    std::future::pending().await
}
