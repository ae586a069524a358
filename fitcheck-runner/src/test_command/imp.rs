// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{errors::ChildFdError, test_output::CapturedOutput};
use bytes::BytesMut;
use std::{io, process::Stdio, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child as TokioChild, ChildStderr, ChildStdin, ChildStdout},
};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        #[path = "unix.rs"]
        mod unix;
        use unix as os;
    } else if #[cfg(windows)] {
        #[path = "windows.rs"]
        mod windows;
        use windows as os;
    } else {
        compile_error!("unsupported target platform");
    }
}

pub(crate) use os::terminate_child;

/// A spawned child process along with its pipes.
pub(crate) struct Child {
    pub(crate) child: TokioChild,
    pub(crate) stdin: Option<ChildStdin>,
    pub(crate) fds: ChildFds,
}

pub(crate) fn spawn(mut cmd: std::process::Command) -> io::Result<Child> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    os::set_process_group(&mut cmd);

    let mut cmd: tokio::process::Command = cmd.into();
    // If the invoking future is dropped (for example because the whole run was torn down), the
    // child must not outlive it.
    cmd.kill_on_drop(true);
    let mut child = cmd.spawn()?;

    let stdin = child.stdin.take();
    let fds = ChildFds::new(child.stdout.take(), child.stderr.take());

    Ok(Child { child, stdin, fds })
}

/// How a child was terminated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum TerminateChildResult {
    /// The child exited on its own within the grace period.
    Exited,
    /// The child was killed.
    Killed,
}

/// The size of each buffered reader's buffer, and the initial capacity of each output buffer.
const CHUNK_SIZE: usize = 4 * 1024;

/// A `BufReader` over an `AsyncRead` that tracks whether it has reached end of file.
pub(crate) struct FusedBufReader<R> {
    reader: BufReader<R>,
    done: bool,
}

impl<R: AsyncRead + Unpin> FusedBufReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(CHUNK_SIZE, reader),
            done: false,
        }
    }

    async fn fill_buf(&mut self, acc: &mut BytesMut) -> Result<(), io::Error> {
        if self.done {
            return Ok(());
        }

        match self.reader.fill_buf().await {
            Ok(buf) => {
                acc.extend_from_slice(buf);
                if buf.is_empty() {
                    self.done = true;
                }
                let len = buf.len();
                self.reader.consume(len);
                Ok(())
            }
            Err(error) => {
                self.done = true;
                Err(error)
            }
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

async fn fill_buf_opt<R: AsyncRead + Unpin>(
    reader: Option<&mut FusedBufReader<R>>,
    acc: &mut BytesMut,
) -> Result<(), io::Error> {
    match reader {
        Some(reader) => reader.fill_buf(acc).await,
        None => Ok(()),
    }
}

fn is_done_opt<R: AsyncRead + Unpin>(reader: Option<&FusedBufReader<R>>) -> bool {
    reader.is_none_or(|r| r.is_done())
}

/// Output and read errors accumulated for a child process.
pub(crate) struct ChildAccumulator {
    pub(crate) fds: ChildFds,
    pub(crate) output: ChildOutputMut,
    pub(crate) errors: Vec<ChildFdError>,
}

impl ChildAccumulator {
    pub(crate) fn new(fds: ChildFds) -> Self {
        Self {
            fds,
            output: ChildOutputMut::default(),
            errors: Vec::new(),
        }
    }

    pub(crate) async fn fill_buf(&mut self) {
        if let Err(error) = self.fds.fill_buf(&mut self.output).await {
            self.errors.push(error);
        }
    }
}

/// The child's stdout and stderr pipes.
pub(crate) struct ChildFds {
    stdout: Option<FusedBufReader<ChildStdout>>,
    stderr: Option<FusedBufReader<ChildStderr>>,
}

impl ChildFds {
    fn new(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> Self {
        Self {
            stdout: stdout.map(FusedBufReader::new),
            stderr: stderr.map(FusedBufReader::new),
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        is_done_opt(self.stdout.as_ref()) && is_done_opt(self.stderr.as_ref())
    }

    /// Reads whatever is available on either pipe into `acc`.
    ///
    /// This is one step of collecting the child's output. It is cancel-safe, since
    /// [`AsyncBufReadExt::fill_buf`] is cancel-safe, so it can sit in a `select!` next to
    /// waiting for the child, a timeout, and cancellation.
    async fn fill_buf(&mut self, acc: &mut ChildOutputMut) -> Result<(), ChildFdError> {
        let Self { stdout, stderr } = self;
        tokio::select! {
            res = fill_buf_opt(stdout.as_mut(), &mut acc.stdout), if !is_done_opt(stdout.as_ref()) => {
                res.map_err(|error| ChildFdError::ReadStdout(Arc::new(error)))
            }
            res = fill_buf_opt(stderr.as_mut(), &mut acc.stderr), if !is_done_opt(stderr.as_ref()) => {
                res.map_err(|error| ChildFdError::ReadStderr(Arc::new(error)))
            }
            else => Ok(()),
        }
    }
}

/// The output of a child process that's currently being collected.
#[derive(Default)]
pub(crate) struct ChildOutputMut {
    stdout: BytesMut,
    stderr: BytesMut,
}

impl ChildOutputMut {
    /// Marks the collection as done.
    pub(crate) fn freeze(self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout.freeze(),
            stderr: self.stderr.freeze(),
        }
    }
}
