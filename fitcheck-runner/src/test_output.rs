// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output captured from a case invocation.

use bytes::Bytes;
use chrono::{DateTime, Local};
use std::{borrow::Cow, fmt, process::ExitStatus, time::Duration};

/// Standard output and standard error captured from a child process.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CapturedOutput {
    /// The raw bytes written to standard output.
    pub stdout: Bytes,

    /// The raw bytes written to standard error.
    pub stderr: Bytes,
}

impl CapturedOutput {
    /// Returns standard output as a string, replacing invalid UTF-8 sequences.
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Returns standard error as a string, replacing invalid UTF-8 sequences.
    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// The result of running the program under test once, to completion.
#[derive(Clone, Debug)]
pub struct InvocationResult {
    /// Everything the child wrote.
    pub output: CapturedOutput,

    /// How the child exited.
    pub exit_status: ExitStatus,

    /// When the child was started.
    pub start_time: DateTime<Local>,

    /// How long the child took to run, including draining its output.
    pub time_taken: Duration,

    /// True if the child's output handles were still open after the leak timeout elapsed.
    ///
    /// This typically means the child spawned a grandchild that inherited them.
    pub leaked: bool,
}

impl InvocationResult {
    /// Returns a summary of how the child exited.
    pub fn exit_summary(&self) -> ExitSummary {
        ExitSummary::new(self.exit_status)
    }
}

/// How a child process exited.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitSummary {
    /// The process exited with this code.
    Code(i32),

    /// The process was terminated by this signal.
    #[cfg(unix)]
    Signal(i32),

    /// The process exited in some other way.
    Unknown,
}

impl ExitSummary {
    /// Creates a summary from an exit status.
    pub fn new(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }

        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                use std::os::unix::process::ExitStatusExt;

                match status.signal() {
                    Some(signal) => Self::Signal(signal),
                    None => Self::Unknown,
                }
            } else {
                Self::Unknown
            }
        }
    }

    /// Returns the exit code, if the process exited normally.
    pub fn code(self) -> Option<i32> {
        match self {
            Self::Code(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for ExitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            #[cfg(unix)]
            Self::Signal(signal) => match signal_name(*signal) {
                Some(name) => write!(f, "signal {signal} ({name})"),
                None => write!(f, "signal {signal}"),
            },
            Self::Unknown => write!(f, "unknown exit status"),
        }
    }
}

#[cfg(unix)]
fn signal_name(signal: i32) -> Option<&'static str> {
    match signal {
        libc::SIGHUP => Some("SIGHUP"),
        libc::SIGINT => Some("SIGINT"),
        libc::SIGQUIT => Some("SIGQUIT"),
        libc::SIGILL => Some("SIGILL"),
        libc::SIGABRT => Some("SIGABRT"),
        libc::SIGFPE => Some("SIGFPE"),
        libc::SIGKILL => Some("SIGKILL"),
        libc::SIGSEGV => Some("SIGSEGV"),
        libc::SIGPIPE => Some("SIGPIPE"),
        libc::SIGTERM => Some("SIGTERM"),
        _ => None,
    }
}
