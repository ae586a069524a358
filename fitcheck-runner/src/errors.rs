// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by fitcheck.

use crate::test_output::CapturedOutput;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt, io, sync::Arc, time::Duration};
use thiserror::Error;

/// An error that occurred while loading a manifest.
#[derive(Debug, Error)]
#[error("failed to parse fitcheck manifest at `{manifest_path}`")]
#[non_exhaustive]
pub struct ManifestParseError {
    manifest_path: Utf8PathBuf,
    #[source]
    kind: ManifestParseErrorKind,
}

impl ManifestParseError {
    pub(crate) fn new(manifest_path: impl Into<Utf8PathBuf>, kind: ManifestParseErrorKind) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            kind,
        }
    }

    /// Returns the path to the manifest that failed to load.
    pub fn manifest_path(&self) -> &Utf8PathBuf {
        &self.manifest_path
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ManifestParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while loading a manifest.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestParseErrorKind {
    /// The manifest file does not exist.
    #[error("manifest file not found")]
    NotFound,

    /// An I/O error occurred while locating the manifest or resolving paths.
    #[error("error resolving manifest paths")]
    Io(#[source] io::Error),

    /// An error occurred while building the layered config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// Neither the manifest nor the command line names a program to run.
    #[error("no program to run: set `program` in the manifest or pass `--program`")]
    ProgramNotSpecified,

    /// `test-threads` was set to zero.
    #[error("`test-threads` must be at least 1")]
    ZeroTestThreads,

    /// A case sets both the inline and the file form of a golden stream.
    #[error("case `{case}` sets both `{key}` and `{key}-file`")]
    InlineAndFile {
        /// The name of the case.
        case: String,
        /// The key, either `stdout` or `stderr`.
        key: &'static str,
    },

    /// A case has no expected standard output.
    #[error("case `{case}` has no expected output: set `stdout` or `stdout-file`")]
    MissingStdout {
        /// The name of the case.
        case: String,
    },

    /// A golden file could not be read.
    #[error("case `{case}`: failed to read golden file `{path}`")]
    GoldenFileRead {
        /// The name of the case.
        case: String,
        /// The path that was read.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// An error that occurred while building a case filter.
#[derive(Clone, Debug, Error)]
#[error("error building case filter from name patterns")]
pub struct CaseFilterBuildError {
    #[from]
    error: aho_corasick::BuildError,
}

/// An error that occurred while reading the output of a child process.
#[derive(Clone, Debug, Error)]
pub enum ChildFdError {
    /// An error occurred while reading standard output.
    #[error("error reading standard output")]
    ReadStdout(#[source] Arc<io::Error>),

    /// An error occurred while reading standard error.
    #[error("error reading standard error")]
    ReadStderr(#[source] Arc<io::Error>),
}

/// An error that prevented a case invocation from producing a complete result.
///
/// A nonzero exit status is not an error at this layer: it is reported through
/// [`InvocationResult`](crate::test_output::InvocationResult) and checked during verification.
#[derive(Clone, Debug, Error)]
pub enum InvokeError {
    /// The program could not be started.
    #[error("failed to spawn `{program}`")]
    Spawn {
        /// The program that was run.
        program: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: Arc<io::Error>,
    },

    /// The scripted input could not be written to the child's standard input.
    #[error("failed to write input to `{program}`")]
    WriteStdin {
        /// The program that was run.
        program: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: Arc<io::Error>,
    },

    /// Waiting for the child to exit failed.
    #[error("failed to wait for `{program}` to exit")]
    Wait {
        /// The program that was run.
        program: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: Arc<io::Error>,
    },

    /// Reading the child's output failed.
    #[error("failed to read output from `{program}`")]
    ReadOutput {
        /// The program that was run.
        program: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: ChildFdError,
    },

    /// The child did not exit within the timeout and was terminated.
    #[error("`{program}` did not exit within {timeout:?} and was terminated")]
    Timeout {
        /// The program that was run.
        program: Utf8PathBuf,
        /// The timeout that elapsed.
        timeout: Duration,
        /// Whatever output was captured before the child was terminated.
        output: CapturedOutput,
    },

    /// The run was canceled while the child was running.
    #[error("run canceled while `{program}` was running")]
    Canceled {
        /// The program that was run.
        program: Utf8PathBuf,
        /// Whatever output was captured before the child was terminated.
        output: CapturedOutput,
    },
}

impl InvokeError {
    /// Returns the output captured before the invocation was cut short, if any.
    pub fn partial_output(&self) -> Option<&CapturedOutput> {
        match self {
            Self::Timeout { output, .. } | Self::Canceled { output, .. } => Some(output),
            Self::Spawn { .. }
            | Self::WriteStdin { .. }
            | Self::Wait { .. }
            | Self::ReadOutput { .. } => None,
        }
    }
}

/// An error that occurred while building a [`GoldenRunner`](crate::runner::GoldenRunner).
#[derive(Debug, Error)]
#[error("error creating async runtime")]
pub struct RunnerBuildError {
    #[from]
    error: io::Error,
}

/// An error that occurred while writing a reporter event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[source] io::Error),

    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: io::Error,
    },

    /// An error occurred while producing JUnit XML.
    #[error("error writing JUnit output to {file}")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// Displays an error along with every error in its source chain.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(error) = source {
            write!(f, "\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
