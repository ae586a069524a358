// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{FitcheckExitCode, output::NO_HEADING_TARGET};
use fitcheck_runner::errors::{
    CaseFilterBuildError, ManifestParseError, RunnerBuildError, WriteEventError,
};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are meant to be printed with display_to_stderr.

/// An error that fitcheck anticipates and reports with a dedicated exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("manifest parse error")]
    ManifestParseError {
        #[from]
        err: ManifestParseError,
    },
    #[error("case filter build error")]
    CaseFilterBuildError {
        #[from]
        err: CaseFilterBuildError,
    },
    #[error("runner build error")]
    RunnerBuildError {
        #[from]
        err: RunnerBuildError,
    },
    #[error("no cases to run")]
    NoCasesRun,
    #[error("case run failed")]
    CaseRunFailed,
    #[error("error writing event")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("error writing case list")]
    WriteCaseListError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ManifestParseError { .. }
            | Self::CaseFilterBuildError { .. }
            | Self::RunnerBuildError { .. } => FitcheckExitCode::SETUP_ERROR,
            Self::NoCasesRun => FitcheckExitCode::NO_CASES_RUN,
            Self::CaseRunFailed => FitcheckExitCode::CASE_RUN_FAILED,
            Self::WriteEventError { .. } | Self::WriteCaseListError { .. } => {
                FitcheckExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr, along with its chain of causes.
    pub fn display_to_stderr(&self) {
        let mut next_error = match self {
            Self::ManifestParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::CaseFilterBuildError { err } => {
                error!("{err}");
                err.source()
            }
            Self::RunnerBuildError { err } => {
                error!("failed to set up the case runner");
                Some(err as &dyn Error)
            }
            Self::NoCasesRun => {
                error!("no cases to run (hint: check the filters, or pass `--run-ignored all`)");
                None
            }
            Self::CaseRunFailed => {
                error!("case run failed");
                None
            }
            Self::WriteEventError { err } => {
                error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::WriteCaseListError { err } => {
                error!("failed to write case list to output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {err}");
            next_error = err.source();
        }
    }
}
