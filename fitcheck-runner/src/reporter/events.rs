// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events produced while running a suite, and the results they carry.

use crate::{
    compare::Mismatch,
    errors::InvokeError,
    test_filter::{CaseInstance, CaseList, MismatchReason},
    test_output::{CapturedOutput, InvocationResult},
};
use chrono::{DateTime, Local};
use std::time::Duration;

/// An event that occurred during a run.
#[derive(Clone, Debug)]
pub enum TestEvent<'a> {
    /// The run started.
    RunStarted {
        /// The list of cases that will be run.
        case_list: &'a CaseList<'a>,
    },

    /// A case started running.
    CaseStarted {
        /// The case that started.
        instance: CaseInstance<'a>,
    },

    /// A case finished running.
    CaseFinished {
        /// The case that finished.
        instance: CaseInstance<'a>,

        /// Information about how the case ran.
        run_status: CaseRunStatus,
    },

    /// A case was skipped.
    CaseSkipped {
        /// The case that was skipped.
        instance: CaseInstance<'a>,

        /// The reason the case was skipped.
        reason: MismatchReason,
    },

    /// A cancellation notice was received.
    RunBeginCancel {
        /// The number of cases still running.
        running: usize,

        /// The reason this run was canceled.
        reason: CancelReason,
    },

    /// The run finished.
    RunFinished {
        /// The time at which the run was started.
        start_time: DateTime<Local>,

        /// The amount of time it took for the cases to run.
        elapsed: Duration,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}

/// The reason why a run is being canceled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CancelReason {
    /// A case failed and fail-fast is enabled.
    TestFailure,

    /// An error occurred while reporting results.
    ReportError,

    /// An interrupt was received.
    Signal,
}

/// The outcome of running a case.
#[derive(Clone, Debug)]
pub enum ExecutionResult {
    /// Every stream and the exit status matched.
    Pass,

    /// The case ran to completion, but its result didn't match the golden output.
    Fail {
        /// Every mismatch, in the order stderr, stdout, exit status.
        mismatches: Vec<Mismatch>,
    },

    /// The case didn't finish within its timeout and was terminated.
    Timeout,

    /// The program could not be run, or its output could not be collected.
    ExecFail,

    /// The run was canceled while this case was running.
    Canceled,
}

impl ExecutionResult {
    /// Returns true if the case passed.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// A short, uppercase label for this result.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail { .. } => "FAIL",
            Self::Timeout => "TIMEOUT",
            Self::ExecFail => "EXECFAIL",
            Self::Canceled => "CANCEL",
        }
    }
}

/// Information about a case that finished running.
#[derive(Clone, Debug)]
pub struct CaseRunStatus {
    /// The outcome of the case.
    pub result: ExecutionResult,

    /// The completed invocation, if the program ran to completion.
    pub invocation: Option<InvocationResult>,

    /// The error that cut the invocation short, for timeouts, cancellations and execution
    /// failures.
    pub error: Option<InvokeError>,

    /// When the case started.
    pub start_time: DateTime<Local>,

    /// How long the case took.
    pub time_taken: Duration,
}

impl CaseRunStatus {
    /// Returns whatever output was captured, whether or not the program ran to completion.
    pub fn output(&self) -> Option<&CapturedOutput> {
        match (&self.invocation, &self.error) {
            (Some(invocation), _) => Some(&invocation.output),
            (None, Some(error)) => error.partial_output(),
            (None, None) => None,
        }
    }

    /// Returns true if the program's output handles were still open after it exited.
    pub fn leaked(&self) -> bool {
        self.invocation
            .as_ref()
            .is_some_and(|invocation| invocation.leaked)
    }
}

/// Statistics for a run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of cases that were expected to be run at the beginning.
    ///
    /// If the run is canceled, this will be more than `finished_count`.
    pub initial_run_count: usize,

    /// The total number of cases that finished running.
    pub finished_count: usize,

    /// The number of cases that passed.
    pub passed: usize,

    /// The number of cases whose output didn't match.
    pub failed: usize,

    /// The number of cases that timed out.
    pub timed_out: usize,

    /// The number of cases that couldn't be run.
    pub exec_failed: usize,

    /// The number of cases that were canceled while running.
    pub canceled: usize,

    /// The number of cases that were skipped.
    pub skipped: usize,
}

impl RunStats {
    /// Returns true if this run is considered a success.
    ///
    /// A run is a failure if any of the following are true:
    /// * the run was canceled: the initial run count is greater than the finished count
    /// * any cases failed, timed out, couldn't be run, or were canceled
    pub fn is_success(&self) -> bool {
        if self.initial_run_count > self.finished_count {
            return false;
        }
        self.failed_count() == 0
    }

    /// The number of cases that finished without passing.
    pub fn failed_count(&self) -> usize {
        self.failed + self.timed_out + self.exec_failed + self.canceled
    }

    pub(crate) fn on_case_finished(&mut self, result: &ExecutionResult) {
        self.finished_count += 1;
        match result {
            ExecutionResult::Pass => self.passed += 1,
            ExecutionResult::Fail { .. } => self.failed += 1,
            ExecutionResult::Timeout => self.timed_out += 1,
            ExecutionResult::ExecFail => self.exec_failed += 1,
            ExecutionResult::Canceled => self.canceled += 1,
        }
    }
}
