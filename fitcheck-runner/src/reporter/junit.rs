// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from run events.

use super::events::{CaseRunStatus, ExecutionResult, TestEvent};
use crate::{
    errors::{DisplayErrorChain, WriteEventError},
    manifest::JunitSettings,
};
use camino::Utf8PathBuf;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::fs::File;

static PROCESS_FAILED_TO_START: &str = "(process failed to start)";

#[derive(Clone, Debug)]
pub(super) struct JunitReporter {
    path: Utf8PathBuf,
    report_name: String,
    store_success_output: bool,
    store_failure_output: bool,
    test_suite: TestSuite,
}

impl JunitReporter {
    /// Returns `None` if no JUnit path is configured.
    pub(super) fn new(settings: &JunitSettings, suite_name: &str) -> Option<Self> {
        let path = settings.path.clone()?;
        Some(Self {
            path,
            report_name: settings.report_name.clone(),
            store_success_output: settings.store_success_output,
            store_failure_output: settings.store_failure_output,
            test_suite: TestSuite::new(suite_name.to_owned()),
        })
    }

    pub(super) fn write_event(&mut self, event: &TestEvent<'_>) -> Result<(), WriteEventError> {
        match event {
            TestEvent::RunStarted { .. }
            | TestEvent::CaseStarted { .. }
            | TestEvent::RunBeginCancel { .. } => {}
            TestEvent::CaseSkipped { .. } => {
                // Skipped cases are not recorded.
            }
            TestEvent::CaseFinished {
                instance,
                run_status,
            } => {
                let testcase = self.testcase_for(instance.case.name(), run_status);
                self.test_suite.add_test_case(testcase);
            }
            TestEvent::RunFinished {
                start_time,
                elapsed,
                ..
            } => {
                let mut report = Report::new(self.report_name.clone());
                report
                    .set_timestamp(*start_time)
                    .set_time(*elapsed)
                    .add_test_suite(self.test_suite.clone());

                if let Some(junit_dir) = self.path.parent() {
                    std::fs::create_dir_all(junit_dir).map_err(|error| WriteEventError::Fs {
                        file: junit_dir.to_path_buf(),
                        error,
                    })?;
                }

                let f = File::create(&self.path).map_err(|error| WriteEventError::Fs {
                    file: self.path.clone(),
                    error,
                })?;
                report
                    .serialize(f)
                    .map_err(|error| WriteEventError::Junit {
                        file: self.path.clone(),
                        error,
                    })?;
            }
        }

        Ok(())
    }

    fn testcase_for(&self, name: &str, run_status: &CaseRunStatus) -> TestCase {
        let is_success = run_status.result.is_success();
        let status = match &run_status.result {
            ExecutionResult::Pass => TestCaseStatus::success(),
            ExecutionResult::Fail { mismatches } => {
                let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
                let description = mismatches
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n");
                let kinds = mismatches
                    .iter()
                    .map(|mismatch| mismatch.kind.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                status
                    .set_type("output mismatch")
                    .set_message(format!("mismatch in {kinds}"))
                    .set_description(description);
                status
            }
            ExecutionResult::Timeout => {
                self.error_status(NonSuccessKind::Failure, "timeout", run_status)
            }
            ExecutionResult::ExecFail => {
                self.error_status(NonSuccessKind::Error, "execution failure", run_status)
            }
            ExecutionResult::Canceled => {
                self.error_status(NonSuccessKind::Error, "canceled", run_status)
            }
        };

        let mut testcase = TestCase::new(name.to_owned(), status);
        testcase
            .set_classname(self.test_suite.name.clone())
            .set_timestamp(run_status.start_time)
            .set_time(run_status.time_taken);

        let store_output = (self.store_success_output && is_success)
            || (self.store_failure_output && !is_success);
        if store_output {
            match run_status.output() {
                Some(output) => {
                    testcase
                        .set_system_out(output.stdout_lossy().into_owned())
                        .set_system_err(output.stderr_lossy().into_owned());
                }
                None => {
                    testcase
                        .set_system_out(PROCESS_FAILED_TO_START)
                        .set_system_err(PROCESS_FAILED_TO_START);
                }
            }
        }

        testcase
    }

    fn error_status(
        &self,
        kind: NonSuccessKind,
        ty: &str,
        run_status: &CaseRunStatus,
    ) -> TestCaseStatus {
        let mut status = TestCaseStatus::non_success(kind);
        status.set_type(ty.to_owned());
        if let Some(error) = &run_status.error {
            status
                .set_message(error.to_string())
                .set_description(DisplayErrorChain::new(error).to_string());
        }
        status
    }
}
