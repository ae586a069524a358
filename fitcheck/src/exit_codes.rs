// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `fitcheck` failures.
///
/// Unknown or unexpected failures always result in exit code 1.
pub enum FitcheckExitCode {}

impl FitcheckExitCode {
    /// Every selected case passed.
    pub const OK: i32 = 0;

    /// No cases were selected to run, but no other errors occurred.
    pub const NO_CASES_RUN: i32 = 4;

    /// One or more cases failed, timed out, couldn't be run, or the run was canceled.
    pub const CASE_RUN_FAILED: i32 = 100;

    /// An error occurred while loading the manifest or interpreting arguments.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing results to the terminal or to a report file failed.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
