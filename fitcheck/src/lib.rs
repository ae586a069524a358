// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A golden-output regression harness for numeric command-line tools.
//!
//! `fitcheck` reads a suite of cases from a `fitcheck.toml` manifest, runs the program under test
//! once per case and compares what it printed against the golden output recorded in the
//! manifest. See the `fitcheck-runner` crate for the library that does the work.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod exit_codes;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
pub use exit_codes::FitcheckExitCode;
