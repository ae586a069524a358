// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core functionality for fitcheck, a golden-output regression harness for numeric command-line
//! tools.
//!
//! A suite of [`GoldenCase`](case::GoldenCase)s is loaded from a manifest. Each case drives the
//! program under test through a scripted standard input, captures both output streams, and
//! compares them against golden text.

#![warn(missing_docs)]

pub mod case;
pub mod compare;
pub mod errors;
pub mod manifest;
pub mod reporter;
pub mod runner;
mod test_command;
pub mod test_filter;
pub mod test_output;
mod time;

pub use test_command::{CASE_NAME_ENV, GoldenCommand, InvokeSettings};
