// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers shared by fitcheck's end-to-end tests.

pub mod fitcheck_cli;
pub mod temp_suite;
