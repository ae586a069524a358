// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A copy of fitcheck's main.rs, built as part of this package so that tests can find it through
//! `CARGO_BIN_EXE_fitcheck-dup`.

use color_eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    fitcheck::main_impl()
}
