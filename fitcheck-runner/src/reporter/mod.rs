// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report the results of a run in human and machine-readable formats.
//!
//! The main type here is [`TestReporter`], which is constructed via a [`TestReporterBuilder`].

mod displayer;
pub mod events;
mod junit;

use self::{displayer::DisplayReporter, events::TestEvent, junit::JunitReporter};
use crate::{errors::WriteEventError, test_filter::CaseList};
use std::{fmt, io::Write};

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct TestReporterBuilder {
    verbose: bool,
}

impl TestReporterBuilder {
    /// Sets verbose mode, which also reports case starts and skipped cases.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Creates a new reporter for this case list.
    ///
    /// A JUnit report is written at the end of the run if the suite's settings name a path for it.
    pub fn build<'a>(&self, case_list: &CaseList<'a>) -> TestReporter<'a> {
        let suite = case_list.suite();
        let suite_name = suite
            .manifest_path()
            .map_or_else(|| "fitcheck".to_owned(), |path| path.to_string());

        TestReporter {
            display: DisplayReporter::new(self.verbose),
            junit: JunitReporter::new(&suite.settings().junit, &suite_name),
        }
    }
}

/// Functionality to report results to the terminal and to JUnit.
pub struct TestReporter<'a> {
    display: DisplayReporter<'a>,
    junit: Option<JunitReporter>,
}

impl<'a> TestReporter<'a> {
    /// Colorizes output.
    pub fn colorize(&mut self) {
        self.display.colorize();
    }

    /// Reports an event.
    ///
    /// Human-readable output for the event is written to `writer` in one piece.
    pub fn report_event(
        &mut self,
        event: TestEvent<'a>,
        mut writer: impl Write,
    ) -> Result<(), WriteEventError> {
        let mut buf = Vec::new();
        self.display
            .write_event(&event, &mut buf)
            .map_err(WriteEventError::Io)?;
        writer
            .write_all(&buf)
            .and_then(|()| writer.flush())
            .map_err(WriteEventError::Io)?;

        if let Some(junit) = &mut self.junit {
            junit.write_event(&event)?;
        }
        Ok(())
    }
}

impl fmt::Debug for TestReporter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TestReporter")
            .field("junit", &self.junit.is_some())
            .finish_non_exhaustive()
    }
}
