// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Golden cases: what to feed the program under test, and what it must print back.

use crate::compare::CompareMode;
use std::time::Duration;

/// A single golden-output case.
///
/// A case is built once when a suite is loaded and is never mutated afterwards. The `with_`
/// methods consume the case and are meant for construction only.
#[derive(Clone, Debug, PartialEq)]
pub struct GoldenCase {
    name: String,
    model_name: String,
    data_file_path: String,
    options: Vec<String>,
    expected: ExpectedOutput,
    timeout: Option<Duration>,
    compare: Option<CompareMode>,
    ignore: bool,
}

impl GoldenCase {
    /// Creates a new case that expects empty output on both streams and a successful exit.
    pub fn new(
        name: impl Into<String>,
        model_name: impl Into<String>,
        data_file_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model_name: model_name.into(),
            data_file_path: data_file_path.into(),
            options: Vec::new(),
            expected: ExpectedOutput::default(),
            timeout: None,
            compare: None,
            ignore: false,
        }
    }

    /// Sets the extra option lines written after the model name and data file path.
    pub fn with_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the expected standard output.
    pub fn with_expected_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.expected.stdout = stdout.into();
        self
    }

    /// Sets the expected standard error.
    pub fn with_expected_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.expected.stderr = stderr.into();
        self
    }

    /// Sets the expected exit code.
    pub fn with_expected_exit_code(mut self, exit_code: i32) -> Self {
        self.expected.exit_code = Some(exit_code);
        self
    }

    /// Overrides the suite's timeout for this case.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the suite's comparator for this case.
    pub fn with_compare(mut self, compare: CompareMode) -> Self {
        self.compare = Some(compare);
        self
    }

    /// Marks this case as ignored.
    pub fn with_ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    /// The name of the case.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The model name, written as the first line of input.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The data file path, written verbatim as the second line of input.
    pub fn data_file_path(&self) -> &str {
        &self.data_file_path
    }

    /// Extra option lines.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The expected output.
    pub fn expected(&self) -> &ExpectedOutput {
        &self.expected
    }

    /// The per-case timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The per-case comparator override, if any.
    pub fn compare(&self) -> Option<CompareMode> {
        self.compare
    }

    /// Whether this case is ignored by default.
    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    /// Returns the scripted standard input for this case.
    ///
    /// Every line, including the last, is terminated by `\n`.
    pub fn script_input(&self) -> String {
        let mut input = String::with_capacity(
            self.model_name.len()
                + self.data_file_path.len()
                + self.options.iter().map(|o| o.len() + 1).sum::<usize>()
                + 2,
        );
        for line in self.script_lines() {
            input.push_str(line);
            input.push('\n');
        }
        input
    }

    fn script_lines(&self) -> impl Iterator<Item = &str> {
        [self.model_name.as_str(), self.data_file_path.as_str()]
            .into_iter()
            .chain(self.options.iter().map(String::as_str))
    }
}

/// The golden output of a case.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExpectedOutput {
    /// Expected standard output, byte for byte.
    pub stdout: String,

    /// Expected standard error, typically empty.
    pub stderr: String,

    /// The expected exit code. `None` means a successful exit.
    pub exit_code: Option<i32>,
}

impl ExpectedOutput {
    /// Returns the exit code the program must exit with.
    pub fn exit_code_or_default(&self) -> i32 {
        self.exit_code.unwrap_or(0)
    }
}
