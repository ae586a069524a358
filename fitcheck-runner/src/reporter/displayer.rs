// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable terminal output for a run.

use super::events::{CancelReason, CaseRunStatus, ExecutionResult, RunStats, TestEvent};
use crate::{
    compare::{Mismatch, MismatchKind},
    errors::DisplayErrorChain,
    test_filter::CaseInstance,
};
use owo_colors::{OwoColorize, Style};
use std::{io, io::Write, time::Duration};

pub(super) struct DisplayReporter<'a> {
    verbose: bool,
    styles: Box<Styles>,
    cancel_status: Option<CancelReason>,
    final_failures: Vec<(CaseInstance<'a>, &'static str, Duration)>,
}

impl<'a> DisplayReporter<'a> {
    pub(super) fn new(verbose: bool) -> Self {
        Self {
            verbose,
            styles: Box::default(),
            cancel_status: None,
            final_failures: Vec::new(),
        }
    }

    pub(super) fn colorize(&mut self) {
        self.styles.colorize();
    }

    pub(super) fn write_event(
        &mut self,
        event: &TestEvent<'a>,
        mut writer: impl Write,
    ) -> io::Result<()> {
        match event {
            TestEvent::RunStarted { case_list } => {
                write!(writer, "{:>12} ", "Starting".style(self.styles.pass))?;
                write!(
                    writer,
                    "{} cases",
                    case_list.run_count().style(self.styles.count)
                )?;
                if let Some(manifest_path) = case_list.suite().manifest_path() {
                    write!(writer, " from {manifest_path}")?;
                }

                let skip_count = case_list.skip_count();
                if skip_count > 0 {
                    write!(writer, " ({} skipped)", skip_count.style(self.styles.count))?;
                }

                writeln!(writer)?;

                if self.verbose {
                    let command = case_list.suite().command();
                    write!(
                        writer,
                        "{:>12} {}",
                        "Program".style(self.styles.pass),
                        command.program()
                    )?;
                    if let Some(cwd) = command.cwd() {
                        write!(writer, " (in {cwd})")?;
                    }
                    writeln!(writer)?;
                }
            }
            TestEvent::CaseStarted { instance } => {
                if self.verbose {
                    // The spacing is to align case names.
                    write!(writer, "{:>12}             ", "START".style(self.styles.pass))?;
                    self.write_instance(*instance, &mut writer)?;
                    writeln!(writer)?;
                }
            }
            TestEvent::CaseFinished {
                instance,
                run_status,
            } => {
                let label = run_status.result.label();
                let style = match &run_status.result {
                    ExecutionResult::Pass => self.styles.pass,
                    ExecutionResult::Canceled => self.styles.skip,
                    ExecutionResult::Fail { .. }
                    | ExecutionResult::Timeout
                    | ExecutionResult::ExecFail => self.styles.fail,
                };
                write!(writer, "{:>12} ", label.style(style))?;
                self.write_duration(run_status.time_taken, &mut writer)?;
                self.write_instance(*instance, &mut writer)?;
                if run_status.leaked() {
                    write!(writer, " {}", "(leaked output handles)".style(self.styles.skip))?;
                }
                writeln!(writer)?;

                if !run_status.result.is_success() {
                    // Don't print out failures after Ctrl-C.
                    if self.cancel_status < Some(CancelReason::Signal) {
                        self.write_run_status(*instance, run_status, &mut writer)?;
                    }
                    self.final_failures
                        .push((*instance, label, run_status.time_taken));
                }
            }
            TestEvent::CaseSkipped { instance, reason } => {
                if self.verbose {
                    write!(writer, "{:>12} ", "SKIP".style(self.styles.skip))?;
                    // same spacing [   0.034s]
                    write!(writer, "[         ] ")?;
                    self.write_instance(*instance, &mut writer)?;
                    writeln!(writer, ": {reason}")?;
                }
            }
            TestEvent::RunBeginCancel { running, reason } => {
                self.cancel_status = self.cancel_status.max(Some(*reason));

                write!(writer, "{:>12} ", "Canceling".style(self.styles.fail))?;
                let reason_str = match reason {
                    CancelReason::TestFailure => "case failure",
                    CancelReason::ReportError => "error",
                    CancelReason::Signal => "signal",
                };
                writeln!(
                    writer,
                    "due to {}: {} cases still running",
                    reason_str.style(self.styles.fail),
                    running.style(self.styles.count)
                )?;
            }
            TestEvent::RunFinished {
                start_time: _start_time,
                elapsed,
                run_stats,
            } => {
                self.write_summary(*elapsed, run_stats, &mut writer)?;

                for (instance, label, time_taken) in &self.final_failures {
                    write!(writer, "{:>12} ", label.style(self.styles.fail))?;
                    self.write_duration(*time_taken, &mut writer)?;
                    self.write_instance(*instance, &mut writer)?;
                    writeln!(writer)?;
                }
            }
        }

        Ok(())
    }

    fn write_summary(
        &self,
        elapsed: Duration,
        run_stats: &RunStats,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let summary_style = if run_stats.is_success() {
            self.styles.pass
        } else {
            self.styles.fail
        };
        writeln!(writer, "{}", "------------".style(summary_style))?;
        write!(writer, "{:>12} ", "Summary".style(summary_style))?;
        self.write_duration(elapsed, &mut writer)?;

        write!(
            writer,
            "{}",
            run_stats.finished_count.style(self.styles.count)
        )?;
        if run_stats.finished_count != run_stats.initial_run_count {
            write!(
                writer,
                "/{}",
                run_stats.initial_run_count.style(self.styles.count)
            )?;
        }
        write!(
            writer,
            " cases run: {} {}, ",
            run_stats.passed.style(self.styles.count),
            "passed".style(self.styles.pass)
        )?;

        for (count, label) in [
            (run_stats.failed, "failed"),
            (run_stats.timed_out, "timed out"),
            (run_stats.exec_failed, "exec failed"),
            (run_stats.canceled, "canceled"),
        ] {
            if count > 0 {
                write!(
                    writer,
                    "{} {}, ",
                    count.style(self.styles.count),
                    label.style(self.styles.fail)
                )?;
            }
        }

        writeln!(
            writer,
            "{} {}",
            run_stats.skipped.style(self.styles.count),
            "skipped".style(self.styles.skip)
        )
    }

    fn write_instance(&self, instance: CaseInstance<'a>, mut writer: impl Write) -> io::Result<()> {
        write!(writer, "{}", instance.case.name().style(self.styles.case_name))
    }

    fn write_duration(&self, duration: Duration, mut writer: impl Write) -> io::Result<()> {
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(writer, "[{:>8.3}s] ", duration.as_secs_f64())
    }

    fn write_run_status(
        &self,
        instance: CaseInstance<'a>,
        run_status: &CaseRunStatus,
        mut writer: impl Write,
    ) -> io::Result<()> {
        if let ExecutionResult::Fail { mismatches } = &run_status.result {
            for mismatch in mismatches {
                self.write_mismatch(instance, mismatch, &mut writer)?;
            }
            return writeln!(writer);
        }

        if let Some(error) = &run_status.error {
            self.write_header("ERROR", instance, &mut writer)?;
            writeln!(writer, "{}", DisplayErrorChain::new(error))?;
        }
        // Output captured before a timeout is often the most useful clue.
        if let Some(output) = run_status.output() {
            if !output.stdout.is_empty() {
                self.write_header("STDOUT", instance, &mut writer)?;
                self.write_text(&output.stdout_lossy(), &mut writer)?;
            }
            if !output.stderr.is_empty() {
                self.write_header("STDERR", instance, &mut writer)?;
                self.write_text(&output.stderr_lossy(), &mut writer)?;
            }
        }

        writeln!(writer)
    }

    fn write_mismatch(
        &self,
        instance: CaseInstance<'a>,
        mismatch: &Mismatch,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let (header, expected_header, actual_header) = match mismatch.kind {
            MismatchKind::Stdout => ("STDOUT MISMATCH", "expected stdout", "actual stdout"),
            MismatchKind::Stderr => ("STDERR MISMATCH", "expected stderr", "actual stderr"),
            MismatchKind::ExitStatus => {
                self.write_header("EXIT STATUS MISMATCH", instance, &mut writer)?;
                return writeln!(
                    writer,
                    "expected {}, found {}",
                    mismatch.expected.style(self.styles.pass_output),
                    mismatch.actual.style(self.styles.fail_output),
                );
            }
        };

        self.write_header(header, instance, &mut writer)?;
        if let Some(detail) = &mismatch.detail {
            writeln!(writer, "{detail}")?;
        }
        writeln!(writer, "{}", format!("--- {expected_header} ---").style(self.styles.pass))?;
        self.write_text(&mismatch.expected, &mut writer)?;
        writeln!(writer, "{}", format!("--- {actual_header} ---").style(self.styles.fail))?;
        self.write_text(&mismatch.actual, &mut writer)
    }

    fn write_header(
        &self,
        header: &str,
        instance: CaseInstance<'a>,
        mut writer: impl Write,
    ) -> io::Result<()> {
        write!(writer, "\n{} ", format!("--- {header}:").style(self.styles.fail))?;
        self.write_instance(instance, &mut writer)?;
        writeln!(writer, "{}", " ---".style(self.styles.fail))
    }

    /// Writes text verbatim, noting when it is empty or lacks a final newline.
    fn write_text(&self, text: &str, mut writer: impl Write) -> io::Result<()> {
        if text.is_empty() {
            return writeln!(writer, "{}", "(empty)".style(self.styles.note));
        }
        writer.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            writeln!(writer)?;
            writeln!(writer, "{}", "(no newline at end of output)".style(self.styles.note))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    pass_output: Style,
    fail_output: Style,
    skip: Style,
    note: Style,
    case_name: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.pass_output = Style::new().green();
        self.fail_output = Style::new().magenta();
        self.skip = Style::new().yellow().bold();
        self.note = Style::new().dimmed();
        self.case_name = Style::new().blue().bold();
    }
}
