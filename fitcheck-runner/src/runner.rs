// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The core functionality of running golden cases.
//!
//! [`run_case`] runs a single case and checks its output. [`GoldenRunner`] runs a filtered list of
//! cases concurrently and reports [`TestEvent`]s to a callback as they happen.

use crate::{
    case::GoldenCase,
    compare::{Mismatch, MismatchKind},
    errors::{InvokeError, RunnerBuildError},
    manifest::CaseSettings,
    reporter::events::{CancelReason, CaseRunStatus, ExecutionResult, RunStats, TestEvent},
    test_command::GoldenCommand,
    test_filter::{CaseInstance, CaseList, FilterMatch, MismatchReason},
    test_output::InvocationResult,
    time::StopwatchStart,
};
use futures::StreamExt;
use std::{convert::Infallible, marker::PhantomData, num::NonZeroUsize, pin::pin};
use tokio::{
    runtime::Runtime,
    sync::{mpsc, watch},
};
use tracing::{debug, warn};

/// Runs a single case to completion and checks its output against the golden output.
///
/// Failures of every kind are reported through the returned status rather than as errors.
pub async fn run_case(
    command: &GoldenCommand,
    case: &GoldenCase,
    settings: &CaseSettings,
) -> CaseRunStatus {
    run_case_impl(command, case, settings, None).await
}

async fn run_case_impl(
    command: &GoldenCommand,
    case: &GoldenCase,
    settings: &CaseSettings,
    cancel_rx: Option<&mut watch::Receiver<bool>>,
) -> CaseRunStatus {
    let stopwatch = crate::time::stopwatch();
    let res = command
        .invoke_impl(case, &settings.invoke, cancel_rx)
        .await;
    let snapshot = stopwatch.snapshot();

    match res {
        Ok(invocation) => {
            let mismatches = verify(case, settings, &invocation);
            let result = if mismatches.is_empty() {
                ExecutionResult::Pass
            } else {
                ExecutionResult::Fail { mismatches }
            };
            CaseRunStatus {
                result,
                invocation: Some(invocation),
                error: None,
                start_time: snapshot.start_time,
                time_taken: snapshot.duration,
            }
        }
        Err(error) => {
            let result = match &error {
                InvokeError::Timeout { .. } => ExecutionResult::Timeout,
                InvokeError::Canceled { .. } => ExecutionResult::Canceled,
                InvokeError::Spawn { .. }
                | InvokeError::WriteStdin { .. }
                | InvokeError::Wait { .. }
                | InvokeError::ReadOutput { .. } => ExecutionResult::ExecFail,
            };
            CaseRunStatus {
                result,
                invocation: None,
                error: Some(error),
                start_time: snapshot.start_time,
                time_taken: snapshot.duration,
            }
        }
    }
}

/// Checks a completed invocation against a case's golden output.
///
/// Standard error is checked first, then standard output, then the exit status if exit checking is
/// enabled. Every mismatch is returned, not just the first.
pub fn verify(
    case: &GoldenCase,
    settings: &CaseSettings,
    invocation: &InvocationResult,
) -> Vec<Mismatch> {
    let comparator = settings.compare.comparator();
    let expected = case.expected();
    let mut mismatches = Vec::new();

    let streams = [
        (
            MismatchKind::Stderr,
            expected.stderr.as_str(),
            &invocation.output.stderr,
        ),
        (
            MismatchKind::Stdout,
            expected.stdout.as_str(),
            &invocation.output.stdout,
        ),
    ];
    for (kind, expected, actual) in streams {
        if let Err(detail) = comparator.compare(expected, actual) {
            mismatches.push(Mismatch {
                kind,
                expected: expected.to_owned(),
                actual: String::from_utf8_lossy(actual).into_owned(),
                detail: Some(detail),
            });
        }
    }

    if settings.check_exit_status {
        let expected_code = expected.exit_code_or_default();
        let actual = invocation.exit_summary();
        if actual.code() != Some(expected_code) {
            mismatches.push(Mismatch {
                kind: MismatchKind::ExitStatus,
                expected: format!("exit code {expected_code}"),
                actual: actual.to_string(),
                detail: None,
            });
        }
    }

    mismatches
}

/// How the runner should respond to interrupts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SignalHandlerKind {
    /// Cancel the run on Ctrl-C.
    #[default]
    Standard,

    /// Don't listen for interrupts.
    Noop,
}

impl SignalHandlerKind {
    async fn recv(self) {
        match self {
            Self::Standard => {
                if let Err(error) = tokio::signal::ctrl_c().await {
                    warn!("unable to listen for interrupts, Ctrl-C will not cancel the run: {error}");
                    std::future::pending::<()>().await;
                }
            }
            Self::Noop => std::future::pending().await,
        }
    }
}

/// Builder for [`GoldenRunner`].
#[derive(Clone, Debug, Default)]
pub struct GoldenRunnerBuilder {
    test_threads: Option<usize>,
    fail_fast: bool,
}

impl GoldenRunnerBuilder {
    /// Sets the number of cases to run at once, overriding the suite's setting.
    pub fn set_test_threads(&mut self, test_threads: usize) -> &mut Self {
        self.test_threads = Some(test_threads);
        self
    }

    /// Sets whether the run stops starting new cases after the first failure.
    pub fn set_fail_fast(&mut self, fail_fast: bool) -> &mut Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Creates a new runner for this case list.
    pub fn build<'a>(
        self,
        case_list: &'a CaseList<'a>,
        signal_handler: SignalHandlerKind,
    ) -> Result<GoldenRunner<'a>, RunnerBuildError> {
        let test_threads = self
            .test_threads
            .or(case_list.suite().settings().test_threads)
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get))
            .max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("fitcheck-runner-worker")
            .build()?;

        Ok(GoldenRunner {
            case_list,
            test_threads,
            fail_fast: self.fail_fast,
            signal_handler,
            runtime,
        })
    }
}

/// Context for running a list of cases.
#[derive(Debug)]
pub struct GoldenRunner<'a> {
    case_list: &'a CaseList<'a>,
    test_threads: usize,
    fail_fast: bool,
    signal_handler: SignalHandlerKind,
    runtime: Runtime,
}

impl<'a> GoldenRunner<'a> {
    /// The number of cases run at once.
    pub fn test_threads(&self) -> usize {
        self.test_threads
    }

    /// Executes the listed cases, each one in its own process.
    ///
    /// The callback is called with each event as it happens.
    pub fn execute<F>(&self, mut callback: F) -> RunStats
    where
        F: FnMut(TestEvent<'a>),
    {
        self.try_execute::<Infallible, _>(|event| {
            callback(event);
            Ok(())
        })
        .unwrap_or_else(|never| match never {})
    }

    /// Executes the listed cases, each one in its own process.
    ///
    /// Accepts a callback that is called with each event as it happens. If the callback returns an
    /// error, the run is canceled: no new cases are started, and the first error is returned once
    /// running cases have been terminated.
    pub fn try_execute<E, F>(&self, callback: F) -> Result<RunStats, E>
    where
        F: FnMut(TestEvent<'a>) -> Result<(), E>,
    {
        self.runtime.block_on(self.try_execute_impl(callback))
    }

    async fn try_execute_impl<E, F>(&self, callback: F) -> Result<RunStats, E>
    where
        F: FnMut(TestEvent<'a>) -> Result<(), E>,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let mut ctx = CallbackContext::new(callback, self.case_list.run_count(), self.fail_fast);

        // Send the initial event. Nothing has started yet, so there is nothing to cancel if this
        // fails.
        ctx.run_started(self.case_list)?;

        let suite = self.case_list.suite();
        let command = suite.command();
        let fail_fast = self.fail_fast;
        let cancel_tx = &cancel_tx;

        // Each case gets its own sender, so the channel closes once every case is done.
        let units: Vec<_> = self
            .case_list
            .iter()
            .map(|instance| (instance, event_tx.clone(), cancel_rx.clone()))
            .collect();
        drop(event_tx);

        let run_fut = futures::stream::iter(units)
            .map(|(instance, event_tx, mut cancel_rx)| async move {
                if let FilterMatch::Mismatch { reason } = instance.filter_match {
                    // Failure to send means the receiver was dropped.
                    let _ = event_tx.send(InternalEvent::Skipped { instance, reason });
                    return;
                }

                let canceled = *cancel_rx.borrow();
                if canceled {
                    debug!(case = instance.case.name(), "not starting case: run canceled");
                    return;
                }

                let _ = event_tx.send(InternalEvent::Started { instance });
                let settings = suite.settings_for(instance.case);
                let run_status =
                    run_case_impl(command, instance.case, &settings, Some(&mut cancel_rx)).await;
                // Cancel here rather than in the event loop, so that the next queued case sees it.
                if fail_fast && counts_for_fail_fast(&run_status.result) {
                    cancel_tx.send_replace(true);
                }
                let _ = event_tx.send(InternalEvent::Finished {
                    instance,
                    run_status,
                });
            })
            .buffer_unordered(self.test_threads)
            .collect::<()>();
        let mut run_fut = pin!(run_fut);
        let mut run_done = false;

        let mut signal_fut = pin!(self.signal_handler.recv());
        let mut signal_received = false;

        // Stores the first error that occurred. This error is propagated up.
        let mut first_error = None;

        loop {
            let event = tokio::select! {
                () = &mut run_fut, if !run_done => {
                    run_done = true;
                    continue;
                }
                event = event_rx.recv() => match event {
                    Some(event) => event,
                    // All cases have finished.
                    None => break,
                },
                () = &mut signal_fut, if !signal_received => {
                    signal_received = true;
                    InternalEvent::Signal
                }
            };

            if let Err(error) = ctx.handle_event(event) {
                if first_error.is_none() {
                    first_error = Some(error);
                }
                // Ignore errors that happen during error cancellation.
                let _ = ctx.error_cancel();
            }

            if ctx.cancel_state.is_some() {
                cancel_tx.send_replace(true);
            }
        }

        if let Err(error) = ctx.run_finished() {
            if first_error.is_none() {
                first_error = Some(error);
            }
        }

        match first_error {
            None => Ok(ctx.run_stats),
            Some(error) => Err(error),
        }
    }
}

struct CallbackContext<F, E> {
    callback: F,
    stopwatch: StopwatchStart,
    run_stats: RunStats,
    running: usize,
    fail_fast: bool,
    cancel_state: Option<CancelReason>,
    phantom: PhantomData<E>,
}

impl<'a, F, E> CallbackContext<F, E>
where
    F: FnMut(TestEvent<'a>) -> Result<(), E>,
{
    fn new(callback: F, initial_run_count: usize, fail_fast: bool) -> Self {
        Self {
            callback,
            stopwatch: crate::time::stopwatch(),
            run_stats: RunStats {
                initial_run_count,
                ..RunStats::default()
            },
            running: 0,
            fail_fast,
            cancel_state: None,
            phantom: PhantomData,
        }
    }

    fn run_started(&mut self, case_list: &'a CaseList<'a>) -> Result<(), E> {
        (self.callback)(TestEvent::RunStarted { case_list })
    }

    fn handle_event(&mut self, event: InternalEvent<'a>) -> Result<(), E> {
        match event {
            InternalEvent::Started { instance } => {
                self.running += 1;
                (self.callback)(TestEvent::CaseStarted { instance })
            }
            InternalEvent::Finished {
                instance,
                run_status,
            } => {
                self.running -= 1;
                self.run_stats.on_case_finished(&run_status.result);
                let cancel_for_failure =
                    self.fail_fast && counts_for_fail_fast(&run_status.result);

                (self.callback)(TestEvent::CaseFinished {
                    instance,
                    run_status,
                })?;

                if cancel_for_failure {
                    self.begin_cancel(CancelReason::TestFailure)?;
                }
                Ok(())
            }
            InternalEvent::Skipped { instance, reason } => {
                self.run_stats.skipped += 1;
                (self.callback)(TestEvent::CaseSkipped { instance, reason })
            }
            InternalEvent::Signal => self.begin_cancel(CancelReason::Signal),
        }
    }

    fn begin_cancel(&mut self, reason: CancelReason) -> Result<(), E> {
        // A later, more severe reason replaces an earlier one, but the same reason is only
        // reported once.
        if self.cancel_state.is_some_and(|state| state >= reason) {
            return Ok(());
        }
        self.cancel_state = Some(reason);
        (self.callback)(TestEvent::RunBeginCancel {
            running: self.running,
            reason,
        })
    }

    fn error_cancel(&mut self) -> Result<(), E> {
        self.begin_cancel(CancelReason::ReportError)
    }

    fn run_finished(&mut self) -> Result<(), E> {
        let snapshot = self.stopwatch.snapshot();
        (self.callback)(TestEvent::RunFinished {
            start_time: snapshot.start_time,
            elapsed: snapshot.duration,
            run_stats: self.run_stats,
        })
    }
}

fn counts_for_fail_fast(result: &ExecutionResult) -> bool {
    !matches!(result, ExecutionResult::Pass | ExecutionResult::Canceled)
}

#[derive(Debug)]
enum InternalEvent<'a> {
    Started {
        instance: CaseInstance<'a>,
    },
    Finished {
        instance: CaseInstance<'a>,
        run_status: CaseRunStatus,
    },
    Skipped {
        instance: CaseInstance<'a>,
        reason: MismatchReason,
    },
    Signal,
}
