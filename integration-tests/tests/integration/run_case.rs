// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-case behavior against the fake fitter.

use crate::fixtures::*;
use fitcheck_runner::{
    InvokeSettings,
    case::GoldenCase,
    compare::{CompareMode, MismatchKind, NumericTolerance},
    errors::InvokeError,
    manifest::CaseSettings,
    reporter::events::ExecutionResult,
    runner::run_case,
};
use integration_tests::temp_suite::TempSuite;
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

fn symmetric_nonresonant() -> GoldenCase {
    GoldenCase::new(
        "symmetric-nonresonant",
        "SymmetricNonresonant",
        "data/symmetric-nonresonant.dat",
    )
    .with_expected_stdout(SYMMETRIC_NONRESONANT_STDOUT)
}

fn mismatch_kinds(result: &ExecutionResult) -> Vec<MismatchKind> {
    match result {
        ExecutionResult::Fail { mismatches } => mismatches.iter().map(|m| m.kind).collect(),
        other => panic!("expected a failed case, found {other:?}"),
    }
}

#[tokio::test]
async fn symmetric_nonresonant_matches_golden() {
    let suite = TempSuite::molstat_demo().unwrap();
    let command = fake_command(suite.root());

    let status = run_case(&command, &symmetric_nonresonant(), &CaseSettings::default()).await;

    assert!(matches!(status.result, ExecutionResult::Pass), "{status:?}");
    let invocation = status.invocation.expect("the fitter ran to completion");
    assert_eq!(
        invocation.output.stdout_lossy(),
        SYMMETRIC_NONRESONANT_STDOUT
    );
    assert_eq!(invocation.output.stderr_lossy(), "");
    assert_eq!(invocation.exit_summary().code(), Some(0));
    assert!(!invocation.leaked);
}

#[tokio::test]
async fn repeated_invocations_are_identical() {
    let suite = TempSuite::molstat_demo().unwrap();
    let command = fake_command(suite.root());
    let case = symmetric_nonresonant();

    let mut outputs = Vec::new();
    for _ in 0..3 {
        let invocation = command
            .invoke(&case, &InvokeSettings::default())
            .await
            .expect("the fitter ran to completion");
        outputs.push(invocation.output.stdout);
    }

    assert!(
        outputs.windows(2).all(|pair| pair[0] == pair[1]),
        "every invocation printed the same thing: {outputs:?}"
    );
}

#[tokio::test]
async fn single_digit_change_fails() {
    let suite = TempSuite::molstat_demo().unwrap();
    let command = fake_command(suite.root());
    let case = symmetric_nonresonant().with_expected_stdout(
        "Resid = 1.599687e+04\nc=5.9267e+01, d=9.8775e+00, norm=1.0206e+05\n",
    );

    let status = run_case(&command, &case, &CaseSettings::default()).await;

    assert_eq!(mismatch_kinds(&status.result), [MismatchKind::Stdout]);
    let ExecutionResult::Fail { mismatches } = &status.result else {
        unreachable!("checked above");
    };
    let detail = mismatches[0].detail.as_ref().expect("stdout mismatches carry detail");
    assert_eq!(detail.line, 2);
    // The full text is kept for reporting.
    assert_eq!(mismatches[0].actual, SYMMETRIC_NONRESONANT_STDOUT);
}

#[tokio::test]
async fn missing_data_file_is_a_mismatch() {
    let suite = TempSuite::molstat_demo().unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new("missing", "SymmetricNonresonant", "data/nonexistent.dat")
        .with_expected_stdout(SYMMETRIC_NONRESONANT_STDOUT);

    let status = run_case(&command, &case, &CaseSettings::default()).await;

    // The fitter exits successfully after reporting the error, so only the streams differ.
    assert_eq!(
        mismatch_kinds(&status.result),
        [MismatchKind::Stderr, MismatchKind::Stdout]
    );
    let output = status.output().expect("output was captured");
    assert_eq!(
        output.stderr_lossy(),
        "Error opening data/nonexistent.dat for input.\n"
    );
    assert_eq!(output.stdout_lossy(), "");
}

#[tokio::test]
async fn missing_data_file_matches_error_golden() {
    let suite = TempSuite::molstat_demo().unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new("missing", "SymmetricNonresonant", "data/nonexistent.dat")
        .with_expected_stdout("")
        .with_expected_stderr("Error opening data/nonexistent.dat for input.\n");

    let status = run_case(&command, &case, &CaseSettings::default()).await;

    assert!(matches!(status.result, ExecutionResult::Pass), "{status:?}");
}

#[tokio::test]
async fn hung_fitter_times_out() {
    let suite = TempSuite::new().unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new("hang", "Hang", "data.dat").with_expected_stdout("");

    let start = Instant::now();
    let status = run_case(&command, &case, &short_timeout_settings()).await;
    let elapsed = start.elapsed();

    assert!(matches!(status.result, ExecutionResult::Timeout), "{status:?}");
    assert!(
        matches!(status.error, Some(InvokeError::Timeout { .. })),
        "timeout error recorded: {:?}",
        status.error
    );
    assert!(
        elapsed < Duration::from_secs(20),
        "the runner didn't wait for the fitter to exit on its own (took {elapsed:?})"
    );
}

#[tokio::test]
async fn empty_data_file_fails_quickly() {
    let suite = TempSuite::new().unwrap();
    suite.write_file("data/empty.dat", "").unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new("empty", "SymmetricNonresonant", "data/empty.dat")
        .with_expected_stdout(SYMMETRIC_NONRESONANT_STDOUT);

    let status = run_case(&command, &case, &CaseSettings::default()).await;

    assert_eq!(
        mismatch_kinds(&status.result),
        [
            MismatchKind::Stderr,
            MismatchKind::Stdout,
            MismatchKind::ExitStatus
        ]
    );
    let output = status.output().expect("output was captured");
    assert_eq!(
        output.stderr_lossy(),
        "Error: no data points in data/empty.dat.\n"
    );
}

#[tokio::test]
async fn malformed_data_file_fails_quickly() {
    let suite = TempSuite::new().unwrap();
    suite
        .write_file("data/bad.dat", "1.0e-3 0.5\nnot a number\n")
        .unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new("bad", "SymmetricNonresonant", "data/bad.dat")
        .with_expected_stdout(SYMMETRIC_NONRESONANT_STDOUT);

    let status = run_case(&command, &case, &CaseSettings::default()).await;

    assert_eq!(mismatch_kinds(&status.result).len(), 3, "{status:?}");
    let output = status.output().expect("output was captured");
    assert_eq!(
        output.stderr_lossy(),
        "Error: malformed data on line 2 of data/bad.dat.\n"
    );
}

#[tokio::test]
async fn large_output_on_both_streams_does_not_deadlock() {
    let suite = TempSuite::new().unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new("flood", "Flood", "unused.dat").with_options(["bytes 8388608"]);

    let invocation = command
        .invoke(&case, &InvokeSettings::default())
        .await
        .expect("the fitter ran to completion");

    assert!(invocation.output.stdout.len() >= 8 * 1024 * 1024);
    assert_eq!(
        invocation.output.stdout.len(),
        invocation.output.stderr.len(),
        "both streams were drained completely"
    );
}

#[tokio::test]
async fn missing_program_is_exec_fail() {
    let suite = TempSuite::new().unwrap();
    let command = fitcheck_runner::GoldenCommand::new(suite.root().join("no-such-fitter"));

    let status = run_case(&command, &symmetric_nonresonant(), &CaseSettings::default()).await;

    assert!(matches!(status.result, ExecutionResult::ExecFail), "{status:?}");
    assert!(
        matches!(status.error, Some(InvokeError::Spawn { .. })),
        "spawn error recorded: {:?}",
        status.error
    );
    assert!(status.invocation.is_none());
}

#[tokio::test]
async fn expected_exit_code_is_checked() {
    let suite = TempSuite::new().unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new("crash", "Crash", "unused.dat")
        .with_expected_stdout("")
        .with_expected_stderr("fatal: the fitter crashed\n");

    let status = run_case(&command, &case, &CaseSettings::default()).await;
    assert_eq!(mismatch_kinds(&status.result), [MismatchKind::ExitStatus]);

    let status = run_case(
        &command,
        &case.clone().with_expected_exit_code(3),
        &CaseSettings::default(),
    )
    .await;
    assert!(matches!(status.result, ExecutionResult::Pass), "{status:?}");
}

#[tokio::test]
async fn options_are_written_one_per_line() {
    let suite = TempSuite::new().unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new("echo", "Echo", "symmetric-nonresonant.dat")
        .with_options(["print", "guess c 60. d 10. norm 1.e4"])
        .with_expected_stdout(
            "Echo\nsymmetric-nonresonant.dat\nprint\nguess c 60. d 10. norm 1.e4\n",
        );

    let status = run_case(&command, &case, &CaseSettings::default()).await;

    assert!(matches!(status.result, ExecutionResult::Pass), "{status:?}");
}

#[tokio::test]
async fn numeric_comparison_tolerates_last_digit_drift() {
    let suite = TempSuite::molstat_demo().unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new(
        "asymmetric-resonant",
        "AsymmetricResonant",
        "data/asymmetric-resonant.dat",
    )
    .with_expected_stdout(
        "Resid = 4.895160e+00\n\
         gammaL=1.7085e+01, gammaR=1.1731e+01, r=2.5489e+01, norm=8.2640e+00\n",
    );

    let exact = run_case(&command, &case, &CaseSettings::default()).await;
    assert_eq!(mismatch_kinds(&exact.result), [MismatchKind::Stdout]);

    let settings = CaseSettings {
        compare: CompareMode::Numeric(NumericTolerance {
            rel_tol: 1e-4,
            abs_tol: 0.0,
        }),
        ..CaseSettings::default()
    };
    let numeric = run_case(&command, &case, &settings).await;
    assert!(matches!(numeric.result, ExecutionResult::Pass), "{numeric:?}");

    // The golden output itself always passes.
    let golden = case.with_expected_stdout(ASYMMETRIC_RESONANT_STDOUT);
    let status = run_case(&command, &golden, &CaseSettings::default()).await;
    assert!(matches!(status.result, ExecutionResult::Pass), "{status:?}");
}

#[tokio::test]
async fn print_option_shows_iteration_transcript() {
    let suite = TempSuite::molstat_demo().unwrap();
    let command = fake_command(suite.root());
    let case = GoldenCase::new(
        "fit-options-symmetric-resonant",
        "SymmetricResonant",
        "data/symmetric-resonant.dat",
    )
    .with_options(["print", "guess gamma 8. norm 3."])
    .with_expected_stdout(indoc::indoc! {"
        Iter=  0, gamma=8.0000e+00, norm=3.0000e+00
        Iter=  1, gamma=1.0225e+01, norm=3.8700e+00
        Iter=  2, gamma=9.9417e+00, norm=3.9589e+00
        Iter=  3, gamma=9.9460e+00, norm=3.9567e+00
        Iter=  4, gamma=9.9462e+00, norm=3.9567e+00
        Residual = 4.310146e-01

        Resid = 4.310146e-01
        gamma=9.9462e+00, norm=3.9567e+00
    "});

    let status = run_case(&command, &case, &CaseSettings::default()).await;
    assert!(matches!(status.result, ExecutionResult::Pass), "{status:?}");

    // Without `print`, only the final result is written.
    let quiet = case.with_options(["noprint", "guess gamma 8. norm 3."]);
    let status = run_case(&command, &quiet, &CaseSettings::default()).await;
    let ExecutionResult::Fail { mismatches } = &status.result else {
        panic!("transcript is missing: {status:?}");
    };
    assert_eq!(
        mismatches[0].actual,
        "Resid = 4.310146e-01\ngamma=9.9462e+00, norm=3.9567e+00\n"
    );
    let detail = mismatches[0].detail.as_ref().expect("stdout mismatches carry detail");
    assert_eq!(detail.line, 1);
}
