// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests
//!
//! These tests run fitcheck against `fake-fitter`, a stand-in for molstat-fitter that prints
//! canned fit results and can be told to hang, crash or flood its output streams.
//!
//! The CLI is exercised through `fitcheck-dup`, a copy of fitcheck's main.rs that is built as part
//! of this package so that Cargo exposes its path as `CARGO_BIN_EXE_fitcheck-dup`.

use fitcheck::FitcheckExitCode;
use fixtures::*;
use integration_tests::temp_suite::TempSuite;
use pretty_assertions::assert_eq;
use regex::Regex;

mod fixtures;
mod run_case;
mod run_suite;

#[test]
fn test_run_demo_suite() {
    let suite = TempSuite::molstat_demo().unwrap();

    let output = fitcheck_cli()
        .args([
            "run",
            "--manifest",
            suite.manifest_path().as_str(),
            "--program",
            fake_fitter().as_str(),
        ])
        .output();

    let stderr = output.stderr_as_str();
    assert!(
        stderr.contains("Starting 8 cases from "),
        "start line present:\n{output}"
    );
    for name in [
        "symmetric-nonresonant",
        "symmetric-nonresonant-binlog",
        "symmetric-resonant",
        "asymmetric-resonant",
        "missing-data-file",
        "fit-options-symmetric-nonresonant",
        "fit-options-symmetric-resonant",
        "fit-options-asymmetric-resonant",
    ] {
        let status_line = Regex::new(&format!(r"(?m)^\s+PASS \[\s*\d+\.\d{{3}}s\] {name}$")).unwrap();
        assert!(status_line.is_match(&stderr), "PASS line for {name}:\n{output}");
    }
    assert!(
        stderr.contains("8 cases run: 8 passed, 0 skipped"),
        "summary line present:\n{output}"
    );
    assert_eq!(output.stdout_as_str(), "", "nothing is written to stdout");
}

#[test]
fn test_run_failing_case() {
    let suite = TempSuite::molstat_demo().unwrap();
    // Change one digit of a golden file.
    suite
        .write_file(
            "golden/symmetric-resonant.out",
            "Resid = 4.310146e-01\ngamma=9.9463e+00, norm=3.9567e+00\n",
        )
        .unwrap();

    let output = fitcheck_cli()
        .args([
            "run",
            "--manifest",
            suite.manifest_path().as_str(),
            "--program",
            fake_fitter().as_str(),
        ])
        .unchecked(true)
        .output();

    assert_eq!(
        output.exit_code(),
        Some(FitcheckExitCode::CASE_RUN_FAILED),
        "{output}"
    );
    let stderr = output.stderr_as_str();
    assert!(
        stderr.contains("--- STDOUT MISMATCH: symmetric-resonant ---"),
        "mismatch header present:\n{output}"
    );
    // Both versions of the output are shown in full.
    assert!(
        stderr.contains(
            "--- expected stdout ---\nResid = 4.310146e-01\ngamma=9.9463e+00, norm=3.9567e+00\n"
        ),
        "expected text shown:\n{output}"
    );
    assert!(
        stderr.contains(
            "--- actual stdout ---\nResid = 4.310146e-01\ngamma=9.9462e+00, norm=3.9567e+00\n"
        ),
        "actual text shown:\n{output}"
    );
    assert!(
        stderr.contains("8 cases run: 7 passed, 1 failed, 0 skipped"),
        "summary line present:\n{output}"
    );
    assert!(
        stderr.contains("error: case run failed"),
        "final error present:\n{output}"
    );
}

#[test]
fn test_run_fit_options() {
    let suite = TempSuite::molstat_demo().unwrap();

    let output = fitcheck_cli()
        .args([
            "run",
            "--manifest",
            suite.manifest_path().as_str(),
            "--program",
            fake_fitter().as_str(),
            "fit-options",
        ])
        .output();

    let stderr = output.stderr_as_str();
    assert!(
        stderr.contains("3 cases run: 3 passed, 5 skipped"),
        "summary line present:\n{output}"
    );

    // A transcript that stops one iteration early fails.
    let golden =
        std::fs::read_to_string(suite.root().join("golden/fit-options-asymmetric-resonant.out"))
            .unwrap();
    let truncated: String = golden
        .lines()
        .filter(|line| !line.starts_with("Iter=  5"))
        .map(|line| format!("{line}\n"))
        .collect();
    suite
        .write_file("golden/fit-options-asymmetric-resonant.out", &truncated)
        .unwrap();

    let output = fitcheck_cli()
        .args([
            "run",
            "--manifest",
            suite.manifest_path().as_str(),
            "--program",
            fake_fitter().as_str(),
            "fit-options",
        ])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(FitcheckExitCode::CASE_RUN_FAILED),
        "{output}"
    );
    assert!(
        output.stderr_as_str().contains(
            "--- STDOUT MISMATCH: fit-options-asymmetric-resonant ---\n\
             first difference at line 6"
        ),
        "{output}"
    );
}

#[test]
fn test_run_timeout() {
    let suite = TempSuite::new().unwrap();
    suite
        .write_manifest(indoc::indoc! {r#"
            program = "fitter"

            [case.hang]
            model = "Hang"
            data-file = "unused.dat"
            stdout = ""
        "#})
        .unwrap();

    let output = fitcheck_cli()
        .args([
            "run",
            "--manifest",
            suite.manifest_path().as_str(),
            "--program",
            fake_fitter().as_str(),
            "--timeout",
            "500ms",
        ])
        .unchecked(true)
        .output();

    assert_eq!(
        output.exit_code(),
        Some(FitcheckExitCode::CASE_RUN_FAILED),
        "{output}"
    );
    let stderr = output.stderr_as_str();
    assert!(stderr.contains("TIMEOUT ["), "timeout status line:\n{output}");
    assert!(
        stderr.contains("--- ERROR: hang ---"),
        "timeout error shown:\n{output}"
    );
    assert!(
        stderr.contains("1 cases run: 0 passed, 1 timed out, 0 skipped"),
        "summary line present:\n{output}"
    );
}

#[test]
fn test_run_no_matching_cases() {
    let suite = TempSuite::molstat_demo().unwrap();

    let output = fitcheck_cli()
        .args([
            "run",
            "--manifest",
            suite.manifest_path().as_str(),
            "--program",
            fake_fitter().as_str(),
            "no-case-has-this-name",
        ])
        .unchecked(true)
        .output();

    assert_eq!(
        output.exit_code(),
        Some(FitcheckExitCode::NO_CASES_RUN),
        "{output}"
    );
    assert!(
        output.stderr_as_str().contains("error: no cases to run"),
        "{output}"
    );
}

#[test]
fn test_run_filters() {
    let suite = TempSuite::molstat_demo().unwrap();

    let output = fitcheck_cli()
        .args([
            "-v",
            "run",
            "--manifest",
            suite.manifest_path().as_str(),
            "--program",
            fake_fitter().as_str(),
            "symmetric-nonresonant",
        ])
        .output();

    let stderr = output.stderr_as_str();
    assert!(
        stderr.contains("Starting 3 cases from ") && stderr.contains("(5 skipped)"),
        "start line counts skipped cases:\n{output}"
    );
    assert!(
        stderr.contains("SKIP [         ] symmetric-resonant: does not match the provided string filters"),
        "verbose output lists skipped cases:\n{output}"
    );
    assert!(
        stderr.contains("3 cases run: 3 passed, 5 skipped"),
        "summary line present:\n{output}"
    );
}

#[test]
fn test_missing_manifest() {
    let suite = TempSuite::new().unwrap();

    let output = fitcheck_cli()
        .args(["run", "--manifest", suite.manifest_path().as_str()])
        .unchecked(true)
        .output();

    assert_eq!(
        output.exit_code(),
        Some(FitcheckExitCode::SETUP_ERROR),
        "{output}"
    );
}

#[test]
fn test_manifest_without_program() {
    let suite = TempSuite::new().unwrap();
    suite
        .write_manifest(indoc::indoc! {r#"
            [case.one]
            model = "SymmetricNonresonant"
            data-file = "unused.dat"
            stdout = ""
        "#})
        .unwrap();

    let output = fitcheck_cli()
        .args(["run", "--manifest", suite.manifest_path().as_str()])
        .unchecked(true)
        .output();

    assert_eq!(
        output.exit_code(),
        Some(FitcheckExitCode::SETUP_ERROR),
        "{output}"
    );
}

#[test]
fn test_bad_arguments() {
    let output = fitcheck_cli()
        .args(["run", "--test-threads", "many"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(FitcheckExitCode::SETUP_ERROR),
        "{output}"
    );

    let output = fitcheck_cli().args(["run", "--help"]).output();
    assert!(
        output.stdout_as_str().contains("--fail-fast"),
        "help is printed to stdout:\n{output}"
    );
}

#[test]
fn test_list() {
    let suite = TempSuite::molstat_demo().unwrap();

    let output = fitcheck_cli()
        .args([
            "list",
            "--manifest",
            suite.manifest_path().as_str(),
            "resonant",
        ])
        .output();

    assert_eq!(
        output.stdout_as_str(),
        "symmetric-nonresonant\n\
         symmetric-nonresonant-binlog\n\
         symmetric-resonant\n\
         asymmetric-resonant\n\
         fit-options-symmetric-nonresonant\n\
         fit-options-symmetric-resonant\n\
         fit-options-asymmetric-resonant\n"
    );

    let output = fitcheck_cli()
        .args([
            "-v",
            "list",
            "--manifest",
            suite.manifest_path().as_str(),
            "binlog",
        ])
        .output();
    let stdout = output.stdout_as_str();
    assert!(
        stdout.contains(
            "symmetric-nonresonant-binlog (SymmetricNonresonant data/symmetric-nonresonant-binlog.dat)\n"
        ),
        "{output}"
    );
    assert!(
        stdout.contains(
            "missing-data-file (SymmetricNonresonant data/does-not-exist.dat) \
             [skipped: does not match the provided string filters]\n"
        ),
        "{output}"
    );
}

#[test]
fn test_junit_report() {
    let suite = TempSuite::molstat_demo().unwrap();
    suite
        .write_file(
            "golden/asymmetric-resonant.out",
            "Resid = 1.000000e+00\ngammaL=1.7085e+01, gammaR=1.1731e+01, r=2.5489e+01, norm=8.2639e+00\n",
        )
        .unwrap();
    let junit_path = suite.root().join("target/fitcheck/junit.xml");

    let output = fitcheck_cli()
        .args([
            "run",
            "--manifest",
            suite.manifest_path().as_str(),
            "--program",
            fake_fitter().as_str(),
            "--junit",
            junit_path.as_str(),
        ])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(FitcheckExitCode::CASE_RUN_FAILED),
        "{output}"
    );

    let report = std::fs::read_to_string(&junit_path).expect("JUnit report was written");
    assert!(
        report.contains(r#"<testsuites name="molstat-fitter""#),
        "report name comes from the manifest:\n{report}"
    );
    assert!(report.contains(r#"tests="8""#), "{report}");
    assert!(report.contains(r#"failures="1""#), "{report}");
    assert!(
        report.contains(r#"<testcase name="asymmetric-resonant""#),
        "{report}"
    );
    assert!(report.contains(r#"type="output mismatch""#), "{report}");
}
