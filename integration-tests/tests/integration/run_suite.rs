// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Whole-suite runs through the library, against the fake fitter.

use crate::fixtures::*;
use fitcheck_runner::{
    reporter::events::{CancelReason, ExecutionResult, TestEvent},
    runner::{GoldenRunnerBuilder, SignalHandlerKind},
    test_filter::{CaseFilter, CaseList, RunIgnored},
};
use indoc::formatdoc;
use integration_tests::temp_suite::TempSuite;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

#[test]
fn molstat_demo_passes() {
    let temp = TempSuite::molstat_demo().unwrap();
    let suite = load_with_fake_fitter(&temp.manifest_path());
    let case_list = CaseList::new(&suite, &CaseFilter::any(RunIgnored::Default));
    assert_eq!(case_list.run_count(), 8);

    let mut builder = GoldenRunnerBuilder::default();
    builder.set_test_threads(4);
    let runner = builder
        .build(&case_list, SignalHandlerKind::Noop)
        .expect("runner built");

    let mut results = BTreeMap::new();
    let run_stats = runner.execute(|event| {
        if let TestEvent::CaseFinished {
            instance,
            run_status,
        } = event
        {
            results.insert(instance.case.name().to_owned(), run_status.result.label());
        }
    });

    assert!(run_stats.is_success(), "{run_stats:?}: {results:?}");
    assert_eq!(run_stats.passed, 8);
    assert_eq!(
        results.keys().map(String::as_str).collect::<Vec<_>>(),
        [
            "asymmetric-resonant",
            "fit-options-asymmetric-resonant",
            "fit-options-symmetric-nonresonant",
            "fit-options-symmetric-resonant",
            "missing-data-file",
            "symmetric-nonresonant",
            "symmetric-nonresonant-binlog",
            "symmetric-resonant",
        ]
    );
}

#[test]
fn failures_are_isolated_to_their_case() {
    let temp = TempSuite::new().unwrap();
    temp.write_file("data/points.dat", "1.0e-3 0.5\n2.0e-3 0.25\n")
        .unwrap();
    temp.write_manifest(&formatdoc! {r#"
        program = "fitter"

        [case.good]
        model = "SymmetricNonresonant"
        data-file = "data/points.dat"
        stdout = "{SYMMETRIC_NONRESONANT_STDOUT}"

        [case.unknown-model]
        model = "NoSuchModel"
        data-file = "data/points.dat"
        stdout = ""

        [case.hang]
        model = "Hang"
        data-file = "data/points.dat"
        stdout = ""
        timeout = "500ms"

        [case.also-good]
        model = "SymmetricResonant"
        data-file = "data/points.dat"
        stdout = "Resid = 4.310146e-01\ngamma=9.9462e+00, norm=3.9567e+00\n"
    "#,
        SYMMETRIC_NONRESONANT_STDOUT = SYMMETRIC_NONRESONANT_STDOUT.escape_default(),
    })
    .unwrap();

    let suite = load_with_fake_fitter(&temp.manifest_path());
    let case_list = CaseList::new(&suite, &CaseFilter::any(RunIgnored::Default));
    let runner = GoldenRunnerBuilder::default()
        .build(&case_list, SignalHandlerKind::Noop)
        .expect("runner built");

    let mut results = BTreeMap::new();
    let run_stats = runner.execute(|event| {
        if let TestEvent::CaseFinished {
            instance,
            run_status,
        } = event
        {
            results.insert(instance.case.name().to_owned(), run_status.result);
        }
    });

    assert!(!run_stats.is_success());
    assert_eq!(run_stats.finished_count, 4);
    assert_eq!(run_stats.passed, 2);
    assert_eq!(run_stats.failed, 1);
    assert_eq!(run_stats.timed_out, 1);

    assert!(matches!(results["good"], ExecutionResult::Pass));
    assert!(matches!(results["also-good"], ExecutionResult::Pass));
    assert!(matches!(results["hang"], ExecutionResult::Timeout));
    let ExecutionResult::Fail { mismatches } = &results["unknown-model"] else {
        panic!("unknown model is a mismatch: {:?}", results["unknown-model"]);
    };
    assert_eq!(mismatches.len(), 1, "only stderr differs: {mismatches:?}");
    assert_eq!(mismatches[0].actual, "Error: unknown model 'NoSuchModel'.\n");
}

#[test]
fn fail_fast_cancels_remaining_cases() {
    let temp = TempSuite::new().unwrap();
    let mut manifest = String::from("program = \"fitter\"\n");
    for i in 0..6 {
        manifest.push_str(&format!(
            "\n[case.broken-{i}]\nmodel = \"Crash\"\ndata-file = \"unused.dat\"\nstdout = \"\"\n"
        ));
    }
    temp.write_manifest(&manifest).unwrap();

    let suite = load_with_fake_fitter(&temp.manifest_path());
    let case_list = CaseList::new(&suite, &CaseFilter::any(RunIgnored::Default));
    let mut builder = GoldenRunnerBuilder::default();
    builder.set_test_threads(1).set_fail_fast(true);
    let runner = builder
        .build(&case_list, SignalHandlerKind::Noop)
        .expect("runner built");

    let mut cancel_reasons = Vec::new();
    let run_stats = runner.execute(|event| {
        if let TestEvent::RunBeginCancel { reason, .. } = event {
            cancel_reasons.push(reason);
        }
    });

    assert_eq!(cancel_reasons, [CancelReason::TestFailure]);
    assert_eq!(run_stats.initial_run_count, 6);
    assert_eq!(run_stats.finished_count, 1);
    assert_eq!(run_stats.failed, 1);
    assert!(!run_stats.is_success());
}

#[test]
fn ignored_cases_are_skipped_by_default() {
    let temp = TempSuite::molstat_demo().unwrap();
    let manifest = std::fs::read_to_string(temp.manifest_path()).unwrap();
    temp.write_manifest(&format!(
        "{manifest}\n[case.slow]\nmodel = \"Hang\"\ndata-file = \"unused.dat\"\nstdout = \"\"\nignore = true\n"
    ))
    .unwrap();

    let suite = load_with_fake_fitter(&temp.manifest_path());
    let case_list = CaseList::new(&suite, &CaseFilter::any(RunIgnored::Default));
    let runner = GoldenRunnerBuilder::default()
        .build(&case_list, SignalHandlerKind::Noop)
        .expect("runner built");

    let mut skipped = Vec::new();
    let run_stats = runner.execute(|event| {
        if let TestEvent::CaseSkipped { instance, .. } = event {
            skipped.push(instance.case.name().to_owned());
        }
    });

    assert!(run_stats.is_success(), "{run_stats:?}");
    assert_eq!(run_stats.passed, 8);
    assert_eq!(run_stats.skipped, 1);
    assert_eq!(skipped, ["slow"]);
}
