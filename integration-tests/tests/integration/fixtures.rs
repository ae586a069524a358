// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use fitcheck_runner::{
    GoldenCommand, InvokeSettings,
    manifest::{CaseSettings, GoldenSuite, SuiteOverrides},
};
use integration_tests::fitcheck_cli::FitcheckCli;
use std::time::Duration;

pub const SYMMETRIC_NONRESONANT_STDOUT: &str =
    "Resid = 1.599687e+04\nc=5.9267e+01, d=9.8774e+00, norm=1.0206e+05\n";

pub const ASYMMETRIC_RESONANT_STDOUT: &str = "Resid = 4.895159e+00\n\
    gammaL=1.7085e+01, gammaR=1.1731e+01, r=2.5489e+01, norm=8.2639e+00\n";

pub fn fake_fitter() -> Utf8PathBuf {
    env!("CARGO_BIN_EXE_fake-fitter").into()
}

/// A command that runs the fake fitter from the given suite directory.
pub fn fake_command(cwd: &Utf8Path) -> GoldenCommand {
    GoldenCommand::new(fake_fitter()).with_cwd(cwd)
}

pub fn fitcheck_cli() -> FitcheckCli {
    FitcheckCli::new(env!("CARGO_BIN_EXE_fitcheck-dup"))
}

/// Case settings with a short timeout, for cases that are expected to hang.
pub fn short_timeout_settings() -> CaseSettings {
    CaseSettings {
        invoke: InvokeSettings {
            timeout: Duration::from_millis(500),
            grace_period: Duration::from_secs(1),
            ..InvokeSettings::default()
        },
        ..CaseSettings::default()
    }
}

/// Loads a manifest, running the fake fitter instead of the program it names.
#[track_caller]
pub fn load_with_fake_fitter(manifest_path: &Utf8Path) -> GoldenSuite {
    let overrides = SuiteOverrides {
        program: Some(fake_fitter()),
        ..SuiteOverrides::default()
    };
    GoldenSuite::from_manifest(manifest_path, &overrides, |path, unknown| {
        panic!("unknown keys in {path}: {unknown:?}")
    })
    .expect("manifest is valid")
}
