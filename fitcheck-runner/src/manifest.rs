// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loading a suite of golden cases from a `fitcheck.toml` manifest.
//!
//! The manifest is layered over an embedded default config using the `config` crate, so a
//! manifest only needs to name the program and its cases.

use crate::{
    case::GoldenCase,
    compare::{CompareMode, deserialize_compare_mode, deserialize_compare_mode_opt},
    errors::{ManifestParseError, ManifestParseErrorKind},
    test_command::{GoldenCommand, InvokeSettings},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use indexmap::IndexMap;
use serde::Deserialize;
use std::{collections::BTreeSet, io, time::Duration};

/// A suite of golden cases, along with the program they run and the settings they run with.
#[derive(Clone, Debug)]
pub struct GoldenSuite {
    manifest_path: Option<Utf8PathBuf>,
    command: GoldenCommand,
    settings: SuiteSettings,
    cases: Vec<GoldenCase>,
}

impl GoldenSuite {
    /// The default manifest file name.
    pub const DEFAULT_MANIFEST_NAME: &'static str = "fitcheck.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Manifests are layered on top of this config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Creates a suite directly, without a manifest.
    pub fn new(command: GoldenCommand, settings: SuiteSettings, cases: Vec<GoldenCase>) -> Self {
        Self {
            manifest_path: None,
            command,
            settings,
            cases,
        }
    }

    /// Reads a suite from a manifest file.
    ///
    /// Keys that fitcheck doesn't recognize are passed to `unknown_callback` rather than being
    /// treated as errors.
    pub fn from_manifest(
        manifest_path: &Utf8Path,
        overrides: &SuiteOverrides,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ManifestParseError> {
        let manifest_path = match manifest_path.canonicalize_utf8() {
            Ok(path) => path,
            Err(error) => {
                let kind = if error.kind() == io::ErrorKind::NotFound {
                    ManifestParseErrorKind::NotFound
                } else {
                    ManifestParseErrorKind::Io(error)
                };
                return Err(ManifestParseError::new(manifest_path, kind));
            }
        };
        // A canonical path to a file always has a parent.
        let manifest_dir = manifest_path
            .parent()
            .unwrap_or(Utf8Path::new("/"))
            .to_owned();

        let builder = Self::make_default_config()
            .add_source(File::new(manifest_path.as_str(), FileFormat::Toml));
        let (deserialized, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ManifestParseError::new(&manifest_path, kind))?;

        if !unknown.is_empty() {
            unknown_callback(&manifest_path, &unknown);
        }

        let mut suite = deserialized
            .into_suite(&manifest_dir, overrides)
            .map_err(|kind| ManifestParseError::new(&manifest_path, kind))?;
        suite.manifest_path = Some(manifest_path);
        Ok(suite)
    }

    /// The manifest this suite was read from, if any.
    pub fn manifest_path(&self) -> Option<&Utf8Path> {
        self.manifest_path.as_deref()
    }

    /// The program under test.
    pub fn command(&self) -> &GoldenCommand {
        &self.command
    }

    /// Suite-wide settings.
    pub fn settings(&self) -> &SuiteSettings {
        &self.settings
    }

    /// The cases in this suite, in manifest order.
    pub fn cases(&self) -> &[GoldenCase] {
        &self.cases
    }

    /// Returns the settings to run this case with: the suite's settings, with the case's overrides
    /// applied.
    pub fn settings_for(&self, case: &GoldenCase) -> CaseSettings {
        let mut invoke = self.settings.invoke;
        if let Some(timeout) = case.timeout() {
            invoke.timeout = timeout;
        }
        CaseSettings {
            invoke,
            compare: case.compare().unwrap_or(self.settings.compare),
            check_exit_status: self.settings.check_exit_status,
        }
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (manifest, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(ManifestDeserialize, BTreeSet<String>), ManifestParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ManifestParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let manifest: ManifestDeserialize =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                // serde_path_to_error already reports the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ManifestParseErrorKind::DeserializeError(Box::new(
                    serde_path_to_error::Error::new(path, error),
                ))
            })?;

        Ok((manifest, ignored))
    }
}

/// Settings that apply to every case in a suite.
#[derive(Clone, Debug, PartialEq)]
pub struct SuiteSettings {
    /// Timeouts for each invocation.
    pub invoke: InvokeSettings,

    /// The number of cases to run at once. `None` means the available parallelism.
    pub test_threads: Option<usize>,

    /// Whether the exit status is checked.
    pub check_exit_status: bool,

    /// The comparator used for cases that don't override it.
    pub compare: CompareMode,

    /// JUnit output settings.
    pub junit: JunitSettings,
}

impl Default for SuiteSettings {
    fn default() -> Self {
        Self {
            invoke: InvokeSettings::default(),
            test_threads: None,
            check_exit_status: true,
            compare: CompareMode::Exact,
            junit: JunitSettings::default(),
        }
    }
}

/// JUnit output settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JunitSettings {
    /// Where to write the report. JUnit output is disabled if `None`.
    pub path: Option<Utf8PathBuf>,

    /// The name of the report.
    pub report_name: String,

    /// Whether captured output is stored for passing cases.
    pub store_success_output: bool,

    /// Whether captured output is stored for failing cases.
    pub store_failure_output: bool,
}

impl Default for JunitSettings {
    fn default() -> Self {
        Self {
            path: None,
            report_name: "fitcheck".to_owned(),
            store_success_output: false,
            store_failure_output: true,
        }
    }
}

/// The settings a single case runs with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaseSettings {
    /// Timeouts for the invocation.
    pub invoke: InvokeSettings,

    /// The comparator for both output streams.
    pub compare: CompareMode,

    /// Whether the exit status is checked.
    pub check_exit_status: bool,
}

impl Default for CaseSettings {
    fn default() -> Self {
        Self {
            invoke: InvokeSettings::default(),
            compare: CompareMode::Exact,
            check_exit_status: true,
        }
    }
}

/// Settings from the command line that take precedence over the manifest.
///
/// Relative paths here are resolved against the current directory, not the manifest directory.
#[derive(Clone, Debug, Default)]
pub struct SuiteOverrides {
    /// The program under test.
    pub program: Option<Utf8PathBuf>,

    /// The timeout for every case, including cases that set their own.
    pub timeout: Option<Duration>,

    /// The number of cases to run at once.
    pub test_threads: Option<usize>,

    /// Where to write a JUnit report.
    pub junit_path: Option<Utf8PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ManifestDeserialize {
    #[serde(default)]
    program: Option<Utf8PathBuf>,
    #[serde(default)]
    cwd: Option<Utf8PathBuf>,
    #[serde(with = "humantime_serde")]
    timeout: Duration,
    #[serde(with = "humantime_serde")]
    grace_period: Duration,
    #[serde(with = "humantime_serde")]
    leak_timeout: Duration,
    #[serde(default)]
    test_threads: Option<usize>,
    check_exit_status: bool,
    #[serde(deserialize_with = "deserialize_compare_mode")]
    compare: CompareMode,
    junit: JunitDeserialize,
    #[serde(default)]
    case: IndexMap<String, CaseDeserialize>,
}

impl ManifestDeserialize {
    fn into_suite(
        self,
        manifest_dir: &Utf8Path,
        overrides: &SuiteOverrides,
    ) -> Result<GoldenSuite, ManifestParseErrorKind> {
        let program = match (&overrides.program, self.program) {
            (Some(program), _) => resolve_program(&current_dir()?, program.clone()),
            (None, Some(program)) => resolve_program(manifest_dir, program),
            (None, None) => return Err(ManifestParseErrorKind::ProgramNotSpecified),
        };
        let cwd = match self.cwd {
            Some(cwd) => manifest_dir.join(cwd),
            None => manifest_dir.to_owned(),
        };

        let test_threads = overrides.test_threads.or(self.test_threads);
        if test_threads == Some(0) {
            return Err(ManifestParseErrorKind::ZeroTestThreads);
        }

        let junit_path = match &overrides.junit_path {
            Some(path) => Some(current_dir()?.join(path)),
            None => self.junit.path.map(|path| manifest_dir.join(path)),
        };

        let settings = SuiteSettings {
            invoke: InvokeSettings {
                timeout: overrides.timeout.unwrap_or(self.timeout),
                grace_period: self.grace_period,
                leak_timeout: self.leak_timeout,
            },
            test_threads,
            check_exit_status: self.check_exit_status,
            compare: self.compare,
            junit: JunitSettings {
                path: junit_path,
                report_name: self.junit.report_name,
                store_success_output: self.junit.store_success_output,
                store_failure_output: self.junit.store_failure_output,
            },
        };

        let cases = self
            .case
            .into_iter()
            .map(|(name, case)| {
                let case = case.into_case(name, manifest_dir)?;
                // A command-line timeout applies to every case.
                Ok(match overrides.timeout {
                    Some(timeout) => case.with_timeout(timeout),
                    None => case,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GoldenSuite {
            manifest_path: None,
            command: GoldenCommand::new(program).with_cwd(cwd),
            settings,
            cases,
        })
    }
}

/// Resolves a program path: a bare name is left alone to be looked up on `PATH`, anything else is
/// resolved relative to `base`.
///
/// The child runs in its own working directory, so relative paths with more than one component
/// would otherwise be ambiguous.
fn resolve_program(base: &Utf8Path, program: Utf8PathBuf) -> Utf8PathBuf {
    if program.components().count() > 1 {
        base.join(program)
    } else {
        program
    }
}

fn current_dir() -> Result<Utf8PathBuf, ManifestParseErrorKind> {
    let dir = std::env::current_dir().map_err(ManifestParseErrorKind::Io)?;
    Utf8PathBuf::try_from(dir).map_err(|error| ManifestParseErrorKind::Io(error.into_io_error()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JunitDeserialize {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
    report_name: String,
    store_success_output: bool,
    store_failure_output: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CaseDeserialize {
    model: String,
    data_file: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stdout_file: Option<Utf8PathBuf>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    stderr_file: Option<Utf8PathBuf>,
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_compare_mode_opt")]
    compare: Option<CompareMode>,
    #[serde(default)]
    ignore: bool,
}

impl CaseDeserialize {
    fn into_case(
        self,
        name: String,
        manifest_dir: &Utf8Path,
    ) -> Result<GoldenCase, ManifestParseErrorKind> {
        let stdout = read_golden(&name, manifest_dir, "stdout", self.stdout, self.stdout_file)?
            .ok_or_else(|| ManifestParseErrorKind::MissingStdout { case: name.clone() })?;
        let stderr = read_golden(&name, manifest_dir, "stderr", self.stderr, self.stderr_file)?
            .unwrap_or_default();

        let mut case = GoldenCase::new(name, self.model, self.data_file)
            .with_options(self.options)
            .with_expected_stdout(stdout)
            .with_expected_stderr(stderr)
            .with_ignore(self.ignore);
        if let Some(exit_code) = self.exit_code {
            case = case.with_expected_exit_code(exit_code);
        }
        if let Some(timeout) = self.timeout {
            case = case.with_timeout(timeout);
        }
        if let Some(compare) = self.compare {
            case = case.with_compare(compare);
        }
        Ok(case)
    }
}

/// Returns the golden text for one stream, from either the inline or the file form.
fn read_golden(
    case: &str,
    manifest_dir: &Utf8Path,
    key: &'static str,
    inline: Option<String>,
    file: Option<Utf8PathBuf>,
) -> Result<Option<String>, ManifestParseErrorKind> {
    match (inline, file) {
        (Some(_), Some(_)) => Err(ManifestParseErrorKind::InlineAndFile {
            case: case.to_owned(),
            key,
        }),
        (Some(text), None) => Ok(Some(text)),
        (None, Some(file)) => {
            let path = manifest_dir.join(file);
            std::fs::read_to_string(&path)
                .map(Some)
                .map_err(|error| ManifestParseErrorKind::GoldenFileRead {
                    case: case.to_owned(),
                    path,
                    error,
                })
        }
        (None, None) => Ok(None),
    }
}
