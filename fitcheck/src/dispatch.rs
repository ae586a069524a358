// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, FitcheckExitCode, Result,
    output::{OutputContext, OutputOpts},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fitcheck_runner::{
    manifest::{GoldenSuite, SuiteOverrides},
    reporter::TestReporterBuilder,
    runner::{GoldenRunnerBuilder, SignalHandlerKind},
    test_filter::{CaseFilter, CaseList, RunIgnored},
};
use std::{
    io::{self, Write},
    time::Duration,
};
use tracing::warn;

/// A golden-output regression harness for numeric command-line tools.
///
/// Each case in the manifest feeds the program under test a model name, a data file and optional
/// extra lines on standard input, then compares its standard output, standard error and exit
/// status against golden expectations.
#[derive(Debug, Parser)]
#[command(version, max_term_width = 100)]
pub struct FitcheckApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl FitcheckApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        match self.command {
            Command::List(opts) => opts.exec(output),
            Command::Run(opts) => opts.exec(output),
        }
    }
}

/// Parses arguments, runs the requested command and exits the process.
pub fn main_impl() -> ! {
    match FitcheckApp::try_parse() {
        Ok(app) => {
            let output = app.init_output();
            match app.exec(output) {
                Ok(code) => std::process::exit(code),
                Err(error) => {
                    error.display_to_stderr();
                    std::process::exit(error.process_exit_code())
                }
            }
        }
        Err(err) => {
            // --help and --version are reported as errors that print to stdout.
            let code = if err.use_stderr() {
                FitcheckExitCode::SETUP_ERROR
            } else {
                FitcheckExitCode::OK
            };
            // Nothing more can be done if printing fails.
            let _ = err.print();
            std::process::exit(code)
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the cases in a suite
    List(ListOpts),

    /// Run the cases in a suite and compare their output against the golden output
    Run(RunOpts),
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Manifest options")]
struct ManifestOpts {
    /// Path to the suite manifest
    #[arg(
        long,
        value_name = "PATH",
        default_value = GoldenSuite::DEFAULT_MANIFEST_NAME,
        env = "FITCHECK_MANIFEST"
    )]
    manifest: Utf8PathBuf,

    /// Program to run, overriding the manifest's `program`
    #[arg(long, value_name = "PATH", env = "FITCHECK_PROGRAM")]
    program: Option<Utf8PathBuf>,
}

impl ManifestOpts {
    fn load(&self, mut overrides: SuiteOverrides) -> Result<GoldenSuite> {
        overrides.program = self.program.clone();
        let suite = GoldenSuite::from_manifest(&self.manifest, &overrides, |path, unknown| {
            let keys = unknown
                .iter()
                .map(|key| format!("`{key}`"))
                .collect::<Vec<_>>()
                .join(", ");
            warn!("ignoring unknown keys in manifest {path}: {keys}");
        })?;
        Ok(suite)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Filter options")]
struct FilterOpts {
    /// Run ignored cases
    #[arg(long, value_enum, default_value_t, value_name = "WHICH")]
    run_ignored: RunIgnoredOpt,

    /// Case name filters: a case runs if its name contains any of these
    #[arg(value_name = "FILTERS")]
    filters: Vec<String>,
}

impl FilterOpts {
    fn to_filter(&self) -> Result<CaseFilter> {
        Ok(CaseFilter::new(self.run_ignored.into(), &self.filters)?)
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum RunIgnoredOpt {
    /// Run non-ignored cases only
    #[default]
    Default,

    /// Run ignored cases only
    IgnoredOnly,

    /// Run both ignored and non-ignored cases
    All,
}

impl From<RunIgnoredOpt> for RunIgnored {
    fn from(opt: RunIgnoredOpt) -> Self {
        match opt {
            RunIgnoredOpt::Default => RunIgnored::Default,
            RunIgnoredOpt::IgnoredOnly => RunIgnored::IgnoredOnly,
            RunIgnoredOpt::All => RunIgnored::All,
        }
    }
}

#[derive(Debug, Args)]
struct ListOpts {
    #[clap(flatten)]
    manifest: ManifestOpts,

    #[clap(flatten)]
    filter: FilterOpts,
}

impl ListOpts {
    fn exec(self, output: OutputContext) -> Result<i32> {
        let suite = self.manifest.load(SuiteOverrides::default())?;
        let filter = self.filter.to_filter()?;
        let case_list = CaseList::new(&suite, &filter);

        let mut stdout = io::stdout().lock();
        case_list
            .write_plain(&mut stdout, output.verbose)
            .and_then(|()| stdout.flush())
            .map_err(|err| ExpectedError::WriteCaseListError { err })?;
        Ok(FitcheckExitCode::OK)
    }
}

#[derive(Debug, Args)]
struct RunOpts {
    #[clap(flatten)]
    manifest: ManifestOpts,

    #[clap(flatten)]
    filter: FilterOpts,

    #[clap(flatten)]
    runner: RunnerOpts,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Runner options")]
struct RunnerOpts {
    /// Time limit for each case, overriding the manifest (e.g. "30s", "2m")
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration, env = "FITCHECK_TIMEOUT")]
    timeout: Option<Duration>,

    /// Number of cases to run simultaneously
    #[arg(long, short = 'j', value_name = "N", env = "FITCHECK_TEST_THREADS")]
    test_threads: Option<usize>,

    /// Stop starting new cases after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Write a JUnit XML report to this path
    #[arg(long, value_name = "PATH", env = "FITCHECK_JUNIT")]
    junit: Option<Utf8PathBuf>,
}

impl RunOpts {
    fn exec(self, output: OutputContext) -> Result<i32> {
        let overrides = SuiteOverrides {
            timeout: self.runner.timeout,
            test_threads: self.runner.test_threads,
            junit_path: self.runner.junit.clone(),
            ..SuiteOverrides::default()
        };
        let suite = self.manifest.load(overrides)?;
        let filter = self.filter.to_filter()?;
        let case_list = CaseList::new(&suite, &filter);
        if case_list.run_count() == 0 {
            return Err(ExpectedError::NoCasesRun);
        }

        let mut reporter = TestReporterBuilder::default()
            .set_verbose(output.verbose)
            .build(&case_list);
        if output.color.should_colorize(supports_color::Stream::Stderr) {
            reporter.colorize();
        }

        let mut runner_builder = GoldenRunnerBuilder::default();
        runner_builder.set_fail_fast(self.runner.fail_fast);
        let runner = runner_builder.build(&case_list, SignalHandlerKind::Standard)?;

        let run_stats =
            runner.try_execute(|event| reporter.report_event(event, io::stderr().lock()))?;
        if !run_stats.is_success() {
            return Err(ExpectedError::CaseRunFailed);
        }
        Ok(FitcheckExitCode::OK)
    }
}
