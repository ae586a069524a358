// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selecting which cases in a suite to run.

use crate::{case::GoldenCase, errors::CaseFilterBuildError, manifest::GoldenSuite};
use aho_corasick::AhoCorasick;
use std::{fmt, io};

/// Whether to run ignored cases.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RunIgnored {
    /// Only run cases that aren't ignored.
    ///
    /// This is the default.
    #[default]
    Default,

    /// Only run cases that are ignored.
    IgnoredOnly,

    /// Run both ignored and non-ignored cases.
    All,
}

impl fmt::Display for RunIgnored {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunIgnored::Default => write!(f, "default"),
            RunIgnored::IgnoredOnly => write!(f, "ignored-only"),
            RunIgnored::All => write!(f, "all"),
        }
    }
}

/// A filter for cases.
#[derive(Clone, Debug)]
pub struct CaseFilter {
    run_ignored: RunIgnored,
    name_match: NameMatch,
}

#[derive(Clone, Debug)]
enum NameMatch {
    MatchAll,
    MatchSet(Box<AhoCorasick>),
}

impl CaseFilter {
    /// Creates a new `CaseFilter` that matches case names containing any of the given patterns.
    ///
    /// If an empty slice is passed, the filter matches all case names.
    pub fn new(
        run_ignored: RunIgnored,
        patterns: &[impl AsRef<[u8]>],
    ) -> Result<Self, CaseFilterBuildError> {
        let name_match = if patterns.is_empty() {
            NameMatch::MatchAll
        } else {
            NameMatch::MatchSet(Box::new(AhoCorasick::new(patterns)?))
        };
        Ok(Self {
            run_ignored,
            name_match,
        })
    }

    /// Creates a new `CaseFilter` that matches any case name.
    pub fn any(run_ignored: RunIgnored) -> Self {
        Self {
            run_ignored,
            name_match: NameMatch::MatchAll,
        }
    }

    /// Returns an enum describing the match status of this filter.
    pub fn filter_match(&self, case: &GoldenCase) -> FilterMatch {
        match (self.run_ignored, case.is_ignored()) {
            (RunIgnored::IgnoredOnly, false) | (RunIgnored::Default, true) => {
                return FilterMatch::Mismatch {
                    reason: MismatchReason::Ignored,
                };
            }
            _ => {}
        }

        let string_match = match &self.name_match {
            NameMatch::MatchAll => true,
            NameMatch::MatchSet(set) => set.is_match(case.name()),
        };
        if string_match {
            FilterMatch::Matches
        } else {
            FilterMatch::Mismatch {
                reason: MismatchReason::String,
            }
        }
    }
}

/// An enum describing whether a case matches a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterMatch {
    /// This case matches this filter.
    Matches,

    /// This case does not match this filter.
    ///
    /// The `MismatchReason` inside describes the reason this filter isn't matched.
    Mismatch {
        /// The reason the case doesn't match.
        reason: MismatchReason,
    },
}

impl FilterMatch {
    /// Returns true if the filter matches.
    pub fn is_match(&self) -> bool {
        matches!(self, FilterMatch::Matches)
    }
}

/// The reason for why a case doesn't match a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MismatchReason {
    /// This case does not match the run-ignored option in the filter.
    Ignored,

    /// This case does not match the provided string filters.
    String,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MismatchReason::Ignored => write!(f, "does not match the run-ignored option"),
            MismatchReason::String => write!(f, "does not match the provided string filters"),
        }
    }
}

/// A suite's cases, each with the result of matching it against a filter.
#[derive(Clone, Debug)]
pub struct CaseList<'suite> {
    suite: &'suite GoldenSuite,
    instances: Vec<CaseInstance<'suite>>,
    skip_count: usize,
}

impl<'suite> CaseList<'suite> {
    /// Matches every case in the suite against the filter.
    pub fn new(suite: &'suite GoldenSuite, filter: &CaseFilter) -> Self {
        let instances: Vec<_> = suite
            .cases()
            .iter()
            .map(|case| CaseInstance {
                case,
                filter_match: filter.filter_match(case),
            })
            .collect();
        let skip_count = instances
            .iter()
            .filter(|instance| !instance.filter_match.is_match())
            .count();
        Self {
            suite,
            instances,
            skip_count,
        }
    }

    /// The suite these cases come from.
    pub fn suite(&self) -> &'suite GoldenSuite {
        self.suite
    }

    /// Iterates over all cases, in manifest order.
    pub fn iter(&self) -> impl Iterator<Item = CaseInstance<'suite>> + '_ {
        self.instances.iter().copied()
    }

    /// The total number of cases, including skipped ones.
    pub fn case_count(&self) -> usize {
        self.instances.len()
    }

    /// The number of cases that will be run.
    pub fn run_count(&self) -> usize {
        self.instances.len() - self.skip_count
    }

    /// The number of cases that will be skipped.
    pub fn skip_count(&self) -> usize {
        self.skip_count
    }

    /// Writes the list of cases to be run, one per line.
    ///
    /// With `verbose`, skipped cases are listed as well, along with each case's model and data
    /// file.
    pub fn write_plain(&self, mut writer: impl io::Write, verbose: bool) -> io::Result<()> {
        for instance in &self.instances {
            let case = instance.case;
            match (verbose, instance.filter_match) {
                (false, FilterMatch::Matches) => writeln!(writer, "{}", case.name())?,
                (false, FilterMatch::Mismatch { .. }) => {}
                (true, filter_match) => {
                    write!(
                        writer,
                        "{} ({} {})",
                        case.name(),
                        case.model_name(),
                        case.data_file_path()
                    )?;
                    if let FilterMatch::Mismatch { reason } = filter_match {
                        write!(writer, " [skipped: {reason}]")?;
                    }
                    writeln!(writer)?;
                }
            }
        }
        Ok(())
    }
}

/// A case along with whether it matched the filter.
#[derive(Clone, Copy, Debug)]
pub struct CaseInstance<'suite> {
    /// The case.
    pub case: &'suite GoldenCase,

    /// Whether the case matched the filter.
    pub filter_match: FilterMatch,
}
