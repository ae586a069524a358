// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comparing captured output against golden text.
//!
//! The default comparator is [`ExactComparator`]: golden text is byte-exact, with no trimming and
//! no tolerance. [`NumericTolerance`] relaxes that for numeric literals only, for programs whose
//! last printed digit isn't stable across platforms.

use regex::Regex;
use serde::{
    Deserialize, Deserializer,
    de::{IntoDeserializer, value::StrDeserializer},
};
use std::{fmt, sync::LazyLock};

/// Compares golden text against the raw bytes a program wrote.
pub trait OutputComparator: fmt::Debug + Send + Sync {
    /// Returns `Ok(())` if `actual` is acceptable, or the first difference found.
    fn compare(&self, expected: &str, actual: &[u8]) -> Result<(), MismatchDetail>;
}

/// Byte-for-byte equality.
///
/// Output that isn't valid UTF-8 never matches a golden string, even one containing U+FFFD.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExactComparator;

impl OutputComparator for ExactComparator {
    fn compare(&self, expected: &str, actual: &[u8]) -> Result<(), MismatchDetail> {
        if expected.as_bytes() == actual {
            return Ok(());
        }

        let expected_lines = split_lines(expected.as_bytes());
        let actual_lines = split_lines(actual);
        let line = first_differing_line(&expected_lines, &actual_lines);
        Err(MismatchDetail::from_bytes(
            line + 1,
            expected_lines.get(line).copied(),
            actual_lines.get(line).copied(),
            MismatchReason::TextDiffers,
        ))
    }
}

fn split_lines(text: &[u8]) -> Vec<&[u8]> {
    text.split_inclusive(|&b| b == b'\n').collect()
}

fn first_differing_line(expected: &[&[u8]], actual: &[&[u8]]) -> usize {
    expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .unwrap_or_else(|| expected.len().min(actual.len()))
}

/// Compares numeric literals within a tolerance, and everything else exactly.
///
/// Lines must correspond one to one. Within each line, numbers (including `%e`-style exponents)
/// are equal if `|a - b| <= max(abs_tol, rel_tol * max(|a|, |b|))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NumericTolerance {
    /// Relative tolerance.
    pub rel_tol: f64,

    /// Absolute tolerance.
    pub abs_tol: f64,
}

impl NumericTolerance {
    /// The relative tolerance used when none is given.
    pub const DEFAULT_REL_TOL: f64 = 1e-6;

    /// Returns true if `a` and `b` are equal within this tolerance.
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        let scale = a.abs().max(b.abs());
        (a - b).abs() <= self.abs_tol.max(self.rel_tol * scale)
    }

    fn compare_line(&self, expected: &str, actual: &str) -> Result<(), MismatchReason> {
        let expected_tokens = tokenize(expected);
        let actual_tokens = tokenize(actual);
        if expected_tokens.len() != actual_tokens.len() {
            return Err(MismatchReason::TextDiffers);
        }

        for (e, a) in expected_tokens.iter().zip(&actual_tokens) {
            match (e, a) {
                (Token::Text(e), Token::Text(a)) if e == a => {}
                (Token::Number(e_text, e), Token::Number(a_text, a)) => {
                    if !self.is_close(*e, *a) {
                        return Err(MismatchReason::NumberOutOfTolerance {
                            expected: (*e_text).to_owned(),
                            actual: (*a_text).to_owned(),
                        });
                    }
                }
                _ => return Err(MismatchReason::TextDiffers),
            }
        }
        Ok(())
    }
}

impl Default for NumericTolerance {
    fn default() -> Self {
        Self {
            rel_tol: Self::DEFAULT_REL_TOL,
            abs_tol: 0.0,
        }
    }
}

impl OutputComparator for NumericTolerance {
    fn compare(&self, expected: &str, actual: &[u8]) -> Result<(), MismatchDetail> {
        if expected.as_bytes() == actual {
            return Ok(());
        }
        let actual = match std::str::from_utf8(actual) {
            Ok(actual) => actual,
            Err(error) => return Err(invalid_utf8_detail(expected, actual, error.valid_up_to())),
        };

        let expected_lines: Vec<_> = expected.split_inclusive('\n').collect();
        let actual_lines: Vec<_> = actual.split_inclusive('\n').collect();
        for idx in 0..expected_lines.len().max(actual_lines.len()) {
            let e = expected_lines.get(idx).copied();
            let a = actual_lines.get(idx).copied();
            let reason = match (e, a) {
                (Some(e), Some(a)) => match self.compare_line(e, a) {
                    Ok(()) => continue,
                    Err(reason) => reason,
                },
                _ => MismatchReason::LineCountDiffers {
                    expected: expected_lines.len(),
                    actual: actual_lines.len(),
                },
            };
            return Err(MismatchDetail::new(idx + 1, e, a, reason));
        }

        Ok(())
    }
}

fn invalid_utf8_detail(expected: &str, actual: &[u8], valid_up_to: usize) -> MismatchDetail {
    let line = actual[..valid_up_to].iter().filter(|&&b| b == b'\n').count();
    let expected_lines = split_lines(expected.as_bytes());
    let actual_lines = split_lines(actual);
    MismatchDetail::from_bytes(
        line + 1,
        expected_lines.get(line).copied(),
        actual_lines.get(line).copied(),
        MismatchReason::InvalidUtf8,
    )
}

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").expect("number regex is valid")
});

#[derive(Clone, Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Number(&'a str, f64),
}

fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for m in NUMBER_RE.find_iter(line) {
        if m.start() > last {
            tokens.push(Token::Text(&line[last..m.start()]));
        }
        match m.as_str().parse::<f64>() {
            Ok(value) => tokens.push(Token::Number(m.as_str(), value)),
            Err(_) => tokens.push(Token::Text(m.as_str())),
        }
        last = m.end();
    }
    if last < line.len() {
        tokens.push(Token::Text(&line[last..]));
    }
    tokens
}

/// The comparator to use, as configured in a manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum CompareMode {
    /// Byte-for-byte equality.
    #[default]
    Exact,

    /// Numeric literals compared within a tolerance.
    Numeric(NumericTolerance),
}

impl CompareMode {
    /// Returns the comparator for this mode.
    pub fn comparator(&self) -> &dyn OutputComparator {
        match self {
            Self::Exact => &ExactComparator,
            Self::Numeric(tolerance) => tolerance,
        }
    }
}

impl fmt::Display for CompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Numeric(tolerance) => write!(
                f,
                "numeric (rel-tol {}, abs-tol {})",
                tolerance.rel_tol, tolerance.abs_tol
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum CompareModeKind {
    Exact,
    Numeric,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct CompareModeTable {
    mode: CompareModeKind,
    #[serde(default)]
    rel_tol: Option<f64>,
    #[serde(default)]
    abs_tol: Option<f64>,
}

impl CompareModeTable {
    fn into_mode<E: serde::de::Error>(self) -> Result<CompareMode, E> {
        match self.mode {
            CompareModeKind::Exact => {
                if self.rel_tol.is_some() || self.abs_tol.is_some() {
                    return Err(E::custom(
                        "`rel-tol` and `abs-tol` are only valid with `mode = \"numeric\"`",
                    ));
                }
                Ok(CompareMode::Exact)
            }
            CompareModeKind::Numeric => {
                let tolerance = NumericTolerance {
                    rel_tol: check_tolerance::<E>("rel-tol", self.rel_tol)?
                        .unwrap_or(NumericTolerance::DEFAULT_REL_TOL),
                    abs_tol: check_tolerance::<E>("abs-tol", self.abs_tol)?.unwrap_or(0.0),
                };
                Ok(CompareMode::Numeric(tolerance))
            }
        }
    }
}

fn check_tolerance<E: serde::de::Error>(key: &str, value: Option<f64>) -> Result<Option<f64>, E> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(E::custom(format!(
            "`{key}` must be a finite, non-negative number (found {v})"
        ))),
        other => Ok(other),
    }
}

/// Deserializes a compare mode from either a string (`"exact"` or `"numeric"`) or a table
/// (`{ mode = "numeric", rel-tol = 1e-4, abs-tol = 0.0 }`).
pub(crate) fn deserialize_compare_mode<'de, D>(deserializer: D) -> Result<CompareMode, D::Error>
where
    D: Deserializer<'de>,
{
    struct V;

    impl<'de2> serde::de::Visitor<'de2> for V {
        type Value = CompareMode;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(
                formatter,
                "a comparator name (\"exact\" or \"numeric\") or a table with a `mode` key"
            )
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let deserializer: StrDeserializer<'_, E> = v.into_deserializer();
            let kind = CompareModeKind::deserialize(deserializer)?;
            CompareModeTable {
                mode: kind,
                rel_tol: None,
                abs_tol: None,
            }
            .into_mode()
        }

        fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de2>,
        {
            CompareModeTable::deserialize(serde::de::value::MapAccessDeserializer::new(map))?
                .into_mode()
        }
    }

    deserializer.deserialize_any(V)
}

pub(crate) fn deserialize_compare_mode_opt<'de, D>(
    deserializer: D,
) -> Result<Option<CompareMode>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_compare_mode(deserializer).map(Some)
}

/// Where the first difference between expected and actual text was found.
#[derive(Clone, Debug, PartialEq)]
pub struct MismatchDetail {
    /// The 1-based line number of the first difference.
    pub line: usize,

    /// The expected line, including its newline if it had one. `None` if the expected text ended
    /// before this line.
    pub expected_line: Option<String>,

    /// The actual line, including its newline if it had one. `None` if the actual text ended
    /// before this line.
    pub actual_line: Option<String>,

    /// Why the lines differ.
    pub reason: MismatchReason,
}

impl MismatchDetail {
    fn new(
        line: usize,
        expected_line: Option<&str>,
        actual_line: Option<&str>,
        reason: MismatchReason,
    ) -> Self {
        Self {
            line,
            expected_line: expected_line.map(ToOwned::to_owned),
            actual_line: actual_line.map(ToOwned::to_owned),
            reason,
        }
    }

    /// Lines are kept as text for display, with invalid UTF-8 replaced.
    fn from_bytes(
        line: usize,
        expected_line: Option<&[u8]>,
        actual_line: Option<&[u8]>,
        reason: MismatchReason,
    ) -> Self {
        Self {
            line,
            expected_line: expected_line.map(|l| String::from_utf8_lossy(l).into_owned()),
            actual_line: actual_line.map(|l| String::from_utf8_lossy(l).into_owned()),
            reason,
        }
    }
}

impl fmt::Display for MismatchDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "first difference at line {}", self.line)?;
        match &self.reason {
            MismatchReason::TextDiffers => {}
            MismatchReason::InvalidUtf8 => write!(f, " (output is not valid UTF-8)")?,
            MismatchReason::NumberOutOfTolerance { expected, actual } => {
                write!(f, " ({actual} is not within tolerance of {expected})")?;
            }
            MismatchReason::LineCountDiffers { expected, actual } => {
                write!(f, " (expected {expected} lines, found {actual})")?;
            }
        }
        write!(
            f,
            ": expected {}, found {}",
            DisplayLine(self.expected_line.as_deref()),
            DisplayLine(self.actual_line.as_deref()),
        )
    }
}

struct DisplayLine<'a>(Option<&'a str>);

impl fmt::Display for DisplayLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            // Debug formatting makes a missing trailing newline visible.
            Some(line) => write!(f, "{line:?}"),
            None => write!(f, "end of output"),
        }
    }
}

/// Why a line differs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MismatchReason {
    /// The text of the line differs.
    TextDiffers,

    /// The actual line is not valid UTF-8, so its numbers can't be read.
    InvalidUtf8,

    /// A number is outside the configured tolerance.
    NumberOutOfTolerance {
        /// The expected number, as written.
        expected: String,
        /// The actual number, as written.
        actual: String,
    },

    /// One side has more lines than the other.
    LineCountDiffers {
        /// The number of expected lines.
        expected: usize,
        /// The number of actual lines.
        actual: usize,
    },
}

/// Which part of a case's result didn't match.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MismatchKind {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
    /// The exit status.
    ExitStatus,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
            Self::ExitStatus => write!(f, "exit status"),
        }
    }
}

/// A mismatch between a case's golden output and what the program actually did.
#[derive(Clone, Debug, PartialEq)]
pub struct Mismatch {
    /// What didn't match.
    pub kind: MismatchKind,

    /// The full expected text, verbatim.
    pub expected: String,

    /// The full actual text, verbatim. Invalid UTF-8 is replaced with U+FFFD for display; the
    /// comparison itself was made on the raw bytes.
    pub actual: String,

    /// Where the first difference is, for output streams.
    pub detail: Option<MismatchDetail>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} mismatch: {detail}", self.kind),
            None => write!(
                f,
                "{} mismatch: expected {}, found {}",
                self.kind, self.expected, self.actual
            ),
        }
    }
}
