use crate::normalize::collapse_source_names;
use crate::normalize::collapse_source_refs;
use crate::normalize::normalize;
use crate::normalize::normalize_line_endings;
use crate::normalize::strip_processing_preamble;
use serde::Deserialize;
use serde::Serialize;
use similar::TextDiff;

/// Lines of context around each hunk in reported diffs.
pub const DIFF_CONTEXT: usize = 3;

/// Final classification of one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
  Passed,
  PassedIgnored,
  /// Update mode rewrote the fixtures from the actual output.
  Updated,
  FailedDiff {
    diff: String,
  },
  FailedCrash {
    exit_code: i32,
    stderr: String,
  },
  FailedCompile {
    stderr: String,
  },
  MissingExpectation,
}

impl Verdict {
  pub fn is_pass(&self) -> bool {
    matches!(
      self,
      Verdict::Passed | Verdict::PassedIgnored | Verdict::Updated
    )
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Verdict::Passed => "passed",
      Verdict::PassedIgnored => "passed_ignored",
      Verdict::Updated => "updated",
      Verdict::FailedDiff { .. } => "failed_diff",
      Verdict::FailedCrash { .. } => "failed_crash",
      Verdict::FailedCompile { .. } => "failed_compile",
      Verdict::MissingExpectation => "missing_expectation",
    }
  }
}

/// Outcome of the tool invocation alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformVerdict {
  /// Exit code 0; the output still has to be compared and compiled.
  Succeeded,
  /// Non-zero exit that the fixtures declare as expected.
  ExpectedFailure,
  /// Non-zero exit nobody asked for. `snapshot_mismatch` is set when a
  /// `.cerr` snapshot existed but did not match.
  Crashed { snapshot_mismatch: bool },
}

/// Classify a tool run.
///
/// A non-zero exit passes when the normalized stderr equals the `.cerr`
/// snapshot and the exit code is exactly 1, or when a `.failure` marker
/// exists. Every other non-zero exit is a crash.
pub fn classify_transform(
  exit_code: i32,
  stderr: &str,
  expected_stderr: Option<&str>,
  failure_marker: bool,
) -> TransformVerdict {
  if exit_code == 0 {
    return TransformVerdict::Succeeded;
  }

  let snapshot_matches = expected_stderr
    .map(|expected| tool_stderr_matches(expected, stderr))
    .unwrap_or(false);
  if snapshot_matches && exit_code == 1 {
    return TransformVerdict::ExpectedFailure;
  }
  if failure_marker {
    return TransformVerdict::ExpectedFailure;
  }

  TransformVerdict::Crashed {
    snapshot_mismatch: expected_stderr.is_some(),
  }
}

/// Compare tool stderr against a stored `.cerr` snapshot.
pub fn tool_stderr_matches(expected: &str, actual: &str) -> bool {
  let expected = collapse_source_names(expected);
  let expected = collapse_source_refs(&expected);
  let actual = strip_processing_preamble(actual);
  let actual = normalize(&actual, None);
  expected.as_ref() == actual.as_str()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputComparison {
  Match,
  Mismatch { diff: String },
}

impl OutputComparison {
  pub fn is_match(&self) -> bool {
    matches!(self, OutputComparison::Match)
  }
}

/// Exact comparison of tool stdout against the `.expect` contents.
///
/// `fold_crlf` turns `\r\n` in the actual output into `\n` first (tools on
/// Windows emit them, fixtures never contain them).
pub fn compare_output(
  expected: &str,
  actual: &str,
  expected_label: &str,
  fold_crlf: bool,
) -> OutputComparison {
  let actual = if fold_crlf {
    normalize_line_endings(actual)
  } else {
    actual.into()
  };
  if expected == actual.as_ref() {
    return OutputComparison::Match;
  }

  let diff = TextDiff::from_lines(expected, actual.as_ref())
    .unified_diff()
    .context_radius(DIFF_CONTEXT)
    .header(expected_label, "stdout")
    .to_string();
  OutputComparison::Mismatch { diff }
}
