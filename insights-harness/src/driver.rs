use crate::compile::CompileOutcome;
use crate::compile::CompilerCheck;
use crate::config::RunConfig;
use crate::discover::discover_cases;
use crate::discover::TestCase;
use crate::fixture::Sidecar;
use crate::normalize::normalize_line_endings;
use crate::process::CommandRunner;
use crate::process::Invocation;
use crate::process::RunResult;
use crate::verdict::classify_transform;
use crate::verdict::compare_output;
use crate::verdict::OutputComparison;
use crate::verdict::TransformVerdict;
use crate::verdict::Verdict;
use crate::Result;
use serde::Deserialize;
use serde::Serialize;
use std::io;
use std::io::Write;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

const SUMMARY_RULE: &str = "-----------------------------------------------------------------";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
  pub total: usize,
  pub passed: usize,
  pub missing: usize,
  pub crashed: usize,
}

impl Counters {
  pub fn record(&mut self, verdict: &Verdict) {
    self.total += 1;
    if verdict.is_pass() {
      self.passed += 1;
    }
    match verdict {
      Verdict::MissingExpectation => self.missing += 1,
      Verdict::FailedCrash { .. } => self.crashed += 1,
      _ => {}
    }
  }

  pub fn expected_to_pass(&self) -> usize {
    self.total.saturating_sub(self.missing)
  }

  pub fn success(&self) -> bool {
    self.missing == 0 && self.passed == self.expected_to_pass()
  }

  pub fn write_summary(&self, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{SUMMARY_RULE}")?;
    writeln!(out, "Tests passed: {}/{}", self.passed, self.expected_to_pass())?;
    writeln!(out, "Insights crashed: {}", self.crashed)?;
    writeln!(out, "Missing expected files: {}", self.missing)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
  pub name: String,
  pub verdict: Verdict,
  pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
  pub summary: Counters,
  pub results: Vec<CaseReport>,
}

impl SuiteReport {
  pub fn success(&self) -> bool {
    self.summary.success()
  }
}

/// Run every case of the suite in order, writing the human report to `out`.
///
/// Per-case failures become verdicts; only harness faults (a tool that cannot
/// be started, unreadable sources, unwritable fixtures) end the run early.
pub fn run_suite<W: Write>(
  config: &RunConfig,
  runner: &dyn CommandRunner,
  out: &mut W,
) -> Result<SuiteReport> {
  let cases = discover_cases(&config.root, &config.files)?;
  info!(
    cases = cases.len(),
    root = %config.root.display(),
    update = config.update_tests,
    "running suite"
  );

  let driver = Driver::new(config, runner);
  let mut summary = Counters::default();
  let mut results = Vec::with_capacity(cases.len());
  for case in &cases {
    let started = Instant::now();
    let verdict = driver.run_case(case, out)?;
    debug!(case = %case.name, verdict = verdict.as_str(), "case finished");
    summary.record(&verdict);
    results.push(CaseReport {
      name: case.name.clone(),
      verdict,
      duration_ms: started.elapsed().as_millis(),
    });
  }

  summary.write_summary(out)?;
  info!(
    passed = summary.passed,
    total = summary.total,
    crashed = summary.crashed,
    missing = summary.missing,
    "suite finished"
  );
  Ok(SuiteReport { summary, results })
}

struct Driver<'a> {
  config: &'a RunConfig,
  runner: &'a dyn CommandRunner,
  compiler: CompilerCheck<'a>,
  default_std: String,
}

impl<'a> Driver<'a> {
  fn new(config: &'a RunConfig, runner: &'a dyn CommandRunner) -> Self {
    Self {
      config,
      runner,
      compiler: CompilerCheck::new(config, runner),
      default_std: config.default_std_flag(),
    }
  }

  fn run_case<W: Write>(&self, case: &TestCase, out: &mut W) -> Result<Verdict> {
    let fixtures = &case.fixtures;
    if fixtures.is_missing_expectation() {
      writeln!(out, "Missing expect/ignore for: {}", case.name)?;
      return Ok(Verdict::MissingExpectation);
    }
    if fixtures.has(Sidecar::Ignore) {
      writeln!(out, "Ignoring: {}", case.name)?;
      return Ok(Verdict::PassedIgnored);
    }

    let std_flag = case.directives.std_flag_or(&self.default_std);
    let result = self.runner.run(&self.tool_invocation(case, std_flag))?;

    let cerr = if result.exit_code != 0 {
      fixtures.read(Sidecar::CompileError)?
    } else {
      None
    };
    match classify_transform(
      result.exit_code,
      &result.stderr,
      cerr.as_deref(),
      fixtures.has(Sidecar::Failure),
    ) {
      TransformVerdict::Succeeded => self.check_output(case, std_flag, &result, out),
      TransformVerdict::ExpectedFailure => {
        writeln!(out, "[PASSED] Transform: {}", case.name)?;
        Ok(Verdict::Passed)
      }
      TransformVerdict::Crashed { snapshot_mismatch } => {
        self.report_crash(case, std_flag, &result, snapshot_mismatch, out)
      }
    }
  }

  /// `<tool> <file> [-use-libc++] [case flags…] -- <std> -m64`
  fn tool_invocation(&self, case: &TestCase, std_flag: &str) -> Invocation {
    let mut invocation = Invocation::new(&self.config.insights, &self.config.root).arg(&case.file);
    if self.config.use_libcpp {
      invocation = invocation.arg("-use-libc++");
    }
    invocation
      .args(&case.directives.tool_flags)
      .args(["--", std_flag, "-m64"])
      .envs(self.config.child_env())
  }

  fn check_output<W: Write>(
    &self,
    case: &TestCase,
    std_flag: &str,
    result: &RunResult,
    out: &mut W,
  ) -> Result<Verdict> {
    let (comparison, compiled) = self.compare_and_compile(case, std_flag, result, out)?;
    self.combine(case, &result.stdout, comparison, compiled, out)
  }

  /// Diff the tool output against `.expect`, then compile it from a scoped
  /// temporary source.
  fn compare_and_compile<W: Write>(
    &self,
    case: &TestCase,
    std_flag: &str,
    result: &RunResult,
    out: &mut W,
  ) -> Result<(OutputComparison, CompileOutcome)> {
    let expect_path = case.fixtures.path(Sidecar::Expect);
    let expected = std::fs::read_to_string(&expect_path)?;

    // Removed on drop, whichever way this function exits.
    let mut temp = tempfile::Builder::new().suffix(".cpp").tempfile()?;
    temp.write_all(result.stdout.as_bytes())?;
    temp.flush()?;
    let temp = temp.into_temp_path();

    let comparison = compare_output(
      &expected,
      &result.stdout,
      &expect_path.display().to_string(),
      self.config.platform.windows,
    );
    match &comparison {
      OutputComparison::Match => {
        writeln!(out, "[PASSED] {:<50} - {:?}", case.name, result.duration)?
      }
      OutputComparison::Mismatch { diff } => {
        writeln!(out, "[FAILED] {} - {:?}", case.name, result.duration)?;
        write!(out, "{diff}")?;
      }
    }

    let compiled = self.compiler.check(&case.fixtures, std_flag, &temp)?;
    match &compiled {
      CompileOutcome::Compiled { stale_snapshot } => {
        if let Some(path) = stale_snapshot {
          writeln!(out, "unused file: {}", path.display())?;
        }
        writeln!(out, "[PASSED] Compile: {}", case.name)?;
      }
      CompileOutcome::ExpectedError { .. } => writeln!(out, "[PASSED] Compile: {}", case.name)?,
      CompileOutcome::Failed {
        normalized_stderr, ..
      } => {
        writeln!(out, "[ERROR] Compile failed: {}", case.name)?;
        writeln!(out, "{normalized_stderr}")?;
      }
    }

    if let Err(err) = temp.close() {
      warn!(case = %case.name, "failed to remove temporary source: {err}");
    }
    Ok((comparison, compiled))
  }

  fn combine<W: Write>(
    &self,
    case: &TestCase,
    stdout: &str,
    comparison: OutputComparison,
    compiled: CompileOutcome,
    out: &mut W,
  ) -> Result<Verdict> {
    let equal = comparison.is_match();
    let compiles = compiled.is_pass();
    if (equal && compiles) || self.config.failure_is_ok {
      return Ok(Verdict::Passed);
    }

    if self.config.update_tests {
      let fixtures = &case.fixtures;
      if compiles {
        fixtures.write(Sidecar::Expect, &self.fixture_text(stdout))?;
        writeln!(out, "Updating test")?;
        return Ok(Verdict::Updated);
      }
      if let CompileOutcome::Failed {
        normalized_stderr, ..
      } = &compiled
      {
        if fixtures.has(Sidecar::CompileError) {
          fixtures.write(Sidecar::Expect, &self.fixture_text(stdout))?;
          fixtures.write(Sidecar::CompileError, normalized_stderr)?;
          writeln!(out, "Updating test cerr")?;
          return Ok(Verdict::Updated);
        }
      }
    }

    if let OutputComparison::Mismatch { diff } = comparison {
      return Ok(Verdict::FailedDiff { diff });
    }
    match compiled {
      CompileOutcome::Failed { raw_stderr, .. } => Ok(Verdict::FailedCompile { stderr: raw_stderr }),
      _ => Ok(Verdict::Passed),
    }
  }

  fn report_crash<W: Write>(
    &self,
    case: &TestCase,
    std_flag: &str,
    result: &RunResult,
    snapshot_mismatch: bool,
    out: &mut W,
  ) -> Result<Verdict> {
    if snapshot_mismatch {
      writeln!(out, "[ERROR] Transform: {}", case.name)?;
    }
    writeln!(
      out,
      "Insight crashed for: {} with: {}",
      case.name, result.exit_code
    )?;
    writeln!(out, "{}", result.stderr)?;

    // Output of a crashed run only becomes the expectation once it compiles.
    // The `.cerr` snapshot is never rewritten for a crash.
    if self.config.update_tests && !result.stdout.is_empty() {
      let (comparison, compiled) = self.compare_and_compile(case, std_flag, result, out)?;
      if compiled.is_pass() && !comparison.is_match() {
        case
          .fixtures
          .write(Sidecar::Expect, &self.fixture_text(&result.stdout))?;
        writeln!(out, "Updating test")?;
      }
    }

    Ok(Verdict::FailedCrash {
      exit_code: result.exit_code,
      stderr: result.stderr.clone(),
    })
  }

  fn fixture_text(&self, stdout: &str) -> String {
    if self.config.platform.windows {
      normalize_line_endings(stdout).into_owned()
    } else {
      stdout.to_string()
    }
  }
}
