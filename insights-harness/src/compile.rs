//! Re-compiling the transformed output.
//!
//! The tool's stdout must still be a valid translation unit. It is handed to
//! the configured compiler in syntax-and-codegen mode (`-c`); failures can be
//! expected through `.cerr` or `.ccerr` snapshots.

use crate::config::Platform;
use crate::config::RunConfig;
use crate::fixture::FixtureBundle;
use crate::fixture::Sidecar;
use crate::normalize::normalize;
use crate::normalize::replace_temp_name;
use crate::process::CommandRunner;
use crate::process::Invocation;
use crate::Result;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::warn;

/// Neutralize the Itanium ABI guard hooks the tool writes out for function
/// local statics.
const GUARD_OVERRIDES: &[&str] = &[
  "-D__cxa_guard_acquire(x)=true",
  "-D__cxa_guard_release(x)",
  "-D__cxa_guard_abort(x)",
];
const CXX98_FLAG: &str = "-std=c++98";
const CXX98_SHIMS: &[&str] = &["-Dalignas(x)="];
const MSVC_FLAGS: &[&str] = &["/nologo", "/EHsc", "/IGNORE:C4335"];

/// How the temporary file name is scrubbed before comparing compiler stderr
/// with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempNameRule {
  /// Full normalization with the temporary name known; `.cerr` convention.
  Cleaned,
  /// Only the temporary name is replaced; `.ccerr` convention.
  Replaced,
}

impl TempNameRule {
  pub fn apply(self, stderr: &str, temp_name: &str) -> String {
    match self {
      TempNameRule::Cleaned => normalize(stderr, Some(temp_name)),
      TempNameRule::Replaced => replace_temp_name(stderr, temp_name).into_owned(),
    }
  }

  pub fn sidecar(self) -> Sidecar {
    match self {
      TempNameRule::Cleaned => Sidecar::CompileError,
      TempNameRule::Replaced => Sidecar::AltCompileError,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
  /// Exit code 0. `stale_snapshot` names a `.cerr` that was not needed.
  Compiled { stale_snapshot: Option<PathBuf> },
  /// The compiler failed exactly as a snapshot says it should.
  ExpectedError { rule: TempNameRule },
  Failed {
    raw_stderr: String,
    /// Stderr under [`TempNameRule::Cleaned`]; what update mode stores.
    normalized_stderr: String,
  },
}

impl CompileOutcome {
  pub fn is_pass(&self) -> bool {
    !matches!(self, CompileOutcome::Failed { .. })
  }
}

/// Turn a GCC-style `-std=` flag into the compiler's own spelling.
pub fn translate_std_flag(flag: &str, platform: Platform) -> String {
  if platform.windows {
    flag.replace("-std=", "/std:").replace("2a", "latest")
  } else {
    flag.to_string()
  }
}

pub fn compiler_args(
  std_flag: &str,
  include_dir: &Path,
  source: &Path,
  platform: Platform,
) -> Vec<OsString> {
  let std_flag = translate_std_flag(std_flag, platform);
  let mut args: Vec<OsString> = vec![std_flag.clone().into()];
  args.extend(GUARD_OVERRIDES.iter().map(OsString::from));
  args.push("-I".into());
  args.push(include_dir.into());

  if platform.windows {
    args.extend(MSVC_FLAGS.iter().map(OsString::from));
  } else if platform.needs_m64() {
    args.push("-m64".into());
  }

  if std_flag == CXX98_FLAG {
    args.extend(CXX98_SHIMS.iter().map(OsString::from));
  }

  args.push("-c".into());
  args.push(source.into());
  args
}

/// Compare failed compiler stderr against the `.cerr` snapshot, then the
/// `.ccerr` one. Each snapshot uses its own [`TempNameRule`].
pub fn classify_compile_failure(
  stderr: &str,
  temp_name: &str,
  cerr: Option<&str>,
  ccerr: Option<&str>,
) -> CompileOutcome {
  // Each snapshot sees the raw stderr under its own rule; `.ccerr` is never
  // compared against the `.cerr`-cleaned text.
  let candidates = [
    (TempNameRule::Cleaned, cerr),
    (TempNameRule::Replaced, ccerr),
  ];
  for (rule, expected) in candidates {
    let Some(expected) = expected else {
      continue;
    };
    if rule.apply(stderr, temp_name) == expected {
      return CompileOutcome::ExpectedError { rule };
    }
  }

  CompileOutcome::Failed {
    raw_stderr: stderr.to_string(),
    normalized_stderr: TempNameRule::Cleaned.apply(stderr, temp_name),
  }
}

/// Runs the compiler over the transformed output of one case.
pub struct CompilerCheck<'a> {
  config: &'a RunConfig,
  runner: &'a dyn CommandRunner,
}

impl<'a> CompilerCheck<'a> {
  pub fn new(config: &'a RunConfig, runner: &'a dyn CommandRunner) -> Self {
    Self { config, runner }
  }

  pub fn invocation(&self, std_flag: &str, temp_source: &Path) -> Invocation {
    Invocation::new(&self.config.cxx, &self.config.root)
      .args(compiler_args(
        std_flag,
        &self.config.root,
        temp_source,
        self.config.platform,
      ))
      .envs(self.config.child_env())
  }

  pub fn check(
    &self,
    fixtures: &FixtureBundle,
    std_flag: &str,
    temp_source: &Path,
  ) -> Result<CompileOutcome> {
    let result = self.runner.run(&self.invocation(std_flag, temp_source))?;

    if result.exit_code == 0 {
      self.remove_object(temp_source);
      return Ok(CompileOutcome::Compiled {
        stale_snapshot: fixtures.get(Sidecar::CompileError),
      });
    }

    debug!(exit_code = result.exit_code, "compiler rejected output");
    let temp_name = temp_source.to_string_lossy();
    let cerr = fixtures.read(TempNameRule::Cleaned.sidecar())?;
    let ccerr = fixtures.read(TempNameRule::Replaced.sidecar())?;
    Ok(classify_compile_failure(
      &result.stderr,
      &temp_name,
      cerr.as_deref(),
      ccerr.as_deref(),
    ))
  }

  /// The compiler drops `<stem>.o` into its working directory.
  fn remove_object(&self, temp_source: &Path) {
    let Some(stem) = temp_source.file_stem() else {
      return;
    };
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(self.config.platform.object_extension());
    let object = self.config.root.join(name);

    match std::fs::remove_file(&object) {
      Ok(()) => {}
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        debug!(object = %object.display(), "no object file to remove");
      }
      Err(err) => warn!(object = %object.display(), "failed to remove object file: {err}"),
    }
  }
}
