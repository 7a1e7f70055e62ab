use std::ffi::OsString;
use std::path::PathBuf;

pub const DEFAULT_CXX: &str = "/usr/local/clang-current/bin/clang++";
pub const DEFAULT_STD: &str = "c++17";

/// Environment variable read by instrumented children when profiling.
pub const PROFILE_ENV: &str = "LLVM_PROFILE_FILE";
const PROFILE_FILE_PATTERN: &str = "prof%p.profraw";

/// Settings for one harness run. Built once from the command line and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
  /// Binary under test.
  pub insights: PathBuf,
  /// Compiler used to re-validate the transformed output.
  pub cxx: PathBuf,
  /// Default language standard, without the `-std=` prefix.
  pub std: String,
  pub use_libcpp: bool,
  pub llvm_prof_dir: Option<PathBuf>,
  pub update_tests: bool,
  pub failure_is_ok: bool,
  /// Directory holding the fixtures. Children run with this as their working
  /// directory and explicit files are resolved against it.
  pub root: PathBuf,
  /// Explicit test files; empty means every `*.cpp` in `root`.
  pub files: Vec<PathBuf>,
  pub platform: Platform,
}

impl RunConfig {
  pub fn new(insights: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
    Self {
      insights: insights.into(),
      cxx: DEFAULT_CXX.into(),
      std: DEFAULT_STD.to_string(),
      use_libcpp: false,
      llvm_prof_dir: None,
      update_tests: false,
      failure_is_ok: false,
      root: root.into(),
      files: Vec::new(),
      platform: Platform::host(),
    }
  }

  pub fn default_std_flag(&self) -> String {
    format!("-std={}", self.std)
  }

  /// Extra environment handed to every child process.
  pub fn child_env(&self) -> Vec<(OsString, OsString)> {
    match &self.llvm_prof_dir {
      Some(dir) => vec![(
        PROFILE_ENV.into(),
        dir.join(PROFILE_FILE_PATTERN).into_os_string(),
      )],
      None => Vec::new(),
    }
  }
}

/// Host properties that change how the compiler is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
  pub windows: bool,
  pub macos: bool,
  pub pointer_width_64: bool,
}

impl Platform {
  pub fn host() -> Self {
    Self {
      windows: cfg!(windows),
      macos: cfg!(target_os = "macos"),
      pointer_width_64: cfg!(target_pointer_width = "64"),
    }
  }

  pub fn object_extension(&self) -> &'static str {
    if self.windows {
      "obj"
    } else {
      "o"
    }
  }

  /// Whether `-m64` must be forced onto the compiler command line.
  pub fn needs_m64(&self) -> bool {
    !self.windows && (!self.pointer_width_64 || self.macos)
  }
}
