use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod compile;
pub mod config;
pub mod directives;
pub mod discover;
pub mod driver;
pub mod fixture;
pub mod normalize;
pub mod process;
pub mod verdict;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
  #[error(transparent)]
  Io(#[from] io::Error),
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },
  #[error("cannot read test source {}: {source}", path.display())]
  Source {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("cannot write fixture {}: {source}", path.display())]
  Fixture {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

pub use compile::CompileOutcome;
pub use compile::CompilerCheck;
pub use compile::TempNameRule;
pub use config::Platform;
pub use config::RunConfig;
pub use config::DEFAULT_CXX;
pub use config::DEFAULT_STD;
pub use directives::CaseDirectives;
pub use discover::discover_cases;
pub use discover::TestCase;
pub use driver::run_suite;
pub use driver::CaseReport;
pub use driver::Counters;
pub use driver::SuiteReport;
pub use fixture::FixtureBundle;
pub use fixture::Sidecar;
pub use normalize::normalize;
pub use process::CommandRunner;
pub use process::Invocation;
pub use process::ProcessRunner;
pub use process::RunResult;
pub use verdict::Verdict;
