use clap::Args;
use clap::Parser;
use clap::Subcommand;
use insights_harness::run_suite;
use insights_harness::ProcessRunner;
use insights_harness::RunConfig;
use insights_harness::DEFAULT_CXX;
use insights_harness::DEFAULT_STD;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Golden-file test runner for the C++ Insights transformer", long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the test cases of the current directory against their fixtures
  Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
  /// Path to the insights binary under test
  #[arg(long, value_name = "PATH")]
  insights: PathBuf,

  /// Compiler used to check that the transformed output still builds
  #[arg(long, value_name = "PATH", default_value = DEFAULT_CXX)]
  cxx: PathBuf,

  /// Count every case as passed, whatever its outcome
  #[arg(long)]
  failure_is_ok: bool,

  /// Rewrite `.expect` (and `.cerr`) files from the actual output
  #[arg(long)]
  update_tests: bool,

  /// Default C++ dialect, without the `-std=` prefix
  #[arg(long, value_name = "DIALECT", default_value = DEFAULT_STD)]
  std: String,

  /// Pass `-use-libc++` to the tool
  #[arg(long)]
  use_libcpp: bool,

  /// Directory for raw LLVM profiles written by instrumented children
  #[arg(long, value_name = "DIR")]
  llvm_prof_dir: Option<PathBuf>,

  /// Print the JSON report instead of the human log
  #[arg(long)]
  json: bool,

  /// Enable tracing output from the harness
  #[arg(long)]
  trace: bool,

  /// Test sources to run; defaults to every `*.cpp` in the working directory
  #[arg(value_name = "FILE")]
  files: Vec<PathBuf>,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  match cli.command {
    Commands::Run(args) => run(args),
  }
}

fn run(args: RunArgs) -> ExitCode {
  init_tracing(args.trace);

  let root = match std::env::current_dir() {
    Ok(root) => root,
    Err(err) => return print_error(err),
  };

  let mut config = RunConfig::new(args.insights, root);
  config.cxx = args.cxx;
  config.std = args.std;
  config.use_libcpp = args.use_libcpp;
  config.llvm_prof_dir = args
    .llvm_prof_dir
    .filter(|dir| !dir.as_os_str().is_empty());
  config.update_tests = args.update_tests;
  config.failure_is_ok = args.failure_is_ok;
  config.files = args.files;

  let runner = ProcessRunner;
  let report = if args.json {
    run_suite(&config, &runner, &mut io::sink())
  } else {
    run_suite(&config, &runner, &mut io::stdout().lock())
  };

  match report {
    Ok(report) => {
      if args.json {
        match serde_json::to_string_pretty(&report) {
          Ok(output) => println!("{output}"),
          Err(err) => return print_error(err),
        }
      }
      if report.success() {
        ExitCode::SUCCESS
      } else {
        ExitCode::from(1)
      }
    }
    Err(err) => print_error(err),
  }
}

fn print_error(err: impl std::fmt::Display) -> ExitCode {
  eprintln!("error: {err}");
  ExitCode::from(1)
}

fn init_tracing(enable: bool) {
  if !enable {
    return;
  }

  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr);
  if let Err(err) = builder.try_init() {
    eprintln!("failed to install tracing subscriber: {err}");
  }
}
