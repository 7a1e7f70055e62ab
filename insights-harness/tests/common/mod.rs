use insights_harness::CommandRunner;
use insights_harness::Invocation;
use insights_harness::RunResult;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const TOOL: &str = "insights";
pub const COMPILER: &str = "cxx";

/// Transformed output containing this marker is rejected by the fake compiler.
pub const BROKEN: &str = "BROKEN";

/// Trailing note of every fake compiler error, naming an absolute header path.
pub const HEADER_NOTE: &str = "/usr/include/c++/v1/cstdio:12: note: declared here\n";

pub fn output(stdout: &str) -> RunResult {
  RunResult {
    stdout: stdout.to_string(),
    stderr: String::new(),
    exit_code: 0,
    duration: Duration::from_millis(1),
  }
}

pub fn failure(exit_code: i32, stderr: &str) -> RunResult {
  RunResult {
    stdout: String::new(),
    stderr: stderr.to_string(),
    exit_code,
    duration: Duration::from_millis(1),
  }
}

/// Answers tool invocations from a table keyed by test file and plays a
/// compiler that accepts anything without [`BROKEN`] in it.
#[derive(Default)]
pub struct ScriptedRunner {
  tool: HashMap<String, RunResult>,
  calls: RefCell<Vec<Invocation>>,
}

impl ScriptedRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on(mut self, file: &str, result: RunResult) -> Self {
    self.tool.insert(file.to_string(), result);
    self
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.borrow().clone()
  }

  pub fn tool_calls(&self) -> Vec<Invocation> {
    self
      .calls()
      .into_iter()
      .filter(|call| call.program == Path::new(TOOL))
      .collect()
  }

  pub fn compiler_calls(&self) -> Vec<Invocation> {
    self
      .calls()
      .into_iter()
      .filter(|call| call.program == Path::new(COMPILER))
      .collect()
  }

  pub fn reset(&self) {
    self.calls.borrow_mut().clear();
  }

  fn compile(&self, invocation: &Invocation) -> RunResult {
    let source = invocation.args.last().expect("compiler source argument");
    let text = fs::read_to_string(source).expect("temporary source exists during compile");
    if text.contains(BROKEN) {
      let name = source.to_string_lossy();
      failure(1, &format!("{name}:1:1: error: broken\n{HEADER_NOTE}"))
    } else {
      output("")
    }
  }
}

impl CommandRunner for ScriptedRunner {
  fn run(&self, invocation: &Invocation) -> insights_harness::Result<RunResult> {
    self.calls.borrow_mut().push(invocation.clone());
    if invocation.program == Path::new(COMPILER) {
      return Ok(self.compile(invocation));
    }
    let file = invocation.arg_strings()[0].clone();
    Ok(
      self
        .tool
        .get(&file)
        .cloned()
        .unwrap_or_else(|| panic!("no scripted result for {file}")),
    )
  }
}

pub fn write(root: &Path, name: &str, contents: &str) {
  fs::write(root.join(name), contents).expect("write fixture");
}
