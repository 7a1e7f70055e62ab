#![cfg(unix)]

use assert_cmd::Command;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;
use tempfile::tempdir;
use tempfile::TempDir;

/// Echoes the test source back, like a transformation that changes nothing.
const FAKE_TOOL: &str = "#!/bin/sh\ncat \"$1\"\n";

/// Leaves an object file named after the source in the working directory.
const FAKE_COMPILER: &str = "#!/bin/sh\nfor last; do :; done\ntouch \"$(basename \"$last\" .cpp).o\"\n";

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
  let path = dir.join(name);
  fs::write(&path, body).expect("write script");
  let mut perms = fs::metadata(&path).expect("metadata").permissions();
  perms.set_mode(0o755);
  fs::set_permissions(&path, perms).expect("chmod");
  path
}

struct Fixture {
  _tools: TempDir,
  root: TempDir,
  tool: PathBuf,
  compiler: PathBuf,
}

impl Fixture {
  fn new() -> Self {
    let tools = tempdir().expect("tempdir");
    let tool = script(tools.path(), "insights", FAKE_TOOL);
    let compiler = script(tools.path(), "clang++", FAKE_COMPILER);
    Fixture {
      _tools: tools,
      root: tempdir().expect("tempdir"),
      tool,
      compiler,
    }
  }

  fn write(&self, name: &str, contents: &str) {
    fs::write(self.root.path().join(name), contents).expect("write fixture");
  }

  fn command(&self) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("insights-harness").expect("binary");
    cmd
      .current_dir(self.root.path())
      .env_remove("RUST_LOG")
      .arg("run")
      .arg("--insights")
      .arg(&self.tool)
      .arg("--cxx")
      .arg(&self.compiler);
    cmd
  }
}

#[test]
fn passing_suite_exits_zero_and_cleans_up_objects() {
  let fixture = Fixture::new();
  fixture.write("a.cpp", "int a;\n");
  fixture.write("a.expect", "int a;\n");

  let assert = fixture.command().assert().success();
  let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
  assert!(stdout.contains("[PASSED] Compile: a.cpp"), "{stdout}");
  assert!(stdout.contains("Tests passed: 1/1"), "{stdout}");

  let leftovers: Vec<_> = fs::read_dir(fixture.root.path())
    .unwrap()
    .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
    .filter(|name| name.ends_with(".o"))
    .collect();
  assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[test]
fn missing_expectation_fails_the_run() {
  let fixture = Fixture::new();
  fixture.write("a.cpp", "int a;\n");
  fixture.write("a.expect", "int a;\n");
  fixture.write("b.cpp", "int b;\n");

  let assert = fixture.command().assert().failure().code(1);
  let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
  assert!(stdout.contains("Missing expect/ignore for: b.cpp"), "{stdout}");
  assert!(stdout.contains("Tests passed: 1/1"), "{stdout}");
  assert!(stdout.contains("Missing expected files: 1"), "{stdout}");
}

#[test]
fn explicit_files_limit_the_run() {
  let fixture = Fixture::new();
  fixture.write("a.cpp", "int a;\n");
  fixture.write("a.expect", "int a;\n");
  fixture.write("b.cpp", "int b;\n");

  let assert = fixture.command().arg("a.cpp").assert().success();
  let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
  assert!(!stdout.contains("b.cpp"), "{stdout}");
}

#[test]
fn json_report_replaces_human_output() {
  let fixture = Fixture::new();
  fixture.write("a.cpp", "int a;\n");
  fixture.write("a.expect", "int b;\n");

  let assert = fixture.command().arg("--json").assert().failure().code(1);
  let report: serde_json::Value =
    serde_json::from_slice(&assert.get_output().stdout).expect("json report");
  assert_eq!(report["summary"]["total"], 1);
  assert_eq!(report["summary"]["passed"], 0);
  assert_eq!(report["results"][0]["name"], "a.cpp");
  assert_eq!(report["results"][0]["verdict"]["kind"], "failed_diff");
}

#[test]
fn update_mode_repairs_expectation() {
  let fixture = Fixture::new();
  fixture.write("a.cpp", "int a;\n");
  fixture.write("a.expect", "stale\n");

  fixture.command().arg("--update-tests").assert().success();
  assert_eq!(
    fs::read_to_string(fixture.root.path().join("a.expect")).unwrap(),
    "int a;\n"
  );
  fixture.command().assert().success();
}

#[test]
fn unstartable_tool_is_a_harness_error() {
  let fixture = Fixture::new();
  fixture.write("a.cpp", "int a;\n");
  fixture.write("a.expect", "int a;\n");

  #[allow(deprecated)]
  let assert = Command::cargo_bin("insights-harness")
    .expect("binary")
    .current_dir(fixture.root.path())
    .args(["run", "--insights", "/nonexistent/insights"])
    .assert()
    .failure()
    .code(1);
  let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
  assert!(
    stderr.contains("error: failed to start /nonexistent/insights"),
    "{stderr}"
  );
}
