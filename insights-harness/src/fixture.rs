use crate::HarnessError;
use crate::Result;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Per-case auxiliary files, keyed by the source's base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sidecar {
  /// Exact expected stdout of the tool.
  Expect,
  /// Presence-only: skip the case.
  Ignore,
  /// Expected normalized stderr (tool exit 1, or compiler failure).
  CompileError,
  /// Expected compiler stderr with only the temporary name replaced.
  AltCompileError,
  /// Presence-only: any non-zero tool exit is accepted.
  Failure,
}

impl Sidecar {
  pub const ALL: [Sidecar; 5] = [
    Sidecar::Expect,
    Sidecar::Ignore,
    Sidecar::CompileError,
    Sidecar::AltCompileError,
    Sidecar::Failure,
  ];

  pub fn extension(self) -> &'static str {
    match self {
      Sidecar::Expect => "expect",
      Sidecar::Ignore => "ignore",
      Sidecar::CompileError => "cerr",
      Sidecar::AltCompileError => "ccerr",
      Sidecar::Failure => "failure",
    }
  }
}

/// Which sidecars exist next to a test source, probed once when the case is
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureBundle {
  base: PathBuf,
  present: [bool; 5],
}

impl FixtureBundle {
  pub fn probe(source: &Path) -> Self {
    let base = source.with_extension("");
    let mut present = [false; 5];
    for (slot, kind) in present.iter_mut().zip(Sidecar::ALL) {
      *slot = sidecar_path(&base, kind).is_file();
    }
    Self { base, present }
  }

  pub fn has(&self, kind: Sidecar) -> bool {
    self.present[index(kind)]
  }

  /// Location of a sidecar whether or not it exists.
  pub fn path(&self, kind: Sidecar) -> PathBuf {
    sidecar_path(&self.base, kind)
  }

  /// Path of the sidecar if it was present when probed.
  pub fn get(&self, kind: Sidecar) -> Option<PathBuf> {
    self.has(kind).then(|| self.path(kind))
  }

  /// Contents of a present sidecar.
  pub fn read(&self, kind: Sidecar) -> Result<Option<String>> {
    match self.get(kind) {
      Some(path) => Ok(Some(fs::read_to_string(&path)?)),
      None => Ok(None),
    }
  }

  pub fn write(&self, kind: Sidecar, contents: &str) -> Result<()> {
    let path = self.path(kind);
    fs::write(&path, contents).map_err(|source| HarnessError::Fixture { path, source })
  }

  pub fn is_missing_expectation(&self) -> bool {
    !self.has(Sidecar::Expect) && !self.has(Sidecar::Ignore)
  }
}

fn sidecar_path(base: &Path, kind: Sidecar) -> PathBuf {
  let mut name = base.as_os_str().to_owned();
  name.push(".");
  name.push(kind.extension());
  PathBuf::from(name)
}

fn index(kind: Sidecar) -> usize {
  match kind {
    Sidecar::Expect => 0,
    Sidecar::Ignore => 1,
    Sidecar::CompileError => 2,
    Sidecar::AltCompileError => 3,
    Sidecar::Failure => 4,
  }
}
