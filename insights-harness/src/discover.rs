use crate::directives::CaseDirectives;
use crate::fixture::FixtureBundle;
use crate::HarnessError;
use crate::Result;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use walkdir::WalkDir;

pub const SOURCE_EXTENSION: &str = "cpp";

#[derive(Debug, Clone)]
pub struct TestCase {
  /// Name as given on the command line or as found in the root directory.
  pub name: String,
  /// Path handed to the tool, relative to the fixture root.
  pub file: PathBuf,
  /// File name without the extension; sidecars share it.
  pub base_name: String,
  pub source: PathBuf,
  pub fixtures: FixtureBundle,
  pub directives: CaseDirectives,
}

impl TestCase {
  pub fn load(root: &Path, file: &Path) -> Result<TestCase> {
    let source = root.join(file);
    let text = fs::read(&source).map_err(|err| HarnessError::Source {
      path: source.clone(),
      source: err,
    })?;
    let directives = CaseDirectives::parse(&String::from_utf8_lossy(&text));
    let base_name = source
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_default();

    Ok(TestCase {
      name: file.display().to_string(),
      file: file.to_path_buf(),
      base_name,
      fixtures: FixtureBundle::probe(&source),
      source,
      directives,
    })
  }
}

/// Build the test cases for a run, sorted by name.
///
/// With no explicit `files`, every regular `*.cpp` file directly inside `root`
/// is a test.
pub fn discover_cases(root: &Path, files: &[PathBuf]) -> Result<Vec<TestCase>> {
  let mut names = if files.is_empty() {
    list_sources(root)?
  } else {
    files.to_vec()
  };
  names.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));

  names
    .iter()
    .map(|file| TestCase::load(root, file))
    .collect()
}

fn list_sources(root: &Path) -> Result<Vec<PathBuf>> {
  let mut found = Vec::new();
  for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
    let entry = entry.map_err(std::io::Error::from)?;
    if !entry.file_type().is_file() {
      continue;
    }
    let path = entry.path();
    if path.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
      continue;
    }
    if let Some(name) = path.file_name() {
      found.push(PathBuf::from(name));
    }
  }
  Ok(found)
}
