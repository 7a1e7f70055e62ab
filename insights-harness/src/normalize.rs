//! Text passes that make tool and compiler diagnostics comparable across
//! machines.
//!
//! Every pass is a pure `&str -> Cow<str>` function. [`normalize`] runs them
//! in a fixed order; later passes assume the earlier ones already ran (the path
//! pass, for example, must not see the absolute name of the temporary file).

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Canonical name substituted for the OS-assigned temporary source file.
pub const TEMP_PLACEHOLDER: &str = ".tmp.cpp";

/// Replacement for any `<name>.cpp:` fragment when the temporary file name is
/// not known.
pub const SOURCE_PLACEHOLDER: &str = ".tmp:";

static SOURCE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.*).cpp:").unwrap());
static SOURCE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.*).cpp.").unwrap());
static PROCESSING_PREAMBLE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(Error while processing.*.cpp.)").unwrap());
static ABSOLUTE_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(.*)/(.*?:[0-9]+):").unwrap());
static RECOVERY_ADDRESS: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"RecoveryExpr 0x[a-f0-9]+ ").unwrap());

/// Normalize a diagnostic text.
///
/// With a known temporary file name, every literal occurrence of it becomes
/// [`TEMP_PLACEHOLDER`]; otherwise each line's `….cpp:` prefix collapses to
/// [`SOURCE_PLACEHOLDER`]. Absolute paths in front of `file:line:` fragments and
/// `RecoveryExpr` addresses are then stripped.
pub fn normalize(text: &str, temp_name: Option<&str>) -> String {
  let text = match temp_name {
    Some(name) => replace_temp_name(text, name),
    None => collapse_source_names(text),
  };
  let text = collapse_paths(&text);
  strip_recovery_addresses(&text).into_owned()
}

pub fn replace_temp_name<'a>(text: &'a str, temp_name: &str) -> Cow<'a, str> {
  if temp_name.is_empty() || !text.contains(temp_name) {
    return Cow::Borrowed(text);
  }
  Cow::Owned(text.replace(temp_name, TEMP_PLACEHOLDER))
}

/// Collapse everything up to (and including) the last `.cpp:` on a line.
pub fn collapse_source_names(text: &str) -> Cow<'_, str> {
  SOURCE_NAME.replace_all(text, SOURCE_PLACEHOLDER)
}

/// Like [`collapse_source_names`] but accepts any character after `.cpp`.
///
/// Linker diagnostics name the object rather than the source, so stored
/// snapshots are folded with this looser pattern as well.
pub fn collapse_source_refs(text: &str) -> Cow<'_, str> {
  SOURCE_REF.replace_all(text, SOURCE_PLACEHOLDER)
}

/// Drop the `Error while processing <file>.cpp.` trailer the tool prints after
/// a failed translation unit.
pub fn strip_processing_preamble(text: &str) -> Cow<'_, str> {
  PROCESSING_PREAMBLE.replace_all(text, "")
}

/// `/usr/include/c++/v1/vector:12:` becomes `... vector:12:`.
pub fn collapse_paths(text: &str) -> Cow<'_, str> {
  ABSOLUTE_PATH.replace_all(text, "... ${2}:")
}

pub fn strip_recovery_addresses(text: &str) -> Cow<'_, str> {
  RECOVERY_ADDRESS.replace_all(text, "RecoveryExpr ")
}

pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
  if text.contains("\r\n") {
    Cow::Owned(text.replace("\r\n", "\n"))
  } else {
    Cow::Borrowed(text)
  }
}
