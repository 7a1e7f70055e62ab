use serde::Deserialize;
use serde::Serialize;

/// Number of leading source lines scanned for directives.
pub const HEADER_LINES: usize = 2;

const STD_DIRECTIVE: &str = "cmdline:";
const TOOL_DIRECTIVE: &str = "cmdlineinsights:";

/// Per-case overrides embedded in the head of a test source, typically as
/// comments:
///
/// ```text
/// // cmdline:-std=c++20
/// // cmdlineinsights:-edu-show-lifetime -show-all-implicit-casts
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseDirectives {
  /// Replaces the run-wide `-std=` flag, for both the tool and the compiler.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub std_flag: Option<String>,
  /// Extra flags for the tool under test only.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tool_flags: Vec<String>,
}

impl CaseDirectives {
  /// Parse the first [`HEADER_LINES`] lines of `source`.
  pub fn parse(source: &str) -> CaseDirectives {
    let header: Vec<&str> = source.lines().take(HEADER_LINES).collect();

    let std_flag = find_directive(&header, STD_DIRECTIVE)
      .map(str::trim)
      .filter(|value| !value.is_empty())
      .map(str::to_string);
    let tool_flags = find_directive(&header, TOOL_DIRECTIVE)
      .map(|value| value.split_whitespace().map(str::to_string).collect())
      .unwrap_or_default();

    CaseDirectives {
      std_flag,
      tool_flags,
    }
  }

  pub fn std_flag_or<'a>(&'a self, default: &'a str) -> &'a str {
    self.std_flag.as_deref().unwrap_or(default)
  }
}

/// Value after the last occurrence of `marker` on the first line carrying it.
fn find_directive<'a>(header: &[&'a str], marker: &str) -> Option<&'a str> {
  header
    .iter()
    .find_map(|line| line.rfind(marker).map(|idx| &line[idx + marker.len()..]))
}
