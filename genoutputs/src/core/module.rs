//! Module naming: generation-type tags and per-module directory names.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Grouping key for modules whose file name carries no generation-type tag.
pub const UNKNOWN_GENTYPE: &str = "unknown";

static GENTYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var_\d{4}\.(?P<gentype>[a-z]+)\.").expect("generation-type pattern is valid")
});

/// Generation-type tag of a module, e.g. `var_0000.diffmode.py` -> `diffmode`.
pub fn gentype(module_path: &str) -> &str {
    let name = Path::new(module_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(module_path);
    GENTYPE_RE
        .captures(name)
        .and_then(|caps| caps.name("gentype"))
        .map_or(UNKNOWN_GENTYPE, |m| m.as_str())
}

/// File name without its final extension; names the module's working directory.
pub fn module_base(module_path: &Path) -> String {
    module_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
