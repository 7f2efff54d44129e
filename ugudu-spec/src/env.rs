//! Environment-variable substitution applied to the raw spec text before
//! parsing.
//!
//! Supports `${VAR}` and `${VAR:-default}` forms. Unset variables with no
//! default substitute to an empty string rather than erroring — the YAML
//! parser (or validation) will reject whatever shape results.

/// Substitute `${VAR}` / `${VAR:-default}` references in `text` using the
/// process environment.
#[must_use]
pub fn substitute(text: &str) -> String {
    substitute_with(text, |key| std::env::var(key).ok())
}

/// Same as [`substitute`], but resolves variables through `lookup` instead
/// of the process environment. Exposed for tests.
pub(crate) fn substitute_with(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let inner = &after[..end];
        let (key, default) = match inner.split_once(":-") {
            Some((k, d)) => (k, Some(d)),
            None => (inner, None),
        };
        let value = lookup(key).or_else(|| default.map(str::to_string));
        out.push_str(&value.unwrap_or_default());
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
