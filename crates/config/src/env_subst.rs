use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `${NAME}` or `${NAME:-fallback}`.
static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").ok());

/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// `${VAR:-fallback}` uses `fallback` when `VAR` is unset. Unresolvable
/// placeholders without a fallback are left as-is so the parse error points
/// at them.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Same as [`substitute_env`] with a custom lookup, so tests never touch the
/// process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return input.to_string();
    };

    re.replace_all(input, |caps: &Captures<'_>| {
        let name = &caps[1];
        match (lookup(name), caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(fallback)) => fallback.as_str().to_string(),
            (None, None) => caps[0].to_string(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "SHELFSCAN_TEST_DIR" => Some("/tmp/out".to_string()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("dir = \"${SHELFSCAN_TEST_DIR}\"", lookup),
            "dir = \"/tmp/out\""
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${SHELFSCAN_NOPE}", lookup),
            "${SHELFSCAN_NOPE}"
        );
    }

    #[test]
    fn uses_fallback_when_unset() {
        assert_eq!(
            substitute_env_with("headless = ${SHELFSCAN_NOPE:-true}", lookup),
            "headless = true"
        );
        assert_eq!(
            substitute_env_with("${SHELFSCAN_TEST_DIR:-/ignored}", lookup),
            "/tmp/out"
        );
    }

    #[test]
    fn malformed_placeholder_is_literal() {
        assert_eq!(substitute_env_with("${UNCLOSED", lookup), "${UNCLOSED");
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
