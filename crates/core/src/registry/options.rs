//! Per-transformer option filtering.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Pseudo-option carrying the remote deadline in milliseconds. It survives
/// stripping and is never forwarded as a real option.
pub const TIMEOUT_OPTION: &str = "timeout";

/// Restricts `supplied` to the options a transformer declares.
///
/// When every supplied key is declared the input map itself is returned.
pub fn strip_options<'a>(
    all_option_names: &HashSet<String>,
    supplied: &'a HashMap<String, String>,
) -> Cow<'a, HashMap<String, String>> {
    let keep = |name: &String| name == TIMEOUT_OPTION || all_option_names.contains(name);

    if supplied.keys().all(keep) {
        return Cow::Borrowed(supplied);
    }

    Cow::Owned(
        supplied
            .iter()
            .filter(|(name, _)| keep(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn options(list: &[(&str, &str)]) -> HashMap<String, String> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_subset_returns_same_map() {
        let declared = names(&["width", "height", "page"]);
        let supplied = options(&[("width", "100"), ("height", "50")]);
        let stripped = strip_options(&declared, &supplied);
        assert!(matches!(stripped, Cow::Borrowed(_)));
        assert!(std::ptr::eq(stripped.as_ref(), &supplied));
    }

    #[test]
    fn test_empty_options_return_same_map() {
        let supplied = HashMap::new();
        let stripped = strip_options(&HashSet::new(), &supplied);
        assert!(std::ptr::eq(stripped.as_ref(), &supplied));
    }

    #[test]
    fn test_foreign_options_are_removed() {
        let declared = names(&["width"]);
        let supplied = options(&[("width", "100"), ("quality", "80")]);
        let stripped = strip_options(&declared, &supplied);
        assert!(matches!(stripped, Cow::Owned(_)));
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped.get("width").map(String::as_str), Some("100"));
    }

    #[test]
    fn test_timeout_survives_stripping() {
        let declared = names(&["width"]);
        let supplied = options(&[("timeout", "2000"), ("quality", "80")]);
        let stripped = strip_options(&declared, &supplied);
        assert_eq!(stripped.len(), 1);
        assert!(stripped.contains_key(TIMEOUT_OPTION));

        let only_timeout = options(&[("timeout", "2000")]);
        assert!(matches!(
            strip_options(&declared, &only_timeout),
            Cow::Borrowed(_)
        ));
    }
}
