//! Namespace qualification of declared and referenced names
//!
//! Names are stored fully qualified without a leading `\`. Declarations in
//! `namespace N` become `N\name`; the global namespace is the empty string.

pub const SEPARATOR: char = '\\';

/// Resolved target of a function or constant reference. Unqualified names
/// written inside a namespace fall back to the global name when the
/// namespaced one does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub fallback: Option<String>,
}

pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}{SEPARATOR}{name}")
    }
}

/// Fully qualified, relative (`namespace\X`) or qualified (`X\Y`) names
/// resolve without a fallback.
fn resolve_qualified(namespace: &str, written: &str) -> Option<String> {
    if let Some(absolute) = written.strip_prefix(SEPARATOR) {
        return Some(absolute.to_string());
    }
    if let Some((head, rest)) = written.split_once(SEPARATOR) {
        if head.eq_ignore_ascii_case("namespace") {
            return Some(qualify(namespace, rest));
        }
        return Some(qualify(namespace, written));
    }
    None
}

/// Class and trait names never fall back to the global namespace.
pub fn resolve_class(namespace: &str, written: &str) -> String {
    resolve_qualified(namespace, written).unwrap_or_else(|| qualify(namespace, written))
}

pub fn resolve_function(namespace: &str, written: &str) -> ResolvedName {
    if let Some(name) = resolve_qualified(namespace, written) {
        return ResolvedName {
            name,
            fallback: None,
        };
    }
    ResolvedName {
        name: qualify(namespace, written),
        fallback: (!namespace.is_empty()).then(|| written.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_namespace_keeps_names() {
        assert_eq!(resolve_class("", "C"), "C");
        assert_eq!(
            resolve_function("", "f"),
            ResolvedName {
                name: "f".to_string(),
                fallback: None
            }
        );
    }

    #[test]
    fn fully_qualified_names_are_absolute() {
        assert_eq!(resolve_class(r"N", r"\M\C"), r"M\C");
        assert_eq!(resolve_function(r"N", r"\f").name, "f");
        assert_eq!(resolve_function(r"N", r"\f").fallback, None);
    }

    #[test]
    fn qualified_names_are_relative_to_the_namespace() {
        assert_eq!(resolve_class(r"N", r"Sub\C"), r"N\Sub\C");
        assert_eq!(resolve_class(r"N", r"namespace\C"), r"N\C");
        assert_eq!(resolve_function(r"N\Sub", r"namespace\f").name, r"N\Sub\f");
    }

    #[test]
    fn unqualified_functions_fall_back_to_global() {
        let resolved = resolve_function("N", "strlen");
        assert_eq!(resolved.name, r"N\strlen");
        assert_eq!(resolved.fallback.as_deref(), Some("strlen"));
        assert_eq!(resolve_class("N", "C"), r"N\C");
    }
}
