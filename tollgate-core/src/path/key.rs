//! [`PathKey`]: the immutable keyed path used for both hostnames
//! (right-to-left) and URL paths (left-to-right) throughout routing.

use std::fmt;
use std::sync::Arc;

/// An ordered, non-empty-component path plus a wildcard flag.
///
/// Two keys are equal only if both their component sequence and their
/// `wildcard` flag match. A wildcard key with components `P` matches any
/// concrete key whose components start with `P` (see [`PathKey::matches`]).
///
/// Components never contain the path separator (`/` for URL paths, `.`
/// for hostnames once reversed). An empty string component is permitted
/// only as an intentional trailing sentinel, used to encode "directory"
/// semantics (`/x/` vs `/x`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey {
    components: Arc<[Arc<str>]>,
    wildcard: bool,
}

impl PathKey {
    /// The empty, non-wildcard key (`base` of a fresh dispatch, or the
    /// default-host binding).
    pub fn root() -> Self {
        PathKey {
            components: Arc::from(Vec::new().into_boxed_slice()),
            wildcard: false,
        }
    }

    /// Builds a key from an ordered list of components.
    pub fn new<I, S>(components: I, wildcard: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let components: Vec<Arc<str>> = components.into_iter().map(Into::into).collect();
        PathKey {
            components: Arc::from(components.into_boxed_slice()),
            wildcard,
        }
    }

    pub fn components(&self) -> &[Arc<str>] {
        &self.components
    }

    pub fn wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns a new key with `component` appended.
    pub fn concat(&self, component: impl Into<Arc<str>>) -> Self {
        let mut v: Vec<Arc<str>> = self.components.iter().cloned().collect();
        v.push(component.into());
        PathKey {
            components: Arc::from(v.into_boxed_slice()),
            wildcard: self.wildcard,
        }
    }

    /// Returns a new key with `other`'s components appended after this
    /// key's own. The wildcard flag is taken from `other` (the tail is
    /// what decides whether the concatenation still "floats").
    pub fn join(&self, other: &PathKey) -> Self {
        let mut v: Vec<Arc<str>> = self.components.iter().cloned().collect();
        v.extend(other.components.iter().cloned());
        PathKey {
            components: Arc::from(v.into_boxed_slice()),
            wildcard: other.wildcard,
        }
    }

    /// Returns a copy of this key with the wildcard flag set to `wildcard`.
    pub fn with_wildcard(&self, wildcard: bool) -> Self {
        PathKey {
            components: self.components.clone(),
            wildcard,
        }
    }

    /// Returns the components in reverse order, used to turn a hostname
    /// (`www.example.com`) into its lookup key (`[com, example, www]`).
    pub fn reversed(&self) -> Self {
        let mut v: Vec<Arc<str>> = self.components.iter().cloned().collect();
        v.reverse();
        PathKey {
            components: Arc::from(v.into_boxed_slice()),
            wildcard: self.wildcard,
        }
    }

    /// True if `self`'s components are a prefix of `other`'s (irrespective
    /// of either key's wildcard flag).
    pub fn starts_with(&self, other: &PathKey) -> bool {
        if self.components.len() < other.components.len() {
            return false;
        }
        self.components[..other.components.len()] == *other.components
    }

    /// Splits off the first `n` components as `(head, tail)`. `head` is
    /// never wildcard; `tail` keeps this key's wildcard flag.
    pub fn split_at(&self, n: usize) -> (PathKey, PathKey) {
        let n = n.min(self.components.len());
        let head = PathKey {
            components: Arc::from(self.components[..n].to_vec().into_boxed_slice()),
            wildcard: false,
        };
        let tail = PathKey {
            components: Arc::from(self.components[n..].to_vec().into_boxed_slice()),
            wildcard: self.wildcard,
        };
        (head, tail)
    }

    /// Canonical string form for logging. Not guaranteed to round-trip
    /// through any parser.
    pub fn canonical(&self) -> String {
        let mut s = String::from("/");
        s.push_str(&self.components.join("/"));
        if self.wildcard {
            if !s.ends_with('/') {
                s.push('/');
            }
            s.push('*');
        }
        s
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Splits a `/`-separated URL path into a [`PathKey`], honoring the
/// `/a/b/*` (wildcard prefix), `/a/b/` (directory, trailing empty
/// component), and `/a/b` (exact file) spellings.
pub fn parse_url_path(spec: &str) -> PathKey {
    let trimmed = spec.strip_prefix('/').unwrap_or(spec);
    if trimmed.is_empty() {
        return PathKey::root();
    }
    let (body, wildcard) = match trimmed.strip_suffix("/*") {
        Some(rest) => (rest, true),
        None => match trimmed.strip_suffix('*') {
            // bare "*" at the root
            Some(rest) if rest.is_empty() || rest.ends_with('/') => (rest.trim_end_matches('/'), true),
            _ => (trimmed, false),
        },
    };
    if body.is_empty() {
        return PathKey::new(Vec::<&str>::new(), wildcard);
    }
    PathKey::new(body.split('/'), wildcard)
}

/// Splits a hostname spec (`*.example.com`, `api.example.com`, `*`) into
/// its reversed lookup [`PathKey`].
pub fn parse_host_spec(spec: &str) -> PathKey {
    if spec == "*" {
        return PathKey::new(Vec::<&str>::new(), true);
    }
    let (body, wildcard) = match spec.strip_prefix("*.") {
        Some(rest) => (rest, true),
        None => (spec, false),
    };
    PathKey::new(body.split('.'), wildcard).reversed_host_order(wildcard)
}

impl PathKey {
    // `parse_host_spec` already iterates components in left-to-right
    // (most-specific-last) hostname order; reverse them so the trie root
    // is the TLD, matching "components are reversed before use".
    fn reversed_host_order(self, wildcard: bool) -> Self {
        let mut v: Vec<Arc<str>> = self.components.iter().cloned().collect();
        v.reverse();
        PathKey {
            components: Arc::from(v.into_boxed_slice()),
            wildcard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_requires_same_wildcard() {
        let a = PathKey::new(["x", "y"], false);
        let b = PathKey::new(["x", "y"], true);
        assert_ne!(a, b);
        assert_eq!(a, PathKey::new(["x", "y"], false));
    }

    #[test]
    fn concat_preserves_wildcard() {
        let a = PathKey::new(["x"], true);
        let b = a.concat("y");
        assert_eq!(b.components, &[Arc::from("x"), Arc::from("y")]);
        assert!(b.wildcard);
    }

    #[test]
    fn reversed_hostname_for_wildcard_subdomain() {
        let key = parse_host_spec("*.example.com");
        assert_eq!(
            key.components,
            &[Arc::from("com"), Arc::from("example")]
        );
        assert!(key.wildcard);
    }

    #[test]
    fn reversed_hostname_exact() {
        let key = parse_host_spec("api.example.com");
        assert_eq!(
            key.components,
            &[Arc::from("com"), Arc::from("example"), Arc::from("api")]
        );
        assert!(!key.wildcard);
    }

    #[test]
    fn url_path_directory_vs_file() {
        let dir = parse_url_path("/x/");
        assert_eq!(dir.components, &[Arc::from("x"), Arc::from("")]);
        assert!(!dir.wildcard);

        let file = parse_url_path("/x");
        assert_eq!(file.components, &[Arc::from("x")]);
        assert!(!file.wildcard);

        let wild = parse_url_path("/x/*");
        assert_eq!(wild.components, &[Arc::from("x")]);
        assert!(wild.wildcard);
    }

    #[test]
    fn split_at_keeps_wildcard_on_tail_only() {
        let k = PathKey::new(["a", "b", "c"], true);
        let (head, tail) = k.split_at(1);
        assert!(!head.wildcard);
        assert_eq!(head.components, &[Arc::from("a")]);
        assert!(tail.wildcard);
        assert_eq!(tail.components, &[Arc::from("b"), Arc::from("c")]);
    }

    #[test]
    fn starts_with() {
        let k = PathKey::new(["a", "b", "c"], false);
        assert!(k.starts_with(&PathKey::new(["a", "b"], false)));
        assert!(!k.starts_with(&PathKey::new(["a", "x"], false)));
    }
}
