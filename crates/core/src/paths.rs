//! Path-like input conversion
//!
//! Callers may hand the notifier a single path, a list of paths, or nested
//! lists with gaps in them. Everything goes through [`PathSpec`] and is then
//! flattened into a plain list. Entries that are not paths at all (only
//! reachable from dynamically typed sources such as a TOML file) are
//! rejected with a type error instead of being coerced.

use crate::error::Error;
use crate::Result;
use ahash::AHashSet;
use std::path::{Path, PathBuf};

/// One entry of a path argument, possibly nested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSpec {
    /// A single path
    Path(PathBuf),
    /// A list of entries, flattened recursively
    List(Vec<PathSpec>),
    /// A missing entry; dropped during flattening
    Null,
    /// A value that is not path-like, with the name of its type
    NotAPath(&'static str),
}

impl PathSpec {
    /// Build a list entry from anything iterable
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<PathSpec>,
    {
        PathSpec::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for PathSpec {
    fn from(s: &str) -> Self {
        PathSpec::Path(PathBuf::from(s))
    }
}

impl From<String> for PathSpec {
    fn from(s: String) -> Self {
        PathSpec::Path(PathBuf::from(s))
    }
}

impl From<&String> for PathSpec {
    fn from(s: &String) -> Self {
        PathSpec::Path(PathBuf::from(s))
    }
}

impl From<&Path> for PathSpec {
    fn from(p: &Path) -> Self {
        PathSpec::Path(p.to_path_buf())
    }
}

impl From<PathBuf> for PathSpec {
    fn from(p: PathBuf) -> Self {
        PathSpec::Path(p)
    }
}

impl From<&PathBuf> for PathSpec {
    fn from(p: &PathBuf) -> Self {
        PathSpec::Path(p.clone())
    }
}

impl<T: Into<PathSpec>> From<Option<T>> for PathSpec {
    fn from(value: Option<T>) -> Self {
        value.map_or(PathSpec::Null, Into::into)
    }
}

impl<T: Into<PathSpec>> From<Vec<T>> for PathSpec {
    fn from(items: Vec<T>) -> Self {
        PathSpec::list(items)
    }
}

impl<T: Into<PathSpec>, const N: usize> From<[T; N]> for PathSpec {
    fn from(items: [T; N]) -> Self {
        PathSpec::list(items)
    }
}

impl<T: Into<PathSpec> + Clone> From<&[T]> for PathSpec {
    fn from(items: &[T]) -> Self {
        PathSpec::list(items.iter().cloned())
    }
}

impl From<toml::Value> for PathSpec {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => PathSpec::Path(PathBuf::from(s)),
            toml::Value::Array(items) => PathSpec::list(items),
            other => PathSpec::NotAPath(other.type_str()),
        }
    }
}

impl<'de> serde::Deserialize<'de> for PathSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;

        // Any TOML value is accepted here; rejection happens in `flatten`
        // so that config files and programmatic calls fail the same way.
        toml::Value::deserialize(deserializer).map(PathSpec::from)
    }
}

/// Flatten a path argument into a deduplicated list
///
/// - Nested lists are flattened depth-first
/// - Null and empty entries are dropped
/// - Duplicates are removed, keeping the first occurrence
/// - The first non-path entry fails with [`Error::InvalidPathEntry`]
pub fn flatten(entries: impl Into<PathSpec>) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut seen = AHashSet::new();
    flatten_into(entries.into(), &mut out, &mut seen)?;
    Ok(out)
}

fn flatten_into(
    entries: PathSpec,
    out: &mut Vec<PathBuf>,
    seen: &mut AHashSet<PathBuf>,
) -> Result<()> {
    match entries {
        PathSpec::Path(path) => {
            if !path.as_os_str().is_empty() && seen.insert(path.clone()) {
                out.push(path);
            }
        }
        PathSpec::List(items) => {
            for item in items {
                flatten_into(item, out, seen)?;
            }
        }
        PathSpec::Null => {}
        PathSpec::NotAPath(found) => return Err(Error::InvalidPathEntry { found }),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_flatten_nested_with_nulls() {
        let entries = PathSpec::List(vec![
            "a".into(),
            PathSpec::Null,
            PathSpec::list(["b", "c"]),
        ]);
        let paths = flatten(entries).unwrap();
        assert_eq!(
            paths,
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]
        );
    }

    #[test]
    fn test_flatten_rejects_non_path() {
        let entries = PathSpec::from(vec![toml::Value::Integer(42)]);
        let err = flatten(entries).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err.to_string().contains("integer"));
    }

    #[test]
    fn test_flatten_drops_empty_and_duplicates() {
        let paths = flatten(vec!["/tmp/x", "", "/tmp/y", "/tmp/x"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/tmp/x"), PathBuf::from("/tmp/y")]);
    }

    #[test]
    fn test_option_entries() {
        let paths = flatten(vec![Some("/a"), None, Some("/b")]).unwrap();
        assert_eq!(paths.len(), 2);

        let paths = flatten(None::<&str>).unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn test_single_path_forms() {
        assert_eq!(flatten("/a").unwrap(), vec![PathBuf::from("/a")]);
        assert_eq!(flatten(Path::new("/a")).unwrap(), vec![PathBuf::from("/a")]);
        assert_eq!(flatten(PathBuf::from("/a")).unwrap(), vec![PathBuf::from("/a")]);
    }

    #[test]
    fn test_toml_values() {
        let value: toml::Value = toml::from_str::<toml::Table>(
            r#"paths = ["/a", ["/b", "/c"], true]"#,
        )
        .unwrap()
        .remove("paths")
        .unwrap();

        let err = flatten(value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err.to_string().contains("boolean"));
    }
}
