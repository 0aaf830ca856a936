//! Change batches handed to the change handler

use ahash::AHashSet;
use std::path::{Path, PathBuf};

/// Directories reported changed during one latency window
///
/// A batch is a set: it never holds the same directory twice and carries no
/// ordering between its entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    directories: AHashSet<PathBuf>,
}

impl ChangeBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct directories
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    /// True when no directory changed in the window
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// Check whether a directory is part of this batch
    pub fn contains(&self, dir: impl AsRef<Path>) -> bool {
        self.directories.contains(dir.as_ref())
    }

    /// Iterate over the directories in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.directories.iter().map(PathBuf::as_path)
    }

    /// Take the directories out as a vector in unspecified order
    pub fn into_vec(self) -> Vec<PathBuf> {
        self.directories.into_iter().collect()
    }

    /// Take the directories out sorted, for stable output
    pub fn into_sorted_vec(self) -> Vec<PathBuf> {
        let mut dirs = self.into_vec();
        dirs.sort();
        dirs
    }
}

impl From<AHashSet<PathBuf>> for ChangeBatch {
    fn from(directories: AHashSet<PathBuf>) -> Self {
        Self { directories }
    }
}

impl FromIterator<PathBuf> for ChangeBatch {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            directories: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ChangeBatch {
    type Item = PathBuf;
    type IntoIter = std::collections::hash_set::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.directories.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_deduplicates() {
        let batch: ChangeBatch = ["/a", "/b", "/a"].iter().map(PathBuf::from).collect();
        assert_eq!(batch.len(), 2);
        assert!(batch.contains("/a"));
        assert!(batch.contains(Path::new("/b")));
        assert!(!batch.contains("/c"));
    }

    #[test]
    fn test_sorted_output() {
        let batch: ChangeBatch = ["/z", "/m", "/a"].iter().map(PathBuf::from).collect();
        assert_eq!(
            batch.into_sorted_vec(),
            vec![PathBuf::from("/a"), PathBuf::from("/m"), PathBuf::from("/z")]
        );
    }
}
