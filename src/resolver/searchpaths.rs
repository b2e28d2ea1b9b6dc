use std::path::{Path, PathBuf};

/// Equality of directory paths, following the case sensitivity of the host file system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryComparer {
    /// Byte-wise comparison
    Ordinal,
    /// Comparison after lower-casing both paths
    OrdinalIgnoreCase,
}

impl DirectoryComparer {
    /// The comparer matching the conventions of the current platform: case-sensitive on
    /// Linux, case-insensitive on Windows, macOS and everything else.
    #[must_use]
    pub fn host() -> Self {
        if cfg!(target_os = "linux") {
            DirectoryComparer::Ordinal
        } else {
            DirectoryComparer::OrdinalIgnoreCase
        }
    }

    /// Compares two directory paths. Trailing separators are not significant.
    #[must_use]
    pub fn eq(self, a: &Path, b: &Path) -> bool {
        let a = trim_separators(a);
        let b = trim_separators(b);
        match self {
            DirectoryComparer::Ordinal => a == b,
            DirectoryComparer::OrdinalIgnoreCase => a.to_lowercase() == b.to_lowercase(),
        }
    }
}

impl Default for DirectoryComparer {
    fn default() -> Self {
        Self::host()
    }
}

fn trim_separators(path: &Path) -> String {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        text.into_owned()
    } else {
        trimmed.to_string()
    }
}

/// Ordered, duplicate-free set of directories probed by the resolver.
///
/// Directories can only be added. Registration order is the probing order.
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    comparer: DirectoryComparer,
    directories: Vec<PathBuf>,
}

impl SearchPaths {
    /// An empty set using the host comparer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparer(DirectoryComparer::host())
    }

    /// An empty set using `comparer`.
    #[must_use]
    pub fn with_comparer(comparer: DirectoryComparer) -> Self {
        SearchPaths {
            comparer,
            directories: Vec::new(),
        }
    }

    /// Adds `directory` unless an equal one is already present. Returns `true` if it was
    /// added.
    pub fn add(&mut self, directory: impl Into<PathBuf>) -> bool {
        let directory = directory.into();
        if self.contains(&directory) {
            return false;
        }

        self.directories.push(directory);
        true
    }

    /// Returns `true` if an equal directory is registered.
    #[must_use]
    pub fn contains(&self, directory: &Path) -> bool {
        self.directories
            .iter()
            .any(|known| self.comparer.eq(known, directory))
    }

    /// The comparer in use.
    #[must_use]
    pub fn comparer(&self) -> DirectoryComparer {
        self.comparer
    }

    /// Iterates the directories in probing order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.directories.iter().map(PathBuf::as_path)
    }

    /// Number of registered directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    /// Returns `true` if no directory is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

impl<P: Into<PathBuf>> Extend<P> for SearchPaths {
    fn extend<T: IntoIterator<Item = P>>(&mut self, iter: T) {
        for directory in iter {
            self.add(directory);
        }
    }
}
