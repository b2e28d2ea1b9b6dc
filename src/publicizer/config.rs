use std::path::{Component, Path, PathBuf};

use crate::{resolver::DirectoryComparer, rewrite::Policy};

/// Directory below the base directory that receives the publicized assemblies by default.
pub const DEFAULT_TARGET_DIR: &str = "obj/GeneratedPublicizedAssemblies";

/// Inputs of a [`crate::publicizer::Publicizer`] run.
///
/// Relative paths, both of references and of the target directory, are taken relative to
/// [`PublicizeConfig::base_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicizeConfig {
    /// Directory relative paths are resolved against
    pub base_dir: PathBuf,
    /// Paths of every reference of the consuming project, in order
    pub source_references: Vec<PathBuf>,
    /// Assembly names to publicize, matched against reference file stems
    pub assembly_names: Vec<String>,
    /// Full names of the types to rewrite, empty for all
    pub allowed_types: Vec<String>,
    /// Replace method bodies by a throwing stub
    pub stub_bodies: bool,
    /// Output directory, `None` for [`DEFAULT_TARGET_DIR`]
    pub target_dir: Option<PathBuf>,
    /// Worker threads of the rewrite, `None` for the available parallelism
    pub threads: Option<usize>,
}

impl PublicizeConfig {
    /// An empty configuration rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        PublicizeConfig {
            base_dir: base_dir.into(),
            source_references: Vec::new(),
            assembly_names: Vec::new(),
            allowed_types: Vec::new(),
            stub_bodies: true,
            target_dir: None,
            threads: None,
        }
    }

    /// Adds one reference.
    #[must_use]
    pub fn with_source_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_references.push(path.into());
        self
    }

    /// Adds several references.
    #[must_use]
    pub fn with_source_references<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.source_references
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Adds assembly names from a `;` separated list. Empty entries are ignored.
    #[must_use]
    pub fn with_assembly_names(mut self, names: &str) -> Self {
        self.assembly_names.extend(split_list(names));
        self
    }

    /// Adds one assembly name.
    #[must_use]
    pub fn with_assembly_name(mut self, name: impl Into<String>) -> Self {
        self.assembly_names.push(name.into());
        self
    }

    /// Adds type names from a `;` separated list to the allow-list.
    #[must_use]
    pub fn with_allowed_types(mut self, names: &str) -> Self {
        self.allowed_types.extend(split_list(names));
        self
    }

    /// Sets [`PublicizeConfig::stub_bodies`].
    #[must_use]
    pub fn with_stub_bodies(mut self, enabled: bool) -> Self {
        self.stub_bodies = enabled;
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// The absolute, normalized output directory.
    #[must_use]
    pub fn target_dir(&self) -> PathBuf {
        match &self.target_dir {
            Some(dir) => self.full_path(dir),
            None => self.full_path(Path::new(DEFAULT_TARGET_DIR)),
        }
    }

    /// Resolves `path` against the base directory and removes `.` and `..` components.
    #[must_use]
    pub fn full_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.base_dir.join(path))
        }
    }

    /// The requested assembly names without duplicates under `comparer`, in request order.
    #[must_use]
    pub fn unique_assembly_names(&self, comparer: DirectoryComparer) -> Vec<String> {
        let mut unique: Vec<String> = Vec::with_capacity(self.assembly_names.len());
        for name in self.assembly_names.iter().filter(|name| !name.is_empty()) {
            if !unique
                .iter()
                .any(|known| comparer.eq(Path::new(known), Path::new(name)))
            {
                unique.push(name.clone());
            }
        }
        unique
    }

    /// The rewrite policy described by this configuration.
    #[must_use]
    pub fn policy(&self) -> Policy {
        Policy::new()
            .with_allowed_types(self.allowed_types.iter().cloned())
            .with_stub_bodies(self.stub_bodies)
    }
}

fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(';')
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
}

/// Lexically normalizes `path`: `.` is dropped and `..` removes the previous component.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_target_dir() {
        let config = PublicizeConfig::new("/work/app");
        assert_eq!(
            config.target_dir(),
            Path::new("/work/app/obj/GeneratedPublicizedAssemblies")
        );
        assert_eq!(
            config.with_target_dir("../out").target_dir(),
            Path::new("/work/out")
        );
    }

    #[test]
    fn full_paths() {
        let config = PublicizeConfig::new("/work/app");
        assert_eq!(
            config.full_path(Path::new("lib/./Foo.dll")),
            Path::new("/work/app/lib/Foo.dll")
        );
        assert_eq!(
            config.full_path(Path::new("/refs/sub/../Foo.dll")),
            Path::new("/refs/Foo.dll")
        );
    }

    #[test]
    fn assembly_name_list() {
        let config = PublicizeConfig::new("/work")
            .with_assembly_names(";Foo;;Bar;foo;Foo;")
            .with_assembly_name("Baz");
        assert_eq!(config.assembly_names, vec!["Foo", "Bar", "foo", "Foo", "Baz"]);
        assert_eq!(
            config.unique_assembly_names(DirectoryComparer::Ordinal),
            vec!["Foo", "Bar", "foo", "Baz"]
        );
        assert_eq!(
            config.unique_assembly_names(DirectoryComparer::OrdinalIgnoreCase),
            vec!["Foo", "Bar", "Baz"]
        );
    }

    #[test]
    fn policy_from_config() {
        let policy = PublicizeConfig::new("/work")
            .with_allowed_types("Foo.Bar;Foo.Bar/Inner")
            .with_stub_bodies(false)
            .policy();
        assert!(!policy.stub_bodies);
        assert!(policy.includes("Foo.Bar/Inner"));
        assert!(!policy.includes("Foo.Other"));
    }

    #[test]
    fn empty_lists() {
        let config = PublicizeConfig::new("/work")
            .with_assembly_names(";;")
            .with_allowed_types("");
        assert!(config.assembly_names.is_empty());
        assert!(config.policy().includes("Anything"));
    }
}
