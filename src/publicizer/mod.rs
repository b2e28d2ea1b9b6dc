//! Publicizing the references of a consuming project.
//!
//! A [`Publicizer`] takes the full reference list of a project together with the names of
//! the assemblies whose internals the project wants to reach. Each matching reference is
//! rewritten into the target directory, and a marker source file declaring
//! `IgnoresAccessChecksTo` for every requested name is generated next to the copies. The
//! [`PublicizeReport`] tells the caller which references to swap for their copies and which
//! source files to add to the compilation.
//!
//! Copies that already exist with a nonzero size are not rewritten again, so repeated runs
//! over an unchanged project only regenerate the marker file.
//!
//! # Examples
//!
//! ```rust,no_run
//! use publicizer::publicizer::{PublicizeConfig, Publicizer};
//!
//! let config = PublicizeConfig::new("/work/app")
//!     .with_source_references(["lib/Foo.dll", "lib/Dep.dll"])
//!     .with_assembly_names("Foo");
//!
//! let report = Publicizer::new(config).run()?;
//! for reference in &report.target_references {
//!     println!("{} -> {}", reference.original.display(), reference.path.display());
//! }
//! # Ok::<(), publicizer::Error>(())
//! ```

mod attributes;
mod config;
mod report;

pub use attributes::{marker_source, write_marker_file, MARKER_FILE_NAME};
pub use config::{PublicizeConfig, DEFAULT_TARGET_DIR};
pub use report::{PublicizeReport, TargetReference};

use std::{fs, path::Path};

use log::{debug, info};

use crate::{
    resolver::{DirectoryComparer, ResolutionSession, SearchPaths},
    rewrite::Walker,
    Result,
};

/// Runs a [`PublicizeConfig`].
#[derive(Debug, Clone)]
pub struct Publicizer {
    config: PublicizeConfig,
    comparer: DirectoryComparer,
}

impl Publicizer {
    /// A publicizer for `config`, comparing names and directories like the host file system.
    #[must_use]
    pub fn new(config: PublicizeConfig) -> Self {
        Publicizer {
            config,
            comparer: DirectoryComparer::host(),
        }
    }

    /// Overrides the comparer used for assembly names and search directories.
    #[must_use]
    pub fn with_comparer(mut self, comparer: DirectoryComparer) -> Self {
        self.comparer = comparer;
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &PublicizeConfig {
        &self.config
    }

    /// Publicizes every reference whose file stem is one of the requested assembly names.
    ///
    /// Without assembly names nothing happens and the report is empty. Otherwise the target
    /// directory is created, the marker file is written, the directory of every reference
    /// becomes a search directory, and each matching reference is rewritten unless its copy
    /// already exists.
    ///
    /// # Errors
    /// Returns the first error of [`Walker::publicize_file`], and
    /// [`crate::Error::FileError`] if the target directory or marker file cannot be written.
    /// Copies created before the failure are kept.
    pub fn run(&self) -> Result<PublicizeReport> {
        let mut report = PublicizeReport::default();

        let names = self.config.unique_assembly_names(self.comparer);
        if names.is_empty() {
            debug!("No assembly names requested");
            return Ok(report);
        }

        let target_dir = self.config.target_dir();
        fs::create_dir_all(&target_dir)?;

        report
            .generated_code_files
            .push(write_marker_file(&target_dir, &names)?);

        let references: Vec<_> = self
            .config
            .source_references
            .iter()
            .map(|reference| self.config.full_path(reference))
            .collect();

        let mut search_paths = SearchPaths::with_comparer(self.comparer);
        search_paths.extend(references.iter().filter_map(|path| path.parent()));
        let session = ResolutionSession::with_search_paths(search_paths);

        let walker = Walker::new().with_threads(self.config.threads.unwrap_or(0));
        let policy = self.config.policy();

        for reference in references {
            let Some(stem) = reference.file_stem() else {
                continue;
            };
            if !names
                .iter()
                .any(|name| self.comparer.eq(Path::new(name), Path::new(stem)))
            {
                continue;
            }
            let Some(file_name) = reference.file_name() else {
                continue;
            };

            let target = target_dir.join(file_name);
            let existing = fs::metadata(&target).is_ok_and(|meta| meta.len() > 0);
            let stats = if existing {
                debug!("Publicized assembly already exists at {}", target.display());
                None
            } else {
                let stats = walker.publicize_file(&reference, &target, &session, &policy)?;
                info!("Created publicized assembly at {}", target.display());
                Some(stats)
            };

            report.target_references.push(TargetReference {
                path: target,
                original: reference.clone(),
                created: !existing,
                stats,
            });
            report.removed_references.push(reference);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_names_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = PublicizeConfig::new(dir.path())
            .with_source_reference("lib/Foo.dll")
            .with_assembly_names(";;");

        let report = Publicizer::new(config).run().unwrap();
        assert!(report.is_empty());
        assert!(!dir.path().join(DEFAULT_TARGET_DIR).exists());
    }

    #[test]
    fn unmatched_references_only_get_the_marker() {
        let dir = tempfile::tempdir().unwrap();
        let config = PublicizeConfig::new(dir.path())
            .with_source_reference("lib/Other.dll")
            .with_assembly_names("Foo");

        let report = Publicizer::new(config).run().unwrap();
        let target = dir.path().join(DEFAULT_TARGET_DIR);
        assert!(report.target_references.is_empty());
        assert!(report.removed_references.is_empty());
        assert_eq!(report.generated_code_files, vec![target.join(MARKER_FILE_NAME)]);
        assert!(target.join(MARKER_FILE_NAME).is_file());
    }

    #[test]
    fn existing_copy_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("Foo.dll"), b"already here").unwrap();

        let config = PublicizeConfig::new(dir.path())
            .with_source_reference("lib/Foo.dll")
            .with_assembly_names("Foo")
            .with_target_dir("out");

        let report = Publicizer::new(config).run().unwrap();
        assert_eq!(report.created_count(), 0);
        assert_eq!(report.target_references.len(), 1);
        assert_eq!(report.target_references[0].path, target.join("Foo.dll"));
        assert_eq!(
            report.removed_references,
            vec![dir.path().join("lib").join("Foo.dll")]
        );
        assert_eq!(fs::read(target.join("Foo.dll")).unwrap(), b"already here");
    }

    #[test]
    fn case_insensitive_names() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("foo.dll"), b"x").unwrap();

        let config = PublicizeConfig::new(dir.path())
            .with_source_reference("lib/foo.dll")
            .with_assembly_names("Foo")
            .with_target_dir("out");

        let report = Publicizer::new(config.clone())
            .with_comparer(DirectoryComparer::OrdinalIgnoreCase)
            .run()
            .unwrap();
        assert_eq!(report.target_references.len(), 1);

        let report = Publicizer::new(config)
            .with_comparer(DirectoryComparer::Ordinal)
            .run()
            .unwrap();
        assert!(report.target_references.is_empty());
    }
}
