use std::{
    collections::{HashSet, VecDeque},
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use log::debug;

use crate::{
    metadata::{
        identity::AssemblyReference,
        module::{CilModule, ReadOptions},
    },
    resolver::{DirectoryComparer, SearchPaths},
    Error, Result,
};

/// Candidate extensions for ordinary references, in probing order.
const ASSEMBLY_EXTENSIONS: [&str; 2] = ["exe", "dll"];
/// Candidate extensions for Windows Runtime references, in probing order.
const WINDOWS_RUNTIME_EXTENSIONS: [&str; 2] = ["winmd", "dll"];

/// A resolution session: the search directories and every module loaded through them.
///
/// The directory set is filled before resolution starts; `resolve` takes `&self` and may
/// be called from several threads. Loaded modules are kept in an arena keyed by the
/// case-insensitive assembly name, so each dependency is read at most once per session
/// and dependency cycles do not recurse.
pub struct ResolutionSession {
    search_paths: SearchPaths,
    loaded: DashMap<String, Arc<CilModule>>,
}

impl ResolutionSession {
    /// A session without search directories, using the host directory comparer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_search_paths(SearchPaths::new())
    }

    /// A session probing `search_paths`.
    #[must_use]
    pub fn with_search_paths(search_paths: SearchPaths) -> Self {
        ResolutionSession {
            search_paths,
            loaded: DashMap::new(),
        }
    }

    /// Registers a search directory. Directories equal to a registered one under the host
    /// comparer are ignored.
    pub fn add_search_directory(&mut self, directory: impl Into<PathBuf>) -> &mut Self {
        let directory = directory.into();
        if !self.search_paths.add(directory.clone()) {
            debug!("Search directory {} already registered", directory.display());
        }
        self
    }

    /// The registered search directories.
    #[must_use]
    pub fn search_paths(&self) -> &SearchPaths {
        &self.search_paths
    }

    /// The directory comparer of this session.
    #[must_use]
    pub fn comparer(&self) -> DirectoryComparer {
        self.search_paths.comparer()
    }

    /// Resolves `reference` to a loaded module.
    ///
    /// Modules resolved earlier in the session are returned from the arena. Otherwise the
    /// candidates are probed as described in [`crate::resolver`]; the winner is read with
    /// [`ReadOptions::dependency`] and cached.
    ///
    /// # Errors
    /// - [`Error::Resolution`] if no candidate exists or every candidate is a bad image
    /// - [`Error::FileError`] if a candidate exists but cannot be read
    pub fn resolve(&self, reference: &AssemblyReference) -> Result<Arc<CilModule>> {
        let key = reference.name.to_lowercase();
        if let Some(module) = self.loaded.get(&key) {
            return Ok(Arc::clone(module.value()));
        }

        let extensions = if reference.is_windows_runtime() {
            &WINDOWS_RUNTIME_EXTENSIONS
        } else {
            &ASSEMBLY_EXTENSIONS
        };

        for directory in self.search_paths.iter() {
            for extension in extensions {
                let candidate = candidate_path(directory, &reference.name, extension);
                if !candidate.is_file() {
                    continue;
                }

                match CilModule::read(&candidate, self, ReadOptions::dependency()) {
                    Ok(module) => {
                        debug!("Resolved {} to {}", reference, candidate.display());
                        let module = self
                            .loaded
                            .entry(key)
                            .or_insert_with(|| Arc::new(module))
                            .value()
                            .clone();
                        return Ok(module);
                    }
                    Err(error) if error.is_bad_image() => {
                        debug!("Skipping {} - {}", candidate.display(), error);
                    }
                    Err(error) => return Err(error),
                }
            }
        }

        Err(Error::Resolution {
            name: reference.name.clone(),
        })
    }

    /// Resolves `references` and, transitively, every reference of the modules they resolve
    /// to. Each assembly name is visited once, so cyclic references terminate.
    ///
    /// # Errors
    /// Returns the first error of [`ResolutionSession::resolve`].
    pub fn resolve_all(&self, references: &[AssemblyReference]) -> Result<()> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<AssemblyReference> = references.iter().cloned().collect();

        while let Some(reference) = queue.pop_front() {
            if !visited.insert(reference.name.to_lowercase()) {
                continue;
            }

            let module = self.resolve(&reference)?;
            queue.extend(module.references().iter().cloned());
        }

        Ok(())
    }

    /// Returns the module loaded for assembly `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<CilModule>> {
        self.loaded
            .get(&name.to_lowercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of modules loaded by this session.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }
}

impl Default for ResolutionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResolutionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionSession")
            .field("search_paths", &self.search_paths)
            .field("loaded", &self.loaded.len())
            .finish()
    }
}

fn candidate_path(directory: &Path, name: &str, extension: &str) -> PathBuf {
    directory.join(format!("{name}.{extension}"))
}
