//! Multi-module assemblies and their emission.
//!
//! An assembly is usually a single module, but the manifest module may list further
//! metadata-bearing files in its `File` table. [`CilAssembly`] loads the manifest module
//! together with those netmodules, exposes the types of all of them as one sequence, and
//! writes them back side by side.
//!
//! # Examples
//!
//! ```rust,no_run
//! use publicizer::{
//!     cilassembly::CilAssembly, metadata::module::ReadOptions, resolver::ResolutionSession,
//! };
//! use std::path::Path;
//!
//! let session = ResolutionSession::new();
//! let mut assembly = CilAssembly::read(Path::new("Foo.dll"), &session, ReadOptions::default())?;
//! for ty in assembly.types_mut() {
//!     ty.visibility = publicizer::metadata::access::TypeVisibility::Public;
//! }
//! assembly.write(Path::new("out/Foo.dll"))?;
//! # Ok::<(), publicizer::Error>(())
//! ```

pub mod write;

use std::{fs, path::Path};

use log::debug;

use crate::{
    metadata::{
        module::{CilModule, ReadOptions},
        typedef::TypeDef,
    },
    resolver::ResolutionSession,
    Result,
};

/// An assembly: the manifest module and its netmodules.
#[derive(Debug)]
pub struct CilAssembly {
    manifest: CilModule,
    netmodules: Vec<CilModule>,
}

impl CilAssembly {
    /// Reads the manifest module at `path` and every netmodule it lists.
    ///
    /// Netmodules are expected next to the manifest module.
    ///
    /// # Errors
    /// Returns any error of [`CilModule::read`] for the manifest module or a netmodule.
    pub fn read(path: &Path, session: &ResolutionSession, options: ReadOptions) -> Result<Self> {
        let manifest = CilModule::read(path, session, options)?;

        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let mut netmodules = Vec::with_capacity(manifest.module_files().len());
        for name in manifest.module_files() {
            let netmodule_path = directory.join(name);
            debug!("Reading netmodule {}", netmodule_path.display());
            let netmodule =
                CilModule::read(&netmodule_path, session, options.with_dependencies(false))?;
            if options.resolve_dependencies {
                session.resolve_all(netmodule.references())?;
            }
            netmodules.push(netmodule);
        }

        Ok(CilAssembly {
            manifest,
            netmodules,
        })
    }

    /// The manifest module.
    #[must_use]
    pub fn manifest(&self) -> &CilModule {
        &self.manifest
    }

    /// All modules, the manifest module first.
    pub fn modules(&self) -> impl Iterator<Item = &CilModule> {
        std::iter::once(&self.manifest).chain(self.netmodules.iter())
    }

    /// The types of all modules, nested types included.
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.modules().flat_map(|module| module.types().iter())
    }

    /// Mutable access to the types of all modules. Every type is yielded exactly once, so
    /// the references can be handed to different threads.
    pub fn types_mut(&mut self) -> impl Iterator<Item = &mut TypeDef> {
        std::iter::once(&mut self.manifest)
            .chain(self.netmodules.iter_mut())
            .flat_map(|module| module.types_mut().iter_mut())
    }

    /// Writes the manifest module to `path` and each netmodule next to it under its own file
    /// name. If any write fails, the files already written by this call are removed.
    ///
    /// # Errors
    /// Returns the first write error.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut written = Vec::with_capacity(self.netmodules.len());
        for netmodule in &self.netmodules {
            let Some(name) = netmodule.path().file_name() else {
                continue;
            };
            let target = path.with_file_name(name);
            if let Err(error) = netmodule.write(&target) {
                remove_all(&written);
                return Err(error);
            }
            written.push(target);
        }

        if let Err(error) = self.manifest.write(path) {
            remove_all(&written);
            return Err(error);
        }

        Ok(())
    }
}

fn remove_all(paths: &[std::path::PathBuf]) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}
