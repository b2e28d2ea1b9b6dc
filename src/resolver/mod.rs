//! Assembly reference resolution.
//!
//! Every module read with [`crate::metadata::module::ReadOptions::resolve_dependencies`]
//! has its `AssemblyRef` rows serviced by a [`ResolutionSession`]. A session owns the set of
//! search directories and an arena of the modules it has loaded so far; nothing about
//! resolution is process-wide, so independent sessions can run side by side.
//!
//! # Probing
//!
//! For a reference named `Dep`, each search directory is visited in registration order and
//! the candidates `Dep.exe`, `Dep.dll` are tried (`Dep.winmd`, `Dep.dll` for Windows Runtime
//! references). The first candidate that exists and parses as a .NET module wins. A candidate
//! that exists but is not a valid image is skipped; I/O errors abort the resolution.
//!
//! # Examples
//!
//! ```rust,no_run
//! use publicizer::{metadata::identity::AssemblyReference, resolver::ResolutionSession};
//!
//! let mut session = ResolutionSession::new();
//! session.add_search_directory("/opt/app/bin");
//! session.add_search_directory("/opt/app/plugins");
//!
//! let dep = session.resolve(&AssemblyReference::new("Dep"))?;
//! println!("Dep resolved from {}", dep.path().display());
//! # Ok::<(), publicizer::Error>(())
//! ```

mod searchpaths;
mod session;

pub use searchpaths::{DirectoryComparer, SearchPaths};
pub use session::ResolutionSession;
