// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory
// - 'cilassembly/write/output.rs' maps the output file for writing

//! # publicizer
//!
//! Rewrites compiled .NET assemblies so that their internal types and members become public,
//! and generates the `IgnoresAccessChecksTo` declarations a consuming project needs to
//! compile against them.
//!
//! ## Features
//!
//! - **Faithful output** - the original image is patched in place; everything that is not
//!   widened or stubbed is copied byte for byte
//! - **Dependency resolution** - assembly references are resolved transitively over a set of
//!   search directories before anything is changed
//! - **Parallel rewrite** - types are rewritten on a bounded rayon pool
//! - **Stub bodies** - method bodies can be replaced by `ldnull; throw`
//! - **Atomic writes** - outputs appear under their final name only once complete
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use publicizer::prelude::*;
//!
//! let config = PublicizeConfig::new("/work/app")
//!     .with_source_references(["lib/Foo.dll", "lib/Dep.dll"])
//!     .with_assembly_names("Foo");
//!
//! let report = Publicizer::new(config).run()?;
//! println!("{} assemblies publicized", report.created_count());
//! # Ok::<(), publicizer::Error>(())
//! ```
//!
//! ### Single files
//!
//! ```rust,no_run
//! use publicizer::prelude::*;
//! use std::path::Path;
//!
//! let mut session = ResolutionSession::new();
//! session.add_search_directory("lib");
//!
//! let policy = Policy::new().with_stub_bodies(false);
//! let stats = publicize_file(
//!     Path::new("lib/Foo.dll"),
//!     Path::new("out/Foo.dll"),
//!     &session,
//!     &policy,
//! )?;
//! println!("{} methods widened", stats.methods);
//! # Ok::<(), publicizer::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - PE image access through `goblin`, memory-mapped with `memmap2`
//! - [`metadata`] - CLI header, metadata streams and tables, and the type model
//! - [`assembly`] - CIL instruction decoding and encoding
//! - [`resolver`] - Assembly reference resolution over search directories
//! - [`rewrite`] - The accessibility rewriter and the parallel walk
//! - [`cilassembly`] - Multi-module assemblies and the image writer
//! - [`publicizer`] - Reference selection, target bookkeeping and the marker file
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result`]. Parse failures surface as
//! [`Error::BadImage`] with the path of the offending file, kept apart from I/O errors
//! ([`Error::FileError`]) and unresolved references ([`Error::Resolution`]).

#[macro_use]
pub(crate) mod error;

/// PE image access.
///
/// See [`File`] for loading and address translation, and [`Parser`] for the cursor the
/// metadata readers are built on.
pub mod file;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use publicizer::prelude::*;
///
/// let session = ResolutionSession::new();
/// let module = CilModule::read("Foo.dll".as_ref(), &session, ReadOptions::default())?;
/// println!("{} types", module.types().len());
/// # Ok::<(), publicizer::Error>(())
/// ```
pub mod prelude;

/// CIL instructions based on ECMA-335 Partition III.
///
/// # Examples
///
/// ```rust
/// use publicizer::{assembly::decode_stream, Parser};
///
/// let mut parser = Parser::new(&[0x14, 0x7A]); // ldnull, throw
/// let instructions = decode_stream(&mut parser)?;
/// assert_eq!(instructions[0].mnemonic, "ldnull");
/// assert_eq!(instructions[1].mnemonic, "throw");
/// # Ok::<(), publicizer::Error>(())
/// ```
pub mod assembly;

/// Metadata of .NET modules based on ECMA-335 Partition II.
///
/// # Key Components
///
/// - [`metadata::module::CilModule`] - A loaded module and its type model
/// - [`metadata::cor20header`] - CLI header
/// - [`metadata::root`] - Metadata root and stream directory
/// - [`metadata::streams`] - Heaps and the tables stream header
/// - [`metadata::tables`] - Raw rows of the tables the model is built from
/// - [`metadata::access`] - Closed visibility and access domains
/// - [`metadata::identity`] - Assembly identities and references
pub mod metadata;

/// Multi-module assemblies and the image writer.
pub mod cilassembly;

/// Assembly reference resolution.
pub mod resolver;

/// The accessibility rewriter and the parallel walk driver.
pub mod rewrite;

/// Publicizing the references of a consuming project.
pub mod publicizer;

/// `publicizer` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `publicizer` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use publicizer::{metadata::module::CilModule, resolver::ResolutionSession, Error};
///
/// let session = ResolutionSession::new();
/// match CilModule::read("Foo.dll".as_ref(), &session, Default::default()) {
///     Ok(module) => println!("Loaded {}", module.name()),
///     Err(Error::BadImage { message, .. }) => println!("Not a .NET module: {message}"),
///     Err(e) => println!("Error: {e}"),
/// }
/// ```
pub use error::Error;

/// Low-level file parsing utilities.
pub use file::{parser::Parser, File};
