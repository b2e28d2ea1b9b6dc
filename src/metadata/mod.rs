//! Metadata parsing and representation for .NET modules.
//!
//! This module reads the CLI layer of a PE image according to ECMA-335: the CLI header,
//! the metadata root and its streams, the tables, method bodies and IL. The result is a
//! [`crate::metadata::module::CilModule`], whose types, fields and methods carry the
//! accessibility values the rewriter changes.
//!
//! # Key Components
//!
//! - [`module`] - Loaded module and read options
//! - [`typedef`], [`field`], [`method`] - The entity model
//! - [`access`] - Closed accessibility domains of types and members
//! - [`identity`] - Assembly identities and references
//! - [`token`] - Metadata table row references used throughout .NET
//! - [`streams`] - Metadata heaps and the tables stream header
//! - [`tables`] - Table schema, index sizing and the decoded rows
//!
//! # Examples
//!
//! ```rust,no_run
//! use publicizer::{metadata::module::{CilModule, ReadOptions}, resolver::ResolutionSession};
//! use std::path::Path;
//!
//! let session = ResolutionSession::new();
//! let module = CilModule::read(Path::new("Foo.dll"), &session, ReadOptions::dependency())?;
//!
//! for ty in module.types() {
//!     println!("{} {}", ty.visibility, ty.full_name);
//! }
//! # Ok::<(), publicizer::Error>(())
//! ```

/// Accessibility of types and members
pub mod access;
/// Implementation of the Header of CIL
pub mod cor20header;
/// Field definitions
pub mod field;
/// Assembly identities and references
pub mod identity;
/// Method definitions and bodies
pub mod method;
/// Loaded modules
pub mod module;
/// Implementation of the root metadata structure
pub mod root;
/// Implementation of all metadata streams (tables, heaps, etc.)
pub mod streams;
/// Implementation of the .NET metadata tables
pub mod tables;
/// Commonly used metadata token type
pub mod token;
/// Type definitions
pub mod typedef;
