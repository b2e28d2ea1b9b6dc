//! Accessibility rewriting.
//!
//! [`Rewriter`] applies a [`Policy`] to a single type: internal visibility is widened to
//! public, and method bodies are optionally replaced by a stub which throws on entry. The
//! walk driver in [`walker`] fans the rewriter out over every type of an assembly on a
//! bounded thread pool, then writes the result once.
//!
//! # Rules
//!
//! | Entity                 | Before                                          | After          |
//! |------------------------|-------------------------------------------------|----------------|
//! | top-level type         | `NotPublic`                                     | `Public`       |
//! | nested type            | `NestedAssembly`, `NestedFamOrAssem`, `NestedFamAndAssem` | `NestedPublic` |
//! | field, method          | `Assembly`, `FamOrAssem`, `FamAndAssem`         | `Public`       |
//!
//! All other values are left alone, so `private` and `protected` members as well as
//! nested-private types keep their accessibility. Nothing is ever narrowed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use publicizer::{
//!     resolver::ResolutionSession,
//!     rewrite::{publicize_file, Policy},
//! };
//! use std::path::Path;
//!
//! let mut session = ResolutionSession::new();
//! session.add_search_directory("refs");
//!
//! let policy = Policy::new().with_allowed_type("Foo.Bar");
//! let stats = publicize_file(
//!     Path::new("refs/Foo.dll"),
//!     Path::new("obj/Foo.dll"),
//!     &session,
//!     &policy,
//! )?;
//! println!("{} types widened", stats.types);
//! # Ok::<(), publicizer::Error>(())
//! ```

mod policy;
mod rewriter;
pub mod walker;

pub use policy::Policy;
pub use rewriter::{RewriteStats, Rewriter};
pub use walker::{publicize_file, rewrite_all, Walker};
