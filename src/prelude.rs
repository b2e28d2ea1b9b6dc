//! # publicizer Prelude
//!
//! The types needed for the common tasks: publicizing the references of a project,
//! rewriting single files, and inspecting modules.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all publicizer operations
pub use crate::Error;

/// The result type used throughout publicizer
pub use crate::Result;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Orchestration
// ================================================================================================

pub use crate::publicizer::{PublicizeConfig, PublicizeReport, Publicizer, TargetReference};

// ================================================================================================
// Rewriting
// ================================================================================================

pub use crate::rewrite::{publicize_file, rewrite_all, Policy, RewriteStats, Rewriter, Walker};

// ================================================================================================
// Loading and Resolution
// ================================================================================================

pub use crate::cilassembly::CilAssembly;
pub use crate::metadata::module::{CilModule, ReadOptions};
pub use crate::resolver::{DirectoryComparer, ResolutionSession, SearchPaths};

// ================================================================================================
// Type Model
// ================================================================================================

pub use crate::metadata::{
    access::{MemberAccess, TypeVisibility},
    field::FieldDef,
    identity::{AssemblyIdentity, AssemblyReference},
    method::{MethodBody, MethodDef},
    token::Token,
    typedef::TypeDef,
};
