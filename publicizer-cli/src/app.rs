use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// publicizer - widen internal .NET types and members to public
#[derive(Debug, Parser)]
#[command(name = "publicizer", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Publicize the selected references and generate the IgnoresAccessChecksTo marker file.
    Publicize {
        /// Reference of the consuming project; every reference directory is searched for
        /// dependencies.
        #[arg(short, long = "reference", value_name = "PATH", required = true)]
        references: Vec<PathBuf>,

        /// Assembly name to publicize; accepts `;` separated lists.
        #[arg(short, long = "assembly", value_name = "NAME", required = true)]
        assemblies: Vec<String>,

        /// Only rewrite this type (full name, nested types as `Outer/Inner`).
        #[arg(short, long = "type", value_name = "TYPE")]
        types: Vec<String>,

        /// Keep the original method bodies instead of replacing them with `throw null`.
        #[arg(long)]
        keep_bodies: bool,

        /// Output directory (default: `<base-dir>/obj/GeneratedPublicizedAssemblies`).
        #[arg(long, value_name = "DIR")]
        target_dir: Option<PathBuf>,

        /// Directory relative paths are resolved against (default: current directory).
        #[arg(long, value_name = "DIR")]
        base_dir: Option<PathBuf>,

        /// Number of rewrite worker threads (default: available parallelism).
        #[arg(long, value_name = "N")]
        threads: Option<usize>,
    },

    /// List the types of a module with their visibility and internal member counts.
    Inspect {
        /// Path to the .NET module.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Show only types that a publicize run would change.
        #[arg(long)]
        internal_only: bool,

        /// Resolve the module's references in these directories.
        #[arg(short, long = "search-dir", value_name = "DIR")]
        search_dirs: Vec<PathBuf>,
    },
}
