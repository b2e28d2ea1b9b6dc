use std::path::{Path, PathBuf};

use anyhow::Context;
use publicizer::{
    metadata::module::{CilModule, ReadOptions},
    resolver::ResolutionSession,
};

/// Load a module for inspection; dependencies are resolved only when `search_dirs` is given.
pub fn load_module(path: &Path, search_dirs: &[PathBuf]) -> anyhow::Result<CilModule> {
    let mut session = ResolutionSession::new();
    for dir in search_dirs {
        session.add_search_directory(dir);
    }

    let options = ReadOptions::default()
        .with_bodies(false)
        .with_dependencies(!search_dirs.is_empty());

    CilModule::read(path, &session, options)
        .with_context(|| format!("failed to load module: {}", path.display()))
}

/// Extract a display-friendly filename from a path.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}
