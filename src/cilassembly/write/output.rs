//! Memory-mapped output file with atomic finalization.
//!
//! [`crate::cilassembly::write::output::Output`] maps a temporary file next to the target,
//! so the rename in [`crate::cilassembly::write::output::Output::finalize`] stays on one
//! filesystem. Until then the target is never touched; an `Output` dropped without being
//! finalized removes its temporary file.
//!
//! Temporaries are also tracked process-wide, so a process that is about to exit without
//! unwinding can remove them with [`crate::cilassembly::write::output::discard_pending`].

use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use dashmap::DashSet;
use memmap2::{MmapMut, MmapOptions};

use crate::Result;

static PENDING: LazyLock<DashSet<PathBuf>> = LazyLock::new(DashSet::new);

/// Removes the temporary file of every [`Output`] that is neither finalized nor dropped yet
/// and returns how many were removed.
///
/// Meant for interrupt handlers that end the process without running destructors. Outputs
/// still in use fail on finalization afterwards.
pub fn discard_pending() -> usize {
    discard_matching(|_| true)
}

fn discard_matching(filter: impl Fn(&Path) -> bool) -> usize {
    let doomed: Vec<PathBuf> = PENDING
        .iter()
        .filter(|path| filter(path.key()))
        .map(|path| path.key().clone())
        .collect();

    doomed
        .into_iter()
        .filter(|path| {
            PENDING.remove(path);
            fs::remove_file(path).is_ok()
        })
        .count()
}

/// A memory-mapped output file that replaces its target atomically.
pub struct Output {
    /// The memory mapping of the temporary file
    mmap: MmapMut,
    /// The temporary sibling being written
    temp_path: PathBuf,
    /// The path the file is renamed to on success
    target_path: PathBuf,
    /// Whether the file has been finalized
    finalized: bool,
}

impl Output {
    /// Creates a temporary sibling of `target_path` with `size` bytes and maps it.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be created, sized or mapped.
    pub fn create<P: AsRef<Path>>(target_path: P, size: u64) -> Result<Self> {
        let target_path = target_path.as_ref().to_path_buf();
        let temp_path = temp_sibling(&target_path);

        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        PENDING.insert(temp_path.clone());

        let mapped = file.set_len(size).and_then(|()| {
            // SAFETY: the file was just created by us and is not shared with other mappings
            unsafe { MmapOptions::new().map_mut(&file) }
        });

        match mapped {
            Ok(mmap) => Ok(Self {
                mmap,
                temp_path,
                target_path,
                finalized: false,
            }),
            Err(error) => {
                PENDING.remove(&temp_path);
                let _ = fs::remove_file(&temp_path);
                Err(error.into())
            }
        }
    }

    /// The entire file contents.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    /// Writes `data` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the write would exceed the file.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let Some(end) = offset.checked_add(data.len()) else {
            return Err(out_of_bounds_error!());
        };
        if end > self.mmap.len() {
            return Err(out_of_bounds_error!());
        }

        self.mmap[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Flushes the mapping and renames the temporary file over the target.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if flushing or renaming fails; the temporary file
    /// is removed in that case.
    pub fn finalize(mut self) -> Result<()> {
        self.mmap.flush()?;
        self.finalized = true;

        let temp_path = std::mem::take(&mut self.temp_path);
        let target_path = std::mem::take(&mut self.target_path);
        // Unmap before renaming, Windows refuses to move mapped files
        drop(self);

        let renamed = fs::rename(&temp_path, &target_path);
        PENDING.remove(&temp_path);
        if let Err(error) = renamed {
            let _ = fs::remove_file(&temp_path);
            return Err(error.into());
        }

        Ok(())
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        if !self.finalized {
            PENDING.remove(&self.temp_path);
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

fn temp_sibling(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map_or_else(|| "output".into(), |name| name.to_string_lossy());
    target.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()))
}
