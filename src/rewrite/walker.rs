//! Parallel walk over every type of an assembly.
//!
//! The walk runs in three phases with a full barrier between each: the source assembly and
//! all of its transitive dependencies are read, every type is rewritten on a rayon pool, and
//! the result is written once. A failure in any phase leaves no output behind.

use std::{num::NonZeroUsize, path::Path};

use log::{debug, info, warn};
use rayon::{prelude::*, ThreadPoolBuilder};

use crate::{
    cilassembly::CilAssembly,
    metadata::{module::ReadOptions, typedef::TypeDef},
    resolver::ResolutionSession,
    rewrite::{Policy, RewriteStats, Rewriter},
    Result,
};

/// Drives the rewrite of whole assemblies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Walker {
    threads: Option<NonZeroUsize>,
}

impl Walker {
    /// A walker using rayon's global pool, sized to the available parallelism.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the rewrite on a dedicated pool of `threads` workers; `0` keeps the global pool.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = NonZeroUsize::new(threads);
        self
    }

    /// The configured worker count, `None` for the global pool.
    #[must_use]
    pub fn threads(&self) -> Option<NonZeroUsize> {
        self.threads
    }

    /// Rewrites every type of every module of `assembly`, nested types included.
    pub fn rewrite_all(&self, assembly: &mut CilAssembly, policy: &Policy) -> RewriteStats {
        let types: Vec<&mut TypeDef> = assembly.types_mut().collect();
        debug!("Rewriting {} types", types.len());

        let rewriter = Rewriter::new(policy);
        let run = move || {
            types
                .into_par_iter()
                .map(|ty| rewriter.rewrite(ty))
                .reduce(RewriteStats::default, RewriteStats::merge)
        };

        match self.threads {
            Some(threads) => match ThreadPoolBuilder::new()
                .num_threads(threads.get())
                .thread_name(|index| format!("publicizer-{index}"))
                .build()
            {
                Ok(pool) => pool.install(run),
                Err(error) => {
                    warn!("Falling back to the global pool, {threads} threads unavailable - {error}");
                    run()
                }
            },
            None => run(),
        }
    }

    /// Reads the assembly at `source`, resolving its dependencies through `session`,
    /// rewrites it with `policy` and writes it to `target`.
    ///
    /// # Errors
    /// Returns the error of the failing phase: [`crate::Error::Resolution`],
    /// [`crate::Error::BadImage`] or [`crate::Error::Structural`] while reading,
    /// [`crate::Error::Layout`] or [`crate::Error::FileError`] while writing.
    pub fn publicize_file(
        &self,
        source: &Path,
        target: &Path,
        session: &ResolutionSession,
        policy: &Policy,
    ) -> Result<RewriteStats> {
        let mut assembly = CilAssembly::read(source, session, ReadOptions::default())?;

        let stats = self.rewrite_all(&mut assembly, policy);
        debug!(
            "{}: {} types, {} fields, {} methods widened, {} bodies stubbed, {} types skipped",
            source.display(),
            stats.types,
            stats.fields,
            stats.methods,
            stats.stubbed,
            stats.skipped
        );

        assembly.write(target)?;
        info!("Publicized {} to {}", source.display(), target.display());
        Ok(stats)
    }
}

/// Rewrites every type of `assembly` on the global pool.
pub fn rewrite_all(assembly: &mut CilAssembly, policy: &Policy) -> RewriteStats {
    Walker::new().rewrite_all(assembly, policy)
}

/// Publicizes `source` into `target` on the global pool. See [`Walker::publicize_file`].
///
/// # Errors
/// Returns any error of [`Walker::publicize_file`].
pub fn publicize_file(
    source: &Path,
    target: &Path,
    session: &ResolutionSession,
    policy: &Policy,
) -> Result<RewriteStats> {
    Walker::new().publicize_file(source, target, session, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_configuration() {
        assert_eq!(Walker::new().threads(), None);
        assert_eq!(Walker::new().with_threads(0).threads(), None);
        assert_eq!(
            Walker::new().with_threads(3).threads().map(NonZeroUsize::get),
            Some(3)
        );
    }

    #[test]
    fn missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let session = ResolutionSession::new();
        let result = publicize_file(
            &dir.path().join("Nope.dll"),
            &dir.path().join("out.dll"),
            &session,
            &Policy::new(),
        );
        assert!(matches!(result, Err(crate::Error::FileError(_))));
        assert!(!dir.path().join("out.dll").exists());
    }
}
