mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        // Exiting skips destructors, so unfinished outputs are removed here
        publicizer::cilassembly::write::discard_pending();
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse();

    // Show publicizer info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("publicizer", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Publicize {
            references,
            assemblies,
            types,
            keep_bodies,
            target_dir,
            base_dir,
            threads,
        } => commands::publicize::run(
            &commands::publicize::PublicizeOptions {
                references,
                assemblies,
                types,
                keep_bodies: *keep_bodies,
                target_dir: target_dir.as_deref(),
                base_dir: base_dir.as_deref(),
                threads: *threads,
            },
            &cli.global,
        ),
        Command::Inspect {
            path,
            internal_only,
            search_dirs,
        } => commands::inspect::run(path, *internal_only, search_dirs, &cli.global),
    }
}
