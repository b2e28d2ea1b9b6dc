use std::path::{Path, PathBuf};

use anyhow::Context;
use publicizer::publicizer::{PublicizeConfig, PublicizeReport, Publicizer};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::file_display_name,
    output::{print_output, Align, TabWriter},
};

/// Arguments of the `publicize` command.
pub struct PublicizeOptions<'a> {
    pub references: &'a [PathBuf],
    pub assemblies: &'a [String],
    pub types: &'a [String],
    pub keep_bodies: bool,
    pub target_dir: Option<&'a Path>,
    pub base_dir: Option<&'a Path>,
    pub threads: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TargetEntry {
    original: String,
    target: String,
    created: bool,
    types: usize,
    fields: usize,
    methods: usize,
    stubbed: usize,
}

#[derive(Debug, Serialize)]
struct PublicizeOutput {
    target_references: Vec<TargetEntry>,
    removed_references: Vec<String>,
    generated_code_files: Vec<String>,
}

impl From<&PublicizeReport> for PublicizeOutput {
    fn from(report: &PublicizeReport) -> Self {
        let target_references = report
            .target_references
            .iter()
            .map(|reference| {
                let stats = reference.stats.unwrap_or_default();
                TargetEntry {
                    original: reference.original.display().to_string(),
                    target: reference.path.display().to_string(),
                    created: reference.created,
                    types: stats.types,
                    fields: stats.fields,
                    methods: stats.methods,
                    stubbed: stats.stubbed,
                }
            })
            .collect();

        PublicizeOutput {
            target_references,
            removed_references: report
                .removed_references
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            generated_code_files: report
                .generated_code_files
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
        }
    }
}

pub fn run(options: &PublicizeOptions<'_>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let base_dir = match options.base_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("failed to determine the current directory")?,
    };

    let mut config = PublicizeConfig::new(base_dir)
        .with_source_references(options.references.iter().cloned())
        .with_stub_bodies(!options.keep_bodies);
    for names in options.assemblies {
        config = config.with_assembly_names(names);
    }
    for names in options.types {
        config = config.with_allowed_types(names);
    }
    if let Some(dir) = options.target_dir {
        config = config.with_target_dir(dir);
    }
    if let Some(threads) = options.threads {
        config = config.with_threads(threads);
    }

    let report = Publicizer::new(config)
        .run()
        .context("failed to publicize references")?;
    let output = PublicizeOutput::from(&report);

    print_output(&output, opts, |out| {
        if out.target_references.is_empty() {
            println!("No reference matched the requested assembly names.");
        } else {
            let mut tw = TabWriter::new(vec![
                ("Assembly", Align::Left),
                ("Status", Align::Left),
                ("Types", Align::Right),
                ("Fields", Align::Right),
                ("Methods", Align::Right),
                ("Stubbed", Align::Right),
                ("Target", Align::Left),
            ]);
            for e in &out.target_references {
                let status = if e.created { "created" } else { "existing" };
                tw.row(vec![
                    file_display_name(Path::new(&e.original)),
                    status.to_string(),
                    e.types.to_string(),
                    e.fields.to_string(),
                    e.methods.to_string(),
                    e.stubbed.to_string(),
                    e.target.clone(),
                ]);
            }
            tw.print();
        }

        for file in &out.generated_code_files {
            println!("\nGenerated {file}");
        }
    })
}
