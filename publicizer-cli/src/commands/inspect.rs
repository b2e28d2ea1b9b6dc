use std::path::{Path, PathBuf};

use publicizer::metadata::{
    access::{MemberAccess, TypeVisibility},
    typedef::TypeDef,
};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_module,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct TypeEntry {
    token: String,
    visibility: String,
    name: String,
    fields: usize,
    internal_fields: usize,
    methods: usize,
    internal_methods: usize,
}

#[derive(Debug, Serialize)]
struct InspectOutput {
    module: String,
    assembly: Option<String>,
    runtime: String,
    references: Vec<String>,
    symbols: Option<String>,
    types: Vec<TypeEntry>,
    count: usize,
}

fn is_internal(access: MemberAccess) -> bool {
    matches!(
        access,
        MemberAccess::Assembly | MemberAccess::FamOrAssem | MemberAccess::FamAndAssem
    )
}

fn is_internal_type(ty: &TypeDef) -> bool {
    match ty.visibility {
        TypeVisibility::NotPublic => !ty.is_nested(),
        TypeVisibility::NestedAssembly
        | TypeVisibility::NestedFamOrAssem
        | TypeVisibility::NestedFamAndAssem => ty.is_nested(),
        _ => false,
    }
}

pub fn run(
    path: &Path,
    internal_only: bool,
    search_dirs: &[PathBuf],
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let module = load_module(path, search_dirs)?;

    let mut entries = Vec::new();
    for ty in module.types() {
        let internal_fields = ty.fields.iter().filter(|f| is_internal(f.access)).count();
        let internal_methods = ty.methods.iter().filter(|m| is_internal(m.access)).count();

        if internal_only && !is_internal_type(ty) && internal_fields == 0 && internal_methods == 0
        {
            continue;
        }

        entries.push(TypeEntry {
            token: ty.token.to_string(),
            visibility: ty.visibility.to_string(),
            name: ty.full_name.clone(),
            fields: ty.fields.len(),
            internal_fields,
            methods: ty.methods.len(),
            internal_methods,
        });
    }

    let count = entries.len();
    let output = InspectOutput {
        module: module.name().to_string(),
        assembly: module.assembly().map(ToString::to_string),
        runtime: module.runtime_version().to_string(),
        references: module.references().iter().map(ToString::to_string).collect(),
        symbols: module.symbols().map(|p| p.display().to_string()),
        types: entries,
        count,
    };

    print_output(&output, opts, |out| {
        println!("Module:     {}", out.module);
        if let Some(assembly) = &out.assembly {
            println!("Assembly:   {assembly}");
        }
        println!("Runtime:    {}", out.runtime);
        if let Some(symbols) = &out.symbols {
            println!("Symbols:    {symbols}");
        }

        if !out.references.is_empty() {
            println!("\nReferences:");
            let mut tw = TabWriter::new(vec![("Name", Align::Left)]).indent("  ");
            for reference in &out.references {
                tw.row(vec![reference.clone()]);
            }
            tw.print();
        }

        println!();
        let mut tw = TabWriter::new(vec![
            ("Token", Align::Left),
            ("Visibility", Align::Left),
            ("Fields", Align::Right),
            ("Internal", Align::Right),
            ("Methods", Align::Right),
            ("Internal", Align::Right),
            ("Name", Align::Left),
        ]);
        for e in &out.types {
            tw.row(vec![
                e.token.clone(),
                e.visibility.clone(),
                e.fields.to_string(),
                e.internal_fields.to_string(),
                e.methods.to_string(),
                e.internal_methods.to_string(),
                e.name.clone(),
            ]);
        }
        tw.print();
        println!("\n{} type(s) listed.", out.count);
    })
}
