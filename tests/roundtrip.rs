//! Reading and writing images without semantic changes.

mod common;

use std::fs;

use common::*;
use publicizer::{cilassembly::write::pe_checksum, prelude::*};

fn checksum_of(data: &[u8]) -> u32 {
    u32::from_le_bytes(
        data[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4]
            .try_into()
            .unwrap(),
    )
}

fn sample() -> ImageBuilder {
    foo_bar_baz()
        .with_type(TypeSpec::new("Foo", "Outer", TYPE_PUBLIC | TYPE_ABSTRACT))
        .with_type(
            TypeSpec::new("", "Inner", TYPE_NESTED_ASSEMBLY)
                .nested_in(1)
                .field("value", MEMBER_PRIVATE)
                .method(MethodSpec::abstract_method("Shape", MEMBER_FAMILY)),
        )
}

#[test]
fn unchanged_module_is_byte_identical() -> Result<()> {
    for builder in [sample(), sample().with_checksum()] {
        let dir = tempfile::tempdir()?;
        let source = builder.write(dir.path(), "Foo.dll");
        fs::create_dir_all(dir.path().join("copy"))?;
        let target = dir.path().join("copy").join("Foo.dll");

        let module = CilModule::read(&source, &ResolutionSession::new(), ReadOptions::default())?;
        module.write(&target)?;

        assert_eq!(fs::read(&target)?, fs::read(&source)?);
    }
    Ok(())
}

#[test]
fn model_matches_image() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = sample().with_reference("Dep").write(dir.path(), "Foo.dll");

    let module = CilModule::read(
        &source,
        &ResolutionSession::new(),
        ReadOptions::default().with_dependencies(false),
    )?;

    assert_eq!(module.name(), "Foo.dll");
    assert_eq!(module.runtime_version(), "v4.0.30319");
    assert_eq!(module.assembly().map(|a| a.name.as_str()), Some("Foo"));
    let dep = &module.references()[0];
    assert_eq!(dep.name, "Dep");
    assert_eq!(dep.version.to_string(), "1.0.0.0");
    assert!(!dep.is_windows_runtime());

    let names: Vec<_> = module.types().iter().map(|ty| ty.full_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["<Module>", "Foo.Bar", "Foo.Outer", "Foo.Outer/Inner"]
    );

    let inner = &module.types()[3];
    assert_eq!(inner.enclosing, Some(2));
    assert_eq!(module.types()[2].nested, vec![3]);
    assert_eq!(inner.fields[0].access, MemberAccess::Private);
    assert!(!inner.methods[0].has_il_body());
    Ok(())
}

#[test]
fn checksum_is_recomputed_after_rewrite() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = sample().with_checksum().write(dir.path(), "Foo.dll");
    let target = dir.path().join("Foo.out.dll");

    publicize_file(&source, &target, &ResolutionSession::new(), &Policy::new())?;

    let original = fs::read(&source)?;
    let written = fs::read(&target)?;
    assert_ne!(written, original);
    assert_ne!(checksum_of(&written), checksum_of(&original));
    assert_eq!(checksum_of(&written), pe_checksum(&written, CHECKSUM_OFFSET));
    Ok(())
}

#[test]
fn zero_checksum_stays_zero() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = sample().write(dir.path(), "Foo.dll");
    let target = dir.path().join("Foo.out.dll");

    publicize_file(&source, &target, &ResolutionSession::new(), &Policy::new())?;

    assert_eq!(checksum_of(&fs::read(&target)?), 0);
    Ok(())
}

#[test]
fn rewrite_touches_only_access_bits_and_bodies() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = sample().write(dir.path(), "Foo.dll");
    let target = dir.path().join("Foo.out.dll");

    let policy = Policy::new().with_stub_bodies(false);
    publicize_file(&source, &target, &ResolutionSession::new(), &policy)?;

    let session = ResolutionSession::new();
    let before = CilModule::read(&source, &session, ReadOptions::default())?;
    let after = CilModule::read(&target, &session, ReadOptions::default())?;

    assert_eq!(before.mvid(), after.mvid());
    assert_eq!(before.table_rows(), after.table_rows());
    for (old, new) in before.types().iter().zip(after.types()) {
        assert_eq!(old.full_name, new.full_name);
        assert_eq!(old.flags & !0x7, new.flags & !0x7);
        for (old, new) in old.methods.iter().zip(&new.methods) {
            assert_eq!(old.rva, new.rva);
            assert_eq!(old.impl_flags, new.impl_flags);
        }
    }
    Ok(())
}

/// File names in `dir` that belong to unfinished outputs.
fn temporaries(dir: &std::path::Path) -> Result<Vec<String>> {
    Ok(fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect())
}

#[test]
fn symbols_follow_the_module() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = sample().write(dir.path(), "Foo.dll");
    let pdb = write_bytes(dir.path(), "Foo.pdb", b"BSJB symbols");
    fs::create_dir_all(dir.path().join("copy"))?;
    let target = dir.path().join("copy").join("Foo.dll");

    let module = CilModule::read(&source, &ResolutionSession::new(), ReadOptions::default())?;
    assert_eq!(module.symbols(), Some(pdb.as_path()));
    module.write(&target)?;

    assert_eq!(fs::read(dir.path().join("copy").join("Foo.pdb"))?, b"BSJB symbols");
    assert!(temporaries(&dir.path().join("copy"))?.is_empty());
    Ok(())
}

#[test]
fn failed_symbols_copy_leaves_no_module() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = sample().write(dir.path(), "Foo.dll");
    write_bytes(dir.path(), "Foo.pdb", b"BSJB symbols");
    let copy = dir.path().join("copy");
    // A directory in place of the pdb makes its rename fail
    fs::create_dir_all(copy.join("Foo.pdb").join("occupied"))?;

    let module = CilModule::read(&source, &ResolutionSession::new(), ReadOptions::default())?;
    assert!(module.write(&copy.join("Foo.dll")).is_err());

    assert!(!copy.join("Foo.dll").exists());
    assert!(temporaries(&copy)?.is_empty());
    Ok(())
}

#[test]
fn not_an_image() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_bytes(dir.path(), "Foo.dll", &[0x42; 1024]);

    let result = CilModule::read(&path, &ResolutionSession::new(), ReadOptions::default());
    match result {
        Err(Error::BadImage { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected a bad image error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn truncated_metadata_is_a_bad_image() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut image = sample().build();
    // Break the metadata signature
    let bsjb = image
        .windows(4)
        .position(|window| window == b"BSJB")
        .unwrap();
    image[bsjb] = b'X';
    let path = write_bytes(dir.path(), "Foo.dll", &image);

    let result = CilModule::read(&path, &ResolutionSession::new(), ReadOptions::default());
    assert!(result.is_err_and(|error| error.is_bad_image()));
    Ok(())
}
