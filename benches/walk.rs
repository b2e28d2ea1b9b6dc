//! Benchmarks for reading, rewriting and writing a synthesized assembly.
//!
//! The image holds 200 internal types with 4 fields and 10 methods each.

extern crate publicizer;

#[path = "../tests/common/mod.rs"]
mod common;

use common::*;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use publicizer::prelude::*;
use std::hint::black_box;

fn large_image() -> ImageBuilder {
    (0..200).fold(ImageBuilder::new("Bench"), |builder, index| {
        let ty = (0..10).fold(
            TypeSpec::new("Bench", &format!("T{index}"), TYPE_NOT_PUBLIC)
                .field("a", MEMBER_ASSEMBLY)
                .field("b", MEMBER_PRIVATE)
                .field("c", MEMBER_FAM_OR_ASSEM)
                .field("d", MEMBER_PUBLIC),
            |ty, method| ty.method(MethodSpec::new(&format!("M{method}"), MEMBER_ASSEMBLY)),
        );
        builder.with_type(ty)
    })
}

fn bench_read(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let source = large_image().write(dir.path(), "Bench.dll");
    let session = ResolutionSession::new();

    c.bench_function("read_module", |b| {
        b.iter(|| {
            let module =
                CilModule::read(black_box(&source), &session, ReadOptions::default()).unwrap();
            black_box(module)
        });
    });
}

fn bench_rewrite(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let source = large_image().write(dir.path(), "Bench.dll");
    let session = ResolutionSession::new();
    let policy = Policy::new();

    c.bench_function("rewrite_all", |b| {
        b.iter_batched(
            || CilAssembly::read(&source, &session, ReadOptions::default()).unwrap(),
            |mut assembly| black_box(rewrite_all(&mut assembly, &policy)),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("rewrite_all_single_thread", |b| {
        let walker = Walker::new().with_threads(1);
        b.iter_batched(
            || CilAssembly::read(&source, &session, ReadOptions::default()).unwrap(),
            |mut assembly| black_box(walker.rewrite_all(&mut assembly, &policy)),
            BatchSize::SmallInput,
        );
    });
}

fn bench_publicize(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let source = large_image().write(dir.path(), "Bench.dll");
    let target = dir.path().join("Bench.out.dll");
    let session = ResolutionSession::new();
    let policy = Policy::new();

    c.bench_function("publicize_file", |b| {
        b.iter(|| {
            let stats = publicize_file(&source, &target, &session, &policy).unwrap();
            black_box(stats)
        });
    });
}

criterion_group!(benches, bench_read, bench_rewrite, bench_publicize);
criterion_main!(benches);
