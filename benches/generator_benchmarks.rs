//! Performance benchmarks for the nativebind generator.
//!
//! Workloads:
//! - Size-based: declaration sets from 1 to 500 classes
//! - Feature-specific: overload ranking, index paths, callback trampolines
//!
//! ## Profiling with Puffin
//!
//! Run with the `profile-with-puffin` feature to collect per-phase timings:
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use nativebind::core::{
    AdapterSpec, Annotations, ClassDecl, FieldDecl, IndexOp, MethodDecl, NativeSignature,
    PrimitiveKind, TypeSpec,
};
use nativebind::generator::{Generator, GeneratorOptions};
use nativebind::registry::DeclarationSet;
use std::hint::black_box;

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

/// Flush profiling data at the end of an iteration.
#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

/// A class exercising every bridge kind.
fn library_class(i: usize) -> ClassDecl {
    ClassDecl::opaque(format!("Mat{i}"))
        .namespace("cv")
        .method(MethodDecl::allocator())
        .method(MethodDecl::array_allocator())
        .method(MethodDecl::new("rows").returns(TypeSpec::primitive(PrimitiveKind::Int)))
        .method(
            MethodDecl::new("scale")
                .param("factor", TypeSpec::primitive(PrimitiveKind::Double))
                .candidate(NativeSignature::new(["float"]))
                .candidate(NativeSignature::new(["double"])),
        )
        .method(
            MethodDecl::new("fill").param(
                "values",
                TypeSpec::primitive_handle(PrimitiveKind::Int)
                    .adapter(AdapterSpec::new("VectorAdapter", "std::vector<int>")),
            ),
        )
        .method(MethodDecl::new("clear").flags(Annotations::NO_EXCEPTION))
        .field(FieldDecl::new("flags", TypeSpec::primitive(PrimitiveKind::Int)))
        .nest(
            ClassDecl::opaque("Grid")
                .native("std::vector<std::vector<int> >")
                .namespace("")
                .container(TypeSpec::primitive(PrimitiveKind::Int), 2)
                .method(MethodDecl::index("get", IndexOp::Get, 2))
                .method(MethodDecl::index("size", IndexOp::Size, 1)),
        )
}

fn callback_class(i: usize) -> ClassDecl {
    ClassDecl::callback(format!("Listener{i}")).method(
        MethodDecl::call()
            .flags(Annotations::HOST_IMPLEMENTED)
            .param("code", TypeSpec::primitive(PrimitiveKind::Int))
            .returns(TypeSpec::primitive(PrimitiveKind::Bool)),
    )
}

fn declaration_set(classes: usize) -> DeclarationSet {
    let mut set = DeclarationSet::new();
    for i in 0..classes {
        set.add_class_in(&["org", "bench"], library_class(i)).unwrap();
        if i % 4 == 0 {
            set.add_class_in(&["org", "bench"], callback_class(i)).unwrap();
        }
    }
    set
}

/// Benchmark generation across declaration set sizes.
fn size_based_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let generator = Generator::new(GeneratorOptions::default());
    let mut group = c.benchmark_group("generator/set_sizes");

    for classes in [1usize, 10, 100, 500] {
        let set = declaration_set(classes);
        group.throughput(Throughput::Elements(set.len() as u64));
        group.bench_function(format!("classes_{classes}"), |b| {
            b.iter(|| {
                let unit = generator.generate(black_box(&set));
                end_profiling_frame();
                black_box(unit.source.len())
            });
        });
    }

    group.finish();
}

/// Benchmark individual features in isolation.
fn feature_specific_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator/features");

    let mut overloads = DeclarationSet::new();
    let mut class = ClassDecl::opaque("Overloaded");
    for i in 0..50 {
        let mut method = MethodDecl::new("at")
            .param("a", TypeSpec::primitive(PrimitiveKind::Int))
            .param("b", TypeSpec::primitive(PrimitiveKind::Long));
        for candidate in [["int", "int"], ["long long", "int"], ["int", "long long"]] {
            method = method.candidate(NativeSignature::new(candidate));
        }
        class = class.method(method.native(format!("at{i}")));
    }
    overloads.add_class(class).unwrap();
    let generator = Generator::new(GeneratorOptions::default().with_prelude(false));
    group.bench_function("overload_ranking", |b| {
        b.iter(|| black_box(generator.generate(black_box(&overloads)).symbols.len()));
    });

    let mut callbacks = DeclarationSet::new();
    for i in 0..20 {
        callbacks.add_class(callback_class(i)).unwrap();
    }
    let generator = Generator::new(
        GeneratorOptions::default()
            .with_prelude(false)
            .with_header(true)
            .with_callback_slots(32),
    );
    group.bench_function("callback_trampolines", |b| {
        b.iter(|| black_box(generator.generate(black_box(&callbacks)).source.len()));
    });

    group.finish();
}

criterion_group!(benches, size_based_benchmarks, feature_specific_benchmarks);

criterion_main!(benches);
