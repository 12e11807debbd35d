// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for layout resolution and the cached desktop paths
// in the deskwerk-runtime crate, driven by the in-memory shell.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use deskwerk_core::config::DesktopConfig;
use deskwerk_core::types::BuildVersion;
use deskwerk_interop::fake::FakeHost;
use deskwerk_interop::resolve_variant;
use deskwerk_runtime::VirtualDesktops;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Benchmark picking the interface layout for builds across the table.
fn bench_resolve_variant(c: &mut Criterion) {
    let builds: &[(&str, BuildVersion)] = &[
        ("10240", BuildVersion::new(10, 0, 10240, 0)),
        ("19045", BuildVersion::new(10, 0, 19045, 4046)),
        ("22000", BuildVersion::new(10, 0, 22000, 0)),
        ("22621.2215", BuildVersion::new(10, 0, 22621, 2215)),
    ];

    let mut group = c.benchmark_group("resolve_variant");
    for &(label, build) in builds {
        group.bench_function(label, |b| {
            b.iter(|| {
                let variant = resolve_variant(black_box(build)).expect("supported build");
                black_box(variant.id);
            });
        });
    }
    group.finish();
}

/// Benchmark `current_desktop` once the wrapper is cached.
///
/// Each iteration makes one native call and one cache hit.
fn bench_current_desktop_cached(c: &mut Criterion) {
    let host = FakeHost::new(BuildVersion::new(10, 0, 22621, 2215));
    let desktops = VirtualDesktops::with_host(Arc::new(host), DesktopConfig::default());
    desktops.initialize().expect("initialize failed");
    desktops.current_desktop().expect("warm cache");

    c.bench_function("current_desktop (cached)", |b| {
        b.iter(|| {
            let desktop = desktops.current_desktop().expect("current desktop");
            black_box(desktop.id());
        });
    });
}

/// Benchmark enumerating 20 desktops through the identity cache.
fn bench_all_desktops(c: &mut Criterion) {
    let names: Vec<String> = (1..=20).map(|i| format!("Desktop {i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let host = FakeHost::with_desktops(BuildVersion::new(10, 0, 22621, 2215), &names);
    let desktops = VirtualDesktops::with_host(Arc::new(host), DesktopConfig::default());
    desktops.all_desktops().expect("warm cache");

    c.bench_function("all_desktops (20, cached)", |b| {
        b.iter(|| {
            let all = desktops.all_desktops().expect("all desktops");
            black_box(all.len());
        });
    });
}

criterion_group!(
    benches,
    bench_resolve_variant,
    bench_current_desktop_cached,
    bench_all_desktops,
);
criterion_main!(benches);
