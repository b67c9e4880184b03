//! Benchmarks for candidate detection, optimization and conversion.
//!
//! Run with: cargo bench -p quadify
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p quadify -- --save-baseline main
//! 2. After changes: cargo bench -p quadify -- --baseline main

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::Point3;
use quadify::{PolyMesh, QuadOptimizer, SolverConfig, find_candidates};

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// `n x n` grid of split squares. With `alternate`, the diagonal direction
/// flips in a checkerboard, which makes the triangle adjacency non-bipartite.
fn create_grid(n: u32, alternate: bool) -> PolyMesh {
    let stride = n + 1;
    let vertices: Vec<Point3<f64>> = (0..=n)
        .flat_map(|j| {
            (0..=n).map(move |i| Point3::new(i as f64, j as f64, 0.0))
        })
        .collect();

    let mut triangles = Vec::with_capacity((2 * n * n) as usize);
    for j in 0..n {
        for i in 0..n {
            let a = j * stride + i;
            let b = a + 1;
            let c = a + stride + 1;
            let d = a + stride;
            if alternate && (i + j) % 2 == 1 {
                triangles.push([a, b, d]);
                triangles.push([b, c, d]);
            } else {
                triangles.push([a, b, c]);
                triangles.push([a, c, d]);
            }
        }
    }
    // Generated indices are in range.
    PolyMesh::from_triangles(vertices, &triangles).unwrap()
}

// =============================================================================
// Candidate Detection
// =============================================================================

fn bench_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("Candidates");

    for n in [16u32, 64] {
        let mesh = create_grid(n, false);
        group.throughput(Throughput::Elements(mesh.triangle_count() as u64));
        group.bench_with_input(BenchmarkId::new("grid", n), &mesh, |b, mesh| {
            b.iter(|| find_candidates(black_box(mesh)))
        });
    }

    group.finish();
}

// =============================================================================
// Optimization
// =============================================================================

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Optimize");
    group.sample_size(10);

    let optimizer = QuadOptimizer::default();
    let fast = QuadOptimizer::default().with_config(SolverConfig::fast());

    for n in [4u32, 8, 12] {
        for alternate in [false, true] {
            let candidates = find_candidates(&create_grid(n, alternate));
            let label = if alternate { "checkerboard" } else { "grid" };
            group.throughput(Throughput::Elements(candidates.len() as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("{}_default", label), n),
                &candidates,
                |b, candidates| b.iter(|| optimizer.optimize(black_box(candidates)).unwrap()),
            );
            group.bench_with_input(
                BenchmarkId::new(format!("{}_fast", label), n),
                &candidates,
                |b, candidates| b.iter(|| fast.optimize(black_box(candidates)).unwrap()),
            );
        }
    }

    group.finish();
}

// =============================================================================
// End to End
// =============================================================================

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("Convert");
    group.sample_size(10);

    let optimizer = QuadOptimizer::default();
    for n in [8u32, 16] {
        let mesh = create_grid(n, true);
        group.bench_with_input(BenchmarkId::new("checkerboard", n), &mesh, |b, mesh| {
            b.iter(|| {
                let mut mesh = mesh.clone();
                mesh.tris_to_quads(&optimizer).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_candidates, bench_optimize, bench_convert);
criterion_main!(benches);
