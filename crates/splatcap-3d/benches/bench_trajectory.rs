use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use splatcap_3d::{
    io::colmap::{self, IMAGE_EXTENSION, IMAGE_PREFIX},
    io::ply::{self, PlyEncoding},
    pointcloud::{splats_from_point_cloud, PointCloudPoint, DEFAULT_INITIAL_SCALE},
    trajectory::{generate_viewpoints, TrajectoryConfig, TrajectoryType},
};

fn bench_generate_viewpoints(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_viewpoints");

    for trajectory_type in [
        TrajectoryType::Orbital,
        TrajectoryType::Spherical,
        TrajectoryType::Spiral,
    ] {
        let config = TrajectoryConfig {
            trajectory_type,
            num_rings: 10,
            views_per_ring: 50,
            ..Default::default()
        };
        group.bench_with_input(
            BenchmarkId::new("type", format!("{trajectory_type:?}")),
            &config,
            |b, config| b.iter(|| black_box(generate_viewpoints(config))),
        );
    }

    group.finish();
}

fn bench_colmap_images(c: &mut Criterion) {
    let mut group = c.benchmark_group("colmap_images");

    for views_per_ring in [36, 200] {
        let config = TrajectoryConfig {
            num_rings: 5,
            views_per_ring,
            ..Default::default()
        };
        let viewpoints = generate_viewpoints(&config);
        let images = colmap::create_images_from_viewpoints(&viewpoints, IMAGE_PREFIX, IMAGE_EXTENSION);

        group.bench_with_input(
            BenchmarkId::new("create", viewpoints.len()),
            &viewpoints,
            |b, viewpoints| {
                b.iter(|| {
                    black_box(colmap::create_images_from_viewpoints(
                        viewpoints,
                        IMAGE_PREFIX,
                        IMAGE_EXTENSION,
                    ))
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("write_bin", images.len()),
            &images,
            |b, images| {
                let mut buffer = Vec::new();
                b.iter(|| {
                    buffer.clear();
                    colmap::write_images_bin_to(&mut buffer, images, |_, _| {})
                        .expect("write to memory");
                    black_box(&buffer);
                })
            },
        );
    }

    group.finish();
}

fn bench_write_splats(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_splats");

    let points = (0..10_000)
        .map(|i| {
            let f = i as f32;
            PointCloudPoint::new([f.sin(), f.cos(), f * 1e-3], [0.0, 0.0, 1.0], [128, 64, 32])
        })
        .collect::<Vec<_>>();
    let splats = splats_from_point_cloud(&points, DEFAULT_INITIAL_SCALE);

    for encoding in [PlyEncoding::BinaryLittleEndian, PlyEncoding::Ascii] {
        group.bench_with_input(
            BenchmarkId::new(encoding.name(), splats.len()),
            &splats,
            |b, splats| {
                let mut buffer = Vec::new();
                b.iter(|| {
                    buffer.clear();
                    ply::write_gaussian_splats_to(&mut buffer, splats, encoding)
                        .expect("write to memory");
                    black_box(&buffer);
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_generate_viewpoints,
    bench_colmap_images,
    bench_write_splats
);
criterion_main!(benches);
