use criterion::{criterion_group, criterion_main, Criterion, black_box};

use rkvol::volume::{BrickAllocation, BrickLayout, BrickStore, VoxelType};

use glam::{IVec3, Vec3};

fn ramp(count: usize) -> Vec<u8> {
    (0..count).map(|i| (i % 256) as u8).collect()
}

fn bench_write_region_64(c: &mut Criterion) {
    let dims = IVec3::splat(64);
    let store = BrickStore::new(dims, VoxelType::UChar, BrickAllocation::Eager);
    let data = ramp(64 * 64 * 64);

    c.bench_function("write_region_64_uchar", |b| {
        b.iter(|| store.write_region(black_box(&data), IVec3::ZERO, dims))
    });
}

fn bench_write_region_slabs_128(c: &mut Criterion) {
    let dims = IVec3::splat(128);
    let store = BrickStore::new(dims, VoxelType::Float, BrickAllocation::Eager);
    let slab = IVec3::new(128, 128, 16);
    let data = VoxelType::Float.encode(&vec![0.5; 128 * 128 * 16]);

    c.bench_function("write_region_128_float_slabs", |b| {
        b.iter(|| {
            for z in (0..128).step_by(16) {
                store.write_region(black_box(&data), IVec3::new(0, 0, z), slab).unwrap();
            }
        })
    });
}

fn bench_sparse_allocation(c: &mut Criterion) {
    c.bench_function("sparse_first_write_256", |b| {
        b.iter(|| {
            let store = BrickStore::new(IVec3::splat(256), VoxelType::UShort, BrickAllocation::Sparse);
            store.write_region(&[1, 0], black_box(IVec3::splat(130)), IVec3::ONE).unwrap();
            store.allocated_bricks()
        })
    });
}

fn bench_locate(c: &mut Criterion) {
    let layout = BrickLayout::new(IVec3::splat(512));

    c.bench_function("locate_4096", |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for i in 0..4096 {
                let p = IVec3::new(i % 512, (i * 7) % 512, (i * 13) % 512);
                let (brick, offset) = layout.locate(black_box(p));
                acc = acc.wrapping_add(brick ^ offset);
            }
            acc
        })
    });
}

fn bench_voxel_reads(c: &mut Criterion) {
    let dims = IVec3::splat(64);
    let store = BrickStore::new(dims, VoxelType::UChar, BrickAllocation::Eager);
    store.write_region(&ramp(64 * 64 * 64), IVec3::ZERO, dims).unwrap();

    c.bench_function("voxel_reads_ray_64", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for i in 0..64 {
                let p = Vec3::new(i as f32, i as f32 * 0.5, 63.0 - i as f32).as_ivec3();
                sum += store.voxel(black_box(p)).unwrap_or(0.0);
            }
            sum
        })
    });
}

criterion_group!(
    benches,
    bench_write_region_64,
    bench_write_region_slabs_128,
    bench_sparse_allocation,
    bench_locate,
    bench_voxel_reads,
);
criterion_main!(benches);
