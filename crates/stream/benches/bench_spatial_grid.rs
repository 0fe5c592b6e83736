use std::hint::black_box;
use std::time::Instant;

use glam::Vec3;
use worldspace_common::Transform;
use worldspace_kernel::{GameObjectDesc, GameObjectHandle, World, WorldConfig};
use worldspace_stream::{CellCoord, GridPartition, SpatialGridModule, SpatialProxies, SpatialProxy};

fn make_world(object_count: usize, spacing: f32) -> (World, Vec<GameObjectHandle>) {
    let mut world = World::new(WorldConfig::default()).expect("world");
    world
        .get_or_create_module::<SpatialGridModule>()
        .expect("spatial module");
    let side = (object_count as f32).sqrt().ceil() as usize;
    let mut objects = Vec::with_capacity(object_count);
    for i in 0..object_count {
        let position = Vec3::new((i % side) as f32 * spacing, 0.0, (i / side) as f32 * spacing);
        let object = world
            .create_object(
                GameObjectDesc::new()
                    .with_transform(Transform::from_position(position))
                    .dynamic(),
            )
            .expect("object");
        world
            .create_component::<SpatialProxies>(object, SpatialProxy::default())
            .expect("proxy");
        objects.push(object);
    }
    world.update();
    (world, objects)
}

fn bench_place(object_count: usize, iterations: usize) {
    let (world, objects) = make_world(object_count, 4.0);
    let positions: Vec<_> = objects
        .iter()
        .filter_map(|o| world.objects().global_transform(*o).map(|t| (*o, t.position)))
        .collect();

    let start = Instant::now();
    for _ in 0..iterations {
        let mut grid = GridPartition::new(16.0);
        for (object, position) in &positions {
            grid.place(*object, *position);
        }
        black_box(&grid);
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  place ({object_count} objects, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_objects_near(object_count: usize, radius: i32, iterations: usize) {
    let (world, _) = make_world(object_count, 4.0);
    let module = world.module::<SpatialGridModule>().expect("spatial module");

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(
            module
                .grid()
                .objects_in_radius(black_box(CellCoord::new(0, 0)), black_box(radius)),
        );
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  radius query ({object_count} objects, r={radius}, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_moving_update(object_count: usize, iterations: usize) {
    let (mut world, objects) = make_world(object_count, 4.0);

    let start = Instant::now();
    for i in 0..iterations {
        // Shift everything a quarter cell per frame so some objects cross borders.
        let offset = Vec3::new((i % 64) as f32 * 4.0, 0.0, 0.0);
        for object in &objects {
            if let Some(local) = world.objects().local_transform(*object) {
                world.set_local_transform(*object, Transform::from_position(local.position + offset * 0.01));
            }
        }
        black_box(world.update());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    let changes = world
        .module::<SpatialGridModule>()
        .map(|m| m.cell_changes())
        .unwrap_or(0);
    println!(
        "  moving update ({object_count} objects, {iterations} iters, {changes} cell changes): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn main() {
    println!("=== Spatial Grid Benchmarks ===\n");

    println!("Grid placement:");
    bench_place(100, 1000);
    bench_place(1000, 100);
    bench_place(10000, 10);

    println!("\nRadius query:");
    bench_objects_near(1000, 1, 10000);
    bench_objects_near(1000, 3, 10000);
    bench_objects_near(1000, 5, 1000);

    println!("\nWorld update with moving proxies:");
    bench_moving_update(100, 1000);
    bench_moving_update(1000, 100);

    println!("\n=== Done ===");
}
