use glam::{UVec2, Vec2};
use loosegrid::*;
use std::time::Instant;

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    *seed
}

fn unit(seed: &mut u32) -> f32 {
    lcg(seed) as f32 / u32::MAX as f32
}

fn main() {
    env_logger::init();
    let cfg = GridConfig::new(Vec2::splat(-100.0), UVec2::new(100, 100), 2.0).with_loose_cell_factor(4);
    let mut grid = match Grid::new(cfg) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let n = 20_000usize; // number of entities
    let frames = 30;
    let mut seed = 1u32;
    let mut bodies = Vec::with_capacity(n);
    let t0 = Instant::now();
    grid.batch(|b| {
        for i in 0..n {
            let p = Vec2::new(unit(&mut seed) * 200.0 - 100.0, unit(&mut seed) * 200.0 - 100.0);
            let v = Vec2::new(unit(&mut seed) * 4.0 - 2.0, unit(&mut seed) * 4.0 - 2.0);
            let (id, kind) = match i % 3 {
                0 => (b.insert_rect(p, Vec2::splat(1.0)), ShapeKind::Rect),
                1 => (b.insert_circle(p, 0.5), ShapeKind::Circle),
                _ => (b.insert_point(p), ShapeKind::Point),
            };
            bodies.push((id, kind, p, v));
        }
    });
    let t_insert = t0.elapsed();

    let dt = 1.0 / 60.0;
    let t1 = Instant::now();
    let mut found = 0usize;
    for _ in 0..frames {
        grid.batch(|b| {
            for (id, kind, p, v) in bodies.iter_mut() {
                *p += *v * dt;
                let moved = match kind {
                    ShapeKind::Rect => b.update_rect(*id, *p, Vec2::splat(1.0)),
                    ShapeKind::Circle => b.update_circle(*id, *p, 0.5),
                    ShapeKind::Point => b.update_point(*id, *p),
                };
                if let Err(e) = moved {
                    eprintln!("{e}");
                }
            }
        });
        found += grid.query_circle(Vec2::ZERO, 10.0, &QueryFilter::none()).len();
        found += usize::from(grid.query_closest_to_point(Vec2::new(3.0, -7.0), &QueryFilter::none()).is_some());
        found += usize::from(grid.raycast(Vec2::splat(-90.0), Vec2::splat(180.0), &QueryFilter::none()).is_some());
    }
    let t_frames = t1.elapsed();

    let stats = grid.debug_stats();
    println!(
        "N={} insert={:?} frames={} total={:?} ({:?}/frame) found={} occupied_loose={}/{} tight_refs={} max_tight={}",
        n,
        t_insert,
        frames,
        t_frames,
        t_frames / frames,
        found,
        stats.occupied_loose_cells,
        stats.loose_cells,
        stats.tight_references,
        stats.max_tight_occupancy
    );
}
