use glam::{UVec2, Vec2};
use loosegrid::*;

fn main() {
    env_logger::init();
    let mut grid = match Grid::new(GridConfig::new(Vec2::ZERO, UVec2::new(16, 16), 1.0)) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let wall = grid.insert_rect(Vec2::new(6.0, 4.0), Vec2::new(1.0, 6.0));
    let ball = grid.insert_circle(Vec2::new(4.0, 4.0), 0.5);
    let marker = grid.insert_point(Vec2::new(10.0, 4.0));
    println!("wall={wall} ball={ball} marker={marker}");

    let origin = Vec2::new(0.0, 4.0);
    let dir = Vec2::new(12.0, 0.0);
    for (label, filter) in [
        ("all", QueryFilter::none()),
        ("skip ball", QueryFilter::exclude([ball])),
        ("marker only", QueryFilter::include([marker])),
    ] {
        match grid.raycast(origin, dir, &filter) {
            Some(hit) => println!(
                "{label}: hit {} at t={:.3} d={:.3} n=({:.2},{:.2})",
                hit.entity_id, hit.toi, hit.distance, hit.normal.x, hit.normal.y
            ),
            None => println!("{label}: no hit"),
        }
    }
}
