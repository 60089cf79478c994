//! Embedded relational persistence: one SQLite file per area, one per
//! player, plus the background write pipeline.

pub mod area_db;
pub mod player_db;
pub mod writer;

use std::path::Path;

use anyhow::Result;

use crate::world::types::AreaId;
use crate::world::World;

/// Boot-time world load: phase one over every area file, then phase two
/// links, then exit fixups. Panics (by design) on bad vnums while
/// `world.booting` is set so corrupt content never reaches players.
pub fn boot_load(world: &mut World, areas_dir: &Path) -> Result<Vec<AreaId>> {
    let stems = area_db::scan_areas(areas_dir)?;
    if stems.is_empty() {
        anyhow::bail!("no area .db files found in {}", areas_dir.display());
    }

    world.booting = true;
    let mut loaded = Vec::with_capacity(stems.len());
    for stem in &stems {
        let path = areas_dir.join(format!("{stem}.db"));
        let area_id = area_db::load_area(world, &path, stem)?;
        loaded.push(area_id);
    }
    for (stem, &area_id) in stems.iter().zip(&loaded) {
        let path = areas_dir.join(format!("{stem}.db"));
        area_db::link_area(world, &path, area_id)?;
    }
    area_db::fix_exits(world);
    world.booting = false;

    log::info!(
        "loaded {} areas, {} rooms, {} mobs, {} objects",
        world.areas.len(),
        world.rooms.len(),
        world.mob_protos.len(),
        world.obj_protos.len()
    );
    Ok(loaded)
}

/// Save every area back to its file. Failures are logged per area and
/// do not stop the sweep.
pub fn save_all_areas(world: &World, areas_dir: &Path) {
    for (idx, area) in world.areas.iter().enumerate() {
        let path = areas_dir.join(format!("{}.db", area.filename));
        if let Err(e) = area_db::save_area(world, AreaId(idx as u32), &path) {
            log::error!("saving area {} failed: {e:#}", area.name);
        }
    }
}
