//! Area aging and the declarative reset interpreter.
//!
//! Areas age once per area pulse. At age 15 the reset fires if players
//! are inside; an empty area is only marked `needs_reset` and repopulates
//! the moment the next player walks in. The boot pass resets every area
//! exactly once before the first connection is accepted.

use core::constants::MAX_LEVEL;

use crate::rng::{number_fuzzy, number_range};

use super::types::*;
use super::World;

/// Age at which an area resets.
const RESET_AGE: i32 = 15;

/// Areas whose players should hear the distant bell this pulse.
pub fn area_update(world: &mut World) -> Vec<AreaId> {
    let mut bells = Vec::new();

    for idx in 0..world.areas.len() {
        let area_id = AreaId(idx as u32);
        {
            let area = &mut world.areas[idx];
            area.age += 1;
            if area.age < 3 {
                continue;
            }
            if area.nplayer > 0 && area.age == RESET_AGE - 1 {
                bells.push(area_id);
            }
            if area.age < RESET_AGE {
                continue;
            }
        }

        let has_players = world.areas[idx].nplayer > 0;
        if has_players {
            reset_area(world, area_id);
            world.areas[idx].needs_reset = false;
        } else {
            world.areas[idx].needs_reset = true;
        }
        world.areas[idx].age = number_range(0, 3);
    }

    bells
}

/// Restore every door in the area to its reset state, mirroring the
/// reverse side, then interpret the reset list in order.
pub fn reset_area(world: &mut World, area_id: AreaId) {
    let rooms: Vec<RoomId> = world.areas[area_id.index()].rooms.clone();
    for room_id in &rooms {
        restore_doors(world, *room_id);
    }

    let resets: Vec<Reset> = world.areas[area_id.index()].resets.clone();

    // Reset context: the most recently spawned mob and most recently
    // created container, plus whether the last M actually spawned.
    let mut last_mob: Option<CharId> = None;
    let mut last_obj: Option<ObjId> = None;
    let mut last = false;
    let mut level = 0;

    for reset in resets {
        match reset {
            Reset::Mob { mob, limit, room } => {
                let Some(proto_id) = world.get_mob_index(mob) else {
                    log::warn!("reset M: bad mob vnum {mob}");
                    continue;
                };
                let Some(room_id) = world.get_room_index(room) else {
                    log::warn!("reset M: bad room vnum {room}");
                    continue;
                };
                if world.mob_protos[proto_id.index()].count >= limit {
                    last = false;
                    continue;
                }

                let mob_id = world.create_mobile(proto_id);

                // Mobs spawned into darkness see in it.
                if world
                    .room(room_id)
                    .room_flags
                    .contains(RoomFlags::DARK)
                {
                    if let Some(ch) = world.ch_mut(mob_id) {
                        ch.affected_by |= AffectFlags::INFRARED;
                    }
                }

                // The room after a pet shop holds its stock.
                let prev_vnum = world.room(room_id).vnum - 1;
                if world
                    .get_room_index(prev_vnum)
                    .is_some_and(|prev| {
                        world.room(prev).room_flags.contains(RoomFlags::PET_SHOP)
                    })
                {
                    if let Some(ch) = world.ch_mut(mob_id) {
                        ch.act |= ActFlags::PET;
                    }
                }

                world.char_to_room(mob_id, room_id);
                level = (world.ch(mob_id).map_or(0, |ch| ch.level) - 2)
                    .clamp(0, MAX_LEVEL);
                last_mob = Some(mob_id);
                last = true;
            }

            Reset::Obj { obj, room } => {
                let Some(proto_id) = world.get_obj_index(obj) else {
                    log::warn!("reset O: bad object vnum {obj}");
                    continue;
                };
                let Some(room_id) = world.get_room_index(room) else {
                    log::warn!("reset O: bad room vnum {room}");
                    continue;
                };
                let area_busy = world.areas[area_id.index()].nplayer > 0;
                let already = world
                    .count_obj_list(obj, &world.room(room_id).contents)
                    > 0;
                if area_busy || already {
                    continue;
                }
                let obj_id = world.create_object(proto_id, number_fuzzy(level));
                // Fresh floor loot is worthless until the economy touches it.
                if let Some(o) = world.obj_mut(obj_id) {
                    o.cost = 0;
                }
                world.obj_to_room(obj_id, room_id);
                last_obj = Some(obj_id);
            }

            Reset::Put { obj, container } => {
                let Some(proto_id) = world.get_obj_index(obj) else {
                    log::warn!("reset P: bad object vnum {obj}");
                    continue;
                };
                if world.get_obj_index(container).is_none() {
                    log::warn!("reset P: bad container vnum {container}");
                    continue;
                }
                let area_busy = world.areas[area_id.index()].nplayer > 0;
                let Some(container_id) = last_obj.filter(|&id| {
                    world.obj(id).is_some_and(|o| o.vnum == container)
                }) else {
                    continue;
                };
                let already = world
                    .obj(container_id)
                    .map_or(0, |c| world.count_obj_list(obj, &c.contains))
                    > 0;
                if area_busy || already {
                    continue;
                }
                let obj_id = world.create_object(proto_id, number_fuzzy(level));
                world.obj_to_obj(obj_id, container_id);
            }

            Reset::Give { obj } | Reset::Equip { obj, .. } => {
                let Some(proto_id) = world.get_obj_index(obj) else {
                    log::warn!("reset G/E: bad object vnum {obj}");
                    continue;
                };
                if !last {
                    continue;
                }
                let Some(mob_id) = last_mob else {
                    log::warn!("reset G/E: no spawned mob for vnum {obj}");
                    last = false;
                    continue;
                };

                let is_give = matches!(reset, Reset::Give { .. });
                let keeper = world
                    .ch(mob_id)
                    .and_then(|ch| ch.proto)
                    .is_some_and(|p| world.mob_protos[p.index()].shop.is_some());

                let obj_id = if keeper {
                    // Shop stock gets a level band characteristic of its
                    // item type rather than the room level.
                    let item_type =
                        world.obj_protos[proto_id.index()].item_type;
                    let olevel = match item_type {
                        ItemType::Pill | ItemType::Potion => number_range(0, 10),
                        ItemType::Scroll | ItemType::Armor => number_range(5, 15),
                        ItemType::Wand => number_range(10, 20),
                        ItemType::Staff => number_range(15, 25),
                        ItemType::Weapon if is_give => number_range(5, 15),
                        ItemType::Weapon => number_fuzzy(level),
                        _ => 0,
                    };
                    let id = world.create_object(proto_id, olevel);
                    if is_give {
                        if let Some(o) = world.obj_mut(id) {
                            o.extra_flags |= ExtraFlags::INVENTORY;
                        }
                    }
                    id
                } else {
                    world.create_object(proto_id, number_fuzzy(level))
                };

                world.obj_to_char(obj_id, mob_id);
                if let Reset::Equip { slot, .. } = reset {
                    world.equip_char(mob_id, obj_id, slot.max(0) as usize);
                }
                last = true;
                last_obj = Some(obj_id);
            }

            Reset::Door { room, dir, state } => {
                let Some(room_id) = world.get_room_index(room) else {
                    log::warn!("reset D: bad room vnum {room}");
                    continue;
                };
                let rs_flags = match state {
                    1 => ExitFlags::IS_DOOR | ExitFlags::CLOSED,
                    2 => ExitFlags::IS_DOOR | ExitFlags::CLOSED | ExitFlags::LOCKED,
                    _ => ExitFlags::IS_DOOR,
                };
                set_door(world, room_id, dir, rs_flags);
            }

            Reset::Randomize { room, count } => {
                let Some(room_id) = world.get_room_index(room) else {
                    log::warn!("reset R: bad room vnum {room}");
                    continue;
                };
                if count < 2 {
                    continue;
                }
                let exits = &mut world.rooms[room_id.index()].exits;
                for d0 in 0..count - 1 {
                    let d1 = number_range(d0 as i32, count as i32 - 1) as usize;
                    exits.swap(d0, d1);
                }
            }
        }
    }
}

/// Apply every exit's reset flags to its live state, nailing the other
/// side of each door too.
fn restore_doors(world: &mut World, room_id: RoomId) {
    for dir in 0..core::constants::MAX_DIR {
        let (rs_flags, other_side) = {
            let room = &world.rooms[room_id.index()];
            let Some(exit) = room.exits[dir].as_ref() else {
                continue;
            };
            (exit.rs_flags, exit.to_room)
        };
        if let Some(exit) = world.rooms[room_id.index()].exits[dir].as_mut() {
            exit.flags = rs_flags;
        }
        if let Some(to_room) = other_side {
            let rev = REV_DIR[dir];
            if let Some(rev_exit) = world.rooms[to_room.index()].exits[rev].as_mut() {
                rev_exit.flags = rev_exit.rs_flags;
            }
        }
    }
}

/// Set the reset door state on an exit and its reverse twin, then apply
/// it immediately.
fn set_door(world: &mut World, room_id: RoomId, dir: usize, rs_flags: ExitFlags) {
    let other = {
        let Some(exit) = world.rooms[room_id.index()].exits[dir].as_mut() else {
            return;
        };
        exit.rs_flags = rs_flags;
        exit.flags = rs_flags;
        exit.to_room
    };
    if let Some(to_room) = other {
        let rev = REV_DIR[dir];
        if let Some(rev_exit) = world.rooms[to_room.index()].exits[rev].as_mut() {
            rev_exit.rs_flags = rs_flags;
            rev_exit.flags = rs_flags;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_world;
    use super::*;

    fn seed_resets(world: &mut World) {
        world.areas[0].resets = vec![
            Reset::Mob {
                mob: 3000,
                limit: 2,
                room: 3001,
            },
            Reset::Give { obj: 3010 },
            Reset::Obj {
                obj: 3011,
                room: 3002,
            },
            Reset::Put {
                obj: 3010,
                container: 3011,
            },
        ];
    }

    #[test]
    fn reset_populates_mobs_to_cap() {
        let (mut world, area, r1, _) = test_world();
        seed_resets(&mut world);
        reset_area(&mut world, area);
        reset_area(&mut world, area);
        reset_area(&mut world, area);
        // Cap is 2: three resets never overshoot it.
        let proto = world.get_mob_index(3000).unwrap();
        assert_eq!(world.mob_protos[proto.index()].count, 2);
        assert_eq!(world.room(r1).people.len(), 2);
    }

    /// Resetting an empty area twice leaves the same contents as once.
    #[test]
    fn reset_is_idempotent_on_empty_area() {
        let (mut world, area, r1, r2) = test_world();
        seed_resets(&mut world);
        // One-instance cap so the mob population saturates in one pass.
        world.areas[0].resets[0] = Reset::Mob {
            mob: 3000,
            limit: 1,
            room: 3001,
        };
        reset_area(&mut world, area);
        let mobs_once = world.room(r1).people.len();
        let objs_once = world.room(r2).contents.len();
        let total_objs_once = world.obj_list.len();

        reset_area(&mut world, area);
        assert_eq!(world.room(r1).people.len(), mobs_once);
        assert_eq!(world.room(r2).contents.len(), objs_once);
        assert_eq!(world.obj_list.len(), total_objs_once);
    }

    #[test]
    fn obj_reset_skipped_with_players_present() {
        let (mut world, area, r1, r2) = test_world();
        world.areas[0].resets = vec![Reset::Obj {
            obj: 3011,
            room: 3002,
        }];
        let pc = CharId(world.chars.insert(Character {
            name: "Alice".into(),
            ..Character::default()
        }));
        world.char_list.push(pc);
        world.char_to_room(pc, r1);

        reset_area(&mut world, area);
        assert!(world.room(r2).contents.is_empty());

        // Mob resets still obey only the cap.
        world.areas[0].resets = vec![Reset::Mob {
            mob: 3000,
            limit: 1,
            room: 3001,
        }];
        reset_area(&mut world, area);
        let proto = world.get_mob_index(3000).unwrap();
        assert_eq!(world.mob_protos[proto.index()].count, 1);
    }

    #[test]
    fn give_requires_spawned_mob() {
        let (mut world, area, _, _) = test_world();
        // G with no preceding successful M does nothing.
        world.areas[0].resets = vec![Reset::Give { obj: 3010 }];
        reset_area(&mut world, area);
        assert!(world.obj_list.is_empty());
    }

    #[test]
    fn put_nests_into_last_container() {
        let (mut world, area, _, r2) = test_world();
        world.areas[0].resets = vec![
            Reset::Obj {
                obj: 3011,
                room: 3002,
            },
            Reset::Put {
                obj: 3010,
                container: 3011,
            },
        ];
        reset_area(&mut world, area);
        let bag = world.room(r2).contents[0];
        assert_eq!(world.obj(bag).unwrap().contains.len(), 1);
        let sword = world.obj(bag).unwrap().contains[0];
        assert_eq!(world.obj(sword).unwrap().vnum, 3010);
    }

    #[test]
    fn deferred_reset_fires_on_entry() {
        let (mut world, area, r1, _) = test_world();
        seed_resets(&mut world);
        world.areas[0].age = RESET_AGE;

        // Empty area: the periodic update only marks it.
        area_update(&mut world);
        assert!(world.areas[0].needs_reset);
        assert_eq!(world.room(r1).people.len(), 0);

        // First player entering triggers the reset.
        let pc = CharId(world.chars.insert(Character {
            name: "Alice".into(),
            ..Character::default()
        }));
        world.char_list.push(pc);
        world.char_to_room(pc, r1);
        assert!(!world.areas[0].needs_reset);
        // The PC plus the guard the deferred reset spawned.
        assert_eq!(world.room(r1).people.len(), 2);
    }

    #[test]
    fn bell_rings_one_tick_before_reset() {
        let (mut world, area, r1, _) = test_world();
        let pc = CharId(world.chars.insert(Character::default()));
        world.char_list.push(pc);
        world.char_to_room(pc, r1);

        world.areas[0].age = RESET_AGE - 2;
        let bells = area_update(&mut world);
        assert_eq!(bells, vec![area]);
    }

    #[test]
    fn door_reset_mirrors_both_sides() {
        let (mut world, area, r1, r2) = test_world();
        // Wire r1 <-> r2 east/west.
        let mut east = Exit::to_vnum(3002);
        east.to_room = Some(r2);
        east.flags |= ExitFlags::IS_DOOR;
        world.rooms[r1.index()].exits[1] = Some(east);
        let mut west = Exit::to_vnum(3001);
        west.to_room = Some(r1);
        west.flags |= ExitFlags::IS_DOOR;
        world.rooms[r2.index()].exits[3] = Some(west);

        world.areas[0].resets = vec![Reset::Door {
            room: 3001,
            dir: 1,
            state: 2,
        }];
        reset_area(&mut world, area);

        let near = world.room(r1).exits[1].as_ref().unwrap();
        let far = world.room(r2).exits[3].as_ref().unwrap();
        assert!(near.flags.contains(ExitFlags::CLOSED | ExitFlags::LOCKED));
        assert!(far.flags.contains(ExitFlags::CLOSED | ExitFlags::LOCKED));
    }
}
