//! Round-trip laws for the persistence layer: an area written and
//! re-read is the same area; a player saved through the background
//! writer and re-instantiated is the same character.

use std::path::PathBuf;

use server::db::{self, area_db, player_db, writer};
use server::world::types::*;
use server::world::{reset, World};

fn scratch(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mud-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn build_world() -> World {
    let mut world = World::new();
    world.areas.push(Area {
        filename: "midgaard".into(),
        name: "Midgaard".into(),
        builders: "None".into(),
        security: 3,
        lvnum: 3000,
        uvnum: 3099,
        recall: 3001,
        ..Area::default()
    });
    let area = AreaId(0);

    let mut r1 = Room {
        vnum: 3001,
        area,
        name: "Temple Square".into(),
        description: "The great square before the temple.\n".into(),
        room_flags: RoomFlags::empty(),
        sector_type: 1,
        exits: Default::default(),
        extra_descr: vec![ExtraDescr {
            keyword: "temple".into(),
            description: "Huge and marble.".into(),
        }],
        people: Vec::new(),
        contents: Vec::new(),
        scripts: Vec::new(),
    };
    let mut east = Exit::to_vnum(3002);
    east.keyword = "gate".into();
    east.rs_flags = ExitFlags::IS_DOOR | ExitFlags::CLOSED;
    east.flags = east.rs_flags;
    east.key_vnum = 3012;
    r1.exits[1] = Some(east);
    world.add_room(r1).unwrap();

    let mut r2 = Room {
        vnum: 3002,
        area,
        name: "Market Street".into(),
        description: "Busy stalls line the street.\n".into(),
        room_flags: RoomFlags::empty(),
        sector_type: 1,
        exits: Default::default(),
        extra_descr: Vec::new(),
        people: Vec::new(),
        contents: Vec::new(),
        scripts: Vec::new(),
    };
    let mut west = Exit::to_vnum(3001);
    west.keyword = "gate".into();
    west.rs_flags = ExitFlags::IS_DOOR | ExitFlags::CLOSED;
    west.flags = west.rs_flags;
    r2.exits[3] = Some(west);
    world.add_room(r2).unwrap();

    world
        .add_mob_proto(MobProto {
            vnum: 3000,
            area,
            player_name: "baker fat".into(),
            short_descr: "the fat baker".into(),
            long_descr: "A fat baker kneads dough here.\n".into(),
            description: "Covered in flour.".into(),
            act: ActFlags::IS_NPC | ActFlags::SENTINEL,
            affected_by: AffectFlags::empty(),
            alignment: 300,
            level: 12,
            hitroll: 3,
            ac: 2,
            hit_dice: (3, 8, 20),
            dam_dice: (1, 6, 2),
            gold: 120,
            sex: Sex::Male,
            shop: Some(Shop {
                keeper: 3000,
                buy_types: [19, 0, 0, 0, 0],
                profit_buy: 120,
                profit_sell: 80,
                open_hour: 6,
                close_hour: 20,
            }),
            special: Some("spec_shopkeeper".into()),
            scripts: vec![Script {
                trigger: 1,
                name: "greet".into(),
                code: "say Fresh bread!".into(),
                pattern: None,
                chance: 25,
            }],
            count: 0,
        })
        .unwrap();

    world
        .add_obj_proto(ObjProto {
            vnum: 3010,
            area,
            name: "bread loaf".into(),
            short_descr: "a loaf of bread".into(),
            description: "A loaf of bread sits here.".into(),
            item_type: ItemType::Food,
            extra_flags: ExtraFlags::empty(),
            wear_flags: WearFlags::TAKE,
            value: [5, 0, 0, 0],
            weight: 1,
            cost: 3,
            extra_descr: Vec::new(),
            affects: vec![ObjAffect {
                location: 18,
                modifier: 1,
                duration: -1,
            }],
            scripts: Vec::new(),
            count: 0,
        })
        .unwrap();

    world.areas[0].resets = vec![
        Reset::Mob {
            mob: 3000,
            limit: 1,
            room: 3001,
        },
        Reset::Give { obj: 3010 },
        Reset::Door {
            room: 3001,
            dir: 1,
            state: 1,
        },
    ];

    world
}

/// Load area -> save area -> load again is semantically identical for
/// every field the schema covers.
#[test]
fn world_round_trip() {
    let dir = scratch("world");
    let path = dir.join("midgaard.db");

    let world = build_world();
    area_db::save_area(&world, AreaId(0), &path).unwrap();

    // First reload.
    let mut loaded = World::new();
    let area_id = area_db::load_area(&mut loaded, &path, "midgaard").unwrap();
    area_db::link_area(&mut loaded, &path, area_id).unwrap();
    area_db::fix_exits(&mut loaded);

    assert_eq!(loaded.areas[0].name, "Midgaard");
    assert_eq!(loaded.areas[0].lvnum, 3000);
    assert_eq!(loaded.areas[0].recall, 3001);
    assert_eq!(loaded.rooms.len(), 2);
    assert_eq!(loaded.mob_protos.len(), 1);
    assert_eq!(loaded.obj_protos.len(), 1);
    assert_eq!(loaded.areas[0].resets, world.areas[0].resets);

    let baker = &loaded.mob_protos[0];
    assert_eq!(baker.player_name, "baker fat");
    assert_eq!(baker.hit_dice, (3, 8, 20));
    assert!(baker.shop.is_some());
    assert_eq!(baker.special.as_deref(), Some("spec_shopkeeper"));
    assert_eq!(baker.scripts.len(), 1);
    assert_eq!(baker.scripts[0].code, "say Fresh bread!");

    let bread = &loaded.obj_protos[0];
    assert_eq!(bread.item_type, ItemType::Food);
    assert_eq!(bread.affects.len(), 1);

    // Exits resolved and reciprocal after fix_exits.
    let r1 = loaded.get_room_index(3001).unwrap();
    let r2 = loaded.get_room_index(3002).unwrap();
    let east = loaded.room(r1).exits[1].as_ref().unwrap();
    assert_eq!(east.to_room, Some(r2));
    assert_eq!(east.key_vnum, 3012);
    assert!(east.rs_flags.contains(ExitFlags::CLOSED));
    let west = loaded.room(r2).exits[3].as_ref().unwrap();
    assert_eq!(west.to_room, Some(r1));

    // Second trip: save the loaded world and reload; still identical.
    let path2 = dir.join("midgaard2.db");
    area_db::save_area(&loaded, area_id, &path2).unwrap();
    let mut again = World::new();
    let again_id = area_db::load_area(&mut again, &path2, "midgaard2").unwrap();
    area_db::link_area(&mut again, &path2, again_id).unwrap();
    assert_eq!(again.areas[0].resets, loaded.areas[0].resets);
    assert_eq!(again.rooms.len(), loaded.rooms.len());
    assert_eq!(
        again.mob_protos[0].player_name,
        loaded.mob_protos[0].player_name
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

/// Prototype uniqueness: a second file claiming an existing vnum is
/// rejected, not doubled.
#[test]
fn duplicate_vnums_across_files_rejected() {
    let dir = scratch("dup");
    let world = build_world();
    area_db::save_area(&world, AreaId(0), &dir.join("a.db")).unwrap();
    area_db::save_area(&world, AreaId(0), &dir.join("b.db")).unwrap();

    let mut loaded = World::new();
    let ids = db::boot_load(&mut loaded, &dir).unwrap();
    assert_eq!(ids.len(), 2);
    // The second copy of every prototype was rejected.
    assert_eq!(loaded.rooms.len(), 2);
    assert_eq!(loaded.mob_protos.len(), 1);
    assert_eq!(loaded.obj_protos.len(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}

/// Booted worlds are populated exactly once before any player exists.
#[test]
fn boot_reset_populates_idempotently() {
    let dir = scratch("boot");
    let world = build_world();
    area_db::save_area(&world, AreaId(0), &dir.join("midgaard.db")).unwrap();

    let mut loaded = World::new();
    let ids = db::boot_load(&mut loaded, &dir).unwrap();
    for &id in &ids {
        reset::reset_area(&mut loaded, id);
    }
    let mobs_once = loaded.char_list.len();
    let objs_once = loaded.obj_list.len();
    assert_eq!(mobs_once, 1, "one baker spawns");
    assert_eq!(objs_once, 1, "the baker holds his bread");

    for &id in &ids {
        reset::reset_area(&mut loaded, id);
    }
    assert_eq!(loaded.char_list.len(), mobs_once);
    assert_eq!(loaded.obj_list.len(), objs_once);

    std::fs::remove_dir_all(&dir).unwrap();
}

/// Create player with a field vector -> save through the background
/// writer -> load -> every scalar, array, and nested object matches.
#[test]
fn player_round_trip_through_writer() {
    let dir = scratch("player");
    let path = dir.join("Testchar.db");

    let mut world = World::new();
    world.areas.push(Area::default());
    // Prototypes the inventory references.
    world
        .add_obj_proto(ObjProto {
            vnum: 100,
            area: AreaId(0),
            name: "chest oak".into(),
            short_descr: "an oak chest".into(),
            description: "An oak chest.".into(),
            item_type: ItemType::Container,
            extra_flags: ExtraFlags::empty(),
            wear_flags: WearFlags::TAKE,
            value: [200, 0, 0, 0],
            weight: 20,
            cost: 50,
            extra_descr: Vec::new(),
            affects: Vec::new(),
            scripts: Vec::new(),
            count: 0,
        })
        .unwrap();
    world
        .add_obj_proto(ObjProto {
            vnum: 101,
            area: AreaId(0),
            name: "ruby gem".into(),
            short_descr: "a ruby".into(),
            description: "A ruby glitters.".into(),
            item_type: ItemType::Treasure,
            extra_flags: ExtraFlags::GLOW,
            wear_flags: WearFlags::TAKE,
            value: [0, 0, 0, 0],
            weight: 1,
            cost: 900,
            extra_descr: Vec::new(),
            affects: Vec::new(),
            scripts: Vec::new(),
            count: 0,
        })
        .unwrap();

    let mut pcdata = PcData {
        pwd: core::encrypt::hash_password("Testchar", "sesame"),
        title: " the Tested".into(),
        prompt: "<%h/%H> ".into(),
        condition: [40, 41, 2],
        perm_stats: [13, 14, 15, 16, 17],
        mod_stats: [1, 0, -1, 0, 2],
        questsrun: 9,
        questtotal: 44,
        rank: 3,
        relrank: 1,
        mean_paradox: -12,
        plr_flags: PlayerFlags::ANSI | PlayerFlags::PREFER_GMCP,
        ..PcData::default()
    };
    pcdata.skills.insert("dodge".into(), 75);
    pcdata.skills.insert("hide".into(), 40);
    pcdata
        .arrays
        .insert("discipline_levels".into(), vec![3, 1, 4, 1, 5]);
    pcdata.aliases.push(("gb".into(), "get bread".into()));
    pcdata.boards.push(("general".into(), 123_456));

    let ch = Character {
        name: "Testchar".into(),
        sex: Sex::Female,
        level: 7,
        trust: 0,
        alignment: -200,
        hit: 88,
        max_hit: 120,
        mana: 55,
        max_mana: 90,
        move_points: 70,
        max_move: 100,
        gold: 4_321,
        exp: 98_765,
        practice: 4,
        hitroll: 5,
        damroll: 6,
        armor: 42,
        wimpy: 20,
        was_in_room: 3002,
        affects: vec![Affect {
            skill: "sanctuary".into(),
            duration: 12,
            location: 0,
            modifier: 0,
            bitvector: 0x10,
        }],
        pcdata: Some(pcdata),
        ..Character::default()
    };
    let ch_id = CharId(world.chars.insert(ch));
    world.char_list.push(ch_id);

    // Inventory: a chest with a ruby inside.
    let chest_proto = world.get_obj_index(100).unwrap();
    let ruby_proto = world.get_obj_index(101).unwrap();
    let chest = world.create_object(chest_proto, 0);
    let ruby = world.create_object(ruby_proto, 0);
    world.obj_to_char(chest, ch_id);
    world.obj_to_obj(ruby, chest);

    let snapshot = player_db::snapshot_player(&world, ch_id).unwrap();

    let mut saver = writer::spawn();
    saver.save_player(path.clone(), snapshot.clone());
    saver.wait_pending();
    saver.shutdown();

    let loaded = player_db::load_player(&path).unwrap().unwrap();
    assert_eq!(loaded, snapshot);

    // Instantiate into a fresh world and verify the tree rebuilt.
    let mut world2 = World::new();
    world2.areas.push(Area::default());
    for proto in &world.obj_protos {
        world2.add_obj_proto(proto.clone()).unwrap();
    }
    let ch2 = player_db::instantiate(&mut world2, &loaded);
    let restored = world2.ch(ch2).unwrap();
    assert_eq!(restored.name, "Testchar");
    assert_eq!(restored.level, 7);
    assert_eq!(restored.gold, 4_321);
    assert_eq!(restored.carrying.len(), 1);
    let chest2 = restored.carrying[0];
    assert_eq!(world2.obj(chest2).unwrap().vnum, 100);
    assert_eq!(world2.obj(chest2).unwrap().contains.len(), 1);
    let ruby2 = world2.obj(chest2).unwrap().contains[0];
    assert_eq!(world2.obj(ruby2).unwrap().vnum, 101);
    assert_eq!(
        world2.obj(ruby2).unwrap().holder,
        ObjHolder::Obj(chest2)
    );
    let pcdata2 = restored.pcdata.as_ref().unwrap();
    assert_eq!(pcdata2.skills.get("dodge"), Some(&75));
    assert_eq!(
        pcdata2.arrays.get("discipline_levels"),
        Some(&vec![3, 1, 4, 1, 5])
    );
    assert!(pcdata2.plr_flags.contains(PlayerFlags::PREFER_GMCP));
    assert_eq!(pcdata2.mean_paradox, -12);

    std::fs::remove_dir_all(&dir).unwrap();
}
