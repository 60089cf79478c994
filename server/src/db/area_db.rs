//! Per-area SQLite files: load, cross-area link, and save.
//!
//! Loading is two-phase. Phase one reads each area's own entities
//! (mobiles, objects, rooms and their children) with exits carrying
//! destination vnums only. Phase two, after every area is in memory,
//! loads resets, shops, specials and scripts (which may reference any
//! vnum anywhere) and `fix_exits` resolves destination ids and mirrors
//! door state.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Transaction};

use crate::world::types::*;
use crate::world::World;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS area (
  name        TEXT NOT NULL,
  builders    TEXT DEFAULT '',
  lvnum       INTEGER NOT NULL,
  uvnum       INTEGER NOT NULL,
  security    INTEGER DEFAULT 3,
  recall      INTEGER DEFAULT 0,
  area_flags  INTEGER DEFAULT 0,
  is_hidden   INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS mobiles (
  vnum        INTEGER PRIMARY KEY,
  player_name TEXT, short_descr TEXT, long_descr TEXT, description TEXT,
  act         INTEGER, affected_by INTEGER, alignment INTEGER,
  level       INTEGER, hitroll INTEGER, ac INTEGER,
  hitnodice   INTEGER, hitsizedice INTEGER, hitplus INTEGER,
  damnodice   INTEGER, damsizedice INTEGER, damplus INTEGER,
  gold        INTEGER, sex INTEGER
);
CREATE TABLE IF NOT EXISTS objects (
  vnum        INTEGER PRIMARY KEY,
  name TEXT, short_descr TEXT, description TEXT,
  item_type INTEGER, extra_flags INTEGER, wear_flags INTEGER,
  value0 INTEGER, value1 INTEGER, value2 INTEGER, value3 INTEGER,
  weight INTEGER, cost INTEGER
);
CREATE TABLE IF NOT EXISTS object_affects (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  obj_vnum   INTEGER NOT NULL REFERENCES objects(vnum),
  location   INTEGER NOT NULL,
  modifier   INTEGER NOT NULL,
  sort_order INTEGER DEFAULT 0
);
CREATE TABLE IF NOT EXISTS extra_descriptions (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  owner_type TEXT NOT NULL,
  owner_vnum INTEGER NOT NULL,
  keyword    TEXT NOT NULL,
  description TEXT NOT NULL,
  sort_order INTEGER DEFAULT 0
);
CREATE TABLE IF NOT EXISTS rooms (
  vnum        INTEGER PRIMARY KEY,
  name TEXT, description TEXT,
  room_flags INTEGER, sector_type INTEGER
);
CREATE TABLE IF NOT EXISTS exits (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  room_vnum   INTEGER NOT NULL REFERENCES rooms(vnum),
  direction   INTEGER NOT NULL,
  description TEXT DEFAULT '', keyword TEXT DEFAULT '',
  exit_info   INTEGER DEFAULT 0,
  key_vnum    INTEGER DEFAULT -1,
  to_vnum     INTEGER DEFAULT 0
);
CREATE TABLE IF NOT EXISTS resets (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  command    TEXT NOT NULL,
  arg1 INTEGER, arg2 INTEGER, arg3 INTEGER,
  sort_order INTEGER DEFAULT 0
);
CREATE TABLE IF NOT EXISTS shops (
  keeper_vnum INTEGER PRIMARY KEY,
  buy_type0 INTEGER, buy_type1 INTEGER, buy_type2 INTEGER,
  buy_type3 INTEGER, buy_type4 INTEGER,
  profit_buy INTEGER, profit_sell INTEGER,
  open_hour INTEGER, close_hour INTEGER
);
CREATE TABLE IF NOT EXISTS specials (
  mob_vnum      INTEGER PRIMARY KEY,
  spec_fun_name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS scripts (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  owner_type  TEXT NOT NULL,
  owner_vnum  INTEGER NOT NULL,
  trigger     INTEGER NOT NULL,
  name        TEXT NOT NULL DEFAULT '',
  code        TEXT NOT NULL,
  pattern     TEXT DEFAULT NULL,
  chance      INTEGER DEFAULT 0,
  sort_order  INTEGER DEFAULT 0
);
";

pub fn open_area_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("opening area db {}", path.display()))?;
    conn.execute_batch(SCHEMA_SQL).context("area schema")?;
    Ok(conn)
}

/// List area file stems (`midgaard` for `midgaard.db`), sorted.
pub fn scan_areas(dir: &Path) -> Result<Vec<String>> {
    let mut stems = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("scanning {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "db") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

/// Phase one: read one area file into the world. Exits keep their
/// destination vnums until [`fix_exits`].
pub fn load_area(world: &mut World, path: &Path, stem: &str) -> Result<AreaId> {
    let conn = open_area_db(path)?;

    let area = conn
        .query_row(
            "SELECT name, builders, lvnum, uvnum, security, recall, area_flags, is_hidden
             FROM area LIMIT 1",
            [],
            |row| {
                Ok(Area {
                    filename: stem.to_string(),
                    name: row.get(0)?,
                    builders: row.get(1)?,
                    lvnum: row.get(2)?,
                    uvnum: row.get(3)?,
                    security: row.get(4)?,
                    recall: row.get(5)?,
                    area_flags: AreaFlags::from_bits_retain(row.get::<_, i64>(6)? as u32),
                    is_hidden: row.get::<_, i64>(7)? != 0,
                    ..Area::default()
                })
            },
        )
        .with_context(|| format!("area row missing in {}", path.display()))?;

    let area_id = AreaId(world.areas.len() as u32);
    log::info!(
        "loading area '{}' [{}..{}] from {}",
        area.name,
        area.lvnum,
        area.uvnum,
        path.display()
    );
    world.areas.push(area);

    load_mobiles(world, &conn, area_id)?;
    load_objects(world, &conn, area_id)?;
    load_rooms(world, &conn, area_id)?;

    Ok(area_id)
}

fn load_mobiles(world: &mut World, conn: &Connection, area_id: AreaId) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT vnum, player_name, short_descr, long_descr, description,
                act, affected_by, alignment, level, hitroll, ac,
                hitnodice, hitsizedice, hitplus, damnodice, damsizedice, damplus,
                gold, sex
         FROM mobiles ORDER BY vnum",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(MobProto {
            vnum: row.get(0)?,
            area: area_id,
            player_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            short_descr: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            long_descr: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            description: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            act: ActFlags::from_bits_retain(row.get::<_, i64>(5)? as u32),
            affected_by: AffectFlags::from_bits_retain(row.get::<_, i64>(6)? as u32),
            alignment: row.get(7)?,
            level: row.get(8)?,
            hitroll: row.get(9)?,
            ac: row.get(10)?,
            hit_dice: (row.get(11)?, row.get(12)?, row.get(13)?),
            dam_dice: (row.get(14)?, row.get(15)?, row.get(16)?),
            gold: row.get(17)?,
            sex: Sex::from_i32(row.get(18)?),
            shop: None,
            special: None,
            scripts: Vec::new(),
            count: 0,
        })
    })?;
    for proto in rows {
        world.add_mob_proto(proto?);
    }
    Ok(())
}

fn load_objects(world: &mut World, conn: &Connection, area_id: AreaId) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT vnum, name, short_descr, description,
                item_type, extra_flags, wear_flags,
                value0, value1, value2, value3, weight, cost
         FROM objects ORDER BY vnum",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ObjProto {
            vnum: row.get(0)?,
            area: area_id,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            short_descr: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            item_type: ItemType::from_i32(row.get(4)?),
            extra_flags: ExtraFlags::from_bits_retain(row.get::<_, i64>(5)? as u32),
            wear_flags: WearFlags::from_bits_retain(row.get::<_, i64>(6)? as u32),
            value: [row.get(7)?, row.get(8)?, row.get(9)?, row.get(10)?],
            weight: row.get(11)?,
            cost: row.get(12)?,
            extra_descr: Vec::new(),
            affects: Vec::new(),
            scripts: Vec::new(),
            count: 0,
        })
    })?;
    for proto in rows {
        world.add_obj_proto(proto?);
    }

    // Passive affect entries.
    let mut stmt = conn.prepare(
        "SELECT obj_vnum, location, modifier FROM object_affects ORDER BY sort_order, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, Vnum>(0)?,
            ObjAffect {
                location: row.get(1)?,
                modifier: row.get(2)?,
                duration: -1,
            },
        ))
    })?;
    for row in rows {
        let (vnum, affect) = row?;
        match world.obj_index.get(&vnum).copied() {
            Some(id) => world.obj_protos[id.index()].affects.push(affect),
            None => log::warn!("object_affects row for unknown vnum {vnum}"),
        }
    }

    load_extra_descriptions(world, conn, "object")?;
    Ok(())
}

fn load_rooms(world: &mut World, conn: &Connection, area_id: AreaId) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT vnum, name, description, room_flags, sector_type FROM rooms ORDER BY vnum",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Room {
            vnum: row.get(0)?,
            area: area_id,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            room_flags: RoomFlags::from_bits_retain(row.get::<_, i64>(3)? as u32),
            sector_type: row.get(4)?,
            exits: Default::default(),
            extra_descr: Vec::new(),
            people: Vec::new(),
            contents: Vec::new(),
            scripts: Vec::new(),
        })
    })?;
    for room in rows {
        world.add_room(room?);
    }

    let mut stmt = conn.prepare(
        "SELECT room_vnum, direction, description, keyword, exit_info, key_vnum, to_vnum
         FROM exits ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, Vnum>(0)?,
            row.get::<_, i64>(1)? as usize,
            Exit {
                description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                keyword: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                flags: ExitFlags::from_bits_retain(row.get::<_, i64>(4)? as u32),
                rs_flags: ExitFlags::from_bits_retain(row.get::<_, i64>(4)? as u32),
                key_vnum: row.get(5)?,
                to_vnum: row.get(6)?,
                to_room: None,
            },
        ))
    })?;
    for row in rows {
        let (room_vnum, direction, exit) = row?;
        if direction >= core::constants::MAX_DIR {
            log::warn!("exit with bad direction {direction} in room {room_vnum}");
            continue;
        }
        match world.room_index.get(&room_vnum).copied() {
            Some(id) => world.rooms[id.index()].exits[direction] = Some(exit),
            None => log::warn!("exit row for unknown room vnum {room_vnum}"),
        }
    }

    load_extra_descriptions(world, conn, "room")?;
    Ok(())
}

fn load_extra_descriptions(world: &mut World, conn: &Connection, owner_type: &str) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT owner_vnum, keyword, description FROM extra_descriptions
         WHERE owner_type = ?1 ORDER BY sort_order, id",
    )?;
    let rows = stmt.query_map([owner_type], |row| {
        Ok((
            row.get::<_, Vnum>(0)?,
            ExtraDescr {
                keyword: row.get(1)?,
                description: row.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (vnum, ed) = row?;
        match owner_type {
            "room" => match world.room_index.get(&vnum).copied() {
                Some(id) => world.rooms[id.index()].extra_descr.push(ed),
                None => log::warn!("extra description for unknown room {vnum}"),
            },
            _ => match world.obj_index.get(&vnum).copied() {
                Some(id) => world.obj_protos[id.index()].extra_descr.push(ed),
                None => log::warn!("extra description for unknown object {vnum}"),
            },
        }
    }
    Ok(())
}

/// Phase two: resets, shops, specials, scripts. Any vnum from any area
/// may appear here, so this runs only after every area loaded.
pub fn link_area(world: &mut World, path: &Path, area_id: AreaId) -> Result<()> {
    let conn = open_area_db(path)?;

    let mut stmt =
        conn.prepare("SELECT command, arg1, arg2, arg3 FROM resets ORDER BY sort_order, id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i32>(1)?,
            row.get::<_, i32>(2)?,
            row.get::<_, i32>(3)?,
        ))
    })?;
    for row in rows {
        let (command, a1, a2, a3) = row?;
        match Reset::from_row(&command, a1, a2, a3) {
            Some(reset) => world.areas[area_id.index()].resets.push(reset),
            None => log::warn!(
                "unknown reset command {command:?} in {}",
                path.display()
            ),
        }
    }

    let mut stmt = conn.prepare(
        "SELECT keeper_vnum, buy_type0, buy_type1, buy_type2, buy_type3, buy_type4,
                profit_buy, profit_sell, open_hour, close_hour
         FROM shops",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Shop {
            keeper: row.get(0)?,
            buy_types: [
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ],
            profit_buy: row.get(6)?,
            profit_sell: row.get(7)?,
            open_hour: row.get(8)?,
            close_hour: row.get(9)?,
        })
    })?;
    for shop in rows {
        let shop = shop?;
        match world.mob_index.get(&shop.keeper).copied() {
            Some(id) => world.mob_protos[id.index()].shop = Some(shop),
            None => log::warn!("shop for unknown keeper vnum {}", shop.keeper),
        }
    }

    let mut stmt = conn.prepare("SELECT mob_vnum, spec_fun_name FROM specials")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, Vnum>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (vnum, name) = row?;
        match world.mob_index.get(&vnum).copied() {
            Some(id) => world.mob_protos[id.index()].special = Some(name),
            None => log::warn!("special for unknown mob vnum {vnum}"),
        }
    }

    let mut stmt = conn.prepare(
        "SELECT owner_type, owner_vnum, trigger, name, code, pattern, chance
         FROM scripts ORDER BY sort_order, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Vnum>(1)?,
            Script {
                trigger: row.get(2)?,
                name: row.get(3)?,
                code: row.get(4)?,
                pattern: row.get(5)?,
                chance: row.get(6)?,
            },
        ))
    })?;
    for row in rows {
        let (owner_type, vnum, script) = row?;
        match owner_type.as_str() {
            "room" => match world.room_index.get(&vnum).copied() {
                Some(id) => world.rooms[id.index()].scripts.push(script),
                None => log::warn!("script for unknown room {vnum}"),
            },
            "mob" => match world.mob_index.get(&vnum).copied() {
                Some(id) => world.mob_protos[id.index()].scripts.push(script),
                None => log::warn!("script for unknown mob {vnum}"),
            },
            "object" => match world.obj_index.get(&vnum).copied() {
                Some(id) => world.obj_protos[id.index()].scripts.push(script),
                None => log::warn!("script for unknown object {vnum}"),
            },
            other => log::warn!("script with unknown owner type {other:?}"),
        }
    }

    Ok(())
}

/// Resolve every exit's destination vnum to a room id, flag roomless
/// dead ends, and log broken reciprocity.
pub fn fix_exits(world: &mut World) {
    for idx in 0..world.rooms.len() {
        let mut any_exit = false;
        for dir in 0..core::constants::MAX_DIR {
            let to_vnum = match world.rooms[idx].exits[dir].as_ref() {
                Some(exit) => {
                    any_exit = true;
                    exit.to_vnum
                }
                None => continue,
            };
            // During boot a dangling destination aborts the process;
            // broken content must never reach players.
            let target = if to_vnum > 0 {
                let found = world.get_room_index(to_vnum);
                if found.is_none() {
                    log::warn!(
                        "room {} exit {} leads to missing vnum {}",
                        world.rooms[idx].vnum,
                        DIR_NAMES[dir],
                        to_vnum
                    );
                }
                found
            } else {
                None
            };
            if let Some(exit) = world.rooms[idx].exits[dir].as_mut() {
                exit.to_room = target;
            }
        }
        if !any_exit {
            world.rooms[idx].room_flags |= RoomFlags::NO_MOB;
        }
    }

    // Reciprocity check; one-way exits are content, but note them.
    for idx in 0..world.rooms.len() {
        for dir in 0..core::constants::MAX_DIR {
            let Some(exit) = world.rooms[idx].exits[dir].as_ref() else {
                continue;
            };
            let Some(to_room) = exit.to_room else {
                continue;
            };
            let rev = REV_DIR[dir];
            if let Some(rev_exit) = world.rooms[to_room.index()].exits[rev].as_ref() {
                if rev_exit.to_room.is_some()
                    && rev_exit.to_room != Some(RoomId(idx as u32))
                {
                    log::debug!(
                        "non-reciprocal exit: {} {} -> {} {}",
                        world.rooms[idx].vnum,
                        DIR_NAMES[dir],
                        world.rooms[to_room.index()].vnum,
                        DIR_NAMES[rev]
                    );
                }
            }
        }
    }
}

/// Save one area in a single transaction: wipe the child tables in
/// foreign-key-safe order, then re-insert everything from memory. A
/// crash mid-save leaves the previous contents intact.
pub fn save_area(world: &World, area_id: AreaId, path: &Path) -> Result<()> {
    let mut conn = open_area_db(path)?;
    let tx = conn.transaction()?;

    for table in [
        "scripts",
        "specials",
        "shops",
        "resets",
        "exits",
        "extra_descriptions",
        "object_affects",
        "rooms",
        "objects",
        "mobiles",
        "area",
    ] {
        tx.execute(&format!("DELETE FROM {table}"), [])?;
    }

    let area = &world.areas[area_id.index()];
    tx.execute(
        "INSERT INTO area (name, builders, lvnum, uvnum, security, recall, area_flags, is_hidden)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            area.name,
            area.builders,
            area.lvnum,
            area.uvnum,
            area.security,
            area.recall,
            area.area_flags.bits() as i64,
            area.is_hidden as i64,
        ],
    )?;

    save_mobiles(world, &tx, area_id)?;
    save_objects(world, &tx, area_id)?;
    save_rooms(world, &tx, area_id)?;

    for (order, reset) in area.resets.iter().enumerate() {
        let (command, a1, a2, a3) = reset.to_row();
        tx.execute(
            "INSERT INTO resets (command, arg1, arg2, arg3, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![command.to_string(), a1, a2, a3, order as i64],
        )?;
    }

    tx.commit().context("committing area save")
}

fn save_mobiles(world: &World, tx: &Transaction, area_id: AreaId) -> Result<()> {
    let mut mob_stmt = tx.prepare(
        "INSERT INTO mobiles (vnum, player_name, short_descr, long_descr, description,
                              act, affected_by, alignment, level, hitroll, ac,
                              hitnodice, hitsizedice, hitplus, damnodice, damsizedice, damplus,
                              gold, sex)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
    )?;
    let mut shop_stmt = tx.prepare(
        "INSERT INTO shops (keeper_vnum, buy_type0, buy_type1, buy_type2, buy_type3, buy_type4,
                            profit_buy, profit_sell, open_hour, close_hour)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    let mut special_stmt =
        tx.prepare("INSERT INTO specials (mob_vnum, spec_fun_name) VALUES (?1, ?2)")?;
    let mut script_stmt = tx.prepare(
        "INSERT INTO scripts (owner_type, owner_vnum, trigger, name, code, pattern, chance, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    for proto in world.mob_protos.iter().filter(|p| p.area == area_id) {
        mob_stmt.execute(params![
            proto.vnum,
            proto.player_name,
            proto.short_descr,
            proto.long_descr,
            proto.description,
            proto.act.bits() as i64,
            proto.affected_by.bits() as i64,
            proto.alignment,
            proto.level,
            proto.hitroll,
            proto.ac,
            proto.hit_dice.0,
            proto.hit_dice.1,
            proto.hit_dice.2,
            proto.dam_dice.0,
            proto.dam_dice.1,
            proto.dam_dice.2,
            proto.gold,
            proto.sex as i32,
        ])?;
        if let Some(shop) = &proto.shop {
            shop_stmt.execute(params![
                shop.keeper,
                shop.buy_types[0],
                shop.buy_types[1],
                shop.buy_types[2],
                shop.buy_types[3],
                shop.buy_types[4],
                shop.profit_buy,
                shop.profit_sell,
                shop.open_hour,
                shop.close_hour,
            ])?;
        }
        if let Some(special) = &proto.special {
            special_stmt.execute(params![proto.vnum, special])?;
        }
        for (order, script) in proto.scripts.iter().enumerate() {
            script_stmt.execute(params![
                "mob",
                proto.vnum,
                script.trigger,
                script.name,
                script.code,
                script.pattern,
                script.chance,
                order as i64,
            ])?;
        }
    }
    Ok(())
}

fn save_objects(world: &World, tx: &Transaction, area_id: AreaId) -> Result<()> {
    let mut obj_stmt = tx.prepare(
        "INSERT INTO objects (vnum, name, short_descr, description,
                              item_type, extra_flags, wear_flags,
                              value0, value1, value2, value3, weight, cost)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    let mut affect_stmt = tx.prepare(
        "INSERT INTO object_affects (obj_vnum, location, modifier, sort_order)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut ed_stmt = tx.prepare(
        "INSERT INTO extra_descriptions (owner_type, owner_vnum, keyword, description, sort_order)
         VALUES ('object', ?1, ?2, ?3, ?4)",
    )?;
    let mut script_stmt = tx.prepare(
        "INSERT INTO scripts (owner_type, owner_vnum, trigger, name, code, pattern, chance, sort_order)
         VALUES ('object', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    for proto in world.obj_protos.iter().filter(|p| p.area == area_id) {
        obj_stmt.execute(params![
            proto.vnum,
            proto.name,
            proto.short_descr,
            proto.description,
            proto.item_type as i32,
            proto.extra_flags.bits() as i64,
            proto.wear_flags.bits() as i64,
            proto.value[0],
            proto.value[1],
            proto.value[2],
            proto.value[3],
            proto.weight,
            proto.cost,
        ])?;
        for (order, affect) in proto.affects.iter().enumerate() {
            affect_stmt.execute(params![
                proto.vnum,
                affect.location,
                affect.modifier,
                order as i64
            ])?;
        }
        for (order, ed) in proto.extra_descr.iter().enumerate() {
            ed_stmt.execute(params![proto.vnum, ed.keyword, ed.description, order as i64])?;
        }
        for (order, script) in proto.scripts.iter().enumerate() {
            script_stmt.execute(params![
                proto.vnum,
                script.trigger,
                script.name,
                script.code,
                script.pattern,
                script.chance,
                order as i64,
            ])?;
        }
    }
    Ok(())
}

fn save_rooms(world: &World, tx: &Transaction, area_id: AreaId) -> Result<()> {
    let mut room_stmt = tx.prepare(
        "INSERT INTO rooms (vnum, name, description, room_flags, sector_type)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut exit_stmt = tx.prepare(
        "INSERT INTO exits (room_vnum, direction, description, keyword, exit_info, key_vnum, to_vnum)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut ed_stmt = tx.prepare(
        "INSERT INTO extra_descriptions (owner_type, owner_vnum, keyword, description, sort_order)
         VALUES ('room', ?1, ?2, ?3, ?4)",
    )?;
    let mut script_stmt = tx.prepare(
        "INSERT INTO scripts (owner_type, owner_vnum, trigger, name, code, pattern, chance, sort_order)
         VALUES ('room', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    for &room_id in &world.areas[area_id.index()].rooms {
        let room = &world.rooms[room_id.index()];
        room_stmt.execute(params![
            room.vnum,
            room.name,
            room.description,
            room.room_flags.bits() as i64,
            room.sector_type,
        ])?;
        for (dir, exit) in room.exits.iter().enumerate() {
            let Some(exit) = exit else { continue };
            exit_stmt.execute(params![
                room.vnum,
                dir as i64,
                exit.description,
                exit.keyword,
                exit.rs_flags.bits() as i64,
                exit.key_vnum,
                exit.to_vnum,
            ])?;
        }
        for (order, ed) in room.extra_descr.iter().enumerate() {
            ed_stmt.execute(params![room.vnum, ed.keyword, ed.description, order as i64])?;
        }
        for (order, script) in room.scripts.iter().enumerate() {
            script_stmt.execute(params![
                room.vnum,
                script.trigger,
                script.name,
                script.code,
                script.pattern,
                script.chance,
                order as i64,
            ])?;
        }
    }
    Ok(())
}
