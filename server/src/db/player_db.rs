//! Per-player SQLite files.
//!
//! A save is built on the scheduler thread as an owned [`PlayerSave`]
//! snapshot (the atomic image of everything persisted), then handed to
//! the background writer which owns the connection and performs one
//! transaction per save. Loading reverses the trip; the inventory table
//! is flat with a `nest` column and a per-level stack rebuilds the
//! containment tree.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::world::types::*;
use crate::world::World;

pub const SCHEMA_VERSION: i64 = 1;

const PLAYER_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS meta (
  key   TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS player (
  name           TEXT NOT NULL,
  password       TEXT NOT NULL DEFAULT '',
  title          TEXT NOT NULL DEFAULT '',
  short_descr    TEXT NOT NULL DEFAULT '',
  long_descr     TEXT NOT NULL DEFAULT '',
  description    TEXT NOT NULL DEFAULT '',
  prompt         TEXT NOT NULL DEFAULT '',
  cprompt        TEXT NOT NULL DEFAULT '',
  createtime     TEXT NOT NULL DEFAULT '',
  lasttime       TEXT NOT NULL DEFAULT '',
  lasthost       TEXT NOT NULL DEFAULT '',
  sex            INTEGER NOT NULL DEFAULT 0,
  level          INTEGER NOT NULL DEFAULT 0,
  trust          INTEGER NOT NULL DEFAULT 0,
  played         INTEGER NOT NULL DEFAULT 0,
  room_vnum      INTEGER NOT NULL DEFAULT 3001,
  gold           INTEGER NOT NULL DEFAULT 0,
  exp            INTEGER NOT NULL DEFAULT 0,
  act            INTEGER NOT NULL DEFAULT 0,
  plr_flags      INTEGER NOT NULL DEFAULT 0,
  affected_by    INTEGER NOT NULL DEFAULT 0,
  position       INTEGER NOT NULL DEFAULT 8,
  practice       INTEGER NOT NULL DEFAULT 0,
  alignment      INTEGER NOT NULL DEFAULT 0,
  hitroll        INTEGER NOT NULL DEFAULT 0,
  damroll        INTEGER NOT NULL DEFAULT 0,
  armor          INTEGER NOT NULL DEFAULT 100,
  wimpy          INTEGER NOT NULL DEFAULT 0,
  hit            INTEGER NOT NULL DEFAULT 0,
  max_hit        INTEGER NOT NULL DEFAULT 0,
  mana           INTEGER NOT NULL DEFAULT 0,
  max_mana       INTEGER NOT NULL DEFAULT 0,
  move           INTEGER NOT NULL DEFAULT 0,
  max_move       INTEGER NOT NULL DEFAULT 0,
  cond_full      INTEGER NOT NULL DEFAULT 48,
  cond_thirst    INTEGER NOT NULL DEFAULT 48,
  cond_drunk     INTEGER NOT NULL DEFAULT 0,
  perm_str       INTEGER NOT NULL DEFAULT 13,
  perm_int       INTEGER NOT NULL DEFAULT 13,
  perm_wis       INTEGER NOT NULL DEFAULT 13,
  perm_dex       INTEGER NOT NULL DEFAULT 13,
  perm_con       INTEGER NOT NULL DEFAULT 13,
  mod_str        INTEGER NOT NULL DEFAULT 0,
  mod_int        INTEGER NOT NULL DEFAULT 0,
  mod_wis        INTEGER NOT NULL DEFAULT 0,
  mod_dex        INTEGER NOT NULL DEFAULT 0,
  mod_con        INTEGER NOT NULL DEFAULT 0,
  questsrun      INTEGER NOT NULL DEFAULT 0,
  questtotal     INTEGER NOT NULL DEFAULT 0,
  rank           INTEGER NOT NULL DEFAULT 0,
  relrank        INTEGER NOT NULL DEFAULT 0,
  mean_paradox   INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS player_arrays (
  name TEXT PRIMARY KEY,
  data TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS skills (
  skill_name TEXT PRIMARY KEY,
  value      INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS aliases (
  id      INTEGER PRIMARY KEY AUTOINCREMENT,
  short_n TEXT NOT NULL,
  long_n  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS affects (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  skill_name TEXT NOT NULL,
  duration   INTEGER NOT NULL,
  modifier   INTEGER NOT NULL,
  location   INTEGER NOT NULL,
  bitvector  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS boards (
  board_name TEXT PRIMARY KEY,
  last_note  INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS objects (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  nest         INTEGER NOT NULL DEFAULT 0,
  vnum         INTEGER NOT NULL,
  name         TEXT NOT NULL DEFAULT '',
  short_descr  TEXT NOT NULL DEFAULT '',
  description  TEXT NOT NULL DEFAULT '',
  extra_flags  INTEGER NOT NULL DEFAULT 0,
  wear_flags   INTEGER NOT NULL DEFAULT 0,
  wear_loc     INTEGER NOT NULL DEFAULT -1,
  item_type    INTEGER NOT NULL DEFAULT 0,
  weight       INTEGER NOT NULL DEFAULT 0,
  condition    INTEGER NOT NULL DEFAULT 100,
  timer        INTEGER NOT NULL DEFAULT 0,
  level        INTEGER NOT NULL DEFAULT 0,
  cost         INTEGER NOT NULL DEFAULT 0,
  value_0      INTEGER NOT NULL DEFAULT 0,
  value_1      INTEGER NOT NULL DEFAULT 0,
  value_2      INTEGER NOT NULL DEFAULT 0,
  value_3      INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS obj_affects (
  id       INTEGER PRIMARY KEY AUTOINCREMENT,
  obj_id   INTEGER NOT NULL,
  duration INTEGER NOT NULL,
  modifier INTEGER NOT NULL,
  location INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS obj_extra_descr (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  obj_id      INTEGER NOT NULL,
  keyword     TEXT NOT NULL,
  description TEXT NOT NULL
);
";

/// One row of the flat inventory table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjSave {
    pub nest: i32,
    pub vnum: Vnum,
    pub name: String,
    pub short_descr: String,
    pub description: String,
    pub extra_flags: u32,
    pub wear_flags: u32,
    pub wear_loc: i32,
    pub item_type: i32,
    pub weight: i32,
    pub condition: i32,
    pub timer: i32,
    pub level: i32,
    pub cost: i32,
    pub value: [i32; 4],
    pub affects: Vec<(i32, i32, i32)>,
    pub extra_descr: Vec<(String, String)>,
}

/// The full persisted image of one player, built in one pass on the
/// scheduler thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSave {
    pub name: String,
    pub password: String,
    pub title: String,
    pub short_descr: String,
    pub long_descr: String,
    pub description: String,
    pub prompt: String,
    pub cprompt: String,
    pub createtime: String,
    pub lasttime: String,
    pub lasthost: String,
    pub sex: i32,
    pub level: i32,
    pub trust: i32,
    pub played: i64,
    pub room_vnum: Vnum,
    pub gold: i64,
    pub exp: i64,
    pub act: u32,
    pub plr_flags: u32,
    pub affected_by: u32,
    pub position: i32,
    pub practice: i32,
    pub alignment: i32,
    pub hitroll: i32,
    pub damroll: i32,
    pub armor: i32,
    pub wimpy: i32,
    pub hit: i32,
    pub max_hit: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub move_points: i32,
    pub max_move: i32,
    pub condition: [i32; 3],
    pub perm_stats: [i32; 5],
    pub mod_stats: [i32; 5],
    pub questsrun: i64,
    pub questtotal: i64,
    pub rank: i64,
    pub relrank: i64,
    pub mean_paradox: i64,
    pub arrays: Vec<(String, Vec<i64>)>,
    pub skills: Vec<(String, i32)>,
    pub aliases: Vec<(String, String)>,
    pub affects: Vec<(String, i32, i32, i32, u32)>,
    pub boards: Vec<(String, i64)>,
    pub objects: Vec<ObjSave>,
}

/// The slice of the player row the login flow needs before committing
/// to a full load.
#[derive(Debug, Clone)]
pub struct PlayerShort {
    pub name: String,
    pub password: String,
    pub level: i32,
    pub trust: i32,
    pub plr_flags: PlayerFlags,
}

fn format_int_array(values: &[i64]) -> String {
    values
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_int_array(data: &str) -> Vec<i64> {
    data.split_whitespace()
        .filter_map(|tok| tok.parse().ok())
        .collect()
}

/// Snapshot a player character into its persisted image.
///
/// The inventory tree is flattened with an explicit stack so deeply
/// nested containers cannot exhaust the call stack.
pub fn snapshot_player(world: &World, ch_id: CharId) -> Option<PlayerSave> {
    let ch = world.ch(ch_id)?;
    let pcdata = ch.pcdata.as_ref()?;

    let room_vnum = ch
        .in_room
        .map(|r| world.room(r).vnum)
        .unwrap_or(ch.was_in_room);

    let mut save = PlayerSave {
        name: ch.name.clone(),
        password: pcdata.pwd.clone(),
        title: pcdata.title.clone(),
        short_descr: ch.short_descr.clone(),
        long_descr: ch.long_descr.clone(),
        description: ch.description.clone(),
        prompt: pcdata.prompt.clone(),
        cprompt: pcdata.cprompt.clone(),
        createtime: pcdata.createtime.clone(),
        lasttime: pcdata.lasttime.clone(),
        lasthost: pcdata.lasthost.clone(),
        sex: ch.sex as i32,
        level: ch.level,
        trust: ch.trust,
        played: 0,
        room_vnum,
        gold: ch.gold,
        exp: ch.exp,
        act: ch.act.bits(),
        plr_flags: pcdata.plr_flags.bits(),
        affected_by: ch.affected_by.bits(),
        position: ch.position as i32,
        practice: ch.practice,
        alignment: ch.alignment,
        hitroll: ch.hitroll,
        damroll: ch.damroll,
        armor: ch.armor,
        wimpy: ch.wimpy,
        hit: ch.hit,
        max_hit: ch.max_hit,
        mana: ch.mana,
        max_mana: ch.max_mana,
        move_points: ch.move_points,
        max_move: ch.max_move,
        condition: pcdata.condition,
        perm_stats: pcdata.perm_stats,
        mod_stats: pcdata.mod_stats,
        questsrun: pcdata.questsrun,
        questtotal: pcdata.questtotal,
        rank: pcdata.rank,
        relrank: pcdata.relrank,
        mean_paradox: pcdata.mean_paradox,
        arrays: {
            let mut arrays: Vec<_> = pcdata
                .arrays
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            arrays.sort_by(|a, b| a.0.cmp(&b.0));
            arrays
        },
        skills: {
            let mut skills: Vec<_> = pcdata
                .skills
                .iter()
                .map(|(k, &v)| (k.clone(), v))
                .collect();
            skills.sort_by(|a, b| a.0.cmp(&b.0));
            skills
        },
        aliases: pcdata.aliases.clone(),
        affects: ch
            .affects
            .iter()
            .map(|a| (a.skill.clone(), a.duration, a.modifier, a.location, a.bitvector))
            .collect(),
        boards: {
            let mut boards = pcdata.boards.clone();
            boards.sort();
            boards
        },
        objects: Vec::new(),
    };

    // Depth-first flatten: children pushed in reverse keep table order.
    let mut stack: Vec<(ObjId, i32)> = ch
        .carrying
        .iter()
        .rev()
        .map(|&id| (id, 0))
        .collect();
    while let Some((obj_id, nest)) = stack.pop() {
        let Some(obj) = world.obj(obj_id) else {
            continue;
        };
        save.objects.push(ObjSave {
            nest,
            vnum: obj.vnum,
            name: obj.name.clone(),
            short_descr: obj.short_descr.clone(),
            description: obj.description.clone(),
            extra_flags: obj.extra_flags.bits(),
            wear_flags: obj.wear_flags.bits(),
            wear_loc: obj.wear_loc,
            item_type: obj.item_type as i32,
            weight: obj.weight,
            condition: obj.condition,
            timer: obj.timer,
            level: obj.level,
            cost: obj.cost,
            value: obj.value,
            affects: obj
                .affects
                .iter()
                .map(|a| (a.duration, a.modifier, a.location))
                .collect(),
            extra_descr: obj
                .extra_descr
                .iter()
                .map(|ed| (ed.keyword.clone(), ed.description.clone()))
                .collect(),
        });
        for &inner in obj.contains.iter().rev() {
            stack.push((inner, nest + 1));
        }
    }

    Some(save)
}

/// Open a player file with the write-latency pragmas.
pub fn open_player_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("opening player db {}", path.display()))?;
    conn.execute_batch(PLAYER_SCHEMA_SQL)
        .context("player schema")?;
    // WAL avoids journal churn per commit; NORMAL defers fsync to
    // checkpoints. Together they cut save latency several-fold.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}

/// Write a snapshot through an already-open connection in one
/// transaction.
pub fn write_snapshot(conn: &mut Connection, save: &PlayerSave) -> Result<()> {
    let tx = conn.transaction()?;

    for table in [
        "obj_extra_descr",
        "obj_affects",
        "objects",
        "boards",
        "affects",
        "aliases",
        "skills",
        "player_arrays",
        "player",
        "meta",
    ] {
        tx.execute(&format!("DELETE FROM {table}"), [])?;
    }

    tx.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;

    tx.execute(
        "INSERT INTO player (
            name, password, title, short_descr, long_descr, description,
            prompt, cprompt, createtime, lasttime, lasthost,
            sex, level, trust, played, room_vnum, gold, exp,
            act, plr_flags, affected_by, position, practice, alignment,
            hitroll, damroll, armor, wimpy,
            hit, max_hit, mana, max_mana, move, max_move,
            cond_full, cond_thirst, cond_drunk,
            perm_str, perm_int, perm_wis, perm_dex, perm_con,
            mod_str, mod_int, mod_wis, mod_dex, mod_con,
            questsrun, questtotal, rank, relrank, mean_paradox
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10, ?11,
            ?12, ?13, ?14, ?15, ?16, ?17, ?18,
            ?19, ?20, ?21, ?22, ?23, ?24,
            ?25, ?26, ?27, ?28,
            ?29, ?30, ?31, ?32, ?33, ?34,
            ?35, ?36, ?37,
            ?38, ?39, ?40, ?41, ?42,
            ?43, ?44, ?45, ?46, ?47,
            ?48, ?49, ?50, ?51, ?52
        )",
        params![
            save.name,
            save.password,
            save.title,
            save.short_descr,
            save.long_descr,
            save.description,
            save.prompt,
            save.cprompt,
            save.createtime,
            save.lasttime,
            save.lasthost,
            save.sex,
            save.level,
            save.trust,
            save.played,
            save.room_vnum,
            save.gold,
            save.exp,
            save.act as i64,
            save.plr_flags as i64,
            save.affected_by as i64,
            save.position,
            save.practice,
            save.alignment,
            save.hitroll,
            save.damroll,
            save.armor,
            save.wimpy,
            save.hit,
            save.max_hit,
            save.mana,
            save.max_mana,
            save.move_points,
            save.max_move,
            save.condition[0],
            save.condition[1],
            save.condition[2],
            save.perm_stats[0],
            save.perm_stats[1],
            save.perm_stats[2],
            save.perm_stats[3],
            save.perm_stats[4],
            save.mod_stats[0],
            save.mod_stats[1],
            save.mod_stats[2],
            save.mod_stats[3],
            save.mod_stats[4],
            save.questsrun,
            save.questtotal,
            save.rank,
            save.relrank,
            save.mean_paradox,
        ],
    )?;

    {
        let mut stmt =
            tx.prepare("INSERT INTO player_arrays (name, data) VALUES (?1, ?2)")?;
        for (name, values) in &save.arrays {
            stmt.execute(params![name, format_int_array(values)])?;
        }

        let mut stmt =
            tx.prepare("INSERT INTO skills (skill_name, value) VALUES (?1, ?2)")?;
        for (name, value) in &save.skills {
            stmt.execute(params![name, value])?;
        }

        let mut stmt =
            tx.prepare("INSERT INTO aliases (short_n, long_n) VALUES (?1, ?2)")?;
        for (short, long) in &save.aliases {
            stmt.execute(params![short, long])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO affects (skill_name, duration, modifier, location, bitvector)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (skill, duration, modifier, location, bitvector) in &save.affects {
            stmt.execute(params![skill, duration, modifier, location, *bitvector as i64])?;
        }

        let mut stmt =
            tx.prepare("INSERT INTO boards (board_name, last_note) VALUES (?1, ?2)")?;
        for (board, last_note) in &save.boards {
            stmt.execute(params![board, last_note])?;
        }

        let mut obj_stmt = tx.prepare(
            "INSERT INTO objects (nest, vnum, name, short_descr, description,
                                  extra_flags, wear_flags, wear_loc, item_type, weight,
                                  condition, timer, level, cost,
                                  value_0, value_1, value_2, value_3)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        )?;
        let mut obj_affect_stmt = tx.prepare(
            "INSERT INTO obj_affects (obj_id, duration, modifier, location)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut obj_ed_stmt = tx.prepare(
            "INSERT INTO obj_extra_descr (obj_id, keyword, description)
             VALUES (?1, ?2, ?3)",
        )?;
        for obj in &save.objects {
            obj_stmt.execute(params![
                obj.nest,
                obj.vnum,
                obj.name,
                obj.short_descr,
                obj.description,
                obj.extra_flags as i64,
                obj.wear_flags as i64,
                obj.wear_loc,
                obj.item_type,
                obj.weight,
                obj.condition,
                obj.timer,
                obj.level,
                obj.cost,
                obj.value[0],
                obj.value[1],
                obj.value[2],
                obj.value[3],
            ])?;
            let obj_row = tx.last_insert_rowid();
            for (duration, modifier, location) in &obj.affects {
                obj_affect_stmt.execute(params![obj_row, duration, modifier, location])?;
            }
            for (keyword, description) in &obj.extra_descr {
                obj_ed_stmt.execute(params![obj_row, keyword, description])?;
            }
        }
    }

    tx.commit().context("committing player save")
}

/// Synchronous save straight to disk; the fallback path when the
/// background writer is unavailable, and the copyover path where the
/// save must land before exec.
pub fn save_to_path(path: &Path, save: &PlayerSave) -> Result<()> {
    let mut conn = open_player_db(path)?;
    write_snapshot(&mut conn, save)
}

/// Peek at name/password/flags without loading the inventory.
pub fn load_short(path: &Path) -> Result<Option<PlayerShort>> {
    if !path.exists() {
        return Ok(None);
    }
    let conn = open_player_db(path)?;
    let row = conn
        .query_row(
            "SELECT name, password, level, trust, plr_flags FROM player LIMIT 1",
            [],
            |row| {
                Ok(PlayerShort {
                    name: row.get(0)?,
                    password: row.get(1)?,
                    level: row.get(2)?,
                    trust: row.get(3)?,
                    plr_flags: PlayerFlags::from_bits_retain(row.get::<_, i64>(4)? as u32),
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Load the full persisted image back from disk.
pub fn load_player(path: &Path) -> Result<Option<PlayerSave>> {
    if !path.exists() {
        return Ok(None);
    }
    let conn = open_player_db(path)?;

    let Some(mut save) = conn
        .query_row(
            "SELECT name, password, title, short_descr, long_descr, description,
                    prompt, cprompt, createtime, lasttime, lasthost,
                    sex, level, trust, played, room_vnum, gold, exp,
                    act, plr_flags, affected_by, position, practice, alignment,
                    hitroll, damroll, armor, wimpy,
                    hit, max_hit, mana, max_mana, move, max_move,
                    cond_full, cond_thirst, cond_drunk,
                    perm_str, perm_int, perm_wis, perm_dex, perm_con,
                    mod_str, mod_int, mod_wis, mod_dex, mod_con,
                    questsrun, questtotal, rank, relrank, mean_paradox
             FROM player LIMIT 1",
            [],
            |row| {
                Ok(PlayerSave {
                    name: row.get(0)?,
                    password: row.get(1)?,
                    title: row.get(2)?,
                    short_descr: row.get(3)?,
                    long_descr: row.get(4)?,
                    description: row.get(5)?,
                    prompt: row.get(6)?,
                    cprompt: row.get(7)?,
                    createtime: row.get(8)?,
                    lasttime: row.get(9)?,
                    lasthost: row.get(10)?,
                    sex: row.get(11)?,
                    level: row.get(12)?,
                    trust: row.get(13)?,
                    played: row.get(14)?,
                    room_vnum: row.get(15)?,
                    gold: row.get(16)?,
                    exp: row.get(17)?,
                    act: row.get::<_, i64>(18)? as u32,
                    plr_flags: row.get::<_, i64>(19)? as u32,
                    affected_by: row.get::<_, i64>(20)? as u32,
                    position: row.get(21)?,
                    practice: row.get(22)?,
                    alignment: row.get(23)?,
                    hitroll: row.get(24)?,
                    damroll: row.get(25)?,
                    armor: row.get(26)?,
                    wimpy: row.get(27)?,
                    hit: row.get(28)?,
                    max_hit: row.get(29)?,
                    mana: row.get(30)?,
                    max_mana: row.get(31)?,
                    move_points: row.get(32)?,
                    max_move: row.get(33)?,
                    condition: [row.get(34)?, row.get(35)?, row.get(36)?],
                    perm_stats: [
                        row.get(37)?,
                        row.get(38)?,
                        row.get(39)?,
                        row.get(40)?,
                        row.get(41)?,
                    ],
                    mod_stats: [
                        row.get(42)?,
                        row.get(43)?,
                        row.get(44)?,
                        row.get(45)?,
                        row.get(46)?,
                    ],
                    questsrun: row.get(47)?,
                    questtotal: row.get(48)?,
                    rank: row.get(49)?,
                    relrank: row.get(50)?,
                    mean_paradox: row.get(51)?,
                    ..PlayerSave::default()
                })
            },
        )
        .optional()?
    else {
        return Ok(None);
    };

    let mut stmt = conn.prepare("SELECT name, data FROM player_arrays ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (name, data) = row?;
        save.arrays.push((name, parse_int_array(&data)));
    }

    let mut stmt =
        conn.prepare("SELECT skill_name, value FROM skills ORDER BY skill_name")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    for row in rows {
        save.skills.push(row?);
    }

    let mut stmt = conn.prepare("SELECT short_n, long_n FROM aliases ORDER BY id")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    for row in rows {
        save.aliases.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT skill_name, duration, modifier, location, bitvector FROM affects ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get::<_, i64>(4)? as u32,
        ))
    })?;
    for row in rows {
        save.affects.push(row?);
    }

    let mut stmt =
        conn.prepare("SELECT board_name, last_note FROM boards ORDER BY board_name")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    for row in rows {
        save.boards.push(row?);
    }

    let mut obj_rows: Vec<(i64, ObjSave)> = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT id, nest, vnum, name, short_descr, description,
                extra_flags, wear_flags, wear_loc, item_type, weight,
                condition, timer, level, cost, value_0, value_1, value_2, value_3
         FROM objects ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            ObjSave {
                nest: row.get(1)?,
                vnum: row.get(2)?,
                name: row.get(3)?,
                short_descr: row.get(4)?,
                description: row.get(5)?,
                extra_flags: row.get::<_, i64>(6)? as u32,
                wear_flags: row.get::<_, i64>(7)? as u32,
                wear_loc: row.get(8)?,
                item_type: row.get(9)?,
                weight: row.get(10)?,
                condition: row.get(11)?,
                timer: row.get(12)?,
                level: row.get(13)?,
                cost: row.get(14)?,
                value: [row.get(15)?, row.get(16)?, row.get(17)?, row.get(18)?],
                affects: Vec::new(),
                extra_descr: Vec::new(),
            },
        ))
    })?;
    for row in rows {
        obj_rows.push(row?);
    }

    let mut affects_by_obj: HashMap<i64, Vec<(i32, i32, i32)>> = HashMap::new();
    let mut stmt =
        conn.prepare("SELECT obj_id, duration, modifier, location FROM obj_affects ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            (row.get(1)?, row.get(2)?, row.get(3)?),
        ))
    })?;
    for row in rows {
        let (obj_id, affect) = row?;
        affects_by_obj.entry(obj_id).or_default().push(affect);
    }

    let mut eds_by_obj: HashMap<i64, Vec<(String, String)>> = HashMap::new();
    let mut stmt =
        conn.prepare("SELECT obj_id, keyword, description FROM obj_extra_descr ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, (row.get(1)?, row.get(2)?)))
    })?;
    for row in rows {
        let (obj_id, ed) = row?;
        eds_by_obj.entry(obj_id).or_default().push(ed);
    }

    for (row_id, mut obj) in obj_rows {
        if let Some(affects) = affects_by_obj.remove(&row_id) {
            obj.affects = affects;
        }
        if let Some(eds) = eds_by_obj.remove(&row_id) {
            obj.extra_descr = eds;
        }
        save.objects.push(obj);
    }

    Ok(Some(save))
}

/// Instantiate a loaded image as a live character, rebuilding the
/// inventory tree with a per-nest-level stack: a row at nest 0 goes to
/// the character, a row at nest k+1 into the most recent object at k.
pub fn instantiate(world: &mut World, save: &PlayerSave) -> CharId {
    let mut pcdata = PcData {
        pwd: save.password.clone(),
        title: save.title.clone(),
        prompt: save.prompt.clone(),
        cprompt: save.cprompt.clone(),
        lasthost: save.lasthost.clone(),
        lasttime: save.lasttime.clone(),
        createtime: save.createtime.clone(),
        aliases: save.aliases.clone(),
        boards: save.boards.clone(),
        condition: save.condition,
        perm_stats: save.perm_stats,
        mod_stats: save.mod_stats,
        plr_flags: PlayerFlags::from_bits_retain(save.plr_flags),
        questsrun: save.questsrun,
        questtotal: save.questtotal,
        rank: save.rank,
        relrank: save.relrank,
        mean_paradox: save.mean_paradox,
        ..PcData::default()
    };
    for (name, value) in &save.skills {
        pcdata.skills.insert(name.clone(), *value);
    }
    for (name, values) in &save.arrays {
        pcdata.arrays.insert(name.clone(), values.clone());
    }

    let ch = Character {
        proto: None,
        name: save.name.clone(),
        short_descr: save.short_descr.clone(),
        long_descr: save.long_descr.clone(),
        description: save.description.clone(),
        sex: Sex::from_i32(save.sex),
        level: save.level,
        trust: save.trust,
        alignment: save.alignment,
        position: Position::from_i32(save.position),
        act: ActFlags::from_bits_retain(save.act),
        affected_by: AffectFlags::from_bits_retain(save.affected_by),
        hit: save.hit,
        max_hit: save.max_hit,
        mana: save.mana,
        max_mana: save.max_mana,
        move_points: save.move_points,
        max_move: save.max_move,
        gold: save.gold,
        exp: save.exp,
        practice: save.practice,
        hitroll: save.hitroll,
        damroll: save.damroll,
        armor: save.armor,
        wimpy: save.wimpy,
        was_in_room: save.room_vnum,
        affects: save
            .affects
            .iter()
            .map(|(skill, duration, modifier, location, bitvector)| Affect {
                skill: skill.clone(),
                duration: *duration,
                modifier: *modifier,
                location: *location,
                bitvector: *bitvector,
            })
            .collect(),
        pcdata: Some(pcdata),
        ..Character::default()
    };

    let ch_id = CharId(world.chars.insert(ch));
    world.char_list.push(ch_id);

    // Per-level stack of the most recent object seen at each nest depth.
    let mut nest_stack: Vec<ObjId> = Vec::new();
    for row in &save.objects {
        let Some(proto_id) = world.get_obj_index(row.vnum) else {
            log::warn!(
                "player {}: dropping object with unknown vnum {}",
                save.name,
                row.vnum
            );
            continue;
        };
        let obj_id = world.create_object(proto_id, row.level);
        if let Some(obj) = world.obj_mut(obj_id) {
            obj.name = row.name.clone();
            obj.short_descr = row.short_descr.clone();
            obj.description = row.description.clone();
            obj.extra_flags = ExtraFlags::from_bits_retain(row.extra_flags);
            obj.wear_flags = WearFlags::from_bits_retain(row.wear_flags);
            obj.item_type = ItemType::from_i32(row.item_type);
            obj.weight = row.weight;
            obj.condition = row.condition;
            obj.timer = row.timer;
            obj.cost = row.cost;
            obj.value = row.value;
            obj.affects = row
                .affects
                .iter()
                .map(|&(duration, modifier, location)| ObjAffect {
                    duration,
                    modifier,
                    location,
                })
                .collect();
            obj.extra_descr = row
                .extra_descr
                .iter()
                .map(|(keyword, description)| ExtraDescr {
                    keyword: keyword.clone(),
                    description: description.clone(),
                })
                .collect();
        }

        let nest = row.nest.max(0) as usize;
        nest_stack.truncate(nest);
        if nest == 0 {
            world.obj_to_char(obj_id, ch_id);
            if row.wear_loc >= 0 {
                world.equip_char(ch_id, obj_id, row.wear_loc as usize);
            }
        } else {
            match nest_stack.last().copied() {
                Some(container) => {
                    world.obj_to_obj(obj_id, container);
                }
                None => {
                    // Orphaned nest level; keep the object rather than
                    // lose it.
                    world.obj_to_char(obj_id, ch_id);
                }
            }
        }
        nest_stack.push(obj_id);
    }

    ch_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_save() -> PlayerSave {
        PlayerSave {
            name: "Testchar".into(),
            password: core::encrypt::hash_password("Testchar", "secret"),
            title: " the Brave".into(),
            prompt: "<%h/%Hhp %m/%Mm %v/%Vmv> ".into(),
            sex: 1,
            level: 5,
            trust: 0,
            room_vnum: 3001,
            gold: 120,
            exp: 4_500,
            position: 8,
            hit: 80,
            max_hit: 100,
            mana: 40,
            max_mana: 50,
            move_points: 90,
            max_move: 100,
            condition: [40, 38, 0],
            perm_stats: [13, 14, 12, 15, 13],
            mod_stats: [0, 1, 0, 0, 0],
            questsrun: 3,
            questtotal: 17,
            rank: 2,
            relrank: 1,
            mean_paradox: -4,
            arrays: vec![
                ("discipline_levels".into(), vec![1, 2, 3, -2]),
                ("stances".into(), vec![0; 8]),
            ],
            skills: vec![("dodge".into(), 75), ("parry".into(), 60)],
            aliases: vec![("gs".into(), "get sword".into())],
            affects: vec![("sneak".into(), 10, 0, 0, 0x1000)],
            boards: vec![("general".into(), 171_000)],
            objects: vec![
                ObjSave {
                    nest: 0,
                    vnum: 3011,
                    name: "bag leather".into(),
                    short_descr: "a leather bag".into(),
                    description: "A leather bag.".into(),
                    extra_flags: 0,
                    wear_flags: 1,
                    wear_loc: -1,
                    item_type: 15,
                    weight: 2,
                    condition: 100,
                    timer: 0,
                    level: 0,
                    cost: 10,
                    value: [100, 0, 0, 0],
                    affects: vec![],
                    extra_descr: vec![("bag".into(), "Plain leather.".into())],
                },
                ObjSave {
                    nest: 1,
                    vnum: 3010,
                    name: "sword long".into(),
                    short_descr: "a long sword".into(),
                    description: "A long sword.".into(),
                    extra_flags: 0,
                    wear_flags: 0x2001,
                    wear_loc: -1,
                    item_type: 5,
                    weight: 10,
                    condition: 95,
                    timer: 0,
                    level: 8,
                    cost: 150,
                    value: [0, 5, 9, 0],
                    affects: vec![(-1, 2, 18)],
                    extra_descr: vec![],
                },
            ],
            ..PlayerSave::default()
        }
    }

    /// Every persisted field survives a save/load trip through a real
    /// database file.
    #[test]
    fn player_round_trip() {
        let dir = std::env::temp_dir().join(format!("mud-pdb-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Testchar.db");
        let _ = std::fs::remove_file(&path);

        let save = sample_save();
        save_to_path(&path, &save).unwrap();
        let loaded = load_player(&path).unwrap().unwrap();
        assert_eq!(loaded, save);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn save_is_overwrite_not_append() {
        let dir = std::env::temp_dir().join(format!("mud-pdb2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Testchar.db");
        let _ = std::fs::remove_file(&path);

        let mut save = sample_save();
        save_to_path(&path, &save).unwrap();
        save.gold = 999;
        save.objects.pop();
        save_to_path(&path, &save).unwrap();

        let loaded = load_player(&path).unwrap().unwrap();
        assert_eq!(loaded.gold, 999);
        assert_eq!(loaded.objects.len(), 1);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn load_short_reads_credentials() {
        let dir = std::env::temp_dir().join(format!("mud-pdb3-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Testchar.db");
        let _ = std::fs::remove_file(&path);

        let save = sample_save();
        save_to_path(&path, &save).unwrap();
        let short = load_short(&path).unwrap().unwrap();
        assert_eq!(short.name, "Testchar");
        assert_eq!(short.level, 5);
        assert!(core::encrypt::verify_password(
            "Testchar",
            "secret",
            &short.password
        ));

        std::fs::remove_file(&path).unwrap();
        assert!(load_short(&path).unwrap().is_none());
    }

    #[test]
    fn int_array_round_trip() {
        let values = vec![1, -2, 0, 99999, -7];
        assert_eq!(parse_int_array(&format_int_array(&values)), values);
        assert!(parse_int_array("").is_empty());
    }
}
