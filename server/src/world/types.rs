//! World data types: areas, rooms, prototypes, instances, and the arena
//! ids that stand in for every pointer the legacy data model used.
//!
//! Cyclic references (rooms -> exits -> rooms, followers -> masters) are
//! expressed as ids resolved through the arenas on access, which also
//! makes persistence trivial: an id's vnum is already its stored form.

use std::collections::HashMap;

use bitflags::bitflags;

use core::constants::{MAX_DIR, MAX_WEAR};

pub type Vnum = i32;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(AreaId);
arena_id!(RoomId);
arena_id!(MobProtoId);
arena_id!(ObjProtoId);
arena_id!(CharId);
arena_id!(ObjId);
arena_id!(DescId);

/// Fixed-capacity-free arena with slot reuse. Instances (characters,
/// objects) come and go constantly; prototypes and rooms only grow.
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> u32 {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(value);
                idx
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        }
    }

    pub fn remove(&mut self, idx: u32) -> Option<T> {
        let slot = self.slots.get_mut(idx as usize)?;
        let value = slot.take();
        if value.is_some() {
            self.free.push(idx);
        }
        value
    }

    pub fn get(&self, idx: u32) -> Option<&T> {
        self.slots.get(idx as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: u32) -> Option<&mut T> {
        self.slots.get_mut(idx as usize).and_then(Option::as_mut)
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i as u32, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (i as u32, v)))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RoomFlags: u32 {
        const DARK      = 1 << 0;
        const NO_MOB    = 1 << 2;
        const INDOORS   = 1 << 3;
        const PRIVATE   = 1 << 9;
        const SAFE      = 1 << 10;
        const SOLITARY  = 1 << 11;
        const PET_SHOP  = 1 << 12;
        const NO_RECALL = 1 << 13;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExitFlags: u32 {
        const IS_DOOR  = 1 << 0;
        const CLOSED   = 1 << 1;
        const LOCKED   = 1 << 2;
        const PICKPROOF = 1 << 5;
    }
}

bitflags! {
    /// Mob behavior bits; the core stores and moves them, gameplay code
    /// interprets most of them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActFlags: u32 {
        const IS_NPC     = 1 << 0;
        const SENTINEL   = 1 << 1;
        const SCAVENGER  = 1 << 2;
        const AGGRESSIVE = 1 << 5;
        const STAY_AREA  = 1 << 6;
        const WIMPY      = 1 << 7;
        const PET        = 1 << 8;
        const TRAIN      = 1 << 9;
        const PRACTICE   = 1 << 10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AffectFlags: u32 {
        const BLIND      = 1 << 0;
        const INVISIBLE  = 1 << 1;
        const DETECT_EVIL = 1 << 2;
        const INFRARED   = 1 << 6;
        const CURSE      = 1 << 7;
        const POISON     = 1 << 9;
        const SNEAK      = 1 << 12;
        const HIDE       = 1 << 13;
        const SLEEP      = 1 << 14;
        const CHARM      = 1 << 15;
        const FLYING     = 1 << 16;
        const PASS_DOOR  = 1 << 17;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PlayerFlags: u32 {
        const DENY        = 1 << 0;
        const AUTOLOOK    = 1 << 1;
        const ANSI        = 1 << 2;
        const PREFER_GMCP = 1 << 3;
        const PREFER_MXP  = 1 << 4;
        const HOLYLIGHT   = 1 << 5;
        const WIZINVIS    = 1 << 6;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExtraFlags: u32 {
        const GLOW       = 1 << 0;
        const HUM        = 1 << 1;
        const INVIS      = 1 << 3;
        const MAGIC      = 1 << 4;
        const NODROP     = 1 << 5;
        const INVENTORY  = 1 << 13;
        const NOREMOVE   = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WearFlags: u32 {
        const TAKE   = 1 << 0;
        const FINGER = 1 << 1;
        const NECK   = 1 << 2;
        const BODY   = 1 << 3;
        const HEAD   = 1 << 4;
        const LEGS   = 1 << 5;
        const FEET   = 1 << 6;
        const HANDS  = 1 << 7;
        const ARMS   = 1 << 8;
        const SHIELD = 1 << 9;
        const ABOUT  = 1 << 10;
        const WAIST  = 1 << 11;
        const WRIST  = 1 << 12;
        const WIELD  = 1 << 13;
        const HOLD   = 1 << 14;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AreaFlags: u32 {
        const CHANGED = 1 << 0;
        const ADDED   = 1 << 1;
        const VERBOSE = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(i32)]
pub enum Position {
    Dead = 0,
    Incapacitated = 2,
    Stunned = 3,
    Sleeping = 4,
    Resting = 5,
    Sitting = 6,
    Fighting = 7,
    #[default]
    Standing = 8,
}

impl Position {
    pub fn from_i32(v: i32) -> Position {
        match v {
            0 => Position::Dead,
            2 => Position::Incapacitated,
            3 => Position::Stunned,
            4 => Position::Sleeping,
            5 => Position::Resting,
            6 => Position::Sitting,
            7 => Position::Fighting,
            _ => Position::Standing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Sex {
    #[default]
    Neutral = 0,
    Male = 1,
    Female = 2,
}

impl Sex {
    pub fn from_i32(v: i32) -> Sex {
        match v {
            1 => Sex::Male,
            2 => Sex::Female,
            _ => Sex::Neutral,
        }
    }
}

/// Item type drives the meaning of the four generic values and the level
/// banding of shopkeeper stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ItemType {
    Light = 1,
    Scroll = 2,
    Wand = 3,
    Staff = 4,
    Weapon = 5,
    Treasure = 8,
    Armor = 9,
    Potion = 10,
    Furniture = 12,
    #[default]
    Trash = 13,
    Container = 15,
    DrinkContainer = 17,
    Key = 18,
    Food = 19,
    Money = 20,
    Boat = 22,
    CorpseNpc = 23,
    CorpsePc = 24,
    Fountain = 25,
    Pill = 26,
    Portal = 27,
}

impl ItemType {
    pub fn from_i32(v: i32) -> ItemType {
        match v {
            1 => ItemType::Light,
            2 => ItemType::Scroll,
            3 => ItemType::Wand,
            4 => ItemType::Staff,
            5 => ItemType::Weapon,
            8 => ItemType::Treasure,
            9 => ItemType::Armor,
            10 => ItemType::Potion,
            12 => ItemType::Furniture,
            15 => ItemType::Container,
            17 => ItemType::DrinkContainer,
            18 => ItemType::Key,
            19 => ItemType::Food,
            20 => ItemType::Money,
            22 => ItemType::Boat,
            23 => ItemType::CorpseNpc,
            24 => ItemType::CorpsePc,
            25 => ItemType::Fountain,
            26 => ItemType::Pill,
            27 => ItemType::Portal,
            _ => ItemType::Trash,
        }
    }
}

/// Directions are fixed indices 0..5: north, east, south, west, up, down.
pub const DIR_NAMES: [&str; MAX_DIR] = ["north", "east", "south", "west", "up", "down"];

/// Reverse direction per index. Only the six cardinal slots are
/// content-supported; diagonal exits never appear in the loader.
pub const REV_DIR: [usize; MAX_DIR] = [2, 3, 0, 1, 5, 4];

#[derive(Debug, Clone, Default)]
pub struct ExtraDescr {
    pub keyword: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Exit {
    /// Destination vnum as loaded; resolved to a RoomId in the link phase.
    pub to_vnum: Vnum,
    pub to_room: Option<RoomId>,
    pub keyword: String,
    pub description: String,
    /// Live door state.
    pub flags: ExitFlags,
    /// Door state the area reset restores.
    pub rs_flags: ExitFlags,
    pub key_vnum: Vnum,
}

impl Exit {
    pub fn to_vnum(vnum: Vnum) -> Exit {
        Exit {
            to_vnum: vnum,
            to_room: None,
            keyword: String::new(),
            description: String::new(),
            flags: ExitFlags::empty(),
            rs_flags: ExitFlags::empty(),
            key_vnum: -1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub vnum: Vnum,
    pub area: AreaId,
    pub name: String,
    pub description: String,
    pub room_flags: RoomFlags,
    pub sector_type: i32,
    pub exits: [Option<Exit>; MAX_DIR],
    pub extra_descr: Vec<ExtraDescr>,
    /// Characters currently present, in arrival order.
    pub people: Vec<CharId>,
    /// Objects lying here.
    pub contents: Vec<ObjId>,
    /// Scripts attached by content (stored, executed by gameplay code).
    pub scripts: Vec<Script>,
}

/// Declarative area repopulation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reset {
    /// Ensure an instance of `mob` exists in `room`, up to `limit` world-wide.
    Mob { mob: Vnum, limit: i32, room: Vnum },
    /// Ensure an instance of `obj` lies in `room`.
    Obj { obj: Vnum, room: Vnum },
    /// Put `obj` inside the most recently referenced container `container`.
    Put { obj: Vnum, container: Vnum },
    /// Give `obj` to the most recently spawned mob.
    Give { obj: Vnum },
    /// Equip the most recently spawned mob with `obj` at `slot`.
    Equip { obj: Vnum, slot: i32 },
    /// Restore door state on `room`'s exit `dir`.
    Door { room: Vnum, dir: usize, state: i32 },
    /// Shuffle the first `count` exits of `room`.
    Randomize { room: Vnum, count: usize },
}

impl Reset {
    /// Decode a stored `(command, arg1, arg2, arg3)` row. Unknown
    /// commands yield `None` and are logged by the loader.
    pub fn from_row(command: &str, arg1: i32, arg2: i32, arg3: i32) -> Option<Reset> {
        match command.chars().next()? {
            'M' => Some(Reset::Mob {
                mob: arg1,
                limit: arg2,
                room: arg3,
            }),
            'O' => Some(Reset::Obj { obj: arg1, room: arg3 }),
            'P' => Some(Reset::Put {
                obj: arg1,
                container: arg3,
            }),
            'G' => Some(Reset::Give { obj: arg1 }),
            'E' => Some(Reset::Equip {
                obj: arg1,
                slot: arg3,
            }),
            'D' => Some(Reset::Door {
                room: arg1,
                dir: (arg2.max(0) as usize).min(MAX_DIR - 1),
                state: arg3,
            }),
            'R' => Some(Reset::Randomize {
                room: arg1,
                count: (arg2.max(0) as usize).min(MAX_DIR),
            }),
            _ => None,
        }
    }

    /// Encode back to the stored row form.
    pub fn to_row(&self) -> (char, i32, i32, i32) {
        match *self {
            Reset::Mob { mob, limit, room } => ('M', mob, limit, room),
            Reset::Obj { obj, room } => ('O', obj, 0, room),
            Reset::Put { obj, container } => ('P', obj, 0, container),
            Reset::Give { obj } => ('G', obj, 0, 0),
            Reset::Equip { obj, slot } => ('E', obj, 0, slot),
            Reset::Door { room, dir, state } => ('D', room, dir as i32, state),
            Reset::Randomize { room, count } => ('R', room, count as i32, 0),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Area {
    /// File stem: `midgaard` for `db/areas/midgaard.db`.
    pub filename: String,
    pub name: String,
    pub builders: String,
    pub security: i32,
    pub lvnum: Vnum,
    pub uvnum: Vnum,
    pub recall: Vnum,
    pub area_flags: AreaFlags,
    pub is_hidden: bool,

    /// Pulse-driven reset age; reset fires at 15, then re-rolls 0..=3.
    pub age: i32,
    /// Players currently inside, maintained by char_to_room/char_from_room.
    pub nplayer: i32,
    /// Reset deferred until the next player walks in.
    pub needs_reset: bool,

    pub rooms: Vec<RoomId>,
    pub resets: Vec<Reset>,

    // Runtime difficulty stats; computed after load, never persisted.
    pub mob_count: i32,
    pub avg_mob_level: i32,
    pub min_mob_level: i32,
    pub max_mob_level: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub trigger: i32,
    pub name: String,
    pub code: String,
    pub pattern: Option<String>,
    pub chance: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Shop {
    pub keeper: Vnum,
    pub buy_types: [i32; 5],
    pub profit_buy: i32,
    pub profit_sell: i32,
    pub open_hour: i32,
    pub close_hour: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ObjAffect {
    pub location: i32,
    pub modifier: i32,
    pub duration: i32,
}

#[derive(Debug, Clone)]
pub struct ObjProto {
    pub vnum: Vnum,
    pub area: AreaId,
    pub name: String,
    pub short_descr: String,
    pub description: String,
    pub item_type: ItemType,
    pub extra_flags: ExtraFlags,
    pub wear_flags: WearFlags,
    pub value: [i32; 4],
    pub weight: i32,
    pub cost: i32,
    pub extra_descr: Vec<ExtraDescr>,
    pub affects: Vec<ObjAffect>,
    pub scripts: Vec<Script>,
    /// Live instances cloned from this prototype.
    pub count: i32,
}

/// Exactly one containment relation at a time. `Nowhere` exists only
/// between creation and first placement, or mid-transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjHolder {
    #[default]
    Nowhere,
    Room(RoomId),
    Char(CharId),
    Obj(ObjId),
}

#[derive(Debug, Clone)]
pub struct ObjInstance {
    pub proto: ObjProtoId,
    pub vnum: Vnum,
    /// Instance strings are duplicated at creation; builders may retitle
    /// a single instance without touching the prototype.
    pub name: String,
    pub short_descr: String,
    pub description: String,
    pub item_type: ItemType,
    pub extra_flags: ExtraFlags,
    pub wear_flags: WearFlags,
    pub value: [i32; 4],
    pub weight: i32,
    pub cost: i32,
    pub level: i32,
    pub condition: i32,
    pub timer: i32,
    /// Wear location on the carrier, -1 when merely carried.
    pub wear_loc: i32,
    pub holder: ObjHolder,
    pub contains: Vec<ObjId>,
    pub affects: Vec<ObjAffect>,
    pub extra_descr: Vec<ExtraDescr>,
}

#[derive(Debug, Clone)]
pub struct MobProto {
    pub vnum: Vnum,
    pub area: AreaId,
    /// Keyword list ("guard cityguard").
    pub player_name: String,
    pub short_descr: String,
    pub long_descr: String,
    pub description: String,
    pub act: ActFlags,
    pub affected_by: AffectFlags,
    pub alignment: i32,
    pub level: i32,
    pub hitroll: i32,
    pub ac: i32,
    pub hit_dice: (i32, i32, i32),
    pub dam_dice: (i32, i32, i32),
    pub gold: i32,
    pub sex: Sex,
    pub shop: Option<Shop>,
    pub special: Option<String>,
    pub scripts: Vec<Script>,
    pub count: i32,
}

/// A timed modifier on a character.
#[derive(Debug, Clone, Default)]
pub struct Affect {
    pub skill: String,
    pub duration: i32,
    pub location: i32,
    pub modifier: i32,
    pub bitvector: u32,
}

/// Player-only auxiliary record.
#[derive(Debug, Clone, Default)]
pub struct PcData {
    pub pwd: String,
    pub title: String,
    pub prompt: String,
    pub cprompt: String,
    pub lasthost: String,
    pub lasttime: String,
    pub createtime: String,
    /// short -> expansion
    pub aliases: Vec<(String, String)>,
    /// board name -> last read note stamp
    pub boards: Vec<(String, i64)>,
    /// skill name -> learned percentage
    pub skills: HashMap<String, i32>,
    /// hunger, thirst, drunk
    pub condition: [i32; 3],
    pub perm_stats: [i32; 5],
    pub mod_stats: [i32; 5],
    /// The named integer arrays gameplay code owns; the core only
    /// round-trips them.
    pub arrays: HashMap<String, Vec<i64>>,
    pub plr_flags: PlayerFlags,
    // Persisted but interpreted entirely by gameplay code.
    pub questsrun: i64,
    pub questtotal: i64,
    pub rank: i64,
    pub relrank: i64,
    pub mean_paradox: i64,
}

#[derive(Debug, Clone)]
pub struct Character {
    /// `None` for player characters.
    pub proto: Option<MobProtoId>,
    pub name: String,
    pub short_descr: String,
    pub long_descr: String,
    pub description: String,
    pub sex: Sex,
    pub level: i32,
    pub trust: i32,
    pub alignment: i32,
    pub position: Position,
    pub act: ActFlags,
    pub affected_by: AffectFlags,

    pub hit: i32,
    pub max_hit: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub move_points: i32,
    pub max_move: i32,
    pub gold: i64,
    pub exp: i64,
    pub practice: i32,
    pub hitroll: i32,
    pub damroll: i32,
    pub armor: i32,
    pub wimpy: i32,

    pub in_room: Option<RoomId>,
    /// Room to restore on load / recall.
    pub was_in_room: Vnum,
    pub carrying: Vec<ObjId>,
    pub equipment: [Option<ObjId>; MAX_WEAR],
    pub affects: Vec<Affect>,

    pub fighting: Option<CharId>,
    pub master: Option<CharId>,
    pub followers: Vec<CharId>,
    pub mount: Option<CharId>,
    pub rider: Option<CharId>,

    /// Wait-state in pulses; no commands execute while positive.
    pub wait: i32,
    /// Pulses since last input, drives idle/linkdead extraction.
    pub timer: u64,
    pub desc: Option<DescId>,

    pub pcdata: Option<PcData>,
}

impl Character {
    pub fn is_npc(&self) -> bool {
        self.proto.is_some()
    }

    pub fn is_immortal(&self) -> bool {
        self.trust >= core::constants::LEVEL_IMMORTAL
    }

    pub fn pc_name(&self) -> &str {
        &self.name
    }
}

impl Default for Character {
    fn default() -> Self {
        Character {
            proto: None,
            name: String::new(),
            short_descr: String::new(),
            long_descr: String::new(),
            description: String::new(),
            sex: Sex::Neutral,
            level: 0,
            trust: 0,
            alignment: 0,
            position: Position::Standing,
            act: ActFlags::empty(),
            affected_by: AffectFlags::empty(),
            hit: 1000,
            max_hit: 1000,
            mana: 1500,
            max_mana: 1500,
            move_points: 1500,
            max_move: 1500,
            gold: 0,
            exp: 0,
            practice: 0,
            hitroll: 0,
            damroll: 0,
            armor: 100,
            wimpy: 0,
            in_room: None,
            was_in_room: 0,
            carrying: Vec::new(),
            equipment: [None; MAX_WEAR],
            affects: Vec::new(),
            fighting: None,
            master: None,
            followers: Vec::new(),
            mount: None,
            rider: None,
            wait: 0,
            timer: 0,
            desc: None,
            pcdata: None,
        }
    }
}

/// Game clock: 24-hour days, 35-day months, 17-month years.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeInfo {
    pub hour: i32,
    pub day: i32,
    pub month: i32,
    pub year: i32,
}

pub const SUN_DARK: i32 = 0;
pub const SUN_RISE: i32 = 1;
pub const SUN_LIGHT: i32 = 2;
pub const SUN_SET: i32 = 3;

pub const SKY_CLOUDLESS: i32 = 0;
pub const SKY_CLOUDY: i32 = 1;
pub const SKY_RAINING: i32 = 2;
pub const SKY_LIGHTNING: i32 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct Weather {
    pub mmhg: i32,
    pub change: i32,
    pub sky: i32,
    pub sunlight: i32,
}
