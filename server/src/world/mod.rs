//! The in-memory world: prototype indexes, instance arenas, and the only
//! sanctioned ways of moving things between rooms, characters, and
//! containers.
//!
//! All of this is owned by the single scheduler thread; nothing here
//! locks. Every cross-reference is an arena id, so removal can never
//! leave a dangling pointer, only a stale id that lookups refuse.

pub mod reset;
pub mod types;
pub mod update;

use std::collections::HashMap;

use crate::rng::{number_fuzzy, number_range};
use types::*;

pub struct World {
    pub areas: Vec<Area>,
    pub rooms: Vec<Room>,
    pub mob_protos: Vec<MobProto>,
    pub obj_protos: Vec<ObjProto>,

    /// vnum -> arena id; the Rust rendition of the `vnum % H` hash chains.
    pub room_index: HashMap<Vnum, RoomId>,
    pub mob_index: HashMap<Vnum, MobProtoId>,
    pub obj_index: HashMap<Vnum, ObjProtoId>,

    pub chars: Arena<Character>,
    pub objs: Arena<ObjInstance>,
    /// Instance lists in creation order, for whole-world sweeps.
    pub char_list: Vec<CharId>,
    pub obj_list: Vec<ObjId>,

    pub time: TimeInfo,
    pub weather: Weather,

    /// True while the boot load runs; bad vnums abort instead of
    /// returning None so broken content is caught before players arrive.
    pub booting: bool,
}

impl World {
    pub fn new() -> Self {
        World {
            areas: Vec::new(),
            rooms: Vec::new(),
            mob_protos: Vec::new(),
            obj_protos: Vec::new(),
            room_index: HashMap::new(),
            mob_index: HashMap::new(),
            obj_index: HashMap::new(),
            chars: Arena::new(),
            objs: Arena::new(),
            char_list: Vec::new(),
            obj_list: Vec::new(),
            time: TimeInfo::default(),
            weather: Weather::default(),
            booting: false,
        }
    }

    // -----------------------------------------------------------------
    //  Prototype lookups
    // -----------------------------------------------------------------

    pub fn get_room_index(&self, vnum: Vnum) -> Option<RoomId> {
        let found = self.room_index.get(&vnum).copied();
        if found.is_none() && self.booting {
            log::error!("get_room_index: bad vnum {vnum} during boot");
            panic!("boot: unresolved room vnum {vnum}");
        }
        found
    }

    pub fn get_mob_index(&self, vnum: Vnum) -> Option<MobProtoId> {
        let found = self.mob_index.get(&vnum).copied();
        if found.is_none() && self.booting {
            log::error!("get_mob_index: bad vnum {vnum} during boot");
            panic!("boot: unresolved mob vnum {vnum}");
        }
        found
    }

    pub fn get_obj_index(&self, vnum: Vnum) -> Option<ObjProtoId> {
        let found = self.obj_index.get(&vnum).copied();
        if found.is_none() && self.booting {
            log::error!("get_obj_index: bad vnum {vnum} during boot");
            panic!("boot: unresolved object vnum {vnum}");
        }
        found
    }

    pub fn room(&self, id: RoomId) -> &Room {
        &self.rooms[id.index()]
    }

    pub fn room_mut(&mut self, id: RoomId) -> &mut Room {
        &mut self.rooms[id.index()]
    }

    pub fn area(&self, id: AreaId) -> &Area {
        &self.areas[id.index()]
    }

    pub fn ch(&self, id: CharId) -> Option<&Character> {
        self.chars.get(id.0)
    }

    pub fn ch_mut(&mut self, id: CharId) -> Option<&mut Character> {
        self.chars.get_mut(id.0)
    }

    pub fn obj(&self, id: ObjId) -> Option<&ObjInstance> {
        self.objs.get(id.0)
    }

    pub fn obj_mut(&mut self, id: ObjId) -> Option<&mut ObjInstance> {
        self.objs.get_mut(id.0)
    }

    /// Register a freshly loaded room; duplicate vnums are rejected and
    /// logged (prototype-uniqueness invariant).
    pub fn add_room(&mut self, room: Room) -> Option<RoomId> {
        if self.room_index.contains_key(&room.vnum) {
            log::error!("duplicate room vnum {} rejected", room.vnum);
            return None;
        }
        let id = RoomId(self.rooms.len() as u32);
        self.room_index.insert(room.vnum, id);
        self.areas[room.area.index()].rooms.push(id);
        self.rooms.push(room);
        Some(id)
    }

    pub fn add_mob_proto(&mut self, proto: MobProto) -> Option<MobProtoId> {
        if self.mob_index.contains_key(&proto.vnum) {
            log::error!("duplicate mob vnum {} rejected", proto.vnum);
            return None;
        }
        let id = MobProtoId(self.mob_protos.len() as u32);
        self.mob_index.insert(proto.vnum, id);
        self.mob_protos.push(proto);
        Some(id)
    }

    pub fn add_obj_proto(&mut self, proto: ObjProto) -> Option<ObjProtoId> {
        if self.obj_index.contains_key(&proto.vnum) {
            log::error!("duplicate object vnum {} rejected", proto.vnum);
            return None;
        }
        let id = ObjProtoId(self.obj_protos.len() as u32);
        self.obj_index.insert(proto.vnum, id);
        self.obj_protos.push(proto);
        Some(id)
    }

    // -----------------------------------------------------------------
    //  Instance creation
    // -----------------------------------------------------------------

    /// Clone a mob prototype into a live instance. Strings are owned
    /// copies; hp is dice-rolled from the prototype level.
    pub fn create_mobile(&mut self, proto_id: MobProtoId) -> CharId {
        let proto = &mut self.mob_protos[proto_id.index()];
        proto.count += 1;

        let level = number_fuzzy(proto.level);
        let hp = (level * 12
            + number_range(level * level / 4, level * level))
        .clamp(1, 300_000);

        let mob = Character {
            proto: Some(proto_id),
            name: proto.player_name.clone(),
            short_descr: proto.short_descr.clone(),
            long_descr: proto.long_descr.clone(),
            description: proto.description.clone(),
            sex: proto.sex,
            level,
            alignment: proto.alignment,
            act: proto.act | ActFlags::IS_NPC,
            affected_by: proto.affected_by,
            hit: hp,
            max_hit: hp,
            hitroll: proto.hitroll + level,
            damroll: level,
            armor: interpolate(level, 100, -100),
            gold: proto.gold as i64,
            ..Character::default()
        };

        let id = CharId(self.chars.insert(mob));
        self.char_list.push(id);
        id
    }

    /// Clone an object prototype at `level`. Cost scales with level and
    /// dice; value arrays get the type-specific variance rolls.
    pub fn create_object(&mut self, proto_id: ObjProtoId, level: i32) -> ObjId {
        let proto = &mut self.obj_protos[proto_id.index()];
        proto.count += 1;

        let mut obj = ObjInstance {
            proto: proto_id,
            vnum: proto.vnum,
            name: proto.name.clone(),
            short_descr: proto.short_descr.clone(),
            description: proto.description.clone(),
            item_type: proto.item_type,
            extra_flags: proto.extra_flags,
            wear_flags: proto.wear_flags,
            value: proto.value,
            weight: proto.weight,
            cost: number_fuzzy(10) * number_fuzzy(level.max(0)) * number_fuzzy(level.max(0)),
            level,
            condition: 100,
            timer: 0,
            wear_loc: -1,
            holder: ObjHolder::Nowhere,
            contains: Vec::new(),
            affects: proto.affects.clone(),
            extra_descr: proto.extra_descr.clone(),
        };

        match obj.item_type {
            ItemType::Weapon => {
                obj.value[1] = number_range(obj.value[1], obj.value[2]);
                obj.value[2] = number_range(obj.value[1] + 1, obj.value[1] * 2);
            }
            ItemType::Armor => {
                obj.value[0] = number_range(10.min(obj.value[0]), obj.value[0]);
            }
            ItemType::Potion | ItemType::Pill => {
                obj.value[0] = number_fuzzy(number_fuzzy(obj.value[0]));
            }
            ItemType::Money => {
                obj.value[0] = obj.cost;
            }
            _ => {}
        }

        let id = ObjId(self.objs.insert(obj));
        self.obj_list.push(id);
        id
    }

    // -----------------------------------------------------------------
    //  Containment: characters
    // -----------------------------------------------------------------

    /// Place a character in a room, maintaining the room's people list
    /// and the area player count. A character must not already be in a
    /// room (move = from + to, two explicit steps).
    pub fn char_to_room(&mut self, ch_id: CharId, room_id: RoomId) {
        let is_pc = {
            let Some(ch) = self.chars.get_mut(ch_id.0) else {
                return;
            };
            debug_assert!(ch.in_room.is_none(), "char_to_room on placed character");
            ch.in_room = Some(room_id);
            !ch.is_npc()
        };
        self.rooms[room_id.index()].people.push(ch_id);
        if is_pc {
            let area_id = self.rooms[room_id.index()].area;
            let area = &mut self.areas[area_id.index()];
            area.nplayer += 1;
            // A deferred reset fires as the first player walks in.
            let fire = area.needs_reset;
            area.needs_reset = false;
            if fire {
                reset::reset_area(self, area_id);
            }
        }
    }

    /// Remove a character from their room, maintaining both lists.
    pub fn char_from_room(&mut self, ch_id: CharId) {
        let Some(ch) = self.chars.get_mut(ch_id.0) else {
            return;
        };
        let Some(room_id) = ch.in_room.take() else {
            return;
        };
        let is_pc = !ch.is_npc();
        let room = &mut self.rooms[room_id.index()];
        room.people.retain(|&id| id != ch_id);
        if is_pc {
            let area = &mut self.areas[room.area.index()];
            area.nplayer -= 1;
            if area.nplayer < 0 {
                log::error!("area {} player count underflow", area.name);
                area.nplayer = 0;
            }
        }
    }

    // -----------------------------------------------------------------
    //  Containment: objects
    // -----------------------------------------------------------------

    /// Detach an object from whatever currently holds it.
    fn obj_unhold(&mut self, obj_id: ObjId) {
        let Some(obj) = self.objs.get_mut(obj_id.0) else {
            return;
        };
        let holder = std::mem::take(&mut obj.holder);
        match holder {
            ObjHolder::Nowhere => {}
            ObjHolder::Room(room) => {
                self.rooms[room.index()].contents.retain(|&id| id != obj_id);
            }
            ObjHolder::Char(ch) => {
                if let Some(ch) = self.chars.get_mut(ch.0) {
                    ch.carrying.retain(|&id| id != obj_id);
                    for slot in ch.equipment.iter_mut() {
                        if *slot == Some(obj_id) {
                            *slot = None;
                        }
                    }
                }
                if let Some(obj) = self.objs.get_mut(obj_id.0) {
                    obj.wear_loc = -1;
                }
            }
            ObjHolder::Obj(container) => {
                if let Some(container) = self.objs.get_mut(container.0) {
                    container.contains.retain(|&id| id != obj_id);
                }
            }
        }
    }

    pub fn obj_to_room(&mut self, obj_id: ObjId, room_id: RoomId) {
        self.obj_unhold(obj_id);
        if let Some(obj) = self.objs.get_mut(obj_id.0) {
            obj.holder = ObjHolder::Room(room_id);
            self.rooms[room_id.index()].contents.push(obj_id);
        }
    }

    pub fn obj_from_room(&mut self, obj_id: ObjId) {
        if matches!(
            self.obj(obj_id).map(|o| o.holder),
            Some(ObjHolder::Room(_))
        ) {
            self.obj_unhold(obj_id);
        }
    }

    pub fn obj_to_char(&mut self, obj_id: ObjId, ch_id: CharId) {
        self.obj_unhold(obj_id);
        if self.chars.get(ch_id.0).is_none() {
            return;
        }
        if let Some(obj) = self.objs.get_mut(obj_id.0) {
            obj.holder = ObjHolder::Char(ch_id);
        }
        if let Some(ch) = self.chars.get_mut(ch_id.0) {
            ch.carrying.push(obj_id);
        }
    }

    pub fn obj_from_char(&mut self, obj_id: ObjId) {
        if matches!(
            self.obj(obj_id).map(|o| o.holder),
            Some(ObjHolder::Char(_))
        ) {
            self.obj_unhold(obj_id);
        }
    }

    /// Nest an object inside a container. Refuses to create containment
    /// cycles (`A contains B contains A`).
    pub fn obj_to_obj(&mut self, obj_id: ObjId, container_id: ObjId) -> bool {
        if obj_id == container_id {
            log::error!("obj_to_obj: object {} into itself", obj_id.0);
            return false;
        }
        // Walk the container's holder chain; finding obj_id means a cycle.
        let mut cursor = Some(container_id);
        while let Some(cur) = cursor {
            if cur == obj_id {
                log::error!(
                    "obj_to_obj: containment cycle refused ({} into {})",
                    obj_id.0,
                    container_id.0
                );
                return false;
            }
            cursor = match self.obj(cur).map(|o| o.holder) {
                Some(ObjHolder::Obj(parent)) => Some(parent),
                _ => None,
            };
        }

        self.obj_unhold(obj_id);
        if self.objs.get(container_id.0).is_none() {
            return false;
        }
        if let Some(obj) = self.objs.get_mut(obj_id.0) {
            obj.holder = ObjHolder::Obj(container_id);
        }
        if let Some(container) = self.objs.get_mut(container_id.0) {
            container.contains.push(obj_id);
        }
        true
    }

    pub fn equip_char(&mut self, ch_id: CharId, obj_id: ObjId, slot: usize) {
        if slot >= core::constants::MAX_WEAR {
            log::warn!("equip_char: bad wear slot {slot}");
            return;
        }
        let already = self
            .ch(ch_id)
            .and_then(|ch| ch.equipment[slot])
            .is_some();
        if already {
            log::warn!("equip_char: slot {slot} occupied");
            return;
        }
        if !matches!(
            self.obj(obj_id).map(|o| o.holder),
            Some(ObjHolder::Char(id)) if id == ch_id
        ) {
            self.obj_to_char(obj_id, ch_id);
        }
        if let Some(obj) = self.objs.get_mut(obj_id.0) {
            obj.wear_loc = slot as i32;
        }
        if let Some(ch) = self.chars.get_mut(ch_id.0) {
            ch.equipment[slot] = Some(obj_id);
        }
    }

    /// Count live instances of a prototype inside a list of objects.
    pub fn count_obj_list(&self, vnum: Vnum, list: &[ObjId]) -> usize {
        list.iter()
            .filter(|&&id| self.obj(id).is_some_and(|o| o.vnum == vnum))
            .count()
    }

    // -----------------------------------------------------------------
    //  Extraction
    // -----------------------------------------------------------------

    /// Destroy an object instance and everything nested inside it.
    pub fn extract_obj(&mut self, obj_id: ObjId) {
        let contents = match self.obj(obj_id) {
            Some(obj) => obj.contains.clone(),
            None => return,
        };
        for inner in contents {
            self.extract_obj(inner);
        }
        self.obj_unhold(obj_id);
        if let Some(obj) = self.objs.remove(obj_id.0) {
            if let Some(proto) = self.obj_protos.get_mut(obj.proto.index()) {
                proto.count -= 1;
            }
        }
        self.obj_list.retain(|&id| id != obj_id);
    }

    /// Remove a character from the world. With `pull` the instance is
    /// destroyed and its inventory released; without it the character
    /// stays allocated (link-dead body, or about to move rooms).
    pub fn extract_char(&mut self, ch_id: CharId, pull: bool) {
        // Drop inventory into the room first so loot survives.
        let (room, carrying) = match self.ch(ch_id) {
            Some(ch) => (ch.in_room, ch.carrying.clone()),
            None => return,
        };
        if pull {
            for obj_id in carrying {
                match room {
                    Some(room_id) => self.obj_to_room(obj_id, room_id),
                    None => self.extract_obj(obj_id),
                }
            }
        }

        self.char_from_room(ch_id);

        // Untangle the relation graph: whoever references this character
        // loses the reference.
        let (master, followers, mount, rider) = match self.ch(ch_id) {
            Some(ch) => (
                ch.master,
                ch.followers.clone(),
                ch.mount,
                ch.rider,
            ),
            None => return,
        };
        if let Some(master) = master.and_then(|m| self.chars.get_mut(m.0)) {
            master.followers.retain(|&id| id != ch_id);
        }
        for follower in followers {
            if let Some(follower) = self.chars.get_mut(follower.0) {
                follower.master = None;
            }
        }
        if let Some(mount) = mount.and_then(|m| self.chars.get_mut(m.0)) {
            mount.rider = None;
        }
        if let Some(rider) = rider.and_then(|r| self.chars.get_mut(r.0)) {
            rider.mount = None;
        }
        for (_, other) in self.chars.iter_mut() {
            if other.fighting == Some(ch_id) {
                other.fighting = None;
                if other.position == Position::Fighting {
                    other.position = Position::Standing;
                }
            }
        }

        if pull {
            if let Some(ch) = self.chars.remove(ch_id.0) {
                if let Some(proto_id) = ch.proto {
                    self.mob_protos[proto_id.index()].count -= 1;
                }
                // Anything still held (equipment not pulled above) dies
                // with the body.
                for obj_id in ch.carrying {
                    self.extract_obj(obj_id);
                }
            }
            self.char_list.retain(|&id| id != ch_id);
        }
    }

    /// Find a playing character by canonical name (reconnect scan).
    pub fn find_player(&self, name: &str) -> Option<CharId> {
        self.char_list.iter().copied().find(|&id| {
            self.ch(id).is_some_and(|ch| {
                !ch.is_npc() && ch.name.eq_ignore_ascii_case(name)
            })
        })
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear interpolation over the mortal level span.
pub fn interpolate(level: i32, value_00: i32, value_32: i32) -> i32 {
    value_00 + level * (value_32 - value_00) / 32
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_world() -> (World, AreaId, RoomId, RoomId) {
        let mut world = World::new();
        world.areas.push(Area {
            filename: "test".into(),
            name: "Test Area".into(),
            lvnum: 3000,
            uvnum: 3099,
            recall: 3001,
            ..Area::default()
        });
        let area = AreaId(0);
        let r1 = world
            .add_room(Room {
                vnum: 3001,
                area,
                name: "Temple Square".into(),
                description: "A wide square.".into(),
                room_flags: RoomFlags::empty(),
                sector_type: 0,
                exits: Default::default(),
                extra_descr: Vec::new(),
                people: Vec::new(),
                contents: Vec::new(),
                scripts: Vec::new(),
            })
            .unwrap();
        let r2 = world
            .add_room(Room {
                vnum: 3002,
                area,
                name: "Market Street".into(),
                description: "Stalls everywhere.".into(),
                room_flags: RoomFlags::empty(),
                sector_type: 0,
                exits: Default::default(),
                extra_descr: Vec::new(),
                people: Vec::new(),
                contents: Vec::new(),
                scripts: Vec::new(),
            })
            .unwrap();
        world.add_mob_proto(MobProto {
            vnum: 3000,
            area,
            player_name: "guard cityguard".into(),
            short_descr: "a city guard".into(),
            long_descr: "A city guard stands here.\n".into(),
            description: "Tall and bored.".into(),
            act: ActFlags::IS_NPC,
            affected_by: AffectFlags::empty(),
            alignment: 0,
            level: 10,
            hitroll: 2,
            ac: 0,
            hit_dice: (2, 8, 10),
            dam_dice: (1, 6, 1),
            gold: 50,
            sex: Sex::Male,
            shop: None,
            special: None,
            scripts: Vec::new(),
            count: 0,
        });
        world.add_obj_proto(ObjProto {
            vnum: 3010,
            area,
            name: "sword long".into(),
            short_descr: "a long sword".into(),
            description: "A long sword lies here.".into(),
            item_type: ItemType::Weapon,
            extra_flags: ExtraFlags::empty(),
            wear_flags: WearFlags::TAKE | WearFlags::WIELD,
            value: [0, 4, 11, 0],
            weight: 10,
            cost: 100,
            extra_descr: Vec::new(),
            affects: Vec::new(),
            scripts: Vec::new(),
            count: 0,
        });
        world.add_obj_proto(ObjProto {
            vnum: 3011,
            area,
            name: "bag leather".into(),
            short_descr: "a leather bag".into(),
            description: "A leather bag lies here.".into(),
            item_type: ItemType::Container,
            extra_flags: ExtraFlags::empty(),
            wear_flags: WearFlags::TAKE,
            value: [100, 0, 0, 0],
            weight: 2,
            cost: 10,
            extra_descr: Vec::new(),
            affects: Vec::new(),
            scripts: Vec::new(),
            count: 0,
        });
        (world, area, r1, r2)
    }

    #[test]
    fn duplicate_vnum_rejected() {
        let (mut world, area, _, _) = test_world();
        let dup = Room {
            vnum: 3001,
            area,
            name: "Imposter".into(),
            description: String::new(),
            room_flags: RoomFlags::empty(),
            sector_type: 0,
            exits: Default::default(),
            extra_descr: Vec::new(),
            people: Vec::new(),
            contents: Vec::new(),
            scripts: Vec::new(),
        };
        assert!(world.add_room(dup).is_none());
        assert_eq!(world.rooms.len(), 2);
    }

    #[test]
    fn char_movement_tracks_player_count() {
        let (mut world, area, r1, r2) = test_world();
        let pc = CharId(world.chars.insert(Character {
            name: "Bob".into(),
            level: 5,
            ..Character::default()
        }));
        world.char_list.push(pc);

        world.char_to_room(pc, r1);
        assert_eq!(world.area(area).nplayer, 1);
        assert!(world.room(r1).people.contains(&pc));

        world.char_from_room(pc);
        world.char_to_room(pc, r2);
        assert_eq!(world.area(area).nplayer, 1);
        assert!(!world.room(r1).people.contains(&pc));
        assert!(world.room(r2).people.contains(&pc));
    }

    #[test]
    fn npc_does_not_count_as_player() {
        let (mut world, area, r1, _) = test_world();
        let proto = world.get_mob_index(3000).unwrap();
        let mob = world.create_mobile(proto);
        world.char_to_room(mob, r1);
        assert_eq!(world.area(area).nplayer, 0);
    }

    #[test]
    fn object_exclusive_containment() {
        let (mut world, _, r1, _) = test_world();
        let sword_proto = world.get_obj_index(3010).unwrap();
        let bag_proto = world.get_obj_index(3011).unwrap();
        let sword = world.create_object(sword_proto, 10);
        let bag = world.create_object(bag_proto, 0);
        let pc = CharId(world.chars.insert(Character::default()));

        world.obj_to_room(sword, r1);
        assert!(world.room(r1).contents.contains(&sword));

        world.obj_to_char(sword, pc);
        assert!(!world.room(r1).contents.contains(&sword));
        assert!(world.ch(pc).unwrap().carrying.contains(&sword));

        assert!(world.obj_to_obj(sword, bag));
        assert!(!world.ch(pc).unwrap().carrying.contains(&sword));
        assert!(world.obj(bag).unwrap().contains.contains(&sword));
        assert_eq!(
            world.obj(sword).unwrap().holder,
            ObjHolder::Obj(bag)
        );
    }

    #[test]
    fn containment_cycle_refused() {
        let (mut world, _, _, _) = test_world();
        let bag_proto = world.get_obj_index(3011).unwrap();
        let outer = world.create_object(bag_proto, 0);
        let inner = world.create_object(bag_proto, 0);
        assert!(world.obj_to_obj(inner, outer));
        assert!(!world.obj_to_obj(outer, inner));
        assert!(!world.obj_to_obj(outer, outer));
        // The refused transfer must not have detached the container.
        assert_eq!(world.obj(inner).unwrap().holder, ObjHolder::Obj(outer));
    }

    #[test]
    fn extract_char_drops_inventory() {
        let (mut world, _, r1, _) = test_world();
        let proto = world.get_mob_index(3000).unwrap();
        let sword_proto = world.get_obj_index(3010).unwrap();
        let mob = world.create_mobile(proto);
        world.char_to_room(mob, r1);
        let sword = world.create_object(sword_proto, 5);
        world.obj_to_char(sword, mob);

        world.extract_char(mob, true);
        assert!(world.ch(mob).is_none());
        assert!(world.room(r1).contents.contains(&sword));
        assert_eq!(world.mob_protos[proto.index()].count, 0);
    }

    #[test]
    fn extract_obj_destroys_nested_contents() {
        let (mut world, _, r1, _) = test_world();
        let bag_proto = world.get_obj_index(3011).unwrap();
        let sword_proto = world.get_obj_index(3010).unwrap();
        let bag = world.create_object(bag_proto, 0);
        let sword = world.create_object(sword_proto, 5);
        world.obj_to_room(bag, r1);
        world.obj_to_obj(sword, bag);

        world.extract_obj(bag);
        assert!(world.obj(bag).is_none());
        assert!(world.obj(sword).is_none());
        assert_eq!(world.obj_protos[bag_proto.index()].count, 0);
        assert_eq!(world.obj_protos[sword_proto.index()].count, 0);
    }

    #[test]
    fn extract_clears_fighting_references() {
        let (mut world, _, r1, _) = test_world();
        let proto = world.get_mob_index(3000).unwrap();
        let a = world.create_mobile(proto);
        let b = world.create_mobile(proto);
        world.char_to_room(a, r1);
        world.char_to_room(b, r1);
        world.ch_mut(a).unwrap().fighting = Some(b);
        world.ch_mut(a).unwrap().position = Position::Fighting;

        world.extract_char(b, true);
        let a_ref = world.ch(a).unwrap();
        assert_eq!(a_ref.fighting, None);
        assert_eq!(a_ref.position, Position::Standing);
    }
}
