//! Scheduled world-update phases: the game clock and weather walk,
//! character regeneration and idle timers, object decay, affect expiry,
//! and the aggression sweep.
//!
//! Phases mutate the world and report what the connection layer should
//! tell players; nothing here touches descriptors directly.

use core::constants::{LINKDEAD_TIMEOUT, PULSE_PER_SECOND, PULSE_TICK};

use crate::rng::number_range;

use super::types::*;
use super::World;

/// What a pass of the updaters wants said and done.
#[derive(Debug, Default)]
pub struct UpdateEvents {
    /// Per-character messages (weather, decay warnings).
    pub messages: Vec<(CharId, String)>,
    /// Link-dead characters whose idle timer expired; the caller saves
    /// and extracts them.
    pub idle_out: Vec<CharId>,
}

/// Derive the boot-time game clock from the wall clock, and the weather
/// from the clock.
pub fn boot_time(world: &mut World, epoch_seconds: i64) {
    let lhour = (epoch_seconds - 650_336_715) / (PULSE_TICK / PULSE_PER_SECOND) as i64;
    world.time.hour = (lhour % 24) as i32;
    let lday = lhour / 24;
    world.time.day = (lday % 35) as i32;
    let lmonth = lday / 35;
    world.time.month = (lmonth % 17) as i32;
    world.time.year = (lmonth / 17) as i32;

    world.weather.sunlight = match world.time.hour {
        0..=4 => SUN_DARK,
        5 => SUN_RISE,
        6..=18 => SUN_LIGHT,
        19 => SUN_SET,
        _ => SUN_DARK,
    };
    world.weather.change = 0;
    world.weather.mmhg = 960
        + if (7..=12).contains(&world.time.month) {
            number_range(1, 50)
        } else {
            number_range(1, 80)
        };
    world.weather.sky = match world.weather.mmhg {
        i32::MIN..=980 => SKY_LIGHTNING,
        981..=1000 => SKY_RAINING,
        1001..=1020 => SKY_CLOUDY,
        _ => SKY_CLOUDLESS,
    };
}

/// Advance the clock one game hour and walk the barometer. Returns the
/// ambient messages for outdoor players.
pub fn weather_update(world: &mut World) -> Vec<String> {
    let mut messages = Vec::new();

    world.time.hour += 1;
    match world.time.hour {
        5 => {
            world.weather.sunlight = SUN_RISE;
            messages.push("The day has begun.".to_string());
        }
        6 => {
            world.weather.sunlight = SUN_LIGHT;
            messages.push("The sun rises in the east.".to_string());
        }
        19 => {
            world.weather.sunlight = SUN_SET;
            messages.push("The sun slowly disappears in the west.".to_string());
        }
        20 => {
            world.weather.sunlight = SUN_DARK;
            messages.push("The night has begun.".to_string());
        }
        _ => {}
    }
    if world.time.hour >= 24 {
        world.time.hour = 0;
        world.time.day += 1;
    }
    if world.time.day >= 35 {
        world.time.day = 0;
        world.time.month += 1;
    }
    if world.time.month >= 17 {
        world.time.month = 0;
        world.time.year += 1;
    }

    // Pressure random-walk, seasonal drift included.
    let diff = if world.weather.mmhg > 1010
        || (world.weather.mmhg > 990 && (7..=12).contains(&world.time.month))
    {
        -2
    } else {
        2
    };
    world.weather.change += diff * number_range(1, 4) + number_range(2, 6) - number_range(2, 6);
    world.weather.change = world.weather.change.clamp(-12, 12);
    world.weather.mmhg += world.weather.change;
    world.weather.mmhg = world.weather.mmhg.clamp(960, 1040);

    let sky = world.weather.sky;
    let (new_sky, msg) = match sky {
        SKY_CLOUDLESS if world.weather.mmhg < 990 || (world.weather.mmhg < 1010 && number_range(0, 1) == 1) => {
            (SKY_CLOUDY, Some("The sky is getting cloudy."))
        }
        SKY_CLOUDY if world.weather.mmhg < 970 || (world.weather.mmhg < 990 && number_range(0, 1) == 1) => {
            (SKY_RAINING, Some("It starts to rain."))
        }
        SKY_CLOUDY if world.weather.mmhg > 1030 && number_range(0, 1) == 1 => {
            (SKY_CLOUDLESS, Some("The clouds disappear."))
        }
        SKY_RAINING if world.weather.mmhg < 970 && number_range(0, 3) == 3 => {
            (SKY_LIGHTNING, Some("Lightning flashes in the sky."))
        }
        SKY_RAINING if world.weather.mmhg > 1030 || (world.weather.mmhg > 1010 && number_range(0, 1) == 1) => {
            (SKY_CLOUDY, Some("The rain stopped."))
        }
        SKY_LIGHTNING if world.weather.mmhg > 1010 || (world.weather.mmhg > 990 && number_range(0, 1) == 1) => {
            (SKY_RAINING, Some("The lightning has stopped."))
        }
        other => (other, None),
    };
    world.weather.sky = new_sky;
    if let Some(msg) = msg {
        messages.push(msg.to_string());
    }

    messages
}

/// Tick every character: regeneration, hunger/thirst, idle timers.
pub fn char_update(world: &mut World) -> UpdateEvents {
    let mut events = UpdateEvents::default();
    let ids: Vec<CharId> = world.char_list.clone();

    for ch_id in ids {
        let Some(ch) = world.ch_mut(ch_id) else {
            continue;
        };

        // Regeneration scales with position.
        let gain = match ch.position {
            Position::Sleeping => 3,
            Position::Resting => 2,
            _ => 1,
        } * (ch.level / 2 + 2);
        ch.hit = (ch.hit + gain).min(ch.max_hit);
        ch.mana = (ch.mana + gain).min(ch.max_mana);
        ch.move_points = (ch.move_points + gain).min(ch.max_move);

        if ch.is_npc() {
            continue;
        }

        // Hunger and thirst tick down toward zero.
        if let Some(pcdata) = ch.pcdata.as_mut() {
            for cond in pcdata.condition.iter_mut().take(2) {
                if *cond > 0 {
                    *cond -= 1;
                }
            }
            let hungry = pcdata.condition[0] == 1;
            let thirsty = pcdata.condition[1] == 1;
            if hungry {
                events
                    .messages
                    .push((ch_id, "You are hungry.".to_string()));
            }
            if thirsty {
                events
                    .messages
                    .push((ch_id, "You are thirsty.".to_string()));
            }
        }

        // Link-dead bodies are extracted after the idle window.
        if ch.desc.is_none() && ch.timer * PULSE_TICK >= LINKDEAD_TIMEOUT {
            events.idle_out.push(ch_id);
        } else if ch.desc.is_none() {
            ch.timer += 1;
        }
    }

    events
}

/// Decay timed objects; nested contents spill out where the container
/// stood.
pub fn obj_update(world: &mut World) -> UpdateEvents {
    let mut events = UpdateEvents::default();
    let ids: Vec<ObjId> = world.obj_list.clone();

    for obj_id in ids {
        let Some(obj) = world.obj_mut(obj_id) else {
            continue;
        };
        if obj.timer <= 0 {
            continue;
        }
        obj.timer -= 1;
        if obj.timer > 0 {
            continue;
        }

        let message = match obj.item_type {
            ItemType::CorpseNpc | ItemType::CorpsePc => {
                format!("{} decays into dust.", obj.short_descr)
            }
            ItemType::Food => format!("{} decomposes.", obj.short_descr),
            _ => format!("{} crumbles into dust.", obj.short_descr),
        };

        // Spill contents before the container vanishes.
        let (holder, contents) = (obj.holder, obj.contains.clone());
        if let ObjHolder::Room(room_id) = holder {
            for inner in contents {
                world.obj_to_room(inner, room_id);
            }
            for &watcher in &world.rooms[room_id.index()].people.clone() {
                events.messages.push((watcher, message.clone()));
            }
        }
        world.extract_obj(obj_id);
    }

    events
}

/// Expire timed affects, restoring the modifier they applied.
pub fn affect_update(world: &mut World) -> UpdateEvents {
    let mut events = UpdateEvents::default();
    let ids: Vec<CharId> = world.char_list.clone();

    for ch_id in ids {
        let Some(ch) = world.ch_mut(ch_id) else {
            continue;
        };
        let mut expired = Vec::new();
        for affect in ch.affects.iter_mut() {
            if affect.duration > 0 {
                affect.duration -= 1;
            } else {
                expired.push(affect.skill.clone());
            }
        }
        if expired.is_empty() {
            continue;
        }
        ch.affects.retain(|a| a.duration > 0);
        let bits: u32 = ch.affects.iter().fold(0, |acc, a| acc | a.bitvector);
        ch.affected_by = AffectFlags::from_bits_retain(bits);
        for skill in expired {
            if !skill.is_empty() && ch.desc.is_some() {
                events
                    .messages
                    .push((ch_id, format!("The {skill} wears off.")));
            }
        }
    }

    events
}

/// Aggressive mobs pick a fight with a player in the room. Combat math
/// itself lives in gameplay code; the core only establishes the pair.
pub fn aggro_update(world: &mut World) {
    let ids: Vec<CharId> = world.char_list.clone();
    for mob_id in ids {
        let Some(mob) = world.ch(mob_id) else {
            continue;
        };
        if !mob.is_npc()
            || !mob.act.contains(ActFlags::AGGRESSIVE)
            || mob.fighting.is_some()
            || mob.position < Position::Standing
        {
            continue;
        }
        let Some(room_id) = mob.in_room else {
            continue;
        };
        let victim = world.rooms[room_id.index()]
            .people
            .iter()
            .copied()
            .find(|&id| {
                world.ch(id).is_some_and(|ch| {
                    !ch.is_npc() && !ch.is_immortal() && ch.position > Position::Sleeping
                })
            });
        if let Some(victim) = victim {
            if let Some(mob) = world.ch_mut(mob_id) {
                mob.fighting = Some(victim);
                mob.position = Position::Fighting;
            }
        }
    }
}

/// The violence pulse keeps fighting pairs consistent: a vanished or
/// relocated opponent ends the fight.
pub fn violence_update(world: &mut World) {
    let ids: Vec<CharId> = world.char_list.clone();
    for ch_id in ids {
        let Some(ch) = world.ch(ch_id) else {
            continue;
        };
        let Some(victim) = ch.fighting else {
            continue;
        };
        let same_room = world
            .ch(victim)
            .and_then(|v| v.in_room)
            .is_some_and(|r| Some(r) == ch.in_room);
        if !same_room {
            if let Some(ch) = world.ch_mut(ch_id) {
                ch.fighting = None;
                if ch.position == Position::Fighting {
                    ch.position = Position::Standing;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_world;
    use super::*;

    #[test]
    fn regeneration_caps_at_max() {
        let (mut world, _, r1, _) = test_world();
        let pc = CharId(world.chars.insert(Character {
            name: "Bob".into(),
            level: 4,
            hit: 10,
            max_hit: 12,
            desc: Some(DescId(0)),
            pcdata: Some(PcData::default()),
            ..Character::default()
        }));
        world.char_list.push(pc);
        world.char_to_room(pc, r1);

        char_update(&mut world);
        assert_eq!(world.ch(pc).unwrap().hit, 12);
    }

    #[test]
    fn linkdead_extraction_after_timeout() {
        let (mut world, _, r1, _) = test_world();
        let pc = CharId(world.chars.insert(Character {
            name: "Bob".into(),
            desc: None,
            pcdata: Some(PcData::default()),
            ..Character::default()
        }));
        world.char_list.push(pc);
        world.char_to_room(pc, r1);
        world.ch_mut(pc).unwrap().timer = LINKDEAD_TIMEOUT / PULSE_TICK + 1;

        let events = char_update(&mut world);
        assert_eq!(events.idle_out, vec![pc]);
    }

    #[test]
    fn decayed_container_spills_contents() {
        let (mut world, _, r1, _) = test_world();
        let bag_proto = world.get_obj_index(3011).unwrap();
        let sword_proto = world.get_obj_index(3010).unwrap();
        let bag = world.create_object(bag_proto, 0);
        let sword = world.create_object(sword_proto, 5);
        world.obj_to_room(bag, r1);
        world.obj_to_obj(sword, bag);
        world.obj_mut(bag).unwrap().timer = 1;

        obj_update(&mut world);
        assert!(world.obj(bag).is_none());
        assert!(world.room(r1).contents.contains(&sword));
    }

    #[test]
    fn affects_expire_and_clear_bits() {
        let (mut world, _, _, _) = test_world();
        let pc = CharId(world.chars.insert(Character {
            affects: vec![Affect {
                skill: "sneak".into(),
                duration: 0,
                bitvector: AffectFlags::SNEAK.bits(),
                ..Affect::default()
            }],
            affected_by: AffectFlags::SNEAK,
            desc: Some(DescId(0)),
            ..Character::default()
        }));
        world.char_list.push(pc);

        let events = affect_update(&mut world);
        let ch = world.ch(pc).unwrap();
        assert!(ch.affects.is_empty());
        assert!(!ch.affected_by.contains(AffectFlags::SNEAK));
        assert!(events
            .messages
            .iter()
            .any(|(id, m)| *id == pc && m.contains("sneak")));
    }

    #[test]
    fn game_clock_rolls_over() {
        let (mut world, _, _, _) = test_world();
        world.time = TimeInfo {
            hour: 23,
            day: 34,
            month: 16,
            year: 4,
        };
        weather_update(&mut world);
        assert_eq!(world.time.hour, 0);
        assert_eq!(world.time.day, 0);
        assert_eq!(world.time.month, 0);
        assert_eq!(world.time.year, 5);
    }

    #[test]
    fn aggressive_mob_engages_player() {
        let (mut world, _, r1, _) = test_world();
        let proto = world.get_mob_index(3000).unwrap();
        let mob = world.create_mobile(proto);
        world.ch_mut(mob).unwrap().act |= ActFlags::AGGRESSIVE;
        world.char_to_room(mob, r1);
        let pc = CharId(world.chars.insert(Character {
            name: "Bob".into(),
            ..Character::default()
        }));
        world.char_list.push(pc);
        world.char_to_room(pc, r1);

        aggro_update(&mut world);
        assert_eq!(world.ch(mob).unwrap().fighting, Some(pc));

        // Victim walks away: violence pulse drops the fight.
        world.char_from_room(pc);
        violence_update(&mut world);
        assert_eq!(world.ch(mob).unwrap().fighting, None);
    }
}
