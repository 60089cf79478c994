//! The `act` formatter: room-scoped messages with `$`-placeholder
//! substitution over a typed argument context.

use core::string_operations::one_argument;

use crate::net::Descriptors;
use crate::world::types::{CharId, ObjId, Position, Sex};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActTarget {
    /// Only the actor.
    ToChar,
    /// Only the victim.
    ToVict,
    /// Everyone in the actor's room except the actor.
    ToRoom,
    /// Everyone except actor and victim.
    ToNotVict,
}

/// Typed substitution context; placeholders that reference a missing
/// argument render as a visible sentinel rather than crashing the
/// pulse.
#[derive(Default, Clone, Copy)]
pub struct ActArgs<'a> {
    pub vict: Option<CharId>,
    pub obj1: Option<ObjId>,
    pub obj2: Option<ObjId>,
    pub text1: Option<&'a str>,
    pub text2: Option<&'a str>,
}

const MISSING: &str = " <@@@> ";

fn he_she(sex: Sex) -> &'static str {
    match sex {
        Sex::Male => "he",
        Sex::Female => "she",
        Sex::Neutral => "it",
    }
}

fn him_her(sex: Sex) -> &'static str {
    match sex {
        Sex::Male => "him",
        Sex::Female => "her",
        Sex::Neutral => "it",
    }
}

fn his_her(sex: Sex) -> &'static str {
    match sex {
        Sex::Male => "his",
        Sex::Female => "her",
        Sex::Neutral => "its",
    }
}

/// How `to` perceives `who`: NPCs show their short description, players
/// their name. (Visibility checks belong to gameplay code.)
fn pers(world: &World, who: CharId) -> String {
    world
        .ch(who)
        .map(|ch| {
            if ch.is_npc() {
                ch.short_descr.clone()
            } else {
                ch.name.clone()
            }
        })
        .unwrap_or_else(|| "someone".to_string())
}

fn obj_name(world: &World, obj: Option<ObjId>) -> String {
    obj.and_then(|id| world.obj(id))
        .map(|o| o.short_descr.clone())
        .unwrap_or_else(|| "something".to_string())
}

fn expand(world: &World, format: &str, ch: CharId, args: &ActArgs) -> String {
    let mut out = String::with_capacity(format.len() + 16);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let Some(code) = chars.next() else {
            out.push('$');
            break;
        };
        let ch_sex = world.ch(ch).map(|c| c.sex).unwrap_or_default();
        let vict_sex = args
            .vict
            .and_then(|v| world.ch(v))
            .map(|c| c.sex)
            .unwrap_or_default();
        match code {
            'n' => out.push_str(&pers(world, ch)),
            'N' => match args.vict {
                Some(vict) => out.push_str(&pers(world, vict)),
                None => out.push_str(MISSING),
            },
            'e' => out.push_str(he_she(ch_sex)),
            'E' => out.push_str(he_she(vict_sex)),
            'm' => out.push_str(him_her(ch_sex)),
            'M' => out.push_str(him_her(vict_sex)),
            's' => out.push_str(his_her(ch_sex)),
            'S' => out.push_str(his_her(vict_sex)),
            'p' => out.push_str(&obj_name(world, args.obj1)),
            'P' => out.push_str(&obj_name(world, args.obj2)),
            't' => out.push_str(args.text1.unwrap_or(MISSING)),
            'T' => out.push_str(args.text2.unwrap_or(MISSING)),
            'd' => match args.text2 {
                Some(text) if !text.is_empty() => {
                    let (word, _) = one_argument(text);
                    out.push_str(&word);
                }
                _ => out.push_str("door"),
            },
            other => {
                log::warn!("act: bad code ${other}");
                out.push_str(MISSING);
            }
        }
    }

    // Capitalize the first visible character.
    let mut chars = out.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => out,
    }
}

/// Format and deliver to the selected audience. Recipients without a
/// descriptor or asleep hear nothing.
pub fn act(
    world: &World,
    descriptors: &mut Descriptors,
    format: &str,
    ch: CharId,
    args: ActArgs,
    target: ActTarget,
) {
    if format.is_empty() {
        return;
    }

    let room = match target {
        ActTarget::ToVict => args.vict.and_then(|v| world.ch(v)).and_then(|v| v.in_room),
        _ => world.ch(ch).and_then(|c| c.in_room),
    };
    let Some(room) = room else {
        return;
    };

    let line = expand(world, format, ch, &args) + "\r\n";

    for &to in &world.room(room).people {
        let keep = match target {
            ActTarget::ToChar => to == ch,
            ActTarget::ToVict => Some(to) == args.vict && to != ch,
            ActTarget::ToRoom => to != ch,
            ActTarget::ToNotVict => to != ch && Some(to) != args.vict,
        };
        if !keep {
            continue;
        }
        let Some(to_ch) = world.ch(to) else { continue };
        if to_ch.position <= Position::Sleeping {
            continue;
        }
        let Some(desc) = to_ch.desc else { continue };
        descriptors.write(desc, &line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::types::*;

    fn setup() -> (World, CharId, CharId) {
        let mut world = World::new();
        world.areas.push(Area::default());
        let room = world
            .add_room(Room {
                vnum: 1,
                area: AreaId(0),
                name: "Somewhere".into(),
                description: String::new(),
                room_flags: RoomFlags::empty(),
                sector_type: 0,
                exits: Default::default(),
                extra_descr: Vec::new(),
                people: Vec::new(),
                contents: Vec::new(),
                scripts: Vec::new(),
            })
            .unwrap();
        let actor = CharId(world.chars.insert(Character {
            name: "Bob".into(),
            sex: Sex::Male,
            ..Character::default()
        }));
        let vict = CharId(world.chars.insert(Character {
            name: "Alice".into(),
            sex: Sex::Female,
            ..Character::default()
        }));
        world.char_list.extend([actor, vict]);
        world.char_to_room(actor, room);
        world.char_to_room(vict, room);
        (world, actor, vict)
    }

    #[test]
    fn expands_actor_and_victim() {
        let (world, actor, vict) = setup();
        let out = expand(
            &world,
            "$n waves at $N; $e grins, $s hat tilts.",
            actor,
            &ActArgs {
                vict: Some(vict),
                ..ActArgs::default()
            },
        );
        assert_eq!(out, "Bob waves at Alice; he grins, his hat tilts.");
    }

    #[test]
    fn victim_pronouns() {
        let (world, actor, vict) = setup();
        let out = expand(
            &world,
            "$N drops $S cloak; $n hands it to $M.",
            actor,
            &ActArgs {
                vict: Some(vict),
                ..ActArgs::default()
            },
        );
        assert_eq!(out, "Alice drops her cloak; Bob hands it to her.");
    }

    #[test]
    fn missing_argument_is_visible_not_fatal() {
        let (world, actor, _) = setup();
        let out = expand(&world, "$n pokes $N.", actor, &ActArgs::default());
        assert!(out.contains("<@@@>"));
    }

    #[test]
    fn door_placeholder_takes_first_word() {
        let (world, actor, _) = setup();
        let out = expand(
            &world,
            "$n closes the $d.",
            actor,
            &ActArgs {
                text2: Some("gate iron"),
                ..ActArgs::default()
            },
        );
        assert_eq!(out, "Bob closes the gate.");
        let out = expand(&world, "$n closes the $d.", actor, &ActArgs::default());
        assert_eq!(out, "Bob closes the door.");
    }

    #[test]
    fn first_character_capitalized() {
        let (world, actor, _) = setup();
        let out = expand(&world, "$e stretches.", actor, &ActArgs::default());
        assert_eq!(out, "He stretches.");
    }
}
