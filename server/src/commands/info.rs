//! Information commands: look, score, who, areas, and the personal
//! settings (alias, prompt, title).

use core::string_operations::{is_name, one_argument};

use crate::game_loop::Server;
use crate::world::types::{CharId, ExitFlags, Position};

pub fn do_look(srv: &mut Server, ch_id: CharId, args: &str) {
    let Some(room_id) = srv.world.ch(ch_id).and_then(|ch| ch.in_room) else {
        srv.send_to_char(ch_id, "You are floating in a void.\r\n");
        return;
    };

    let (keyword, _) = one_argument(args);
    if !keyword.is_empty() && keyword != "auto" {
        look_at(srv, ch_id, room_id, &keyword);
        return;
    }

    let mut out = String::new();
    {
        let room = srv.world.room(room_id);
        out.push_str(&format!("#C{}#n\r\n", room.name));
        out.push_str(&format!("  {}\r\n", room.description.trim_end()));

        let exits: Vec<&str> = room
            .exits
            .iter()
            .enumerate()
            .filter_map(|(dir, exit)| {
                exit.as_ref()
                    .filter(|e| e.to_room.is_some() && !e.flags.contains(ExitFlags::CLOSED))
                    .map(|_| crate::world::types::DIR_NAMES[dir])
            })
            .collect();
        out.push_str(&format!("\r\n#c[Exits: {}]#n\r\n", if exits.is_empty() {
            "none".to_string()
        } else {
            exits.join(" ")
        }));

        for &obj_id in &room.contents {
            if let Some(obj) = srv.world.obj(obj_id) {
                out.push_str(&format!("     {}\r\n", obj.description));
            }
        }
        for &other_id in &room.people {
            if other_id == ch_id {
                continue;
            }
            let Some(other) = srv.world.ch(other_id) else {
                continue;
            };
            if other.is_npc() {
                out.push_str(&other.long_descr.trim_end().to_string());
                out.push_str("\r\n");
            } else {
                let title = other
                    .pcdata
                    .as_ref()
                    .map(|p| p.title.clone())
                    .unwrap_or_default();
                let state = match other.position {
                    Position::Sleeping => " is sleeping here.",
                    Position::Resting => " is resting here.",
                    _ => " is here.",
                };
                out.push_str(&format!("{}{}{}\r\n", other.name, title, state));
            }
        }
    }
    srv.send_to_char(ch_id, &out);
}

/// `look <keyword>`: extra descriptions, then objects, then people.
fn look_at(srv: &mut Server, ch_id: CharId, room_id: crate::world::types::RoomId, keyword: &str) {
    let message = {
        let world = &srv.world;
        let room = world.room(room_id);
        let carried = world
            .ch(ch_id)
            .map(|ch| ch.carrying.clone())
            .unwrap_or_default();

        let from_extra = room
            .extra_descr
            .iter()
            .find(|ed| is_name(keyword, &ed.keyword))
            .map(|ed| format!("{}\r\n", ed.description.trim_end()));

        let from_objects = || {
            carried
                .iter()
                .chain(room.contents.iter())
                .filter_map(|&obj_id| world.obj(obj_id))
                .find(|obj| is_name(keyword, &obj.name))
                .map(|obj| {
                    obj.extra_descr
                        .iter()
                        .find(|ed| is_name(keyword, &ed.keyword))
                        .map(|ed| format!("{}\r\n", ed.description.trim_end()))
                        .unwrap_or_else(|| format!("{}\r\n", obj.description))
                })
        };

        let from_people = || {
            room.people
                .iter()
                .filter_map(|&other_id| world.ch(other_id))
                .find(|other| is_name(keyword, &other.name))
                .map(|other| {
                    if other.description.is_empty() {
                        "You see nothing special about them.\r\n".to_string()
                    } else {
                        format!("{}\r\n", other.description.trim_end())
                    }
                })
        };

        from_extra
            .or_else(from_objects)
            .or_else(from_people)
            .unwrap_or_else(|| "You do not see that here.\r\n".to_string())
    };
    srv.send_to_char(ch_id, &message);
}

pub fn do_score(srv: &mut Server, ch_id: CharId, _args: &str) {
    let Some(ch) = srv.world.ch(ch_id) else { return };
    let title = ch
        .pcdata
        .as_ref()
        .map(|p| p.title.clone())
        .unwrap_or_default();
    let out = format!(
        "You are {}{}, level {}.\r\n\
         You have {}/{} hit, {}/{} mana, {}/{} movement.\r\n\
         Gold: {}   Experience: {}   Practices: {}\r\n\
         Alignment: {}   Armor: {}\r\n",
        ch.name,
        title,
        ch.level,
        ch.hit,
        ch.max_hit,
        ch.mana,
        ch.max_mana,
        ch.move_points,
        ch.max_move,
        ch.gold,
        ch.exp,
        ch.practice,
        ch.alignment,
        ch.armor,
    );
    srv.send_to_char(ch_id, &out);
}

pub fn do_who(srv: &mut Server, ch_id: CharId, _args: &str) {
    let mut out = String::from("#CPlayers online:#n\r\n");
    let mut count = 0;
    for &other_id in &srv.world.char_list {
        let Some(other) = srv.world.ch(other_id) else {
            continue;
        };
        if other.is_npc() {
            continue;
        }
        let link = if other.desc.is_none() { " #R[link-dead]#n" } else { "" };
        let title = other
            .pcdata
            .as_ref()
            .map(|p| p.title.clone())
            .unwrap_or_default();
        out.push_str(&format!(
            "[{:2}] {}{}{}\r\n",
            other.level, other.name, title, link
        ));
        count += 1;
    }
    out.push_str(&format!("\r\n{count} visible.\r\n"));
    srv.send_to_char(ch_id, &out);
}

pub fn do_areas(srv: &mut Server, ch_id: CharId, _args: &str) {
    let mut out = String::from("#CAreas:#n\r\n");
    for area in &srv.world.areas {
        if area.is_hidden {
            continue;
        }
        out.push_str(&format!(
            "{:<30} [{:6}..{:6}] {} players\r\n",
            area.name, area.lvnum, area.uvnum, area.nplayer
        ));
    }
    srv.send_to_char(ch_id, &out);
}

pub fn do_commands(srv: &mut Server, ch_id: CharId, _args: &str) {
    let trust = super::get_trust(srv, ch_id);
    let mut out = String::new();
    let mut col = 0;
    for entry in super::COMMANDS {
        if entry.trust > trust {
            continue;
        }
        out.push_str(&format!("{:<12}", entry.name));
        col += 1;
        if col % 6 == 0 {
            out.push_str("\r\n");
        }
    }
    if col % 6 != 0 {
        out.push_str("\r\n");
    }
    srv.send_to_char(ch_id, &out);
}

/// `alias` lists; `alias word` clears; `alias word expansion` sets.
/// Expansion is single-shot at dispatch, so self-reference is safe.
pub fn do_alias(srv: &mut Server, ch_id: CharId, args: &str) {
    let (word, expansion) = one_argument(args);

    let Some(pcdata) = srv
        .world
        .ch_mut(ch_id)
        .and_then(|ch| ch.pcdata.as_mut())
    else {
        return;
    };

    if word.is_empty() {
        let listing = if pcdata.aliases.is_empty() {
            "You have no aliases defined.\r\n".to_string()
        } else {
            let mut out = String::from("Your aliases:\r\n");
            for (short, long) in &pcdata.aliases {
                out.push_str(&format!("  {short:<10} -> {long}\r\n"));
            }
            out
        };
        srv.send_to_char(ch_id, &listing);
        return;
    }

    if expansion.is_empty() {
        let before = pcdata.aliases.len();
        pcdata.aliases.retain(|(short, _)| !short.eq_ignore_ascii_case(&word));
        let msg = if pcdata.aliases.len() < before {
            format!("Alias '{word}' removed.\r\n")
        } else {
            format!("No alias '{word}' to remove.\r\n")
        };
        srv.send_to_char(ch_id, &msg);
        return;
    }

    pcdata
        .aliases
        .retain(|(short, _)| !short.eq_ignore_ascii_case(&word));
    pcdata.aliases.push((word.clone(), expansion.to_string()));
    srv.send_to_char(
        ch_id,
        &format!("Alias '{word}' set to '{expansion}'.\r\n"),
    );
}

pub fn do_prompt(srv: &mut Server, ch_id: CharId, args: &str) {
    let template = core::string_operations::smash_tilde(args.trim());
    if let Some(pcdata) = srv.world.ch_mut(ch_id).and_then(|ch| ch.pcdata.as_mut()) {
        pcdata.prompt = template.clone();
    }
    let msg = if template.is_empty() {
        "Prompt reset to default.\r\n".to_string()
    } else {
        format!("Prompt set to '{template}'.\r\n")
    };
    srv.send_to_char(ch_id, &msg);
}

pub fn do_title(srv: &mut Server, ch_id: CharId, args: &str) {
    let title = core::string_operations::smash_tilde(args.trim_end());
    let title = if title.is_empty() {
        String::new()
    } else if title.starts_with([',', '.', ';', ' ']) {
        title
    } else {
        format!(" {title}")
    };
    if let Some(pcdata) = srv.world.ch_mut(ch_id).and_then(|ch| ch.pcdata.as_mut()) {
        pcdata.title = title;
    }
    srv.send_to_char(ch_id, "Ok.\r\n");
}
