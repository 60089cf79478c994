//! Staff commands: teleport, inspection, runtime switches, and the
//! lifecycle controls (copyover, shutdown).

use core::string_operations::{is_number, one_argument};

use crate::act::{act, ActArgs, ActTarget};
use crate::game_loop::Server;
use crate::world::types::CharId;

pub fn do_goto(srv: &mut Server, ch_id: CharId, args: &str) {
    let (target, _) = one_argument(args);
    if !is_number(&target) {
        srv.send_to_char(ch_id, "Goto which vnum?\r\n");
        return;
    }
    let vnum = target.parse().unwrap_or(0);
    let Some(room_id) = srv.world.get_room_index(vnum) else {
        srv.send_to_char(ch_id, "No such room.\r\n");
        return;
    };

    act(
        &srv.world,
        &mut srv.descriptors,
        "$n disappears in a puff of smoke.",
        ch_id,
        ActArgs::default(),
        ActTarget::ToRoom,
    );
    srv.world.char_from_room(ch_id);
    srv.world.char_to_room(ch_id, room_id);
    act(
        &srv.world,
        &mut srv.descriptors,
        "$n appears in a puff of smoke.",
        ch_id,
        ActArgs::default(),
        ActTarget::ToRoom,
    );
    super::do_look(srv, ch_id, "auto");
}

pub fn do_stat(srv: &mut Server, ch_id: CharId, _args: &str) {
    let out = format!(
        "Areas: {}   Rooms: {}   Mob protos: {}   Obj protos: {}\r\n\
         Characters: {}   Objects: {}   Descriptors: {}\r\n\
         Pulse: {}   Speed: x{}   Pending saves: {}\r\n",
        srv.world.areas.len(),
        srv.world.rooms.len(),
        srv.world.mob_protos.len(),
        srv.world.obj_protos.len(),
        srv.world.char_list.len(),
        srv.world.obj_list.len(),
        srv.descriptors.len(),
        srv.pulse,
        srv.speed_multiplier,
        srv.saver.pending_count(),
    );
    srv.send_to_char(ch_id, &out);
}

pub fn do_profile(srv: &mut Server, ch_id: CharId, _args: &str) {
    let snapshot = srv.profiler.snapshot();
    let over = srv.profiler.pulses_over;
    let seen = srv.profiler.pulses_seen;
    let mut out = format!(
        "Pulses: {seen} total, {over} over budget.\r\nTop markers since last snapshot:\r\n"
    );
    for (name, duration) in snapshot.iter().take(10) {
        out.push_str(&format!(
            "  {:<20} {:>9.2}ms\r\n",
            name,
            duration.as_secs_f64() * 1000.0
        ));
    }
    srv.send_to_char(ch_id, &out);
}

/// Runtime pulse-speed multiplier (1..=512) for accelerated testing:
/// all timers are pulse-denominated, so everything scales together.
pub fn do_speed(srv: &mut Server, ch_id: CharId, args: &str) {
    let (factor, _) = one_argument(args);
    if factor.is_empty() {
        let msg = format!("Current speed multiplier: x{}\r\n", srv.speed_multiplier);
        srv.send_to_char(ch_id, &msg);
        return;
    }
    match factor.parse::<u64>() {
        Ok(mult) if (1..=512).contains(&mult) => {
            srv.speed_multiplier = mult;
            log::info!("speed multiplier set to x{mult}");
            srv.send_to_char(ch_id, &format!("Speed multiplier set to x{mult}.\r\n"));
        }
        _ => {
            srv.send_to_char(ch_id, "Speed must be between 1 and 512.\r\n");
        }
    }
}

/// `disable` lists; `disable <command>` toggles, recording who did it.
pub fn do_disable(srv: &mut Server, ch_id: CharId, args: &str) {
    let (target, _) = one_argument(args);
    if target.is_empty() {
        let listing = if srv.disabled.is_empty() {
            "No commands are disabled.\r\n".to_string()
        } else {
            let mut out = String::from("Disabled commands:\r\n");
            let mut entries: Vec<_> = srv.disabled.iter().collect();
            entries.sort();
            for (command, by) in entries {
                out.push_str(&format!("  {command:<12} (by {by})\r\n"));
            }
            out
        };
        srv.send_to_char(ch_id, &listing);
        return;
    }

    let Some(entry) = super::COMMANDS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(&target))
    else {
        srv.send_to_char(ch_id, "No such command.\r\n");
        return;
    };
    if entry.name == "disable" {
        srv.send_to_char(ch_id, "You cannot disable the disable command.\r\n");
        return;
    }

    let who = srv
        .world
        .ch(ch_id)
        .map(|ch| ch.name.clone())
        .unwrap_or_default();
    if srv.disabled.remove(entry.name).is_some() {
        srv.send_to_char(ch_id, &format!("Command '{}' enabled.\r\n", entry.name));
    } else {
        srv.disabled.insert(entry.name.to_string(), who);
        srv.send_to_char(ch_id, &format!("Command '{}' disabled.\r\n", entry.name));
    }
}

pub fn do_wizlock(srv: &mut Server, ch_id: CharId, _args: &str) {
    srv.wizlock = !srv.wizlock;
    let msg = if srv.wizlock {
        "The game is now wizlocked.\r\n"
    } else {
        "The game is no longer wizlocked.\r\n"
    };
    log::info!("{}", msg.trim());
    srv.send_to_char(ch_id, msg);
}

/// `snoop <player>` taps a descriptor; `snoop self` clears all taps.
pub fn do_snoop(srv: &mut Server, ch_id: CharId, args: &str) {
    let (target, _) = one_argument(args);
    if target.is_empty() {
        srv.send_to_char(ch_id, "Snoop whom?\r\n");
        return;
    }
    let Some(my_desc) = srv.world.ch(ch_id).and_then(|ch| ch.desc) else {
        return;
    };

    if target.eq_ignore_ascii_case("self") {
        for id in srv.descriptors.ids() {
            if let Some(desc) = srv.descriptors.get_mut(id) {
                if desc.snoop_by == Some(my_desc) {
                    desc.snoop_by = None;
                }
            }
        }
        srv.send_to_char(ch_id, "All your snoops are cancelled.\r\n");
        return;
    }

    let victim_desc = srv
        .world
        .find_player(&target)
        .and_then(|id| srv.world.ch(id))
        .and_then(|ch| ch.desc);
    let Some(victim_desc) = victim_desc else {
        srv.send_to_char(ch_id, "They aren't here.\r\n");
        return;
    };
    if victim_desc == my_desc {
        srv.send_to_char(ch_id, "Snooping yourself is redundant.\r\n");
        return;
    }

    if let Some(desc) = srv.descriptors.get_mut(victim_desc) {
        desc.snoop_by = Some(my_desc);
    }
    srv.send_to_char(ch_id, "Ok.\r\n");
}

pub fn do_copyover(srv: &mut Server, ch_id: CharId, _args: &str) {
    srv.send_to_char(ch_id, "Initiating copyover...\r\n");
    srv.copyover_requested = true;
}

pub fn do_shutdown(srv: &mut Server, ch_id: CharId, _args: &str) {
    let name = srv
        .world
        .ch(ch_id)
        .map(|ch| ch.name.clone())
        .unwrap_or_default();
    log::info!("shutdown by {name}");
    srv.broadcast(&format!("{name} has shut down the game.\r\n"));
    srv.shutdown_requested = true;
}
