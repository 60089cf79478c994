//! Command dispatch: alias expansion, the ordered prefix-matched
//! command table, trust and position gating, logging flags.

mod admin;
mod comm;
mod info;
mod movement;
mod object;

pub use admin::*;
pub use comm::*;
pub use info::*;
pub use movement::*;
pub use object::*;

use core::string_operations::{one_argument, str_prefix};

use crate::game_loop::Server;
use crate::world::types::{CharId, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Normal,
    /// Every use lands in the admin log with its full argument.
    Always,
    /// Never logged, even under verbose logging (passwords etc.).
    Never,
}

pub struct CmdEntry {
    pub name: &'static str,
    pub fun: fn(&mut Server, CharId, &str),
    pub position: Position,
    pub trust: i32,
    pub log: LogMode,
}

const fn cmd(
    name: &'static str,
    fun: fn(&mut Server, CharId, &str),
    position: Position,
    trust: i32,
    log: LogMode,
) -> CmdEntry {
    CmdEntry {
        name,
        fun,
        position,
        trust,
        log,
    }
}

use core::constants::{LEVEL_BUILDER, LEVEL_IMPLEMENTOR, LEVEL_JUDGE};

/// The static, ordered command table. Ties on a prefix resolve to the
/// earliest entry, which is how `n` stays `north` and never `note`.
pub static COMMANDS: &[CmdEntry] = &[
    cmd("north", do_north, Position::Standing, 0, LogMode::Normal),
    cmd("east", do_east, Position::Standing, 0, LogMode::Normal),
    cmd("south", do_south, Position::Standing, 0, LogMode::Normal),
    cmd("west", do_west, Position::Standing, 0, LogMode::Normal),
    cmd("up", do_up, Position::Standing, 0, LogMode::Normal),
    cmd("down", do_down, Position::Standing, 0, LogMode::Normal),
    cmd("look", do_look, Position::Resting, 0, LogMode::Normal),
    cmd("inventory", do_inventory, Position::Sleeping, 0, LogMode::Normal),
    cmd("get", do_get, Position::Resting, 0, LogMode::Normal),
    cmd("drop", do_drop, Position::Resting, 0, LogMode::Normal),
    cmd("put", do_put, Position::Resting, 0, LogMode::Normal),
    cmd("say", do_say, Position::Resting, 0, LogMode::Normal),
    cmd("score", do_score, Position::Sleeping, 0, LogMode::Normal),
    cmd("who", do_who, Position::Sleeping, 0, LogMode::Normal),
    cmd("areas", do_areas, Position::Sleeping, 0, LogMode::Normal),
    cmd("alias", do_alias, Position::Sleeping, 0, LogMode::Normal),
    cmd("prompt", do_prompt, Position::Sleeping, 0, LogMode::Normal),
    cmd("title", do_title, Position::Sleeping, 0, LogMode::Normal),
    cmd("description", do_description, Position::Sleeping, 0, LogMode::Normal),
    cmd("note", do_note, Position::Sleeping, 0, LogMode::Normal),
    cmd("save", do_save, Position::Sleeping, 0, LogMode::Normal),
    cmd("quit", do_quit, Position::Sleeping, 0, LogMode::Normal),
    cmd("rest", do_rest, Position::Sleeping, 0, LogMode::Normal),
    cmd("sleep", do_sleep, Position::Sleeping, 0, LogMode::Normal),
    cmd("stand", do_stand, Position::Sleeping, 0, LogMode::Normal),
    cmd("wake", do_stand, Position::Sleeping, 0, LogMode::Normal),
    cmd("commands", do_commands, Position::Sleeping, 0, LogMode::Normal),
    // Staff commands.
    cmd("goto", do_goto, Position::Standing, LEVEL_BUILDER, LogMode::Always),
    cmd("stat", do_stat, Position::Sleeping, LEVEL_BUILDER, LogMode::Normal),
    cmd("profile", do_profile, Position::Sleeping, LEVEL_JUDGE, LogMode::Normal),
    cmd("speed", do_speed, Position::Sleeping, LEVEL_IMPLEMENTOR, LogMode::Always),
    cmd("disable", do_disable, Position::Sleeping, LEVEL_JUDGE, LogMode::Always),
    cmd("wizlock", do_wizlock, Position::Sleeping, LEVEL_JUDGE, LogMode::Always),
    cmd("snoop", do_snoop, Position::Sleeping, LEVEL_JUDGE, LogMode::Always),
    cmd("copyover", do_copyover, Position::Sleeping, LEVEL_IMPLEMENTOR, LogMode::Always),
    cmd("shutdown", do_shutdown, Position::Sleeping, LEVEL_IMPLEMENTOR, LogMode::Always),
];

/// Effective trust: an explicit trust grant, otherwise level.
pub fn get_trust(srv: &Server, ch_id: CharId) -> i32 {
    srv.world
        .ch(ch_id)
        .map(|ch| ch.trust.max(ch.level))
        .unwrap_or(0)
}

/// Expand the first word through the player's alias table. Aliases do
/// not recurse: one substitution, then dispatch proceeds literally.
fn expand_alias(srv: &Server, ch_id: CharId, line: &str) -> String {
    let (word, rest) = one_argument(line);
    let Some(expansion) = srv
        .world
        .ch(ch_id)
        .and_then(|ch| ch.pcdata.as_ref())
        .and_then(|pcdata| {
            pcdata
                .aliases
                .iter()
                .find(|(short, _)| short.eq_ignore_ascii_case(&word))
                .map(|(_, long)| long.clone())
        })
    else {
        return line.to_string();
    };
    if rest.is_empty() {
        expansion
    } else {
        format!("{expansion} {rest}")
    }
}

fn position_refusal(position: Position) -> &'static str {
    match position {
        Position::Dead => "Lie still; you are DEAD.\r\n",
        Position::Incapacitated | Position::Stunned => {
            "You are hurt far too bad for that.\r\n"
        }
        Position::Sleeping => "In your dreams, or what?\r\n",
        Position::Resting => "Nah... You feel too relaxed...\r\n",
        Position::Sitting => "Better stand up first.\r\n",
        Position::Fighting => "No way! You are still fighting!\r\n",
        Position::Standing => "",
    }
}

/// Dispatch one command line for a playing character.
pub fn interpret(srv: &mut Server, ch_id: CharId, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let expanded = expand_alias(srv, ch_id, line);
    let (word, args) = one_argument(&expanded);
    if word.is_empty() {
        return;
    }

    let entry = COMMANDS
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(&word) || str_prefix(&word, entry.name));

    let Some(entry) = entry else {
        srv.send_to_char(ch_id, "Huh?\r\n");
        return;
    };

    let trust = get_trust(srv, ch_id);
    if trust < entry.trust {
        // Unauthorized commands are indistinguishable from unknown ones.
        srv.send_to_char(ch_id, "Huh?\r\n");
        return;
    }

    if let Some(disabled_by) = srv.disabled.get(entry.name) {
        srv.send_to_char(
            ch_id,
            &format!("This command has been disabled by {disabled_by}.\r\n"),
        );
        return;
    }

    let position = srv
        .world
        .ch(ch_id)
        .map(|ch| ch.position)
        .unwrap_or(Position::Standing);
    if position < entry.position {
        srv.send_to_char(ch_id, position_refusal(position));
        return;
    }

    match entry.log {
        LogMode::Always => {
            let name = srv
                .world
                .ch(ch_id)
                .map(|ch| ch.name.clone())
                .unwrap_or_default();
            log::info!("LOG {name}: {} {args}", entry.name);
        }
        LogMode::Never => {}
        LogMode::Normal => {
            log::debug!("command: {} {args}", entry.name);
        }
    }

    (entry.fun)(srv, ch_id, args);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prefixes_hit_earliest_entry() {
        let n = COMMANDS
            .iter()
            .find(|e| str_prefix("n", e.name))
            .unwrap();
        assert_eq!(n.name, "north");
        let no = COMMANDS
            .iter()
            .find(|e| str_prefix("no", e.name))
            .unwrap();
        assert_eq!(no.name, "north");
        let not = COMMANDS
            .iter()
            .find(|e| str_prefix("not", e.name))
            .unwrap();
        assert_eq!(not.name, "note");
    }

    #[test]
    fn table_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for entry in COMMANDS {
            assert!(seen.insert(entry.name), "duplicate {}", entry.name);
        }
    }

    #[test]
    fn staff_commands_gated_above_mortals() {
        for entry in COMMANDS {
            if matches!(entry.name, "copyover" | "shutdown" | "speed") {
                assert!(entry.trust >= core::constants::LEVEL_IMPLEMENTOR);
            }
        }
    }
}
