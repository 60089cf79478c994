//! Movement and position commands.

use crate::act::{act, ActArgs, ActTarget};
use crate::game_loop::Server;
use crate::world::types::{CharId, ExitFlags, Position, DIR_NAMES, REV_DIR};

/// Pulses of lag after a move.
const MOVE_WAIT: i32 = 1;

fn do_move(srv: &mut Server, ch_id: CharId, dir: usize) {
    let Some(room_id) = srv.world.ch(ch_id).and_then(|ch| ch.in_room) else {
        return;
    };

    let exit = srv.world.room(room_id).exits[dir].clone();
    let Some(exit) = exit else {
        srv.send_to_char(ch_id, "Alas, you cannot go that way.\r\n");
        return;
    };
    let Some(to_room) = exit.to_room else {
        srv.send_to_char(ch_id, "Alas, you cannot go that way.\r\n");
        return;
    };
    if exit.flags.contains(ExitFlags::CLOSED) {
        let door = if exit.keyword.is_empty() {
            "door".to_string()
        } else {
            exit.keyword.clone()
        };
        srv.send_to_char(ch_id, &format!("The {door} is closed.\r\n"));
        return;
    }

    let tired = srv
        .world
        .ch(ch_id)
        .is_some_and(|ch| !ch.is_npc() && ch.move_points < 1);
    if tired {
        srv.send_to_char(ch_id, "You are too exhausted.\r\n");
        return;
    }

    act(
        &srv.world,
        &mut srv.descriptors,
        "$n leaves $t.",
        ch_id,
        ActArgs {
            text1: Some(DIR_NAMES[dir]),
            ..ActArgs::default()
        },
        ActTarget::ToRoom,
    );

    srv.world.char_from_room(ch_id);
    srv.world.char_to_room(ch_id, to_room);
    if let Some(ch) = srv.world.ch_mut(ch_id) {
        if !ch.is_npc() {
            ch.move_points -= 1;
            ch.wait += MOVE_WAIT;
        }
    }

    act(
        &srv.world,
        &mut srv.descriptors,
        "$n arrives from the $t.",
        ch_id,
        ActArgs {
            text1: Some(DIR_NAMES[REV_DIR[dir]]),
            ..ActArgs::default()
        },
        ActTarget::ToRoom,
    );

    super::do_look(srv, ch_id, "auto");
}

pub fn do_north(srv: &mut Server, ch_id: CharId, _args: &str) {
    do_move(srv, ch_id, 0);
}

pub fn do_east(srv: &mut Server, ch_id: CharId, _args: &str) {
    do_move(srv, ch_id, 1);
}

pub fn do_south(srv: &mut Server, ch_id: CharId, _args: &str) {
    do_move(srv, ch_id, 2);
}

pub fn do_west(srv: &mut Server, ch_id: CharId, _args: &str) {
    do_move(srv, ch_id, 3);
}

pub fn do_up(srv: &mut Server, ch_id: CharId, _args: &str) {
    do_move(srv, ch_id, 4);
}

pub fn do_down(srv: &mut Server, ch_id: CharId, _args: &str) {
    do_move(srv, ch_id, 5);
}

pub fn do_rest(srv: &mut Server, ch_id: CharId, _args: &str) {
    match srv.world.ch(ch_id).map(|ch| ch.position) {
        Some(Position::Resting) => {
            srv.send_to_char(ch_id, "You are already resting.\r\n");
        }
        Some(Position::Fighting) => {
            srv.send_to_char(ch_id, "You are still fighting!\r\n");
        }
        Some(_) => {
            if let Some(ch) = srv.world.ch_mut(ch_id) {
                ch.position = Position::Resting;
            }
            srv.send_to_char(ch_id, "You rest.\r\n");
            act(
                &srv.world,
                &mut srv.descriptors,
                "$n sits down and rests.",
                ch_id,
                ActArgs::default(),
                ActTarget::ToRoom,
            );
        }
        None => {}
    }
}

pub fn do_sleep(srv: &mut Server, ch_id: CharId, _args: &str) {
    match srv.world.ch(ch_id).map(|ch| ch.position) {
        Some(Position::Sleeping) => {
            srv.send_to_char(ch_id, "You are already sound asleep.\r\n");
        }
        Some(Position::Fighting) => {
            srv.send_to_char(ch_id, "You are still fighting!\r\n");
        }
        Some(_) => {
            act(
                &srv.world,
                &mut srv.descriptors,
                "$n lies down and falls asleep.",
                ch_id,
                ActArgs::default(),
                ActTarget::ToRoom,
            );
            if let Some(ch) = srv.world.ch_mut(ch_id) {
                ch.position = Position::Sleeping;
            }
            srv.send_to_char(ch_id, "You go to sleep.\r\n");
        }
        None => {}
    }
}

pub fn do_stand(srv: &mut Server, ch_id: CharId, _args: &str) {
    match srv.world.ch(ch_id).map(|ch| ch.position) {
        Some(Position::Standing) => {
            srv.send_to_char(ch_id, "You are already standing.\r\n");
        }
        Some(Position::Fighting) => {
            srv.send_to_char(ch_id, "You are already fighting!\r\n");
        }
        Some(_) => {
            if let Some(ch) = srv.world.ch_mut(ch_id) {
                ch.position = Position::Standing;
            }
            srv.send_to_char(ch_id, "You wake and stand up.\r\n");
            act(
                &srv.world,
                &mut srv.descriptors,
                "$n wakes and stands up.",
                ch_id,
                ActArgs::default(),
                ActTarget::ToRoom,
            );
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::game_loop::tests_support::test_server_with_player;
    use crate::world::types::*;

    #[test]
    fn move_through_wired_exit() {
        let (mut srv, ch) = test_server_with_player();
        let r1 = srv.world.get_room_index(3001).unwrap();
        let r2 = srv.world.get_room_index(3002).unwrap();
        // Wire north.
        let mut exit = Exit::to_vnum(3002);
        exit.to_room = Some(r2);
        srv.world.rooms[r1.index()].exits[0] = Some(exit);

        super::do_north(&mut srv, ch, "");
        assert_eq!(srv.world.ch(ch).unwrap().in_room, Some(r2));
        assert!(srv.world.ch(ch).unwrap().wait > 0);
    }

    #[test]
    fn closed_door_blocks() {
        let (mut srv, ch) = test_server_with_player();
        let r1 = srv.world.get_room_index(3001).unwrap();
        let r2 = srv.world.get_room_index(3002).unwrap();
        let mut exit = Exit::to_vnum(3002);
        exit.to_room = Some(r2);
        exit.flags = ExitFlags::IS_DOOR | ExitFlags::CLOSED;
        srv.world.rooms[r1.index()].exits[0] = Some(exit);

        super::do_north(&mut srv, ch, "");
        assert_eq!(srv.world.ch(ch).unwrap().in_room, Some(r1));
    }

    #[test]
    fn missing_exit_refused() {
        let (mut srv, ch) = test_server_with_player();
        let r1 = srv.world.get_room_index(3001).unwrap();
        super::do_up(&mut srv, ch, "");
        assert_eq!(srv.world.ch(ch).unwrap().in_room, Some(r1));
    }
}
