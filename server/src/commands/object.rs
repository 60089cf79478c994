//! Inventory commands: the user-visible face of the containment ops.

use core::string_operations::{is_name, one_argument};

use crate::act::{act, ActArgs, ActTarget};
use crate::game_loop::Server;
use crate::world::types::{CharId, ItemType, ObjId, WearFlags};

/// First carried object matching a keyword.
fn find_carried(srv: &Server, ch_id: CharId, keyword: &str) -> Option<ObjId> {
    srv.world.ch(ch_id)?.carrying.iter().copied().find(|&id| {
        srv.world
            .obj(id)
            .is_some_and(|obj| is_name(keyword, &obj.name))
    })
}

/// First object in the room matching a keyword.
fn find_in_room(srv: &Server, ch_id: CharId, keyword: &str) -> Option<ObjId> {
    let room = srv.world.ch(ch_id)?.in_room?;
    srv.world
        .room(room)
        .contents
        .iter()
        .copied()
        .find(|&id| {
            srv.world
                .obj(id)
                .is_some_and(|obj| is_name(keyword, &obj.name))
        })
}

pub fn do_inventory(srv: &mut Server, ch_id: CharId, _args: &str) {
    let listing = {
        let Some(ch) = srv.world.ch(ch_id) else { return };
        if ch.carrying.is_empty() {
            "You are carrying nothing.\r\n".to_string()
        } else {
            let mut out = String::from("You are carrying:\r\n");
            for &obj_id in &ch.carrying {
                if let Some(obj) = srv.world.obj(obj_id) {
                    let worn = if obj.wear_loc >= 0 { " (worn)" } else { "" };
                    out.push_str(&format!("  {}{worn}\r\n", obj.short_descr));
                }
            }
            out
        }
    };
    srv.send_to_char(ch_id, &listing);
}

pub fn do_get(srv: &mut Server, ch_id: CharId, args: &str) {
    let (keyword, rest) = one_argument(args);
    if keyword.is_empty() {
        srv.send_to_char(ch_id, "Get what?\r\n");
        return;
    }

    // "get X Y": take X out of container Y.
    let (container_word, _) = one_argument(rest);
    if !container_word.is_empty() {
        get_from_container(srv, ch_id, &keyword, &container_word);
        return;
    }

    let Some(obj_id) = find_in_room(srv, ch_id, &keyword) else {
        srv.send_to_char(ch_id, "You do not see that here.\r\n");
        return;
    };
    let takeable = srv
        .world
        .obj(obj_id)
        .is_some_and(|obj| obj.wear_flags.contains(WearFlags::TAKE));
    if !takeable {
        srv.send_to_char(ch_id, "You can't take that.\r\n");
        return;
    }

    srv.world.obj_to_char(obj_id, ch_id);
    act(
        &srv.world,
        &mut srv.descriptors,
        "$n gets $p.",
        ch_id,
        ActArgs {
            obj1: Some(obj_id),
            ..ActArgs::default()
        },
        ActTarget::ToRoom,
    );
    act(
        &srv.world,
        &mut srv.descriptors,
        "You get $p.",
        ch_id,
        ActArgs {
            obj1: Some(obj_id),
            ..ActArgs::default()
        },
        ActTarget::ToChar,
    );
}

fn get_from_container(srv: &mut Server, ch_id: CharId, keyword: &str, container_word: &str) {
    let container = find_carried(srv, ch_id, container_word)
        .or_else(|| find_in_room(srv, ch_id, container_word));
    let Some(container) = container else {
        srv.send_to_char(ch_id, "You do not see that container here.\r\n");
        return;
    };
    let is_container = srv
        .world
        .obj(container)
        .is_some_and(|obj| obj.item_type == ItemType::Container);
    if !is_container {
        srv.send_to_char(ch_id, "That is not a container.\r\n");
        return;
    }
    let inner = srv
        .world
        .obj(container)
        .and_then(|c| {
            c.contains.iter().copied().find(|&id| {
                srv.world
                    .obj(id)
                    .is_some_and(|obj| is_name(keyword, &obj.name))
            })
        });
    let Some(inner) = inner else {
        srv.send_to_char(ch_id, "There is nothing like that in there.\r\n");
        return;
    };

    srv.world.obj_to_char(inner, ch_id);
    act(
        &srv.world,
        &mut srv.descriptors,
        "You get $p from $P.",
        ch_id,
        ActArgs {
            obj1: Some(inner),
            obj2: Some(container),
            ..ActArgs::default()
        },
        ActTarget::ToChar,
    );
    act(
        &srv.world,
        &mut srv.descriptors,
        "$n gets $p from $P.",
        ch_id,
        ActArgs {
            obj1: Some(inner),
            obj2: Some(container),
            ..ActArgs::default()
        },
        ActTarget::ToRoom,
    );
}

pub fn do_drop(srv: &mut Server, ch_id: CharId, args: &str) {
    let (keyword, _) = one_argument(args);
    if keyword.is_empty() {
        srv.send_to_char(ch_id, "Drop what?\r\n");
        return;
    }
    let Some(obj_id) = find_carried(srv, ch_id, &keyword) else {
        srv.send_to_char(ch_id, "You do not have that item.\r\n");
        return;
    };
    let Some(room_id) = srv.world.ch(ch_id).and_then(|ch| ch.in_room) else {
        return;
    };

    srv.world.obj_to_room(obj_id, room_id);
    act(
        &srv.world,
        &mut srv.descriptors,
        "You drop $p.",
        ch_id,
        ActArgs {
            obj1: Some(obj_id),
            ..ActArgs::default()
        },
        ActTarget::ToChar,
    );
    act(
        &srv.world,
        &mut srv.descriptors,
        "$n drops $p.",
        ch_id,
        ActArgs {
            obj1: Some(obj_id),
            ..ActArgs::default()
        },
        ActTarget::ToRoom,
    );
}

pub fn do_put(srv: &mut Server, ch_id: CharId, args: &str) {
    let (obj_word, rest) = one_argument(args);
    let (container_word, _) = one_argument(rest);
    if obj_word.is_empty() || container_word.is_empty() {
        srv.send_to_char(ch_id, "Put what in what?\r\n");
        return;
    }
    let Some(obj_id) = find_carried(srv, ch_id, &obj_word) else {
        srv.send_to_char(ch_id, "You do not have that item.\r\n");
        return;
    };
    let container = find_carried(srv, ch_id, &container_word)
        .or_else(|| find_in_room(srv, ch_id, &container_word));
    let Some(container) = container else {
        srv.send_to_char(ch_id, "You do not see that container here.\r\n");
        return;
    };
    let is_container = srv
        .world
        .obj(container)
        .is_some_and(|obj| obj.item_type == ItemType::Container);
    if !is_container {
        srv.send_to_char(ch_id, "That is not a container.\r\n");
        return;
    }

    if !srv.world.obj_to_obj(obj_id, container) {
        srv.send_to_char(ch_id, "It will not fit in there.\r\n");
        return;
    }
    act(
        &srv.world,
        &mut srv.descriptors,
        "You put $p in $P.",
        ch_id,
        ActArgs {
            obj1: Some(obj_id),
            obj2: Some(container),
            ..ActArgs::default()
        },
        ActTarget::ToChar,
    );
    act(
        &srv.world,
        &mut srv.descriptors,
        "$n puts $p in $P.",
        ch_id,
        ActArgs {
            obj1: Some(obj_id),
            obj2: Some(container),
            ..ActArgs::default()
        },
        ActTarget::ToRoom,
    );
}

#[cfg(test)]
mod tests {
    use crate::game_loop::tests_support::{drain_output, test_server_with_player};
    use crate::world::types::ObjHolder;

    #[test]
    fn get_and_drop_round_trip() {
        let (mut srv, ch) = test_server_with_player();
        let room = srv.world.ch(ch).unwrap().in_room.unwrap();
        let proto = srv.world.get_obj_index(3010).unwrap();
        let sword = srv.world.create_object(proto, 5);
        srv.world.obj_to_room(sword, room);

        super::do_get(&mut srv, ch, "sword");
        assert_eq!(srv.world.obj(sword).unwrap().holder, ObjHolder::Char(ch));

        super::do_drop(&mut srv, ch, "sword");
        assert_eq!(srv.world.obj(sword).unwrap().holder, ObjHolder::Room(room));
    }

    #[test]
    fn put_and_get_from_container() {
        let (mut srv, ch) = test_server_with_player();
        let sword_proto = srv.world.get_obj_index(3010).unwrap();
        let bag_proto = srv.world.get_obj_index(3011).unwrap();
        let sword = srv.world.create_object(sword_proto, 5);
        let bag = srv.world.create_object(bag_proto, 0);
        srv.world.obj_to_char(sword, ch);
        srv.world.obj_to_char(bag, ch);

        super::do_put(&mut srv, ch, "sword bag");
        assert_eq!(srv.world.obj(sword).unwrap().holder, ObjHolder::Obj(bag));

        super::do_get(&mut srv, ch, "sword bag");
        assert_eq!(srv.world.obj(sword).unwrap().holder, ObjHolder::Char(ch));
    }

    #[test]
    fn get_refuses_missing_object() {
        let (mut srv, ch) = test_server_with_player();
        super::do_get(&mut srv, ch, "unicorn");
        let out = drain_output(&mut srv, ch);
        assert!(out.contains("do not see"));
    }
}
