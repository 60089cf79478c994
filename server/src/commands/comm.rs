//! Communication and session commands: say, note, save, quit.

use crate::act::{act, ActArgs, ActTarget};
use crate::game_loop::Server;
use crate::net::descriptor::{InputMode, InputSink};
use crate::net::modes::NoteComposer;
use crate::world::types::CharId;

pub fn do_say(srv: &mut Server, ch_id: CharId, args: &str) {
    let text = args.trim();
    if text.is_empty() {
        srv.send_to_char(ch_id, "Say what?\r\n");
        return;
    }
    let text = core::string_operations::smash_tilde(text);
    act(
        &srv.world,
        &mut srv.descriptors,
        "#g$n says '$t'#n",
        ch_id,
        ActArgs {
            text1: Some(&text),
            ..ActArgs::default()
        },
        ActTarget::ToRoom,
    );
    act(
        &srv.world,
        &mut srv.descriptors,
        "#gYou say '$t'#n",
        ch_id,
        ActArgs {
            text1: Some(&text),
            ..ActArgs::default()
        },
        ActTarget::ToChar,
    );
}

/// Open the string editor on the character's own description.
pub fn do_description(srv: &mut Server, ch_id: CharId, _args: &str) {
    let (current, desc_id) = match srv.world.ch(ch_id) {
        Some(ch) => (ch.description.clone(), ch.desc),
        None => return,
    };
    let Some(desc_id) = desc_id else { return };
    let editor = crate::net::modes::StringEditor::new(&current);
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        let prompt = editor.prompt();
        desc.input_mode = Some((InputSink::Description, Box::new(editor)));
        desc.write_text(
            "Editing your description. End with '@' on its own line, '.c' clears.\r\n",
        );
        desc.write_text(&prompt);
    }
}

/// Start the note composer as an input mode over the playing state.
pub fn do_note(srv: &mut Server, ch_id: CharId, _args: &str) {
    let (name, desc_id) = match srv.world.ch(ch_id) {
        Some(ch) => (ch.name.clone(), ch.desc),
        None => return,
    };
    let Some(desc_id) = desc_id else { return };
    let composer = NoteComposer::new(&name);
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        let prompt = composer.prompt();
        desc.input_mode = Some((InputSink::Note, Box::new(composer)));
        desc.write_text("You begin composing a note.\r\n");
        desc.write_text(&prompt);
    }
}

pub fn do_save(srv: &mut Server, ch_id: CharId, _args: &str) {
    if srv.save_player(ch_id) {
        srv.send_to_char(ch_id, "Saved.\r\n");
    }
}

pub fn do_quit(srv: &mut Server, ch_id: CharId, _args: &str) {
    let (name, desc_id) = match srv.world.ch(ch_id) {
        Some(ch) => (ch.name.clone(), ch.desc),
        None => return,
    };

    act(
        &srv.world,
        &mut srv.descriptors,
        "$n has left the game.",
        ch_id,
        ActArgs::default(),
        ActTarget::ToRoom,
    );
    srv.send_to_char(ch_id, "You vanish from the world. Come back soon!\r\n");

    srv.save_player(ch_id);
    log::info!("{name} has quit");

    srv.world.extract_char(ch_id, true);
    if let Some(desc_id) = desc_id {
        if let Some(desc) = srv.descriptors.get_mut(desc_id) {
            desc.character = None;
            desc.close_pending = true;
        }
    }
}
