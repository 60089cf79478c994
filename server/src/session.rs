//! The login nanny: everything between a raw accept and the playing
//! state, plus link-dead reconnection and body takeover.

use core::constants::{LEVEL_IMMORTAL, MAX_PLAYERS};
use core::encrypt;
use core::names::{self, NameError};
use core::string_operations::capitalize;
use core::telnet::{ECHO_OFF, ECHO_ON, TELOPT_GMCP, TELOPT_MXP, WILL};

use crate::act::{act, ActArgs, ActTarget};
use crate::db::player_db;
use crate::game_loop::Server;
use crate::net::descriptor::ConState;
use crate::net::dns::LookupStatus;
use crate::net::negotiation;
use crate::world::types::{CharId, Character, DescId, PcData, PlayerFlags, Sex, Vnum};

/// Room a brand-new character wakes up in.
pub const ROOM_VNUM_SCHOOL: Vnum = 3001;

/// Drive one line of pre-playing input through the state machine.
pub fn nanny(srv: &mut Server, desc_id: DescId, line: &str) {
    let state = match srv.descriptors.get(desc_id) {
        Some(desc) => desc.state,
        None => return,
    };
    let line = if state == ConState::GetNewPassword || state == ConState::ConfirmNewPassword {
        line
    } else {
        line.trim()
    };

    match state {
        ConState::DetectCaps => {
            // Input during detection ends the window early.
            finish_detection(srv, desc_id);
        }
        ConState::GetName => get_name(srv, desc_id, line),
        ConState::GetOldPassword => get_old_password(srv, desc_id, line),
        ConState::ConfirmNewName => confirm_new_name(srv, desc_id, line),
        ConState::GetNewPassword => get_new_password(srv, desc_id, line),
        ConState::ConfirmNewPassword => confirm_new_password(srv, desc_id, line),
        ConState::GetNewSex => get_new_sex(srv, desc_id, line),
        ConState::GetNewExplevel => get_new_explevel(srv, desc_id, line),
        ConState::GetNewAnsi => get_new_ansi(srv, desc_id, line),
        ConState::ReadMotd => {
            enter_world(srv, desc_id, true);
        }
        ConState::CopyoverRecover => copyover_recover(srv, desc_id),
        ConState::Playing => unreachable!("nanny fed a playing descriptor"),
    }
}

/// Close the detection window: settle charset, pick the banner tier,
/// move to GetName.
pub fn finish_detection(srv: &mut Server, desc_id: DescId) {
    let Some(desc) = srv.descriptors.get_mut(desc_id) else {
        return;
    };
    if desc.state != ConState::DetectCaps {
        return;
    }
    negotiation::finalize_charset(&mut desc.caps);
    let tier = negotiation::intro_tier(&desc.caps);
    let banner = negotiation::intro_text(tier);
    log::debug!(
        "caps for {}: client={:?} mtts={:?} tier={:?}",
        desc.host,
        desc.caps.client_name,
        desc.caps.mtts,
        tier
    );
    desc.state = ConState::GetName;
    desc.write_text(banner);
}

fn get_name(srv: &mut Server, desc_id: DescId, line: &str) {
    if line.is_empty() {
        srv.close_descriptor(desc_id);
        return;
    }

    // Hold the door while the reverse lookup is still running; bans are
    // host-based.
    let still_resolving = srv
        .descriptors
        .get(desc_id)
        .and_then(|d| d.dns.as_ref())
        .is_some_and(|dns| *dns.status.lock().unwrap() == LookupStatus::Lookup);
    if still_resolving {
        srv.descriptors.write(
            desc_id,
            "\r\nStill resolving your address, one moment.\r\nWhat be thy name? ",
        );
        return;
    }

    let host = srv
        .descriptors
        .get(desc_id)
        .map(|d| d.host.clone())
        .unwrap_or_default();
    if let Some((_, reason)) = srv.bans.iter().find(|(banned, _)| host.ends_with(banned)) {
        log::info!("rejecting banned site {host}: {reason}");
        srv.descriptors
            .write(desc_id, "Your site has been banned from this game.\r\n");
        srv.close_descriptor(desc_id);
        return;
    }

    let name = capitalize(line);
    if let Err(why) = check_name(srv, &name) {
        let suggestion = names::suggest_name();
        let reason = match why {
            NameError::TooShort => "too short",
            NameError::TooLong => "too long",
            NameError::Reserved => "reserved",
            NameError::NonLetter => "letters only",
            NameError::AllConfusable | NameError::Homograph => "too easily mistaken for another",
            };
        srv.descriptors.write(
            desc_id,
            &format!("Illegal name ({reason}); perhaps {suggestion}? Try another: "),
        );
        return;
    }

    log::info!("{name}@{host} trying to connect");

    let path = srv.paths.player_db(&name);
    let short = match player_db::load_short(&path) {
        Ok(short) => short,
        Err(e) => {
            log::error!("load_short for {name} failed: {e:#}");
            srv.descriptors
                .write(desc_id, "Your file is temporarily unreadable; try again soon.\r\n");
            srv.close_descriptor(desc_id);
            return;
        }
    };

    match short {
        Some(short) => {
            if short.plr_flags.contains(PlayerFlags::DENY) {
                log::info!("denying access to {name}@{host}");
                srv.descriptors.write(desc_id, "You are denied access.\r\n");
                srv.close_descriptor(desc_id);
                return;
            }
            let immortal = short.trust >= LEVEL_IMMORTAL || short.level >= LEVEL_IMMORTAL;
            if srv.descriptors.len() > MAX_PLAYERS && !immortal {
                srv.descriptors.write(
                    desc_id,
                    "Too many players connected, please try again in a couple of minutes.\r\n",
                );
                srv.close_descriptor(desc_id);
                return;
            }
            if srv.wizlock && !immortal {
                srv.descriptors
                    .write(desc_id, "The game is wizlocked; try again later.\r\n");
                srv.close_descriptor(desc_id);
                return;
            }
            if let Some(desc) = srv.descriptors.get_mut(desc_id) {
                desc.login_name = name;
                desc.state = ConState::GetOldPassword;
                desc.write_text("Please enter password: ");
                desc.write_raw(&ECHO_OFF);
            }
        }
        None => {
            if srv.descriptors.len() > MAX_PLAYERS {
                srv.descriptors.write(
                    desc_id,
                    "Too many players connected, please try again in a couple of minutes.\r\n",
                );
                srv.close_descriptor(desc_id);
                return;
            }
            if srv.wizlock {
                srv.descriptors
                    .write(desc_id, "The game is wizlocked; no new characters today.\r\n");
                srv.close_descriptor(desc_id);
                return;
            }
            if let Some(desc) = srv.descriptors.get_mut(desc_id) {
                desc.login_name = name.clone();
                desc.state = ConState::ConfirmNewName;
                desc.write_text(&format!(
                    "You want {name} engraved on your tombstone (Y/N)? "
                ));
            }
        }
    }
}

/// Name policy: core checks plus collisions with mob keywords and
/// existing player files (by confusable skeleton).
fn check_name(srv: &Server, name: &str) -> Result<(), NameError> {
    let mut taken: Vec<String> = Vec::new();
    for proto in &srv.world.mob_protos {
        for keyword in proto.player_name.split_whitespace() {
            taken.push(names::skeleton(keyword));
        }
    }
    // A new name may not collide with another player's skeleton unless
    // it is exactly that player (that path is a login, not creation).
    if let Ok(entries) = std::fs::read_dir(&srv.paths.db_players) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "db") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if !stem.eq_ignore_ascii_case(name) {
                        taken.push(names::skeleton(stem));
                    }
                }
            }
        }
    }
    names::check_name(name, taken.iter().map(String::as_str))
}

fn get_old_password(srv: &mut Server, desc_id: DescId, line: &str) {
    let name = match srv.descriptors.get(desc_id) {
        Some(desc) => desc.login_name.clone(),
        None => return,
    };
    srv.descriptors.write(desc_id, "\r\n");

    let path = srv.paths.player_db(&name);
    let short = match player_db::load_short(&path) {
        Ok(Some(short)) => short,
        _ => {
            srv.descriptors.write(desc_id, "Your file vanished mid-login.\r\n");
            srv.close_descriptor(desc_id);
            return;
        }
    };

    if !encrypt::verify_password(&name, line.trim_end_matches(['\r', '\n']), &short.password) {
        log::info!("wrong password for {name}");
        srv.descriptors.write(desc_id, "Wrong password.\r\n");
        srv.close_descriptor(desc_id);
        return;
    }

    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.write_raw(&ECHO_ON);
    }

    // Link-dead body, or an active session to take over?
    if let Some(existing) = srv.world.find_player(&name) {
        let other_desc = srv.world.ch(existing).and_then(|ch| ch.desc);
        match other_desc {
            None => {
                reconnect(srv, desc_id, existing);
                return;
            }
            Some(other) => {
                takeover(srv, desc_id, other, existing);
                return;
            }
        }
    }

    // Fresh login: full load from persistence.
    let save = match player_db::load_player(&path) {
        Ok(Some(save)) => save,
        Ok(None) | Err(_) => {
            log::error!("full load for {name} failed after password");
            srv.descriptors.write(desc_id, "Your file is unreadable.\r\n");
            srv.close_descriptor(desc_id);
            return;
        }
    };
    let ch_id = player_db::instantiate(&mut srv.world, &save);
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.character = Some(ch_id);
    }
    if let Some(ch) = srv.world.ch_mut(ch_id) {
        ch.desc = Some(desc_id);
    }
    show_motd(srv, desc_id);
}

fn reconnect(srv: &mut Server, desc_id: DescId, ch_id: CharId) {
    let (name, host) = match srv.descriptors.get(desc_id) {
        Some(desc) => (desc.login_name.clone(), desc.host.clone()),
        None => return,
    };
    if let Some(ch) = srv.world.ch_mut(ch_id) {
        ch.desc = Some(desc_id);
        ch.timer = 0;
        if let Some(pcdata) = ch.pcdata.as_mut() {
            pcdata.lasthost = host.clone();
        }
    }
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.character = Some(ch_id);
        desc.state = ConState::Playing;
        desc.fcommand = true;
    }
    renegotiate_saved_prefs(srv, desc_id, ch_id);
    srv.descriptors.write(desc_id, "Reconnecting.\r\n");
    act(
        &srv.world,
        &mut srv.descriptors,
        "$n has reconnected.",
        ch_id,
        ActArgs::default(),
        ActTarget::ToRoom,
    );
    log::info!("{name}@{host} reconnected");
}

fn takeover(srv: &mut Server, desc_id: DescId, old_desc: DescId, ch_id: CharId) {
    let name = srv
        .descriptors
        .get(desc_id)
        .map(|d| d.login_name.clone())
        .unwrap_or_default();
    log::info!("{name}: body taken over by new connection");

    // A note draft or editor session on the old link dies with it.
    srv.descriptors
        .write(old_desc, "This body has been taken over!\r\n");
    if let Some(old) = srv.descriptors.get_mut(old_desc) {
        old.character = None;
        old.input_mode = None;
        old.close_pending = true;
    }

    if let Some(ch) = srv.world.ch_mut(ch_id) {
        ch.desc = Some(desc_id);
        ch.timer = 0;
    }
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.character = Some(ch_id);
        desc.state = ConState::Playing;
        desc.fcommand = true;
    }
    renegotiate_saved_prefs(srv, desc_id, ch_id);
    srv.descriptors
        .write(desc_id, "You take over your own body, already in use!\r\n");
}

/// A saved player carries GMCP/MXP preference bits; when the live
/// negotiation disagrees, offer again so the session matches the saved
/// preference.
fn renegotiate_saved_prefs(srv: &mut Server, desc_id: DescId, ch_id: CharId) {
    let prefs = srv
        .world
        .ch(ch_id)
        .and_then(|ch| ch.pcdata.as_ref())
        .map(|pcdata| pcdata.plr_flags)
        .unwrap_or_default();
    let Some(desc) = srv.descriptors.get_mut(desc_id) else {
        return;
    };
    if prefs.contains(PlayerFlags::PREFER_GMCP) && !desc.caps.gmcp_enabled {
        desc.write_raw(&core::telnet::negotiate(WILL, TELOPT_GMCP));
    }
    if prefs.contains(PlayerFlags::PREFER_MXP) && !desc.caps.mxp_enabled {
        desc.write_raw(&core::telnet::negotiate(WILL, TELOPT_MXP));
    }
    if prefs.contains(PlayerFlags::ANSI) {
        desc.caps.ansi = true;
    }
}

fn confirm_new_name(srv: &mut Server, desc_id: DescId, line: &str) {
    let name = match srv.descriptors.get(desc_id) {
        Some(desc) => desc.login_name.clone(),
        None => return,
    };
    match line.chars().next() {
        Some('y') | Some('Y') => {
            // The provisional character exists from here on.
            let ch = Character {
                name: name.clone(),
                pcdata: Some(PcData::default()),
                ..Character::default()
            };
            let ch_id = CharId(srv.world.chars.insert(ch));
            if let Some(desc) = srv.descriptors.get_mut(desc_id) {
                desc.character = Some(ch_id);
                desc.state = ConState::GetNewPassword;
                desc.write_text(&format!("New character.\r\nGive me a password for {name}: "));
                desc.write_raw(&ECHO_OFF);
            }
        }
        Some('n') | Some('N') => {
            if let Some(desc) = srv.descriptors.get_mut(desc_id) {
                desc.state = ConState::GetName;
                desc.write_text("Ok, what IS it, then? ");
            }
        }
        _ => {
            srv.descriptors.write(desc_id, "Please type Yes or No? ");
        }
    }
}

fn get_new_password(srv: &mut Server, desc_id: DescId, line: &str) {
    let line = line.trim_end_matches(['\r', '\n']);
    srv.descriptors.write(desc_id, "\r\n");
    if line.len() < 5 {
        srv.descriptors.write(
            desc_id,
            "Password must be at least five characters long.\r\nPassword: ",
        );
        return;
    }
    let (name, ch_id) = match srv.descriptors.get(desc_id) {
        Some(desc) => (desc.login_name.clone(), desc.character),
        None => return,
    };
    let Some(ch_id) = ch_id else { return };
    if let Some(pcdata) = srv.world.ch_mut(ch_id).and_then(|ch| ch.pcdata.as_mut()) {
        pcdata.pwd = encrypt::hash_password(&name, line);
    }
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.state = ConState::ConfirmNewPassword;
        desc.write_text("Please retype password: ");
    }
}

fn confirm_new_password(srv: &mut Server, desc_id: DescId, line: &str) {
    let line = line.trim_end_matches(['\r', '\n']);
    srv.descriptors.write(desc_id, "\r\n");
    let (name, ch_id) = match srv.descriptors.get(desc_id) {
        Some(desc) => (desc.login_name.clone(), desc.character),
        None => return,
    };
    let Some(ch_id) = ch_id else { return };
    let stored = srv
        .world
        .ch(ch_id)
        .and_then(|ch| ch.pcdata.as_ref())
        .map(|pcdata| pcdata.pwd.clone())
        .unwrap_or_default();
    if !encrypt::verify_password(&name, line, &stored) {
        if let Some(desc) = srv.descriptors.get_mut(desc_id) {
            desc.state = ConState::GetNewPassword;
            desc.write_text("Passwords don't match.\r\nRetype password: ");
        }
        return;
    }
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.write_raw(&ECHO_ON);
        desc.state = ConState::GetNewSex;
        desc.write_text("What is your sex (M/F/N)? ");
    }
}

fn get_new_sex(srv: &mut Server, desc_id: DescId, line: &str) {
    let sex = match line.chars().next() {
        Some('m') | Some('M') => Sex::Male,
        Some('f') | Some('F') => Sex::Female,
        Some('n') | Some('N') => Sex::Neutral,
        _ => {
            srv.descriptors.write(desc_id, "That is not a sex.\r\nWhat IS your sex? ");
            return;
        }
    };
    let ch_id = srv.descriptors.get(desc_id).and_then(|d| d.character);
    if let Some(ch) = ch_id.and_then(|id| srv.world.ch_mut(id)) {
        ch.sex = sex;
    }
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.state = ConState::GetNewExplevel;
        desc.write_text(
            "How seasoned an adventurer are you?\r\n\
             (1) Newcomer  (2) Wanderer  (3) Veteran\r\nChoose: ",
        );
    }
}

fn get_new_explevel(srv: &mut Server, desc_id: DescId, line: &str) {
    let practices = match line.trim().chars().next() {
        Some('1') => 5,
        Some('2') => 3,
        Some('3') => 1,
        _ => {
            srv.descriptors.write(desc_id, "Choose 1, 2 or 3: ");
            return;
        }
    };
    let ch_id = srv.descriptors.get(desc_id).and_then(|d| d.character);
    if let Some(ch) = ch_id.and_then(|id| srv.world.ch_mut(id)) {
        ch.practice = practices;
    }
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.state = ConState::GetNewAnsi;
        desc.write_text("Do you want ANSI colour (Y/N)? ");
    }
}

fn get_new_ansi(srv: &mut Server, desc_id: DescId, line: &str) {
    let ansi = match line.chars().next() {
        Some('y') | Some('Y') => true,
        Some('n') | Some('N') => false,
        _ => {
            srv.descriptors.write(desc_id, "Please type Yes or No? ");
            return;
        }
    };
    let ch_id = srv.descriptors.get(desc_id).and_then(|d| d.character);
    if let Some(pcdata) = ch_id
        .and_then(|id| srv.world.ch_mut(id))
        .and_then(|ch| ch.pcdata.as_mut())
    {
        pcdata.plr_flags.set(PlayerFlags::ANSI, ansi);
    }
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.caps.ansi = ansi;
        desc.state = ConState::ReadMotd;
    }
    show_motd(srv, desc_id);
}

fn show_motd(srv: &mut Server, desc_id: DescId) {
    let motd = srv.motd.clone();
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        if desc.state != ConState::ReadMotd {
            desc.state = ConState::ReadMotd;
        }
        desc.show_paged(&motd);
        desc.write_text("\r\n[Hit Return to enter the world]\r\n");
    }
}

/// Land the character in the world: room placement, announcements, the
/// automatic look.
fn enter_world(srv: &mut Server, desc_id: DescId, first_login: bool) {
    let Some(ch_id) = srv.descriptors.get(desc_id).and_then(|d| d.character) else {
        srv.close_descriptor(desc_id);
        return;
    };
    let (name, host) = match srv.descriptors.get(desc_id) {
        Some(desc) => (desc.login_name.clone(), desc.host.clone()),
        None => return,
    };

    // First login of a brand-new character: establish level and vitals.
    let brand_new = srv.world.ch(ch_id).is_some_and(|ch| ch.level == 0);
    if brand_new {
        if let Some(ch) = srv.world.ch_mut(ch_id) {
            ch.level = 1;
            ch.exp = 0;
            ch.hit = ch.max_hit;
            ch.mana = ch.max_mana;
            ch.move_points = ch.max_move;
            ch.was_in_room = ROOM_VNUM_SCHOOL;
            if let Some(pcdata) = ch.pcdata.as_mut() {
                pcdata.condition = [48, 48, 0];
                pcdata.createtime = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            }
        }
    }

    if let Some(ch) = srv.world.ch_mut(ch_id) {
        ch.desc = Some(desc_id);
        ch.timer = 0;
        if let Some(pcdata) = ch.pcdata.as_mut() {
            pcdata.lasthost = host.clone();
            pcdata.lasttime = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        }
    }
    if !srv.world.char_list.contains(&ch_id) {
        srv.world.char_list.push(ch_id);
    }

    // Saved room if it still exists, else the first area's recall, else
    // the school.
    let target = srv
        .world
        .ch(ch_id)
        .map(|ch| ch.was_in_room)
        .filter(|&vnum| vnum > 0)
        .and_then(|vnum| srv.world.get_room_index(vnum))
        .or_else(|| {
            srv.world
                .areas
                .first()
                .and_then(|area| srv.world.get_room_index(area.recall))
        })
        .or_else(|| srv.world.get_room_index(ROOM_VNUM_SCHOOL))
        .or(srv.world.areas.first().and_then(|a| a.rooms.first().copied()));
    let Some(room_id) = target else {
        log::error!("no landing room for {name}; world has no rooms?");
        srv.close_descriptor(desc_id);
        return;
    };

    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.state = ConState::Playing;
        desc.fcommand = true;
    }
    srv.world.char_to_room(ch_id, room_id);
    renegotiate_saved_prefs(srv, desc_id, ch_id);

    log::info!("{name}@{host} has connected");
    act(
        &srv.world,
        &mut srv.descriptors,
        "$n has entered the game.",
        ch_id,
        ActArgs::default(),
        ActTarget::ToRoom,
    );
    crate::commands::do_look(srv, ch_id, "auto");

    if first_login && brand_new {
        srv.save_player(ch_id);
    }
}

/// Copyover landing: the character reloads from persistence, not from
/// the handoff file.
fn copyover_recover(srv: &mut Server, desc_id: DescId) {
    let name = match srv.descriptors.get(desc_id) {
        Some(desc) => desc.login_name.clone(),
        None => return,
    };
    let path = srv.paths.player_db(&name);
    let save = match player_db::load_player(&path) {
        Ok(Some(save)) => save,
        _ => {
            log::warn!("copyover recovery: no file for {name}");
            srv.descriptors
                .write(desc_id, "Your character could not be recovered; log in again.\r\n");
            if let Some(desc) = srv.descriptors.get_mut(desc_id) {
                desc.state = ConState::GetName;
                desc.character = None;
            }
            return;
        }
    };
    let ch_id = player_db::instantiate(&mut srv.world, &save);
    if let Some(desc) = srv.descriptors.get_mut(desc_id) {
        desc.character = Some(ch_id);
    }
    if let Some(ch) = srv.world.ch_mut(ch_id) {
        ch.desc = Some(desc_id);
    }
    enter_world(srv, desc_id, false);
}
